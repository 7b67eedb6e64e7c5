pub mod checks;
pub mod config;
pub mod context;
pub mod expression;
pub mod filter;
pub mod parser;
pub mod registry;
