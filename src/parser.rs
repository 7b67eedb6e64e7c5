// Parser module - filter expression strings to node trees

pub mod expression_parser;
pub mod lexer;
pub mod token;

pub use expression_parser::Parser;
pub use lexer::Lexer;
pub use token::Token;

use anyhow::Result;

use crate::expression::Node;

/// Parse a filter string such as `exit_code != 0 and enabled = 1`
pub fn parse_expression(input: &str) -> Result<Node> {
    Parser::new(input).parse()
}
