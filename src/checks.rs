//! Check modules: each builds an attribute registry for its object model and
//! supplies a default filter configuration.

pub mod tasksched;
