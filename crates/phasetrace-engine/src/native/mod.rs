//! Native reference implementations of the collaborator traits.
//!
//! These cover the subset of the query language the tests and demos need:
//! `query` operations (named or shorthand), aliases, scalar arguments and
//! nested selections over object and list types.

mod executor;
mod parser;
mod printer;
mod validator;

pub use executor::NativeEngine;
pub use parser::NativeParser;
pub use validator::NativeValidator;
