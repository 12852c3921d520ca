mod env;
mod interpreter;
mod object;
mod resolver;

use lox_common::error::ErrorS;

pub use crate::interpreter::{Interpreter, Locals};
pub use crate::resolver::Resolver;

/// The stage at which [`Interpreter::run`] gave up.
#[derive(Debug)]
pub enum RunError {
    Lex(Vec<ErrorS>),
    Parse(Vec<ErrorS>),
    Resolve(Vec<ErrorS>),
    Runtime(ErrorS),
}

impl RunError {
    /// Process exit code for this failure: 65 for anything caught before
    /// execution starts, 70 for runtime errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Lex(_) | RunError::Parse(_) | RunError::Resolve(_) => 65,
            RunError::Runtime(_) => 70,
        }
    }

    pub fn errors(self) -> Vec<ErrorS> {
        match self {
            RunError::Lex(errors) | RunError::Parse(errors) | RunError::Resolve(errors) => errors,
            RunError::Runtime(error) => vec![error],
        }
    }
}
