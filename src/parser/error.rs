use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Expected {expected}, found {found} at line {line}, column {column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Cannot assign to expression at line {line}, column {column}")]
    InvalidAssignmentTarget { line: usize, column: usize },
    #[error("Duplicate parameter '{name}' at line {line}, column {column}")]
    DuplicateParameter {
        name: String,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Syntax
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
