use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Invalid dedent to {indent_level} spaces at line {line}")]
    InvalidDedent { indent_level: usize, line: usize },
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Tabs are not supported for indentation at line {line}")]
    TabIndentation { line: usize },
    #[error("Invalid integer literal '{literal}' at line {line}, column {column}")]
    InvalidIntegerLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
}

impl LexError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Syntax
    }
}

pub type LexResult<T> = Result<T, LexError>;
