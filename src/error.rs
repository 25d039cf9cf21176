use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::interpreter::InterpreterError;
use crate::lexer::LexError;
use crate::parser::ParseError;

/// Failure taxonomy shared by every phase of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Name,
    Runtime,
    /// A value raised by `raise` that no `try` handled.
    Raised,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Name => "NameError",
            ErrorKind::Runtime => "RuntimeError",
            ErrorKind::Raised => "UncaughtException",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("SyntaxError: {0}")]
    Lex(#[from] LexError),
    #[error("SyntaxError: {0}")]
    Parse(#[from] ParseError),
    #[error("{}: {}", .0.kind(), .0)]
    Eval(#[from] InterpreterError),
    #[error("Reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Taxonomy of the failure; I/O failures outside the program count as
    /// runtime errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Lex(error) => error.kind(),
            Error::Parse(error) => error.kind(),
            Error::Eval(error) => error.kind(),
            Error::Io { .. } => ErrorKind::Runtime,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
