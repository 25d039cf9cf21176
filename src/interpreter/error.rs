use thiserror::Error;

use crate::error::ErrorKind;

use super::value::Value;

/// Typed errors produced by the tree-walking evaluator.
///
/// None of these can be intercepted by the language's own `try`; only values
/// passed to `raise` can (see [`Unwind`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpreterError {
    #[error("name '{name}' is not defined")]
    UndefinedName { name: String },
    #[error("'{name}' is not a defined function or class")]
    UndefinedCallable { name: String },
    #[error("no binding for nonlocal '{name}' found")]
    NonlocalNotFound { name: String },
    #[error("base class '{name}' is not defined")]
    UndefinedBaseClass { name: String },
    #[error("base '{name}' of class '{class}' is not a class")]
    BaseNotClass { name: String, class: String },
    #[error("unsupported operand type(s) for {op}: '{left}' and '{right}'")]
    UnsupportedOperand {
        op: String,
        left: String,
        right: String,
    },
    #[error("'{op}' not supported between instances of '{left}' and '{right}'")]
    NotComparable {
        op: String,
        left: String,
        right: String,
    },
    #[error("'{op}' cannot order lists that contain themselves")]
    CyclicComparison { op: String },
    #[error("integer division by zero")]
    DivisionByZero,
    #[error("integer overflow in '{op}'")]
    IntegerOverflow { op: String },
    #[error("{name}() takes {expected} arguments but {found} were given")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("argument '{param}' of {function}() must be {expected}, not {found}")]
    AnnotationMismatch {
        function: String,
        param: String,
        expected: String,
        found: String,
    },
    #[error("'{type_name}' object is not iterable")]
    NotIterable { type_name: String },
    #[error("'{type_name}' object is not callable")]
    NotCallable { type_name: String },
    #[error("Unknown method '{method}' for type {type_name}")]
    UnknownMethod { method: String, type_name: String },
    #[error("Method '{method}' expected {expected} arguments, got {found}")]
    MethodArityMismatch {
        method: String,
        expected: String,
        found: usize,
    },
    #[error("Unknown attribute '{attribute}' for type {type_name}")]
    UnknownAttribute {
        attribute: String,
        type_name: String,
    },
    #[error("cannot set attribute '{attribute}' on type {type_name}")]
    AttributeAssignUnsupported {
        attribute: String,
        type_name: String,
    },
    #[error("'{type_name}' object does not support item assignment")]
    IndexAssignUnsupported { type_name: String },
    #[error("'{type_name}' object is not subscriptable")]
    NotSubscriptable { type_name: String },
    #[error("indices must be integers, not '{type_name}'")]
    InvalidIndexType { type_name: String },
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("key {key} not found")]
    KeyNotFound { key: String },
    #[error("unhashable type: '{type_name}'")]
    UnhashableKey { type_name: String },
    #[error("slice step cannot be zero")]
    SliceStepZero,
    #[error("range() arg 3 must not be zero")]
    RangeStepZero,
    #[error("pop from empty list")]
    PopFromEmptyList,
    #[error("'{keyword}' outside loop")]
    LoopControlOutsideLoop { keyword: &'static str },
    #[error("'return' outside function")]
    ReturnOutsideFunction,
    #[error("No module named '{name}' (looked for {location})")]
    ModuleNotFound { name: String, location: String },
    #[error("Reading module '{name}': {message}")]
    ModuleIo { name: String, message: String },
    #[error("in module '{name}': {message}")]
    ModuleSyntax { name: String, message: String },
    #[error("uncaught exception: {value}")]
    UncaughtRaise { value: String },
}

impl InterpreterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UndefinedName { .. }
            | Self::UndefinedCallable { .. }
            | Self::NonlocalNotFound { .. }
            | Self::UndefinedBaseClass { .. } => ErrorKind::Name,
            Self::ModuleSyntax { .. } => ErrorKind::Syntax,
            Self::UncaughtRaise { .. } => ErrorKind::Raised,
            _ => ErrorKind::Runtime,
        }
    }
}

/// Abnormal exit from expression or statement evaluation.
///
/// `Raised` carries a value produced by `raise` and is the only variant a
/// `try` statement intercepts.
#[derive(Debug)]
pub(crate) enum Unwind {
    Raised(Value),
    Error(InterpreterError),
}

impl From<InterpreterError> for Unwind {
    fn from(error: InterpreterError) -> Self {
        Unwind::Error(error)
    }
}

pub(crate) type EvalResult<T = Value> = Result<T, Unwind>;
