//! Builtin callables, container methods, and indexing.

use std::cmp::Ordering;

use crate::ast::BinaryOperator;

use super::error::InterpreterError;
use super::operators::compare;
use super::value::{DictRef, ListRef, Value, range_len};

/// Callables available by bare name when no user binding matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BuiltinFunction {
    Range,
    Len,
}

impl BuiltinFunction {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "range" => Some(Self::Range),
            "len" => Some(Self::Len),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::Len => "len",
        }
    }

    pub(crate) fn call(self, args: Vec<Value>) -> Result<Value, InterpreterError> {
        match self {
            Self::Range => {
                let bounds = args
                    .iter()
                    .map(int_index)
                    .collect::<Result<Vec<_>, _>>()?;
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => return Err(arity_error(self.name(), "1 to 3", args.len())),
                };
                if step == 0 {
                    return Err(InterpreterError::RangeStepZero);
                }
                Ok(Value::Range { start, stop, step })
            }
            Self::Len => {
                let [value] = exact_args::<1>(self.name(), args)?;
                let len = match &value {
                    Value::Str(text) => text.chars().count() as i64,
                    Value::List(items) => items.borrow().len() as i64,
                    Value::Dict(dict) => dict.borrow().len() as i64,
                    Value::Range { start, stop, step } => range_len(*start, *stop, *step),
                    other => {
                        return Err(InterpreterError::UnknownMethod {
                            method: "len".to_string(),
                            type_name: other.type_name(),
                        });
                    }
                };
                Ok(Value::Int(len))
            }
        }
    }
}

fn arity_error(method: &str, expected: &str, found: usize) -> InterpreterError {
    InterpreterError::MethodArityMismatch {
        method: method.to_string(),
        expected: expected.to_string(),
        found,
    }
}

fn exact_args<const N: usize>(
    method: &str,
    args: Vec<Value>,
) -> Result<[Value; N], InterpreterError> {
    let found = args.len();
    <[Value; N]>::try_from(args).map_err(|_| arity_error(method, &N.to_string(), found))
}

fn int_index(value: &Value) -> Result<i64, InterpreterError> {
    value.as_int().ok_or_else(|| InterpreterError::InvalidIndexType {
        type_name: value.type_name(),
    })
}

/// Resolves a possibly negative position against `len`.
pub(crate) fn normalize_index(index: i64, len: usize) -> Result<usize, InterpreterError> {
    let signed_len = len as i64;
    let resolved = if index < 0 { index + signed_len } else { index };
    if (0..signed_len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(InterpreterError::IndexOutOfRange { index, len })
    }
}

/// `append`, `pop` and `sort`.
pub(crate) fn call_list_method(
    list: &ListRef,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, InterpreterError> {
    match method {
        "append" => {
            let [item] = exact_args::<1>(method, args)?;
            list.borrow_mut().push(item);
            Ok(Value::None)
        }
        "pop" => {
            let position = match args.as_slice() {
                [] => None,
                [index] => Some(int_index(index)?),
                _ => return Err(arity_error(method, "0 or 1", args.len())),
            };
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(InterpreterError::PopFromEmptyList);
            }
            let index = match position {
                Some(position) => normalize_index(position, items.len())?,
                None => items.len() - 1,
            };
            Ok(items.remove(index))
        }
        "sort" => {
            let [] = exact_args::<0>(method, args)?;
            // Sort a snapshot so comparisons never observe a borrowed list.
            let mut items = list.borrow().clone();
            let mut failure = None;
            items.sort_by(|left, right| match compare(BinaryOperator::Less, left, right) {
                Ok(ordering) => ordering,
                Err(error) => {
                    failure.get_or_insert(error);
                    Ordering::Equal
                }
            });
            if let Some(error) = failure {
                return Err(error);
            }
            *list.borrow_mut() = items;
            Ok(Value::None)
        }
        _ => Err(InterpreterError::UnknownMethod {
            method: method.to_string(),
            type_name: "list".to_string(),
        }),
    }
}

/// `keys`, `values`, `items` (snapshots) and `get`.
pub(crate) fn call_dict_method(
    dict: &DictRef,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, InterpreterError> {
    match method {
        "keys" => {
            let [] = exact_args::<0>(method, args)?;
            Ok(Value::list(dict.borrow().keys()))
        }
        "values" => {
            let [] = exact_args::<0>(method, args)?;
            Ok(Value::list(dict.borrow().values()))
        }
        "items" => {
            let [] = exact_args::<0>(method, args)?;
            let pairs = dict
                .borrow()
                .entries()
                .map(|(key, value)| Value::list(vec![key.clone(), value.clone()]))
                .collect();
            Ok(Value::list(pairs))
        }
        "get" => {
            let found = args.len();
            let mut args = args.into_iter();
            let (Some(key), default, None) = (args.next(), args.next(), args.next()) else {
                return Err(arity_error(method, "1 or 2", found));
            };
            let value = dict.borrow().get(&key)?;
            Ok(value.or(default).unwrap_or(Value::None))
        }
        _ => Err(InterpreterError::UnknownMethod {
            method: method.to_string(),
            type_name: "dict".to_string(),
        }),
    }
}

/// `object[index]` for lists, text and dictionaries.
pub(crate) fn get_item(object: &Value, index: &Value) -> Result<Value, InterpreterError> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            let position = normalize_index(int_index(index)?, items.len())?;
            Ok(items[position].clone())
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let position = normalize_index(int_index(index)?, chars.len())?;
            Ok(Value::str(chars[position].to_string()))
        }
        Value::Dict(dict) => {
            dict.borrow()
                .get(index)?
                .ok_or_else(|| InterpreterError::KeyNotFound { key: index.repr() })
        }
        other => Err(InterpreterError::NotSubscriptable {
            type_name: other.type_name(),
        }),
    }
}

/// `object[index] = value` for lists and dictionaries.
pub(crate) fn set_item(object: &Value, index: Value, value: Value) -> Result<(), InterpreterError> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let position = normalize_index(int_index(&index)?, items.len())?;
            items[position] = value;
            Ok(())
        }
        Value::Dict(dict) => dict.borrow_mut().insert(index, value),
        other => Err(InterpreterError::IndexAssignUnsupported {
            type_name: other.type_name(),
        }),
    }
}

/// `object[start:stop:step]` for lists and text. Absent bounds (or `None`)
/// take the defaults for the step direction; out-of-range bounds clamp.
pub(crate) fn get_slice(
    object: &Value,
    start: Option<Value>,
    stop: Option<Value>,
    step: Option<Value>,
) -> Result<Value, InterpreterError> {
    let bound = |value: Option<Value>| match value {
        None | Some(Value::None) => Ok(None),
        Some(value) => int_index(&value).map(Some),
    };
    let (start, stop) = (bound(start)?, bound(stop)?);
    let step = bound(step)?.unwrap_or(1);
    if step == 0 {
        return Err(InterpreterError::SliceStepZero);
    }

    match object {
        Value::List(items) => {
            let items = items.borrow();
            let picked = slice_positions(items.len(), start, stop, step)
                .into_iter()
                .map(|position| items[position].clone())
                .collect();
            Ok(Value::list(picked))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let picked: String = slice_positions(chars.len(), start, stop, step)
                .into_iter()
                .map(|position| chars[position])
                .collect();
            Ok(Value::str(picked))
        }
        other => Err(InterpreterError::NotSubscriptable {
            type_name: other.type_name(),
        }),
    }
}

fn slice_positions(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
    let resolve = |bound: Option<i64>, default: i64| match bound {
        None => default,
        Some(bound) => {
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(lower, upper)
        }
    };
    let (start, stop) = if step < 0 {
        (resolve(start, upper), resolve(stop, lower))
    } else {
        (resolve(start, lower), resolve(stop, upper))
    };

    let mut positions = Vec::new();
    let mut position = start;
    while (step > 0 && position < stop) || (step < 0 && position > stop) {
        positions.push(position as usize);
        match position.checked_add(step) {
            Some(next) => position = next,
            None => break,
        }
    }
    positions
}
