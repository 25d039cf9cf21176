//! Binary operator semantics shared by the tree walker and the arithmetic
//! fast path.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::BinaryOperator;

use super::error::InterpreterError;
use super::value::Value;

/// Checked integer arithmetic; `/` floors toward negative infinity.
pub(crate) fn int_arith(op: BinaryOperator, left: i64, right: i64) -> Result<i64, InterpreterError> {
    let result = match op {
        BinaryOperator::Add => left.checked_add(right),
        BinaryOperator::Sub => left.checked_sub(right),
        BinaryOperator::Mul => left.checked_mul(right),
        BinaryOperator::Div => return floor_div(left, right),
        _ => {
            return Err(InterpreterError::UnsupportedOperand {
                op: op.symbol().to_string(),
                left: "int".to_string(),
                right: "int".to_string(),
            });
        }
    };
    result.ok_or_else(|| InterpreterError::IntegerOverflow {
        op: op.symbol().to_string(),
    })
}

fn floor_div(left: i64, right: i64) -> Result<i64, InterpreterError> {
    if right == 0 {
        return Err(InterpreterError::DivisionByZero);
    }
    let quotient = left
        .checked_div(right)
        .ok_or_else(|| InterpreterError::IntegerOverflow {
            op: "/".to_string(),
        })?;
    if left % right != 0 && (left < 0) != (right < 0) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

pub(crate) fn binary_op(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, InterpreterError> {
    match op {
        BinaryOperator::Add if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) => {
            let joined = left.to_output() + &right.to_output();
            Ok(Value::Str(Rc::from(joined)))
        }
        BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div => {
            match (left.as_int(), right.as_int()) {
                (Some(left), Some(right)) => int_arith(op, left, right).map(Value::Int),
                _ => Err(InterpreterError::UnsupportedOperand {
                    op: op.symbol().to_string(),
                    left: left.type_name(),
                    right: right.type_name(),
                }),
            }
        }
        BinaryOperator::Equal => Ok(Value::Bool(values_equal(left, right))),
        BinaryOperator::NotEqual => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOperator::Less => Ok(Value::Bool(compare(op, left, right)?.is_lt())),
        BinaryOperator::LessEqual => Ok(Value::Bool(compare(op, left, right)?.is_le())),
        BinaryOperator::Greater => Ok(Value::Bool(compare(op, left, right)?.is_gt())),
        BinaryOperator::GreaterEqual => Ok(Value::Bool(compare(op, left, right)?.is_ge())),
    }
}

/// Value equality. Mismatched kinds are unequal rather than an error;
/// objects compare by identity.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    equal_within(left, right, &mut Vec::new())
}

/// `open` holds the container pairs already being compared. Meeting a pair
/// again means the two structures repeat in step, so that branch is equal.
fn equal_within(left: &Value, right: &Value, open: &mut Vec<(*const (), *const ())>) -> bool {
    if let (Some(left), Some(right)) = (left.as_int(), right.as_int()) {
        return left == right;
    }
    match (left, right) {
        (Value::Str(left), Value::Str(right)) => left == right,
        (Value::None, Value::None) => true,
        (Value::List(left), Value::List(right)) => {
            if Rc::ptr_eq(left, right) {
                return true;
            }
            let pair = (Rc::as_ptr(left).cast::<()>(), Rc::as_ptr(right).cast::<()>());
            if open.contains(&pair) {
                return true;
            }
            let (left, right) = (left.borrow(), right.borrow());
            if left.len() != right.len() {
                return false;
            }
            open.push(pair);
            let equal = left
                .iter()
                .zip(right.iter())
                .all(|(left, right)| equal_within(left, right, open));
            open.pop();
            equal
        }
        (Value::Dict(left), Value::Dict(right)) => {
            if Rc::ptr_eq(left, right) {
                return true;
            }
            let pair = (Rc::as_ptr(left).cast::<()>(), Rc::as_ptr(right).cast::<()>());
            if open.contains(&pair) {
                return true;
            }
            let (left, right) = (left.borrow(), right.borrow());
            if left.len() != right.len() {
                return false;
            }
            open.push(pair);
            let equal = left.entries().all(|(key, value)| {
                matches!(right.get(key), Ok(Some(other)) if equal_within(value, &other, open))
            });
            open.pop();
            equal
        }
        (
            Value::Range {
                start: left_start,
                stop: left_stop,
                step: left_step,
            },
            Value::Range {
                start: right_start,
                stop: right_stop,
                step: right_step,
            },
        ) => (left_start, left_stop, left_step) == (right_start, right_stop, right_step),
        (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
        (Value::BoundMethod(left), Value::BoundMethod(right)) => {
            Rc::ptr_eq(&left.function, &right.function)
                && equal_within(&left.receiver, &right.receiver, open)
        }
        (Value::Class(left), Value::Class(right)) => Rc::ptr_eq(left, right),
        (Value::Instance(left), Value::Instance(right)) => Rc::ptr_eq(left, right),
        (Value::Module(left), Value::Module(right)) => Rc::ptr_eq(left, right),
        _ => false,
    }
}

/// Natural ordering for `<`, `<=`, `>`, `>=` and `list.sort`. Numbers,
/// text and lists (lexicographically) are ordered; anything else fails.
pub(crate) fn compare(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Ordering, InterpreterError> {
    compare_within(op, left, right, &mut Vec::new())
}

fn compare_within(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    open: &mut Vec<(*const (), *const ())>,
) -> Result<Ordering, InterpreterError> {
    if let (Some(left), Some(right)) = (left.as_int(), right.as_int()) {
        return Ok(left.cmp(&right));
    }
    match (left, right) {
        (Value::Str(left), Value::Str(right)) => Ok(left.cmp(right)),
        (Value::List(left), Value::List(right)) => {
            let pair = (Rc::as_ptr(left).cast::<()>(), Rc::as_ptr(right).cast::<()>());
            if open.contains(&pair) {
                return Err(InterpreterError::CyclicComparison {
                    op: op.symbol().to_string(),
                });
            }
            let (left, right) = (left.borrow(), right.borrow());
            open.push(pair);
            let mut ordering = Ok(left.len().cmp(&right.len()));
            for (left, right) in left.iter().zip(right.iter()) {
                if !values_equal(left, right) {
                    ordering = compare_within(op, left, right, open);
                    break;
                }
            }
            open.pop();
            ordering
        }
        _ => Err(InterpreterError::NotComparable {
            op: op.symbol().to_string(),
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}
