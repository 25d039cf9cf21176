//! Call-count-triggered fast path for pure integer arithmetic functions.
//!
//! A function whose body is a single `return` of an expression over integer
//! literals, its own parameters and `+ - * /` is compiled once into a short
//! postfix program. The program reuses [`int_arith`], so its results and
//! failures are the ones the tree walker would produce.

use tracing::{debug, trace};

use crate::ast::{BinaryOperator, Expression, Statement};

use super::error::InterpreterError;
use super::operators::int_arith;
use super::value::{FunctionObject, Value};

#[derive(Debug, Default)]
pub(crate) enum Specialization {
    /// Not attempted yet.
    #[default]
    Cold,
    Ready(FastPath),
    Ineligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instruction {
    LoadParam(usize),
    LoadConst(i64),
    Apply(BinaryOperator),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FastPath {
    code: Vec<Instruction>,
    max_stack: usize,
}

impl FastPath {
    pub(crate) fn compile(function: &FunctionObject) -> Option<Self> {
        let [Statement::Return(Some(expression))] = &*function.body else {
            return None;
        };
        let mut compiler = Compiler {
            function,
            code: Vec::new(),
            depth: 0,
            max_stack: 0,
        };
        compiler.emit(expression)?;
        Some(Self {
            code: compiler.code,
            max_stack: compiler.max_stack,
        })
    }

    /// `None` when an argument is not an integer; the caller then falls back
    /// to the general evaluator.
    pub(crate) fn run(&self, args: &[Value]) -> Option<Result<i64, InterpreterError>> {
        let mut stack: Vec<i64> = Vec::with_capacity(self.max_stack);
        for instruction in &self.code {
            match *instruction {
                Instruction::LoadParam(index) => match args.get(index) {
                    Some(Value::Int(value)) => stack.push(*value),
                    _ => return None,
                },
                Instruction::LoadConst(value) => stack.push(value),
                Instruction::Apply(op) => {
                    let right = stack.pop()?;
                    let left = stack.pop()?;
                    match int_arith(op, left, right) {
                        Ok(value) => stack.push(value),
                        Err(error) => return Some(Err(error)),
                    }
                }
            }
        }
        stack.pop().map(Ok)
    }
}

struct Compiler<'f> {
    function: &'f FunctionObject,
    code: Vec<Instruction>,
    depth: usize,
    max_stack: usize,
}

impl Compiler<'_> {
    fn emit(&mut self, expression: &Expression) -> Option<()> {
        match expression {
            Expression::Integer(value) => self.push(Instruction::LoadConst(*value)),
            Expression::Identifier(name) => {
                let index = self
                    .function
                    .params
                    .iter()
                    .position(|param| &param.name == name)?;
                self.push(Instruction::LoadParam(index));
            }
            Expression::BinaryOp { left, op, right } if op.is_arithmetic() => {
                self.emit(left)?;
                self.emit(right)?;
                self.code.push(Instruction::Apply(*op));
                self.depth -= 1;
            }
            _ => return None,
        }
        Some(())
    }

    fn push(&mut self, instruction: Instruction) {
        self.code.push(instruction);
        self.depth += 1;
        self.max_stack = self.max_stack.max(self.depth);
    }
}

/// Counts the call and, once `threshold` calls have been made, routes it
/// through the compiled fast path when one exists.
///
/// Returns `None` when the general evaluator must run the call.
pub(crate) fn try_fast_call(
    function: &FunctionObject,
    args: &[Value],
    threshold: usize,
) -> Option<Result<Value, InterpreterError>> {
    let calls = function.calls.get().saturating_add(1);
    function.calls.set(calls);
    if calls < threshold {
        return None;
    }

    let mut state = function.specialization.borrow_mut();
    if matches!(*state, Specialization::Cold) {
        *state = match FastPath::compile(function) {
            Some(fast_path) => {
                debug!(
                    function = %function.name,
                    calls,
                    instructions = fast_path.code.len(),
                    "specialized function"
                );
                Specialization::Ready(fast_path)
            }
            None => {
                debug!(function = %function.name, calls, "function not eligible for fast path");
                Specialization::Ineligible
            }
        };
    }

    let Specialization::Ready(fast_path) = &*state else {
        return None;
    };
    let result = fast_path.run(args);
    if result.is_none() {
        trace!(function = %function.name, "non-integer arguments, using general evaluator");
    }
    result.map(|result| result.map(Value::Int))
}
