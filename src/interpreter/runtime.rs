use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{Block, Expression, Program, Statement};
use crate::config::RunConfig;
use crate::lexer::tokenize;
use crate::parser::parse_tokens;

use super::builtins::{self, BuiltinFunction};
use super::class::{ClassObject, InstanceObject, instance_attribute};
use super::dict::DictObject;
use super::environment::{Environment, ScopeKind};
use super::error::{EvalResult, InterpreterError, Unwind};
use super::module::{ModuleCache, ModuleObject};
use super::operators::binary_op;
use super::specializer::try_fast_call;
use super::value::{FunctionObject, Value};

/// Control-flow marker for statement execution.
pub(super) enum ExecResult {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// What a bare-name call resolved to.
enum Callee {
    Value(Value),
    Builtin(BuiltinFunction),
}

/// Runtime executor for interpreted statements and expressions.
pub(super) struct InterpreterRuntime<'a> {
    pub(super) config: &'a RunConfig,
    pub(super) modules: &'a mut ModuleCache,
    pub(super) output: String,
}

impl InterpreterRuntime<'_> {
    /// Runs the top level of a program or module, where neither loop
    /// signals nor `return` may surface.
    pub(super) fn exec_top_level(
        &mut self,
        statements: &[Statement],
        env: &Environment,
    ) -> EvalResult<()> {
        let signal = self.exec_block(statements, env)?;
        Ok(expect_normal(signal)?)
    }

    fn exec_block(&mut self, body: &[Statement], env: &Environment) -> EvalResult<ExecResult> {
        // Any signal other than Normal stops the block and bubbles up.
        for statement in body {
            match self.exec_statement(statement, env)? {
                ExecResult::Normal => {}
                signal => return Ok(signal),
            }
        }
        Ok(ExecResult::Normal)
    }

    fn exec_statement(&mut self, statement: &Statement, env: &Environment) -> EvalResult<ExecResult> {
        match statement {
            Statement::Assign { name, value } => {
                let value = self.eval_expression(value, env)?;
                env.assign(name, value)?;
            }
            Statement::AttributeAssign {
                object,
                name,
                value,
            } => {
                let object = self.eval_expression(object, env)?;
                let value = self.eval_expression(value, env)?;
                set_attribute(&object, name, value)?;
            }
            Statement::IndexAssign {
                object,
                index,
                value,
            } => {
                let object = self.eval_expression(object, env)?;
                let index = self.eval_expression(index, env)?;
                let value = self.eval_expression(value, env)?;
                builtins::set_item(&object, index, value)?;
            }
            Statement::Print(args) => {
                let line = self
                    .eval_all(args, env)?
                    .iter()
                    .map(Value::to_output)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.output.push_str(&line);
                self.output.push('\n');
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                if self.eval_expression(condition, env)?.is_truthy() {
                    return self.exec_block(then_body, env);
                }
                if let Some(else_body) = else_body {
                    return self.exec_block(else_body, env);
                }
            }
            // Loop bodies run in the enclosing frame so assignments persist.
            Statement::While { condition, body } => {
                while self.eval_expression(condition, env)?.is_truthy() {
                    match self.exec_block(body, env)? {
                        ExecResult::Normal | ExecResult::Continue => {}
                        ExecResult::Break => break,
                        ExecResult::Return(value) => return Ok(ExecResult::Return(value)),
                    }
                }
            }
            // Same frame as `while`; the target stays bound after the loop.
            Statement::For {
                target,
                iterable,
                body,
            } => {
                let iterable = self.eval_expression(iterable, env)?;
                for item in iterate(&iterable)? {
                    env.assign(target, item)?;
                    match self.exec_block(body, env)? {
                        ExecResult::Normal | ExecResult::Continue => {}
                        ExecResult::Break => break,
                        ExecResult::Return(value) => return Ok(ExecResult::Return(value)),
                    }
                }
            }
            Statement::ClassDef { name, base, body } => {
                self.define_class(name, base.as_deref(), body, env)?;
            }
            Statement::FunctionDef { name, params, body } => {
                let is_method = env.kind() == ScopeKind::Class;
                env.define_function(Rc::new(FunctionObject::new(
                    name,
                    params.clone(),
                    body.clone(),
                    env.clone(),
                    is_method,
                )));
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(value) => self.eval_expression(value, env)?,
                    None => Value::None,
                };
                return Ok(ExecResult::Return(value));
            }
            Statement::Break => return Ok(ExecResult::Break),
            Statement::Continue => return Ok(ExecResult::Continue),
            Statement::Pass => {}
            Statement::Expr(expression) => {
                self.eval_expression(expression, env)?;
            }
            Statement::Try { body, handler } => {
                return match self.exec_block(body, env) {
                    Err(Unwind::Raised(value)) => {
                        trace!(value = %value.repr(), "caught raised value");
                        self.exec_block(handler, env)
                    }
                    other => other,
                };
            }
            Statement::Raise(expression) => {
                let value = self.eval_expression(expression, env)?;
                return Err(Unwind::Raised(value));
            }
            Statement::Nonlocal(names) => {
                for name in names {
                    env.declare_nonlocal(name.as_str());
                }
            }
            Statement::Import(name) => {
                let module = self.import_module(name)?;
                env.define_variable(name.as_str(), Value::Module(module));
            }
        }
        Ok(ExecResult::Normal)
    }

    fn define_class(
        &mut self,
        name: &str,
        base: Option<&str>,
        body: &Block,
        env: &Environment,
    ) -> EvalResult<()> {
        let base_class = base
            .map(|base| resolve_base(name, base, env))
            .transpose()?;

        let class_env = env.child(ScopeKind::Class);
        let signal = self.exec_block(body, &class_env)?;
        expect_normal(signal)?;

        let methods: HashMap<_, _> = class_env
            .local_functions()
            .into_iter()
            .map(|method| (method.name.clone(), method))
            .collect();
        let mut attributes: HashMap<_, _> = class_env.local_variables().into_iter().collect();
        for nested in class_env.local_classes() {
            attributes.insert(nested.name.clone(), Value::Class(nested));
        }
        debug!(
            class = name,
            base = base.unwrap_or("-"),
            methods = methods.len(),
            attributes = attributes.len(),
            "defined class"
        );
        env.define_class(Rc::new(ClassObject::new(
            name, methods, attributes, base_class,
        )));
        Ok(())
    }

    fn import_module(&mut self, name: &str) -> EvalResult<Rc<ModuleObject>> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module);
        }
        let source = self.modules.source(name)?;
        let program = parse_module(name, &source)?;

        // Module top levels see nothing of the importer's scope.
        let env = Environment::new(ScopeKind::Module);
        self.exec_top_level(&program.statements, &env)?;
        let module = Rc::new(ModuleObject {
            name: name.to_string(),
            env,
        });
        self.modules.insert(module.clone());
        debug!(module = name, "module loaded");
        Ok(module)
    }

    fn eval_all(&mut self, expressions: &[Expression], env: &Environment) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(expressions.len());
        for expression in expressions {
            values.push(self.eval_expression(expression, env)?);
        }
        Ok(values)
    }

    fn eval_optional(
        &mut self,
        expression: Option<&Expression>,
        env: &Environment,
    ) -> EvalResult<Option<Value>> {
        expression
            .map(|expression| self.eval_expression(expression, env))
            .transpose()
    }

    fn eval_expression(&mut self, expression: &Expression, env: &Environment) -> EvalResult {
        // Expression evaluation can recurse into calls, which may execute statements.
        match expression {
            Expression::Integer(value) => Ok(Value::Int(*value)),
            Expression::String(text) => Ok(Value::str(text.as_str())),
            Expression::Boolean(value) => Ok(Value::Bool(*value)),
            Expression::None => Ok(Value::None),
            Expression::Identifier(name) => Ok(lookup_name(name, env)?),
            Expression::List(elements) => Ok(Value::list(self.eval_all(elements, env)?)),
            Expression::Dict(entries) => {
                let mut dict = DictObject::default();
                for (key, value) in entries {
                    let key = self.eval_expression(key, env)?;
                    let value = self.eval_expression(value, env)?;
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            Expression::BinaryOp { left, op, right } => {
                let left = self.eval_expression(left, env)?;
                let right = self.eval_expression(right, env)?;
                Ok(binary_op(*op, &left, &right)?)
            }
            Expression::Index { object, index } => {
                let object = self.eval_expression(object, env)?;
                let index = self.eval_expression(index, env)?;
                Ok(builtins::get_item(&object, &index)?)
            }
            Expression::Slice {
                object,
                start,
                stop,
                step,
            } => {
                let object = self.eval_expression(object, env)?;
                let start = self.eval_optional(start.as_deref(), env)?;
                let stop = self.eval_optional(stop.as_deref(), env)?;
                let step = self.eval_optional(step.as_deref(), env)?;
                Ok(builtins::get_slice(&object, start, stop, step)?)
            }
            Expression::Attribute { object, name } => {
                let object = self.eval_expression(object, env)?;
                Ok(get_attribute(&object, name)?)
            }
            Expression::Call { name, args } => {
                let callee = resolve_callable(name, env)?;
                let args = self.eval_all(args, env)?;
                match callee {
                    Callee::Value(callee) => self.call_value(callee, args),
                    Callee::Builtin(builtin) => Ok(builtin.call(args)?),
                }
            }
            Expression::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = self.eval_expression(object, env)?;
                let args = self.eval_all(args, env)?;
                self.call_method(receiver, method, args)
            }
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> EvalResult {
        match callee {
            Value::Function(function) => self.call_function(&function, args),
            Value::BoundMethod(method) => {
                let args = with_receiver(method.receiver.clone(), args);
                self.call_function(&method.function, args)
            }
            Value::Class(class) => self.instantiate(&class, args),
            other => Err(InterpreterError::NotCallable {
                type_name: other.type_name(),
            }
            .into()),
        }
    }

    fn call_method(&mut self, receiver: Value, method: &str, args: Vec<Value>) -> EvalResult {
        let callable = match &receiver {
            Value::Instance(instance) => {
                let class = instance.borrow().class.clone();
                if let Some(function) = class.find_method(method) {
                    return self.call_function(&function, with_receiver(receiver.clone(), args));
                }
                instance_attribute(instance, method).ok()
            }
            Value::Class(class) => class.get_attribute(method).ok(),
            Value::Module(module) => module.get_attribute(method).ok(),
            Value::List(list) => return Ok(builtins::call_list_method(list, method, args)?),
            Value::Dict(dict) => return Ok(builtins::call_dict_method(dict, method, args)?),
            _ => None,
        };
        match callable {
            Some(callable) if callable.is_callable() => self.call_value(callable, args),
            _ => Err(InterpreterError::UnknownMethod {
                method: method.to_string(),
                type_name: receiver.type_name(),
            }
            .into()),
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(function = %function.name))]
    fn call_function(&mut self, function: &Rc<FunctionObject>, args: Vec<Value>) -> EvalResult {
        check_arguments(function, &args)?;
        if let Some(result) = try_fast_call(function, &args, self.config.specialize_threshold) {
            return Ok(result?);
        }

        // Calls run in a fresh frame parented at the defining scope.
        let frame = function.env.child(ScopeKind::Function);
        for (param, arg) in function.params.iter().zip(args) {
            frame.define_variable(param.name.as_str(), arg);
        }
        match self.exec_block(&function.body, &frame)? {
            ExecResult::Normal => Ok(Value::None),
            ExecResult::Return(value) => Ok(value),
            ExecResult::Break => {
                Err(InterpreterError::LoopControlOutsideLoop { keyword: "break" }.into())
            }
            ExecResult::Continue => Err(InterpreterError::LoopControlOutsideLoop {
                keyword: "continue",
            }
            .into()),
        }
    }

    fn instantiate(&mut self, class: &Rc<ClassObject>, args: Vec<Value>) -> EvalResult {
        let instance = Value::Instance(Rc::new(RefCell::new(InstanceObject::new(class.clone()))));
        match class.find_method("__init__") {
            Some(init) => {
                // Whatever __init__ returns is discarded.
                self.call_function(&init, with_receiver(instance.clone(), args))?;
            }
            None if !args.is_empty() => {
                return Err(InterpreterError::ArityMismatch {
                    name: class.name.clone(),
                    expected: 0,
                    found: args.len(),
                }
                .into());
            }
            None => {}
        }
        Ok(instance)
    }
}

fn expect_normal(signal: ExecResult) -> Result<(), InterpreterError> {
    match signal {
        ExecResult::Normal => Ok(()),
        ExecResult::Break => Err(InterpreterError::LoopControlOutsideLoop { keyword: "break" }),
        ExecResult::Continue => Err(InterpreterError::LoopControlOutsideLoop {
            keyword: "continue",
        }),
        ExecResult::Return(_) => Err(InterpreterError::ReturnOutsideFunction),
    }
}

fn with_receiver(receiver: Value, args: Vec<Value>) -> Vec<Value> {
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(receiver);
    full.extend(args);
    full
}

fn check_arguments(function: &FunctionObject, args: &[Value]) -> Result<(), InterpreterError> {
    if args.len() != function.params.len() {
        // Method arities are reported without the implicit receiver.
        let receiver = usize::from(function.is_method);
        return Err(InterpreterError::ArityMismatch {
            name: function.name.clone(),
            expected: function.params.len().saturating_sub(receiver),
            found: args.len().saturating_sub(receiver),
        });
    }
    for (param, arg) in function.params.iter().zip(args) {
        if let Some(annotation) = &param.annotation
            && !arg.matches_annotation(annotation)
        {
            return Err(InterpreterError::AnnotationMismatch {
                function: function.name.clone(),
                param: param.name.clone(),
                expected: annotation.clone(),
                found: arg.type_name(),
            });
        }
    }
    Ok(())
}

fn lookup_name(name: &str, env: &Environment) -> Result<Value, InterpreterError> {
    if let Some(value) = env.lookup_variable(name) {
        return Ok(value);
    }
    if let Some(function) = env.lookup_function(name) {
        return Ok(Value::Function(function));
    }
    if let Some(class) = env.lookup_class(name) {
        return Ok(Value::Class(class));
    }
    Err(InterpreterError::UndefinedName {
        name: name.to_string(),
    })
}

/// Bare-name call resolution: functions, then classes, then callable
/// variables, then builtins.
fn resolve_callable(name: &str, env: &Environment) -> Result<Callee, InterpreterError> {
    if let Some(function) = env.lookup_function(name) {
        return Ok(Callee::Value(Value::Function(function)));
    }
    if let Some(class) = env.lookup_class(name) {
        return Ok(Callee::Value(Value::Class(class)));
    }
    if let Some(value) = env.lookup_variable(name)
        && value.is_callable()
    {
        return Ok(Callee::Value(value));
    }
    if let Some(builtin) = BuiltinFunction::from_name(name) {
        return Ok(Callee::Builtin(builtin));
    }
    Err(InterpreterError::UndefinedCallable {
        name: name.to_string(),
    })
}

fn resolve_base(
    class: &str,
    base: &str,
    env: &Environment,
) -> Result<Rc<ClassObject>, InterpreterError> {
    if let Some(found) = env.lookup_class(base) {
        return Ok(found);
    }
    match env.lookup_variable(base) {
        Some(Value::Class(found)) => Ok(found),
        Some(_) => Err(InterpreterError::BaseNotClass {
            name: base.to_string(),
            class: class.to_string(),
        }),
        None => Err(InterpreterError::UndefinedBaseClass {
            name: base.to_string(),
        }),
    }
}

fn get_attribute(object: &Value, name: &str) -> Result<Value, InterpreterError> {
    match object {
        Value::Instance(instance) => instance_attribute(instance, name),
        Value::Class(class) => class.get_attribute(name),
        Value::Module(module) => module.get_attribute(name),
        other => Err(InterpreterError::UnknownAttribute {
            attribute: name.to_string(),
            type_name: other.type_name(),
        }),
    }
}

fn set_attribute(object: &Value, name: &str, value: Value) -> Result<(), InterpreterError> {
    match object {
        Value::Instance(instance) => {
            instance.borrow_mut().fields.insert(name.to_string(), value);
        }
        Value::Class(class) => class.set_attribute(name, value),
        Value::Module(module) => module.env.define_variable(name, value),
        other => {
            return Err(InterpreterError::AttributeAssignUnsupported {
                attribute: name.to_string(),
                type_name: other.type_name(),
            });
        }
    }
    Ok(())
}

fn parse_module(name: &str, source: &str) -> Result<Program, InterpreterError> {
    let syntax_error = |message: String| InterpreterError::ModuleSyntax {
        name: name.to_string(),
        message,
    };
    let tokens = tokenize(source).map_err(|error| syntax_error(error.to_string()))?;
    parse_tokens(tokens).map_err(|error| syntax_error(error.to_string()))
}

/// Values produced by a `for` loop. Containers are snapshotted up front.
enum ForIter {
    Range { next: i64, stop: i64, step: i64 },
    Items(std::vec::IntoIter<Value>),
}

impl Iterator for ForIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ForIter::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return None;
                }
                let current = *next;
                *next = next.checked_add(*step).unwrap_or(*stop);
                Some(Value::Int(current))
            }
            ForIter::Items(items) => items.next(),
        }
    }
}

fn iterate(value: &Value) -> Result<ForIter, InterpreterError> {
    let items = match value {
        Value::Range { start, stop, step } => {
            return Ok(ForIter::Range {
                next: *start,
                stop: *stop,
                step: *step,
            });
        }
        Value::List(items) => items.borrow().clone(),
        Value::Dict(dict) => dict.borrow().keys(),
        Value::Str(text) => text
            .chars()
            .map(|ch| Value::str(ch.to_string()))
            .collect(),
        other => {
            return Err(InterpreterError::NotIterable {
                type_name: other.type_name(),
            });
        }
    };
    Ok(ForIter::Items(items.into_iter()))
}
