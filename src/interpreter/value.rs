use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::ast::{Block, Param};

use super::class::{ClassObject, InstanceObject};
use super::dict::DictObject;
use super::environment::Environment;
use super::module::ModuleObject;
use super::specializer::Specialization;

pub(crate) type ListRef = Rc<RefCell<Vec<Value>>>;
pub(crate) type DictRef = Rc<RefCell<DictObject>>;
pub(crate) type InstanceRef = Rc<RefCell<InstanceObject>>;

/// Runtime value. Containers and objects are shared by reference; scalars
/// are copied.
#[derive(Clone)]
pub(crate) enum Value {
    Int(i64),
    Bool(bool),
    Str(Rc<str>),
    List(ListRef),
    Dict(DictRef),
    None,
    Range { start: i64, stop: i64, step: i64 },
    Function(Rc<FunctionObject>),
    BoundMethod(Rc<BoundMethod>),
    Class(Rc<ClassObject>),
    Instance(InstanceRef),
    Module(Rc<ModuleObject>),
}

/// A user function together with the frame it was defined in.
pub(crate) struct FunctionObject {
    pub(crate) name: String,
    pub(crate) params: Vec<Param>,
    pub(crate) body: Block,
    pub(crate) env: Environment,
    pub(crate) is_method: bool,
    pub(crate) calls: Cell<usize>,
    pub(crate) specialization: RefCell<Specialization>,
}

impl FunctionObject {
    pub(crate) fn new(
        name: impl Into<String>,
        params: Vec<Param>,
        body: Block,
        env: Environment,
        is_method: bool,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            body,
            env,
            is_method,
            calls: Cell::new(0),
            specialization: RefCell::new(Specialization::Cold),
        }
    }
}

impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionObject")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("is_method", &self.is_method)
            .field("calls", &self.calls.get())
            .finish_non_exhaustive()
    }
}

/// A method looked up through an instance, with the instance as receiver.
#[derive(Debug)]
pub(crate) struct BoundMethod {
    pub(crate) receiver: Value,
    pub(crate) function: Rc<FunctionObject>,
}

impl Value {
    pub(crate) fn str(text: impl Into<Rc<str>>) -> Self {
        Value::Str(text.into())
    }

    pub(crate) fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub(crate) fn dict(dict: DictObject) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    /// Integer view used by arithmetic and indexing; booleans count as 0/1.
    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            Value::Int(_) => "int".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Dict(_) => "dict".to_string(),
            Value::None => "NoneType".to_string(),
            Value::Range { .. } => "range".to_string(),
            Value::Function(_) => "function".to_string(),
            Value::BoundMethod(_) => "method".to_string(),
            Value::Class(_) => "type".to_string(),
            Value::Instance(instance) => instance.borrow().class.name.clone(),
            Value::Module(_) => "module".to_string(),
        }
    }

    pub(crate) fn is_truthy(&self) -> bool {
        match self {
            Value::Int(value) => *value != 0,
            Value::Bool(value) => *value,
            Value::Str(text) => !text.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(dict) => !dict.borrow().is_empty(),
            Value::None => false,
            Value::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
            Value::Function(_)
            | Value::BoundMethod(_)
            | Value::Class(_)
            | Value::Instance(_)
            | Value::Module(_) => true,
        }
    }

    pub(crate) fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::BoundMethod(_) | Value::Class(_)
        )
    }

    /// Text written by `print`.
    pub(crate) fn to_output(&self) -> String {
        match self {
            Value::Str(text) => text.to_string(),
            other => other.repr(),
        }
    }

    /// Text used inside containers and in error messages; strings are quoted.
    pub(crate) fn repr(&self) -> String {
        self.render(&mut Vec::new())
    }

    /// `open` holds the containers currently being rendered; a container
    /// that contains itself renders as `[...]` or `{...}` on the repeat.
    fn render(&self, open: &mut Vec<*const ()>) -> String {
        match self {
            Value::Int(value) => value.to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Str(text) => quote(text),
            Value::List(items) => {
                let id = Rc::as_ptr(items).cast::<()>();
                if open.contains(&id) {
                    return "[...]".to_string();
                }
                open.push(id);
                let rendered = items
                    .borrow()
                    .iter()
                    .map(|item| item.render(open))
                    .collect::<Vec<_>>()
                    .join(", ");
                open.pop();
                format!("[{rendered}]")
            }
            Value::Dict(dict) => {
                let id = Rc::as_ptr(dict).cast::<()>();
                if open.contains(&id) {
                    return "{...}".to_string();
                }
                open.push(id);
                let mut pairs = Vec::new();
                for (key, value) in dict.borrow().entries() {
                    let key = key.render(open);
                    let value = value.render(open);
                    pairs.push(format!("{key}: {value}"));
                }
                open.pop();
                format!("{{{}}}", pairs.join(", "))
            }
            Value::None => "None".to_string(),
            Value::Range { start, stop, step } if *step == 1 => format!("range({start}, {stop})"),
            Value::Range { start, stop, step } => format!("range({start}, {stop}, {step})"),
            Value::Function(function) => format!("<function {}>", function.name),
            Value::BoundMethod(method) => format!(
                "<bound method {}.{}>",
                method.receiver.type_name(),
                method.function.name
            ),
            Value::Class(class) => format!("<class '{}'>", class.name),
            Value::Instance(instance) => format!("<{} object>", instance.borrow().class.name),
            Value::Module(module) => format!("<module '{}'>", module.name),
        }
    }

    /// Runtime check for a `name: annotation` parameter.
    ///
    /// Builtin type names match their value kind exactly; any other name
    /// matches instances of that class or of a class derived from it.
    pub(crate) fn matches_annotation(&self, annotation: &str) -> bool {
        match annotation {
            "int" => matches!(self, Value::Int(_)),
            "bool" => matches!(self, Value::Bool(_)),
            "str" => matches!(self, Value::Str(_)),
            "list" => matches!(self, Value::List(_)),
            "dict" => matches!(self, Value::Dict(_)),
            "None" => matches!(self, Value::None),
            "range" => matches!(self, Value::Range { .. }),
            "function" => matches!(self, Value::Function(_) | Value::BoundMethod(_)),
            class_name => match self {
                Value::Instance(instance) => instance
                    .borrow()
                    .class
                    .ancestors()
                    .any(|class| class.name == class_name),
                _ => false,
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

pub(crate) fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    let (low, high, step) = if step > 0 {
        (i128::from(start), i128::from(stop), i128::from(step))
    } else {
        (i128::from(stop), i128::from(start), -i128::from(step))
    };
    if step == 0 || low >= high {
        return 0;
    }
    i64::try_from((high - low - 1) / step + 1).unwrap_or(i64::MAX)
}

fn quote(text: &str) -> String {
    if text.contains('\'') && !text.contains('"') {
        format!("\"{text}\"")
    } else {
        format!("'{}'", text.replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_scalars_for_print_and_repr() {
        assert_eq!(Value::Int(-3).to_output(), "-3");
        assert_eq!(Value::Bool(true).to_output(), "True");
        assert_eq!(Value::None.to_output(), "None");
        assert_eq!(Value::str("hi").to_output(), "hi");
        assert_eq!(Value::str("hi").repr(), "'hi'");
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
    }

    #[test]
    fn renders_nested_containers() {
        let inner = Value::list(vec![Value::Int(1), Value::str("a")]);
        let outer = Value::list(vec![inner, Value::None, Value::Bool(false)]);
        assert_eq!(outer.to_output(), "[[1, 'a'], None, False]");

        let mut dict = DictObject::default();
        dict.insert(Value::str("k"), Value::Int(1))
            .expect("insert failed");
        dict.insert(Value::Int(2), Value::list(Vec::new()))
            .expect("insert failed");
        assert_eq!(Value::dict(dict).to_output(), "{'k': 1, 2: []}");
    }

    #[test]
    fn self_references_render_as_ellipsis() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.repr(), "[1, [...]]");

        let dict = Value::dict(DictObject::default());
        if let Value::Dict(entries) = &dict {
            entries
                .borrow_mut()
                .insert(Value::str("me"), dict.clone())
                .expect("insert failed");
            entries
                .borrow_mut()
                .insert(Value::str("items"), list.clone())
                .expect("insert failed");
        }
        assert_eq!(dict.repr(), "{'me': {...}, 'items': [1, [...]]}");

        // A value shared twice without a cycle renders in full both times.
        let shared = Value::list(vec![list.clone(), list]);
        assert_eq!(shared.repr(), "[[1, [...]], [1, [...]]]");
    }

    #[test]
    fn renders_ranges() {
        let plain = Value::Range {
            start: 0,
            stop: 3,
            step: 1,
        };
        let stepped = Value::Range {
            start: 5,
            stop: 0,
            step: -2,
        };
        assert_eq!(plain.to_output(), "range(0, 3)");
        assert_eq!(stepped.to_output(), "range(5, 0, -2)");
    }

    #[test]
    fn truthiness_follows_emptiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::list(Vec::new()).is_truthy());
        assert!(Value::list(vec![Value::None]).is_truthy());
        assert!(!Value::dict(DictObject::default()).is_truthy());
        assert!(!Value::None.is_truthy());
        assert!(
            !Value::Range {
                start: 3,
                stop: 3,
                step: 1
            }
            .is_truthy()
        );
    }

    #[test]
    fn range_length_handles_both_directions() {
        assert_eq!(range_len(0, 5, 1), 5);
        assert_eq!(range_len(0, 5, 2), 3);
        assert_eq!(range_len(5, 0, -1), 5);
        assert_eq!(range_len(5, 0, -2), 3);
        assert_eq!(range_len(5, 0, 1), 0);
        assert_eq!(range_len(0, 5, -1), 0);
    }

    #[test]
    fn builtin_annotations_match_by_kind() {
        assert!(Value::Int(1).matches_annotation("int"));
        assert!(!Value::Bool(true).matches_annotation("int"));
        assert!(Value::str("x").matches_annotation("str"));
        assert!(Value::None.matches_annotation("None"));
        assert!(!Value::Int(1).matches_annotation("Point"));
    }
}
