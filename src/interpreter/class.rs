use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::iter;
use std::rc::Rc;

use super::error::InterpreterError;
use super::value::{BoundMethod, FunctionObject, InstanceRef, Value};

/// A class: its own methods and attribute defaults plus an optional base.
pub(crate) struct ClassObject {
    pub(crate) name: String,
    pub(crate) methods: HashMap<String, Rc<FunctionObject>>,
    pub(crate) attributes: RefCell<HashMap<String, Value>>,
    pub(crate) base: Option<Rc<ClassObject>>,
}

impl ClassObject {
    pub(crate) fn new(
        name: impl Into<String>,
        methods: HashMap<String, Rc<FunctionObject>>,
        attributes: HashMap<String, Value>,
        base: Option<Rc<ClassObject>>,
    ) -> Self {
        Self {
            name: name.into(),
            methods,
            attributes: RefCell::new(attributes),
            base,
        }
    }

    /// This class followed by each base, most derived first.
    pub(crate) fn ancestors(&self) -> impl Iterator<Item = &ClassObject> {
        iter::successors(Some(self), |class| class.base.as_deref())
    }

    pub(crate) fn find_method(&self, name: &str) -> Option<Rc<FunctionObject>> {
        self.ancestors()
            .find_map(|class| class.methods.get(name).cloned())
    }

    pub(crate) fn find_attribute(&self, name: &str) -> Option<Value> {
        self.ancestors()
            .find_map(|class| class.attributes.borrow().get(name).cloned())
    }

    pub(crate) fn set_attribute(&self, name: impl Into<String>, value: Value) {
        self.attributes.borrow_mut().insert(name.into(), value);
    }

    /// Attribute defaults of the whole chain; derived classes override bases.
    pub(crate) fn field_defaults(&self) -> HashMap<String, Value> {
        let chain: Vec<&ClassObject> = self.ancestors().collect();
        let mut fields = HashMap::new();
        for class in chain.into_iter().rev() {
            for (name, value) in class.attributes.borrow().iter() {
                fields.insert(name.clone(), value.clone());
            }
        }
        fields
    }

    /// `Class.name`: attribute defaults, then methods as plain functions.
    pub(crate) fn get_attribute(&self, name: &str) -> Result<Value, InterpreterError> {
        if let Some(value) = self.find_attribute(name) {
            return Ok(value);
        }
        if let Some(method) = self.find_method(name) {
            return Ok(Value::Function(method));
        }
        Err(InterpreterError::UnknownAttribute {
            attribute: name.to_string(),
            type_name: self.name.clone(),
        })
    }
}

impl fmt::Debug for ClassObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("ClassObject")
            .field("name", &self.name)
            .field("methods", &methods)
            .field("base", &self.base.as_ref().map(|base| base.name.as_str()))
            .finish()
    }
}

#[derive(Debug)]
pub(crate) struct InstanceObject {
    pub(crate) class: Rc<ClassObject>,
    pub(crate) fields: HashMap<String, Value>,
}

impl InstanceObject {
    /// Fresh instance with the class chain's attribute defaults copied in.
    pub(crate) fn new(class: Rc<ClassObject>) -> Self {
        let fields = class.field_defaults();
        Self { class, fields }
    }
}

/// `instance.name`: own fields, then class attribute defaults, then methods
/// bound to the instance.
pub(crate) fn instance_attribute(
    instance: &InstanceRef,
    name: &str,
) -> Result<Value, InterpreterError> {
    let class = {
        let object = instance.borrow();
        if let Some(value) = object.fields.get(name) {
            return Ok(value.clone());
        }
        object.class.clone()
    };
    if let Some(value) = class.find_attribute(name) {
        return Ok(value);
    }
    if let Some(function) = class.find_method(name) {
        return Ok(Value::BoundMethod(Rc::new(BoundMethod {
            receiver: Value::Instance(instance.clone()),
            function,
        })));
    }
    Err(InterpreterError::UnknownAttribute {
        attribute: name.to_string(),
        type_name: class.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::{Environment, ScopeKind};

    fn method(name: &str) -> Rc<FunctionObject> {
        Rc::new(FunctionObject::new(
            name,
            Vec::new(),
            Rc::from(Vec::new()),
            Environment::new(ScopeKind::Class),
            true,
        ))
    }

    fn class(
        name: &str,
        methods: &[&str],
        attributes: &[(&str, i64)],
        base: Option<Rc<ClassObject>>,
    ) -> Rc<ClassObject> {
        Rc::new(ClassObject::new(
            name,
            methods
                .iter()
                .map(|name| (name.to_string(), method(name)))
                .collect(),
            attributes
                .iter()
                .map(|(name, value)| (name.to_string(), Value::Int(*value)))
                .collect(),
            base,
        ))
    }

    #[test]
    fn derived_methods_override_base_methods() {
        let base = class("Base", &["greet", "hello"], &[], None);
        let derived = class("Derived", &["greet"], &[], Some(base.clone()));

        let greet = derived.find_method("greet").expect("missing greet");
        assert!(Rc::ptr_eq(&greet, &derived.methods["greet"]));
        let hello = derived.find_method("hello").expect("missing hello");
        assert!(Rc::ptr_eq(&hello, &base.methods["hello"]));
        assert!(derived.find_method("missing").is_none());
    }

    #[test]
    fn field_defaults_copy_the_whole_chain() {
        let base = class("Base", &[], &[("x", 1), ("y", 2)], None);
        let derived = class("Derived", &[], &[("y", 20)], Some(base));

        let instance = InstanceObject::new(derived);
        assert!(matches!(instance.fields.get("x"), Some(Value::Int(1))));
        assert!(matches!(instance.fields.get("y"), Some(Value::Int(20))));
    }

    #[test]
    fn instance_fields_shadow_class_defaults() {
        let point = class("Point", &["norm"], &[("x", 0)], None);
        let instance = Rc::new(RefCell::new(InstanceObject::new(point.clone())));
        instance
            .borrow_mut()
            .fields
            .insert("x".to_string(), Value::Int(5));

        assert!(matches!(
            instance_attribute(&instance, "x"),
            Ok(Value::Int(5))
        ));
        assert!(matches!(point.find_attribute("x"), Some(Value::Int(0))));
        assert!(matches!(
            instance_attribute(&instance, "norm"),
            Ok(Value::BoundMethod(_))
        ));
        assert_eq!(
            instance_attribute(&instance, "z").expect_err("expected missing attribute"),
            InterpreterError::UnknownAttribute {
                attribute: "z".to_string(),
                type_name: "Point".to_string(),
            }
        );
    }

    #[test]
    fn class_attribute_reads_return_unbound_methods() {
        let base = class("Base", &["greet"], &[("kind", 1)], None);
        assert!(matches!(base.get_attribute("kind"), Ok(Value::Int(1))));
        assert!(matches!(
            base.get_attribute("greet"),
            Ok(Value::Function(function)) if function.name == "greet"
        ));
        assert_eq!(base.ancestors().count(), 1);
    }
}
