use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use super::class::ClassObject;
use super::error::InterpreterError;
use super::value::{FunctionObject, Value};

/// What created a scope. Functions defined directly in a `Class` scope become
/// methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Module,
    Function,
    Class,
}

struct Scope {
    kind: ScopeKind,
    variables: HashMap<String, Value>,
    functions: HashMap<String, Rc<FunctionObject>>,
    classes: HashMap<String, Rc<ClassObject>>,
    nonlocals: HashSet<String>,
    parent: Option<Environment>,
}

/// Shared handle to one frame of the scope chain.
///
/// Cloning the handle shares the frame; closures keep their defining frame
/// alive by holding one.
#[derive(Clone)]
pub(crate) struct Environment(Rc<RefCell<Scope>>);

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.0.borrow();
        let mut names: Vec<_> = scope.variables.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("kind", &scope.kind)
            .field("variables", &names)
            .field("has_parent", &scope.parent.is_some())
            .finish()
    }
}

impl Environment {
    pub(crate) fn new(kind: ScopeKind) -> Self {
        Self::with_parent(kind, None)
    }

    pub(crate) fn child(&self, kind: ScopeKind) -> Self {
        Self::with_parent(kind, Some(self.clone()))
    }

    fn with_parent(kind: ScopeKind, parent: Option<Environment>) -> Self {
        Self(Rc::new(RefCell::new(Scope {
            kind,
            variables: HashMap::new(),
            functions: HashMap::new(),
            classes: HashMap::new(),
            nonlocals: HashSet::new(),
            parent,
        })))
    }

    pub(crate) fn kind(&self) -> ScopeKind {
        self.0.borrow().kind
    }

    fn find<T>(&self, mut probe: impl FnMut(&Environment, &Scope) -> Option<T>) -> Option<T> {
        let mut current = Some(self.clone());
        while let Some(environment) = current {
            let scope = environment.0.borrow();
            if let Some(found) = probe(&environment, &scope) {
                return Some(found);
            }
            current = scope.parent.clone();
        }
        None
    }

    pub(crate) fn lookup_variable(&self, name: &str) -> Option<Value> {
        self.find(|_, scope| scope.variables.get(name).cloned())
    }

    pub(crate) fn lookup_function(&self, name: &str) -> Option<Rc<FunctionObject>> {
        self.find(|_, scope| scope.functions.get(name).cloned())
    }

    pub(crate) fn lookup_class(&self, name: &str) -> Option<Rc<ClassObject>> {
        self.find(|_, scope| scope.classes.get(name).cloned())
    }

    pub(crate) fn local_variable(&self, name: &str) -> Option<Value> {
        self.0.borrow().variables.get(name).cloned()
    }

    pub(crate) fn local_function(&self, name: &str) -> Option<Rc<FunctionObject>> {
        self.0.borrow().functions.get(name).cloned()
    }

    pub(crate) fn local_class(&self, name: &str) -> Option<Rc<ClassObject>> {
        self.0.borrow().classes.get(name).cloned()
    }

    /// Binds `name` in this frame, ignoring any `nonlocal` declaration.
    pub(crate) fn define_variable(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().variables.insert(name.into(), value);
    }

    pub(crate) fn define_function(&self, function: Rc<FunctionObject>) {
        self.0
            .borrow_mut()
            .functions
            .insert(function.name.clone(), function);
    }

    pub(crate) fn define_class(&self, class: Rc<ClassObject>) {
        self.0.borrow_mut().classes.insert(class.name.clone(), class);
    }

    pub(crate) fn declare_nonlocal(&self, name: impl Into<String>) {
        self.0.borrow_mut().nonlocals.insert(name.into());
    }

    /// Assignment statement semantics.
    ///
    /// A name declared `nonlocal` here rebinds the nearest enclosing frame
    /// whose variable table already holds it; it never creates a binding.
    /// Every other name is bound in this frame.
    pub(crate) fn assign(&self, name: &str, value: Value) -> Result<(), InterpreterError> {
        let (is_nonlocal, parent) = {
            let scope = self.0.borrow();
            (scope.nonlocals.contains(name), scope.parent.clone())
        };
        if !is_nonlocal {
            self.define_variable(name, value);
            return Ok(());
        }

        let owner = parent.and_then(|parent| {
            parent.find(|environment, scope| {
                scope
                    .variables
                    .contains_key(name)
                    .then(|| environment.clone())
            })
        });
        match owner {
            Some(owner) => {
                owner.define_variable(name, value);
                Ok(())
            }
            None => Err(InterpreterError::NonlocalNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Variables bound directly in this frame, sorted by name.
    pub(crate) fn local_variables(&self) -> Vec<(String, Value)> {
        let mut variables: Vec<_> = self
            .0
            .borrow()
            .variables
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        variables.sort_by(|left, right| left.0.cmp(&right.0));
        variables
    }

    pub(crate) fn local_functions(&self) -> Vec<Rc<FunctionObject>> {
        self.0.borrow().functions.values().cloned().collect()
    }

    pub(crate) fn local_classes(&self) -> Vec<Rc<ClassObject>> {
        self.0.borrow().classes.values().cloned().collect()
    }
}
