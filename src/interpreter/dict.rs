use std::collections::HashMap;
use std::rc::Rc;

use super::error::InterpreterError;
use super::value::Value;

/// Hashable projection of a dictionary key. Booleans share the integer
/// slots, so `True` and `1` name the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DictKey {
    Int(i64),
    Str(Rc<str>),
    None,
}

impl DictKey {
    fn from_value(value: &Value) -> Result<Self, InterpreterError> {
        match value {
            Value::Int(number) => Ok(DictKey::Int(*number)),
            Value::Bool(flag) => Ok(DictKey::Int(i64::from(*flag))),
            Value::Str(text) => Ok(DictKey::Str(text.clone())),
            Value::None => Ok(DictKey::None),
            other => Err(InterpreterError::UnhashableKey {
                type_name: other.type_name(),
            }),
        }
    }
}

/// Insertion-ordered mapping.
#[derive(Debug, Default)]
pub(crate) struct DictObject {
    entries: Vec<(Value, Value)>,
    slots: HashMap<DictKey, usize>,
}

impl DictObject {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwriting an existing key keeps its original position.
    pub(crate) fn insert(&mut self, key: Value, value: Value) -> Result<(), InterpreterError> {
        let slot_key = DictKey::from_value(&key)?;
        match self.slots.get(&slot_key) {
            Some(&slot) => self.entries[slot].1 = value,
            None => {
                self.slots.insert(slot_key, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub(crate) fn get(&self, key: &Value) -> Result<Option<Value>, InterpreterError> {
        let slot_key = DictKey::from_value(key)?;
        Ok(self
            .slots
            .get(&slot_key)
            .map(|&slot| self.entries[slot].1.clone()))
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub(crate) fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    pub(crate) fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, value)| value.clone()).collect()
    }
}
