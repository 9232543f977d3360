use std::collections::HashMap;

use super::value::Value;

/// The name bindings of one activation. The whole program shares a single
/// global instance; every function call gets its own snapshot.
#[derive(Default, Clone)]
pub struct Env {
    bindings: HashMap<String, Value>,
}

impl Env {
    pub fn new() -> Env {
        Env::default()
    }

    /// Unbound names silently read as None; callers that need to distinguish
    /// use lookup.
    pub fn get(&self, name: &str) -> Value {
        self.bindings.get(name).cloned().unwrap_or(Value::None)
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Shallow copy: the binding table is duplicated, container values stay
    /// shared by reference.
    pub fn snapshot(&self) -> Env {
        Env {
            bindings: self.bindings.clone(),
        }
    }
}
