use super::interpreter::{Interpreter, RuntimeError};
use super::value::Value;

pub trait Callable {
    fn name(&self) -> &str;
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError>;
}

/// A host function installed into the environment. Most of the bindings are
/// variadic, so each implementation checks its own arguments.
pub struct BuiltinFunc {
    pub name: &'static str,
    pub call: fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>,
}

impl Callable for BuiltinFunc {
    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        (self.call)(interpreter, args)
    }
}

/// A method reached through attribute access, carrying the receiver it was
/// looked up on.
pub struct BoundMethod {
    pub name: &'static str,
    pub receiver: Value,
    pub method: fn(&Value, Vec<Value>) -> Result<Value, RuntimeError>,
}

impl Callable for BoundMethod {
    fn name(&self) -> &str {
        self.name
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        (self.method)(&self.receiver, args)
    }
}
