mod builtin;
mod callable;
mod env;
mod interpreter;
mod ops;
mod value;

pub use builtin::populate_builtin;
pub use callable::{BoundMethod, BuiltinFunc, Callable};
pub use env::Env;
pub use interpreter::{Diagnostic, Interpreter, RuntimeError};
pub use value::{DictKey, Value};

pub fn stock_interpreter() -> Interpreter {
    let mut global_env = Env::new();
    populate_builtin(&mut global_env);
    Interpreter::new_with_global(global_env)
}
