use std::collections::HashMap;
use std::rc::Rc;

use super::callable::{BoundMethod, BuiltinFunc};
use super::env::Env;
use super::interpreter::{iter_elements, Interpreter, RuntimeError};
use super::ops;
use super::value::{DictKey, Value};
use crate::ast::{BinOp, CmpOp};

/// Install the host bindings a fresh session starts with.
pub fn populate_builtin(global_env: &mut Env) {
    global_env.bind("print", builtin("print", print_impl));
    global_env.bind("len", builtin("len", len_impl));
    global_env.bind("str", builtin("str", str_impl));
    global_env.bind("int", builtin("int", int_impl));
    global_env.bind("float", builtin("float", float_impl));
    global_env.bind("bool", builtin("bool", bool_impl));
    global_env.bind("list", builtin("list", list_impl));
    global_env.bind("tuple", builtin("tuple", tuple_impl));
    global_env.bind("dict", builtin("dict", dict_impl));
    global_env.bind("range", builtin("range", range_impl));
    global_env.bind("sum", builtin("sum", sum_impl));
    global_env.bind("min", builtin("min", min_impl));
    global_env.bind("max", builtin("max", max_impl));
    // The variadic arithmetic helpers under their own names
    global_env.bind("add", builtin("add", add_impl));
    global_env.bind("sub", builtin("sub", sub_impl));
    global_env.bind("mul", builtin("mul", mul_impl));
    global_env.bind("div", builtin("div", div_impl));
    global_env.bind("math", math_namespace());
}

fn builtin(
    name: &'static str,
    call: fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>,
) -> Value {
    Value::Callable(Rc::new(BuiltinFunc { name, call }))
}

fn bound(
    name: &'static str,
    receiver: &Value,
    method: fn(&Value, Vec<Value>) -> Result<Value, RuntimeError>,
) -> Value {
    Value::Callable(Rc::new(BoundMethod {
        name,
        receiver: receiver.clone(),
        method,
    }))
}

fn key(name: &str) -> DictKey {
    DictKey::Str(Rc::new(name.to_string()))
}

fn exactly_one<'a>(name: &'static str, args: &'a [Value]) -> Result<&'a Value, RuntimeError> {
    if args.len() == 1 {
        Ok(&args[0])
    } else {
        Err(RuntimeError::Arity {
            name,
            required: "exactly 1 argument",
            got: args.len(),
        })
    }
}

/// Attribute access: methods on the container kinds, and for dicts a fall
/// back to the entries themselves, which is how namespaces like math work.
pub fn attribute(object: &Value, attr: &str) -> Result<Value, RuntimeError> {
    match object {
        Value::List(_) => match attr {
            "append" => Ok(bound("append", object, list_append)),
            "extend" => Ok(bound("extend", object, list_extend)),
            "pop" => Ok(bound("pop", object, list_pop)),
            _ => Err(no_attribute(object, attr)),
        },
        Value::Dict(entries) => {
            match attr {
                "get" => return Ok(bound("get", object, dict_get)),
                "keys" => return Ok(bound("keys", object, dict_keys)),
                "values" => return Ok(bound("values", object, dict_values)),
                _ => {}
            }
            if let Some(value) = entries.borrow().get(&key(attr)) {
                return Ok(value.clone());
            }
            Err(no_attribute(object, attr))
        }
        Value::Str(_) => match attr {
            "upper" => Ok(bound("upper", object, str_upper)),
            "lower" => Ok(bound("lower", object, str_lower)),
            "strip" => Ok(bound("strip", object, str_strip)),
            "split" => Ok(bound("split", object, str_split)),
            _ => Err(no_attribute(object, attr)),
        },
        other => Err(no_attribute(other, attr)),
    }
}

fn no_attribute(object: &Value, attr: &str) -> RuntimeError {
    RuntimeError::NoAttribute(object.type_name(), attr.to_string())
}

fn print_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let rendered: Vec<String> = args.iter().map(|value| value.to_string()).collect();
    println!("{}", rendered.join(" "));
    Ok(Value::None)
}

fn len_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let value = exactly_one("len", &args)?;
    let length = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(entries) => entries.borrow().len(),
        other => {
            return Err(RuntimeError::Host(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(length as i64))
}

fn str_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.as_slice() {
        [] => Ok(Value::string("")),
        [value] => Ok(Value::string(value.to_string())),
        _ => Err(RuntimeError::Arity {
            name: "str",
            required: "at most 1 argument",
            got: args.len(),
        }),
    }
}

fn int_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let value = exactly_one("int", &args)?;
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(n) => Ok(Value::Int(*n as i64)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::Host(format!("invalid literal for int(): '{}'", s))
        }),
        other => Err(RuntimeError::Host(format!(
            "cannot convert '{}' to int",
            other.type_name()
        ))),
    }
}

fn float_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let value = exactly_one("float", &args)?;
    match value {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(n) => Ok(Value::Float(*n)),
        Value::Bool(b) => Ok(Value::Float(*b as i64 as f64)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            RuntimeError::Host(format!("invalid literal for float(): '{}'", s))
        }),
        other => Err(RuntimeError::Host(format!(
            "cannot convert '{}' to float",
            other.type_name()
        ))),
    }
}

fn bool_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.as_slice() {
        [] => Ok(Value::Bool(false)),
        [value] => Ok(Value::Bool(value.to_bool())),
        _ => Err(RuntimeError::Arity {
            name: "bool",
            required: "at most 1 argument",
            got: args.len(),
        }),
    }
}

fn list_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.as_slice() {
        [] => Ok(Value::list(Vec::new())),
        [value] => Ok(Value::list(iter_elements(value)?)),
        _ => Err(RuntimeError::Arity {
            name: "list",
            required: "at most 1 argument",
            got: args.len(),
        }),
    }
}

fn tuple_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.as_slice() {
        [] => Ok(Value::tuple(Vec::new())),
        [value] => Ok(Value::tuple(iter_elements(value)?)),
        _ => Err(RuntimeError::Arity {
            name: "tuple",
            required: "at most 1 argument",
            got: args.len(),
        }),
    }
}

fn dict_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.as_slice() {
        [] => Ok(Value::dict(HashMap::new())),
        [Value::Dict(entries)] => Ok(Value::dict(entries.borrow().clone())),
        [other] => Err(RuntimeError::Host(format!(
            "cannot convert '{}' to dict",
            other.type_name()
        ))),
        _ => Err(RuntimeError::Arity {
            name: "dict",
            required: "at most 1 argument",
            got: args.len(),
        }),
    }
}

fn int_arg(name: &'static str, value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(*b as i64),
        other => Err(RuntimeError::Host(format!(
            "{} expects an integer, got '{}'",
            name,
            other.type_name()
        ))),
    }
}

fn range_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let (start, stop, step) = match args.as_slice() {
        [stop] => (0, int_arg("range", stop)?, 1),
        [start, stop] => (int_arg("range", start)?, int_arg("range", stop)?, 1),
        [start, stop, step] => (
            int_arg("range", start)?,
            int_arg("range", stop)?,
            int_arg("range", step)?,
        ),
        _ => {
            return Err(RuntimeError::Arity {
                name: "range",
                required: "1 to 3 arguments",
                got: args.len(),
            })
        }
    };
    if step == 0 {
        return Err(RuntimeError::Host("range() step must not be zero".to_string()));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        current += step;
    }
    Ok(Value::list(items))
}

fn sum_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let (iterable, start) = match args.as_slice() {
        [iterable] => (iterable, Value::Int(0)),
        [iterable, start] => (iterable, start.clone()),
        _ => {
            return Err(RuntimeError::Arity {
                name: "sum",
                required: "1 or 2 arguments",
                got: args.len(),
            })
        }
    };
    let mut acc = start;
    for element in iter_elements(iterable)? {
        acc = ops::binary(BinOp::Add, &acc, &element)?;
    }
    Ok(acc)
}

fn min_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    extremum("min", CmpOp::Lt, args)
}

fn max_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    extremum("max", CmpOp::Gt, args)
}

fn extremum(name: &'static str, op: CmpOp, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let candidates = match args.as_slice() {
        [] => {
            return Err(RuntimeError::Arity {
                name,
                required: "at least 1 argument",
                got: 0,
            })
        }
        [iterable] => iter_elements(iterable)?,
        _ => args,
    };
    let mut candidates = candidates.into_iter();
    let Some(mut best) = candidates.next() else {
        return Err(RuntimeError::Host(format!("{}() arg is an empty sequence", name)));
    };
    for candidate in candidates {
        if ops::compare(op, &candidate, &best)?.to_bool() {
            best = candidate;
        }
    }
    Ok(best)
}

fn add_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    ops::fold_add(&args)
}

fn sub_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    ops::fold_sub(&args)
}

fn mul_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    ops::fold_mul(&args)
}

fn div_impl(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    ops::fold_div(&args)
}

// The math namespace is an ordinary dict resolved through attribute access
fn math_namespace() -> Value {
    let mut entries = HashMap::new();
    entries.insert(key("pi"), Value::Float(std::f64::consts::PI));
    entries.insert(key("e"), Value::Float(std::f64::consts::E));
    entries.insert(key("tau"), Value::Float(std::f64::consts::TAU));
    entries.insert(key("sqrt"), builtin("sqrt", math_sqrt));
    entries.insert(key("floor"), builtin("floor", math_floor));
    entries.insert(key("ceil"), builtin("ceil", math_ceil));
    Value::dict(entries)
}

fn float_arg(name: &'static str, value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        Value::Bool(b) => Ok(*b as i64 as f64),
        other => Err(RuntimeError::Host(format!(
            "{} expects a number, got '{}'",
            name,
            other.type_name()
        ))),
    }
}

fn math_sqrt(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let n = float_arg("sqrt", exactly_one("sqrt", &args)?)?;
    if n < 0.0 {
        return Err(RuntimeError::Host("math domain error".to_string()));
    }
    Ok(Value::Float(n.sqrt()))
}

fn math_floor(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let n = float_arg("floor", exactly_one("floor", &args)?)?;
    Ok(Value::Int(n.floor() as i64))
}

fn math_ceil(_interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let n = float_arg("ceil", exactly_one("ceil", &args)?)?;
    Ok(Value::Int(n.ceil() as i64))
}

fn list_append(receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let value = exactly_one("append", &args)?.clone();
    let Value::List(items) = receiver else {
        return Err(RuntimeError::Host("append expects a list receiver".to_string()));
    };
    items.borrow_mut().push(value);
    Ok(Value::None)
}

fn list_extend(receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let additions = iter_elements(exactly_one("extend", &args)?)?;
    let Value::List(items) = receiver else {
        return Err(RuntimeError::Host("extend expects a list receiver".to_string()));
    };
    items.borrow_mut().extend(additions);
    Ok(Value::None)
}

fn list_pop(receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let Value::List(items) = receiver else {
        return Err(RuntimeError::Host("pop expects a list receiver".to_string()));
    };
    let mut items = items.borrow_mut();
    match args.as_slice() {
        [] => items
            .pop()
            .ok_or_else(|| RuntimeError::Host("pop from empty list".to_string())),
        [index] => {
            let raw = int_arg("pop", index)?;
            let len = items.len() as i64;
            let at = if raw < 0 { raw + len } else { raw };
            if at < 0 || at >= len {
                Err(RuntimeError::IndexOutOfRange("list"))
            } else {
                Ok(items.remove(at as usize))
            }
        }
        _ => Err(RuntimeError::Arity {
            name: "pop",
            required: "at most 1 argument",
            got: args.len(),
        }),
    }
}

fn dict_get(receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let Value::Dict(entries) = receiver else {
        return Err(RuntimeError::Host("get expects a dict receiver".to_string()));
    };
    let (lookup, default) = match args.as_slice() {
        [lookup] => (lookup, Value::None),
        [lookup, default] => (lookup, default.clone()),
        _ => {
            return Err(RuntimeError::Arity {
                name: "get",
                required: "1 or 2 arguments",
                got: args.len(),
            })
        }
    };
    let Some(key) = DictKey::from_value(lookup) else {
        return Err(RuntimeError::Unhashable(lookup.type_name()));
    };
    Ok(entries.borrow().get(&key).cloned().unwrap_or(default))
}

fn dict_keys(receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    let Value::Dict(entries) = receiver else {
        return Err(RuntimeError::Host("keys expects a dict receiver".to_string()));
    };
    Ok(Value::list(
        entries.borrow().keys().map(DictKey::to_value).collect(),
    ))
}

fn dict_values(receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    let Value::Dict(entries) = receiver else {
        return Err(RuntimeError::Host("values expects a dict receiver".to_string()));
    };
    Ok(Value::list(entries.borrow().values().cloned().collect()))
}

fn str_receiver<'a>(name: &'static str, receiver: &'a Value) -> Result<&'a str, RuntimeError> {
    match receiver {
        Value::Str(s) => Ok(s),
        _ => Err(RuntimeError::Host(format!("{} expects a string receiver", name))),
    }
}

fn str_upper(receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::string(str_receiver("upper", receiver)?.to_uppercase()))
}

fn str_lower(receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::string(str_receiver("lower", receiver)?.to_lowercase()))
}

fn str_strip(receiver: &Value, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::string(str_receiver("strip", receiver)?.trim()))
}

fn str_split(receiver: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let text = str_receiver("split", receiver)?;
    let parts: Vec<Value> = match args.as_slice() {
        [] => text.split_whitespace().map(Value::string).collect(),
        [Value::Str(sep)] => text.split(sep.as_str()).map(Value::string).collect(),
        [other] => {
            return Err(RuntimeError::Host(format!(
                "split separator must be a string, got '{}'",
                other.type_name()
            )))
        }
        _ => {
            return Err(RuntimeError::Arity {
                name: "split",
                required: "at most 1 argument",
                got: args.len(),
            })
        }
    };
    Ok(Value::list(parts))
}
