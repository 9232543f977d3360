use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use ordered_float::OrderedFloat;

use crate::ast::FunDecl;

use super::callable::Callable;

/// A runtime value. Lists and dicts are shared by reference: mutating one
/// through any binding is visible through every other binding that holds the
/// same container.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Rc<String>),
    Bool(bool),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<HashMap<DictKey, Value>>>),
    /// A host-provided function
    Callable(Rc<dyn Callable>),
    /// A user-defined function: a handle to the definition node, with no
    /// captured environment
    Function(Rc<FunDecl>),
    None,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Rc::new(s.into()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(entries: HashMap<DictKey, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Callable(_) | Value::Function(_) => true,
            Value::None => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Callable(_) => "builtin",
            Value::Function(_) => "function",
            Value::None => "NoneType",
        }
    }

    /// The display form used inside containers and for diagnostics, where
    /// strings keep their quotes.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(l), Value::Int(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l == r,
            // Numbers compare across kinds, 1 == 1.0
            (Value::Int(l), Value::Float(r)) | (Value::Float(r), Value::Int(l)) => {
                *l as f64 == *r
            }
            (Value::Str(l), Value::Str(r)) => l == r,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::List(l), Value::List(r)) => {
                Rc::ptr_eq(l, r) || *l.borrow() == *r.borrow()
            }
            (Value::Tuple(l), Value::Tuple(r)) => l == r,
            (Value::Dict(l), Value::Dict(r)) => {
                Rc::ptr_eq(l, r) || *l.borrow() == *r.borrow()
            }
            (Value::Callable(l), Value::Callable(r)) => Rc::ptr_eq(l, r),
            (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
            (Value::None, Value::None) => true,
            // All other kind mismatches are simply unequal
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write_float(f, *n),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Value::List(items) => {
                let rendered: Vec<String> =
                    items.borrow().iter().map(|item| item.repr()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Tuple(items) => {
                let rendered: Vec<String> = items.iter().map(|item| item.repr()).collect();
                if rendered.len() == 1 {
                    write!(f, "({},)", rendered[0])
                } else {
                    write!(f, "({})", rendered.join(", "))
                }
            }
            Value::Dict(entries) => {
                let rendered: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value.repr()))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Value::Callable(callable) => write!(f, "<native {}>", callable.name()),
            Value::Function(decl) => write!(f, "<fn {}>", decl.name),
            Value::None => f.write_str("None"),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

// Whole floats keep a decimal so they stay distinguishable from ints
fn write_float(f: &mut Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 {
        write!(f, "{:.1}", n)
    } else {
        write!(f, "{}", n)
    }
}

/// The hashable subset of values usable as dict keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DictKey {
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Rc<String>),
    Bool(bool),
    None,
}

impl DictKey {
    pub fn from_value(value: &Value) -> Option<DictKey> {
        match value {
            Value::Int(n) => Some(DictKey::Int(*n)),
            Value::Float(n) => Some(DictKey::Float(OrderedFloat(*n))),
            Value::Str(s) => Some(DictKey::Str(Rc::clone(s))),
            Value::Bool(b) => Some(DictKey::Bool(*b)),
            Value::None => Some(DictKey::None),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DictKey::Int(n) => Value::Int(*n),
            DictKey::Float(OrderedFloat(n)) => Value::Float(*n),
            DictKey::Str(s) => Value::Str(Rc::clone(s)),
            DictKey::Bool(b) => Value::Bool(*b),
            DictKey::None => Value::None,
        }
    }
}

impl Display for DictKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DictKey::Str(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other.to_value()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Int(0).to_bool());
        assert!(Value::Int(-1).to_bool());
        assert!(!Value::string("").to_bool());
        assert!(Value::string("x").to_bool());
        assert!(!Value::list(vec![]).to_bool());
        assert!(Value::list(vec![Value::None]).to_bool());
        assert!(!Value::None.to_bool());
    }

    #[test]
    fn numbers_compare_across_kinds() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Float(1.5));
        assert_ne!(Value::Int(0), Value::None);
    }

    #[test]
    fn lists_compare_deeply() {
        let a = Value::list(vec![Value::Int(1), Value::string("x")]);
        let b = Value::list(vec![Value::Int(1), Value::string("x")]);
        assert_eq!(a, b);
    }

    #[test]
    fn float_display_keeps_decimal() {
        assert_eq!("5.0", Value::Float(5.0).to_string());
        assert_eq!("2.5", Value::Float(2.5).to_string());
        assert_eq!("3", Value::Int(3).to_string());
    }

    #[test]
    fn container_display() {
        let list = Value::list(vec![Value::Int(1), Value::string("a")]);
        assert_eq!("[1, 'a']", list.to_string());
        let tuple = Value::tuple(vec![Value::Int(1)]);
        assert_eq!("(1,)", tuple.to_string());
        let mut entries = HashMap::new();
        entries.insert(DictKey::Str(Rc::new("key".to_string())), Value::string("value"));
        assert_eq!("{'key': 'value'}", Value::dict(entries).to_string());
    }
}
