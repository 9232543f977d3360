use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{BinOp, Expr, ExprInner, FunDecl, Literal, Program, Stmt, StmtInner, UnaryOp};
use crate::scanner::Pos;

use super::builtin;
use super::env::Env;
use super::ops;
use super::value::{DictKey, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("unsupported operand types for {op}: '{lhs}' and '{rhs}'")]
    InvalidOperands {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("bad operand type for unary {op}: '{operand}'")]
    InvalidUnaryOperand {
        op: &'static str,
        operand: &'static str,
    },
    #[error("'{0}' object is not callable")]
    NotCallable(&'static str),
    #[error("'{0}' cannot be evaluated here")]
    UnsupportedNode(&'static str),
    #[error("cannot assign to {0}")]
    UnsupportedTarget(&'static str),
    #[error("{name}() takes {required}, got {got}")]
    Arity {
        name: &'static str,
        required: &'static str,
        got: usize,
    },
    #[error("'{0}' object is not subscriptable")]
    NotSubscriptable(&'static str),
    #[error("{0} index out of range")]
    IndexOutOfRange(&'static str),
    #[error("indices must be integers, not '{0}'")]
    InvalidIndex(&'static str),
    #[error("key not found: {0}")]
    MissingKey(String),
    #[error("unhashable type: '{0}'")]
    Unhashable(&'static str),
    #[error("'{0}' object has no attribute '{1}'")]
    NoAttribute(&'static str, String),
    #[error("'{0}' object is not iterable")]
    NotIterable(&'static str),
    #[error("'{0}' object does not support item assignment")]
    NotMutable(&'static str),
    #[error("{0}")]
    Host(String),
}

/// A runtime failure with the position of the node it was isolated at.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub pos: Pos,
    pub error: RuntimeError,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "runtime error at {}: {}", self.pos, self.error)
    }
}

/// Tree-walking evaluator. Failures never travel: whatever goes wrong while
/// a node is evaluated is recorded as a diagnostic right there and the node
/// reads as None to its surroundings. The only early exit in the whole
/// machine is execute_block's handling of a direct return statement.
pub struct Interpreter {
    env: Env,
    diagnostics: Vec<Diagnostic>,
}

impl Interpreter {
    pub fn new_with_global(env: Env) -> Interpreter {
        Interpreter {
            env,
            diagnostics: Vec::new(),
        }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Run a whole program against the session environment and yield the
    /// value of its last statement.
    pub fn interpret(&mut self, program: &Program) -> Value {
        self.execute_block(&program.0)
    }

    fn report(&mut self, pos: Pos, error: RuntimeError) {
        self.diagnostics.push(Diagnostic { pos, error });
    }

    fn execute(&mut self, stmt: &Stmt) -> Value {
        match self.try_execute(stmt) {
            Ok(value) => value,
            Err(error) => {
                self.report(stmt.pos, error);
                Value::None
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> Value {
        match self.try_eval(expr) {
            Ok(value) => value,
            Err(error) => {
                self.report(expr.pos, error);
                Value::None
            }
        }
    }

    /// Statements strictly in order. Only a return that is a direct element
    /// of this list stops it; a return buried inside a nested if or loop
    /// merely becomes that construct's value and execution moves on. The
    /// value of the block is the value of the last statement executed.
    fn execute_block(&mut self, stmts: &[Stmt]) -> Value {
        let mut result = Value::None;
        for stmt in stmts {
            result = self.execute(stmt);
            if matches!(stmt.inner, StmtInner::Return(_)) {
                return result;
            }
        }
        result
    }

    fn try_execute(&mut self, stmt: &Stmt) -> Result<Value, RuntimeError> {
        match &stmt.inner {
            StmtInner::Expr(expr) => Ok(self.eval(expr)),
            StmtInner::Assign { targets, value } => {
                let value = self.eval(value);
                for target in targets {
                    self.assign_value(target, value.clone())?;
                }
                Ok(value)
            }
            StmtInner::AugAssign { target, op, value } => {
                self.augmented_assign(target, *op, value)
            }
            StmtInner::If {
                test,
                then,
                or_else,
            } => {
                if self.eval(test).to_bool() {
                    Ok(self.execute_block(then))
                } else if let Some(or_else) = or_else {
                    Ok(self.execute_block(or_else))
                } else {
                    Ok(Value::None)
                }
            }
            StmtInner::While { test, body } => {
                while self.eval(test).to_bool() {
                    self.execute_block(body);
                }
                Ok(Value::None)
            }
            StmtInner::For { target, iter, body } => {
                let iterable = self.eval(iter);
                // Iterate a snapshot of the elements so the body can mutate
                // the container it is walking
                for element in iter_elements(&iterable)? {
                    self.env.bind(target.clone(), element);
                    self.execute_block(body);
                }
                Ok(Value::None)
            }
            StmtInner::FunctionDef(decl) => {
                // The handle lands in the current environment; nothing is
                // captured beyond the reference to the definition itself
                self.env
                    .bind(decl.name.clone(), Value::Function(Rc::clone(decl)));
                Ok(Value::None)
            }
            StmtInner::Return(value) => Ok(match value {
                Some(expr) => self.eval(expr),
                Option::None => Value::None,
            }),
        }
    }

    fn try_eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.inner {
            ExprInner::Literal(literal) => Ok(literal_value(literal)),
            ExprInner::Name(name) => Ok(self.env.get(name)),
            ExprInner::Unary { op, operand } => {
                let value = self.eval(operand);
                match op {
                    UnaryOp::Neg => ops::negate(&value),
                    UnaryOp::Pos => ops::unary_plus(&value),
                    UnaryOp::Not => Ok(Value::Bool(!value.to_bool())),
                }
            }
            ExprInner::Binary { left, op, right } => {
                let lhs = self.eval(left);
                let rhs = self.eval(right);
                ops::binary(*op, &lhs, &rhs)
            }
            ExprInner::Bool { op, values } => {
                // Every operand is evaluated up front, left to right; the
                // fold only happens afterwards, so and/or never skip an
                // operand the way short-circuit operators would
                let evaluated: Vec<Value> = values.iter().map(|v| self.eval(v)).collect();
                let mut operands = evaluated.into_iter();
                let first = operands.next().unwrap_or(Value::None);
                Ok(operands.fold(first, |acc, next| ops::logical(*op, acc, next)))
            }
            ExprInner::Compare { left, comparators } => {
                let mut running = self.eval(left);
                for (op, right) in comparators {
                    let right_value = self.eval(right);
                    if !ops::compare(*op, &running, &right_value)?.to_bool() {
                        return Ok(Value::Bool(false));
                    }
                    // The comparand is evaluated a second time to advance the
                    // chain, so its side effects happen twice; this mirrors
                    // the behavior the language has always had
                    running = self.eval(right);
                }
                Ok(Value::Bool(true))
            }
            ExprInner::Attribute { object, attr } => {
                let object = self.eval(object);
                builtin::attribute(&object, attr)
            }
            ExprInner::Call { callee, arguments } => {
                let callee_value = self.eval(callee);
                let args: Vec<Value> = arguments.iter().map(|arg| self.eval(arg)).collect();
                match callee_value {
                    Value::Callable(callable) => callable.call(self, args),
                    Value::Function(decl) => Ok(self.call_function(&decl, args)),
                    other => Err(RuntimeError::NotCallable(other.type_name())),
                }
            }
            ExprInner::List(items) => {
                let values: Vec<Value> = items.iter().map(|item| self.eval(item)).collect();
                Ok(Value::list(values))
            }
            ExprInner::Tuple(items) => {
                let values: Vec<Value> = items.iter().map(|item| self.eval(item)).collect();
                Ok(Value::tuple(values))
            }
            ExprInner::Dict(items) => {
                let mut entries = HashMap::new();
                for (key, value) in items {
                    let key_value = self.eval(key);
                    let key = DictKey::from_value(&key_value)
                        .ok_or_else(|| RuntimeError::Unhashable(key_value.type_name()))?;
                    let value = self.eval(value);
                    entries.insert(key, value);
                }
                Ok(Value::dict(entries))
            }
            ExprInner::Subscript { object, index } => {
                let object_value = self.eval(object);
                self.subscript_get(&object_value, index)
            }
            // A slice only means something inside subscript brackets
            ExprInner::Slice { .. } => Err(RuntimeError::UnsupportedNode(expr.inner.kind_name())),
        }
    }

    /// Function calls run against a copy of the caller's bindings, not an
    /// environment captured at definition time. Extra arguments are dropped
    /// and missing parameters stay unbound. The caller's environment comes
    /// back no matter what happened inside.
    fn call_function(&mut self, decl: &FunDecl, args: Vec<Value>) -> Value {
        let mut local = self.env.snapshot();
        for (parameter, value) in decl.parameters.iter().zip(args.into_iter()) {
            local.bind(parameter.clone(), value);
        }
        let saved = std::mem::replace(&mut self.env, local);
        let result = self.execute_block(&decl.body);
        self.env = saved;
        result
    }

    /// Write a value into an assignment target: a plain name or a
    /// subscripted container. Anything else is not assignable.
    fn assign_value(&mut self, target: &Expr, value: Value) -> Result<(), RuntimeError> {
        match &target.inner {
            ExprInner::Name(name) => {
                self.env.bind(name.clone(), value);
                Ok(())
            }
            ExprInner::Subscript { object, index } => {
                let object_value = self.eval(object);
                self.subscript_set(&object_value, index, value)
            }
            other => Err(RuntimeError::UnsupportedTarget(other.kind_name())),
        }
    }

    fn augmented_assign(
        &mut self,
        target: &Expr,
        op: BinOp,
        value: &Expr,
    ) -> Result<Value, RuntimeError> {
        let rhs = self.eval(value);
        match &target.inner {
            ExprInner::Name(name) => {
                // An unbound plain target starts from 0, not from None
                let current = self.env.lookup(name).unwrap_or(Value::Int(0));
                let updated = ops::binary(op, &current, &rhs)?;
                self.env.bind(name.clone(), updated.clone());
                Ok(updated)
            }
            ExprInner::Subscript { object, index } => {
                // The index expression runs once; the same resolved position
                // is used for both the read and the write back
                let object_value = self.eval(object);
                if let ExprInner::Slice { lower, upper, step } = &index.inner {
                    let bounds = self.slice_bounds(lower, upper, step)?;
                    let current = slice_get(&object_value, &bounds)?;
                    let updated = ops::binary(op, &current, &rhs)?;
                    slice_set(&object_value, &bounds, updated.clone())?;
                    Ok(updated)
                } else {
                    let index_value = self.eval(index);
                    let current = index_get(&object_value, &index_value)?;
                    let updated = ops::binary(op, &current, &rhs)?;
                    index_set(&object_value, &index_value, updated.clone())?;
                    Ok(updated)
                }
            }
            other => Err(RuntimeError::UnsupportedTarget(other.kind_name())),
        }
    }

    fn subscript_get(&mut self, object: &Value, index: &Expr) -> Result<Value, RuntimeError> {
        if let ExprInner::Slice { lower, upper, step } = &index.inner {
            let bounds = self.slice_bounds(lower, upper, step)?;
            return slice_get(object, &bounds);
        }
        let index_value = self.eval(index);
        index_get(object, &index_value)
    }

    fn subscript_set(
        &mut self,
        object: &Value,
        index: &Expr,
        value: Value,
    ) -> Result<(), RuntimeError> {
        if let ExprInner::Slice { lower, upper, step } = &index.inner {
            let bounds = self.slice_bounds(lower, upper, step)?;
            return slice_set(object, &bounds, value);
        }
        let index_value = self.eval(index);
        index_set(object, &index_value, value)
    }

    #[allow(clippy::borrowed_box)]
    fn slice_bounds(
        &mut self,
        lower: &Option<Box<Expr>>,
        upper: &Option<Box<Expr>>,
        step: &Option<Box<Expr>>,
    ) -> Result<SliceBounds, RuntimeError> {
        Ok(SliceBounds {
            lower: self.slice_part(lower)?,
            upper: self.slice_part(upper)?,
            step: self.slice_part(step)?,
        })
    }

    fn slice_part(&mut self, part: &Option<Box<Expr>>) -> Result<Option<i64>, RuntimeError> {
        match part {
            Option::None => Ok(Option::None),
            Some(expr) => match self.eval(expr) {
                // An explicit None bound means the same as a missing one
                Value::None => Ok(Option::None),
                Value::Int(n) => Ok(Some(n)),
                Value::Bool(b) => Ok(Some(b as i64)),
                other => Err(RuntimeError::InvalidIndex(other.type_name())),
            },
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(n.into_inner()),
        Literal::Str(s) => Value::string(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::None => Value::None,
    }
}

/// The elements a for loop (and friends like sum) walk over. Dicts yield
/// their keys; strings yield one-character strings.
pub(crate) fn iter_elements(value: &Value) -> Result<Vec<Value>, RuntimeError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.as_ref().clone()),
        Value::Str(s) => Ok(s.chars().map(|ch| Value::string(ch.to_string())).collect()),
        Value::Dict(entries) => Ok(entries.borrow().keys().map(DictKey::to_value).collect()),
        other => Err(RuntimeError::NotIterable(other.type_name())),
    }
}

fn normalize_index(index: &Value, len: usize, what: &'static str) -> Result<usize, RuntimeError> {
    let raw = match index {
        Value::Int(n) => *n,
        Value::Bool(b) => *b as i64,
        other => return Err(RuntimeError::InvalidIndex(other.type_name())),
    };
    // Negative indices count from the end
    let adjusted = if raw < 0 { raw + len as i64 } else { raw };
    if adjusted < 0 || adjusted >= len as i64 {
        Err(RuntimeError::IndexOutOfRange(what))
    } else {
        Ok(adjusted as usize)
    }
}

fn index_get(object: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            let at = normalize_index(index, items.len(), "list")?;
            Ok(items[at].clone())
        }
        Value::Tuple(items) => {
            let at = normalize_index(index, items.len(), "tuple")?;
            Ok(items[at].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let at = normalize_index(index, chars.len(), "string")?;
            Ok(Value::string(chars[at].to_string()))
        }
        Value::Dict(entries) => {
            let key = DictKey::from_value(index)
                .ok_or_else(|| RuntimeError::Unhashable(index.type_name()))?;
            entries
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| RuntimeError::MissingKey(key.to_string()))
        }
        other => Err(RuntimeError::NotSubscriptable(other.type_name())),
    }
}

fn index_set(object: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let at = normalize_index(index, items.len(), "list")?;
            items[at] = value;
            Ok(())
        }
        Value::Dict(entries) => {
            let key = DictKey::from_value(index)
                .ok_or_else(|| RuntimeError::Unhashable(index.type_name()))?;
            entries.borrow_mut().insert(key, value);
            Ok(())
        }
        other => Err(RuntimeError::NotMutable(other.type_name())),
    }
}

struct SliceBounds {
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
}

// Resolve missing and out-of-range bounds the way sequence slicing always
// does, then walk from start towards stop by step
fn slice_indices(len: usize, bounds: &SliceBounds) -> Result<Vec<usize>, RuntimeError> {
    let len = len as i64;
    let step = bounds.step.unwrap_or(1);
    if step == 0 {
        return Err(RuntimeError::Host("slice step cannot be zero".to_string()));
    }
    let clamp = |value: Option<i64>, default: i64, low: i64, high: i64| -> i64 {
        match value {
            Some(v) => {
                let v = if v < 0 { v + len } else { v };
                v.clamp(low, high)
            }
            Option::None => default,
        }
    };
    let (start, stop) = if step > 0 {
        (
            clamp(bounds.lower, 0, 0, len),
            clamp(bounds.upper, len, 0, len),
        )
    } else {
        (
            clamp(bounds.lower, len - 1, -1, len - 1),
            clamp(bounds.upper, -1, -1, len - 1),
        )
    };
    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        indices.push(i as usize);
        i += step;
    }
    Ok(indices)
}

fn slice_get(object: &Value, bounds: &SliceBounds) -> Result<Value, RuntimeError> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            let picked = slice_indices(items.len(), bounds)?
                .into_iter()
                .map(|i| items[i].clone())
                .collect();
            Ok(Value::list(picked))
        }
        Value::Tuple(items) => {
            let picked = slice_indices(items.len(), bounds)?
                .into_iter()
                .map(|i| items[i].clone())
                .collect();
            Ok(Value::tuple(picked))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked: String = slice_indices(chars.len(), bounds)?
                .into_iter()
                .map(|i| chars[i])
                .collect();
            Ok(Value::string(picked))
        }
        other => Err(RuntimeError::NotSubscriptable(other.type_name())),
    }
}

fn slice_set(object: &Value, bounds: &SliceBounds, value: Value) -> Result<(), RuntimeError> {
    let Value::List(items) = object else {
        return Err(RuntimeError::NotMutable(object.type_name()));
    };
    if bounds.step.unwrap_or(1) != 1 {
        return Err(RuntimeError::Host(
            "slice assignment requires step 1".to_string(),
        ));
    }
    // Collect the replacement before borrowing the target, the value may be
    // the target itself
    let replacement = iter_elements(&value)?;
    let mut items = items.borrow_mut();
    let len = items.len() as i64;
    let clamp = |v: Option<i64>, default: i64| -> i64 {
        match v {
            Some(v) => {
                let v = if v < 0 { v + len } else { v };
                v.clamp(0, len)
            }
            Option::None => default,
        }
    };
    let start = clamp(bounds.lower, 0);
    let stop = clamp(bounds.upper, len).max(start);
    items.splice(start as usize..stop as usize, replacement);
    Ok(())
}
