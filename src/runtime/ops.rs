use std::cmp::Ordering;

use crate::ast::{BinOp, BoolOp, CmpOp};

use super::interpreter::RuntimeError;
use super::value::Value;

// Numeric view of a pair of operands; bools count as 0/1
enum NumPair {
    Int(i64, i64),
    Float(f64, f64),
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        Value::Bool(b) => Some(*b as i64 as f64),
        _ => None,
    }
}

fn num_pair(lhs: &Value, rhs: &Value) -> Option<NumPair> {
    if let (Some(l), Some(r)) = (as_int(lhs), as_int(rhs)) {
        Some(NumPair::Int(l, r))
    } else if let (Some(l), Some(r)) = (as_float(lhs), as_float(rhs)) {
        Some(NumPair::Float(l, r))
    } else {
        None
    }
}

fn invalid_operands(op: BinOp, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::InvalidOperands {
        op: op_symbol(op),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
    }
}

/// Apply a binary arithmetic operator. Division in all its forms is guarded:
/// a zero right operand is an error, never infinity or NaN.
pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinOp::Add => add(lhs, rhs),
        BinOp::Sub => match num_pair(lhs, rhs) {
            // Overflowing int math falls back to floats rather than wrapping
            Some(NumPair::Int(l, r)) => Ok(l
                .checked_sub(r)
                .map(Value::Int)
                .unwrap_or(Value::Float(l as f64 - r as f64))),
            Some(NumPair::Float(l, r)) => Ok(Value::Float(l - r)),
            None => Err(invalid_operands(op, lhs, rhs)),
        },
        BinOp::Mul => mul(lhs, rhs),
        BinOp::Div => match num_pair(lhs, rhs) {
            Some(NumPair::Int(_, 0)) => Err(RuntimeError::DivisionByZero),
            Some(NumPair::Float(_, r)) if r == 0.0 => Err(RuntimeError::DivisionByZero),
            // True division always yields a float
            Some(NumPair::Int(l, r)) => Ok(Value::Float(l as f64 / r as f64)),
            Some(NumPair::Float(l, r)) => Ok(Value::Float(l / r)),
            None => Err(invalid_operands(op, lhs, rhs)),
        },
        BinOp::FloorDiv => match num_pair(lhs, rhs) {
            Some(NumPair::Int(_, 0)) => Err(RuntimeError::DivisionByZero),
            Some(NumPair::Float(_, r)) if r == 0.0 => Err(RuntimeError::DivisionByZero),
            Some(NumPair::Int(l, r)) => Ok(Value::Int(l.div_euclid(r))),
            Some(NumPair::Float(l, r)) => Ok(Value::Float((l / r).floor())),
            None => Err(invalid_operands(op, lhs, rhs)),
        },
        BinOp::Mod => match num_pair(lhs, rhs) {
            Some(NumPair::Int(_, 0)) => Err(RuntimeError::DivisionByZero),
            Some(NumPair::Float(_, r)) if r == 0.0 => Err(RuntimeError::DivisionByZero),
            // Remainder takes the sign of the divisor
            Some(NumPair::Int(l, r)) => {
                let rem = l % r;
                let rem = if rem != 0 && (rem < 0) != (r < 0) {
                    rem + r
                } else {
                    rem
                };
                Ok(Value::Int(rem))
            }
            Some(NumPair::Float(l, r)) => Ok(Value::Float(l - r * (l / r).floor())),
            None => Err(invalid_operands(op, lhs, rhs)),
        },
        BinOp::Pow => match num_pair(lhs, rhs) {
            Some(NumPair::Int(l, r)) if r >= 0 => {
                let result = u32::try_from(r)
                    .ok()
                    .and_then(|exp| l.checked_pow(exp))
                    .map(Value::Int)
                    .unwrap_or(Value::Float((l as f64).powf(r as f64)));
                Ok(result)
            }
            // A negative exponent leaves the integers
            Some(NumPair::Int(l, r)) => Ok(Value::Float((l as f64).powf(r as f64))),
            Some(NumPair::Float(l, r)) => Ok(Value::Float(l.powf(r))),
            None => Err(invalid_operands(op, lhs, rhs)),
        },
    }
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    if let Some(pair) = num_pair(lhs, rhs) {
        return Ok(match pair {
            NumPair::Int(l, r) => l
                .checked_add(r)
                .map(Value::Int)
                .unwrap_or(Value::Float(l as f64 + r as f64)),
            NumPair::Float(l, r) => Value::Float(l + r),
        });
    }
    match (lhs, rhs) {
        (Value::Str(l), Value::Str(r)) => {
            let mut joined = l.as_ref().to_owned();
            joined.push_str(r);
            Ok(Value::string(joined))
        }
        (Value::List(l), Value::List(r)) => {
            let mut joined = l.borrow().clone();
            joined.extend(r.borrow().iter().cloned());
            Ok(Value::list(joined))
        }
        (Value::Tuple(l), Value::Tuple(r)) => {
            let mut joined = l.as_ref().clone();
            joined.extend(r.iter().cloned());
            Ok(Value::tuple(joined))
        }
        _ => Err(invalid_operands(BinOp::Add, lhs, rhs)),
    }
}

fn mul(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    if let Some(pair) = num_pair(lhs, rhs) {
        return Ok(match pair {
            NumPair::Int(l, r) => l
                .checked_mul(r)
                .map(Value::Int)
                .unwrap_or(Value::Float(l as f64 * r as f64)),
            NumPair::Float(l, r) => Value::Float(l * r),
        });
    }
    // Sequence repetition works with the count on either side
    match (lhs, rhs) {
        (Value::Str(s), count) | (count, Value::Str(s)) => match as_int(count) {
            Some(n) => Ok(Value::string(s.repeat(n.max(0) as usize))),
            None => Err(invalid_operands(BinOp::Mul, lhs, rhs)),
        },
        (Value::List(items), count) | (count, Value::List(items)) => match as_int(count) {
            Some(n) => {
                let base = items.borrow();
                let mut repeated = Vec::with_capacity(base.len() * n.max(0) as usize);
                for _ in 0..n.max(0) {
                    repeated.extend(base.iter().cloned());
                }
                Ok(Value::list(repeated))
            }
            None => Err(invalid_operands(BinOp::Mul, lhs, rhs)),
        },
        _ => Err(invalid_operands(BinOp::Mul, lhs, rhs)),
    }
}

/// Apply a comparison operator. Equality never fails; orderings are defined
/// for numbers and for string pairs.
pub fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        CmpOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        CmpOp::NotEq => return Ok(Value::Bool(lhs != rhs)),
        _ => {}
    }
    let ordering = if let Some(pair) = num_pair(lhs, rhs) {
        match pair {
            NumPair::Int(l, r) => l.cmp(&r),
            NumPair::Float(l, r) => match l.partial_cmp(&r) {
                Some(ordering) => ordering,
                // NaN compares false everywhere
                None => return Ok(Value::Bool(false)),
            },
        }
    } else if let (Value::Str(l), Value::Str(r)) = (lhs, rhs) {
        l.cmp(r)
    } else {
        return Err(RuntimeError::InvalidOperands {
            op: cmp_symbol(op),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        });
    };
    let result = match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::LtE => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::GtE => ordering != Ordering::Less,
        CmpOp::Eq | CmpOp::NotEq => unreachable!("handled above"),
    };
    Ok(Value::Bool(result))
}

fn cmp_symbol(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "==",
        CmpOp::NotEq => "!=",
        CmpOp::Lt => "<",
        CmpOp::LtE => "<=",
        CmpOp::Gt => ">",
        CmpOp::GtE => ">=",
    }
}

/// Fold one and/or step over already-evaluated operands, yielding the
/// deciding operand rather than a bare bool.
pub fn logical(op: BoolOp, lhs: Value, rhs: Value) -> Value {
    match op {
        BoolOp::And => {
            if lhs.to_bool() {
                rhs
            } else {
                lhs
            }
        }
        BoolOp::Or => {
            if lhs.to_bool() {
                lhs
            } else {
                rhs
            }
        }
    }
}

pub fn negate(value: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Int(n) => Ok(n
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Float(-(*n as f64)))),
        Value::Float(n) => Ok(Value::Float(-n)),
        Value::Bool(b) => Ok(Value::Int(-(*b as i64))),
        other => Err(RuntimeError::InvalidUnaryOperand {
            op: "-",
            operand: other.type_name(),
        }),
    }
}

pub fn unary_plus(value: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Int(_) | Value::Float(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        other => Err(RuntimeError::InvalidUnaryOperand {
            op: "+",
            operand: other.type_name(),
        }),
    }
}

/// The variadic arithmetic helpers exposed to programs as add/sub/mul/div.
/// add and mul fold at least two operands left to right; sub negates a single
/// operand; div folds with the same guarded division as the operator.
pub fn fold_add(args: &[Value]) -> Result<Value, RuntimeError> {
    fold(BinOp::Add, "add", args)
}

pub fn fold_mul(args: &[Value]) -> Result<Value, RuntimeError> {
    fold(BinOp::Mul, "mul", args)
}

pub fn fold_div(args: &[Value]) -> Result<Value, RuntimeError> {
    fold(BinOp::Div, "div", args)
}

pub fn fold_sub(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [] => Err(RuntimeError::Arity {
            name: "sub",
            required: "at least 1 argument",
            got: 0,
        }),
        [only] => negate(only),
        _ => fold(BinOp::Sub, "sub", args),
    }
}

fn fold(op: BinOp, name: &'static str, args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() < 2 {
        return Err(RuntimeError::Arity {
            name,
            required: "at least 2 arguments",
            got: args.len(),
        });
    }
    let mut acc = args[0].clone();
    for next in &args[1..] {
        acc = binary(op, &acc, next)?;
    }
    Ok(acc)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn true_division_always_floats() {
        assert_eq!(
            Ok(Value::Float(5.0)),
            binary(BinOp::Div, &Value::Int(10), &Value::Int(2))
        );
    }

    #[test]
    fn floor_division_stays_integral() {
        assert_eq!(
            Ok(Value::Int(3)),
            binary(BinOp::FloorDiv, &Value::Int(10), &Value::Int(3))
        );
        assert_eq!(
            Ok(Value::Int(-4)),
            binary(BinOp::FloorDiv, &Value::Int(-7), &Value::Int(2))
        );
    }

    #[test]
    fn division_by_zero_is_guarded() {
        assert_eq!(
            Err(RuntimeError::DivisionByZero),
            binary(BinOp::Div, &Value::Int(1), &Value::Int(0))
        );
        assert_eq!(
            Err(RuntimeError::DivisionByZero),
            binary(BinOp::Mod, &Value::Float(1.0), &Value::Float(0.0))
        );
        assert_eq!(
            Err(RuntimeError::DivisionByZero),
            binary(BinOp::FloorDiv, &Value::Int(1), &Value::Int(0))
        );
    }

    #[test]
    fn modulo_takes_the_divisor_sign() {
        assert_eq!(
            Ok(Value::Int(1)),
            binary(BinOp::Mod, &Value::Int(-7), &Value::Int(2))
        );
        assert_eq!(
            Ok(Value::Int(-1)),
            binary(BinOp::Mod, &Value::Int(7), &Value::Int(-2))
        );
    }

    #[test]
    fn add_concatenates_sequences() {
        assert_eq!(
            Ok(Value::string("Hello, Alice")),
            binary(BinOp::Add, &Value::string("Hello, "), &Value::string("Alice"))
        );
        assert_eq!(
            Ok(Value::list(vec![Value::Int(1), Value::Int(2)])),
            binary(
                BinOp::Add,
                &Value::list(vec![Value::Int(1)]),
                &Value::list(vec![Value::Int(2)])
            )
        );
    }

    #[test]
    fn mul_repeats_sequences() {
        assert_eq!(
            Ok(Value::string("ababab")),
            binary(BinOp::Mul, &Value::string("ab"), &Value::Int(3))
        );
        assert_eq!(
            Ok(Value::string("")),
            binary(BinOp::Mul, &Value::Int(-1), &Value::string("ab"))
        );
    }

    #[test]
    fn pow_keeps_ints_until_it_cannot() {
        assert_eq!(
            Ok(Value::Int(25)),
            binary(BinOp::Pow, &Value::Int(5), &Value::Int(2))
        );
        assert_eq!(
            Ok(Value::Float(0.5)),
            binary(BinOp::Pow, &Value::Int(2), &Value::Int(-1))
        );
    }

    #[test]
    fn mismatched_operands_are_an_error() {
        assert!(binary(BinOp::Add, &Value::Int(1), &Value::string("a")).is_err());
        assert!(binary(BinOp::Sub, &Value::None, &Value::Int(1)).is_err());
    }

    #[test]
    fn logical_returns_the_deciding_operand() {
        assert_eq!(
            Value::string("a"),
            logical(BoolOp::Or, Value::Bool(false), Value::string("a"))
        );
        assert_eq!(
            Value::Bool(false),
            logical(BoolOp::And, Value::Bool(false), Value::string("a"))
        );
    }

    #[test]
    fn ordering_works_for_numbers_and_strings() {
        assert_eq!(
            Ok(Value::Bool(true)),
            compare(CmpOp::Lt, &Value::Int(1), &Value::Float(1.5))
        );
        assert_eq!(
            Ok(Value::Bool(true)),
            compare(CmpOp::Lt, &Value::string("abc"), &Value::string("abd"))
        );
        assert!(compare(CmpOp::Lt, &Value::Int(1), &Value::string("a")).is_err());
    }

    #[test]
    fn equality_is_total() {
        assert_eq!(
            Ok(Value::Bool(false)),
            compare(CmpOp::Eq, &Value::Int(1), &Value::string("1"))
        );
        assert_eq!(
            Ok(Value::Bool(true)),
            compare(CmpOp::NotEq, &Value::Int(1), &Value::string("1"))
        );
    }

    #[test]
    fn variadic_helpers_check_arity() {
        assert_eq!(
            Ok(Value::Int(6)),
            fold_add(&[Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert!(fold_add(&[Value::Int(1)]).is_err());
        assert_eq!(Ok(Value::Int(-5)), fold_sub(&[Value::Int(5)]));
        assert!(fold_sub(&[]).is_err());
        assert_eq!(
            Ok(Value::Int(2)),
            fold_sub(&[Value::Int(10), Value::Int(5), Value::Int(3)])
        );
        assert_eq!(
            Ok(Value::Float(5.0)),
            fold_div(&[Value::Int(20), Value::Int(2), Value::Int(2)])
        );
        assert_eq!(
            Err(RuntimeError::DivisionByZero),
            fold_div(&[Value::Int(20), Value::Int(0)])
        );
    }
}
