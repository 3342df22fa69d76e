//! Numeric tower rank resolution and arithmetic.
//!
//! Two ranks are concrete (integer, real); rational and complex hold their
//! places in the ordering but are unimplemented, and any attempt to coerce
//! toward them is an internal error rather than a silent fallback. Mixed
//! operands are resolved to the higher rank of the two, and conversion only
//! ever widens: asking a real to become an integer is a broken invariant.
//!
//! The rank-specific operations (`int_add`, `real_add`, ...) assume their
//! operands already sit at the stated rank and never convert. The `numeric_*`
//! helpers do the rank resolution and dispatch for the primitives, which are
//! responsible for the user-facing type checks before calling in here.

use crate::Error;
use crate::value::Value;

/// Position in the numeric hierarchy. Ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    Integer,
    Rational,
    Real,
    Complex,
}

/// The rank of a numeric value. Calling this on a non-number is an internal
/// error: primitives type-check their arguments before touching the tower.
pub fn rank_of(v: &Value) -> Result<Rank, Error> {
    match v {
        Value::Int(_) => Ok(Rank::Integer),
        Value::Real(_) => Ok(Rank::Real),
        _ => Err(Error::Internal(format!(
            "numeric rank requested for a {}",
            v.type_name()
        ))),
    }
}

/// The rank a binary operation's result takes: the higher of the two.
pub fn result_rank(a: &Value, b: &Value) -> Result<Rank, Error> {
    Ok(rank_of(a)?.max(rank_of(b)?))
}

/// Convert a number to the target rank. Only widening conversions exist;
/// narrowing and the unimplemented ranks are internal errors.
pub fn coerce(v: &Value, target: Rank) -> Result<Value, Error> {
    let from = rank_of(v)?;
    match (v, target) {
        _ if from == target => Ok(v.clone()),
        (Value::Int(i), Rank::Real) => Ok(Value::Real(*i as f64)),
        (_, Rank::Rational) => Err(Error::Internal(
            "coercion to rational is unimplemented".to_string(),
        )),
        (_, Rank::Complex) => Err(Error::Internal(
            "coercion to complex is unimplemented".to_string(),
        )),
        _ => Err(Error::Internal(format!(
            "cannot narrow {} to {target:?}",
            v.type_name()
        ))),
    }
}

// ---- rank-specific operations; operands must already be at rank ----

pub fn int_add(a: i64, b: i64) -> Result<i64, Error> {
    a.checked_add(b)
        .ok_or_else(|| Error::EvalError("integer overflow in addition".to_string()))
}

pub fn int_sub(a: i64, b: i64) -> Result<i64, Error> {
    a.checked_sub(b)
        .ok_or_else(|| Error::EvalError("integer overflow in subtraction".to_string()))
}

pub fn int_mul(a: i64, b: i64) -> Result<i64, Error> {
    a.checked_mul(b)
        .ok_or_else(|| Error::EvalError("integer overflow in multiplication".to_string()))
}

pub fn real_add(a: f64, b: f64) -> f64 {
    a + b
}

pub fn real_sub(a: f64, b: f64) -> f64 {
    a - b
}

pub fn real_mul(a: f64, b: f64) -> f64 {
    a * b
}

// ---- mixed-rank dispatch for the primitives ----

fn both_at_common_rank(a: &Value, b: &Value) -> Result<(Value, Value, Rank), Error> {
    let rank = result_rank(a, b)?;
    Ok((coerce(a, rank)?, coerce(b, rank)?, rank))
}

pub fn numeric_add(a: &Value, b: &Value) -> Result<Value, Error> {
    match both_at_common_rank(a, b)? {
        (Value::Int(x), Value::Int(y), Rank::Integer) => Ok(Value::Int(int_add(x, y)?)),
        (Value::Real(x), Value::Real(y), Rank::Real) => Ok(Value::Real(real_add(x, y))),
        (_, _, rank) => Err(Error::Internal(format!("addition at rank {rank:?}"))),
    }
}

pub fn numeric_sub(a: &Value, b: &Value) -> Result<Value, Error> {
    match both_at_common_rank(a, b)? {
        (Value::Int(x), Value::Int(y), Rank::Integer) => Ok(Value::Int(int_sub(x, y)?)),
        (Value::Real(x), Value::Real(y), Rank::Real) => Ok(Value::Real(real_sub(x, y))),
        (_, _, rank) => Err(Error::Internal(format!("subtraction at rank {rank:?}"))),
    }
}

pub fn numeric_mul(a: &Value, b: &Value) -> Result<Value, Error> {
    match both_at_common_rank(a, b)? {
        (Value::Int(x), Value::Int(y), Rank::Integer) => Ok(Value::Int(int_mul(x, y)?)),
        (Value::Real(x), Value::Real(y), Rank::Real) => Ok(Value::Real(real_mul(x, y))),
        (_, _, rank) => Err(Error::Internal(format!("multiplication at rank {rank:?}"))),
    }
}

/// Division keeps integer results exact when it can: an evenly divisible
/// integer pair stays an integer, anything else becomes a real. A zero
/// divisor of either rank is a reported error, not an IEEE infinity.
pub fn numeric_div(a: &Value, b: &Value) -> Result<Value, Error> {
    match both_at_common_rank(a, b)? {
        (Value::Int(x), Value::Int(y), Rank::Integer) => {
            if y == 0 {
                return Err(Error::EvalError("division by zero".to_string()));
            }
            match x.checked_rem(y) {
                // remainder succeeded, so the quotient cannot overflow
                Some(0) => Ok(Value::Int(x / y)),
                Some(_) => Ok(Value::Real(x as f64 / y as f64)),
                None => Err(Error::EvalError("integer overflow in division".to_string())),
            }
        }
        (Value::Real(x), Value::Real(y), Rank::Real) => {
            if y == 0.0 {
                return Err(Error::EvalError("division by zero".to_string()));
            }
            Ok(Value::Real(x / y))
        }
        (_, _, rank) => Err(Error::Internal(format!("division at rank {rank:?}"))),
    }
}

/// Truncated remainder over integers only.
pub fn int_modulo(a: i64, b: i64) -> Result<i64, Error> {
    if b == 0 {
        return Err(Error::EvalError("modulo by zero".to_string()));
    }
    a.checked_rem(b)
        .ok_or_else(|| Error::EvalError("integer overflow in modulo".to_string()))
}

pub fn num_eq(a: &Value, b: &Value) -> Result<bool, Error> {
    match both_at_common_rank(a, b)? {
        (Value::Int(x), Value::Int(y), _) => Ok(x == y),
        (Value::Real(x), Value::Real(y), _) => Ok(x == y),
        (_, _, rank) => Err(Error::Internal(format!("comparison at rank {rank:?}"))),
    }
}

pub fn num_lt(a: &Value, b: &Value) -> Result<bool, Error> {
    match both_at_common_rank(a, b)? {
        (Value::Int(x), Value::Int(y), _) => Ok(x < y),
        (Value::Real(x), Value::Real(y), _) => Ok(x < y),
        (_, _, rank) => Err(Error::Internal(format!("comparison at rank {rank:?}"))),
    }
}

pub fn num_gt(a: &Value, b: &Value) -> Result<bool, Error> {
    match both_at_common_rank(a, b)? {
        (Value::Int(x), Value::Int(y), _) => Ok(x > y),
        (Value::Real(x), Value::Real(y), _) => Ok(x > y),
        (_, _, rank) => Err(Error::Internal(format!("comparison at rank {rank:?}"))),
    }
}
