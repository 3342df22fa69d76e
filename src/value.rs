//! The runtime value representation.
//!
//! `Value` is a closed tagged enum over every datum the language can produce.
//! Aggregates are handles: pairs index cells owned by the [`crate::heap::Heap`],
//! closures share ownership of their code through `Rc` and capture their
//! defining frame by `FrameId`. Cloning a `Value` is cheap and never copies
//! structure.

use std::rc::Rc;

use crate::heap::{CellId, FrameId};
use crate::primitives::PrimitiveOp;
use crate::symbol::Symbol;

/// A runtime datum.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(Rc<str>),
    Symbol(Symbol),
    /// The empty list.
    Nil,
    /// The result of forms evaluated for effect; never printed by the driver.
    Void,
    /// Placeholder installed by `letrec` pass one; visible to user code only
    /// as a "referenced before initialization" error.
    Uninit,
    /// Handle to a cons cell in the heap.
    Pair(CellId),
    Closure(Rc<Closure>),
    Primitive(&'static PrimitiveOp),
}

/// A user procedure: parameter list, body forms, and the frame captured at
/// the point of creation. Immutable once built.
#[derive(Debug)]
pub struct Closure {
    pub params: Params,
    /// At least one form; evaluated in sequence, last value returned.
    pub body: Vec<Value>,
    pub env: FrameId,
}

/// Parameter specification of a `lambda`.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Proper list of unique parameter names; call arity must match exactly.
    Fixed(Vec<Symbol>),
    /// Single bare symbol receiving the entire argument list.
    Variadic(Symbol),
}

impl Value {
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Real(_))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Primitive(_))
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    /// Short noun for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Real(_) => "real",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Nil => "empty list",
            Value::Void => "void",
            Value::Uninit => "uninitialized",
            Value::Pair(_) => "pair",
            Value::Closure(_) => "procedure",
            Value::Primitive(_) => "primitive",
        }
    }

    /// Identity comparison as `eq?` sees it: scalars by value, strings by
    /// allocation, pairs by cell handle, procedures by identity.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

/// Value equality for mixed use in tests and bindings bookkeeping: atoms by
/// value (strings by content), aggregates by handle. Cross-variant comparisons
/// are always false; `1` and `1.0` are not equal here.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Void, Value::Void) => true,
            (Value::Uninit, Value::Uninit) => true,
            (Value::Pair(a), Value::Pair(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Primitive(a), Value::Primitive(b)) => a.name == b.name,
            _ => false,
        }
    }
}
