//! Built-in procedures.
//!
//! Primitives are ordinary procedure values: the evaluator applies them to an
//! already-evaluated argument slice after checking the registered arity. Each
//! primitive owns its type contract and reports violations under its own name.
//!
//! Special forms (`if`, `let`, `quote`, ...) control the evaluation of their
//! subforms and are handled directly by the evaluator; they are not in this
//! registry.
//!
//! Primitives never mutate their arguments. List results are freshly linked
//! except where aliasing an existing tail is safe: `cons` aliases its second
//! argument and `append` aliases its final one.

use crate::Error;
use crate::heap::{FrameId, Heap};
use crate::number;
use crate::symbol::SymbolTable;
use crate::value::Value;

/// Argument-count specification for a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// At least n arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
}

impl Arity {
    /// Validate an argument count, reporting under the operation's name.
    pub fn check(&self, name: &str, got: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(n) if got == n => Ok(()),
            Arity::Exact(n) => Err(Error::arity_error(name, n, got)),
            Arity::AtLeast(n) if got >= n => Ok(()),
            Arity::AtLeast(n) => Err(Error::arity_error_min(name, n, got)),
            Arity::Range(min, max) if (min..=max).contains(&got) => Ok(()),
            Arity::Range(min, max) => Err(Error::arity_error_range(name, min, max, got)),
        }
    }
}

/// Implementation signature shared by every primitive.
pub type PrimFn = fn(&mut Heap, &[Value]) -> Result<Value, Error>;

/// A registered built-in procedure.
#[derive(Debug)]
pub struct PrimitiveOp {
    pub name: &'static str,
    pub arity: Arity,
    pub run: PrimFn,
}

/// Every built-in, in the order they are installed into the global frame.
pub static PRIMITIVES: [PrimitiveOp; 21] = [
    PrimitiveOp {
        name: "+",
        arity: Arity::AtLeast(0),
        run: builtin_add,
    },
    PrimitiveOp {
        name: "-",
        arity: Arity::AtLeast(2),
        run: builtin_sub,
    },
    PrimitiveOp {
        name: "*",
        arity: Arity::AtLeast(0),
        run: builtin_mul,
    },
    PrimitiveOp {
        name: "/",
        arity: Arity::Exact(2),
        run: builtin_div,
    },
    PrimitiveOp {
        name: "modulo",
        arity: Arity::Exact(2),
        run: builtin_modulo,
    },
    PrimitiveOp {
        name: "=",
        arity: Arity::AtLeast(1),
        run: builtin_num_eq,
    },
    PrimitiveOp {
        name: "<",
        arity: Arity::Exact(2),
        run: builtin_lt,
    },
    PrimitiveOp {
        name: ">",
        arity: Arity::Exact(2),
        run: builtin_gt,
    },
    PrimitiveOp {
        name: "null?",
        arity: Arity::Exact(1),
        run: builtin_null_p,
    },
    PrimitiveOp {
        name: "list?",
        arity: Arity::Exact(1),
        run: builtin_list_p,
    },
    PrimitiveOp {
        name: "number?",
        arity: Arity::Exact(1),
        run: builtin_number_p,
    },
    PrimitiveOp {
        name: "car",
        arity: Arity::Exact(1),
        run: builtin_car,
    },
    PrimitiveOp {
        name: "cdr",
        arity: Arity::Exact(1),
        run: builtin_cdr,
    },
    PrimitiveOp {
        name: "cons",
        arity: Arity::Exact(2),
        run: builtin_cons,
    },
    PrimitiveOp {
        name: "list",
        arity: Arity::AtLeast(0),
        run: builtin_list,
    },
    PrimitiveOp {
        name: "append",
        arity: Arity::AtLeast(0),
        run: builtin_append,
    },
    PrimitiveOp {
        name: "reverse",
        arity: Arity::Exact(1),
        run: builtin_reverse,
    },
    PrimitiveOp {
        name: "length",
        arity: Arity::Exact(1),
        run: builtin_length,
    },
    PrimitiveOp {
        name: "equal?",
        arity: Arity::Exact(2),
        run: builtin_equal_p,
    },
    PrimitiveOp {
        name: "eq?",
        arity: Arity::Exact(2),
        run: builtin_eq_p,
    },
    PrimitiveOp {
        name: "not",
        arity: Arity::Exact(1),
        run: builtin_not,
    },
];

/// Bind every primitive into the global frame.
pub fn install(heap: &mut Heap, symbols: &mut SymbolTable, global: FrameId) {
    for op in &PRIMITIVES {
        let sym = symbols.intern(op.name);
        heap.define_global(global, sym, Value::Primitive(op));
    }
}

fn expect_number<'a>(name: &str, v: &'a Value) -> Result<&'a Value, Error> {
    if v.is_number() {
        Ok(v)
    } else {
        Err(Error::TypeError(format!(
            "{name}: expected a number, got {}",
            v.type_name()
        )))
    }
}

fn expect_int(name: &str, v: &Value) -> Result<i64, Error> {
    match v {
        Value::Int(i) => Ok(*i),
        _ => Err(Error::TypeError(format!(
            "{name}: expected an integer, got {}",
            v.type_name()
        ))),
    }
}

fn expect_pair(name: &str, v: &Value) -> Result<crate::heap::CellId, Error> {
    match v {
        Value::Pair(id) => Ok(*id),
        _ => Err(Error::TypeError(format!(
            "{name}: expected a pair, got {}",
            v.type_name()
        ))),
    }
}

fn expect_proper_list(name: &str, heap: &Heap, v: &Value) -> Result<Vec<Value>, Error> {
    heap.list_to_vec(v).ok_or_else(|| {
        Error::TypeError(format!(
            "{name}: expected a proper list, got {}",
            v.type_name()
        ))
    })
}

// ---- arithmetic ----

fn builtin_add(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let mut sum = Value::Int(0);
    for arg in args {
        expect_number("+", arg)?;
        sum = number::numeric_add(&sum, arg)?;
    }
    Ok(sum)
}

fn builtin_sub(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    expect_number("-", &args[0])?;
    let mut acc = args[0].clone();
    for arg in &args[1..] {
        expect_number("-", arg)?;
        acc = number::numeric_sub(&acc, arg)?;
    }
    Ok(acc)
}

fn builtin_mul(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let mut product = Value::Int(1);
    for arg in args {
        expect_number("*", arg)?;
        product = number::numeric_mul(&product, arg)?;
    }
    Ok(product)
}

fn builtin_div(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    expect_number("/", &args[0])?;
    expect_number("/", &args[1])?;
    number::numeric_div(&args[0], &args[1])
}

fn builtin_modulo(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let a = expect_int("modulo", &args[0])?;
    let b = expect_int("modulo", &args[1])?;
    Ok(Value::Int(number::int_modulo(a, b)?))
}

// ---- numeric comparison ----

/// `=` compares every argument against the first, widening ranks as needed.
fn builtin_num_eq(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let first = expect_number("=", &args[0])?;
    for arg in &args[1..] {
        expect_number("=", arg)?;
        if !number::num_eq(first, arg)? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn builtin_lt(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    expect_number("<", &args[0])?;
    expect_number("<", &args[1])?;
    Ok(Value::Bool(number::num_lt(&args[0], &args[1])?))
}

fn builtin_gt(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    expect_number(">", &args[0])?;
    expect_number(">", &args[1])?;
    Ok(Value::Bool(number::num_gt(&args[0], &args[1])?))
}

// ---- predicates ----

fn builtin_null_p(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Nil)))
}

fn builtin_list_p(heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(heap.is_proper_list(&args[0])))
}

fn builtin_number_p(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_number()))
}

// ---- list operations ----

fn builtin_car(heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let id = expect_pair("car", &args[0])?;
    Ok(heap.car(id))
}

fn builtin_cdr(heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let id = expect_pair("cdr", &args[0])?;
    Ok(heap.cdr(id))
}

fn builtin_cons(heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    Ok(heap.cons(args[0].clone(), args[1].clone()))
}

fn builtin_list(heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    Ok(heap.list_from(args))
}

/// Every argument but the last must be a proper list; their spines are
/// copied. The final argument becomes the tail of the result unchanged, so
/// `(append '(1) x)` shares structure with `x`.
fn builtin_append(heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let Some((last, init)) = args.split_last() else {
        return Ok(Value::Nil);
    };
    let mut result = last.clone();
    for arg in init.iter().rev() {
        let items = expect_proper_list("append", heap, arg)?;
        for item in items.iter().rev() {
            result = heap.cons(item.clone(), result);
        }
    }
    Ok(result)
}

fn builtin_reverse(heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let mut items = expect_proper_list("reverse", heap, &args[0])?;
    items.reverse();
    Ok(heap.list_from(&items))
}

fn builtin_length(heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let items = expect_proper_list("length", heap, &args[0])?;
    Ok(Value::Int(items.len() as i64))
}

// ---- equality ----

/// Structural equality over atoms only. Arguments of different kinds compare
/// unequal (including `1` against `1.0`); atoms of the same kind compare by
/// value; pairs and procedures are outside this primitive's contract.
fn builtin_equal_p(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    let (a, b) = (&args[0], &args[1]);
    match (a, b) {
        (Value::Int(_), Value::Int(_))
        | (Value::Real(_), Value::Real(_))
        | (Value::Bool(_), Value::Bool(_))
        | (Value::Str(_), Value::Str(_))
        | (Value::Symbol(_), Value::Symbol(_)) => Ok(Value::Bool(a == b)),
        _ if std::mem::discriminant(a) != std::mem::discriminant(b) => Ok(Value::Bool(false)),
        _ => Err(Error::TypeError(format!(
            "equal?: cannot compare {} values",
            a.type_name()
        ))),
    }
}

fn builtin_eq_p(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].same(&args[1])))
}

fn builtin_not(_heap: &mut Heap, args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Err(Error::TypeError(format!(
            "not: expected a boolean, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(name: &str) -> &'static PrimitiveOp {
        PRIMITIVES
            .iter()
            .find(|op| op.name == name)
            .unwrap_or_else(|| panic!("no primitive named {name}"))
    }

    fn call(heap: &mut Heap, name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find(name);
        op.arity.check(op.name, args.len())?;
        (op.run)(heap, args)
    }

    #[test]
    fn arity_check_reports_under_the_operation_name() {
        assert!(Arity::Exact(1).check("car", 1).is_ok());
        assert_eq!(
            Arity::Exact(1).check("car", 0),
            Err(Error::arity_error("car", 1, 0))
        );
        assert_eq!(
            Arity::AtLeast(2).check("-", 1),
            Err(Error::arity_error_min("-", 2, 1))
        );
        assert!(Arity::Range(1, 2).check("x", 2).is_ok());
        assert_eq!(
            Arity::Range(1, 2).check("x", 3),
            Err(Error::arity_error_range("x", 1, 2, 3))
        );
    }

    #[test]
    fn addition_and_multiplication_have_identities() {
        let mut heap = Heap::new();
        assert_eq!(call(&mut heap, "+", &[]).unwrap(), Value::Int(0));
        assert_eq!(call(&mut heap, "*", &[]).unwrap(), Value::Int(1));
        assert_eq!(
            call(&mut heap, "+", &[Value::Int(1), Value::Real(2.5)]).unwrap(),
            Value::Real(3.5)
        );
    }

    #[test]
    fn subtraction_requires_two_arguments() {
        let mut heap = Heap::new();
        assert!(matches!(
            call(&mut heap, "-", &[Value::Int(5)]),
            Err(Error::ArityError { .. })
        ));
        assert_eq!(
            call(&mut heap, "-", &[Value::Int(5), Value::Int(2), Value::Int(1)]).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn numeric_equality_compares_everything_against_the_first() {
        let mut heap = Heap::new();
        assert_eq!(
            call(&mut heap, "=", &[Value::Int(1), Value::Real(1.0), Value::Int(1)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call(&mut heap, "=", &[Value::Int(1), Value::Int(1), Value::Int(2)]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            call(&mut heap, "=", &[Value::Int(7)]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn car_and_cdr_demand_a_pair() {
        let mut heap = Heap::new();
        let list = heap.list_from(&[Value::Int(1), Value::Int(2)]);
        assert_eq!(call(&mut heap, "car", &[list.clone()]).unwrap(), Value::Int(1));

        let rest = call(&mut heap, "cdr", &[list]).unwrap();
        assert_eq!(
            heap.list_to_vec(&rest),
            Some(vec![Value::Int(2)])
        );

        assert!(matches!(
            call(&mut heap, "car", &[Value::Nil]),
            Err(Error::TypeError(_))
        ));
        assert!(matches!(
            call(&mut heap, "cdr", &[Value::Int(3)]),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn cons_aliases_its_tail() {
        let mut heap = Heap::new();
        let tail = heap.list_from(&[Value::Int(2), Value::Int(3)]);
        let pair = call(&mut heap, "cons", &[Value::Int(1), tail.clone()]).unwrap();
        let Value::Pair(id) = pair else {
            panic!("cons did not return a pair")
        };
        // The new cell's cdr is the very same cell chain, not a copy.
        assert_eq!(heap.cdr(id), tail);
    }

    #[test]
    fn append_copies_early_spines_and_aliases_the_last() {
        let mut heap = Heap::new();
        let front = heap.list_from(&[Value::Int(1), Value::Int(2)]);
        let back = heap.list_from(&[Value::Int(3), Value::Int(4)]);
        let joined = call(&mut heap, "append", &[front.clone(), back.clone()]).unwrap();

        assert_eq!(
            heap.list_to_vec(&joined),
            Some(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)])
        );
        // The front spine was copied; walking two cells in lands on `back` itself.
        let Value::Pair(first) = joined else { panic!() };
        assert_ne!(Value::Pair(first), front);
        let Value::Pair(second) = heap.cdr(first) else {
            panic!()
        };
        assert_eq!(heap.cdr(second), back);

        assert_eq!(call(&mut heap, "append", &[]).unwrap(), Value::Nil);
        let alone = call(&mut heap, "append", &[back.clone()]).unwrap();
        assert_eq!(alone, back);

        assert!(matches!(
            call(&mut heap, "append", &[Value::Int(1), Value::Nil]),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn reverse_and_length_require_proper_lists() {
        let mut heap = Heap::new();
        let list = heap.list_from(&[Value::Int(1), Value::Int(2), Value::Int(3)]);
        let reversed = call(&mut heap, "reverse", &[list.clone()]).unwrap();
        assert_eq!(
            heap.list_to_vec(&reversed),
            Some(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
        );
        // The input list is untouched.
        assert_eq!(
            heap.list_to_vec(&list),
            Some(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );

        assert_eq!(call(&mut heap, "length", &[list]).unwrap(), Value::Int(3));
        assert_eq!(call(&mut heap, "length", &[Value::Nil]).unwrap(), Value::Int(0));

        let dotted = heap.cons(Value::Int(1), Value::Int(2));
        assert!(matches!(
            call(&mut heap, "length", &[dotted]),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn structural_equality_covers_atoms_only() {
        use std::rc::Rc;
        let mut heap = Heap::new();

        assert_eq!(
            call(&mut heap, "equal?", &[Value::Int(1), Value::Int(1)]).unwrap(),
            Value::Bool(true)
        );
        // Different kinds compare unequal rather than erroring.
        assert_eq!(
            call(&mut heap, "equal?", &[Value::Int(1), Value::Real(1.0)]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            call(
                &mut heap,
                "equal?",
                &[Value::Str(Rc::from("a")), Value::Str(Rc::from("a"))]
            )
            .unwrap(),
            Value::Bool(true)
        );

        let a = heap.list_from(&[Value::Int(1)]);
        let b = heap.list_from(&[Value::Int(1)]);
        assert!(matches!(
            call(&mut heap, "equal?", &[a, b]),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn identity_equality_distinguishes_allocations() {
        use std::rc::Rc;
        let mut heap = Heap::new();

        let list = heap.list_from(&[Value::Int(1)]);
        assert_eq!(
            call(&mut heap, "eq?", &[list.clone(), list.clone()]).unwrap(),
            Value::Bool(true)
        );
        let other = heap.list_from(&[Value::Int(1)]);
        assert_eq!(
            call(&mut heap, "eq?", &[list, other]).unwrap(),
            Value::Bool(false)
        );

        let s = Value::Str(Rc::from("x"));
        assert_eq!(
            call(&mut heap, "eq?", &[s.clone(), s.clone()]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                &mut heap,
                "eq?",
                &[Value::Str(Rc::from("x")), Value::Str(Rc::from("x"))]
            )
            .unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn not_rejects_non_booleans() {
        let mut heap = Heap::new();
        assert_eq!(
            call(&mut heap, "not", &[Value::Bool(true)]).unwrap(),
            Value::Bool(false)
        );
        assert!(matches!(
            call(&mut heap, "not", &[Value::Int(0)]),
            Err(Error::TypeError(_))
        ));
    }
}
