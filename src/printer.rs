//! Value rendering.
//!
//! One rendering for both the driver's result echo and `display`. Reals keep
//! six fractional digits, strings render quoted, procedures render as opaque
//! tokens, and improper tails get an explicit dot.

use crate::heap::Heap;
use crate::symbol::SymbolTable;
use crate::value::Value;

/// Depth cutoff for nested structure; past it the printer emits `...`.
/// Printing is a reporting surface and must stay total no matter what the
/// heap holds.
const MAX_PRINT_DEPTH: usize = 1000;

/// Render a value as the driver and `display` show it.
pub fn print_value(value: &Value, heap: &Heap, symbols: &SymbolTable) -> String {
    print_inner(value, heap, symbols, 0)
}

fn print_inner(value: &Value, heap: &Heap, symbols: &SymbolTable, depth: usize) -> String {
    if depth > MAX_PRINT_DEPTH {
        return "...".to_string();
    }
    match value {
        Value::Int(i) => i.to_string(),
        Value::Real(r) => format!("{r:.6}"),
        Value::Bool(true) => "#t".to_string(),
        Value::Bool(false) => "#f".to_string(),
        Value::Str(s) => format!("\"{s}\""),
        Value::Symbol(sym) => symbols.name(*sym).to_string(),
        Value::Nil => "()".to_string(),
        Value::Void => "#<void>".to_string(),
        Value::Uninit => "#<uninitialized>".to_string(),
        Value::Closure(_) => "#<procedure>".to_string(),
        Value::Primitive(_) => "#<primitive>".to_string(),
        Value::Pair(id) => {
            let mut out = String::from("(");
            out.push_str(&print_inner(&heap.car(*id), heap, symbols, depth + 1));
            let mut cursor = heap.cdr(*id);
            loop {
                match cursor {
                    Value::Nil => break,
                    Value::Pair(next) => {
                        out.push(' ');
                        out.push_str(&print_inner(&heap.car(next), heap, symbols, depth + 1));
                        cursor = heap.cdr(next);
                    }
                    tail => {
                        out.push_str(" . ");
                        out.push_str(&print_inner(&tail, heap, symbols, depth + 1));
                        break;
                    }
                }
            }
            out.push(')');
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn atoms_render_with_fixed_tokens() {
        let heap = Heap::new();
        let mut symbols = SymbolTable::new();
        let foo = symbols.intern("foo");

        let cases: &[(Value, &str)] = &[
            (Value::Int(42), "42"),
            (Value::Int(-7), "-7"),
            (Value::Real(3.5), "3.500000"),
            (Value::Real(2.0), "2.000000"),
            (Value::Bool(true), "#t"),
            (Value::Bool(false), "#f"),
            (Value::Str(Rc::from("hi")), "\"hi\""),
            (Value::Symbol(foo), "foo"),
            (Value::Nil, "()"),
            (Value::Void, "#<void>"),
            (Value::Uninit, "#<uninitialized>"),
        ];
        for (value, expected) in cases {
            assert_eq!(print_value(value, &heap, &symbols), *expected);
        }
    }

    #[test]
    fn lists_render_space_separated() {
        let mut heap = Heap::new();
        let symbols = SymbolTable::new();

        let list = heap.list_from(&[Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(print_value(&list, &heap, &symbols), "(1 2 3)");

        let nested_head = heap.list_from(&[Value::Int(1)]);
        let nested = heap.list_from(&[nested_head, Value::Int(2)]);
        assert_eq!(print_value(&nested, &heap, &symbols), "((1) 2)");
    }

    #[test]
    fn improper_tails_get_an_explicit_dot() {
        let mut heap = Heap::new();
        let symbols = SymbolTable::new();

        let pair = heap.cons(Value::Int(1), Value::Int(2));
        assert_eq!(print_value(&pair, &heap, &symbols), "(1 . 2)");

        let tail = heap.cons(Value::Int(2), Value::Int(3));
        let longer = heap.cons(Value::Int(1), tail);
        assert_eq!(print_value(&longer, &heap, &symbols), "(1 2 . 3)");
    }

    #[test]
    fn procedures_render_as_opaque_tokens() {
        let mut heap = Heap::new();
        let symbols = SymbolTable::new();
        use crate::primitives::PRIMITIVES;
        use crate::value::{Closure, Params};

        assert_eq!(
            print_value(&Value::Primitive(&PRIMITIVES[0]), &heap, &symbols),
            "#<primitive>"
        );

        let global = heap.new_global();
        let closure = Value::Closure(Rc::new(Closure {
            params: Params::Fixed(vec![]),
            body: vec![Value::Int(1)],
            env: global,
        }));
        assert_eq!(print_value(&closure, &heap, &symbols), "#<procedure>");
    }

    #[test]
    fn deep_nesting_is_cut_off_rather_than_overflowing() {
        let mut heap = Heap::new();
        let symbols = SymbolTable::new();

        let mut value = Value::Nil;
        for _ in 0..(MAX_PRINT_DEPTH + 10) {
            value = heap.cons(value, Value::Nil);
        }
        let rendered = print_value(&value, &heap, &symbols);
        assert!(rendered.contains("..."));
    }
}
