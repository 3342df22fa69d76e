//! Symbol interning.
//!
//! Symbols are small copyable handles into a `SymbolTable`. Interning makes
//! symbol comparison an integer compare and lets the evaluator dispatch
//! special forms by matching on pre-interned keyword constants instead of
//! scanning keyword strings on every form.

use std::collections::HashMap;

/// An interned symbol. Two symbols are the same name iff their handles are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(pub u32);

/// Handles for the special-form keywords, interned ahead of any user code.
///
/// These must match the order of interning in `SymbolTable::new()`.
pub mod kw {
    use super::Symbol;

    pub const IF: Symbol = Symbol(0);
    pub const WHEN: Symbol = Symbol(1);
    pub const UNLESS: Symbol = Symbol(2);
    pub const LET: Symbol = Symbol(3);
    pub const LET_STAR: Symbol = Symbol(4);
    pub const LETREC: Symbol = Symbol(5);
    pub const LAMBDA: Symbol = Symbol(6);
    pub const DEFINE: Symbol = Symbol(7);
    pub const SET_BANG: Symbol = Symbol(8);
    pub const BEGIN: Symbol = Symbol(9);
    pub const COND: Symbol = Symbol(10);
    pub const AND: Symbol = Symbol(11);
    pub const OR: Symbol = Symbol(12);
    pub const QUOTE: Symbol = Symbol(13);
    pub const DISPLAY: Symbol = Symbol(14);
    pub const LOAD: Symbol = Symbol(15);
    /// Not a special form itself; recognized inside `cond` clauses.
    pub const ELSE: Symbol = Symbol(16);
}

/// The keyword spellings, in handle order.
const KEYWORDS: &[&str] = &[
    "if", "when", "unless", "let", "let*", "letrec", "lambda", "define", "set!", "begin", "cond",
    "and", "or", "quote", "display", "load", "else",
];

/// Two-sided intern table: name to handle and handle to name.
#[derive(Debug)]
pub struct SymbolTable {
    name_to_id: HashMap<String, Symbol>,
    id_to_name: Vec<String>,
}

impl SymbolTable {
    /// Create a table with the special-form keywords already interned at the
    /// handles the `kw` constants name.
    pub fn new() -> Self {
        let mut table = SymbolTable {
            name_to_id: HashMap::new(),
            id_to_name: Vec::new(),
        };
        for name in KEYWORDS {
            table.intern(name);
        }
        table
    }

    /// Intern a name, returning the existing handle if it is already known.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = Symbol(self.id_to_name.len() as u32);
        self.id_to_name.push(name.to_string());
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    /// The spelling of an interned symbol.
    pub fn name(&self, id: Symbol) -> &str {
        &self.id_to_name[id.0 as usize]
    }

    /// Look up a name without interning it.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.name_to_id.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
