//! The allocation arena.
//!
//! Every cons cell and every environment frame lives in a slot vector here,
//! addressed by typed handles. Handles make shared tails and closure-captured
//! frames representable without lifetime entanglement; the price is that
//! reclamation is explicit. [`Heap::collect`] is a stop-the-world mark/sweep
//! pass over both slot vectors, called by the driver between top-level forms
//! and never during evaluation.
//!
//! Cells are immutable once allocated (the language has no `set-car!`), so
//! cell graphs are acyclic by construction. Frames are the mutable half:
//! their binding slots are rewritten in place by `set!`, `define`
//! redefinition, and `letrec` initialization, and every closure holding the
//! `FrameId` observes those writes.

use std::collections::HashMap;

use log::debug;

use crate::Error;
use crate::symbol::{Symbol, SymbolTable};
use crate::value::Value;

/// Handle to a cons cell slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(pub u32);

/// Handle to a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

#[derive(Debug)]
struct CellSlot {
    car: Value,
    cdr: Value,
    marked: bool,
    live: bool,
}

#[derive(Debug)]
struct FrameSlot {
    bindings: HashMap<Symbol, Value>,
    parent: Option<FrameId>,
    marked: bool,
    live: bool,
}

/// Owner of all cells and frames.
#[derive(Debug, Default)]
pub struct Heap {
    cells: Vec<CellSlot>,
    free_cells: Vec<u32>,
    frames: Vec<FrameSlot>,
    free_frames: Vec<u32>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    // ---- cells ----

    /// Allocate a cons cell. The new cell aliases both arguments; it never
    /// copies structure.
    pub fn cons(&mut self, car: Value, cdr: Value) -> Value {
        let slot = CellSlot {
            car,
            cdr,
            marked: false,
            live: true,
        };
        let id = match self.free_cells.pop() {
            Some(idx) => {
                self.cells[idx as usize] = slot;
                CellId(idx)
            }
            None => {
                self.cells.push(slot);
                CellId((self.cells.len() - 1) as u32)
            }
        };
        Value::Pair(id)
    }

    pub fn car(&self, id: CellId) -> Value {
        let slot = &self.cells[id.0 as usize];
        debug_assert!(slot.live, "car of reclaimed cell");
        slot.car.clone()
    }

    pub fn cdr(&self, id: CellId) -> Value {
        let slot = &self.cells[id.0 as usize];
        debug_assert!(slot.live, "cdr of reclaimed cell");
        slot.cdr.clone()
    }

    /// Build a proper list from a slice, right to left.
    pub fn list_from(&mut self, items: &[Value]) -> Value {
        let mut list = Value::Nil;
        for item in items.iter().rev() {
            list = self.cons(item.clone(), list);
        }
        list
    }

    /// Flatten a proper list into a vector. Returns `None` for anything that
    /// is not a chain of cells ending in the empty list.
    pub fn list_to_vec(&self, list: &Value) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut cursor = list.clone();
        loop {
            match cursor {
                Value::Nil => return Some(items),
                Value::Pair(id) => {
                    items.push(self.car(id));
                    cursor = self.cdr(id);
                }
                _ => return None,
            }
        }
    }

    pub fn is_proper_list(&self, v: &Value) -> bool {
        let mut cursor = v.clone();
        loop {
            match cursor {
                Value::Nil => return true,
                Value::Pair(id) => cursor = self.cdr(id),
                _ => return false,
            }
        }
    }

    // ---- frames ----

    /// Create the root frame. Called once per interpreter.
    pub fn new_global(&mut self) -> FrameId {
        self.alloc_frame(None)
    }

    /// Create a child frame for a `let`/`letrec`/application scope.
    pub fn new_frame(&mut self, parent: FrameId) -> FrameId {
        self.alloc_frame(Some(parent))
    }

    fn alloc_frame(&mut self, parent: Option<FrameId>) -> FrameId {
        let slot = FrameSlot {
            bindings: HashMap::new(),
            parent,
            marked: false,
            live: true,
        };
        match self.free_frames.pop() {
            Some(idx) => {
                self.frames[idx as usize] = slot;
                FrameId(idx)
            }
            None => {
                self.frames.push(slot);
                FrameId((self.frames.len() - 1) as u32)
            }
        }
    }

    /// Resolve a symbol through the frame chain, innermost first.
    pub fn lookup(
        &self,
        frame: FrameId,
        sym: Symbol,
        symbols: &SymbolTable,
    ) -> Result<Value, Error> {
        let mut cursor = Some(frame);
        while let Some(id) = cursor {
            let slot = &self.frames[id.0 as usize];
            debug_assert!(slot.live, "lookup in reclaimed frame");
            if let Some(value) = slot.bindings.get(&sym) {
                return Ok(value.clone());
            }
            cursor = slot.parent;
        }
        Err(Error::UnboundSymbol(symbols.name(sym).to_string()))
    }

    /// Insert a new binding in this frame only. An existing initialized
    /// binding is a duplicate; an `Uninit` placeholder may be overwritten
    /// (recursive-binding construction).
    pub fn bind(
        &mut self,
        frame: FrameId,
        sym: Symbol,
        value: Value,
        symbols: &SymbolTable,
    ) -> Result<(), Error> {
        let slot = &mut self.frames[frame.0 as usize];
        match slot.bindings.get(&sym) {
            Some(existing) if !matches!(existing, Value::Uninit) => {
                Err(Error::DuplicateBinding(symbols.name(sym).to_string()))
            }
            _ => {
                slot.bindings.insert(sym, value);
                Ok(())
            }
        }
    }

    /// Overwrite an existing binding found through the chain (`set!`).
    pub fn rebind(
        &mut self,
        frame: FrameId,
        sym: Symbol,
        value: Value,
        symbols: &SymbolTable,
    ) -> Result<(), Error> {
        let mut cursor = Some(frame);
        while let Some(id) = cursor {
            let slot = &mut self.frames[id.0 as usize];
            if let Some(cell) = slot.bindings.get_mut(&sym) {
                *cell = value;
                return Ok(());
            }
            cursor = slot.parent;
        }
        Err(Error::UnboundSymbol(symbols.name(sym).to_string()))
    }

    /// Replace an `Uninit` placeholder with its evaluated value (`letrec`
    /// pass two). The slot must exist and still hold the placeholder.
    pub fn init_recursive(
        &mut self,
        frame: FrameId,
        sym: Symbol,
        value: Value,
        symbols: &SymbolTable,
    ) -> Result<(), Error> {
        let slot = &mut self.frames[frame.0 as usize];
        match slot.bindings.get_mut(&sym) {
            Some(cell) if matches!(cell, Value::Uninit) => {
                *cell = value;
                Ok(())
            }
            Some(_) => Err(Error::EvalError(format!(
                "letrec: binding '{}' modified before initialization completed",
                symbols.name(sym)
            ))),
            None => Err(Error::Internal(format!(
                "letrec initialization of unbound symbol '{}'",
                symbols.name(sym)
            ))),
        }
    }

    /// The root of the chain containing `frame`.
    pub fn global_of(&self, frame: FrameId) -> FrameId {
        let mut id = frame;
        while let Some(parent) = self.frames[id.0 as usize].parent {
            id = parent;
        }
        id
    }

    /// Insert or overwrite a binding in the global frame (`define`).
    pub fn define_global(&mut self, frame: FrameId, sym: Symbol, value: Value) {
        let global = self.global_of(frame);
        self.frames[global.0 as usize].bindings.insert(sym, value);
    }

    // ---- collection ----

    pub fn live_cells(&self) -> usize {
        self.cells.iter().filter(|s| s.live).count()
    }

    pub fn live_frames(&self) -> usize {
        self.frames.iter().filter(|s| s.live).count()
    }

    /// Mark/sweep over both slot vectors. Everything reachable from the
    /// given roots survives; everything else is reclaimed and its slot put
    /// on the free list. Marking traverses cell cars/cdrs, frame bindings
    /// and parents, and closures (body forms plus captured frame).
    ///
    /// Must only run between top-level evaluations: the evaluator's
    /// temporaries are not enumerable as roots.
    pub fn collect(&mut self, value_roots: &[Value], frame_roots: &[FrameId]) {
        let mut pending_cells: Vec<CellId> = Vec::new();
        let mut pending_frames: Vec<FrameId> = frame_roots.to_vec();
        for root in value_roots {
            trace_value(root, &mut pending_cells, &mut pending_frames);
        }

        loop {
            if let Some(id) = pending_cells.pop() {
                let slot = &mut self.cells[id.0 as usize];
                if slot.marked || !slot.live {
                    continue;
                }
                slot.marked = true;
                let car = slot.car.clone();
                let cdr = slot.cdr.clone();
                trace_value(&car, &mut pending_cells, &mut pending_frames);
                trace_value(&cdr, &mut pending_cells, &mut pending_frames);
            } else if let Some(id) = pending_frames.pop() {
                let slot = &mut self.frames[id.0 as usize];
                if slot.marked || !slot.live {
                    continue;
                }
                slot.marked = true;
                if let Some(parent) = slot.parent {
                    pending_frames.push(parent);
                }
                let bound: Vec<Value> = slot.bindings.values().cloned().collect();
                for value in &bound {
                    trace_value(value, &mut pending_cells, &mut pending_frames);
                }
            } else {
                break;
            }
        }

        let mut freed_cells = 0usize;
        for (idx, slot) in self.cells.iter_mut().enumerate() {
            if !slot.live {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                slot.live = false;
                slot.car = Value::Nil;
                slot.cdr = Value::Nil;
                self.free_cells.push(idx as u32);
                freed_cells += 1;
            }
        }

        let mut freed_frames = 0usize;
        for (idx, slot) in self.frames.iter_mut().enumerate() {
            if !slot.live {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                slot.live = false;
                slot.bindings.clear();
                slot.parent = None;
                self.free_frames.push(idx as u32);
                freed_frames += 1;
            }
        }

        debug!(
            "collect: freed {freed_cells} cells and {freed_frames} frames, {} cells and {} frames live",
            self.cells.len() - self.free_cells.len(),
            self.frames.len() - self.free_frames.len()
        );
    }
}

/// Push the handles a value holds onto the mark worklists. Closures are not
/// arena slots themselves, so they carry no mark bit; the cells and frames
/// they reach are deduplicated by their own marks.
fn trace_value(value: &Value, cells: &mut Vec<CellId>, frames: &mut Vec<FrameId>) {
    match value {
        Value::Pair(id) => cells.push(*id),
        Value::Closure(closure) => {
            frames.push(closure.env);
            for form in &closure.body {
                trace_value(form, cells, frames);
            }
        }
        _ => {}
    }
}
