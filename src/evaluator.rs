//! The eval/apply core.
//!
//! `Interp` owns all interpreter state (heap, symbol table, global frame) so
//! the driver can enumerate collection roots. Evaluation is one recursive
//! dispatch over the expression's variant: atoms evaluate to themselves,
//! symbols resolve through the frame chain, and pairs are either special
//! forms or applications.
//!
//! Special forms are recognized syntactically: a pair whose head is a symbol
//! naming one of the sixteen forms always dispatches to its handler, before
//! and regardless of any binding for that symbol. The keyword set is closed,
//! so recognition is a single integer match on pre-interned handles rather
//! than a string comparison per form.
//!
//! Evaluation depth is tracked so runaway interpreted recursion surfaces as
//! a reported error instead of exhausting the native stack.

use std::rc::Rc;

use log::debug;

use crate::heap::{FrameId, Heap};
use crate::primitives;
use crate::reader;
use crate::symbol::{Symbol, SymbolTable, kw};
use crate::value::{Closure, Params, Value};
use crate::{Error, MAX_EVAL_DEPTH};

/// The closed set of special forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialForm {
    If,
    When,
    Unless,
    Let,
    LetStar,
    Letrec,
    Lambda,
    Define,
    SetBang,
    Begin,
    Cond,
    And,
    Or,
    Quote,
    Display,
    Load,
}

fn special_form(sym: Symbol) -> Option<SpecialForm> {
    match sym {
        kw::IF => Some(SpecialForm::If),
        kw::WHEN => Some(SpecialForm::When),
        kw::UNLESS => Some(SpecialForm::Unless),
        kw::LET => Some(SpecialForm::Let),
        kw::LET_STAR => Some(SpecialForm::LetStar),
        kw::LETREC => Some(SpecialForm::Letrec),
        kw::LAMBDA => Some(SpecialForm::Lambda),
        kw::DEFINE => Some(SpecialForm::Define),
        kw::SET_BANG => Some(SpecialForm::SetBang),
        kw::BEGIN => Some(SpecialForm::Begin),
        kw::COND => Some(SpecialForm::Cond),
        kw::AND => Some(SpecialForm::And),
        kw::OR => Some(SpecialForm::Or),
        kw::QUOTE => Some(SpecialForm::Quote),
        kw::DISPLAY => Some(SpecialForm::Display),
        kw::LOAD => Some(SpecialForm::Load),
        _ => None,
    }
}

/// Conditions in `if`/`when`/`unless`/`cond`/`and`/`or` must be actual
/// booleans; there is no truthiness.
fn expect_condition(name: &str, value: Value) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(Error::TypeError(format!(
            "{name}: expected a boolean condition, got {}",
            other.type_name()
        ))),
    }
}

/// The interpreter: heap, symbols, and the global frame.
pub struct Interp {
    pub heap: Heap,
    pub symbols: SymbolTable,
    global: FrameId,
}

impl Interp {
    /// A fresh interpreter with the primitives installed.
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let mut symbols = SymbolTable::new();
        let global = heap.new_global();
        primitives::install(&mut heap, &mut symbols, global);
        Interp {
            heap,
            symbols,
            global,
        }
    }

    pub fn global(&self) -> FrameId {
        self.global
    }

    /// Evaluate a top-level form against the global frame.
    pub fn eval_top(&mut self, form: &Value) -> Result<Value, Error> {
        self.eval(form, self.global, 0)
    }

    fn eval(&mut self, expr: &Value, frame: FrameId, depth: usize) -> Result<Value, Error> {
        if depth >= MAX_EVAL_DEPTH {
            debug!("evaluation depth limit reached");
            return Err(Error::EvalError(format!(
                "evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
            )));
        }
        match expr {
            Value::Symbol(sym) => {
                let value = self.heap.lookup(frame, *sym, &self.symbols)?;
                if matches!(value, Value::Uninit) {
                    return Err(Error::EvalError(format!(
                        "symbol '{}' referenced before initialization",
                        self.symbols.name(*sym)
                    )));
                }
                Ok(value)
            }
            Value::Pair(id) => {
                let head = self.heap.car(*id);
                let rest = self.heap.cdr(*id);
                let operands = self
                    .heap
                    .list_to_vec(&rest)
                    .ok_or_else(|| Error::EvalError("form is not a proper list".to_string()))?;
                if let Some(sym) = head.as_symbol()
                    && let Some(form) = special_form(sym)
                {
                    return self.eval_special(form, &operands, frame, depth);
                }
                self.eval_application(&head, &operands, frame, depth)
            }
            // Numbers, strings, booleans, nil, void, the uninitialized
            // sentinel, and procedure values all evaluate to themselves.
            other => Ok(other.clone()),
        }
    }

    /// Evaluate operator and operands strictly left to right, then invoke.
    fn eval_application(
        &mut self,
        head: &Value,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        let operator = self.eval(head, frame, depth + 1)?;
        let mut args = Vec::with_capacity(operands.len());
        for operand in operands {
            args.push(self.eval(operand, frame, depth + 1)?);
        }
        match operator {
            Value::Primitive(op) => {
                op.arity.check(op.name, args.len())?;
                (op.run)(&mut self.heap, &args)
            }
            Value::Closure(closure) => self.apply(&closure, &args, depth),
            other => Err(Error::TypeError(format!(
                "not a procedure: {}",
                other.type_name()
            ))),
        }
    }

    /// Call a closure: fresh frame under the captured one, parameters bound
    /// positionally or (for a bare-symbol parameter list) the whole argument
    /// list bound to the one name, body evaluated in sequence.
    fn apply(
        &mut self,
        closure: &Rc<Closure>,
        args: &[Value],
        depth: usize,
    ) -> Result<Value, Error> {
        let call_frame = self.heap.new_frame(closure.env);
        match &closure.params {
            Params::Fixed(params) => {
                if params.len() != args.len() {
                    return Err(Error::arity_error("#<procedure>", params.len(), args.len()));
                }
                for (param, arg) in params.iter().zip(args) {
                    self.heap
                        .bind(call_frame, *param, arg.clone(), &self.symbols)?;
                }
            }
            Params::Variadic(param) => {
                let arg_list = self.heap.list_from(args);
                self.heap
                    .bind(call_frame, *param, arg_list, &self.symbols)?;
            }
        }
        self.eval_body(&closure.body, call_frame, depth)
    }

    /// Evaluate forms in sequence; an empty sequence is void.
    fn eval_body(&mut self, forms: &[Value], frame: FrameId, depth: usize) -> Result<Value, Error> {
        let mut result = Value::Void;
        for form in forms {
            result = self.eval(form, frame, depth + 1)?;
        }
        Ok(result)
    }

    fn eval_special(
        &mut self,
        form: SpecialForm,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        match form {
            SpecialForm::If => self.eval_if(operands, frame, depth),
            SpecialForm::When => self.eval_when_unless("when", true, operands, frame, depth),
            SpecialForm::Unless => self.eval_when_unless("unless", false, operands, frame, depth),
            SpecialForm::Let => self.eval_let(operands, frame, depth),
            SpecialForm::LetStar => self.eval_let_star(operands, frame, depth),
            SpecialForm::Letrec => self.eval_letrec(operands, frame, depth),
            SpecialForm::Lambda => self.eval_lambda(operands, frame),
            SpecialForm::Define => self.eval_define(operands, frame, depth),
            SpecialForm::SetBang => self.eval_set_bang(operands, frame, depth),
            SpecialForm::Begin => self.eval_body(operands, frame, depth),
            SpecialForm::Cond => self.eval_cond(operands, frame, depth),
            SpecialForm::And => self.eval_and(operands, frame, depth),
            SpecialForm::Or => self.eval_or(operands, frame, depth),
            SpecialForm::Quote => match operands {
                [expr] => Ok(expr.clone()),
                _ => Err(Error::arity_error("quote", 1, operands.len())),
            },
            SpecialForm::Display => self.eval_display(operands, frame, depth),
            SpecialForm::Load => self.eval_load(operands, frame, depth),
        }
    }

    fn eval_if(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        if operands.len() != 3 {
            return Err(Error::arity_error("if", 3, operands.len()));
        }
        let cond = expect_condition("if", self.eval(&operands[0], frame, depth + 1)?)?;
        if cond {
            self.eval(&operands[1], frame, depth + 1)
        } else {
            self.eval(&operands[2], frame, depth + 1)
        }
    }

    fn eval_when_unless(
        &mut self,
        name: &str,
        run_on: bool,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        if operands.len() < 2 {
            return Err(Error::arity_error_min(name, 2, operands.len()));
        }
        let cond = expect_condition(name, self.eval(&operands[0], frame, depth + 1)?)?;
        if cond == run_on {
            self.eval_body(&operands[1..], frame, depth)
        } else {
            Ok(Value::Void)
        }
    }

    /// Parse a `((name expr) ...)` binding list without evaluating anything.
    fn parse_bindings(&self, name: &str, form: &Value) -> Result<Vec<(Symbol, Value)>, Error> {
        let entries = self.heap.list_to_vec(form).ok_or_else(|| {
            Error::BadSpecialForm(format!(
                "{name}: bindings must be a list of (name expression) pairs"
            ))
        })?;
        let mut bindings = Vec::with_capacity(entries.len());
        for entry in &entries {
            let parts = self.heap.list_to_vec(entry);
            match parts.as_deref() {
                Some([Value::Symbol(sym), expr]) => bindings.push((*sym, expr.clone())),
                _ => {
                    return Err(Error::BadSpecialForm(format!(
                        "{name}: each binding must be a (name expression) pair"
                    )));
                }
            }
        }
        Ok(bindings)
    }

    fn eval_let(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        if operands.len() < 2 {
            return Err(Error::arity_error_min("let", 2, operands.len()));
        }
        let bindings = self.parse_bindings("let", &operands[0])?;
        // Binding expressions see only the enclosing frame, never each other.
        let mut evaluated = Vec::with_capacity(bindings.len());
        for (name, expr) in &bindings {
            evaluated.push((*name, self.eval(expr, frame, depth + 1)?));
        }
        let let_frame = self.heap.new_frame(frame);
        for (name, value) in evaluated {
            self.heap.bind(let_frame, name, value, &self.symbols)?;
        }
        self.eval_body(&operands[1..], let_frame, depth)
    }

    /// A chain of single-binding frames, so each expression sees all earlier
    /// bindings of the same `let*`. Zero bindings means no new frame at all.
    fn eval_let_star(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        if operands.len() < 2 {
            return Err(Error::arity_error_min("let*", 2, operands.len()));
        }
        let bindings = self.parse_bindings("let*", &operands[0])?;
        let mut current = frame;
        for (name, expr) in &bindings {
            let value = self.eval(expr, current, depth + 1)?;
            let link = self.heap.new_frame(current);
            self.heap.bind(link, *name, value, &self.symbols)?;
            current = link;
        }
        self.eval_body(&operands[1..], current, depth)
    }

    /// Two passes: install every name as a placeholder, then evaluate each
    /// initializer with all names in scope and write the results back in
    /// place.
    fn eval_letrec(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        if operands.len() < 2 {
            return Err(Error::arity_error_min("letrec", 2, operands.len()));
        }
        let bindings = self.parse_bindings("letrec", &operands[0])?;
        let rec_frame = self.heap.new_frame(frame);
        for (name, _) in &bindings {
            self.heap
                .bind(rec_frame, *name, Value::Uninit, &self.symbols)?;
        }
        for (name, expr) in &bindings {
            let value = self.eval(expr, rec_frame, depth + 1)?;
            self.heap
                .init_recursive(rec_frame, *name, value, &self.symbols)?;
        }
        self.eval_body(&operands[1..], rec_frame, depth)
    }

    /// `params` is `()`, a proper list of unique symbols, or one bare symbol
    /// that receives the whole argument list.
    fn parse_params(&self, name: &str, form: &Value) -> Result<Params, Error> {
        match form {
            Value::Symbol(sym) => Ok(Params::Variadic(*sym)),
            Value::Nil => Ok(Params::Fixed(Vec::new())),
            Value::Pair(_) => {
                let entries = self.heap.list_to_vec(form).ok_or_else(|| {
                    Error::BadSpecialForm(format!("{name}: parameter list must be a proper list"))
                })?;
                let mut params = Vec::with_capacity(entries.len());
                for entry in &entries {
                    let Some(sym) = entry.as_symbol() else {
                        return Err(Error::BadSpecialForm(format!(
                            "{name}: parameters must be symbols, got {}",
                            entry.type_name()
                        )));
                    };
                    if params.contains(&sym) {
                        return Err(Error::DuplicateBinding(self.symbols.name(sym).to_string()));
                    }
                    params.push(sym);
                }
                Ok(Params::Fixed(params))
            }
            other => Err(Error::BadSpecialForm(format!(
                "{name}: invalid parameter specification, got {}",
                other.type_name()
            ))),
        }
    }

    fn eval_lambda(&mut self, operands: &[Value], frame: FrameId) -> Result<Value, Error> {
        if operands.len() < 2 {
            return Err(Error::arity_error_min("lambda", 2, operands.len()));
        }
        let params = self.parse_params("lambda", &operands[0])?;
        Ok(Value::Closure(Rc::new(Closure {
            params,
            body: operands[1..].to_vec(),
            env: frame,
        })))
    }

    /// Both shapes bind into the global frame, overwriting any existing
    /// binding in place. The value expression (or the synthesized closure)
    /// still sees the frame that issued the `define`.
    fn eval_define(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        match operands {
            [Value::Symbol(sym), expr] => {
                let value = self.eval(expr, frame, depth + 1)?;
                self.heap.define_global(frame, *sym, value);
                Ok(Value::Void)
            }
            [Value::Pair(id), body @ ..] if !body.is_empty() => {
                // (define (name params...) body...) is lambda sugar.
                let head = self.heap.car(*id);
                let Some(sym) = head.as_symbol() else {
                    return Err(Error::BadSpecialForm(format!(
                        "define: procedure name must be a symbol, got {}",
                        head.type_name()
                    )));
                };
                let param_list = self.heap.cdr(*id);
                let params = self.parse_params("define", &param_list)?;
                let closure = Value::Closure(Rc::new(Closure {
                    params,
                    body: body.to_vec(),
                    env: frame,
                }));
                self.heap.define_global(frame, sym, closure);
                Ok(Value::Void)
            }
            _ => Err(Error::BadSpecialForm(
                "define: expected (define name expression) or (define (name params...) body...)"
                    .to_string(),
            )),
        }
    }

    fn eval_set_bang(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        match operands {
            [Value::Symbol(sym), expr] => {
                let value = self.eval(expr, frame, depth + 1)?;
                self.heap.rebind(frame, *sym, value, &self.symbols)?;
                Ok(Value::Void)
            }
            [other, _] => Err(Error::BadSpecialForm(format!(
                "set!: target must be a symbol, got {}",
                other.type_name()
            ))),
            _ => Err(Error::arity_error("set!", 2, operands.len())),
        }
    }

    fn eval_cond(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        // Validate the whole clause list before evaluating any test.
        let mut clauses = Vec::with_capacity(operands.len());
        for (index, clause_form) in operands.iter().enumerate() {
            let clause = self.heap.list_to_vec(clause_form).ok_or_else(|| {
                Error::BadSpecialForm("cond: each clause must be a (test body...) list".to_string())
            })?;
            if clause.is_empty() {
                return Err(Error::BadSpecialForm("cond: empty clause".to_string()));
            }
            let is_else = clause[0].as_symbol() == Some(kw::ELSE);
            if is_else {
                if index != operands.len() - 1 {
                    return Err(Error::BadSpecialForm(
                        "cond: else clause must be last".to_string(),
                    ));
                }
                if clause.len() < 2 {
                    return Err(Error::BadSpecialForm(
                        "cond: else clause needs at least one body form".to_string(),
                    ));
                }
            }
            clauses.push((is_else, clause));
        }
        for (is_else, clause) in &clauses {
            let take =
                *is_else || expect_condition("cond", self.eval(&clause[0], frame, depth + 1)?)?;
            if take {
                return self.eval_body(&clause[1..], frame, depth);
            }
        }
        Ok(Value::Void)
    }

    fn eval_and(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        for operand in operands {
            if !expect_condition("and", self.eval(operand, frame, depth + 1)?)? {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    }

    fn eval_or(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        for operand in operands {
            if expect_condition("or", self.eval(operand, frame, depth + 1)?)? {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    }

    fn eval_display(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        match operands {
            [expr] => {
                let value = self.eval(expr, frame, depth + 1)?;
                // No trailing newline; the driver only adds one when echoing
                // top-level results.
                print!(
                    "{}",
                    crate::printer::print_value(&value, &self.heap, &self.symbols)
                );
                Ok(Value::Void)
            }
            _ => Err(Error::arity_error("display", 1, operands.len())),
        }
    }

    /// Read a file, parse it, and evaluate its forms in order against the
    /// global frame regardless of where the `load` appeared. Returns the
    /// last form's value.
    fn eval_load(
        &mut self,
        operands: &[Value],
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        match operands {
            [expr] => {
                let path_value = self.eval(expr, frame, depth + 1)?;
                let Value::Str(path) = path_value else {
                    return Err(Error::TypeError(format!(
                        "load: expected a string path, got {}",
                        path_value.type_name()
                    )));
                };
                let source = std::fs::read_to_string(path.as_ref())
                    .map_err(|e| Error::EvalError(format!("load: cannot read '{path}': {e}")))?;
                let forms = reader::read_program(&source, &mut self.heap, &mut self.symbols)?;
                let global = self.global;
                let mut result = Value::Void;
                for form in &forms {
                    result = self.eval(form, global, depth + 1)?;
                }
                Ok(result)
            }
            _ => Err(Error::arity_error("load", 1, operands.len())),
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_value;
    use crate::reader::read_program;

    /// Expected outcome of evaluating the last form of a test program.
    enum Expect {
        /// The final value renders as this text.
        Renders(&'static str),
        /// The final form evaluates to void.
        IsVoid,
        /// Evaluation fails with a user-class error.
        UserError,
        /// Evaluation fails with a user-class error whose rendering contains
        /// the fragment.
        ErrorContaining(&'static str),
    }
    use Expect::*;

    fn run_program(source: &str) -> (Interp, Result<Value, Error>) {
        let mut interp = Interp::new();
        let result =
            read_program(source, &mut interp.heap, &mut interp.symbols).and_then(|forms| {
                let mut last = Value::Void;
                for form in &forms {
                    last = interp.eval_top(form)?;
                }
                Ok(last)
            });
        (interp, result)
    }

    fn check(cases: &[(&str, Expect)]) {
        for (source, expected) in cases {
            let (interp, result) = run_program(source);
            match (result, expected) {
                (Ok(value), Renders(text)) => {
                    let rendered = print_value(&value, &interp.heap, &interp.symbols);
                    assert_eq!(&rendered, text, "program: {source}");
                }
                (Ok(value), IsVoid) => {
                    assert!(matches!(value, Value::Void), "program: {source}")
                }
                (Ok(value), UserError | ErrorContaining(_)) => panic!(
                    "program: {source}: expected an error, got {}",
                    print_value(&value, &interp.heap, &interp.symbols)
                ),
                (Err(e), UserError) => {
                    assert!(!e.is_internal(), "program: {source}: internal error: {e}")
                }
                (Err(e), ErrorContaining(text)) => {
                    assert!(!e.is_internal(), "program: {source}: internal error: {e}");
                    let message = e.to_string();
                    assert!(
                        message.contains(text),
                        "program: {source}: error '{message}' does not contain '{text}'"
                    );
                }
                (Err(e), Renders(_) | IsVoid) => {
                    panic!("program: {source}: unexpected error: {e}")
                }
            }
        }
    }

    #[test]
    fn atoms_and_quotation() {
        check(&[
            ("42", Renders("42")),
            ("-17", Renders("-17")),
            ("2.5", Renders("2.500000")),
            ("#t", Renders("#t")),
            ("\"hello\"", Renders("\"hello\"")),
            ("'()", Renders("()")),
            ("'(a b c)", Renders("(a b c)")),
            ("''a", Renders("(quote a)")),
            ("(quote (1 2))", Renders("(1 2)")),
            ("(quote)", ErrorContaining("quote")),
            ("(quote 1 2)", ErrorContaining("quote")),
        ]);
    }

    #[test]
    fn arithmetic_follows_the_numeric_tower() {
        check(&[
            ("(+ 1 2)", Renders("3")),
            ("(+ 1 2.5)", Renders("3.500000")),
            ("(+)", Renders("0")),
            ("(*)", Renders("1")),
            ("(* 2 3.0)", Renders("6.000000")),
            ("(- 10 3 2)", Renders("5")),
            ("(- 5)", ErrorContaining("-")),
            ("(/ 6 3)", Renders("2")),
            ("(/ 7 2)", Renders("3.500000")),
            ("(/ 1 0)", ErrorContaining("division by zero")),
            ("(modulo 7 3)", Renders("1")),
            ("(modulo 7 0)", ErrorContaining("modulo")),
            ("(modulo 7 2.0)", ErrorContaining("integer")),
            ("(+ 1 #t)", ErrorContaining("+")),
            ("(+ 9223372036854775807 1)", ErrorContaining("overflow")),
            ("(= 1 1.0)", Renders("#t")),
            ("(= 1 1 2)", Renders("#f")),
            ("(< 1 2)", Renders("#t")),
            ("(> 1 2.5)", Renders("#f")),
        ]);
    }

    #[test]
    fn let_binds_in_the_enclosing_frame() {
        check(&[
            ("(let ((x 1)) (let ((x 2)) x))", Renders("2")),
            ("(define x 1) (let ((x 2)) x) x", Renders("1")),
            ("(let ((x 1) (y x)) y)", ErrorContaining("Unbound symbol: x")),
            ("(let ((x 1) (x 2)) x)", ErrorContaining("Duplicate binding")),
            ("(let ((x 1)) (set! x 9) x)", Renders("9")),
            ("(let (x) x)", ErrorContaining("binding")),
            ("(let ((x 1)))", ErrorContaining("let")),
        ]);
    }

    #[test]
    fn let_star_chains_bindings() {
        check(&[
            ("(let* ((x 1) (y (+ x 1))) y)", Renders("2")),
            ("(let* ((x 1) (x (+ x 1))) x)", Renders("2")),
            ("(let* () 5)", Renders("5")),
        ]);
    }

    #[test]
    fn letrec_supports_recursion() {
        check(&[
            (
                "(letrec ((f (lambda (n) (if (= n 0) 1 (* n (f (- n 1))))))) (f 5))",
                Renders("120"),
            ),
            (
                "(letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
                          (odd? (lambda (n) (if (= n 0) #f (even? (- n 1))))))
                   (even? 10))",
                Renders("#t"),
            ),
            (
                "(letrec ((a b) (b 1)) a)",
                ErrorContaining("before initialization"),
            ),
            (
                "(letrec ((x 1) (x 2)) x)",
                ErrorContaining("modified before initialization"),
            ),
            (
                "(letrec ((x (begin (set! x 5) 1))) x)",
                ErrorContaining("modified before initialization"),
            ),
        ]);
    }

    #[test]
    fn define_targets_the_global_frame() {
        check(&[
            ("(define (f x) (+ x 1)) (f 4)", Renders("5")),
            (
                "(define (f x) (+ x 1)) (define (f x) (+ x 2)) (f 4)",
                Renders("6"),
            ),
            (
                "(define (outer) (define inner 42) 0) (outer) inner",
                Renders("42"),
            ),
            ("(define x 1) (define x 2) x", Renders("2")),
            ("(define x 1 2)", ErrorContaining("define")),
            ("(define 5 1)", ErrorContaining("define")),
            ("(define x 1)", IsVoid),
        ]);
    }

    #[test]
    fn set_requires_a_prior_binding() {
        check(&[
            ("(set! y 10)", ErrorContaining("Unbound symbol: y")),
            ("(define y 1) (set! y 10) y", Renders("10")),
            ("(define y 1) (set! y 10)", IsVoid),
            ("(set! 5 1)", ErrorContaining("set!")),
        ]);
    }

    #[test]
    fn closures_capture_their_defining_frame() {
        check(&[
            (
                "(define (make-adder n) (lambda (x) (+ x n)))
                 (define add2 (make-adder 2))
                 (add2 5)",
                Renders("7"),
            ),
            (
                "(define (make-counter) (let ((n 0)) (lambda () (set! n (+ n 1)) n)))
                 (define c (make-counter))
                 (c) (c)",
                Renders("2"),
            ),
            ("((lambda (x) x) 5)", Renders("5")),
            (
                "(define f (lambda args args)) (f 1 2 3)",
                Renders("(1 2 3)"),
            ),
            ("(define f (lambda args args)) (f)", Renders("()")),
            ("(lambda (x x) x)", ErrorContaining("Duplicate binding")),
            ("(lambda (1) 1)", ErrorContaining("lambda")),
            ("(lambda (x))", ErrorContaining("lambda")),
            ("(define (f x) x) (f)", ErrorContaining("expected 1")),
            ("(define (f x) x) (f 1 2)", ErrorContaining("expected 1")),
            ("(5 1)", ErrorContaining("not a procedure")),
        ]);
    }

    #[test]
    fn conditionals_demand_booleans() {
        check(&[
            ("(if #t 1 2)", Renders("1")),
            ("(if #f 1 2)", Renders("2")),
            ("(if 1 2 3)", ErrorContaining("boolean")),
            ("(if #t 1)", ErrorContaining("if: expected 3")),
            ("(if #t 1 2 3)", ErrorContaining("if: expected 3")),
            ("(when #t 1 2)", Renders("2")),
            ("(when #f 1)", IsVoid),
            ("(when 1 2)", ErrorContaining("when")),
            ("(unless #f 5)", Renders("5")),
            ("(unless #t 5)", IsVoid),
            ("(when #t)", ErrorContaining("when")),
        ]);
    }

    #[test]
    fn and_or_short_circuit_on_strict_booleans() {
        check(&[
            ("(and)", Renders("#t")),
            ("(or)", Renders("#f")),
            ("(and #t #t)", Renders("#t")),
            ("(and #t #f)", Renders("#f")),
            ("(or #f #t)", Renders("#t")),
            // Once the answer is known the remaining operands never run.
            ("(and #f (car '()))", Renders("#f")),
            ("(or #t missing-symbol)", Renders("#t")),
            ("(and 1)", ErrorContaining("and")),
            ("(or #f 1)", ErrorContaining("or")),
        ]);
    }

    #[test]
    fn cond_validates_clauses_before_testing() {
        check(&[
            ("(cond (#f 1) (#t 2))", Renders("2")),
            ("(cond (#f 1))", IsVoid),
            ("(cond)", IsVoid),
            ("(cond (else 42))", Renders("42")),
            ("(cond (#t 1 2 3))", Renders("3")),
            ("(cond (#t))", IsVoid),
            ("(cond (else 1) (#t 2))", ErrorContaining("else")),
            ("(cond (else))", ErrorContaining("else")),
            ("(cond 5)", ErrorContaining("cond")),
            ("(cond (1 2))", ErrorContaining("boolean")),
            // Validation runs first: the bad else surfaces even though the
            // opening clause would already match.
            ("(cond (#t 1) (else))", ErrorContaining("else")),
        ]);
    }

    #[test]
    fn list_primitives_match_their_contracts() {
        check(&[
            ("(cons 1 (cons 2 '()))", Renders("(1 2)")),
            ("(cons 1 2)", Renders("(1 . 2)")),
            ("(car '(1 2))", Renders("1")),
            ("(cdr '(1 2))", Renders("(2)")),
            ("(car)", ErrorContaining("car")),
            ("(car 1 2)", ErrorContaining("car")),
            ("(car '())", ErrorContaining("car")),
            ("(append '(1 2) '(3 4))", Renders("(1 2 3 4)")),
            ("(append)", Renders("()")),
            ("(list 1 2 3)", Renders("(1 2 3)")),
            ("(list)", Renders("()")),
            ("(reverse '(1 2 3))", Renders("(3 2 1)")),
            ("(length '(1 2 3))", Renders("3")),
            ("(length '())", Renders("0")),
            ("(null? '())", Renders("#t")),
            ("(null? '(1))", Renders("#f")),
            ("(list? '(1 2))", Renders("#t")),
            ("(list? (cons 1 2))", Renders("#f")),
            ("(number? 3)", Renders("#t")),
            ("(number? #t)", Renders("#f")),
            ("(eq? 'a 'a)", Renders("#t")),
            ("(equal? \"a\" \"a\")", Renders("#t")),
            ("(equal? 1 1.0)", Renders("#f")),
            ("(equal? '(1) '(1))", UserError),
            ("(not #f)", Renders("#t")),
            ("(not 0)", ErrorContaining("not")),
        ]);
    }

    #[test]
    fn begin_sequences_and_returns_the_last() {
        check(&[
            ("(begin 1 2 3)", Renders("3")),
            ("(begin)", IsVoid),
            ("(begin (define t 1) (+ t 1))", Renders("2")),
        ]);
    }

    #[test]
    fn special_form_keywords_win_over_bindings() {
        check(&[
            // The symbol can be bound and read as a variable...
            ("(let ((if 1)) if)", Renders("1")),
            // ...but a pair headed by it still dispatches as the form.
            ("(let ((if 1)) (if #t 2 3))", Renders("2")),
            // A computed operator position is an ordinary application.
            ("((if #t + *) 2 3)", Renders("5")),
        ]);
    }

    #[test]
    fn quote_is_idempotent_across_evaluations() {
        let mut interp = Interp::new();
        let forms =
            read_program("(quote (a b c))", &mut interp.heap, &mut interp.symbols).unwrap();
        let first = interp.eval_top(&forms[0]).unwrap();
        let second = interp.eval_top(&forms[0]).unwrap();
        let r1 = print_value(&first, &interp.heap, &interp.symbols);
        let r2 = print_value(&second, &interp.heap, &interp.symbols);
        assert_eq!(r1, "(a b c)");
        assert_eq!(r1, r2);
        // Quote returns the subform itself, not a copy.
        assert!(first.same(&second));
    }

    #[test]
    fn runaway_recursion_is_reported_not_fatal() {
        let (_, result) = run_program("(define (spin n) (spin (+ n 1))) (spin 0)");
        let err = result.unwrap_err();
        assert!(!err.is_internal());
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn collection_between_forms_preserves_interpreter_state() {
        let mut interp = Interp::new();
        let forms = read_program(
            "(define (f x) (+ x 1)) (define lst '(1 2 3)) (f 4) (car lst)",
            &mut interp.heap,
            &mut interp.symbols,
        )
        .unwrap();

        let mut outputs = Vec::new();
        for (i, form) in forms.iter().enumerate() {
            let value = interp.eval_top(form).unwrap();
            if !matches!(value, Value::Void) {
                outputs.push(print_value(&value, &interp.heap, &interp.symbols));
            }
            // The driver's checkpoint: everything still pending is a root.
            let global = interp.global();
            interp.heap.collect(&forms[i + 1..], &[global]);
        }
        assert_eq!(outputs, vec!["5".to_string(), "1".to_string()]);
    }

    #[test]
    fn evaluation_garbage_is_reclaimed_at_checkpoints() {
        let mut interp = Interp::new();
        let forms = read_program(
            "(length (append '(1 2) '(3 4)))",
            &mut interp.heap,
            &mut interp.symbols,
        )
        .unwrap();
        let value = interp.eval_top(&forms[0]).unwrap();
        assert_eq!(value, Value::Int(4));

        // Nothing refers to the form or its temporaries anymore.
        let global = interp.global();
        interp.heap.collect(&[], &[global]);
        assert_eq!(interp.heap.live_cells(), 0);
    }

    #[test]
    fn load_evaluates_a_file_against_the_global_frame() {
        let path = std::env::temp_dir().join("minim-load-test.scm");
        std::fs::write(&path, "(define loaded 99)\n(+ loaded 1)\n").unwrap();

        let mut interp = Interp::new();
        let source = format!("(load \"{}\")", path.display());
        let forms = read_program(&source, &mut interp.heap, &mut interp.symbols).unwrap();
        let value = interp.eval_top(&forms[0]).unwrap();
        assert_eq!(value, Value::Int(100));

        // The loaded definitions landed in the global frame.
        let more = read_program("loaded", &mut interp.heap, &mut interp.symbols).unwrap();
        assert_eq!(interp.eval_top(&more[0]).unwrap(), Value::Int(99));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_reports_unreadable_files() {
        check(&[
            (
                "(load \"/nonexistent/minim-missing.scm\")",
                ErrorContaining("load"),
            ),
            ("(load 5)", ErrorContaining("load")),
        ]);
    }
}
