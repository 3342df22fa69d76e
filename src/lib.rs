//! minim - A tree-walking interpreter for a small Scheme subset
//!
//! This crate implements a strict, minimal Scheme-family language: lexically
//! scoped environments, closures, mutation via `set!`, a two-rank numeric
//! tower (integers and reals), and a mark/sweep arena that owns every cons
//! cell and environment frame.
//!
//! ```scheme
//! (define (fact n)
//!   (if (= n 0) 1 (* n (fact (- n 1)))))
//! (fact 5)                ; => 120
//! (let ((x 1) (y 2.5))
//!   (+ x y))              ; => 3.500000
//! ```
//!
//! ## Strict semantics
//!
//! This interpreter is deliberately stricter than standard Scheme:
//! - Conditionals require actual boolean values (no "truthiness")
//! - Strict arity checking for every primitive and special form
//! - Arithmetic overflow is detected and reported
//! - No type coercion outside the numeric tower's integer-to-real widening
//!
//! Any program accepted by this interpreter gives identical results in
//! standard Scheme, but the converse is not true due to the additional
//! strictness.
//!
//! ## Modules
//!
//! - `reader`: s-expression parsing from text
//! - `symbol`: symbol interning
//! - `value`: the runtime value representation
//! - `heap`: arena for cons cells and frames, with mark/sweep collection
//! - `number`: numeric tower rank resolution and rank-specific arithmetic
//! - `primitives`: built-in procedures
//! - `evaluator`: the eval/apply core and special forms
//! - `printer`: value rendering

use std::fmt;

/// Maximum parsing depth to prevent stack overflow on deeply nested input
/// This limits expression nesting in the s-expression reader
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum evaluation depth to prevent native stack overflow in recursive evaluation
/// Set much higher than parse depth because interpreted recursion spends several
/// eval levels per user-level call
pub const MAX_EVAL_DEPTH: usize = 2048;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
    /// Valid Scheme syntax that is intentionally not supported in this implementation
    Unsupported,
    /// Implementation-imposed limit exceeded (integer range, etc.)
    ImplementationLimit,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        Self::with_context_and_found(kind, message, input, error_offset, None)
    }

    /// Create a ParseError with context and found token
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        // Show some context before the error position, not just after
        let context_start = error_offset.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        // Replace newlines with visible markers for better error display
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter
///
/// Every variant except `Internal` is a user-facing error: malformed input,
/// a violated primitive contract, an unbound name. `Internal` marks a broken
/// interpreter invariant and is kept in the same enum so it propagates through
/// the ordinary `Result` plumbing, but the driver exits differently on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    EvalError(String),
    TypeError(String),
    UnboundSymbol(String),
    DuplicateBinding(String),
    BadSpecialForm(String),
    ArityError {
        name: String,
        /// Human-readable expectation ("1", "at least 2", "between 1 and 2")
        expected: String,
        got: usize,
    },
    Internal(String),
}

impl Error {
    /// Create an ArityError for an exact argument count
    pub fn arity_error(name: &str, expected: usize, got: usize) -> Self {
        Error::ArityError {
            name: name.to_string(),
            expected: expected.to_string(),
            got,
        }
    }

    /// Create an ArityError for a minimum argument count
    pub fn arity_error_min(name: &str, min: usize, got: usize) -> Self {
        Error::ArityError {
            name: name.to_string(),
            expected: format!("at least {min}"),
            got,
        }
    }

    /// Create an ArityError for an inclusive argument count range
    pub fn arity_error_range(name: &str, min: usize, max: usize, got: usize) -> Self {
        Error::ArityError {
            name: name.to_string(),
            expected: format!("between {min} and {max}"),
            got,
        }
    }

    /// True for errors that indicate a broken interpreter invariant rather
    /// than a problem with the user's program.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::UnboundSymbol(name) => write!(f, "Unbound symbol: {name}"),
            Error::DuplicateBinding(name) => write!(f, "Duplicate binding: {name}"),
            Error::BadSpecialForm(msg) => write!(f, "Bad special form: {msg}"),
            Error::ArityError {
                name,
                expected,
                got,
            } => write!(
                f,
                "ArityError: {name}: expected {expected} arguments, got {got}"
            ),
            Error::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

pub mod evaluator;
pub mod heap;
pub mod number;
pub mod primitives;
pub mod printer;
pub mod reader;
pub mod symbol;
pub mod value;
