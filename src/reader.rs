//! The s-expression reader.
//!
//! Parsing happens in two stages: nom combinators build a private `Ast`
//! tree from the source text, then the tree is lowered into heap cells with
//! symbols interned along the way. Keeping the combinator stage free of the
//! heap keeps the grammar readable and the borrow story trivial.
//!
//! The grammar is deliberately small: integers, reals (`digits.digits`),
//! `#t`/`#f`, double-quoted strings with a fixed escape set, symbols, `()`
//! and `[]` lists (the closing bracket must match the opening one), `'x`
//! quote sugar, and `;` line comments. Dotted-pair input syntax is not
//! accepted even though the printer can produce it.
//!
//! Parsing is depth-limited so hostile nesting fails with a reported error
//! instead of exhausting the native stack. Structural dead ends use
//! `nom::Err::Error` so `alt` can try the next token shape; hard failures
//! (depth, overflow, bad escapes, bare dots) use `nom::Err::Failure` so the
//! precise cause survives to the caller instead of being masked by a later
//! alternative.

use std::rc::Rc;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace1},
    combinator::{opt, recognize},
    error::ErrorKind,
    multi::{many0_count, many1_count, separated_list0},
    sequence::pair,
};

use crate::heap::Heap;
use crate::symbol::SymbolTable;
use crate::value::Value;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Non-alphanumeric characters permitted in symbols.
const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_.";

/// Parsed surface syntax, not yet interned or allocated.
#[derive(Debug, Clone, PartialEq)]
enum Ast {
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(String),
    Sym(String),
    List(Vec<Ast>),
}

/// Characters that may legally follow a complete atom.
///
/// Atoms must end at a delimiter so `123abc` is rejected outright instead
/// of being split into two adjacent tokens.
fn at_token_boundary(input: &str) -> bool {
    input
        .chars()
        .next()
        .is_none_or(|c| c.is_whitespace() || "()[];\"'".contains(c))
}

/// A `.` standing alone as a token, as in dotted-pair syntax.
fn bare_dot(input: &str) -> bool {
    let mut chars = input.chars();
    chars.next() == Some('.') && at_token_boundary(chars.as_str())
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(';'), take_while(|c: char| c != '\n'))).parse(input)
}

/// Zero or more whitespace runs and line comments.
fn intertoken0(input: &str) -> IResult<&str, &str> {
    recognize(many0_count(alt((multispace1, line_comment)))).parse(input)
}

/// At least one whitespace run or line comment.
fn intertoken1(input: &str) -> IResult<&str, &str> {
    recognize(many1_count(alt((multispace1, line_comment)))).parse(input)
}

/// Parse a real literal: optional sign, digits, a dot, digits.
fn parse_real(input: &str) -> IResult<&str, Ast> {
    let (rest, text) = recognize((
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
        char('.'),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;
    if !at_token_boundary(rest) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Float,
        )));
    }
    match text.parse::<f64>() {
        // A digits-only literal parses unless its magnitude overflows f64.
        Ok(r) if r.is_finite() => Ok((rest, Ast::Real(r))),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Float,
        ))),
    }
}

/// Parse an integer literal: optional sign, digits.
fn parse_integer(input: &str) -> IResult<&str, Ast> {
    let (rest, text) = recognize(pair(
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;
    if !at_token_boundary(rest) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        )));
    }
    match text.parse::<i64>() {
        Ok(n) => Ok((rest, Ast::Int(n))),
        // The token is digits, so failure here can only mean overflow.
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Parse `#t` or `#f`. Any other `#` word is an error.
fn parse_bool(input: &str) -> IResult<&str, Ast> {
    let (rest, _) = char('#').parse(input)?;
    let (rest, word) = take_while1(|c: char| c.is_alphanumeric()).parse(rest)?;
    match word {
        "t" => Ok((rest, Ast::Bool(true))),
        "f" => Ok((rest, Ast::Bool(false))),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Tag,
        ))),
    }
}

/// Valid: non-empty, no leading digit, no `-digit` prefix, not a lone dot.
fn is_valid_symbol(name: &str) -> bool {
    if name == "." {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        None => false,
        Some(first) => {
            if first.is_ascii_digit() {
                return false;
            }
            if first == '-'
                && let Some(second) = chars.next()
                && second.is_ascii_digit()
            {
                return false;
            }
            true
        }
    }
}

fn parse_symbol(input: &str) -> IResult<&str, Ast> {
    let (rest, candidate) =
        take_while1(|c: char| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
            .parse(input)?;
    if is_valid_symbol(candidate) && at_token_boundary(rest) {
        Ok((rest, Ast::Sym(candidate.to_string())))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

/// Parse a string literal, decoding `\n \t \r \\ \"` escapes.
fn parse_string(input: &str) -> IResult<&str, Ast> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Ast::Str(text))),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some(_) => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Escaped,
                        )));
                    }
                    // Backslash at end of input.
                    None => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Eof,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = char_iter.as_str();
            }
            // End of input before the closing quote.
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    ErrorKind::Eof,
                )));
            }
        }
    }
}

/// Parse a `(...)` or `[...]` list; the close must match the open.
fn parse_list(input: &str, depth: usize) -> IResult<&str, Ast> {
    let (input, open) = alt((char('('), char('['))).parse(input)?;
    let close = if open == '(' { ')' } else { ']' };

    let (input, elements) =
        separated_list0(intertoken1, |i| parse_sexpr(i, depth + 1)).parse(input)?;

    let (input, _) = intertoken0.parse(input)?;
    let (input, _) = char(close).parse(input)?;
    Ok((input, Ast::List(elements)))
}

/// Parse `'expr` into `(quote expr)`.
fn parse_quote(input: &str, depth: usize) -> IResult<&str, Ast> {
    let (input, _) = char('\'').parse(input)?;
    let (input, expr) = parse_sexpr(input, depth + 1)?;
    Ok((input, Ast::List(vec![Ast::Sym("quote".to_string()), expr])))
}

fn parse_sexpr(input: &str, depth: usize) -> IResult<&str, Ast> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    let (input, _) = intertoken0.parse(input)?;
    if bare_dot(input) {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Not,
        )));
    }
    alt((
        |i| parse_quote(i, depth),
        |i| parse_list(i, depth),
        parse_real,
        parse_integer,
        parse_bool,
        parse_string,
        parse_symbol,
    ))
    .parse(input)
}

/// Convert a nom failure into a structured error with position context.
fn parse_failure(source: &str, error: nom::Err<nom::error::Error<&str>>) -> Error {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = source.len().saturating_sub(e.input.len());
            let found = e.input.chars().next().map(|c| c.to_string());
            let (kind, message) = match e.code {
                ErrorKind::TooLarge => (
                    ParseErrorKind::TooDeeplyNested,
                    format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                ),
                ErrorKind::Not => (
                    ParseErrorKind::Unsupported,
                    "dotted pair syntax is not supported".to_string(),
                ),
                ErrorKind::Digit => (
                    ParseErrorKind::ImplementationLimit,
                    "integer literal does not fit in a 64-bit integer".to_string(),
                ),
                ErrorKind::Float => (
                    ParseErrorKind::ImplementationLimit,
                    "real literal is out of range".to_string(),
                ),
                ErrorKind::Escaped => (
                    ParseErrorKind::InvalidSyntax,
                    "invalid escape sequence in string literal".to_string(),
                ),
                ErrorKind::Eof => (
                    ParseErrorKind::Incomplete,
                    "unterminated string literal".to_string(),
                ),
                ErrorKind::Char if position >= source.len() => (
                    ParseErrorKind::Incomplete,
                    "unexpected end of input".to_string(),
                ),
                ErrorKind::Char => (
                    ParseErrorKind::InvalidSyntax,
                    format!("expected character at position {position}"),
                ),
                ErrorKind::Tag => (
                    ParseErrorKind::InvalidSyntax,
                    format!("unexpected token at position {position}"),
                ),
                _ => {
                    if position < source.len() {
                        let near: String = source.chars().skip(position).take(10).collect();
                        (
                            ParseErrorKind::InvalidSyntax,
                            format!("invalid syntax near '{near}'"),
                        )
                    } else {
                        (
                            ParseErrorKind::Incomplete,
                            "unexpected end of input".to_string(),
                        )
                    }
                }
            };
            Error::ParseError(ParseError::with_context_and_found(
                kind, message, source, position, found,
            ))
        }
        nom::Err::Incomplete(_) => Error::ParseError(ParseError::from_message(
            ParseErrorKind::Incomplete,
            "incomplete input",
        )),
    }
}

/// Lower parsed syntax into interned symbols and heap cells.
fn lower(ast: &Ast, heap: &mut Heap, symbols: &mut SymbolTable) -> Value {
    match ast {
        Ast::Int(n) => Value::Int(*n),
        Ast::Real(r) => Value::Real(*r),
        Ast::Bool(b) => Value::Bool(*b),
        Ast::Str(s) => Value::Str(Rc::from(s.as_str())),
        Ast::Sym(name) => Value::Symbol(symbols.intern(name)),
        Ast::List(elements) => {
            let mut list = Value::Nil;
            for element in elements.iter().rev() {
                let value = lower(element, heap, symbols);
                list = heap.cons(value, list);
            }
            list
        }
    }
}

/// Parse zero or more top-level forms from `source`, interning symbols and
/// allocating list structure as heap cells.
pub fn read_program(
    source: &str,
    heap: &mut Heap,
    symbols: &mut SymbolTable,
) -> Result<Vec<Value>, Error> {
    let mut forms = Vec::new();
    let mut rest = source;
    loop {
        let (after, _) = intertoken0.parse(rest).map_err(|e| parse_failure(source, e))?;
        if after.is_empty() {
            break;
        }
        if let Some(ch) = after.chars().next()
            && (ch == ')' || ch == ']')
        {
            let offset = source.len() - after.len();
            return Err(Error::ParseError(ParseError::with_context_and_found(
                ParseErrorKind::TrailingContent,
                "unexpected closing delimiter",
                source,
                offset,
                Some(ch.to_string()),
            )));
        }
        match parse_sexpr(after, 0) {
            Ok((next, ast)) => {
                forms.push(lower(&ast, heap, symbols));
                rest = next;
            }
            Err(e) => return Err(parse_failure(source, e)),
        }
    }
    Ok(forms)
}
