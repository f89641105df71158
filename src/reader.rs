//! The S-expression reader.
//!
//! Atoms are decimal or `0x` hex integers, `…u8` byte literals,
//! double-quoted strings, single-quoted character literals, and
//! identifiers (anything else that does not start with a digit).
//! `;` starts a line comment.

use crate::error::CompileError;
use crate::value::Value;
use std::rc::Rc;

/// Parse one expression and reject trailing input.
pub fn parse(source: &str) -> Result<Value, CompileError> {
    let mut reader = Reader::new(source);
    reader.skip_space();
    if reader.peek().is_none() {
        return Err(CompileError::EmptyProgram);
    }
    let value = reader.parse_expr()?;
    reader.skip_space();
    if reader.peek().is_some() {
        return Err(CompileError::TrailingGarbage);
    }
    Ok(value)
}

/// Parse every top-level expression in the source.
pub fn parse_all(source: &str) -> Result<Vec<Value>, CompileError> {
    let mut reader = Reader::new(source);
    let mut forms = Vec::new();
    loop {
        reader.skip_space();
        if reader.peek().is_none() {
            return Ok(forms);
        }
        forms.push(reader.parse_expr()?);
    }
}

/// Parse a whole program: the top-level statements become the body of
/// an implicit `(def (main int) () (do …))`.
pub fn parse_program(source: &str) -> Result<Value, CompileError> {
    let forms = parse_all(source)?;
    if forms.is_empty() {
        return Err(CompileError::EmptyProgram);
    }
    let mut body = Vec::with_capacity(forms.len() + 1);
    body.push(Value::symbol("do"));
    body.extend(forms);
    Ok(Value::List(vec![
        Value::symbol("def"),
        Value::List(vec![Value::symbol("main"), Value::symbol("int")]),
        Value::List(vec![]),
        Value::List(body),
    ]))
}

struct Reader<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Reader {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_space(&mut self) {
        loop {
            let save = self.pos;
            while self
                .peek()
                .is_some_and(|b| (b as char).is_ascii_whitespace())
            {
                self.pos += 1;
            }
            if self.peek() == Some(b';') {
                while self.peek().is_some_and(|b| b != b'\n') {
                    self.pos += 1;
                }
            }
            if self.pos == save {
                return;
            }
        }
    }

    fn parse_expr(&mut self) -> Result<Value, CompileError> {
        self.skip_space();
        match self.peek() {
            None => Err(CompileError::UnbalancedParens),
            Some(b'(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_space();
                    match self.peek() {
                        None => return Err(CompileError::UnbalancedParens),
                        Some(b')') => {
                            self.pos += 1;
                            return Ok(Value::List(items));
                        }
                        Some(_) => items.push(self.parse_expr()?),
                    }
                }
            }
            Some(b')') => Err(CompileError::StrayCloseParen),
            Some(b'"') => self.parse_string(),
            Some(b'\'') => self.parse_char(),
            Some(_) => self.parse_atom(),
        }
    }

    /// Decode the characters between a pair of quotes, handling escapes.
    fn parse_quoted(&mut self, term: u8) -> Result<String, CompileError> {
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(CompileError::UnterminatedString),
                Some(b) if b == term => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escape = self.peek().ok_or(CompileError::UnterminatedString)?;
                    self.pos += 1;
                    match escape {
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'\\' => out.push('\\'),
                        b'"' => out.push('"'),
                        b'\'' => out.push('\''),
                        b'u' => {
                            let hex = self
                                .src
                                .get(self.pos..self.pos + 4)
                                .ok_or(CompileError::UnterminatedString)?;
                            let code = u32::from_str_radix(hex, 16)
                                .map_err(|_| CompileError::bad_escape(format!("u{}", hex)))?;
                            let ch = char::from_u32(code)
                                .ok_or_else(|| CompileError::bad_escape(format!("u{}", hex)))?;
                            self.pos += 4;
                            out.push(ch);
                        }
                        other => {
                            return Err(CompileError::bad_escape((other as char).to_string()))
                        }
                    }
                }
                Some(b) => {
                    // Copy a whole UTF-8 sequence through unchanged.
                    let ch = self.src[self.pos..].chars().next().unwrap_or(b as char);
                    self.pos += ch.len_utf8();
                    out.push(ch);
                }
            }
        }
    }

    fn parse_string(&mut self) -> Result<Value, CompileError> {
        let text = self.parse_quoted(b'"')?;
        Ok(Value::Str(Rc::from(text.as_str())))
    }

    /// A single-quoted character literal yields a byte (0–255). A
    /// redundant `u8` suffix is accepted, so `'A'u8` reads like `65u8`.
    fn parse_char(&mut self) -> Result<Value, CompileError> {
        let text = self.parse_quoted(b'\'')?;
        if self.src[self.pos..].starts_with("u8") {
            let after = self.bytes.get(self.pos + 2).copied();
            if after.is_none_or(|b| (b as char).is_ascii_whitespace() || b == b'(' || b == b')') {
                self.pos += 2;
            }
        }
        let mut chars = text.chars();
        let (ch, rest) = (chars.next(), chars.next());
        let ch = match (ch, rest) {
            (Some(ch), None) => ch,
            _ => return Err(CompileError::bad_char(text)),
        };
        let code = ch as u32;
        if code > 0xFF {
            return Err(CompileError::out_of_range(text));
        }
        Ok(Value::Byte(code as u8))
    }

    fn parse_atom(&mut self) -> Result<Value, CompileError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| {
            !(b as char).is_ascii_whitespace() && b != b'(' && b != b')'
        }) {
            self.pos += 1;
        }
        debug_assert!(self.pos > start);
        atom_value(&self.src[start..self.pos])
    }
}

/// Classify a bare token: integer, byte literal, or identifier.
fn atom_value(text: &str) -> Result<Value, CompileError> {
    if let Some(parsed) = try_int(text) {
        return parsed.map(Value::Int).map_err(|_| CompileError::out_of_range(text));
    }
    if let Some(digits) = text.strip_suffix("u8") {
        if let Some(parsed) = try_int(digits) {
            let v = parsed.map_err(|_| CompileError::out_of_range(text))?;
            if !(0..256).contains(&v) {
                return Err(CompileError::out_of_range(text));
            }
            return Ok(Value::Byte(v as u8));
        }
    }
    if text.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(CompileError::bad_name(text));
    }
    Ok(Value::Symbol(Rc::from(text)))
}

/// Parse a decimal or `0x` hex integer. Returns `None` for text that is
/// not numeric at all, `Some(Err(..))` for numbers outside i64.
fn try_int(text: &str) -> Option<Result<i64, ()>> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = if body.len() >= 2 && body[..2].eq_ignore_ascii_case("0x") {
        (16, &body[2..])
    } else {
        (10, body)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = match i128::from_str_radix(digits, radix) {
        Ok(v) => v,
        Err(_) => return Some(Err(())), // numeric but beyond i128
    };
    let value = if negative { -magnitude } else { magnitude };
    if !(-(1i128 << 63)..(1i128 << 63)).contains(&value) {
        return Some(Err(()));
    }
    Some(Ok(value as i64))
}
