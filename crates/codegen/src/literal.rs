//! Literal-token classification and decoding.
//!
//! The lexer hands literal spellings through untouched; this module maps
//! them to a type and a folded [`Number`], and decodes escape sequences
//! in character and string literals.

use anyhow::Result;
use lex::{IntBase, Loc};
use vm::Number;

use crate::error::sema_bail;
use crate::types::{Primitive, Type};

/// Classify and evaluate an integer literal with optional u/U/l/L
/// suffixes.
pub fn int_literal(base: IntBase, repr: &str, loc: Loc) -> Result<(Type, Number)> {
    let digits_end = repr
        .find(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'))
        .unwrap_or(repr.len());
    let (digits, suffix) = repr.split_at(digits_end);

    let (digits, radix) = match base {
        IntBase::Hex => (&digits[2..], 16),
        IntBase::Oct => (&digits[1..], 8),
        IntBase::Dec => (digits, 10),
    };
    let digits = if digits.is_empty() { "0" } else { digits };
    let value = match u64::from_str_radix(digits, radix) {
        Ok(v) => v as i64,
        Err(_) => sema_bail!(loc, "invalid integer literal '{}'", repr),
    };

    let unsigned = suffix.contains(['u', 'U']);
    let long = suffix.contains('l');
    let long_long = suffix.contains('L') || suffix.matches('l').count() >= 2;
    let prim = match (unsigned, long_long, long) {
        (true, true, _) => Primitive::ULongLong,
        (true, _, true) => Primitive::ULong,
        (true, false, false) => Primitive::UInt,
        (false, true, _) => Primitive::LongLong,
        (false, _, true) => Primitive::Long,
        (false, false, false) => Primitive::Int,
    };

    Ok((Type::primitive(prim), Number::Int(value)))
}

/// Classify and evaluate a floating literal; f/F marks `float`, a
/// trailing l/L `long double`, anything else `double`.
pub fn float_literal(repr: &str, loc: Loc) -> Result<(Type, Number)> {
    let digits_end = repr
        .find(|c: char| matches!(c, 'f' | 'F' | 'l' | 'L'))
        .unwrap_or(repr.len());
    let (digits, suffix) = repr.split_at(digits_end);
    let value: f64 = match digits.parse() {
        Ok(v) => v,
        Err(_) => sema_bail!(loc, "invalid floating literal '{}'", repr),
    };
    let prim = if suffix.contains(['f', 'F']) {
        Primitive::Float
    } else if suffix.contains(['l', 'L']) {
        Primitive::LongDouble
    } else {
        Primitive::Double
    };
    Ok((Type::primitive(prim), Number::Float(value)))
}

fn unescape(bytes: &[u8], loc: Loc) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        let Some(&esc) = bytes.get(i) else {
            sema_bail!(loc, "trailing backslash in literal");
        };
        i += 1;
        let decoded = match esc {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'0' => 0,
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            b'x' => {
                let mut v = 0u32;
                let mut n = 0;
                while let Some(&h) = bytes.get(i) {
                    let Some(d) = (h as char).to_digit(16) else { break };
                    v = v * 16 + d;
                    i += 1;
                    n += 1;
                }
                if n == 0 {
                    sema_bail!(loc, "\\x used with no following hex digits");
                }
                v as u8
            }
            other => sema_bail!(loc, "unknown escape sequence '\\{}'", other as char),
        };
        out.push(decoded);
    }
    Ok(out)
}

/// Evaluate a character literal (quotes included in the repr).
pub fn char_literal(repr: &str, loc: Loc) -> Result<(Type, Number)> {
    let inner = repr
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(repr);
    let bytes = unescape(inner.as_bytes(), loc)?;
    if bytes.len() != 1 {
        sema_bail!(loc, "invalid character literal {}", repr);
    }
    Ok((Type::primitive(Primitive::Char), Number::Int(bytes[0] as i64)))
}

/// Decode a string literal (quotes included in the repr) to its bytes,
/// without the terminating NUL.
pub fn string_literal(repr: &str, loc: Loc) -> Result<Vec<u8>> {
    let inner = repr
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(repr);
    unescape(inner.as_bytes(), loc)
}
