//! Runtime values and the coercion rules.
//!
//! Saved diagrams embed source text authored against a JavaScript host,
//! so the coercion rules here are the JS ones, restricted to the four
//! value shapes the language can produce:
//!
//! - truthiness: `Null` is false, numbers are true unless zero or NaN,
//!   strings are true unless empty
//! - `==`/`!=` are loose: strings compare textually against strings,
//!   booleans and mixed pairs compare numerically, `Null` equals only
//!   `Null`, NaN equals nothing
//! - `<` `>` `<=` `>=`: lexicographic when both sides are strings,
//!   numeric otherwise; any NaN operand compares false
//! - bitwise operators work on 32-bit views: `&` `|` `^` `~` `<<` on the
//!   signed (ToInt32) view, `>>` on the unsigned (ToUint32) view with
//!   zero fill, so `-1 >> 1` is `2147483647`

use std::fmt;

/// The value sentinel a bare `else;` statement evaluates to. The
/// validator treats it as the fallback-transition marker. It is the plain
/// string `"else"` for compatibility with saved diagrams, where a
/// `'else'` string literal behaves identically.
pub const ELSE_SENTINEL: &str = "else";

/// A runtime value. The host numeric type is `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    /// Absence of a value: the result of an empty program or an `if`
    /// whose guard is falsy.
    Null,
}

impl Value {
    pub fn else_sentinel() -> Self {
        Value::Str(ELSE_SENTINEL.to_string())
    }

    pub fn is_else_sentinel(&self) -> bool {
        matches!(self, Value::Str(s) if s == ELSE_SENTINEL)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::Null => false,
        }
    }

    /// Numeric coercion.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Str(s) => parse_number_text(s),
            Value::Null => 0.0,
        }
    }

    /// Loose equality.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Str(a), Value::Str(b)) => a == b,
            // Bool and mixed string/number pairs coerce numerically;
            // NaN never compares equal.
            _ => {
                let (a, b) = (self.to_number(), other.to_number());
                a == b
            }
        }
    }

    fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Some(a.cmp(b));
        }
        let (a, b) = (self.to_number(), other.to_number());
        a.partial_cmp(&b)
    }

    pub fn loose_lt(&self, other: &Value) -> bool {
        self.compare(other) == Some(std::cmp::Ordering::Less)
    }

    pub fn loose_gt(&self, other: &Value) -> bool {
        self.compare(other) == Some(std::cmp::Ordering::Greater)
    }

    pub fn loose_le(&self, other: &Value) -> bool {
        matches!(
            self.compare(other),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        )
    }

    pub fn loose_ge(&self, other: &Value) -> bool {
        matches!(
            self.compare(other),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        )
    }

    /// Signed 32-bit view (ToInt32): truncate toward zero, wrap mod 2^32.
    pub fn to_int32(&self) -> i32 {
        self.to_uint32() as i32
    }

    /// Unsigned 32-bit view (ToUint32).
    pub fn to_uint32(&self) -> u32 {
        let n = self.to_number();
        if !n.is_finite() || n == 0.0 {
            return 0;
        }
        let m = n.trunc() % 4_294_967_296.0;
        let m = if m < 0.0 { m + 4_294_967_296.0 } else { m };
        m as u32
    }

    /// Bit length of the truncated absolute numeric value:
    /// `floor(log2(n)) + 1`, minimum 1.
    pub fn bit_width(&self) -> u32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 1;
        }
        let n = n.trunc().abs();
        if n < 2.0 {
            1
        } else {
            (n as u64).ilog2() + 1
        }
    }
}

/// JS `Number(string)` subset: trimmed, empty is zero, `0b`/`0x` prefixes
/// honored, otherwise a float parse; failure is NaN.
fn parse_number_text(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    if let Some(digits) = strip_prefix_ignore_case(text, "0b") {
        return match u64::from_str_radix(digits, 2) {
            Ok(v) => v as f64,
            Err(_) => f64::NAN,
        };
    }
    if let Some(digits) = strip_prefix_ignore_case(text, "0x") {
        return match u64::from_str_radix(digits, 16) {
            Ok(v) => v as f64,
            Err(_) => f64::NAN,
        };
    }

    text.parse::<f64>().unwrap_or(f64::NAN)
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &text[prefix.len()..])
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
