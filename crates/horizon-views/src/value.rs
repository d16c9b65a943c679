//! Property values read from items.
//!
//! [`Value`] is the currency of filtering, sorting and grouping: items expose
//! named properties as values, sort descriptions compare them, and group
//! selectors produce them as group keys.

use std::cmp::Ordering;
use std::fmt;

/// How string values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Collation {
    /// Compare by Unicode scalar values.
    #[default]
    Ordinal,
    /// Compare case-insensitively, falling back to ordinal order for ties.
    IgnoreCase,
}

impl Collation {
    /// Compare two strings under this collation.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Collation::Ordinal => a.cmp(b),
            Collation::IgnoreCase => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase))
                .then_with(|| a.cmp(b)),
        }
    }
}

/// A dynamically typed property value.
///
/// # Example
///
/// ```
/// use horizon_views::{Collation, Value};
/// use std::cmp::Ordering;
///
/// let a = Value::from("apple");
/// let b = Value::from("Banana");
/// assert_eq!(a.compare(&b, Collation::Ordinal), Ordering::Greater);
/// assert_eq!(a.compare(&b, Collation::IgnoreCase), Ordering::Less);
/// assert_eq!(Value::from(2).compare(&Value::from(2.5), Collation::Ordinal), Ordering::Less);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// No value.
    #[default]
    None,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
}

impl Value {
    /// Returns `true` if this is `Value::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Returns the boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a float, converting integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::None => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
        }
    }

    /// Total ordering used by sorting and grouping.
    ///
    /// `None < Bool < numbers < String`. Integers and floats compare
    /// numerically with each other; NaN sorts after every other number.
    pub fn compare(&self, other: &Value, collation: Collation) -> Ordering {
        match (self, other) {
            (Value::None, Value::None) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => compare_int_float(*a, *b),
            (Value::Float(a), Value::Int(b)) => compare_int_float(*b, *a).reverse(),
            (Value::String(a), Value::String(b)) => collation.compare(a, b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn compare_int_float(a: i64, b: f64) -> Ordering {
    if b.is_nan() {
        return Ordering::Less;
    }
    // Compare in f64 first, then break rounding ties in i128.
    match (a as f64).total_cmp(&b) {
        Ordering::Equal if b.fract() == 0.0 && b.abs() < 1.7e38 => (a as i128).cmp(&(b as i128)),
        Ordering::Equal => Ordering::Equal,
        other => other,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "(none)"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_type_ordering() {
        let ordered = [
            Value::None,
            Value::Bool(false),
            Value::Bool(true),
            Value::Int(-3),
            Value::Float(-0.5),
            Value::Int(0),
            Value::Float(f64::NAN),
            Value::String("a".into()),
        ];
        for window in ordered.windows(2) {
            assert_eq!(
                window[0].compare(&window[1], Collation::Ordinal),
                Ordering::Less,
                "{:?} < {:?}",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn test_int_float_equal() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.0), Collation::Ordinal), Ordering::Equal);
        assert_eq!(Value::Float(1.0).compare(&Value::Int(2), Collation::Ordinal), Ordering::Less);
    }

    #[test]
    fn test_ignore_case_collation() {
        assert_eq!(Collation::IgnoreCase.compare("abc", "ABD"), Ordering::Less);
        assert_eq!(Collation::IgnoreCase.compare("ABC", "abc"), Ordering::Less);
        assert_eq!(Collation::Ordinal.compare("b", "A"), Ordering::Greater);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(Some(3)), Value::Int(3));
        assert_eq!(Value::from(None::<i64>), Value::None);
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::Int(4).as_float(), Some(4.0));
        assert_eq!(Value::Int(7).to_string(), "7");
    }
}
