//! Runtime values

use super::ast::FunctionDef;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Handle on a capability object exposed by the [`Host`](super::Host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostObject {
    path: String,
}

impl HostObject {
    /// The object bound to the body's parameter.
    #[must_use]
    pub fn root() -> Self {
        Self {
            path: String::new(),
        }
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A built-in helper from the global scope.
///
/// `name` is empty for the namespace object itself (`Math`, `String`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Native {
    pub namespace: &'static str,
    pub name: &'static str,
}

impl Native {
    #[must_use]
    pub const fn new(namespace: &'static str, name: &'static str) -> Self {
        Self { namespace, name }
    }

    #[must_use]
    pub fn is_namespace(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Function(Arc<FunctionDef>),
    Host(HostObject),
    HostMethod { object: String, method: String },
    Native(Native),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Build an object from key/value pairs.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An `Error`-like object with `name` and `message`.
    pub fn error_object(name: &str, message: impl Into<String>) -> Self {
        Self::object([
            ("name", Self::string(name)),
            ("message", Self::String(message.into())),
        ])
    }

    /// Text reported when this value escapes as an uncaught error.
    #[must_use]
    pub fn error_message(&self) -> String {
        if let Self::Object(map) = self {
            match (map.get("name"), map.get("message")) {
                (Some(Self::String(name)), Some(message)) if name != "Error" => {
                    return format!("{name}: {message}");
                }
                (_, Some(message)) => return message.to_string(),
                _ => {}
            }
        }
        self.to_string()
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        match self {
            Self::Function(_) | Self::HostMethod { .. } => true,
            Self::Native(native) => !native.is_namespace() || super::globals::is_callable(*native),
            _ => false,
        }
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    #[must_use]
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Array(_) | Self::Object(_) | Self::Host(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) | Self::HostMethod { .. } => "function",
            Self::Native(native) if self.is_callable() || !native.is_namespace() => "function",
            Self::Native(_) => "object",
        }
    }

    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => parse_number(s),
            Self::Array(_) => parse_number(&self.to_string()),
            _ => f64::NAN,
        }
    }

    /// Integer view used for indices and counts. NaN becomes 0.
    #[must_use]
    pub fn to_integer(&self) -> i64 {
        let n = self.to_number();
        if n.is_nan() {
            0
        } else {
            n.trunc() as i64
        }
    }

    /// `===`. Arrays and objects compare structurally.
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            _ => self == other,
        }
    }

    /// `==`
    #[must_use]
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Self::Number(_), Self::String(_))
            | (Self::String(_), Self::Number(_))
            | (Self::Bool(_), _)
            | (_, Self::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON form, or `None` for values JSON cannot represent (functions, `undefined`).
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, |num| {
                    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                        serde_json::Value::from(*n as i64)
                    } else {
                        serde_json::Value::Number(num)
                    }
                }),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| v.to_json().unwrap_or(serde_json::Value::Null))
                    .collect(),
            ),
            Self::Object(map) => serde_json::Value::Object(
                map.iter()
                    .filter_map(|(k, v)| v.to_json().map(|json| (k.clone(), json)))
                    .collect(),
            ),
            Self::Host(_) => serde_json::Value::Object(serde_json::Map::new()),
            Self::Undefined | Self::Function(_) | Self::HostMethod { .. } | Self::Native(_) => {
                return None
            }
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::String(s) => write!(f, "{s}"),
            Self::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Self::Object(_) | Self::Host(_) => write!(f, "[object Object]"),
            Self::Function(def) => write!(
                f,
                "function {}() {{ [code] }}",
                def.name.as_deref().unwrap_or("")
            ),
            Self::HostMethod { method, .. } => write!(f, "function {method}() {{ [native code] }}"),
            Self::Native(native) => write!(
                f,
                "function {}() {{ [native code] }}",
                if native.is_namespace() {
                    native.namespace
                } else {
                    native.name
                }
            ),
        }
    }
}

/// Number to string the way scripts expect: `3` not `3.0`, `NaN`, `Infinity`.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// String to number conversion. Blank strings are 0; anything unparsable is NaN.
#[must_use]
pub fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("0x10"), 16.0);
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("12px").is_nan());
    }

    #[test]
    fn test_display() {
        let arr = Value::Array(vec![1.into(), Value::Null, "a".into()]);
        assert_eq!(arr.to_string(), "1,,a");
        assert_eq!(Value::object([("a", Value::Null)]).to_string(), "[object Object]");
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::from("1").loose_equals(&1.into()));
        assert!(Value::Bool(true).loose_equals(&1.into()));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
        assert!(Value::Array(vec![1.into()]).strict_equals(&Value::Array(vec![1.into()])));
    }

    #[test]
    fn test_truthiness_and_typeof() {
        assert!(!Value::from("").truthy());
        assert!(Value::Array(vec![]).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::Native(Native::new("Math", "floor")).type_of(), "function");
        assert_eq!(Value::Native(Native::new("Math", "")).type_of(), "object");
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"a": [1, 2.5, null], "b": "x"});
        let value = Value::from_json(json.clone());
        assert_eq!(value.to_json(), Some(json));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(Value::error_object("Error", "boom").error_message(), "boom");
        assert_eq!(
            Value::error_object("TypeError", "bad").error_message(),
            "TypeError: bad"
        );
        assert_eq!(Value::from("plain").error_message(), "plain");
    }
}
