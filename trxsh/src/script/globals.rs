//! Pure helpers available in every program's global scope

use super::limits::{array_length, filled_array, MAX_ARRAY_LENGTH};
use super::value::{format_number, Native, Value};
use super::{ScriptError, ScriptResult};
use std::collections::BTreeMap;

const NAMESPACES: &[&str] = &[
    "Math", "JSON", "Object", "Array", "Number", "String", "Boolean", "Promise", "Error",
    "TypeError", "RangeError",
];

const FUNCTIONS: &[(&str, &[&str])] = &[
    (
        "Math",
        &[
            "abs", "floor", "ceil", "round", "trunc", "sign", "sqrt", "cbrt", "pow", "min", "max",
            "random", "log", "log2", "log10", "exp", "sin", "cos", "tan", "atan", "atan2", "hypot",
        ],
    ),
    ("JSON", &["stringify", "parse"]),
    (
        "Object",
        &["keys", "values", "entries", "assign", "fromEntries", "freeze"],
    ),
    ("Array", &["isArray", "from", "of"]),
    (
        "Number",
        &["isInteger", "isFinite", "isNaN", "parseFloat", "parseInt"],
    ),
    ("String", &["fromCharCode"]),
    ("Promise", &["all", "resolve"]),
    ("", &["parseInt", "parseFloat", "isNaN", "isFinite"]),
];

/// Namespaces that can also be called directly, like `String(x)`.
const CALLABLE_NAMESPACES: &[&str] = &[
    "Number", "String", "Boolean", "Error", "TypeError", "RangeError", "Array",
];

fn intern(namespace: &str, name: &str) -> Option<Native> {
    FUNCTIONS
        .iter()
        .find(|(ns, _)| *ns == namespace)
        .and_then(|(ns, names)| {
            names
                .iter()
                .find(|n| **n == name)
                .map(|n| Native::new(*ns, *n))
        })
}

pub(super) fn is_callable(native: Native) -> bool {
    CALLABLE_NAMESPACES.contains(&native.namespace)
}

/// Resolve a global identifier.
pub(super) fn lookup(name: &str) -> Option<Value> {
    match name {
        "NaN" => return Some(Value::Number(f64::NAN)),
        "Infinity" => return Some(Value::Number(f64::INFINITY)),
        _ => {}
    }
    if let Some(ns) = NAMESPACES.iter().find(|ns| **ns == name) {
        return Some(Value::Native(Native::new(*ns, "")));
    }
    intern("", name).map(Value::Native)
}

/// Property of a namespace object, e.g. `Math.PI` or `JSON.stringify`.
pub(super) fn member(namespace: &str, name: &str) -> Option<Value> {
    let constant = match (namespace, name) {
        ("Math", "PI") => std::f64::consts::PI,
        ("Math", "E") => std::f64::consts::E,
        ("Math", "LN2") => std::f64::consts::LN_2,
        ("Math", "LN10") => std::f64::consts::LN_10,
        ("Math", "SQRT2") => std::f64::consts::SQRT_2,
        ("Number", "MAX_SAFE_INTEGER") => 9_007_199_254_740_991.0,
        ("Number", "MIN_SAFE_INTEGER") => -9_007_199_254_740_991.0,
        ("Number", "EPSILON") => f64::EPSILON,
        ("Number", "NaN") => f64::NAN,
        ("Number", "POSITIVE_INFINITY") => f64::INFINITY,
        ("Number", "NEGATIVE_INFINITY") => f64::NEG_INFINITY,
        _ => return intern(namespace, name).map(Value::Native),
    };
    Some(Value::Number(constant))
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

fn num(args: &[Value], i: usize) -> f64 {
    args.get(i).map_or(f64::NAN, Value::to_number)
}

fn random() -> f64 {
    // 53 random bits from a v4 UUID give a uniform float in [0, 1).
    let bits = uuid::Uuid::new_v4().as_u128() >> 75;
    bits as f64 / (1u64 << 53) as f64
}

pub(super) fn call(native: Native, args: &[Value]) -> ScriptResult<Value> {
    let value = match (native.namespace, native.name) {
        ("Math", name) => math(name, args),
        ("JSON", "stringify") => stringify(&arg(args, 0), args.get(2))
            .map_or(Value::Undefined, Value::String),
        ("JSON", "parse") => {
            let text = arg(args, 0).to_string();
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| ScriptError::Syntax(format!("JSON.parse: {e}")))?;
            Value::from_json(json)
        }
        ("Object", name) => object(name, args)?,
        ("Array", "isArray") => Value::Bool(matches!(arg(args, 0), Value::Array(_))),
        ("Array", "from") => Value::Array(array_from(&arg(args, 0))?),
        ("Array", "of") => Value::Array(args.to_vec()),
        ("Array", "") => match args {
            [Value::Number(n)] => Value::Array(filled_array(array_length(*n)?)?),
            _ => Value::Array(args.to_vec()),
        },
        ("Number", "") => Value::Number(args.first().map_or(0.0, Value::to_number)),
        ("Number", "isInteger") => {
            Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0))
        }
        ("Number", "isFinite") => {
            Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite()))
        }
        ("Number", "isNaN") => Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_nan())),
        ("Number" | "", "parseFloat") => Value::Number(parse_float(&arg(args, 0).to_string())),
        ("Number" | "", "parseInt") => {
            let radix = args.get(1).map(Value::to_integer).unwrap_or(0);
            Value::Number(parse_int(&arg(args, 0).to_string(), radix))
        }
        ("", "isNaN") => Value::Bool(num(args, 0).is_nan()),
        ("", "isFinite") => Value::Bool(num(args, 0).is_finite()),
        ("String", "") => Value::String(args.first().map(Value::to_string).unwrap_or_default()),
        ("String", "fromCharCode") => Value::String(
            args.iter()
                .filter_map(|c| char::from_u32(c.to_integer() as u32))
                .collect(),
        ),
        ("Boolean", "") => Value::Bool(arg(args, 0).truthy()),
        ("Error" | "TypeError" | "RangeError", "") => {
            let message = args.first().map(Value::to_string).unwrap_or_default();
            Value::error_object(native.namespace, message)
        }
        ("Promise", "all" | "resolve") => arg(args, 0),
        _ => {
            return Err(ScriptError::Type(format!(
                "{} is not a function",
                Value::Native(native)
            )))
        }
    };
    Ok(value)
}

fn math(name: &str, args: &[Value]) -> Value {
    let x = num(args, 0);
    let n = match name {
        "abs" => x.abs(),
        "floor" => x.floor(),
        "ceil" => x.ceil(),
        // Halves round towards +Infinity.
        "round" => (x + 0.5).floor(),
        "trunc" => x.trunc(),
        "sign" => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        "sqrt" => x.sqrt(),
        "cbrt" => x.cbrt(),
        "pow" => x.powf(num(args, 1)),
        "min" => args
            .iter()
            .map(Value::to_number)
            .fold(f64::INFINITY, |acc, v| if v.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(v) }),
        "max" => args
            .iter()
            .map(Value::to_number)
            .fold(f64::NEG_INFINITY, |acc, v| if v.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(v) }),
        "random" => random(),
        "log" => x.ln(),
        "log2" => x.log2(),
        "log10" => x.log10(),
        "exp" => x.exp(),
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "atan" => x.atan(),
        "atan2" => x.atan2(num(args, 1)),
        "hypot" => args
            .iter()
            .map(|v| v.to_number().powi(2))
            .sum::<f64>()
            .sqrt(),
        _ => f64::NAN,
    };
    Value::Number(n)
}

fn object(name: &str, args: &[Value]) -> ScriptResult<Value> {
    let target = arg(args, 0);
    let entries: Vec<(String, Value)> = match &target {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::String(c.to_string())))
            .collect(),
        _ => Vec::new(),
    };

    Ok(match name {
        "keys" => Value::Array(entries.into_iter().map(|(k, _)| Value::String(k)).collect()),
        "values" => Value::Array(entries.into_iter().map(|(_, v)| v).collect()),
        "entries" => Value::Array(
            entries
                .into_iter()
                .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
                .collect(),
        ),
        "assign" => {
            let Value::Object(mut merged) = target else {
                return Err(ScriptError::Type(
                    "Object.assign target must be an object".to_string(),
                ));
            };
            for source in args.iter().skip(1) {
                if let Value::Object(map) = source {
                    merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            Value::Object(merged)
        }
        "fromEntries" => {
            let Value::Array(pairs) = target else {
                return Err(ScriptError::Type("Object.fromEntries expects an array".to_string()));
            };
            let map: BTreeMap<String, Value> = pairs
                .into_iter()
                .filter_map(|pair| match pair {
                    Value::Array(kv) => {
                        let mut kv = kv.into_iter();
                        let key = kv.next()?.to_string();
                        Some((key, kv.next().unwrap_or(Value::Undefined)))
                    }
                    _ => None,
                })
                .collect();
            Value::Object(map)
        }
        _ => target,
    })
}

fn array_from(source: &Value) -> ScriptResult<Vec<Value>> {
    Ok(match source {
        Value::Array(items) => items.clone(),
        Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
        Value::Object(map) => match map.get("length") {
            Some(len) => {
                let len = usize::try_from(len.to_integer().max(0)).unwrap_or(MAX_ARRAY_LENGTH + 1);
                filled_array(len)?
            }
            None => Vec::new(),
        },
        _ => Vec::new(),
    })
}

/// `JSON.stringify`. `None` for values with no JSON form.
pub(super) fn stringify(value: &Value, indent: Option<&Value>) -> Option<String> {
    let json = value.to_json()?;
    let indent = match indent {
        Some(Value::Number(n)) if *n >= 1.0 => " ".repeat((*n as usize).min(10)),
        Some(Value::String(s)) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return Some(json.to_string());
    }
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(&json, &mut serializer).ok()?;
    String::from_utf8(out).ok()
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    for (prefix, value) in [
        ("Infinity", f64::INFINITY),
        ("+Infinity", f64::INFINITY),
        ("-Infinity", f64::NEG_INFINITY),
    ] {
        if text.starts_with(prefix) {
            return value;
        }
    }
    let candidate: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        .collect();
    (1..=candidate.len())
        .rev()
        .find_map(|len| candidate[..len].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn parse_int(text: &str, radix: i64) -> f64 {
    let mut text = text.trim();
    let mut sign = 1.0;
    if let Some(rest) = text.strip_prefix('-') {
        sign = -1.0;
        text = rest;
    } else if let Some(rest) = text.strip_prefix('+') {
        text = rest;
    }

    let mut radix = radix;
    if radix == 0 || radix == 16 {
        if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            text = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let digits: Vec<u32> = text
        .chars()
        .map_while(|c| c.to_digit(radix as u32))
        .collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    sign * digits
        .into_iter()
        .fold(0.0, |acc, d| acc * radix as f64 + f64::from(d))
}

/// `Number.prototype.toFixed`
pub(super) fn to_fixed(n: f64, digits: usize) -> String {
    if n.is_finite() {
        format!("{n:.digits$}")
    } else {
        format_number(n)
    }
}
