//! Properties and built-in methods of strings, numbers, arrays and objects
//!
//! Methods that take callbacks (`map`, `filter`, `sort` with a comparator, ...)
//! need the interpreter and live there.

use super::globals::to_fixed;
use super::limits::{check_array_len, check_string_len, invalid_string_length};
use super::value::{format_number, Value};
use super::{ScriptError, ScriptResult};
use std::cmp::Ordering;

/// Array methods that modify their receiver.
pub(super) const MUTATING: &[&str] = &[
    "push", "pop", "shift", "unshift", "reverse", "splice", "sort", "fill",
];

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

/// Canonical array index: `"3"` but not `"03"` or `"-1"`.
pub(super) fn array_index(key: &str) -> Option<usize> {
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse().ok()
}

/// Resolve a relative position the way `slice` does: negatives count from the end.
fn relative(position: &Value, len: usize, default: usize) -> usize {
    if matches!(position, Value::Undefined) {
        return default;
    }
    let n = position.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

/// Property read on a plain value. Host and namespace objects are handled by the caller.
pub(super) fn property(value: &Value, name: &str) -> Value {
    match value {
        Value::String(s) => match name {
            "length" => s.chars().count().into(),
            _ => array_index(name)
                .and_then(|i| s.chars().nth(i))
                .map_or(Value::Undefined, |c| Value::String(c.to_string())),
        },
        Value::Array(items) => match name {
            "length" => items.len().into(),
            _ => array_index(name)
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Undefined),
        },
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Undefined),
        Value::Function(def) => match name {
            "name" => Value::String(def.name.clone().unwrap_or_default()),
            "length" => def.params.len().into(),
            _ => Value::Undefined,
        },
        _ => Value::Undefined,
    }
}

/// Call a non-callback method. `Ok(None)` when the receiver has no such method.
pub(super) fn call(receiver: &mut Value, name: &str, args: &[Value]) -> ScriptResult<Option<Value>> {
    match receiver {
        Value::String(s) => string_method(s, name, args),
        Value::Number(n) => number_method(*n, name, args),
        Value::Bool(b) => Ok((name == "toString").then(|| Value::String(b.to_string()))),
        Value::Array(items) => array_method(items, name, args),
        Value::Object(map) => Ok(match name {
            "hasOwnProperty" => Some(Value::Bool(map.contains_key(&arg(args, 0).to_string()))),
            // Response objects from `net.fetch`
            "text" => match map.get("body") {
                Some(Value::String(body)) => Some(Value::String(body.clone())),
                _ => None,
            },
            "json" => match map.get("body") {
                Some(Value::String(body)) => {
                    let json: serde_json::Value = serde_json::from_str(body)
                        .map_err(|e| ScriptError::Syntax(format!("JSON.parse: {e}")))?;
                    Some(Value::from_json(json))
                }
                _ => None,
            },
            "toString" => Some(Value::string("[object Object]")),
            _ => None,
        }),
        _ => Ok(None),
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> ScriptResult<Option<Value>> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let text = |i: usize| arg(args, i).to_string();
    let char_index = |byte: usize| s[..byte].chars().count();

    let value = match name {
        "toUpperCase" => s.to_uppercase().into(),
        "toLowerCase" => s.to_lowercase().into(),
        "trim" => s.trim().into(),
        "trimStart" => s.trim_start().into(),
        "trimEnd" => s.trim_end().into(),
        "toString" => s.into(),
        "split" => {
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![s.into()],
                Some(sep) => {
                    let sep = sep.to_string();
                    if sep.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::from).collect()
                    }
                }
            };
            let limit = match args.get(1) {
                Some(Value::Undefined) | None => parts.len(),
                Some(n) => n.to_integer().max(0) as usize,
            };
            Value::Array(parts.into_iter().take(limit).collect())
        }
        "includes" => s.contains(text(0).as_str()).into(),
        "startsWith" => s.starts_with(text(0).as_str()).into(),
        "endsWith" => s.ends_with(text(0).as_str()).into(),
        "indexOf" => s
            .find(text(0).as_str())
            .map_or(-1.0, |byte| char_index(byte) as f64)
            .into(),
        "lastIndexOf" => s
            .rfind(text(0).as_str())
            .map_or(-1.0, |byte| char_index(byte) as f64)
            .into(),
        "slice" => {
            let start = relative(&arg(args, 0), len, 0);
            let end = relative(&arg(args, 1), len, len);
            chars[start..end.max(start)].iter().collect::<String>().into()
        }
        "substring" => {
            let clamp = |v: Value, default: usize| match v {
                Value::Undefined => default,
                v => (v.to_integer().max(0) as usize).min(len),
            };
            let (a, b) = (clamp(arg(args, 0), 0), clamp(arg(args, 1), len));
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            chars[start..end].iter().collect::<String>().into()
        }
        "replace" => s.replacen(text(0).as_str(), &text(1), 1).into(),
        "replaceAll" => s.replace(text(0).as_str(), &text(1)).into(),
        "repeat" => {
            let count = arg(args, 0).to_integer();
            let Ok(count) = usize::try_from(count) else {
                return Err(ScriptError::Range(format!("Invalid count value: {count}")));
            };
            let size = s.len().checked_mul(count).ok_or_else(invalid_string_length)?;
            check_string_len(size)?;
            s.repeat(count).into()
        }
        "padStart" | "padEnd" => {
            let target = usize::try_from(arg(args, 0).to_integer().max(0)).unwrap_or(usize::MAX);
            check_string_len(target)?;
            let fill = match args.get(1) {
                Some(Value::Undefined) | None => " ".to_string(),
                Some(v) => v.to_string(),
            };
            if target <= len || fill.is_empty() {
                s.into()
            } else {
                let padding: String = fill.chars().cycle().take(target - len).collect();
                if name == "padStart" {
                    format!("{padding}{s}").into()
                } else {
                    format!("{s}{padding}").into()
                }
            }
        }
        "charAt" => chars
            .get(arg(args, 0).to_integer().max(0) as usize)
            .map_or_else(String::new, char::to_string)
            .into(),
        "charCodeAt" => chars
            .get(arg(args, 0).to_integer().max(0) as usize)
            .map_or(f64::NAN, |c| f64::from(u32::from(*c)))
            .into(),
        "at" => {
            let i = arg(args, 0).to_integer();
            let i = if i < 0 { len as i64 + i } else { i };
            usize::try_from(i)
                .ok()
                .and_then(|i| chars.get(i))
                .map_or(Value::Undefined, |c| Value::String(c.to_string()))
        }
        "concat" => {
            let mut out = s.to_string();
            for a in args {
                let more = a.to_string();
                check_string_len(out.len() + more.len())?;
                out.push_str(&more);
            }
            out.into()
        }
        "localeCompare" => match s.cmp(text(0).as_str()) {
            Ordering::Less => (-1).into(),
            Ordering::Equal => 0.into(),
            Ordering::Greater => 1.into(),
        },
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn number_method(n: f64, name: &str, args: &[Value]) -> ScriptResult<Option<Value>> {
    let value = match name {
        "toFixed" => {
            let digits = arg(args, 0).to_integer();
            if !(0..=100).contains(&digits) {
                return Err(ScriptError::Range(
                    "toFixed() digits argument must be between 0 and 100".to_string(),
                ));
            }
            to_fixed(n, digits as usize).into()
        }
        "toString" => match args.first().map(Value::to_integer) {
            Some(radix) if radix != 10 => {
                if !(2..=36).contains(&radix) {
                    return Err(ScriptError::Range(
                        "toString() radix must be between 2 and 36".to_string(),
                    ));
                }
                to_radix(n, radix as u32).into()
            }
            _ => format_number(n).into(),
        },
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn to_radix(n: f64, radix: u32) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let mut int = n.abs().trunc() as u64;
    let mut digits = Vec::new();
    loop {
        let d = (int % u64::from(radix)) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('0'));
        int /= u64::from(radix);
        if int == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// Default `sort()` order: by string form, `undefined` last.
pub(super) fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// `includes` equality: like `===` but NaN matches NaN.
fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

fn flatten(items: &[Value], depth: i64, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => flatten(inner, depth - 1, out),
            other => out.push(other.clone()),
        }
    }
}

fn array_method(items: &mut Vec<Value>, name: &str, args: &[Value]) -> ScriptResult<Option<Value>> {
    let len = items.len();
    let value = match name {
        "join" | "toString" => {
            let sep = match args.first() {
                Some(Value::Undefined) | None => ",".to_string(),
                Some(sep) if name == "join" => sep.to_string(),
                Some(_) => ",".to_string(),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
                .collect();
            let size = parts.iter().map(String::len).sum::<usize>()
                + sep.len() * parts.len().saturating_sub(1);
            check_string_len(size)?;
            parts.join(&sep).into()
        }
        "slice" => {
            let start = relative(&arg(args, 0), len, 0);
            let end = relative(&arg(args, 1), len, len);
            Value::Array(items[start..end.max(start)].to_vec())
        }
        "concat" => {
            let mut out = items.clone();
            for a in args {
                match a {
                    Value::Array(more) => {
                        check_array_len(out.len() + more.len())?;
                        out.extend(more.iter().cloned());
                    }
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        "includes" => {
            let needle = arg(args, 0);
            items.iter().any(|v| same_value_zero(v, &needle)).into()
        }
        "indexOf" => {
            let needle = arg(args, 0);
            items
                .iter()
                .position(|v| v.strict_equals(&needle))
                .map_or(-1.0, |i| i as f64)
                .into()
        }
        "lastIndexOf" => {
            let needle = arg(args, 0);
            items
                .iter()
                .rposition(|v| v.strict_equals(&needle))
                .map_or(-1.0, |i| i as f64)
                .into()
        }
        "at" => {
            let i = arg(args, 0).to_integer();
            let i = if i < 0 { len as i64 + i } else { i };
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Undefined)
        }
        "flat" => {
            let depth = match args.first() {
                Some(Value::Undefined) | None => 1,
                Some(d) => d.to_integer(),
            };
            let mut out = Vec::new();
            flatten(items, depth, &mut out);
            Value::Array(out)
        }
        "push" => {
            check_array_len(len + args.len())?;
            items.extend(args.iter().cloned());
            items.len().into()
        }
        "pop" => items.pop().unwrap_or(Value::Undefined),
        "shift" => {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }
        "unshift" => {
            check_array_len(len + args.len())?;
            items.splice(0..0, args.iter().cloned());
            items.len().into()
        }
        "reverse" => {
            items.reverse();
            Value::Array(items.clone())
        }
        "sort" => {
            items.sort_by(default_order);
            Value::Array(items.clone())
        }
        "splice" => {
            let start = relative(&arg(args, 0), len, 0);
            let delete = match args.get(1) {
                None => len - start,
                Some(n) => (n.to_integer().max(0) as usize).min(len - start),
            };
            let inserted = args.iter().skip(2).cloned();
            Value::Array(items.splice(start..start + delete, inserted).collect())
        }
        "fill" => {
            let value = arg(args, 0);
            let start = relative(&arg(args, 1), len, 0);
            let end = relative(&arg(args, 2), len, len);
            for item in items.iter_mut().take(end).skip(start) {
                *item = value.clone();
            }
            Value::Array(items.clone())
        }
        "keys" => Value::Array((0..len).map(Value::from).collect()),
        "entries" => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| Value::Array(vec![i.into(), v.clone()]))
                .collect(),
        ),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_on(mut receiver: Value, name: &str, args: &[Value]) -> Value {
        call(&mut receiver, name, args).unwrap().unwrap()
    }

    fn strings(items: &[&str]) -> Value {
        Value::Array(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn test_properties() {
        assert_eq!(property(&"héllo".into(), "length"), Value::from(5));
        assert_eq!(property(&"abc".into(), "1"), Value::from("b"));
        assert_eq!(property(&strings(&["a"]), "length"), Value::from(1));
        assert_eq!(property(&strings(&["a"]), "01"), Value::Undefined);
        assert_eq!(property(&Value::Null, "x"), Value::Undefined);
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(call_on("a,b,c".into(), "split", &[",".into()]), strings(&["a", "b", "c"]));
        assert_eq!(call_on("abc".into(), "split", &["".into()]), strings(&["a", "b", "c"]));
        assert_eq!(call_on("hello".into(), "slice", &[(-3).into()]), Value::from("llo"));
        assert_eq!(call_on("hello".into(), "substring", &[3.into(), 1.into()]), Value::from("el"));
        assert_eq!(call_on("5".into(), "padStart", &[3.into(), "0".into()]), Value::from("005"));
        assert_eq!(call_on("a-a".into(), "replace", &["a".into(), "b".into()]), Value::from("b-a"));
        assert_eq!(call_on("abc".into(), "indexOf", &["c".into()]), Value::from(2));
        assert_eq!(call_on("abc".into(), "at", &[(-1).into()]), Value::from("c"));
        assert!(call(&mut "x".into(), "repeat", &[(-1).into()]).is_err());
        assert_eq!(call(&mut "x".into(), "nope", &[]).unwrap(), None);
    }

    #[test]
    fn test_number_methods() {
        assert_eq!(call_on(1.23456.into(), "toFixed", &[2.into()]), Value::from("1.23"));
        assert_eq!(call_on(255.into(), "toString", &[16.into()]), Value::from("ff"));
        assert_eq!(call_on(4.into(), "toString", &[]), Value::from("4"));
    }

    #[test]
    fn test_mutating_array_methods() {
        let mut arr = Value::Array(vec![3.into(), 1.into(), 2.into()]);
        assert_eq!(call(&mut arr, "push", &[4.into()]).unwrap(), Some(4.into()));
        assert_eq!(call(&mut arr, "shift", &[]).unwrap(), Some(3.into()));
        call(&mut arr, "sort", &[]).unwrap();
        assert_eq!(arr, Value::Array(vec![1.into(), 2.into(), 4.into()]));
        let removed = call(&mut arr, "splice", &[1.into(), 1.into(), "x".into()]).unwrap();
        assert_eq!(removed, Some(Value::Array(vec![2.into()])));
        assert_eq!(arr, Value::Array(vec![1.into(), "x".into(), 4.into()]));
    }

    #[test]
    fn test_array_queries() {
        let arr = Value::Array(vec![1.into(), Value::Null, Value::Array(vec![2.into()])]);
        assert_eq!(call_on(arr.clone(), "join", &["-".into()]), Value::from("1--2"));
        assert_eq!(
            call_on(arr.clone(), "flat", &[]),
            Value::Array(vec![1.into(), Value::Null, 2.into()])
        );
        assert_eq!(call_on(arr.clone(), "indexOf", &[Value::Null]), Value::from(1));
        assert_eq!(call_on(arr, "slice", &[1.into()]).to_string(), ",2");
    }

    #[test]
    fn test_response_body_helpers() {
        let response = Value::object([("body", Value::from(r#"{"ok":true}"#))]);
        assert_eq!(
            call_on(response.clone(), "json", &[]),
            Value::object([("ok", Value::Bool(true))])
        );
        assert_eq!(call_on(response, "text", &[]), Value::from(r#"{"ok":true}"#));
    }
}
