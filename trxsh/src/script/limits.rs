//! Size limits on values a program can build
//!
//! Program-supplied lengths never reach an allocation unchecked. Anything over
//! a limit, or an allocation the system refuses, is a `RangeError`.

use super::value::Value;
use super::{ScriptError, ScriptResult};

/// Longest array a program may build.
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Longest string, in bytes, a program may build.
pub const MAX_STRING_LENGTH: usize = 1 << 28;

pub(super) fn invalid_array_length() -> ScriptError {
    ScriptError::Range("Invalid array length".to_string())
}

pub(super) fn invalid_string_length() -> ScriptError {
    ScriptError::Range("Invalid string length".to_string())
}

/// Array length from a program number: a non-negative integer within the limit.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub(super) fn array_length(n: f64) -> ScriptResult<usize> {
    if n.is_nan() || n < 0.0 || n.fract() != 0.0 || n > MAX_ARRAY_LENGTH as f64 {
        return Err(invalid_array_length());
    }
    Ok(n as usize)
}

/// Resize `items` to `len`, padding with `undefined`.
pub(super) fn resize_array(items: &mut Vec<Value>, len: usize) -> ScriptResult<()> {
    if len > MAX_ARRAY_LENGTH {
        return Err(invalid_array_length());
    }
    if len > items.len() {
        items
            .try_reserve_exact(len - items.len())
            .map_err(|_| invalid_array_length())?;
    }
    items.resize(len, Value::Undefined);
    Ok(())
}

/// Array of `len` `undefined`s.
pub(super) fn filled_array(len: usize) -> ScriptResult<Vec<Value>> {
    let mut items = Vec::new();
    resize_array(&mut items, len)?;
    Ok(items)
}

/// Fail when an array would grow past the limit.
pub(super) fn check_array_len(len: usize) -> ScriptResult<()> {
    if len > MAX_ARRAY_LENGTH {
        return Err(invalid_array_length());
    }
    Ok(())
}

/// Fail when a string would grow past the limit.
pub(super) fn check_string_len(len: usize) -> ScriptResult<()> {
    if len > MAX_STRING_LENGTH {
        return Err(invalid_string_length());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_length() {
        assert_eq!(array_length(3.0), Ok(3));
        assert_eq!(array_length(0.0), Ok(0));
        assert!(array_length(-1.0).is_err());
        assert!(array_length(1.5).is_err());
        assert!(array_length(f64::NAN).is_err());
        assert!(array_length(1e18).is_err());
    }

    #[test]
    fn test_resize_array() {
        let mut items = vec![Value::from(1)];
        resize_array(&mut items, 3).unwrap();
        assert_eq!(items, vec![Value::from(1), Value::Undefined, Value::Undefined]);
        resize_array(&mut items, 1).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            resize_array(&mut items, MAX_ARRAY_LENGTH + 1),
            Err(invalid_array_length())
        );
    }

    #[test]
    fn test_string_limit() {
        assert!(check_string_len(MAX_STRING_LENGTH).is_ok());
        assert_eq!(
            check_string_len(MAX_STRING_LENGTH + 1),
            Err(invalid_string_length())
        );
    }
}
