//! Unwrap helpers with good error messages.
//!
//! These replace `unwrap()` and `expect()` in test code; `#[track_caller]`
//! points the panic at the test line rather than here.

use std::fmt::Debug;

/// Unwrap a `Result`, panicking with the error value on `Err`.
///
/// # Example
///
/// ```rust
/// use cluster_test_helpers::must;
///
/// let value = must("42".parse::<u16>());
/// assert_eq!(value, 42);
/// ```
///
/// # Panics
///
/// Panics if the result is `Err`.
#[track_caller]
pub fn must<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must: unexpected Err: {e:?}"),
    }
}

/// Unwrap an `Option`, panicking with `msg` on `None`.
///
/// # Panics
///
/// Panics if the option is `None`.
#[track_caller]
pub fn must_some<T>(option: Option<T>, msg: &str) -> T {
    match option {
        Some(v) => v,
        None => panic!("must_some: {msg}"),
    }
}

/// Unwrap a `Result` with a context message.
///
/// # Panics
///
/// Panics if the result is `Err`, with the context and error value.
#[track_caller]
pub fn must_with<T, E: Debug>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must_with: {context}: {e:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_must_ok() {
        assert_eq!(must(Ok::<_, ()>(3)), 3);
        assert_eq!(must_some(Some("x"), "present"), "x");
    }

    #[test]
    #[should_panic(expected = "must_with: opening port")]
    fn test_must_with_reports_context() {
        must_with(Err::<(), _>("denied"), "opening port");
    }
}
