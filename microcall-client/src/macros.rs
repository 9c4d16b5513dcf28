//! Argument list construction

/// Builds a `Vec<Argument>` from values that convert into an argument.
///
/// # Example
///
/// ```rust
/// use microcall_client::args;
/// let args = args![7, "admin", true];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    [$($arg:expr),* $(,)?] => {
        vec![$(
            $crate::microcall_core::Argument::from($arg)
        ),*]
    };
}

/// Builds a JSON argument from any `Serialize` value, propagating the
/// conversion error with `?`.
///
/// # Example
///
/// ```rust
/// use microcall_client::{json_arg, CallError};
/// # fn main() -> Result<(), CallError> {
/// let profile = json_arg!(&serde_json::json!({"name": "ada"}))?;
/// # let _ = profile;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! json_arg {
    ($value:expr) => {
        $crate::microcall_core::Argument::json($value)
    };
}
