use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::CallError;

/// Live value of one parameter for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    /// Opaque bytes, sent as-is when used as the whole payload.
    Bytes(Bytes),
}

impl Argument {
    /// Converts any serializable value into an argument.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, CallError> {
        serde_json::to_value(value)
            .map(Argument::Value)
            .map_err(|e| CallError::contract(format!("argument is not serializable: {}", e)))
    }

    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Argument::Bytes(bytes.into())
    }

    /// Structured form used when the argument is grafted into a payload tree.
    /// Bytes become a base64 string.
    pub fn to_tree(&self) -> Value {
        match self {
            Argument::Value(value) => value.clone(),
            Argument::Bytes(bytes) => Value::String(STANDARD.encode(bytes)),
        }
    }

    /// Text form used for path segments and headers. Only scalars qualify.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Argument::Value(Value::String(s)) => Some(s.clone()),
            Argument::Value(Value::Number(n)) => Some(n.to_string()),
            Argument::Value(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<Bytes> for Argument {
    fn from(bytes: Bytes) -> Self {
        Argument::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(bytes: Vec<u8>) -> Self {
        Argument::Bytes(Bytes::from(bytes))
    }
}

impl From<&str> for Argument {
    fn from(s: &str) -> Self {
        Argument::Value(Value::String(s.to_string()))
    }
}

impl From<String> for Argument {
    fn from(s: String) -> Self {
        Argument::Value(Value::String(s))
    }
}

impl From<bool> for Argument {
    fn from(b: bool) -> Self {
        Argument::Value(Value::Bool(b))
    }
}

macro_rules! numeric_argument {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Argument {
                fn from(n: $ty) -> Self {
                    Argument::Value(Value::from(n))
                }
            }
        )*
    };
}

numeric_argument!(i32, i64, u32, u64, f64);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Profile {
        name: String,
        age: u32,
    }

    #[test]
    fn test_json_argument() {
        let arg = Argument::json(&Profile {
            name: "x".to_string(),
            age: 5,
        })
        .unwrap();
        assert_eq!(arg, Argument::Value(json!({"name": "x", "age": 5})));
    }

    #[test]
    fn test_text_form_only_for_scalars() {
        assert_eq!(Argument::from("a b").to_text().as_deref(), Some("a b"));
        assert_eq!(Argument::from(42i64).to_text().as_deref(), Some("42"));
        assert_eq!(Argument::from(true).to_text().as_deref(), Some("true"));
        assert_eq!(Argument::from(json!({"id": 1})).to_text(), None);
        assert_eq!(Argument::bytes(vec![1u8, 2]).to_text(), None);
    }

    #[test]
    fn test_bytes_tree_form_is_base64() {
        let arg = Argument::bytes(Bytes::from_static(b"hi"));
        assert_eq!(arg.to_tree(), json!("aGk="));
    }
}
