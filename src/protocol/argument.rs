//! Command arguments
//!
//! Every value a command can carry, and its textual wire form.

use bytes::Bytes;

use crate::error::{Result, SsdbError};

/// A single command argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// UTF-8 text
    Text(String),

    /// Raw bytes, sent as-is
    Bytes(Bytes),

    /// Base-10 integer
    Int(i64),

    /// Fixed 6-decimal float (lossy)
    Float(f64),

    /// `"1"` or `"0"`
    Bool(bool),

    /// Empty frame
    Null,

    /// One frame per element, no framing around the list itself
    TextList(Vec<String>),
}

impl Argument {
    /// Render this argument into the payloads of its frames, in order.
    ///
    /// Non-finite floats have no fixed-point form and are rejected.
    pub fn to_payloads(&self) -> Result<Vec<Bytes>> {
        let payload = match self {
            Argument::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
            Argument::Bytes(b) => b.clone(),
            Argument::Int(n) => Bytes::from(n.to_string()),
            Argument::Float(f) => {
                if !f.is_finite() {
                    return Err(SsdbError::Encoding(format!(
                        "float argument {} has no fixed-point form",
                        f
                    )));
                }
                Bytes::from(format!("{:.6}", f))
            }
            Argument::Bool(true) => Bytes::from_static(b"1"),
            Argument::Bool(false) => Bytes::from_static(b"0"),
            Argument::Null => Bytes::new(),
            Argument::TextList(items) => {
                return Ok(items
                    .iter()
                    .map(|s| Bytes::copy_from_slice(s.as_bytes()))
                    .collect());
            }
        };
        Ok(vec![payload])
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Text(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Text(value)
    }
}

impl From<&String> for Argument {
    fn from(value: &String) -> Self {
        Argument::Text(value.clone())
    }
}

impl From<&[u8]> for Argument {
    fn from(value: &[u8]) -> Self {
        Argument::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<Vec<u8>> for Argument {
    fn from(value: Vec<u8>) -> Self {
        Argument::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Argument {
    fn from(value: Bytes) -> Self {
        Argument::Bytes(value)
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Argument::Int(value)
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Argument::Int(i64::from(value))
    }
}

impl From<u32> for Argument {
    fn from(value: u32) -> Self {
        Argument::Int(i64::from(value))
    }
}

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        Argument::Float(value)
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Bool(value)
    }
}

impl From<Vec<String>> for Argument {
    fn from(value: Vec<String>) -> Self {
        Argument::TextList(value)
    }
}

impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Argument::Null)
    }
}
