//! Schema-agnostic payload envelope

use crate::CallError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Raw payload as it travels through the transport.
///
/// The transport never needs to know the concrete request or response types;
/// callers convert to and from their own types with [`Envelope::encode`] and
/// [`Envelope::decode`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Value);

impl Envelope {
    /// Wrap an already-built JSON value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The empty envelope (`null`)
    pub fn null() -> Self {
        Self(Value::Null)
    }

    /// Structurally copy any serializable value into an envelope
    pub fn encode<T: Serialize + ?Sized>(data: &T) -> Result<Self, CallError> {
        serde_json::to_value(data)
            .map(Self)
            .map_err(|e| CallError::Encode(e.to_string()))
    }

    /// Structurally copy the envelope into `T`.
    ///
    /// Fails with [`CallError::Decode`] when the shapes are incompatible.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, CallError> {
        serde_json::from_value(self.0).map_err(|e| CallError::Decode {
            target: std::any::type_name::<T>(),
            message: e.to_string(),
        })
    }

    /// Borrow the underlying JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwrap into the underlying JSON value
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Whether the envelope carries no data
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl From<Value> for Envelope {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
