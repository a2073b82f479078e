//! Converted values passed to constructors and operations.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::descriptor::ObjectId;
use crate::registry::Handle;
use crate::value::BasicValue;

/// The result of converting one JSON node.
///
/// Entities become [`Argument::Object`] references into the registry. Basic
/// values are converted fresh. Everything else is kept as plain data, with
/// arrays and untagged objects converted element-wise so that nested
/// descriptors are materialized wherever they appear.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Primitive JSON data.
    Data(Value),
    /// A converted basic value.
    Basic(BasicValue),
    /// A materialized (or already registered) live object.
    Object {
        /// Id of the object.
        id: ObjectId,
        /// Registry handle of the object.
        handle: Handle,
    },
    /// An array of converted elements.
    List(Vec<Argument>),
    /// An untagged object of converted fields.
    Record(BTreeMap<String, Argument>),
}

impl Argument {
    /// Plain JSON form. Object references collapse to their id string.
    #[must_use]
    pub fn to_plain(&self) -> Value {
        match self {
            Self::Data(value) => value.clone(),
            Self::Basic(value) => value.to_json(),
            Self::Object { id, .. } => Value::String(id.to_string()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_plain).collect()),
            Self::Record(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, arg)| (name.clone(), arg.to_plain()))
                    .collect(),
            ),
        }
    }

    /// Decode the plain form into a typed value.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's message when the shape does not match.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, String> {
        match self {
            Self::Object { id, .. } => Err(format!("expected a value, got object {id}")),
            other => T::deserialize(other.to_plain()).map_err(|e| e.to_string()),
        }
    }

    /// Handle of a referenced object.
    #[must_use]
    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Self::Object { handle, .. } => Some(*handle),
            _ => None,
        }
    }

    /// String data.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Data(value) => value.as_str(),
            _ => None,
        }
    }

    /// Numeric data.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Data(value) => value.as_f64(),
            _ => None,
        }
    }

    /// Boolean data.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Data(value) => value.as_bool(),
            _ => None,
        }
    }

    /// Whether this is JSON `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Data(Value::Null))
    }

    /// Every object handle referenced anywhere inside, in traversal order.
    #[must_use]
    pub fn handles(&self) -> Vec<Handle> {
        let mut out = Vec::new();
        self.collect_handles(&mut out);
        out
    }

    fn collect_handles(&self, out: &mut Vec<Handle>) {
        match self {
            Self::Object { handle, .. } => out.push(*handle),
            Self::List(items) => items.iter().for_each(|item| item.collect_handles(out)),
            Self::Record(fields) => fields.values().for_each(|field| field.collect_handles(out)),
            Self::Data(_) | Self::Basic(_) => {}
        }
    }
}
