//! Declarative descriptors received from the remote view-model owner.
//!
//! A [`Descriptor`] names the kind of object to build with its `typeTag`, carries a
//! stable producer-assigned `id`, and holds the attributes, children and events
//! the object is materialized from. Field names follow the wire format, with the
//! historical names (`leafletType`, `uuid`, `layers`, ...) accepted as aliases.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{MapError, MapResult};

/// Stable identifier of a live object, assigned by the descriptor producer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap a producer-assigned id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a descriptor that arrived without one.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Tooltip or popup decoration attached to a layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    /// HTML or text content.
    #[serde(default)]
    pub content: String,
    /// Remaining overlay options (direction, offset, permanent, ...).
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Overlay {
    /// Create an overlay with content and no options.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            options: Map::new(),
        }
    }
}

/// A producer-authored description of one entity or basic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Kind of object to build.
    #[serde(alias = "leafletType")]
    pub type_tag: String,

    /// Stable identity. Generated when absent.
    #[serde(default, alias = "uuid", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Attribute names resolved first and passed positionally to the constructor.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructor_argument_names: Vec<String>,

    /// Ordered child descriptors, kept raw until materialization.
    #[serde(default, alias = "layers", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Value>,

    /// Event names to bind through the event router.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,

    /// Tooltip decoration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Overlay>,

    /// Popup decoration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup: Option<Overlay>,

    /// Every other field: options and constructor arguments.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Descriptor {
    /// Create a descriptor with a tag and id.
    #[must_use]
    pub fn new(type_tag: impl Into<String>, id: impl Into<ObjectId>) -> Self {
        Self {
            type_tag: type_tag.into(),
            id: Some(id.into()),
            constructor_argument_names: Vec::new(),
            children: Vec::new(),
            events: Vec::new(),
            tooltip: None,
            popup: None,
            attributes: Map::new(),
        }
    }

    /// Parse a descriptor from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidDescriptor`] if the value is not a tagged object.
    pub fn from_value(value: &Value) -> MapResult<Self> {
        if !is_tagged(value) {
            return Err(MapError::InvalidDescriptor(format!(
                "expected an object with a typeTag, got {}",
                summarize(value)
            )));
        }
        Descriptor::deserialize(value)
            .map_err(|e| MapError::InvalidDescriptor(format!("{e} in {}", summarize(value))))
    }

    /// Set an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Set an attribute and declare it as the next positional constructor argument.
    #[must_use]
    pub fn with_constructor_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        self.constructor_argument_names.push(name.clone());
        self.attributes.insert(name, value);
        self
    }

    /// Append a child descriptor.
    #[must_use]
    pub fn with_child(mut self, child: Value) -> Self {
        self.children.push(child);
        self
    }

    /// Declare an event to bind.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    /// Attach a tooltip.
    #[must_use]
    pub fn with_tooltip(mut self, tooltip: Overlay) -> Self {
        self.tooltip = Some(tooltip);
        self
    }

    /// Attach a popup.
    #[must_use]
    pub fn with_popup(mut self, popup: Overlay) -> Self {
        self.popup = Some(popup);
        self
    }

    /// Serialize back to JSON.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Read the type tag of a raw JSON node, if it has one.
#[must_use]
pub fn type_tag_of(value: &Value) -> Option<&str> {
    let object = value.as_object()?;
    object
        .get("typeTag")
        .or_else(|| object.get("leafletType"))
        .and_then(Value::as_str)
}

/// Read the id of a raw JSON node: a descriptor's `id`/`uuid`, or a bare string.
#[must_use]
pub fn id_of(value: &Value) -> Option<ObjectId> {
    match value {
        Value::String(id) => Some(ObjectId::new(id.as_str())),
        Value::Object(object) => object
            .get("id")
            .or_else(|| object.get("uuid"))
            .and_then(Value::as_str)
            .map(ObjectId::from),
        _ => None,
    }
}

/// Whether a JSON node is a tagged descriptor rather than plain data.
#[must_use]
pub fn is_tagged(value: &Value) -> bool {
    type_tag_of(value).is_some()
}

fn summarize(value: &Value) -> String {
    let text = value.to_string();
    if text.len() > 80 {
        let cut = text
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= 77)
            .last()
            .unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text
    }
}

/// One batch of a children diff: `removed` leave at `index`, `added` enter there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Splice {
    /// Position in the parent's child sequence.
    #[serde(default)]
    pub index: usize,
    /// Removed descriptors (or bare ids).
    #[serde(default)]
    pub removed: Vec<Value>,
    /// Number of added descriptors as announced by the producer.
    #[serde(default)]
    pub added_count: usize,
    /// Added descriptors.
    #[serde(default)]
    pub added: Vec<Value>,
}

impl Splice {
    /// Ids of the removed entries, skipping entries without one.
    #[must_use]
    pub fn removed_ids(&self) -> Vec<ObjectId> {
        self.removed.iter().filter_map(id_of).collect()
    }
}

/// A one-shot remote invocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Id of the live object to invoke on.
    #[serde(alias = "layerId")]
    pub target_id: ObjectId,
    /// Method to invoke.
    #[serde(alias = "functionName")]
    pub method_name: String,
    /// JSON-encoded argument array.
    #[serde(default = "empty_arguments")]
    pub arguments: String,
}

fn empty_arguments() -> String {
    "[]".to_string()
}

impl OperationRequest {
    /// Create a request.
    #[must_use]
    pub fn new(
        target_id: impl Into<ObjectId>,
        method_name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            method_name: method_name.into(),
            arguments: arguments.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_descriptor_with_legacy_names() {
        let value = json!({
            "leafletType": "LayerGroup",
            "uuid": "g1",
            "layers": [{"leafletType": "Marker", "uuid": "m1"}],
            "events": ["click"],
            "attribution": "osm"
        });

        let descriptor = Descriptor::from_value(&value).expect("should parse");
        assert_eq!(descriptor.type_tag, "LayerGroup");
        assert_eq!(descriptor.id, Some(ObjectId::new("g1")));
        assert_eq!(descriptor.children.len(), 1);
        assert_eq!(descriptor.events, vec!["click".to_string()]);
        assert_eq!(descriptor.attributes.get("attribution"), Some(&json!("osm")));
        assert!(!descriptor.attributes.contains_key("layers"));
    }

    #[test]
    fn test_parse_descriptor_with_overlays() {
        let value = json!({
            "typeTag": "Marker",
            "id": "m1",
            "tooltip": {"content": "hello", "direction": "top"},
            "popup": {"content": "<b>hi</b>"}
        });

        let descriptor = Descriptor::from_value(&value).expect("should parse");
        let tooltip = descriptor.tooltip.expect("should have tooltip");
        assert_eq!(tooltip.content, "hello");
        assert_eq!(tooltip.options.get("direction"), Some(&json!("top")));
        assert_eq!(descriptor.popup.map(|p| p.content), Some("<b>hi</b>".to_string()));
    }

    #[test]
    fn test_untagged_value_is_rejected() {
        let err = Descriptor::from_value(&json!({"lat": 1, "lng": 2})).unwrap_err();
        assert!(matches!(err, MapError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_builder_round_trips_through_json() {
        let descriptor = Descriptor::new("Circle", "c1")
            .with_constructor_argument("latlng", json!({"lat": 1.0, "lng": 2.0}))
            .with_attribute("radius", json!(50))
            .with_event("click");

        let parsed = Descriptor::from_value(&descriptor.to_value()).expect("should parse");
        assert_eq!(parsed, descriptor);
        assert_eq!(parsed.constructor_argument_names, vec!["latlng".to_string()]);
    }

    #[test]
    fn test_id_of_accepts_bare_strings() {
        assert_eq!(id_of(&json!("a")), Some(ObjectId::new("a")));
        assert_eq!(id_of(&json!({"uuid": "b"})), Some(ObjectId::new("b")));
        assert_eq!(id_of(&json!(3)), None);
    }

    #[test]
    fn test_operation_request_legacy_names() {
        let request: OperationRequest = serde_json::from_value(json!({
            "layerId": "map",
            "functionName": "setZoom",
            "arguments": "[5]"
        }))
        .expect("should parse");
        assert_eq!(request, OperationRequest::new("map", "setZoom", "[5]"));

        let request: OperationRequest =
            serde_json::from_value(json!({"targetId": "map", "methodName": "getZoom"}))
                .expect("should parse");
        assert_eq!(request.arguments, "[]");
    }

    #[test]
    fn test_splice_removed_ids() {
        let splice: Splice = serde_json::from_value(json!({
            "index": 0,
            "removed": [{"typeTag": "Marker", "id": "a"}, "b", 7],
            "addedCount": 0,
            "added": []
        }))
        .expect("should parse");
        assert_eq!(
            splice.removed_ids(),
            vec![ObjectId::new("a"), ObjectId::new("b")]
        );
    }
}
