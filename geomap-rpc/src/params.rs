//! Request parameter types.
//!
//! Every method accepts an optional `session`; when absent the server's
//! default session is used.

use geomap_core::{MapOptions, OperationRequest, Splice};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters naming only a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionParams {
    /// Session id.
    pub session: Option<String>,
}

/// Parameters for `map/create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateParams {
    /// Session id.
    pub session: Option<String>,
    /// Root map options. The configured viewport is used when absent.
    pub options: Option<MapOptions>,
}

/// Parameters for `map/layers` and `map/controls`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchParams {
    /// Session id.
    pub session: Option<String>,
    /// Descriptors to materialize and attach, in order.
    #[serde(alias = "layers", alias = "controls")]
    pub descriptors: Vec<Value>,
}

/// Parameters for `map/layers/splice` and `map/controls/splice`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpliceParams {
    /// Session id.
    pub session: Option<String>,
    /// Diff batches, applied in order.
    pub splices: Vec<Splice>,
}

/// Parameters for `map/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParams {
    /// Session id.
    #[serde(default)]
    pub session: Option<String>,
    /// Id of the live object to invoke on.
    #[serde(alias = "layerId")]
    pub target_id: String,
    /// Method name.
    #[serde(alias = "functionName")]
    pub method_name: String,
    /// Argument array, either as JSON text or inline.
    #[serde(default)]
    pub arguments: Value,
}

impl CallParams {
    /// Build the operation request. Inline arguments are re-encoded so the
    /// dispatcher sees the same text a remote owner would send.
    #[must_use]
    pub fn request(&self) -> OperationRequest {
        let arguments = match &self.arguments {
            Value::Null => "[]".to_string(),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        OperationRequest::new(self.target_id.as_str(), self.method_name.clone(), arguments)
    }
}

/// Parameters for `map/resize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeParams {
    /// Session id.
    #[serde(default)]
    pub session: Option<String>,
    /// New viewport width in pixels.
    pub width: f64,
    /// New viewport height in pixels.
    pub height: f64,
}

/// Parameters for `map/fire`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireParams {
    /// Session id.
    #[serde(default)]
    pub session: Option<String>,
    /// Object the event fires on.
    pub target_id: String,
    /// Native event name.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_params_accept_text_and_inline_arguments() {
        let text: CallParams = serde_json::from_value(json!({
            "targetId": "map", "methodName": "setZoom", "arguments": "[5]"
        }))
        .expect("should parse");
        assert_eq!(text.request().arguments, "[5]");

        let inline: CallParams = serde_json::from_value(json!({
            "layerId": "map", "functionName": "setZoom", "arguments": [5]
        }))
        .expect("should parse");
        assert_eq!(inline.request().arguments, "[5]");
        assert_eq!(inline.request().method_name, "setZoom");
    }

    #[test]
    fn test_missing_arguments_mean_empty_list() {
        let params: CallParams =
            serde_json::from_value(json!({"targetId": "m", "methodName": "getLatLng"}))
                .expect("should parse");
        assert_eq!(params.request().arguments, "[]");
    }

    #[test]
    fn test_batch_aliases() {
        let params: BatchParams =
            serde_json::from_value(json!({"session": "s", "layers": [{"typeTag": "Marker"}]}))
                .expect("should parse");
        assert_eq!(params.session.as_deref(), Some("s"));
        assert_eq!(params.descriptors.len(), 1);
    }

    #[test]
    fn test_call_params_require_target() {
        let result: Result<CallParams, _> =
            serde_json::from_value(json!({"methodName": "getZoom"}));
        assert!(result.is_err());
    }
}
