//! JSON-RPC server for geomap sessions.
//!
//! Implements JSON-RPC 2.0 routing from the remote view-model owner to one
//! [`MapComponent`] per session. Forwarded events leave as `map/event`
//! notifications.

use std::collections::HashMap;
use std::sync::Arc;

use geomap_core::{
    EventSink, ForwardedEvent, HeadlessEngine, LogSink, MapComponent, MapOptions, ObjectId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::error::{RpcError, RpcResult};
use crate::params::{
    BatchParams, CallParams, CreateParams, FireParams, ResizeParams, SessionParams, SpliceParams,
};

/// Methods understood by [`MapRpcServer`].
pub const METHODS: &[&str] = &[
    "initialize",
    "map/create",
    "map/destroy",
    "map/layers",
    "map/layers/splice",
    "map/controls",
    "map/controls/splice",
    "map/call",
    "map/ready",
    "map/update",
    "map/resize",
    "map/fire",
    "map/describe",
];

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Create a request.
    #[must_use]
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID (matches request).
    pub id: Value,
    /// Result (on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Error code, if this is an error response.
    #[must_use]
    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// JSON-RPC 2.0 notification (no id, no response).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Notification method.
    pub method: String,
    /// Notification parameters.
    pub params: Value,
}

impl JsonRpcNotification {
    /// A forwarded map event for a session.
    #[must_use]
    pub fn map_event(session: &str, event: &ForwardedEvent) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: "map/event".to_string(),
            params: json!({ "session": session, "event": event }),
        }
    }
}

/// Event sink that turns forwarded events into notifications.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    session: String,
    tx: mpsc::UnboundedSender<JsonRpcNotification>,
}

impl ChannelSink {
    /// Create a sink for a session.
    #[must_use]
    pub fn new(session: impl Into<String>, tx: mpsc::UnboundedSender<JsonRpcNotification>) -> Self {
        Self {
            session: session.into(),
            tx,
        }
    }
}

impl EventSink for ChannelSink {
    fn forward(&mut self, event: ForwardedEvent) {
        tracing::debug!(session = %self.session, event = %event.event, "Queued map/event notification");
        if self
            .tx
            .send(JsonRpcNotification::map_event(&self.session, &event))
            .is_err()
        {
            tracing::debug!(session = %self.session, "Notification channel closed");
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcConfig {
    /// Session used when a request names none.
    pub default_session: String,
    /// Viewport width for maps created without options.
    pub width: f64,
    /// Viewport height for maps created without options.
    pub height: f64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            default_session: "default".to_string(),
            width: 800.0,
            height: 600.0,
        }
    }
}

/// JSON-RPC server hosting one map component per session.
pub struct MapRpcServer {
    /// Active sessions.
    sessions: Arc<Mutex<HashMap<String, MapComponent>>>,
    /// Where forwarded events go.
    notifier: Option<mpsc::UnboundedSender<JsonRpcNotification>>,
    config: RpcConfig,
}

impl MapRpcServer {
    /// Create a server. Events are only logged until a notifier is set.
    #[must_use]
    pub fn new(config: RpcConfig) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            notifier: None,
            config,
        }
    }

    /// Send forwarded events of sessions created from now on to `tx`.
    pub fn set_notifier(&mut self, tx: mpsc::UnboundedSender<JsonRpcNotification>) {
        self.notifier = Some(tx);
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Get the sessions map for external access.
    #[must_use]
    pub fn sessions(&self) -> Arc<Mutex<HashMap<String, MapComponent>>> {
        Arc::clone(&self.sessions)
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, params = %request.params, "RPC request");

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                request.id,
                -32600,
                format!("Unsupported JSON-RPC version: {}", request.jsonrpc),
            );
        }

        let params = request.params;
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize().await,
            "map/create" => self.handle_create(params).await,
            "map/destroy" => self.handle_destroy(params).await,
            "map/layers" => self.handle_batch(params, false).await,
            "map/controls" => self.handle_batch(params, true).await,
            "map/layers/splice" => self.handle_splice(params, false).await,
            "map/controls/splice" => self.handle_splice(params, true).await,
            "map/call" => self.handle_call(params).await,
            "map/update" => self.handle_update(params).await,
            "map/ready" => self.handle_ready(params).await,
            "map/resize" => self.handle_resize(params).await,
            "map/fire" => self.handle_fire(params).await,
            "map/describe" => self.handle_describe(params).await,
            _ => {
                return JsonRpcResponse::error(
                    request.id,
                    -32601,
                    format!("Method not found: {}", request.method),
                )
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                tracing::warn!(method = %request.method, error = %e, "RPC request failed");
                JsonRpcResponse::error(request.id, e.code(), e.to_string())
            }
        }
    }

    /// Handle initialize request. Creates the default session if missing.
    async fn handle_initialize(&self) -> RpcResult<Value> {
        let session = self.config.default_session.clone();
        let mut sessions = self.sessions.lock().await;
        if !sessions.contains_key(&session) {
            let component = self.create_component(&session, self.default_options())?;
            sessions.insert(session.clone(), component);
        }

        Ok(json!({
            "serverInfo": {
                "name": "geomap",
                "version": env!("CARGO_PKG_VERSION")
            },
            "defaultSession": session,
            "capabilities": {
                "methods": METHODS
            }
        }))
    }

    async fn handle_create(&self, params: Value) -> RpcResult<Value> {
        let params: CreateParams = parse(params)?;
        let session = self.session_id(params.session);
        let options = params.options.unwrap_or_else(|| self.default_options());

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session) {
            return Err(RpcError::SessionExists(session));
        }
        let component = self.create_component(&session, options)?;
        let id = component.id().clone();
        sessions.insert(session.clone(), component);
        Ok(json!({ "session": session, "id": id }))
    }

    async fn handle_destroy(&self, params: Value) -> RpcResult<Value> {
        let params: SessionParams = parse(params)?;
        let session = self.session_id(params.session);
        let removed = self.sessions.lock().await.remove(&session);
        match removed {
            Some(component) => {
                tracing::info!(session = %session, objects = component.registry().len(), "Destroyed map session");
                Ok(json!({ "session": session, "destroyed": true }))
            }
            None => Err(RpcError::SessionNotFound(session)),
        }
    }

    async fn handle_batch(&self, params: Value, controls: bool) -> RpcResult<Value> {
        let params: BatchParams = parse(params)?;
        let ids: Vec<ObjectId> = self
            .with_session(params.session, |map| {
                if controls {
                    map.add_controls(&params.descriptors)
                } else {
                    map.set_layers(&params.descriptors)
                }
            })
            .await?;
        Ok(json!({ "ids": ids }))
    }

    async fn handle_splice(&self, params: Value, controls: bool) -> RpcResult<Value> {
        let params: SpliceParams = parse(params)?;
        let outcome = self
            .with_session(params.session, |map| {
                if controls {
                    map.apply_control_splices(&params.splices)
                } else {
                    map.apply_layer_splices(&params.splices)
                }
            })
            .await?;
        Ok(serde_json::to_value(outcome).map_err(geomap_core::MapError::from)?)
    }

    async fn handle_call(&self, params: Value) -> RpcResult<Value> {
        let params: CallParams = parse(params)?;
        let request = params.request();
        let result = self
            .with_session(params.session, |map| map.call(&request))
            .await?;
        Ok(json!({ "result": result }))
    }

    async fn handle_update(&self, params: Value) -> RpcResult<Value> {
        let params: SessionParams = parse(params)?;
        let ready = self
            .with_session(params.session, |map| {
                map.after_server_update();
                Ok(map.is_ready())
            })
            .await?;
        Ok(json!({ "ready": ready }))
    }

    async fn handle_ready(&self, params: Value) -> RpcResult<Value> {
        let params: SessionParams = parse(params)?;
        let ready = self
            .with_session(params.session, |map| {
                map.engine_ready();
                Ok(map.is_ready())
            })
            .await?;
        Ok(json!({ "ready": ready }))
    }

    async fn handle_resize(&self, params: Value) -> RpcResult<Value> {
        let params: ResizeParams = parse(params)?;
        let (width, height) = (params.width, params.height);
        self.with_session(params.session, |map| map.resize(width, height))
            .await?;
        Ok(json!({ "width": width, "height": height }))
    }

    async fn handle_fire(&self, params: Value) -> RpcResult<Value> {
        let params: FireParams = parse(params)?;
        let bound = self
            .with_session(params.session, |map| {
                map.fire(&params.target_id, &params.event, params.payload)
            })
            .await?;
        Ok(json!({ "forwarded": bound }))
    }

    async fn handle_describe(&self, params: Value) -> RpcResult<Value> {
        let params: SessionParams = parse(params)?;
        self.with_session(params.session, |map| Ok(map.describe()))
            .await
    }

    /// Run `f` against a session's component under the sessions lock.
    async fn with_session<T>(
        &self,
        session: Option<String>,
        f: impl FnOnce(&mut MapComponent) -> Result<T, geomap_core::MapError>,
    ) -> RpcResult<T> {
        let session = self.session_id(session);
        let mut sessions = self.sessions.lock().await;
        let map = sessions
            .get_mut(&session)
            .ok_or(RpcError::SessionNotFound(session))?;
        Ok(f(map)?)
    }

    fn session_id(&self, session: Option<String>) -> String {
        session.unwrap_or_else(|| self.config.default_session.clone())
    }

    fn default_options(&self) -> MapOptions {
        MapOptions {
            width: self.config.width,
            height: self.config.height,
            ..MapOptions::default()
        }
    }

    fn create_component(&self, session: &str, options: MapOptions) -> RpcResult<MapComponent> {
        let sink: Box<dyn EventSink> = match &self.notifier {
            Some(tx) => Box::new(ChannelSink::new(session, tx.clone())),
            None => Box::new(LogSink),
        };
        let component = MapComponent::new(options, Box::new(HeadlessEngine::new()), sink)?;
        tracing::info!(session = %session, map = %component.id(), "Created map session");
        Ok(component)
    }
}

impl Default for MapRpcServer {
    fn default() -> Self {
        Self::new(RpcConfig::default())
    }
}

/// Decode params, treating absent params as an empty object.
fn parse<T: DeserializeOwned>(params: Value) -> RpcResult<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn request(server: &MapRpcServer, method: &str, params: Value) -> JsonRpcResponse {
        server
            .handle_request(JsonRpcRequest::new(1, method, params))
            .await
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = MapRpcServer::default();
        let response = request(&server, "initialize", Value::Null).await;

        assert!(response.error.is_none());
        let result = response.result.expect("should have result");
        assert_eq!(result["serverInfo"]["name"], "geomap");
        assert_eq!(result["defaultSession"], "default");
        assert!(server.sessions().lock().await.contains_key("default"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = MapRpcServer::default();
        let response = request(&server, "map/explode", Value::Null).await;
        assert_eq!(response.error_code(), Some(-32601));
    }

    #[tokio::test]
    async fn test_wrong_version() {
        let server = MapRpcServer::default();
        let mut req = JsonRpcRequest::new(1, "initialize", Value::Null);
        req.jsonrpc = "1.0".to_string();
        let response = server.handle_request(req).await;
        assert_eq!(response.error_code(), Some(-32600));
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let server = MapRpcServer::default();
        let params = json!({"session": "s1"});
        assert!(request(&server, "map/create", params.clone()).await.error.is_none());
        let response = request(&server, "map/create", params).await;
        assert_eq!(response.error_code(), Some(-32011));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let server = MapRpcServer::default();
        let response = request(&server, "map/describe", json!({"session": "nope"})).await;
        assert_eq!(response.error_code(), Some(-32010));
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let server = MapRpcServer::default();
        request(&server, "initialize", Value::Null).await;
        let response = request(&server, "map/call", json!({"methodName": "getZoom"})).await;
        assert_eq!(response.error_code(), Some(-32602));
    }

    #[tokio::test]
    async fn test_call_maps_core_error_codes() {
        let server = MapRpcServer::default();
        request(&server, "initialize", Value::Null).await;

        let missing = request(
            &server,
            "map/call",
            json!({"targetId": "missing-id", "methodName": "x", "arguments": "[]"}),
        )
        .await;
        assert_eq!(missing.error_code(), Some(-32002));

        let malformed = request(
            &server,
            "map/call",
            json!({"targetId": "map", "methodName": "setZoom", "arguments": "{"}),
        )
        .await;
        assert_eq!(malformed.error_code(), Some(-32004));
    }

    #[tokio::test]
    async fn test_call_set_zoom() {
        let server = MapRpcServer::default();
        request(&server, "initialize", Value::Null).await;

        let response = request(
            &server,
            "map/call",
            json!({"targetId": "map", "methodName": "setZoom", "arguments": "[5]"}),
        )
        .await;
        assert!(response.error.is_none());

        let zoom = request(
            &server,
            "map/call",
            json!({"targetId": "map", "methodName": "getZoom"}),
        )
        .await
        .result
        .expect("should have result");
        assert_eq!(zoom["result"], json!(5.0));
    }

    #[tokio::test]
    async fn test_destroy() {
        let server = MapRpcServer::default();
        request(&server, "initialize", Value::Null).await;
        let response = request(&server, "map/destroy", Value::Null).await;
        assert!(response.error.is_none());
        assert!(server.sessions().lock().await.is_empty());

        let again = request(&server, "map/destroy", Value::Null).await;
        assert_eq!(again.error_code(), Some(-32010));
    }

    #[tokio::test]
    async fn test_create_uses_configured_viewport() {
        let server = MapRpcServer::new(RpcConfig {
            default_session: "main".to_string(),
            width: 1024.0,
            height: 768.0,
        });
        request(&server, "map/create", Value::Null).await;
        let described = request(&server, "map/describe", Value::Null)
            .await
            .result
            .expect("should describe");
        assert_eq!(described["size"]["x"], json!(1024.0));
        assert_eq!(described["size"]["y"], json!(768.0));
    }
}
