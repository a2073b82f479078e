//! WebAssembly bindings for geomap-core.
//!
//! Exposes a [`MapComponent`] to JavaScript hosts. Descriptor batches, diffs
//! and operation arguments cross the boundary as JSON strings; forwarded
//! events are buffered and handed out by `drainEvents`.

use wasm_bindgen::prelude::*;

use crate::descriptor::{OperationRequest, Splice};
use crate::engine::HeadlessEngine;
use crate::event::EventLog;
use crate::{MapComponent, MapOptions};

/// Initialize the geomap WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Map instance for WASM.
#[wasm_bindgen]
pub struct WasmMap {
    component: MapComponent,
    events: EventLog,
}

fn parse<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

#[wasm_bindgen]
impl WasmMap {
    /// Create a map from its options JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if the options are malformed or inconsistent.
    #[wasm_bindgen(constructor)]
    pub fn new(options_json: &str) -> Result<WasmMap, String> {
        let options: MapOptions = if options_json.trim().is_empty() {
            MapOptions::default()
        } else {
            parse(options_json)?
        };
        let events = EventLog::new();
        let component = MapComponent::new(
            options,
            Box::new(HeadlessEngine::new()),
            Box::new(events.clone()),
        )
        .map_err(|e| e.to_string())?;
        Ok(Self { component, events })
    }

    /// Materialize and attach layers from a JSON array of descriptors.
    /// Returns the attached ids as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if parsing or conversion fails.
    #[wasm_bindgen(js_name = setLayers)]
    pub fn set_layers(&mut self, descriptors_json: &str) -> Result<String, String> {
        let descriptors: Vec<serde_json::Value> = parse(descriptors_json)?;
        let ids = self
            .component
            .set_layers(&descriptors)
            .map_err(|e| e.to_string())?;
        to_json(&ids)
    }

    /// Apply a JSON array of layer splices. Returns the splice outcome as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if parsing or application fails.
    #[wasm_bindgen(js_name = applyLayerSplices)]
    pub fn apply_layer_splices(&mut self, splices_json: &str) -> Result<String, String> {
        let splices: Vec<Splice> = parse(splices_json)?;
        let outcome = self
            .component
            .apply_layer_splices(&splices)
            .map_err(|e| e.to_string())?;
        to_json(&outcome)
    }

    /// Materialize and attach controls from a JSON array of descriptors.
    ///
    /// # Errors
    ///
    /// Returns an error string if parsing or conversion fails.
    #[wasm_bindgen(js_name = addControls)]
    pub fn add_controls(&mut self, descriptors_json: &str) -> Result<String, String> {
        let descriptors: Vec<serde_json::Value> = parse(descriptors_json)?;
        let ids = self
            .component
            .add_controls(&descriptors)
            .map_err(|e| e.to_string())?;
        to_json(&ids)
    }

    /// Invoke a method on a live object. Returns the result as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if dispatch fails.
    #[wasm_bindgen(js_name = callFunction)]
    pub fn call_function(
        &mut self,
        target_id: &str,
        method_name: &str,
        arguments_json: &str,
    ) -> Result<String, String> {
        let request = OperationRequest::new(target_id, method_name, arguments_json);
        let value = self.component.call(&request).map_err(|e| e.to_string())?;
        to_json(&value)
    }

    /// Notify the map that the host applied a server update.
    #[wasm_bindgen(js_name = afterServerUpdate)]
    pub fn after_server_update(&mut self) {
        self.component.after_server_update();
    }

    /// Signal that the engine laid out its viewport.
    #[wasm_bindgen(js_name = engineReady)]
    pub fn engine_ready(&mut self) {
        self.component.engine_ready();
    }

    /// Take every buffered forwarded event, each as a JSON string.
    #[wasm_bindgen(js_name = drainEvents)]
    #[must_use]
    pub fn drain_events(&self) -> js_sys::Array {
        self.events
            .drain()
            .iter()
            .filter_map(|event| serde_json::to_string(event).ok())
            .map(|json| JsValue::from_str(&json))
            .collect()
    }

    /// Snapshot of the view and registered objects as JSON.
    #[must_use]
    pub fn describe(&self) -> String {
        self.component.describe().to_string()
    }
}
