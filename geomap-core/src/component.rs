//! Host-facing map component.
//!
//! A [`MapComponent`] owns one object graph: the root map, every materialized
//! layer and control, the event router and the rendering engine. The host
//! feeds it descriptor batches, diffs and operation requests; native events
//! raised along the way are routed to the bound handler category and forwarded
//! to the component's [`EventSink`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::convert::GraphConverter;
use crate::descriptor::{ObjectId, OperationRequest, Splice};
use crate::dispatch::{self, Outcome};
use crate::engine::RenderEngine;
use crate::error::{MapError, MapResult};
use crate::event::{EventRouter, EventSink, ForwardedEvent, HandlerCategory};
use crate::kind::ObjectKind;
use crate::object::{LiveObject, LiveState, MapView};
use crate::ops::{self, map, Context, NativeEvent};
use crate::ready::Readiness;
use crate::registry::{Handle, ObjectRegistry};
use crate::value::{LatLng, LatLngBounds, Point};

/// Options of the root map object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapOptions {
    /// Id of the map object.
    pub id: ObjectId,
    /// Initial center.
    pub center: LatLng,
    /// Initial zoom.
    pub zoom: f64,
    /// Lowest zoom.
    pub min_zoom: f64,
    /// Highest zoom.
    pub max_zoom: f64,
    /// Region the view is restricted to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bounds: Option<LatLngBounds>,
    /// Viewport width in pixels.
    pub width: f64,
    /// Viewport height in pixels.
    pub height: f64,
    /// Map-level events to bind.
    pub events: Vec<String>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            id: ObjectId::new("map"),
            center: LatLng::new(0.0, 0.0),
            zoom: 0.0,
            min_zoom: 0.0,
            max_zoom: 18.0,
            max_bounds: None,
            width: 800.0,
            height: 600.0,
            events: Vec::new(),
        }
    }
}

impl MapOptions {
    fn validate(&self) -> MapResult<()> {
        if self.min_zoom > self.max_zoom {
            return Err(MapError::InvalidDescriptor(format!(
                "Map minZoom {} exceeds maxZoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        check_size(self.width, self.height).map_err(MapError::InvalidDescriptor)
    }
}

fn check_size(width: f64, height: f64) -> Result<(), String> {
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        Ok(())
    } else {
        Err(format!("invalid viewport size {width}x{height}"))
    }
}

/// What a batch of diffs did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpliceOutcome {
    /// Destroyed ids, including sole-owned children, in destruction order.
    pub removed: Vec<ObjectId>,
    /// Ids of the added entries, in order.
    pub added: Vec<ObjectId>,
}

/// Which map collection a batch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Layers,
    Controls,
}

impl Membership {
    fn accepts(self, kind: ObjectKind) -> bool {
        match self {
            Self::Layers => matches!(kind, ObjectKind::Layer(_)),
            Self::Controls => matches!(kind, ObjectKind::Control(_)),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Layers => "layer",
            Self::Controls => "control",
        }
    }
}

/// One map and everything materialized on it.
pub struct MapComponent {
    options: MapOptions,
    registry: ObjectRegistry,
    router: EventRouter,
    engine: Box<dyn RenderEngine>,
    sink: Box<dyn EventSink>,
    readiness: Readiness<MapComponent>,
    updated_once: bool,
    root: Handle,
}

impl std::fmt::Debug for MapComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapComponent")
            .field("id", &self.options.id)
            .field("objects", &self.registry.len())
            .field("readiness", &self.readiness)
            .finish_non_exhaustive()
    }
}

impl MapComponent {
    /// Create the component and its root map with the standard routing table.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidDescriptor`] for inconsistent options.
    pub fn new(
        options: MapOptions,
        engine: Box<dyn RenderEngine>,
        sink: Box<dyn EventSink>,
    ) -> MapResult<Self> {
        Self::with_router(options, EventRouter::default(), engine, sink)
    }

    /// Create the component with a custom event router.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidDescriptor`] for inconsistent options.
    pub fn with_router(
        options: MapOptions,
        router: EventRouter,
        mut engine: Box<dyn RenderEngine>,
        sink: Box<dyn EventSink>,
    ) -> MapResult<Self> {
        options.validate()?;
        let view = MapView {
            center: options.center,
            zoom: options.zoom.clamp(options.min_zoom, options.max_zoom),
            min_zoom: options.min_zoom,
            max_zoom: options.max_zoom,
            max_bounds: options.max_bounds,
            size: Point::new(options.width, options.height),
            layers: Vec::new(),
            controls: Vec::new(),
        };
        let mut object = LiveObject::new(options.id.clone(), ObjectKind::Map, LiveState::Map(view));
        for event in &options.events {
            router.bind(&mut object, event);
        }

        let mut registry = ObjectRegistry::new();
        let root = registry.register(object)?;
        if let Some(map) = registry.get(root) {
            engine.attach(map);
        }
        tracing::info!(id = %options.id, "Map component created");

        Ok(Self {
            options,
            registry,
            router,
            engine,
            sink,
            readiness: Readiness::new(),
            updated_once: false,
            root,
        })
    }

    /// Id of the root map.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.options.id
    }

    /// Options the component was created with.
    #[must_use]
    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// The object registry.
    #[must_use]
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// The event router.
    #[must_use]
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Current view state.
    #[must_use]
    pub fn view(&self) -> Option<&MapView> {
        self.registry.get(self.root).and_then(LiveObject::as_map)
    }

    /// Look an object up by id.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<&LiveObject> {
        self.registry.object(id)
    }

    /// Whether the engine-ready signal has fired.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness.is_fired()
    }

    /// Materialize layers and attach them to the map in order.
    ///
    /// # Errors
    ///
    /// Fails without attaching anything if any descriptor fails to convert or
    /// denotes something other than a layer.
    pub fn set_layers(&mut self, descriptors: &[Value]) -> MapResult<Vec<ObjectId>> {
        self.attach_batch(Membership::Layers, descriptors, None)
    }

    /// Materialize controls and attach them to the map in order.
    ///
    /// # Errors
    ///
    /// As [`set_layers`](Self::set_layers), for controls.
    pub fn add_controls(&mut self, descriptors: &[Value]) -> MapResult<Vec<ObjectId>> {
        self.attach_batch(Membership::Controls, descriptors, None)
    }

    /// Apply layer diffs.
    ///
    /// Splices are applied in order. Within a splice every removal is fully
    /// detached and unregistered before any addition is materialized.
    /// Additions of one splice are all-or-nothing; splices applied before a
    /// failing one stay applied.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub fn apply_layer_splices(&mut self, splices: &[Splice]) -> MapResult<SpliceOutcome> {
        self.apply_splices(Membership::Layers, splices)
    }

    /// Apply control diffs, with the same ordering rules as layers.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub fn apply_control_splices(&mut self, splices: &[Splice]) -> MapResult<SpliceOutcome> {
        self.apply_splices(Membership::Controls, splices)
    }

    fn apply_splices(&mut self, membership: Membership, splices: &[Splice]) -> MapResult<SpliceOutcome> {
        let mut outcome = SpliceOutcome::default();
        for splice in splices {
            if splice.added_count != splice.added.len() {
                tracing::warn!(
                    index = splice.index,
                    announced = splice.added_count,
                    actual = splice.added.len(),
                    "Splice addedCount disagrees with added entries; using the entries"
                );
            }
            let removed = splice.removed_ids();
            for id in &removed {
                self.check_member(membership, id)?;
            }
            for id in &removed {
                outcome.removed.extend(self.remove_member(membership, id)?);
            }
            let added = self.attach_batch(membership, &splice.added, Some(splice.index))?;
            outcome.added.extend(added);
        }
        Ok(outcome)
    }

    /// Removals may only name objects of the spliced collection.
    fn check_member(&self, membership: Membership, id: &ObjectId) -> MapResult<()> {
        match self.registry.object(id.as_str()).map(LiveObject::kind) {
            Some(kind) if !membership.accepts(kind) => Err(MapError::invalid_argument(
                "splice",
                format!("{id} is a {}, not a {}", kind.tag(), membership.name()),
            )),
            _ => Ok(()),
        }
    }

    fn remove_member(&mut self, membership: Membership, id: &ObjectId) -> MapResult<Vec<ObjectId>> {
        let Some(handle) = self.registry.lookup(id.as_str()) else {
            tracing::debug!(id = %id, "Removed entry is not registered");
            return Ok(Vec::new());
        };
        let mut ctx = Context::new(&mut self.registry, self.engine.as_mut());
        match membership {
            Membership::Layers => map::detach_layer(&mut ctx, handle)?,
            Membership::Controls => map::detach_control(&mut ctx, handle)?,
        };
        let events = ctx.into_events();
        self.deliver(events);

        let destroyed = self.registry.unregister(id.as_str())?;
        tracing::debug!(id = %id, destroyed = destroyed.len(), "Removed {}", membership.name());
        Ok(destroyed)
    }

    fn attach_batch(
        &mut self,
        membership: Membership,
        descriptors: &[Value],
        index: Option<usize>,
    ) -> MapResult<Vec<ObjectId>> {
        let mut converter = GraphConverter::new(&self.router);
        let mut handles = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let handle = converter
                .materialize_value(&mut self.registry, descriptor)
                .and_then(|handle| {
                    let kind = self
                        .registry
                        .get(handle)
                        .map(LiveObject::kind)
                        .ok_or_else(|| MapError::TargetNotFound(format!("{handle:?}")))?;
                    if membership.accepts(kind) {
                        Ok(handle)
                    } else {
                        Err(MapError::InvalidDescriptor(format!(
                            "{} is not a {}",
                            kind.tag(),
                            membership.name()
                        )))
                    }
                });
            match handle {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Batch conversion failed, rolling back");
                    converter.rollback(&mut self.registry);
                    return Err(e);
                }
            }
        }
        converter.commit();

        let mut ctx = Context::new(&mut self.registry, self.engine.as_mut());
        let mut ids = Vec::with_capacity(handles.len());
        for handle in handles {
            let attached = match membership {
                Membership::Layers => {
                    map::attach_layer(&mut ctx, handle, index.map(|i| i + ids.len()))?
                }
                Membership::Controls => map::attach_control(&mut ctx, handle)?,
            };
            let id = ctx.object(handle)?.id().clone();
            if attached {
                ids.push(id);
            } else {
                tracing::debug!(id = %id, "Already attached, skipping");
            }
        }
        let events = ctx.into_events();
        self.deliver(events);
        Ok(ids)
    }

    /// Run a remote operation request.
    ///
    /// # Errors
    ///
    /// See [`dispatch::dispatch`].
    pub fn call(&mut self, request: &OperationRequest) -> MapResult<Value> {
        let outcome = dispatch::dispatch(
            &mut self.registry,
            &self.router,
            self.engine.as_mut(),
            request,
        )?;
        Ok(self.finish(outcome))
    }

    /// Invoke a method with already parsed arguments.
    ///
    /// # Errors
    ///
    /// See [`dispatch::invoke`].
    pub fn invoke(&mut self, target: &str, method: &str, args: &[Value]) -> MapResult<Value> {
        let outcome = dispatch::invoke(
            &mut self.registry,
            &self.router,
            self.engine.as_mut(),
            target,
            method,
            args,
        )?;
        Ok(self.finish(outcome))
    }

    fn finish(&mut self, outcome: Outcome) -> Value {
        self.deliver(outcome.events);
        outcome.value
    }

    /// Notify the component that the host applied a server update.
    ///
    /// The first call queues "measure the viewport and announce readiness"
    /// against the engine-ready signal. Later calls do nothing.
    pub fn after_server_update(&mut self) {
        if self.updated_once {
            return;
        }
        self.updated_once = true;
        let deferred = self.readiness.defer(Box::new(MapComponent::announce_ready));
        if let Some(action) = deferred {
            action(self);
        }
    }

    /// Fire the one-shot engine-ready signal, running queued actions.
    pub fn engine_ready(&mut self) {
        let actions = self.readiness.fire();
        if !actions.is_empty() {
            tracing::debug!(count = actions.len(), "Running deferred actions");
        }
        for action in actions {
            action(self);
        }
    }

    fn announce_ready(&mut self) {
        let Some(size) = self.view().map(|view| view.size) else {
            return;
        };
        self.engine.invalidate_size(size);
        tracing::info!(id = %self.options.id, "Map ready");
        self.sink.forward(ForwardedEvent {
            target: self.options.id.clone(),
            type_tag: ObjectKind::Map.tag().to_string(),
            event: "ready".to_string(),
            category: HandlerCategory::Base,
            payload: json!({ "size": size }),
        });
    }

    /// Change the viewport size, emitting `resize`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidArgument`] for a non-positive size.
    pub fn resize(&mut self, width: f64, height: f64) -> MapResult<()> {
        check_size(width, height).map_err(|reason| MapError::invalid_argument("resize", reason))?;
        let new_size = Point::new(width, height);
        let root = self.root;
        let mut ctx = Context::new(&mut self.registry, self.engine.as_mut());
        let view = ctx.view_mut()?;
        let old_size = std::mem::replace(&mut view.size, new_size);
        if old_size == new_size {
            return Ok(());
        }
        ctx.engine.invalidate_size(new_size);
        ctx.emit(root, "resize", json!({ "oldSize": old_size, "newSize": new_size }));
        let events = ctx.into_events();
        self.deliver(events);
        Ok(())
    }

    /// Deliver an engine-originated native event. Returns whether a listener
    /// was bound for it.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::TargetNotFound`] for an unknown id.
    pub fn fire(&mut self, id: &str, event: &str, payload: Value) -> MapResult<bool> {
        let target = self.registry.resolve(id)?;
        let bound = self
            .registry
            .get(target)
            .and_then(|object| object.listener_for(event))
            .is_some();
        self.deliver(vec![NativeEvent {
            target,
            event: event.to_string(),
            payload,
        }]);
        Ok(bound)
    }

    fn deliver(&mut self, events: Vec<NativeEvent>) {
        for native in events {
            let Some(object) = self.registry.get(native.target) else {
                continue;
            };
            let Some(category) = object.listener_for(&native.event) else {
                tracing::trace!(target_id = %object.id(), event = %native.event, "No listener bound");
                continue;
            };
            let forwarded = ForwardedEvent {
                target: object.id().clone(),
                type_tag: object.kind().tag().to_string(),
                event: native.event,
                category,
                payload: native.payload,
            };
            category.handle(forwarded, self.sink.as_mut());
        }
    }

    /// JSON snapshot of the view and every reachable object.
    #[must_use]
    pub fn describe(&self) -> Value {
        let ids = |handles: &[Handle]| -> Vec<String> {
            handles
                .iter()
                .filter_map(|h| self.registry.id_of(*h))
                .map(ToString::to_string)
                .collect()
        };
        let view = self.view();
        let objects: Vec<Value> = self
            .registry
            .preorder()
            .into_iter()
            .filter_map(|h| self.registry.get(h))
            .map(|object| {
                let mut summary = object.summary();
                summary["methods"] = json!(ops::method_names(object.kind()));
                summary
            })
            .collect();
        json!({
            "id": self.options.id,
            "ready": self.is_ready(),
            "center": view.map(|v| v.center),
            "zoom": view.map(|v| v.zoom),
            "size": view.map(|v| v.size),
            "layers": view.map(|v| ids(&v.layers)).unwrap_or_default(),
            "controls": view.map(|v| ids(&v.controls)).unwrap_or_default(),
            "objects": objects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, HeadlessEngine};
    use crate::event::EventLog;

    fn component(options: MapOptions) -> (MapComponent, EventLog, crate::engine::EngineJournal) {
        let engine = HeadlessEngine::new();
        let journal = engine.journal();
        let log = EventLog::new();
        let map = MapComponent::new(options, Box::new(engine), Box::new(log.clone()))
            .expect("should create component");
        (map, log, journal)
    }

    fn marker(id: &str, events: &[&str]) -> Value {
        json!({"typeTag": "Marker", "id": id, "latLng": [1, 2], "events": events})
    }

    #[test]
    fn test_options_defaults_from_json() {
        let options: MapOptions =
            serde_json::from_value(json!({"id": "m", "zoom": 3})).expect("should parse");
        assert_eq!(options.id, ObjectId::new("m"));
        assert!((options.max_zoom - 18.0).abs() < f64::EPSILON);
        assert!((options.width - 800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = MapOptions {
            min_zoom: 10.0,
            max_zoom: 2.0,
            ..MapOptions::default()
        };
        let result = MapComponent::new(options, Box::new(HeadlessEngine::new()), Box::new(EventLog::new()));
        assert!(matches!(result, Err(MapError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_set_layers_attaches_in_order() {
        let (mut map, _, journal) = component(MapOptions::default());
        let ids = map
            .set_layers(&[marker("a", &[]), marker("b", &[])])
            .expect("should set layers");
        assert_eq!(ids, vec![ObjectId::new("a"), ObjectId::new("b")]);
        assert_eq!(
            journal.attached(),
            vec![ObjectId::new("map"), ObjectId::new("a"), ObjectId::new("b")]
        );
    }

    #[test]
    fn test_controls_batch_rejects_layers() {
        let (mut map, _, _) = component(MapOptions::default());
        let err = map
            .add_controls(&[json!({"typeTag": "zoom", "id": "z"}), marker("m", &[])])
            .expect_err("should fail");
        assert!(matches!(err, MapError::InvalidDescriptor(_)));
        assert!(map.lookup("z").is_none());
        assert!(map.lookup("m").is_none());
    }

    #[test]
    fn test_splice_removes_then_adds() {
        let (mut map, _, _) = component(MapOptions::default());
        map.set_layers(&[marker("a", &[]), marker("b", &[]), marker("keep", &[])])
            .expect("should set layers");
        let splice = Splice {
            index: 0,
            removed: vec![json!("a"), json!({"typeTag": "Marker", "id": "b"})],
            added_count: 1,
            added: vec![marker("c", &[])],
        };
        let outcome = map.apply_layer_splices(&[splice]).expect("should apply");
        assert_eq!(outcome.removed, vec![ObjectId::new("a"), ObjectId::new("b")]);
        assert_eq!(outcome.added, vec![ObjectId::new("c")]);
        assert!(map.lookup("a").is_none());
        assert!(map.lookup("b").is_none());
        assert!(map.lookup("c").is_some());

        let view = map.view().expect("should have a view");
        let order: Vec<_> = view
            .layers
            .iter()
            .filter_map(|h| map.registry().id_of(*h).cloned())
            .collect();
        assert_eq!(order, vec![ObjectId::new("c"), ObjectId::new("keep")]);
    }

    #[test]
    fn test_layer_splice_detaches_from_engine() {
        let options = MapOptions {
            events: vec!["layerremove".to_string()],
            ..MapOptions::default()
        };
        let (mut map, log, journal) = component(options);
        map.set_layers(&[marker("a", &["remove"]), marker("b", &[])])
            .expect("should set layers");
        log.drain();

        let splice = Splice {
            index: 0,
            removed: vec![json!("a")],
            added_count: 0,
            added: Vec::new(),
        };
        map.apply_layer_splices(&[splice]).expect("should apply");
        assert_eq!(
            journal.calls().last(),
            Some(&EngineCall::Detach(ObjectId::new("a")))
        );
        assert_eq!(log.names(), vec!["remove", "layerremove"]);
        assert_eq!(journal.attached(), vec![ObjectId::new("map"), ObjectId::new("b")]);
    }

    #[test]
    fn test_control_splice_cannot_remove_a_layer() {
        let (mut map, _, journal) = component(MapOptions::default());
        map.set_layers(&[marker("m", &[])]).expect("should set layers");
        map.add_controls(&[json!({"typeTag": "zoom", "id": "z"})])
            .expect("should add control");
        journal.clear();

        let splice = Splice {
            index: 0,
            removed: vec![json!("z"), json!("m")],
            added_count: 0,
            added: Vec::new(),
        };
        let err = map
            .apply_control_splices(&[splice])
            .expect_err("should reject the layer");
        assert!(matches!(err, MapError::InvalidArgument { .. }));

        assert!(map.lookup("m").is_some());
        assert!(map.lookup("z").is_some());
        let view = map.view().expect("should have a view");
        assert_eq!(view.layers.len(), 1);
        assert_eq!(view.controls.len(), 1);
        assert!(journal.calls().is_empty());
    }

    #[test]
    fn test_layer_splice_cannot_remove_a_control() {
        let (mut map, _, journal) = component(MapOptions::default());
        map.add_controls(&[json!({"typeTag": "scale", "id": "s"})])
            .expect("should add control");
        journal.clear();

        let splice = Splice {
            index: 0,
            removed: vec![json!("s")],
            added_count: 1,
            added: vec![marker("n", &[])],
        };
        assert!(map.apply_layer_splices(&[splice]).is_err());
        assert!(map.lookup("s").is_some());
        assert!(map.lookup("n").is_none());
        assert_eq!(map.view().expect("should have a view").controls.len(), 1);
        assert!(!journal
            .calls()
            .contains(&EngineCall::Detach(ObjectId::new("s"))));
    }

    #[test]
    fn test_repeated_entry_is_reported_once() {
        let (mut map, _, _) = component(MapOptions::default());
        map.set_layers(&[marker("keep", &[])]).expect("should set layers");
        let splice = Splice {
            index: 0,
            removed: Vec::new(),
            added_count: 2,
            added: vec![marker("c", &[]), marker("c", &[])],
        };
        let outcome = map.apply_layer_splices(&[splice]).expect("should apply");
        assert_eq!(outcome.added, vec![ObjectId::new("c")]);

        let ids = map
            .set_layers(&[marker("keep", &[]), marker("d", &[])])
            .expect("should set layers");
        assert_eq!(ids, vec![ObjectId::new("d")]);
        assert_eq!(map.view().expect("should have a view").layers.len(), 3);
    }

    #[test]
    fn test_events_forwarded_only_when_bound() {
        let options = MapOptions {
            events: vec!["layeradd".to_string()],
            ..MapOptions::default()
        };
        let (mut map, log, _) = component(options);
        map.set_layers(&[marker("a", &["add"]), marker("b", &[])])
            .expect("should set layers");
        assert_eq!(log.names(), vec!["add", "layeradd", "layeradd"]);

        let events = log.drain();
        assert_eq!(events[0].target, ObjectId::new("a"));
        assert_eq!(events[0].category, HandlerCategory::Base);
        assert_eq!(events[1].category, HandlerCategory::Layer);
        assert_eq!(events[2].payload["layer"], json!("b"));
    }

    #[test]
    fn test_marker_move_routes_to_move_category() {
        let (mut map, log, _) = component(MapOptions::default());
        map.set_layers(&[marker("m", &["move"])]).expect("should set layers");
        map.call(&OperationRequest::new("m", "setLatLng", "[[5, 6]]"))
            .expect("should move");
        let events = log.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, HandlerCategory::Move);
        assert_eq!(events[0].payload["oldLatLng"]["lat"], json!(1.0));
        assert_eq!(events[0].payload["latlng"]["lat"], json!(5.0));
    }

    #[test]
    fn test_ready_runs_once_after_engine_signal() {
        let (mut map, log, journal) = component(MapOptions::default());
        map.after_server_update();
        assert!(log.names().is_empty());
        assert!(!map.is_ready());

        map.engine_ready();
        map.engine_ready();
        map.after_server_update();
        assert_eq!(log.names(), vec!["ready"]);
        let invalidations = journal
            .calls()
            .into_iter()
            .filter(|call| matches!(call, EngineCall::InvalidateSize(_)))
            .count();
        assert_eq!(invalidations, 1);
    }

    #[test]
    fn test_update_after_ready_announces_immediately() {
        let (mut map, log, _) = component(MapOptions::default());
        map.engine_ready();
        map.after_server_update();
        assert_eq!(log.names(), vec!["ready"]);
    }

    #[test]
    fn test_resize_emits_old_and_new_size() {
        let options = MapOptions {
            events: vec!["resize".to_string()],
            ..MapOptions::default()
        };
        let (mut map, log, _) = component(options);
        map.resize(1024.0, 768.0).expect("should resize");
        map.resize(1024.0, 768.0).expect("should resize");
        let events = log.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, HandlerCategory::Resize);
        assert_eq!(events[0].payload["oldSize"]["x"], json!(800.0));
        assert_eq!(events[0].payload["newSize"]["y"], json!(768.0));
        assert!(map.resize(0.0, 10.0).is_err());
    }

    #[test]
    fn test_fire_reports_binding() {
        let (mut map, log, _) = component(MapOptions::default());
        map.set_layers(&[marker("m", &["click"])]).expect("should set layers");
        assert!(map.fire("m", "click", json!({"x": 1})).expect("should fire"));
        assert!(!map.fire("m", "dblclick", json!({})).expect("should fire"));
        assert!(matches!(
            map.fire("nope", "click", json!({})),
            Err(MapError::TargetNotFound(_))
        ));
        assert_eq!(log.names(), vec!["click"]);
    }

    #[test]
    fn test_describe_lists_objects() {
        let (mut map, _, _) = component(MapOptions::default());
        map.set_layers(&[marker("m", &[])]).expect("should set layers");
        let described = map.describe();
        assert_eq!(described["layers"], json!(["m"]));
        assert_eq!(described["objects"][0]["typeTag"], json!("Map"));
        let methods = described["objects"][1]["methods"]
            .as_array()
            .expect("should list methods");
        assert!(methods.contains(&json!("setLatLng")));
    }
}
