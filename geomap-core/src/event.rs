//! Event routing: which handler category receives which native event.
//!
//! The routing table is an ordered list of `{events, category, predicate}` entries
//! built once and shared immutably. The first entry whose event set contains the
//! name wins; a failing predicate falls through to [`HandlerCategory::Base`]
//! rather than to the next entry.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::ObjectId;
use crate::kind::LayerKind;
use crate::object::LiveObject;

/// Handler categories events are forwarded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HandlerCategory {
    /// Pointer events.
    Mouse,
    /// Key events.
    Keyboard,
    /// Viewport resize.
    Resize,
    /// Zoom animation frames.
    ZoomAnim,
    /// End of a drag.
    DragEnd,
    /// Layer added to or removed from the map.
    Layer,
    /// Layers control selection changes.
    LayersControl,
    /// Marker movement.
    Move,
    /// Popup open/close.
    Popup,
    /// Tooltip open/close.
    Tooltip,
    /// Geolocation success.
    Location,
    /// Geolocation failure.
    Error,
    /// Tile lifecycle.
    Tile,
    /// Tile load failure.
    TileError,
    /// Everything else.
    Base,
}

impl HandlerCategory {
    /// Log and forward an event. Handlers do no business logic of their own.
    pub fn handle(self, event: ForwardedEvent, sink: &mut dyn EventSink) {
        match self {
            Self::Error | Self::TileError => tracing::warn!(
                target_id = %event.target,
                event = %event.event,
                category = ?self,
                "Forwarding error event"
            ),
            _ => tracing::info!(
                target_id = %event.target,
                event = %event.event,
                category = ?self,
                "Forwarding event"
            ),
        }
        sink.forward(event);
    }
}

/// Predicate evaluated against the bound object.
pub type RoutePredicate = fn(&LiveObject) -> bool;

/// One routing rule.
#[derive(Debug, Clone)]
pub struct Route {
    /// Event names this rule matches.
    pub events: Vec<String>,
    /// Category receiving matched events.
    pub category: HandlerCategory,
    /// Extra condition on the target object.
    pub predicate: Option<RoutePredicate>,
}

impl Route {
    /// Create an unconditional rule.
    #[must_use]
    pub fn new(events: &[&str], category: HandlerCategory) -> Self {
        Self {
            events: events.iter().map(|e| (*e).to_string()).collect(),
            category,
            predicate: None,
        }
    }

    /// Add a predicate.
    #[must_use]
    pub fn when(mut self, predicate: RoutePredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }
}

/// An ordered, immutable set of routing rules.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

fn is_marker(object: &LiveObject) -> bool {
    object.kind().is_layer(LayerKind::Marker)
}

impl RoutingTable {
    /// Build a table from rules, in priority order.
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The standard table.
    #[must_use]
    pub fn standard() -> Self {
        use HandlerCategory as C;
        Self::new(vec![
            Route::new(
                &[
                    "click",
                    "dblclick",
                    "mousedown",
                    "mouseup",
                    "mouseover",
                    "mouseout",
                    "mousemove",
                    "contextmenu",
                    "preclick",
                ],
                C::Mouse,
            ),
            Route::new(&["keypress", "keydown", "keyup"], C::Keyboard),
            Route::new(&["resize"], C::Resize),
            Route::new(&["zoomanim"], C::ZoomAnim),
            Route::new(&["dragend"], C::DragEnd),
            Route::new(&["layeradd", "layerremove"], C::Layer),
            Route::new(
                &["baselayerchange", "overlayadd", "overlayremove"],
                C::LayersControl,
            ),
            Route::new(&["move"], C::Move).when(is_marker),
            Route::new(&["popupclose", "popupopen"], C::Popup),
            Route::new(&["tooltipclose", "tooltipopen"], C::Tooltip),
            Route::new(&["locationfound"], C::Location),
            Route::new(&["locationerror"], C::Error),
            Route::new(&["tileloadstart", "tileload", "tileunload"], C::Tile),
            Route::new(&["tileerror"], C::TileError),
        ])
    }

    /// Rules in priority order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Resolve the category for an event on an object.
    #[must_use]
    pub fn resolve(&self, object: &LiveObject, event: &str) -> HandlerCategory {
        let Some(route) = self
            .routes
            .iter()
            .find(|route| route.events.iter().any(|e| e == event))
        else {
            return HandlerCategory::Base;
        };
        match route.predicate {
            Some(predicate) if !predicate(object) => HandlerCategory::Base,
            _ => route.category,
        }
    }
}

/// Binds declared events on live objects.
#[derive(Debug, Clone)]
pub struct EventRouter {
    table: Arc<RoutingTable>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(RoutingTable::standard())
    }
}

impl EventRouter {
    /// Create a router over a table.
    #[must_use]
    pub fn new(table: RoutingTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Share an existing table.
    #[must_use]
    pub fn shared(table: Arc<RoutingTable>) -> Self {
        Self { table }
    }

    /// The routing table.
    #[must_use]
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Category an event would route to on this object.
    #[must_use]
    pub fn route(&self, object: &LiveObject, event: &str) -> HandlerCategory {
        self.table.resolve(object, event)
    }

    /// Bind an event on an object. Binding the same event twice keeps the first.
    pub fn bind(&self, object: &mut LiveObject, event: &str) -> HandlerCategory {
        if let Some(existing) = object.listener_for(event) {
            return existing;
        }
        let category = self.route(object, event);
        object.listen(event, category);
        tracing::debug!(
            target_id = %object.id(),
            event,
            category = ?category,
            "Bound event"
        );
        category
    }
}

/// A native event that reached a bound listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedEvent {
    /// Id of the object the event fired on.
    pub target: ObjectId,
    /// Type tag of that object.
    pub type_tag: String,
    /// Native event name.
    pub event: String,
    /// Category it was routed to.
    pub category: HandlerCategory,
    /// Event payload.
    pub payload: Value,
}

/// Receiver of forwarded events, typically the remote channel.
pub trait EventSink: Send {
    /// Forward one event.
    fn forward(&mut self, event: ForwardedEvent);
}

/// Sink that only logs; used when nothing listens remotely.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn forward(&mut self, event: ForwardedEvent) {
        tracing::debug!(target_id = %event.target, event = %event.event, "Dropped event (no remote sink)");
    }
}

/// Shared, cloneable event collector.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ForwardedEvent>>>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every collected event.
    #[must_use]
    pub fn drain(&self) -> Vec<ForwardedEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    /// Copy of the collected events.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ForwardedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of the collected events, in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|e| e.event).collect()
    }
}

impl EventSink for EventLog {
    fn forward(&mut self, event: ForwardedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ObjectKind;
    use crate::object::{GroupState, LiveState, MarkerState};
    use crate::value::LatLng;

    fn marker() -> LiveObject {
        LiveObject::new(
            ObjectId::new("m1"),
            ObjectKind::Layer(LayerKind::Marker),
            LiveState::Marker(MarkerState {
                lat_lng: LatLng::new(0.0, 0.0),
                icon: None,
                opacity: 1.0,
                z_index_offset: 0.0,
            }),
        )
    }

    fn group() -> LiveObject {
        LiveObject::new(
            ObjectId::new("g1"),
            ObjectKind::Layer(LayerKind::LayerGroup),
            LiveState::Group(GroupState::default()),
        )
    }

    #[test]
    fn test_standard_routes() {
        let router = EventRouter::default();
        let m = marker();
        assert_eq!(router.route(&m, "click"), HandlerCategory::Mouse);
        assert_eq!(router.route(&m, "keyup"), HandlerCategory::Keyboard);
        assert_eq!(router.route(&m, "overlayadd"), HandlerCategory::LayersControl);
        assert_eq!(router.route(&m, "locationerror"), HandlerCategory::Error);
        assert_eq!(router.route(&m, "tileerror"), HandlerCategory::TileError);
    }

    #[test]
    fn test_unmatched_event_routes_to_base() {
        let router = EventRouter::default();
        assert_eq!(router.route(&marker(), "whatever"), HandlerCategory::Base);
    }

    #[test]
    fn test_move_predicate_only_matches_markers() {
        let router = EventRouter::default();
        assert_eq!(router.route(&marker(), "move"), HandlerCategory::Move);
        assert_eq!(router.route(&group(), "move"), HandlerCategory::Base);
    }

    #[test]
    fn test_first_matching_route_wins() {
        let table = RoutingTable::new(vec![
            Route::new(&["click"], HandlerCategory::Keyboard),
            Route::new(&["click"], HandlerCategory::Mouse),
        ]);
        let router = EventRouter::new(table);
        assert_eq!(router.route(&marker(), "click"), HandlerCategory::Keyboard);
    }

    #[test]
    fn test_failed_predicate_does_not_try_later_routes() {
        let table = RoutingTable::new(vec![
            Route::new(&["move"], HandlerCategory::Move).when(is_marker),
            Route::new(&["move"], HandlerCategory::Mouse),
        ]);
        let router = EventRouter::new(table);
        assert_eq!(router.route(&group(), "move"), HandlerCategory::Base);
    }

    #[test]
    fn test_bind_registers_listener_once() {
        let router = EventRouter::default();
        let mut m = marker();
        assert_eq!(router.bind(&mut m, "click"), HandlerCategory::Mouse);
        assert_eq!(router.bind(&mut m, "click"), HandlerCategory::Mouse);
        assert_eq!(m.listeners().len(), 1);
    }

    #[test]
    fn test_handle_forwards_to_sink() {
        let log = EventLog::new();
        let mut sink = log.clone();
        HandlerCategory::Mouse.handle(
            ForwardedEvent {
                target: ObjectId::new("m1"),
                type_tag: "Marker".to_string(),
                event: "click".to_string(),
                category: HandlerCategory::Mouse,
                payload: Value::Null,
            },
            &mut sink,
        );
        assert_eq!(log.names(), vec!["click".to_string()]);
        assert!(log.drain().len() == 1 && log.snapshot().is_empty());
    }
}
