//! Live objects: the materialized, stateful counterparts of descriptors.

use serde_json::{json, Map, Value};

use crate::descriptor::{ObjectId, Overlay};
use crate::event::HandlerCategory;
use crate::kind::ObjectKind;
use crate::registry::Handle;
use crate::value::{BasicValue, LatLng, LatLngBounds, Point};

/// A bound native event and the handler category it routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    /// Native event name.
    pub event: String,
    /// Category chosen by the event router at bind time.
    pub category: HandlerCategory,
}

/// A tooltip or popup bound to a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    /// HTML or text content.
    pub content: String,
    /// Overlay options.
    pub options: Map<String, Value>,
    /// Whether the overlay is currently shown.
    pub open: bool,
}

impl From<Overlay> for Decoration {
    fn from(overlay: Overlay) -> Self {
        let open = overlay
            .options
            .get("permanent")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            content: overlay.content,
            options: overlay.options,
            open,
        }
    }
}

/// View state of the root map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    /// Geographical center.
    pub center: LatLng,
    /// Current zoom.
    pub zoom: f64,
    /// Lowest allowed zoom.
    pub min_zoom: f64,
    /// Highest allowed zoom.
    pub max_zoom: f64,
    /// Region the view is restricted to.
    pub max_bounds: Option<LatLngBounds>,
    /// Viewport size in pixels.
    pub size: Point,
    /// Layers attached to the map, in attach order.
    pub layers: Vec<Handle>,
    /// Controls attached to the map, in attach order.
    pub controls: Vec<Handle>,
}

impl MapView {
    /// Clamp a zoom level into `[min_zoom, max_zoom]`.
    #[must_use]
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.max(self.min_zoom).min(self.max_zoom)
    }
}

/// Marker state.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerState {
    /// Position.
    pub lat_lng: LatLng,
    /// Icon, when not the engine default.
    pub icon: Option<BasicValue>,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Stacking offset.
    pub z_index_offset: f64,
}

/// Geometry of a vector path.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Open line, possibly multi-part.
    Polyline(Vec<Vec<LatLng>>),
    /// Closed rings.
    Polygon(Vec<Vec<LatLng>>),
    /// Rectangle.
    Rectangle(LatLngBounds),
    /// Circle with a radius in meters.
    Circle {
        /// Center.
        center: LatLng,
        /// Radius in meters.
        radius: f64,
    },
    /// Circle with a radius in pixels.
    CircleMarker {
        /// Center.
        center: LatLng,
        /// Radius in pixels.
        radius: f64,
    },
}

impl Shape {
    /// Vertices as rings. Rectangles yield their four corners, circles their center.
    #[must_use]
    pub fn rings(&self) -> Vec<Vec<LatLng>> {
        match self {
            Self::Polyline(rings) | Self::Polygon(rings) => rings.clone(),
            Self::Rectangle(bounds) => vec![vec![
                bounds.south_west,
                bounds.north_west(),
                bounds.north_east,
                bounds.south_east(),
            ]],
            Self::Circle { center, .. } | Self::CircleMarker { center, .. } => {
                vec![vec![*center]]
            }
        }
    }
}

/// Vector path state.
#[derive(Debug, Clone, PartialEq)]
pub struct PathState {
    /// Geometry.
    pub shape: Shape,
    /// Style options (color, weight, fill, ...).
    pub style: Map<String, Value>,
}

/// Container state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupState {
    /// Owned children in descriptor order.
    pub children: Vec<Handle>,
}

/// GeoJSON collection state. The data is engine-defined and kept raw.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoJsonState {
    /// Raw GeoJSON objects.
    pub data: Vec<Value>,
    /// Current style.
    pub style: Map<String, Value>,
    /// Style restored by `resetStyle`.
    pub initial_style: Map<String, Value>,
}

/// Tile, grid and image overlay state.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterState {
    /// URL or URL template.
    pub url: Option<String>,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Stacking index.
    pub z_index: f64,
    /// Image bounds (image overlays only).
    pub bounds: Option<LatLngBounds>,
}

/// Heatmap state.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatState {
    /// Points; altitude carries the intensity when present.
    pub lat_lngs: Vec<LatLng>,
    /// Heatmap options.
    pub options: Map<String, Value>,
}

/// Standalone tooltip or popup state.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    /// Content.
    pub content: String,
    /// Position, if placed.
    pub lat_lng: Option<LatLng>,
}

/// Control state.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    /// Corner position.
    pub position: String,
    /// Whether the control is collapsed (layers control).
    pub collapsed: bool,
    /// Named base layers (layers control).
    pub base_layers: Vec<(String, Handle)>,
    /// Named overlays (layers control).
    pub overlays: Vec<(String, Handle)>,
}

/// Engine-native state of a live object.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveState {
    /// Root map.
    Map(MapView),
    /// Marker.
    Marker(MarkerState),
    /// Vector path.
    Path(PathState),
    /// Container.
    Group(GroupState),
    /// GeoJSON collection.
    GeoJson(GeoJsonState),
    /// Tile, grid or image layer.
    Raster(RasterState),
    /// Heatmap.
    Heat(HeatState),
    /// Standalone overlay.
    Overlay(OverlayState),
    /// Control.
    Control(ControlState),
}

/// A materialized object.
#[derive(Debug, Clone)]
pub struct LiveObject {
    id: ObjectId,
    kind: ObjectKind,
    options: Map<String, Value>,
    state: LiveState,
    pub(crate) tooltip: Option<Decoration>,
    pub(crate) popup: Option<Decoration>,
    listeners: Vec<Listener>,
}

impl LiveObject {
    /// Create a live object.
    #[must_use]
    pub fn new(id: ObjectId, kind: ObjectKind, state: LiveState) -> Self {
        Self {
            id,
            kind,
            options: Map::new(),
            state,
            tooltip: None,
            popup: None,
            listeners: Vec::new(),
        }
    }

    /// Set the plain options the object was created with.
    #[must_use]
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    /// Id this object was registered under.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Kind.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Creation options in plain form.
    #[must_use]
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Engine state.
    #[must_use]
    pub fn state(&self) -> &LiveState {
        &self.state
    }

    /// Mutable engine state.
    pub fn state_mut(&mut self) -> &mut LiveState {
        &mut self.state
    }

    /// Bound tooltip.
    #[must_use]
    pub fn tooltip(&self) -> Option<&Decoration> {
        self.tooltip.as_ref()
    }

    /// Bound popup.
    #[must_use]
    pub fn popup(&self) -> Option<&Decoration> {
        self.popup.as_ref()
    }

    /// Bound listeners.
    #[must_use]
    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Category bound for an event, if any.
    #[must_use]
    pub fn listener_for(&self, event: &str) -> Option<HandlerCategory> {
        self.listeners
            .iter()
            .find(|listener| listener.event == event)
            .map(|listener| listener.category)
    }

    /// Register a listener. Returns `false` if the event was already bound.
    pub fn listen(&mut self, event: &str, category: HandlerCategory) -> bool {
        if self.listener_for(event).is_some() {
            return false;
        }
        self.listeners.push(Listener {
            event: event.to_string(),
            category,
        });
        true
    }

    /// Remove listeners for one event, or all of them.
    pub fn unlisten(&mut self, event: Option<&str>) -> usize {
        let before = self.listeners.len();
        match event {
            Some(event) => self.listeners.retain(|listener| listener.event != event),
            None => self.listeners.clear(),
        }
        before - self.listeners.len()
    }

    /// Handles this object owns: container children and layers-control entries.
    #[must_use]
    pub fn owned(&self) -> Vec<Handle> {
        match &self.state {
            LiveState::Group(group) => group.children.clone(),
            LiveState::Control(control) => control
                .base_layers
                .iter()
                .chain(control.overlays.iter())
                .map(|(_, handle)| *handle)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Handles this object lists for lookup traversal: owned handles plus, for
    /// the map, everything attached to it.
    #[must_use]
    pub fn traversal_children(&self) -> Vec<Handle> {
        match &self.state {
            LiveState::Map(view) => view.layers.iter().chain(view.controls.iter()).copied().collect(),
            _ => self.owned(),
        }
    }

    /// Drop every reference to a handle. Returns `true` if one was held.
    pub fn forget(&mut self, handle: Handle) -> bool {
        match &mut self.state {
            LiveState::Map(view) => {
                let before = view.layers.len() + view.controls.len();
                view.layers.retain(|h| *h != handle);
                view.controls.retain(|h| *h != handle);
                before != view.layers.len() + view.controls.len()
            }
            LiveState::Group(group) => {
                let before = group.children.len();
                group.children.retain(|h| *h != handle);
                before != group.children.len()
            }
            LiveState::Control(control) => {
                let before = control.base_layers.len() + control.overlays.len();
                control.base_layers.retain(|(_, h)| *h != handle);
                control.overlays.retain(|(_, h)| *h != handle);
                before != control.base_layers.len() + control.overlays.len()
            }
            _ => false,
        }
    }

    /// Map view, when this is the root map.
    #[must_use]
    pub fn as_map(&self) -> Option<&MapView> {
        match &self.state {
            LiveState::Map(view) => Some(view),
            _ => None,
        }
    }

    /// Mutable map view, when this is the root map.
    pub fn as_map_mut(&mut self) -> Option<&mut MapView> {
        match &mut self.state {
            LiveState::Map(view) => Some(view),
            _ => None,
        }
    }

    /// Container state, when this is a group.
    #[must_use]
    pub fn as_group(&self) -> Option<&GroupState> {
        match &self.state {
            LiveState::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Short JSON summary without resolving references.
    #[must_use]
    pub fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "typeTag": self.kind.tag(),
            "events": self.listeners.iter().map(|l| l.event.as_str()).collect::<Vec<_>>(),
        })
    }
}
