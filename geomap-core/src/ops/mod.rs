//! Capability-checked operations on live objects.
//!
//! Every invocable method is a [`Method`] variant. Each object kind exposes a
//! fixed set of facets (slices of methods); a method outside the target's
//! facets is rejected before any argument is converted.

mod control;
mod group;
mod layer;
pub(crate) mod map;
mod raster;
mod shape;

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::argument::Argument;
use crate::descriptor::ObjectId;
use crate::engine::RenderEngine;
use crate::error::{MapError, MapResult};
use crate::kind::{ControlKind, LayerKind, ObjectKind};
use crate::object::{LiveObject, LiveState, MapView, Shape};
use crate::registry::{Handle, ObjectRegistry};
use crate::value::{LatLng, LatLngBounds, EARTH_RADIUS};

macro_rules! methods {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Every invocable method, by wire name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum Method {
            $($variant),*
        }

        impl Method {
            /// Every method.
            pub const ALL: &'static [Method] = &[$(Method::$variant),*];

            /// Wire name.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Method::$variant => $name),*
                }
            }

            /// Look up a method by wire name. Names are case-sensitive.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Method::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

methods! {
    // evented
    ClearAllEventListeners => "clearAllEventListeners",
    Off => "off",
    RemoveEventListener => "removeEventListener",
    Listens => "listens",
    // layer
    AddTo => "addTo",
    Remove => "remove",
    RemoveFrom => "removeFrom",
    BindPopup => "bindPopup",
    UnbindPopup => "unbindPopup",
    OpenPopup => "openPopup",
    ClosePopup => "closePopup",
    TogglePopup => "togglePopup",
    IsPopupOpen => "isPopupOpen",
    SetPopupContent => "setPopupContent",
    BindTooltip => "bindTooltip",
    UnbindTooltip => "unbindTooltip",
    OpenTooltip => "openTooltip",
    CloseTooltip => "closeTooltip",
    ToggleTooltip => "toggleTooltip",
    IsTooltipOpen => "isTooltipOpen",
    SetTooltipContent => "setTooltipContent",
    // marker, circle, overlay
    GetLatLng => "getLatLng",
    SetLatLng => "setLatLng",
    SetZIndexOffset => "setZIndexOffset",
    SetIcon => "setIcon",
    SetOpacity => "setOpacity",
    // path
    SetStyle => "setStyle",
    BringToFront => "bringToFront",
    BringToBack => "bringToBack",
    Redraw => "redraw",
    GetLatLngs => "getLatLngs",
    SetLatLngs => "setLatLngs",
    AddLatLng => "addLatLng",
    IsEmpty => "isEmpty",
    GetCenter => "getCenter",
    GetRadius => "getRadius",
    SetRadius => "setRadius",
    // groups
    AddLayer => "addLayer",
    RemoveLayer => "removeLayer",
    HasLayer => "hasLayer",
    ClearLayers => "clearLayers",
    GetLayers => "getLayers",
    GetLayer => "getLayer",
    AddData => "addData",
    ResetStyle => "resetStyle",
    ToGeoJson => "toGeoJSON",
    // raster
    SetUrl => "setUrl",
    SetZIndex => "setZIndex",
    SetBounds => "setBounds",
    SetOptions => "setOptions",
    // overlays
    SetContent => "setContent",
    GetContent => "getContent",
    IsOpen => "isOpen",
    // controls
    GetPosition => "getPosition",
    SetPosition => "setPosition",
    AddBaseLayer => "addBaseLayer",
    AddOverlay => "addOverlay",
    Expand => "expand",
    Collapse => "collapse",
    // map view
    SetView => "setView",
    SetZoom => "setZoom",
    ZoomIn => "zoomIn",
    ZoomOut => "zoomOut",
    SetZoomAround => "setZoomAround",
    FitBounds => "fitBounds",
    FitWorld => "fitWorld",
    PanTo => "panTo",
    PanBy => "panBy",
    FlyTo => "flyTo",
    FlyToBounds => "flyToBounds",
    SetMaxBounds => "setMaxBounds",
    SetMinZoom => "setMinZoom",
    SetMaxZoom => "setMaxZoom",
    PanInsideBounds => "panInsideBounds",
    PanInside => "panInside",
    InvalidateSize => "invalidateSize",
    Stop => "stop",
    // map state
    GetZoom => "getZoom",
    GetBounds => "getBounds",
    GetMinZoom => "getMinZoom",
    GetMaxZoom => "getMaxZoom",
    GetBoundsZoom => "getBoundsZoom",
    GetSize => "getSize",
    GetPixelBounds => "getPixelBounds",
    GetPixelOrigin => "getPixelOrigin",
    GetPixelWorldBounds => "getPixelWorldBounds",
    // map conversions
    Project => "project",
    Unproject => "unproject",
    LatLngToLayerPoint => "latLngToLayerPoint",
    LayerPointToLatLng => "layerPointToLatLng",
    LatLngToContainerPoint => "latLngToContainerPoint",
    ContainerPointToLatLng => "containerPointToLatLng",
    ContainerPointToLayerPoint => "containerPointToLayerPoint",
    LayerPointToContainerPoint => "layerPointToContainerPoint",
    WrapLatLng => "wrapLatLng",
    Distance => "distance",
    // map misc
    Locate => "locate",
    StopLocate => "stopLocate",
    AddControl => "addControl",
    RemoveControl => "removeControl",
}

use Method as M;

const EVENTED: &[Method] = &[
    M::ClearAllEventListeners,
    M::Off,
    M::RemoveEventListener,
    M::Listens,
];

const LAYER: &[Method] = &[
    M::AddTo,
    M::Remove,
    M::RemoveFrom,
    M::BindPopup,
    M::UnbindPopup,
    M::OpenPopup,
    M::ClosePopup,
    M::TogglePopup,
    M::IsPopupOpen,
    M::SetPopupContent,
    M::BindTooltip,
    M::UnbindTooltip,
    M::OpenTooltip,
    M::CloseTooltip,
    M::ToggleTooltip,
    M::IsTooltipOpen,
    M::SetTooltipContent,
];

const MARKER: &[Method] = &[
    M::GetLatLng,
    M::SetLatLng,
    M::SetZIndexOffset,
    M::SetIcon,
    M::SetOpacity,
];

const PATH: &[Method] = &[M::SetStyle, M::BringToFront, M::BringToBack, M::Redraw];

const POLYLINE: &[Method] = &[
    M::GetLatLngs,
    M::SetLatLngs,
    M::AddLatLng,
    M::IsEmpty,
    M::GetBounds,
    M::GetCenter,
];

const CIRCLE: &[Method] = &[
    M::GetLatLng,
    M::SetLatLng,
    M::GetRadius,
    M::SetRadius,
    M::GetBounds,
];

const GROUP: &[Method] = &[
    M::AddLayer,
    M::RemoveLayer,
    M::HasLayer,
    M::ClearLayers,
    M::GetLayers,
    M::GetLayer,
];

const FEATURE_GROUP: &[Method] = &[M::SetStyle, M::BringToFront, M::BringToBack, M::GetBounds];

const GEO_JSON: &[Method] = &[
    M::AddData,
    M::SetStyle,
    M::ResetStyle,
    M::ClearLayers,
    M::GetBounds,
    M::ToGeoJson,
];

const GRID: &[Method] = &[
    M::SetOpacity,
    M::SetZIndex,
    M::Redraw,
    M::BringToFront,
    M::BringToBack,
];

const TILE: &[Method] = &[M::SetUrl];

const IMAGE: &[Method] = &[
    M::SetUrl,
    M::SetOpacity,
    M::SetBounds,
    M::GetBounds,
    M::BringToFront,
    M::BringToBack,
];

const HEAT: &[Method] = &[M::SetLatLngs, M::AddLatLng, M::SetOptions, M::Redraw];

const OVERLAY: &[Method] = &[
    M::SetContent,
    M::GetContent,
    M::SetLatLng,
    M::GetLatLng,
    M::IsOpen,
];

const CONTROL: &[Method] = &[M::GetPosition, M::SetPosition, M::AddTo, M::Remove];

const LAYERS_CONTROL: &[Method] = &[
    M::AddBaseLayer,
    M::AddOverlay,
    M::RemoveLayer,
    M::Expand,
    M::Collapse,
];

const MAP: &[Method] = &[
    M::SetView,
    M::SetZoom,
    M::ZoomIn,
    M::ZoomOut,
    M::SetZoomAround,
    M::FitBounds,
    M::FitWorld,
    M::PanTo,
    M::PanBy,
    M::FlyTo,
    M::FlyToBounds,
    M::SetMaxBounds,
    M::SetMinZoom,
    M::SetMaxZoom,
    M::PanInsideBounds,
    M::PanInside,
    M::InvalidateSize,
    M::Stop,
    M::GetCenter,
    M::GetZoom,
    M::GetBounds,
    M::GetMinZoom,
    M::GetMaxZoom,
    M::GetBoundsZoom,
    M::GetSize,
    M::GetPixelBounds,
    M::GetPixelOrigin,
    M::GetPixelWorldBounds,
    M::Project,
    M::Unproject,
    M::LatLngToLayerPoint,
    M::LayerPointToLatLng,
    M::LatLngToContainerPoint,
    M::ContainerPointToLatLng,
    M::ContainerPointToLayerPoint,
    M::LayerPointToContainerPoint,
    M::WrapLatLng,
    M::Distance,
    M::Locate,
    M::StopLocate,
    M::AddLayer,
    M::RemoveLayer,
    M::HasLayer,
    M::AddControl,
    M::RemoveControl,
];

/// Facets exposed by an object kind.
#[must_use]
pub fn facets(kind: ObjectKind) -> Vec<&'static [Method]> {
    let mut facets = vec![EVENTED];
    match kind {
        ObjectKind::Map => facets.push(MAP),
        ObjectKind::Control(control) => {
            facets.push(CONTROL);
            if control == ControlKind::Layers {
                facets.push(LAYERS_CONTROL);
            }
        }
        ObjectKind::Layer(layer) => {
            facets.push(LAYER);
            match layer {
                LayerKind::Marker => facets.push(MARKER),
                LayerKind::Polyline | LayerKind::Polygon | LayerKind::Rectangle => {
                    facets.extend([PATH, POLYLINE]);
                }
                LayerKind::Circle | LayerKind::CircleMarker => facets.extend([PATH, CIRCLE]),
                LayerKind::LayerGroup => facets.push(GROUP),
                LayerKind::FeatureGroup | LayerKind::MarkerClusterGroup => {
                    facets.extend([GROUP, FEATURE_GROUP]);
                }
                LayerKind::GeoJson => facets.push(GEO_JSON),
                LayerKind::GridLayer => facets.push(GRID),
                LayerKind::TileLayer => facets.extend([GRID, TILE]),
                LayerKind::ImageOverlay => facets.push(IMAGE),
                LayerKind::HeatLayer => facets.push(HEAT),
                LayerKind::Tooltip | LayerKind::Popup => facets.push(OVERLAY),
            }
        }
    }
    facets
}

/// Whether an object kind exposes a method.
#[must_use]
pub fn supports(kind: ObjectKind, method: Method) -> bool {
    facets(kind).iter().any(|facet| facet.contains(&method))
}

/// Every method name an object kind exposes, sorted.
#[must_use]
pub fn method_names(kind: ObjectKind) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = facets(kind)
        .into_iter()
        .flatten()
        .map(|m| m.name())
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// A native event raised by an operation, delivered after it completes.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEvent {
    /// Object the event fires on.
    pub target: Handle,
    /// Event name.
    pub event: String,
    /// Payload.
    pub payload: Value,
}

/// Mutable access an operation runs with.
pub struct Context<'a> {
    /// The registry.
    pub registry: &'a mut ObjectRegistry,
    /// The rendering engine.
    pub engine: &'a mut dyn RenderEngine,
    emitted: Vec<NativeEvent>,
}

impl<'a> Context<'a> {
    /// Create a context.
    pub fn new(registry: &'a mut ObjectRegistry, engine: &'a mut dyn RenderEngine) -> Self {
        Self {
            registry,
            engine,
            emitted: Vec::new(),
        }
    }

    /// Queue a native event.
    pub fn emit(&mut self, target: Handle, event: &str, payload: Value) {
        self.emitted.push(NativeEvent {
            target,
            event: event.to_string(),
            payload,
        });
    }

    /// Events raised so far.
    #[must_use]
    pub fn into_events(self) -> Vec<NativeEvent> {
        self.emitted
    }

    pub(crate) fn object(&self, handle: Handle) -> MapResult<&LiveObject> {
        self.registry
            .get(handle)
            .ok_or_else(|| MapError::TargetNotFound(format!("{handle:?}")))
    }

    pub(crate) fn object_mut(&mut self, handle: Handle) -> MapResult<&mut LiveObject> {
        self.registry
            .get_mut(handle)
            .ok_or_else(|| MapError::TargetNotFound(format!("{handle:?}")))
    }

    pub(crate) fn id(&self, handle: Handle) -> ObjectId {
        self.registry
            .id_of(handle)
            .cloned()
            .unwrap_or_else(|| ObjectId::new(""))
    }

    pub(crate) fn root(&self) -> MapResult<Handle> {
        self.registry
            .root()
            .ok_or_else(|| MapError::TargetNotFound("map".to_string()))
    }

    pub(crate) fn view(&self) -> MapResult<&MapView> {
        let root = self.root()?;
        self.object(root)?
            .as_map()
            .ok_or_else(|| MapError::TargetNotFound("map".to_string()))
    }

    pub(crate) fn view_mut(&mut self) -> MapResult<&mut MapView> {
        let root = self.root()?;
        self.object_mut(root)?
            .as_map_mut()
            .ok_or_else(|| MapError::TargetNotFound("map".to_string()))
    }

    /// Tell the engine an object changed.
    pub(crate) fn updated(&mut self, handle: Handle) {
        if let Some(object) = self.registry.get(handle) {
            self.engine.update(object);
        }
    }
}

/// One method invocation with converted arguments.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    /// Method.
    pub method: Method,
    /// Target.
    pub target: Handle,
    /// Converted positional arguments.
    pub args: &'a [Argument],
}

impl Call<'_> {
    pub(crate) fn invalid(&self, reason: impl Into<String>) -> MapError {
        MapError::invalid_argument(self.method.name(), reason)
    }

    /// Argument at a position, treating JSON `null` as absent.
    pub(crate) fn opt(&self, index: usize) -> Option<&Argument> {
        self.args.get(index).filter(|arg| !arg.is_null())
    }

    pub(crate) fn arg(&self, index: usize) -> MapResult<&Argument> {
        self.opt(index)
            .ok_or_else(|| self.invalid(format!("missing argument {index}")))
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self, index: usize) -> MapResult<T> {
        self.arg(index)?
            .decode()
            .map_err(|e| self.invalid(format!("argument {index}: {e}")))
    }

    pub(crate) fn decode_opt<T: DeserializeOwned>(&self, index: usize) -> MapResult<Option<T>> {
        match self.opt(index) {
            None => Ok(None),
            Some(arg) => arg
                .decode()
                .map(Some)
                .map_err(|e| self.invalid(format!("argument {index}: {e}"))),
        }
    }

    pub(crate) fn number(&self, index: usize) -> MapResult<f64> {
        self.arg(index)?
            .as_f64()
            .ok_or_else(|| self.invalid(format!("argument {index} must be a number")))
    }

    pub(crate) fn number_opt(&self, index: usize) -> MapResult<Option<f64>> {
        match self.opt(index) {
            None => Ok(None),
            Some(_) => self.number(index).map(Some),
        }
    }

    pub(crate) fn text(&self, index: usize) -> MapResult<String> {
        match self.arg(index)? {
            Argument::Data(Value::String(text)) => Ok(text.clone()),
            Argument::Data(other) => Ok(other.to_string()),
            _ => Err(self.invalid(format!("argument {index} must be text"))),
        }
    }

    /// A live object passed by reference, or by id string.
    pub(crate) fn handle(&self, ctx: &Context<'_>, index: usize) -> MapResult<Handle> {
        match self.arg(index)? {
            Argument::Object { handle, .. } => Ok(*handle),
            Argument::Data(Value::String(id)) => ctx.registry.resolve(id),
            _ => Err(self.invalid(format!("argument {index} must be a layer"))),
        }
    }

    pub(crate) fn unsupported(&self, ctx: &Context<'_>) -> MapError {
        MapError::UnsupportedOperation {
            target: ctx.id(self.target).to_string(),
            method: self.method.name().to_string(),
        }
    }
}

/// Plain JSON form of a value.
pub(crate) fn plain<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Invoke a capability-checked method.
///
/// # Errors
///
/// Returns [`MapError::UnsupportedOperation`] when the target does not expose
/// the method, and [`MapError::InvalidArgument`] for mis-shaped arguments.
/// A failing operation leaves the target unchanged.
pub fn invoke(ctx: &mut Context<'_>, call: Call<'_>) -> MapResult<Value> {
    let kind = ctx.object(call.target)?.kind();
    if !supports(kind, call.method) {
        return Err(call.unsupported(ctx));
    }
    if EVENTED.contains(&call.method) {
        return evented(ctx, call);
    }
    match kind {
        ObjectKind::Map => map::invoke(ctx, call),
        ObjectKind::Control(control) => control::invoke(ctx, call, control),
        ObjectKind::Layer(layer) => layer::invoke(ctx, call, layer),
    }
}

fn evented(ctx: &mut Context<'_>, call: Call<'_>) -> MapResult<Value> {
    match call.method {
        M::ClearAllEventListeners => {
            ctx.object_mut(call.target)?.unlisten(None);
            Ok(Value::Null)
        }
        M::Off | M::RemoveEventListener => {
            let event = call.text(0)?;
            ctx.object_mut(call.target)?.unlisten(Some(&event));
            Ok(Value::Null)
        }
        M::Listens => {
            let event = call.text(0)?;
            Ok(Value::Bool(
                ctx.object(call.target)?.listener_for(&event).is_some(),
            ))
        }
        _ => Err(call.unsupported(ctx)),
    }
}

/// Geographical extent of an object and everything it owns.
#[must_use]
pub fn bounds_of(registry: &ObjectRegistry, handle: Handle) -> Option<LatLngBounds> {
    let mut seen = HashSet::new();
    extent(registry, handle, &mut seen)
}

fn extent(
    registry: &ObjectRegistry,
    handle: Handle,
    seen: &mut HashSet<Handle>,
) -> Option<LatLngBounds> {
    if !seen.insert(handle) {
        return None;
    }
    let object = registry.get(handle)?;
    match object.state() {
        LiveState::Marker(marker) => Some(LatLngBounds::from_corners(marker.lat_lng, marker.lat_lng)),
        LiveState::Path(path) => shape_bounds(&path.shape),
        LiveState::Raster(raster) => raster.bounds,
        LiveState::Heat(heat) => LatLngBounds::from_points(&heat.lat_lngs),
        LiveState::Overlay(overlay) => overlay
            .lat_lng
            .map(|p| LatLngBounds::from_corners(p, p)),
        LiveState::GeoJson(geo) => {
            let mut points = Vec::new();
            for item in &geo.data {
                collect_coordinates(item, &mut points);
            }
            LatLngBounds::from_points(&points)
        }
        LiveState::Group(_) | LiveState::Control(_) | LiveState::Map(_) => {
            object
                .owned()
                .into_iter()
                .filter_map(|child| extent(registry, child, seen))
                .reduce(|mut acc, b| {
                    acc.extend_bounds(&b);
                    acc
                })
        }
    }
}

/// Bounds of a path shape.
pub(crate) fn shape_bounds(shape: &Shape) -> Option<LatLngBounds> {
    match shape {
        Shape::Circle { center, radius } => {
            let d = std::f64::consts::PI / 180.0;
            let lat_radius = radius / (EARTH_RADIUS * d);
            let lng_radius = lat_radius / (center.lat * d).cos().abs().max(f64::EPSILON);
            Some(LatLngBounds::from_corners(
                LatLng::new(center.lat - lat_radius, center.lng - lng_radius),
                LatLng::new(center.lat + lat_radius, center.lng + lng_radius),
            ))
        }
        Shape::Rectangle(bounds) => Some(*bounds),
        other => {
            let rings = other.rings();
            LatLngBounds::from_points(rings.iter().flatten())
        }
    }
}

/// Collect `[lng, lat]` positions from any GeoJSON object.
fn collect_coordinates(value: &Value, out: &mut Vec<LatLng>) {
    match value {
        Value::Array(items) => {
            if let [Value::Number(lng), Value::Number(lat), ..] = items.as_slice() {
                if let (Some(lng), Some(lat)) = (lng.as_f64(), lat.as_f64()) {
                    out.push(LatLng::new(lat, lng));
                    return;
                }
            }
            for item in items {
                collect_coordinates(item, out);
            }
        }
        Value::Object(fields) => {
            for key in ["coordinates", "geometry", "geometries", "features"] {
                if let Some(inner) = fields.get(key) {
                    collect_coordinates(inner, out);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_names_round_trip() {
        for method in Method::ALL {
            assert_eq!(Method::from_name(method.name()), Some(*method));
        }
        assert_eq!(Method::from_name("SetZoom"), None);
    }

    #[test]
    fn test_capability_sets() {
        assert!(supports(ObjectKind::Map, Method::SetZoom));
        assert!(!supports(ObjectKind::Layer(LayerKind::Marker), Method::SetZoom));
        assert!(supports(ObjectKind::Layer(LayerKind::Marker), Method::BindPopup));
        assert!(supports(ObjectKind::Layer(LayerKind::FeatureGroup), Method::SetStyle));
        assert!(!supports(ObjectKind::Layer(LayerKind::LayerGroup), Method::SetStyle));
        assert!(supports(ObjectKind::Control(ControlKind::Layers), Method::AddOverlay));
        assert!(!supports(ObjectKind::Control(ControlKind::Zoom), Method::AddOverlay));
        assert!(supports(ObjectKind::Control(ControlKind::Zoom), Method::Off));
        assert!(!supports(ObjectKind::Control(ControlKind::Zoom), Method::BindPopup));
    }

    #[test]
    fn test_method_names_for_kind_are_sorted_and_unique() {
        let names = method_names(ObjectKind::Layer(LayerKind::TileLayer));
        assert!(names.contains(&"setUrl"));
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_geo_json_coordinates_are_lng_lat() {
        let mut points = Vec::new();
        collect_coordinates(
            &json!({
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10, 50]}},
                    {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 2]]}}
                ]
            }),
            &mut points,
        );
        assert_eq!(
            points,
            vec![LatLng::new(50.0, 10.0), LatLng::new(0.0, 0.0), LatLng::new(2.0, 1.0)]
        );
    }

    #[test]
    fn test_circle_bounds_grow_with_radius() {
        let small = shape_bounds(&Shape::Circle {
            center: LatLng::new(0.0, 0.0),
            radius: 100.0,
        })
        .expect("should have bounds");
        let large = shape_bounds(&Shape::Circle {
            center: LatLng::new(0.0, 0.0),
            radius: 1000.0,
        })
        .expect("should have bounds");
        assert!(large.contains(&small.north_east));
        assert!(!small.contains(&large.north_east));
    }
}
