//! Engine-native constructors, one per entity kind.
//!
//! A constructor receives its positional arguments (already converted, in the
//! order the descriptor declared them), the remaining converted attributes, and
//! the materialized children. It never touches the registry.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::argument::Argument;
use crate::error::{MapError, MapResult};
use crate::kind::ControlKind;
use crate::object::{
    ControlState, GeoJsonState, GroupState, HeatState, LiveState, MarkerState, OverlayState,
    PathState, RasterState, Shape,
};
use crate::registry::Handle;
use crate::value::{BasicValue, LatLng, LatLngBounds};

/// Inputs to a constructor.
#[derive(Debug, Clone, Default)]
pub struct Construction {
    /// Type tag being constructed, for error messages.
    pub tag: String,
    /// Positional constructor arguments, in declared order.
    pub args: Vec<(String, Argument)>,
    /// Remaining converted attributes.
    pub options: BTreeMap<String, Argument>,
    /// Materialized children, in descriptor order.
    pub children: Vec<Handle>,
    /// Raw children (GeoJSON only).
    pub raw_children: Vec<Value>,
    /// Control kind, when constructing a control.
    pub control: Option<ControlKind>,
}

impl Construction {
    /// Create an empty construction for a tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Find an input by name: a positional argument or an option. Names are
    /// compared ignoring ASCII case so `latlng` and `latLng` both match.
    #[must_use]
    pub fn find(&self, names: &[&str]) -> Option<&Argument> {
        let matches = |candidate: &str| names.iter().any(|n| n.eq_ignore_ascii_case(candidate));
        self.args
            .iter()
            .find(|(name, _)| matches(name))
            .map(|(_, arg)| arg)
            .or_else(|| {
                self.options
                    .iter()
                    .find(|(name, _)| matches(name))
                    .map(|(_, arg)| arg)
            })
    }

    /// The first positional argument, or a named input.
    #[must_use]
    pub fn primary(&self, names: &[&str]) -> Option<&Argument> {
        self.find(names)
            .or_else(|| self.args.first().map(|(_, arg)| arg))
    }

    /// Decode an optional input.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidDescriptor`] when present with the wrong shape.
    pub fn decode<T: DeserializeOwned>(&self, names: &[&str]) -> MapResult<Option<T>> {
        match self.find(names) {
            None => Ok(None),
            Some(arg) if arg.is_null() => Ok(None),
            Some(arg) => arg.decode().map(Some).map_err(|e| self.invalid(names[0], &e)),
        }
    }

    /// Decode a required input, falling back to the first positional argument.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidDescriptor`] when missing or mis-shaped.
    pub fn require<T: DeserializeOwned>(&self, names: &[&str]) -> MapResult<T> {
        let arg = self
            .primary(names)
            .ok_or_else(|| self.invalid(names[0], "missing"))?;
        arg.decode().map_err(|e| self.invalid(names[0], &e))
    }

    /// Numeric option with a default.
    #[must_use]
    pub fn number(&self, names: &[&str], default: f64) -> f64 {
        self.find(names).and_then(Argument::as_f64).unwrap_or(default)
    }

    /// String option.
    #[must_use]
    pub fn string(&self, names: &[&str]) -> Option<String> {
        self.find(names).and_then(Argument::as_str).map(str::to_string)
    }

    /// Every option in plain form, minus the named ones.
    #[must_use]
    pub fn plain_options(&self, except: &[&str]) -> Map<String, Value> {
        self.options
            .iter()
            .filter(|(name, _)| !except.iter().any(|e| e.eq_ignore_ascii_case(name)))
            .map(|(name, arg)| (name.clone(), arg.to_plain()))
            .collect()
    }

    fn invalid(&self, field: &str, reason: &str) -> MapError {
        MapError::InvalidDescriptor(format!("{} {field}: {reason}", self.tag))
    }
}

const LAT_LNG: &[&str] = &["latlng", "latLng", "center"];
const LAT_LNGS: &[&str] = &["latlngs", "latLngs"];
const BOUNDS: &[&str] = &["bounds", "latLngBounds"];

/// Decode a flat or nested coordinate list into rings.
pub(crate) fn rings_from(arg: &Argument) -> Result<Vec<Vec<LatLng>>, String> {
    if let Ok(flat) = arg.decode::<Vec<LatLng>>() {
        return Ok(if flat.is_empty() { Vec::new() } else { vec![flat] });
    }
    arg.decode::<Vec<Vec<LatLng>>>()
}

/// Marker.
///
/// # Errors
///
/// Fails without a position.
pub fn marker(c: &Construction) -> MapResult<LiveState> {
    let icon = match c.find(&["icon"]) {
        Some(Argument::Basic(icon @ (BasicValue::Icon(_) | BasicValue::DivIcon(_)))) => {
            Some(icon.clone())
        }
        Some(arg) if !arg.is_null() => {
            return Err(c.invalid("icon", "expected an Icon or DivIcon descriptor"))
        }
        _ => None,
    };
    Ok(LiveState::Marker(MarkerState {
        lat_lng: c.require(LAT_LNG)?,
        icon,
        opacity: c.number(&["opacity"], 1.0),
        z_index_offset: c.number(&["zIndexOffset"], 0.0),
    }))
}

fn path(c: &Construction, shape: Shape, consumed: &[&str]) -> LiveState {
    LiveState::Path(PathState {
        shape,
        style: c.plain_options(consumed),
    })
}

fn rings(c: &Construction) -> MapResult<Vec<Vec<LatLng>>> {
    let arg = c
        .primary(LAT_LNGS)
        .ok_or_else(|| c.invalid("latlngs", "missing"))?;
    rings_from(arg).map_err(|e| c.invalid("latlngs", &e))
}

/// Polyline.
///
/// # Errors
///
/// Fails without coordinates.
pub fn polyline(c: &Construction) -> MapResult<LiveState> {
    Ok(path(c, Shape::Polyline(rings(c)?), LAT_LNGS))
}

/// Polygon.
///
/// # Errors
///
/// Fails without coordinates.
pub fn polygon(c: &Construction) -> MapResult<LiveState> {
    Ok(path(c, Shape::Polygon(rings(c)?), LAT_LNGS))
}

/// Rectangle.
///
/// # Errors
///
/// Fails without bounds.
pub fn rectangle(c: &Construction) -> MapResult<LiveState> {
    let bounds: LatLngBounds = c.require(BOUNDS)?;
    Ok(path(c, Shape::Rectangle(bounds), BOUNDS))
}

/// Circle, radius in meters.
///
/// # Errors
///
/// Fails without a center.
pub fn circle(c: &Construction) -> MapResult<LiveState> {
    let center: LatLng = c.require(LAT_LNG)?;
    let radius = c.number(&["radius"], 10.0);
    Ok(path(
        c,
        Shape::Circle { center, radius },
        &["latlng", "latLng", "center", "radius"],
    ))
}

/// Circle marker, radius in pixels.
///
/// # Errors
///
/// Fails without a center.
pub fn circle_marker(c: &Construction) -> MapResult<LiveState> {
    let center: LatLng = c.require(LAT_LNG)?;
    let radius = c.number(&["radius"], 10.0);
    Ok(path(
        c,
        Shape::CircleMarker { center, radius },
        &["latlng", "latLng", "center", "radius"],
    ))
}

/// Layer group, feature group or cluster group: aggregates the already
/// materialized children.
///
/// # Errors
///
/// Infallible; the signature matches the factory table.
pub fn group(c: &Construction) -> MapResult<LiveState> {
    Ok(LiveState::Group(GroupState {
        children: c.children.clone(),
    }))
}

/// GeoJSON: constructed empty, then the raw children and any `data` attribute
/// are attached as one collection.
///
/// # Errors
///
/// Infallible; the signature matches the factory table.
pub fn geo_json(c: &Construction) -> MapResult<LiveState> {
    let mut data = Vec::new();
    if let Some(arg) = c.find(&["data", "geojson"]) {
        match arg.to_plain() {
            Value::Null => {}
            Value::Array(items) => data.extend(items),
            other => data.push(other),
        }
    }
    data.extend(c.raw_children.iter().cloned());
    let style = match c.find(&["style"]).map(Argument::to_plain) {
        Some(Value::Object(style)) => style,
        _ => Map::new(),
    };
    Ok(LiveState::GeoJson(GeoJsonState {
        data,
        initial_style: style.clone(),
        style,
    }))
}

/// Tile or grid layer.
///
/// # Errors
///
/// Infallible; the signature matches the factory table.
pub fn tile_layer(c: &Construction) -> MapResult<LiveState> {
    Ok(LiveState::Raster(RasterState {
        url: c.primary(&["url", "urlTemplate"]).and_then(Argument::as_str).map(str::to_string),
        opacity: c.number(&["opacity"], 1.0),
        z_index: c.number(&["zIndex"], 1.0),
        bounds: c.decode(BOUNDS)?,
    }))
}

/// Image overlay.
///
/// # Errors
///
/// Fails without an image URL or bounds.
pub fn image_overlay(c: &Construction) -> MapResult<LiveState> {
    let url = c
        .string(&["imageUrl", "url"])
        .ok_or_else(|| c.invalid("imageUrl", "missing"))?;
    let bounds: LatLngBounds = c
        .decode(BOUNDS)?
        .ok_or_else(|| c.invalid("bounds", "missing"))?;
    Ok(LiveState::Raster(RasterState {
        url: Some(url),
        opacity: c.number(&["opacity"], 1.0),
        z_index: c.number(&["zIndex"], 1.0),
        bounds: Some(bounds),
    }))
}

/// Heatmap.
///
/// # Errors
///
/// Fails when the points are mis-shaped.
pub fn heat_layer(c: &Construction) -> MapResult<LiveState> {
    let lat_lngs = match c.find(LAT_LNGS) {
        Some(arg) => arg.decode().map_err(|e| c.invalid("latLngs", &e))?,
        None => Vec::new(),
    };
    Ok(LiveState::Heat(HeatState {
        lat_lngs,
        options: c.plain_options(LAT_LNGS),
    }))
}

/// Standalone tooltip or popup.
///
/// # Errors
///
/// Fails when the position is mis-shaped.
pub fn overlay(c: &Construction) -> MapResult<LiveState> {
    Ok(LiveState::Overlay(OverlayState {
        content: c.string(&["content"]).unwrap_or_default(),
        lat_lng: c.decode(LAT_LNG)?,
    }))
}

/// Plain control.
///
/// # Errors
///
/// Infallible; the signature matches the factory table.
pub fn control(c: &Construction) -> MapResult<LiveState> {
    Ok(LiveState::Control(ControlState {
        position: position(c),
        collapsed: false,
        base_layers: Vec::new(),
        overlays: Vec::new(),
    }))
}

/// Layers control: named base layers and overlays, each an owned layer.
///
/// # Errors
///
/// Fails when an entry is not a layer.
pub fn layers_control(c: &Construction) -> MapResult<LiveState> {
    Ok(LiveState::Control(ControlState {
        position: position(c),
        collapsed: c
            .find(&["collapsed"])
            .and_then(Argument::as_bool)
            .unwrap_or(true),
        base_layers: named_layers(c, "baseLayers")?,
        overlays: named_layers(c, "overlays")?,
    }))
}

fn position(c: &Construction) -> String {
    c.string(&["position"]).unwrap_or_else(|| {
        c.control
            .map_or("topright", ControlKind::default_position)
            .to_string()
    })
}

fn named_layers(c: &Construction, field: &str) -> MapResult<Vec<(String, Handle)>> {
    match c.find(&[field]) {
        None => Ok(Vec::new()),
        Some(Argument::Record(entries)) => entries
            .iter()
            .map(|(name, arg)| {
                arg.as_handle()
                    .map(|handle| (name.clone(), handle))
                    .ok_or_else(|| c.invalid(field, &format!("entry '{name}' is not a layer")))
            })
            .collect(),
        Some(arg) if arg.is_null() => Ok(Vec::new()),
        Some(_) => Err(c.invalid(field, "expected an object of named layers")),
    }
}
