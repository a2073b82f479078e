//! Type registry: the closed set of object and value kinds.
//!
//! Every wire `typeTag` resolves to exactly one variant here. Entity kinds carry
//! their constructor, basic kinds carry their converter. Resolution is a pure
//! lookup; an absent result tells the caller to raise [`MapError::UnsupportedType`].

use serde_json::Value;

use crate::error::{MapError, MapResult};
use crate::factory::{self, Construction};
use crate::object::LiveState;
use crate::value::{BasicValue, Bounds, DivIcon, Icon, LatLng, LatLngBounds, Point};

/// Constructor for a layer or control kind.
pub type Factory = fn(&Construction) -> MapResult<LiveState>;

/// Converter for a basic value kind.
pub type BasicConverter = fn(&Value) -> MapResult<BasicValue>;

macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $tag:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),*
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            /// Canonical wire tag.
            #[must_use]
            pub fn tag(self) -> &'static str {
                match self {
                    $($name::$variant => $tag),*
                }
            }

            /// Parse a wire tag. Matching ignores ASCII case so that both
            /// `Marker` and `marker` resolve.
            #[must_use]
            pub fn from_tag(tag: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|kind| kind.tag().eq_ignore_ascii_case(tag))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.tag())
            }
        }
    };
}

tag_enum! {
    /// Layer kinds: entities that live in the map's layer tree.
    LayerKind {
        /// Point marker.
        Marker => "Marker",
        /// Open line.
        Polyline => "Polyline",
        /// Closed polygon.
        Polygon => "Polygon",
        /// Axis-aligned rectangle.
        Rectangle => "Rectangle",
        /// Circle with a radius in meters.
        Circle => "Circle",
        /// Circle with a radius in pixels.
        CircleMarker => "CircleMarker",
        /// Plain container.
        LayerGroup => "LayerGroup",
        /// Container with shared styling and bounds.
        FeatureGroup => "FeatureGroup",
        /// Clustering container.
        MarkerClusterGroup => "MarkerClusterGroup",
        /// Raw GeoJSON geometry collection.
        GeoJson => "GeoJSON",
        /// Generic tiled grid.
        GridLayer => "GridLayer",
        /// URL-templated tile layer.
        TileLayer => "TileLayer",
        /// Image stretched over bounds.
        ImageOverlay => "ImageOverlay",
        /// Heatmap of weighted points.
        HeatLayer => "HeatLayer",
        /// Standalone tooltip.
        Tooltip => "Tooltip",
        /// Standalone popup.
        Popup => "Popup",
    }
}

tag_enum! {
    /// Control kinds: UI widgets owned by the top-level registry only.
    ControlKind {
        /// Zoom buttons.
        Zoom => "zoom",
        /// Scale bar.
        Scale => "scale",
        /// Attribution text.
        Attribution => "attribution",
        /// Base layer and overlay switcher.
        Layers => "layers",
        /// Fullscreen toggle.
        Fullscreen => "fullscreen",
        /// Drawing toolbar.
        Draw => "Draw",
    }
}

tag_enum! {
    /// Basic value kinds: converted fresh every time, never registered.
    BasicKind {
        /// Pixel point.
        Point => "Point",
        /// Pixel bounds.
        Bounds => "Bounds",
        /// Coordinate.
        LatLng => "LatLng",
        /// Coordinate bounds.
        LatLngBounds => "LatLngBounds",
        /// Image icon.
        Icon => "Icon",
        /// HTML icon.
        DivIcon => "DivIcon",
    }
}

impl LayerKind {
    /// Constructor for this kind.
    #[must_use]
    pub fn factory(self) -> Factory {
        match self {
            Self::Marker => factory::marker,
            Self::Polyline => factory::polyline,
            Self::Polygon => factory::polygon,
            Self::Rectangle => factory::rectangle,
            Self::Circle => factory::circle,
            Self::CircleMarker => factory::circle_marker,
            Self::LayerGroup | Self::FeatureGroup | Self::MarkerClusterGroup => factory::group,
            Self::GeoJson => factory::geo_json,
            Self::GridLayer | Self::TileLayer => factory::tile_layer,
            Self::ImageOverlay => factory::image_overlay,
            Self::HeatLayer => factory::heat_layer,
            Self::Tooltip | Self::Popup => factory::overlay,
        }
    }

    /// Whether descriptors of this kind materialize their `children`.
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::LayerGroup | Self::FeatureGroup | Self::MarkerClusterGroup
        )
    }

    /// Whether this kind is a vector path.
    #[must_use]
    pub fn is_path(self) -> bool {
        matches!(
            self,
            Self::Polyline | Self::Polygon | Self::Rectangle | Self::Circle | Self::CircleMarker
        )
    }
}

impl ControlKind {
    /// Constructor for this kind.
    #[must_use]
    pub fn factory(self) -> Factory {
        match self {
            Self::Layers => factory::layers_control,
            _ => factory::control,
        }
    }

    /// Corner the control is placed in unless told otherwise.
    #[must_use]
    pub fn default_position(self) -> &'static str {
        match self {
            Self::Zoom | Self::Fullscreen | Self::Draw => "topleft",
            Self::Scale => "bottomleft",
            Self::Attribution => "bottomright",
            Self::Layers => "topright",
        }
    }
}

impl BasicKind {
    /// Converter for this kind.
    #[must_use]
    pub fn converter(self) -> BasicConverter {
        match self {
            Self::Point => convert_point,
            Self::Bounds => convert_bounds,
            Self::LatLng => convert_lat_lng,
            Self::LatLngBounds => convert_lat_lng_bounds,
            Self::Icon => convert_icon,
            Self::DivIcon => convert_div_icon,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: &Value, tag: &str) -> MapResult<T> {
    T::deserialize(value).map_err(|e| MapError::InvalidDescriptor(format!("{tag}: {e}")))
}

fn convert_point(value: &Value) -> MapResult<BasicValue> {
    decode::<Point>(value, "Point").map(BasicValue::Point)
}

fn convert_bounds(value: &Value) -> MapResult<BasicValue> {
    decode::<Bounds>(value, "Bounds").map(BasicValue::Bounds)
}

fn convert_lat_lng(value: &Value) -> MapResult<BasicValue> {
    decode::<LatLng>(value, "LatLng").map(BasicValue::LatLng)
}

fn convert_lat_lng_bounds(value: &Value) -> MapResult<BasicValue> {
    decode::<LatLngBounds>(value, "LatLngBounds").map(BasicValue::LatLngBounds)
}

fn convert_icon(value: &Value) -> MapResult<BasicValue> {
    decode::<Icon>(value, "Icon").map(|icon| BasicValue::Icon(Box::new(icon)))
}

fn convert_div_icon(value: &Value) -> MapResult<BasicValue> {
    decode::<DivIcon>(value, "DivIcon").map(|icon| BasicValue::DivIcon(Box::new(icon)))
}

/// A resolved type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Basic value kind.
    Basic(BasicKind),
    /// Layer kind.
    Layer(LayerKind),
    /// Control kind.
    Control(ControlKind),
}

impl TypeTag {
    /// Resolve a wire tag. Basic kinds are matched first, by membership in the
    /// fixed basic set.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::UnsupportedType`] for an unknown tag.
    pub fn parse(tag: &str) -> MapResult<Self> {
        if let Some(kind) = BasicKind::from_tag(tag) {
            return Ok(Self::Basic(kind));
        }
        if let Some(kind) = LayerKind::from_tag(tag) {
            return Ok(Self::Layer(kind));
        }
        if let Some(kind) = ControlKind::from_tag(tag) {
            return Ok(Self::Control(kind));
        }
        Err(MapError::UnsupportedType(tag.to_string()))
    }
}

/// Kind of a registered live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// The root map.
    Map,
    /// A layer.
    Layer(LayerKind),
    /// A control.
    Control(ControlKind),
}

impl ObjectKind {
    /// Wire tag of this kind.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Map => "Map",
            Self::Layer(kind) => kind.tag(),
            Self::Control(kind) => kind.tag(),
        }
    }

    /// Whether this is the given layer kind.
    #[must_use]
    pub fn is_layer(self, kind: LayerKind) -> bool {
        self == Self::Layer(kind)
    }
}

/// Resolve the constructor for a layer tag.
#[must_use]
pub fn resolve_layer_factory(tag: &str) -> Option<Factory> {
    LayerKind::from_tag(tag).map(LayerKind::factory)
}

/// Resolve the constructor for a control tag.
#[must_use]
pub fn resolve_control_factory(tag: &str) -> Option<Factory> {
    ControlKind::from_tag(tag).map(ControlKind::factory)
}

/// Resolve the converter for a basic value tag.
#[must_use]
pub fn resolve_basic_converter(tag: &str) -> Option<BasicConverter> {
    BasicKind::from_tag(tag).map(BasicKind::converter)
}
