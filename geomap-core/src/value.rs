//! Basic values: points, bounds, coordinates and icons.
//!
//! These are plain values, not entities. They carry no identity, are never
//! registered, and are produced fresh on every conversion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default margin used by [`LatLng::equals`].
pub const LAT_LNG_MARGIN: f64 = 1.0e-9;

/// Mean Earth radius in meters, used for great-circle distance.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// A pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "PointRepr")]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Object { x: f64, y: f64 },
    Pair(f64, f64),
}

impl From<PointRepr> for Point {
    fn from(repr: PointRepr) -> Self {
        match repr {
            PointRepr::Object { x, y } | PointRepr::Pair(x, y) => Self { x, y },
        }
    }
}

impl Point {
    /// Create a point.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise sum.
    #[must_use]
    pub fn add(self, other: Point) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    /// Component-wise difference.
    #[must_use]
    pub fn subtract(self, other: Point) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }

    /// Scale both components.
    #[must_use]
    pub fn multiply_by(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Round both components to the nearest integer.
    #[must_use]
    pub fn round(self) -> Self {
        Self::new(self.x.round(), self.y.round())
    }
}

/// A rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Top-left corner.
    #[serde(alias = "topLeft")]
    pub min: Point,
    /// Bottom-right corner.
    #[serde(alias = "bottomRight")]
    pub max: Point,
}

impl Bounds {
    /// Build bounds from two arbitrary corners.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Width and height.
    #[must_use]
    pub fn size(&self) -> Point {
        self.max.subtract(self.min)
    }

    /// Whether the point lies inside, edges included.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

/// A geographical coordinate.
///
/// Deserializes from `{lat, lng}`, `{lat, lon}`, `[lat, lng]` or `[lat, lng, alt]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LatLngRepr")]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Optional altitude in meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LatLngRepr {
    Object {
        lat: f64,
        #[serde(alias = "lon")]
        lng: f64,
        #[serde(default, alias = "altitude")]
        alt: Option<f64>,
    },
    Pair(f64, f64),
    Triple(f64, f64, f64),
}

impl TryFrom<LatLngRepr> for LatLng {
    type Error = String;

    fn try_from(repr: LatLngRepr) -> Result<Self, Self::Error> {
        let (lat, lng, alt) = match repr {
            LatLngRepr::Object { lat, lng, alt } => (lat, lng, alt),
            LatLngRepr::Pair(lat, lng) => (lat, lng, None),
            LatLngRepr::Triple(lat, lng, alt) => (lat, lng, Some(alt)),
        };
        if lat.is_nan() || lng.is_nan() {
            return Err(format!("invalid coordinate ({lat}, {lng})"));
        }
        Ok(Self { lat, lng, alt })
    }
}

impl LatLng {
    /// Create a coordinate without altitude.
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, alt: None }
    }

    /// Create a coordinate with altitude.
    #[must_use]
    pub fn with_alt(lat: f64, lng: f64, alt: f64) -> Self {
        Self {
            lat,
            lng,
            alt: Some(alt),
        }
    }

    /// Engine equality: both components within [`LAT_LNG_MARGIN`].
    #[must_use]
    pub fn equals(&self, other: &LatLng) -> bool {
        self.equals_within(other, LAT_LNG_MARGIN)
    }

    /// Equality with an explicit margin in degrees.
    #[must_use]
    pub fn equals_within(&self, other: &LatLng, margin: f64) -> bool {
        (self.lat - other.lat).abs().max((self.lng - other.lng).abs()) <= margin
    }

    /// Great-circle distance in meters (haversine).
    #[must_use]
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        let rad = std::f64::consts::PI / 180.0;
        let lat1 = self.lat * rad;
        let lat2 = other.lat * rad;
        let sin_dlat = ((other.lat - self.lat) * rad / 2.0).sin();
        let sin_dlng = ((other.lng - self.lng) * rad / 2.0).sin();
        let a = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS * c
    }

    /// Longitude wrapped into `[-180, 180)`.
    #[must_use]
    pub fn wrap(&self) -> Self {
        let lng = (self.lng + 180.0).rem_euclid(360.0) - 180.0;
        Self { lng, ..*self }
    }
}

/// A geographical rectangle.
///
/// Deserializes from `{southWest, northEast}` (also `_southWest`/`_northEast`) or
/// a pair of corner coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "LatLngBoundsRepr")]
pub struct LatLngBounds {
    /// South-west corner.
    pub south_west: LatLng,
    /// North-east corner.
    pub north_east: LatLng,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LatLngBoundsRepr {
    Object {
        #[serde(alias = "_southWest")]
        #[serde(rename = "southWest")]
        south_west: LatLng,
        #[serde(alias = "_northEast")]
        #[serde(rename = "northEast")]
        north_east: LatLng,
    },
    Corners(LatLng, LatLng),
}

impl From<LatLngBoundsRepr> for LatLngBounds {
    fn from(repr: LatLngBoundsRepr) -> Self {
        match repr {
            LatLngBoundsRepr::Object {
                south_west,
                north_east,
            } => Self {
                south_west,
                north_east,
            },
            LatLngBoundsRepr::Corners(a, b) => Self::from_corners(a, b),
        }
    }
}

impl LatLngBounds {
    /// Build bounds from two arbitrary corners.
    #[must_use]
    pub fn from_corners(a: LatLng, b: LatLng) -> Self {
        Self {
            south_west: LatLng::new(a.lat.min(b.lat), a.lng.min(b.lng)),
            north_east: LatLng::new(a.lat.max(b.lat), a.lng.max(b.lng)),
        }
    }

    /// Smallest bounds containing every coordinate, or `None` for an empty input.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LatLng>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self::from_corners(*first, *first);
        for point in points {
            bounds.extend(point);
        }
        Some(bounds)
    }

    /// Grow to include a coordinate.
    pub fn extend(&mut self, point: &LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    /// Grow to include other bounds.
    pub fn extend_bounds(&mut self, other: &LatLngBounds) {
        self.extend(&other.south_west);
        self.extend(&other.north_east);
    }

    /// Geometric center.
    #[must_use]
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// Whether a coordinate lies inside, edges included.
    #[must_use]
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// North-west corner.
    #[must_use]
    pub fn north_west(&self) -> LatLng {
        LatLng::new(self.north_east.lat, self.south_west.lng)
    }

    /// South-east corner.
    #[must_use]
    pub fn south_east(&self) -> LatLng {
        LatLng::new(self.south_west.lat, self.north_east.lng)
    }
}

/// An image marker icon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Icon {
    /// Image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// High-resolution image URL.
    #[serde(default, alias = "retinaUrl", skip_serializing_if = "Option::is_none")]
    pub icon_retina_url: Option<String>,
    /// Image size in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_size: Option<Point>,
    /// Pixel of the image placed on the marker position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_anchor: Option<Point>,
    /// Popup offset relative to the anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_anchor: Option<Point>,
    /// Tooltip offset relative to the anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip_anchor: Option<Point>,
    /// Shadow image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_url: Option<String>,
    /// Shadow image size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_size: Option<Point>,
    /// Shadow anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_anchor: Option<Point>,
    /// CSS class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// An HTML marker icon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivIcon {
    /// Shared icon options.
    #[serde(flatten)]
    pub icon: Icon,
    /// Inner HTML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Background position offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_pos: Option<Point>,
}

/// A converted basic value.
#[derive(Debug, Clone, PartialEq)]
pub enum BasicValue {
    /// Pixel point.
    Point(Point),
    /// Pixel bounds.
    Bounds(Bounds),
    /// Coordinate.
    LatLng(LatLng),
    /// Coordinate bounds.
    LatLngBounds(LatLngBounds),
    /// Image icon.
    Icon(Box<Icon>),
    /// HTML icon.
    DivIcon(Box<DivIcon>),
}

impl BasicValue {
    /// Plain JSON form, as returned to the remote owner.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let encoded = match self {
            Self::Point(v) => serde_json::to_value(v),
            Self::Bounds(v) => serde_json::to_value(v),
            Self::LatLng(v) => serde_json::to_value(v),
            Self::LatLngBounds(v) => serde_json::to_value(v),
            Self::Icon(v) => serde_json::to_value(v),
            Self::DivIcon(v) => serde_json::to_value(v),
        };
        encoded.unwrap_or(Value::Null)
    }
}
