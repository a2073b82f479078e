//! Spherical Mercator (EPSG:3857) projection with 256 pixel tiles.

use crate::value::{Bounds, LatLng, LatLngBounds, Point};

/// Tile edge in pixels at zoom 0.
pub const TILE_SIZE: f64 = 256.0;

/// Sphere radius used by the projection, in meters.
pub const MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Latitude beyond which the projection is clamped.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

/// Pixel width of the world at a zoom level.
#[must_use]
pub fn scale(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// Zoom level at which the world is `scale` pixels wide.
#[must_use]
pub fn zoom_for_scale(scale: f64) -> f64 {
    (scale / TILE_SIZE).log2()
}

/// Project a coordinate to world pixels at a zoom level.
#[must_use]
pub fn project(lat_lng: &LatLng, zoom: f64) -> Point {
    let d = std::f64::consts::PI / 180.0;
    let lat = lat_lng.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let sin = (lat * d).sin();
    let x = MERCATOR_RADIUS * lat_lng.lng * d;
    let y = MERCATOR_RADIUS * ((1.0 + sin) / (1.0 - sin)).ln() / 2.0;

    let factor = 0.5 / (std::f64::consts::PI * MERCATOR_RADIUS);
    let s = scale(zoom);
    Point::new(s * (factor * x + 0.5), s * (-factor * y + 0.5))
}

/// Inverse of [`project`].
#[must_use]
pub fn unproject(point: &Point, zoom: f64) -> LatLng {
    let d = 180.0 / std::f64::consts::PI;
    let factor = 0.5 / (std::f64::consts::PI * MERCATOR_RADIUS);
    let s = scale(zoom);
    let x = (point.x / s - 0.5) / factor;
    let y = (point.y / s - 0.5) / -factor;
    LatLng::new(
        (2.0 * (y / MERCATOR_RADIUS).exp().atan() - std::f64::consts::PI / 2.0) * d,
        x * d / MERCATOR_RADIUS,
    )
}

/// Pixel bounds of the whole world at a zoom level.
#[must_use]
pub fn world_bounds(zoom: f64) -> Bounds {
    let s = scale(zoom);
    Bounds::from_corners(Point::new(0.0, 0.0), Point::new(s, s))
}

/// Coordinate bounds of the projectable world.
#[must_use]
pub fn world_lat_lng_bounds() -> LatLngBounds {
    LatLngBounds::from_corners(
        LatLng::new(-MAX_LATITUDE, -180.0),
        LatLng::new(MAX_LATITUDE, 180.0),
    )
}

/// Fractional zoom at which `bounds` exactly fills `size`.
///
/// With `inside` the view fits inside the bounds instead of around them.
#[must_use]
pub fn bounds_zoom(bounds: &LatLngBounds, size: Point, inside: bool) -> f64 {
    let nw = project(&bounds.north_west(), 0.0);
    let se = project(&bounds.south_east(), 0.0);
    let extent = se.subtract(nw);
    let ratio_x = size.x / extent.x.abs().max(f64::EPSILON);
    let ratio_y = size.y / extent.y.abs().max(f64::EPSILON);
    let ratio = if inside {
        ratio_x.max(ratio_y)
    } else {
        ratio_x.min(ratio_y)
    };
    ratio.log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_world_center() {
        let p = project(&LatLng::new(0.0, 0.0), 0.0);
        assert!((p.x - 128.0).abs() < 1e-9);
        assert!((p.y - 128.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_unproject_inverse() {
        let original = LatLng::new(51.505, -0.09);
        let back = unproject(&project(&original, 13.0), 13.0);
        assert!(back.equals_within(&original, 1e-9));
    }

    #[test]
    fn test_latitude_is_clamped() {
        let p = project(&LatLng::new(90.0, 0.0), 0.0);
        assert!(p.y.abs() < 1e-6);
    }

    #[test]
    fn test_bounds_zoom_whole_world() {
        let zoom = bounds_zoom(&world_lat_lng_bounds(), Point::new(256.0, 256.0), false);
        assert!(zoom.abs() < 1e-6, "got {zoom}");
        let zoom = bounds_zoom(&world_lat_lng_bounds(), Point::new(512.0, 512.0), false);
        assert!((zoom - 1.0).abs() < 1e-6, "got {zoom}");
    }

    #[test]
    fn test_scale_doubles_per_zoom() {
        assert!((scale(1.0) - 512.0).abs() < f64::EPSILON);
        assert!((zoom_for_scale(1024.0) - 2.0).abs() < f64::EPSILON);
        assert_eq!(world_bounds(0.0).max, Point::new(256.0, 256.0));
    }
}
