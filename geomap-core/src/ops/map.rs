//! Root map operations: view state, projections, membership, geolocation.

use serde_json::{json, Value};

use super::{plain, Call, Context, Method as M};
use crate::crs;
use crate::error::{MapError, MapResult};
use crate::kind::ObjectKind;
use crate::object::MapView;
use crate::registry::Handle;
use crate::value::{Bounds, LatLng, LatLngBounds, Point};

pub(super) fn invoke(ctx: &mut Context<'_>, call: Call<'_>) -> MapResult<Value> {
    match call.method {
        M::SetView | M::FlyTo => {
            let center = call.decode(0)?;
            let zoom = call.number_opt(1)?;
            set_view(ctx, center, zoom)?;
        }
        M::SetZoom => {
            let zoom = call.number(0)?;
            let center = ctx.view()?.center;
            set_view(ctx, center, Some(zoom))?;
        }
        M::ZoomIn | M::ZoomOut => {
            let delta = call.number_opt(0)?.unwrap_or(1.0);
            let view = ctx.view()?;
            let zoom = if call.method == M::ZoomIn {
                view.zoom + delta
            } else {
                view.zoom - delta
            };
            let center = view.center;
            set_view(ctx, center, Some(zoom))?;
        }
        M::SetZoomAround => {
            let zoom = call.number(1)?;
            let view = ctx.view()?;
            let anchor = match call.decode::<Point>(0) {
                Ok(point) => point,
                Err(_) => lat_lng_to_layer_point(view, &call.decode(0)?),
            };
            let half = view.size.multiply_by(0.5);
            let factor = 1.0 - 1.0 / 2f64.powf(view.clamp_zoom(zoom) - view.zoom);
            let offset = anchor.subtract(half).multiply_by(factor);
            let center = layer_point_to_lat_lng(view, &half.add(offset));
            set_view(ctx, center, Some(zoom))?;
        }
        M::FitBounds | M::FlyToBounds => {
            let bounds: LatLngBounds = call.decode(0)?;
            let max_zoom = option_number(&call, 1, "maxZoom");
            let view = ctx.view()?;
            let mut zoom = bounds_zoom(view, &bounds, false);
            if let Some(max_zoom) = max_zoom {
                zoom = zoom.min(max_zoom);
            }
            set_view(ctx, bounds.center(), Some(zoom))?;
        }
        M::FitWorld => {
            let bounds = crs::world_lat_lng_bounds();
            let zoom = bounds_zoom(ctx.view()?, &bounds, false);
            set_view(ctx, bounds.center(), Some(zoom))?;
        }
        M::PanTo => {
            let center = call.decode(0)?;
            set_view(ctx, center, None)?;
        }
        M::PanBy => {
            let offset: Point = call.decode(0)?;
            let view = ctx.view()?;
            let projected = crs::project(&view.center, view.zoom).add(offset);
            let center = crs::unproject(&projected, view.zoom);
            set_view(ctx, center, None)?;
        }
        M::SetMaxBounds => {
            let bounds: Option<LatLngBounds> = call.decode_opt(0)?;
            ctx.view_mut()?.max_bounds = bounds;
            let center = ctx.view()?.center;
            set_view(ctx, center, None)?;
        }
        M::SetMinZoom | M::SetMaxZoom => {
            let zoom = call.number(0)?;
            let view = ctx.view_mut()?;
            let (min_zoom, max_zoom) = if call.method == M::SetMinZoom {
                (zoom, view.max_zoom)
            } else {
                (view.min_zoom, zoom)
            };
            if min_zoom > max_zoom {
                return Err(call.invalid("minZoom exceeds maxZoom"));
            }
            view.min_zoom = min_zoom;
            view.max_zoom = max_zoom;
            let (center, current) = (view.center, view.zoom);
            set_view(ctx, center, Some(current))?;
        }
        M::PanInsideBounds => {
            let bounds: LatLngBounds = call.decode(0)?;
            let center = clamp_center(ctx.view()?.center, &bounds);
            set_view(ctx, center, None)?;
        }
        M::PanInside => {
            let target: LatLng = call.decode(0)?;
            if !view_bounds(ctx.view()?).contains(&target) {
                set_view(ctx, target, None)?;
            }
        }
        M::InvalidateSize => {
            let size = ctx.view()?.size;
            ctx.engine.invalidate_size(size);
        }
        M::Stop | M::StopLocate => {}
        M::Locate => locate(ctx, &call)?,
        M::AddLayer => {
            let layer = call.handle(ctx, 0)?;
            attach_layer(ctx, layer, None)?;
        }
        M::RemoveLayer => {
            let layer = call.handle(ctx, 0)?;
            detach_layer(ctx, layer)?;
        }
        M::HasLayer => {
            let layer = call.handle(ctx, 0);
            let view = ctx.view()?;
            return Ok(Value::Bool(
                layer.is_ok_and(|handle| view.layers.contains(&handle) || view.controls.contains(&handle)),
            ));
        }
        M::AddControl => {
            let control = call.handle(ctx, 0)?;
            attach_control(ctx, control)?;
        }
        M::RemoveControl => {
            let control = call.handle(ctx, 0)?;
            detach_control(ctx, control)?;
        }
        _ => return query(ctx, &call),
    }
    Ok(Value::Null)
}

fn query(ctx: &Context<'_>, call: &Call<'_>) -> MapResult<Value> {
    let view = ctx.view()?;
    let result = match call.method {
        M::GetCenter => plain(&view.center),
        M::GetZoom => json!(view.zoom),
        M::GetMinZoom => json!(view.min_zoom),
        M::GetMaxZoom => json!(view.max_zoom),
        M::GetBounds => plain(&view_bounds(view)),
        M::GetBoundsZoom => {
            let bounds: LatLngBounds = call.decode(0)?;
            let inside = call.opt(1).and_then(|arg| arg.as_bool()).unwrap_or(false);
            json!(bounds_zoom(view, &bounds, inside))
        }
        M::GetSize => plain(&view.size),
        M::GetPixelBounds => plain(&pixel_bounds(view)),
        M::GetPixelOrigin => plain(&pixel_origin(view)),
        M::GetPixelWorldBounds => {
            let zoom = call.number_opt(0)?.unwrap_or(view.zoom);
            plain(&crs::world_bounds(zoom))
        }
        M::Project => {
            let lat_lng: LatLng = call.decode(0)?;
            let zoom = call.number_opt(1)?.unwrap_or(view.zoom);
            plain(&crs::project(&lat_lng, zoom))
        }
        M::Unproject => {
            let point: Point = call.decode(0)?;
            let zoom = call.number_opt(1)?.unwrap_or(view.zoom);
            plain(&crs::unproject(&point, zoom))
        }
        M::LatLngToLayerPoint | M::LatLngToContainerPoint => {
            plain(&lat_lng_to_layer_point(view, &call.decode(0)?))
        }
        M::LayerPointToLatLng | M::ContainerPointToLatLng => {
            plain(&layer_point_to_lat_lng(view, &call.decode(0)?))
        }
        // The map pane is never offset, so layer and container points coincide.
        M::ContainerPointToLayerPoint | M::LayerPointToContainerPoint => {
            plain(&call.decode::<Point>(0)?)
        }
        M::WrapLatLng => plain(&call.decode::<LatLng>(0)?.wrap()),
        M::Distance => {
            let a: LatLng = call.decode(0)?;
            let b: LatLng = call.decode(1)?;
            json!(a.distance_to(&b))
        }
        _ => return Err(call.unsupported(ctx)),
    };
    Ok(result)
}

fn option_number(call: &Call<'_>, index: usize, name: &str) -> Option<f64> {
    call.opt(index)
        .map(crate::argument::Argument::to_plain)
        .and_then(|options| options.get(name).and_then(Value::as_f64))
}

/// Move the view, emitting the engine's move and zoom event sequence.
pub(crate) fn set_view(ctx: &mut Context<'_>, center: LatLng, zoom: Option<f64>) -> MapResult<()> {
    let root = ctx.root()?;
    let view = ctx.view()?;
    let zoom = view.clamp_zoom(zoom.unwrap_or(view.zoom));
    if !zoom.is_finite() {
        return Err(MapError::invalid_argument("setView", "zoom must be finite"));
    }
    let center = match view.max_bounds {
        Some(bounds) => clamp_center(center, &bounds),
        None => center,
    };
    let zoom_changed = (zoom - view.zoom).abs() > f64::EPSILON;
    if !zoom_changed && center.equals(&view.center) {
        return Ok(());
    }

    ctx.emit(root, "movestart", json!({}));
    if zoom_changed {
        ctx.emit(root, "zoomstart", json!({}));
        ctx.emit(root, "zoomanim", json!({ "center": center, "zoom": zoom }));
    }
    let view = ctx.view_mut()?;
    view.center = center;
    view.zoom = zoom;
    ctx.updated(root);
    ctx.emit(root, "move", json!({ "center": center, "zoom": zoom }));
    if zoom_changed {
        ctx.emit(root, "zoom", json!({ "zoom": zoom }));
        ctx.emit(root, "zoomend", json!({}));
    }
    ctx.emit(root, "moveend", json!({}));
    Ok(())
}

fn clamp_center(center: LatLng, bounds: &LatLngBounds) -> LatLng {
    LatLng {
        lat: center.lat.clamp(bounds.south_west.lat, bounds.north_east.lat),
        lng: center.lng.clamp(bounds.south_west.lng, bounds.north_east.lng),
        alt: center.alt,
    }
}

fn bounds_zoom(view: &MapView, bounds: &LatLngBounds, inside: bool) -> f64 {
    view.clamp_zoom(crs::bounds_zoom(bounds, view.size, inside).floor())
}

/// Pixel rectangle the viewport covers in world pixels.
pub(crate) fn pixel_bounds(view: &MapView) -> Bounds {
    let center = crs::project(&view.center, view.zoom);
    let half = view.size.multiply_by(0.5);
    Bounds::from_corners(center.subtract(half), center.add(half))
}

/// World pixel at the top-left corner of the layer pane.
pub(crate) fn pixel_origin(view: &MapView) -> Point {
    crs::project(&view.center, view.zoom)
        .subtract(view.size.multiply_by(0.5))
        .round()
}

/// Geographical rectangle the viewport covers.
pub(crate) fn view_bounds(view: &MapView) -> LatLngBounds {
    let pixels = pixel_bounds(view);
    let south_west = crs::unproject(&Point::new(pixels.min.x, pixels.max.y), view.zoom);
    let north_east = crs::unproject(&Point::new(pixels.max.x, pixels.min.y), view.zoom);
    LatLngBounds::from_corners(south_west, north_east)
}

fn lat_lng_to_layer_point(view: &MapView, lat_lng: &LatLng) -> Point {
    crs::project(lat_lng, view.zoom)
        .round()
        .subtract(pixel_origin(view))
}

fn layer_point_to_lat_lng(view: &MapView, point: &Point) -> LatLng {
    crs::unproject(&point.add(pixel_origin(view)), view.zoom)
}

fn locate(ctx: &mut Context<'_>, call: &Call<'_>) -> MapResult<()> {
    let root = ctx.root()?;
    let move_view = call
        .opt(0)
        .map(crate::argument::Argument::to_plain)
        .and_then(|options| options.get("setView").and_then(Value::as_bool))
        .unwrap_or(false);
    match ctx.engine.locate() {
        Some(fix) => {
            ctx.emit(
                root,
                "locationfound",
                json!({ "latlng": fix.lat_lng, "accuracy": fix.accuracy }),
            );
            if move_view {
                set_view(ctx, fix.lat_lng, None)?;
            }
        }
        None => {
            ctx.emit(
                root,
                "locationerror",
                json!({ "code": 2, "message": "Geolocation unavailable" }),
            );
        }
    }
    Ok(())
}

/// Put a layer on the map, at `index` in the layer order or last.
/// Returns `false` if it was already there.
pub(crate) fn attach_layer(
    ctx: &mut Context<'_>,
    layer: Handle,
    index: Option<usize>,
) -> MapResult<bool> {
    let root = ctx.root()?;
    if !matches!(ctx.object(layer)?.kind(), ObjectKind::Layer(_)) {
        return Err(MapError::invalid_argument(
            "addLayer",
            format!("{} is not a layer", ctx.id(layer)),
        ));
    }
    let view = ctx.view_mut()?;
    if view.layers.contains(&layer) {
        return Ok(false);
    }
    let index = index.map_or(view.layers.len(), |i| i.min(view.layers.len()));
    view.layers.insert(index, layer);

    if let Some(object) = ctx.registry.get(layer) {
        ctx.engine.attach(object);
    }
    let id = ctx.id(layer);
    ctx.emit(layer, "add", json!({}));
    ctx.emit(root, "layeradd", json!({ "layer": id }));
    Ok(true)
}

/// Take a layer off the map. Returns `false` if it was not there.
pub(crate) fn detach_layer(ctx: &mut Context<'_>, layer: Handle) -> MapResult<bool> {
    let root = ctx.root()?;
    let view = ctx.view_mut()?;
    let Some(position) = view.layers.iter().position(|h| *h == layer) else {
        return Ok(false);
    };
    view.layers.remove(position);

    let id = ctx.id(layer);
    ctx.engine.detach(&id);
    ctx.emit(layer, "remove", json!({}));
    ctx.emit(root, "layerremove", json!({ "layer": id }));
    Ok(true)
}

/// Put a control on the map. Returns `false` if it was already there.
pub(crate) fn attach_control(ctx: &mut Context<'_>, control: Handle) -> MapResult<bool> {
    if !matches!(ctx.object(control)?.kind(), ObjectKind::Control(_)) {
        return Err(MapError::invalid_argument(
            "addControl",
            format!("{} is not a control", ctx.id(control)),
        ));
    }
    let view = ctx.view_mut()?;
    if view.controls.contains(&control) {
        return Ok(false);
    }
    view.controls.push(control);
    if let Some(object) = ctx.registry.get(control) {
        ctx.engine.attach(object);
    }
    Ok(true)
}

/// Take a control off the map. Returns `false` if it was not there.
pub(crate) fn detach_control(ctx: &mut Context<'_>, control: Handle) -> MapResult<bool> {
    let view = ctx.view_mut()?;
    let before = view.controls.len();
    view.controls.retain(|h| *h != control);
    if view.controls.len() == before {
        return Ok(false);
    }
    let id = ctx.id(control);
    ctx.engine.detach(&id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(zoom: f64) -> MapView {
        MapView {
            center: LatLng::new(0.0, 0.0),
            zoom,
            min_zoom: 0.0,
            max_zoom: 18.0,
            max_bounds: None,
            size: Point::new(800.0, 600.0),
            layers: Vec::new(),
            controls: Vec::new(),
        }
    }

    #[test]
    fn test_center_maps_to_half_viewport() {
        let view = view(3.0);
        let point = lat_lng_to_layer_point(&view, &view.center);
        assert_eq!(point, Point::new(400.0, 300.0));
        let back = layer_point_to_lat_lng(&view, &point);
        assert!(back.equals_within(&view.center, 1e-6));
    }

    #[test]
    fn test_view_bounds_contain_center() {
        let view = view(2.0);
        let bounds = view_bounds(&view);
        assert!(bounds.contains(&view.center));
        assert!(bounds.north_east.lat > 0.0 && bounds.south_west.lat < 0.0);
    }

    #[test]
    fn test_clamp_center_into_bounds() {
        let bounds = LatLngBounds::from_corners(LatLng::new(10.0, 10.0), LatLng::new(20.0, 20.0));
        let clamped = clamp_center(LatLng::new(0.0, 15.0), &bounds);
        assert_eq!(clamped, LatLng::new(10.0, 15.0));
    }

    #[test]
    fn test_bounds_zoom_is_integral_and_clamped() {
        let view = view(0.0);
        let zoom = bounds_zoom(
            &view,
            &LatLngBounds::from_corners(LatLng::new(51.49, -0.1), LatLng::new(51.51, -0.08)),
            false,
        );
        assert!((zoom - zoom.floor()).abs() < f64::EPSILON);
        assert!(zoom > 10.0 && zoom <= 18.0, "got {zoom}");
    }
}
