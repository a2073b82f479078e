//! Vector path operations: polylines, polygons, rectangles and circles.

use serde_json::{json, Map, Value};

use super::{plain, shape_bounds, Call, Context, Method as M};
use crate::engine::Stacking;
use crate::error::MapResult;
use crate::factory::rings_from;
use crate::object::{LiveState, PathState, Shape};
use crate::value::{LatLng, LatLngBounds};

pub(super) fn invoke(ctx: &mut Context<'_>, call: &Call<'_>) -> MapResult<Value> {
    let target = call.target;
    let LiveState::Path(path) = ctx.object(target)?.state() else {
        return Err(call.unsupported(ctx));
    };
    let path = path.clone();

    let next = match call.method {
        M::BringToFront | M::BringToBack => {
            let id = ctx.id(target);
            let stacking = if call.method == M::BringToFront {
                Stacking::Front
            } else {
                Stacking::Back
            };
            ctx.engine.restack(&id, stacking);
            return Ok(Value::Null);
        }
        M::Redraw => {
            ctx.updated(target);
            return Ok(Value::Null);
        }
        M::GetLatLngs => return Ok(lat_lngs_json(&path.shape)),
        M::IsEmpty => {
            return Ok(Value::Bool(
                path.shape.rings().iter().all(Vec::is_empty),
            ))
        }
        M::GetBounds => {
            return Ok(shape_bounds(&path.shape).map_or(Value::Null, |b| plain(&b)));
        }
        M::GetCenter => {
            let center = shape_bounds(&path.shape)
                .map(|b| b.center())
                .ok_or_else(|| call.invalid("cannot compute the center of an empty shape"))?;
            return Ok(plain(&center));
        }
        M::GetLatLng => {
            return match path.shape {
                Shape::Circle { center, .. } | Shape::CircleMarker { center, .. } => {
                    Ok(plain(&center))
                }
                _ => Err(call.unsupported(ctx)),
            }
        }
        M::GetRadius => {
            return match path.shape {
                Shape::Circle { radius, .. } | Shape::CircleMarker { radius, .. } => {
                    Ok(json!(radius))
                }
                _ => Err(call.unsupported(ctx)),
            }
        }
        M::SetStyle => {
            let style: Map<String, Value> = call.decode(0)?;
            let mut next = path;
            next.style.extend(style);
            next
        }
        M::SetLatLngs => {
            let rings = rings_from(call.arg(0)?).map_err(|e| call.invalid(e))?;
            let shape = match path.shape {
                Shape::Polyline(_) => Shape::Polyline(rings),
                Shape::Polygon(_) => Shape::Polygon(rings),
                Shape::Rectangle(_) => Shape::Rectangle(
                    LatLngBounds::from_points(rings.iter().flatten())
                        .ok_or_else(|| call.invalid("a rectangle needs at least one corner"))?,
                ),
                _ => return Err(call.unsupported(ctx)),
            };
            PathState { shape, ..path }
        }
        M::AddLatLng => {
            let point: LatLng = call.decode(0)?;
            let mut next = path;
            match &mut next.shape {
                Shape::Polyline(rings) | Shape::Polygon(rings) => match rings.last_mut() {
                    Some(ring) => ring.push(point),
                    None => rings.push(vec![point]),
                },
                Shape::Rectangle(bounds) => bounds.extend(&point),
                _ => return Err(call.unsupported(ctx)),
            }
            next
        }
        M::SetLatLng => {
            let point: LatLng = call.decode(0)?;
            let mut next = path;
            let old = match &mut next.shape {
                Shape::Circle { center, .. } | Shape::CircleMarker { center, .. } => {
                    std::mem::replace(center, point)
                }
                _ => return Err(call.unsupported(ctx)),
            };
            ctx.emit(target, "move", json!({ "latlng": point, "oldLatLng": old }));
            next
        }
        M::SetRadius => {
            let value = call.number(0)?;
            if value < 0.0 {
                return Err(call.invalid("radius must not be negative"));
            }
            let mut next = path;
            match &mut next.shape {
                Shape::Circle { radius, .. } | Shape::CircleMarker { radius, .. } => *radius = value,
                _ => return Err(call.unsupported(ctx)),
            }
            next
        }
        _ => return Err(call.unsupported(ctx)),
    };

    if let LiveState::Path(state) = ctx.object_mut(target)?.state_mut() {
        *state = next;
    }
    ctx.updated(target);
    Ok(Value::Null)
}

fn lat_lngs_json(shape: &Shape) -> Value {
    match shape {
        Shape::Polyline(rings) if rings.len() == 1 => plain(&rings[0]),
        Shape::Polyline(rings) if rings.is_empty() => json!([]),
        other => plain(&other.rings()),
    }
}
