//! Container and GeoJSON operations.

use serde_json::{json, Map, Value};

use super::{bounds_of, plain, Call, Context, Method as M};
use crate::argument::Argument;
use crate::engine::Stacking;
use crate::error::{MapError, MapResult};
use crate::kind::ObjectKind;
use crate::object::LiveState;
use crate::registry::Handle;

pub(super) fn invoke(ctx: &mut Context<'_>, call: &Call<'_>) -> MapResult<Value> {
    let target = call.target;
    match call.method {
        M::AddLayer => {
            let child = call.handle(ctx, 0)?;
            add_child(ctx, target, child)?;
        }
        M::RemoveLayer => {
            let child = call.handle(ctx, 0)?;
            remove_child(ctx, target, child)?;
        }
        M::HasLayer => {
            let child = call.handle(ctx, 0);
            let children = children(ctx, target)?;
            return Ok(Value::Bool(child.is_ok_and(|h| children.contains(&h))));
        }
        M::ClearLayers => {
            for child in children(ctx, target)? {
                remove_child(ctx, target, child)?;
            }
        }
        M::GetLayers => {
            let ids: Vec<String> = children(ctx, target)?
                .into_iter()
                .map(|h| ctx.id(h).to_string())
                .collect();
            return Ok(json!(ids));
        }
        M::GetLayer => {
            let id = call.text(0)?;
            let found = children(ctx, target)?
                .into_iter()
                .filter_map(|h| ctx.registry.get(h))
                .find(|child| child.id().as_str() == id);
            return Ok(found.map_or(Value::Null, crate::object::LiveObject::summary));
        }
        M::SetStyle => {
            let style: Map<String, Value> = call.decode(0)?;
            for child in children(ctx, target)? {
                let Some(object) = ctx.registry.get_mut(child) else {
                    continue;
                };
                if let LiveState::Path(path) = object.state_mut() {
                    path.style.extend(style.clone());
                    ctx.updated(child);
                }
            }
        }
        M::BringToFront | M::BringToBack => {
            let stacking = if call.method == M::BringToFront {
                Stacking::Front
            } else {
                Stacking::Back
            };
            for child in children(ctx, target)? {
                let id = ctx.id(child);
                ctx.engine.restack(&id, stacking);
            }
        }
        M::GetBounds => {
            return Ok(bounds_of(ctx.registry, target).map_or(Value::Null, |b| plain(&b)));
        }
        _ => return Err(call.unsupported(ctx)),
    }
    Ok(Value::Null)
}

fn children(ctx: &Context<'_>, group: Handle) -> MapResult<Vec<Handle>> {
    ctx.object(group)?
        .as_group()
        .map(|g| g.children.clone())
        .ok_or_else(|| MapError::invalid_argument("getLayers", format!("{} is not a group", ctx.id(group))))
}

/// Add a layer to a container. Returns `false` if it was already a child.
pub(crate) fn add_child(ctx: &mut Context<'_>, group: Handle, child: Handle) -> MapResult<bool> {
    if !matches!(ctx.object(child)?.kind(), ObjectKind::Layer(_)) {
        return Err(MapError::invalid_argument(
            "addLayer",
            format!("{} is not a layer", ctx.id(child)),
        ));
    }
    let LiveState::Group(state) = ctx.object_mut(group)?.state_mut() else {
        return Err(MapError::invalid_argument(
            "addLayer",
            format!("{} is not a group", ctx.id(group)),
        ));
    };
    if state.children.contains(&child) {
        return Ok(false);
    }
    state.children.push(child);
    ctx.registry.adopt(group, child);
    ctx.updated(group);
    let id = ctx.id(child);
    ctx.emit(group, "layeradd", json!({ "layer": id }));
    Ok(true)
}

/// Remove a layer from a container. The layer stays registered.
/// Returns `false` if it was not a child.
pub(crate) fn remove_child(ctx: &mut Context<'_>, group: Handle, child: Handle) -> MapResult<bool> {
    let LiveState::Group(state) = ctx.object_mut(group)?.state_mut() else {
        return Err(MapError::invalid_argument(
            "removeLayer",
            format!("{} is not a group", ctx.id(group)),
        ));
    };
    let before = state.children.len();
    state.children.retain(|h| *h != child);
    if state.children.len() == before {
        return Ok(false);
    }
    ctx.registry.release(child);
    ctx.updated(group);
    let id = ctx.id(child);
    ctx.emit(group, "layerremove", json!({ "layer": id }));
    Ok(true)
}

pub(super) fn invoke_geo_json(ctx: &mut Context<'_>, call: &Call<'_>) -> MapResult<Value> {
    let target = call.target;
    if call.method == M::GetBounds {
        return Ok(bounds_of(ctx.registry, target).map_or(Value::Null, |b| plain(&b)));
    }
    let LiveState::GeoJson(state) = ctx.object(target)?.state() else {
        return Err(call.unsupported(ctx));
    };
    if call.method == M::ToGeoJson {
        return Ok(feature_collection(&state.data));
    }

    let mut next = state.clone();
    match call.method {
        M::AddData => match call.arg(0)? {
            Argument::List(items) => next.data.extend(items.iter().map(Argument::to_plain)),
            other => next.data.push(other.to_plain()),
        },
        M::SetStyle => {
            let style: Map<String, Value> = call.decode(0)?;
            next.style.extend(style);
        }
        M::ResetStyle => next.style = next.initial_style.clone(),
        M::ClearLayers => next.data.clear(),
        _ => return Err(call.unsupported(ctx)),
    }
    if let LiveState::GeoJson(state) = ctx.object_mut(target)?.state_mut() {
        *state = next;
    }
    ctx.updated(target);
    Ok(Value::Null)
}

/// Wrap raw GeoJSON data as one `FeatureCollection`.
fn feature_collection(data: &[Value]) -> Value {
    let mut features = Vec::new();
    for item in data {
        match item.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {
                if let Some(Value::Array(inner)) = item.get("features") {
                    features.extend(inner.iter().cloned());
                }
            }
            Some("Feature") => features.push(item.clone()),
            Some(_) => features.push(json!({
                "type": "Feature",
                "geometry": item,
                "properties": {},
            })),
            None => {}
        }
    }
    json!({ "type": "FeatureCollection", "features": features })
}
