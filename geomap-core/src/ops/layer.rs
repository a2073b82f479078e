//! Operations shared by every layer, plus markers and standalone overlays.

use serde_json::{json, Map, Value};

use super::{group, map, plain, raster, shape, Call, Context, Method as M};
use crate::argument::Argument;
use crate::error::MapResult;
use crate::kind::{LayerKind, ObjectKind};
use crate::object::{Decoration, LiveState};
use crate::value::{BasicValue, LatLng};

pub(super) fn invoke(ctx: &mut Context<'_>, call: Call<'_>, kind: LayerKind) -> MapResult<Value> {
    match call.method {
        M::AddTo => {
            let parent = call.handle(ctx, 0)?;
            match ctx.object(parent)?.kind() {
                ObjectKind::Map => {
                    map::attach_layer(ctx, call.target, None)?;
                }
                ObjectKind::Layer(parent_kind) if parent_kind.is_container() => {
                    group::add_child(ctx, parent, call.target)?;
                }
                other => {
                    return Err(call.invalid(format!("cannot add a layer to {}", other.tag())));
                }
            }
            Ok(Value::Null)
        }
        M::Remove => {
            map::detach_layer(ctx, call.target)?;
            Ok(Value::Null)
        }
        M::RemoveFrom => {
            let parent = call.handle(ctx, 0)?;
            match ctx.object(parent)?.kind() {
                ObjectKind::Map => {
                    map::detach_layer(ctx, call.target)?;
                }
                ObjectKind::Layer(parent_kind) if parent_kind.is_container() => {
                    group::remove_child(ctx, parent, call.target)?;
                }
                other => {
                    return Err(call.invalid(format!("cannot remove a layer from {}", other.tag())));
                }
            }
            Ok(Value::Null)
        }
        M::BindPopup
        | M::UnbindPopup
        | M::OpenPopup
        | M::ClosePopup
        | M::TogglePopup
        | M::IsPopupOpen
        | M::SetPopupContent => decoration(ctx, &call, Slot::Popup),
        M::BindTooltip
        | M::UnbindTooltip
        | M::OpenTooltip
        | M::CloseTooltip
        | M::ToggleTooltip
        | M::IsTooltipOpen
        | M::SetTooltipContent => decoration(ctx, &call, Slot::Tooltip),
        _ => match kind {
            LayerKind::Marker => marker(ctx, &call),
            LayerKind::Tooltip | LayerKind::Popup => overlay(ctx, &call),
            kind if kind.is_path() => shape::invoke(ctx, &call),
            kind if kind.is_container() => group::invoke(ctx, &call),
            LayerKind::GeoJson => group::invoke_geo_json(ctx, &call),
            _ => raster::invoke(ctx, &call),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Popup,
    Tooltip,
}

impl Slot {
    fn name(self) -> &'static str {
        match self {
            Self::Popup => "popup",
            Self::Tooltip => "tooltip",
        }
    }
}

fn decoration(ctx: &mut Context<'_>, call: &Call<'_>, slot: Slot) -> MapResult<Value> {
    let target = call.target;
    let (open_event, close_event) = match slot {
        Slot::Popup => ("popupopen", "popupclose"),
        Slot::Tooltip => ("tooltipopen", "tooltipclose"),
    };

    let current = {
        let object = ctx.object(target)?;
        match slot {
            Slot::Popup => object.popup.clone(),
            Slot::Tooltip => object.tooltip.clone(),
        }
    };

    let next = match call.method {
        M::IsPopupOpen | M::IsTooltipOpen => {
            return Ok(Value::Bool(current.is_some_and(|d| d.open)));
        }
        M::BindPopup | M::BindTooltip => {
            let content = call.text(0)?;
            let options: Map<String, Value> = call.decode_opt(1)?.unwrap_or_default();
            let mut bound = Decoration {
                content,
                options,
                open: false,
            };
            bound.open = bound
                .options
                .get("permanent")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Some(bound)
        }
        M::UnbindPopup | M::UnbindTooltip => None,
        M::SetPopupContent | M::SetTooltipContent => {
            let content = call.text(0)?;
            let mut bound = bound_or_err(call, current.clone(), slot)?;
            bound.content = content;
            Some(bound)
        }
        M::OpenPopup | M::OpenTooltip => {
            let mut bound = bound_or_err(call, current.clone(), slot)?;
            bound.open = true;
            Some(bound)
        }
        M::ClosePopup | M::CloseTooltip => {
            let mut bound = bound_or_err(call, current.clone(), slot)?;
            bound.open = false;
            Some(bound)
        }
        M::TogglePopup | M::ToggleTooltip => {
            let mut bound = bound_or_err(call, current.clone(), slot)?;
            bound.open = !bound.open;
            Some(bound)
        }
        _ => return Err(call.unsupported(ctx)),
    };

    let was_open = current.as_ref().is_some_and(|d| d.open);
    let now_open = next.as_ref().is_some_and(|d| d.open);
    let content = next
        .as_ref()
        .or(current.as_ref())
        .map(|d| d.content.clone())
        .unwrap_or_default();

    let object = ctx.object_mut(target)?;
    match slot {
        Slot::Popup => object.popup = next,
        Slot::Tooltip => object.tooltip = next,
    }
    ctx.updated(target);

    if was_open != now_open {
        let event = if now_open { open_event } else { close_event };
        let payload = json!({ slot.name(): content, "layer": ctx.id(target) });
        ctx.emit(target, event, payload.clone());
        if let Ok(root) = ctx.root() {
            ctx.emit(root, event, payload);
        }
    }
    Ok(Value::Null)
}

fn bound_or_err(call: &Call<'_>, current: Option<Decoration>, slot: Slot) -> MapResult<Decoration> {
    current.ok_or_else(|| call.invalid(format!("no {} bound", slot.name())))
}

fn marker(ctx: &mut Context<'_>, call: &Call<'_>) -> MapResult<Value> {
    let target = call.target;
    // Validate before touching state.
    let update = match call.method {
        M::GetLatLng => {
            let LiveState::Marker(state) = ctx.object(target)?.state() else {
                return Err(call.unsupported(ctx));
            };
            return Ok(plain(&state.lat_lng));
        }
        M::SetLatLng => MarkerUpdate::Position(call.decode(0)?),
        M::SetZIndexOffset => MarkerUpdate::ZIndexOffset(call.number(0)?),
        M::SetOpacity => MarkerUpdate::Opacity(call.number(0)?),
        M::SetIcon => match call.arg(0)? {
            Argument::Basic(icon @ (BasicValue::Icon(_) | BasicValue::DivIcon(_))) => {
                MarkerUpdate::Icon(icon.clone())
            }
            _ => return Err(call.invalid("expected an Icon or DivIcon")),
        },
        _ => return Err(call.unsupported(ctx)),
    };

    let LiveState::Marker(state) = ctx.object_mut(target)?.state_mut() else {
        return Err(call.unsupported(ctx));
    };
    let mut moved = None;
    match update {
        MarkerUpdate::Position(lat_lng) => {
            moved = Some(state.lat_lng);
            state.lat_lng = lat_lng;
        }
        MarkerUpdate::ZIndexOffset(offset) => state.z_index_offset = offset,
        MarkerUpdate::Opacity(opacity) => state.opacity = opacity,
        MarkerUpdate::Icon(icon) => state.icon = Some(icon),
    }
    let current = state.lat_lng;
    ctx.updated(target);
    if let Some(old) = moved {
        ctx.emit(
            target,
            "move",
            json!({ "latlng": current, "oldLatLng": old }),
        );
    }
    Ok(Value::Null)
}

enum MarkerUpdate {
    Position(LatLng),
    ZIndexOffset(f64),
    Opacity(f64),
    Icon(BasicValue),
}

fn overlay(ctx: &mut Context<'_>, call: &Call<'_>) -> MapResult<Value> {
    let target = call.target;
    match call.method {
        M::GetContent | M::GetLatLng | M::IsOpen => {
            let LiveState::Overlay(state) = ctx.object(target)?.state() else {
                return Err(call.unsupported(ctx));
            };
            Ok(match call.method {
                M::GetContent => Value::String(state.content.clone()),
                M::GetLatLng => state.lat_lng.map_or(Value::Null, |p| plain(&p)),
                _ => Value::Bool(ctx.registry.is_attached(target)),
            })
        }
        M::SetContent | M::SetLatLng => {
            let content = if call.method == M::SetContent {
                Some(call.text(0)?)
            } else {
                None
            };
            let lat_lng: Option<LatLng> = if call.method == M::SetLatLng {
                Some(call.decode(0)?)
            } else {
                None
            };
            let LiveState::Overlay(state) = ctx.object_mut(target)?.state_mut() else {
                return Err(call.unsupported(ctx));
            };
            if let Some(content) = content {
                state.content = content;
            }
            if lat_lng.is_some() {
                state.lat_lng = lat_lng;
            }
            ctx.updated(target);
            Ok(Value::Null)
        }
        _ => Err(call.unsupported(ctx)),
    }
}
