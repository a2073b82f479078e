//! Control operations.

use serde_json::Value;

use super::{map, Call, Context, Method as M};
use crate::error::MapResult;
use crate::kind::{ControlKind, ObjectKind};
use crate::object::LiveState;

const POSITIONS: &[&str] = &["topleft", "topright", "bottomleft", "bottomright"];

pub(super) fn invoke(ctx: &mut Context<'_>, call: Call<'_>, kind: ControlKind) -> MapResult<Value> {
    let target = call.target;
    match call.method {
        M::AddTo => {
            let parent = call.handle(ctx, 0)?;
            if ctx.object(parent)?.kind() != ObjectKind::Map {
                return Err(call.invalid("controls can only be added to the map"));
            }
            map::attach_control(ctx, target)?;
            return Ok(Value::Null);
        }
        M::Remove => {
            map::detach_control(ctx, target)?;
            return Ok(Value::Null);
        }
        M::GetPosition => {
            let LiveState::Control(state) = ctx.object(target)?.state() else {
                return Err(call.unsupported(ctx));
            };
            return Ok(Value::String(state.position.clone()));
        }
        _ => {}
    }

    let LiveState::Control(current) = ctx.object(target)?.state() else {
        return Err(call.unsupported(ctx));
    };
    let mut next = current.clone();
    let mut adopted = None;
    let mut released = Vec::new();
    match call.method {
        M::SetPosition => {
            let position = call.text(0)?;
            if !POSITIONS.contains(&position.as_str()) {
                return Err(call.invalid(format!("unknown position '{position}'")));
            }
            next.position = position;
        }
        M::Expand => next.collapsed = false,
        M::Collapse => next.collapsed = true,
        M::AddBaseLayer | M::AddOverlay if kind == ControlKind::Layers => {
            let layer = call.handle(ctx, 0)?;
            if !matches!(ctx.object(layer)?.kind(), ObjectKind::Layer(_)) {
                return Err(call.invalid("expected a layer"));
            }
            let name = call.text(1)?;
            let entries = if call.method == M::AddBaseLayer {
                &mut next.base_layers
            } else {
                &mut next.overlays
            };
            match entries.iter_mut().find(|(_, h)| *h == layer) {
                Some(entry) => entry.0 = name,
                None => {
                    entries.push((name, layer));
                    adopted = Some(layer);
                }
            }
        }
        M::RemoveLayer if kind == ControlKind::Layers => {
            let layer = call.handle(ctx, 0)?;
            for entries in [&mut next.base_layers, &mut next.overlays] {
                let before = entries.len();
                entries.retain(|(_, h)| *h != layer);
                released.extend(std::iter::repeat(layer).take(before - entries.len()));
            }
        }
        _ => return Err(call.unsupported(ctx)),
    }

    if let LiveState::Control(state) = ctx.object_mut(target)?.state_mut() {
        *state = next;
    }
    if let Some(layer) = adopted {
        ctx.registry.adopt(target, layer);
    }
    for layer in released {
        ctx.registry.release(layer);
    }
    ctx.updated(target);
    Ok(Value::Null)
}
