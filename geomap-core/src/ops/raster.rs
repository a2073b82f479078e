//! Tile, grid, image overlay and heatmap operations.

use serde_json::{Map, Value};

use super::{plain, Call, Context, Method as M};
use crate::engine::Stacking;
use crate::error::MapResult;
use crate::object::LiveState;
use crate::value::{LatLng, LatLngBounds};

pub(super) fn invoke(ctx: &mut Context<'_>, call: &Call<'_>) -> MapResult<Value> {
    let target = call.target;
    match call.method {
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
        _ => {}
    }

    let mut next = ctx.object(target)?.state().clone();
    match (&mut next, call.method) {
        (LiveState::Raster(state), M::GetBounds) => {
            return Ok(state.bounds.map_or(Value::Null, |b| plain(&b)));
        }
        (LiveState::Raster(state), M::SetUrl) => state.url = Some(call.text(0)?),
        (LiveState::Raster(state), M::SetOpacity) => state.opacity = call.number(0)?,
        (LiveState::Raster(state), M::SetZIndex) => state.z_index = call.number(0)?,
        (LiveState::Raster(state), M::SetBounds) => {
            state.bounds = Some(call.decode::<LatLngBounds>(0)?);
        }
        (LiveState::Heat(state), M::SetLatLngs) => state.lat_lngs = call.decode(0)?,
        (LiveState::Heat(state), M::AddLatLng) => state.lat_lngs.push(call.decode::<LatLng>(0)?),
        (LiveState::Heat(state), M::SetOptions) => {
            let options: Map<String, Value> = call.decode(0)?;
            state.options.extend(options);
        }
        _ => return Err(call.unsupported(ctx)),
    }
    *ctx.object_mut(target)?.state_mut() = next;
    ctx.updated(target);
    Ok(Value::Null)
}
