//! Operation dispatcher: named method invocation on registered objects.
//!
//! A request names a target id, a method and a JSON-encoded argument array.
//! Dispatch parses the arguments, resolves the target, checks the method
//! against the target's capabilities, converts the arguments (materializing
//! any descriptors they contain) and finally invokes. Objects created while
//! converting arguments are rolled back if any later step fails.

use serde_json::Value;

use crate::convert::GraphConverter;
use crate::descriptor::OperationRequest;
use crate::engine::RenderEngine;
use crate::error::{MapError, MapResult};
use crate::event::EventRouter;
use crate::ops::{self, Call, Context, Method, NativeEvent};
use crate::registry::ObjectRegistry;

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Plain JSON return value; `null` for mutators.
    pub value: Value,
    /// Native events raised while the operation ran, in order.
    pub events: Vec<NativeEvent>,
}

/// Parse a JSON-encoded argument array.
///
/// # Errors
///
/// Returns [`MapError::MalformedArguments`] for invalid JSON or a non-array.
pub fn parse_arguments(arguments: &str) -> MapResult<Vec<Value>> {
    let trimmed = arguments.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(MapError::MalformedArguments(format!(
            "expected a JSON array, got {}",
            kind_name(&other)
        ))),
        Err(e) => Err(MapError::MalformedArguments(e.to_string())),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Dispatch an operation request.
///
/// # Errors
///
/// - [`MapError::MalformedArguments`] if the argument string is not a JSON array
/// - [`MapError::TargetNotFound`] if no object has the target id
/// - [`MapError::UnsupportedOperation`] if the target does not expose the method
/// - conversion errors for argument descriptors
/// - [`MapError::InvalidArgument`] if the operation rejects its arguments
pub fn dispatch(
    registry: &mut ObjectRegistry,
    router: &EventRouter,
    engine: &mut dyn RenderEngine,
    request: &OperationRequest,
) -> MapResult<Outcome> {
    let args = parse_arguments(&request.arguments)?;
    invoke(
        registry,
        router,
        engine,
        request.target_id.as_str(),
        &request.method_name,
        &args,
    )
}

/// Invoke a method with already parsed arguments.
///
/// # Errors
///
/// As [`dispatch`], minus argument parsing.
pub fn invoke(
    registry: &mut ObjectRegistry,
    router: &EventRouter,
    engine: &mut dyn RenderEngine,
    target_id: &str,
    method_name: &str,
    args: &[Value],
) -> MapResult<Outcome> {
    let target = registry.resolve(target_id)?;
    let kind = registry
        .get(target)
        .map(crate::object::LiveObject::kind)
        .ok_or_else(|| MapError::TargetNotFound(target_id.to_string()))?;
    let method = Method::from_name(method_name)
        .filter(|method| ops::supports(kind, *method))
        .ok_or_else(|| MapError::UnsupportedOperation {
            target: target_id.to_string(),
            method: method_name.to_string(),
        })?;

    let mut converter = GraphConverter::new(router);
    let mut converted = Vec::with_capacity(args.len());
    for arg in args {
        match converter.convert(registry, arg) {
            Ok(arg) => converted.push(arg),
            Err(e) => {
                tracing::warn!(target = target_id, method = method_name, error = %e, "Argument conversion failed");
                converter.rollback(registry);
                return Err(e);
            }
        }
    }

    let mut ctx = Context::new(registry, engine);
    let result = ops::invoke(
        &mut ctx,
        Call {
            method,
            target,
            args: &converted,
        },
    );
    let events = ctx.into_events();
    match result {
        Ok(value) => {
            let created = converter.commit();
            tracing::debug!(
                target = target_id,
                method = method_name,
                created = created.len(),
                events = events.len(),
                "Dispatched operation"
            );
            Ok(Outcome { value, events })
        }
        Err(e) => {
            tracing::debug!(target = target_id, method = method_name, error = %e, "Operation failed");
            converter.rollback(registry);
            Err(e)
        }
    }
}
