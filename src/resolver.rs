//! # Parameter Resolver
//!
//! Turns the loosely typed, name-keyed contents of an invocation context
//! into the ordered argument list a callable unit expects. Candidate
//! signatures are tried in declaration order; the first one whose
//! parameters all resolve wins, and resolution has no side effects until a
//! candidate fully succeeds.

use serde_json::Value;

use crate::context::InvocationContext;
use crate::errors::{WorkerError, WorkerResult};
use crate::invocable::{Invocable, ValueShape};
use crate::values::TypedValue;

/// Context-metadata key exposing the invocation id
pub const INVOCATION_ID_KEY: &str = "invocationId";

/// Context-metadata key exposing the function display name
pub const FUNCTION_NAME_KEY: &str = "functionName";

/// Context-metadata key exposing the trace context as JSON
pub const TRACE_CONTEXT_KEY: &str = "traceContext";

/// Context-metadata key exposing the retry context as JSON
pub const RETRY_CONTEXT_KEY: &str = "retryContext";

/// The chosen candidate and its fully resolved arguments
#[derive(Debug)]
pub struct ResolvedCall {
    pub signature: usize,
    pub arguments: Vec<TypedValue>,
}

/// Resolve the argument list for one of the unit's candidate signatures
pub fn resolve_arguments(
    ctx: &InvocationContext,
    invocable: &dyn Invocable,
) -> WorkerResult<ResolvedCall> {
    let signatures = invocable.signatures();
    for (index, signature) in signatures.iter().enumerate() {
        let mut arguments = Vec::with_capacity(signature.parameters.len());
        let mut complete = true;
        for parameter in &signature.parameters {
            match locate(ctx, &parameter.name).and_then(|value| coerce(&value, parameter.shape)) {
                Some(value) => arguments.push(value),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            return Ok(ResolvedCall {
                signature: index,
                arguments,
            });
        }
    }

    Err(WorkerError::NoMatchingSignature(format!(
        "no candidate of \"{}\" accepts the supplied bindings ({} tried)",
        ctx.function_name(),
        signatures.len()
    )))
}

/// Locate a value by name: input bindings, then trigger metadata, then
/// context metadata, in that priority order.
fn locate(ctx: &InvocationContext, name: &str) -> Option<TypedValue> {
    if let Some(value) = ctx.input(name) {
        return Some(value.clone());
    }
    if let Some(value) = ctx.trigger_metadata().get(name) {
        return Some(value.clone());
    }
    context_metadata(ctx, name)
}

fn context_metadata(ctx: &InvocationContext, name: &str) -> Option<TypedValue> {
    match name {
        INVOCATION_ID_KEY => Some(TypedValue::String(ctx.invocation_id().to_string())),
        FUNCTION_NAME_KEY => Some(TypedValue::String(ctx.function_name().to_string())),
        TRACE_CONTEXT_KEY => serde_json::to_value(ctx.trace_context())
            .ok()
            .map(TypedValue::Json),
        RETRY_CONTEXT_KEY => serde_json::to_value(ctx.retry_context())
            .ok()
            .map(TypedValue::Json),
        _ => None,
    }
}

/// Convert a located value to the parameter's expected shape
///
/// Conversions are explicit and fail rather than guess: an unparsable
/// string is not JSON, non-utf8 bytes are not a string, and HTTP-shaped or
/// collection values only match their own shape.
fn coerce(value: &TypedValue, shape: ValueShape) -> Option<TypedValue> {
    match (shape, value) {
        (ValueShape::Any, TypedValue::Empty) => None,
        (ValueShape::Any, value) => Some(value.clone()),

        (ValueShape::String, TypedValue::String(_)) => Some(value.clone()),
        (ValueShape::String, TypedValue::Bytes(bytes)) => String::from_utf8(bytes.clone())
            .ok()
            .map(TypedValue::String),
        (ValueShape::String, TypedValue::Json(Value::String(text))) => {
            Some(TypedValue::String(text.clone()))
        }
        (ValueShape::String, TypedValue::Json(json)) => {
            Some(TypedValue::String(json.to_string()))
        }

        (ValueShape::Bytes, TypedValue::Bytes(_)) => Some(value.clone()),
        (ValueShape::Bytes, TypedValue::String(text)) => {
            Some(TypedValue::Bytes(text.clone().into_bytes()))
        }

        (ValueShape::Json, TypedValue::Json(_)) => Some(value.clone()),
        (ValueShape::Json, TypedValue::String(text)) => TypedValue::json_from_str(text),

        (ValueShape::Http, TypedValue::Http(_)) => Some(value.clone()),
        (ValueShape::Collection, TypedValue::Collection(_)) => Some(value.clone()),

        _ => None,
    }
}
