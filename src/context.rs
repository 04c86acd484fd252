//! # Invocation Context
//!
//! Per-call mutable state threaded through the pipeline: resolved inputs,
//! accumulated outputs, trigger/retry/trace metadata and the write-once
//! return slot. Built once per invocation, read once to extract the
//! response, then discarded.

use std::collections::HashMap;
use std::sync::Arc;

use crate::broker::definition::FunctionDefinition;
use crate::errors::{WorkerError, WorkerResult};
use crate::rpc::{InvokeRequest, ParameterBinding, RetryContext, TraceContext};
use crate::values::TypedValue;

/// Per-invocation state, exclusively owned by its invocation
pub struct InvocationContext {
    invocation_id: String,
    function_name: String,
    definition: Arc<FunctionDefinition>,
    trace_context: TraceContext,
    retry_context: RetryContext,
    trigger_metadata: HashMap<String, TypedValue>,
    inputs: HashMap<String, TypedValue>,
    outputs: Vec<ParameterBinding>,
    return_value: Option<TypedValue>,
}

impl InvocationContext {
    /// Build a context from an invocation request
    ///
    /// Request bindings with no matching declared input are ignored;
    /// declared inputs with no request entry stay absent and surface later
    /// through the resolver if a signature requires them. Trigger metadata
    /// arrives already reconciled by the broker.
    pub fn build(
        request: InvokeRequest,
        function_name: impl Into<String>,
        definition: Arc<FunctionDefinition>,
        trigger_metadata: HashMap<String, TypedValue>,
    ) -> Self {
        let mut inputs = HashMap::new();
        for binding in request.input_data {
            if definition.declares_input(&binding.name) {
                inputs.insert(binding.name, binding.data);
            }
        }

        Self {
            invocation_id: request.invocation_id,
            function_name: function_name.into(),
            definition,
            trace_context: request.trace_context,
            retry_context: request.retry_context,
            trigger_metadata,
            inputs,
            outputs: Vec::new(),
            return_value: None,
        }
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn definition(&self) -> &Arc<FunctionDefinition> {
        &self.definition
    }

    pub fn trace_context(&self) -> &TraceContext {
        &self.trace_context
    }

    pub fn retry_context(&self) -> &RetryContext {
        &self.retry_context
    }

    pub fn trigger_metadata(&self) -> &HashMap<String, TypedValue> {
        &self.trigger_metadata
    }

    pub fn input(&self, name: &str) -> Option<&TypedValue> {
        self.inputs.get(name)
    }

    pub fn outputs(&self) -> &[ParameterBinding] {
        &self.outputs
    }

    /// Append an output binding; outputs are append-only
    pub fn write_output(&mut self, name: impl Into<String>, value: TypedValue) {
        self.outputs.push(ParameterBinding::new(name, value));
    }

    pub fn return_value(&self) -> Option<&TypedValue> {
        self.return_value.as_ref()
    }

    /// Store the return value; the slot is write-once
    pub fn set_return_value(&mut self, value: TypedValue) -> WorkerResult<()> {
        if self.return_value.is_some() {
            return Err(WorkerError::Internal(format!(
                "return value already set for invocation {}",
                self.invocation_id
            )));
        }
        self.return_value = Some(value);
        Ok(())
    }

    /// Promote the return value into the single declared output binding
    ///
    /// No-op when the unit has no implicit output, produced no return
    /// value, or already wrote that output explicitly.
    pub fn promote_return_value(&mut self) {
        let Some(name) = self.definition.implicit_output_name() else {
            return;
        };
        let name = name.to_string();
        if self.outputs.iter().any(|binding| binding.name == name) {
            return;
        }
        if let Some(value) = self.return_value.clone() {
            self.outputs.push(ParameterBinding::new(name, value));
        }
    }

    /// Extract the response and consume the context
    pub fn into_response_parts(self) -> (Option<TypedValue>, Vec<ParameterBinding>) {
        (self.return_value, self.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::descriptor::DeploymentDescriptor;
    use crate::environment::ExecutionEnvironment;
    use crate::invocable::FnInvocable;
    use crate::rpc::BindingInfo;

    fn definition(bindings: Vec<(&str, BindingInfo)>) -> Arc<FunctionDefinition> {
        let descriptor = DeploymentDescriptor {
            id: "func-1".into(),
            name: "hello".into(),
            artifact_path: "app.jar".into(),
            library_directory: None,
            entry_point: "app.Handler.run".into(),
        };
        let bindings = bindings
            .into_iter()
            .map(|(name, info)| (name.to_string(), info))
            .collect();
        Arc::new(FunctionDefinition::new(
            &descriptor,
            bindings,
            Arc::new(FnInvocable::new()),
            Arc::new(ExecutionEnvironment::new("shared", Vec::new())),
        ))
    }

    fn request(input_data: Vec<ParameterBinding>) -> InvokeRequest {
        InvokeRequest {
            function_id: "func-1".into(),
            invocation_id: "inv-1".into(),
            input_data,
            trigger_metadata: HashMap::new(),
            trace_context: TraceContext::default(),
            retry_context: RetryContext {
                retry_count: 1,
                max_retry_count: 3,
                last_exception: Some("boom".into()),
            },
        }
    }

    #[test]
    fn test_undeclared_request_bindings_ignored() {
        let definition = definition(vec![("name", BindingInfo::input("httpTrigger"))]);
        let ctx = InvocationContext::build(
            request(vec![
                ParameterBinding::new("name", TypedValue::String("world".into())),
                ParameterBinding::new("surprise", TypedValue::String("ignored".into())),
            ]),
            "hello",
            definition,
            HashMap::new(),
        );

        assert!(ctx.input("name").is_some());
        assert!(ctx.input("surprise").is_none());
    }

    #[test]
    fn test_declared_binding_without_request_entry_absent() {
        let definition = definition(vec![
            ("name", BindingInfo::input("httpTrigger")),
            ("extra", BindingInfo::input("queueTrigger")),
        ]);
        let ctx = InvocationContext::build(
            request(vec![ParameterBinding::new(
                "name",
                TypedValue::String("world".into()),
            )]),
            "hello",
            definition,
            HashMap::new(),
        );

        assert!(ctx.input("extra").is_none());
    }

    #[test]
    fn test_retry_context_copied_verbatim() {
        let ctx = InvocationContext::build(
            request(Vec::new()),
            "hello",
            definition(Vec::new()),
            HashMap::new(),
        );
        assert_eq!(ctx.retry_context().retry_count, 1);
        assert_eq!(
            ctx.retry_context().last_exception.as_deref(),
            Some("boom")
        );
    }

    #[test]
    fn test_return_slot_write_once() {
        let mut ctx = InvocationContext::build(
            request(Vec::new()),
            "hello",
            definition(Vec::new()),
            HashMap::new(),
        );

        ctx.set_return_value(TypedValue::String("first".into()))
            .unwrap();
        let err = ctx
            .set_return_value(TypedValue::String("second".into()))
            .unwrap_err();
        assert!(matches!(err, WorkerError::Internal(_)));
        assert_eq!(ctx.return_value().unwrap().as_str(), Some("first"));
    }

    #[test]
    fn test_promotion_into_single_output() {
        let definition = definition(vec![
            ("name", BindingInfo::input("httpTrigger")),
            ("res", BindingInfo::output("http")),
        ]);
        let mut ctx =
            InvocationContext::build(request(Vec::new()), "hello", definition, HashMap::new());

        ctx.set_return_value(TypedValue::String("done".into()))
            .unwrap();
        ctx.promote_return_value();

        let (ret, outputs) = ctx.into_response_parts();
        assert_eq!(ret.unwrap().as_str(), Some("done"));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name, "res");
    }

    #[test]
    fn test_promotion_never_overwrites_explicit_output() {
        let definition = definition(vec![("res", BindingInfo::output("http"))]);
        let mut ctx =
            InvocationContext::build(request(Vec::new()), "hello", definition, HashMap::new());

        ctx.write_output("res", TypedValue::String("explicit".into()));
        ctx.set_return_value(TypedValue::String("implicit".into()))
            .unwrap();
        ctx.promote_return_value();

        let (_, outputs) = ctx.into_response_parts();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].data.as_str(), Some("explicit"));
    }

    #[test]
    fn test_no_promotion_without_outputs() {
        let definition = definition(vec![("name", BindingInfo::input("httpTrigger"))]);
        let mut ctx =
            InvocationContext::build(request(Vec::new()), "hello", definition, HashMap::new());

        ctx.set_return_value(TypedValue::String("done".into()))
            .unwrap();
        ctx.promote_return_value();

        let (ret, outputs) = ctx.into_response_parts();
        assert!(ret.is_some());
        assert!(outputs.is_empty());
    }
}
