//! # Function Broker
//!
//! The broker between the RPC boundary and loaded callable units: it
//! registers definitions, builds the invocation pipeline exactly once per
//! process, and drives each invocation request through the pipeline.
//! Thread-safe; loads and invocations may arrive concurrently.

pub mod definition;
pub mod descriptor;
pub mod registry;

pub use definition::FunctionDefinition;
pub use descriptor::DeploymentDescriptor;
pub use registry::FunctionRegistry;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::context::InvocationContext;
use crate::environment::{EnvironmentProvider, EnvironmentScope};
use crate::errors::{WorkerError, WorkerResult};
use crate::extensions::{DefaultInstanceFactory, ExtensionDiscovery};
use crate::invocable::InvocableLoader;
use crate::observability::{events, Logger};
use crate::pipeline::{InvocationChainFactory, MethodExecutor};
use crate::rpc::{
    BindingInfo, InvokeRequest, InvokeResponse, LoadRequest, LoadResponse, ParameterBinding,
    CURRENT_REQUEST_KEY,
};
use crate::values::TypedValue;

/// Result of a completed invocation, before response encoding
#[derive(Debug)]
pub struct InvocationOutcome {
    pub return_value: Option<TypedValue>,
    pub outputs: Vec<ParameterBinding>,
}

/// Registry owner and invocation orchestrator
pub struct FunctionBroker {
    registry: FunctionRegistry,
    environments: EnvironmentProvider,
    loader: Arc<dyn InvocableLoader>,
    discovery: Arc<dyn ExtensionDiscovery>,
    pipeline: OnceLock<Arc<InvocationChainFactory>>,
}

impl FunctionBroker {
    pub fn new(
        environments: EnvironmentProvider,
        loader: Arc<dyn InvocableLoader>,
        discovery: Arc<dyn ExtensionDiscovery>,
    ) -> Self {
        Self {
            registry: FunctionRegistry::new(),
            environments,
            loader,
            discovery,
            pipeline: OnceLock::new(),
        }
    }

    /// Validate and register one deployment
    ///
    /// A failed load leaves the registry untouched; the identifier never
    /// becomes invokable.
    pub fn register(
        &self,
        descriptor: DeploymentDescriptor,
        bindings: HashMap<String, BindingInfo>,
    ) -> WorkerResult<()> {
        descriptor.validate()?;
        let environment = self.environments.environment_for(&descriptor)?;
        self.pipeline();
        let invocable = self.loader.load(&descriptor, &environment)?;

        let definition = Arc::new(FunctionDefinition::new(
            &descriptor,
            bindings,
            invocable,
            environment,
        ));
        self.registry
            .insert(&descriptor.id, &descriptor.name, definition)?;

        Logger::info(
            events::FUNCTION_LOADED,
            &[
                ("id", descriptor.id.as_str()),
                ("name", descriptor.name.as_str()),
                ("entry_point", descriptor.entry_point.as_str()),
            ],
        );
        Ok(())
    }

    /// Invoke a registered function and extract its response
    pub async fn invoke(&self, id: &str, request: InvokeRequest) -> WorkerResult<InvocationOutcome> {
        let invocation_id = request.invocation_id.clone();
        let outcome = self.drive(id, request).await;
        match &outcome {
            Ok(_) => Logger::info(
                events::INVOCATION_COMPLETE,
                &[("id", id), ("invocation", invocation_id.as_str())],
            ),
            Err(err) => Logger::error(
                events::INVOCATION_FAILED,
                &[
                    ("id", id),
                    ("invocation", invocation_id.as_str()),
                    ("error", &err.to_string()),
                ],
            ),
        }
        outcome
    }

    async fn drive(&self, id: &str, request: InvokeRequest) -> WorkerResult<InvocationOutcome> {
        let (name, definition) = self.registry.lookup(id)?;
        let trigger_metadata = Self::reconcile_trigger_metadata(&request);
        let mut ctx = InvocationContext::build(request, name, definition, trigger_metadata);

        // A definition can only exist after a register call, which built
        // the pipeline; a missing pipeline here is a worker defect.
        let pipeline = self
            .pipeline
            .get()
            .ok_or_else(|| WorkerError::Internal("invocation pipeline not built".into()))?
            .clone();
        pipeline.create().do_next(&mut ctx).await?;

        if ctx.definition().implicit_output() {
            ctx.promote_return_value();
        }
        let (return_value, outputs) = ctx.into_response_parts();
        Ok(InvocationOutcome {
            return_value,
            outputs,
        })
    }

    /// Display name for an identifier, if registered
    pub fn method_name(&self, id: &str) -> Option<String> {
        self.registry.display_name(id)
    }

    /// Handle a load request, mapping the outcome to a response message
    pub fn handle_load(&self, request: LoadRequest) -> LoadResponse {
        let function_id = request.function_id.clone();
        let descriptor = DeploymentDescriptor::from_metadata(request.function_id, request.metadata);
        match self.register(descriptor, request.bindings) {
            Ok(()) => LoadResponse::success(function_id),
            Err(err) => {
                Logger::error(
                    events::FUNCTION_LOAD_FAILED,
                    &[("id", function_id.as_str()), ("error", &err.to_string())],
                );
                LoadResponse::failure(function_id, &err)
            }
        }
    }

    /// Handle an invocation request, mapping the outcome to a response
    pub async fn handle_invoke(&self, request: InvokeRequest) -> InvokeResponse {
        let function_id = request.function_id.clone();
        let invocation_id = request.invocation_id.clone();
        match self.invoke(&function_id, request).await {
            Ok(outcome) => {
                InvokeResponse::success(invocation_id, outcome.return_value, outcome.outputs)
            }
            Err(err) => InvokeResponse::failure(invocation_id, &err),
        }
    }

    /// Merge synthesized HTTP trigger metadata into the request's map
    ///
    /// The first input binding carrying an HTTP-shaped value is exposed
    /// under its own name and under the reserved current-request key.
    /// Explicit metadata always wins over synthesized entries.
    pub fn reconcile_trigger_metadata(request: &InvokeRequest) -> HashMap<String, TypedValue> {
        let mut metadata = request.trigger_metadata.clone();

        let http_binding = request
            .input_data
            .iter()
            .find(|binding| binding.data.is_http());
        if let Some(binding) = http_binding {
            if !metadata.contains_key(&binding.name) {
                metadata.insert(binding.name.clone(), binding.data.clone());
            }
            if !metadata.contains_key(CURRENT_REQUEST_KEY) {
                metadata.insert(CURRENT_REQUEST_KEY.to_string(), binding.data.clone());
            }
        }
        metadata
    }

    fn pipeline(&self) -> Arc<InvocationChainFactory> {
        self.pipeline
            .get_or_init(|| {
                // Discovery precedes knowledge of any deployment, so it
                // runs inside the worker-base environment.
                let _scope = EnvironmentScope::enter(self.environments.base_environment());
                let interceptors = self.discovery.interceptors();
                let instance_factory = self
                    .discovery
                    .instance_factory()
                    .unwrap_or_else(|| Arc::new(DefaultInstanceFactory));
                let chain = InvocationChainFactory::new(
                    interceptors,
                    Arc::new(MethodExecutor::new(instance_factory)),
                );
                Logger::info(
                    events::PIPELINE_READY,
                    &[("stages", &chain.stage_count().to_string())],
                );
                Arc::new(chain)
            })
            .clone()
    }
}
