//! # Method Executor
//!
//! The fixed terminal stage: activates the definition's environment,
//! resolves arguments, invokes the callable and records the return value.
//! The prior environment is restored on every exit path.

use std::sync::Arc;

use crate::context::InvocationContext;
use crate::environment::EnvironmentScope;
use crate::errors::{WorkerError, WorkerResult};
use crate::extensions::{InstanceFactory, LazyInstance};
use crate::resolver::resolve_arguments;

use super::{ChainCursor, Middleware, StageFuture};

/// Terminal pipeline stage that runs the target callable
pub struct MethodExecutor {
    instance_factory: Arc<dyn InstanceFactory>,
}

impl MethodExecutor {
    pub fn new(instance_factory: Arc<dyn InstanceFactory>) -> Self {
        Self { instance_factory }
    }

    fn execute(&self, ctx: &mut InvocationContext) -> WorkerResult<()> {
        let definition = ctx.definition().clone();

        // Restoration is the guard's destructor, so it holds on every
        // exit path below. No await happens while the guard is live.
        let _scope = EnvironmentScope::enter(definition.environment().clone());

        let call = resolve_arguments(ctx, definition.invocable())?;
        let instance = LazyInstance::new(
            self.instance_factory.as_ref(),
            definition.containing_type(),
        );
        let value = definition
            .invocable()
            .invoke(call.signature, &instance, call.arguments)
            .map_err(|err| WorkerError::InvocationFailure(err.to_string()))?;
        ctx.set_return_value(value)
    }
}

impl Middleware for MethodExecutor {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        _chain: &'a mut ChainCursor,
    ) -> StageFuture<'a> {
        Box::pin(async move { self.execute(ctx) })
    }
}
