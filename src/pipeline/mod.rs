//! # Invocation Pipeline
//!
//! An ordered middleware chain built once per process, terminating in the
//! fixed method-execution stage. Each invocation traverses the immutable
//! stage sequence through its own cursor, so concurrent invocations never
//! interfere.

pub mod executor;

pub use executor::MethodExecutor;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::InvocationContext;
use crate::errors::{WorkerError, WorkerResult};

/// Stage outcome future, boxed because stages are trait objects
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = WorkerResult<()>> + Send + 'a>>;

/// One stage of the invocation pipeline
///
/// A well-behaved interceptor calls `chain.do_next(ctx)` at most once;
/// not calling it short-circuits the rest of the chain. The terminal
/// stage never calls it.
pub trait Middleware: Send + Sync {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        chain: &'a mut ChainCursor,
    ) -> StageFuture<'a>;
}

/// The immutable stage sequence, shared by all invocations
pub struct InvocationChainFactory {
    stages: Arc<Vec<Arc<dyn Middleware>>>,
}

impl InvocationChainFactory {
    /// Interceptors in discovery order, then the fixed terminal stage
    pub fn new(interceptors: Vec<Arc<dyn Middleware>>, terminal: Arc<dyn Middleware>) -> Self {
        let mut stages = interceptors;
        stages.push(terminal);
        Self {
            stages: Arc::new(stages),
        }
    }

    /// Stage count including the terminal stage
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// A fresh traversal cursor for one invocation
    pub fn create(&self) -> ChainCursor {
        ChainCursor {
            stages: self.stages.clone(),
            next: 0,
            active: None,
        }
    }
}

/// Traversal cursor over the stage sequence, owned by one invocation
pub struct ChainCursor {
    stages: Arc<Vec<Arc<dyn Middleware>>>,
    next: usize,
    /// Index of the stage currently executing, `None` at the top level
    active: Option<usize>,
}

impl ChainCursor {
    /// Dispatch the next stage
    ///
    /// A call from stage depth `d` is legal only while the cursor has
    /// dispatched exactly `d + 1` stages; a second call from the same
    /// stage, whether the rest of the chain ran or short-circuited, is
    /// a fatal contract violation.
    pub fn do_next<'a>(&'a mut self, ctx: &'a mut InvocationContext) -> StageFuture<'a> {
        Box::pin(async move {
            let caller = self.active;
            let index = caller.map_or(0, |depth| depth + 1);
            if self.next != index {
                return Err(WorkerError::PipelineMisuse(
                    "continuation called twice by the same stage".into(),
                ));
            }
            let stage = match self.stages.get(index) {
                Some(stage) => stage.clone(),
                None => {
                    return Err(WorkerError::PipelineMisuse(
                        "continuation called after the chain completed".into(),
                    ))
                }
            };
            self.next = index + 1;
            self.active = Some(index);
            let result = stage.handle(&mut *ctx, &mut *self).await;
            self.active = caller;
            result
        })
    }
}
