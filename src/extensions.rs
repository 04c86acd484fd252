//! # Extension Points
//!
//! Discovery of interceptors and the instance factory is owned by the
//! surrounding process; the core consumes it as an injected dependency and
//! runs it exactly once, inside the shared base environment.

use std::any::Any;
use std::cell::OnceCell;
use std::sync::Arc;

use crate::errors::WorkerResult;
use crate::pipeline::Middleware;

/// An instance of a containing unit, opaque to the core
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Constructs instances of containing units
///
/// Whether instances are cached across invocations is the factory's
/// policy; the core never caches them itself.
pub trait InstanceFactory: Send + Sync {
    fn create(&self, type_name: &str) -> WorkerResult<Instance>;
}

/// Fallback factory: a fresh, stateless instance per construction
pub struct DefaultInstanceFactory;

impl InstanceFactory for DefaultInstanceFactory {
    fn create(&self, _type_name: &str) -> WorkerResult<Instance> {
        Ok(Arc::new(()))
    }
}

/// Deferred instance handle passed to an invocation
///
/// Construction happens on the first `get` and the instance is held for
/// the rest of the invocation; callables that never need an instance
/// never trigger it. A failed construction is not held, so a later `get`
/// retries the factory.
pub struct LazyInstance<'a> {
    factory: &'a dyn InstanceFactory,
    type_name: &'a str,
    constructed: OnceCell<Instance>,
}

impl<'a> LazyInstance<'a> {
    pub fn new(factory: &'a dyn InstanceFactory, type_name: &'a str) -> Self {
        Self {
            factory,
            type_name,
            constructed: OnceCell::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub fn get(&self) -> WorkerResult<Instance> {
        if let Some(instance) = self.constructed.get() {
            return Ok(instance.clone());
        }
        let instance = self.factory.create(self.type_name)?;
        Ok(self.constructed.get_or_init(|| instance).clone())
    }
}

/// Process-wide extension discovery, supplied at startup
pub trait ExtensionDiscovery: Send + Sync {
    /// Interceptors in stable discovery order
    fn interceptors(&self) -> Vec<Arc<dyn Middleware>>;

    /// At most one custom instance factory; `None` selects the default
    fn instance_factory(&self) -> Option<Arc<dyn InstanceFactory>> {
        None
    }
}

/// Discovery that finds nothing: no interceptors, default factory
pub struct NoExtensions;

impl ExtensionDiscovery for NoExtensions {
    fn interceptors(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }
}
