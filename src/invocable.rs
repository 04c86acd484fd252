//! # Invocable Capability
//!
//! The seam between the execution core and the platform's dynamic-loading
//! facility. The resolver and executor depend only on [`Invocable`]; how a
//! callable unit is physically located and dispatched is the loader's
//! concern.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::broker::descriptor::DeploymentDescriptor;
use crate::environment::ExecutionEnvironment;
use crate::errors::{WorkerError, WorkerResult};
use crate::extensions::LazyInstance;
use crate::values::TypedValue;

/// Expected shape of a resolved parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    String,
    Bytes,
    Json,
    Http,
    Collection,
    /// Accepts any populated value unchanged
    Any,
}

/// One declared parameter of a candidate signature
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub shape: ValueShape,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, shape: ValueShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// A candidate signature of a callable unit
///
/// A unit may expose several candidates (overload-style); the resolver
/// picks the first one whose parameters all resolve.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub parameters: Vec<ParameterSpec>,
}

impl Signature {
    pub fn new(parameters: Vec<ParameterSpec>) -> Self {
        Self { parameters }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A dynamically dispatched callable unit
pub trait Invocable: Send + Sync {
    /// Candidate signatures in declaration order
    fn signatures(&self) -> &[Signature];

    /// Invoke the chosen candidate with fully resolved arguments
    ///
    /// `instance` constructs the containing unit on first use; callables
    /// that need no instance never touch it.
    fn invoke(
        &self,
        signature: usize,
        instance: &LazyInstance<'_>,
        arguments: Vec<TypedValue>,
    ) -> WorkerResult<TypedValue>;
}

impl std::fmt::Debug for dyn Invocable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocable").finish_non_exhaustive()
    }
}

/// Loads the callable unit a descriptor points at, inside its environment
pub trait InvocableLoader: Send + Sync {
    fn load(
        &self,
        descriptor: &DeploymentDescriptor,
        environment: &Arc<ExecutionEnvironment>,
    ) -> WorkerResult<Arc<dyn Invocable>>;
}

type InvocableFn =
    dyn Fn(&LazyInstance<'_>, Vec<TypedValue>) -> WorkerResult<TypedValue> + Send + Sync;

/// An [`Invocable`] backed by closures, one per candidate signature
///
/// The in-process analogue of reflective dispatch, used by the static
/// loader and by tests.
pub struct FnInvocable {
    candidates: Vec<(Signature, Box<InvocableFn>)>,
    signatures: Vec<Signature>,
}

impl FnInvocable {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Append a candidate signature and its body
    pub fn candidate<F>(mut self, signature: Signature, body: F) -> Self
    where
        F: Fn(&LazyInstance<'_>, Vec<TypedValue>) -> WorkerResult<TypedValue>
            + Send
            + Sync
            + 'static,
    {
        self.signatures.push(signature.clone());
        self.candidates.push((signature, Box::new(body)));
        self
    }
}

impl Default for FnInvocable {
    fn default() -> Self {
        Self::new()
    }
}

impl Invocable for FnInvocable {
    fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    fn invoke(
        &self,
        signature: usize,
        instance: &LazyInstance<'_>,
        arguments: Vec<TypedValue>,
    ) -> WorkerResult<TypedValue> {
        let (_, body) = self.candidates.get(signature).ok_or_else(|| {
            WorkerError::Internal(format!("no candidate signature at index {signature}"))
        })?;
        body(instance, arguments)
    }
}

/// Loader over a fixed entry-point table
///
/// Deployments whose code is linked into the worker register their
/// invocables here; `load` then resolves by fully qualified entry point.
#[derive(Default)]
pub struct StaticLoader {
    by_entry_point: RwLock<HashMap<String, Arc<dyn Invocable>>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(&self, entry_point: impl Into<String>, invocable: Arc<dyn Invocable>) {
        if let Ok(mut table) = self.by_entry_point.write() {
            table.insert(entry_point.into(), invocable);
        }
    }
}

impl InvocableLoader for StaticLoader {
    fn load(
        &self,
        descriptor: &DeploymentDescriptor,
        _environment: &Arc<ExecutionEnvironment>,
    ) -> WorkerResult<Arc<dyn Invocable>> {
        let table = self
            .by_entry_point
            .read()
            .map_err(|_| WorkerError::Internal("Lock poisoned".into()))?;
        table.get(&descriptor.entry_point).cloned().ok_or_else(|| {
            WorkerError::InvalidDescriptor(format!(
                "entry point not loadable: {}",
                descriptor.entry_point
            ))
        })
    }
}
