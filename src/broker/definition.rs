//! # Function Definition
//!
//! The registered, resolved form of a deployment descriptor. Built once at
//! load time, immutable afterwards, looked up (never mutated) during
//! invocation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::environment::ExecutionEnvironment;
use crate::invocable::Invocable;
use crate::rpc::{BindingInfo, RETURN_BINDING};

use super::descriptor::DeploymentDescriptor;

/// A registered callable unit
pub struct FunctionDefinition {
    id: String,
    name: String,
    containing_type: String,
    method_name: String,
    bindings: HashMap<String, BindingInfo>,
    invocable: Arc<dyn Invocable>,
    environment: Arc<ExecutionEnvironment>,
    loaded_at: DateTime<Utc>,
}

impl FunctionDefinition {
    pub fn new(
        descriptor: &DeploymentDescriptor,
        bindings: HashMap<String, BindingInfo>,
        invocable: Arc<dyn Invocable>,
        environment: Arc<ExecutionEnvironment>,
    ) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            containing_type: descriptor.containing_type().to_string(),
            method_name: descriptor.method_name().to_string(),
            bindings,
            invocable,
            environment,
            loaded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn containing_type(&self) -> &str {
        &self.containing_type
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn bindings(&self) -> &HashMap<String, BindingInfo> {
        &self.bindings
    }

    pub fn invocable(&self) -> &dyn Invocable {
        self.invocable.as_ref()
    }

    pub fn environment(&self) -> &Arc<ExecutionEnvironment> {
        &self.environment
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Whether a declared binding accepts request input under `name`
    pub fn declares_input(&self, name: &str) -> bool {
        self.bindings
            .get(name)
            .is_some_and(|binding| binding.direction.is_input())
    }

    fn output_names(&self) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .filter(|(_, binding)| binding.direction.is_output())
            .map(|(name, _)| name.as_str())
    }

    /// A unit with exactly one declared output binding carries its return
    /// value implicitly in that binding.
    pub fn implicit_output(&self) -> bool {
        self.output_names().count() == 1
    }

    /// Name of the implicit output binding, if the unit has one
    ///
    /// The reserved return binding is preferred when several outputs tie
    /// only in pathological metadata; normal definitions have at most one.
    pub fn implicit_output_name(&self) -> Option<&str> {
        let mut names: Vec<&str> = self.output_names().collect();
        names.sort_by_key(|name| *name != RETURN_BINDING);
        match names.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }
}

impl std::fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("containing_type", &self.containing_type)
            .field("method_name", &self.method_name)
            .field("environment", &self.environment.label())
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}
