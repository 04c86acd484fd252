//! # Function Registry

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::{WorkerError, WorkerResult};

use super::definition::FunctionDefinition;

/// Registry of loaded function definitions
///
/// Read-mostly: invocations look up concurrently while loads insert. An
/// insert for one identifier never blocks lookups of another beyond the
/// write-lock hold of the single map update. Re-inserting the same
/// identifier overwrites, which makes repeated loads idempotent.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    by_id: RwLock<HashMap<String, (String, Arc<FunctionDefinition>)>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its identifier
    pub fn insert(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        definition: Arc<FunctionDefinition>,
    ) -> WorkerResult<()> {
        let mut by_id = self
            .by_id
            .write()
            .map_err(|_| WorkerError::Internal("Lock poisoned".into()))?;
        by_id.insert(id.into(), (name.into(), definition));
        Ok(())
    }

    /// Look up a definition and its display name
    pub fn lookup(&self, id: &str) -> WorkerResult<(String, Arc<FunctionDefinition>)> {
        let by_id = self
            .by_id
            .read()
            .map_err(|_| WorkerError::Internal("Lock poisoned".into()))?;
        by_id
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::UnknownFunction(id.to_string()))
    }

    /// Display name for an identifier, if registered
    pub fn display_name(&self, id: &str) -> Option<String> {
        self.by_id
            .read()
            .ok()
            .and_then(|by_id| by_id.get(id).map(|(name, _)| name.clone()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id
            .read()
            .map(|by_id| by_id.contains_key(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.by_id.read().map(|by_id| by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::broker::descriptor::DeploymentDescriptor;
    use crate::environment::ExecutionEnvironment;
    use crate::invocable::FnInvocable;

    fn definition(id: &str) -> Arc<FunctionDefinition> {
        let descriptor = DeploymentDescriptor {
            id: id.into(),
            name: "hello".into(),
            artifact_path: "app.jar".into(),
            library_directory: None,
            entry_point: "app.Handler.run".into(),
        };
        Arc::new(FunctionDefinition::new(
            &descriptor,
            HashMap::new(),
            Arc::new(FnInvocable::new()),
            Arc::new(ExecutionEnvironment::new("shared", Vec::new())),
        ))
    }

    #[test]
    fn test_insert_and_lookup() {
        let registry = FunctionRegistry::new();
        registry
            .insert("func-1", "hello", definition("func-1"))
            .unwrap();

        let (name, found) = registry.lookup("func-1").unwrap();
        assert_eq!(name, "hello");
        assert_eq!(found.id(), "func-1");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        let err = registry.lookup("missing-1").unwrap_err();
        assert!(matches!(err, WorkerError::UnknownFunction(_)));
        assert!(err.to_string().contains("missing-1"));
    }

    #[test]
    fn test_reinsert_same_id_overwrites() {
        let registry = FunctionRegistry::new();
        registry
            .insert("func-1", "hello", definition("func-1"))
            .unwrap();
        registry
            .insert("func-1", "hello-v2", definition("func-1"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.display_name("func-1").as_deref(), Some("hello-v2"));
    }

    #[test]
    fn test_concurrent_lookup_during_insert() {
        let registry = Arc::new(FunctionRegistry::new());
        registry
            .insert("stable", "stable", definition("stable"))
            .unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        registry.lookup("stable").unwrap();
                    }
                })
            })
            .collect();

        for i in 0..100 {
            let id = format!("func-{i}");
            registry.insert(&id, &id, definition(&id)).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.len(), 101);
    }
}
