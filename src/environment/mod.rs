//! # Execution Environments
//!
//! One isolated loading/execution environment per deployment. An
//! environment is a finalized set of search paths; the physical isolation
//! mechanism belongs to the platform's dynamic-loading facility. The
//! thread-active environment is swapped around each method execution and
//! restored by a scope guard on every exit path.

pub mod provider;

pub use provider::EnvironmentProvider;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An isolated loading/execution environment
///
/// Search paths are finalized at construction and never mutated; the
/// environment is shared read-only across all invocations of units from
/// the same deployment.
#[derive(Debug, PartialEq)]
pub struct ExecutionEnvironment {
    label: String,
    search_paths: Vec<PathBuf>,
}

impl ExecutionEnvironment {
    pub fn new(label: impl Into<String>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            label: label.into(),
            search_paths,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.search_paths.iter().any(|p| p == path)
    }
}

thread_local! {
    static ACTIVE_ENVIRONMENT: RefCell<Option<Arc<ExecutionEnvironment>>> =
        const { RefCell::new(None) };
}

/// The environment active on the current thread, if any
pub fn active_environment() -> Option<Arc<ExecutionEnvironment>> {
    ACTIVE_ENVIRONMENT.with(|slot| slot.borrow().clone())
}

/// Scope guard that activates an environment on the current thread
///
/// The previous environment is restored when the guard drops, so
/// restoration holds on success, declared failure and unwind alike.
pub struct EnvironmentScope {
    previous: Option<Arc<ExecutionEnvironment>>,
}

impl EnvironmentScope {
    pub fn enter(environment: Arc<ExecutionEnvironment>) -> Self {
        let previous = ACTIVE_ENVIRONMENT
            .with(|slot| slot.borrow_mut().replace(environment));
        Self { previous }
    }
}

impl Drop for EnvironmentScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_ENVIRONMENT.with(|slot| {
            *slot.borrow_mut() = previous;
        });
    }
}
