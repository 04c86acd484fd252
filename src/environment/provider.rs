//! # Environment Provider
//!
//! Composes and caches execution environments. A deployment with its own
//! library directory gets a dedicated environment keyed by that directory;
//! deployments without one share a base environment that carries the
//! worker's required annotation library.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::broker::descriptor::DeploymentDescriptor;
use crate::errors::{WorkerError, WorkerResult};
use crate::observability::{Logger, events};

use super::ExecutionEnvironment;

/// Worker-owned base library directory, relative to the worker directory
pub const BASE_LIBRARY_DIR: &str = "lib";

/// Fixed relative path of the worker-provided annotation library
pub const ANNOTATION_LIBRARY_DIR: &str = "annotationLib";

/// Artifact-id fragment identifying the annotation library jar
pub const ANNOTATION_LIBRARY_NAME: &str = "worker-annotation-library";

/// Extension of loadable artifacts
const ARTIFACT_EXTENSION: &str = "jar";

/// Produces isolated execution environments for deployments
#[derive(Debug)]
pub struct EnvironmentProvider {
    worker_dir: PathBuf,

    /// Worker base libraries only; the pipeline discovery step runs here
    base: Arc<ExecutionEnvironment>,

    /// Shared environment for deployments without a library directory
    shared: RwLock<Option<Arc<ExecutionEnvironment>>>,

    /// Dedicated environments keyed by library-directory identity
    by_library_dir: RwLock<HashMap<PathBuf, Arc<ExecutionEnvironment>>>,
}

impl EnvironmentProvider {
    pub fn new(worker_dir: impl Into<PathBuf>) -> Self {
        let worker_dir = worker_dir.into();
        let base = Arc::new(ExecutionEnvironment::new(
            "base",
            vec![worker_dir.join(BASE_LIBRARY_DIR)],
        ));
        Self {
            worker_dir,
            base,
            shared: RwLock::new(None),
            by_library_dir: RwLock::new(HashMap::new()),
        }
    }

    /// The worker-base environment, without any deployment code
    pub fn base_environment(&self) -> Arc<ExecutionEnvironment> {
        self.base.clone()
    }

    /// Resolve (or reuse) the environment for a deployment
    ///
    /// Environments are cached by library-directory identity. Resolution
    /// failures are fatal for the load but not cached, so a later load can
    /// succeed once the missing library is installed.
    pub fn environment_for(
        &self,
        descriptor: &DeploymentDescriptor,
    ) -> WorkerResult<Arc<ExecutionEnvironment>> {
        match descriptor.library_directory.as_deref() {
            Some(dir) if dir.exists() => self.dedicated_environment(descriptor, dir),
            _ => self.shared_environment(),
        }
    }

    fn dedicated_environment(
        &self,
        descriptor: &DeploymentDescriptor,
        library_dir: &Path,
    ) -> WorkerResult<Arc<ExecutionEnvironment>> {
        {
            let cache = self
                .by_library_dir
                .read()
                .map_err(|_| WorkerError::Internal("Lock poisoned".into()))?;
            if let Some(environment) = cache.get(library_dir) {
                return Ok(environment.clone());
            }
        }

        let mut paths = vec![self.worker_dir.join(BASE_LIBRARY_DIR)];
        paths.push(descriptor.artifact_path.clone());
        paths.extend(list_artifacts(library_dir)?);

        let environment = Arc::new(ExecutionEnvironment::new(
            library_dir.display().to_string(),
            paths,
        ));
        Logger::info(
            events::ENVIRONMENT_READY,
            &[
                ("scope", environment.label()),
                ("paths", &environment.search_paths().len().to_string()),
            ],
        );

        let mut cache = self
            .by_library_dir
            .write()
            .map_err(|_| WorkerError::Internal("Lock poisoned".into()))?;
        // A racing load may have inserted first; reuse its environment
        Ok(cache
            .entry(library_dir.to_path_buf())
            .or_insert(environment)
            .clone())
    }

    fn shared_environment(&self) -> WorkerResult<Arc<ExecutionEnvironment>> {
        {
            let shared = self
                .shared
                .read()
                .map_err(|_| WorkerError::Internal("Lock poisoned".into()))?;
            if let Some(environment) = shared.as_ref() {
                return Ok(environment.clone());
            }
        }

        let annotation_library = self.annotation_library()?;
        let environment = Arc::new(ExecutionEnvironment::new(
            "shared",
            vec![self.worker_dir.join(BASE_LIBRARY_DIR), annotation_library],
        ));
        Logger::info(events::ENVIRONMENT_READY, &[("scope", "shared")]);

        let mut shared = self
            .shared
            .write()
            .map_err(|_| WorkerError::Internal("Lock poisoned".into()))?;
        Ok(shared.get_or_insert(environment).clone())
    }

    /// Locate the single required annotation library under the fixed path
    fn annotation_library(&self) -> WorkerResult<PathBuf> {
        let library_dir = self.worker_dir.join(ANNOTATION_LIBRARY_DIR);
        if !library_dir.exists() {
            return Err(WorkerError::MissingLibrary(format!(
                "location does not exist: {}",
                library_dir.display()
            )));
        }

        let candidates: Vec<PathBuf> = list_artifacts(&library_dir)?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.contains(ANNOTATION_LIBRARY_NAME))
            })
            .collect();

        match candidates.len() {
            0 => Err(WorkerError::MissingLibrary(format!(
                "no {} artifact under {}",
                ANNOTATION_LIBRARY_NAME,
                library_dir.display()
            ))),
            1 => Ok(candidates.into_iter().next().unwrap_or_default()),
            _ => Err(WorkerError::AmbiguousLibrary(format!(
                "{} candidates under {}",
                candidates.len(),
                library_dir.display()
            ))),
        }
    }
}

/// List loadable artifacts in a directory, in stable order
fn list_artifacts(directory: &Path) -> WorkerResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(directory).map_err(|err| {
        WorkerError::MissingLibrary(format!("{}: {}", directory.display(), err))
    })?;

    let mut artifacts: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == ARTIFACT_EXTENSION)
        })
        .collect();
    artifacts.sort();
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn descriptor(artifact: &Path, library_dir: Option<PathBuf>) -> DeploymentDescriptor {
        DeploymentDescriptor {
            id: "func-1".into(),
            name: "hello".into(),
            artifact_path: artifact.to_path_buf(),
            library_directory: library_dir,
            entry_point: "app.Handler.run".into(),
        }
    }

    fn worker_with_annotation_library() -> TempDir {
        let worker = TempDir::new().unwrap();
        let annotation_dir = worker.path().join(ANNOTATION_LIBRARY_DIR);
        std::fs::create_dir_all(&annotation_dir).unwrap();
        std::fs::write(
            annotation_dir.join(format!("{ANNOTATION_LIBRARY_NAME}-1.0.jar")),
            b"jar",
        )
        .unwrap();
        worker
    }

    #[test]
    fn test_shared_environment_reused() {
        let worker = worker_with_annotation_library();
        let provider = EnvironmentProvider::new(worker.path());

        let artifact = worker.path().join("app.jar");
        let first = provider
            .environment_for(&descriptor(&artifact, None))
            .unwrap();
        let second = provider
            .environment_for(&descriptor(&artifact, None))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.label(), "shared");
    }

    #[test]
    fn test_missing_annotation_library() {
        let worker = TempDir::new().unwrap();
        let provider = EnvironmentProvider::new(worker.path());

        let artifact = worker.path().join("app.jar");
        let err = provider
            .environment_for(&descriptor(&artifact, None))
            .unwrap_err();
        assert!(matches!(err, WorkerError::MissingLibrary(_)));
    }

    #[test]
    fn test_ambiguous_annotation_library() {
        let worker = worker_with_annotation_library();
        let annotation_dir = worker.path().join(ANNOTATION_LIBRARY_DIR);
        std::fs::write(
            annotation_dir.join(format!("{ANNOTATION_LIBRARY_NAME}-2.0.jar")),
            b"jar",
        )
        .unwrap();

        let provider = EnvironmentProvider::new(worker.path());
        let artifact = worker.path().join("app.jar");
        let err = provider
            .environment_for(&descriptor(&artifact, None))
            .unwrap_err();
        assert!(matches!(err, WorkerError::AmbiguousLibrary(_)));
    }

    #[test]
    fn test_dedicated_environment_composition() {
        let worker = TempDir::new().unwrap();
        let deployment = TempDir::new().unwrap();
        let library_dir = deployment.path().join("lib");
        std::fs::create_dir_all(&library_dir).unwrap();
        std::fs::write(library_dir.join("b-dep.jar"), b"jar").unwrap();
        std::fs::write(library_dir.join("a-dep.jar"), b"jar").unwrap();
        std::fs::write(library_dir.join("notes.txt"), b"skip").unwrap();

        let artifact = deployment.path().join("app.jar");
        let provider = EnvironmentProvider::new(worker.path());
        let environment = provider
            .environment_for(&descriptor(&artifact, Some(library_dir.clone())))
            .unwrap();

        let paths = environment.search_paths();
        assert_eq!(paths[0], worker.path().join(BASE_LIBRARY_DIR));
        assert_eq!(paths[1], artifact);
        // Directory artifacts are sorted; non-artifacts are skipped
        assert_eq!(paths[2], library_dir.join("a-dep.jar"));
        assert_eq!(paths[3], library_dir.join("b-dep.jar"));
        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn test_dedicated_environment_cached_by_library_dir() {
        let worker = TempDir::new().unwrap();
        let deployment = TempDir::new().unwrap();
        let library_dir = deployment.path().join("lib");
        std::fs::create_dir_all(&library_dir).unwrap();

        let artifact = deployment.path().join("app.jar");
        let provider = EnvironmentProvider::new(worker.path());

        let first = provider
            .environment_for(&descriptor(&artifact, Some(library_dir.clone())))
            .unwrap();
        let second = provider
            .environment_for(&descriptor(&artifact, Some(library_dir)))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_library_dir_falls_back_to_shared() {
        let worker = worker_with_annotation_library();
        let provider = EnvironmentProvider::new(worker.path());

        let artifact = worker.path().join("app.jar");
        let gone = worker.path().join("no-such-lib");
        let environment = provider
            .environment_for(&descriptor(&artifact, Some(gone)))
            .unwrap();
        assert_eq!(environment.label(), "shared");
    }
}
