//! # Deployment Descriptor

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{WorkerError, WorkerResult};
use crate::rpc::DeploymentMetadata;

/// Dotted path with at least two segments, e.g. "app.orders.Handler.run"
const ENTRY_POINT_PATTERN: &str = r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)+$";

fn entry_point_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(ENTRY_POINT_PATTERN).unwrap_or_else(|err| {
            // The pattern is a constant; a parse failure is a build defect
            panic!("invalid entry point pattern: {err}")
        })
    })
}

/// Identifies one load request's artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    /// Opaque identifier, unique per process lifetime
    pub id: String,

    /// Display name used in responses and logs
    pub name: String,

    /// Primary loadable artifact
    pub artifact_path: PathBuf,

    /// Optional per-deployment library directory
    pub library_directory: Option<PathBuf>,

    /// Fully qualified entry point
    pub entry_point: String,
}

impl DeploymentDescriptor {
    pub fn from_metadata(function_id: impl Into<String>, metadata: DeploymentMetadata) -> Self {
        Self {
            id: function_id.into(),
            name: metadata.name,
            artifact_path: metadata.artifact_path,
            library_directory: metadata.library_directory,
            entry_point: metadata.entry_point,
        }
    }

    /// Validate before registration; failure must not mutate any state
    pub fn validate(&self) -> WorkerResult<()> {
        if self.id.trim().is_empty() {
            return Err(WorkerError::InvalidDescriptor("empty function id".into()));
        }
        if self.name.trim().is_empty() {
            return Err(WorkerError::InvalidDescriptor("empty function name".into()));
        }
        if self.artifact_path.as_os_str().is_empty() {
            return Err(WorkerError::InvalidDescriptor("empty artifact path".into()));
        }
        if !entry_point_regex().is_match(&self.entry_point) {
            return Err(WorkerError::InvalidDescriptor(format!(
                "unresolvable entry point: \"{}\"",
                self.entry_point
            )));
        }
        Ok(())
    }

    /// Entry point minus its final segment
    pub fn containing_type(&self) -> &str {
        match self.entry_point.rfind('.') {
            Some(split) => &self.entry_point[..split],
            None => &self.entry_point,
        }
    }

    /// Final segment of the entry point
    pub fn method_name(&self) -> &str {
        match self.entry_point.rfind('.') {
            Some(split) => &self.entry_point[split + 1..],
            None => &self.entry_point,
        }
    }
}
