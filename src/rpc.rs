//! # Request/Response Message Model
//!
//! The messages exchanged with the orchestrator, as seen by the execution
//! core. Encoding and framing belong to the transport layer; this module
//! only defines the shapes the broker consumes and produces.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::WorkerError;
use crate::values::TypedValue;

/// Reserved binding name for a callable's return value
pub const RETURN_BINDING: &str = "$return";

/// Reserved trigger-metadata key for the current HTTP request
pub const CURRENT_REQUEST_KEY: &str = "$request";

/// Direction of a declared binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    pub fn is_input(&self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

/// Declared data type of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Undefined,
    String,
    Binary,
}

/// Binding metadata supplied with a load request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingInfo {
    pub direction: Direction,

    #[serde(default)]
    pub data_type: DataType,

    /// Binding kind as declared by the host, e.g. "httpTrigger" or "queue"
    #[serde(default)]
    pub binding_type: String,
}

impl BindingInfo {
    pub fn input(binding_type: impl Into<String>) -> Self {
        Self {
            direction: Direction::In,
            data_type: DataType::Undefined,
            binding_type: binding_type.into(),
        }
    }

    pub fn output(binding_type: impl Into<String>) -> Self {
        Self {
            direction: Direction::Out,
            data_type: DataType::Undefined,
            binding_type: binding_type.into(),
        }
    }
}

/// A named value in a request or response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub name: String,
    pub data: TypedValue,
}

impl ParameterBinding {
    pub fn new(name: impl Into<String>, data: TypedValue) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Distributed trace context copied verbatim into each invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceContext {
    #[serde(default)]
    pub trace_parent: String,

    #[serde(default)]
    pub trace_state: String,

    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Retry state threaded through each invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryContext {
    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub max_retry_count: u32,

    /// Descriptor of the last failure, absent on the first attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_exception: Option<String>,
}

/// Deployment metadata carried by a load request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentMetadata {
    pub name: String,

    /// Fully qualified entry point, e.g. "app.orders.Handler.run"
    pub entry_point: String,

    /// Primary loadable artifact
    pub artifact_path: PathBuf,

    /// Optional per-deployment library directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_directory: Option<PathBuf>,
}

/// Request to register one unit of loadable code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRequest {
    pub function_id: String,
    pub metadata: DeploymentMetadata,

    #[serde(default)]
    pub bindings: HashMap<String, BindingInfo>,
}

/// Request to invoke a registered unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub function_id: String,
    pub invocation_id: String,

    /// Input bindings in request order
    #[serde(default)]
    pub input_data: Vec<ParameterBinding>,

    #[serde(default)]
    pub trigger_metadata: HashMap<String, TypedValue>,

    #[serde(default)]
    pub trace_context: TraceContext,

    #[serde(default)]
    pub retry_context: RetryContext,
}

impl InvokeRequest {
    /// New empty request with a fresh invocation id
    pub fn new(function_id: impl Into<String>) -> Self {
        Self {
            function_id: function_id.into(),
            invocation_id: uuid::Uuid::new_v4().to_string(),
            input_data: Vec::new(),
            trigger_metadata: HashMap::new(),
            trace_context: TraceContext::default(),
            retry_context: RetryContext::default(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, data: TypedValue) -> Self {
        self.input_data.push(ParameterBinding::new(name, data));
        self
    }
}

/// Outcome status of a load or invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// Response to a load request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub function_id: String,
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoadResponse {
    pub fn success(function_id: impl Into<String>) -> Self {
        Self {
            function_id: function_id.into(),
            status: Status::Success,
            error: None,
        }
    }

    pub fn failure(function_id: impl Into<String>, error: &WorkerError) -> Self {
        Self {
            function_id: function_id.into(),
            status: Status::Failure,
            error: Some(error.to_string()),
        }
    }
}

/// Response to an invocation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub invocation_id: String,
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<TypedValue>,

    #[serde(default)]
    pub output_data: Vec<ParameterBinding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvokeResponse {
    pub fn success(
        invocation_id: impl Into<String>,
        return_value: Option<TypedValue>,
        output_data: Vec<ParameterBinding>,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            status: Status::Success,
            return_value,
            output_data,
            error: None,
        }
    }

    pub fn failure(invocation_id: impl Into<String>, error: &WorkerError) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            status: Status::Failure,
            return_value: None,
            output_data: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}
