//! # Observability
//!
//! Structured logging for the worker core. Logging is read-only with
//! respect to execution: no side effects, no background threads.

pub mod logger;

pub use logger::{Logger, Severity};

/// Worker lifecycle event names
pub mod events {
    /// A function definition was registered
    pub const FUNCTION_LOADED: &str = "FUNCTION_LOADED";

    /// A load request was rejected
    pub const FUNCTION_LOAD_FAILED: &str = "FUNCTION_LOAD_FAILED";

    /// The invocation pipeline was built (once per process)
    pub const PIPELINE_READY: &str = "PIPELINE_READY";

    /// An execution environment was composed
    pub const ENVIRONMENT_READY: &str = "ENVIRONMENT_READY";

    /// An invocation completed successfully
    pub const INVOCATION_COMPLETE: &str = "INVOCATION_COMPLETE";

    /// An invocation failed
    pub const INVOCATION_FAILED: &str = "INVOCATION_FAILED";
}
