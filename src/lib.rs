//! funcbroker - execution core for an RPC-driven function worker
//!
//! Registers dynamically loaded callable units, builds the invocation
//! pipeline once per process, resolves request payloads into call
//! arguments and marshals results back into the wire shape. The wire
//! protocol, process bootstrap and artifact packaging live outside this
//! crate; [`broker::FunctionBroker`] is the public surface they talk to.

pub mod broker;
pub mod context;
pub mod environment;
pub mod errors;
pub mod extensions;
pub mod invocable;
pub mod observability;
pub mod pipeline;
pub mod resolver;
pub mod rpc;
pub mod values;

pub use broker::{DeploymentDescriptor, FunctionBroker, FunctionRegistry, InvocationOutcome};
pub use context::InvocationContext;
pub use environment::{EnvironmentProvider, ExecutionEnvironment};
pub use errors::{WorkerError, WorkerResult};
pub use values::{HttpValue, TypedValue};
