//! `plugkit` Runtime: handshake, gRPC service surface, dispatch, and lifecycle
//! for plugin processes.
//!
//! A plugin binary builds a [`Plugin`], registers its resolvers, handlers,
//! and health probes, and hands it to [`run`]:
//!
//! ```no_run
//! use plugkit_core::{TypeDescriptor, FieldDescriptor, Value};
//! use plugkit_runtime::{Args, Context, Plugin};
//!
//! fn main() -> std::process::ExitCode {
//!     let mut plugin = Plugin::new("hello", "0.1.0");
//!     plugin.register_query(
//!         "hello",
//!         FieldDescriptor::new(TypeDescriptor::string()),
//!         |_ctx: Context, _args: Args| async move { anyhow::Ok(Value::from("world")) },
//!     );
//!     plugkit_runtime::run(plugin)
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod handler;
pub mod health;
pub mod host;
pub mod lifecycle;
pub mod middleware;
pub mod network;
pub mod operation;
pub mod plugin;
pub mod proto;
pub mod registry;
pub mod service;
pub mod telemetry;

pub use config::{LogFormat, PluginInfo, RuntimeConfig};
pub use dispatch::Dispatcher;
pub use handler::{Args, Context, Handler, HealthProbe, SharedHandler, SharedProbe};
pub use host::{HostCall, HostClient};
pub use operation::{ExecutionError, Invocation, OperationKind};
pub use plugin::{run, Plugin};
pub use registry::SchemaRegistry;
