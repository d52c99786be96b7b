pub mod config;
pub mod connection;
pub mod errors;
pub mod fs_util;
pub mod models;
pub mod org;
pub mod runner;
pub mod script;

// Re-export key types at crate root for convenience.
pub use config::Config;
pub use connection::{Connection, Method, Transport, UreqTransport};
pub use errors::{RequestError, Result, ScriptExecError};
pub use models::{ExecFlags, ScriptExecResult, ScriptOutcome};
pub use org::{AuthFileStore, OrgResolver};
pub use runner::{ConsoleSink, OutputSink, ScriptRunner};
pub use script::{LoadedScript, ScriptHost};
