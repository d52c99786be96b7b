use thiserror::Error;

/// Errors that abort a script run.
///
/// Failures raised by the script's `execute` function are not represented
/// here; they are captured into the run result instead.
#[derive(Error, Debug)]
pub enum ScriptExecError {
    /// No auth file exists for the requested org.
    #[error("no authorization information found for {org}")]
    OrgNotFound { org: String },

    /// An auth file exists but cannot yield a usable connection.
    #[error("cannot authenticate to {org}: {message}")]
    OrgAuth { org: String, message: String },

    /// The script could not be read, compiled, or its top level failed.
    #[error("failed to load script '{path}': {message}")]
    ScriptLoad { path: String, message: String },

    /// The loaded script has no `execute(conn)` function.
    #[error("the script '{path}' does not export an execute function")]
    ScriptMissingExecute { path: String },

    /// Invalid configuration value.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScriptExecError {
    /// Stable error name reported in the `--json` envelope.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrgNotFound { .. } => "OrgNotFoundError",
            Self::OrgAuth { .. } => "OrgAuthError",
            Self::ScriptLoad { .. } => "ScriptLoadError",
            Self::ScriptMissingExecute { .. } => "ScriptMissingExecuteError",
            Self::Config { .. } => "ConfigError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
        }
    }
}

/// Errors from a REST call made through a [`Connection`](crate::Connection).
#[derive(Error, Debug)]
pub enum RequestError {
    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Transport(String),

    /// The org answered with a non-2xx status.
    #[error("{status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The request path or URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Unsupported HTTP method name.
    #[error("unsupported HTTP method '{0}'")]
    Method(String),
}

/// Convenience alias for `Result<T, ScriptExecError>`.
pub type Result<T> = std::result::Result<T, ScriptExecError>;
