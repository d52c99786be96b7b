use serde::{Deserialize, Serialize};

/// Parsed invocation flags for one script run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecFlags {
    /// Org username or alias.
    pub target_org: String,
    /// Script path exactly as the caller supplied it.
    pub script_file: String,
    /// API version override.
    pub api_version: Option<String>,
}

/// Normalized value returned by a script's `execute` function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptOutcome {
    pub success: bool,
    /// Present only when the script returned a non-empty message.
    pub message: Option<String>,
}

/// Structured result of a script run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptExecResult {
    /// The script path as supplied, never the resolved absolute path.
    pub executed_script: String,
    /// Id of the org the script ran against.
    pub target_org: String,
    pub success: bool,
    /// Summary line composed by the runner.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_message: Option<String>,
}

/// JSON document printed for a completed run under `--json`.
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope<'a> {
    pub status: i32,
    pub result: &'a ScriptExecResult,
    pub warnings: Vec<String>,
}

/// JSON document printed for a fatal error under `--json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status: i32,
    pub name: String,
    pub message: String,
    pub exit_code: i32,
}
