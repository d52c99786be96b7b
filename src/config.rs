//! Environment-driven configuration.
//!
//! Every setting is optional. Unset or empty variables fall back to the
//! defaults documented on each field.

use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, ScriptExecError};

/// Directory holding org auth files, overriding `$HOME/.sfdx`.
pub const STATE_DIR_VAR: &str = "SF_STATE_DIR";
/// API version used when `--api-version` is not given.
pub const API_VERSION_VAR: &str = "SF_ORG_API_VERSION";
/// `tracing` filter directive for diagnostic logging.
pub const LOG_VAR: &str = "SCRIPT_EXEC_LOG";

/// API version used when neither the flag, the environment, nor the auth
/// file names one.
pub const DEFAULT_API_VERSION: &str = "62.0";

/// Default diagnostic log filter.
pub const DEFAULT_LOG_FILTER: &str = "warn";

static API_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2,3}\.0$").expect("api version regex"));

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory containing `<username>.json` auth files and `alias.json`.
    pub state_dir: PathBuf,
    /// API version override from the environment.
    pub api_version: Option<String>,
    /// Diagnostic log filter directive.
    pub log_filter: String,
}

impl Config {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let state_dir = match get(STATE_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => default_state_dir()?,
        };

        let api_version = match get(API_VERSION_VAR) {
            Some(v) if !is_valid_api_version(&v) => {
                return Err(ScriptExecError::Config {
                    message: format!("{API_VERSION_VAR} must look like '62.0', got '{v}'"),
                });
            }
            other => other,
        };

        let log_filter = get(LOG_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            state_dir,
            api_version,
            log_filter,
        })
    }
}

fn default_state_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".sfdx"))
        .ok_or_else(|| ScriptExecError::Config {
            message: format!("cannot determine home directory; set {STATE_DIR_VAR}"),
        })
}

/// Returns `true` for API versions of the form `NN.0` or `NNN.0`.
#[must_use]
pub fn is_valid_api_version(version: &str) -> bool {
    API_VERSION_RE.is_match(version)
}
