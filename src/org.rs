//! Org resolution from the file-based credential store.
//!
//! The store is a directory (by default `~/.sfdx`) holding one
//! `<username>.json` auth file per org and an optional `alias.json` mapping
//! aliases to usernames.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use url::Url;

use crate::config::{Config, DEFAULT_API_VERSION};
use crate::connection::{Connection, Transport, UreqTransport};
use crate::errors::{Result, ScriptExecError};

/// Resolves an org reference to a live connection.
pub trait OrgResolver {
    /// `api_version` overrides every other API version source.
    fn connect(&self, target_org: &str, api_version: Option<&str>) -> Result<Connection>;
}

/// Contents of a `<username>.json` auth file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgAuth {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub instance_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub instance_api_version: Option<String>,
    /// Scratch org expiry, `YYYY-MM-DD`.
    #[serde(default)]
    pub expiration_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AliasFile {
    #[serde(default)]
    orgs: HashMap<String, String>,
}

/// [`OrgResolver`] backed by auth files on disk.
pub struct AuthFileStore {
    state_dir: PathBuf,
    default_api_version: Option<String>,
    transport: Arc<dyn Transport>,
    today: NaiveDate,
}

impl AuthFileStore {
    /// Store rooted at `config.state_dir`, using `ureq` for HTTP.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.state_dir.clone(),
            config.api_version.clone(),
            Arc::new(UreqTransport::new()),
        )
    }

    pub fn new(
        state_dir: PathBuf,
        default_api_version: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            state_dir,
            default_api_version,
            transport,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Override the date used for expiry checks.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Map an alias to its username. Unknown names are returned unchanged.
    pub fn resolve_username(&self, target_org: &str) -> Result<String> {
        let path = self.state_dir.join("alias.json");
        if !path.exists() {
            return Ok(target_org.to_string());
        }
        let aliases: AliasFile = serde_json::from_str(&fs::read_to_string(&path)?)?;
        Ok(aliases
            .orgs
            .get(target_org)
            .cloned()
            .unwrap_or_else(|| target_org.to_string()))
    }

    /// Read the auth file for `username`.
    pub fn read_auth(&self, username: &str) -> Result<OrgAuth> {
        let path = self.state_dir.join(format!("{username}.json"));
        if !path.is_file() {
            return Err(ScriptExecError::OrgNotFound {
                org: username.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| ScriptExecError::OrgAuth {
            org: username.to_string(),
            message: format!("malformed auth file {}: {e}", path.display()),
        })
    }
}

impl OrgResolver for AuthFileStore {
    fn connect(&self, target_org: &str, api_version: Option<&str>) -> Result<Connection> {
        let username = self.resolve_username(target_org)?;
        if username != target_org {
            tracing::debug!(alias = target_org, %username, "resolved alias");
        }
        let auth = self.read_auth(&username)?;
        check_expiry(&auth, &username, self.today)?;

        let auth_error = |message: &str| ScriptExecError::OrgAuth {
            org: username.clone(),
            message: message.to_string(),
        };
        let org_id = non_empty(&auth.org_id).ok_or_else(|| auth_error("auth file has no orgId"))?;
        let access_token = non_empty(&auth.access_token)
            .ok_or_else(|| auth_error("auth file has no accessToken; re-authorize the org"))?;
        let instance = non_empty(&auth.instance_url)
            .ok_or_else(|| auth_error("auth file has no instanceUrl"))?;
        let instance_url = Url::parse(instance)
            .map_err(|e| auth_error(&format!("invalid instanceUrl '{instance}': {e}")))?;

        let version = api_version
            .map(str::to_string)
            .or_else(|| self.default_api_version.clone())
            .or_else(|| non_empty(&auth.instance_api_version).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        tracing::info!(%username, org_id, api_version = %version, "connected to org");
        Ok(Connection::new(
            non_empty(&auth.username).unwrap_or(&username),
            org_id,
            instance_url,
            access_token,
            version,
            Arc::clone(&self.transport),
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Fail if the auth file carries an expiration date before `today`.
fn check_expiry(auth: &OrgAuth, username: &str, today: NaiveDate) -> Result<()> {
    let Some(raw) = non_empty(&auth.expiration_date) else {
        return Ok(());
    };
    let expires = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        ScriptExecError::OrgAuth {
            org: username.to_string(),
            message: format!("invalid expirationDate '{raw}': {e}"),
        }
    })?;
    if expires < today {
        return Err(ScriptExecError::OrgAuth {
            org: username.to_string(),
            message: format!("org expired on {expires}"),
        });
    }
    Ok(())
}
