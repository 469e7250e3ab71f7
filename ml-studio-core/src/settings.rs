//! Workspace settings
//!
//! Explicit values always win. Anything left unset is looked up in
//! `~/.azureml/settings.json`, or in `~/.azureml/settings.ini` when no JSON file
//! exists. Both files use a `workspace` section:
//!
//! ```ini
//! [workspace]
//! id = 4c29e1adeba2e5a7cbeb0e4f4adfb4df
//! authorization_token = f4f3ade2c6aefdb1afb043cd8bcf3daf
//! api_endpoint = https://studio.azureml.net
//! management_endpoint = https://management.azureml.net
//! ```

use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use tracing::debug;

use crate::error::{Error, Result};

/// Well-known service endpoints
pub struct Endpoints;

impl Endpoints {
    /// Default studio API endpoint
    pub const DEFAULT: &'static str = "https://studio.azureml.net";

    /// Default management endpoint used for publishing services
    pub const MANAGEMENT_DEFAULT: &'static str = "https://management.azureml.net";
}

const SECTION: &str = "workspace";
const KEY_ID: &str = "id";
const KEY_TOKEN: &str = "authorization_token";
const KEY_API_ENDPOINT: &str = "api_endpoint";
const KEY_MANAGEMENT_ENDPOINT: &str = "management_endpoint";

/// Values supplied explicitly by the caller
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    /// Workspace id
    pub workspace_id: Option<String>,

    /// Workspace authorization token
    pub authorization_token: Option<String>,

    /// Studio API endpoint
    pub api_endpoint: Option<String>,

    /// Management endpoint
    pub management_endpoint: Option<String>,
}

impl SettingsOverrides {
    fn is_complete(&self) -> bool {
        self.workspace_id.is_some()
            && self.authorization_token.is_some()
            && self.api_endpoint.is_some()
            && self.management_endpoint.is_some()
    }
}

/// Credentials and endpoints of a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSettings {
    /// Workspace id
    pub workspace_id: String,

    /// Workspace authorization token
    pub authorization_token: String,

    /// Studio API endpoint
    pub api_endpoint: String,

    /// Management endpoint
    pub management_endpoint: String,
}

impl WorkspaceSettings {
    /// Settings for a workspace on the default endpoints
    pub fn new(workspace_id: &str, authorization_token: &str) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            authorization_token: authorization_token.to_string(),
            api_endpoint: Endpoints::DEFAULT.to_string(),
            management_endpoint: Endpoints::MANAGEMENT_DEFAULT.to_string(),
        }
    }

    /// Use a different studio API endpoint
    #[must_use]
    pub fn with_api_endpoint(mut self, endpoint: &str) -> Self {
        self.api_endpoint = endpoint.to_string();
        self
    }

    /// Use a different management endpoint
    #[must_use]
    pub fn with_management_endpoint(mut self, endpoint: &str) -> Self {
        self.management_endpoint = endpoint.to_string();
        self
    }

    /// Directory holding the settings files (`~/.azureml`)
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".azureml"))
    }

    /// Resolve settings from overrides and the default settings directory
    pub fn resolve(overrides: SettingsOverrides) -> Result<Self> {
        match Self::default_dir() {
            Some(dir) => Self::resolve_from(&dir, overrides),
            None => Self::finish(overrides),
        }
    }

    /// Resolve settings from overrides and the files in `dir`
    pub fn resolve_from(dir: &Path, overrides: SettingsOverrides) -> Result<Self> {
        if overrides.is_complete() {
            return Self::finish(overrides);
        }

        let json = dir.join("settings.json");
        let (path, format) = if json.exists() {
            (json, FileFormat::Json)
        } else {
            (dir.join("settings.ini"), FileFormat::Ini)
        };

        debug!(path = %path.display(), "reading workspace settings");

        let config = Config::builder()
            .add_source(File::from(path).format(format).required(false))
            .build()?;

        let lookup = |key: &str| config.get_string(&format!("{}.{}", SECTION, key)).ok();

        let merged = SettingsOverrides {
            workspace_id: overrides.workspace_id.or_else(|| lookup(KEY_ID)),
            authorization_token: overrides.authorization_token.or_else(|| lookup(KEY_TOKEN)),
            api_endpoint: overrides.api_endpoint.or_else(|| lookup(KEY_API_ENDPOINT)),
            management_endpoint: overrides
                .management_endpoint
                .or_else(|| lookup(KEY_MANAGEMENT_ENDPOINT)),
        };

        Self::finish(merged)
    }

    fn finish(values: SettingsOverrides) -> Result<Self> {
        let workspace_id = non_empty(values.workspace_id)
            .ok_or_else(|| Error::Config("workspace_id not provided and not available via config".into()))?;
        let authorization_token = non_empty(values.authorization_token).ok_or_else(|| {
            Error::Config("authorization_token not provided and not available via config".into())
        })?;

        Ok(Self {
            workspace_id,
            authorization_token,
            api_endpoint: non_empty(values.api_endpoint).unwrap_or_else(|| Endpoints::DEFAULT.to_string()),
            management_endpoint: non_empty(values.management_endpoint)
                .unwrap_or_else(|| Endpoints::MANAGEMENT_DEFAULT.to_string()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
