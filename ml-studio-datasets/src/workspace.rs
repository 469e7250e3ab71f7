//! Workspace handle

use std::fmt;
use std::sync::Arc;

use ml_studio_core::{HttpTransport, SettingsOverrides, Transport, WorkspaceSettings};
use tracing::debug;

use crate::dataset::Datasets;
use crate::error::Result;
use crate::experiment::Experiments;
use crate::rest::RestClient;

/// Id of the shared workspace that hosts example datasets and experiments
pub const EXAMPLE_WORKSPACE_ID: &str = "506153734175476c4f62416c57734963";

/// Whether a dataset or experiment id belongs to the example workspace
pub fn is_example_id(id: &str) -> bool {
    id.starts_with(EXAMPLE_WORKSPACE_ID)
}

/// Connection to one workspace
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct Workspace {
    /// Resolved settings
    settings: WorkspaceSettings,

    /// REST client bound to the studio API endpoint
    rest: RestClient,
}

impl Workspace {
    /// Create a workspace over an explicit transport
    pub fn new(settings: WorkspaceSettings, transport: Arc<dyn Transport>) -> Self {
        let rest = RestClient::new(&settings.api_endpoint, &settings.authorization_token, transport);
        Self { settings, rest }
    }

    /// Resolve settings (explicit values, then `~/.azureml`) and connect over HTTPS
    pub fn connect(overrides: SettingsOverrides) -> Result<Self> {
        let settings = WorkspaceSettings::resolve(overrides)?;
        debug!(workspace_id = %settings.workspace_id, endpoint = %settings.api_endpoint, "connecting to workspace");

        let transport = HttpTransport::new()?;
        Ok(Self::new(settings, Arc::new(transport)))
    }

    /// Workspace id
    pub fn workspace_id(&self) -> &str {
        &self.settings.workspace_id
    }

    /// Resolved settings
    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    pub(crate) fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// All datasets
    pub fn datasets(&self) -> Datasets {
        Datasets::new(self.clone(), None)
    }

    /// Datasets created by users of this workspace
    pub fn user_datasets(&self) -> Datasets {
        Datasets::new(self.clone(), Some(false))
    }

    /// Example datasets
    pub fn example_datasets(&self) -> Datasets {
        Datasets::new(self.clone(), Some(true))
    }

    /// All experiments
    pub fn experiments(&self) -> Experiments {
        Experiments::new(self.clone(), None)
    }

    /// Experiments created by users of this workspace
    pub fn user_experiments(&self) -> Experiments {
        Experiments::new(self.clone(), Some(false))
    }

    /// Example experiments
    pub fn example_experiments(&self) -> Experiments {
        Experiments::new(self.clone(), Some(true))
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("workspace_id", &self.settings.workspace_id)
            .field("api_endpoint", &self.settings.api_endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_studio_core::MockTransport;

    #[test]
    fn test_example_ids() {
        assert!(is_example_id("506153734175476c4f62416c57734963.dataset.1"));
        assert!(!is_example_id("a3f0c2.dataset.1"));
    }

    #[test]
    fn test_debug_hides_token() {
        let settings = WorkspaceSettings::new("ws", "secret-token");
        let workspace = Workspace::new(settings, Arc::new(MockTransport::new()));

        let debug = format!("{:?}", workspace);
        assert!(debug.contains("ws"));
        assert!(!debug.contains("secret-token"));
    }
}
