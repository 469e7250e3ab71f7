//! Connection details of a published service

use serde::{Deserialize, Serialize};

/// Default name of the service input
pub const DEFAULT_INPUT_NAME: &str = "input1";

/// Default name of the service output
pub const DEFAULT_OUTPUT_NAME: &str = "output1";

/// Identity and connection record of a published service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Invocation URL
    pub url: String,

    /// API key sent as a bearer token
    pub api_key: String,

    /// Identifier used to update the service in place
    pub service_id: Option<String>,

    /// Help page
    pub help_url: Option<String>,

    /// Name of the input the arguments are sent under
    pub input_name: String,

    /// Name of the output the results are read from
    pub output_name: String,
}

impl ServiceDescriptor {
    /// Descriptor for an existing service with default input and output names
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            url: url.to_string(),
            api_key: api_key.to_string(),
            service_id: None,
            help_url: None,
            input_name: DEFAULT_INPUT_NAME.to_string(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
        }
    }

    /// Set the input name
    #[must_use]
    pub fn with_input_name(mut self, name: &str) -> Self {
        self.input_name = name.to_string();
        self
    }

    /// Set the output name
    #[must_use]
    pub fn with_output_name(mut self, name: &str) -> Self {
        self.output_name = name.to_string();
        self
    }

    /// Set the help page
    #[must_use]
    pub fn with_help_url(mut self, url: &str) -> Self {
        self.help_url = Some(url.to_string());
        self
    }
}
