//! Experiments and their intermediate datasets

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{self, deserialize_frame};
use crate::data_type::DataTypeId;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::workspace::{is_example_id, Workspace};

/// Run status of an experiment
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExperimentStatus {
    /// Status code, e.g. `Finished`
    pub status_code: Option<String>,

    /// Status detail
    pub status_detail: Option<String>,

    /// Creation time as reported by the service
    pub creation_time: Option<String>,
}

/// Experiment metadata as returned by the REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExperimentMetadata {
    /// Experiment id
    pub experiment_id: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Creator
    pub creator: Option<String>,

    /// Last job id
    pub job_id: Option<String>,

    /// Version id
    pub version_id: Option<String>,

    /// Entity tag
    pub etag: Option<String>,

    /// Last run id
    pub run_id: Option<String>,

    /// Whether the experiment is archived
    #[serde(default)]
    pub is_archived: bool,

    /// Run status
    #[serde(default)]
    pub status: ExperimentStatus,
}

/// An experiment in a workspace
#[derive(Clone)]
pub struct Experiment {
    /// Parent workspace
    workspace: Workspace,

    /// Experiment metadata
    metadata: ExperimentMetadata,
}

impl Experiment {
    pub(crate) fn new(workspace: Workspace, metadata: ExperimentMetadata) -> Self {
        Self { workspace, metadata }
    }

    /// Experiment metadata
    pub fn metadata(&self) -> &ExperimentMetadata {
        &self.metadata
    }

    /// Experiment id
    pub fn id(&self) -> &str {
        &self.metadata.experiment_id
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    /// Run status
    pub fn status(&self) -> &ExperimentStatus {
        &self.metadata.status
    }

    /// True for example experiments
    pub fn is_example(&self) -> bool {
        is_example_id(&self.metadata.experiment_id)
    }

    /// Address the output of one module of this experiment
    ///
    /// Nothing is fetched until the dataset is read.
    pub fn get_intermediate_dataset(
        &self,
        node_id: &str,
        port_name: &str,
        data_type_id: DataTypeId,
    ) -> Result<IntermediateDataset> {
        for (name, value) in [
            ("node_id", node_id),
            ("port_name", port_name),
            ("data_type_id", data_type_id.as_str()),
        ] {
            if value.is_empty() {
                return Err(Error::InvalidArgument(format!("{} must not be empty", name)));
            }
        }

        Ok(IntermediateDataset {
            workspace: self.workspace.clone(),
            experiment_id: self.metadata.experiment_id.clone(),
            node_id: node_id.to_string(),
            port_name: port_name.to_string(),
            data_type_id,
        })
    }
}

impl fmt::Debug for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Experiment")
            .field("workspace_id", &self.workspace.workspace_id())
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.metadata.experiment_id, self.metadata.description)
    }
}

/// Output of one module of an experiment
#[derive(Clone)]
pub struct IntermediateDataset {
    workspace: Workspace,
    experiment_id: String,
    node_id: String,
    port_name: String,
    data_type_id: DataTypeId,
}

impl IntermediateDataset {
    /// Id of the experiment that produced the dataset
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Module node id
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Output port name
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Serialization format of the contents
    pub fn data_type_id(&self) -> &DataTypeId {
        &self.data_type_id
    }

    /// Whether [`IntermediateDataset::to_frame`] can decode this dataset
    pub fn is_frame_supported(&self) -> bool {
        codec::is_supported(&self.data_type_id)
    }

    /// Read the contents as bytes
    pub fn read_as_binary(&self) -> Result<Vec<u8>> {
        self.workspace.rest().read_intermediate_dataset_contents(
            self.workspace.workspace_id(),
            &self.experiment_id,
            &self.node_id,
            &self.port_name,
        )
    }

    /// Read the contents as UTF-8 text
    pub fn read_as_text(&self) -> Result<String> {
        String::from_utf8(self.read_as_binary()?)
            .map_err(|e| Error::Format(format!("dataset contents are not valid UTF-8: {}", e)))
    }

    /// Decode the contents into a frame
    pub fn to_frame(&self) -> Result<Frame> {
        let data = self.read_as_binary()?;
        deserialize_frame(data.as_slice(), &self.data_type_id)
    }
}

impl fmt::Debug for IntermediateDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntermediateDataset")
            .field("experiment_id", &self.experiment_id)
            .field("node_id", &self.node_id)
            .field("port_name", &self.port_name)
            .field("data_type_id", &self.data_type_id)
            .finish()
    }
}

/// The experiments of a workspace, optionally restricted to examples or user experiments
#[derive(Clone)]
pub struct Experiments {
    workspace: Workspace,
    example_filter: Option<bool>,
}

impl Experiments {
    pub(crate) fn new(workspace: Workspace, example_filter: Option<bool>) -> Self {
        Self {
            workspace,
            example_filter,
        }
    }

    /// Fetch all experiments matching the filter
    pub fn list(&self) -> Result<Vec<Experiment>> {
        Ok(self
            .metadata()?
            .into_iter()
            .map(|m| Experiment::new(self.workspace.clone(), m))
            .collect())
    }

    /// Number of experiments matching the filter
    pub fn len(&self) -> Result<usize> {
        Ok(self.metadata()?.len())
    }

    /// Whether no experiment matches the filter
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Get an experiment by position
    pub fn get_index(&self, index: usize) -> Result<Experiment> {
        self.metadata()?
            .into_iter()
            .nth(index)
            .map(|m| Experiment::new(self.workspace.clone(), m))
            .ok_or_else(|| Error::NotFound(format!("no experiment at index {}", index)))
    }

    /// Get an experiment by id
    pub fn get(&self, experiment_id: &str) -> Result<Experiment> {
        self.metadata()?
            .into_iter()
            .find(|m| m.experiment_id == experiment_id)
            .map(|m| Experiment::new(self.workspace.clone(), m))
            .ok_or_else(|| {
                Error::NotFound(format!("An experiment with the id \"{}\" does not exist", experiment_id))
            })
    }

    fn metadata(&self) -> Result<Vec<ExperimentMetadata>> {
        let experiments = self.workspace.rest().get_experiments(self.workspace.workspace_id())?;
        Ok(match self.example_filter {
            None => experiments,
            Some(examples) => experiments
                .into_iter()
                .filter(|e| is_example_id(&e.experiment_id) == examples)
                .collect(),
        })
    }
}
