//! Source datasets stored in a workspace

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{self, deserialize_frame, frame_to_bytes};
use crate::data_type::DataTypeId;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::workspace::{is_example_id, Workspace};

/// Where the contents of a dataset can be downloaded from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DownloadLocation {
    /// Storage base URI
    pub base_uri: String,

    /// Size in bytes
    pub size: u64,

    /// Storage endpoint type
    pub endpoint_type: Option<String>,

    /// Credential container name
    pub credential_container: Option<String>,

    /// Query string granting read access
    pub access_credential: String,

    /// Path of the blob relative to the base URI
    pub location: String,

    /// File type of the blob
    pub file_type: Option<String>,

    /// Whether the blob is auxiliary
    pub is_auxiliary: bool,

    /// Blob name
    pub name: Option<String>,
}

/// Dataset metadata as returned by the REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatasetMetadata {
    /// Dataset id
    pub id: String,

    /// Dataset name
    pub name: String,

    /// Serialization format of the contents
    pub data_type_id: DataTypeId,

    /// Description
    pub description: Option<String>,

    /// Family id shared by every version of the dataset
    pub family_id: Option<String>,

    /// Upload the current version came from
    pub resource_upload_id: Option<String>,

    /// Size in bytes
    pub size: Option<u64>,

    /// How the dataset was created
    pub source_origin: Option<String>,

    /// Creation date as reported by the service
    pub created_date: Option<String>,

    /// Owner
    pub owner: Option<String>,

    /// Experiment that produced the dataset, if any
    pub experiment_id: Option<String>,

    /// Client version that created the dataset
    pub client_version: Option<String>,

    /// Dataset this one was promoted from
    pub promoted_from: Option<String>,

    /// Service version
    pub service_version: Option<i64>,

    /// Whether this is the latest version
    pub is_latest: Option<bool>,

    /// Category
    pub category: Option<String>,

    /// Whether the dataset is deprecated
    pub is_deprecated: Option<bool>,

    /// Culture of the contents
    pub culture: Option<String>,

    /// Download location of the contents
    pub download_location: Option<DownloadLocation>,

    /// Visualization endpoint
    pub visualize_end_point: Option<DownloadLocation>,

    /// Schema endpoint
    pub schema_end_point: Option<DownloadLocation>,

    /// Schema computation status
    pub schema_status: Option<String>,
}

/// A dataset stored in a workspace
#[derive(Clone)]
pub struct SourceDataset {
    /// Parent workspace
    workspace: Workspace,

    /// Current metadata
    metadata: DatasetMetadata,
}

impl SourceDataset {
    pub(crate) fn new(workspace: Workspace, metadata: DatasetMetadata) -> Self {
        Self { workspace, metadata }
    }

    /// Dataset metadata
    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Dataset id
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Dataset name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Serialization format of the contents
    pub fn data_type_id(&self) -> &DataTypeId {
        &self.metadata.data_type_id
    }

    /// Description, empty if the service has none
    pub fn description(&self) -> &str {
        self.metadata.description.as_deref().unwrap_or("")
    }

    /// True for example datasets, which are read-only
    pub fn is_example(&self) -> bool {
        is_example_id(&self.metadata.id)
    }

    /// Whether [`SourceDataset::to_frame`] can decode this dataset
    pub fn is_frame_supported(&self) -> bool {
        codec::is_supported(&self.metadata.data_type_id)
    }

    /// Full URL of the dataset contents
    pub fn contents_url(&self) -> Result<String> {
        let location = self.metadata.download_location.as_ref().ok_or_else(|| {
            Error::Core(ml_studio_core::Error::Protocol(format!(
                "dataset \"{}\" has no download location",
                self.metadata.name
            )))
        })?;

        Ok(format!(
            "{}{}{}",
            location.base_uri, location.location, location.access_credential
        ))
    }

    /// Read the contents as bytes
    pub fn read_as_binary(&self) -> Result<Vec<u8>> {
        self.workspace.rest().read_dataset_contents(&self.contents_url()?)
    }

    /// Read the contents as UTF-8 text
    pub fn read_as_text(&self) -> Result<String> {
        String::from_utf8(self.read_as_binary()?)
            .map_err(|e| Error::Format(format!("dataset contents are not valid UTF-8: {}", e)))
    }

    /// Decode the contents into a frame
    pub fn to_frame(&self) -> Result<Frame> {
        let data = self.read_as_binary()?;
        deserialize_frame(data.as_slice(), &self.metadata.data_type_id)
    }

    /// Replace the dataset with already serialized data
    ///
    /// Parameters left as `None` keep the current value. The metadata is
    /// refreshed from the service afterwards.
    pub fn update_from_raw_data(
        &mut self,
        raw_data: &[u8],
        data_type_id: Option<DataTypeId>,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        self.check_writable()?;
        let data_type_id = data_type_id.unwrap_or_else(|| self.metadata.data_type_id.clone());
        self.upload_and_refresh(raw_data, &data_type_id, name, description)
    }

    /// Serialize a frame and replace the dataset with it
    pub fn update_from_frame(
        &mut self,
        frame: &Frame,
        data_type_id: Option<DataTypeId>,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        self.check_writable()?;
        let data_type_id = data_type_id.unwrap_or_else(|| self.metadata.data_type_id.clone());
        let raw_data = frame_to_bytes(&data_type_id, frame)?;
        self.upload_and_refresh(&raw_data, &data_type_id, name, description)
    }

    fn check_writable(&self) -> Result<()> {
        if self.is_example() {
            return Err(Error::InvalidOperation(format!(
                "example dataset \"{}\" cannot be updated",
                self.metadata.name
            )));
        }
        Ok(())
    }

    fn upload_and_refresh(
        &mut self,
        raw_data: &[u8],
        data_type_id: &DataTypeId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let name = name.unwrap_or(&self.metadata.name).to_string();
        let description = description.unwrap_or_else(|| self.description()).to_string();
        let workspace_id = self.workspace.workspace_id().to_string();

        let dataset_id = self.workspace.rest().upload_dataset(
            &workspace_id,
            &name,
            &description,
            data_type_id,
            raw_data,
            self.metadata.family_id.as_deref(),
        )?;

        debug!(old = %self.metadata.id, new = %dataset_id, "refreshing dataset metadata");
        self.metadata = self.workspace.rest().get_dataset(&workspace_id, &dataset_id)?;
        Ok(())
    }
}

impl fmt::Debug for SourceDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDataset")
            .field("workspace_id", &self.workspace.workspace_id())
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl fmt::Display for SourceDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metadata.name)
    }
}

/// The datasets of a workspace, optionally restricted to examples or user datasets
///
/// Every accessor queries the service; nothing is cached.
#[derive(Clone)]
pub struct Datasets {
    /// Parent workspace
    workspace: Workspace,

    /// `Some(true)` for examples only, `Some(false)` for user datasets only
    example_filter: Option<bool>,
}

impl Datasets {
    pub(crate) fn new(workspace: Workspace, example_filter: Option<bool>) -> Self {
        Self {
            workspace,
            example_filter,
        }
    }

    /// Fetch all datasets matching the filter
    pub fn list(&self) -> Result<Vec<SourceDataset>> {
        Ok(self
            .metadata()?
            .into_iter()
            .map(|m| SourceDataset::new(self.workspace.clone(), m))
            .collect())
    }

    /// Number of datasets matching the filter
    pub fn len(&self) -> Result<usize> {
        Ok(self.metadata()?.len())
    }

    /// Whether no dataset matches the filter
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Get a dataset by position
    pub fn get_index(&self, index: usize) -> Result<SourceDataset> {
        self.metadata()?
            .into_iter()
            .nth(index)
            .map(|m| SourceDataset::new(self.workspace.clone(), m))
            .ok_or_else(|| Error::NotFound(format!("no data set at index {}", index)))
    }

    /// Get a dataset by name; matching is case-sensitive
    pub fn get(&self, name: &str) -> Result<SourceDataset> {
        self.metadata()?
            .into_iter()
            .find(|m| m.name == name)
            .map(|m| SourceDataset::new(self.workspace.clone(), m))
            .ok_or_else(|| Error::NotFound(format!("A data set named \"{}\" does not exist", name)))
    }

    /// Serialize a frame and upload it as a new dataset
    pub fn add_from_frame(
        &self,
        frame: &Frame,
        data_type_id: &DataTypeId,
        name: &str,
        description: &str,
    ) -> Result<SourceDataset> {
        check_not_empty("name", name)?;
        check_not_empty("description", description)?;

        let raw_data = frame_to_bytes(data_type_id, frame)?;
        self.upload(&raw_data, data_type_id, name, description)
    }

    /// Upload already serialized data as a new dataset
    pub fn add_from_raw_data(
        &self,
        raw_data: &[u8],
        data_type_id: &DataTypeId,
        name: &str,
        description: &str,
    ) -> Result<SourceDataset> {
        check_not_empty("data_type_id", data_type_id.as_str())?;
        check_not_empty("name", name)?;
        check_not_empty("description", description)?;

        self.upload(raw_data, data_type_id, name, description)
    }

    fn upload(&self, raw_data: &[u8], data_type_id: &DataTypeId, name: &str, description: &str) -> Result<SourceDataset> {
        let workspace_id = self.workspace.workspace_id();
        let rest = self.workspace.rest();

        let dataset_id = rest.upload_dataset(workspace_id, name, description, data_type_id, raw_data, None)?;
        let metadata = rest.get_dataset(workspace_id, &dataset_id)?;
        Ok(SourceDataset::new(self.workspace.clone(), metadata))
    }

    fn metadata(&self) -> Result<Vec<DatasetMetadata>> {
        let datasets = self.workspace.rest().get_datasets(self.workspace.workspace_id())?;
        Ok(match self.example_filter {
            None => datasets,
            Some(examples) => datasets
                .into_iter()
                .filter(|d| is_example_id(&d.id) == examples)
                .collect(),
        })
    }
}

fn check_not_empty(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{} must not be empty", name)));
    }
    Ok(())
}
