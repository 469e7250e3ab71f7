//! Datasets, experiments and tabular content for ML Studio workspaces
//!
//! A [`Workspace`] lists the datasets and experiments it holds, reads their
//! contents as bytes, text or a [`Frame`], and uploads new datasets. Frames are
//! converted to and from the service's formats through the [`codec`] module.

#![warn(missing_docs)]

pub mod codec;
pub mod csv;
pub mod data_type;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod frame;
pub mod rest;
pub mod text;
pub mod workspace;

pub use codec::{deserialize_frame, frame_to_bytes, is_supported, serialize_frame, FrameCodec};
pub use data_type::DataTypeId;
pub use dataset::{DatasetMetadata, Datasets, DownloadLocation, SourceDataset};
pub use error::{Error, Result};
pub use experiment::{Experiment, ExperimentMetadata, ExperimentStatus, Experiments, IntermediateDataset};
pub use frame::{Cell, CellType, Column, Frame};
pub use rest::RestClient;
pub use workspace::{Workspace, EXAMPLE_WORKSPACE_ID};
