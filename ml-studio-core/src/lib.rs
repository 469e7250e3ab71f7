//! Core types and abstractions for ML Studio clients
//!
//! This crate provides the pieces shared by the dataset and service crates:
//! the error taxonomy, the dynamically typed [`Value`], the interop type mapper,
//! parameter/return schemas, the HTTP [`Transport`] seam and workspace settings.

#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod schema;
pub mod settings;
pub mod types;
pub mod value;

// Re-export key types for convenience
pub use error::{Error, Result};
pub use http::{HttpTransport, HttpTransportOptions, Method, Request, Response, Transport};
pub use schema::{Parameter, ParameterSchema, ReturnSchema};
pub use settings::{Endpoints, SettingsOverrides, WorkspaceSettings};
pub use types::TypeTag;
pub use value::Value;

#[cfg(any(test, feature = "mock"))]
pub use http::MockTransport;
