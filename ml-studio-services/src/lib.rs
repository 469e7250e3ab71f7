//! Publish functions as ML Studio web services and call published services
//!
//! Publishing packages a [`RemoteFunction`] (its defining module, or an inline
//! body plus the globals it references), generates the entry script the service
//! runs and uploads both with any attachments. Consuming builds a
//! [`ServiceProxy`] that encodes arguments with a [`ParameterSchema`] and decodes
//! results with a [`ReturnSchema`].
//!
//! [`ParameterSchema`]: ml_studio_core::ParameterSchema
//! [`ReturnSchema`]: ml_studio_core::ReturnSchema

#![warn(missing_docs)]

pub mod attachment;
pub mod consume;
pub mod descriptor;
pub mod function;
pub mod package;
pub mod publish;
pub mod script;

pub use attachment::{Attachment, AttachmentSet, AttachmentSource};
pub use consume::{consume, consume_with_names, ServiceProxy};
pub use descriptor::{ServiceDescriptor, DEFAULT_INPUT_NAME, DEFAULT_OUTPUT_NAME};
pub use function::{InlineBody, LocalHandler, RemoteFunction};
pub use package::{package, FunctionPackage};
pub use publish::{publish, PublishOptions, PublishResult, Publisher, DEFAULT_LANGUAGE};
pub use script::{entry_script, InputMode};
