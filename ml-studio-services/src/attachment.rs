//! Files shipped alongside a published function

use std::collections::HashSet;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ml_studio_core::{Error, Result};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Where the contents of an attachment come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Read from a local file when the set is resolved
    Path(PathBuf),

    /// Literal contents
    Bytes(Vec<u8>),
}

/// A file to place next to the function on the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Name of the file on the service
    destination: String,

    /// Contents
    source: AttachmentSource,
}

impl Attachment {
    /// Attach a local file under its own name
    pub fn file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self {
            destination: destination_name(path),
            source: AttachmentSource::Path(path.to_path_buf()),
        }
    }

    /// Attach a local file under a different name
    pub fn file_as(source: impl AsRef<Path>, destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            source: AttachmentSource::Path(source.as_ref().to_path_buf()),
        }
    }

    /// Attach literal contents given as a `(source, destination)` pair
    ///
    /// The source name is not read; only the destination is used.
    pub fn bytes_as(_source: impl AsRef<Path>, destination: &str, contents: impl Into<Vec<u8>>) -> Self {
        Self::bytes(destination, contents)
    }

    /// Attach literal contents
    pub fn bytes(destination: &str, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            destination: destination.to_string(),
            source: AttachmentSource::Bytes(contents.into()),
        }
    }

    /// Name of the file on the service
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Where the contents come from
    pub fn source(&self) -> &AttachmentSource {
        &self.source
    }
}

fn destination_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Attachments with their contents loaded, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentSet {
    entries: Vec<(String, Vec<u8>)>,
}

impl AttachmentSet {
    /// Load every attachment, reading relative paths from the working directory
    ///
    /// Fails on the first file that does not exist or destination that repeats.
    pub fn resolve(attachments: &[Attachment]) -> Result<Self> {
        Self::resolve_in(Path::new(""), attachments)
    }

    /// Load every attachment, reading relative paths from `base`
    pub fn resolve_in(base: &Path, attachments: &[Attachment]) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            if !seen.insert(attachment.destination.as_str()) {
                return Err(Error::DuplicateAttachment(attachment.destination.clone()));
            }

            let contents = match &attachment.source {
                AttachmentSource::Bytes(bytes) => bytes.clone(),
                AttachmentSource::Path(path) => {
                    let path = base.join(path);
                    fs::read(&path).map_err(|e| match e.kind() {
                        io::ErrorKind::NotFound => Error::AttachmentNotFound { path },
                        _ => Error::Io(e),
                    })?
                }
            };

            entries.push((attachment.destination.clone(), contents));
        }

        Ok(Self { entries })
    }

    /// Destination names and contents
    pub fn entries(&self) -> &[(String, Vec<u8>)] {
        &self.entries
    }

    /// Number of attachments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no attachments
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Zip archive of every attachment
    ///
    /// Entries carry a fixed timestamp so equal sets produce equal archives.
    pub fn to_zip(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        for (name, contents) in &self.entries {
            writer.start_file(name.as_str(), options).map_err(zip_error)?;
            writer.write_all(contents)?;
        }

        let cursor = writer.finish().map_err(zip_error)?;
        Ok(cursor.into_inner())
    }

    /// Base64 zip archive, as sent in a service definition
    pub fn to_base64_zip(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_zip()?))
    }
}

fn zip_error(err: zip::result::ZipError) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::Other, err))
}
