//! Delimited (CSV/TSV) dataset content
//!
//! The service stores `GenericCSV`/`GenericTSV` datasets as UTF-8 text, with or
//! without a header row. Reading strips a leading byte order mark.

mod reader;
mod writer;

pub use reader::{CsvReader, CsvReaderOptions};
pub use writer::{CsvWriter, CsvWriterOptions};

/// UTF-8 byte order mark
pub(crate) const BOM: &[u8] = b"\xef\xbb\xbf";

/// Strip a leading UTF-8 byte order mark
pub(crate) fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(BOM).unwrap_or(data)
}
