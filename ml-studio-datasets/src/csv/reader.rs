//! CSV reader implementation

use std::io::Read;

use ::csv::{ReaderBuilder, StringRecord};

use crate::error::Result;
use crate::frame::Frame;

use super::strip_bom;

/// Options for CSV reader
#[derive(Debug, Clone)]
pub struct CsvReaderOptions {
    /// Whether the CSV has a header row
    pub has_header: bool,

    /// Delimiter character
    pub delimiter: u8,

    /// Quote character
    pub quote: u8,

    /// Whether to skip spaces following a delimiter
    pub skip_initial_space: bool,
}

impl Default for CsvReaderOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            quote: b'"',
            skip_initial_space: true,
        }
    }
}

/// Reads delimited text into a [`Frame`]
#[derive(Debug, Clone, Default)]
pub struct CsvReader {
    /// Reader options
    options: CsvReaderOptions,
}

impl CsvReader {
    /// Create a new CSV reader
    pub fn new(options: CsvReaderOptions) -> Self {
        Self { options }
    }

    /// Get the reader options
    pub fn options(&self) -> &CsvReaderOptions {
        &self.options
    }

    /// Read all records from `reader`
    pub fn read<R: Read>(&self, mut reader: R) -> Result<Frame> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        // Headers are handled here so that header-less data keeps its first row
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(strip_bom(&data));

        let mut header = None;
        let mut records = Vec::new();
        let mut record = StringRecord::new();

        while csv_reader.read_record(&mut record)? {
            // Blank lines never reach here; a lone `""` is a row with one empty cell
            let fields = self.fields(&record);

            if self.options.has_header && header.is_none() {
                header = Some(fields);
            } else {
                records.push(fields);
            }
        }

        if self.options.has_header && header.is_none() {
            header = Some(Vec::new());
        }

        Frame::from_records(header, records)
    }

    fn fields(&self, record: &StringRecord) -> Vec<String> {
        record
            .iter()
            .map(|field| {
                if self.options.skip_initial_space {
                    field.trim_start_matches(' ').to_string()
                } else {
                    field.to_string()
                }
            })
            .collect()
    }
}
