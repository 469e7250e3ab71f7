//! CSV writer implementation

use std::io::Write;

use ::csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::Result;
use crate::frame::Frame;

/// Options for CSV writer
#[derive(Debug, Clone)]
pub struct CsvWriterOptions {
    /// Whether to write a header row
    pub write_header: bool,

    /// Delimiter character
    pub delimiter: u8,

    /// Quote character
    pub quote: u8,

    /// Whether to quote all fields
    pub quote_all: bool,
}

impl Default for CsvWriterOptions {
    fn default() -> Self {
        Self {
            write_header: true,
            delimiter: b',',
            quote: b'"',
            quote_all: false,
        }
    }
}

/// Writes a [`Frame`] as delimited text
#[derive(Debug, Clone, Default)]
pub struct CsvWriter {
    /// Writer options
    options: CsvWriterOptions,
}

impl CsvWriter {
    /// Create a new CSV writer
    pub fn new(options: CsvWriterOptions) -> Self {
        Self { options }
    }

    /// Write the whole frame to `writer`
    pub fn write<W: Write>(&self, writer: W, frame: &Frame) -> Result<()> {
        let mut csv_writer = WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .quote_style(if self.options.quote_all {
                QuoteStyle::Always
            } else {
                QuoteStyle::Necessary
            })
            .terminator(Terminator::Any(b'\n'))
            .from_writer(writer);

        // Write header if required
        if self.options.write_header {
            csv_writer.write_record(frame.column_names())?;
        }

        for row in frame.rows() {
            csv_writer.write_record(row.iter().map(ToString::to_string))?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}
