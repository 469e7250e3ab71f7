//! Content negotiation between data type ids and frame codecs
//!
//! Each supported [`DataTypeId`] maps to a [`FrameCodec`] that knows how to
//! write a [`Frame`] in that format and read it back. `ARFF` and unknown ids can
//! still be uploaded and downloaded as raw bytes, but have no codec.

use std::io::{Read, Write};

use crate::csv::{CsvReader, CsvReaderOptions, CsvWriter, CsvWriterOptions};
use crate::data_type::DataTypeId;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::text;

/// Serializes frames to and from one dataset format
pub trait FrameCodec: Send + Sync {
    /// Write `frame` to `writer`
    fn write_frame(&self, writer: &mut dyn Write, frame: &Frame) -> Result<()>;

    /// Read a frame from `reader`
    fn read_frame(&self, reader: &mut dyn Read) -> Result<Frame>;
}

/// Codec for delimited formats
#[derive(Debug, Clone, Copy)]
pub struct DelimitedCodec {
    /// Field delimiter
    pub delimiter: u8,

    /// Whether the first row is a header
    pub header: bool,

    /// Whether to skip spaces following a delimiter when reading
    pub skip_initial_space: bool,
}

impl FrameCodec for DelimitedCodec {
    fn write_frame(&self, writer: &mut dyn Write, frame: &Frame) -> Result<()> {
        CsvWriter::new(CsvWriterOptions {
            write_header: self.header,
            delimiter: self.delimiter,
            ..Default::default()
        })
        .write(writer, frame)
    }

    fn read_frame(&self, reader: &mut dyn Read) -> Result<Frame> {
        CsvReader::new(CsvReaderOptions {
            has_header: self.header,
            delimiter: self.delimiter,
            skip_initial_space: self.skip_initial_space,
            ..Default::default()
        })
        .read(reader)
    }
}

/// Codec for one-value-per-line text
#[derive(Debug, Clone, Copy)]
pub struct PlainTextCodec;

impl FrameCodec for PlainTextCodec {
    fn write_frame(&self, writer: &mut dyn Write, frame: &Frame) -> Result<()> {
        text::write_lines(writer, frame)
    }

    fn read_frame(&self, reader: &mut dyn Read) -> Result<Frame> {
        text::read_lines(reader)
    }
}

static PLAIN_TEXT: PlainTextCodec = PlainTextCodec;

static GENERIC_CSV: DelimitedCodec = DelimitedCodec {
    delimiter: b',',
    header: true,
    skip_initial_space: true,
};

static GENERIC_CSV_NO_HEADER: DelimitedCodec = DelimitedCodec {
    delimiter: b',',
    header: false,
    skip_initial_space: true,
};

static GENERIC_TSV: DelimitedCodec = DelimitedCodec {
    delimiter: b'\t',
    header: true,
    skip_initial_space: false,
};

static GENERIC_TSV_NO_HEADER: DelimitedCodec = DelimitedCodec {
    delimiter: b'\t',
    header: false,
    skip_initial_space: false,
};

/// Codec registered for a data type id
pub fn codec_for(data_type_id: &DataTypeId) -> Option<&'static dyn FrameCodec> {
    match data_type_id {
        DataTypeId::PlainText => Some(&PLAIN_TEXT),
        DataTypeId::GenericCsv => Some(&GENERIC_CSV),
        DataTypeId::GenericCsvNoHeader => Some(&GENERIC_CSV_NO_HEADER),
        DataTypeId::GenericTsv => Some(&GENERIC_TSV),
        DataTypeId::GenericTsvNoHeader => Some(&GENERIC_TSV_NO_HEADER),
        DataTypeId::Arff | DataTypeId::Other(_) => None,
    }
}

/// Whether a frame codec exists for the data type id
pub fn is_supported(data_type_id: &DataTypeId) -> bool {
    codec_for(data_type_id).is_some()
}

/// Serialize a frame in the given format
pub fn serialize_frame<W: Write>(mut writer: W, data_type_id: &DataTypeId, frame: &Frame) -> Result<()> {
    let codec = codec_for(data_type_id)
        .ok_or_else(|| Error::UnsupportedDatasetType(data_type_id.to_string()))?;
    codec.write_frame(&mut writer, frame)
}

/// Serialize a frame into a byte buffer
pub fn frame_to_bytes(data_type_id: &DataTypeId, frame: &Frame) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    serialize_frame(&mut output, data_type_id, frame)?;
    Ok(output)
}

/// Deserialize a frame stored in the given format
pub fn deserialize_frame<R: Read>(mut reader: R, data_type_id: &DataTypeId) -> Result<Frame> {
    let codec = codec_for(data_type_id)
        .ok_or_else(|| Error::UnsupportedDatasetType(data_type_id.to_string()))?;
    codec.read_frame(&mut reader)
}
