//! Plain text dataset content
//!
//! `PlainText` datasets hold one value per line and no header. They decode to a
//! single column named `0`.

use std::io::{Read, Write};

use crate::csv::strip_bom;
use crate::error::{Error, Result};
use crate::frame::{Cell, CellType, Column, Frame};

/// Read plain text lines into a one-column frame; blank lines are skipped
pub fn read_lines<R: Read>(mut reader: R) -> Result<Frame> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    let text = std::str::from_utf8(strip_bom(&data))
        .map_err(|e| Error::Format(format!("plain text is not valid UTF-8: {}", e)))?;

    let rows: Vec<Vec<String>> = text
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| vec![line.to_string()])
        .collect();

    if rows.is_empty() {
        return Frame::new(vec![Column::new("0", CellType::String)], Vec::new());
    }

    Frame::from_records(None, rows)
}

/// Write every row as one line, concatenating its cells
pub fn write_lines<W: Write>(mut writer: W, frame: &Frame) -> Result<()> {
    for row in frame.rows() {
        let line: String = row.iter().filter(|c| !c.is_null()).map(Cell::to_string).collect();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_lines() {
        let frame = read_lines("\u{feff}first line\r\n\nsecond, with comma\n".as_bytes()).unwrap();

        assert_eq!(frame.column_names(), vec!["0"]);
        assert_eq!(frame.num_rows(), 2);
        assert_eq!(frame.cell(0, 0), Some(&Cell::Text("first line".into())));
        assert_eq!(frame.cell(1, 0), Some(&Cell::Text("second, with comma".into())));
    }

    #[test]
    fn test_empty_input() {
        let frame = read_lines("".as_bytes()).unwrap();
        assert_eq!(frame.num_columns(), 1);
        assert_eq!(frame.num_rows(), 0);
    }

    #[test]
    fn test_write_lines() {
        let frame = Frame::new(
            vec![Column::new("a", CellType::String), Column::new("b", CellType::String)],
            vec![vec![Cell::from("ab"), Cell::from("cd")], vec![Cell::from("x"), Cell::Null]],
        )
        .unwrap();

        let mut out = Vec::new();
        write_lines(&mut out, &frame).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "abcd\nx\n");
    }
}
