//! In-memory tabular data
//!
//! A [`Frame`] is the decoded form of a dataset: named, typed columns and rows
//! of [`Cell`]s. Column types are inferred from the text the service returns.

use std::fmt;

use crate::error::{Error, Result};

/// Data type of a frame column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    /// 64-bit signed integer
    Int64,

    /// 64-bit floating point
    Float64,

    /// Boolean
    Boolean,

    /// UTF-8 string
    String,
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellType::Int64 => write!(f, "Int64"),
            CellType::Float64 => write!(f, "Float64"),
            CellType::Boolean => write!(f, "Boolean"),
            CellType::String => write!(f, "String"),
        }
    }
}

/// A single value in a frame
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Missing value
    Null,

    /// Integer
    Int(i64),

    /// Floating point
    Float(f64),

    /// Boolean
    Bool(bool),

    /// Text
    Text(String),
}

impl Cell {
    /// Parse text into a cell of the given type; empty text is null
    pub fn parse(text: &str, cell_type: CellType) -> Result<Cell> {
        if text.is_empty() {
            return Ok(Cell::Null);
        }

        let invalid = || Error::Format(format!("cannot parse {:?} as {}", text, cell_type));
        match cell_type {
            CellType::Int64 => text.parse().map(Cell::Int).map_err(|_| invalid()),
            CellType::Float64 => text.parse().map(Cell::Float).map_err(|_| invalid()),
            CellType::Boolean => parse_bool(text).map(Cell::Bool).ok_or_else(invalid),
            CellType::String => Ok(Cell::Text(text.to_string())),
        }
    }

    /// Check if this cell is null
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            // Debug keeps the trailing ".0" so floats stay floats on re-read
            Cell::Float(v) => write!(f, "{:?}", v),
            Cell::Bool(true) => write!(f, "True"),
            Cell::Bool(false) => write!(f, "False"),
            Cell::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    name: String,

    /// Column type
    cell_type: CellType,
}

impl Column {
    /// Create a new column
    pub fn new(name: &str, cell_type: CellType) -> Self {
        Self {
            name: name.to_string(),
            cell_type,
        }
    }

    /// Get the name of this column
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the type of this column
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }
}

/// Tabular data: columns plus rows of cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Column definitions
    columns: Vec<Column>,

    /// Row-major cells
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    /// Create a frame, checking every row has one cell per column
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(Error::Format(format!(
                "row {} has {} cells but the frame has {} columns",
                index,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }

    /// Build a frame from text records, inferring column types
    ///
    /// Without a header, columns are named by position (`0`, `1`, ...). Short
    /// rows are padded with nulls; rows longer than the header are an error.
    pub fn from_records(header: Option<Vec<String>>, records: Vec<Vec<String>>) -> Result<Self> {
        let width = match &header {
            Some(header) => header.len(),
            None => records.iter().map(Vec::len).max().unwrap_or(0),
        };

        if let Some((index, record)) = records.iter().enumerate().find(|(_, r)| r.len() > width) {
            return Err(Error::Format(format!(
                "record {} has {} fields but the header has {}",
                index,
                record.len(),
                width
            )));
        }

        let names = header.unwrap_or_else(|| (0..width).map(|i| i.to_string()).collect());

        let mut columns = Vec::with_capacity(width);
        for (col_idx, name) in names.iter().enumerate() {
            // Collect values for this column
            let values: Vec<&str> = records
                .iter()
                .map(|r| r.get(col_idx).map_or("", String::as_str))
                .collect();

            columns.push(Column::new(name, infer_cell_type(&values)));
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| Cell::parse(record.get(i).map_or("", String::as_str), column.cell_type))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns, rows })
    }

    /// Column definitions
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Get the index of a column by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Rows of cells
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Get a single cell
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// All cells of a named column
    pub fn column_cells(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.index_of(name)?;
        Some(self.rows.iter().map(|r| &r[index]).collect())
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Infer the type of a column from its text values
///
/// Empty values are ignored; a column with only empty values is a string column.
pub fn infer_cell_type(values: &[&str]) -> CellType {
    let non_empty: Vec<&str> = values.iter().filter(|s| !s.is_empty()).copied().collect();

    if non_empty.is_empty() {
        return CellType::String;
    }

    if non_empty.iter().all(|s| s.parse::<i64>().is_ok()) {
        return CellType::Int64;
    }

    if non_empty.iter().all(|s| s.parse::<f64>().is_ok()) {
        return CellType::Float64;
    }

    if non_empty.iter().all(|s| parse_bool(s).is_some()) {
        return CellType::Boolean;
    }

    CellType::String
}
