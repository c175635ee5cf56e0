//! Workbook I/O.
//!
//! Every xlsx access flows through this module:
//!
//! - **Opening**: existence is checked before any read so a missing path is
//!   reported as [`MergeError::FileNotFound`] rather than a parse failure.
//! - **Typing**: cells are converted to [`Value`]s; numbers carrying a date
//!   number format become date/times.
//! - **Saving**: the workbook is written to a temporary file next to the
//!   destination and renamed over it, so the previous file survives a failed
//!   save.

use std::{
    io,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use thiserror::Error;
use umya_spreadsheet::{Cell, Spreadsheet, Worksheet};

use crate::{data::Value, dates, merge::Dataset};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),
    #[error("Failed to read {path:?}: {message}")]
    ReadFailure { path: PathBuf, message: String },
    #[error("{0:?} contains no worksheet")]
    NoActiveSheet(PathBuf),
    #[error(
        "Permission denied writing {0:?}; close the file in any other program and run again"
    )]
    PermissionDenied(PathBuf),
    #[error("Failed to write {path:?}: {message}")]
    WriteFailure { path: PathBuf, message: String },
}

/// A header cell: its trimmed text and 1-based column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub name: String,
    pub column: u32,
}

pub fn ensure_exists(path: &Path) -> Result<(), MergeError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MergeError::FileNotFound(path.to_path_buf()))
    }
}

pub fn open(path: &Path) -> Result<Spreadsheet, MergeError> {
    ensure_exists(path)?;
    let book = umya_spreadsheet::reader::xlsx::read(path).map_err(|err| MergeError::ReadFailure {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    if book.get_sheet_collection_no_check().is_empty() {
        return Err(MergeError::NoActiveSheet(path.to_path_buf()));
    }
    Ok(book)
}

/// Header row of `sheet`, skipping empty cells. A repeated name keeps its
/// first column.
pub fn read_headers(sheet: &Worksheet) -> Vec<HeaderCell> {
    let mut headers: Vec<HeaderCell> = Vec::new();
    for column in 1..=sheet.get_highest_column() {
        let Some(cell) = sheet.get_cell((column, 1)) else {
            continue;
        };
        let name = cell.get_value().trim().to_string();
        if name.is_empty() {
            continue;
        }
        if headers.iter().any(|existing| existing.name == name) {
            warn!("Duplicate header '{name}' in column {column} ignored");
            continue;
        }
        headers.push(HeaderCell { name, column });
    }
    headers
}

/// Data rows below the header, restricted to `headers`. Trailing rows with no
/// value in any header column are dropped.
pub fn read_dataset(sheet: &Worksheet, headers: &[HeaderCell]) -> Dataset {
    let mut dataset = Dataset::new(headers.iter().map(|h| h.name.clone()).collect());
    for row in 2..=sheet.get_highest_row() {
        let values = headers
            .iter()
            .map(|header| sheet.get_cell((header.column, row)).and_then(cell_value))
            .collect::<Vec<_>>();
        dataset.push_row(values);
    }
    while dataset
        .rows
        .last()
        .is_some_and(|row| row.iter().all(Option::is_none))
    {
        dataset.rows.pop();
    }
    debug!(
        "Read {} data row(s) across {} column(s)",
        dataset.len(),
        dataset.headers.len()
    );
    dataset
}

/// Typed value of a cell. Formula cells yield their cached result; one with
/// no stored result is null.
pub fn cell_value(cell: &Cell) -> Option<Value> {
    let raw = cell.get_value();
    if raw.is_empty() {
        return None;
    }
    match cell.get_data_type() {
        "n" => match cell.get_value_number() {
            Some(number) if has_date_format(cell) => dates::from_serial(number)
                .map(Value::DateTime)
                .or(Some(Value::Number(number))),
            Some(number) => Some(Value::Number(number)),
            None => Some(Value::Text(raw.to_string())),
        },
        "b" => Some(Value::Boolean(raw.eq_ignore_ascii_case("true") || raw == "1")),
        _ => Some(Value::Text(raw.to_string())),
    }
}

pub fn number_format_code(cell: &Cell) -> Option<String> {
    cell.get_style()
        .get_number_format()
        .map(|format| format.get_format_code().to_string())
}

fn has_date_format(cell: &Cell) -> bool {
    number_format_code(cell).is_some_and(|code| is_date_format(&code))
}

/// True when a number format renders a date or time: it carries a day, month,
/// year, hour or second token outside quoted text, bracketed sections and
/// escaped characters.
pub fn is_date_format(code: &str) -> bool {
    if code.trim().eq_ignore_ascii_case("general") {
        return false;
    }
    let mut chars = code.chars();
    let mut quoted = false;
    let mut bracketed = false;
    while let Some(ch) = chars.next() {
        match ch {
            '"' => quoted = !quoted,
            _ if quoted => {}
            '[' => bracketed = true,
            ']' => bracketed = false,
            _ if bracketed => {}
            '\\' | '_' | '*' => {
                chars.next();
            }
            'd' | 'D' | 'm' | 'M' | 'y' | 'Y' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

/// Writes `book` to `path` through a temporary file in the same directory.
pub fn save(book: &Spreadsheet, path: &Path) -> Result<(), MergeError> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = tempfile::Builder::new()
        .prefix(".sheet-merge-")
        .suffix(".xlsx")
        .tempfile_in(dir)
        .map_err(|err| classify_write_error(path, err))?
        .into_temp_path();
    umya_spreadsheet::writer::xlsx::write(book, &temp).map_err(|err| {
        MergeError::WriteFailure {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    })?;
    temp.persist(path)
        .map_err(|err| classify_write_error(path, err.error))?;
    debug!("Saved workbook to {path:?}");
    Ok(())
}

fn classify_write_error(path: &Path, err: io::Error) -> MergeError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        MergeError::PermissionDenied(path.to_path_buf())
    } else {
        MergeError::WriteFailure {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}
