//! Fill-down translation of A1-style formulas.
//!
//! A template such as `=D2*0.19` is split once into literal text and cell
//! references. Rendering it for another row shifts every relative row
//! component by the distance from the anchor row; columns and `$`-locked rows
//! are kept as written.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

pub const MAX_ROW: u32 = 1_048_576;
pub const MAX_COLUMN: u32 = 16_384;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("formula '{0}' does not start with '='")]
    MissingMarker(String),
    #[error("unterminated string literal in '{0}'")]
    UnterminatedString(String),
    #[error("unterminated quoted sheet name in '{0}'")]
    UnterminatedSheetName(String),
    #[error("unbalanced brackets in '{0}'")]
    UnbalancedBrackets(String),
    #[error("row {row} shifted by {delta} falls outside the sheet")]
    RowOutOfRange { row: u32, delta: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `column` keeps its optional `$` so it can be written back verbatim.
    Cell {
        column: String,
        row: u32,
        row_locked: bool,
    },
    /// One side of a whole-row range such as `3:5`.
    Row { row: u32, locked: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaTemplate {
    text: String,
    anchor_row: u32,
    segments: Vec<Segment>,
}

fn cell_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        Regex::new(r"^(\$?[A-Za-z]{1,3})(\$?)([0-9]{1,7})$")
            .expect("valid cell reference pattern")
    })
}

fn row_range_pattern() -> &'static Regex {
    static ROWS: OnceLock<Regex> = OnceLock::new();
    ROWS.get_or_init(|| {
        Regex::new(r"^(\$?)([0-9]{1,7}):(\$?)([0-9]{1,7})").expect("valid row range pattern")
    })
}

/// 1-based column number for letters such as `A` or `XFD`.
pub fn column_index(letters: &str) -> Option<u32> {
    let mut index = 0u32;
    for ch in letters.trim_start_matches('$').chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    (1..=MAX_COLUMN).contains(&index).then_some(index)
}

pub fn column_letters(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '$' | '\\')
}

impl FormulaTemplate {
    /// Tokenises `text` (which must start with `=`) anchored at `anchor_row`.
    pub fn parse(text: &str, anchor_row: u32) -> Result<Self, FormulaError> {
        let body = text
            .strip_prefix('=')
            .ok_or_else(|| FormulaError::MissingMarker(text.to_string()))?;
        let chars: Vec<char> = body.chars().collect();
        let mut segments = Vec::new();
        let mut literal = String::from("=");
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            match ch {
                '"' => {
                    i = copy_quoted(&chars, i, '"', &mut literal)
                        .ok_or_else(|| FormulaError::UnterminatedString(text.to_string()))?;
                }
                '\'' => {
                    i = copy_quoted(&chars, i, '\'', &mut literal)
                        .ok_or_else(|| FormulaError::UnterminatedSheetName(text.to_string()))?;
                }
                '[' => {
                    i = copy_bracketed(&chars, i, &mut literal)
                        .ok_or_else(|| FormulaError::UnbalancedBrackets(text.to_string()))?;
                }
                ']' => return Err(FormulaError::UnbalancedBrackets(text.to_string())),
                '#' => {
                    literal.push(ch);
                    i += 1;
                    while i < chars.len()
                        && (chars[i].is_ascii_alphanumeric() || "/!?".contains(chars[i]))
                    {
                        literal.push(chars[i]);
                        i += 1;
                    }
                }
                c if c.is_ascii_digit()
                    || (c == '$' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
                {
                    i = read_numeric(&chars, i, &mut literal, &mut segments);
                }
                c if c.is_ascii_alphabetic() || c == '_' || c == '$' || c == '\\' => {
                    let start = i;
                    while i < chars.len() && is_name_char(chars[i]) {
                        i += 1;
                    }
                    let token: String = chars[start..i].iter().collect();
                    let next = chars.get(i).copied();
                    match parse_cell(&token) {
                        Some(cell) if !matches!(next, Some('(') | Some('!')) => {
                            flush(&mut literal, &mut segments);
                            segments.push(cell);
                        }
                        _ => literal.push_str(&token),
                    }
                }
                _ => {
                    literal.push(ch);
                    i += 1;
                }
            }
        }
        flush(&mut literal, &mut segments);

        Ok(FormulaTemplate {
            text: text.to_string(),
            anchor_row,
            segments,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn anchor_row(&self) -> u32 {
        self.anchor_row
    }

    /// Number of row-bearing references found in the template.
    pub fn reference_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| !matches!(segment, Segment::Literal(_)))
            .count()
    }

    /// Renders the formula as it reads when filled down to `row`.
    pub fn translate_to_row(&self, row: u32) -> Result<String, FormulaError> {
        let delta = i64::from(row) - i64::from(self.anchor_row);
        let mut out = String::with_capacity(self.text.len() + 4);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Cell {
                    column,
                    row,
                    row_locked,
                } => {
                    out.push_str(column);
                    if *row_locked {
                        out.push('$');
                        out.push_str(&row.to_string());
                    } else {
                        out.push_str(&shift_row(*row, delta)?.to_string());
                    }
                }
                Segment::Row { row, locked } => {
                    if *locked {
                        out.push('$');
                        out.push_str(&row.to_string());
                    } else {
                        out.push_str(&shift_row(*row, delta)?.to_string());
                    }
                }
            }
        }
        Ok(out)
    }
}

fn shift_row(row: u32, delta: i64) -> Result<u32, FormulaError> {
    let shifted = i64::from(row) + delta;
    if shifted < 1 || shifted > i64::from(MAX_ROW) {
        return Err(FormulaError::RowOutOfRange { row, delta });
    }
    Ok(shifted as u32)
}

fn flush(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

fn parse_cell(token: &str) -> Option<Segment> {
    let caps = cell_pattern().captures(token)?;
    let column = caps.get(1)?.as_str();
    let row: u32 = caps.get(3)?.as_str().parse().ok()?;
    column_index(column)?;
    if !(1..=MAX_ROW).contains(&row) {
        return None;
    }
    Some(Segment::Cell {
        column: column.to_string(),
        row,
        row_locked: !caps.get(2)?.as_str().is_empty(),
    })
}

/// Copies a quoted run starting at `start` (the opening quote). A doubled
/// quote is an escaped quote. Returns the index after the closing quote.
fn copy_quoted(chars: &[char], start: usize, quote: char, out: &mut String) -> Option<usize> {
    out.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        out.push(chars[i]);
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                out.push(quote);
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

fn copy_bracketed(chars: &[char], start: usize, out: &mut String) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        let ch = chars[i];
        out.push(ch);
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Reads either a whole-row range (`3:5`, `$3:$5`) or a numeric literal.
fn read_numeric(
    chars: &[char],
    start: usize,
    literal: &mut String,
    segments: &mut Vec<Segment>,
) -> usize {
    let rest: String = chars[start..].iter().collect();
    if let Some(caps) = row_range_pattern().captures(&rest) {
        let matched = caps.get(0).map(|m| m.as_str().chars().count()).unwrap_or(0);
        let follows_name = chars
            .get(start + matched)
            .is_some_and(|&c| is_name_char(c) || c == '(');
        let first: Option<u32> = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let second: Option<u32> = caps.get(4).and_then(|m| m.as_str().parse().ok());
        if let (false, Some(first), Some(second)) = (follows_name, first, second) {
            if (1..=MAX_ROW).contains(&first) && (1..=MAX_ROW).contains(&second) {
                flush(literal, segments);
                segments.push(Segment::Row {
                    row: first,
                    locked: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
                });
                literal.push(':');
                flush(literal, segments);
                segments.push(Segment::Row {
                    row: second,
                    locked: caps.get(3).is_some_and(|m| !m.as_str().is_empty()),
                });
                return start + matched;
            }
        }
    }

    let mut i = start;
    while i < chars.len() {
        let ch = chars[i];
        if ch.is_ascii_digit() || ch == '.' || ch == '$' {
            literal.push(ch);
            i += 1;
        } else if matches!(ch, 'e' | 'E')
            && chars
                .get(i + 1)
                .is_some_and(|&n| n.is_ascii_digit() || n == '+' || n == '-')
        {
            literal.push(ch);
            literal.push(chars[i + 1]);
            i += 2;
        } else {
            break;
        }
    }
    i
}
