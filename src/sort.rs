use std::cmp::Ordering;

use anyhow::{Result, anyhow, bail};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, ValueFamily, parse_date_like},
    merge::{Dataset, Row},
};

pub const MAX_SORT_KEYS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub ascending: bool,
}

impl SortKey {
    pub fn ascending(column: &str) -> Self {
        SortKey {
            column: column.to_string(),
            ascending: true,
        }
    }

    /// Parses `column[:asc|desc]`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (column, direction) = match spec.rsplit_once(':') {
            Some((column, direction))
                if matches!(direction.trim().to_ascii_lowercase().as_str(), "asc" | "desc") =>
            {
                (column, direction.trim())
            }
            _ => (spec, "asc"),
        };
        let column = column.trim();
        if column.is_empty() {
            return Err(anyhow!("Sort key is missing a column"));
        }
        Ok(SortKey {
            column: column.to_string(),
            ascending: direction.eq_ignore_ascii_case("asc"),
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SortOutcome {
    /// Key columns that were sorted by their text form.
    pub text_fallback: Vec<String>,
    /// Key columns whose date-like text was converted to date/times.
    pub coerced_dates: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct SortInstruction {
    index: usize,
    ascending: bool,
    as_text: bool,
}

#[derive(Debug)]
enum SortCell {
    Null,
    Natural(Value),
    Text(String),
}

/// Stable sort of `dataset` by up to two keys. Nulls sort last in either
/// direction; a key column mixing text with numbers or dates is compared by
/// its text form.
pub fn sort_dataset(dataset: &mut Dataset, keys: &[SortKey]) -> Result<SortOutcome> {
    if keys.len() > MAX_SORT_KEYS {
        bail!(
            "At most {MAX_SORT_KEYS} sort keys are supported, got {}",
            keys.len()
        );
    }
    let mut outcome = SortOutcome::default();
    let mut plan = Vec::with_capacity(keys.len());

    for key in keys {
        let Some(index) = dataset.column_index(&key.column) else {
            let message = format!("Sort column '{}' not found; key ignored", key.column);
            warn!("{message}");
            outcome.warnings.push(message);
            continue;
        };
        if coerce_date_like(dataset, index) {
            info!("Interpreting '{}' as dates for sorting", key.column);
            outcome.coerced_dates.push(key.column.clone());
        }
        let as_text = has_mixed_families(dataset, index);
        if as_text {
            let message = format!(
                "Mixed value types in sort column '{}'; sorting as text",
                key.column
            );
            warn!("{message}");
            outcome.warnings.push(message);
            outcome.text_fallback.push(key.column.clone());
        }
        plan.push(SortInstruction {
            index,
            ascending: key.ascending,
            as_text,
        });
    }

    if plan.is_empty() {
        return Ok(outcome);
    }

    let rows = std::mem::take(&mut dataset.rows);
    let mut keyed: Vec<(Vec<SortCell>, usize, Row)> = rows
        .into_iter()
        .enumerate()
        .map(|(ordinal, row)| (sort_cells(&row, &plan), ordinal, row))
        .collect();
    keyed.sort_by(|a, b| compare_rows(&a.0, &b.0, &plan).then(a.1.cmp(&b.1)));
    dataset.rows = keyed.into_iter().map(|(_, _, row)| row).collect();
    Ok(outcome)
}

fn sort_cells(row: &Row, plan: &[SortInstruction]) -> Vec<SortCell> {
    plan.iter()
        .map(|directive| match row.get(directive.index).and_then(Option::as_ref) {
            None => SortCell::Null,
            Some(value) if directive.as_text => SortCell::Text(value.as_display()),
            Some(value) => SortCell::Natural(value.clone()),
        })
        .collect()
}

fn compare_rows(a: &[SortCell], b: &[SortCell], plan: &[SortInstruction]) -> Ordering {
    for (idx, directive) in plan.iter().enumerate() {
        let ord = match (&a[idx], &b[idx]) {
            (SortCell::Null, SortCell::Null) => Ordering::Equal,
            (SortCell::Null, _) => return Ordering::Greater,
            (_, SortCell::Null) => return Ordering::Less,
            (SortCell::Text(left), SortCell::Text(right)) => left.cmp(right),
            (SortCell::Natural(left), SortCell::Natural(right)) => {
                left.natural_cmp(right).unwrap_or(Ordering::Equal)
            }
            _ => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if directive.ascending {
                ord
            } else {
                ord.reverse()
            };
        }
    }
    Ordering::Equal
}

fn has_mixed_families(dataset: &Dataset, index: usize) -> bool {
    let mut family: Option<ValueFamily> = None;
    for value in dataset.column(index).flatten() {
        match family {
            None => family = Some(value.family()),
            Some(seen) if seen != value.family() => return true,
            Some(_) => {}
        }
    }
    false
}

/// Converts text that parses as a day-first date into date/time values.
/// Returns whether anything was converted.
fn coerce_date_like(dataset: &mut Dataset, index: usize) -> bool {
    let mut converted = false;
    for row in dataset.rows.iter_mut() {
        if let Some(Value::Text(text)) = &row[index] {
            if let Some(parsed) = parse_date_like(text) {
                row[index] = Some(Value::DateTime(parsed));
                converted = true;
            }
        }
    }
    converted
}
