//! Target-to-source column mapping.
//!
//! Each non-formula target column is offered to a [`ColumnResolver`] together
//! with a default suggestion (the same name when the source has it). The
//! column is mapped only when the answer names an existing source column.

use std::collections::BTreeMap;

use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;

pub trait ColumnResolver {
    /// Returns the chosen source column name, or an empty string to leave the
    /// target column unset.
    fn resolve(&mut self, target: &str, default: &str) -> Result<String>;
}

impl<F> ColumnResolver for F
where
    F: FnMut(&str, &str) -> Result<String>,
{
    fn resolve(&mut self, target: &str, default: &str) -> Result<String> {
        self(target, default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    entries: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn set(&mut self, target: &str, source: &str) {
        self.entries.insert(target.to_string(), source.to_string());
    }

    pub fn source_for(&self, target: &str) -> Option<&str> {
        self.entries.get(target).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of a mapping pass. `warnings` lists answers that named no source
/// column.
#[derive(Debug, Default)]
pub struct MappingOutcome {
    pub mapping: ColumnMapping,
    pub unmapped: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn resolve_mapping<R>(
    target_columns: &[String],
    source_columns: &[String],
    resolver: &mut R,
) -> Result<MappingOutcome>
where
    R: ColumnResolver + ?Sized,
{
    let mut outcome = MappingOutcome::default();
    for target in target_columns {
        let default = if source_columns.iter().any(|source| source == target) {
            target.as_str()
        } else {
            ""
        };
        let answer = resolver.resolve(target, default)?;
        let chosen = answer.trim();
        if chosen.is_empty() {
            debug!("Target column '{target}' left unmapped");
            outcome.unmapped.push(target.clone());
            continue;
        }
        if source_columns.iter().any(|source| source == chosen) {
            debug!("Target column '{target}' <- source column '{chosen}'");
            outcome.mapping.set(target, chosen);
        } else {
            let message =
                format!("Source column '{chosen}' not found; '{target}' stays empty for new rows");
            warn!("{message}");
            outcome.warnings.push(message);
            outcome.unmapped.push(target.clone());
        }
    }
    Ok(outcome)
}
