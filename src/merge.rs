use log::debug;

use crate::{data::Value, mapping::ColumnMapping};

pub type Row = Vec<Option<Value>>;

/// Rows keyed by a fixed header list. Every row has exactly one slot per
/// header, in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(headers: Vec<String>) -> Self {
        Dataset {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = Option<&Value>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).and_then(|value| value.as_ref()))
    }

    /// Appends a row, padding short rows with nulls and dropping fields past
    /// the last header.
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.headers.len(), None);
        self.rows.push(row);
    }
}

/// Builds one target-shaped row per source row. Unmapped target columns are
/// null in every new row.
pub fn build_new_rows(
    target_headers: &[String],
    mapping: &ColumnMapping,
    source: &Dataset,
) -> Vec<Row> {
    let plan = target_headers
        .iter()
        .map(|target| {
            mapping
                .source_for(target)
                .and_then(|source_name| source.column_index(source_name))
        })
        .collect::<Vec<_>>();
    debug!("Source column plan: {:?}", plan);

    source
        .rows
        .iter()
        .map(|source_row| {
            plan.iter()
                .map(|slot| slot.and_then(|idx| source_row.get(idx).cloned().flatten()))
                .collect()
        })
        .collect()
}

/// Existing rows followed by new rows, each group in its original order.
pub fn merge(existing: Dataset, new_rows: Vec<Row>) -> Dataset {
    let mut merged = existing;
    merged.rows.reserve(new_rows.len());
    for row in new_rows {
        merged.push_row(row);
    }
    merged
}
