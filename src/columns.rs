//! Column listing for a target workbook.
//!
//! Shows what a merge would do with each target column: whether it takes
//! source data or is regenerated from a formula, and which number format its
//! template cell carries.

use std::fmt::Write as _;

use anyhow::Result;
use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::{
    cli::ColumnsArgs,
    template::{SheetTemplate, TemplateSummary},
    workbook,
};

#[derive(Debug, Serialize)]
struct ColumnListing {
    columns: Vec<TemplateSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_columns: Option<Vec<String>>,
}

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let book = workbook::open(&args.target)?;
    let template = SheetTemplate::extract(book.get_active_sheet());
    let columns = template.summaries();

    let source_columns = match &args.source {
        Some(path) => {
            let source = workbook::open(path)?;
            let headers = workbook::read_headers(source.get_active_sheet());
            Some(headers.into_iter().map(|h| h.name).collect::<Vec<_>>())
        }
        None => None,
    };

    if args.json {
        let listing = ColumnListing {
            columns,
            source_columns,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if columns.is_empty() {
        info!("{:?} has no header row", args.target);
    } else {
        print!("{}", render_summaries(&columns));
    }
    if let Some(source_columns) = source_columns {
        println!();
        println!("Source columns: {}", source_columns.iter().join(", "));
    }
    Ok(())
}

pub fn render_summaries(columns: &[TemplateSummary]) -> String {
    let headers = ["#", "name", "kind", "format", "formula"].map(String::from);
    let rows = columns
        .iter()
        .map(|column| {
            [
                column.index.to_string(),
                column.name.clone(),
                column.kind.to_string(),
                column.number_format.clone().unwrap_or_default(),
                column.formula.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

/// Left-aligned plain-text table with a dashed rule under the header.
fn render_table<const N: usize>(headers: &[String; N], rows: &[[String; N]]) -> String {
    let mut widths = headers.clone().map(|h| h.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(flatten(cell).chars().count());
        }
    }
    let rule = widths.map(|w| "-".repeat(w.max(3)));
    let widths = widths
        .iter()
        .zip(&rule)
        .map(|(w, r)| (*w).max(r.len()))
        .collect::<Vec<_>>();

    let mut output = String::new();
    for line in std::iter::once(headers)
        .chain(std::iter::once(&rule))
        .chain(rows)
    {
        let rendered = line
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{:<width$}", flatten(cell)))
            .join("  ");
        let _ = writeln!(output, "{}", rendered.trim_end());
    }
    output
}

fn flatten(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}
