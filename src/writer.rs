//! Style-preserving write pass.
//!
//! Rows 2.. of the sheet are rewritten from the sorted dataset. Formula
//! columns receive their template translated to the row; every other column
//! receives the dataset value. Each written cell then gets its column's
//! template style, so formatting never depends on the value that landed in it.

use std::collections::HashMap;

use log::{debug, warn};
use umya_spreadsheet::Worksheet;

use crate::{
    data::Value,
    dates,
    formula::{FormulaError, FormulaTemplate},
    merge::Dataset,
    template::{ColumnTemplate, SheetTemplate, TEMPLATE_ROW},
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub rows_written: usize,
    pub formula_cells: usize,
    pub formula_failures: usize,
    pub warnings: Vec<String>,
}

enum ColumnPlan<'a> {
    Formula {
        template: &'a ColumnTemplate,
        parsed: Result<FormulaTemplate, FormulaError>,
    },
    Value {
        template: Option<&'a ColumnTemplate>,
        dataset_index: Option<usize>,
    },
}

fn build_plan<'a>(
    template: &'a SheetTemplate,
    dataset: &Dataset,
) -> Vec<(u32, ColumnPlan<'a>)> {
    let header_names: HashMap<u32, &str> = template
        .headers
        .iter()
        .map(|header| (header.column, header.name.as_str()))
        .collect();

    (1..=template.last_column())
        .filter_map(|column| {
            let column_template = template.column(column);
            let header = header_names.get(&column).copied();
            if column_template.is_none() && header.is_none() {
                return None;
            }
            let formula = column_template.and_then(|t| t.formula.as_deref().map(|f| (t, f)));
            let plan = match formula {
                Some((formula_template, formula)) => ColumnPlan::Formula {
                    template: formula_template,
                    parsed: FormulaTemplate::parse(formula, TEMPLATE_ROW),
                },
                None => ColumnPlan::Value {
                    template: column_template,
                    dataset_index: header.and_then(|name| dataset.column_index(name)),
                },
            };
            Some((column, plan))
        })
        .collect()
}

/// Writes `dataset` into rows 2.. of `sheet`. The header row is not touched.
pub fn write_dataset(
    sheet: &mut Worksheet,
    template: &SheetTemplate,
    dataset: &Dataset,
) -> WriteReport {
    let plan = build_plan(template, dataset);
    let mut report = WriteReport::default();
    let mut failures: HashMap<u32, (usize, String)> = HashMap::new();

    for (offset, row) in dataset.rows.iter().enumerate() {
        let sheet_row = TEMPLATE_ROW + offset as u32;
        for (column, column_plan) in &plan {
            let column = *column;
            let style_source = match column_plan {
                ColumnPlan::Formula { template, parsed } => {
                    let translated = parsed
                        .as_ref()
                        .map_err(Clone::clone)
                        .and_then(|formula| formula.translate_to_row(sheet_row));
                    match translated {
                        Ok(text) => {
                            write_formula(sheet, column, sheet_row, &text);
                            report.formula_cells += 1;
                        }
                        Err(err) => {
                            report.formula_failures += 1;
                            let entry = failures.entry(column).or_insert((0, err.to_string()));
                            entry.0 += 1;
                        }
                    }
                    Some(*template)
                }
                ColumnPlan::Value {
                    template,
                    dataset_index,
                } => {
                    let value =
                        dataset_index.and_then(|idx| row.get(idx).and_then(Option::as_ref));
                    write_value(sheet, column, sheet_row, value);
                    *template
                }
            };
            if let Some(column_template) = style_source {
                sheet
                    .get_cell_mut((column, sheet_row))
                    .set_style(column_template.style.clone());
            }
        }
        report.rows_written += 1;
    }

    let mut failed_columns: Vec<_> = failures.into_iter().collect();
    failed_columns.sort_by_key(|(column, _)| *column);
    for (column, (count, first_error)) in failed_columns {
        let name = template
            .column(column)
            .and_then(|t| t.name.clone())
            .unwrap_or_else(|| crate::formula::column_letters(column));
        let message = format!(
            "Formula in column '{name}' not translated for {count} row(s) ({first_error}); previous cell contents kept"
        );
        warn!("{message}");
        report.warnings.push(message);
    }

    debug!(
        "Wrote {} row(s), {} formula cell(s)",
        report.rows_written, report.formula_cells
    );
    report
}

fn write_formula(sheet: &mut Worksheet, column: u32, row: u32, formula: &str) {
    sheet.remove_cell((column, row));
    let body = formula.strip_prefix('=').unwrap_or(formula);
    sheet.get_cell_mut((column, row)).set_formula(body.to_string());
}

fn write_value(sheet: &mut Worksheet, column: u32, row: u32, value: Option<&Value>) {
    sheet.remove_cell((column, row));
    let Some(value) = value else {
        return;
    };
    let cell = sheet.get_cell_mut((column, row));
    match value {
        Value::Text(text) => {
            cell.set_value_string(text.clone());
        }
        Value::Number(number) => {
            cell.set_value_number(*number);
        }
        Value::Boolean(flag) => {
            cell.set_value_bool(*flag);
        }
        Value::DateTime(dt) => {
            cell.set_value_number(dates::to_serial(dt));
        }
    }
}
