use log::debug;
use serde::Serialize;
use umya_spreadsheet::{Style, Worksheet};

use crate::workbook::{self, HeaderCell};

/// Row whose cells serve as the style and formula example for each column.
pub const TEMPLATE_ROW: u32 = 2;

/// Formatting and optional formula captured from one template-row cell.
#[derive(Debug, Clone)]
pub struct ColumnTemplate {
    pub name: Option<String>,
    pub index: u32,
    pub style: Style,
    pub formula: Option<String>,
}

impl ColumnTemplate {
    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Cell the formula was captured from, as `(column, row)`.
    pub fn anchor(&self) -> (u32, u32) {
        (self.index, TEMPLATE_ROW)
    }

    pub fn number_format(&self) -> Option<&str> {
        self.style
            .get_number_format()
            .map(|format| format.get_format_code())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub index: u32,
    pub name: String,
    pub kind: &'static str,
    pub number_format: Option<String>,
    pub formula: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SheetTemplate {
    pub headers: Vec<HeaderCell>,
    pub columns: Vec<ColumnTemplate>,
}

impl SheetTemplate {
    /// Reads the header row and, when the sheet has a second row, the style
    /// and formula of each cell in it. Read-only.
    pub fn extract(sheet: &Worksheet) -> Self {
        let headers = workbook::read_headers(sheet);
        let mut columns = Vec::new();
        if sheet.get_highest_row() >= TEMPLATE_ROW {
            for index in 1..=sheet.get_highest_column() {
                let Some(cell) = sheet.get_cell((index, TEMPLATE_ROW)) else {
                    continue;
                };
                let formula = if cell.is_formula() {
                    Some(format!("={}", cell.get_formula()))
                } else {
                    let value = cell.get_value();
                    (cell.get_data_type() != "n" && value.starts_with('='))
                        .then(|| value.to_string())
                };
                let name = headers
                    .iter()
                    .find(|header| header.column == index)
                    .map(|header| header.name.clone());
                columns.push(ColumnTemplate {
                    name,
                    index,
                    style: cell.get_style().clone(),
                    formula,
                });
            }
        }
        debug!(
            "Captured {} column template(s), {} formula column(s)",
            columns.len(),
            columns.iter().filter(|c| c.is_formula()).count()
        );
        SheetTemplate { headers, columns }
    }

    pub fn header_names(&self) -> Vec<String> {
        self.headers.iter().map(|h| h.name.clone()).collect()
    }

    pub fn column(&self, index: u32) -> Option<&ColumnTemplate> {
        self.columns.iter().find(|template| template.index == index)
    }

    pub fn is_formula_column(&self, name: &str) -> bool {
        self.headers
            .iter()
            .find(|header| header.name == name)
            .and_then(|header| self.column(header.column))
            .is_some_and(ColumnTemplate::is_formula)
    }

    /// Header names that may receive source data.
    pub fn mappable_columns(&self) -> Vec<String> {
        self.headers
            .iter()
            .filter(|header| !self.is_formula_column(&header.name))
            .map(|header| header.name.clone())
            .collect()
    }

    /// Highest column the writer has to touch in each data row.
    pub fn last_column(&self) -> u32 {
        let header_max = self.headers.iter().map(|h| h.column).max().unwrap_or(0);
        let template_max = self.columns.iter().map(|c| c.index).max().unwrap_or(0);
        header_max.max(template_max)
    }

    pub fn summaries(&self) -> Vec<TemplateSummary> {
        (1..=self.last_column())
            .filter_map(|index| {
                let header = self.headers.iter().find(|h| h.column == index);
                let template = self.column(index);
                if header.is_none() && template.is_none() {
                    return None;
                }
                let kind = match template {
                    Some(t) if t.is_formula() => "formula",
                    Some(_) => "value",
                    None => "unstyled",
                };
                Some(TemplateSummary {
                    index,
                    name: header.map(|h| h.name.clone()).unwrap_or_default(),
                    kind,
                    number_format: template.and_then(|t| t.number_format().map(str::to_string)),
                    formula: template.and_then(|t| t.formula.clone()),
                })
            })
            .collect()
    }
}
