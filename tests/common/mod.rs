#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};
use umya_spreadsheet::{Spreadsheet, Worksheet};

pub const DATE_FORMAT: &str = "dd.mm.yyyy";
pub const AMOUNT_FORMAT: &str = "#,##0.00";
pub const TAX_FILL: &str = "FFFFFF00";

/// Serial numbers for January 2024 dates (2024-01-01 is 45292).
pub fn jan_2024(day: u32) -> f64 {
    45291.0 + f64::from(day)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub fn save(&self, name: &str, book: &Spreadsheet) -> PathBuf {
        let path = self.file(name);
        umya_spreadsheet::writer::xlsx::write(book, &path).expect("write fixture workbook");
        path
    }

    /// Target with [ID, Name, Date, Amount, Tax], Tax = `D*0.19`, two rows.
    pub fn invoice_target(&self) -> PathBuf {
        self.save("target.xlsx", &invoice_target())
    }

    /// Source with [Ref, FullName, TxDate, Net] and three rows.
    pub fn invoice_source(&self) -> PathBuf {
        self.save("source.xlsx", &invoice_source())
    }
}

pub fn write_headers(sheet: &mut Worksheet, headers: &[&str]) {
    for (idx, header) in headers.iter().enumerate() {
        sheet
            .get_cell_mut((idx as u32 + 1, 1))
            .set_value_string(*header);
    }
}

fn styled_row(sheet: &mut Worksheet, row: u32, id: f64, name: &str, day: u32, amount: f64) {
    sheet.get_cell_mut((1, row)).set_value_number(id);
    sheet.get_cell_mut((2, row)).set_value_string(name);
    let date = sheet.get_cell_mut((3, row));
    date.set_value_number(jan_2024(day));
    date.get_style_mut()
        .get_number_format_mut()
        .set_format_code(DATE_FORMAT);
    let amount_cell = sheet.get_cell_mut((4, row));
    amount_cell.set_value_number(amount);
    amount_cell
        .get_style_mut()
        .get_number_format_mut()
        .set_format_code(AMOUNT_FORMAT);
    let tax = sheet.get_cell_mut((5, row));
    tax.set_formula(format!("D{row}*0.19"));
    tax.get_style_mut().set_background_color(TAX_FILL);
}

pub fn invoice_target() -> Spreadsheet {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book.get_active_sheet_mut();
    write_headers(sheet, &["ID", "Name", "Date", "Amount", "Tax"]);
    styled_row(sheet, 2, 1.0, "Alice", 10, 100.0);
    styled_row(sheet, 3, 2.0, "Bob", 20, 200.0);
    book
}

pub fn invoice_source() -> Spreadsheet {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book.get_active_sheet_mut();
    write_headers(sheet, &["Ref", "FullName", "TxDate", "Net"]);
    let rows = [
        (10.0, "Carol", 5, 50.0),
        (11.0, "Dave", 15, 150.0),
        (12.0, "Erin", 25, 250.0),
    ];
    for (offset, (id, name, day, net)) in rows.into_iter().enumerate() {
        let row = offset as u32 + 2;
        sheet.get_cell_mut((1, row)).set_value_number(id);
        sheet.get_cell_mut((2, row)).set_value_string(name);
        let date = sheet.get_cell_mut((3, row));
        date.set_value_number(jan_2024(day));
        date.get_style_mut()
            .get_number_format_mut()
            .set_format_code(DATE_FORMAT);
        sheet.get_cell_mut((4, row)).set_value_number(net);
    }
    book
}

pub fn open(path: &Path) -> Spreadsheet {
    umya_spreadsheet::reader::xlsx::read(path).expect("read workbook")
}

pub fn text_at(sheet: &Worksheet, column: u32, row: u32) -> String {
    sheet
        .get_cell((column, row))
        .map(|cell| cell.get_value().to_string())
        .unwrap_or_default()
}

pub fn number_at(sheet: &Worksheet, column: u32, row: u32) -> Option<f64> {
    sheet
        .get_cell((column, row))
        .and_then(|cell| cell.get_value_number())
}

pub fn formula_at(sheet: &Worksheet, column: u32, row: u32) -> String {
    sheet
        .get_cell((column, row))
        .map(|cell| cell.get_formula().to_string())
        .unwrap_or_default()
}

pub fn format_at(sheet: &Worksheet, column: u32, row: u32) -> Option<String> {
    sheet
        .get_cell((column, row))
        .and_then(|cell| cell.get_style().get_number_format())
        .map(|format| format.get_format_code().to_string())
}

pub fn fill_at(sheet: &Worksheet, column: u32, row: u32) -> Option<String> {
    sheet
        .get_cell((column, row))
        .and_then(|cell| cell.get_style().get_background_color())
        .map(|color| color.get_argb().to_string())
}
