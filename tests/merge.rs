mod common;

use std::{collections::BTreeMap, fs};

use anyhow::Result;
use common::{
    AMOUNT_FORMAT, DATE_FORMAT, TAX_FILL, TestWorkspace, fill_at, format_at, formula_at,
    jan_2024, number_at, open, text_at, write_headers,
};
use sheet_merge::{
    pipeline::{MergeSession, merge_files},
    prompt::{DefaultResolver, PresetResolver},
    sort::SortKey,
    workbook::MergeError,
};

fn invoice_mapping(target: &str, _default: &str) -> Result<String> {
    Ok(match target {
        "ID" => "Ref",
        "Name" => "FullName",
        "Date" => "TxDate",
        "Amount" => "Net",
        _ => "",
    }
    .to_string())
}

#[test]
fn scenario_merge_sorts_by_date_and_replicates_formula() {
    let workspace = TestWorkspace::new();
    let target = workspace.invoice_target();
    let source = workspace.invoice_source();

    let mut resolver = invoice_mapping;
    let report = merge_files(
        &source,
        &target,
        None,
        &mut resolver,
        &[SortKey::ascending("Date")],
    )
    .expect("merge succeeds");

    assert_eq!(report.existing_rows, 2);
    assert_eq!(report.new_rows, 3);
    assert_eq!(report.total_rows, 5);
    assert_eq!(report.formula_cells, 5);
    assert_eq!(report.date_columns, vec!["Date".to_string()]);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let book = open(&target);
    let sheet = book.get_active_sheet();
    let headers = (1..=5).map(|c| text_at(sheet, c, 1)).collect::<Vec<_>>();
    assert_eq!(headers, ["ID", "Name", "Date", "Amount", "Tax"]);

    let names = (2..=6).map(|r| text_at(sheet, 2, r)).collect::<Vec<_>>();
    assert_eq!(names, ["Carol", "Alice", "Dave", "Bob", "Erin"]);
    let days = [5, 10, 15, 20, 25];
    for (offset, day) in days.into_iter().enumerate() {
        let row = offset as u32 + 2;
        assert_eq!(number_at(sheet, 3, row), Some(jan_2024(day)), "date in row {row}");
        assert_eq!(formula_at(sheet, 5, row), format!("D{row}*0.19"));
        assert_eq!(format_at(sheet, 3, row).as_deref(), Some(DATE_FORMAT));
        assert_eq!(format_at(sheet, 4, row).as_deref(), Some(AMOUNT_FORMAT));
        assert_eq!(fill_at(sheet, 5, row).as_deref(), Some(TAX_FILL));
    }
    assert_eq!(number_at(sheet, 1, 2), Some(10.0));
    assert_eq!(number_at(sheet, 4, 6), Some(250.0));
}

#[test]
fn unmapped_column_stays_empty_for_new_rows_only() {
    let workspace = TestWorkspace::new();
    let target = workspace.invoice_target();
    let source = workspace.invoice_source();

    let mut resolver = |target: &str, default: &str| -> Result<String> {
        if target == "Amount" {
            Ok(String::new())
        } else {
            invoice_mapping(target, default)
        }
    };
    let report = merge_files(&source, &target, None, &mut resolver, &[]).expect("merge");
    assert_eq!(report.unmapped, vec!["Amount".to_string()]);

    let book = open(&target);
    let sheet = book.get_active_sheet();
    assert_eq!(number_at(sheet, 4, 2), Some(100.0));
    assert_eq!(number_at(sheet, 4, 3), Some(200.0));
    for row in 4..=6 {
        assert_eq!(text_at(sheet, 4, row), "", "amount in row {row}");
        assert_eq!(formula_at(sheet, 5, row), format!("D{row}*0.19"));
        assert_eq!(format_at(sheet, 4, row).as_deref(), Some(AMOUNT_FORMAT));
    }
    // no sort keys keeps existing rows first, then source order
    let names = (2..=6).map(|r| text_at(sheet, 2, r)).collect::<Vec<_>>();
    assert_eq!(names, ["Alice", "Bob", "Carol", "Dave", "Erin"]);
}

#[test]
fn unknown_source_answer_is_reported_and_left_empty() {
    let workspace = TestWorkspace::new();
    let target = workspace.invoice_target();
    let source = workspace.invoice_source();

    let presets = BTreeMap::from([
        ("ID".to_string(), "Ref".to_string()),
        ("Name".to_string(), "Nickname".to_string()),
    ]);
    let mut fallback = DefaultResolver;
    let mut resolver = PresetResolver::new(presets, &mut fallback);
    let report = merge_files(&source, &target, None, &mut resolver, &[]).expect("merge");

    assert_eq!(report.mapping.source_for("ID"), Some("Ref"));
    assert_eq!(report.unmapped, ["Name", "Date", "Amount"]);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("Nickname"));
}

#[test]
fn descending_sort_and_output_path_leave_target_untouched() {
    let workspace = TestWorkspace::new();
    let target = workspace.invoice_target();
    let source = workspace.invoice_source();
    let output = workspace.file("merged.xlsx");

    let mut resolver = invoice_mapping;
    let report = merge_files(
        &source,
        &target,
        Some(&output),
        &mut resolver,
        &[SortKey::parse("Amount:desc").unwrap()],
    )
    .expect("merge");
    assert_eq!(report.output, output);

    let original = open(&target);
    assert_eq!(text_at(original.get_active_sheet(), 2, 4), "");

    let merged = open(&output);
    let sheet = merged.get_active_sheet();
    let amounts = (2..=6).map(|r| number_at(sheet, 4, r)).collect::<Vec<_>>();
    assert_eq!(
        amounts,
        [Some(250.0), Some(200.0), Some(150.0), Some(100.0), Some(50.0)]
    );
}

#[test]
fn session_exposes_mappable_columns_without_formula_columns() {
    let workspace = TestWorkspace::new();
    let target = workspace.invoice_target();
    let source = workspace.invoice_source();

    let session = MergeSession::open(&source, &target).expect("open");
    assert_eq!(session.mappable_columns(), ["ID", "Name", "Date", "Amount"]);
    assert_eq!(session.source_columns(), ["Ref", "FullName", "TxDate", "Net"]);
    assert!(session.template().is_formula_column("Tax"));
}

#[test]
fn missing_input_fails_before_anything_is_written() {
    let workspace = TestWorkspace::new();
    let target = workspace.invoice_target();
    let missing = workspace.file("nope.xlsx");

    let mut resolver = DefaultResolver;
    let err = merge_files(&missing, &target, None, &mut resolver, &[]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MergeError>(),
        Some(MergeError::FileNotFound(path)) if path == &missing
    ));
    assert_eq!(text_at(open(&target).get_active_sheet(), 2, 4), "");
}

#[test]
fn header_only_target_receives_unstyled_rows() {
    let workspace = TestWorkspace::new();
    let mut book = umya_spreadsheet::new_file();
    write_headers(book.get_active_sheet_mut(), &["Ref", "FullName"]);
    let target = workspace.save("bare.xlsx", &book);
    let source = workspace.invoice_source();

    let mut resolver = DefaultResolver;
    let report = merge_files(&source, &target, None, &mut resolver, &[]).expect("merge");
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.formula_cells, 0);

    let merged = open(&target);
    let sheet = merged.get_active_sheet();
    assert_eq!(text_at(sheet, 2, 2), "Carol");
    assert_eq!(number_at(sheet, 1, 4), Some(12.0));
    assert_eq!(fill_at(sheet, 1, 2), None);
}

#[test]
fn broken_template_formula_is_reported_per_column() {
    let workspace = TestWorkspace::new();
    let mut book = common::invoice_target();
    let sheet = book.get_active_sheet_mut();
    sheet.get_cell_mut((5, 2)).set_formula("D2&\"open");
    let target = workspace.save("broken.xlsx", &book);
    let source = workspace.invoice_source();

    let mut resolver = invoice_mapping;
    let report = merge_files(&source, &target, None, &mut resolver, &[]).expect("merge");
    assert_eq!(report.formula_cells, 0);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("'Tax'"));
    assert!(report.warnings[0].contains("5 row(s)"));
}

#[test]
fn uncached_formula_in_value_column_is_read_as_empty() {
    let workspace = TestWorkspace::new();
    let mut book = common::invoice_target();
    let sheet = book.get_active_sheet_mut();
    sheet.remove_cell((2, 3));
    sheet.get_cell_mut((2, 3)).set_formula("A3&\"x\"");
    let target = workspace.save("uncached.xlsx", &book);
    let source = workspace.invoice_source();

    let mut resolver = invoice_mapping;
    merge_files(&source, &target, None, &mut resolver, &[]).expect("merge");

    let merged = open(&target);
    let sheet = merged.get_active_sheet();
    assert_eq!(text_at(sheet, 2, 3), "");
    assert_eq!(formula_at(sheet, 2, 3), "");
    assert_eq!(number_at(sheet, 4, 3), Some(200.0));
    assert_eq!(text_at(sheet, 2, 4), "Carol");
}

#[test]
fn failed_save_leaves_target_and_directory_unchanged() {
    let workspace = TestWorkspace::new();
    let target = workspace.invoice_target();
    let source = workspace.invoice_source();
    let before = fs::read(&target).expect("read target bytes");
    // the parent of this path is a regular file
    let output = target.join("merged.xlsx");

    let mut resolver = invoice_mapping;
    let err = merge_files(&source, &target, Some(&output), &mut resolver, &[]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MergeError>(),
        Some(MergeError::WriteFailure { .. } | MergeError::PermissionDenied(_))
    ));

    assert_eq!(fs::read(&target).expect("reread target bytes"), before);
    let leftovers = fs::read_dir(workspace.path())
        .expect("list workspace")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".sheet-merge-"))
        .count();
    assert_eq!(leftovers, 0);
}
