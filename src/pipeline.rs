use std::path::{Path, PathBuf};

use anyhow::Result;
use itertools::Itertools;
use log::{debug, info};
use umya_spreadsheet::Spreadsheet;

use crate::{
    cli::MergeArgs,
    config::RunConfig,
    dates,
    mapping::{self, ColumnMapping, ColumnResolver, MappingOutcome},
    merge::{self, Dataset},
    prompt::{DefaultResolver, PresetResolver, PromptResolver},
    sort::{self, SortKey},
    template::SheetTemplate,
    workbook, writer,
};

/// What one merge run did.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub existing_rows: usize,
    pub new_rows: usize,
    pub total_rows: usize,
    pub mapping: ColumnMapping,
    pub unmapped: Vec<String>,
    pub sort_keys: Vec<SortKey>,
    pub date_columns: Vec<String>,
    pub formula_cells: usize,
    pub warnings: Vec<String>,
    pub output: PathBuf,
}

/// A target and source loaded into memory, waiting for a column mapping.
pub struct MergeSession {
    target_path: PathBuf,
    book: Spreadsheet,
    template: SheetTemplate,
    existing: Dataset,
    source: Dataset,
    mapping: Option<MappingOutcome>,
}

impl MergeSession {
    /// Loads both workbooks. Both paths are checked before either is read.
    pub fn open(source: &Path, target: &Path) -> Result<Self> {
        workbook::ensure_exists(source)?;
        workbook::ensure_exists(target)?;

        let book = workbook::open(target)?;
        let sheet = book.get_active_sheet();
        let template = SheetTemplate::extract(sheet);
        let existing = workbook::read_dataset(sheet, &template.headers);
        info!(
            "Target {:?}: {} column(s), {} existing row(s)",
            target,
            template.headers.len(),
            existing.len()
        );

        let source_book = workbook::open(source)?;
        let source_sheet = source_book.get_active_sheet();
        let source_headers = workbook::read_headers(source_sheet);
        let source_rows = workbook::read_dataset(source_sheet, &source_headers);
        info!(
            "Source {:?}: {} column(s), {} row(s)",
            source,
            source_headers.len(),
            source_rows.len()
        );

        Ok(MergeSession {
            target_path: target.to_path_buf(),
            book,
            template,
            existing,
            source: source_rows,
            mapping: None,
        })
    }

    pub fn template(&self) -> &SheetTemplate {
        &self.template
    }

    pub fn header_names(&self) -> Vec<String> {
        self.template.header_names()
    }

    /// Target columns that take source data; formula columns are excluded.
    pub fn mappable_columns(&self) -> Vec<String> {
        self.template.mappable_columns()
    }

    pub fn source_columns(&self) -> &[String] {
        &self.source.headers
    }

    pub fn map_columns<R>(&mut self, resolver: &mut R) -> Result<&MappingOutcome>
    where
        R: ColumnResolver + ?Sized,
    {
        let outcome =
            mapping::resolve_mapping(&self.mappable_columns(), &self.source.headers, resolver)?;
        debug!(
            "Mapped {} column(s), unmapped: [{}]",
            outcome.mapping.len(),
            outcome.unmapped.iter().join(", ")
        );
        let stored = self.mapping.insert(outcome);
        Ok(&*stored)
    }

    /// Merges, sorts and writes the result to `output`. Without a prior
    /// [`MergeSession::map_columns`] every new row is empty.
    pub fn finish(self, keys: &[SortKey], output: Option<&Path>) -> Result<MergeReport> {
        let MergeSession {
            target_path,
            mut book,
            template,
            existing,
            source,
            mapping,
        } = self;
        let outcome = mapping.unwrap_or_default();
        let mut warnings = outcome.warnings;

        let existing_rows = existing.len();
        let new_rows = merge::build_new_rows(&existing.headers, &outcome.mapping, &source);
        let new_count = new_rows.len();
        let mut merged = merge::merge(existing, new_rows);

        let date_columns = dates::serialize_dates(&mut merged);
        let sorted = sort::sort_dataset(&mut merged, keys)?;
        warnings.extend(sorted.warnings);
        dates::deserialize_dates(&mut merged, &date_columns);
        if !keys.is_empty() {
            info!(
                "Sorted {} row(s) by {}",
                merged.len(),
                keys.iter().map(describe_key).join(", ")
            );
        }

        let sheet = book.get_active_sheet_mut();
        let written = writer::write_dataset(sheet, &template, &merged);
        warnings.extend(written.warnings);

        let output = output.map_or_else(|| target_path.clone(), Path::to_path_buf);
        workbook::save(&book, &output)?;
        info!("Saved {} row(s) to {:?}", merged.len(), output);

        Ok(MergeReport {
            existing_rows,
            new_rows: new_count,
            total_rows: merged.len(),
            mapping: outcome.mapping,
            unmapped: outcome.unmapped,
            sort_keys: keys.to_vec(),
            date_columns: date_columns
                .iter()
                .map(|&idx| merged.headers[idx].clone())
                .collect(),
            formula_cells: written.formula_cells,
            warnings,
            output,
        })
    }
}

fn describe_key(key: &SortKey) -> String {
    let direction = if key.ascending { "asc" } else { "desc" };
    format!("{} ({direction})", key.column)
}

/// Runs a whole merge with `resolver` answering the column questions.
/// The target is overwritten unless `output` is given.
pub fn merge_files<R>(
    source: &Path,
    target: &Path,
    output: Option<&Path>,
    resolver: &mut R,
    keys: &[SortKey],
) -> Result<MergeReport>
where
    R: ColumnResolver + ?Sized,
{
    let mut session = MergeSession::open(source, target)?;
    session.map_columns(resolver)?;
    session.finish(keys, output)
}

pub fn execute(args: &MergeArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    let presets = config.merged_mappings(&args.maps);
    let cli_keys = args
        .sort
        .iter()
        .map(|spec| SortKey::parse(spec))
        .collect::<Result<Vec<_>>>()?;
    let configured_keys = if cli_keys.is_empty() {
        config.sort_keys()?
    } else {
        cli_keys
    };

    info!(
        "Merging '{}' into '{}'",
        args.source.display(),
        args.target.display()
    );
    let mut session = MergeSession::open(&args.source, &args.target)?;

    let keys = if args.non_interactive {
        let mut fallback = DefaultResolver;
        let mut resolver = PresetResolver::new(presets, &mut fallback);
        session.map_columns(&mut resolver)?;
        configured_keys
    } else {
        let mut prompt = PromptResolver::stdio();
        prompt.announce_columns(session.source_columns(), &session.header_names())?;
        {
            let mut resolver = PresetResolver::new(presets, &mut prompt);
            session.map_columns(&mut resolver)?;
        }
        if configured_keys.is_empty() {
            prompt.ask_sort_keys(&session.header_names())?
        } else {
            configured_keys
        }
    };

    let report = session.finish(&keys, args.output.as_deref())?;
    println!(
        "Merged {} existing + {} new row(s) into {}",
        report.existing_rows,
        report.new_rows,
        report.output.display()
    );
    if !report.unmapped.is_empty() {
        println!("Unmapped column(s): {}", report.unmapped.join(", "));
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}
