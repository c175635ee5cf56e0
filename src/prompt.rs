//! Resolvers that answer column and sort-key questions.
//!
//! [`PromptResolver`] asks on a line-oriented terminal; [`PresetResolver`]
//! answers from explicit `TARGET=SOURCE` pairs and hands everything else to
//! another resolver, ending in [`DefaultResolver`] for unattended runs.

use std::{
    collections::BTreeMap,
    io::{self, BufRead, StdinLock, Stdout, Write},
};

use anyhow::{Context, Result};

use crate::{mapping::ColumnResolver, sort::SortKey};

/// Marker answer that leaves a column unset.
pub const SKIP_ANSWER: &str = "-";

pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl PromptResolver<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        PromptResolver::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        PromptResolver { input, output }
    }

    /// Prints `question` and returns the trimmed answer; `None` at end of input.
    pub fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{question}").context("Writing prompt")?;
        self.output.flush().context("Flushing prompt")?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Reading answer from input")?;
        if read == 0 {
            writeln!(self.output).ok();
            return Ok(None);
        }
        Ok(Some(line.trim().trim_matches('"').to_string()))
    }

    pub fn announce_columns(&mut self, source: &[String], target: &[String]) -> Result<()> {
        writeln!(self.output, "Source columns: {}", source.join(", "))?;
        writeln!(self.output, "Target columns: {}", target.join(", "))?;
        writeln!(
            self.output,
            "Press Enter to accept the default, '{SKIP_ANSWER}' to leave a column empty."
        )?;
        Ok(())
    }

    /// Asks for a primary and an optional secondary sort key. An empty
    /// primary answer means no sorting.
    pub fn ask_sort_keys(&mut self, headers: &[String]) -> Result<Vec<SortKey>> {
        let mut keys = Vec::new();
        let primary = self.ask(&format!(
            "Primary sort column? ({}) [Enter = no sorting]: ",
            headers.join(", ")
        ))?;
        let Some(primary) = primary.filter(|answer| !answer.is_empty()) else {
            return Ok(keys);
        };
        keys.push(SortKey::parse(&primary)?);
        let secondary = self.ask("Secondary sort column? [Enter = none]: ")?;
        if let Some(secondary) = secondary.filter(|answer| !answer.is_empty()) {
            keys.push(SortKey::parse(&secondary)?);
        }
        Ok(keys)
    }
}

impl<R: BufRead, W: Write> ColumnResolver for PromptResolver<R, W> {
    fn resolve(&mut self, target: &str, default: &str) -> Result<String> {
        let question = if default.is_empty() {
            format!("Source for '{target}'? [Enter = empty]: ")
        } else {
            format!("Source for '{target}'? [default: {default}]: ")
        };
        let answer = self.ask(&question)?;
        Ok(match answer.as_deref() {
            None | Some("") => default.to_string(),
            Some(SKIP_ANSWER) => String::new(),
            Some(chosen) => chosen.to_string(),
        })
    }
}

/// Accepts every default suggestion.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResolver;

impl ColumnResolver for DefaultResolver {
    fn resolve(&mut self, _target: &str, default: &str) -> Result<String> {
        Ok(default.to_string())
    }
}

pub struct PresetResolver<'a> {
    presets: BTreeMap<String, String>,
    fallback: &'a mut dyn ColumnResolver,
}

impl<'a> PresetResolver<'a> {
    pub fn new(presets: BTreeMap<String, String>, fallback: &'a mut dyn ColumnResolver) -> Self {
        PresetResolver { presets, fallback }
    }
}

impl ColumnResolver for PresetResolver<'_> {
    fn resolve(&mut self, target: &str, default: &str) -> Result<String> {
        match self.presets.get(target) {
            Some(source) => Ok(source.clone()),
            None => self.fallback.resolve(target, default),
        }
    }
}
