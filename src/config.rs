use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sort::SortKey;

/// Optional YAML run configuration:
///
/// ```yaml
/// mappings:
///   Name: FullName
/// sort:
///   - Date
///   - Amount:desc
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub mappings: BTreeMap<String, String>,
    pub sort: Vec<String>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let mut raw = String::new();
        file.read_to_string(&mut raw)
            .with_context(|| format!("Reading config file {path:?}"))?;
        Self::from_yaml(&raw).with_context(|| format!("Parsing config file {path:?}"))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(RunConfig::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn sort_keys(&self) -> Result<Vec<SortKey>> {
        self.sort.iter().map(|spec| SortKey::parse(spec)).collect()
    }

    /// Command-line pairs win over file entries for the same target column.
    pub fn merged_mappings(&self, overrides: &[(String, String)]) -> BTreeMap<String, String> {
        let mut merged = self.mappings.clone();
        for (target, source) in overrides {
            merged.insert(target.clone(), source.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_yaml_reads_mappings_and_sort_keys() {
        let config = RunConfig::from_yaml(
            "mappings:\n  ID: Ref\n  Name: FullName\nsort:\n  - Date\n  - Amount:desc\n",
        )
        .unwrap();
        assert_eq!(config.mappings.get("ID").map(String::as_str), Some("Ref"));
        let keys = config.sort_keys().unwrap();
        assert_eq!(keys[0], SortKey::ascending("Date"));
        assert!(!keys[1].ascending);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(RunConfig::from_yaml("  \n").unwrap(), RunConfig::default());
        assert!(RunConfig::from_yaml("unknown: 1\n").is_err());
    }

    #[test]
    fn overrides_replace_file_entries() {
        let config = RunConfig::from_yaml("mappings:\n  ID: Ref\n").unwrap();
        let merged = config.merged_mappings(&[("ID".into(), "Code".into())]);
        assert_eq!(merged.get("ID").map(String::as_str), Some("Code"));
    }
}
