//! Export Spec Table - Declarative Asset Contracts
//!
//! A spec file is a JSON array of export specs. Table order matters: when
//! several specs match a file, the first one wins.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{read_json, ToolError};

/// One row of the export spec table. Every constraint is optional; an
/// omitted field means the matching check is not run at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    #[serde(default)]
    pub asset_name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub max_file_size_mb: Option<f64>,
    #[serde(default)]
    pub color_space: Option<String>,
    #[serde(default)]
    pub min_dpi: Option<u32>,
    #[serde(default)]
    pub filename_pattern: Option<String>,
}

impl AssetSpec {
    pub fn display_name(&self) -> &str {
        self.asset_name.as_deref().unwrap_or("Unknown")
    }

    fn pattern_matches(&self, filename: &str) -> bool {
        self.filename_pattern
            .as_deref()
            .is_some_and(|p| glob_matches(p, filename))
    }

    fn pattern_with_extension_matches(&self, filename: &str) -> bool {
        match self.filename_pattern.as_deref() {
            Some(p) => {
                let ext = self.format.as_deref().unwrap_or("");
                glob_matches(&format!("{}.{}", p, ext), filename)
            }
            None => false,
        }
    }
}

/// fnmatch-style match. A pattern that does not compile matches nothing.
fn glob_matches(pattern: &str, name: &str) -> bool {
    Pattern::new(pattern).is_ok_and(|p| p.matches(name))
}

/// Explicit filename -> asset_name overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecMapping(pub BTreeMap<String, String>);

impl SpecMapping {
    pub fn load(path: &Path) -> Result<Self, ToolError> {
        read_json("Mapping file", path)
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.0.get(filename).map(String::as_str)
    }
}

/// The loaded spec table. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct SpecTable {
    specs: Vec<AssetSpec>,
}

impl SpecTable {
    pub fn new(specs: Vec<AssetSpec>) -> Self {
        Self { specs }
    }

    pub fn load(path: &Path) -> Result<Self, ToolError> {
        let value: serde_json::Value = read_json("Spec file", path)?;
        if !value.is_array() {
            return Err(ToolError::InvalidInput(
                "Spec JSON must be an array of spec objects.".to_string(),
            ));
        }
        let specs = serde_json::from_value(value).map_err(|e| ToolError::json(path, e))?;
        Ok(Self::new(specs))
    }

    pub fn specs(&self) -> &[AssetSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, asset_name: &str) -> Option<&AssetSpec> {
        self.specs
            .iter()
            .find(|s| s.asset_name.as_deref() == Some(asset_name))
    }

    /// Resolve a filename to its spec.
    ///
    /// 1. explicit mapping entry naming an `asset_name` in the table
    /// 2. `filename_pattern` glob
    /// 3. `filename_pattern` glob with `.{format}` appended
    pub fn match_file(&self, filename: &str, mapping: Option<&SpecMapping>) -> Option<&AssetSpec> {
        if let Some(spec) = mapping
            .and_then(|m| m.get(filename))
            .and_then(|name| self.get(name))
        {
            return Some(spec);
        }

        self.specs
            .iter()
            .find(|s| s.pattern_matches(filename))
            .or_else(|| {
                self.specs
                    .iter()
                    .find(|s| s.pattern_with_extension_matches(filename))
            })
    }
}
