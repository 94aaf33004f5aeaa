//! Asset Validation Pipeline - Single Entry Point
//!
//! scan directory -> match each file to a spec -> run checks -> report.
//! Every scanned file ends up in the results, matched or not.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::probe::probe;
use crate::report::{heavy_rule, light_rule, mark, Report, RunStatus};
use crate::specs::{AssetSpec, SpecMapping, SpecTable};
use crate::validation::{
    extension_of, is_video, run_file_rules, run_image_rules, AssetResult, AssetStatus,
    FileFacts, RuleOptions, ASSET_EXTENSIONS,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Unmatched files are reported but do not fail the run.
    pub allow_unmatched: bool,
    pub rules: RuleOptions,
}

/// The asset pipeline - owns the spec table for the duration of a run.
pub struct AssetPipeline {
    table: SpecTable,
    mapping: Option<SpecMapping>,
    options: PipelineOptions,
}

impl AssetPipeline {
    pub fn new(table: SpecTable, mapping: Option<SpecMapping>, options: PipelineOptions) -> Self {
        Self { table, mapping, options }
    }

    pub fn table(&self) -> &SpecTable {
        &self.table
    }

    /// Supported asset files directly inside `dir`, sorted by name.
    pub fn scan_assets(dir: &Path) -> Result<Vec<PathBuf>, ToolError> {
        if !dir.is_dir() {
            return Err(ToolError::NotFound("Assets directory", dir.to_path_buf()));
        }

        let mut files = vec![];
        for entry in fs::read_dir(dir).map_err(|e| ToolError::io(dir, e))? {
            let path = entry.map_err(|e| ToolError::io(dir, e))?.path();
            if path.is_file() && ASSET_EXTENSIONS.contains(&extension_of(&path).as_str()) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Validate every supported file in `dir`.
    pub fn validate_dir(&self, dir: &Path) -> Result<AssetRun, ToolError> {
        let files = Self::scan_assets(dir)?;
        if files.is_empty() {
            warn!("No supported asset files found in {}", dir.display());
        }
        info!("Validating {} file(s) against {} spec(s)", files.len(), self.table.len());

        let results = files.iter().map(|path| self.validate_file(path)).collect();
        Ok(AssetRun::new(results, self.options.allow_unmatched))
    }

    /// Match one file and run its checks. Never fails: read and decode
    /// problems are recorded on the result.
    pub fn validate_file(&self, path: &Path) -> AssetResult {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.table.match_file(&filename, self.mapping.as_ref()) {
            Some(spec) => {
                debug!("{} -> {}", filename, spec.display_name());
                self.check_file(path, &filename, spec)
            }
            None => {
                warn!("{} did not match any spec", filename);
                AssetResult::unmatched(&filename)
            }
        }
    }

    fn check_file(&self, path: &Path, filename: &str, spec: &AssetSpec) -> AssetResult {
        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                return AssetResult::checked(filename, spec, vec![], Some(format!("Could not read file: {}", e)));
            }
        };

        let mut checks = run_file_rules(&FileFacts::new(path, size), spec);

        if is_video(path) {
            return AssetResult::checked(filename, spec, checks, None);
        }

        match probe(path) {
            Ok(image) => {
                checks.extend(run_image_rules(&image, spec, &self.options.rules));
                AssetResult::checked(filename, spec, checks, None)
            }
            Err(e) => AssetResult::checked(filename, spec, checks, Some(format!("Could not read image: {}", e))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub unmatched: usize,
    pub all_passed: bool,
}

/// Results of one pipeline run.
#[derive(Debug, Clone)]
pub struct AssetRun {
    pub results: Vec<AssetResult>,
    allow_unmatched: bool,
}

impl AssetRun {
    pub fn new(results: Vec<AssetResult>, allow_unmatched: bool) -> Self {
        Self { results, allow_unmatched }
    }

    pub fn summary(&self) -> AssetSummary {
        let count = |status| self.results.iter().filter(|r| r.status == status).count();
        let passed = count(AssetStatus::Passed);
        let failed = count(AssetStatus::Failed);
        let unmatched = count(AssetStatus::Unmatched);
        AssetSummary {
            total: self.results.len(),
            passed,
            failed,
            unmatched,
            all_passed: failed == 0 && (self.allow_unmatched || unmatched == 0),
        }
    }

    pub fn status(&self) -> RunStatus {
        RunStatus::from_all_passed(self.summary().all_passed)
    }

    pub fn to_json(&self) -> Result<String, ToolError> {
        Report::new(self.summary(), &self.results).to_json()
    }

    pub fn render_text(&self) -> String {
        let mut lines = vec![String::new(), "ASSET VALIDATION REPORT".to_string(), heavy_rule()];

        for res in &self.results {
            lines.push(format!("File: {}", res.file));
            lines.push(format!("Spec: {}", res.spec_name.as_deref().unwrap_or("UNMATCHED")));

            if let Some(err) = &res.error {
                lines.push(format!("  ERROR: {}", err));
            }

            for chk in &res.checks {
                lines.push(format!(
                    "  {} {:<13} {} (expected {})",
                    mark(chk.passed),
                    format!("{}:", chk.name),
                    chk.actual,
                    chk.expected
                ));
            }

            let status = match res.status {
                AssetStatus::Passed => "PASSED",
                AssetStatus::Failed => "FAILED",
                AssetStatus::Unmatched => "UNMATCHED",
            };
            lines.push(format!("  Status: {}", status));
            lines.push(light_rule());
        }

        let s = self.summary();
        lines.push(String::new());
        lines.push(format!(
            "Summary: {}/{} assets passed, {} failed, {} unmatched",
            s.passed, s.total, s.failed, s.unmatched
        ));
        lines.push(String::new());
        lines.join("\n")
    }
}
