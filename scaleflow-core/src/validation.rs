//! Validation System - Spec Checks
//!
//! Each check is a plain function from (subject, spec) to an optional
//! result. `None` means the spec does not declare that constraint, so the
//! check is absent from the report rather than passing.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::print::{color_space_accepts, effective_dpi};
use crate::probe::ImageProbe;
use crate::specs::AssetSpec;

/// Outcome of one check against one spec field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub actual: String,
    pub expected: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CheckResult {
    pub fn new(
        name: &str,
        passed: bool,
        actual: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            passed,
            actual: actual.into(),
            expected: expected.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Passed,
    Failed,
    Unmatched,
}

/// Validation outcome for one asset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetResult {
    pub file: String,
    pub spec_name: Option<String>,
    pub status: AssetStatus,
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub error: Option<String>,
}

impl AssetResult {
    pub fn unmatched(file: &str) -> Self {
        Self {
            file: file.to_string(),
            spec_name: None,
            status: AssetStatus::Unmatched,
            passed: false,
            checks: vec![],
            error: Some("No matching spec found for this file.".to_string()),
        }
    }

    /// Close out a matched asset. Passing requires every check to pass and
    /// no read error.
    pub fn checked(
        file: &str,
        spec: &AssetSpec,
        checks: Vec<CheckResult>,
        error: Option<String>,
    ) -> Self {
        let passed = error.is_none() && checks.iter().all(|c| c.passed);
        Self {
            file: file.to_string(),
            spec_name: Some(spec.display_name().to_string()),
            status: if passed { AssetStatus::Passed } else { AssetStatus::Failed },
            passed,
            checks,
            error,
        }
    }
}

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4"];
pub const ASSET_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff", "tif", "pdf", "mp4"];

/// Canonical format name for an extension or format string:
/// lowercase, no leading dot, aliases folded (`jpeg` -> `jpg`, `tif` -> `tiff`).
pub fn canonical_format(value: &str) -> String {
    let lower = value.trim().trim_start_matches('.').to_ascii_lowercase();
    match lower.as_str() {
        "jpeg" | "jpe" => "jpg".to_string(),
        "tif" => "tiff".to_string(),
        _ => lower,
    }
}

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

pub fn is_video(path: &Path) -> bool {
    VIDEO_EXTENSIONS.contains(&extension_of(path).as_str())
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// What is known about a file before it is decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFacts {
    /// Canonical format derived from the extension.
    pub format: String,
    pub size_mb: f64,
}

impl FileFacts {
    pub fn new(path: &Path, size_bytes: u64) -> Self {
        Self {
            format: canonical_format(&extension_of(path)),
            size_mb: bytes_to_mb(size_bytes),
        }
    }
}

pub type FileRule = fn(&FileFacts, &AssetSpec) -> Option<CheckResult>;
pub type ImageRule = fn(&ImageProbe, &AssetSpec, &RuleOptions) -> Option<CheckResult>;

/// Knobs shared by the image rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleOptions {
    /// Allowed per-axis pixel deviation for the dimensions check.
    pub dimension_tolerance: u32,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self { dimension_tolerance: 0 }
    }
}

/// Rules that run on every matched file, in report order.
pub const FILE_RULES: &[FileRule] = &[format_rule, file_size_rule];

/// Rules that need decoded pixels; skipped for video.
pub const IMAGE_RULES: &[ImageRule] = &[
    dimensions_rule,
    internal_format_rule,
    color_space_rule,
    dpi_rule,
];

fn declared_format(spec: &AssetSpec) -> Option<String> {
    spec.format
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .map(canonical_format)
}

pub fn format_rule(facts: &FileFacts, spec: &AssetSpec) -> Option<CheckResult> {
    let expected = declared_format(spec)?;
    Some(CheckResult::new(
        "Format",
        facts.format == expected,
        facts.format.clone(),
        expected,
    ))
}

pub fn file_size_rule(facts: &FileFacts, spec: &AssetSpec) -> Option<CheckResult> {
    let max = spec.max_file_size_mb?;
    Some(CheckResult::new(
        "File size",
        facts.size_mb <= max,
        format!("{:.1} MB", facts.size_mb),
        format!("max {} MB", max),
    ))
}

pub fn dimensions_rule(
    probe: &ImageProbe,
    spec: &AssetSpec,
    options: &RuleOptions,
) -> Option<CheckResult> {
    let (w, h) = (spec.width?, spec.height?);
    let tol = options.dimension_tolerance;
    let passed = probe.width.abs_diff(w) <= tol && probe.height.abs_diff(h) <= tol;
    Some(CheckResult::new(
        "Dimensions",
        passed,
        format!("{}x{}", probe.width, probe.height),
        format!("{}x{}", w, h),
    ))
}

/// Reported only when the decoded container disagrees with the declared
/// format, e.g. a PNG saved with a `.jpg` extension.
pub fn internal_format_rule(
    probe: &ImageProbe,
    spec: &AssetSpec,
    _options: &RuleOptions,
) -> Option<CheckResult> {
    let expected = declared_format(spec)?;
    if probe.canonical_format() == expected {
        return None;
    }
    Some(CheckResult::new(
        "Internal format",
        false,
        probe.format_name(),
        expected,
    ))
}

pub fn color_space_rule(
    probe: &ImageProbe,
    spec: &AssetSpec,
    _options: &RuleOptions,
) -> Option<CheckResult> {
    let declared = spec.color_space.as_deref().filter(|c| !c.trim().is_empty())?;
    Some(CheckResult::new(
        "Color space",
        color_space_accepts(declared, probe.mode),
        probe.mode.as_str(),
        declared,
    ))
}

/// Missing density metadata fails when a minimum is declared.
pub fn dpi_rule(probe: &ImageProbe, spec: &AssetSpec, _options: &RuleOptions) -> Option<CheckResult> {
    let min = spec.min_dpi?;
    let expected = format!("min {}", min);
    Some(match probe.dpi {
        Some(dpi) => {
            let actual = effective_dpi(dpi);
            CheckResult::new("DPI", actual >= min, actual.to_string(), expected)
        }
        None => CheckResult::new("DPI", false, "not set", expected),
    })
}

pub fn run_file_rules(facts: &FileFacts, spec: &AssetSpec) -> Vec<CheckResult> {
    FILE_RULES.iter().filter_map(|rule| rule(facts, spec)).collect()
}

pub fn run_image_rules(probe: &ImageProbe, spec: &AssetSpec, options: &RuleOptions) -> Vec<CheckResult> {
    IMAGE_RULES
        .iter()
        .filter_map(|rule| rule(probe, spec, options))
        .collect()
}
