//! Image Technical QA
//!
//! Threshold checks on generated images (resolution, file size, format,
//! DPI) plus a property sheet: aspect ratio, color mode, bit depth, and
//! the platforms whose native size the image matches exactly.
//!
//! Unlike the asset validator, an image without density metadata passes the
//! DPI check here; the check carries a note instead.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::print::horizontal_dpi;
use crate::probe::probe;
use crate::report::{heavy_rule, mark, Report, RunStatus};
use crate::validation::{bytes_to_mb, canonical_format, extension_of, CheckResult};

pub const QA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff", "tif", "bmp"];

pub const DPI_SKIPPED_NOTE: &str = "DPI info not available (skipped)";

/// Native sizes of common placements.
pub const PLATFORM_DIMENSIONS: &[((u32, u32), &[&str])] = &[
    ((1080, 1080), &["Instagram Feed", "LinkedIn", "Facebook"]),
    ((1080, 1350), &["Instagram Feed (4:5)"]),
    ((1080, 1920), &["Instagram Story", "Instagram Reel", "TikTok", "YouTube Shorts"]),
    ((1920, 1080), &["YouTube", "Web Banner", "LinkedIn Banner"]),
    ((1200, 627), &["LinkedIn Shared Post"]),
    ((1200, 675), &["Twitter/X"]),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaThresholds {
    #[serde(default = "default_min_width")]
    pub min_width: u32,
    #[serde(default = "default_min_height")]
    pub min_height: u32,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: f64,
    #[serde(default)]
    pub expected_format: Option<String>,
    #[serde(default = "default_min_dpi")]
    pub min_dpi: u32,
}

fn default_min_width() -> u32 { 1080 }
fn default_min_height() -> u32 { 1080 }
fn default_max_file_size_mb() -> f64 { 20.0 }
fn default_min_dpi() -> u32 { 72 }

impl Default for QaThresholds {
    fn default() -> Self {
        Self {
            min_width: default_min_width(),
            min_height: default_min_height(),
            max_file_size_mb: default_max_file_size_mb(),
            expected_format: None,
            min_dpi: default_min_dpi(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QaStatus {
    Passed,
    Failed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResult {
    pub file: String,
    pub error: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub aspect_ratio: Option<String>,
    pub format: Option<String>,
    pub color_mode: Option<String>,
    pub has_alpha: Option<bool>,
    pub file_size_mb: Option<f64>,
    pub dpi: Option<u32>,
    pub bit_depth: Option<String>,
    pub suitable_for: Vec<String>,
    pub checks: Vec<CheckResult>,
    pub status: QaStatus,
}

impl QaResult {
    fn errored(file: String, file_size_mb: Option<f64>, error: String) -> Self {
        Self {
            file,
            error: Some(error),
            dimensions: None,
            aspect_ratio: None,
            format: None,
            color_mode: None,
            has_alpha: None,
            file_size_mb,
            dpi: None,
            bit_depth: None,
            suitable_for: vec![],
            checks: vec![],
            status: QaStatus::Error,
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Reduced ratio such as `16:9`.
pub fn aspect_ratio(width: u32, height: u32) -> String {
    match gcd(width, height) {
        0 => format!("{}:{}", width, height),
        d => format!("{}:{}", width / d, height / d),
    }
}

pub fn suggest_platforms(width: u32, height: u32) -> Vec<String> {
    PLATFORM_DIMENSIONS
        .iter()
        .find(|(dims, _)| *dims == (width, height))
        .map(|(_, names)| names.iter().map(|n| n.to_string()).collect())
        .unwrap_or_default()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Expand directories (one level, sorted) and drop paths that are missing
/// or lack an image extension, warning about each.
pub fn collect_image_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ToolError> {
    let is_image = |p: &Path| QA_EXTENSIONS.contains(&extension_of(p).as_str());
    let mut images = vec![];

    for path in paths {
        if path.is_dir() {
            let mut children = vec![];
            for entry in fs::read_dir(path).map_err(|e| ToolError::io(path, e))? {
                let child = entry.map_err(|e| ToolError::io(path, e))?.path();
                if child.is_file() && is_image(&child) {
                    children.push(child);
                }
            }
            children.sort();
            images.extend(children);
        } else if path.is_file() {
            if is_image(path) {
                images.push(path.clone());
            } else {
                warn!("'{}' does not have a recognized image extension, skipping", path.display());
            }
        } else {
            warn!("path does not exist, skipping: {}", path.display());
        }
    }

    if images.is_empty() {
        return Err(ToolError::NoImages);
    }
    Ok(images)
}

/// Run every QA check on one image.
pub fn check_image(path: &Path, thresholds: &QaThresholds) -> QaResult {
    let file = path.display().to_string();

    let size_mb = match fs::metadata(path) {
        Ok(meta) => round2(bytes_to_mb(meta.len())),
        Err(e) => return QaResult::errored(file, None, format!("Cannot read file: {}", e)),
    };

    let image = match probe(path) {
        Ok(image) => image,
        Err(e) => return QaResult::errored(file, Some(size_mb), format!("Cannot open image: {}", e)),
    };

    let (width, height) = (image.width, image.height);
    let dpi = image.dpi.map(horizontal_dpi);
    let mut checks = vec![];

    checks.push(CheckResult::new(
        "Resolution",
        width >= thresholds.min_width && height >= thresholds.min_height,
        format!("{}x{}", width, height),
        format!("min {}x{}", thresholds.min_width, thresholds.min_height),
    ));

    checks.push(CheckResult::new(
        "File size",
        size_mb <= thresholds.max_file_size_mb,
        format!("{} MB", size_mb),
        format!("max {} MB", thresholds.max_file_size_mb),
    ));

    if let Some(expected) = thresholds.expected_format.as_deref().filter(|f| !f.trim().is_empty()) {
        checks.push(CheckResult::new(
            "Format",
            canonical_format(expected) == image.canonical_format(),
            image.format_name(),
            expected.trim().to_uppercase(),
        ));
    }

    let expected_dpi = format!("min {}", thresholds.min_dpi);
    checks.push(match dpi {
        Some(value) => CheckResult::new("DPI", value >= thresholds.min_dpi, value.to_string(), expected_dpi),
        None => CheckResult::new("DPI", true, "N/A", expected_dpi).with_note(DPI_SKIPPED_NOTE),
    });

    let passed = checks.iter().all(|c| c.passed);
    debug!("{}: {}", file, if passed { "passed" } else { "failed" });

    QaResult {
        file,
        error: None,
        dimensions: Some(Dimensions { width, height }),
        aspect_ratio: Some(aspect_ratio(width, height)),
        format: Some(image.format_name().to_string()),
        color_mode: Some(image.mode.as_str().to_string()),
        has_alpha: Some(image.mode.has_alpha()),
        file_size_mb: Some(size_mb),
        dpi,
        bit_depth: Some(image.mode.bit_depth().to_string()),
        suitable_for: suggest_platforms(width, height),
        checks,
        status: if passed { QaStatus::Passed } else { QaStatus::Failed },
    }
}

pub fn check_images(paths: &[PathBuf], thresholds: &QaThresholds) -> QaRun {
    QaRun {
        results: paths.iter().map(|p| check_image(p, thresholds)).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub all_passed: bool,
}

#[derive(Debug, Clone)]
pub struct QaRun {
    pub results: Vec<QaResult>,
}

impl QaRun {
    pub fn summary(&self) -> QaSummary {
        let count = |status| self.results.iter().filter(|r| r.status == status).count();
        let passed = count(QaStatus::Passed);
        QaSummary {
            total: self.results.len(),
            passed,
            failed: count(QaStatus::Failed),
            errors: count(QaStatus::Error),
            all_passed: passed == self.results.len(),
        }
    }

    /// Unreadable images fail the run along with failed checks.
    pub fn status(&self) -> RunStatus {
        RunStatus::from_all_passed(self.summary().all_passed)
    }

    pub fn to_json(&self) -> Result<String, ToolError> {
        Report::new(self.summary(), &self.results).to_json()
    }

    pub fn render_text(&self) -> String {
        let mut lines = vec![String::new(), "IMAGE TECHNICAL QA REPORT".to_string()];

        for r in &self.results {
            lines.push(heavy_rule());
            lines.push(format!("File: {}", r.file));

            if let Some(err) = &r.error {
                lines.push(format!("  ERROR: {}", err));
                lines.push("  Status: ERROR".to_string());
                continue;
            }

            if let Some(d) = r.dimensions {
                lines.push(format!("  Dimensions:    {} x {}", d.width, d.height));
            }
            lines.push(format!("  Aspect ratio:  {}", r.aspect_ratio.as_deref().unwrap_or("-")));
            lines.push(format!("  Format:        {}", r.format.as_deref().unwrap_or("-")));

            let mut mode = r.color_mode.clone().unwrap_or_default();
            if r.has_alpha == Some(true) {
                mode.push_str(" (has alpha)");
            }
            lines.push(format!("  Color mode:    {}", mode));

            if let Some(size) = r.file_size_mb {
                lines.push(format!("  File size:     {} MB", size));
            }
            let dpi = r.dpi.map_or_else(|| "N/A".to_string(), |d| d.to_string());
            lines.push(format!("  DPI:           {}", dpi));
            lines.push(format!("  Bit depth:     {}", r.bit_depth.as_deref().unwrap_or("unknown")));

            if r.suitable_for.is_empty() {
                lines.push("  Suitable for:  (no exact platform match)".to_string());
            } else {
                lines.push(format!("  Suitable for:  {}", r.suitable_for.join(", ")));
            }

            lines.push(format!("  {}", "\u{2500}".repeat(14)));

            for c in &r.checks {
                let detail = c
                    .note
                    .clone()
                    .unwrap_or_else(|| format!("{} vs {}", c.actual, c.expected));
                lines.push(format!(
                    "  {} {:<13}{} ({})",
                    mark(c.passed),
                    format!("{}:", c.name),
                    if c.passed { "PASS" } else { "FAIL" },
                    detail
                ));
            }

            let status = match r.status {
                QaStatus::Passed => "PASSED",
                QaStatus::Failed => "FAILED",
                QaStatus::Error => "ERROR",
            };
            lines.push(format!("  Status: {}", status));
        }

        lines.push(heavy_rule());

        let s = self.summary();
        lines.push(String::new());
        lines.push(format!(
            "SUMMARY: {} image(s) checked \u{2014} {} passed, {} failed, {} errors",
            s.total, s.passed, s.failed, s.errors
        ));
        lines.push(String::new());
        lines.join("\n")
    }
}
