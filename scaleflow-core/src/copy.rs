//! Copy Length Validation
//!
//! Checks copy text against the hard character limit of the platform it is
//! written for. Platforms missing from the limit table are reported as
//! UNKNOWN rather than passed or failed.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{read_json, ToolError};
use crate::report::{heavy_rule, light_rule, Report, RunStatus};

/// Built-in platform character limits.
pub const PLATFORM_LIMITS: &[(&str, usize)] = &[
    ("instagram_feed", 2200),
    ("instagram_story", 40),
    ("instagram_reel", 100),
    ("instagram_bio", 150),
    ("twitter", 280),
    ("tiktok", 150),
    ("tiktok_bio", 80),
    ("linkedin_post", 3000),
    ("linkedin_headline", 120),
    ("youtube_title", 100),
    ("youtube_description", 5000),
    ("facebook_post", 63206),
    ("facebook_ad_headline", 40),
    ("facebook_ad_primary", 125),
    ("pinterest", 500),
    ("threads", 500),
    ("on_screen_text", 25), // per text card
    ("headline", 60),
    ("tagline", 50),
    ("cta_button", 25),
    ("email_subject", 60),
    ("sms", 160),
];

/// Strict mode warns above this share of the limit.
pub const STRICT_THRESHOLD_PERCENT: usize = 80;

/// Platform -> character limit. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LimitTable(BTreeMap<String, usize>);

impl LimitTable {
    pub fn builtin() -> Self {
        Self(
            PLATFORM_LIMITS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        )
    }

    /// Replace the built-in table with a JSON object of `platform: limit`.
    pub fn load(path: &Path) -> Result<Self, ToolError> {
        let table: BTreeMap<String, usize> = read_json("Limits file", path)?;
        Ok(Self(
            table
                .into_iter()
                .map(|(k, v)| (k.trim().to_lowercase(), v))
                .collect(),
        ))
    }

    pub fn get(&self, platform: &str) -> Option<usize> {
        self.0.get(platform).copied()
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl Default for LimitTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// One piece of copy. Missing or `null` fields read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyItem {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub platform: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub format: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CopyStatus {
    Pass,
    Fail,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyResult {
    pub platform: String,
    pub format: String,
    pub label: String,
    pub char_count: usize,
    pub limit: Option<usize>,
    pub status: CopyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Validate one item. Length counts Unicode scalar values.
pub fn validate_item(item: &CopyItem, limits: &LimitTable, strict: bool) -> CopyResult {
    let platform = item.platform.trim().to_lowercase();
    let char_count = item.text.chars().count();

    let mut result = CopyResult {
        platform,
        format: item.format.clone(),
        label: item.label.clone(),
        char_count,
        limit: None,
        status: CopyStatus::Unknown,
        warning: None,
        message: None,
    };

    let Some(limit) = limits.get(&result.platform) else {
        result.message = Some(format!("Unknown platform '{}'", result.platform));
        return result;
    };

    let passed = char_count <= limit;
    result.limit = Some(limit);
    result.status = if passed { CopyStatus::Pass } else { CopyStatus::Fail };

    if strict && passed && char_count * 100 > limit * STRICT_THRESHOLD_PERCENT {
        result.warning = Some(format!(
            "Over {}% of limit ({}/{})",
            STRICT_THRESHOLD_PERCENT, char_count, limit
        ));
    }

    debug!("{} {:?} {}/{:?}", result.platform, result.status, char_count, result.limit);
    result
}

pub fn validate_all(items: &[CopyItem], limits: &LimitTable, strict: bool) -> CopyRun {
    CopyRun {
        results: items.iter().map(|i| validate_item(i, limits, strict)).collect(),
    }
}

/// Load copy items from a file, or stdin when no path is given.
/// The document must be a JSON array.
pub fn load_items(path: Option<&Path>) -> Result<Vec<CopyItem>, ToolError> {
    let (value, source): (serde_json::Value, PathBuf) = match path {
        Some(p) => (read_json("Input file", p)?, p.to_path_buf()),
        None => {
            let stdin = PathBuf::from("<stdin>");
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| ToolError::io(&stdin, e))?;
            let value = serde_json::from_str(&buf).map_err(|e| ToolError::json(&stdin, e))?;
            (value, stdin)
        }
    };

    if !value.is_array() {
        return Err(ToolError::InvalidInput(
            "input JSON must be an array of copy items.".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| ToolError::json(&source, e))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopySummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub unknown: usize,
    pub all_passed: bool,
}

#[derive(Debug, Clone)]
pub struct CopyRun {
    pub results: Vec<CopyResult>,
}

impl CopyRun {
    pub fn summary(&self) -> CopySummary {
        let count = |status| self.results.iter().filter(|r| r.status == status).count();
        let passed = count(CopyStatus::Pass);
        CopySummary {
            total: self.results.len(),
            passed,
            failed: count(CopyStatus::Fail),
            unknown: count(CopyStatus::Unknown),
            all_passed: passed == self.results.len(),
        }
    }

    /// UNKNOWN items fail the run, the same as FAIL.
    pub fn status(&self) -> RunStatus {
        RunStatus::from_all_passed(self.summary().all_passed)
    }

    pub fn to_json(&self) -> Result<String, ToolError> {
        Report::new(self.summary(), &self.results).to_json()
    }

    pub fn render_text(&self) -> String {
        let mut lines = vec!["COPY LENGTH VALIDATION".to_string(), heavy_rule()];

        for r in &self.results {
            let label = [r.label.as_str(), r.format.as_str()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("-");
            let icon = match r.status {
                CopyStatus::Pass => "\u{2713} PASS ",
                CopyStatus::Fail => "\u{2717} FAIL ",
                CopyStatus::Unknown => "? UNKNOWN",
            };
            let detail = match r.limit {
                Some(limit) => format!("{:>5} / {} chars", r.char_count, limit),
                None => format!("{:>5} chars  (no limit found)", r.char_count),
            };
            lines.push(format!("{} {:<20} {:<18} {}", icon, r.platform, label, detail));

            if let Some(warning) = &r.warning {
                lines.push(format!("       WARNING: {}", warning));
            }
            if let Some(message) = &r.message {
                lines.push(format!("       NOTE: {}", message));
            }
        }

        lines.push(light_rule());

        let s = self.summary();
        if s.failed == 0 && s.unknown == 0 {
            lines.push(format!("Result: ALL PASSED ({}/{})", s.passed, s.total));
        } else {
            let mut parts = vec![];
            if s.failed > 0 {
                parts.push(format!("{} FAILED", s.failed));
            }
            if s.unknown > 0 {
                parts.push(format!("{} UNKNOWN", s.unknown));
            }
            parts.push(format!("{} passed", s.passed));
            lines.push(format!("Result: {} (out of {})", parts.join(", "), s.total));
        }

        lines.join("\n")
    }
}
