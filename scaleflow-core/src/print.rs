//! Print Metadata - Color Space and DPI
//!
//! Maps declared print color spaces to the decoded color modes that satisfy
//! them, and reduces raw density metadata to a single DPI figure.

use serde::{Deserialize, Serialize};

use crate::probe::ColorMode;

/// Declared color space of an export spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorSpace {
    Rgb,
    Cmyk,
}

impl ColorSpace {
    /// Parse a spec value. `None` means the value carries no constraint.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "srgb" | "rgb" => Some(Self::Rgb),
            "cmyk" => Some(Self::Cmyk),
            _ => None,
        }
    }

    pub fn acceptable_modes(self) -> &'static [ColorMode] {
        match self {
            Self::Rgb => &[ColorMode::Rgb, ColorMode::Rgba],
            Self::Cmyk => &[ColorMode::Cmyk],
        }
    }

    pub fn accepts(self, mode: ColorMode) -> bool {
        self.acceptable_modes().contains(&mode)
    }
}

/// Whether `mode` satisfies the declared color space string.
/// Unknown declarations are not a constraint.
pub fn color_space_accepts(declared: &str, mode: ColorMode) -> bool {
    ColorSpace::parse(declared).is_none_or(|cs| cs.accepts(mode))
}

/// Conservative DPI: the smaller axis, rounded.
pub fn effective_dpi(dpi: (f64, f64)) -> u32 {
    dpi.0.min(dpi.1).round().max(0.0) as u32
}

/// Horizontal DPI, rounded.
pub fn horizontal_dpi(dpi: (f64, f64)) -> u32 {
    dpi.0.round().max(0.0) as u32
}

/// Pixels per meter to dots per inch.
pub fn ppm_to_dpi(ppm: u32) -> f64 {
    ppm as f64 * 0.0254
}

/// Dots per centimeter to dots per inch.
pub fn dpcm_to_dpi(dpcm: f64) -> f64 {
    dpcm * 2.54
}
