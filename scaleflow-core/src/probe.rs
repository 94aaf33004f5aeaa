//! Image probing - decode a file and collect the facts the checks need.
//!
//! Dimensions and container format come from `image`, which also fully
//! decodes the pixels so truncated or corrupt files are caught here. Color
//! mode and density come from the container headers: the `png` crate for
//! PNG, the `tiff` crate for TIFF, and the marker stream for JPEG (where
//! `image` would hide CMYK behind an RGB conversion). JPEG density falls
//! back to the EXIF resolution tags when JFIF declares none.

use image::{ColorType, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tiff::decoder::{ifd::Value, Decoder as TiffDecoder};
use tiff::tags::Tag;

use crate::print::{dpcm_to_dpi, ppm_to_dpi};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Decode(#[from] image::ImageError),

    #[error("invalid PNG header: {0}")]
    Png(#[from] png::DecodingError),

    #[error("invalid TIFF header: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("unrecognized image format")]
    UnknownFormat,
}

/// Decoded color mode, named the way print and prepress tools name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    #[serde(rename = "1")]
    Bilevel,
    #[serde(rename = "L")]
    L,
    #[serde(rename = "LA")]
    La,
    #[serde(rename = "P")]
    P,
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "RGBA")]
    Rgba,
    #[serde(rename = "CMYK")]
    Cmyk,
    #[serde(rename = "I;16")]
    I16,
}

impl ColorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bilevel => "1",
            Self::L => "L",
            Self::La => "LA",
            Self::P => "P",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
            Self::Cmyk => "CMYK",
            Self::I16 => "I;16",
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::La | Self::Rgba)
    }

    pub fn bit_depth(self) -> &'static str {
        match self {
            Self::Bilevel => "1-bit",
            Self::I16 => "16-bit",
            _ => "8-bit",
        }
    }

    fn from_color_type(color: ColorType) -> Self {
        match color {
            ColorType::L8 => Self::L,
            ColorType::L16 => Self::I16,
            ColorType::La8 | ColorType::La16 => Self::La,
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => Self::Rgba,
            _ => Self::Rgb,
        }
    }

    fn from_png(color: png::ColorType, depth: png::BitDepth) -> Self {
        match (color, depth) {
            (png::ColorType::Grayscale, png::BitDepth::One) => Self::Bilevel,
            (png::ColorType::Grayscale, png::BitDepth::Sixteen) => Self::I16,
            (png::ColorType::Grayscale, _) => Self::L,
            (png::ColorType::GrayscaleAlpha, _) => Self::La,
            (png::ColorType::Indexed, _) => Self::P,
            (png::ColorType::Rgb, _) => Self::Rgb,
            (png::ColorType::Rgba, _) => Self::Rgba,
        }
    }

    fn from_tiff(color: tiff::ColorType) -> Self {
        match color {
            tiff::ColorType::Gray(1) => Self::Bilevel,
            tiff::ColorType::Gray(16) => Self::I16,
            tiff::ColorType::Gray(_) => Self::L,
            tiff::ColorType::GrayA(_) => Self::La,
            tiff::ColorType::Palette(_) => Self::P,
            tiff::ColorType::RGBA(_) => Self::Rgba,
            tiff::ColorType::CMYK(_) => Self::Cmyk,
            _ => Self::Rgb,
        }
    }

    fn from_jpeg_components(components: u8) -> Option<Self> {
        match components {
            1 => Some(Self::L),
            3 => Some(Self::Rgb),
            4 => Some(Self::Cmyk),
            _ => None,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageProbe {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub mode: ColorMode,
    /// Horizontal and vertical density, when the file declares one.
    pub dpi: Option<(f64, f64)>,
}

impl ImageProbe {
    /// Container name as reported to users (`PNG`, `JPEG`, ...).
    pub fn format_name(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::WebP => "WEBP",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Bmp => "BMP",
            ImageFormat::Gif => "GIF",
            _ => "UNKNOWN",
        }
    }

    /// Container as a canonical extension name (`png`, `jpg`, ...).
    pub fn canonical_format(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::WebP => "webp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Gif => "gif",
            _ => "unknown",
        }
    }
}

/// Decode `path` fully and collect its dimensions, format, mode and density.
pub fn probe(path: &Path) -> Result<ImageProbe, ProbeError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format().ok_or(ProbeError::UnknownFormat)?;
    let image = reader.decode()?;

    let mut probe = ImageProbe {
        width: image.width(),
        height: image.height(),
        format,
        mode: ColorMode::from_color_type(image.color()),
        dpi: None,
    };

    match format {
        ImageFormat::Png => {
            let (mode, dpi) = read_png_header(path)?;
            probe.mode = mode;
            probe.dpi = dpi;
        }
        ImageFormat::Jpeg => {
            let markers = scan_jpeg(&std::fs::read(path)?);
            if let Some(mode) = markers.components.and_then(ColorMode::from_jpeg_components) {
                probe.mode = mode;
            }
            probe.dpi = markers.dpi;
        }
        ImageFormat::Tiff => {
            let (mode, dpi) = read_tiff_header(path)?;
            probe.mode = mode;
            probe.dpi = dpi;
        }
        _ => {}
    }

    Ok(probe)
}

fn read_png_header(path: &Path) -> Result<(ColorMode, Option<(f64, f64)>), ProbeError> {
    let decoder = png::Decoder::new(BufReader::new(File::open(path)?));
    let reader = decoder.read_info()?;
    let info = reader.info();

    let mode = ColorMode::from_png(info.color_type, info.bit_depth);
    let dpi = info.pixel_dims.and_then(|dims| match dims.unit {
        png::Unit::Meter => Some((ppm_to_dpi(dims.xppu), ppm_to_dpi(dims.yppu))),
        _ => None,
    });

    Ok((mode, dpi))
}

fn read_tiff_header(path: &Path) -> Result<(ColorMode, Option<(f64, f64)>), ProbeError> {
    let mut decoder = TiffDecoder::new(BufReader::new(File::open(path)?))?;
    let mode = ColorMode::from_tiff(decoder.colortype()?);

    let unit = decoder.find_tag(Tag::ResolutionUnit)?.and_then(value_as_f64);
    let x = decoder.find_tag(Tag::XResolution)?.and_then(value_as_f64);
    let y = decoder.find_tag(Tag::YResolution)?.and_then(value_as_f64);

    let dpi = x.filter(|x| *x > 0.0).and_then(|x| {
        let y = y.unwrap_or(x);
        // ResolutionUnit: absent or 2 is inches, 3 is centimeters, 1 has no absolute unit.
        match unit.map(|u| u as u16) {
            None | Some(2) => Some((x, y)),
            Some(3) => Some((dpcm_to_dpi(x), dpcm_to_dpi(y))),
            Some(_) => None,
        }
    });
    Ok((mode, dpi))
}

fn value_as_f64(value: Value) -> Option<f64> {
    match value {
        Value::Rational(n, d) if d != 0 => Some(n as f64 / d as f64),
        Value::Short(v) => Some(v as f64),
        Value::Unsigned(v) => Some(v as f64),
        Value::Float(v) => Some(v as f64),
        Value::Double(v) => Some(v),
        Value::List(mut values) if !values.is_empty() => value_as_f64(values.swap_remove(0)),
        _ => None,
    }
}

/// What the JPEG marker stream says before the first scan.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JpegMarkers {
    pub dpi: Option<(f64, f64)>,
    pub components: Option<u8>,
}

/// Walk JPEG segments up to SOS, picking up density (JFIF, else EXIF) and
/// the frame's component count. Malformed streams yield whatever was found
/// so far.
pub fn scan_jpeg(bytes: &[u8]) -> JpegMarkers {
    let mut markers = JpegMarkers::default();
    let mut exif_dpi = None;
    scan_segments(bytes, &mut markers, &mut exif_dpi);
    markers.dpi = markers.dpi.or(exif_dpi);
    markers
}

fn scan_segments(bytes: &[u8], markers: &mut JpegMarkers, exif_dpi: &mut Option<(f64, f64)>) {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return;
    }

    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            break;
        }
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }

        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > bytes.len() {
            break;
        }
        let segment = &bytes[pos + 4..end];

        match marker {
            0xE0 if markers.dpi.is_none() => markers.dpi = jfif_density(segment),
            0xE1 if exif_dpi.is_none() => *exif_dpi = exif_density(segment),
            // SOF0..SOF15, minus DHT (C4), JPG (C8) and DAC (CC)
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                if segment.len() >= 6 {
                    markers.components = Some(segment[5]);
                }
            }
            0xDA => break,
            _ => {}
        }
        pos = end;
    }
}

fn jfif_density(segment: &[u8]) -> Option<(f64, f64)> {
    if segment.len() < 12 || &segment[..5] != b"JFIF\0" {
        return None;
    }
    let x = u16::from_be_bytes([segment[8], segment[9]]);
    let y = u16::from_be_bytes([segment[10], segment[11]]);
    match segment[7] {
        1 => Some((x as f64, y as f64)),
        2 => Some((dpcm_to_dpi(x as f64), dpcm_to_dpi(y as f64))),
        _ => None,
    }
}

/// Density from an APP1 `Exif` payload: XResolution, YResolution and
/// ResolutionUnit in IFD0. A missing unit means inches.
fn exif_density(segment: &[u8]) -> Option<(f64, f64)> {
    let body = segment.strip_prefix(b"Exif\0\0")?;
    let big_endian = match body.get(..4)? {
        [b'I', b'I', 0x2A, 0x00] => false,
        [b'M', b'M', 0x00, 0x2A] => true,
        _ => return None,
    };
    let u16_at = |at: usize| -> Option<u16> {
        let b: [u8; 2] = body.get(at..at + 2)?.try_into().ok()?;
        Some(if big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) })
    };
    let u32_at = |at: usize| -> Option<u32> {
        let b: [u8; 4] = body.get(at..at + 4)?.try_into().ok()?;
        Some(if big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) })
    };
    let rational_at = |at: usize| -> Option<f64> {
        let (n, d) = (u32_at(at)?, u32_at(at + 4)?);
        (d != 0).then(|| n as f64 / d as f64)
    };

    let ifd = u32_at(4)? as usize;
    let (mut x, mut y, mut unit) = (None, None, 2u16);
    for i in 0..u16_at(ifd)? as usize {
        let entry = ifd + 2 + i * 12;
        let value = entry + 8;
        match u16_at(entry)? {
            0x011A => x = rational_at(u32_at(value)? as usize),
            0x011B => y = rational_at(u32_at(value)? as usize),
            0x0128 => unit = u16_at(value)?,
            _ => {}
        }
    }

    let x = x.filter(|x| *x > 0.0)?;
    let y = y.unwrap_or(x);
    match unit {
        3 => Some((dpcm_to_dpi(x), dpcm_to_dpi(y))),
        _ => Some((x, y)),
    }
}
