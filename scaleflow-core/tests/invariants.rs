//! Contract Invariant Tests
//!
//! End-to-end checks of the validators against real files on disk.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tempfile::TempDir;

use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::ExtendedColorType;
use tiff::encoder::{colortype, Rational, TiffEncoder};
use tiff::tags::ResolutionUnit;

use scaleflow_core::{
    budget::{self, CreditTable, Deliverable},
    copy::{self, CopyItem, CopyStatus, LimitTable},
    pipeline::{AssetPipeline, PipelineOptions},
    qa::{self, QaStatus, QaThresholds, DPI_SKIPPED_NOTE},
    report::RunStatus,
    specs::{AssetSpec, SpecMapping, SpecTable},
    validation::{AssetStatus, RuleOptions},
};

fn write_png(path: &Path, width: u32, height: u32, dpi: Option<u32>) {
    let file = File::create(path).unwrap();
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    if let Some(dpi) = dpi {
        let ppm = (dpi as f64 / 0.0254).round() as u32;
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
    }
    let mut writer = encoder.write_header().unwrap();
    writer
        .write_image_data(&vec![0u8; (width * height * 3) as usize])
        .unwrap();
}

fn encode_jpeg(width: u32, height: u32, dpi: Option<u16>) -> Vec<u8> {
    let mut bytes = vec![];
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, 90);
    if let Some(dpi) = dpi {
        encoder.set_pixel_density(PixelDensity::dpi(dpi));
    }
    encoder
        .encode(&vec![128u8; (width * height * 3) as usize], width, height, ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

/// APP1 segment carrying only IFD0 XResolution/YResolution (inches).
fn exif_segment(dpi: u32) -> Vec<u8> {
    let mut body = b"II*\0".to_vec();
    body.extend_from_slice(&8u32.to_le_bytes());
    body.extend_from_slice(&2u16.to_le_bytes());
    for (tag, offset) in [(0x011Au16, 38u32), (0x011B, 46)] {
        body.extend_from_slice(&tag.to_le_bytes());
        body.extend_from_slice(&5u16.to_le_bytes());
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&offset.to_le_bytes());
    }
    body.extend_from_slice(&0u32.to_le_bytes());
    for _ in 0..2 {
        body.extend_from_slice(&dpi.to_le_bytes());
        body.extend_from_slice(&1u32.to_le_bytes());
    }

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&(body.len() as u16 + 8).to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(&body);
    segment
}

fn write_cmyk_tiff(path: &Path, width: u32, height: u32, dpi: u32) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    let mut image = encoder.new_image::<colortype::CMYK8>(width, height).unwrap();
    image.resolution(ResolutionUnit::Inch, Rational { n: dpi, d: 1 });
    image
        .write_data(&vec![40u8; (width * height * 4) as usize])
        .unwrap();
}

fn print_spec(name: &str, format: &str, color_space: &str) -> AssetSpec {
    AssetSpec {
        asset_name: Some(name.to_string()),
        format: Some(format.to_string()),
        width: Some(20),
        height: Some(20),
        color_space: Some(color_space.to_string()),
        min_dpi: Some(300),
        filename_pattern: Some(format!("{}*", name)),
        ..Default::default()
    }
}

fn hero_spec() -> AssetSpec {
    AssetSpec {
        asset_name: Some("hero".to_string()),
        format: Some("png".to_string()),
        width: Some(1080),
        height: Some(1080),
        filename_pattern: Some("hero*".to_string()),
        ..Default::default()
    }
}

fn pipeline(specs: Vec<AssetSpec>, options: PipelineOptions) -> AssetPipeline {
    AssetPipeline::new(SpecTable::new(specs), None, options)
}

#[test]
fn invariant_off_by_one_dimensions_fail() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("hero.png"), 1081, 1079, None);

    let run = pipeline(vec![hero_spec()], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();

    let result = &run.results[0];
    assert_eq!(result.spec_name.as_deref(), Some("hero"));
    assert!(!result.passed);
    assert_eq!(result.status, AssetStatus::Failed);

    let dims = result.checks.iter().find(|c| c.name == "Dimensions").unwrap();
    assert!(!dims.passed);
    assert_eq!(dims.actual, "1081x1079");
    assert_eq!(dims.expected, "1080x1080");
    assert_eq!(run.status(), RunStatus::Failures);
}

#[test]
fn invariant_tolerance_loosens_dimensions() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("hero.png"), 1081, 1079, None);

    let options = PipelineOptions {
        allow_unmatched: false,
        rules: RuleOptions { dimension_tolerance: 1 },
    };
    let run = pipeline(vec![hero_spec()], options).validate_dir(dir.path()).unwrap();
    assert!(run.results[0].passed);
    assert_eq!(run.status(), RunStatus::AllPassed);
}

#[test]
fn invariant_omitted_fields_have_no_checks() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("hero.png"), 1080, 1080, None);

    let run = pipeline(vec![hero_spec()], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();

    let names: Vec<_> = run.results[0].checks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Format", "Dimensions"]);
    assert!(run.results[0].passed);
}

#[test]
fn invariant_unmatched_is_reported_and_fails() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("hero.png"), 1080, 1080, None);
    write_png(&dir.path().join("mystery.png"), 10, 10, None);

    let run = pipeline(vec![hero_spec()], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();

    let summary = run.summary();
    assert_eq!((summary.total, summary.passed, summary.failed, summary.unmatched), (2, 1, 0, 1));
    assert_eq!(run.results[1].status, AssetStatus::Unmatched);
    assert_eq!(run.status(), RunStatus::Failures);

    let tolerant = PipelineOptions { allow_unmatched: true, ..Default::default() };
    let run = pipeline(vec![hero_spec()], tolerant).validate_dir(dir.path()).unwrap();
    assert_eq!(run.summary().unmatched, 1);
    assert_eq!(run.status(), RunStatus::AllPassed);
}

#[test]
fn invariant_mapping_overrides_pattern() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("hero.png"), 500, 500, None);

    let square = AssetSpec {
        asset_name: Some("square".to_string()),
        width: Some(500),
        height: Some(500),
        ..Default::default()
    };
    let mapping: SpecMapping = serde_json::from_str(r#"{"hero.png": "square"}"#).unwrap();
    let run = AssetPipeline::new(
        SpecTable::new(vec![hero_spec(), square]),
        Some(mapping),
        PipelineOptions::default(),
    )
    .validate_dir(dir.path())
    .unwrap();

    assert_eq!(run.results[0].spec_name.as_deref(), Some("square"));
    assert!(run.results[0].passed);
}

#[test]
fn invariant_dpi_required_and_missing_fails() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("print_a.png"), 20, 20, Some(300));
    write_png(&dir.path().join("print_b.png"), 20, 20, None);
    write_png(&dir.path().join("print_c.png"), 20, 20, Some(150));

    let spec = AssetSpec {
        asset_name: Some("print".to_string()),
        min_dpi: Some(300),
        color_space: Some("sRGB".to_string()),
        filename_pattern: Some("print_*".to_string()),
        ..Default::default()
    };
    let run = pipeline(vec![spec], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();

    let dpi = |i: usize| run.results[i].checks.iter().find(|c| c.name == "DPI").unwrap().clone();
    assert!(dpi(0).passed);
    assert_eq!(dpi(0).actual, "300");
    assert!(!dpi(1).passed);
    assert_eq!(dpi(1).actual, "not set");
    assert!(!dpi(2).passed);

    let color = run.results[0].checks.iter().find(|c| c.name == "Color space").unwrap();
    assert!(color.passed);
    assert_eq!(color.actual, "RGB");
}

#[test]
fn invariant_decode_error_is_per_item() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("hero_broken.png"), b"definitely not a png").unwrap();
    write_png(&dir.path().join("hero_ok.png"), 1080, 1080, None);

    let run = pipeline(vec![hero_spec()], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();

    assert_eq!(run.results.len(), 2);
    let broken = &run.results[0];
    assert_eq!(broken.file, "hero_broken.png");
    assert!(!broken.passed);
    assert!(broken.error.as_deref().unwrap().starts_with("Could not read image"));
    // Extension-level checks ran before the decode failure; nothing after it did.
    assert!(broken.checks.iter().all(|c| c.name == "Format"));
    assert!(run.results[1].passed);
}

#[test]
fn invariant_video_skips_image_checks() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("promo.mp4"), vec![0u8; 2048]).unwrap();

    let spec = AssetSpec {
        asset_name: Some("promo".to_string()),
        format: Some("mp4".to_string()),
        width: Some(1080),
        height: Some(1920),
        max_file_size_mb: Some(1.0),
        filename_pattern: Some("promo".to_string()),
        ..Default::default()
    };
    let run = pipeline(vec![spec], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();

    let names: Vec<_> = run.results[0].checks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Format", "File size"]);
    assert!(run.results[0].passed);
}

#[test]
fn invariant_internal_format_mismatch() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("banner.jpg"), 10, 10, None);

    let spec = AssetSpec {
        asset_name: Some("banner".to_string()),
        format: Some("JPEG".to_string()),
        filename_pattern: Some("banner".to_string()),
        ..Default::default()
    };
    let run = pipeline(vec![spec], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();

    let checks = &run.results[0].checks;
    assert!(checks[0].passed, "extension matches the declared format");
    assert_eq!(checks[1].name, "Internal format");
    assert_eq!(checks[1].actual, "PNG");
    assert!(!run.results[0].passed);
}

#[test]
fn invariant_jpeg_density_from_jfif_and_exif() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("photo_jfif.jpg"), encode_jpeg(20, 20, Some(300))).unwrap();

    let plain = encode_jpeg(20, 20, None);
    let mut with_exif = plain[..2].to_vec();
    with_exif.extend_from_slice(&exif_segment(300));
    with_exif.extend_from_slice(&plain[2..]);
    fs::write(dir.path().join("photo_exif.jpg"), with_exif).unwrap();
    fs::write(dir.path().join("photo_none.jpg"), plain).unwrap();

    let run = pipeline(vec![print_spec("photo", "jpeg", "sRGB")], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();

    let files: Vec<_> = run.results.iter().map(|r| r.file.as_str()).collect();
    assert_eq!(files, vec!["photo_exif.jpg", "photo_jfif.jpg", "photo_none.jpg"]);

    for result in &run.results[..2] {
        let names: Vec<_> = result.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Format", "Dimensions", "Color space", "DPI"]);
        assert!(result.passed, "{} should pass: {:?}", result.file, result.checks);
        assert_eq!(result.checks[2].actual, "RGB");
        assert_eq!(result.checks[3].actual, "300");
    }

    let none = &run.results[2];
    let dpi = none.checks.iter().find(|c| c.name == "DPI").unwrap();
    assert_eq!(dpi.actual, "not set");
    assert!(!none.passed);
}

#[test]
fn invariant_cmyk_tiff_print_master() {
    let dir = TempDir::new().unwrap();
    write_cmyk_tiff(&dir.path().join("poster.tif"), 20, 20, 300);

    let run = pipeline(vec![print_spec("poster", "tiff", "CMYK")], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();

    let result = &run.results[0];
    let by_name = |name: &str| result.checks.iter().find(|c| c.name == name).unwrap();
    assert_eq!(by_name("Color space").actual, "CMYK");
    assert!(by_name("Color space").passed);
    assert_eq!(by_name("DPI").actual, "300");
    assert!(by_name("DPI").passed);
    assert!(result.passed, "{:?}", result.checks);

    let rgb_only = pipeline(vec![print_spec("poster", "tiff", "sRGB")], PipelineOptions::default())
        .validate_dir(dir.path())
        .unwrap();
    assert!(!rgb_only.results[0].passed);
}

#[test]
fn invariant_qa_reads_non_png_containers() {
    let dir = TempDir::new().unwrap();
    let tiff = dir.path().join("print.tiff");
    write_cmyk_tiff(&tiff, 20, 20, 300);
    let jpeg = dir.path().join("photo.jpg");
    fs::write(&jpeg, encode_jpeg(20, 20, Some(150))).unwrap();

    let thresholds = QaThresholds { min_width: 10, min_height: 10, ..Default::default() };

    let result = qa::check_image(&tiff, &thresholds);
    assert_eq!(result.format.as_deref(), Some("TIFF"));
    assert_eq!(result.color_mode.as_deref(), Some("CMYK"));
    assert_eq!(result.dpi, Some(300));
    assert_eq!(result.status, QaStatus::Passed);

    let result = qa::check_image(&jpeg, &thresholds);
    assert_eq!(result.format.as_deref(), Some("JPEG"));
    assert_eq!(result.color_mode.as_deref(), Some("RGB"));
    assert_eq!(result.dpi, Some(150));
}

#[test]
fn invariant_reports_are_idempotent() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("hero.png"), 1081, 1079, Some(72));
    write_png(&dir.path().join("zz_other.png"), 5, 5, None);

    let p = pipeline(vec![hero_spec()], PipelineOptions::default());
    let first = p.validate_dir(dir.path()).unwrap();
    let second = p.validate_dir(dir.path()).unwrap();
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(first.render_text(), second.render_text());
}

#[test]
fn invariant_qa_missing_dpi_passes_with_note() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wide.png");
    write_png(&path, 1920, 1080, None);

    let result = qa::check_image(&path, &QaThresholds::default());
    assert_eq!(result.status, QaStatus::Passed);
    assert_eq!(result.aspect_ratio.as_deref(), Some("16:9"));
    assert_eq!(result.format.as_deref(), Some("PNG"));
    assert_eq!(result.color_mode.as_deref(), Some("RGB"));
    assert_eq!(result.has_alpha, Some(false));
    assert_eq!(result.dpi, None);
    assert!(result.suitable_for.contains(&"YouTube".to_string()));

    let dpi = result.checks.iter().find(|c| c.name == "DPI").unwrap();
    assert!(dpi.passed);
    assert_eq!(dpi.note.as_deref(), Some(DPI_SKIPPED_NOTE));
}

#[test]
fn invariant_qa_thresholds() {
    let dir = TempDir::new().unwrap();
    let small = dir.path().join("small.png");
    write_png(&small, 800, 600, Some(96));

    let thresholds = QaThresholds {
        expected_format: Some("jpeg".to_string()),
        ..Default::default()
    };
    let result = qa::check_image(&small, &thresholds);
    assert_eq!(result.status, QaStatus::Failed);
    assert_eq!(result.dpi, Some(96));

    let by_name = |name: &str| result.checks.iter().find(|c| c.name == name).unwrap().passed;
    assert!(!by_name("Resolution"));
    assert!(!by_name("Format"));
    assert!(by_name("File size"));
    assert!(by_name("DPI"));
}

#[test]
fn invariant_qa_collects_directories_and_fails_on_unreadable() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("a.png"), 1080, 1080, None);
    fs::write(dir.path().join("b.png"), b"garbage").unwrap();
    fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

    let paths = qa::collect_image_paths(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(paths.len(), 2);

    let run = qa::check_images(&paths, &QaThresholds::default());
    let summary = run.summary();
    assert_eq!((summary.total, summary.passed, summary.errors), (2, 1, 1));
    assert_eq!(run.status(), RunStatus::Failures);
}

#[test]
fn invariant_copy_scenarios() {
    let items: Vec<CopyItem> = serde_json::from_value(serde_json::json!([
        {"platform": "twitter", "text": "a".repeat(281), "label": "launch"},
        {"platform": "unknown_platform", "text": "hi"},
        {"platform": "twitter", "text": "a".repeat(280)},
    ]))
    .unwrap();

    let run = copy::validate_all(&items, &LimitTable::builtin(), false);
    assert_eq!(run.results[0].status, CopyStatus::Fail);
    assert_eq!(run.results[0].limit, Some(280));
    assert_eq!(run.results[0].char_count, 281);
    assert_eq!(run.results[1].status, CopyStatus::Unknown);
    assert_eq!(run.results[1].limit, None);
    assert_eq!(run.results[2].status, CopyStatus::Pass);

    let summary = run.summary();
    assert_eq!((summary.passed, summary.failed, summary.unknown), (1, 1, 1));

    let json: serde_json::Value = serde_json::from_str(&run.to_json().unwrap()).unwrap();
    assert_eq!(json["summary"]["unknown"], 1);
    assert_eq!(json["results"][1]["status"], "UNKNOWN");
    assert!(json["results"][1]["limit"].is_null());
}

#[test]
fn invariant_budget_scenario() {
    let budget = budget::calculate(
        &[
            Deliverable::new(3, "hero_image", "flux_kontext"),
            Deliverable::new(2, "video_15sec", "kling_2_1"),
        ],
        "starter",
        &CreditTable::builtin(),
    )
    .unwrap();

    assert_eq!(budget.lines[0].line_total, 600);
    assert_eq!(budget.lines[1].line_total, 2 * 88 * 5);
    assert_eq!(budget.total, 1480);
    assert_eq!(budget.buffer, 296);
    assert_eq!(budget.surplus_or_shortfall, 1500 - (1480 + 296));
}
