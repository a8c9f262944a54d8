//! Value rendering into resolved field rectangles
//!
//! Three value shapes are supported: signature images (PNG/JPEG, fitted and
//! centered), styled text, and dates (long-form Spanish). All drawing goes
//! through PDFium page objects; the pure parsing and layout helpers here are
//! unit-testable without a PDFium binary.

use crate::error::{Error, Result};
use crate::model::SignerInfo;
use crate::pdf::geometry::{centered_offset, fit_scale, ResolvedRect};
use base64::Engine;
use chrono::Datelike;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use pdfium_render::prelude::*;
use serde::Deserialize;
use std::io::Cursor;
use std::path::{Component, Path};

/// Horizontal padding between text and the field edge for left/right alignment
pub const TEXT_EDGE_PADDING: f32 = 4.0;

const DATE_FONT_SIZE: f32 = 14.0;
const CAPTION_NAME_SIZE: f32 = 9.0;
const CAPTION_DETAIL_SIZE: f32 = 8.0;
const CAPTION_LINE_HEIGHT: f32 = 10.0;

/// Horizontal text alignment within a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Style for a text field value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub text: String,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default)]
    pub text_align: TextAlign,
}

fn default_font_size() -> f32 {
    12.0
}

fn default_font_color() -> String {
    "#000000".to_string()
}

/// Parse a text field payload.
///
/// A payload that parses as a JSON style object is styled; anything else,
/// including malformed JSON, renders as-is with default styling.
pub fn parse_text_payload(raw: &str) -> TextStyle {
    if raw.trim_start().starts_with('{') {
        if let Ok(style) = serde_json::from_str::<TextStyle>(raw) {
            return style;
        }
        tracing::debug!("text payload looks like JSON but did not parse, rendering verbatim");
    }
    TextStyle {
        text: raw.to_string(),
        font_size: default_font_size(),
        font_color: default_font_color(),
        text_align: TextAlign::default(),
    }
}

/// X origin for text of a measured width within a field rectangle
pub fn aligned_text_x(rect_x: f32, rect_w: f32, text_width: f32, align: TextAlign) -> f32 {
    match align {
        TextAlign::Left => rect_x + TEXT_EDGE_PADDING,
        TextAlign::Center => rect_x + (rect_w - text_width) / 2.0,
        TextAlign::Right => rect_x + rect_w - text_width - TEXT_EDGE_PADDING,
    }
}

/// Parse a `#rrggbb` color, returning black for anything unparseable
fn parse_hex_color(color: &str) -> (u8, u8, u8) {
    fn components(color: &str) -> Option<(u8, u8, u8)> {
        let hex = color.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some((r, g, b))
    }
    components(color).unwrap_or((0, 0, 0))
}

const SPANISH_MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Format a `YYYY-MM-DD` date as a long-form Spanish date
/// ("12 de marzo de 2025"). The input is parsed as plain calendar
/// components, so the result does not depend on the process timezone.
pub fn format_date_es(date: &str) -> Result<String> {
    let parsed =
        chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| Error::InvalidDate {
            value: date.to_string(),
        })?;
    let month = SPANISH_MONTHS[parsed.month0() as usize];
    Ok(format!("{} de {} de {}", parsed.day(), month, parsed.year()))
}

fn parse_data_uri(uri: &str) -> Result<(ImageFormat, Vec<u8>)> {
    let rest = uri.strip_prefix("data:").unwrap_or(uri);
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| Error::UnsupportedImageFormat {
            detail: "data URI must be base64 encoded".to_string(),
        })?;

    let format = match mime {
        "image/png" => ImageFormat::Png,
        "image/jpeg" | "image/jpg" => ImageFormat::Jpeg,
        other => {
            return Err(Error::UnsupportedImageFormat {
                detail: other.to_string(),
            })
        }
    };

    let data = base64::engine::general_purpose::STANDARD.decode(payload)?;
    Ok((format, data))
}

fn read_signature_file(path_str: &str, signature_dir: Option<&Path>) -> Result<(ImageFormat, Vec<u8>)> {
    let dir = signature_dir.ok_or(Error::MissingSignatureDir)?;

    let relative = Path::new(path_str);
    if relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(Error::PathAccessDenied {
            path: path_str.to_string(),
        });
    }

    let format = match relative
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => ImageFormat::Png,
        Some("jpg") | Some("jpeg") => ImageFormat::Jpeg,
        Some(other) => {
            return Err(Error::UnsupportedImageFormat {
                detail: other.to_string(),
            })
        }
        None => {
            return Err(Error::UnsupportedImageFormat {
                detail: "missing file extension".to_string(),
            })
        }
    };

    let full = dir.join(relative);
    if !full.exists() {
        return Err(Error::SignatureImageNotFound {
            path: path_str.to_string(),
        });
    }

    let data = std::fs::read(&full)?;
    Ok((format, data))
}

/// Decode a signature image value.
///
/// Accepts a base64 data URI or a path relative to the configured signature
/// directory. Only PNG and JPEG are accepted, and the pixel area is checked
/// before decoding.
pub fn decode_signature_image(
    image: &str,
    signature_dir: Option<&Path>,
    max_pixels: u64,
) -> Result<DynamicImage> {
    let (format, data) = if image.starts_with("data:") {
        parse_data_uri(image)?
    } else {
        read_signature_file(image, signature_dir)?
    };

    let mut reader = ImageReader::new(Cursor::new(&data));
    reader.set_format(format);
    let (width, height) = reader.into_dimensions().map_err(|e| Error::ImageDecode {
        reason: format!("{}", e),
    })?;

    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(Error::ImageDimensionExceeded {
            detail: format!(
                "{}x{} = {} pixels (max: {})",
                width, height, pixels, max_pixels
            ),
        });
    }

    let mut reader = ImageReader::new(Cursor::new(&data));
    reader.set_format(format);
    reader.decode().map_err(|e| Error::ImageDecode {
        reason: format!("{}", e),
    })
}

fn pdfium_err(context: &str, e: PdfiumError) -> Error {
    Error::Pdfium {
        reason: format!("{}: {}", context, e),
    }
}

/// Draw a decoded signature image fitted and centered in the rectangle
pub(crate) fn draw_signature_image(
    page: &mut PdfPage,
    rect: &ResolvedRect,
    image: &DynamicImage,
) -> Result<()> {
    let (image_w, image_h) = image.dimensions();
    let scale = fit_scale(rect.w, rect.h, image_w as f32, image_h as f32);
    let w = image_w as f32 * scale;
    let h = image_h as f32 * scale;
    let (x, y) = centered_offset(rect, w, h);

    page.objects_mut()
        .create_image_object(
            PdfPoints::new(x),
            PdfPoints::new(y),
            image,
            Some(PdfPoints::new(w)),
            Some(PdfPoints::new(h)),
        )
        .map_err(|e| pdfium_err("Failed to place signature image", e))?;

    Ok(())
}

/// Draw a styled text value, vertically centered in the rectangle
pub(crate) fn draw_text(
    page: &mut PdfPage,
    rect: &ResolvedRect,
    style: &TextStyle,
    font: PdfFontToken,
) -> Result<()> {
    let mut object = page
        .objects_mut()
        .create_text_object(
            PdfPoints::new(0.0),
            PdfPoints::new(0.0),
            &style.text,
            font,
            PdfPoints::new(style.font_size),
        )
        .map_err(|e| pdfium_err("Failed to create text object", e))?;

    let (r, g, b) = parse_hex_color(&style.font_color);
    object
        .set_fill_color(PdfColor::new(r, g, b, 255))
        .map_err(|e| pdfium_err("Failed to set text color", e))?;

    let text_width = object
        .width()
        .map_err(|e| pdfium_err("Failed to measure text", e))?
        .value;
    let text_height = object
        .height()
        .map_err(|e| pdfium_err("Failed to measure text", e))?
        .value;

    let x = aligned_text_x(rect.x, rect.w, text_width, style.text_align);
    let y = rect.y + (rect.h - text_height) / 2.0;
    object
        .translate(PdfPoints::new(x), PdfPoints::new(y))
        .map_err(|e| pdfium_err("Failed to position text", e))?;

    Ok(())
}

/// Draw a date value as long-form Spanish, bold, centered in the rectangle
pub(crate) fn draw_date(
    page: &mut PdfPage,
    rect: &ResolvedRect,
    date: &str,
    bold: PdfFontToken,
) -> Result<()> {
    let text = format_date_es(date)?;

    let mut object = page
        .objects_mut()
        .create_text_object(
            PdfPoints::new(0.0),
            PdfPoints::new(0.0),
            &text,
            bold,
            PdfPoints::new(DATE_FONT_SIZE),
        )
        .map_err(|e| pdfium_err("Failed to create date object", e))?;

    object
        .set_fill_color(PdfColor::new(64, 64, 64, 255))
        .map_err(|e| pdfium_err("Failed to set date color", e))?;

    let text_width = object
        .width()
        .map_err(|e| pdfium_err("Failed to measure date", e))?
        .value;
    let text_height = object
        .height()
        .map_err(|e| pdfium_err("Failed to measure date", e))?
        .value;

    let (x, y) = centered_offset(rect, text_width, text_height);
    object
        .translate(PdfPoints::new(x), PdfPoints::new(y))
        .map_err(|e| pdfium_err("Failed to position date", e))?;

    Ok(())
}

fn caption_timestamp(signed_at: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(signed_at) {
        Ok(ts) => ts
            .with_timezone(&chrono::Utc)
            .format("%Y-%m-%d %H:%M UTC")
            .to_string(),
        Err(_) => signed_at.to_string(),
    }
}

fn draw_caption_line(
    page: &mut PdfPage,
    x: f32,
    y: f32,
    text: &str,
    font: PdfFontToken,
    size: f32,
) -> Result<()> {
    let mut object = page
        .objects_mut()
        .create_text_object(
            PdfPoints::new(x),
            PdfPoints::new(y),
            text,
            font,
            PdfPoints::new(size),
        )
        .map_err(|e| pdfium_err("Failed to create caption line", e))?;

    // Captions follow the plain-text color convention
    let (r, g, b) = parse_hex_color(&default_font_color());
    object
        .set_fill_color(PdfColor::new(r, g, b, 255))
        .map_err(|e| pdfium_err("Failed to set caption color", e))?;

    Ok(())
}

/// Draw a signer identity block beneath a signature rectangle: name in bold,
/// then email, then the signing timestamp when present
pub(crate) fn draw_signer_caption(
    page: &mut PdfPage,
    rect: &ResolvedRect,
    signer: &SignerInfo,
    regular: PdfFontToken,
    bold: PdfFontToken,
) -> Result<()> {
    let mut line_y = rect.y - CAPTION_LINE_HEIGHT;

    draw_caption_line(page, rect.x, line_y, &signer.name, bold, CAPTION_NAME_SIZE)?;
    line_y -= CAPTION_LINE_HEIGHT;

    draw_caption_line(
        page,
        rect.x,
        line_y,
        &signer.email,
        regular,
        CAPTION_DETAIL_SIZE,
    )?;
    line_y -= CAPTION_LINE_HEIGHT;

    if let Some(ref signed_at) = signer.signed_at {
        draw_caption_line(
            page,
            rect.x,
            line_y,
            &caption_timestamp(signed_at),
            regular,
            CAPTION_DETAIL_SIZE,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn png_data_uri(width: u32, height: u32) -> String {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 30, 180, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        )
    }

    #[test]
    fn test_parse_text_payload_plain_string() {
        let style = parse_text_payload("Jane Doe");
        assert_eq!(style.text, "Jane Doe");
        assert_eq!(style.font_size, 12.0);
        assert_eq!(style.font_color, "#000000");
        assert_eq!(style.text_align, TextAlign::Left);
    }

    #[test]
    fn test_parse_text_payload_styled_json() {
        let style = parse_text_payload(
            r##"{"text": "Approved", "fontSize": 18, "fontColor": "#aa0000", "textAlign": "center"}"##,
        );
        assert_eq!(style.text, "Approved");
        assert_eq!(style.font_size, 18.0);
        assert_eq!(style.font_color, "#aa0000");
        assert_eq!(style.text_align, TextAlign::Center);
    }

    #[test]
    fn test_parse_text_payload_partial_json_uses_defaults() {
        let style = parse_text_payload(r#"{"text": "Approved"}"#);
        assert_eq!(style.text, "Approved");
        assert_eq!(style.font_size, 12.0);
        assert_eq!(style.text_align, TextAlign::Left);
    }

    #[test]
    fn test_parse_text_payload_malformed_json_renders_verbatim() {
        let raw = r#"{"text": "broken"#;
        let style = parse_text_payload(raw);
        assert_eq!(style.text, raw);
        assert_eq!(style.font_size, 12.0);
    }

    #[test]
    fn test_aligned_text_x() {
        // Right alignment in {x: 100, w: 200} with measured width 50
        assert_eq!(
            aligned_text_x(100.0, 200.0, 50.0, TextAlign::Right),
            246.0
        );
        assert_eq!(aligned_text_x(100.0, 200.0, 50.0, TextAlign::Left), 104.0);
        assert_eq!(
            aligned_text_x(100.0, 200.0, 50.0, TextAlign::Center),
            175.0
        );
    }

    #[rstest]
    #[case("2025-03-12", "12 de marzo de 2025")]
    #[case("2024-01-01", "1 de enero de 2024")]
    #[case("1999-12-31", "31 de diciembre de 1999")]
    #[case("2025-09-05", "5 de septiembre de 2025")]
    fn test_format_date_es(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(format_date_es(input).unwrap(), expected);
    }

    #[rstest]
    #[case("not a date")]
    #[case("2025-13-01")]
    #[case("2025-02-30")]
    #[case("12/03/2025")]
    #[case("")]
    fn test_format_date_es_rejects_invalid(#[case] input: &str) {
        assert!(matches!(
            format_date_es(input),
            Err(Error::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff8000"), (255, 128, 0));
        assert_eq!(parse_hex_color("#000000"), (0, 0, 0));
        // Unparseable falls back to black
        assert_eq!(parse_hex_color("red"), (0, 0, 0));
        assert_eq!(parse_hex_color("#fff"), (0, 0, 0));
    }

    #[test]
    fn test_decode_signature_image_data_uri() {
        let uri = png_data_uri(40, 20);
        let img = decode_signature_image(&uri, None, 100_000_000).unwrap();
        assert_eq!(img.dimensions(), (40, 20));
    }

    #[test]
    fn test_decode_signature_image_unsupported_mime() {
        let result = decode_signature_image("data:image/gif;base64,AAAA", None, 100_000_000);
        assert!(matches!(
            result,
            Err(Error::UnsupportedImageFormat { .. })
        ));
    }

    #[test]
    fn test_decode_signature_image_bad_base64() {
        let result = decode_signature_image(
            "data:image/png;base64,not//valid!!",
            None,
            100_000_000,
        );
        assert!(matches!(result, Err(Error::Base64Decode(_))));
    }

    #[test]
    fn test_decode_signature_image_corrupt_payload() {
        // Valid base64, but not PNG bytes
        let result = decode_signature_image("data:image/png;base64,SGVsbG8=", None, 100_000_000);
        assert!(matches!(result, Err(Error::ImageDecode { .. })));
    }

    #[test]
    fn test_decode_signature_image_pixel_cap() {
        let uri = png_data_uri(100, 100);
        let result = decode_signature_image(&uri, None, 5_000);
        assert!(matches!(
            result,
            Err(Error::ImageDimensionExceeded { .. })
        ));
    }

    #[test]
    fn test_decode_signature_image_path_requires_dir() {
        let result = decode_signature_image("sig.png", None, 100_000_000);
        assert!(matches!(result, Err(Error::MissingSignatureDir)));
    }

    #[test]
    fn test_decode_signature_image_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            decode_signature_image("../outside.png", Some(dir.path()), 100_000_000);
        assert!(matches!(result, Err(Error::PathAccessDenied { .. })));

        let result = decode_signature_image("/etc/sig.png", Some(dir.path()), 100_000_000);
        assert!(matches!(result, Err(Error::PathAccessDenied { .. })));
    }

    #[test]
    fn test_decode_signature_image_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let img = image::RgbaImage::from_pixel(16, 8, image::Rgba([0, 0, 0, 255]));
        img.save(dir.path().join("sig.png")).unwrap();

        let decoded =
            decode_signature_image("sig.png", Some(dir.path()), 100_000_000).unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
    }

    #[test]
    fn test_decode_signature_image_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = decode_signature_image("missing.png", Some(dir.path()), 100_000_000);
        assert!(matches!(
            result,
            Err(Error::SignatureImageNotFound { .. })
        ));
    }

    #[test]
    fn test_decode_signature_image_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let result = decode_signature_image("sig.bmp", Some(dir.path()), 100_000_000);
        assert!(matches!(
            result,
            Err(Error::UnsupportedImageFormat { .. })
        ));
    }

    #[test]
    fn test_caption_timestamp_formats_rfc3339() {
        assert_eq!(
            caption_timestamp("2025-03-12T14:30:00+02:00"),
            "2025-03-12 12:30 UTC"
        );
        // Unparseable timestamps pass through untouched
        assert_eq!(caption_timestamp("yesterday"), "yesterday");
    }
}
