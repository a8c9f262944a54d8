//! Document assembly: joining fields with bound values and drawing them
//!
//! A failed field never aborts the pass; it is logged and reported as
//! skipped. Only an unloadable document is fatal. Metadata stamping happens
//! as a post-pass over the serialized bytes and degrades to the unstamped
//! output on failure.

use crate::error::{Error, Result};
use crate::model::{
    DocumentMetadata, EmbedReport, Field, FieldValue, SkippedField, ValueBinding,
};
use crate::pdf::geometry::{is_off_page, resolve_area};
use crate::pdf::render::{
    decode_signature_image, draw_date, draw_signature_image, draw_signer_caption, draw_text,
    parse_text_payload,
};
use crate::pdf::{create_pdfium, load_document};
use chrono::{DateTime, FixedOffset};
use pdfium_render::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

/// Options controlling an embedding pass
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    /// Draw signer name/email/timestamp beneath signature images
    pub draw_signer_captions: bool,
    /// Info dictionary values stamped into the output
    pub metadata: Option<DocumentMetadata>,
    /// Directory for path-based signature image values
    pub signature_dir: Option<PathBuf>,
    /// Maximum decoded signature image pixel area
    pub max_image_pixels: u64,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            draw_signer_captions: false,
            metadata: None,
            signature_dir: None,
            max_image_pixels: 100_000_000,
        }
    }
}

/// Embed bound values into their fields and return the assembled PDF.
///
/// Fields are processed in input order. A field with no bound value is
/// passed over silently; a field whose value fails to decode or draw is
/// recorded as skipped with its reason, and processing continues with the
/// rest either way.
pub fn embed_values(
    data: &[u8],
    fields: &[Field],
    bindings: &[ValueBinding],
    options: &EmbedOptions,
) -> Result<EmbedReport> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }

    let pdfium = create_pdfium()?;
    let mut document = load_document(&pdfium, data)?;

    // Font tokens must be taken before borrowing the page collection
    let helvetica = document.fonts_mut().helvetica();
    let helvetica_bold = document.fonts_mut().helvetica_bold();

    let values = latest_bindings(bindings);

    let mut fields_rendered = 0u32;
    let mut fields_skipped = Vec::new();

    {
        let pages = document.pages();
        let page_count = pages.len() as u32;

        for field in fields {
            let binding = match values.get(field.id.as_str()) {
                Some(binding) => *binding,
                None => {
                    tracing::debug!(field_id = %field.id, "no value bound, field not rendered");
                    continue;
                }
            };

            match render_field(
                &pages,
                page_count,
                field,
                binding,
                options,
                helvetica,
                helvetica_bold,
            ) {
                Ok(()) => fields_rendered += 1,
                Err(e) => {
                    tracing::warn!(field_id = %field.id, error = %e, "field embedding failed, skipping");
                    fields_skipped.push(SkippedField {
                        field_id: field.id.clone(),
                        reason: e.client_message(),
                    });
                }
            }
        }
    }

    let output = document.save_to_bytes().map_err(|e| Error::Pdfium {
        reason: format!("Failed to save PDF: {}", e),
    })?;

    let output = if let Some(ref metadata) = options.metadata {
        match stamp_metadata(&output, metadata) {
            Ok(stamped) => stamped,
            Err(e) => {
                tracing::warn!(error = %e, "metadata stamp failed, returning unstamped output");
                output
            }
        }
    } else {
        output
    };

    Ok(EmbedReport {
        fields_rendered,
        fields_skipped,
        data: output,
    })
}

fn render_field(
    pages: &PdfPages,
    page_count: u32,
    field: &Field,
    binding: &ValueBinding,
    options: &EmbedOptions,
    font: PdfFontToken,
    bold: PdfFontToken,
) -> Result<()> {
    if field.page < 1 || field.page > page_count {
        return Err(Error::PageOutOfBounds {
            page: field.page,
            total: page_count,
        });
    }

    let mut page = pages
        .get((field.page - 1) as u16)
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to get page {}: {}", field.page, e),
        })?;

    let page_width = page.width().value;
    let page_height = page.height().value;
    let rect = resolve_area(&field.area, page_width, page_height);

    if is_off_page(&rect, page_width, page_height) {
        tracing::warn!(
            field_id = %field.id,
            page = field.page,
            "resolved area extends beyond the page"
        );
    }

    match &binding.value {
        FieldValue::SignatureImage { image } => {
            let decoded = decode_signature_image(
                image,
                options.signature_dir.as_deref(),
                options.max_image_pixels,
            )?;
            draw_signature_image(&mut page, &rect, &decoded)?;

            if options.draw_signer_captions {
                if let Some(ref signer) = binding.signer {
                    draw_signer_caption(&mut page, &rect, signer, font, bold)?;
                }
            }
        }
        FieldValue::Text { text } => {
            let style = parse_text_payload(text);
            draw_text(&mut page, &rect, &style, font)?;
        }
        FieldValue::Date { date } => {
            draw_date(&mut page, &rect, date, bold)?;
        }
    }

    Ok(())
}

/// Reduce bindings to one winner per field id.
///
/// The binding with the most recent parseable `signed_at` wins. Bindings
/// without a timestamp lose to timestamped ones; remaining ties go to the
/// later binding in input order.
fn latest_bindings(bindings: &[ValueBinding]) -> HashMap<&str, &ValueBinding> {
    let mut latest: HashMap<&str, (Option<DateTime<FixedOffset>>, &ValueBinding)> = HashMap::new();

    for binding in bindings {
        let ts = binding
            .signed_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok());

        match latest.entry(binding.field_id.as_str()) {
            Entry::Occupied(mut entry) => {
                if ts >= entry.get().0 {
                    entry.insert((ts, binding));
                }
            }
            Entry::Vacant(entry) => {
                entry.insert((ts, binding));
            }
        }
    }

    latest
        .into_iter()
        .map(|(field_id, (_, binding))| (field_id, binding))
        .collect()
}

/// Write an Info dictionary into serialized PDF bytes.
///
/// PDFium has no metadata write API, so this runs as a separate pass over
/// the saved document.
fn stamp_metadata(data: &[u8], metadata: &DocumentMetadata) -> Result<Vec<u8>> {
    let mut doc = lopdf::Document::load_mem(data).map_err(|e| Error::InvalidPdf {
        reason: format!("Failed to reload output for stamping: {}", e),
    })?;

    let now = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();

    let mut info = lopdf::Dictionary::new();
    if let Some(ref title) = metadata.title {
        info.set("Title", lopdf::Object::string_literal(title.clone()));
    }
    if let Some(ref author) = metadata.author {
        info.set("Author", lopdf::Object::string_literal(author.clone()));
    }
    if let Some(ref subject) = metadata.subject {
        info.set("Subject", lopdf::Object::string_literal(subject.clone()));
    }
    if let Some(ref creator) = metadata.creator {
        info.set("Creator", lopdf::Object::string_literal(creator.clone()));
    }
    let producer = metadata
        .producer
        .clone()
        .unwrap_or_else(|| "docsign-mcp-server".to_string());
    info.set("Producer", lopdf::Object::string_literal(producer));
    info.set("CreationDate", lopdf::Object::string_literal(now.clone()));
    info.set("ModDate", lopdf::Object::string_literal(now));

    let info_id = doc.add_object(lopdf::Object::Dictionary(info));
    doc.trailer.set("Info", lopdf::Object::Reference(info_id));

    let mut output = Vec::new();
    doc.save_to(&mut output).map_err(|e| Error::InvalidPdf {
        reason: format!("Failed to write stamped output: {}", e),
    })?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    fn binding(field_id: &str, text: &str, signed_at: Option<&str>) -> ValueBinding {
        ValueBinding {
            field_id: field_id.to_string(),
            value: FieldValue::Text {
                text: text.to_string(),
            },
            signed_at: signed_at.map(|s| s.to_string()),
            signer: None,
        }
    }

    fn bound_text<'a>(map: &HashMap<&str, &'a ValueBinding>, field_id: &str) -> &'a str {
        match &map.get(field_id).unwrap().value {
            FieldValue::Text { text } => text,
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_latest_bindings_most_recent_wins() {
        let bindings = vec![
            binding("sig-1", "newer", Some("2025-03-12T10:00:00Z")),
            binding("sig-1", "older", Some("2025-03-11T10:00:00Z")),
        ];
        let map = latest_bindings(&bindings);
        assert_eq!(bound_text(&map, "sig-1"), "newer");
    }

    #[test]
    fn test_latest_bindings_untimestamped_loses_to_timestamped() {
        let bindings = vec![
            binding("sig-1", "timestamped", Some("2025-01-01T00:00:00Z")),
            binding("sig-1", "no timestamp", None),
        ];
        let map = latest_bindings(&bindings);
        assert_eq!(bound_text(&map, "sig-1"), "timestamped");
    }

    #[test]
    fn test_latest_bindings_tie_goes_to_later_input() {
        let bindings = vec![
            binding("sig-1", "first", None),
            binding("sig-1", "second", None),
        ];
        let map = latest_bindings(&bindings);
        assert_eq!(bound_text(&map, "sig-1"), "second");
    }

    #[test]
    fn test_latest_bindings_independent_fields() {
        let bindings = vec![
            binding("a", "for a", None),
            binding("b", "for b", None),
        ];
        let map = latest_bindings(&bindings);
        assert_eq!(map.len(), 2);
        assert_eq!(bound_text(&map, "a"), "for a");
        assert_eq!(bound_text(&map, "b"), "for b");
    }

    #[test]
    fn test_latest_bindings_unparseable_timestamp_treated_as_none() {
        let bindings = vec![
            binding("sig-1", "good timestamp", Some("2020-01-01T00:00:00Z")),
            binding("sig-1", "bad timestamp", Some("not a timestamp")),
        ];
        let map = latest_bindings(&bindings);
        assert_eq!(bound_text(&map, "sig-1"), "good timestamp");
    }

    fn minimal_pdf() -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            lopdf::Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut output = Vec::new();
        doc.save_to(&mut output).unwrap();
        output
    }

    #[test]
    fn test_stamp_metadata_sets_info_dictionary() {
        let pdf = minimal_pdf();
        let metadata = DocumentMetadata {
            title: Some("Signed agreement".to_string()),
            author: Some("Jane Doe".to_string()),
            ..Default::default()
        };

        let stamped = stamp_metadata(&pdf, &metadata).unwrap();

        let doc = lopdf::Document::load_mem(&stamped).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(info_id).unwrap().as_dict().unwrap();

        assert_eq!(
            info.get(b"Title").unwrap().as_str().unwrap(),
            b"Signed agreement"
        );
        assert_eq!(
            info.get(b"Author").unwrap().as_str().unwrap(),
            b"Jane Doe"
        );
        assert!(info.get(b"Producer").is_ok());
        assert!(info.get(b"CreationDate").is_ok());
        assert!(info.get(b"ModDate").is_ok());
    }

    #[test]
    fn test_stamp_metadata_rejects_garbage() {
        let metadata = DocumentMetadata::default();
        assert!(matches!(
            stamp_metadata(b"not a pdf", &metadata),
            Err(Error::InvalidPdf { .. })
        ));
    }

    #[test]
    fn test_embed_values_rejects_non_pdf_bytes() {
        let result = embed_values(b"junk", &[], &[], &EmbedOptions::default());
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }
}
