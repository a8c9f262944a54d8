//! AcroForm widget detection
//!
//! Walks every page's widget annotations and reports them as placeable
//! fields with relative top-origin coordinates. Detection is advisory: any
//! failure yields an empty list rather than an error, so callers can always
//! fall back to manual placement.

use crate::error::{Error, Result};
use crate::model::{Field, FieldKind, PageGeometry};
use crate::pdf::geometry::{relative_area, ResolvedRect};
use crate::pdf::{create_pdfium, load_document};
use pdfium_render::prelude::*;

/// Detect form fields in a PDF. Returns an empty list when the document has
/// no widgets or cannot be inspected.
pub fn detect_fields(data: &[u8]) -> Vec<Field> {
    match try_detect_fields(data) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!(error = %e, "field detection failed, returning no fields");
            Vec::new()
        }
    }
}

fn try_detect_fields(data: &[u8]) -> Result<Vec<Field>> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }

    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data)?;

    let mut fields = Vec::new();

    for (page_index, page) in document.pages().iter().enumerate() {
        let page_number = page_index as u32 + 1;
        let page_width = page.width().value;
        let page_height = page.height().value;

        for (annotation_index, annotation) in page.annotations().iter().enumerate() {
            let Some(form_field) = annotation.as_form_field() else {
                continue;
            };

            let Some(kind) = field_kind(&form_field) else {
                continue;
            };

            let bounds = match annotation.bounds() {
                Ok(bounds) => bounds,
                Err(e) => {
                    tracing::debug!(
                        page = page_number,
                        error = %e,
                        "widget without bounds skipped"
                    );
                    continue;
                }
            };

            let rect = ResolvedRect {
                x: bounds.left().value,
                y: bounds.bottom().value,
                w: bounds.right().value - bounds.left().value,
                h: bounds.top().value - bounds.bottom().value,
            };

            let id = match form_field.name() {
                Some(name) if !name.is_empty() => name,
                _ => format!("field-{}-{}", page_number, annotation_index + 1),
            };

            fields.push(Field {
                id,
                kind,
                page: page_number,
                area: relative_area(&rect, page_width, page_height),
                required: false,
            });
        }
    }

    Ok(fields)
}

/// Map a widget's form field class to a field kind. Push buttons and
/// unrecognized classes are not placeable and yield `None`.
fn field_kind(form_field: &PdfFormField) -> Option<FieldKind> {
    if form_field.as_text_field().is_some() {
        Some(FieldKind::Text)
    } else if form_field.as_checkbox_field().is_some() {
        Some(FieldKind::Checkbox)
    } else if form_field.as_radio_button_field().is_some() {
        Some(FieldKind::Radio)
    } else if form_field.as_combo_box_field().is_some() || form_field.as_list_box_field().is_some()
    {
        Some(FieldKind::Select)
    } else if form_field.as_signature_field().is_some() {
        Some(FieldKind::Signature)
    } else {
        None
    }
}

/// Read per-page dimensions in PDF points
pub fn page_geometry(data: &[u8]) -> Result<Vec<PageGeometry>> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }

    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data)?;

    let geometry = document
        .pages()
        .iter()
        .enumerate()
        .map(|(index, page)| PageGeometry {
            page: index as u32 + 1,
            width: page.width().value,
            height: page.height().value,
        })
        .collect();

    Ok(geometry)
}
