//! PDF processing layer
//!
//! Coordinate resolution, value rendering, document assembly, and AcroForm
//! field detection, all backed by PDFium.

mod assemble;
mod detect;
mod geometry;
mod render;

pub use assemble::{embed_values, EmbedOptions};
pub use detect::{detect_fields, page_geometry};
pub use geometry::{
    centered_offset, fit_scale, is_off_page, is_relative, relative_area, resolve_area,
    ResolvedRect,
};
pub use render::{
    aligned_text_x, decode_signature_image, format_date_es, parse_text_payload, TextAlign,
    TextStyle, TEXT_EDGE_PADDING,
};

use crate::error::{Error, Result};
use pdfium_render::prelude::*;

/// Get a PDFium instance (creates a new instance each time - PDFium is not
/// thread-safe)
pub(crate) fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

pub(crate) fn load_document<'a>(pdfium: &'a Pdfium, data: &'a [u8]) -> Result<PdfDocument<'a>> {
    pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| match e {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                Error::PasswordRequired
            }
            _ => Error::Pdfium {
                reason: format!("{}", e),
            },
        })
}
