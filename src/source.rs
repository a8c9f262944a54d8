//! Source resolution for PDF data

use crate::error::{Error, Result};
use base64::Engine;
use std::path::Path;

/// Resolved PDF data
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
}

/// Resolve a file path to PDF data
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path).map_err(Error::Io)?;

    // Validate PDF header
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }

    Ok(ResolvedPdf {
        data,
        source_name: path.display().to_string(),
    })
}

/// Resolve base64 encoded data to PDF data
pub fn resolve_base64(base64_data: &str) -> Result<ResolvedPdf> {
    let engine = base64::engine::general_purpose::STANDARD;
    let data = engine.decode(base64_data)?;

    // Validate PDF header
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Decoded data is not a valid PDF file".to_string(),
        });
    }

    Ok(ResolvedPdf {
        data,
        source_name: "<base64>".to_string(),
    })
}
