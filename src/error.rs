//! Error types for Docsign MCP Server

use thiserror::Error;

/// Result type alias for Docsign MCP Server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Docsign MCP Server
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// Signature image referenced by path but no signature directory is configured
    #[error("No signature directory configured")]
    MissingSignatureDir,

    /// Signature image file not found
    #[error("Signature image not found: {path}")]
    SignatureImageNotFound { path: String },

    /// Signature image format is not PNG or JPEG
    #[error("Unsupported image format: {detail}")]
    UnsupportedImageFormat { detail: String },

    /// Signature image could not be decoded
    #[error("Image decode error: {reason}")]
    ImageDecode { reason: String },

    /// Image dimension exceeded
    #[error("Image dimension exceeded: {detail}")]
    ImageDimensionExceeded { detail: String },

    /// Date value is not a valid YYYY-MM-DD date
    #[error("Invalid date value: {value}")]
    InvalidDate { value: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::MissingSignatureDir => "No signature directory configured".to_string(),
            Error::SignatureImageNotFound { .. } => "Signature image not found".to_string(),
            Error::UnsupportedImageFormat { detail } => {
                format!("Unsupported image format: {}", detail)
            }
            Error::ImageDecode { .. } => "Failed to decode signature image".to_string(),
            Error::ImageDimensionExceeded { detail } => {
                format!("Image dimension exceeded: {}", detail)
            }
            Error::InvalidDate { value } => format!("Invalid date value: {}", value),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
        }
    }
}
