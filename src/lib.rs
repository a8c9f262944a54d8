//! Docsign MCP Server Library
//!
//! This crate provides MCP tools for electronic signature workflows:
//! - `detect_fields`: Detect AcroForm form fields and their placements
//! - `embed_fields`: Embed signature images, text, and dates into PDFs
//! - `embed_signatures`: Embed signatures with signer caption blocks
//! - `get_page_geometry`: Read per-page dimensions in PDF points

pub mod error;
pub mod model;
pub mod pdf;
pub mod server;
pub mod source;

pub use error::{Error, Result};
pub use model::{
    DocumentMetadata, EmbedReport, Field, FieldArea, FieldKind, FieldValue, PageGeometry,
    SignerInfo, SkippedField, ValueBinding,
};
pub use server::{
    run_server, run_server_with_config, run_server_with_dirs, DocsignServer, PdfSource,
    ServerConfig,
};
