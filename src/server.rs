//! MCP Server implementation using rmcp

use crate::model::{
    DocumentMetadata, Field, PageGeometry, SkippedField, ValueBinding,
};
use crate::pdf::{detect_fields, embed_values, page_geometry, EmbedOptions};
use crate::source::{resolve_base64, resolve_path, ResolvedPdf};
use anyhow::Result;
use base64::Engine;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// PDF source specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        if let Some(obj) = value.as_object() {
            if let Some(v) = obj.get("path") {
                if let Some(s) = v.as_str() {
                    return Ok(PdfSource::Path {
                        path: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"path\" must be a string"));
            }
            if let Some(v) = obj.get("base64") {
                if let Some(s) = v.as_str() {
                    return Ok(PdfSource::Base64 {
                        base64: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"base64\" must be a string"));
            }
            let keys: Vec<&String> = obj.keys().collect();
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\" or \"base64\", but got keys: {:?}",
                keys
            )))
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\" or \"base64\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )))
        }
    }
}

/// Security and resource configuration for the Docsign MCP Server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories PDF sources and outputs may live in (empty = any)
    pub resource_dirs: Vec<String>,
    /// Directory holding stored signature images for path-based values
    pub signature_dir: Option<String>,
    /// Maximum decoded signature image pixel area (default: 100_000_000)
    pub max_image_pixels: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            signature_dir: None,
            max_image_pixels: 100_000_000,
        }
    }
}

/// Docsign MCP Server
#[derive(Clone)]
pub struct DocsignServer {
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request/Response types for detect_fields
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetectFieldsParams {
    /// PDF sources to scan for form fields
    pub sources: Vec<PdfSource>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DetectFieldsResult {
    /// Source identifier
    pub source: String,
    /// Detected fields with relative top-origin coordinates
    pub fields: Vec<Field>,
    /// Number of detected fields
    pub total_count: u32,
    /// Error message if detection failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for embed_fields and embed_signatures
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmbedFieldsParams {
    /// PDF to embed into
    pub source: PdfSource,
    /// Fields to place
    pub fields: Vec<Field>,
    /// Values bound to fields by id
    pub values: Vec<ValueBinding>,
    /// Info dictionary values for the output document
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
    /// Path to write the output PDF to
    #[serde(default)]
    pub output_path: Option<String>,
    /// Include the output PDF as base64 in the response (default: false)
    #[serde(default)]
    pub return_base64: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmbedSignaturesParams {
    /// PDF to embed into
    pub source: PdfSource,
    /// Fields to place
    pub fields: Vec<Field>,
    /// Values bound to fields by id; signer info is drawn beneath
    /// signature images
    pub values: Vec<ValueBinding>,
    /// Info dictionary values for the output document
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
    /// Path to write the output PDF to
    #[serde(default)]
    pub output_path: Option<String>,
    /// Include the output PDF as base64 in the response (default: false)
    #[serde(default)]
    pub return_base64: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct EmbedResult {
    /// Source identifier
    pub source: String,
    /// Number of fields rendered
    pub fields_rendered: u32,
    /// Fields skipped with reasons
    pub fields_skipped: Vec<SkippedField>,
    /// Size of the output PDF in bytes
    pub output_bytes: u64,
    /// Path the output was written to, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Base64 encoded output PDF, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_base64: Option<String>,
    /// Error message if embedding failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for get_page_geometry
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetPageGeometryParams {
    /// PDF sources to measure
    pub sources: Vec<PdfSource>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GetPageGeometryResult {
    /// Source identifier
    pub source: String,
    /// Per-page dimensions in PDF points
    pub pages: Vec<PageGeometry>,
    /// Number of pages
    pub page_count: u32,
    /// Error message if the document could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[tool_router]
impl DocsignServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new DocsignServer with specified resource directories
    pub fn with_resource_dirs(dirs: Vec<String>) -> Self {
        Self::with_config(ServerConfig {
            resource_dirs: dirs,
            ..ServerConfig::default()
        })
    }

    /// Create a new DocsignServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Detect AcroForm fields in PDF documents
    #[tool(
        description = "Detect AcroForm form fields (text, checkbox, radio, select, signature) in PDF documents. Returns each field's page and area in relative top-origin coordinates, ready to be passed back to embed_fields. Documents without form fields return an empty list.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn detect_fields(&self, Parameters(params): Parameters<DetectFieldsParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_detect_fields(source)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "detect_fields failed");
                    DetectFieldsResult {
                        source: Self::source_name(source),
                        fields: vec![],
                        total_count: 0,
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Embed field values into a PDF document
    #[tool(
        description = "Embed field values (signature images, text, dates) into a PDF at the given field areas. Field areas use top-left-origin coordinates; values <= 1.0 in every component are fractions of the page size, anything else is absolute points. Fields that fail are skipped and reported; the rest still render.

Value format: {\"type\": \"signature_image\", \"image\": \"data:image/png;base64,...\"}, {\"type\": \"text\", \"text\": \"...\"}, or {\"type\": \"date\", \"date\": \"YYYY-MM-DD\"}

Source format: one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn embed_fields(&self, Parameters(params): Parameters<EmbedFieldsParams>) -> String {
        let result = self
            .process_embed(
                &params.source,
                params.fields,
                params.values,
                params.metadata,
                &params.output_path,
                params.return_base64,
                false,
            )
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "embed_fields failed");
                Self::embed_error_result(&params.source, e)
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Embed signatures with signer captions into a PDF document
    #[tool(
        description = "Embed signature values into a PDF like embed_fields, additionally drawing each signer's name, email, and signing timestamp beneath signature images. Bindings should carry a \"signer\" object: {\"name\": \"...\", \"email\": \"...\", \"signed_at\": \"RFC 3339 timestamp\"}.

Source format: one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn embed_signatures(
        &self,
        Parameters(params): Parameters<EmbedSignaturesParams>,
    ) -> String {
        let result = self
            .process_embed(
                &params.source,
                params.fields,
                params.values,
                params.metadata,
                &params.output_path,
                params.return_base64,
                true,
            )
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "embed_signatures failed");
                Self::embed_error_result(&params.source, e)
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Read per-page dimensions from PDF documents
    #[tool(
        description = "Read each page's width and height in PDF points. Useful for computing absolute field placements; pages in one document are not assumed to share a size.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn get_page_geometry(
        &self,
        Parameters(params): Parameters<GetPageGeometryParams>,
    ) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_page_geometry(source)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "get_page_geometry failed");
                    GetPageGeometryResult {
                        source: Self::source_name(source),
                        pages: vec![],
                        page_count: 0,
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }
}

impl DocsignServer {
    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
        }
    }

    fn embed_error_result(source: &PdfSource, e: crate::error::Error) -> EmbedResult {
        EmbedResult {
            source: Self::source_name(source),
            fields_rendered: 0,
            fields_skipped: vec![],
            output_bytes: 0,
            output_path: None,
            output_base64: None,
            error: Some(e.client_message()),
        }
    }

    fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<ResolvedPdf> {
        match source {
            PdfSource::Path { path } => {
                self.validate_path_access(path)?;
                resolve_path(path)
            }
            PdfSource::Base64 { base64 } => resolve_base64(base64),
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| {
            crate::error::Error::PathAccessDenied {
                path: path.to_string(),
            }
        })?;

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical.starts_with(&canonical_dir) {
                    return Ok(canonical);
                }
            }
        }

        Err(crate::error::Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Validate that an output path is within allowed resource directories.
    /// Canonicalizes the parent directory since the output file may not
    /// exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let path_obj = Path::new(path);
        let parent = path_obj.parent().unwrap_or(Path::new("."));

        let canonical_parent = std::fs::canonicalize(parent).map_err(|_| {
            crate::error::Error::PathAccessDenied {
                path: path.to_string(),
            }
        })?;

        let canonical_target = canonical_parent.join(
            path_obj
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("")),
        );

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical_target.starts_with(&canonical_dir) {
                    return Ok(canonical_target);
                }
            }
        }

        Err(crate::error::Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Write output data to a file path, with sandbox validation.
    fn write_output(
        &self,
        output_path: &Option<String>,
        data: &[u8],
    ) -> crate::error::Result<Option<String>> {
        if let Some(ref path_str) = output_path {
            self.validate_output_path_access(path_str)?;

            let path = Path::new(path_str);

            // Create parent directories if they don't exist
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            std::fs::write(path, data)?;
            Ok(Some(path_str.clone()))
        } else {
            Ok(None)
        }
    }

    async fn process_detect_fields(
        &self,
        source: &PdfSource,
    ) -> crate::error::Result<DetectFieldsResult> {
        let resolved = self.resolve_source(source)?;
        let source_name = resolved.source_name.clone();

        // Move CPU-heavy PDF work to blocking thread pool
        let data = resolved.data;
        let fields = tokio::task::spawn_blocking(move || detect_fields(&data))
            .await
            .map_err(|e| crate::error::Error::Pdfium {
                reason: format!("Task join error: {}", e),
            })?;

        Ok(DetectFieldsResult {
            source: source_name,
            total_count: fields.len() as u32,
            fields,
            error: None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_embed(
        &self,
        source: &PdfSource,
        fields: Vec<Field>,
        values: Vec<ValueBinding>,
        metadata: Option<DocumentMetadata>,
        output_path: &Option<String>,
        return_base64: bool,
        draw_signer_captions: bool,
    ) -> crate::error::Result<EmbedResult> {
        let resolved = self.resolve_source(source)?;
        let source_name = resolved.source_name.clone();

        let options = EmbedOptions {
            draw_signer_captions,
            metadata,
            signature_dir: self.config.signature_dir.as_ref().map(PathBuf::from),
            max_image_pixels: self.config.max_image_pixels,
        };

        let data = resolved.data;
        let report = tokio::task::spawn_blocking(move || {
            embed_values(&data, &fields, &values, &options)
        })
        .await
        .map_err(|e| crate::error::Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        let output_path = self.write_output(output_path, &report.data)?;
        let output_base64 = if return_base64 {
            Some(base64::engine::general_purpose::STANDARD.encode(&report.data))
        } else {
            None
        };

        Ok(EmbedResult {
            source: source_name,
            fields_rendered: report.fields_rendered,
            fields_skipped: report.fields_skipped,
            output_bytes: report.data.len() as u64,
            output_path,
            output_base64,
            error: None,
        })
    }

    async fn process_page_geometry(
        &self,
        source: &PdfSource,
    ) -> crate::error::Result<GetPageGeometryResult> {
        let resolved = self.resolve_source(source)?;
        let source_name = resolved.source_name.clone();

        let data = resolved.data;
        let pages = tokio::task::spawn_blocking(move || page_geometry(&data))
            .await
            .map_err(|e| crate::error::Error::Pdfium {
                reason: format!("Task join error: {}", e),
            })??;

        Ok(GetPageGeometryResult {
            source: source_name,
            page_count: pages.len() as u32,
            pages,
            error: None,
        })
    }
}

impl Default for DocsignServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for DocsignServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Docsign MCP Server embeds signature images, text, and dates into PDF \
                 documents at stored field positions, and detects existing AcroForm \
                 fields so they can be reused as placements."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server without resource directories
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with specified resource directories
pub async fn run_server_with_dirs(resource_dirs: Vec<String>) -> Result<()> {
    run_server_with_config(ServerConfig {
        resource_dirs,
        ..ServerConfig::default()
    })
    .await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = DocsignServer::with_config(config);

    tracing::info!("Docsign MCP Server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source_name() {
        assert_eq!(
            DocsignServer::source_name(&PdfSource::Path {
                path: "/agreement.pdf".to_string()
            }),
            "/agreement.pdf"
        );
        assert_eq!(
            DocsignServer::source_name(&PdfSource::Base64 {
                base64: "AAAA".to_string()
            }),
            "<base64>"
        );
    }

    #[test]
    fn test_pdf_source_deserialize() {
        let source: PdfSource = serde_json::from_str(r#"{"path": "/a.pdf"}"#).unwrap();
        assert!(matches!(source, PdfSource::Path { ref path } if path == "/a.pdf"));

        let source: PdfSource = serde_json::from_str(r#"{"base64": "QQ=="}"#).unwrap();
        assert!(matches!(source, PdfSource::Base64 { .. }));
    }

    #[test]
    fn test_pdf_source_deserialize_friendly_errors() {
        let err = serde_json::from_str::<PdfSource>(r#"{"url": "https://example.com/a.pdf"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("\"path\" or \"base64\""));

        let err = serde_json::from_str::<PdfSource>(r#""just-a-string""#).unwrap_err();
        assert!(err.to_string().contains("a string"));

        let err = serde_json::from_str::<PdfSource>(r#"{"path": 42}"#).unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert!(config.resource_dirs.is_empty());
        assert!(config.signature_dir.is_none());
        assert_eq!(config.max_image_pixels, 100_000_000);
    }

    #[test]
    fn test_validate_path_access_unrestricted() {
        let server = DocsignServer::new();
        assert!(server.validate_path_access("/anywhere/file.pdf").is_ok());
    }

    #[test]
    fn test_validate_path_access_sandboxed() {
        let allowed = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();

        let inside_path = allowed.path().join("doc.pdf");
        std::fs::write(&inside_path, b"%PDF-1.7").unwrap();
        let outside_path = outside.path().join("doc.pdf");
        std::fs::write(&outside_path, b"%PDF-1.7").unwrap();

        let server = DocsignServer::with_resource_dirs(vec![allowed
            .path()
            .to_string_lossy()
            .to_string()]);

        assert!(server
            .validate_path_access(&inside_path.to_string_lossy())
            .is_ok());
        assert!(matches!(
            server.validate_path_access(&outside_path.to_string_lossy()),
            Err(crate::error::Error::PathAccessDenied { .. })
        ));
    }

    #[test]
    fn test_validate_output_path_access_sandboxed() {
        let allowed = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();

        let server = DocsignServer::with_resource_dirs(vec![allowed
            .path()
            .to_string_lossy()
            .to_string()]);

        let inside_target = allowed.path().join("signed.pdf");
        assert!(server
            .validate_output_path_access(&inside_target.to_string_lossy())
            .is_ok());

        let outside_target = outside.path().join("signed.pdf");
        assert!(matches!(
            server.validate_output_path_access(&outside_target.to_string_lossy()),
            Err(crate::error::Error::PathAccessDenied { .. })
        ));
    }

    #[test]
    fn test_write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/signed.pdf");

        let server = DocsignServer::new();
        let written = server
            .write_output(&Some(target.to_string_lossy().to_string()), b"%PDF-1.7")
            .unwrap();

        assert!(written.is_some());
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn test_write_output_none_is_noop() {
        let server = DocsignServer::new();
        assert_eq!(server.write_output(&None, b"%PDF-1.7").unwrap(), None);
    }
}
