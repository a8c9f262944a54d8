//! Shared data model for signature fields and their values
//!
//! Fields describe WHERE something goes on a document (page + area),
//! value bindings describe WHAT goes there. The two are joined by field id
//! at embedding time.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Field placement area.
///
/// Coordinates use a top-left origin (y grows downward). When all four
/// components are <= 1.0 they are fractions of the page size; otherwise
/// they are absolute PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldArea {
    pub x: f32,
    pub y: f32,
    /// Width
    pub w: f32,
    /// Height
    pub h: f32,
}

/// Kind of signature field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Signature,
    Text,
    Date,
    /// Detection-only: reported by `detect_fields`, not renderable
    Checkbox,
    /// Detection-only
    Radio,
    /// Detection-only (combo and list boxes)
    Select,
}

/// A placeable field on a document
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    /// Stable identifier, referenced by value bindings
    pub id: String,
    pub kind: FieldKind,
    /// Page number (1-indexed)
    pub page: u32,
    pub area: FieldArea,
    /// Whether a signer must complete this field
    #[serde(default)]
    pub required: bool,
}

/// Value to render into a field, dispatched by the `type` tag
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldValue {
    /// Signature image: a data URI (`data:image/png;base64,...` or JPEG)
    /// or a file path relative to the configured signature directory
    SignatureImage { image: String },
    /// Plain text, or a JSON object `{"text", "fontSize", "fontColor", "textAlign"}`
    Text { text: String },
    /// Date in `YYYY-MM-DD` form
    Date { date: String },
}

/// Signer identity drawn as a caption beneath embedded signature images
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SignerInfo {
    pub name: String,
    pub email: String,
    /// RFC 3339 timestamp of when the signature was captured
    #[serde(default)]
    pub signed_at: Option<String>,
}

/// Binding of a value to a field.
///
/// When several bindings reference the same field id, the one with the most
/// recent `signed_at` wins; bindings without a parseable timestamp lose to
/// timestamped ones, and remaining ties go to the later binding in input
/// order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValueBinding {
    /// Field id this value applies to
    pub field_id: String,
    pub value: FieldValue,
    /// RFC 3339 timestamp used for most-recent-wins resolution
    #[serde(default)]
    pub signed_at: Option<String>,
    /// Signer identity, used by caption rendering
    #[serde(default)]
    pub signer: Option<SignerInfo>,
}

/// Document info dictionary values stamped into the output PDF
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub producer: Option<String>,
}

/// A field that could not be rendered, with the reason
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SkippedField {
    pub field_id: String,
    pub reason: String,
}

/// Result of an embedding pass over a document
#[derive(Debug)]
pub struct EmbedReport {
    /// Number of fields successfully rendered
    pub fields_rendered: u32,
    /// Fields whose values failed to render, with reasons. Fields with no
    /// bound value are not listed; they simply stay blank.
    pub fields_skipped: Vec<SkippedField>,
    /// The assembled PDF
    pub data: Vec<u8>,
}

/// Page dimensions in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct PageGeometry {
    /// Page number (1-indexed)
    pub page: u32,
    pub width: f32,
    pub height: f32,
}
