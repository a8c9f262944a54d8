//! Field coordinate resolution
//!
//! Stored field areas use a top-left origin and are either fractions of the
//! page size or absolute points. PDF page space has a bottom-left origin, so
//! resolution scales relative areas and flips the Y axis. `relative_area` is
//! the exact inverse, used when reporting detected widgets back in storage
//! coordinates.

use crate::model::FieldArea;

/// A rectangle in PDF page space (bottom-left origin, points)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// An area is relative when every component fits in the unit interval.
/// A 1pt-wide absolute field would be misread as relative, but no real
/// placement is under a point in every dimension.
pub fn is_relative(area: &FieldArea) -> bool {
    area.x <= 1.0 && area.y <= 1.0 && area.w <= 1.0 && area.h <= 1.0
}

/// Resolve a stored field area to PDF page coordinates
pub fn resolve_area(area: &FieldArea, page_width: f32, page_height: f32) -> ResolvedRect {
    let (x, top_y, w, h) = if is_relative(area) {
        (
            area.x * page_width,
            area.y * page_height,
            area.w * page_width,
            area.h * page_height,
        )
    } else {
        (area.x, area.y, area.w, area.h)
    };

    ResolvedRect {
        x,
        y: page_height - top_y - h,
        w,
        h,
    }
}

/// Convert a PDF page rectangle back to a relative top-origin area
pub fn relative_area(rect: &ResolvedRect, page_width: f32, page_height: f32) -> FieldArea {
    FieldArea {
        x: rect.x / page_width,
        y: (page_height - rect.y - rect.h) / page_height,
        w: rect.w / page_width,
        h: rect.h / page_height,
    }
}

/// Whether any part of the rectangle falls outside the page
pub fn is_off_page(rect: &ResolvedRect, page_width: f32, page_height: f32) -> bool {
    rect.x < 0.0
        || rect.y < 0.0
        || rect.x + rect.w > page_width
        || rect.y + rect.h > page_height
}

/// Uniform scale factor that fits an image inside a rectangle while
/// preserving aspect ratio
pub fn fit_scale(rect_w: f32, rect_h: f32, image_w: f32, image_h: f32) -> f32 {
    (rect_w / image_w).min(rect_h / image_h)
}

/// Bottom-left position centering a box of the given size within the rect
pub fn centered_offset(rect: &ResolvedRect, w: f32, h: f32) -> (f32, f32) {
    (rect.x + (rect.w - w) / 2.0, rect.y + (rect.h - h) / 2.0)
}
