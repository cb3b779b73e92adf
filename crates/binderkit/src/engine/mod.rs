//! # Document Engine
//!
//! The engine is the opaque native service that actually reads and writes
//! container files. Everything above this module only ever talks to it through
//! [`DocumentEngine`], a narrow call-per-operation interface.
//!
//! ## Addressing
//!
//! - Pages are addressed by their **absolute** 0-based index in the file. In a
//!   binder, the flat page list spans every sub-document; [`PageAddress`] also
//!   names the sub-document region so an insert at a region boundary is not
//!   ambiguous.
//! - Annotations are addressed by `(page, parent, index)` when enumerating and
//!   by their [`AnnotationHandle`] afterwards.
//! - Sub-documents and attachments are addressed by 0-based index.
//!
//! ## Units
//!
//! Lengths cross this boundary as integers in 1/100 mm. Dates cross as Unix
//! timestamps. Conversion to user-facing units happens in the proxies.
//!
//! ## Implementations
//!
//! - [`memory::MemEngine`]: in-memory engine for tests and tooling.
//!
//! A binding to the native engine implements the same trait out of tree.

pub mod memory;

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::attributes::codec::{
    Code, COMPRESS, FIT_IMAGE, HORIZONTAL_POSITION, MAX_PAPER_SIZE, VERTICAL_POSITION,
};
use crate::attributes::RawAttribute;
use crate::geometry::{to_hundredths, Size};

pub use memory::MemEngine;

/// Vendor status codes reported by the engine.
pub mod codes {
    pub const NOT_INSTALLED: u32 = 0x8004_0001;
    pub const INFO_NOT_FOUND: u32 = 0x8004_0002;
    pub const INSUFFICIENT_BUFFER: u32 = 0x8007_007A;
    pub const FILE_NOT_FOUND: u32 = 0x8007_0002;
    pub const FILE_EXISTS: u32 = 0x8007_0050;
    pub const ACCESSDENIED: u32 = 0x8007_0005;
    pub const BAD_FORMAT: u32 = 0x8007_000B;
    pub const OUTOFMEMORY: u32 = 0x8007_000E;
    pub const WRITE_FAULT: u32 = 0x8007_001D;
    pub const SHARING_VIOLATION: u32 = 0x8007_0020;
    pub const DISK_FULL: u32 = 0x8007_0027;
    pub const INVALIDARG: u32 = 0x8007_0057;
    pub const INVALID_NAME: u32 = 0x8007_007B;
    pub const INVALID_ACCESS: u32 = 0x8004_0003;
    pub const INVALID_OPERATION: u32 = 0x8004_0004;
    pub const NEWFORMAT: u32 = 0x800E_0004;
    pub const BAD_NETPATH: u32 = 0x800E_0005;
    pub const APPLICATION_FAILED: u32 = 0x8000_1156;
    pub const SIGNATURE_MODULE: u32 = 0x800E_0010;
    pub const PROTECT_MODULE: u32 = 0x800E_0012;
    pub const UNEXPECTED: u32 = 0x8000_FFFF;
    pub const CANCELED: u32 = 0x8004_0005;
    pub const ANNOTATION_NOT_ACCEPTED: u32 = 0x8004_0006;

    const NAMES: &[(u32, &str)] = &[
        (NOT_INSTALLED, "NOT_INSTALLED"),
        (INFO_NOT_FOUND, "INFO_NOT_FOUND"),
        (INSUFFICIENT_BUFFER, "INSUFFICIENT_BUFFER"),
        (FILE_NOT_FOUND, "FILE_NOT_FOUND"),
        (FILE_EXISTS, "FILE_EXISTS"),
        (ACCESSDENIED, "ACCESSDENIED"),
        (BAD_FORMAT, "BAD_FORMAT"),
        (OUTOFMEMORY, "OUTOFMEMORY"),
        (WRITE_FAULT, "WRITE_FAULT"),
        (SHARING_VIOLATION, "SHARING_VIOLATION"),
        (DISK_FULL, "DISK_FULL"),
        (INVALIDARG, "INVALIDARG"),
        (INVALID_NAME, "INVALID_NAME"),
        (INVALID_ACCESS, "INVALID_ACCESS"),
        (INVALID_OPERATION, "INVALID_OPERATION"),
        (NEWFORMAT, "NEWFORMAT"),
        (BAD_NETPATH, "BAD_NETPATH"),
        (APPLICATION_FAILED, "APPLICATION_FAILED"),
        (SIGNATURE_MODULE, "SIGNATURE_MODULE"),
        (PROTECT_MODULE, "PROTECT_MODULE"),
        (UNEXPECTED, "UNEXPECTED"),
        (CANCELED, "CANCELED"),
        (ANNOTATION_NOT_ACCEPTED, "ANNOTATION_NOT_ACCEPTED"),
    ];

    /// Symbolic name of a status code, `UNDEFINED` when unknown.
    pub fn name(code: u32) -> &'static str {
        NAMES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, name)| *name)
            .unwrap_or("UNDEFINED")
    }
}

/// A failure reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub code: u32,
    pub detail: Option<String>,
}

impl EngineError {
    pub fn new(code: u32) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: u32, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }

    pub fn name(&self) -> &'static str {
        codes::name(self.code)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:08X})", self.name(), self.code)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Handle to an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandle(pub u64);

/// Stable handle of one annotation inside an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AnnotationHandle(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub read_only: bool,
    pub authenticate: bool,
}

impl Default for OpenMode {
    fn default() -> Self {
        Self {
            read_only: false,
            authenticate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentType {
    Document,
    Binder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Raw engine format version. Documents report it offset by 3.
    pub version: i64,
    pub attachment_count: usize,
    pub document_type: DocumentType,
    pub permissions: u32,
    pub show_annotations: bool,
    pub sub_document_count: usize,
    pub signature_count: usize,
    pub attribute_count: usize,
    pub binder_color: i64,
    pub binder_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubDocumentInfo {
    pub name: String,
    pub page_count: usize,
    pub attachment_count: usize,
}

/// Descriptive fields of one page. Lengths in 1/100 mm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub width: i64,
    pub height: i64,
    pub page_type: i64,
    pub horizontal_resolution: i64,
    pub vertical_resolution: i64,
    pub compress_type: i64,
    pub annotation_count: usize,
    pub degree: i64,
    pub original_width: i64,
    pub original_height: i64,
    pub original_horizontal_resolution: i64,
    pub original_vertical_resolution: i64,
    pub image_width: i64,
    pub image_height: i64,
    pub is_color: bool,
    pub bits_per_pixel: i64,
}

/// Descriptive fields of one annotation. Lengths in 1/100 mm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationInfo {
    pub handle: AnnotationHandle,
    pub annotation_type: i64,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub child_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentInfo {
    pub name: String,
    pub size: u64,
    /// Unix timestamp.
    pub timestamp: i64,
    pub text_type: i64,
}

/// Owner of an engine-side named attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeTarget {
    Document,
    Annotation(AnnotationHandle),
    PageForm(i64),
}

/// Owner of an opaque user attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAttributeTarget {
    Document,
    Page(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageAddress {
    /// Binder region the page belongs to; `None` for plain documents.
    pub sub_document: Option<usize>,
    /// Absolute page index.
    pub page: usize,
}

/// Placement codes for an image inserted as a new page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    pub fit: i64,
    pub compress: i64,
    pub zoom: i64,
    /// Requested page size in 1/100 mm; zero keeps the engine default.
    pub width: i64,
    pub height: i64,
    pub horizontal_position: i64,
    pub vertical_position: i64,
    pub max_paper_size: i64,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            fit: FIT_IMAGE.default_code(),
            compress: COMPRESS.default_code(),
            zoom: 100,
            width: 0,
            height: 0,
            horizontal_position: HORIZONTAL_POSITION.default_code(),
            vertical_position: VERTICAL_POSITION.default_code(),
            max_paper_size: MAX_PAPER_SIZE.default_code(),
        }
    }
}

impl ImageOptions {
    pub fn with_fit<'a>(mut self, fit: impl Into<Code<'a>>) -> Self {
        self.fit = FIT_IMAGE.normalize(fit);
        self
    }

    pub fn with_compress<'a>(mut self, compress: impl Into<Code<'a>>) -> Self {
        self.compress = COMPRESS.normalize(compress);
        self
    }

    /// Zoom in percent.
    pub fn with_zoom(mut self, zoom: i64) -> Self {
        self.zoom = zoom;
        self
    }

    /// Page size in mm.
    pub fn with_size(mut self, size: Size) -> Self {
        self.width = to_hundredths(size.width);
        self.height = to_hundredths(size.height);
        self
    }

    pub fn with_position<'a, 'b>(
        mut self,
        horizontal: impl Into<Code<'a>>,
        vertical: impl Into<Code<'b>>,
    ) -> Self {
        self.horizontal_position = HORIZONTAL_POSITION.normalize(horizontal);
        self.vertical_position = VERTICAL_POSITION.normalize(vertical);
        self
    }

    pub fn with_max_paper_size<'a>(mut self, size: impl Into<Code<'a>>) -> Self {
        self.max_paper_size = MAX_PAPER_SIZE.normalize(size);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// Every page of another document file.
    File(PathBuf),
    /// One page built from an image file.
    Image {
        path: PathBuf,
        options: ImageOptions,
    },
}

/// Type-specific data supplied when creating an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationInit {
    Default,
    /// Width and height in 1/100 mm.
    Size { width: i64, height: i64 },
    /// Width in 1/100 mm; the engine picks the height (stamps).
    Width(i64),
    /// Flat `x0, y0, x1, y1, ...` buffer in 1/100 mm.
    Points(Vec<i64>),
    /// Source file for bitmap annotations.
    File(PathBuf),
    /// Plug-in defined annotation: size in 1/100 mm, the plug-in's GUID and
    /// its opaque payload.
    Custom {
        width: i64,
        height: i64,
        guid: String,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnnotation {
    pub annotation_type: i64,
    pub x: i64,
    pub y: i64,
    pub init: AnnotationInit,
}

/// Calls issued to the native document engine.
///
/// All methods take `&self`; implementations use interior mutability.
pub trait DocumentEngine {
    // --- Lifecycle ---

    fn open(&self, path: &Path, mode: OpenMode) -> EngineResult<EngineHandle>;

    fn close(&self, handle: EngineHandle) -> EngineResult<()>;

    fn save(&self, handle: EngineHandle) -> EngineResult<()>;

    // --- Document ---

    fn document_info(&self, handle: EngineHandle) -> EngineResult<DocumentInfo>;

    fn show_annotations(&self, handle: EngineHandle, show: bool) -> EngineResult<()>;

    // --- Binder ---

    fn sub_document_info(&self, handle: EngineHandle, index: usize)
        -> EngineResult<SubDocumentInfo>;

    fn insert_sub_document(
        &self,
        handle: EngineHandle,
        index: usize,
        source: &Path,
    ) -> EngineResult<()>;

    fn delete_sub_document(&self, handle: EngineHandle, index: usize) -> EngineResult<()>;

    // --- Pages ---

    fn page_info(&self, handle: EngineHandle, page: usize) -> EngineResult<PageInfo>;

    fn page_text(&self, handle: EngineHandle, page: usize) -> EngineResult<String>;

    /// Inserts pages before `at`, returning how many were inserted.
    fn insert_pages(
        &self,
        handle: EngineHandle,
        at: PageAddress,
        source: &PageSource,
    ) -> EngineResult<usize>;

    fn delete_page(&self, handle: EngineHandle, at: PageAddress) -> EngineResult<()>;

    // --- Annotations ---

    fn annotation_info(
        &self,
        handle: EngineHandle,
        page: usize,
        parent: Option<AnnotationHandle>,
        index: usize,
    ) -> EngineResult<AnnotationInfo>;

    /// Appends a new annotation to the page or parent annotation.
    fn add_annotation(
        &self,
        handle: EngineHandle,
        page: usize,
        parent: Option<AnnotationHandle>,
        annotation: &NewAnnotation,
    ) -> EngineResult<AnnotationHandle>;

    fn remove_annotation(
        &self,
        handle: EngineHandle,
        page: usize,
        annotation: AnnotationHandle,
    ) -> EngineResult<()>;

    // --- Attributes ---

    fn get_attribute(
        &self,
        handle: EngineHandle,
        target: AttributeTarget,
        name: &str,
    ) -> EngineResult<RawAttribute>;

    fn set_attribute(
        &self,
        handle: EngineHandle,
        target: AttributeTarget,
        name: &str,
        value: &RawAttribute,
    ) -> EngineResult<()>;

    fn get_user_attribute(
        &self,
        handle: EngineHandle,
        target: UserAttributeTarget,
        name: &str,
    ) -> EngineResult<Vec<u8>>;

    fn set_user_attribute(
        &self,
        handle: EngineHandle,
        target: UserAttributeTarget,
        name: &str,
        value: &[u8],
    ) -> EngineResult<()>;

    // --- Attachments ---

    fn attachment_info(&self, handle: EngineHandle, index: usize) -> EngineResult<AttachmentInfo>;

    fn extract_attachment(&self, handle: EngineHandle, index: usize, dest: &Path)
        -> EngineResult<()>;

    fn insert_attachment(&self, handle: EngineHandle, index: usize, source: &Path)
        -> EngineResult<()>;

    fn delete_attachment(&self, handle: EngineHandle, index: usize) -> EngineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_render_with_name() {
        let err = EngineError::new(codes::FILE_NOT_FOUND);
        assert_eq!(err.to_string(), "FILE_NOT_FOUND (80070002)");
    }

    #[test]
    fn descriptive_fields_serialize_by_name() {
        let info = SubDocumentInfo {
            name: "minutes".to_string(),
            page_count: 3,
            attachment_count: 0,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["name"], "minutes");
        assert_eq!(json["page_count"], 3);
    }

    #[test]
    fn unknown_codes_render_as_undefined() {
        let err = EngineError::with_detail(0x1234, "odd");
        assert_eq!(err.to_string(), "UNDEFINED (00001234): odd");
    }
}
