use log::warn;
use std::cell::Cell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use crate::attachment::AttachmentList;
use crate::attributes::access::LocalAttributes;
use crate::attributes::{AttrValue, Code, OwnerKind};
use crate::collection::Positioned;
use crate::config::BinderkitConfig;
use crate::engine::{DocumentEngine, DocumentInfo, DocumentType, ImageOptions, PageSource};
use crate::error::Result;
use crate::file::{FileCore, PageForm, Permissions};
use crate::page::Page;
use crate::pages::{PageHost, PageSet};
use crate::text::{join_nonempty, TextPattern, ANNOTATION_SEPARATOR};

/// An open document file.
///
/// Owns the engine handle: dropping the last reference closes it, and
/// [`close`](Self::close) may be called earlier. Proxies handed out by the
/// document fail with `StaleReference` once it is closed.
pub struct Document {
    file: Rc<FileCore>,
    info: DocumentInfo,
    show_annotations: Cell<bool>,
    pages: Rc<PageSet>,
    attachments: AttachmentList,
    local: LocalAttributes,
}

impl Document {
    pub fn open(
        engine: Rc<dyn DocumentEngine>,
        path: impl AsRef<Path>,
        config: &BinderkitConfig,
    ) -> Result<Self> {
        let (file, info) = FileCore::open(engine, path.as_ref(), config, DocumentType::Document)?;
        Ok(Self {
            pages: PageSet::new(file.clone(), PageHost::Document, info.page_count),
            attachments: AttachmentList::new(file.clone(), info.attachment_count),
            show_annotations: Cell::new(info.show_annotations),
            local: LocalAttributes::default(),
            file,
            info,
        })
    }

    pub fn name(&self) -> String {
        self.file.name()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Format version as users know it.
    pub fn version(&self) -> i64 {
        self.info.version - 3
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_bits(self.info.permissions)
    }

    pub fn signature_count(&self) -> usize {
        self.info.signature_count
    }

    /// Number of named attributes the engine currently stores.
    pub fn attribute_count(&self) -> Result<usize> {
        Ok(self.file.info()?.attribute_count)
    }

    pub fn show_annotations(&self) -> bool {
        self.show_annotations.get()
    }

    pub fn set_show_annotations(&self, show: bool) -> Result<()> {
        self.file.set_show_annotations(show)?;
        self.show_annotations.set(show);
        Ok(())
    }

    // --- Pages ---

    pub fn pages(&self) -> &PageSet {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, pos: isize) -> Result<Rc<Page>> {
        self.pages.get(pos)
    }

    pub fn insert(&self, pos: isize, source: PageSource) -> Result<Vec<Rc<Page>>> {
        self.pages.insert(pos, source)
    }

    pub fn insert_document(&self, pos: isize, path: impl AsRef<Path>) -> Result<Vec<Rc<Page>>> {
        self.pages.insert_document(pos, path)
    }

    pub fn insert_image(
        &self,
        pos: isize,
        path: impl AsRef<Path>,
        options: ImageOptions,
    ) -> Result<Rc<Page>> {
        self.pages.insert_image(pos, path, options)
    }

    pub fn append(&self, source: PageSource) -> Result<Vec<Rc<Page>>> {
        self.pages.append(source)
    }

    pub fn delete(&self, pos: isize) -> Result<Rc<Page>> {
        self.pages.delete(pos)
    }

    /// Index of local page `pos` in the file; the identity for documents.
    pub fn absolute_page(&self, pos: isize) -> Result<usize> {
        let position = self.pages.normalize(pos, false)?;
        self.pages.absolute_page(position)
    }

    // --- Attributes ---

    pub fn get_attribute(&self, name: &str) -> Result<Option<AttrValue>> {
        self.file.attribute(OwnerKind::Document, &self.local, name)
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        self.file
            .set_attribute(OwnerKind::Document, &self.local, name, value.into())
    }

    /// Free-form document property, bypassing the attribute registry.
    pub fn property(&self, name: &str) -> Result<Option<AttrValue>> {
        self.file.property(name)
    }

    pub fn set_property(&self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        self.file.set_property(name, &value.into())
    }

    pub fn user_attribute(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.file.user_attribute(name)
    }

    pub fn set_user_attribute(&self, name: &str, value: &[u8]) -> Result<()> {
        self.file.set_user_attribute(name, value)
    }

    /// Header, footer, page-number or image form of this document.
    pub fn page_form<'a>(&self, form: impl Into<Code<'a>>) -> PageForm {
        PageForm::new(self.file.clone(), form)
    }

    // --- Text ---

    /// Header and footer text, separated like annotation text.
    pub fn pageform_text(&self) -> Result<String> {
        let forms = [self.page_form("header"), self.page_form("footer")];
        let mut parts = Vec::with_capacity(forms.len());
        for form in &forms {
            parts.push(form.text()?);
        }
        Ok(join_nonempty(ANNOTATION_SEPARATOR, parts))
    }

    pub fn content_text(&self) -> Result<String> {
        self.pages.content_text(None)
    }

    pub fn annotation_text(&self) -> Result<String> {
        self.pages.annotation_text()
    }

    pub fn fulltext(&self) -> Result<String> {
        self.pages.fulltext()
    }

    pub fn find_text(&self, pattern: impl Into<TextPattern>) -> Result<Vec<Rc<Page>>> {
        self.pages.find_text(pattern)
    }

    // --- Attachments ---

    pub fn attachments(&self) -> &AttachmentList {
        &self.attachments
    }

    // --- Lifecycle ---

    pub fn save(&self) -> Result<()> {
        self.file.save()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }

    /// Closes the engine handle. Calling it again does nothing.
    pub fn close(&self) -> Result<()> {
        self.file.close()
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        if let Err(err) = self.file.close() {
            warn!(
                "event=document_close module=document status=error path={} error={}",
                self.file.path().display(),
                err
            );
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document({}: {} pages)", self.name(), self.pages.len())
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
