//! # Binders
//!
//! A binder is a file holding named sub-documents. The engine sees one flat
//! page list; each sub-document covers a contiguous region of it, starting
//! at its page offset, the sum of the page counts of the sub-documents
//! before it.
//!
//! [`BinderDocuments`] keeps a table of sub-document page counts. The table
//! is refreshed before any `Document` event goes out, so a
//! [`DocumentInBinder`] whose index moves can recompute its offset while it
//! handles the event. When a sub-document gains or loses pages, the
//! sub-documents after it recompute their offsets directly.

use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};

use crate::attachment::AttachmentList;
use crate::attributes::access::LocalAttributes;
use crate::attributes::codec::{BINDER_COLOR, BINDER_SIZE};
use crate::attributes::{AttrValue, OwnerKind};
use crate::bus::{Channel, Event, Observer, Slot};
use crate::collection::{normalize, Children, Positioned};
use crate::config::BinderkitConfig;
use crate::engine::{DocumentEngine, DocumentInfo, DocumentType, PageSource, SubDocumentInfo};
use crate::error::{BinderError, Result};
use crate::file::{FileCore, Permissions};
use crate::page::Page;
use crate::pages::{PageHost, PageSet};
use crate::text::{join_nonempty, TextPattern, PAGE_SEPARATOR};

/// The sub-documents of a binder.
pub struct BinderDocuments {
    file: Rc<FileCore>,
    page_counts: RefCell<Vec<usize>>,
    children: Children<DocumentInBinder>,
    me: Weak<BinderDocuments>,
}

fn read_page_counts(file: &FileCore) -> Result<Vec<usize>> {
    let count = file.info()?.sub_document_count;
    (0..count)
        .map(|index| Ok(sub_document_info(file, index)?.page_count))
        .collect()
}

fn sub_document_info(file: &FileCore, index: usize) -> Result<SubDocumentInfo> {
    file.call("sub_document_info", Some(index), |engine, handle| {
        engine.sub_document_info(handle, index)
    })
}

impl BinderDocuments {
    pub(crate) fn new(file: Rc<FileCore>) -> Result<Rc<Self>> {
        let page_counts = read_page_counts(&file)?;
        let count = page_counts.len();
        Ok(Rc::new_cyclic(|me| Self {
            file,
            page_counts: RefCell::new(page_counts),
            children: Children::new("Document", Channel::Document, count),
            me: me.clone(),
        }))
    }

    fn refresh_page_counts(&self) -> Result<usize> {
        let counts = read_page_counts(&self.file)?;
        let count = counts.len();
        *self.page_counts.borrow_mut() = counts;
        Ok(count)
    }

    /// Absolute index of the first page of sub-document `index`.
    pub fn offset_of(&self, index: usize) -> usize {
        let counts = self.page_counts.borrow();
        counts[..index.min(counts.len())].iter().sum()
    }

    /// Page count of every sub-document, in order.
    pub fn document_pages(&self) -> Vec<usize> {
        self.page_counts.borrow().clone()
    }

    /// Pages across all sub-documents.
    pub fn page_count(&self) -> usize {
        self.page_counts.borrow().iter().sum()
    }

    /// Translates a page of one sub-document into the binder's flat page
    /// list. Both positions accept negative indices.
    pub fn absolute_page(&self, sub_document: isize, local: isize) -> Result<usize> {
        let index = self.children.normalize(sub_document, false)?;
        let pages = self.page_counts.borrow().get(index).copied().unwrap_or(0);
        let local = normalize("Page", local, pages, false)?;
        Ok(self.offset_of(index) + local)
    }

    /// Sub-document and local position of absolute page `absolute`. With
    /// `appending`, one past the last page maps to the end of the last
    /// sub-document.
    fn locate(&self, absolute: usize, appending: bool) -> Option<(usize, usize)> {
        let counts = self.page_counts.borrow();
        let mut offset = 0;
        for (index, count) in counts.iter().enumerate() {
            if absolute < offset + count {
                return Some((index, absolute - offset));
            }
            offset += count;
        }
        match counts.len().checked_sub(1) {
            Some(last) if appending && absolute == offset => Some((last, counts[last])),
            _ => None,
        }
    }

    fn load(&self, position: usize) -> Result<Rc<DocumentInBinder>> {
        let info = sub_document_info(&self.file, position)?;
        Ok(DocumentInBinder::new(
            self.me.clone(),
            self.file.clone(),
            position,
            info,
            self.offset_of(position),
        ))
    }

    /// Inserts the document file at `source` as a new sub-document before
    /// position `pos`. The sub-document is named after the file.
    pub fn insert(&self, pos: isize, source: impl AsRef<Path>) -> Result<Rc<DocumentInBinder>> {
        let source = source.as_ref();
        let position = self.children.normalize(pos, true)?;
        let mut inserted = self.children.insert_with(
            position,
            || {
                self.file
                    .call("insert_sub_document", Some(position), |engine, handle| {
                        engine.insert_sub_document(handle, position, source)
                    })?;
                self.refresh_page_counts()?;
                Ok(1)
            },
            || self.refresh_page_counts(),
            |p| self.load(p),
        )?;
        debug!(
            "event=sub_document_insert module=binder status=ok position={} source={}",
            position,
            source.display()
        );
        inserted.pop().ok_or_else(|| {
            BinderError::Protocol("sub-document insert produced no proxy".to_string())
        })
    }

    pub fn append(&self, source: impl AsRef<Path>) -> Result<Rc<DocumentInBinder>> {
        self.insert(self.children.len() as isize, source)
    }

    /// Records a new page count for sub-document `index` and moves the
    /// offsets of the cached sub-documents after it.
    pub(crate) fn sub_document_resized(&self, index: usize, count: usize) -> Result<()> {
        {
            let mut counts = self.page_counts.borrow_mut();
            let high = counts.len() as i64;
            let slot = counts.get_mut(index).ok_or_else(|| BinderError::OutOfRange {
                what: "Document",
                low: 0,
                high,
                given: index as i64,
            })?;
            *slot = count;
        }
        for document in self.children.cached() {
            if document.position() > index {
                document.recompute_offset();
            }
        }
        Ok(())
    }
}

impl Positioned for BinderDocuments {
    type Item = DocumentInBinder;

    fn what(&self) -> &'static str {
        self.children.what()
    }

    fn len(&self) -> usize {
        self.children.len()
    }

    fn item(&self, position: usize) -> Result<Rc<DocumentInBinder>> {
        self.children.fetch(position, || self.load(position))
    }

    fn remove(&self, position: usize) -> Result<Rc<DocumentInBinder>> {
        let proxy = self.item(position)?;
        let removed = self.children.remove_with(
            position,
            proxy,
            || {
                self.file
                    .call("delete_sub_document", Some(position), |engine, handle| {
                        engine.delete_sub_document(handle, position)
                    })?;
                self.refresh_page_counts().map(|_| ())
            },
            || self.refresh_page_counts(),
        )?;
        debug!(
            "event=sub_document_delete module=binder status=ok position={}",
            position
        );
        Ok(removed)
    }
}

/// One sub-document of a binder, with its own local page positions.
pub struct DocumentInBinder {
    slot: Slot,
    documents: Weak<BinderDocuments>,
    name: String,
    attachment_count: usize,
    page_offset: Cell<usize>,
    pages: Rc<PageSet>,
}

impl DocumentInBinder {
    fn new(
        documents: Weak<BinderDocuments>,
        file: Rc<FileCore>,
        position: usize,
        info: SubDocumentInfo,
        page_offset: usize,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            slot: Slot::new(Channel::Document, position),
            documents,
            pages: PageSet::new(file, PageHost::SubDocument(me.clone()), info.page_count),
            name: info.name,
            attachment_count: info.attachment_count,
            page_offset: Cell::new(page_offset),
        })
    }

    fn recompute_offset(&self) {
        if let Some(documents) = self.documents.upgrade() {
            self.page_offset
                .set(documents.offset_of(self.slot.position()));
        }
    }

    pub(crate) fn pages_resized(&self, count: usize) -> Result<()> {
        let documents = self.documents.upgrade().ok_or_else(|| {
            BinderError::StaleReference("binder is no longer open".to_string())
        })?;
        documents.sub_document_resized(self.slot.position(), count)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute index of this sub-document's first page.
    pub fn page_offset(&self) -> usize {
        self.page_offset.get()
    }

    pub fn attachment_count(&self) -> usize {
        self.attachment_count
    }

    pub fn is_live(&self) -> bool {
        self.slot.is_live()
    }

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

    pub fn append(&self, source: PageSource) -> Result<Vec<Rc<Page>>> {
        self.pages.append(source)
    }

    pub fn delete(&self, pos: isize) -> Result<Rc<Page>> {
        self.pages.delete(pos)
    }

    /// Index in the binder's flat page list of local page `pos`.
    pub fn absolute_page(&self, pos: isize) -> Result<usize> {
        self.slot.ensure_live()?;
        let local = self.pages.normalize(pos, false)?;
        Ok(self.page_offset() + local)
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
}

impl Observer for DocumentInBinder {
    fn slot(&self) -> &Slot {
        &self.slot
    }

    fn on_event(&self, event: &Event) -> Result<()> {
        if self.slot.apply(event)? {
            self.recompute_offset();
        }
        Ok(())
    }
}

impl fmt::Display for DocumentInBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DocumentInBinder({} {}: {} pages from {})",
            self.slot.position(),
            self.name,
            self.pages.len(),
            self.page_offset()
        )
    }
}

impl fmt::Debug for DocumentInBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An open binder file.
pub struct Binder {
    file: Rc<FileCore>,
    info: DocumentInfo,
    documents: Rc<BinderDocuments>,
    attachments: AttachmentList,
    local: LocalAttributes,
}

impl Binder {
    pub fn open(
        engine: Rc<dyn DocumentEngine>,
        path: impl AsRef<Path>,
        config: &BinderkitConfig,
    ) -> Result<Self> {
        let (file, info) = FileCore::open(engine, path.as_ref(), config, DocumentType::Binder)?;
        Ok(Self {
            documents: BinderDocuments::new(file.clone())?,
            attachments: AttachmentList::new(file.clone(), info.attachment_count),
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

    pub fn version(&self) -> i64 {
        self.info.version - 3
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_bits(self.info.permissions)
    }

    pub fn binder_color(&self) -> String {
        BINDER_COLOR.describe(self.info.binder_color)
    }

    pub fn binder_size(&self) -> String {
        BINDER_SIZE.describe(self.info.binder_size)
    }

    // --- Sub-documents ---

    pub fn documents(&self) -> &BinderDocuments {
        &self.documents
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn document(&self, pos: isize) -> Result<Rc<DocumentInBinder>> {
        self.documents.get(pos)
    }

    pub fn insert_document(
        &self,
        pos: isize,
        source: impl AsRef<Path>,
    ) -> Result<Rc<DocumentInBinder>> {
        self.documents.insert(pos, source)
    }

    pub fn append_document(&self, source: impl AsRef<Path>) -> Result<Rc<DocumentInBinder>> {
        self.documents.append(source)
    }

    pub fn delete_document(&self, pos: isize) -> Result<Rc<DocumentInBinder>> {
        self.documents.delete(pos)
    }

    pub fn document_pages(&self) -> Vec<usize> {
        self.documents.document_pages()
    }

    pub fn absolute_page(&self, sub_document: isize, local: isize) -> Result<usize> {
        self.documents.absolute_page(sub_document, local)
    }

    // --- Flat page access ---

    pub fn page_count(&self) -> usize {
        self.documents.page_count()
    }

    fn locate(&self, pos: isize, appending: bool) -> Result<(Rc<DocumentInBinder>, usize)> {
        let absolute = normalize("Page", pos, self.page_count(), appending)?;
        let (index, local) = self
            .documents
            .locate(absolute, appending)
            .ok_or_else(|| BinderError::OutOfRange {
                what: "Page",
                low: 0,
                high: self.page_count() as i64,
                given: pos as i64,
            })?;
        Ok((self.documents.item(index)?, local))
    }

    /// Page `pos` of the flat page list, served by its sub-document.
    pub fn page(&self, pos: isize) -> Result<Rc<Page>> {
        let (document, local) = self.locate(pos, false)?;
        document.pages().item(local)
    }

    /// Inserts pages before flat position `pos`; they join the sub-document
    /// that holds that page (the last one when appending).
    pub fn insert_pages(&self, pos: isize, source: PageSource) -> Result<Vec<Rc<Page>>> {
        let (document, local) = self.locate(pos, true)?;
        document.insert(local as isize, source)
    }

    pub fn delete_page(&self, pos: isize) -> Result<Rc<Page>> {
        let (document, local) = self.locate(pos, false)?;
        document.pages().remove(local)
    }

    // --- Attributes ---

    pub fn get_attribute(&self, name: &str) -> Result<Option<AttrValue>> {
        self.file.attribute(OwnerKind::Binder, &self.local, name)
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        self.file
            .set_attribute(OwnerKind::Binder, &self.local, name, value.into())
    }

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

    // --- Text ---

    fn documents_text(
        &self,
        text: impl Fn(&DocumentInBinder) -> Result<String>,
    ) -> Result<String> {
        let mut parts = Vec::with_capacity(self.documents.len());
        for document in self.documents.iter() {
            let document = document?;
            parts.push(Some(text(&document)?));
        }
        Ok(join_nonempty(PAGE_SEPARATOR, parts))
    }

    pub fn content_text(&self) -> Result<String> {
        self.documents_text(DocumentInBinder::content_text)
    }

    pub fn annotation_text(&self) -> Result<String> {
        self.documents_text(DocumentInBinder::annotation_text)
    }

    pub fn fulltext(&self) -> Result<String> {
        self.documents_text(DocumentInBinder::fulltext)
    }

    /// Pages across every sub-document whose text matches `pattern`.
    pub fn find_text(&self, pattern: impl Into<TextPattern>) -> Result<Vec<Rc<Page>>> {
        let pattern = pattern.into();
        let mut found = Vec::new();
        for document in self.documents.iter() {
            let document = document?;
            found.extend(document.find_text(pattern.clone())?);
        }
        Ok(found)
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

impl Drop for Binder {
    fn drop(&mut self) {
        if let Err(err) = self.file.close() {
            warn!(
                "event=binder_close module=binder status=error path={} error={}",
                self.file.path().display(),
                err
            );
        }
    }
}

impl fmt::Display for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Binder({}: {} documents, {} pages)",
            self.name(),
            self.documents.len(),
            self.page_count()
        )
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
