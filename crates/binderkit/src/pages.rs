//! The page list of a document or of one sub-document of a binder.
//!
//! Pages are addressed locally (0 is the first page of this list). For a
//! sub-document every engine call adds the sub-document's page offset,
//! which is looked up at call time so it follows sibling insertions and
//! deletions.

use log::debug;
use std::path::Path;
use std::rc::{Rc, Weak};

use crate::binder::DocumentInBinder;
use crate::bus::{Channel, Observer};
use crate::collection::{Children, Positioned};
use crate::engine::{ImageOptions, PageAddress, PageSource};
use crate::error::{BinderError, Result};
use crate::file::FileCore;
use crate::page::Page;
use crate::text::{join_nonempty, TextPattern, PAGE_SEPARATOR};

pub(crate) enum PageHost {
    Document,
    SubDocument(Weak<DocumentInBinder>),
}

pub struct PageSet {
    file: Rc<FileCore>,
    host: PageHost,
    children: Children<Page>,
    me: Weak<PageSet>,
}

impl PageSet {
    pub(crate) fn new(file: Rc<FileCore>, host: PageHost, count: usize) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            file,
            host,
            children: Children::new("Page", Channel::Page, count),
            me: me.clone(),
        })
    }

    fn sub_document(&self) -> Result<Option<Rc<DocumentInBinder>>> {
        match &self.host {
            PageHost::Document => Ok(None),
            PageHost::SubDocument(weak) => {
                let document = weak.upgrade().ok_or_else(|| {
                    BinderError::StaleReference("sub-document is no longer open".to_string())
                })?;
                document.slot().ensure_live()?;
                Ok(Some(document))
            }
        }
    }

    /// Sub-document index (if any) and the absolute index of local page 0.
    fn region(&self) -> Result<(Option<usize>, usize)> {
        Ok(match self.sub_document()? {
            None => (None, 0),
            Some(document) => (Some(document.position()), document.page_offset()),
        })
    }

    pub(crate) fn absolute_page(&self, local: usize) -> Result<usize> {
        Ok(self.region()?.1 + local)
    }

    fn address(&self, local: usize) -> Result<PageAddress> {
        let (sub_document, offset) = self.region()?;
        Ok(PageAddress {
            sub_document,
            page: offset + local,
        })
    }

    fn engine_count(&self) -> Result<usize> {
        match self.sub_document()? {
            None => Ok(self.file.info()?.page_count),
            Some(document) => {
                let index = document.position();
                Ok(self
                    .file
                    .call("sub_document_info", Some(index), |engine, handle| {
                        engine.sub_document_info(handle, index)
                    })?
                    .page_count)
            }
        }
    }

    fn load(&self, local: usize) -> Result<Rc<Page>> {
        let page = self.absolute_page(local)?;
        let info = self.file.call("page_info", Some(page), |engine, handle| {
            engine.page_info(handle, page)
        })?;
        Ok(Page::new(self.me.clone(), self.file.clone(), local, info))
    }

    /// Tells the binder when this sub-document's page count moved, so the
    /// following sub-documents shift their offsets.
    fn report_resize(&self, before: usize) -> Result<()> {
        if self.children.len() == before {
            return Ok(());
        }
        match self.sub_document()? {
            Some(document) => document.pages_resized(self.children.len()),
            None => Ok(()),
        }
    }

    /// Inserts the pages of `source` before local position `pos`.
    pub fn insert(&self, pos: isize, source: PageSource) -> Result<Vec<Rc<Page>>> {
        let position = self.children.normalize(pos, true)?;
        let at = self.address(position)?;
        let before = self.children.len();
        let inserted = self.children.insert_with(
            position,
            || {
                self.file
                    .call("insert_pages", Some(position), |engine, handle| {
                        engine.insert_pages(handle, at, &source)
                    })
            },
            || self.engine_count(),
            |p| self.load(p),
        );
        let resized = self.report_resize(before);
        let inserted = inserted?;
        resized?;
        debug!(
            "event=page_insert module=pages status=ok position={} count={}",
            position,
            inserted.len()
        );
        Ok(inserted)
    }

    /// Inserts every page of another document file.
    pub fn insert_document(&self, pos: isize, path: impl AsRef<Path>) -> Result<Vec<Rc<Page>>> {
        self.insert(pos, PageSource::File(path.as_ref().to_path_buf()))
    }

    /// Inserts one page built from an image file.
    pub fn insert_image(
        &self,
        pos: isize,
        path: impl AsRef<Path>,
        options: ImageOptions,
    ) -> Result<Rc<Page>> {
        let source = PageSource::Image {
            path: path.as_ref().to_path_buf(),
            options,
        };
        self.insert(pos, source)?
            .pop()
            .ok_or_else(|| BinderError::Protocol("image insert produced no page".to_string()))
    }

    pub fn append(&self, source: PageSource) -> Result<Vec<Rc<Page>>> {
        self.insert(self.children.len() as isize, source)
    }

    fn pages_text(&self, text: impl Fn(&Page) -> Result<Option<String>>) -> Result<String> {
        let mut parts = Vec::with_capacity(self.len());
        for page in self.iter() {
            let page = page?;
            parts.push(text(&page)?);
        }
        Ok(join_nonempty(PAGE_SEPARATOR, parts))
    }

    /// Body text of every page (optionally only pages of type `kind`),
    /// separated by form feeds.
    pub fn content_text(&self, kind: Option<i64>) -> Result<String> {
        self.pages_text(|page| page.content_text_filtered(kind))
    }

    pub fn annotation_text(&self) -> Result<String> {
        self.pages_text(|page| page.annotation_text().map(Some))
    }

    pub fn fulltext(&self) -> Result<String> {
        self.pages_text(|page| page.fulltext().map(Some))
    }

    fn find_by(
        &self,
        pattern: &TextPattern,
        text: impl Fn(&Page) -> Result<Option<String>>,
    ) -> Result<Vec<Rc<Page>>> {
        let mut found = Vec::new();
        for page in self.iter() {
            let page = page?;
            if text(&page)?.is_some_and(|t| pattern.is_match(&t)) {
                found.push(page);
            }
        }
        Ok(found)
    }

    /// Pages whose body or annotation text matches `pattern`, a substring
    /// or a [`regex::Regex`].
    pub fn find_text(&self, pattern: impl Into<TextPattern>) -> Result<Vec<Rc<Page>>> {
        self.find_by(&pattern.into(), |page| page.fulltext().map(Some))
    }

    pub fn find_content_text(
        &self,
        pattern: impl Into<TextPattern>,
        kind: Option<i64>,
    ) -> Result<Vec<Rc<Page>>> {
        self.find_by(&pattern.into(), |page| page.content_text_filtered(kind))
    }

    pub fn find_annotation_text(&self, pattern: impl Into<TextPattern>) -> Result<Vec<Rc<Page>>> {
        self.find_by(&pattern.into(), |page| page.annotation_text().map(Some))
    }
}

impl Positioned for PageSet {
    type Item = Page;

    fn what(&self) -> &'static str {
        self.children.what()
    }

    fn len(&self) -> usize {
        self.children.len()
    }

    fn item(&self, position: usize) -> Result<Rc<Page>> {
        self.children.fetch(position, || self.load(position))
    }

    fn remove(&self, position: usize) -> Result<Rc<Page>> {
        let proxy = self.item(position)?;
        let at = self.address(position)?;
        let before = self.children.len();
        let removed = self.children.remove_with(
            position,
            proxy,
            || {
                self.file
                    .call("delete_page", Some(position), |engine, handle| {
                        engine.delete_page(handle, at)
                    })
            },
            || self.engine_count(),
        );
        let resized = self.report_resize(before);
        let removed = removed?;
        resized?;
        debug!(
            "event=page_delete module=pages status=ok position={} absolute={}",
            position, at.page
        );
        Ok(removed)
    }
}
