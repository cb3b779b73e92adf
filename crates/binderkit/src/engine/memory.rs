use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{
    codes, AnnotationHandle, AnnotationInfo, AnnotationInit, AttachmentInfo, AttributeTarget,
    DocumentEngine, DocumentInfo, DocumentType, EngineError, EngineHandle, EngineResult,
    NewAnnotation, OpenMode, PageAddress, PageInfo, PageSource, SubDocumentInfo,
    UserAttributeTarget,
};
use crate::attributes::codec::page_type;
use crate::attributes::RawAttribute;

const A4_WIDTH: i64 = 21000;
const A4_HEIGHT: i64 = 29700;
const ALL_PERMISSIONS: u32 = 0x02 | 0x04 | 0x08 | 0x10;
const FORMAT_VERSION: i64 = 7;

#[derive(Clone)]
struct MemAnnotation {
    handle: AnnotationHandle,
    annotation_type: i64,
    x: i64,
    y: i64,
    width: i64,
    height: i64,
    attributes: HashMap<String, RawAttribute>,
    children: Vec<MemAnnotation>,
}

impl MemAnnotation {
    fn info(&self) -> AnnotationInfo {
        AnnotationInfo {
            handle: self.handle,
            annotation_type: self.annotation_type,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            child_count: self.children.len(),
        }
    }

    /// Deep copy with new handles, as the engine does when copying pages.
    fn fresh_copy(&self) -> Self {
        Self {
            handle: AnnotationHandle(Uuid::new_v4()),
            children: self.children.iter().map(Self::fresh_copy).collect(),
            ..self.clone()
        }
    }
}

#[derive(Clone)]
struct MemPage {
    info: PageInfo,
    text: String,
    annotations: Vec<MemAnnotation>,
    user_attributes: HashMap<String, Vec<u8>>,
}

impl MemPage {
    fn application(text: String) -> Self {
        Self {
            info: PageInfo {
                width: A4_WIDTH,
                height: A4_HEIGHT,
                page_type: page_type::APPLICATION,
                horizontal_resolution: 200,
                vertical_resolution: 200,
                compress_type: 0,
                annotation_count: 0,
                degree: 0,
                original_width: A4_WIDTH,
                original_height: A4_HEIGHT,
                original_horizontal_resolution: 200,
                original_vertical_resolution: 200,
                image_width: 1654,
                image_height: 2339,
                is_color: false,
                bits_per_pixel: 1,
            },
            text,
            annotations: Vec::new(),
            user_attributes: HashMap::new(),
        }
    }

    fn image(width: i64, height: i64, compress_type: i64) -> Self {
        let mut page = Self::application(String::new());
        page.info.page_type = page_type::IMAGE;
        page.info.compress_type = compress_type;
        page.info.is_color = true;
        page.info.bits_per_pixel = 24;
        if width > 0 && height > 0 {
            page.info.width = width;
            page.info.height = height;
            page.info.original_width = width;
            page.info.original_height = height;
        }
        page
    }

    fn fresh_copy(&self) -> Self {
        Self {
            annotations: self.annotations.iter().map(MemAnnotation::fresh_copy).collect(),
            ..self.clone()
        }
    }
}

#[derive(Clone)]
struct MemSubDocument {
    name: String,
    page_count: usize,
    attachment_count: usize,
}

#[derive(Clone)]
struct MemAttachment {
    name: String,
    data: Vec<u8>,
    timestamp: i64,
}

#[derive(Clone)]
struct MemFile {
    document_type: DocumentType,
    pages: Vec<MemPage>,
    documents: Vec<MemSubDocument>,
    attachments: Vec<MemAttachment>,
    attributes: HashMap<String, RawAttribute>,
    page_forms: HashMap<(i64, String), RawAttribute>,
    user_attributes: HashMap<String, Vec<u8>>,
    show_annotations: bool,
}

impl MemFile {
    fn new(document_type: DocumentType) -> Self {
        Self {
            document_type,
            pages: Vec::new(),
            documents: Vec::new(),
            attachments: Vec::new(),
            attributes: HashMap::new(),
            page_forms: HashMap::new(),
            user_attributes: HashMap::new(),
            show_annotations: true,
        }
    }

    fn offset_of(&self, index: usize) -> usize {
        self.documents[..index].iter().map(|d| d.page_count).sum()
    }

    /// Checks that `at` addresses a page (or, when inserting, an insertion
    /// point) inside its region.
    fn check_address(&self, at: PageAddress, inserting: bool) -> EngineResult<()> {
        let (low, count) = match at.sub_document {
            None => (0, self.pages.len()),
            Some(index) if index < self.documents.len() => {
                (self.offset_of(index), self.documents[index].page_count)
            }
            Some(index) => {
                return Err(EngineError::with_detail(
                    codes::INVALIDARG,
                    format!("no sub-document {}", index),
                ))
            }
        };
        let high = if inserting { low + count } else { low + count.saturating_sub(1) };
        if at.page < low || at.page > high || (!inserting && count == 0) {
            return Err(EngineError::with_detail(
                codes::INVALIDARG,
                format!("page {} outside [{}, {}]", at.page, low, high),
            ));
        }
        Ok(())
    }

    fn page(&self, page: usize) -> EngineResult<&MemPage> {
        self.pages.get(page).ok_or_else(|| no_such("page", page))
    }

    fn page_mut(&mut self, page: usize) -> EngineResult<&mut MemPage> {
        self.pages.get_mut(page).ok_or_else(|| no_such("page", page))
    }

    fn annotations(
        &self,
        page: usize,
        parent: Option<AnnotationHandle>,
    ) -> EngineResult<&[MemAnnotation]> {
        let page = self.page(page)?;
        match parent {
            None => Ok(page.annotations.as_slice()),
            Some(handle) => find(&page.annotations, handle)
                .map(|a| a.children.as_slice())
                .ok_or_else(|| EngineError::with_detail(codes::INVALIDARG, "no such annotation")),
        }
    }

    fn annotations_mut(
        &mut self,
        page: usize,
        parent: Option<AnnotationHandle>,
    ) -> EngineResult<&mut Vec<MemAnnotation>> {
        let page = self.page_mut(page)?;
        match parent {
            None => Ok(&mut page.annotations),
            Some(handle) => find_mut(&mut page.annotations, handle)
                .map(|a| &mut a.children)
                .ok_or_else(|| EngineError::with_detail(codes::INVALIDARG, "no such annotation")),
        }
    }

    fn annotation(&self, handle: AnnotationHandle) -> EngineResult<&MemAnnotation> {
        self.pages
            .iter()
            .find_map(|p| find(&p.annotations, handle))
            .ok_or_else(|| EngineError::with_detail(codes::INVALIDARG, "no such annotation"))
    }

    fn annotation_mut(&mut self, handle: AnnotationHandle) -> EngineResult<&mut MemAnnotation> {
        self.pages
            .iter_mut()
            .find_map(|p| find_mut(&mut p.annotations, handle))
            .ok_or_else(|| EngineError::with_detail(codes::INVALIDARG, "no such annotation"))
    }
}

fn find(list: &[MemAnnotation], handle: AnnotationHandle) -> Option<&MemAnnotation> {
    list.iter().find_map(|a| {
        if a.handle == handle {
            Some(a)
        } else {
            find(&a.children, handle)
        }
    })
}

fn find_mut(list: &mut [MemAnnotation], handle: AnnotationHandle) -> Option<&mut MemAnnotation> {
    for a in list.iter_mut() {
        if a.handle == handle {
            return Some(a);
        }
        if let Some(found) = find_mut(&mut a.children, handle) {
            return Some(found);
        }
    }
    None
}

fn remove_from(list: &mut Vec<MemAnnotation>, handle: AnnotationHandle) -> bool {
    if let Some(index) = list.iter().position(|a| a.handle == handle) {
        list.remove(index);
        return true;
    }
    list.iter_mut().any(|a| remove_from(&mut a.children, handle))
}

fn no_such(what: &str, index: usize) -> EngineError {
    EngineError::with_detail(codes::INVALIDARG, format!("no {} {}", what, index))
}

fn not_found(name: &str) -> EngineError {
    EngineError::with_detail(codes::INFO_NOT_FOUND, name.to_string())
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

struct OpenFile {
    path: PathBuf,
    read_only: bool,
}

/// In-memory document engine for testing.
///
/// Uses `RefCell` for interior mutability since every engine call takes
/// `&self`. Files are registered up front with the `add_*` helpers and then
/// opened by path like real files. Failures can be simulated per operation
/// name (`"insert_pages"`, `"delete_page"`, ...).
pub struct MemEngine {
    files: RefCell<HashMap<PathBuf, MemFile>>,
    handles: RefCell<HashMap<EngineHandle, OpenFile>>,
    next_handle: Cell<u64>,
    failures: RefCell<HashMap<&'static str, u32>>,
    partial_insert: Cell<Option<usize>>,
}

impl Default for MemEngine {
    fn default() -> Self {
        Self {
            files: RefCell::new(HashMap::new()),
            handles: RefCell::new(HashMap::new()),
            next_handle: Cell::new(1),
            failures: RefCell::new(HashMap::new()),
            partial_insert: Cell::new(None),
        }
    }
}

impl MemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a document whose pages read "page 1", "page 2", ...
    pub fn add_document(&self, path: impl Into<PathBuf>, pages: usize) {
        let mut file = MemFile::new(DocumentType::Document);
        file.pages = (1..=pages)
            .map(|n| MemPage::application(format!("page {}", n)))
            .collect();
        self.files.borrow_mut().insert(path.into(), file);
    }

    /// Registers a binder of named sub-documents with the given page counts.
    pub fn add_binder(&self, path: impl Into<PathBuf>, documents: &[(&str, usize)]) {
        let mut file = MemFile::new(DocumentType::Binder);
        for (name, pages) in documents {
            for n in 1..=*pages {
                file.pages
                    .push(MemPage::application(format!("{} page {}", name, n)));
            }
            file.documents.push(MemSubDocument {
                name: name.to_string(),
                page_count: *pages,
                attachment_count: 0,
            });
        }
        self.files.borrow_mut().insert(path.into(), file);
    }

    /// Replaces the text of one page. Returns false if there is no such page.
    pub fn set_page_text(&self, path: impl AsRef<Path>, page: usize, text: &str) -> bool {
        let mut files = self.files.borrow_mut();
        match files
            .get_mut(path.as_ref())
            .and_then(|f| f.pages.get_mut(page))
        {
            Some(p) => {
                p.text = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Makes every call of `op` fail with `code` until cleared.
    pub fn fail_on(&self, op: &'static str, code: u32) {
        self.failures.borrow_mut().insert(op, code);
    }

    pub fn clear_failures(&self) {
        self.failures.borrow_mut().clear();
        self.partial_insert.set(None);
    }

    /// Makes the next `insert_pages` insert at most `pages` pages, then fail.
    pub fn fail_partway_insert(&self, pages: usize) {
        self.partial_insert.set(Some(pages));
    }

    pub fn open_handle_count(&self) -> usize {
        self.handles.borrow().len()
    }

    pub fn page_count(&self, path: impl AsRef<Path>) -> Option<usize> {
        self.files.borrow().get(path.as_ref()).map(|f| f.pages.len())
    }

    pub fn page_text_of(&self, path: impl AsRef<Path>, page: usize) -> Option<String> {
        self.files
            .borrow()
            .get(path.as_ref())
            .and_then(|f| f.pages.get(page))
            .map(|p| p.text.clone())
    }

    fn check(&self, op: &'static str) -> EngineResult<()> {
        match self.failures.borrow().get(op) {
            Some(code) => Err(EngineError::with_detail(
                *code,
                format!("simulated {} failure", op),
            )),
            None => Ok(()),
        }
    }

    fn path_of(&self, handle: EngineHandle, writing: bool) -> EngineResult<PathBuf> {
        let handles = self.handles.borrow();
        let open = handles
            .get(&handle)
            .ok_or_else(|| EngineError::with_detail(codes::INVALIDARG, "handle is not open"))?;
        if writing && open.read_only {
            return Err(EngineError::with_detail(
                codes::ACCESSDENIED,
                "opened read-only",
            ));
        }
        Ok(open.path.clone())
    }

    fn read<T>(
        &self,
        op: &'static str,
        handle: EngineHandle,
        f: impl FnOnce(&MemFile) -> EngineResult<T>,
    ) -> EngineResult<T> {
        self.check(op)?;
        let path = self.path_of(handle, false)?;
        let files = self.files.borrow();
        let file = files
            .get(&path)
            .ok_or_else(|| EngineError::new(codes::FILE_NOT_FOUND))?;
        f(file)
    }

    fn write<T>(
        &self,
        op: &'static str,
        handle: EngineHandle,
        f: impl FnOnce(&mut MemFile) -> EngineResult<T>,
    ) -> EngineResult<T> {
        self.check(op)?;
        let path = self.path_of(handle, true)?;
        let mut files = self.files.borrow_mut();
        let file = files
            .get_mut(&path)
            .ok_or_else(|| EngineError::new(codes::FILE_NOT_FOUND))?;
        f(file)
    }

    fn document_pages(&self, path: &Path) -> EngineResult<Vec<MemPage>> {
        let files = self.files.borrow();
        let source = files.get(path).ok_or_else(|| {
            EngineError::with_detail(codes::FILE_NOT_FOUND, path.display().to_string())
        })?;
        if source.document_type != DocumentType::Document {
            return Err(EngineError::with_detail(
                codes::BAD_FORMAT,
                "source is not a document",
            ));
        }
        Ok(source.pages.iter().map(MemPage::fresh_copy).collect())
    }

    fn source_pages(&self, source: &PageSource) -> EngineResult<Vec<MemPage>> {
        match source {
            PageSource::File(path) => self.document_pages(path),
            PageSource::Image { options, .. } => Ok(vec![MemPage::image(
                options.width,
                options.height,
                options.compress,
            )]),
        }
    }
}

impl DocumentEngine for MemEngine {
    fn open(&self, path: &Path, mode: OpenMode) -> EngineResult<EngineHandle> {
        self.check("open")?;
        if !self.files.borrow().contains_key(path) {
            return Err(EngineError::with_detail(
                codes::FILE_NOT_FOUND,
                path.display().to_string(),
            ));
        }
        let handle = EngineHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.handles.borrow_mut().insert(
            handle,
            OpenFile {
                path: path.to_path_buf(),
                read_only: mode.read_only,
            },
        );
        Ok(handle)
    }

    fn close(&self, handle: EngineHandle) -> EngineResult<()> {
        self.check("close")?;
        self.handles
            .borrow_mut()
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| EngineError::with_detail(codes::INVALIDARG, "handle is not open"))
    }

    fn save(&self, handle: EngineHandle) -> EngineResult<()> {
        self.write("save", handle, |_| Ok(()))
    }

    fn document_info(&self, handle: EngineHandle) -> EngineResult<DocumentInfo> {
        self.read("document_info", handle, |file| {
            Ok(DocumentInfo {
                page_count: file.pages.len(),
                version: FORMAT_VERSION,
                attachment_count: file.attachments.len(),
                document_type: file.document_type,
                permissions: ALL_PERMISSIONS,
                show_annotations: file.show_annotations,
                sub_document_count: file.documents.len(),
                signature_count: 0,
                attribute_count: file.attributes.len(),
                binder_color: 5,
                binder_size: 0,
            })
        })
    }

    fn show_annotations(&self, handle: EngineHandle, show: bool) -> EngineResult<()> {
        self.write("show_annotations", handle, |file| {
            file.show_annotations = show;
            Ok(())
        })
    }

    fn sub_document_info(
        &self,
        handle: EngineHandle,
        index: usize,
    ) -> EngineResult<SubDocumentInfo> {
        self.read("sub_document_info", handle, |file| {
            file.documents
                .get(index)
                .map(|d| SubDocumentInfo {
                    name: d.name.clone(),
                    page_count: d.page_count,
                    attachment_count: d.attachment_count,
                })
                .ok_or_else(|| no_such("sub-document", index))
        })
    }

    fn insert_sub_document(
        &self,
        handle: EngineHandle,
        index: usize,
        source: &Path,
    ) -> EngineResult<()> {
        self.check("insert_sub_document")?;
        let pages = self.document_pages(source)?;
        self.write("insert_sub_document", handle, |file| {
            if file.document_type != DocumentType::Binder || index > file.documents.len() {
                return Err(no_such("sub-document slot", index));
            }
            let offset = file.offset_of(index);
            let count = pages.len();
            for (i, page) in pages.into_iter().enumerate() {
                file.pages.insert(offset + i, page);
            }
            file.documents.insert(
                index,
                MemSubDocument {
                    name: stem(source),
                    page_count: count,
                    attachment_count: 0,
                },
            );
            Ok(())
        })
    }

    fn delete_sub_document(&self, handle: EngineHandle, index: usize) -> EngineResult<()> {
        self.write("delete_sub_document", handle, |file| {
            if index >= file.documents.len() {
                return Err(no_such("sub-document", index));
            }
            let offset = file.offset_of(index);
            let count = file.documents[index].page_count;
            file.pages.drain(offset..offset + count);
            file.documents.remove(index);
            Ok(())
        })
    }

    fn page_info(&self, handle: EngineHandle, page: usize) -> EngineResult<PageInfo> {
        self.read("page_info", handle, |file| {
            let p = file.page(page)?;
            Ok(PageInfo {
                annotation_count: p.annotations.len(),
                ..p.info.clone()
            })
        })
    }

    fn page_text(&self, handle: EngineHandle, page: usize) -> EngineResult<String> {
        self.read("page_text", handle, |file| Ok(file.page(page)?.text.clone()))
    }

    fn insert_pages(
        &self,
        handle: EngineHandle,
        at: PageAddress,
        source: &PageSource,
    ) -> EngineResult<usize> {
        self.check("insert_pages")?;
        let pages = self.source_pages(source)?;
        let partial = self.partial_insert.take();
        self.write("insert_pages", handle, |file| {
            file.check_address(at, true)?;
            let take = partial.map_or(pages.len(), |limit| limit.min(pages.len()));
            for (i, page) in pages.into_iter().take(take).enumerate() {
                file.pages.insert(at.page + i, page);
            }
            if let Some(index) = at.sub_document {
                file.documents[index].page_count += take;
            }
            match partial {
                Some(_) => Err(EngineError::with_detail(
                    codes::WRITE_FAULT,
                    format!("simulated failure after {} pages", take),
                )),
                None => Ok(take),
            }
        })
    }

    fn delete_page(&self, handle: EngineHandle, at: PageAddress) -> EngineResult<()> {
        self.write("delete_page", handle, |file| {
            file.check_address(at, false)?;
            file.pages.remove(at.page);
            if let Some(index) = at.sub_document {
                file.documents[index].page_count -= 1;
            }
            Ok(())
        })
    }

    fn annotation_info(
        &self,
        handle: EngineHandle,
        page: usize,
        parent: Option<AnnotationHandle>,
        index: usize,
    ) -> EngineResult<AnnotationInfo> {
        self.read("annotation_info", handle, |file| {
            file.annotations(page, parent)?
                .get(index)
                .map(MemAnnotation::info)
                .ok_or_else(|| no_such("annotation", index))
        })
    }

    fn add_annotation(
        &self,
        handle: EngineHandle,
        page: usize,
        parent: Option<AnnotationHandle>,
        annotation: &NewAnnotation,
    ) -> EngineResult<AnnotationHandle> {
        self.write("add_annotation", handle, |file| {
            let mut attributes = HashMap::new();
            let (x, y, width, height) = match &annotation.init {
                AnnotationInit::Size { width, height } => {
                    (annotation.x, annotation.y, *width, *height)
                }
                AnnotationInit::Points(flat) => {
                    if flat.len() < 4 || flat.len() % 2 != 0 {
                        return Err(EngineError::with_detail(
                            codes::INVALIDARG,
                            "at least two points required",
                        ));
                    }
                    attributes.insert("%Points".to_string(), RawAttribute::Points(flat.clone()));
                    let xs = flat.iter().step_by(2);
                    let ys = flat.iter().skip(1).step_by(2);
                    let (min_x, max_x) = xs.fold((i64::MAX, i64::MIN), |(lo, hi), v| {
                        (lo.min(*v), hi.max(*v))
                    });
                    let (min_y, max_y) = ys.fold((i64::MAX, i64::MIN), |(lo, hi), v| {
                        (lo.min(*v), hi.max(*v))
                    });
                    (min_x, min_y, max_x - min_x, max_y - min_y)
                }
                AnnotationInit::Width(width) => (annotation.x, annotation.y, *width, 1000),
                AnnotationInit::Custom { guid, .. } if guid.is_empty() => {
                    return Err(EngineError::with_detail(
                        codes::INVALIDARG,
                        "custom annotations need a GUID",
                    ));
                }
                AnnotationInit::Custom { width, height, .. } => {
                    (annotation.x, annotation.y, *width, *height)
                }
                AnnotationInit::Default | AnnotationInit::File(_) => {
                    (annotation.x, annotation.y, 2000, 1000)
                }
            };
            let created = MemAnnotation {
                handle: AnnotationHandle(Uuid::new_v4()),
                annotation_type: annotation.annotation_type,
                x,
                y,
                width,
                height,
                attributes,
                children: Vec::new(),
            };
            let handle = created.handle;
            file.annotations_mut(page, parent)?.push(created);
            Ok(handle)
        })
    }

    fn remove_annotation(
        &self,
        handle: EngineHandle,
        page: usize,
        annotation: AnnotationHandle,
    ) -> EngineResult<()> {
        self.write("remove_annotation", handle, |file| {
            if remove_from(&mut file.page_mut(page)?.annotations, annotation) {
                Ok(())
            } else {
                Err(EngineError::with_detail(codes::INVALIDARG, "no such annotation"))
            }
        })
    }

    fn get_attribute(
        &self,
        handle: EngineHandle,
        target: AttributeTarget,
        name: &str,
    ) -> EngineResult<RawAttribute> {
        self.read("get_attribute", handle, |file| {
            let value = match target {
                AttributeTarget::Document => file.attributes.get(name),
                AttributeTarget::Annotation(h) => file.annotation(h)?.attributes.get(name),
                AttributeTarget::PageForm(form) => file.page_forms.get(&(form, name.to_string())),
            };
            value.cloned().ok_or_else(|| not_found(name))
        })
    }

    fn set_attribute(
        &self,
        handle: EngineHandle,
        target: AttributeTarget,
        name: &str,
        value: &RawAttribute,
    ) -> EngineResult<()> {
        self.write("set_attribute", handle, |file| {
            let slot = match target {
                AttributeTarget::Document => &mut file.attributes,
                AttributeTarget::Annotation(h) => &mut file.annotation_mut(h)?.attributes,
                AttributeTarget::PageForm(form) => {
                    file.page_forms.insert((form, name.to_string()), value.clone());
                    return Ok(());
                }
            };
            slot.insert(name.to_string(), value.clone());
            Ok(())
        })
    }

    fn get_user_attribute(
        &self,
        handle: EngineHandle,
        target: UserAttributeTarget,
        name: &str,
    ) -> EngineResult<Vec<u8>> {
        self.read("get_user_attribute", handle, |file| {
            let value = match target {
                UserAttributeTarget::Document => file.user_attributes.get(name),
                UserAttributeTarget::Page(page) => file.page(page)?.user_attributes.get(name),
            };
            value.cloned().ok_or_else(|| not_found(name))
        })
    }

    fn set_user_attribute(
        &self,
        handle: EngineHandle,
        target: UserAttributeTarget,
        name: &str,
        value: &[u8],
    ) -> EngineResult<()> {
        self.write("set_user_attribute", handle, |file| {
            let map = match target {
                UserAttributeTarget::Document => &mut file.user_attributes,
                UserAttributeTarget::Page(page) => &mut file.page_mut(page)?.user_attributes,
            };
            map.insert(name.to_string(), value.to_vec());
            Ok(())
        })
    }

    fn attachment_info(&self, handle: EngineHandle, index: usize) -> EngineResult<AttachmentInfo> {
        self.read("attachment_info", handle, |file| {
            file.attachments
                .get(index)
                .map(|a| AttachmentInfo {
                    name: a.name.clone(),
                    size: a.data.len() as u64,
                    timestamp: a.timestamp,
                    text_type: 2,
                })
                .ok_or_else(|| no_such("attachment", index))
        })
    }

    fn extract_attachment(
        &self,
        handle: EngineHandle,
        index: usize,
        dest: &Path,
    ) -> EngineResult<()> {
        self.read("extract_attachment", handle, |file| {
            let attachment = file
                .attachments
                .get(index)
                .ok_or_else(|| no_such("attachment", index))?;
            if dest.exists() {
                return Err(EngineError::with_detail(
                    codes::FILE_EXISTS,
                    dest.display().to_string(),
                ));
            }
            std::fs::write(dest, &attachment.data)
                .map_err(|err| EngineError::with_detail(codes::WRITE_FAULT, err.to_string()))
        })
    }

    fn insert_attachment(
        &self,
        handle: EngineHandle,
        index: usize,
        source: &Path,
    ) -> EngineResult<()> {
        self.check("insert_attachment")?;
        let data = std::fs::read(source)
            .map_err(|err| EngineError::with_detail(codes::FILE_NOT_FOUND, err.to_string()))?;
        let name = source
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.write("insert_attachment", handle, |file| {
            if index > file.attachments.len() {
                return Err(no_such("attachment slot", index));
            }
            file.attachments.insert(
                index,
                MemAttachment {
                    name,
                    data,
                    timestamp: chrono::Utc::now().timestamp(),
                },
            );
            Ok(())
        })
    }

    fn delete_attachment(&self, handle: EngineHandle, index: usize) -> EngineResult<()> {
        self.write("delete_attachment", handle, |file| {
            if index >= file.attachments.len() {
                return Err(no_such("attachment", index));
            }
            file.attachments.remove(index);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(engine: &MemEngine, path: &str) -> EngineHandle {
        engine.open(Path::new(path), OpenMode::default()).unwrap()
    }

    #[test]
    fn open_unknown_file_fails() {
        let engine = MemEngine::new();
        let err = engine
            .open(Path::new("missing.xdw"), OpenMode::default())
            .unwrap_err();
        assert_eq!(err.code, codes::FILE_NOT_FOUND);
    }

    #[test]
    fn insert_pages_from_another_document() {
        let engine = MemEngine::new();
        engine.add_document("a.xdw", 2);
        engine.add_document("b.xdw", 3);
        let h = open(&engine, "a.xdw");

        let at = PageAddress {
            sub_document: None,
            page: 1,
        };
        let added = engine
            .insert_pages(h, at, &PageSource::File("b.xdw".into()))
            .unwrap();
        assert_eq!(added, 3);
        assert_eq!(engine.page_count("a.xdw"), Some(5));
        assert_eq!(engine.page_text_of("a.xdw", 1).as_deref(), Some("page 1"));
        assert_eq!(engine.page_text_of("a.xdw", 4).as_deref(), Some("page 2"));
    }

    #[test]
    fn binder_regions_bound_page_addresses() {
        let engine = MemEngine::new();
        engine.add_binder("b.xbd", &[("one", 2), ("two", 3)]);
        let h = open(&engine, "b.xbd");

        let outside = PageAddress {
            sub_document: Some(0),
            page: 3,
        };
        assert!(engine.delete_page(h, outside).is_err());

        let inside = PageAddress {
            sub_document: Some(1),
            page: 2,
        };
        engine.delete_page(h, inside).unwrap();
        assert_eq!(engine.sub_document_info(h, 1).unwrap().page_count, 2);
        assert_eq!(engine.document_info(h).unwrap().page_count, 4);
    }

    #[test]
    fn read_only_handles_reject_writes() {
        let engine = MemEngine::new();
        engine.add_document("r.xdw", 1);
        let h = engine
            .open(
                Path::new("r.xdw"),
                OpenMode {
                    read_only: true,
                    authenticate: true,
                },
            )
            .unwrap();
        let err = engine.show_annotations(h, false).unwrap_err();
        assert_eq!(err.code, codes::ACCESSDENIED);
        assert!(engine.document_info(h).is_ok());
    }

    #[test]
    fn simulated_failures_persist_until_cleared() {
        let engine = MemEngine::new();
        engine.add_document("f.xdw", 1);
        let h = open(&engine, "f.xdw");
        engine.fail_on("page_info", codes::UNEXPECTED);
        assert!(engine.page_info(h, 0).is_err());
        assert!(engine.page_info(h, 0).is_err());
        engine.clear_failures();
        assert!(engine.page_info(h, 0).is_ok());
    }

    #[test]
    fn nested_annotations_are_found_and_removed() {
        let engine = MemEngine::new();
        engine.add_document("n.xdw", 1);
        let h = open(&engine, "n.xdw");
        let new = NewAnnotation {
            annotation_type: 32839,
            x: 0,
            y: 0,
            init: AnnotationInit::Default,
        };
        let group = engine.add_annotation(h, 0, None, &new).unwrap();
        let child = engine.add_annotation(h, 0, Some(group), &new).unwrap();
        assert_eq!(engine.annotation_info(h, 0, None, 0).unwrap().child_count, 1);
        assert_eq!(
            engine.annotation_info(h, 0, Some(group), 0).unwrap().handle,
            child
        );

        engine.remove_annotation(h, 0, child).unwrap();
        assert_eq!(engine.annotation_info(h, 0, None, 0).unwrap().child_count, 0);
    }

    #[test]
    fn missing_attributes_report_info_not_found() {
        let engine = MemEngine::new();
        engine.add_document("m.xdw", 1);
        let h = open(&engine, "m.xdw");
        let err = engine
            .get_attribute(h, AttributeTarget::Document, "%Title")
            .unwrap_err();
        assert_eq!(err.code, codes::INFO_NOT_FOUND);
    }
}
