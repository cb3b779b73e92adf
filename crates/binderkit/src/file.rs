//! The open engine handle shared by a container and all of its proxies.

use chrono::FixedOffset;
use log::{debug, info, warn};
use serde::Serialize;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::attributes::access::{self, LocalAttributes};
use crate::attributes::codec::PAGE_FORM;
use crate::attributes::{AttrValue, Code, OwnerKind};
use crate::config::BinderkitConfig;
use crate::engine::{
    AttributeTarget, DocumentEngine, DocumentInfo, DocumentType, EngineHandle, EngineResult,
    UserAttributeTarget,
};
use crate::error::{BinderError, Result};
use crate::registry;

/// Permission bits reported for an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions(u32);

impl Permissions {
    const EDIT_DOCUMENT: u32 = 0x02;
    const EDIT_ANNOTATION: u32 = 0x04;
    const PRINT: u32 = 0x08;
    const COPY: u32 = 0x10;

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn editable(self) -> bool {
        self.0 & Self::EDIT_DOCUMENT != 0
    }

    pub fn annotatable(self) -> bool {
        self.0 & Self::EDIT_ANNOTATION != 0
    }

    pub fn printable(self) -> bool {
        self.0 & Self::PRINT != 0
    }

    pub fn copyable(self) -> bool {
        self.0 & Self::COPY != 0
    }
}

pub(crate) struct FileCore {
    engine: Rc<dyn DocumentEngine>,
    handle: EngineHandle,
    path: PathBuf,
    zone: FixedOffset,
    open: Cell<bool>,
}

impl FileCore {
    /// Opens `path` and checks the engine reports the expected container type.
    pub(crate) fn open(
        engine: Rc<dyn DocumentEngine>,
        path: &Path,
        config: &BinderkitConfig,
        expected: DocumentType,
    ) -> Result<(Rc<Self>, DocumentInfo)> {
        let zone = config.time_zone()?;
        let handle = engine
            .open(path, config.open_mode())
            .map_err(|source| BinderError::engine("open", None, source))?;
        registry::register(&engine, handle);
        let core = Rc::new(Self {
            engine,
            handle,
            path: path.to_path_buf(),
            zone,
            open: Cell::new(true),
        });
        let info = core.info()?;
        if info.document_type != expected {
            core.close()?;
            return Err(BinderError::UnsupportedFormat(path.to_path_buf()));
        }
        info!(
            "event=container_open module=file status=ok path={} handle={} pages={}",
            path.display(),
            handle.0,
            info.page_count
        );
        Ok((core, info))
    }

    /// Issues one engine call, wrapping failures with the operation name and
    /// position.
    pub(crate) fn call<T>(
        &self,
        op: &'static str,
        position: Option<usize>,
        f: impl FnOnce(&dyn DocumentEngine, EngineHandle) -> EngineResult<T>,
    ) -> Result<T> {
        if !self.open.get() {
            return Err(BinderError::StaleReference(format!(
                "{} is closed",
                self.path.display()
            )));
        }
        f(self.engine.as_ref(), self.handle).map_err(|source| {
            debug!(
                "event=engine_call module=file status=error op={} code={:08X}",
                op, source.code
            );
            BinderError::engine(op, position, source)
        })
    }

    pub(crate) fn info(&self) -> Result<DocumentInfo> {
        self.call("document_info", None, |engine, handle| {
            engine.document_info(handle)
        })
    }

    pub(crate) fn zone(&self) -> FixedOffset {
        self.zone
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.get()
    }

    pub(crate) fn save(&self) -> Result<()> {
        self.call("save", None, |engine, handle| engine.save(handle))
    }

    pub(crate) fn set_show_annotations(&self, show: bool) -> Result<()> {
        self.call("show_annotations", None, |engine, handle| {
            engine.show_annotations(handle, show)
        })
    }

    /// Closes the handle once; later calls are no-ops. A handle the exit-time
    /// sweep already closed is not closed again.
    pub(crate) fn close(&self) -> Result<()> {
        if !self.open.replace(false) {
            return Ok(());
        }
        if registry::release(&self.engine, self.handle) {
            self.engine
                .close(self.handle)
                .map_err(|source| BinderError::engine("close", None, source))?;
        }
        info!(
            "event=container_close module=file status=ok path={}",
            self.path.display()
        );
        Ok(())
    }

    // --- Document-level attributes ---

    pub(crate) fn attribute(
        &self,
        owner: OwnerKind,
        local: &LocalAttributes,
        name: &str,
    ) -> Result<Option<AttrValue>> {
        access::read(self, owner, Some(AttributeTarget::Document), local, name)
    }

    pub(crate) fn set_attribute(
        &self,
        owner: OwnerKind,
        local: &LocalAttributes,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        access::write(self, owner, Some(AttributeTarget::Document), local, name, value)
    }

    pub(crate) fn property(&self, name: &str) -> Result<Option<AttrValue>> {
        access::read_unchecked(self, AttributeTarget::Document, name)
    }

    pub(crate) fn set_property(&self, name: &str, value: &AttrValue) -> Result<()> {
        access::write_unchecked(self, AttributeTarget::Document, name, value)
    }

    pub(crate) fn user_attribute(&self, name: &str) -> Result<Option<Vec<u8>>> {
        access::read_user(self, UserAttributeTarget::Document, name)
    }

    pub(crate) fn set_user_attribute(&self, name: &str, value: &[u8]) -> Result<()> {
        access::write_user(self, UserAttributeTarget::Document, name, value)
    }
}

impl Drop for FileCore {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(
                "event=container_close module=file status=error path={} error={}",
                self.path.display(),
                err
            );
        }
    }
}

/// One page form (header, footer, page number, ...) of a document.
///
/// Page-form attributes pass straight through to the engine.
pub struct PageForm {
    file: Rc<FileCore>,
    form: i64,
}

impl PageForm {
    pub(crate) fn new<'a>(file: Rc<FileCore>, form: impl Into<Code<'a>>) -> Self {
        Self {
            file,
            form: PAGE_FORM.normalize(form),
        }
    }

    pub fn form(&self) -> i64 {
        self.form
    }

    pub fn get_attribute(&self, name: &str) -> Result<Option<AttrValue>> {
        access::read_unchecked(&self.file, AttributeTarget::PageForm(self.form), name)
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        access::write_unchecked(
            &self.file,
            AttributeTarget::PageForm(self.form),
            name,
            &value.into(),
        )
    }

    pub fn text(&self) -> Result<Option<String>> {
        Ok(self
            .get_attribute("text")?
            .and_then(|value| value.as_str().map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_bits_decode() {
        let all = Permissions::from_bits(0x1E);
        assert!(all.editable() && all.annotatable() && all.printable() && all.copyable());
        let print_only = Permissions::from_bits(0x08);
        assert!(print_only.printable());
        assert!(!print_only.editable());
        assert!(!print_only.copyable());
    }
}
