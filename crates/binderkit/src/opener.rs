use std::path::Path;
use std::rc::Rc;

use crate::binder::Binder;
use crate::config::BinderkitConfig;
use crate::document::Document;
use crate::engine::DocumentEngine;
use crate::error::{BinderError, Result};

/// A container opened by [`open`].
pub enum Opened {
    Document(Document),
    Binder(Binder),
}

impl Opened {
    pub fn name(&self) -> String {
        match self {
            Opened::Document(document) => document.name(),
            Opened::Binder(binder) => binder.name(),
        }
    }

    pub fn close(&self) -> Result<()> {
        match self {
            Opened::Document(document) => document.close(),
            Opened::Binder(binder) => binder.close(),
        }
    }
}

/// Opens a document (`.xdw`) or binder (`.xbd`) by extension.
pub fn open(
    engine: Rc<dyn DocumentEngine>,
    path: impl AsRef<Path>,
    config: &BinderkitConfig,
) -> Result<Opened> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("xdw") => Ok(Opened::Document(Document::open(engine, path, config)?)),
        Some("xbd") => Ok(Opened::Binder(Binder::open(engine, path, config)?)),
        _ => Err(BinderError::UnsupportedFormat(path.to_path_buf())),
    }
}
