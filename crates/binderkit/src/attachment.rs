use chrono::{DateTime, FixedOffset};
use log::debug;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use crate::attributes::codec::TEXT_TYPE;
use crate::bus::{Channel, Observer, Slot};
use crate::collection::{Children, Positioned};
use crate::engine::AttachmentInfo;
use crate::error::{BinderError, Result};
use crate::file::FileCore;

/// Files embedded in a document or binder.
pub struct AttachmentList {
    file: Rc<FileCore>,
    children: Children<Attachment>,
}

impl AttachmentList {
    pub(crate) fn new(file: Rc<FileCore>, count: usize) -> Self {
        Self {
            file,
            children: Children::new("Attachment", Channel::Attachment, count),
        }
    }

    fn engine_count(&self) -> Result<usize> {
        Ok(self.file.info()?.attachment_count)
    }

    fn load(&self, position: usize) -> Result<Rc<Attachment>> {
        let info = self
            .file
            .call("attachment_info", Some(position), |engine, handle| {
                engine.attachment_info(handle, position)
            })?;
        Ok(Rc::new(Attachment {
            slot: Slot::new(Channel::Attachment, position),
            file: self.file.clone(),
            info,
        }))
    }

    /// Embeds the file at `source` before position `pos`.
    pub fn insert(&self, pos: isize, source: impl AsRef<Path>) -> Result<Rc<Attachment>> {
        let source = source.as_ref();
        let position = self.children.normalize(pos, true)?;
        let mut inserted = self.children.insert_with(
            position,
            || {
                self.file
                    .call("insert_attachment", Some(position), |engine, handle| {
                        engine.insert_attachment(handle, position, source)
                    })?;
                Ok(1)
            },
            || self.engine_count(),
            |p| self.load(p),
        )?;
        debug!(
            "event=attachment_insert module=attachment status=ok position={} source={}",
            position,
            source.display()
        );
        inserted
            .pop()
            .ok_or_else(|| BinderError::Protocol("attachment insert produced no proxy".to_string()))
    }

    pub fn append(&self, source: impl AsRef<Path>) -> Result<Rc<Attachment>> {
        self.insert(self.children.len() as isize, source)
    }
}

impl Positioned for AttachmentList {
    type Item = Attachment;

    fn what(&self) -> &'static str {
        self.children.what()
    }

    fn len(&self) -> usize {
        self.children.len()
    }

    fn item(&self, position: usize) -> Result<Rc<Attachment>> {
        self.children.fetch(position, || self.load(position))
    }

    fn remove(&self, position: usize) -> Result<Rc<Attachment>> {
        let proxy = self.item(position)?;
        self.children.remove_with(
            position,
            proxy,
            || {
                self.file
                    .call("delete_attachment", Some(position), |engine, handle| {
                        engine.delete_attachment(handle, position)
                    })
            },
            || self.engine_count(),
        )
    }
}

pub struct Attachment {
    slot: Slot,
    file: Rc<FileCore>,
    info: AttachmentInfo,
}

impl Attachment {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.info.size
    }

    /// Last modification time, in the configured zone.
    pub fn timestamp(&self) -> Result<DateTime<FixedOffset>> {
        DateTime::from_timestamp(self.info.timestamp, 0)
            .map(|utc| utc.with_timezone(&self.file.zone()))
            .ok_or_else(|| {
                BinderError::InvalidValue(format!(
                    "attachment timestamp {} is out of range",
                    self.info.timestamp
                ))
            })
    }

    pub fn text_type(&self) -> String {
        TEXT_TYPE.describe(self.info.text_type)
    }

    pub fn is_live(&self) -> bool {
        self.slot.is_live()
    }

    /// Writes the attachment's bytes to `dest`, which must not exist yet.
    pub fn save(&self, dest: impl AsRef<Path>) -> Result<()> {
        self.slot.ensure_live()?;
        let dest = dest.as_ref();
        let position = self.slot.position();
        self.file
            .call("extract_attachment", Some(position), |engine, handle| {
                engine.extract_attachment(handle, position, dest)
            })
    }
}

impl Observer for Attachment {
    fn slot(&self) -> &Slot {
        &self.slot
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attachment({} {}: {} bytes)",
            self.slot.position(),
            self.info.name,
            self.info.size
        )
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
