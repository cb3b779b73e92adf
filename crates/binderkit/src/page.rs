use std::fmt;
use std::rc::{Rc, Weak};

use crate::annotation::{AnnotationQuery, AnnotationSet, Found};
use crate::attributes::access::{self, LocalAttributes};
use crate::attributes::codec::{page_type, COLOR_SCHEME, COMPRESS, PAGE_FORM, PAGE_TYPE};
use crate::attributes::{AttrValue, Code, OwnerKind};
use crate::bus::{Channel, Observer, Slot};
use crate::collection::Positioned;
use crate::engine::{AttributeTarget, PageInfo, UserAttributeTarget};
use crate::error::{BinderError, Result};
use crate::file::FileCore;
use crate::geometry::Size;
use crate::pages::PageSet;
use crate::text::{join_nonempty, ANNOTATION_SEPARATOR};

/// Resolution codes 0..=6 stand for fixed dpi values; anything larger is
/// already in dpi.
fn norm_res(code: i64) -> i64 {
    const DPI: [i64; 7] = [100, 200, 400, 200, 300, 400, 200];
    usize::try_from(code)
        .ok()
        .and_then(|i| DPI.get(i).copied())
        .unwrap_or(code)
}

/// Splits `header_starting_number` into the page form and the inner name.
/// The image forms can only be written.
fn split_form_name(name: &str, writing: bool) -> Option<(i64, &str)> {
    let (prefix, inner) = name.split_once('_')?;
    let form = match prefix {
        "header" | "footer" | "pagenumber" => prefix,
        "topimage" | "bottomimage" if writing => prefix,
        _ => return None,
    };
    Some((PAGE_FORM.normalize(form), inner))
}

/// One page of a document or of a binder's sub-document.
///
/// Descriptive fields are read once when the proxy is built.
pub struct Page {
    slot: Slot,
    pages: Weak<PageSet>,
    file: Rc<FileCore>,
    info: PageInfo,
    annotations: AnnotationSet,
    local: LocalAttributes,
}

impl Page {
    pub(crate) fn new(
        pages: Weak<PageSet>,
        file: Rc<FileCore>,
        position: usize,
        info: PageInfo,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            slot: Slot::new(Channel::Page, position),
            annotations: AnnotationSet::new(file.clone(), me.clone(), None, info.annotation_count),
            pages,
            file,
            info,
            local: LocalAttributes::default(),
        })
    }

    /// Index of this page in the container's flat page list.
    pub fn absolute_page(&self) -> Result<usize> {
        self.slot.ensure_live()?;
        let pages = self.pages.upgrade().ok_or_else(|| {
            BinderError::StaleReference("page list is no longer open".to_string())
        })?;
        pages.absolute_page(self.slot.position())
    }

    pub fn is_live(&self) -> bool {
        self.slot.is_live()
    }

    /// Page size in mm.
    pub fn size(&self) -> Size {
        Size::from_hundredths(self.info.width, self.info.height)
    }

    pub fn page_type(&self) -> i64 {
        self.info.page_type
    }

    pub fn type_name(&self) -> &'static str {
        PAGE_TYPE.name_of(self.info.page_type).unwrap_or("UNKNOWN")
    }

    /// Horizontal and vertical resolution in dpi.
    pub fn resolution(&self) -> (i64, i64) {
        (
            norm_res(self.info.horizontal_resolution),
            norm_res(self.info.vertical_resolution),
        )
    }

    pub fn compress_type(&self) -> String {
        COMPRESS.describe(self.info.compress_type)
    }

    /// Rotation in degrees.
    pub fn degree(&self) -> i64 {
        self.info.degree
    }

    pub fn original_size(&self) -> Size {
        Size::from_hundredths(self.info.original_width, self.info.original_height)
    }

    pub fn original_resolution(&self) -> (i64, i64) {
        (
            norm_res(self.info.original_horizontal_resolution),
            norm_res(self.info.original_vertical_resolution),
        )
    }

    /// Image size in pixels.
    pub fn image_size(&self) -> (i64, i64) {
        (self.info.image_width, self.info.image_height)
    }

    pub fn is_color(&self) -> bool {
        self.info.is_color
    }

    pub fn bits_per_pixel(&self) -> i64 {
        self.info.bits_per_pixel
    }

    pub fn color_scheme(&self) -> &'static str {
        let code = if self.info.is_color {
            1
        } else if self.info.bits_per_pixel > 1 {
            2
        } else {
            0
        };
        COLOR_SCHEME.name_of(code).unwrap_or("MONO")
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn find_annotations(&self, query: &AnnotationQuery) -> Result<Vec<Found>> {
        self.slot.ensure_live()?;
        self.annotations.find(query)
    }

    /// Text of the page body.
    pub fn content_text(&self) -> Result<Option<String>> {
        self.content_text_filtered(None)
    }

    /// Text of the page body, or `None` unless the page is of `kind`
    /// (`"IMAGE"` or `"APPLICATION"`).
    pub fn content_text_of<'a>(&self, kind: impl Into<Code<'a>>) -> Result<Option<String>> {
        self.content_text_filtered(Some(PAGE_TYPE.normalize(kind)))
    }

    pub(crate) fn content_text_filtered(&self, kind: Option<i64>) -> Result<Option<String>> {
        if kind.is_some_and(|k| k != page_type::UNKNOWN && k != self.info.page_type) {
            return Ok(None);
        }
        let page = self.absolute_page()?;
        self.file
            .call("page_text", Some(page), |engine, handle| {
                engine.page_text(handle, page)
            })
            .map(Some)
    }

    pub fn annotation_text(&self) -> Result<String> {
        self.slot.ensure_live()?;
        self.annotations.text()
    }

    pub fn fulltext(&self) -> Result<String> {
        Ok(join_nonempty(
            ANNOTATION_SEPARATOR,
            [self.content_text()?, Some(self.annotation_text()?)],
        ))
    }

    /// Page attributes. Names prefixed `header_`, `footer_` or `pagenumber_`
    /// read the document's page form; other names the engine does not keep
    /// per page live on this proxy.
    pub fn get_attribute(&self, name: &str) -> Result<Option<AttrValue>> {
        self.slot.ensure_live()?;
        match split_form_name(name, false) {
            Some((form, inner)) => {
                access::read_unchecked(&self.file, AttributeTarget::PageForm(form), inner)
            }
            None => access::read(&self.file, OwnerKind::Page, None, &self.local, name),
        }
    }

    /// Like [`get_attribute`](Self::get_attribute); `topimage_` and
    /// `bottomimage_` are accepted as well.
    pub fn set_attribute(&self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        self.slot.ensure_live()?;
        let value = value.into();
        match split_form_name(name, true) {
            Some((form, inner)) => {
                access::write_unchecked(&self.file, AttributeTarget::PageForm(form), inner, &value)
            }
            None => access::write(&self.file, OwnerKind::Page, None, &self.local, name, value),
        }
    }

    pub fn user_attribute(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let page = self.absolute_page()?;
        access::read_user(&self.file, UserAttributeTarget::Page(page), name)
    }

    pub fn set_user_attribute(&self, name: &str, value: &[u8]) -> Result<()> {
        let page = self.absolute_page()?;
        access::write_user(&self.file, UserAttributeTarget::Page(page), name, value)
    }
}

impl Observer for Page {
    fn slot(&self) -> &Slot {
        &self.slot
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Page(page {}: {}mm, {}, {} annotations)",
            self.slot.position(),
            self.size(),
            self.type_name(),
            self.annotations.len()
        )
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_codes_map_to_dpi() {
        assert_eq!(norm_res(0), 100);
        assert_eq!(norm_res(2), 400);
        assert_eq!(norm_res(6), 200);
        assert_eq!(norm_res(600), 600);
    }

    #[test]
    fn page_form_prefixes_split() {
        assert_eq!(
            split_form_name("header_starting_number", false),
            Some((0, "starting_number"))
        );
        assert_eq!(split_form_name("pagenumber_digit", false), Some((4, "digit")));
        assert_eq!(split_form_name("topimage_zoom", false), None);
        assert_eq!(split_form_name("topimage_zoom", true), Some((2, "zoom")));
        assert_eq!(split_form_name("memo", true), None);
        assert_eq!(split_form_name("my_note", true), None);
    }
}
