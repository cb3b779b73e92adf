//! Annotations and the annotation sets owned by pages and by other
//! annotations.
//!
//! Annotations nest: a page owns an [`AnnotationSet`], and every
//! [`Annotation`] owns another one for its children. Engine calls always
//! address the page by its absolute index, resolved through the owning page
//! at call time so the page may have moved since the set was created.

use log::debug;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::attributes::access::{self, LocalAttributes};
use crate::attributes::codec::{annotation_type as at, ANNOTATION_TYPE};
use crate::attributes::{AttrValue, Code, OwnerKind};
use crate::bus::{Channel, Observer, Slot};
use crate::collection::{Children, Positioned};
use crate::engine::{
    AnnotationHandle, AnnotationInfo, AnnotationInit, AttributeTarget, NewAnnotation,
};
use crate::error::{BinderError, Result};
use crate::file::FileCore;
use crate::geometry::{to_hundredths, Point, Rect, Size};
use crate::page::Page;
use crate::text::{join_nonempty, ANNOTATION_SEPARATOR};

const MIN_FUSEN_MM: f64 = 5.0;
const MIN_SHAPE_MM: f64 = 3.0;

/// Filter for [`AnnotationSet::find`].
///
/// Empty `handles` / `types` and a missing `rect` match everything. The
/// rectangle is half-open by default; [`AnnotationQuery::closed`] widens a
/// copy of it so annotations touching the right or bottom edge match too.
#[derive(Debug, Clone, Default)]
pub struct AnnotationQuery {
    handles: Vec<AnnotationHandle>,
    types: Vec<i64>,
    rect: Option<Rect>,
    closed: bool,
    recursive: bool,
}

impl AnnotationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handles(mut self, handles: impl IntoIterator<Item = AnnotationHandle>) -> Self {
        self.handles = handles.into_iter().collect();
        self
    }

    pub fn types<'a, C: Into<Code<'a>>>(mut self, types: impl IntoIterator<Item = C>) -> Self {
        self.types = types
            .into_iter()
            .map(|t| ANNOTATION_TYPE.normalize(t))
            .collect();
        self
    }

    pub fn within(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    fn matches(&self, annotation: &Annotation, rect: Option<&Rect>) -> bool {
        rect.map_or(true, |r| r.encloses(annotation.origin(), annotation.size()))
            && (self.types.is_empty() || self.types.contains(&annotation.annotation_type()))
            && (self.handles.is_empty() || self.handles.contains(&annotation.handle()))
    }
}

/// One entry of a [`AnnotationSet::find`] result.
#[derive(Clone)]
pub enum Found {
    /// A matching annotation without matching descendants.
    Hit(Rc<Annotation>),
    /// Matching descendants, headed by their ancestor when it matched too.
    Branch {
        head: Option<Rc<Annotation>>,
        descendants: Vec<Found>,
    },
}

impl Found {
    /// Every matching annotation in depth-first order.
    pub fn flatten(&self) -> Vec<Rc<Annotation>> {
        match self {
            Found::Hit(annotation) => vec![annotation.clone()],
            Found::Branch { head, descendants } => head
                .iter()
                .cloned()
                .chain(descendants.iter().flat_map(Found::flatten))
                .collect(),
        }
    }
}

impl fmt::Debug for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Found::Hit(annotation) => write!(f, "Hit({})", annotation),
            Found::Branch { head, descendants } => f
                .debug_struct("Branch")
                .field("head", &head.as_ref().map(|a| a.to_string()))
                .field("descendants", descendants)
                .finish(),
        }
    }
}

/// The annotations directly under a page or an annotation.
pub struct AnnotationSet {
    file: Rc<FileCore>,
    page: Weak<Page>,
    owner: Option<Weak<Annotation>>,
    children: Children<Annotation>,
}

impl AnnotationSet {
    pub(crate) fn new(
        file: Rc<FileCore>,
        page: Weak<Page>,
        owner: Option<Weak<Annotation>>,
        count: usize,
    ) -> Self {
        Self {
            file,
            page,
            owner,
            children: Children::new("Annotation", Channel::Annotation, count),
        }
    }

    fn page(&self) -> Result<Rc<Page>> {
        self.page
            .upgrade()
            .ok_or_else(|| BinderError::StaleReference("page is no longer open".to_string()))
    }

    fn absolute_page(&self) -> Result<usize> {
        self.page()?.absolute_page()
    }

    fn owner(&self) -> Result<Option<Rc<Annotation>>> {
        match &self.owner {
            None => Ok(None),
            Some(weak) => {
                let owner = upgrade_owner(weak)?;
                owner.ensure_live()?;
                Ok(Some(owner))
            }
        }
    }

    fn parent_handle(&self) -> Result<Option<AnnotationHandle>> {
        Ok(self.owner()?.map(|owner| owner.handle()))
    }

    /// Child count as the engine reports it now.
    fn engine_count(&self) -> Result<usize> {
        let page = self.absolute_page()?;
        match self.owner()? {
            None => Ok(self
                .file
                .call("page_info", Some(page), |engine, handle| {
                    engine.page_info(handle, page)
                })?
                .annotation_count),
            Some(owner) => {
                let index = owner.slot.position();
                Ok(self
                    .file
                    .call("annotation_info", Some(index), |engine, handle| {
                        engine.annotation_info(handle, page, owner.parent, index)
                    })?
                    .child_count)
            }
        }
    }

    fn load(&self, position: usize) -> Result<Rc<Annotation>> {
        let page = self.absolute_page()?;
        let parent = self.parent_handle()?;
        let info = self
            .file
            .call("annotation_info", Some(position), |engine, handle| {
                engine.annotation_info(handle, page, parent, position)
            })?;
        Ok(Annotation::new(
            self.file.clone(),
            self.page.clone(),
            self.owner.clone(),
            parent,
            position,
            info,
        ))
    }

    /// Creates an annotation and appends it after the existing ones.
    pub fn add<'a>(
        &self,
        annotation_type: impl Into<Code<'a>>,
        origin: Point,
        init: AnnotationInit,
    ) -> Result<Rc<Annotation>> {
        let request = NewAnnotation {
            annotation_type: ANNOTATION_TYPE.normalize(annotation_type),
            x: origin.x_hundredths(),
            y: origin.y_hundredths(),
            init,
        };
        let page = self.absolute_page()?;
        let parent = self.parent_handle()?;
        let position = self.children.len();
        let mut added = self.children.insert_with(
            position,
            || {
                self.file
                    .call("add_annotation", Some(position), |engine, handle| {
                        engine.add_annotation(handle, page, parent, &request)
                    })?;
                Ok(1)
            },
            || self.engine_count(),
            |p| self.load(p),
        )?;
        debug!(
            "event=annotation_add module=annotation status=ok type={} page={} position={}",
            ANNOTATION_TYPE.describe(request.annotation_type),
            page,
            position
        );
        added.pop().ok_or_else(|| {
            BinderError::Protocol("annotation insert produced no proxy".to_string())
        })
    }

    pub fn add_text(&self, origin: Point, text: Option<&str>) -> Result<Rc<Annotation>> {
        let annotation = self.add(at::TEXT, origin, AnnotationInit::Default)?;
        if let Some(text) = text {
            annotation.set_attribute("text", text)?;
        }
        Ok(annotation)
    }

    /// Sticky note; at least 5 mm square.
    pub fn add_fusen(&self, origin: Point, size: Size) -> Result<Rc<Annotation>> {
        self.add(at::FUSEN, origin, sized(size, MIN_FUSEN_MM)?)
    }

    pub fn add_straightline(&self, start: Point, end: Point) -> Result<Rc<Annotation>> {
        self.add(at::STRAIGHTLINE, start, points(&[start, end]))
    }

    /// Rectangle covering `rect`; at least 3 mm square.
    pub fn add_rectangle(&self, rect: Rect) -> Result<Rc<Annotation>> {
        let (origin, size) = corner_and_size(&rect);
        self.add(at::RECTANGLE, origin, sized(size, MIN_SHAPE_MM)?)
    }

    /// Ellipse inscribed in `rect`; at least 3 mm square.
    pub fn add_arc(&self, rect: Rect) -> Result<Rc<Annotation>> {
        let (origin, size) = corner_and_size(&rect);
        self.add(at::ARC, origin, sized(size, MIN_SHAPE_MM)?)
    }

    pub fn add_stamp(&self, origin: Point, width: f64) -> Result<Rc<Annotation>> {
        self.add(at::STAMP, origin, AnnotationInit::Width(to_hundredths(width)))
    }

    pub fn add_receivedstamp(&self, origin: Point, width: f64) -> Result<Rc<Annotation>> {
        self.add(
            at::RECEIVEDSTAMP,
            origin,
            AnnotationInit::Width(to_hundredths(width)),
        )
    }

    pub fn add_bitmap(
        &self,
        origin: Point,
        image: impl Into<std::path::PathBuf>,
    ) -> Result<Rc<Annotation>> {
        self.add(at::BITMAP, origin, AnnotationInit::File(image.into()))
    }

    /// Annotation drawn by the plug-in registered under `guid`.
    pub fn add_custom(
        &self,
        origin: Point,
        size: Size,
        guid: &str,
        data: &[u8],
    ) -> Result<Rc<Annotation>> {
        let init = AnnotationInit::Custom {
            width: to_hundredths(size.width),
            height: to_hundredths(size.height),
            guid: guid.to_string(),
            data: data.to_vec(),
        };
        self.add(at::CUSTOM, origin, init)
    }

    pub fn add_marker(&self, vertices: &[Point]) -> Result<Rc<Annotation>> {
        self.add_path(at::MARKER, vertices)
    }

    pub fn add_polygon(&self, vertices: &[Point]) -> Result<Rc<Annotation>> {
        self.add_path(at::POLYGON, vertices)
    }

    fn add_path(&self, annotation_type: i64, vertices: &[Point]) -> Result<Rc<Annotation>> {
        let origin = vertices.first().copied().ok_or_else(|| {
            BinderError::InvalidValue("at least two points are required".to_string())
        })?;
        if vertices.len() < 2 {
            return Err(BinderError::InvalidValue(
                "at least two points are required".to_string(),
            ));
        }
        self.add(annotation_type, origin, points(vertices))
    }

    /// Matching annotations, nested as they are on the page when the query
    /// is recursive.
    pub fn find(&self, query: &AnnotationQuery) -> Result<Vec<Found>> {
        let rect = query.rect.map(|r| if query.closed { r.closed() } else { r });
        self.find_within(query, rect.as_ref())
    }

    fn find_within(&self, query: &AnnotationQuery, rect: Option<&Rect>) -> Result<Vec<Found>> {
        let mut found = Vec::new();
        for annotation in self.iter() {
            let annotation = annotation?;
            let descendants = if query.recursive && !annotation.children.is_empty() {
                annotation.children.find_within(query, rect)?
            } else {
                Vec::new()
            };
            match (query.matches(&annotation, rect), descendants.is_empty()) {
                (true, true) => found.push(Found::Hit(annotation)),
                (true, false) => found.push(Found::Branch {
                    head: Some(annotation),
                    descendants,
                }),
                (false, false) => found.push(Found::Branch {
                    head: None,
                    descendants,
                }),
                (false, true) => {}
            }
        }
        Ok(found)
    }

    /// Text of every annotation in the set and, recursively, their children.
    pub fn text(&self) -> Result<String> {
        let mut parts = Vec::new();
        for annotation in self.iter() {
            let annotation = annotation?;
            parts.push(annotation.content_text()?);
            if !annotation.children.is_empty() {
                parts.push(Some(annotation.children.text()?));
            }
        }
        Ok(join_nonempty(ANNOTATION_SEPARATOR, parts))
    }
}

impl Positioned for AnnotationSet {
    type Item = Annotation;

    fn what(&self) -> &'static str {
        self.children.what()
    }

    fn len(&self) -> usize {
        self.children.len()
    }

    fn item(&self, position: usize) -> Result<Rc<Annotation>> {
        self.children.fetch(position, || self.load(position))
    }

    fn remove(&self, position: usize) -> Result<Rc<Annotation>> {
        let proxy = self.item(position)?;
        let page = self.absolute_page()?;
        let target = proxy.handle();
        let removed = self.children.remove_with(
            position,
            proxy,
            || {
                self.file
                    .call("remove_annotation", Some(position), |engine, handle| {
                        engine.remove_annotation(handle, page, target)
                    })
            },
            || self.engine_count(),
        )?;
        debug!(
            "event=annotation_delete module=annotation status=ok page={} position={}",
            page, position
        );
        Ok(removed)
    }
}

fn upgrade_owner(weak: &Weak<Annotation>) -> Result<Rc<Annotation>> {
    weak.upgrade()
        .ok_or_else(|| BinderError::StaleReference("annotation is no longer open".to_string()))
}

fn sized(size: Size, minimum: f64) -> Result<AnnotationInit> {
    if size.width < minimum || size.height < minimum {
        return Err(BinderError::InvalidValue(format!(
            "annotation size must be at least {minimum}mm square, {size} given"
        )));
    }
    Ok(AnnotationInit::Size {
        width: to_hundredths(size.width),
        height: to_hundredths(size.height),
    })
}

fn points(vertices: &[Point]) -> AnnotationInit {
    AnnotationInit::Points(
        vertices
            .iter()
            .flat_map(|p| [p.x_hundredths(), p.y_hundredths()])
            .collect(),
    )
}

fn corner_and_size(rect: &Rect) -> (Point, Size) {
    (
        Point::new(rect.left, rect.top),
        Size::new(rect.right - rect.left, rect.bottom - rect.top),
    )
}

/// An annotation on a page, possibly nested inside another annotation.
pub struct Annotation {
    slot: Slot,
    file: Rc<FileCore>,
    page: Weak<Page>,
    owner: Option<Weak<Annotation>>,
    parent: Option<AnnotationHandle>,
    info: AnnotationInfo,
    children: AnnotationSet,
    local: LocalAttributes,
}

impl Annotation {
    fn new(
        file: Rc<FileCore>,
        page: Weak<Page>,
        owner: Option<Weak<Annotation>>,
        parent: Option<AnnotationHandle>,
        position: usize,
        info: AnnotationInfo,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            slot: Slot::new(Channel::Annotation, position),
            children: AnnotationSet::new(
                file.clone(),
                page.clone(),
                Some(me.clone()),
                info.child_count,
            ),
            file,
            page,
            owner,
            parent,
            info,
            local: LocalAttributes::default(),
        })
    }

    pub fn handle(&self) -> AnnotationHandle {
        self.info.handle
    }

    pub fn annotation_type(&self) -> i64 {
        self.info.annotation_type
    }

    pub fn type_name(&self) -> String {
        ANNOTATION_TYPE.describe(self.info.annotation_type)
    }

    /// Top-left corner in mm.
    pub fn origin(&self) -> Point {
        Point::from_hundredths(self.info.x, self.info.y)
    }

    pub fn size(&self) -> Size {
        Size::from_hundredths(self.info.width, self.info.height)
    }

    pub fn is_live(&self) -> bool {
        self.slot.is_live()
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.children
    }

    pub fn page(&self) -> Result<Rc<Page>> {
        self.page
            .upgrade()
            .ok_or_else(|| BinderError::StaleReference("page is no longer open".to_string()))
    }

    /// Fails with `StaleReference` once this annotation, its page or any
    /// enclosing annotation has been deleted.
    fn ensure_live(&self) -> Result<()> {
        self.slot.ensure_live()?;
        self.page()?.absolute_page()?;
        let mut owner = self.owner.clone();
        while let Some(weak) = owner {
            let enclosing = upgrade_owner(&weak)?;
            enclosing.slot.ensure_live()?;
            owner = enclosing.owner.clone();
        }
        Ok(())
    }

    fn owner_kind(&self) -> OwnerKind {
        OwnerKind::Annotation(self.info.annotation_type)
    }

    fn target(&self) -> AttributeTarget {
        AttributeTarget::Annotation(self.info.handle)
    }

    pub fn get_attribute(&self, name: &str) -> Result<Option<AttrValue>> {
        self.ensure_live()?;
        access::read(
            &self.file,
            self.owner_kind(),
            Some(self.target()),
            &self.local,
            name,
        )
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        self.ensure_live()?;
        access::write(
            &self.file,
            self.owner_kind(),
            Some(self.target()),
            &self.local,
            name,
            value.into(),
        )
    }

    fn text_field(&self, name: &str) -> Result<Option<String>> {
        Ok(access::read_unchecked(&self.file, self.target(), name)?
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    /// Text the annotation itself displays: text boxes and link captions,
    /// and stamps as `"<top> <DATE> <bottom>"`.
    pub fn content_text(&self) -> Result<Option<String>> {
        self.ensure_live()?;
        match self.info.annotation_type {
            at::TEXT => self.text_field("text"),
            at::LINK => self.text_field("caption"),
            at::STAMP => {
                let top = self.text_field("top_field")?.unwrap_or_default();
                let bottom = self.text_field("bottom_field")?.unwrap_or_default();
                Ok(Some(format!("{top} <DATE> {bottom}")))
            }
            _ => Ok(None),
        }
    }

    /// Text of the descendants.
    pub fn annotation_text(&self) -> Result<String> {
        self.ensure_live()?;
        self.children.text()
    }

    pub fn fulltext(&self) -> Result<String> {
        Ok(join_nonempty(
            ANNOTATION_SEPARATOR,
            [self.content_text()?, Some(self.annotation_text()?)],
        ))
    }
}

impl Observer for Annotation {
    fn slot(&self) -> &Slot {
        &self.slot
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Annotation({} {}: {} {}mm)",
            self.type_name(),
            self.slot.position(),
            self.origin(),
            self.size()
        )
    }
}

impl fmt::Debug for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fusen_must_be_five_mm_square() {
        assert!(sized(Size::new(5.0, 5.0), MIN_FUSEN_MM).is_ok());
        let err = sized(Size::new(4.99, 20.0), MIN_FUSEN_MM).unwrap_err();
        assert!(matches!(err, BinderError::InvalidValue(_)));
    }

    #[test]
    fn shapes_use_the_rect_corner() {
        let (origin, size) = corner_and_size(&Rect::new(10.0, 20.0, 40.0, 25.0));
        assert_eq!(origin, Point::new(10.0, 20.0));
        assert_eq!(size, Size::new(30.0, 5.0));
    }

    #[test]
    fn points_are_scaled_to_hundredths() {
        let init = points(&[Point::new(1.5, 2.0), Point::new(3.25, 4.0)]);
        assert_eq!(init, AnnotationInit::Points(vec![150, 200, 325, 400]));
    }

    #[test]
    fn query_types_accept_names() {
        let query = AnnotationQuery::new().types(["text", "FUSEN"]);
        assert_eq!(query.types, vec![at::TEXT, at::FUSEN]);
    }
}
