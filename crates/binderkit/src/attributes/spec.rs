//! Attribute specifications and registry.
//!
//! Every named attribute the engine understands is listed here with its engine
//! tag, its value kind, and which owners may carry it. Names are snake_case
//! (`border_color`); tags are the engine's own (`%BorderColor`).

use std::fmt;

use super::codec::{annotation_type as at, CodeTable, ANNOTATION_TYPE, COLOR, FUSEN_COLOR};
use super::value::AttrKind;
use crate::error::{BinderError, Result};

/// What kind of entity owns an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Document,
    Binder,
    Page,
    /// An annotation of the given type code.
    Annotation(i64),
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKind::Document => write!(f, "document"),
            OwnerKind::Binder => write!(f, "binder"),
            OwnerKind::Page => write!(f, "page"),
            OwnerKind::Annotation(code) => {
                write!(f, "{} annotation", ANNOTATION_TYPE.describe(*code))
            }
        }
    }
}

/// Which engine namespace an attribute lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Document properties, carried by documents and binders.
    Document,
    /// Annotation properties, restricted per annotation type.
    Annotation,
    /// Only meaningful on page forms (headers, footers, page numbers).
    PageForm,
}

#[derive(Debug, Clone)]
pub struct AttributeSpec {
    /// Name used in the API (e.g. "border_color")
    pub name: &'static str,

    /// Engine tag (e.g. "%BorderColor")
    pub tag: &'static str,

    pub kind: AttrKind,

    pub domain: Domain,

    /// Annotation types allowed to carry this attribute
    pub annotation_types: &'static [i64],

    /// Symbolic names for integer codes, if any
    pub symbols: Option<&'static CodeTable>,
}

impl AttributeSpec {
    const fn new(name: &'static str, tag: &'static str, kind: AttrKind) -> Self {
        Self {
            name,
            tag,
            kind,
            domain: Domain::PageForm,
            annotation_types: &[],
            symbols: None,
        }
    }

    const fn document(mut self) -> Self {
        self.domain = Domain::Document;
        self
    }

    const fn on(mut self, types: &'static [i64]) -> Self {
        self.domain = Domain::Annotation;
        self.annotation_types = types;
        self
    }

    const fn symbols(mut self, table: &'static CodeTable) -> Self {
        self.symbols = Some(table);
        self
    }

    /// Symbol table used when `owner` reads or writes this attribute.
    /// Sticky notes use their own palette for fill colour.
    pub fn symbols_for(&self, owner: OwnerKind) -> Option<&'static CodeTable> {
        if self.name == "fill_color" && owner == OwnerKind::Annotation(at::FUSEN) {
            return Some(&FUSEN_COLOR);
        }
        self.symbols
    }

    pub fn applies_to(&self, owner: OwnerKind) -> bool {
        match (self.domain, owner) {
            (Domain::Document, OwnerKind::Document | OwnerKind::Binder) => true,
            (Domain::Annotation, OwnerKind::Annotation(code)) => {
                self.annotation_types.contains(&code)
            }
            _ => false,
        }
    }
}

const LINE: &[i64] = &[at::STRAIGHTLINE];
const STAMP: &[i64] = &[at::STAMP];
const TEXT: &[i64] = &[at::TEXT];
const LINK: &[i64] = &[at::LINK];
const TEXT_AND_LINK: &[i64] = &[at::TEXT, at::LINK];
const SHAPES: &[i64] = &[at::RECTANGLE, at::ARC, at::POLYGON];
const STROKED: &[i64] = &[at::STRAIGHTLINE, at::MARKER];
const POINTED: &[i64] = &[at::STRAIGHTLINE, at::MARKER, at::POLYGON];
const BORDERED: &[i64] = &[
    at::STRAIGHTLINE,
    at::RECTANGLE,
    at::ARC,
    at::STAMP,
    at::MARKER,
    at::POLYGON,
];
const WIDE_BORDERED: &[i64] = &[
    at::STRAIGHTLINE,
    at::RECTANGLE,
    at::ARC,
    at::MARKER,
    at::POLYGON,
];
const FILLED: &[i64] = &[at::FUSEN, at::RECTANGLE, at::ARC, at::POLYGON];
const RESIZABLE: &[i64] = &[at::LINK, at::FUSEN];

use AttrKind::{Int, Points, Str};

/// Registry of every named attribute.
pub static ATTRIBUTES: &[AttributeSpec] = &[
    // Document properties
    AttributeSpec::new("title", "%Title", Str).document(),
    AttributeSpec::new("subject", "%Subject", Str).document(),
    AttributeSpec::new("author", "%Author", Str).document(),
    AttributeSpec::new("keywords", "%Keywords", Str).document(),
    AttributeSpec::new("comments", "%Comments", Str).document(),
    // Straight lines
    AttributeSpec::new("arrowhead_style", "%ArrowheadStyle", Int).on(LINE),
    AttributeSpec::new("arrowhead_type", "%ArrowheadType", Int).on(LINE),
    AttributeSpec::new("border_type", "%BorderType", Int).on(LINE),
    // Colours and strokes
    AttributeSpec::new("auto_resize", "%AutoResize", Int).on(RESIZABLE),
    AttributeSpec::new("back_color", "%BackColor", Int)
        .on(TEXT)
        .symbols(&COLOR),
    AttributeSpec::new("border_color", "%BorderColor", Int)
        .on(BORDERED)
        .symbols(&COLOR),
    AttributeSpec::new("border_style", "%BorderStyle", Int).on(SHAPES),
    AttributeSpec::new("border_transparent", "%BorderTransparent", Int).on(STROKED),
    AttributeSpec::new("border_width", "%BorderWidth", Int).on(WIDE_BORDERED),
    AttributeSpec::new("fill_color", "%FillColor", Int)
        .on(FILLED)
        .symbols(&COLOR),
    AttributeSpec::new("fill_style", "%FillStyle", Int).on(SHAPES),
    AttributeSpec::new("fill_transparent", "%FillTransparent", Int).on(SHAPES),
    AttributeSpec::new("points", "%Points", Points).on(POINTED),
    // Stamps
    AttributeSpec::new("basis_year", "%BasisYear", Int).on(STAMP),
    AttributeSpec::new("basis_year_style", "%BasisYearStyle", Int).on(STAMP),
    AttributeSpec::new("date_order", "%DateOrder", Int).on(STAMP),
    AttributeSpec::new("date_style", "%DateStyle", Int).on(STAMP),
    AttributeSpec::new("bottom_field", "%BottomField", Str).on(STAMP),
    AttributeSpec::new("top_field", "%TopField", Str).on(STAMP),
    AttributeSpec::new("date_field_first_char", "%DateFieldFirstChar", Str).on(STAMP),
    AttributeSpec::new("date_format", "%DateFormat", Str).on(STAMP),
    AttributeSpec::new("day_field", "%DayField", Str).on(STAMP),
    AttributeSpec::new("month_field", "%MonthField", Str).on(STAMP),
    AttributeSpec::new("year_field", "%YearField", Str).on(STAMP),
    // Fonts
    AttributeSpec::new("font_char_set", "%FontCharSet", Int).on(TEXT_AND_LINK),
    AttributeSpec::new("font_name", "%FontName", Str).on(TEXT_AND_LINK),
    AttributeSpec::new("font_pitch_and_family", "%FontPitchAndFamily", Int).on(TEXT_AND_LINK),
    AttributeSpec::new("font_size", "%FontSize", Int).on(TEXT_AND_LINK),
    AttributeSpec::new("font_style", "%FontStyle", Int).on(TEXT_AND_LINK),
    AttributeSpec::new("fore_color", "%ForeColor", Int)
        .on(TEXT_AND_LINK)
        .symbols(&COLOR),
    // Links
    AttributeSpec::new("invisible", "%Invisible", Int).on(LINK),
    AttributeSpec::new("link_type", "%LinkType", Int).on(LINK),
    AttributeSpec::new("other_file_path_relative", "%OtherFilePathRelative", Int).on(LINK),
    AttributeSpec::new("page_from", "%PageFrom", Int).on(LINK),
    AttributeSpec::new("show_icon", "%ShowIcon", Int).on(LINK),
    AttributeSpec::new("tooltip", "%Tooltip", Int).on(LINK),
    AttributeSpec::new("xdw_link", "%XdwLink", Int).on(LINK),
    AttributeSpec::new("xdw_page", "%XdwPage", Int).on(LINK),
    AttributeSpec::new("xdw_path_relative", "%XdwPathRelative", Int).on(LINK),
    AttributeSpec::new("caption", "%Caption", Str).on(LINK),
    AttributeSpec::new("link_atn_title", "%LinkAtnTitle", Str).on(LINK),
    AttributeSpec::new("mail_address", "%MailAddress", Str).on(LINK),
    AttributeSpec::new("other_file_path", "%OtherFilePath", Str).on(LINK),
    AttributeSpec::new("tooltip_string", "%TooltipString", Str).on(LINK),
    AttributeSpec::new("url", "%Url", Str).on(LINK),
    AttributeSpec::new("xdw_name_in_xbd", "%XdwNameInXbd", Str).on(LINK),
    AttributeSpec::new("xdw_path", "%XdwPath", Str).on(LINK),
    // Text boxes
    AttributeSpec::new("line_space", "%LineSpace", Int).on(TEXT),
    AttributeSpec::new("text", "%Text", Str).on(TEXT),
    AttributeSpec::new("text_auto_resize_height", "%AutoResizeHeight", Int).on(TEXT),
    AttributeSpec::new("text_bottom_margin", "%BottomMargin", Int).on(TEXT),
    AttributeSpec::new("text_direction", "%TextDirection", Int).on(TEXT),
    AttributeSpec::new("text_left_margin", "%LeftMargin", Int).on(TEXT),
    AttributeSpec::new("text_orientation", "%TextOrientation", Int).on(TEXT),
    AttributeSpec::new("text_right_margin", "%RightMargin", Int).on(TEXT),
    AttributeSpec::new("text_spacing", "%Spacing", Int).on(TEXT),
    AttributeSpec::new("text_top_margin", "%TopMargin", Int).on(TEXT),
    AttributeSpec::new("word_wrap", "%WordWrap", Int).on(TEXT),
    // Page forms only
    AttributeSpec::new("alignment", "%Alignment", Int),
    AttributeSpec::new("beginning_page", "%BeginningPage", Int),
    AttributeSpec::new("custom_data", "%CustomAnnCustomData", Str),
    AttributeSpec::new("digit", "%Digit", Int),
    AttributeSpec::new("ending_page", "%EndingPage", Int),
    AttributeSpec::new("guid", "%CustomAnnGuid", Str),
    AttributeSpec::new("image_file", "%ImageFile", Str),
    AttributeSpec::new("left_right_margin", "%LeftRightMargin", Int),
    AttributeSpec::new("page_range", "%PageRange", Int),
    AttributeSpec::new("starting_number", "%StartingNumber", Int),
    AttributeSpec::new("top_bottom_margin", "%TopBottomMargin", Int),
    AttributeSpec::new("ver_position", "%VerPosition", Int),
    AttributeSpec::new("zoom", "%Zoom", Int),
];

/// Look up an attribute spec by name.
pub fn get_spec(name: &str) -> Option<&'static AttributeSpec> {
    ATTRIBUTES.iter().find(|spec| spec.name == name)
}

/// Checks whether `owner` may carry `name`.
///
/// Returns the spec when the engine stores the attribute for this owner and
/// `None` for names the registry does not know (callers keep those locally).
/// A registered name that belongs to another owner kind is an error.
pub fn validate(name: &str, owner: OwnerKind) -> Result<Option<&'static AttributeSpec>> {
    match get_spec(name) {
        None => Ok(None),
        Some(spec) if spec.applies_to(owner) => Ok(Some(spec)),
        Some(_) => Err(BinderError::AttributeNotApplicable {
            name: name.to_string(),
            owner,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        for (i, spec) in ATTRIBUTES.iter().enumerate() {
            assert!(
                ATTRIBUTES[i + 1..].iter().all(|other| other.name != spec.name),
                "duplicate attribute {}",
                spec.name
            );
        }
    }

    #[test]
    fn border_color_spec_is_correct() {
        let spec = get_spec("border_color").unwrap();
        assert_eq!(spec.tag, "%BorderColor");
        assert_eq!(spec.kind, AttrKind::Int);
        assert_eq!(spec.domain, Domain::Annotation);
        assert!(spec.applies_to(OwnerKind::Annotation(at::STAMP)));
        assert!(!spec.applies_to(OwnerKind::Annotation(at::TEXT)));
        assert!(spec.symbols.is_some());
    }

    #[test]
    fn title_belongs_to_documents_and_binders() {
        let spec = get_spec("title").unwrap();
        assert!(spec.applies_to(OwnerKind::Document));
        assert!(spec.applies_to(OwnerKind::Binder));
        assert!(!spec.applies_to(OwnerKind::Page));
    }

    #[test]
    fn validate_rejects_known_name_on_wrong_owner() {
        let err = validate("text", OwnerKind::Annotation(at::STAMP)).unwrap_err();
        match err {
            BinderError::AttributeNotApplicable { name, owner } => {
                assert_eq!(name, "text");
                assert_eq!(owner, OwnerKind::Annotation(at::STAMP));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(validate("title", OwnerKind::Page).is_err());
    }

    #[test]
    fn validate_passes_unknown_names_for_local_storage() {
        assert!(validate("my_note", OwnerKind::Page).unwrap().is_none());
    }

    #[test]
    fn page_form_attributes_are_not_valid_elsewhere() {
        assert_eq!(get_spec("zoom").unwrap().domain, Domain::PageForm);
        assert!(validate("zoom", OwnerKind::Document).is_err());
    }

    #[test]
    fn fusen_fill_color_uses_its_own_palette() {
        let spec = get_spec("fill_color").unwrap();
        let fusen = spec.symbols_for(OwnerKind::Annotation(at::FUSEN)).unwrap();
        assert_eq!(fusen.name, "fusen color");
        let rect = spec.symbols_for(OwnerKind::Annotation(at::RECTANGLE)).unwrap();
        assert_eq!(rect.name, "color");
    }
}
