//! Symbolic name tables.
//!
//! Each table maps the external symbolic names (`"RED"`, `"FITDEF"`) to the
//! engine's numeric codes. Lookups are lenient: an unknown name resolves to the
//! table's default code instead of failing, so callers written against older
//! name sets keep working.

/// A key accepted by [`CodeTable::normalize`]: a symbolic name or a raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code<'a> {
    Name(&'a str),
    Value(i64),
}

impl<'a> From<&'a str> for Code<'a> {
    fn from(name: &'a str) -> Self {
        Code::Name(name)
    }
}

impl<'a> From<&'a String> for Code<'a> {
    fn from(name: &'a String) -> Self {
        Code::Name(name.as_str())
    }
}

impl From<i64> for Code<'_> {
    fn from(value: i64) -> Self {
        Code::Value(value)
    }
}

impl From<i32> for Code<'_> {
    fn from(value: i32) -> Self {
        Code::Value(value as i64)
    }
}

#[derive(Debug)]
pub struct CodeTable {
    pub name: &'static str,
    entries: &'static [(&'static str, i64)],
    default: i64,
}

impl CodeTable {
    const fn new(
        name: &'static str,
        entries: &'static [(&'static str, i64)],
        default: i64,
    ) -> Self {
        Self {
            name,
            entries,
            default,
        }
    }

    /// Resolves a name or code to a code. Names match case-insensitively and
    /// unknown names fall back to the table default. Codes pass through.
    pub fn normalize<'a>(&self, key: impl Into<Code<'a>>) -> i64 {
        match key.into() {
            Code::Value(value) => value,
            Code::Name(name) => self.lookup(name).unwrap_or(self.default),
        }
    }

    /// Strict variant of [`normalize`](Self::normalize) for names.
    pub fn lookup(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, code)| *code)
    }

    /// First symbolic name registered for `code`.
    pub fn name_of(&self, code: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, known)| *known == code)
            .map(|(name, _)| *name)
    }

    /// Name of `code`, or the code itself rendered as a number.
    pub fn describe(&self, code: i64) -> String {
        self.name_of(code)
            .map(str::to_string)
            .unwrap_or_else(|| code.to_string())
    }

    pub fn default_code(&self) -> i64 {
        self.default
    }
}

/// Annotation type codes.
pub mod annotation_type {
    pub const FUSEN: i64 = 32794;
    pub const TEXT: i64 = 32785;
    pub const STAMP: i64 = 32819;
    pub const STRAIGHTLINE: i64 = 32828;
    pub const RECTANGLE: i64 = 32829;
    pub const ARC: i64 = 32830;
    pub const POLYGON: i64 = 32834;
    pub const MARKER: i64 = 32795;
    pub const LINK: i64 = 49199;
    pub const PAGEFORM: i64 = 32814;
    pub const OLE: i64 = 32783;
    pub const BITMAP: i64 = 32831;
    pub const RECEIVEDSTAMP: i64 = 32832;
    pub const CUSTOM: i64 = 32837;
    pub const TITLE: i64 = 32838;
    pub const GROUP: i64 = 32839;
}

pub mod page_type {
    pub const UNKNOWN: i64 = 0;
    pub const IMAGE: i64 = 1;
    pub const APPLICATION: i64 = 2;
}

pub static ANNOTATION_TYPE: CodeTable = CodeTable::new(
    "annotation type",
    &[
        ("FUSEN", annotation_type::FUSEN),
        ("TEXT", annotation_type::TEXT),
        ("STAMP", annotation_type::STAMP),
        ("STRAIGHTLINE", annotation_type::STRAIGHTLINE),
        ("RECTANGLE", annotation_type::RECTANGLE),
        ("ARC", annotation_type::ARC),
        ("POLYGON", annotation_type::POLYGON),
        ("MARKER", annotation_type::MARKER),
        ("LINK", annotation_type::LINK),
        ("PAGEFORM", annotation_type::PAGEFORM),
        ("OLE", annotation_type::OLE),
        ("BITMAP", annotation_type::BITMAP),
        ("RECEIVEDSTAMP", annotation_type::RECEIVEDSTAMP),
        ("CUSTOM", annotation_type::CUSTOM),
        ("TITLE", annotation_type::TITLE),
        ("GROUP", annotation_type::GROUP),
    ],
    annotation_type::TEXT,
);

pub static PAGE_TYPE: CodeTable = CodeTable::new(
    "page type",
    &[
        ("UNKNOWN", page_type::UNKNOWN),
        ("IMAGE", page_type::IMAGE),
        ("APPLICATION", page_type::APPLICATION),
    ],
    page_type::UNKNOWN,
);

pub static COMPRESS: CodeTable = CodeTable::new(
    "compress type",
    &[
        ("NORMAL", 0),
        ("LOSSLESS", 1),
        ("HIGHQUALITY", 2),
        ("HIGHCOMPRESS", 3),
        ("NOCOMPRESS", 4),
        ("JPEG", 5),
        ("PACKBITS", 6),
        ("G4", 7),
        ("MRC_NORMAL", 8),
        ("MRC_HIGHQUALITY", 9),
        ("MRC_HIGHCOMPRESS", 10),
        ("MRC", 11),
        ("JPEG_TTN2", 12),
    ],
    0,
);

pub static PAGE_FORM: CodeTable = CodeTable::new(
    "page form",
    &[
        ("HEADER", 0),
        ("FOOTER", 1),
        ("TOPIMAGE", 2),
        ("BOTTOMIMAGE", 3),
        ("PAGENUMBER", 4),
    ],
    4,
);

pub static COLOR: CodeTable = CodeTable::new(
    "color",
    &[
        ("NONE", 0x010101),
        ("BLACK", 0x000000),
        ("MAROON", 0x000080),
        ("GREEN", 0x008000),
        ("OLIVE", 0x008080),
        ("NAVY", 0x800000),
        ("PURPLE", 0x800080),
        ("TEAL", 0x808000),
        ("GRAY", 0x808080),
        ("SILVER", 0xC0C0C0),
        ("RED", 0x0000FF),
        ("LIME", 0x00FF00),
        ("YELLOW", 0x00FFFF),
        ("BLUE", 0xFF0000),
        ("FUCHIA", 0xFF00FF),
        ("AQUA", 0xFFFF00),
        ("WHITE", 0xFFFFFF),
    ],
    0x000000,
);

pub static FUSEN_COLOR: CodeTable = CodeTable::new(
    "fusen color",
    &[
        ("RED", 0xFFC2FF),
        ("BLUE", 0xFFBF9D),
        ("YELLOW", 0x64FFFF),
        ("LIME", 0xC2FF9D),
        ("PALE_RED", 0xE1D7FF),
        ("PALE_BLUE", 0xFAE1C8),
        ("PALE_YELLOW", 0xC3FAFF),
        ("PALE_LIME", 0xD2FACD),
    ],
    0xC3FAFF,
);

pub static BINDER_SIZE: CodeTable = CodeTable::new(
    "binder size",
    &[
        ("FREE", 0),
        ("A3R", 1),
        ("A3", 2),
        ("A4R", 3),
        ("A4", 4),
        ("A5R", 5),
        ("A5", 6),
        ("B4R", 7),
        ("B4", 8),
        ("B5R", 9),
        ("B5", 10),
    ],
    0,
);

pub static BINDER_COLOR: CodeTable = CodeTable::new(
    "binder color",
    &[
        ("003366", 0),
        ("006633", 1),
        ("3366FF", 2),
        ("FFFF66", 3),
        ("FF6633", 4),
        ("FF3366", 5),
        ("FF00FF", 6),
        ("FFCCFF", 7),
        ("CC99FF", 8),
        ("663333", 9),
        ("999933", 10),
        ("00FF00", 11),
        ("00FFFF", 12),
        ("FFFFCC", 13),
        ("BBBBBB", 14),
        ("FFFFFF", 15),
    ],
    5,
);

pub static TEXT_TYPE: CodeTable = CodeTable::new(
    "text type",
    &[("UNKNOWN", 0), ("MULTIBYTE", 1), ("UNICODE", 2)],
    0,
);

pub static FIT_IMAGE: CodeTable = CodeTable::new(
    "fit image",
    &[
        ("FITDEF", 0),
        ("FIT", 1),
        ("USERDEF", 2),
        ("USERDEF_FIT", 3),
        ("FITDEF_DIVIDEBMP", 4),
    ],
    0,
);

pub static HORIZONTAL_POSITION: CodeTable = CodeTable::new(
    "horizontal position",
    &[("CENTER", 0), ("LEFT", 1), ("RIGHT", 2)],
    0,
);

pub static VERTICAL_POSITION: CodeTable = CodeTable::new(
    "vertical position",
    &[("CENTER", 0), ("TOP", 1), ("BOTTOM", 2)],
    0,
);

pub static MAX_PAPER_SIZE: CodeTable = CodeTable::new(
    "max paper size",
    &[("DEFAULT", 0), ("A3", 1), ("2A0", 2)],
    0,
);

pub static COLOR_SCHEME: CodeTable = CodeTable::new(
    "color scheme",
    &[("MONO", 0), ("COLOR", 1), ("MONO_HIGHQUALITY", 2)],
    0,
);
