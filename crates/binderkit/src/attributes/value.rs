//! Typed attribute values and their engine encoding.
//!
//! [`AttrValue`] is what callers read and write. [`RawAttribute`] is what the
//! engine stores: dates as Unix timestamps and point lists as flat integer
//! buffers in 1/100 mm.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{BinderError, Result};
use crate::geometry::Point;

/// Engine-side value kind. The numeric codes are the engine's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttrKind {
    Int,
    Str,
    Date,
    Bool,
    Points,
}

impl AttrKind {
    /// Engine type code; point lists travel as octets.
    pub fn code(self) -> i64 {
        match self {
            AttrKind::Int => 0,
            AttrKind::Str => 1,
            AttrKind::Date => 2,
            AttrKind::Bool => 3,
            AttrKind::Points => 4,
        }
    }
}

/// Value as stored by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAttribute {
    Int(i64),
    Str(String),
    Bool(bool),
    /// Unix timestamp.
    Date(i64),
    /// Flat `x0, y0, x1, y1, ...` buffer in 1/100 mm.
    Points(Vec<i64>),
}

impl RawAttribute {
    pub fn kind(&self) -> AttrKind {
        match self {
            RawAttribute::Int(_) => AttrKind::Int,
            RawAttribute::Str(_) => AttrKind::Str,
            RawAttribute::Bool(_) => AttrKind::Bool,
            RawAttribute::Date(_) => AttrKind::Date,
            RawAttribute::Points(_) => AttrKind::Points,
        }
    }
}

/// Runtime representation of an attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttrValue {
    Int(i64),
    Str(String),
    Bool(bool),
    Date(DateTime<FixedOffset>),
    /// Points in mm.
    Points(Vec<Point>),
}

impl AttrValue {
    /// Kind this value encodes to. Booleans are always [`AttrKind::Bool`].
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Bool(_) => AttrKind::Bool,
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Str(_) => AttrKind::Str,
            AttrValue::Date(_) => AttrKind::Date,
            AttrValue::Points(_) => AttrKind::Points,
        }
    }

    /// Attaches `zone` to a date that has none.
    pub fn local_date(naive: NaiveDateTime, zone: FixedOffset) -> Result<Self> {
        zone.from_local_datetime(&naive)
            .single()
            .map(AttrValue::Date)
            .ok_or_else(|| BinderError::InvalidValue(format!("ambiguous local date {}", naive)))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            AttrValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_points(&self) -> Option<&[Point]> {
        match self {
            AttrValue::Points(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Str(s) => write!(f, "{}", s),
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            AttrValue::Points(points) => {
                let parts: Vec<String> = points.iter().map(|p| p.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Parses loosely typed text. Boolean literals win over integers, then
/// RFC 3339 dates; anything else is a string.
impl FromStr for AttrValue {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Ok(AttrValue::Bool(true));
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Ok(AttrValue::Bool(false));
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return Ok(AttrValue::Int(v));
        }
        if let Ok(d) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(AttrValue::Date(d));
        }
        Ok(AttrValue::Str(s.to_string()))
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<DateTime<FixedOffset>> for AttrValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        AttrValue::Date(v)
    }
}

impl From<Vec<Point>> for AttrValue {
    fn from(v: Vec<Point>) -> Self {
        AttrValue::Points(v)
    }
}

/// Encodes a value for the engine.
pub fn encode(value: &AttrValue) -> RawAttribute {
    match value {
        AttrValue::Bool(v) => RawAttribute::Bool(*v),
        AttrValue::Int(v) => RawAttribute::Int(*v),
        AttrValue::Str(s) => RawAttribute::Str(s.clone()),
        AttrValue::Date(d) => RawAttribute::Date(d.timestamp()),
        AttrValue::Points(points) => RawAttribute::Points(
            points
                .iter()
                .flat_map(|p| [p.x_hundredths(), p.y_hundredths()])
                .collect(),
        ),
    }
}

/// Decodes an engine value, presenting dates in `zone`.
pub fn decode(raw: RawAttribute, zone: FixedOffset) -> Result<AttrValue> {
    match raw {
        RawAttribute::Int(v) => Ok(AttrValue::Int(v)),
        RawAttribute::Str(s) => Ok(AttrValue::Str(s)),
        RawAttribute::Bool(v) => Ok(AttrValue::Bool(v)),
        RawAttribute::Date(ts) => zone
            .timestamp_opt(ts, 0)
            .single()
            .map(AttrValue::Date)
            .ok_or_else(|| BinderError::InvalidValue(format!("timestamp {} out of range", ts))),
        RawAttribute::Points(flat) => {
            if flat.len() % 2 != 0 {
                return Err(BinderError::InvalidValue(format!(
                    "point buffer has odd length {}",
                    flat.len()
                )));
            }
            Ok(AttrValue::Points(
                flat.chunks_exact(2)
                    .map(|pair| Point::from_hundredths(pair[0], pair[1]))
                    .collect(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn booleans_encode_as_bool_kind() {
        let raw = encode(&AttrValue::from(true));
        assert_eq!(raw, RawAttribute::Bool(true));
        assert_eq!(raw.kind(), AttrKind::Bool);
        assert_eq!(encode(&AttrValue::from(1)).kind(), AttrKind::Int);
    }

    #[test]
    fn parsing_prefers_bool_over_int() {
        assert_eq!("true".parse::<AttrValue>().unwrap(), AttrValue::Bool(true));
        assert_eq!("False".parse::<AttrValue>().unwrap(), AttrValue::Bool(false));
        assert_eq!("42".parse::<AttrValue>().unwrap(), AttrValue::Int(42));
        assert_eq!(
            "hello".parse::<AttrValue>().unwrap(),
            AttrValue::Str("hello".to_string())
        );
    }

    #[test]
    fn parsing_reads_rfc3339_dates() {
        let value: AttrValue = "2024-03-01T10:00:00+09:00".parse().unwrap();
        assert_eq!(value.as_date().unwrap().timestamp(), 1_709_254_800);
    }

    #[test]
    fn dates_round_trip_through_timestamps_in_zone() {
        let naive = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let value = AttrValue::local_date(naive, jst()).unwrap();
        let raw = encode(&value);
        assert_eq!(raw, RawAttribute::Date(1_709_254_800));

        let decoded = decode(raw, jst()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.as_date().unwrap().offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn points_scale_by_hundredths() {
        let raw = RawAttribute::Points(vec![1000, 2050, 0, 125]);
        let decoded = decode(raw.clone(), jst()).unwrap();
        let points = decoded.as_points().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], Point::new(10.0, 20.5));
        assert_eq!(points[1], Point::new(0.0, 1.25));
        assert_eq!(encode(&decoded), raw);
    }

    #[test]
    fn odd_point_buffers_are_rejected() {
        let err = decode(RawAttribute::Points(vec![1, 2, 3]), jst()).unwrap_err();
        assert!(matches!(err, BinderError::InvalidValue(_)));
    }
}
