//! Millimetre geometry used by pages and annotations.
//!
//! The engine measures in 1/100 mm; these types hold mm as `f64`.

use serde::Serialize;
use std::fmt;

const HUNDREDTHS: f64 = 100.0;

pub(crate) fn from_hundredths(v: i64) -> f64 {
    v as f64 / HUNDREDTHS
}

pub(crate) fn to_hundredths(v: f64) -> i64 {
    (v * HUNDREDTHS).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub(crate) fn from_hundredths(x: i64, y: i64) -> Self {
        Self::new(from_hundredths(x), from_hundredths(y))
    }

    pub(crate) fn x_hundredths(&self) -> i64 {
        to_hundredths(self.x)
    }

    pub(crate) fn y_hundredths(&self) -> i64 {
        to_hundredths(self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub(crate) fn from_hundredths(width: i64, height: i64) -> Self {
        Self::new(from_hundredths(width), from_hundredths(height))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}*{:.2}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in mm, `top` above `bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Copy whose right and bottom edges are pushed out by 0.01 mm, turning a
    /// half-open containment test into a closed one at engine resolution.
    pub fn closed(&self) -> Self {
        Self {
            right: self.right + 0.01,
            bottom: self.bottom + 0.01,
            ..*self
        }
    }

    /// Whether a box at `origin` with `size` lies inside. The right and
    /// bottom edges count as outside.
    pub fn encloses(&self, origin: Point, size: Size) -> bool {
        self.left <= origin.x
            && origin.x + size.width < self.right
            && self.top <= origin.y
            && origin.y + size.height < self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encloses_checks_the_whole_box() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(rect.encloses(Point::new(10.0, 10.0), Size::new(20.0, 20.0)));
        assert!(!rect.encloses(Point::new(80.0, 80.0), Size::new(20.0, 20.0)));
        assert!(rect.closed().encloses(Point::new(80.0, 80.0), Size::new(20.0, 20.0)));
        assert!(!rect.encloses(Point::new(90.0, 10.0), Size::new(20.0, 20.0)));
        assert!(!rect.encloses(Point::new(-1.0, 10.0), Size::new(1.0, 1.0)));
    }

    #[test]
    fn closed_widens_a_copy_only() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let closed = rect.closed();
        assert!(closed.right > rect.right);
        assert!(closed.bottom > rect.bottom);
        assert_eq!(rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(rect.closed(), closed);
    }

    #[test]
    fn hundredths_round_to_nearest() {
        assert_eq!(to_hundredths(12.346), 1235);
        assert_eq!(from_hundredths(21000), 210.0);
    }
}
