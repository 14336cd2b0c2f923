//! Grid geometry: locations and wire segments.

use std::fmt;

/// A point on the schematic grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    /// Horizontal grid coordinate.
    pub x: i32,
    /// Vertical grid coordinate.
    pub y: i32,
}

impl Location {
    /// Create a location from grid coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Location { x, y }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One drawn wire segment between two grid points.
///
/// Segments carry no width of their own; width is inherited from the pins
/// that end up touching the net the segment belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WireSegment {
    /// First endpoint.
    pub a: Location,
    /// Second endpoint.
    pub b: Location,
}

impl WireSegment {
    /// Create a segment between two points.
    pub const fn new(a: Location, b: Location) -> Self {
        WireSegment { a, b }
    }

    /// Both endpoints of the segment.
    pub const fn endpoints(&self) -> [Location; 2] {
        [self.a, self.b]
    }

    /// True when the two segments share at least one endpoint.
    pub fn shares_end(&self, other: &WireSegment) -> bool {
        self.a == other.a || self.a == other.b || self.b == other.a || self.b == other.b
    }

    /// True when `loc` is one of the segment's endpoints.
    pub fn has_end(&self, loc: Location) -> bool {
        self.a == loc || self.b == loc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_share_an_endpoint() {
        let s1 = WireSegment::new(Location::new(0, 0), Location::new(10, 0));
        let s2 = WireSegment::new(Location::new(10, 0), Location::new(20, 0));
        let s3 = WireSegment::new(Location::new(50, 50), Location::new(60, 50));
        assert!(s1.shares_end(&s2));
        assert!(!s1.shares_end(&s3));
        assert!(s2.has_end(Location::new(20, 0)));
    }
}
