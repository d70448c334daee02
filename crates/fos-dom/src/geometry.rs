//! Geometry APIs
//!
//! DOMRect and the per-element layout box that `getBoundingClientRect`
//! reads from. There is no layout engine here: the embedder writes the
//! viewport-relative box into each element.

/// DOMRect - rectangle geometry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DOMRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DOMRect {
    /// Create with dimensions
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Top edge (same as y)
    pub fn top(&self) -> f64 {
        self.y
    }

    /// Right edge
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Left edge (same as x)
    pub fn left(&self) -> f64 {
        self.x
    }

    /// Area in square pixels
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Check if rects intersect
    pub fn intersects(&self, other: &DOMRect) -> bool {
        !(self.right() < other.x
            || self.x > other.right()
            || self.bottom() < other.y
            || self.y > other.bottom())
    }
}

/// Element geometry state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElementGeometry {
    /// Border box relative to the viewport
    pub client_rect: DOMRect,
    /// Content size including overflow (`scrollWidth`/`scrollHeight`)
    pub scroll_width: f64,
    pub scroll_height: f64,
    /// Whether the element generates a box at all
    pub rendered: bool,
}

impl ElementGeometry {
    /// A rendered box at the given viewport position
    pub fn at(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            client_rect: DOMRect::from_xywh(x, y, width, height),
            scroll_width: width,
            scroll_height: height,
            rendered: true,
        }
    }

    /// Override the overflow size
    pub fn with_scroll_size(mut self, width: f64, height: f64) -> Self {
        self.scroll_width = width;
        self.scroll_height = height;
        self
    }

    /// Get bounding client rect (zero rect when not rendered)
    pub fn bounding_client_rect(&self) -> DOMRect {
        if self.rendered {
            self.client_rect
        } else {
            DOMRect::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_rect() {
        let rect = DOMRect::from_xywh(10.0, 20.0, 100.0, 50.0);

        assert_eq!(rect.top(), 20.0);
        assert_eq!(rect.right(), 110.0);
        assert_eq!(rect.bottom(), 70.0);
        assert_eq!(rect.left(), 10.0);
        assert_eq!(rect.area(), 5000.0);
    }

    #[test]
    fn test_intersects() {
        let rect1 = DOMRect::from_xywh(0.0, 0.0, 100.0, 100.0);
        let rect2 = DOMRect::from_xywh(50.0, 50.0, 100.0, 100.0);
        let rect3 = DOMRect::from_xywh(200.0, 200.0, 50.0, 50.0);

        assert!(rect1.intersects(&rect2));
        assert!(!rect1.intersects(&rect3));
    }

    #[test]
    fn test_unrendered_box_is_zero() {
        let mut geometry = ElementGeometry::at(0.0, 0.0, 300.0, 40.0);
        assert_eq!(geometry.bounding_client_rect().height, 40.0);
        geometry.rendered = false;
        assert_eq!(geometry.bounding_client_rect(), DOMRect::default());
    }
}
