//! Geometry classifier
//!
//! Guesses what a stuck element is for from where it sits in the viewport.

use crate::config::ClassifierThresholds;
use crate::page::{Page, Viewport};
use fos_css::properties::Display;
use fos_dom::{DOMRect, NodeId};
use serde::{Deserialize, Serialize};

/// Semantic role of a stuck element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Header,
    Footer,
    Splash,
    Sidebar,
    /// Not rendered or zero-sized; reclassified on every pass
    Hidden,
    Widget,
}

impl ElementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Footer => "footer",
            Self::Splash => "splash",
            Self::Sidebar => "sidebar",
            Self::Hidden => "hidden",
            Self::Widget => "widget",
        }
    }
}

/// Visible length of `[low, high]` within `[0, max]`
#[inline]
fn clip(value: f64, low: f64, high: f64, max: f64) -> f64 {
    (value + low.min(0.0) + (max - high).min(0.0)).max(0.0)
}

/// Classify a box from its client rect and overflow size
pub fn classify(
    rect: &DOMRect,
    scroll_size: (f64, f64),
    viewport: Viewport,
    thresholds: &ClassifierThresholds,
) -> ElementType {
    let (vw, vh) = (viewport.width, viewport.height);
    let raw_width = if rect.width != 0.0 { rect.width } else { scroll_size.0 };
    let raw_height = if rect.height != 0.0 { rect.height } else { scroll_size.1 };
    let width = clip(raw_width, rect.left(), rect.right(), vw);
    let height = clip(raw_height, rect.top(), rect.bottom(), vh);

    let is_wide = width / vw > thresholds.wide;
    let is_thin = height / vh < thresholds.thin;
    let is_tall = height / vh > thresholds.tall;

    if is_wide && is_thin && rect.top() / vh < thresholds.top {
        ElementType::Header
    } else if is_wide && is_thin && rect.bottom() / vh > thresholds.bottom {
        ElementType::Footer
    } else if is_wide && is_tall {
        ElementType::Splash
    } else if is_tall && (rect.left() / vw < thresholds.side_left || rect.right() / vw > thresholds.side_right) {
        ElementType::Sidebar
    } else if width == 0.0 && height == 0.0 {
        ElementType::Hidden
    } else {
        ElementType::Widget
    }
}

/// Classify a live element. `display: none` is hidden whatever its box says.
pub fn classify_element(
    page: &Page,
    node: NodeId,
    excluding: Option<NodeId>,
    thresholds: &ClassifierThresholds,
) -> ElementType {
    if page.computed_style(node, excluding).display == Display::None {
        return ElementType::Hidden;
    }
    classify(
        &page.bounding_client_rect(node),
        page.scroll_size(node),
        page.viewport,
        thresholds,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_dom::ElementGeometry;

    fn run(x: f64, y: f64, w: f64, h: f64) -> ElementType {
        classify(
            &DOMRect::from_xywh(x, y, w, h),
            (w, h),
            Viewport::new(1000.0, 800.0),
            &ClassifierThresholds::default(),
        )
    }

    #[test]
    fn test_header_and_footer() {
        assert_eq!(run(0.0, 0.0, 1000.0, 60.0), ElementType::Header);
        assert_eq!(run(0.0, 740.0, 1000.0, 60.0), ElementType::Footer);
        // Wide and thin in the middle of the screen
        assert_eq!(run(0.0, 300.0, 1000.0, 60.0), ElementType::Widget);
    }

    #[test]
    fn test_splash_and_sidebar() {
        assert_eq!(run(0.0, 0.0, 1000.0, 800.0), ElementType::Splash);
        assert_eq!(run(0.0, 0.0, 200.0, 800.0), ElementType::Sidebar);
        assert_eq!(run(850.0, 0.0, 200.0, 800.0), ElementType::Sidebar);
        assert_eq!(run(400.0, 0.0, 200.0, 800.0), ElementType::Widget);
    }

    #[test]
    fn test_off_screen_is_hidden() {
        assert_eq!(run(0.0, 0.0, 0.0, 0.0), ElementType::Hidden);
        // Pushed out past the top-left corner
        assert_eq!(run(-400.0, -500.0, 300.0, 100.0), ElementType::Hidden);
        // Above the viewport but horizontally inside it still has a width
        assert_eq!(run(0.0, -500.0, 300.0, 100.0), ElementType::Widget);
    }

    #[test]
    fn test_zero_rect_uses_scroll_size() {
        let t = ClassifierThresholds::default();
        let kind = classify(
            &DOMRect::from_xywh(0.0, 0.0, 0.0, 0.0),
            (1000.0, 60.0),
            Viewport::new(1000.0, 800.0),
            &t,
        );
        assert_eq!(kind, ElementType::Header);
    }

    #[test]
    fn test_live_element_falls_back_to_overflow_size() {
        let html = r#"<div id="bar" style="position: fixed">Menu</div><div id="gone" style="display: none">x</div>"#;
        let mut page = Page::from_html(html, "https://example.com/", Viewport::new(1000.0, 800.0)).unwrap();
        let t = ClassifierThresholds::default();
        let bar = page.query_selector_all("#bar").unwrap()[0];
        page.set_geometry(bar, ElementGeometry::at(0.0, 0.0, 0.0, 0.0).with_scroll_size(1000.0, 60.0));
        assert_eq!(classify_element(&page, bar, None, &t), ElementType::Header);

        let gone = page.query_selector_all("#gone").unwrap()[0];
        page.set_geometry(gone, ElementGeometry::at(0.0, 0.0, 1000.0, 800.0));
        assert_eq!(classify_element(&page, gone, None, &t), ElementType::Hidden);
    }

    #[test]
    fn test_partially_visible_is_clipped() {
        // 400px tall but only 100px inside the viewport: thin, at the top
        assert_eq!(run(0.0, -300.0, 1000.0, 400.0), ElementType::Header);
    }

    #[test]
    fn test_classification_is_pure() {
        let a = run(10.0, 10.0, 300.0, 300.0);
        let b = run(10.0, 10.0, 300.0, 300.0);
        assert_eq!(a, b);
    }
}
