//! Host page model
//!
//! Everything the pipeline reads from or writes to the page: the DOM, its
//! stylesheets, the viewport and scroll position. The embedder feeds layout
//! results in through [`Page::set_geometry`] and scroll telemetry through the
//! public fields.

use crate::error::Result;
use crate::messages::Location;
use fos_css::{ComputedStyle, CssError, CssStyleSheet, LinkedResource, SelectorList, StyleResolver, StyleSheetList};
use fos_dom::{DOMRect, Document, ElementGeometry, NodeId, ReadyState};
use std::collections::HashMap;
use url::Url;

/// Layout viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

/// A loaded page
#[derive(Debug)]
pub struct Page {
    doc: Document,
    sheets: StyleSheetList,
    resources: HashMap<String, LinkedResource>,
    pub viewport: Viewport,
    /// `window.scrollY`
    pub scroll_y: f64,
    /// Height of the document content
    pub content_height: f64,
    /// `document.hidden`
    pub hidden: bool,
    /// False inside iframes
    pub top_level: bool,
}

impl Page {
    pub fn new(doc: Document, viewport: Viewport) -> Self {
        let mut page = Self {
            doc,
            sheets: StyleSheetList::new(),
            resources: HashMap::new(),
            viewport,
            scroll_y: 0.0,
            content_height: viewport.height,
            hidden: false,
            top_level: true,
        };
        page.sync_stylesheets();
        page
    }

    /// Parse markup into a page
    pub fn from_html(html: &str, url: &str, viewport: Viewport) -> Result<Self> {
        let doc = fos_html::HtmlParser::new().parse_with_url(html, url)?;
        Ok(Self::new(doc, viewport))
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutate the DOM; stylesheets are re-synced afterwards
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = f(&mut self.doc);
        self.sync_stylesheets();
        result
    }

    pub fn url(&self) -> &str {
        self.doc.url()
    }

    /// Base URI for resolving stylesheet hrefs (`<base href>` wins over the URL)
    pub fn base_uri(&self) -> String {
        let base_href = self
            .doc
            .elements()
            .filter_map(|n| self.doc.tree.element(n))
            .find(|e| e.tag == "base" && e.has_attr("href"))
            .and_then(|e| e.get_attr("href"));
        match (base_href, Url::parse(self.doc.url())) {
            (Some(href), Ok(url)) => url.join(href).map(String::from).unwrap_or_else(|_| url.into()),
            (Some(href), Err(_)) => href.to_string(),
            (None, _) => self.doc.url().to_string(),
        }
    }

    pub fn location(&self) -> Location {
        Location::from_url(self.doc.url())
    }

    pub fn ready_state(&self) -> ReadyState {
        self.doc.ready_state
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.doc.ready_state = state;
    }

    /// Deliver a `<link>` stylesheet response from the network layer
    pub fn provide_stylesheet(&mut self, href: &str, resource: LinkedResource) {
        self.resources.insert(href.to_string(), resource);
        self.sync_stylesheets();
    }

    pub fn sync_stylesheets(&mut self) {
        self.sheets.sync(&self.doc, &self.resources);
    }

    /// `document.styleSheets`
    pub fn style_sheets(&self) -> &StyleSheetList {
        &self.sheets
    }

    pub fn style_sheet_mut(&mut self, owner: NodeId) -> Option<&mut CssStyleSheet> {
        self.sheets.get_mut(owner)
    }

    pub fn query_selector_all(&self, selectors: &str) -> std::result::Result<Vec<NodeId>, CssError> {
        let list = SelectorList::parse(selectors)?;
        Ok(self.query_selector_list(&list))
    }

    pub fn query_selector_list(&self, list: &SelectorList) -> Vec<NodeId> {
        fos_css::query_selector_all(&self.doc, list)
    }

    /// Whether the node is still attached
    pub fn contains(&self, node: NodeId) -> bool {
        self.doc.contains(node)
    }

    /// Computed style, leaving out the sheet owned by `excluding`
    pub fn computed_style(&self, node: NodeId, excluding: Option<NodeId>) -> ComputedStyle {
        let mut resolver = StyleResolver::new();
        for sheet in self.sheets.iter() {
            if sheet.disabled || Some(sheet.owner_node()) == excluding {
                continue;
            }
            resolver.add_stylesheet(sheet.contents());
        }
        resolver.compute_style(&self.doc, node)
    }

    /// Record layout results for an element
    pub fn set_geometry(&mut self, node: NodeId, geometry: ElementGeometry) {
        if let Some(element) = self.doc.tree.element_mut(node) {
            element.geometry = geometry;
        }
    }

    pub fn geometry(&self, node: NodeId) -> ElementGeometry {
        self.doc
            .tree
            .element(node)
            .map(|e| e.geometry)
            .unwrap_or_default()
    }

    /// `getBoundingClientRect()`
    pub fn bounding_client_rect(&self, node: NodeId) -> DOMRect {
        self.geometry(node).bounding_client_rect()
    }

    /// `scrollWidth` / `scrollHeight`
    pub fn scroll_size(&self, node: NodeId) -> (f64, f64) {
        let geometry = self.geometry(node);
        (geometry.scroll_width, geometry.scroll_height)
    }

    /// Document scroll height, never shorter than the viewport
    pub fn document_height(&self) -> f64 {
        self.content_height.max(self.viewport.height)
    }

    /// Append an empty `<style>` to `<head>` and return it
    pub fn create_style_element(&mut self) -> Result<NodeId> {
        let style = self.doc.create_element("style");
        self.doc.append_to_head(style)?;
        self.sync_stylesheets();
        Ok(style)
    }

    /// Detach a node; a detached node is left alone
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        if self.doc.tree.parent(node).is_some() {
            self.doc.tree.remove(node)?;
            self.sync_stylesheets();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_css::properties::Position;

    const HTML: &str = r#"<html><head><style>.bar { position: fixed }</style></head>
        <body><div class="bar">x</div></body></html>"#;

    #[test]
    fn test_computed_style_excluding_sheet() {
        let mut page = Page::from_html(HTML, "https://example.com/", Viewport::default()).unwrap();
        let bar = page.query_selector_all(".bar").unwrap()[0];
        assert_eq!(page.computed_style(bar, None).position, Position::Fixed);

        let style = page.create_style_element().unwrap();
        page.style_sheet_mut(style)
            .unwrap()
            .insert_rule(".bar { position: relative !important }", 0)
            .unwrap();
        assert_eq!(page.computed_style(bar, None).position, Position::Relative);
        assert_eq!(page.computed_style(bar, Some(style)).position, Position::Fixed);

        page.style_sheet_mut(style).unwrap().disabled = true;
        assert_eq!(page.computed_style(bar, None).position, Position::Fixed);
    }

    #[test]
    fn test_remove_style_element() {
        let mut page = Page::from_html(HTML, "https://example.com/", Viewport::default()).unwrap();
        let style = page.create_style_element().unwrap();
        assert_eq!(page.style_sheets().len(), 2);
        page.remove_node(style).unwrap();
        assert!(!page.contains(style));
        assert_eq!(page.style_sheets().len(), 1);
        page.remove_node(style).unwrap();
    }

    #[test]
    fn test_base_uri() {
        let page = Page::from_html(
            r#"<html><head><base href="/static/"></head><body></body></html>"#,
            "https://example.com/a/b",
            Viewport::default(),
        )
        .unwrap();
        assert_eq!(page.base_uri(), "https://example.com/static/");
    }

    #[test]
    fn test_document_height_at_least_viewport() {
        let mut page = Page::new(Document::new("about:blank"), Viewport::new(800.0, 600.0));
        page.content_height = 100.0;
        assert_eq!(page.document_height(), 600.0);
        page.content_height = 3000.0;
        assert_eq!(page.document_height(), 3000.0);
    }
}
