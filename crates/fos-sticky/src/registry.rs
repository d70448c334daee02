//! Sticky registry
//!
//! Candidates are keyed by element handle. Entries are never dropped: an
//! element that leaves the document is marked removed and may be recovered
//! later through its selector.

use crate::classify::{classify_element, ElementType};
use crate::config::ClassifierThresholds;
use crate::explorer::SelectorSets;
use crate::page::Page;
use crate::selector_gen::unique_selector;
use fos_css::properties::Position;
use fos_dom::NodeId;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Live positioning of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixStatus {
    Fixed,
    Sticky,
    Unfixed,
    Removed,
}

impl FixStatus {
    fn from_position(position: Position) -> Self {
        match position {
            Position::Fixed => Self::Fixed,
            Position::Sticky => Self::Sticky,
            _ => Self::Unfixed,
        }
    }
}

/// An element found through a fixed/sticky selector
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateElement {
    pub element: NodeId,
    pub element_type: ElementType,
    pub selector: String,
    pub status: FixStatus,
}

#[derive(Debug, Default)]
pub struct StickyRegistry {
    candidates: Vec<CandidateElement>,
    by_element: HashMap<NodeId, usize>,
}

impl StickyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidates(&self) -> &[CandidateElement] {
        &self.candidates
    }

    pub fn get(&self, element: NodeId) -> Option<&CandidateElement> {
        self.by_element.get(&element).map(|&i| &self.candidates[i])
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Track every element matched by the selector sets. Returns how many
    /// candidates were added.
    pub fn explore_stickies(
        &mut self,
        page: &Page,
        selectors: &SelectorSets,
        own_sheet: Option<NodeId>,
        thresholds: &ClassifierThresholds,
    ) -> usize {
        let doc = page.document();
        let found: Vec<NodeId> = doc
            .elements()
            .filter(|n| !self.by_element.contains_key(n))
            .filter(|&n| selectors.matches(doc, n))
            .collect();

        for &element in &found {
            let candidate = CandidateElement {
                element,
                element_type: classify_element(page, element, own_sheet, thresholds),
                selector: unique_selector(page, element),
                status: FixStatus::from_position(page.computed_style(element, own_sheet).position),
            };
            debug!(
                "New candidate {} {} as {} ({:?})",
                element,
                candidate.selector,
                candidate.element_type.as_str(),
                candidate.status
            );
            self.by_element.insert(element, self.candidates.len());
            self.candidates.push(candidate);
        }
        found.len()
    }

    /// Reconcile every candidate with the current page. Returns whether
    /// anything the rules depend on changed. Running it twice on an
    /// unchanged page changes nothing the second time.
    pub fn review(&mut self, page: &Page, own_sheet: Option<NodeId>, thresholds: &ClassifierThresholds) -> bool {
        let mut changed = false;

        for i in 0..self.candidates.len() {
            let candidate = &self.candidates[i];
            let mut element = candidate.element;
            let mut in_document = page.contains(element);
            let matches = page.query_selector_all(&candidate.selector).unwrap_or_default();
            let mut selector = None;

            if in_document && matches.as_slice() != [element] {
                selector = Some(unique_selector(page, element));
            } else if !in_document {
                if let [adopted] = matches.as_slice() {
                    match self.by_element.get(adopted) {
                        Some(&other) if other != i => {
                            warn!(
                                "Selector {} of {} now resolves to {}, already tracked",
                                candidate.selector, element, adopted
                            );
                        }
                        _ => {
                            debug!("Recovered {} as {} via {}", element, adopted, candidate.selector);
                            element = *adopted;
                            in_document = true;
                        }
                    }
                }
            }

            let element_type = if in_document && candidate.element_type == ElementType::Hidden {
                classify_element(page, element, own_sheet, thresholds)
            } else {
                candidate.element_type
            };
            let status = if in_document {
                FixStatus::from_position(page.computed_style(element, own_sheet).position)
            } else {
                FixStatus::Removed
            };

            let candidate = &mut self.candidates[i];
            if element != candidate.element {
                self.by_element.remove(&candidate.element);
                self.by_element.insert(element, i);
                candidate.element = element;
                changed = true;
            }
            if let Some(selector) = selector {
                if selector != candidate.selector {
                    candidate.selector = selector;
                    changed = true;
                }
            }
            if element_type != candidate.element_type {
                candidate.element_type = element_type;
                changed = true;
            }
            if status != candidate.status {
                candidate.status = status;
                changed = true;
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::{Exploration, SelectorDescription, StickyPosition};
    use crate::page::Viewport;
    use fos_dom::ElementGeometry;

    const HTML: &str = r#"<html><head><style>
        .hdr { position: fixed }
        .side { position: sticky }
        </style></head><body>
        <div class="hdr">header</div>
        <div class="side">toc</div>
        <div style="position: FIXED">inline</div>
        <div class="plain">plain</div>
        </body></html>"#;

    fn setup() -> (Page, Exploration) {
        let mut page = Page::from_html(HTML, "https://example.com/", Viewport::new(1000.0, 800.0)).unwrap();
        let hdr = page.query_selector_all(".hdr").unwrap()[0];
        page.set_geometry(hdr, ElementGeometry::at(0.0, 0.0, 1000.0, 60.0));
        let mut exploration = Exploration::new();
        for result in exploration.explore_stylesheets(&page, None) {
            if let crate::messages::SheetOutcome::Success { selectors } = &result.outcome {
                exploration.record_selectors(selectors);
            }
        }
        (page, exploration)
    }

    #[test]
    fn test_explore_stickies() {
        let (page, exploration) = setup();
        let t = ClassifierThresholds::default();
        let mut registry = StickyRegistry::new();
        assert_eq!(registry.explore_stickies(&page, &exploration.selectors, None, &t), 3);
        assert_eq!(registry.explore_stickies(&page, &exploration.selectors, None, &t), 0);

        let hdr = page.query_selector_all(".hdr").unwrap()[0];
        let candidate = registry.get(hdr).unwrap();
        assert_eq!(candidate.element_type, ElementType::Header);
        assert_eq!(candidate.status, FixStatus::Fixed);

        let side = page.query_selector_all(".side").unwrap()[0];
        assert_eq!(registry.get(side).unwrap().status, FixStatus::Sticky);
        // No geometry assigned
        assert_eq!(registry.get(side).unwrap().element_type, ElementType::Hidden);
    }

    #[test]
    fn test_review_is_idempotent() {
        let (mut page, exploration) = setup();
        let t = ClassifierThresholds::default();
        let mut registry = StickyRegistry::new();
        registry.explore_stickies(&page, &exploration.selectors, None, &t);
        assert!(!registry.review(&page, None, &t));

        let side = page.query_selector_all(".side").unwrap()[0];
        page.set_geometry(side, ElementGeometry::at(0.0, 0.0, 200.0, 800.0));
        assert!(registry.review(&page, None, &t));
        assert_eq!(registry.get(side).unwrap().element_type, ElementType::Sidebar);
        assert!(!registry.review(&page, None, &t));

        // A reclassified element is not put back to hidden
        page.set_geometry(side, ElementGeometry::default());
        assert!(!registry.review(&page, None, &t));
        assert_eq!(registry.get(side).unwrap().element_type, ElementType::Sidebar);
    }

    #[test]
    fn test_removed_and_recovered() {
        let (mut page, exploration) = setup();
        let t = ClassifierThresholds::default();
        let mut registry = StickyRegistry::new();
        registry.explore_stickies(&page, &exploration.selectors, None, &t);

        let hdr = page.query_selector_all(".hdr").unwrap()[0];
        let selector = registry.get(hdr).unwrap().selector.clone();
        page.mutate(|doc| doc.tree.remove(hdr)).unwrap();
        assert!(registry.review(&page, None, &t));
        assert_eq!(registry.get(hdr).unwrap().status, FixStatus::Removed);
        assert!(!registry.review(&page, None, &t));

        // The page re-renders the same header
        let replacement = page.mutate(|doc| {
            let div = doc.create_element("div");
            doc.tree.set_attribute(div, "class", "hdr").unwrap();
            let body = doc.body().unwrap();
            let first = doc.tree.element_children(body).next().unwrap();
            doc.tree.insert_before(body, div, first).unwrap();
            div
        });
        assert!(crate::selector_gen::resolves_to(&page, &selector, replacement));
        assert!(registry.review(&page, None, &t));
        let recovered = registry.get(replacement).unwrap();
        assert_eq!(recovered.status, FixStatus::Fixed);
        assert!(registry.get(hdr).is_none());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_status_follows_computed_position() {
        let (mut page, mut exploration) = setup();
        let t = ClassifierThresholds::default();
        exploration.record_selectors(&[SelectorDescription::new(".plain", StickyPosition::Fixed)]);
        let mut registry = StickyRegistry::new();
        registry.explore_stickies(&page, &exploration.selectors, None, &t);
        let plain = page.query_selector_all(".plain").unwrap()[0];
        assert_eq!(registry.get(plain).unwrap().status, FixStatus::Unfixed);

        page.mutate(|doc| doc.tree.set_attribute(plain, "style", "position: fixed")).unwrap();
        assert!(registry.review(&page, None, &t));
        assert_eq!(registry.get(plain).unwrap().status, FixStatus::Fixed);
    }
}
