//! Selector synthesizer
//!
//! Builds a selector that picks out exactly one element and survives the
//! usual page churn better than a bare structural path.

use crate::page::Page;
use fos_dom::{Document, NodeId};
use std::fmt::Write;

/// One `tag:nth-child(k)` step of the structural chain
struct Segment {
    node: NodeId,
    tag: String,
    /// 1-based element index, `None` for the document element
    nth: Option<usize>,
}

impl Segment {
    fn render(&self, classes: &[&str]) -> String {
        let mut out = self.tag.clone();
        // Doubled to outweigh the page's own class selectors
        for _ in 0..2 {
            for class in classes {
                out.push('.');
                out.push_str(&escape_ident(class));
            }
        }
        if let Some(nth) = self.nth {
            let _ = write!(out, ":nth-child({nth})");
        }
        out
    }
}

/// Selector for `node` that resolves to it alone
pub fn unique_selector(page: &Page, node: NodeId) -> String {
    let doc = page.document();
    let chain = structural_chain(doc, node);
    let plain = join(chain.iter().map(|s| s.render(&[])));

    if let Some(stable) = stabilize(doc, &chain) {
        if resolves_to(page, &stable, node) {
            return stable;
        }
        tracing::debug!("Selector {} is ambiguous for {}, falling back to {}", stable, node, plain);
    }
    plain
}

/// Whether `selector` matches `node` and nothing else
pub fn resolves_to(page: &Page, selector: &str, node: NodeId) -> bool {
    matches!(page.query_selector_all(selector).as_deref(), Ok([only]) if *only == node)
}

fn structural_chain(doc: &Document, node: NodeId) -> Vec<Segment> {
    let tree = doc.tree();
    let mut chain = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        let Some(element) = tree.element(id) else {
            break;
        };
        let parent = tree.parent_element(id);
        chain.push(Segment {
            node: id,
            tag: element.tag.clone(),
            nth: parent.map(|_| tree.element_index(id)),
        });
        current = parent;
    }
    chain.reverse();
    chain
}

fn stabilize(doc: &Document, chain: &[Segment]) -> Option<String> {
    let tree = doc.tree();

    for (i, segment) in chain.iter().enumerate().rev() {
        let Some(id) = tree.element(segment.node).and_then(|e| e.id()) else {
            continue;
        };
        if is_stable_id(id) && is_unique_id(doc, id) {
            let anchor = format!("#{id}#{id}");
            let rest = chain[i + 1..].iter().map(|s| s.render(&[]));
            return Some(join(std::iter::once(anchor).chain(rest)));
        }
    }

    let classed = chain
        .iter()
        .rposition(|s| tree.element(s.node).is_some_and(|e| e.classes().next().is_some()))?;
    Some(join(chain.iter().enumerate().map(|(i, segment)| {
        if i == classed {
            let classes: Vec<&str> = tree
                .element(segment.node)
                .map(|e| e.classes().collect())
                .unwrap_or_default();
            segment.render(&classes)
        } else {
            segment.render(&[])
        }
    })))
}

/// Ids that look hand-written rather than generated per page load
fn is_stable_id(id: &str) -> bool {
    let mut chars = id.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_with_letter
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && id.chars().filter(char::is_ascii_digit).count() < 4
}

fn is_unique_id(doc: &Document, id: &str) -> bool {
    doc.elements()
        .filter(|&n| doc.tree().element(n).and_then(|e| e.id()) == Some(id))
        .take(2)
        .count()
        == 1
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(" > ")
}

/// Escape an identifier for use in a selector (`CSS.escape`)
pub fn escape_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for (i, c) in ident.chars().enumerate() {
        match c {
            'a'..='z' | 'A'..='Z' | '_' | '-' => out.push(c),
            '0'..='9' if i > 0 => out.push(c),
            c if !c.is_ascii() => out.push(c),
            c if c.is_ascii_digit() || c.is_ascii_control() => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Viewport;

    fn page(body: &str) -> Page {
        let html = format!("<html><head></head><body>{body}</body></html>");
        Page::from_html(&html, "https://example.com/", Viewport::default()).unwrap()
    }

    fn find(page: &Page, sel: &str) -> NodeId {
        page.query_selector_all(sel).unwrap()[0]
    }

    #[test]
    fn test_structural_chain() {
        let page = page("<div></div><div><span></span><span></span></div>");
        let span = find(&page, "span + span");
        let selector = unique_selector(&page, span);
        assert_eq!(selector, "html > body:nth-child(2) > div:nth-child(2) > span:nth-child(2)");
        assert!(resolves_to(&page, &selector, span));
    }

    #[test]
    fn test_anchors_on_ancestor_id() {
        let page = page(r#"<div id="top-bar"><nav><a></a></nav></div>"#);
        let nav = find(&page, "nav");
        assert_eq!(unique_selector(&page, nav), "#top-bar#top-bar > nav:nth-child(1)");
        let bar = find(&page, "#top-bar");
        assert_eq!(unique_selector(&page, bar), "#top-bar#top-bar");
    }

    #[test]
    fn test_generated_and_duplicate_ids_are_skipped() {
        let page = page(
            r#"<div id="ember12345"><p class="note"></p></div><div id="dup"></div><div id="dup"></div>"#,
        );
        let p = find(&page, "p");
        let selector = unique_selector(&page, p);
        assert_eq!(selector, "html > body:nth-child(2) > div:nth-child(1) > p.note.note:nth-child(1)");

        let dup = find(&page, "#dup");
        assert!(!unique_selector(&page, dup).starts_with("#dup"));
    }

    #[test]
    fn test_escaped_classes() {
        let page = page(r#"<div class="md:fixed 2col"></div>"#);
        let div = find(&page, "div");
        let selector = unique_selector(&page, div);
        assert!(selector.contains(r"md\:fixed"));
        assert!(resolves_to(&page, &selector, div));
    }

    #[test]
    fn test_escape_ident() {
        assert_eq!(escape_ident("nav-bar_1"), "nav-bar_1");
        assert_eq!(escape_ident("1a"), r"\31 a");
        assert_eq!(escape_ident("a.b"), r"a\.b");
    }
}
