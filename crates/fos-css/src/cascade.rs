//! Style Cascade & Resolver
//!
//! Computes the final styles for DOM elements by:
//! 1. Matching selectors against elements
//! 2. Sorting by importance, origin (inline beats sheets), specificity and source order
//! 3. Applying the winning declarations

use crate::properties::{Display, Position};
use crate::{CssParser, Declaration, Specificity, Stylesheet};
use fos_dom::{Document, NodeId};

/// Resolved values of the properties the sticky detection depends on
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputedStyle {
    pub display: Display,
    pub position: Position,
    /// Raw `top` value, if any declaration set it
    pub top: Option<String>,
}

impl ComputedStyle {
    fn apply_declaration(&mut self, decl: &Declaration) {
        match decl.property.as_str() {
            "display" => self.display = Display::parse(&decl.value),
            "position" => self.position = Position::parse(&decl.value).unwrap_or_default(),
            "top" => self.top = Some(decl.value.clone()),
            _ => {}
        }
    }
}

/// Sort key of a matched declaration
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Precedence {
    important: bool,
    inline: bool,
    specificity: Specificity,
    order: usize,
}

/// Style resolver - computes styles for DOM elements
#[derive(Default)]
pub struct StyleResolver<'a> {
    /// Author stylesheets in document order
    author_styles: Vec<&'a Stylesheet>,
}

impl<'a> StyleResolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an author stylesheet
    pub fn add_stylesheet(&mut self, stylesheet: &'a Stylesheet) {
        self.author_styles.push(stylesheet);
    }

    /// Compute styles for an element. Conditional group rules always apply.
    pub fn compute_style(&self, doc: &Document, node: NodeId) -> ComputedStyle {
        let mut style = ComputedStyle::default();
        let Some(element) = doc.tree.element(node) else {
            return style;
        };
        style.display = Display::for_tag(&element.tag);

        let mut matches: Vec<(Precedence, Declaration)> = Vec::new();
        let mut order = 0;

        for stylesheet in &self.author_styles {
            for rule in stylesheet.style_rules() {
                order += 1;
                let specificity = rule
                    .selectors
                    .iter()
                    .filter_map(|s| s.compiled.as_ref().map(|c| (c, s.specificity)))
                    .filter(|(c, _)| c.matches(doc, node))
                    .map(|(_, spec)| spec)
                    .max();
                let Some(specificity) = specificity else {
                    continue;
                };
                for decl in &rule.declarations {
                    let precedence = Precedence { important: decl.important, inline: false, specificity, order };
                    matches.push((precedence, decl.clone()));
                }
            }
        }

        if let Some(inline) = element.get_attr("style") {
            order += 1;
            for decl in CssParser::new().parse_inline(inline) {
                let precedence = Precedence {
                    important: decl.important,
                    inline: true,
                    specificity: Specificity::default(),
                    order,
                };
                matches.push((precedence, decl));
            }
        }

        // Stable sort keeps declaration order within a rule
        matches.sort_by_key(|(precedence, _)| *precedence);

        for (_, decl) in &matches {
            style.apply_declaration(decl);
        }

        style
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_dom::Document;

    fn doc_with_div(attrs: &[(&str, &str)]) -> (Document, NodeId) {
        let mut doc = Document::new("https://example.com/");
        let div = doc.create_element("div");
        for (name, value) in attrs {
            doc.tree.set_attribute(div, name, value).unwrap();
        }
        let body = doc.body().unwrap();
        doc.tree.append_child(body, div).unwrap();
        (doc, div)
    }

    #[test]
    fn test_specificity_wins() {
        let (doc, div) = doc_with_div(&[("id", "nav"), ("class", "bar")]);
        let sheet = CssParser::new()
            .parse("#nav { position: fixed } .bar { position: static }")
            .unwrap();
        let mut resolver = StyleResolver::new();
        resolver.add_stylesheet(&sheet);
        assert_eq!(resolver.compute_style(&doc, div).position, Position::Fixed);
    }

    #[test]
    fn test_inline_and_important() {
        let (doc, div) = doc_with_div(&[("class", "bar"), ("style", "position: sticky; top: 10px")]);
        let sheet = CssParser::new().parse(".bar { position: fixed }").unwrap();
        let mut resolver = StyleResolver::new();
        resolver.add_stylesheet(&sheet);
        let style = resolver.compute_style(&doc, div);
        assert_eq!(style.position, Position::Sticky);
        assert!(style.top.is_some());

        let important = CssParser::new().parse(".bar { position: fixed !important }").unwrap();
        resolver.add_stylesheet(&important);
        assert_eq!(resolver.compute_style(&doc, div).position, Position::Fixed);
    }

    #[test]
    fn test_media_rules_apply_and_display_defaults() {
        let (doc, div) = doc_with_div(&[("class", "x")]);
        let sheet = CssParser::new()
            .parse("@media print { .x { display: none } }")
            .unwrap();
        let mut resolver = StyleResolver::new();
        assert_eq!(resolver.compute_style(&doc, div).display, Display::Block);
        resolver.add_stylesheet(&sheet);
        assert_eq!(resolver.compute_style(&doc, div).display, Display::None);
    }
}
