//! fOS CSS Parser & Style System
//!
//! Stylesheet parsing (lightningcss), selector matching, a small cascade
//! for the positioning properties and a CSSOM layer with origin checks.

mod parser;
mod cascade;
mod cssom;
pub mod properties;
pub mod selectors;

pub use parser::{split_top_level, CssParser};
pub use cascade::{ComputedStyle, StyleResolver};
pub use cssom::{CssStyleSheet, LinkedResource, StyleSheetList};
pub use selectors::{query_selector_all, ComplexSelector, PseudoElement, SelectorList};

/// Parse a CSS stylesheet
pub fn parse_stylesheet(css: &str) -> Result<Stylesheet, CssError> {
    CssParser::new().parse(css)
}

/// Parsed stylesheet
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub rules: Vec<CssRule>,
}

impl Stylesheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All style rules, descending into grouping rules
    pub fn style_rules(&self) -> Vec<&StyleRule> {
        let mut out = Vec::new();
        collect_style_rules(&self.rules, &mut out);
        out
    }
}

fn collect_style_rules<'a>(rules: &'a [CssRule], out: &mut Vec<&'a StyleRule>) {
    for rule in rules {
        match rule {
            CssRule::Style(style) => out.push(style),
            CssRule::Group(group) => collect_style_rules(&group.rules, out),
            CssRule::Other => {}
        }
    }
}

/// CSS rule
#[derive(Debug, Clone)]
pub enum CssRule {
    Style(StyleRule),
    /// `@media`, `@supports` or `@layer` block
    Group(GroupRule),
    /// Any other at-rule (`@import`, `@font-face`, `@keyframes`, ...)
    Other,
}

/// Selector list plus declaration block
#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
}

impl StyleRule {
    /// The winning declaration of a property within this rule
    pub fn declaration(&self, property: &str) -> Option<&Declaration> {
        self.declarations
            .iter()
            .filter(|d| d.property == property)
            .max_by_key(|d| d.important)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Media,
    Supports,
    Layer,
}

/// Conditional or layered block of rules
#[derive(Debug, Clone)]
pub struct GroupRule {
    pub kind: GroupKind,
    pub rules: Vec<CssRule>,
}

/// CSS selector
#[derive(Debug, Clone)]
pub struct Selector {
    /// Serialized selector text
    pub text: String,
    pub specificity: Specificity,
    /// `None` when the matcher does not support the syntax
    pub compiled: Option<ComplexSelector>,
}

/// Selector specificity (a, b, c)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity(pub u32, pub u32, pub u32);

/// CSS declaration (property: value)
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Lowercased property name
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// CSS error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CssError {
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: u32, message: String },
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    /// Rule access on a sheet that is not origin-clean
    #[error("cannot access rules of cross-origin stylesheet {href}")]
    Security { href: String },
    #[error("index {index} is out of range for {len} rules")]
    IndexSize { index: usize, len: usize },
}
