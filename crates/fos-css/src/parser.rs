//! CSS Parser using lightningcss
//!
//! Parses CSS stylesheets into our internal representation.

use crate::{ComplexSelector, CssError, CssRule, Declaration, GroupKind, GroupRule, Selector, StyleRule, Stylesheet};
use lightningcss::declaration::DeclarationBlock;
use lightningcss::properties::Property;
use lightningcss::rules::CssRule as LcssRule;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleAttribute, StyleSheet};
use lightningcss::traits::ToCss;

/// CSS Parser
pub struct CssParser;

impl CssParser {
    pub fn new() -> Self {
        Self
    }

    fn options<'i>() -> ParserOptions<'i> {
        ParserOptions {
            error_recovery: true,
            ..ParserOptions::default()
        }
    }

    /// Parse a CSS stylesheet. Invalid rules are dropped, like a browser does.
    pub fn parse(&self, css: &str) -> Result<Stylesheet, CssError> {
        let stylesheet = StyleSheet::parse(css, Self::options()).map_err(|e| CssError::ParseError {
            line: e.loc.as_ref().map(|l| l.line).unwrap_or(0),
            message: e.kind.to_string(),
        })?;

        Ok(Stylesheet {
            rules: self.convert_rules(&stylesheet.rules.0),
        })
    }

    /// Parse exactly one rule (`CSSStyleSheet.insertRule` input)
    pub fn parse_rule(&self, text: &str) -> Result<CssRule, CssError> {
        let mut sheet = self.parse(text)?;
        if sheet.rules.len() != 1 {
            return Err(CssError::ParseError {
                line: 0,
                message: format!("expected a single rule, found {}", sheet.rules.len()),
            });
        }
        Ok(sheet.rules.remove(0))
    }

    /// Parse the declarations of a `style` attribute
    pub fn parse_inline(&self, text: &str) -> Vec<Declaration> {
        match StyleAttribute::parse(text, Self::options()) {
            Ok(attr) => self.convert_declarations(&attr.declarations),
            Err(e) => {
                tracing::trace!("Ignoring invalid style attribute {:?}: {}", text, e.kind);
                Vec::new()
            }
        }
    }

    fn convert_rules<R>(&self, rules: &[LcssRule<'_, R>]) -> Vec<CssRule> {
        rules.iter().map(|rule| self.convert_rule(rule)).collect()
    }

    fn convert_rule<R>(&self, rule: &LcssRule<'_, R>) -> CssRule {
        match rule {
            LcssRule::Style(style_rule) => CssRule::Style(StyleRule {
                selectors: self.convert_selectors(&style_rule.selectors),
                declarations: self.convert_declarations(&style_rule.declarations),
            }),
            LcssRule::Media(media) => CssRule::Group(GroupRule {
                kind: GroupKind::Media,
                rules: self.convert_rules(&media.rules.0),
            }),
            LcssRule::Supports(supports) => CssRule::Group(GroupRule {
                kind: GroupKind::Supports,
                rules: self.convert_rules(&supports.rules.0),
            }),
            LcssRule::LayerBlock(layer) => CssRule::Group(GroupRule {
                kind: GroupKind::Layer,
                rules: self.convert_rules(&layer.rules.0),
            }),
            _ => CssRule::Other,
        }
    }

    fn convert_selectors(&self, selectors: &lightningcss::selector::SelectorList<'_>) -> Vec<Selector> {
        let text = match selectors.to_css_string(PrinterOptions::default()) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Failed to serialize selector list: {}", e);
                return Vec::new();
            }
        };

        split_top_level(&text)
            .into_iter()
            .map(|text| {
                let compiled = match ComplexSelector::parse(text) {
                    Ok(sel) => Some(sel),
                    Err(e) => {
                        tracing::trace!("Unsupported selector: {}", e);
                        None
                    }
                };
                Selector {
                    text: text.to_string(),
                    specificity: compiled.as_ref().map(ComplexSelector::specificity).unwrap_or_default(),
                    compiled,
                }
            })
            .collect()
    }

    fn convert_declarations(&self, declarations: &DeclarationBlock<'_>) -> Vec<Declaration> {
        let normal = declarations.declarations.iter().map(|p| (p, false));
        let important = declarations.important_declarations.iter().map(|p| (p, true));
        normal
            .chain(important)
            .filter_map(|(property, important)| self.convert_declaration(property, important))
            .collect()
    }

    fn convert_declaration(&self, property: &Property<'_>, important: bool) -> Option<Declaration> {
        let value = property.value_to_css_string(PrinterOptions::default()).ok()?;
        Some(Declaration {
            property: property.property_id().name().to_ascii_lowercase(),
            value,
            important,
        })
    }
}

impl Default for CssParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a selector list on commas outside parentheses, brackets and strings
pub fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let css = r#"
            .foo { display: block; }
            #bar { position: fixed; top: 0 }
        "#;

        let stylesheet = CssParser::new().parse(css).unwrap();
        assert_eq!(stylesheet.len(), 2);
        let rules = stylesheet.style_rules();
        let position = rules[1].declaration("position").unwrap();
        assert_eq!(position.value, "fixed");
        assert!(!position.important);
    }

    #[test]
    fn test_selector_list_split() {
        let stylesheet = CssParser::new()
            .parse(r#".a, .b:not(.c, .d), [data-x="1,2"] { color: red }"#)
            .unwrap();
        let rule = stylesheet.style_rules()[0];
        let texts: Vec<_> = rule.selectors.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0], ".a");
        assert!(rule.selectors.iter().all(|s| s.compiled.is_some()));
    }

    #[test]
    fn test_nested_groups() {
        let css = "@media (min-width: 10px) { @supports (display: grid) { .x { position: sticky } } }";
        let stylesheet = CssParser::new().parse(css).unwrap();
        assert_eq!(stylesheet.len(), 1);
        assert!(matches!(stylesheet.rules[0], CssRule::Group(GroupRule { kind: GroupKind::Media, .. })));
        assert_eq!(stylesheet.style_rules().len(), 1);
    }

    #[test]
    fn test_important_and_inline() {
        let stylesheet = CssParser::new()
            .parse(".x { position: fixed !important; position: static }")
            .unwrap();
        let decl = stylesheet.style_rules()[0].declaration("position").unwrap();
        assert!(decl.important);

        let inline = CssParser::new().parse_inline("position: fixed; top: 10px");
        assert_eq!(inline.len(), 2);
        assert_eq!(inline[1].property, "top");
    }

    #[test]
    fn test_parse_rule_requires_one() {
        assert!(CssParser::new().parse_rule(".a { opacity: 0 }").is_ok());
        assert!(CssParser::new().parse_rule(".a {} .b {}").is_err());
        assert!(CssParser::new().parse_rule("").is_err());
    }
}
