//! CSS Object Model
//!
//! `document.styleSheets` and `CSSStyleSheet`: per-owner-node sheets built
//! from `<style>` text and loaded `<link rel=stylesheet>` resources, with the
//! origin-clean flag gating rule access.

use crate::{CssError, CssParser, CssRule, Stylesheet};
use fos_dom::{Document, NodeId};
use std::collections::HashMap;
use url::Url;

/// A stylesheet response delivered by the network layer
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedResource {
    pub text: String,
    /// Response was fetched in CORS mode and passed the check
    pub cors: bool,
}

/// CSSStyleSheet
#[derive(Debug, Clone)]
pub struct CssStyleSheet {
    owner: NodeId,
    href: Option<String>,
    origin_clean: bool,
    /// Disabled sheets keep their rules but take no part in the cascade
    pub disabled: bool,
    sheet: Stylesheet,
    /// `<style>` text the rules were last parsed from
    source: String,
}

impl CssStyleSheet {
    /// Sheet owned by a `<style>` element
    pub fn from_style(owner: NodeId, text: &str) -> Self {
        Self {
            owner,
            href: None,
            origin_clean: true,
            disabled: false,
            sheet: parse_or_empty(text),
            source: text.to_string(),
        }
    }

    /// Sheet owned by a `<link>` element
    pub fn from_link(owner: NodeId, href: &str, text: &str, origin_clean: bool) -> Self {
        Self {
            owner,
            href: Some(href.to_string()),
            origin_clean,
            disabled: false,
            sheet: parse_or_empty(text),
            source: String::new(),
        }
    }

    /// Owner node (`<style>` or `<link>`)
    pub fn owner_node(&self) -> NodeId {
        self.owner
    }

    /// Absolute URL for linked sheets
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    fn check_access(&self) -> Result<(), CssError> {
        if self.origin_clean {
            Ok(())
        } else {
            Err(CssError::Security {
                href: self.href.clone().unwrap_or_default(),
            })
        }
    }

    /// `cssRules`
    pub fn css_rules(&self) -> Result<&[CssRule], CssError> {
        self.check_access()?;
        Ok(&self.sheet.rules)
    }

    /// `cssRules.length`
    pub fn rule_count(&self) -> Result<usize, CssError> {
        self.css_rules().map(<[CssRule]>::len)
    }

    /// `insertRule(text, index)`
    pub fn insert_rule(&mut self, text: &str, index: usize) -> Result<usize, CssError> {
        self.check_access()?;
        let len = self.sheet.rules.len();
        if index > len {
            return Err(CssError::IndexSize { index, len });
        }
        let rule = CssParser::new().parse_rule(text)?;
        self.sheet.rules.insert(index, rule);
        Ok(index)
    }

    /// `deleteRule(index)`
    pub fn delete_rule(&mut self, index: usize) -> Result<(), CssError> {
        self.check_access()?;
        let len = self.sheet.rules.len();
        if index >= len {
            return Err(CssError::IndexSize { index, len });
        }
        self.sheet.rules.remove(index);
        Ok(())
    }

    /// Parsed contents for the cascade, which ignores the origin check
    pub fn contents(&self) -> &Stylesheet {
        &self.sheet
    }
}

fn parse_or_empty(text: &str) -> Stylesheet {
    CssParser::new().parse(text).unwrap_or_else(|e| {
        tracing::warn!("Dropping unparsable stylesheet: {}", e);
        Stylesheet::default()
    })
}

/// `document.styleSheets`, in document order
#[derive(Debug, Clone, Default)]
pub struct StyleSheetList {
    sheets: Vec<CssStyleSheet>,
}

impl StyleSheetList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the list in line with the document's `<style>` and `<link>` elements.
    ///
    /// Sheets are kept across calls while their owner's text (or href) is
    /// unchanged, so `insert_rule` edits and the disabled flag survive.
    /// Linked sheets appear once their resource is in `resources`.
    pub fn sync(&mut self, doc: &Document, resources: &HashMap<String, LinkedResource>) {
        let base = Url::parse(doc.url()).ok();
        let mut previous: HashMap<NodeId, CssStyleSheet> =
            self.sheets.drain(..).map(|s| (s.owner, s)).collect();

        for node in doc.elements() {
            let Some(element) = doc.tree.element(node) else {
                continue;
            };
            match element.tag.as_str() {
                "style" => {
                    let text = doc.tree.text_content(node);
                    let sheet = match previous.remove(&node) {
                        Some(sheet) if sheet.href.is_none() && sheet.source == text => sheet,
                        prev => {
                            tracing::trace!("Parsing <style> {}", node);
                            let mut sheet = CssStyleSheet::from_style(node, &text);
                            sheet.disabled = prev.is_some_and(|p| p.disabled);
                            sheet
                        }
                    };
                    self.sheets.push(sheet);
                }
                "link" if is_stylesheet_link(element.get_attr("rel")) => {
                    let Some(href) = element.get_attr("href").and_then(|h| resolve(base.as_ref(), h)) else {
                        continue;
                    };
                    let Some(resource) = resources.get(href.as_str()) else {
                        continue;
                    };
                    let sheet = match previous.remove(&node) {
                        Some(sheet) if sheet.href() == Some(href.as_str()) => sheet,
                        prev => {
                            let same_origin = base.as_ref().is_some_and(|b| b.origin() == href.origin());
                            let mut sheet = CssStyleSheet::from_link(
                                node,
                                href.as_str(),
                                &resource.text,
                                same_origin || resource.cors,
                            );
                            sheet.disabled = prev.is_some_and(|p| p.disabled);
                            sheet
                        }
                    };
                    self.sheets.push(sheet);
                }
                _ => {}
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CssStyleSheet> {
        self.sheets.iter()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Sheet owned by the given node
    pub fn get(&self, owner: NodeId) -> Option<&CssStyleSheet> {
        self.sheets.iter().find(|s| s.owner == owner)
    }

    pub fn get_mut(&mut self, owner: NodeId) -> Option<&mut CssStyleSheet> {
        self.sheets.iter_mut().find(|s| s.owner == owner)
    }
}

fn is_stylesheet_link(rel: Option<&str>) -> bool {
    rel.is_some_and(|rel| rel.split_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")))
}

fn resolve(base: Option<&Url>, href: &str) -> Option<Url> {
    match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}
