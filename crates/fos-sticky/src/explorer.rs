//! Stylesheet explorer
//!
//! Walks the page's stylesheets for rules that pin elements to the viewport.
//! Sheets the page may not read (cross-origin without CORS) are handed to the
//! service for a delegated fetch and resume through [`Exploration::on_sheet_explored`].

use crate::messages::{ExploreSheet, SheetExplored, SheetOutcome};
use crate::page::Page;
use fos_css::properties::Position;
use fos_css::selectors::split_pseudo_element;
use fos_css::{ComplexSelector, CssRule};
use fos_dom::{Document, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

/// Inline-style selectors every page starts with
pub const INLINE_FIXED_SELECTOR: &str = r#"*[style*="fixed" i]"#;
pub const INLINE_STICKY_SELECTOR: &str = r#"*[style*="sticky" i]"#;

/// Positioning a selector was found with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StickyPosition {
    Fixed,
    Sticky,
    Other,
}

impl StickyPosition {
    fn from_position(position: Position) -> Self {
        match position {
            Position::Fixed => Self::Fixed,
            Position::Sticky => Self::Sticky,
            _ => Self::Other,
        }
    }
}

/// A selector whose rule declares fixed or sticky positioning
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorDescription {
    /// Selector without its pseudo-element
    pub selector: String,
    pub position: StickyPosition,
    /// `before`, `after`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pseudo_element: Option<String>,
}

impl SelectorDescription {
    pub fn new(selector: impl Into<String>, position: StickyPosition) -> Self {
        Self { selector: selector.into(), position, pseudo_element: None }
    }

    pub fn with_pseudo_element(mut self, pseudo_element: impl Into<String>) -> Self {
        self.pseudo_element = Some(pseudo_element.into());
        self
    }
}

/// Extract fixed/sticky selectors from a rule list, descending into
/// `@media`, `@supports` and `@layer` blocks
pub fn describe_rules(rules: &[CssRule]) -> Vec<SelectorDescription> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk_rules(rules, &mut |description| {
        if seen.insert(description.clone()) {
            out.push(description);
        }
    });
    out
}

fn walk_rules(rules: &[CssRule], emit: &mut impl FnMut(SelectorDescription)) {
    for rule in rules {
        match rule {
            CssRule::Style(style) => {
                let Some(position) = style
                    .declaration("position")
                    .and_then(|d| Position::parse(&d.value))
                    .map(StickyPosition::from_position)
                else {
                    continue;
                };
                if position == StickyPosition::Other {
                    continue;
                }
                for selector in &style.selectors {
                    let Some(compiled) = &selector.compiled else {
                        trace!("Skipping unsupported selector {}", selector.text);
                        continue;
                    };
                    let description = match compiled.pseudo_element {
                        Some(pe) => {
                            let (base, _) = split_pseudo_element(&selector.text);
                            SelectorDescription::new(base, position).with_pseudo_element(pe.name())
                        }
                        None => SelectorDescription::new(selector.text.clone(), position),
                    };
                    emit(description);
                }
            }
            CssRule::Group(group) => walk_rules(&group.rules, emit),
            CssRule::Other => {}
        }
    }
}

/// Progress of a linked stylesheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetStatus {
    Unexplored,
    AwaitingDelegatedFetch,
    Success,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSheetRecord {
    pub status: SheetStatus,
    pub error: Option<String>,
}

/// A `<style>` sheet already looked at
#[derive(Debug, Clone)]
struct StylesheetRecord {
    owner: NodeId,
    rule_count: usize,
}

/// What newly recorded selectors require from the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorChanges {
    /// New element selectors: query the DOM again
    pub force_explore: bool,
    /// New pseudo-element selectors: regenerate the rules
    pub force_update: bool,
}

/// Accumulated selectors, per positioning kind
#[derive(Debug, Clone)]
pub struct SelectorSets {
    fixed: Vec<String>,
    sticky: Vec<String>,
    pseudo_elements: Vec<SelectorDescription>,
    seen: HashSet<SelectorDescription>,
    compiled: Vec<ComplexSelector>,
}

impl Default for SelectorSets {
    fn default() -> Self {
        let mut sets = Self {
            fixed: Vec::new(),
            sticky: Vec::new(),
            pseudo_elements: Vec::new(),
            seen: HashSet::new(),
            compiled: Vec::new(),
        };
        sets.add(SelectorDescription::new(INLINE_FIXED_SELECTOR, StickyPosition::Fixed));
        sets.add(SelectorDescription::new(INLINE_STICKY_SELECTOR, StickyPosition::Sticky));
        sets
    }
}

impl SelectorSets {
    pub fn fixed(&self) -> &[String] {
        &self.fixed
    }

    pub fn sticky(&self) -> &[String] {
        &self.sticky
    }

    pub fn pseudo_elements(&self) -> &[SelectorDescription] {
        &self.pseudo_elements
    }

    /// Whether any fixed or sticky selector matches the element
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.compiled.iter().any(|s| s.matches(doc, node))
    }

    fn add(&mut self, description: SelectorDescription) -> SelectorChanges {
        let mut changes = SelectorChanges::default();
        if description.position == StickyPosition::Other || !self.seen.insert(description.clone()) {
            return changes;
        }
        if description.pseudo_element.is_some() {
            self.pseudo_elements.push(description);
            changes.force_update = true;
            return changes;
        }
        match ComplexSelector::parse(&description.selector) {
            Ok(compiled) => self.compiled.push(compiled),
            Err(e) => {
                warn!("Ignoring selector {}: {}", description.selector, e);
                return changes;
            }
        }
        match description.position {
            StickyPosition::Fixed => self.fixed.push(description.selector),
            _ => self.sticky.push(description.selector),
        }
        changes.force_explore = true;
        changes
    }
}

/// Exploration bookkeeping for one page
#[derive(Debug, Default)]
pub struct Exploration {
    internal: Vec<StylesheetRecord>,
    external: HashMap<String, ExternalSheetRecord>,
    /// Owner nodes of every `<style>` sheet seen so far
    owners: HashSet<NodeId>,
    pub selectors: SelectorSets,
}

impl Exploration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect new sheets and `<style>` sheets whose rule count changed.
    /// The sheet owned by `own_sheet` is never looked at.
    pub fn explore_stylesheets(&mut self, page: &Page, own_sheet: Option<NodeId>) -> Vec<SheetExplored> {
        let sheets = page.style_sheets();
        let mut results = Vec::new();

        let owners = &mut self.owners;
        self.internal.retain_mut(|record| {
            if !page.contains(record.owner) {
                trace!("Pruning stylesheet record for {}", record.owner);
                owners.remove(&record.owner);
                return false;
            }
            let rules = sheets.get(record.owner).and_then(|s| s.css_rules().ok());
            if let Some(rules) = rules {
                if rules.len() != record.rule_count {
                    record.rule_count = rules.len();
                    results.push(SheetExplored::success(None, describe_rules(rules)));
                }
            }
            true
        });

        for sheet in sheets.iter() {
            let owner = sheet.owner_node();
            if Some(owner) == own_sheet {
                continue;
            }

            match sheet.href() {
                // Linked sheets are tracked by href; only unexplored ones are (re)tried
                Some(href) => {
                    let known = self.external.get(href).map(|r| r.status);
                    if known.is_some_and(|status| status != SheetStatus::Unexplored) {
                        continue;
                    }
                    self.external.insert(
                        href.to_string(),
                        ExternalSheetRecord { status: SheetStatus::Unexplored, error: None },
                    );
                    results.push(match sheet.css_rules() {
                        Ok(rules) => SheetExplored::success(Some(href.to_string()), describe_rules(rules)),
                        Err(e) => SheetExplored::fail(Some(href.to_string()), Some(page.base_uri()), e.to_string()),
                    });
                }
                None => {
                    if !self.owners.insert(owner) {
                        continue;
                    }
                    let rules = sheet.css_rules().unwrap_or_default();
                    self.internal.push(StylesheetRecord { owner, rule_count: rules.len() });
                    results.push(SheetExplored::success(None, describe_rules(rules)));
                }
            }
        }

        results
    }

    /// Add selectors to the accumulated sets
    pub fn record_selectors(&mut self, descriptions: &[SelectorDescription]) -> SelectorChanges {
        let mut changes = SelectorChanges::default();
        for description in descriptions {
            let change = self.selectors.add(description.clone());
            changes.force_explore |= change.force_explore;
            changes.force_update |= change.force_update;
        }
        changes
    }

    /// Advance the record of a linked sheet. A first failure asks for a
    /// delegated fetch; a failure after that is final.
    pub fn on_sheet_explored(&mut self, result: &SheetExplored) -> Option<ExploreSheet> {
        let href = result.href.as_ref()?;
        let record = self
            .external
            .entry(href.clone())
            .or_insert(ExternalSheetRecord { status: SheetStatus::Unexplored, error: None });

        match &result.outcome {
            SheetOutcome::Success { selectors } => {
                debug!("Explored {} ({} selectors)", href, selectors.len());
                record.status = SheetStatus::Success;
                record.error = None;
                None
            }
            SheetOutcome::Fail { error } if record.status == SheetStatus::Unexplored => {
                debug!("Delegating {} after: {}", href, error);
                record.status = SheetStatus::AwaitingDelegatedFetch;
                record.error = Some(error.clone());
                Some(ExploreSheet {
                    href: href.clone(),
                    base_uri: result.base_uri.clone().unwrap_or_default(),
                })
            }
            SheetOutcome::Fail { error } => {
                warn!("Giving up on stylesheet {}: {}", href, error);
                record.status = SheetStatus::Fail;
                record.error = Some(error.clone());
                None
            }
        }
    }

    /// The delegated fetch request itself could not be delivered
    pub fn on_delegated_fetch_failed(&mut self, href: &str, error: &str) {
        warn!("Delegated fetch of {} failed: {}", href, error);
        self.external.insert(
            href.to_string(),
            ExternalSheetRecord { status: SheetStatus::Fail, error: Some(error.to_string()) },
        );
    }

    /// Forget delegated fetches still in flight. Their results will be
    /// discarded, so the sheets are explored (and delegated) again next pass.
    pub fn reset_pending_fetches(&mut self) -> usize {
        let mut reset = 0;
        for record in self.external.values_mut() {
            if record.status == SheetStatus::AwaitingDelegatedFetch {
                record.status = SheetStatus::Unexplored;
                reset += 1;
            }
        }
        reset
    }

    pub fn external(&self, href: &str) -> Option<&ExternalSheetRecord> {
        self.external.get(href)
    }

    /// Number of `<style>` sheets being watched for changes
    pub fn internal_count(&self) -> usize {
        self.internal.len()
    }
}
