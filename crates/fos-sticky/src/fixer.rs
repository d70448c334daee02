//! Fixer state machine
//!
//! Decides whether stuck elements are shown or hidden and writes that
//! decision as rules into one `<style>` element it owns exclusively.

use crate::classify::ElementType;
use crate::config::FixerThresholds;
use crate::error::{Result, StickyError};
use crate::explorer::SelectorDescription;
use crate::page::Page;
use crate::registry::{CandidateElement, FixStatus};
use crate::settings::{Behavior, Settings};
use fos_css::CssParser;
use fos_dom::NodeId;
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::{debug, trace, warn};

/// Raises specificity without matching anything
const BOOST_SPECIFICITY: &str = ":not(#fos-sticky-boost-specificity)";

/// Keeps sticky elements whose inline style sets a non-zero `top`
const INLINE_TOP_EXCLUSION: &str = r#":not([style*="top:"]:not([style*="top:0"], [style*="top: 0"]))"#;

/// What stuck elements should look like right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayState {
    #[default]
    Show,
    Hide,
    ShowFooters,
}

/// Scroll telemetry for one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollInfo {
    pub scroll_y: f64,
    pub scroll_height: f64,
}

/// Input to a policy's state decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyInput {
    pub scroll_y: f64,
    /// Scroll position at the end of the previous pass
    pub last_known_scroll_y: Option<f64>,
    pub old_state: DisplayState,
    /// State implied by the scroll position alone
    pub default_state: DisplayState,
}

/// A behavior: how the display state evolves and what "hidden" looks like
pub trait BehaviorPolicy: Debug {
    fn behavior(&self) -> Behavior;

    fn next_state(&self, input: &PolicyInput) -> DisplayState {
        input.default_state
    }

    fn selector_for_hidden(&self, selector: &str) -> String {
        selector.to_string()
    }

    /// Declarations (without `!important`) applied to hidden elements
    fn hidden_style(&self, transition_duration: f64) -> Vec<(&'static str, String)>;
}

fn fade_out_style(transition_duration: f64) -> Vec<(&'static str, String)> {
    vec![
        ("opacity", "0".into()),
        ("visibility", "hidden".into()),
        (
            "transition",
            format!("opacity {transition_duration}s ease-in-out, visibility 0s {transition_duration}s"),
        ),
        ("animation", "none".into()),
        ("pointer-events", "none".into()),
    ]
}

/// Hidden until hovered
#[derive(Debug, Clone, Copy, Default)]
pub struct HoverPolicy;

impl BehaviorPolicy for HoverPolicy {
    fn behavior(&self) -> Behavior {
        Behavior::Hover
    }

    fn selector_for_hidden(&self, selector: &str) -> String {
        format!("{selector}:not(:hover)")
    }

    fn hidden_style(&self, _: f64) -> Vec<(&'static str, String)> {
        vec![("opacity", "0".into()), ("animation", "none".into())]
    }
}

/// Shown while scrolling up
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollPolicy;

impl BehaviorPolicy for ScrollPolicy {
    fn behavior(&self) -> Behavior {
        Behavior::Scroll
    }

    fn next_state(&self, input: &PolicyInput) -> DisplayState {
        match input.last_known_scroll_y {
            Some(last) if input.scroll_y == last => input.old_state,
            Some(last) if input.scroll_y < last => DisplayState::Show,
            _ => input.default_state,
        }
    }

    fn hidden_style(&self, transition_duration: f64) -> Vec<(&'static str, String)> {
        fade_out_style(transition_duration)
    }
}

/// Shown only near the top of the page
#[derive(Debug, Clone, Copy, Default)]
pub struct TopPolicy;

impl BehaviorPolicy for TopPolicy {
    fn behavior(&self) -> Behavior {
        Behavior::Top
    }

    fn hidden_style(&self, transition_duration: f64) -> Vec<(&'static str, String)> {
        fade_out_style(transition_duration)
    }
}

/// Hidden elements scroll away with the page
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsolutePolicy;

impl BehaviorPolicy for AbsolutePolicy {
    fn behavior(&self) -> Behavior {
        Behavior::Absolute
    }

    fn hidden_style(&self, _: f64) -> Vec<(&'static str, String)> {
        vec![("position", "absolute".into())]
    }
}

/// Policy for a behavior; `None` for `always`, which never runs a fixer
pub fn policy_for(behavior: Behavior) -> Option<Box<dyn BehaviorPolicy>> {
    match behavior {
        Behavior::Hover => Some(Box::new(HoverPolicy)),
        Behavior::Scroll => Some(Box::new(ScrollPolicy)),
        Behavior::Top => Some(Box::new(TopPolicy)),
        Behavior::Absolute => Some(Box::new(AbsolutePolicy)),
        Behavior::Always => None,
    }
}

/// `{ name: value !important; ... }`
fn make_style(declarations: &[(&'static str, String)]) -> String {
    let body: String = declarations
        .iter()
        .map(|(name, value)| format!(" {name}: {value} !important;"))
        .collect();
    format!("{{{body} }}")
}

/// Everything the rules are generated from
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub settings: &'a Settings,
    pub candidates: &'a [CandidateElement],
    pub pseudo_elements: &'a [SelectorDescription],
    pub last_known_scroll_y: Option<f64>,
    pub viewport_height: f64,
    pub thresholds: &'a FixerThresholds,
}

/// Owner of the injected stylesheet
#[derive(Debug)]
pub struct StickyFixer {
    policy: Box<dyn BehaviorPolicy>,
    stylesheet: Option<NodeId>,
    state: DisplayState,
    rule_cache: HashMap<&'static str, String>,
}

impl StickyFixer {
    pub fn new(policy: Box<dyn BehaviorPolicy>) -> Self {
        Self {
            policy,
            stylesheet: None,
            state: DisplayState::Show,
            rule_cache: HashMap::new(),
        }
    }

    /// Swap the policy, handing over the stylesheet and the current state
    pub fn with_policy(self, policy: Box<dyn BehaviorPolicy>) -> Self {
        Self {
            policy,
            stylesheet: self.stylesheet,
            state: self.state,
            rule_cache: HashMap::new(),
        }
    }

    pub fn behavior(&self) -> Behavior {
        self.policy.behavior()
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    /// The `<style>` element this fixer writes to
    pub fn stylesheet(&self) -> Option<NodeId> {
        self.stylesheet
    }

    fn default_state(scroll: &ScrollInfo, viewport_height: f64, thresholds: &FixerThresholds) -> DisplayState {
        let vh = viewport_height.max(1.0);
        if scroll.scroll_y / vh < thresholds.on_top {
            DisplayState::Show
        } else if (scroll.scroll_height - scroll.scroll_y) / vh < thresholds.on_bottom {
            DisplayState::ShowFooters
        } else {
            DisplayState::Hide
        }
    }

    /// Compute the next state and rewrite the stylesheet when it changed
    /// (or always when `force` is set). Returns whether rules were written.
    pub fn on_change(
        &mut self,
        page: &mut Page,
        scroll: Option<ScrollInfo>,
        force: bool,
        ctx: &RuleContext<'_>,
    ) -> Result<bool> {
        let state = match scroll {
            Some(scroll) => self.policy.next_state(&PolicyInput {
                scroll_y: scroll.scroll_y,
                last_known_scroll_y: ctx.last_known_scroll_y,
                old_state: self.state,
                default_state: Self::default_state(&scroll, ctx.viewport_height, ctx.thresholds),
            }),
            None => self.state,
        };

        if !force && state == self.state {
            return Ok(false);
        }
        trace!("Fixer {:?} -> {:?} (force: {})", self.state, state, force);
        let rules = self.rules(state, ctx);
        self.update_stylesheet(page, &rules)?;
        self.state = state;
        Ok(true)
    }

    fn cached(&mut self, name: &'static str, build: impl FnOnce() -> String) -> String {
        self.rule_cache.entry(name).or_insert_with(build).clone()
    }

    /// Rules for a display state, in insertion order
    pub fn rules(&mut self, state: DisplayState, ctx: &RuleContext<'_>) -> Vec<String> {
        let duration = ctx.settings.transition_duration;
        let show_style = self.cached("showStyle", || {
            make_style(&[("transition", format!("opacity {duration}s ease-in-out"))])
        });
        let policy = &self.policy;
        let hide_style = self
            .rule_cache
            .entry("hideStyle")
            .or_insert_with(|| make_style(&policy.hidden_style(duration)))
            .clone();
        let sticky_style = self.cached("stickyStyle", || {
            make_style(&[("position", "relative".into()), ("top", "0".into())])
        });

        let exclusions: String = std::iter::once(format!("{BOOST_SPECIFICITY}:not(:focus-within)"))
            .chain(ctx.settings.whitelisted_selectors().iter().map(|s| format!(":not({s})")))
            .collect();
        let guarded = |selector: &str| format!("{selector}{exclusions}");

        let mut rules = Vec::new();

        let sticky: Vec<String> = ctx
            .candidates
            .iter()
            .filter(|c| c.status == FixStatus::Sticky)
            .map(|c| guarded(&format!("{}{INLINE_TOP_EXCLUSION}", c.selector)))
            .collect();
        if !sticky.is_empty() {
            rules.push(format!("{} {sticky_style}", sticky.join(", ")));
        }

        if !ctx.pseudo_elements.is_empty() {
            let shown: Vec<String> = ctx
                .pseudo_elements
                .iter()
                .map(|d| format!("{}::{}", guarded(&d.selector), pseudo_name(d)))
                .collect();
            rules.push(format!("{} {show_style}", shown.join(", ")));
            if state != DisplayState::Show {
                let hidden: Vec<String> = ctx
                    .pseudo_elements
                    .iter()
                    .map(|d| format!("{}::{}", self.policy.selector_for_hidden(&guarded(&d.selector)), pseudo_name(d)))
                    .collect();
                rules.push(format!("{} {hide_style}", hidden.join(", ")));
            }
        }

        let fixed: Vec<&CandidateElement> =
            ctx.candidates.iter().filter(|c| c.status == FixStatus::Fixed).collect();
        if !fixed.is_empty() {
            let shown: Vec<String> = fixed.iter().map(|c| guarded(&c.selector)).collect();
            rules.push(format!("{} {show_style}", shown.join(", ")));
        }
        if state != DisplayState::Show {
            let keep_footers = state == DisplayState::ShowFooters;
            let visible = |t: ElementType| {
                ctx.settings.types_to_show.contains(&t) || (keep_footers && t == ElementType::Footer)
            };
            let hidden: Vec<String> = fixed
                .iter()
                .filter(|c| !visible(c.element_type))
                .map(|c| self.policy.selector_for_hidden(&guarded(&c.selector)))
                .collect();
            if !hidden.is_empty() {
                rules.push(format!("{} {hide_style}", hidden.join(", ")));
            }
        }

        rules
    }

    /// Replace the stylesheet's contents with `rules`. Rules that fail to
    /// parse are dropped before anything is touched, so the sheet never
    /// ends up half-written.
    fn update_stylesheet(&mut self, page: &mut Page, rules: &[String]) -> Result<()> {
        let parser = CssParser::new();
        let valid: Vec<&String> = rules
            .iter()
            .filter(|rule| match parser.parse_rule(rule) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Dropping rule {}: {}", rule, e);
                    false
                }
            })
            .collect();

        let owner = match self.stylesheet {
            Some(owner) if page.contains(owner) => owner,
            _ => {
                let owner = page.create_style_element()?;
                debug!("Created injected stylesheet {}", owner);
                self.stylesheet = Some(owner);
                owner
            }
        };
        let sheet = page
            .style_sheet_mut(owner)
            .ok_or(StickyError::Dom(fos_dom::DomError::NotFound(owner)))?;

        for _ in 0..sheet.rule_count()? {
            sheet.delete_rule(0)?;
        }
        for (index, rule) in valid.into_iter().enumerate() {
            sheet.insert_rule(rule, index)?;
        }
        Ok(())
    }

    /// Show or hide everything at once by toggling the sheet
    pub fn set_disabled(&self, page: &mut Page, disabled: bool) {
        if let Some(sheet) = self.stylesheet.and_then(|owner| page.style_sheet_mut(owner)) {
            sheet.disabled = disabled;
        }
    }

    /// Remove the injected stylesheet
    pub fn teardown(&mut self, page: &mut Page) -> Result<()> {
        if let Some(owner) = self.stylesheet.take() {
            debug!("Removing injected stylesheet {}", owner);
            page.remove_node(owner)?;
        }
        Ok(())
    }
}

fn pseudo_name(description: &SelectorDescription) -> &str {
    description.pseudo_element.as_deref().unwrap_or("before")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::StickyPosition;
    use crate::page::Viewport;

    fn candidate(selector: &str, element_type: ElementType, status: FixStatus) -> CandidateElement {
        CandidateElement { element: NodeId::NONE, element_type, selector: selector.into(), status }
    }

    fn input(scroll_y: f64, last: Option<f64>, old_state: DisplayState) -> PolicyInput {
        PolicyInput { scroll_y, last_known_scroll_y: last, old_state, default_state: DisplayState::Hide }
    }

    #[test]
    fn test_scroll_policy() {
        let policy = ScrollPolicy;
        assert_eq!(policy.next_state(&input(100.0, Some(200.0), DisplayState::Hide)), DisplayState::Show);
        assert_eq!(policy.next_state(&input(200.0, Some(200.0), DisplayState::Show)), DisplayState::Show);
        assert_eq!(policy.next_state(&input(300.0, Some(200.0), DisplayState::Show)), DisplayState::Hide);
        assert_eq!(policy.next_state(&input(300.0, None, DisplayState::Show)), DisplayState::Hide);
    }

    #[test]
    fn test_other_policies_use_default_state() {
        for behavior in [Behavior::Hover, Behavior::Top, Behavior::Absolute] {
            let policy = policy_for(behavior).unwrap();
            assert_eq!(policy.behavior(), behavior);
            assert_eq!(policy.next_state(&input(0.0, Some(500.0), DisplayState::Show)), DisplayState::Hide);
        }
        assert!(policy_for(Behavior::Always).is_none());
    }

    #[test]
    fn test_default_state() {
        let t = FixerThresholds::default();
        let at = |y| StickyFixer::default_state(&ScrollInfo { scroll_y: y, scroll_height: 5000.0 }, 1000.0, &t);
        assert_eq!(at(50.0), DisplayState::Show);
        assert_eq!(at(2000.0), DisplayState::Hide);
        assert_eq!(at(3800.0), DisplayState::ShowFooters);
    }

    #[test]
    fn test_rules() {
        let settings = Settings::default();
        let candidates = vec![
            candidate("#hdr#hdr", ElementType::Header, FixStatus::Fixed),
            candidate(".toc.toc", ElementType::Sidebar, FixStatus::Sticky),
            candidate(".side.side", ElementType::Sidebar, FixStatus::Fixed),
            candidate(".gone", ElementType::Widget, FixStatus::Removed),
        ];
        let pseudo = vec![SelectorDescription::new(".ad", StickyPosition::Fixed).with_pseudo_element("after")];
        let thresholds = FixerThresholds::default();
        let ctx = RuleContext {
            settings: &settings,
            candidates: &candidates,
            pseudo_elements: &pseudo,
            last_known_scroll_y: None,
            viewport_height: 800.0,
            thresholds: &thresholds,
        };
        let guard = ":not(#fos-sticky-boost-specificity):not(:focus-within)";
        let mut fixer = StickyFixer::new(Box::new(HoverPolicy));

        let shown = fixer.rules(DisplayState::Show, &ctx);
        assert_eq!(shown.len(), 3);
        assert_eq!(
            shown[0],
            format!(".toc.toc{INLINE_TOP_EXCLUSION}{guard} {{ position: relative !important; top: 0 !important; }}")
        );
        assert_eq!(shown[1], format!(".ad{guard}::after {{ transition: opacity 0.2s ease-in-out !important; }}"));
        assert_eq!(
            shown[2],
            format!("#hdr#hdr{guard}, .side.side{guard} {{ transition: opacity 0.2s ease-in-out !important; }}")
        );

        let hidden = fixer.rules(DisplayState::Hide, &ctx);
        assert_eq!(hidden.len(), 5);
        let hide = "{ opacity: 0 !important; animation: none !important; }";
        assert_eq!(hidden[2], format!(".ad{guard}:not(:hover)::after {hide}"));
        // Sidebars are in the default types-to-show
        assert_eq!(hidden[4], format!("#hdr#hdr{guard}:not(:hover) {hide}"));
    }

    #[test]
    fn test_footers_and_whitelist() {
        let mut settings = Settings::default();
        settings.whitelist = crate::settings::Whitelist::Selectors { selectors: vec![".chat".into()] };
        let candidates = vec![
            candidate(".hdr", ElementType::Header, FixStatus::Fixed),
            candidate(".ftr", ElementType::Footer, FixStatus::Fixed),
        ];
        let thresholds = FixerThresholds::default();
        let ctx = RuleContext {
            settings: &settings,
            candidates: &candidates,
            pseudo_elements: &[],
            last_known_scroll_y: None,
            viewport_height: 800.0,
            thresholds: &thresholds,
        };
        let mut fixer = StickyFixer::new(Box::new(TopPolicy));
        let rules = fixer.rules(DisplayState::ShowFooters, &ctx);
        let hide = rules.last().unwrap();
        assert!(hide.starts_with(".hdr:not(#fos-sticky-boost-specificity):not(:focus-within):not(.chat) {"));
        assert!(!hide.contains(".ftr"));
        assert!(hide.contains("visibility: hidden !important"));
        assert!(hide.contains("visibility 0s 0.2s"));

        let rules = fixer.rules(DisplayState::Hide, &ctx);
        assert!(rules.last().unwrap().contains(".ftr"));
    }

    #[test]
    fn test_update_replaces_all_rules() {
        let mut page =
            Page::from_html("<html><head></head><body></body></html>", "https://example.com/", Viewport::default())
                .unwrap();
        let settings = Settings::default();
        let candidates = vec![candidate(".hdr", ElementType::Header, FixStatus::Fixed)];
        let thresholds = FixerThresholds::default();
        let ctx = RuleContext {
            settings: &settings,
            candidates: &candidates,
            pseudo_elements: &[],
            last_known_scroll_y: None,
            viewport_height: 800.0,
            thresholds: &thresholds,
        };
        let mut fixer = StickyFixer::new(Box::new(TopPolicy));
        assert!(fixer.on_change(&mut page, None, true, &ctx).unwrap());
        let owner = fixer.stylesheet().unwrap();
        assert_eq!(page.style_sheets().get(owner).unwrap().rule_count().unwrap(), 1);

        let scrolled = ScrollInfo { scroll_y: 2000.0, scroll_height: 10000.0 };
        assert!(fixer.on_change(&mut page, Some(scrolled), false, &ctx).unwrap());
        assert_eq!(fixer.state(), DisplayState::Hide);
        assert_eq!(page.style_sheets().get(owner).unwrap().rule_count().unwrap(), 2);
        // Same state, no rewrite
        assert!(!fixer.on_change(&mut page, Some(scrolled), false, &ctx).unwrap());

        // A detached sheet is recreated
        page.remove_node(owner).unwrap();
        assert!(fixer.on_change(&mut page, None, true, &ctx).unwrap());
        let recreated = fixer.stylesheet().unwrap();
        assert_ne!(recreated, owner);
        assert_eq!(page.style_sheets().get(recreated).unwrap().rule_count().unwrap(), 2);

        fixer.teardown(&mut page).unwrap();
        assert!(!page.contains(recreated));
        assert!(fixer.stylesheet().is_none());
    }

    #[test]
    fn test_policy_swap_keeps_stylesheet() {
        let mut page =
            Page::from_html("<html><head></head><body></body></html>", "https://example.com/", Viewport::default())
                .unwrap();
        let settings = Settings::default();
        let thresholds = FixerThresholds::default();
        let ctx = RuleContext {
            settings: &settings,
            candidates: &[],
            pseudo_elements: &[],
            last_known_scroll_y: None,
            viewport_height: 800.0,
            thresholds: &thresholds,
        };
        let mut fixer = StickyFixer::new(Box::new(HoverPolicy));
        fixer.on_change(&mut page, None, true, &ctx).unwrap();
        let owner = fixer.stylesheet();
        let fixer = fixer.with_policy(Box::new(AbsolutePolicy));
        assert_eq!(fixer.stylesheet(), owner);
        assert_eq!(fixer.behavior(), Behavior::Absolute);
    }
}
