//! Sticky session
//!
//! All per-page state lives here: settings, exploration bookkeeping, the
//! candidate registry, the fixer and the pass scheduler. Every method runs
//! synchronously against a borrowed [`Page`]; the async side lives in
//! [`crate::runtime`].

use crate::config::StickyConfig;
use crate::error::{Result, StickyError};
use crate::explorer::{Exploration, SelectorChanges};
use crate::fixer::{policy_for, RuleContext, ScrollInfo, StickyFixer};
use crate::messages::{ExploreSheet, SheetExplored, SheetOutcome};
use crate::page::Page;
use crate::registry::StickyRegistry;
use crate::schedule::{PassScheduler, ScrollSource, Task};
use crate::settings::{Settings, SettingsUpdate};
use fos_dom::{NodeId, ReadyState};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Where and how often the DOM is explored again
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplorationCursor {
    pub remaining_budget: u32,
    /// Scroll position of the last far exploration
    pub last_scroll_y: f64,
}

/// What triggered a pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassTrigger {
    /// Scroll event; may be dropped when the page barely moved
    Scroll(ScrollSource),
    /// Explore no matter what
    Explore,
    /// New settings: explore and rewrite the rules
    Settings,
}

#[derive(Debug)]
pub struct StickySession {
    config: StickyConfig,
    settings: Settings,
    exploration: Exploration,
    registry: StickyRegistry,
    cursor: ExplorationCursor,
    fixer: Option<StickyFixer>,
    last_known_scroll_y: Option<f64>,
    /// Bumped on teardown so late delegated results can be recognized
    epoch: u64,
    delegated: Vec<ExploreSheet>,
    pending_activation: bool,
    scheduler: PassScheduler,
}

impl StickySession {
    pub fn new(config: StickyConfig) -> Self {
        let cursor = ExplorationCursor {
            remaining_budget: config.exploration.initial_budget,
            last_scroll_y: 0.0,
        };
        let scheduler = PassScheduler::new(&config.scheduler);
        Self {
            config,
            settings: Settings::default(),
            exploration: Exploration::new(),
            registry: StickyRegistry::new(),
            cursor,
            fixer: None,
            last_known_scroll_y: None,
            epoch: 0,
            delegated: Vec::new(),
            pending_activation: false,
            scheduler,
        }
    }

    pub fn config(&self) -> &StickyConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_active(&self) -> bool {
        self.fixer.is_some()
    }

    pub fn fixer(&self) -> Option<&StickyFixer> {
        self.fixer.as_ref()
    }

    pub fn registry(&self) -> &StickyRegistry {
        &self.registry
    }

    pub fn exploration(&self) -> &Exploration {
        &self.exploration
    }

    pub fn cursor(&self) -> ExplorationCursor {
        self.cursor
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_known_scroll_y(&self) -> Option<f64> {
        self.last_known_scroll_y
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    fn own_sheet(&self) -> Option<NodeId> {
        self.fixer.as_ref().and_then(StickyFixer::stylesheet)
    }

    /// Merge new settings and (re)activate. While the document is still
    /// loading activation waits for [`Self::on_content_loaded`].
    pub fn on_new_settings(&mut self, page: &mut Page, update: SettingsUpdate) -> Result<()> {
        self.settings.merge(update);
        if page.ready_state() == ReadyState::Loading {
            debug!("Document is loading, activation deferred");
            self.pending_activation = true;
            return Ok(());
        }
        self.update_activation(page)
    }

    pub fn on_content_loaded(&mut self, page: &mut Page) -> Result<()> {
        if std::mem::take(&mut self.pending_activation) {
            self.update_activation(page)?;
        }
        Ok(())
    }

    fn update_activation(&mut self, page: &mut Page) -> Result<()> {
        let policy = policy_for(self.settings.behavior).filter(|_| self.settings.should_be_active());
        let Some(policy) = policy else {
            return self.deactivate(page);
        };
        info!("Activating with behavior {}", self.settings.behavior.as_str());
        self.fixer = Some(match self.fixer.take() {
            Some(fixer) => fixer.with_policy(policy),
            None => StickyFixer::new(policy),
        });
        self.run_pass(page, PassTrigger::Settings)
    }

    /// Remove the injected stylesheet and forget pending work
    pub fn deactivate(&mut self, page: &mut Page) -> Result<()> {
        if let Some(mut fixer) = self.fixer.take() {
            info!("Deactivating");
            self.epoch += 1;
            self.delegated.clear();
            let reset = self.exploration.reset_pending_fetches();
            if reset > 0 {
                debug!("{} delegated fetches will be issued again", reset);
            }
            self.scheduler.cancel_passes();
            fixer.teardown(page)?;
        }
        Ok(())
    }

    /// One orchestration pass: review candidates, explore when warranted,
    /// then let the fixer decide.
    pub fn run_pass(&mut self, page: &mut Page, trigger: PassTrigger) -> Result<()> {
        if self.fixer.is_none() {
            return Ok(());
        }
        let vh = page.viewport.height.max(1.0);
        let mut scroll = ScrollInfo { scroll_y: page.scroll_y, scroll_height: page.document_height() };

        if let PassTrigger::Scroll(source) = trigger {
            if let ScrollSource::Element { client_height, scroll_top, scroll_height } = source {
                if client_height != page.viewport.height {
                    trace!("Ignoring scroll of an inner container");
                    return Ok(());
                }
                scroll = ScrollInfo { scroll_y: scroll_top, scroll_height };
            }
            if let Some(last) = self.last_known_scroll_y {
                if (last - scroll.scroll_y).abs() / vh < self.config.exploration.min_displacement {
                    return Ok(());
                }
            }
        }

        let own_sheet = self.own_sheet();
        let mut force_update = trigger == PassTrigger::Settings;
        force_update |= self.registry.review(page, own_sheet, &self.config.classifier);

        let thresholds = &self.config.exploration;
        let distance = if self.cursor.last_scroll_y < vh {
            thresholds.near_top_distance
        } else {
            thresholds.far_distance
        };
        let is_far = (self.cursor.last_scroll_y - scroll.scroll_y).abs() / vh > distance;
        let forced = !matches!(trigger, PassTrigger::Scroll(_));
        if is_far || self.cursor.remaining_budget > 0 || forced {
            force_update |= self.explore(page);
            self.cursor.remaining_budget = self.cursor.remaining_budget.saturating_sub(1);
            if is_far {
                self.cursor.remaining_budget = 1;
                self.cursor.last_scroll_y = scroll.scroll_y;
            }
        }

        self.update_fixer(page, Some(scroll), force_update)?;
        self.last_known_scroll_y = Some(scroll.scroll_y);
        Ok(())
    }

    /// Explore stylesheets and the DOM. Returns whether the rules need rewriting.
    fn explore(&mut self, page: &Page) -> bool {
        let started = Instant::now();
        let own_sheet = self.own_sheet();
        let results = self.exploration.explore_stylesheets(page, own_sheet);
        let mut force_update = false;
        for result in &results {
            force_update |= self.absorb(result).force_update;
        }
        let added = self
            .registry
            .explore_stickies(page, &self.exploration.selectors, own_sheet, &self.config.classifier);
        debug!(
            "Explored {} stylesheets, {} new candidates in {:?}",
            results.len(),
            added,
            started.elapsed()
        );
        force_update || added > 0
    }

    fn absorb(&mut self, result: &SheetExplored) -> SelectorChanges {
        let changes = match &result.outcome {
            SheetOutcome::Success { selectors } => self.exploration.record_selectors(selectors),
            SheetOutcome::Fail { .. } => SelectorChanges::default(),
        };
        if let Some(request) = self.exploration.on_sheet_explored(result) {
            self.delegated.push(request);
        }
        changes
    }

    fn update_fixer(&mut self, page: &mut Page, scroll: Option<ScrollInfo>, force: bool) -> Result<bool> {
        let Some(fixer) = self.fixer.as_mut() else {
            return Ok(false);
        };
        let ctx = RuleContext {
            settings: &self.settings,
            candidates: self.registry.candidates(),
            pseudo_elements: self.exploration.selectors.pseudo_elements(),
            last_known_scroll_y: self.last_known_scroll_y,
            viewport_height: page.viewport.height,
            thresholds: &self.config.fixer,
        };
        fixer.on_change(page, scroll, force, &ctx)
    }

    /// Delegated fetches issued since the last call
    pub fn take_delegated_fetches(&mut self) -> Vec<ExploreSheet> {
        std::mem::take(&mut self.delegated)
    }

    /// Result of a delegated fetch (or a pushed `sheetExplored`) issued in `epoch`
    pub fn on_sheet_explored(&mut self, page: &mut Page, epoch: u64, result: SheetExplored) -> Result<()> {
        if epoch != self.epoch {
            debug!("Discarding stale result for {:?}", result.href);
            return Ok(());
        }
        let changes = self.absorb(&result);
        if self.fixer.is_none() {
            return Ok(());
        }
        let mut force_update = changes.force_update;
        if changes.force_explore {
            let own_sheet = self.own_sheet();
            let added = self
                .registry
                .explore_stickies(page, &self.exploration.selectors, own_sheet, &self.config.classifier);
            force_update |= added > 0;
        }
        if force_update {
            self.update_fixer(page, None, true)?;
        }
        Ok(())
    }

    /// A delegated fetch request could not be delivered
    pub fn on_delegated_fetch_failed(&mut self, epoch: u64, href: &str, error: &StickyError) {
        if epoch == self.epoch {
            self.exploration.on_delegated_fetch_failed(href, &error.to_string());
        }
    }

    pub fn on_scroll(&mut self, now: Instant, source: ScrollSource) {
        if self.is_active() {
            self.scheduler.on_scroll(now, source);
        }
    }

    /// The viewport changed. Explore once resizing settles; the displacement
    /// gate would drop a plain scroll pass.
    pub fn on_resize(&mut self, now: Instant) {
        if self.is_active() {
            self.scheduler.reschedule(now + self.config.scheduler.debounce(), Task::ResizePass);
        }
    }

    /// Forced exploration passes shortly after a ready-state change
    pub fn on_ready_state_change(&mut self, now: Instant) {
        if !self.is_active() {
            return;
        }
        let offsets: Vec<_> = self.config.scheduler.ready_state_passes().collect();
        for offset in offsets {
            self.scheduler.schedule(now + offset, Task::ExplorePass);
        }
    }

    /// Disable the injected stylesheet for a moment
    pub fn temporarily_show(&mut self, page: &mut Page, now: Instant) {
        if let Some(fixer) = &self.fixer {
            fixer.set_disabled(page, true);
            self.scheduler
                .schedule(now + self.config.scheduler.temporary_show(), Task::RestoreStylesheet);
        }
    }

    /// Settings changed in storage; refresh after a short delay
    pub fn on_storage_change(&mut self, now: Instant) {
        self.scheduler
            .schedule(now + self.config.scheduler.storage_change_delay(), Task::RefreshSettings("storage-change"));
    }

    /// Run everything due at `now`. Returns the reasons of settings
    /// refreshes that came due; those need the service and are left to the caller.
    pub fn run_due(&mut self, page: &mut Page, now: Instant) -> Vec<&'static str> {
        let mut refreshes = Vec::new();
        for task in self.scheduler.poll(now) {
            let outcome = match task {
                Task::ScrollPass(source) => self.run_pass(page, PassTrigger::Scroll(source)),
                Task::ExplorePass | Task::ResizePass => self.run_pass(page, PassTrigger::Explore),
                Task::RestoreStylesheet => {
                    if let Some(fixer) = &self.fixer {
                        fixer.set_disabled(page, false);
                    }
                    Ok(())
                }
                Task::RefreshSettings(reason) => {
                    refreshes.push(reason);
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                warn!("Pass failed: {}", e);
            }
        }
        refreshes
    }
}
