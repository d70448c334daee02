//! Tuned constants
//!
//! Every threshold the heuristics depend on lives here so embedders can
//! override them from a JSON blob without touching the pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StickyConfig {
    pub classifier: ClassifierThresholds,
    pub fixer: FixerThresholds,
    pub exploration: ExplorationThresholds,
    pub scheduler: SchedulerTiming,
    pub retry: RetryPolicy,
}

impl StickyConfig {
    /// Parse a (possibly partial) JSON configuration
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Geometry ratios used to name an element's role.
/// Widths are relative to the viewport width, heights to its height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassifierThresholds {
    /// Wider than this is "wide"
    pub wide: f64,
    /// Shorter than this is "thin"
    pub thin: f64,
    /// Taller than this is "tall"
    pub tall: f64,
    /// Headers start above this
    pub top: f64,
    /// Footers end below this
    pub bottom: f64,
    /// Sidebars hug the left edge closer than this
    pub side_left: f64,
    /// ...or the right edge beyond this
    pub side_right: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            wide: 0.35,
            thin: 0.25,
            tall: 0.5,
            top: 0.1,
            bottom: 0.9,
            side_left: 0.1,
            side_right: 0.9,
        }
    }
}

/// Scroll ratios deciding the default display state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixerThresholds {
    /// `scrollY / vh` below this shows everything
    pub on_top: f64,
    /// `(scrollHeight - scrollY) / vh` below this shows footers
    pub on_bottom: f64,
}

impl Default for FixerThresholds {
    fn default() -> Self {
        Self { on_top: 0.1, on_bottom: 1.3 }
    }
}

/// When a pass re-explores stylesheets and the DOM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExplorationThresholds {
    /// Exploring passes granted right after activation
    pub initial_budget: u32,
    /// Scroll passes moving less than this (in viewports) are dropped
    pub min_displacement: f64,
    /// Far-exploration distance while the last point is within one viewport of the top
    pub near_top_distance: f64,
    /// Far-exploration distance elsewhere
    pub far_distance: f64,
}

impl Default for ExplorationThresholds {
    fn default() -> Self {
        Self {
            initial_budget: 2,
            min_displacement: 0.05,
            near_top_distance: 0.25,
            far_distance: 0.5,
        }
    }
}

/// Event cadence, all in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerTiming {
    pub debounce_ms: u64,
    pub throttle_ms: u64,
    /// Offsets of the forced passes after a ready-state change
    pub ready_state_passes_ms: Vec<u64>,
    pub temporary_show_ms: u64,
    pub storage_change_delay_ms: u64,
}

impl SchedulerTiming {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn temporary_show(&self) -> Duration {
        Duration::from_millis(self.temporary_show_ms)
    }

    pub fn storage_change_delay(&self) -> Duration {
        Duration::from_millis(self.storage_change_delay_ms)
    }

    pub fn ready_state_passes(&self) -> impl Iterator<Item = Duration> + '_ {
        self.ready_state_passes_ms.iter().map(|&ms| Duration::from_millis(ms))
    }
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            throttle_ms: 300,
            ready_state_passes_ms: vec![0, 500],
            temporary_show_ms: 1000,
            storage_change_delay_ms: 100,
        }
    }
}

/// Bounded retry for messages to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, delay_ms: 200 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StickyConfig::default();
        assert_eq!(config.classifier.wide, 0.35);
        assert_eq!(config.fixer.on_bottom, 1.3);
        assert_eq!(config.exploration.initial_budget, 2);
        assert_eq!(config.scheduler.debounce(), Duration::from_millis(50));
        assert_eq!(config.retry.attempts, 3);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = StickyConfig::from_json(r#"{"classifier":{"wide":0.5},"retry":{"attempts":5}}"#).unwrap();
        assert_eq!(config.classifier.wide, 0.5);
        assert_eq!(config.classifier.thin, 0.25);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.delay_ms, 200);
        assert_eq!(config.scheduler.ready_state_passes_ms, vec![0, 500]);
    }
}
