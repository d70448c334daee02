//! fOS Sticky - stuck element suppression
//!
//! Finds elements kept on screen with `position: fixed` or `position: sticky`
//! (headers, footers, splash overlays, sidebars, widgets), classifies them
//! by geometry and injects a stylesheet that hides them according to the
//! user's chosen behavior while the page scrolls.
//!
//! The page side is [`StickySession`], driven by [`ContentScript`]. The
//! settings side is [`SettingsService`], which also fetches cross-origin
//! stylesheets the page is not allowed to read.

pub mod classify;
pub mod config;
pub mod error;
pub mod explorer;
pub mod fetcher;
pub mod fixer;
pub mod logging;
pub mod messages;
pub mod page;
pub mod registry;
pub mod runtime;
pub mod schedule;
pub mod selector_gen;
pub mod service;
pub mod session;
pub mod settings;
pub mod transport;
pub mod whitelist;

pub use classify::{classify, classify_element, ElementType};
pub use config::StickyConfig;
pub use error::{Result, StickyError};
pub use explorer::{Exploration, SelectorDescription, StickyPosition};
pub use fetcher::{explore_remote_sheet, HttpStylesheetFetcher, StylesheetFetcher};
pub use fixer::{policy_for, BehaviorPolicy, DisplayState, StickyFixer};
pub use messages::{ExploreSheet, Location, PushMessage, Request, Response, SheetExplored, SheetOutcome};
pub use page::{Page, Viewport};
pub use registry::{CandidateElement, FixStatus, StickyRegistry};
pub use runtime::{ContentScript, PageEvent};
pub use schedule::ScrollSource;
pub use selector_gen::unique_selector;
pub use service::{LocalServiceChannel, SettingsService, StoredSettings};
pub use session::{PassTrigger, StickySession};
pub use settings::{Behavior, Settings, SettingsUpdate, Whitelist};
pub use transport::{send_with_retry, ServiceChannel};
pub use whitelist::{RuleWhitelist, WhitelistMatcher};
