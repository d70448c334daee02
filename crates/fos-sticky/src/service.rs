//! Settings service
//!
//! Owns the stored settings and the parsed whitelist, answers page requests
//! and serves delegated stylesheet fetches.

use crate::classify::ElementType;
use crate::error::Result;
use crate::fetcher::{explore_remote_sheet, StylesheetFetcher};
use crate::messages::{Location, PushMessage, Request, Response, SettingsChange};
use crate::settings::{Behavior, SettingsUpdate};
use crate::transport::ServiceChannel;
use crate::whitelist::{RuleWhitelist, WhitelistMatcher};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, warn};
use url::Url;

/// Settings as persisted by the service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoredSettings {
    pub behavior: Option<Behavior>,
    /// Raw whitelist rule text
    pub whitelist: String,
    pub is_development: bool,
    pub transition_duration: Option<f64>,
    pub types_to_show: Option<Vec<ElementType>>,
}

#[derive(Debug)]
pub struct SettingsService {
    stored: StoredSettings,
    whitelist: RuleWhitelist,
    outbox: Vec<PushMessage>,
}

impl SettingsService {
    /// Load stored settings. A whitelist that no longer parses is logged
    /// and treated as empty.
    pub fn new(mut stored: StoredSettings) -> Self {
        stored.behavior.get_or_insert(Behavior::Hover);
        let whitelist = RuleWhitelist::parse(&stored.whitelist).unwrap_or_else(|e| {
            warn!("Stored whitelist is invalid ({}), ignoring it", e);
            RuleWhitelist::default()
        });
        Self { stored, whitelist, outbox: Vec::new() }
    }

    pub fn stored(&self) -> &StoredSettings {
        &self.stored
    }

    /// Answer a settings request. `exploreSheet` is not handled here.
    pub fn handle(&mut self, request: &Request) -> Response {
        match request {
            Request::GetSettings { location } => self.get_settings(location),
            Request::UpdateSettings(change) => self.update_settings(change),
            Request::AddToWhitelist { url } => self.add_to_whitelist(url),
            Request::ExploreSheet(_) => Response::Error("exploreSheet requires a stylesheet fetcher".into()),
        }
    }

    fn get_settings(&self, location: &Location) -> Response {
        Response::Settings(SettingsUpdate {
            is_development: Some(self.stored.is_development),
            behavior: self.stored.behavior,
            whitelist: Some(self.whitelist.match_location(location)),
            transition_duration: self.stored.transition_duration,
            types_to_show: self.stored.types_to_show.clone(),
        })
    }

    fn update_settings(&mut self, change: &SettingsChange) -> Response {
        if let Some(text) = &change.whitelist {
            match RuleWhitelist::parse(text) {
                Ok(whitelist) => {
                    self.whitelist = whitelist;
                    self.stored.whitelist = text.clone();
                }
                Err(e) => return Response::InvalidSettings(e.to_string()),
            }
        }
        if let Some(behavior) = change.behavior {
            self.stored.behavior = Some(behavior);
        }
        if let Some(is_development) = change.is_development {
            self.stored.is_development = is_development;
        }
        if change.transition_duration.is_some() {
            self.stored.transition_duration = change.transition_duration;
        }
        if change.types_to_show.is_some() {
            self.stored.types_to_show = change.types_to_show.clone();
        }
        info!("Settings updated");
        self.outbox.push(PushMessage::SettingsChanged(SettingsUpdate {
            is_development: change.is_development,
            behavior: change.behavior,
            whitelist: None,
            transition_duration: change.transition_duration,
            types_to_show: change.types_to_show.clone(),
        }));
        Response::AcceptedSettings
    }

    fn add_to_whitelist(&mut self, url: &str) -> Response {
        let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
            Some(host) => host,
            None => return Response::AddToWhitelistError { error: "Invalid URL".into() },
        };
        let location = Location { href: url.to_string(), hostname: host.clone() };
        if self.whitelist.match_location(&location) == crate::settings::Whitelist::Page {
            return Response::AddToWhitelistError { error: "The URL already exists in the whitelist".into() };
        }
        let text = if self.stored.whitelist.trim().is_empty() {
            format!("||{host}")
        } else {
            format!("{}\n||{host}", self.stored.whitelist.trim_end())
        };
        match self.update_settings(&SettingsChange { whitelist: Some(text), ..SettingsChange::default() }) {
            Response::AcceptedSettings => Response::AddToWhitelistSuccess,
            Response::InvalidSettings(reason) => Response::AddToWhitelistError { error: reason },
            other => other,
        }
    }

    /// Messages to broadcast to every page
    pub fn drain_outbox(&mut self) -> Vec<PushMessage> {
        std::mem::take(&mut self.outbox)
    }
}

/// Channel to a service living on the same thread
#[derive(Debug)]
pub struct LocalServiceChannel<F> {
    service: Rc<RefCell<SettingsService>>,
    fetcher: F,
}

impl<F: StylesheetFetcher> LocalServiceChannel<F> {
    pub fn new(service: Rc<RefCell<SettingsService>>, fetcher: F) -> Self {
        Self { service, fetcher }
    }

    pub fn service(&self) -> &Rc<RefCell<SettingsService>> {
        &self.service
    }
}

impl<F: StylesheetFetcher> ServiceChannel for LocalServiceChannel<F> {
    async fn send(&self, request: &Request) -> Result<Response> {
        match request {
            Request::ExploreSheet(sheet) => {
                Ok(Response::SheetExplored(explore_remote_sheet(&self.fetcher, sheet).await))
            }
            other => Ok(self.service.borrow_mut().handle(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Whitelist;

    fn location(url: &str) -> Location {
        Location::from_url(url)
    }

    #[test]
    fn test_default_behavior_is_hover() {
        let mut service = SettingsService::new(StoredSettings::default());
        match service.handle(&Request::GetSettings { location: location("https://example.com/") }) {
            Response::Settings(update) => {
                assert_eq!(update.behavior, Some(Behavior::Hover));
                assert_eq!(update.whitelist, Some(Whitelist::None));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_invalid_whitelist_keeps_previous_settings() {
        let mut service = SettingsService::new(StoredSettings {
            whitelist: "||example.com".into(),
            ..StoredSettings::default()
        });
        let response = service.handle(&Request::UpdateSettings(SettingsChange {
            whitelist: Some("||good.com\nbad rule".into()),
            behavior: Some(Behavior::Scroll),
            ..SettingsChange::default()
        }));
        match response {
            Response::InvalidSettings(reason) => assert!(reason.starts_with("line 2")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(service.stored().whitelist, "||example.com");
        assert_eq!(service.stored().behavior, Some(Behavior::Hover));
        assert!(service.drain_outbox().is_empty());
    }

    #[test]
    fn test_update_broadcasts() {
        let mut service = SettingsService::new(StoredSettings::default());
        let response = service.handle(&Request::UpdateSettings(SettingsChange {
            behavior: Some(Behavior::Top),
            ..SettingsChange::default()
        }));
        assert_eq!(response, Response::AcceptedSettings);
        assert_eq!(
            service.drain_outbox(),
            vec![PushMessage::SettingsChanged(SettingsUpdate::behavior(Behavior::Top))]
        );
    }

    #[test]
    fn test_add_to_whitelist() {
        let mut service = SettingsService::new(StoredSettings::default());
        let add = |service: &mut SettingsService, url: &str| {
            service.handle(&Request::AddToWhitelist { url: url.into() })
        };

        assert_eq!(add(&mut service, "https://news.example.com/story"), Response::AddToWhitelistSuccess);
        assert_eq!(service.stored().whitelist, "||news.example.com");
        assert_eq!(
            add(&mut service, "https://news.example.com/other"),
            Response::AddToWhitelistError { error: "The URL already exists in the whitelist".into() }
        );
        assert_eq!(
            add(&mut service, "not a url"),
            Response::AddToWhitelistError { error: "Invalid URL".into() }
        );
        assert_eq!(add(&mut service, "https://blog.example.org/"), Response::AddToWhitelistSuccess);
        assert_eq!(service.stored().whitelist, "||news.example.com\n||blog.example.org");

        match service.handle(&Request::GetSettings { location: location("https://blog.example.org/x") }) {
            Response::Settings(update) => assert_eq!(update.whitelist, Some(Whitelist::Page)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
