//! Delegated stylesheet fetcher
//!
//! Runs on the service side, where cross-origin sheets can be downloaded
//! and parsed even though the page itself may not read their rules.

use crate::error::{Result, StickyError};
use crate::explorer::describe_rules;
use crate::messages::{ExploreSheet, SheetExplored};
use fos_css::CssParser;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Source of stylesheet text
pub trait StylesheetFetcher {
    fn fetch_text(&self, url: &Url) -> impl Future<Output = Result<String>>;
}

/// Fetches over HTTP(S) with a blocking client moved off the executor
#[derive(Debug, Clone)]
pub struct HttpStylesheetFetcher {
    client: reqwest::blocking::Client,
}

impl HttpStylesheetFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StickyError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl StylesheetFetcher for HttpStylesheetFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<String> {
        let client = self.client.clone();
        let url = url.clone();
        smol::unblock(move || {
            debug!("Fetching stylesheet {}", url);
            let response = client.get(url.as_str()).send().map_err(|e| StickyError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            let status = response.status();
            if !status.is_success() {
                return Err(StickyError::Http { url: url.to_string(), status: status.as_u16() });
            }
            response.text().map_err(|e| StickyError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })
        .await
    }
}

/// Fetch, parse and describe a sheet. Never fails: errors come back as a
/// `fail` outcome carrying the original href.
pub async fn explore_remote_sheet<F: StylesheetFetcher>(fetcher: &F, request: &ExploreSheet) -> SheetExplored {
    let href = Some(request.href.clone());
    let url = match Url::parse(&request.base_uri).and_then(|base| base.join(&request.href)) {
        Ok(url) => url,
        Err(_) => match Url::parse(&request.href) {
            Ok(url) => url,
            Err(e) => return SheetExplored::fail(href, None, format!("invalid stylesheet URL: {e}")),
        },
    };

    let text = match fetcher.fetch_text(&url).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Delegated fetch of {} failed: {}", url, e);
            return SheetExplored::fail(href, None, e.to_string());
        }
    };
    match CssParser::new().parse(&text) {
        Ok(sheet) => SheetExplored::success(href, describe_rules(&sheet.rules)),
        Err(e) => SheetExplored::fail(href, None, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::{SelectorDescription, StickyPosition};
    use crate::messages::SheetOutcome;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, String>);

    impl StylesheetFetcher for MapFetcher {
        async fn fetch_text(&self, url: &Url) -> Result<String> {
            self.0
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| StickyError::Http { url: url.to_string(), status: 404 })
        }
    }

    fn fetcher() -> MapFetcher {
        let mut sheets = HashMap::new();
        sheets.insert(
            "https://cdn.example/css/site.css".to_string(),
            "@media screen { .hdr { position: fixed } } .x::before { position: sticky }".to_string(),
        );
        MapFetcher(sheets)
    }

    #[test]
    fn test_relative_href_resolved_against_base() {
        let request = ExploreSheet {
            href: "css/site.css".into(),
            base_uri: "https://cdn.example/".into(),
        };
        let result = smol::block_on(explore_remote_sheet(&fetcher(), &request));
        assert_eq!(result.href.as_deref(), Some("css/site.css"));
        assert_eq!(
            result.outcome,
            SheetOutcome::Success {
                selectors: vec![
                    SelectorDescription::new(".hdr", StickyPosition::Fixed),
                    SelectorDescription::new(".x", StickyPosition::Sticky).with_pseudo_element("before"),
                ]
            }
        );
    }

    #[test]
    fn test_fetch_failure_is_reported() {
        let request = ExploreSheet {
            href: "https://cdn.example/missing.css".into(),
            base_uri: String::new(),
        };
        let result = smol::block_on(explore_remote_sheet(&fetcher(), &request));
        match result.outcome {
            SheetOutcome::Fail { error } => assert!(error.contains("404")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
