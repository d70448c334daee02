//! Messages between pages and the settings service
//!
//! Every message is a `{name, message}` envelope so it can cross a JSON
//! transport unchanged.

use crate::classify::ElementType;
use crate::explorer::SelectorDescription;
use crate::settings::{Behavior, SettingsUpdate};
use serde::{Deserialize, Serialize};
use url::Url;

/// Page location sent along with settings requests
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub href: String,
    #[serde(default)]
    pub hostname: String,
}

impl Location {
    pub fn from_url(href: &str) -> Self {
        let hostname = Url::parse(href)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        Self { href: href.to_string(), hostname }
    }
}

/// Request from a page to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "message", rename_all = "camelCase")]
pub enum Request {
    GetSettings { location: Location },
    UpdateSettings(SettingsChange),
    AddToWhitelist { url: String },
    ExploreSheet(ExploreSheet),
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetSettings { .. } => "getSettings",
            Self::UpdateSettings(_) => "updateSettings",
            Self::AddToWhitelist { .. } => "addToWhitelist",
            Self::ExploreSheet(_) => "exploreSheet",
        }
    }
}

/// Stored-settings change; the whitelist travels as raw rule text
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<Behavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_development: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types_to_show: Option<Vec<ElementType>>,
}

/// Delegated fetch of a stylesheet the page cannot read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreSheet {
    pub href: String,
    #[serde(rename = "baseURI")]
    pub base_uri: String,
}

/// Reply from the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "message", rename_all = "camelCase")]
pub enum Response {
    Settings(SettingsUpdate),
    AcceptedSettings,
    InvalidSettings(String),
    AddToWhitelistSuccess,
    AddToWhitelistError { error: String },
    SheetExplored(SheetExplored),
    Error(String),
}

impl Response {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Settings(_) => "settings",
            Self::AcceptedSettings => "acceptedSettings",
            Self::InvalidSettings(_) => "invalidSettings",
            Self::AddToWhitelistSuccess => "addToWhitelistSuccess",
            Self::AddToWhitelistError { .. } => "addToWhitelistError",
            Self::SheetExplored(_) => "sheetExplored",
            Self::Error(_) => "error",
        }
    }
}

/// Unsolicited message delivered to a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "message", rename_all = "camelCase")]
pub enum PushMessage {
    TemporaryShowStickies,
    SheetExplored(SheetExplored),
    SettingsChanged(SettingsUpdate),
}

/// Outcome of inspecting one stylesheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetExplored {
    /// Absolute URL of linked sheets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, rename = "baseURI", skip_serializing_if = "Option::is_none")]
    pub base_uri: Option<String>,
    #[serde(flatten)]
    pub outcome: SheetOutcome,
}

impl SheetExplored {
    pub fn success(href: Option<String>, selectors: Vec<SelectorDescription>) -> Self {
        Self { href, base_uri: None, outcome: SheetOutcome::Success { selectors } }
    }

    pub fn fail(href: Option<String>, base_uri: Option<String>, error: impl Into<String>) -> Self {
        Self { href, base_uri, outcome: SheetOutcome::Fail { error: error.into() } }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SheetOutcome {
    Success { selectors: Vec<SelectorDescription> },
    Fail { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::StickyPosition;
    use serde_json::json;

    #[test]
    fn test_request_envelope() {
        let request = Request::ExploreSheet(ExploreSheet {
            href: "https://cdn.example/a.css".into(),
            base_uri: "https://example.com/".into(),
        });
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "name": "exploreSheet",
                "message": {"href": "https://cdn.example/a.css", "baseURI": "https://example.com/"}
            })
        );
        assert_eq!(request.name(), "exploreSheet");
    }

    #[test]
    fn test_unit_response() {
        let value = serde_json::to_value(Response::AcceptedSettings).unwrap();
        assert_eq!(value, json!({"name": "acceptedSettings"}));
        let back: Response = serde_json::from_value(value).unwrap();
        assert_eq!(back, Response::AcceptedSettings);
    }

    #[test]
    fn test_sheet_explored_shape() {
        let explored = SheetExplored::success(
            Some("https://cdn.example/a.css".into()),
            vec![SelectorDescription::new(".nav", StickyPosition::Fixed)],
        );
        assert_eq!(
            serde_json::to_value(&explored).unwrap(),
            json!({
                "href": "https://cdn.example/a.css",
                "status": "success",
                "selectors": [{"selector": ".nav", "position": "fixed"}]
            })
        );

        let failed: SheetExplored =
            serde_json::from_value(json!({"href": "x", "status": "fail", "error": "boom"})).unwrap();
        assert_eq!(failed.outcome, SheetOutcome::Fail { error: "boom".into() });
    }

    #[test]
    fn test_location_hostname() {
        let location = Location::from_url("https://news.example.com/a?b");
        assert_eq!(location.hostname, "news.example.com");
        assert_eq!(Location::from_url("not a url").hostname, "");
    }
}
