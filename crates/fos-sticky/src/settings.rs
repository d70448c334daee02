//! User settings as seen by a page

use crate::classify::ElementType;
use serde::{Deserialize, Serialize};

/// How stuck elements are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Hidden unless hovered
    #[default]
    Hover,
    /// Hidden while scrolling down, shown on scroll up
    Scroll,
    /// Shown only at the top of the page
    Top,
    /// Turned into absolutely positioned elements
    Absolute,
    /// Never touched
    Always,
}

impl Behavior {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hover => "hover",
            Self::Scroll => "scroll",
            Self::Top => "top",
            Self::Absolute => "absolute",
            Self::Always => "always",
        }
    }
}

/// Result of matching the whitelist against the page location
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Whitelist {
    #[default]
    None,
    /// The whole page is exempt
    Page,
    /// Only elements matching these selectors are exempt
    Selectors { selectors: Vec<String> },
}

/// Settings in effect for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub is_development: bool,
    pub behavior: Behavior,
    pub whitelist: Whitelist,
    /// Opacity transition length in seconds
    pub transition_duration: f64,
    /// Element types that stay visible while the rest is hidden
    pub types_to_show: Vec<ElementType>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            is_development: false,
            behavior: Behavior::default(),
            whitelist: Whitelist::None,
            transition_duration: 0.2,
            types_to_show: vec![ElementType::Sidebar, ElementType::Splash, ElementType::Hidden],
        }
    }
}

impl Settings {
    /// Merge a partial update over these settings
    pub fn merge(&mut self, update: SettingsUpdate) {
        if let Some(is_development) = update.is_development {
            self.is_development = is_development;
        }
        if let Some(behavior) = update.behavior {
            self.behavior = behavior;
        }
        if let Some(whitelist) = update.whitelist {
            self.whitelist = whitelist;
        }
        if let Some(duration) = update.transition_duration {
            self.transition_duration = duration;
        }
        if let Some(types) = update.types_to_show {
            self.types_to_show = types;
        }
    }

    /// Whether a fixer should run under these settings
    pub fn should_be_active(&self) -> bool {
        self.behavior != Behavior::Always && self.whitelist != Whitelist::Page
    }

    /// Selectors exempt from hiding
    pub fn whitelisted_selectors(&self) -> &[String] {
        match &self.whitelist {
            Whitelist::Selectors { selectors } => selectors,
            _ => &[],
        }
    }
}

/// Partial settings; absent fields keep their previous value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_development: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<Behavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Whitelist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types_to_show: Option<Vec<ElementType>>,
}

impl SettingsUpdate {
    pub fn behavior(behavior: Behavior) -> Self {
        Self { behavior: Some(behavior), ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut settings = Settings::default();
        settings.merge(SettingsUpdate {
            behavior: Some(Behavior::Scroll),
            transition_duration: Some(0.5),
            ..SettingsUpdate::default()
        });
        assert_eq!(settings.behavior, Behavior::Scroll);
        assert_eq!(settings.transition_duration, 0.5);
        assert_eq!(settings.types_to_show.len(), 3);

        settings.merge(SettingsUpdate::behavior(Behavior::Top));
        assert_eq!(settings.transition_duration, 0.5);
    }

    #[test]
    fn test_should_be_active() {
        let mut settings = Settings::default();
        assert!(settings.should_be_active());
        settings.whitelist = Whitelist::Page;
        assert!(!settings.should_be_active());
        settings.whitelist = Whitelist::None;
        settings.behavior = Behavior::Always;
        assert!(!settings.should_be_active());
    }

    #[test]
    fn test_wire_format() {
        let update: SettingsUpdate = serde_json::from_str(
            r#"{"behavior":"scroll","whitelist":{"type":"selectors","selectors":[".chat"]},"typesToShow":["footer"]}"#,
        )
        .unwrap();
        assert_eq!(update.behavior, Some(Behavior::Scroll));
        assert_eq!(
            update.whitelist,
            Some(Whitelist::Selectors { selectors: vec![".chat".into()] })
        );
        assert_eq!(update.types_to_show, Some(vec![ElementType::Footer]));

        let json = serde_json::to_string(&Whitelist::Page).unwrap();
        assert_eq!(json, r#"{"type":"page"}"#);
    }
}
