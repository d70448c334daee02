//! Whitelist rules
//!
//! One rule per line: `||host` exempts a whole site, `||host##sel1, sel2`
//! exempts only the listed selectors. Blank lines and `!` comments are
//! ignored. A host rule also covers its subdomains.

use crate::messages::Location;
use crate::settings::Whitelist;
use fos_css::{CssParser, SelectorList};

/// A rule that failed to parse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct WhitelistError {
    pub line: usize,
    pub reason: String,
}

/// Matches page locations against whitelist rules
pub trait WhitelistMatcher {
    fn match_location(&self, location: &Location) -> Whitelist;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistRule {
    pub host: String,
    /// `None` exempts the whole page
    pub selectors: Option<Vec<String>>,
}

impl WhitelistRule {
    fn applies_to(&self, hostname: &str) -> bool {
        let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();
        hostname == self.host
            || hostname
                .strip_suffix(self.host.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Parsed whitelist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleWhitelist {
    rules: Vec<WhitelistRule>,
}

impl RuleWhitelist {
    pub fn parse(text: &str) -> Result<Self, WhitelistError> {
        let parser = CssParser::new();
        let mut rules = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('!') {
                continue;
            }
            let error = |reason: &str| WhitelistError { line: index + 1, reason: reason.to_string() };

            let rest = line
                .strip_prefix("||")
                .ok_or_else(|| error("rule must start with ||"))?;
            let (host, selectors) = match rest.split_once("##") {
                Some((host, selectors)) => (host, Some(selectors)),
                None => (rest, None),
            };
            let host = host.trim().trim_end_matches('^').to_ascii_lowercase();
            if host.is_empty() {
                return Err(error("empty host"));
            }
            if !host.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')) {
                return Err(error("invalid characters in host"));
            }

            let selectors = match selectors {
                None => None,
                Some(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        return Err(error("empty selector list"));
                    }
                    let parsed = SelectorList::parse(text).map_err(|e| error(&e.to_string()))?;
                    if parsed.0.iter().any(|s| s.pseudo_element.is_some()) {
                        return Err(error("pseudo-elements cannot be whitelisted"));
                    }
                    let list: Vec<String> = fos_css::split_top_level(text)
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                    // Each selector ends up inside `:not()` in the injected rules
                    for selector in &list {
                        parser
                            .parse_rule(&format!("*:not({selector}) {{ opacity: 0 }}"))
                            .map_err(|_| error(&format!("{selector} cannot be used inside :not()")))?;
                    }
                    Some(list)
                }
            };
            rules.push(WhitelistRule { host, selectors });
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[WhitelistRule] {
        &self.rules
    }
}

impl WhitelistMatcher for RuleWhitelist {
    fn match_location(&self, location: &Location) -> Whitelist {
        let matching = self.rules.iter().filter(|r| r.applies_to(&location.hostname));
        let mut selectors = Vec::new();
        for rule in matching {
            match &rule.selectors {
                None => return Whitelist::Page,
                Some(list) => selectors.extend(list.iter().cloned()),
            }
        }
        if selectors.is_empty() {
            Whitelist::None
        } else {
            Whitelist::Selectors { selectors }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(host: &str) -> Location {
        Location::from_url(&format!("https://{host}/path"))
    }

    #[test]
    fn test_page_rule_covers_subdomains() {
        let whitelist = RuleWhitelist::parse("! comment\n\n||example.com\n").unwrap();
        assert_eq!(whitelist.match_location(&at("example.com")), Whitelist::Page);
        assert_eq!(whitelist.match_location(&at("www.example.com")), Whitelist::Page);
        assert_eq!(whitelist.match_location(&at("notexample.com")), Whitelist::None);
    }

    #[test]
    fn test_selector_rules_accumulate() {
        let whitelist = RuleWhitelist::parse("||news.org##.player, #chat\n||org##.cookie").unwrap();
        assert_eq!(
            whitelist.match_location(&at("news.org")),
            Whitelist::Selectors { selectors: vec![".player".into(), "#chat".into(), ".cookie".into()] }
        );
    }

    #[test]
    fn test_malformed_rules() {
        let err = RuleWhitelist::parse("||ok.com\nexample.com").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(RuleWhitelist::parse("||").is_err());
        assert!(RuleWhitelist::parse("||bad host").is_err());
        assert!(RuleWhitelist::parse("||a.com##").is_err());
        let err = RuleWhitelist::parse("||a.com##.x[").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_pseudo_element_selectors_are_rejected() {
        let err = RuleWhitelist::parse("||ok.com\n||news.example.com##.ad::before").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.reason.contains("pseudo-elements"));
        assert!(RuleWhitelist::parse("||a.com##.player, p::after").is_err());
        assert!(RuleWhitelist::parse("||a.com##.player > .controls, #chat:hover").is_ok());
    }
}
