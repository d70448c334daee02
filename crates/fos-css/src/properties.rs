//! CSS Property keywords
//!
//! Only the properties that decide whether an element is stuck to the
//! viewport are resolved; everything else stays as raw declaration text.

/// `position` keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

impl Position {
    /// Parse a position value. Handles "FiXeD !important" and "-webkit-sticky".
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.to_ascii_lowercase();
        if value.contains("fixed") {
            Some(Self::Fixed)
        } else if value.contains("sticky") {
            Some(Self::Sticky)
        } else if value.contains("absolute") {
            Some(Self::Absolute)
        } else if value.contains("relative") {
            Some(Self::Relative)
        } else if value.contains("static") {
            Some(Self::Static)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Relative => "relative",
            Self::Absolute => "absolute",
            Self::Fixed => "fixed",
            Self::Sticky => "sticky",
        }
    }
}

/// `display` keyword (outer display type only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Display {
    #[default]
    Inline,
    Block,
    InlineBlock,
    Flex,
    Grid,
    Contents,
    None,
    Other,
}

impl Display {
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "none" => Self::None,
            "inline" => Self::Inline,
            "block" | "flow-root" | "list-item" => Self::Block,
            "inline-block" => Self::InlineBlock,
            "contents" => Self::Contents,
            _ if value.contains("flex") => Self::Flex,
            _ if value.contains("grid") => Self::Grid,
            _ => Self::Other,
        }
    }

    /// Default display of an element by tag name
    pub fn for_tag(tag: &str) -> Self {
        match tag {
            "head" | "script" | "style" | "link" | "meta" | "title" | "template" => Self::None,
            "html" | "body" | "div" | "p" | "header" | "footer" | "nav" | "aside" | "section"
            | "article" | "main" | "ul" | "ol" | "form" | "h1" | "h2" | "h3" | "h4" | "h5"
            | "h6" | "dialog" | "figure" | "table" | "li" => Self::Block,
            _ => Self::Inline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_variants() {
        assert_eq!(Position::parse("FiXeD !important"), Some(Position::Fixed));
        assert_eq!(Position::parse("-webkit-sticky"), Some(Position::Sticky));
        assert_eq!(Position::parse("relative"), Some(Position::Relative));
        assert_eq!(Position::parse("inherit"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Display::parse("none"), Display::None);
        assert_eq!(Display::parse("inline-flex"), Display::Flex);
        assert_eq!(Display::for_tag("style"), Display::None);
        assert_eq!(Display::for_tag("div"), Display::Block);
    }
}
