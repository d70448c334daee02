//! CSS Selectors Module
//!
//! Parses selector text into compound/complex selectors and matches them
//! against `fos_dom` elements right-to-left.

use crate::{CssError, Specificity};
use fos_dom::{Document, DomTree, NodeData, NodeId};

/// Pseudo-element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoElement {
    /// ::before - content before element
    Before,
    /// ::after - content after element
    After,
    /// ::first-line - first line of text
    FirstLine,
    /// ::first-letter - first letter of text
    FirstLetter,
    /// ::marker - list marker
    Marker,
    /// ::backdrop - fullscreen backdrop
    Backdrop,
}

impl PseudoElement {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim_start_matches(':').to_ascii_lowercase().as_str() {
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            "first-line" => Some(Self::FirstLine),
            "first-letter" => Some(Self::FirstLetter),
            "marker" => Some(Self::Marker),
            "backdrop" => Some(Self::Backdrop),
            _ => None,
        }
    }

    /// Name without colons
    pub fn name(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::FirstLine => "first-line",
            Self::FirstLetter => "first-letter",
            Self::Marker => "marker",
            Self::Backdrop => "backdrop",
        }
    }

    /// Pseudo-elements that CSS2 allowed with a single colon
    fn is_legacy(name: &str) -> bool {
        matches!(name, "before" | "after" | "first-line" | "first-letter")
    }
}

/// Pseudo-class type
#[derive(Debug, Clone, PartialEq)]
pub enum PseudoClass {
    // User action pseudo-classes
    Hover,
    Focus,
    FocusWithin,

    // Tree-structural pseudo-classes
    Root,
    Empty,
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    NthChild(NthExpression),
    NthLastChild(NthExpression),
    NthOfType(NthExpression),
    NthLastOfType(NthExpression),

    // Logical pseudo-classes
    Not(SelectorList),
    Is(SelectorList),
    Where(SelectorList),
}

/// An+B expression for :nth-* selectors
#[derive(Debug, Clone, PartialEq)]
pub struct NthExpression {
    /// Coefficient (A in An+B)
    pub a: i32,
    /// Offset (B in An+B)
    pub b: i32,
}

impl NthExpression {
    /// Create "odd" expression (2n+1)
    pub fn odd() -> Self {
        Self { a: 2, b: 1 }
    }

    /// Create "even" expression (2n)
    pub fn even() -> Self {
        Self { a: 2, b: 0 }
    }

    /// Create a simple index (0n+b)
    pub fn index(n: i32) -> Self {
        Self { a: 0, b: n }
    }

    /// Create An+B expression
    pub fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }

    /// Parse from string like "2n+1", "odd", "even", "3"
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();

        match s.as_str() {
            "odd" => return Some(Self::odd()),
            "even" => return Some(Self::even()),
            _ => {}
        }

        if let Ok(n) = s.parse::<i32>() {
            return Some(Self::index(n));
        }

        let s = s.replace(' ', "");
        let n_pos = s.find('n')?;
        let a_str = &s[..n_pos];
        let a = match a_str {
            "" | "+" => 1,
            "-" => -1,
            _ => a_str.parse().ok()?,
        };

        let rest = &s[n_pos + 1..];
        let b = if rest.is_empty() {
            0
        } else {
            rest.strip_prefix('+').unwrap_or(rest).parse().ok()?
        };

        Some(Self::new(a, b))
    }

    /// Check if index n (1-based) matches this expression
    pub fn matches(&self, n: i32) -> bool {
        if self.a == 0 {
            return n == self.b;
        }

        let diff = n - self.b;
        if self.a > 0 {
            diff >= 0 && diff % self.a == 0
        } else {
            diff <= 0 && diff % self.a == 0
        }
    }
}

/// A component of a compound selector
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorComponent {
    /// Universal selector *
    Universal,
    /// Type selector (tag name, lowercased)
    Type(String),
    /// ID selector #id
    Id(String),
    /// Class selector .class
    Class(String),
    /// Attribute selector [attr], [attr=value], etc.
    Attribute(AttributeSelector),
    /// Pseudo-class :hover, :nth-child(), etc.
    PseudoClass(PseudoClass),
}

/// Attribute selector
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub name: String,
    pub matcher: Option<AttributeMatcher>,
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeMatcher {
    /// [attr=value] - exact match
    Exact(String),
    /// [attr~=value] - whitespace-separated list contains
    Contains(String),
    /// [attr|=value] - exact or prefix with hyphen
    DashMatch(String),
    /// [attr^=value] - starts with
    Prefix(String),
    /// [attr$=value] - ends with
    Suffix(String),
    /// [attr*=value] - contains substring
    Substring(String),
}

impl AttributeSelector {
    /// Check if an attribute value matches
    pub fn matches(&self, value: Option<&str>) -> bool {
        let (matcher, val) = match (&self.matcher, value) {
            (None, value) => return value.is_some(),
            (Some(_), None) => return false,
            (Some(matcher), Some(val)) => (matcher, val),
        };
        let fold = |s: &str| {
            if self.case_insensitive {
                s.to_ascii_lowercase()
            } else {
                s.to_string()
            }
        };
        let val = fold(val);

        match matcher {
            AttributeMatcher::Exact(expected) => val == fold(expected),
            AttributeMatcher::Contains(expected) => {
                let expected = fold(expected);
                !expected.is_empty() && val.split_whitespace().any(|w| w == expected)
            }
            AttributeMatcher::DashMatch(expected) => {
                let expected = fold(expected);
                val == expected || val.starts_with(&format!("{expected}-"))
            }
            // Empty needles never match for the substring operators
            AttributeMatcher::Prefix(expected) => {
                !expected.is_empty() && val.starts_with(&fold(expected))
            }
            AttributeMatcher::Suffix(expected) => {
                !expected.is_empty() && val.ends_with(&fold(expected))
            }
            AttributeMatcher::Substring(expected) => {
                !expected.is_empty() && val.contains(&fold(expected))
            }
        }
    }
}

/// Combinator joining a compound to the one on its left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace
    Descendant,
    /// `>`
    Child,
    /// `+`
    NextSibling,
    /// `~`
    SubsequentSibling,
}

/// Sequence of simple selectors with no combinator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundSelector {
    pub components: Vec<SelectorComponent>,
}

/// Compound selectors chained by combinators, plus an optional pseudo-element
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSelector {
    /// Left to right; the combinator of entry `i` links it to entry `i - 1`
    pub compounds: Vec<(Combinator, CompoundSelector)>,
    pub pseudo_element: Option<PseudoElement>,
}

/// Comma-separated list of complex selectors
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectorList(pub Vec<ComplexSelector>);

impl SelectorList {
    /// Parse a selector list, rejecting syntax the matcher cannot evaluate
    pub fn parse(text: &str) -> Result<Self, CssError> {
        let mut parser = SelectorParser::new(text);
        let list = parser.parse_list(false)?;
        parser.skip_whitespace();
        if parser.peek().is_some() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(list)
    }

    /// Whether any selector in the list matches the element
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.0.iter().any(|s| s.matches(doc, node))
    }

    /// Highest specificity in the list
    pub fn specificity(&self) -> Specificity {
        self.0.iter().map(ComplexSelector::specificity).max().unwrap_or_default()
    }
}

impl ComplexSelector {
    /// Parse a single complex selector
    pub fn parse(text: &str) -> Result<Self, CssError> {
        let mut list = SelectorList::parse(text)?;
        if list.0.len() != 1 {
            return Err(CssError::InvalidSelector {
                selector: text.to_string(),
                reason: "expected a single selector".to_string(),
            });
        }
        Ok(list.0.remove(0))
    }

    /// Match against an element. Selectors with a pseudo-element never match elements.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.pseudo_element.is_none() && self.matches_ignoring_pseudo(doc, node)
    }

    /// Match the element part of the selector (the originating element of a pseudo-element)
    pub fn matches_ignoring_pseudo(&self, doc: &Document, node: NodeId) -> bool {
        if self.compounds.is_empty() || doc.tree.element(node).is_none() {
            return false;
        }
        matches_from(doc, node, &self.compounds, self.compounds.len() - 1)
    }

    /// Specificity (a, b, c)
    pub fn specificity(&self) -> Specificity {
        let mut spec = self
            .compounds
            .iter()
            .flat_map(|(_, compound)| compound.components.iter())
            .fold(Specificity::default(), |acc, c| add(acc, component_specificity(c)));
        if self.pseudo_element.is_some() {
            spec.2 += 1;
        }
        spec
    }
}

fn add(a: Specificity, b: Specificity) -> Specificity {
    Specificity(a.0 + b.0, a.1 + b.1, a.2 + b.2)
}

fn component_specificity(component: &SelectorComponent) -> Specificity {
    match component {
        SelectorComponent::Universal => Specificity(0, 0, 0),
        SelectorComponent::Type(_) => Specificity(0, 0, 1),
        SelectorComponent::Id(_) => Specificity(1, 0, 0),
        SelectorComponent::Class(_) | SelectorComponent::Attribute(_) => Specificity(0, 1, 0),
        SelectorComponent::PseudoClass(pc) => match pc {
            PseudoClass::Not(list) | PseudoClass::Is(list) => list.specificity(),
            PseudoClass::Where(_) => Specificity(0, 0, 0),
            _ => Specificity(0, 1, 0),
        },
    }
}

/// Split a trailing pseudo-element off selector text: `a.b::before` -> (`a.b`, Before)
pub fn split_pseudo_element(selector: &str) -> (&str, Option<PseudoElement>) {
    let trimmed = selector.trim_end();
    if let Some(pos) = trimmed.rfind(':') {
        let name = &trimmed[pos + 1..];
        if let Some(pe) = PseudoElement::parse(name) {
            let double = pos > 0 && trimmed.as_bytes()[pos - 1] == b':';
            let start = if double { pos - 1 } else { pos };
            if double || PseudoElement::is_legacy(&name.to_ascii_lowercase()) {
                let base = trimmed[..start].trim_end();
                return (if base.is_empty() { "*" } else { base }, Some(pe));
            }
        }
    }
    (trimmed, None)
}

/// All connected elements matching the list, in tree order
pub fn query_selector_all(doc: &Document, list: &SelectorList) -> Vec<NodeId> {
    doc.elements().filter(|&n| list.matches(doc, n)).collect()
}

fn matches_from(
    doc: &Document,
    node: NodeId,
    compounds: &[(Combinator, CompoundSelector)],
    index: usize,
) -> bool {
    let (combinator, compound) = &compounds[index];
    if !matches_compound(doc, node, compound) {
        return false;
    }
    if index == 0 {
        return true;
    }
    let tree = &doc.tree;
    match combinator {
        Combinator::Child => tree
            .parent_element(node)
            .is_some_and(|p| matches_from(doc, p, compounds, index - 1)),
        Combinator::Descendant => {
            let mut current = tree.parent_element(node);
            while let Some(ancestor) = current {
                if matches_from(doc, ancestor, compounds, index - 1) {
                    return true;
                }
                current = tree.parent_element(ancestor);
            }
            false
        }
        Combinator::NextSibling => tree
            .prev_element_sibling(node)
            .is_some_and(|s| matches_from(doc, s, compounds, index - 1)),
        Combinator::SubsequentSibling => {
            let mut current = tree.prev_element_sibling(node);
            while let Some(sibling) = current {
                if matches_from(doc, sibling, compounds, index - 1) {
                    return true;
                }
                current = tree.prev_element_sibling(sibling);
            }
            false
        }
    }
}

fn matches_compound(doc: &Document, node: NodeId, compound: &CompoundSelector) -> bool {
    compound.components.iter().all(|c| match_component(doc, node, c))
}

/// Match a selector component against an element
pub fn match_component(doc: &Document, node: NodeId, component: &SelectorComponent) -> bool {
    let Some(element) = doc.tree.element(node) else {
        return false;
    };
    match component {
        SelectorComponent::Universal => true,
        SelectorComponent::Type(tag) => element.tag == *tag,
        SelectorComponent::Id(id) => element.id() == Some(id.as_str()),
        SelectorComponent::Class(class) => element.has_class(class),
        SelectorComponent::Attribute(attr) => attr.matches(element.get_attr(&attr.name)),
        SelectorComponent::PseudoClass(pseudo) => match_pseudo_class(doc, node, pseudo),
    }
}

fn type_position(tree: &DomTree, node: NodeId) -> (usize, usize) {
    let tag = tree.element(node).map(|e| e.tag.as_str());
    let Some(parent) = tree.parent(node) else {
        return (1, 1);
    };
    let mut index = 0;
    let mut count = 0;
    for child in tree.element_children(parent) {
        if tree.element(child).map(|e| e.tag.as_str()) == tag {
            count += 1;
            if child == node {
                index = count;
            }
        }
    }
    (index, count)
}

/// Match a pseudo-class against an element
pub fn match_pseudo_class(doc: &Document, node: NodeId, pseudo: &PseudoClass) -> bool {
    let tree = &doc.tree;
    match pseudo {
        // :hover also applies to the ancestors of the hovered element
        PseudoClass::Hover => doc.hovered.is_some_and(|h| tree.is_inclusive_ancestor(node, h)),
        PseudoClass::Focus => doc.focused == Some(node),
        PseudoClass::FocusWithin => doc.focused.is_some_and(|f| tree.is_inclusive_ancestor(node, f)),

        PseudoClass::Root => tree.parent(node) == Some(tree.root()),
        PseudoClass::Empty => tree
            .children(node)
            .all(|(_, child)| matches!(child.data, NodeData::Comment(_))),
        PseudoClass::FirstChild => tree.prev_element_sibling(node).is_none(),
        PseudoClass::LastChild => tree.next_element_sibling(node).is_none(),
        PseudoClass::OnlyChild => {
            tree.prev_element_sibling(node).is_none() && tree.next_element_sibling(node).is_none()
        }
        PseudoClass::FirstOfType => type_position(tree, node).0 == 1,
        PseudoClass::LastOfType => {
            let (index, count) = type_position(tree, node);
            index == count
        }
        PseudoClass::OnlyOfType => type_position(tree, node).1 == 1,
        PseudoClass::NthChild(expr) => expr.matches(tree.element_index(node) as i32),
        PseudoClass::NthLastChild(expr) => {
            let from_end = tree.element_sibling_count(node) - tree.element_index(node) + 1;
            expr.matches(from_end as i32)
        }
        PseudoClass::NthOfType(expr) => expr.matches(type_position(tree, node).0 as i32),
        PseudoClass::NthLastOfType(expr) => {
            let (index, count) = type_position(tree, node);
            expr.matches((count - index + 1) as i32)
        }

        PseudoClass::Not(list) => !list.matches(doc, node),
        PseudoClass::Is(list) | PseudoClass::Where(list) => list.matches(doc, node),
    }
}

/// Recursive-descent parser over selector text
struct SelectorParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, reason: &str) -> CssError {
        CssError::InvalidSelector {
            selector: self.input.to_string(),
            reason: format!("{reason} at offset {}", self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), CssError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{expected}`")))
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos > start
    }

    fn parse_list(&mut self, nested: bool) -> Result<SelectorList, CssError> {
        let mut selectors = Vec::new();
        loop {
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            if self.eat(',') {
                continue;
            }
            match self.peek() {
                None => break,
                Some(')') if nested => break,
                Some(_) => return Err(self.error("unexpected character")),
            }
        }
        Ok(SelectorList(selectors))
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, CssError> {
        self.skip_whitespace();
        let mut compounds = Vec::new();
        let mut combinator = Combinator::Descendant;
        let mut pseudo_element = None;

        loop {
            let (compound, pe) = self.parse_compound()?;
            compounds.push((combinator, compound));
            if pe.is_some() {
                pseudo_element = pe;
                self.skip_whitespace();
                break;
            }

            let had_space = self.skip_whitespace();
            combinator = match self.peek() {
                Some(c @ ('>' | '+' | '~')) => {
                    self.bump();
                    self.skip_whitespace();
                    match c {
                        '>' => Combinator::Child,
                        '+' => Combinator::NextSibling,
                        _ => Combinator::SubsequentSibling,
                    }
                }
                None | Some(',') | Some(')') => break,
                Some(_) if had_space => Combinator::Descendant,
                Some(_) => return Err(self.error("unexpected character")),
            };
        }

        Ok(ComplexSelector { compounds, pseudo_element })
    }

    fn parse_compound(&mut self) -> Result<(CompoundSelector, Option<PseudoElement>), CssError> {
        let mut compound = CompoundSelector::default();
        let mut pseudo_element = None;

        if self.eat('*') {
            compound.components.push(SelectorComponent::Universal);
        } else if self.peek().is_some_and(is_ident_start) {
            let tag = self.parse_ident()?;
            compound.components.push(SelectorComponent::Type(tag.to_ascii_lowercase()));
        }
        if self.peek() == Some('|') {
            return Err(self.error("namespaces are not supported"));
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.components.push(SelectorComponent::Id(self.parse_ident()?));
                }
                Some('.') => {
                    self.bump();
                    compound.components.push(SelectorComponent::Class(self.parse_ident()?));
                }
                Some('[') => {
                    self.bump();
                    let attr = self.parse_attribute()?;
                    compound.components.push(SelectorComponent::Attribute(attr));
                }
                Some(':') => {
                    self.bump();
                    if self.eat(':') {
                        let name = self.parse_ident()?;
                        pseudo_element = Some(
                            PseudoElement::parse(&name)
                                .ok_or_else(|| self.error("unknown pseudo-element"))?,
                        );
                        break;
                    }
                    let name = self.parse_ident()?.to_ascii_lowercase();
                    if PseudoElement::is_legacy(&name) {
                        pseudo_element = PseudoElement::parse(&name);
                        break;
                    }
                    let pc = self.parse_pseudo_class(&name)?;
                    compound.components.push(SelectorComponent::PseudoClass(pc));
                }
                _ => break,
            }
        }

        if compound.components.is_empty() {
            if pseudo_element.is_some() {
                compound.components.push(SelectorComponent::Universal);
            } else {
                return Err(self.error("expected a selector"));
            }
        }
        Ok((compound, pseudo_element))
    }

    fn parse_pseudo_class(&mut self, name: &str) -> Result<PseudoClass, CssError> {
        if !self.eat('(') {
            return Ok(match name {
                "hover" => PseudoClass::Hover,
                "focus" => PseudoClass::Focus,
                "focus-within" => PseudoClass::FocusWithin,
                "root" => PseudoClass::Root,
                "empty" => PseudoClass::Empty,
                "first-child" => PseudoClass::FirstChild,
                "last-child" => PseudoClass::LastChild,
                "only-child" => PseudoClass::OnlyChild,
                "first-of-type" => PseudoClass::FirstOfType,
                "last-of-type" => PseudoClass::LastOfType,
                "only-of-type" => PseudoClass::OnlyOfType,
                _ => return Err(self.error("unsupported pseudo-class")),
            });
        }

        let pc = match name {
            "not" | "is" | "where" | "matches" | "-webkit-any" | "-moz-any" => {
                let list = self.parse_list(true)?;
                match name {
                    "not" => PseudoClass::Not(list),
                    "where" => PseudoClass::Where(list),
                    _ => PseudoClass::Is(list),
                }
            }
            "nth-child" | "nth-last-child" | "nth-of-type" | "nth-last-of-type" => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ')') {
                    self.bump();
                }
                let expr = NthExpression::parse(&self.input[start..self.pos])
                    .ok_or_else(|| self.error("invalid An+B expression"))?;
                match name {
                    "nth-child" => PseudoClass::NthChild(expr),
                    "nth-last-child" => PseudoClass::NthLastChild(expr),
                    "nth-of-type" => PseudoClass::NthOfType(expr),
                    _ => PseudoClass::NthLastOfType(expr),
                }
            }
            _ => return Err(self.error("unsupported pseudo-class")),
        };
        self.skip_whitespace();
        self.expect(')')?;
        Ok(pc)
    }

    fn parse_attribute(&mut self) -> Result<AttributeSelector, CssError> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match self.peek() {
            Some(']') => {
                self.bump();
                return Ok(AttributeSelector { name, matcher: None, case_insensitive: false });
            }
            Some('=') => None,
            Some(c @ ('~' | '|' | '^' | '$' | '*')) if self.peek_at(1) == Some('=') => Some(c),
            _ => return Err(self.error("invalid attribute operator")),
        };
        if op.is_some() {
            self.bump();
        }
        self.expect('=')?;
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => self.parse_string(quote)?,
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();

        let mut case_insensitive = false;
        if let Some(flag) = self.peek().filter(|c| c.is_ascii_alphabetic()) {
            match flag.to_ascii_lowercase() {
                'i' => case_insensitive = true,
                's' => {}
                _ => return Err(self.error("invalid attribute flag")),
            }
            self.bump();
            self.skip_whitespace();
        }
        self.expect(']')?;

        let matcher = match op {
            None => AttributeMatcher::Exact(value),
            Some('~') => AttributeMatcher::Contains(value),
            Some('|') => AttributeMatcher::DashMatch(value),
            Some('^') => AttributeMatcher::Prefix(value),
            Some('$') => AttributeMatcher::Suffix(value),
            _ => AttributeMatcher::Substring(value),
        };
        Ok(AttributeSelector { name, matcher: Some(matcher), case_insensitive })
    }

    fn parse_string(&mut self, quote: char) -> Result<String, CssError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    if let Some(c) = self.parse_escape() {
                        out.push(c);
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_ident(&mut self) -> Result<String, CssError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                if let Some(esc) = self.parse_escape() {
                    out.push(esc);
                }
            } else if is_ident_char(c) {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if out.is_empty() || out == "-" {
            return Err(self.error("expected an identifier"));
        }
        Ok(out)
    }

    /// Called after a backslash. Hex escapes take up to six digits and one trailing space.
    fn parse_escape(&mut self) -> Option<char> {
        let start = self.pos;
        while self.pos - start < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.bump();
        }
        if self.pos > start {
            let code = u32::from_str_radix(&self.input[start..self.pos], 16).ok()?;
            if self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            return Some(char::from_u32(code).unwrap_or('\u{FFFD}'));
        }
        self.bump()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nth_expression_odd() {
        let expr = NthExpression::odd();
        assert!(expr.matches(1));
        assert!(!expr.matches(2));
        assert!(expr.matches(3));
    }

    #[test]
    fn test_nth_expression_parse() {
        assert_eq!(NthExpression::parse("odd"), Some(NthExpression::odd()));
        assert_eq!(NthExpression::parse("even"), Some(NthExpression::even()));
        assert_eq!(NthExpression::parse("3"), Some(NthExpression::index(3)));
        assert_eq!(NthExpression::parse("2n+1"), Some(NthExpression::new(2, 1)));
        assert_eq!(NthExpression::parse("-n+3"), Some(NthExpression::new(-1, 3)));
        assert_eq!(NthExpression::parse("n - 1"), Some(NthExpression::new(1, -1)));
    }

    #[test]
    fn test_attribute_selector_case_insensitive() {
        let sel = AttributeSelector {
            name: "style".to_string(),
            matcher: Some(AttributeMatcher::Substring("fixed".to_string())),
            case_insensitive: true,
        };
        assert!(sel.matches(Some("position: FIXED")));
        assert!(!sel.matches(Some("position: static")));
        assert!(!sel.matches(None));
    }

    #[test]
    fn test_parse_compound_and_combinators() {
        let list = SelectorList::parse("html > body div.nav#top + p ~ span, a").unwrap();
        assert_eq!(list.0.len(), 2);
        let first = &list.0[0];
        let combinators: Vec<_> = first.compounds.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            combinators,
            vec![
                Combinator::Descendant,
                Combinator::Child,
                Combinator::Descendant,
                Combinator::NextSibling,
                Combinator::SubsequentSibling,
            ]
        );
        assert_eq!(first.specificity(), Specificity(1, 1, 5));
    }

    #[test]
    fn test_parse_attribute_forms() {
        let sel = ComplexSelector::parse(r#"*[style*="fixed" i]"#).unwrap();
        let (_, compound) = &sel.compounds[0];
        assert_eq!(compound.components.len(), 2);
        match &compound.components[1] {
            SelectorComponent::Attribute(attr) => {
                assert_eq!(attr.name, "style");
                assert!(attr.case_insensitive);
            }
            other => panic!("unexpected component {other:?}"),
        }
        assert!(ComplexSelector::parse("[data-x=abc]").is_ok());
        assert!(ComplexSelector::parse("[data-x~=]").is_err());
    }

    #[test]
    fn test_pseudo_elements() {
        let sel = ComplexSelector::parse(".a::before").unwrap();
        assert_eq!(sel.pseudo_element, Some(PseudoElement::Before));
        let sel = ComplexSelector::parse(".a:after").unwrap();
        assert_eq!(sel.pseudo_element, Some(PseudoElement::After));
        assert!(ComplexSelector::parse(".a::before .b").is_err());

        assert_eq!(split_pseudo_element(".a::before"), (".a", Some(PseudoElement::Before)));
        assert_eq!(split_pseudo_element("::after"), ("*", Some(PseudoElement::After)));
        assert_eq!(split_pseudo_element("a:hover"), ("a:hover", None));
    }

    #[test]
    fn test_unsupported_syntax() {
        assert!(SelectorList::parse("a:has(b)").is_err());
        assert!(SelectorList::parse("svg|rect").is_err());
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse("a,").is_err());
    }

    #[test]
    fn test_escaped_class() {
        let sel = ComplexSelector::parse(r".md\:fixed").unwrap();
        assert_eq!(
            sel.compounds[0].1.components[0],
            SelectorComponent::Class("md:fixed".to_string())
        );
    }

    #[test]
    fn test_specificity_of_logical() {
        let spec = ComplexSelector::parse("div:not(#a, .b):where(#c)").unwrap().specificity();
        assert_eq!(spec, Specificity(1, 0, 1));
    }
}
