//! Document - High-level document API

use crate::{DomResult, DomTree, NodeId};

/// Document loading state (`document.readyState`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Interactive => "interactive",
            Self::Complete => "complete",
        }
    }
}

/// HTML Document
#[derive(Debug, Clone)]
pub struct Document {
    /// The DOM tree
    pub tree: DomTree,
    /// Document URL
    url: String,
    html_element: NodeId,
    head_element: NodeId,
    body_element: NodeId,
    /// Element holding focus
    pub focused: Option<NodeId>,
    /// Element under the pointer
    pub hovered: Option<NodeId>,
    pub ready_state: ReadyState,
}

impl Document {
    /// Create a new document with html/head/body
    pub fn new(url: &str) -> Self {
        let mut doc = Self::empty(url);
        let html = doc.tree.create_element("html");
        let head = doc.tree.create_element("head");
        let body = doc.tree.create_element("body");

        // Fresh detached nodes never violate the hierarchy
        let root = doc.tree.root();
        let _ = doc.tree.append_child(root, html);
        let _ = doc.tree.append_child(html, head);
        let _ = doc.tree.append_child(html, body);
        doc.finalize();
        doc
    }

    /// Create an empty document (no structure)
    pub fn empty(url: &str) -> Self {
        Self {
            tree: DomTree::new(),
            url: url.to_string(),
            html_element: NodeId::NONE,
            head_element: NodeId::NONE,
            body_element: NodeId::NONE,
            focused: None,
            hovered: None,
            ready_state: ReadyState::Loading,
        }
    }

    /// Get document URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Locate html/head/body after the tree was built externally
    pub fn finalize(&mut self) {
        let root = self.tree.root();
        self.html_element = self
            .tree
            .element_children(root)
            .find(|&id| self.tree.element(id).is_some_and(|e| e.tag == "html"))
            .unwrap_or(NodeId::NONE);
        if !self.html_element.is_valid() {
            return;
        }
        for child in self.tree.element_children(self.html_element) {
            match self.tree.element(child).map(|e| e.tag.as_str()) {
                Some("head") if !self.head_element.is_valid() => self.head_element = child,
                Some("body") if !self.body_element.is_valid() => self.body_element = child,
                _ => {}
            }
        }
    }

    /// Get <html> element
    pub fn document_element(&self) -> Option<NodeId> {
        self.html_element.to_option()
    }

    /// Get <head> element
    pub fn head(&self) -> Option<NodeId> {
        self.head_element.to_option()
    }

    /// Get <body> element
    pub fn body(&self) -> Option<NodeId> {
        self.body_element.to_option()
    }

    /// Get the first connected element with the given id
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree
            .descendants(self.tree.root())
            .find(|&n| self.tree.element(n).and_then(|e| e.id()) == Some(id))
    }

    /// Whether the node is still attached to this document
    pub fn contains(&self, node: NodeId) -> bool {
        self.tree.is_connected(node)
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.tree.create_element(tag)
    }

    /// Append an element to <head>, falling back to the root element
    pub fn append_to_head(&mut self, node: NodeId) -> DomResult<()> {
        let parent = self
            .head()
            .or(self.document_element())
            .unwrap_or(self.tree.root());
        self.tree.append_child(parent, node)
    }

    /// All connected elements in tree order
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.tree
            .descendants(self.tree.root())
            .filter(|&n| self.tree.element(n).is_some())
    }

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Access the DOM tree mutably
    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}
