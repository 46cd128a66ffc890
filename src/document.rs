//! Ordered tree payload carried inside a [`Message`](crate::message::Message).
//!
//! A [`Document`] is the unit of data every task routes, splits, enriches, or
//! rewrites. Nodes have an element name, optional text, a string attribute map,
//! and ordered children. Navigation uses [`NodePath`] index paths so that
//! external path-query evaluators can hand back locations the core can edit
//! (remove a subtree, append a child) without aliasing into the tree.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Root-relative location of a node: the sequence of child indices to follow
/// from the document root. The empty path addresses the root itself.
pub type NodePath = Vec<usize>;

/// An ordered tree node.
///
/// Cloning a `Document` is always a deep copy; routing tasks rely on this when
/// fanning a message out to multiple destinations.
///
/// # Examples
///
/// ```
/// use ductwork::document::Document;
///
/// let doc = Document::element("order")
///     .with_child(
///         Document::element("items")
///             .with_child(Document::element("item"))
///             .with_child(Document::element("item")),
///     );
///
/// assert_eq!(doc.paths_to("item").len(), 2);
/// assert_eq!(doc.node_at(&[0, 1]).map(|n| n.name.as_str()), Some("item"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Element name of this node.
    pub name: String,
    /// Optional text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Attribute map. Insertion order is not significant.
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub attributes: FxHashMap<String, String>,
    /// Ordered child nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Document>,
}

impl Document {
    /// Creates an empty element with the given name.
    #[must_use]
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: sets the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: appends a child node.
    #[must_use]
    pub fn with_child(mut self, child: Document) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: sets an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the attribute value for `key`, if present.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Sets an attribute in place.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Returns the first direct child with the given element name.
    #[must_use]
    pub fn child_named(&self, name: &str) -> Option<&Document> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns the text content of the first direct child with the given name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child_named(name).and_then(|c| c.text.as_deref())
    }

    /// Resolves an index path to a node reference. The empty path is the root.
    #[must_use]
    pub fn node_at(&self, path: &[usize]) -> Option<&Document> {
        let mut node = self;
        for &idx in path {
            node = node.children.get(idx)?;
        }
        Some(node)
    }

    /// Resolves an index path to a mutable node reference.
    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Document> {
        let mut node = self;
        for &idx in path {
            node = node.children.get_mut(idx)?;
        }
        Some(node)
    }

    /// Detaches and returns the subtree at `path`.
    ///
    /// Returns `None` when the path does not resolve or addresses the root
    /// (the root cannot be removed from itself).
    pub fn remove_at(&mut self, path: &[usize]) -> Option<Document> {
        let (&last, parent_path) = path.split_last()?;
        let parent = self.node_at_mut(parent_path)?;
        if last < parent.children.len() {
            Some(parent.children.remove(last))
        } else {
            None
        }
    }

    /// Appends `child` under the node at `path`. Returns `false` when the path
    /// does not resolve.
    pub fn append_child_at(&mut self, path: &[usize], child: Document) -> bool {
        match self.node_at_mut(path) {
            Some(node) => {
                node.children.push(child);
                true
            }
            None => false,
        }
    }

    /// Collects the paths of every descendant (document order, root excluded)
    /// whose element name equals `name`.
    #[must_use]
    pub fn paths_to(&self, name: &str) -> Vec<NodePath> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodePath, &Document)> = vec![(Vec::new(), self)];
        while let Some((path, node)) = stack.pop() {
            // Push children in reverse so the traversal pops them in order.
            for (idx, child) in node.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(idx);
                stack.push((child_path, child));
            }
            if !path.is_empty() && node.name == name {
                out.push(path);
            }
        }
        out
    }
}
