//! An arena document model for annotated HTML trees.
//!
//! The serializer consumes an HTML DOM that was produced from Wikitext and
//! annotated with round-trip metadata. Nodes live in a flat arena owned by
//! [`Document`] and are addressed by [`NodeId`], which keeps tree surgery in
//! the preprocessing pass cheap and borrow-friendly.

pub use builder::DocBuilder;
pub use metadata::{DataParsoid, Dsr, ImageOption};

pub mod builder;
mod metadata;

/// A stable handle to a node in a [`Document`] arena.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NodeId(usize);

/// An HTML attribute, preserving source order inside [`Element::attrs`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attribute {
    /// The attribute name.
    pub key: String,
    /// The attribute value.
    pub value: String,
}

/// The payload of an element node.
#[derive(Clone, Debug, Default)]
pub struct Element {
    /// The lowercase tag name.
    pub name: String,
    /// Attributes in source order.
    pub attrs: Vec<Attribute>,
    /// Decoded round-trip metadata.
    ///
    /// Populated from the `data-parsoid` attribute during preprocessing;
    /// documents built programmatically may fill it in directly.
    pub dp: DataParsoid,
}

impl Element {
    /// Returns the value of the named attribute, if present.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }
}

/// The payload of a document node.
#[derive(Clone, Debug)]
pub enum NodeData {
    /// An element with a tag name, attributes, and metadata.
    Element(Element),
    /// A run of character data.
    Text(String),
    /// An HTML comment, exclusive of the `<!--`/`-->` delimiters.
    Comment(String),
}

/// A node record in the arena.
#[derive(Clone, Debug)]
struct Node {
    /// The parent node, if attached.
    parent: Option<NodeId>,
    /// Child nodes in document order.
    children: Vec<NodeId>,
    /// The node payload.
    data: NodeData,
}

/// An annotated HTML document.
#[derive(Clone, Debug)]
pub struct Document {
    /// The node arena. Nodes are never freed; detached nodes simply become
    /// unreachable from the body.
    nodes: Vec<Node>,
    /// The root `<body>` element.
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document holding only a `<body>` element.
    #[must_use]
    pub fn new() -> Self {
        let body = Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(Element {
                name: "body".to_string(),
                attrs: Vec::new(),
                dp: DataParsoid::default(),
            }),
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
        }
    }

    /// The root `<body>` element.
    #[inline]
    #[must_use]
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// The payload of `id`.
    #[inline]
    #[must_use]
    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    /// The mutable payload of `id`.
    #[inline]
    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0].data
    }

    /// The element payload of `id`, if it is an element.
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    /// The mutable element payload of `id`, if it is an element.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    /// The parent of `id`, if attached.
    #[inline]
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// The children of `id` in document order.
    #[inline]
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// The first child of `id`.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.first().copied()
    }

    /// The last child of `id`.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.last().copied()
    }

    /// The sibling immediately following `id`.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let children = self.children(parent);
        let index = children.iter().position(|child| *child == id)?;
        children.get(index + 1).copied()
    }

    /// Creates a detached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    /// Appends a new node under `parent` and returns its id.
    pub fn append(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.create(data);
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Replaces the child range `range` of `parent` with `replacement`,
    /// fixing up parent pointers. Displaced nodes become detached.
    pub(crate) fn splice_children(
        &mut self,
        parent: NodeId,
        range: core::ops::Range<usize>,
        replacement: Vec<NodeId>,
    ) {
        let removed = self.nodes[parent.0]
            .children
            .splice(range, replacement.iter().copied())
            .collect::<Vec<_>>();
        for id in removed {
            self.nodes[id.0].parent = None;
        }
        for id in replacement {
            self.nodes[id.0].parent = Some(parent);
        }
    }

    /// The tag name of `id` if it is an element.
    #[must_use]
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    /// Whether `id` is an element named `name`.
    #[must_use]
    pub fn is_element_named(&self, id: NodeId, name: &str) -> bool {
        self.tag_name(id) == Some(name)
    }

    /// The value of the named attribute of `id`.
    #[must_use]
    pub fn attr<'a>(&'a self, id: NodeId, key: &str) -> Option<&'a str> {
        self.element(id).and_then(|element| element.attr(key))
    }

    /// The `typeof` attribute of `id`.
    #[must_use]
    pub fn type_of(&self, id: NodeId) -> Option<&str> {
        self.attr(id, "typeof")
    }

    /// The `about` attribute of `id`.
    #[must_use]
    pub fn about(&self, id: NodeId) -> Option<&str> {
        self.attr(id, "about")
    }

    /// The round-trip metadata of `id`; a default record for non-elements.
    #[must_use]
    pub fn dp(&self, id: NodeId) -> &DataParsoid {
        static EMPTY: std::sync::LazyLock<DataParsoid> = std::sync::LazyLock::new(DataParsoid::default);
        self.element(id).map_or(&EMPTY, |element| &element.dp)
    }

    /// Whether `id` is a text node consisting only of whitespace.
    #[must_use]
    pub fn is_whitespace_text(&self, id: NodeId) -> bool {
        matches!(
            self.data(id),
            NodeData::Text(text) if text.chars().all(char::is_whitespace)
        )
    }

    /// The nearest ancestor of `id` (inclusive) that is a block element.
    #[must_use]
    pub(crate) fn block_scope(&self, id: NodeId) -> NodeId {
        let mut current = id;
        loop {
            if let Some(name) = self.tag_name(current)
                && crate::serializer::config::BLOCK_TAGS.contains(name)
            {
                return current;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Concatenates the character data of `id` and all of its descendants.
    #[must_use]
    pub fn inline_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.gather_text(id, &mut out);
        out
    }

    /// Accumulates descendant character data into `out`.
    fn gather_text(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Comment(_) => {}
            NodeData::Element(_) => {
                for child in self.children(id) {
                    self.gather_text(*child, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_surgery_detaches_nodes() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.append(body, NodeData::Element(Element {
            name: "p".into(),
            ..Element::default()
        }));
        let a = doc.append(p, NodeData::Text("a".into()));
        let b = doc.append(p, NodeData::Text("b".into()));
        let c = doc.append(p, NodeData::Text("c".into()));
        assert_eq!(doc.children(p), &[a, b, c]);

        let merged = doc.create(NodeData::Text("ab".into()));
        doc.splice_children(p, 0..2, vec![merged]);
        assert_eq!(doc.children(p), &[merged, c]);
        assert_eq!(doc.parent(a), None);
        assert_eq!(doc.parent(merged), Some(p));
    }

    #[test]
    fn inline_text_skips_comments() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.append(body, NodeData::Element(Element {
            name: "p".into(),
            ..Element::default()
        }));
        doc.append(p, NodeData::Text("a".into()));
        doc.append(p, NodeData::Comment("x".into()));
        let b = doc.append(p, NodeData::Element(Element {
            name: "b".into(),
            ..Element::default()
        }));
        doc.append(b, NodeData::Text("c".into()));
        assert_eq!(doc.inline_text(p), "ac");
    }
}
