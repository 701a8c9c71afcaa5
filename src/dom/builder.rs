//! Programmatic construction of annotated documents.
//!
//! The upstream parser normally produces the DOM; tests and embedders use
//! this builder to assemble equivalent trees by hand.

use super::{Attribute, DataParsoid, Document, Element, NodeData, NodeId};

/// A depth-tracking document builder.
///
/// ```
/// # use rewiki::dom::builder::DocBuilder;
/// let doc = DocBuilder::new()
///     .open("p")
///     .text("hello")
///     .close()
///     .finish();
/// ```
#[derive(Debug)]
pub struct DocBuilder {
    /// The document under construction.
    doc: Document,
    /// The stack of currently open elements.
    stack: Vec<NodeId>,
}

impl Default for DocBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocBuilder {
    /// Creates a builder positioned inside a fresh `<body>`.
    #[must_use]
    pub fn new() -> Self {
        let doc = Document::new();
        let body = doc.body();
        Self {
            doc,
            stack: vec![body],
        }
    }

    /// The innermost open element.
    fn top(&self) -> NodeId {
        *self.stack.last().expect("unbalanced builder stack")
    }

    /// Opens a child element.
    #[must_use]
    pub fn open(mut self, name: &str) -> Self {
        let id = self.doc.append(
            self.top(),
            NodeData::Element(Element {
                name: name.to_string(),
                ..Element::default()
            }),
        );
        self.stack.push(id);
        self
    }

    /// Adds an attribute to the innermost open element.
    #[must_use]
    pub fn attr(mut self, key: &str, value: &str) -> Self {
        let top = self.top();
        self.doc
            .element_mut(top)
            .expect("attribute outside element")
            .attrs
            .push(Attribute {
                key: key.to_string(),
                value: value.to_string(),
            });
        self
    }

    /// Replaces the round-trip metadata of the innermost open element.
    #[must_use]
    pub fn dp(mut self, dp: DataParsoid) -> Self {
        let top = self.top();
        self.doc.element_mut(top).expect("metadata outside element").dp = dp;
        self
    }

    /// Adds a text child.
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.doc.append(self.top(), NodeData::Text(text.to_string()));
        self
    }

    /// Adds a comment child.
    #[must_use]
    pub fn comment(mut self, text: &str) -> Self {
        self.doc
            .append(self.top(), NodeData::Comment(text.to_string()));
        self
    }

    /// Closes the innermost open element.
    #[must_use]
    pub fn close(mut self) -> Self {
        assert!(self.stack.len() > 1, "closed more elements than opened");
        self.stack.pop();
        self
    }

    /// Finishes the document.
    ///
    /// # Panics
    ///
    /// If any element other than the implicit `<body>` remains open.
    #[must_use]
    pub fn finish(self) -> Document {
        assert!(self.stack.len() == 1, "unclosed element at finish");
        self.doc
    }
}
