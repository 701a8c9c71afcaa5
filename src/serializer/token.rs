//! The intermediate token stream between the DOM walk and text emission.
//!
//! Tokens are ephemeral: a handler creates one from a DOM node, the token
//! serializer consumes it immediately, and nothing retains it afterwards
//! except the sliding look-behind window in the serializer state.

use crate::dom::{Attribute, DataParsoid, NodeId};

/// The element part of a start, end, or self-closing token.
#[derive(Clone, Debug, Default)]
pub(crate) struct Tag {
    /// The lowercase tag name.
    pub name: String,
    /// Attributes in source order.
    pub attrs: Vec<Attribute>,
    /// Round-trip metadata copied from the originating element.
    pub dp: DataParsoid,
    /// The DOM node this token was synthesized from, when there is one.
    pub node: Option<NodeId>,
}

impl Tag {
    /// Creates a tag token part for the given element data.
    pub fn new(name: &str, attrs: &[Attribute], dp: &DataParsoid, node: NodeId) -> Self {
        Self {
            name: name.to_string(),
            attrs: attrs.to_vec(),
            dp: dp.clone(),
            node: Some(node),
        }
    }

    /// The value of the named attribute.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }
}

/// A serializer token.
#[derive(Clone, Debug, Default)]
pub(crate) enum Token {
    /// An element start tag.
    StartTag(Tag),
    /// An element end tag.
    EndTag(Tag),
    /// A self-closing (void or meta) tag.
    SelfClosing(Tag),
    /// A run of character data.
    Text(String),
    /// An HTML comment, exclusive of delimiters.
    Comment(String),
    /// A context-sensitive newline.
    Newline,
    /// End of the token stream.
    #[default]
    Eof,
}

impl Token {
    /// The tag part of the token, if it has one.
    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Token::StartTag(tag) | Token::EndTag(tag) | Token::SelfClosing(tag) => Some(tag),
            _ => None,
        }
    }

    /// The tag name of the token, if it has one.
    pub fn tag_name(&self) -> Option<&str> {
        self.tag().map(|tag| tag.name.as_str())
    }

    /// Whether this token is a start tag named `name`.
    pub fn is_start_of(&self, name: &str) -> bool {
        matches!(self, Token::StartTag(tag) if tag.name == name)
    }

    /// Whether this token is an end tag named `name`.
    pub fn is_end_of(&self, name: &str) -> bool {
        matches!(self, Token::EndTag(tag) if tag.name == name)
    }
}
