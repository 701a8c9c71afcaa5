#![doc = include_str!("../README.md")]
#![warn(
    clippy::pedantic,
    clippy::missing_docs_in_private_items,
    missing_docs,
    rust_2018_idioms
)]

pub use dom::{Attribute, DataParsoid, DocBuilder, Document, Dsr, Element, ImageOption, NodeData, NodeId};
pub use serializer::{
    ChunkSink, Environment, Error, FnSink, Options, Page, Result, TraceFlags, serialize,
    serialize_to_string,
};

pub mod dom;
mod serializer;
mod title;
