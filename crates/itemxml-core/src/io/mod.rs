//! Serialization of item sequences.

pub mod xml;

pub use xml::{write_document, write_itemsxml, XmlWriter};
