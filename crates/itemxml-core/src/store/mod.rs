//! Item storage: the document that allocates ids and owns created items.

pub mod document;

pub use document::Document;
