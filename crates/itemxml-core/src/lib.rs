//! itemxml core library.
//!
//! Turns loosely-typed records into schema-validated [`Item`]s and writes them
//! as a canonical items XML document for bulk loading into a data warehouse.
//!
//! - [`schema`] resolves class names to descriptors ([`SchemaProvider`]), with
//!   a JSON-backed [`Model`] as the concrete provider.
//! - [`item`] holds the typed property bag and all validation.
//! - [`store`] allocates ids and retains created items ([`Document`]).
//! - [`io`] serializes item sequences, writing each item id once.
//!
//! ```no_run
//! use std::sync::Arc;
//! use itemxml_core::{Document, Model, Value, WriterConfig};
//!
//! # fn main() -> itemxml_core::ItemXmlResult<()> {
//! let model = Arc::new(Model::from_path("testmodel.json")?);
//! let mut doc = Document::new(model);
//! let big = doc.add_with(["Department"], [("name", Value::from("Big"))])?.to_ref()?;
//! doc.add_with(["Employee"], [("name", Value::from("Tom"))])?
//!     .set("department", big)?;
//! itemxml_core::io::write_itemsxml(&doc, None, &WriterConfig::from_env())?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod io;
pub mod item;
pub mod models;
pub mod schema;
pub mod store;

pub use config::WriterConfig;
pub use errors::{ErrorKind, ItemXmlError, ItemXmlResult};
pub use item::Item;
pub use models::{ItemId, ItemRef, ItemSet, Value};
pub use schema::{ClassDescriptor, FieldDescriptor, FieldKind, Model, SchemaProvider};
pub use store::Document;
