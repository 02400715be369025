//! Schema access: the provider capability, class/field descriptors, and the
//! JSON-backed model that implements it.

pub mod descriptor;
pub mod model;

pub use descriptor::{ClassDescriptor, FieldDescriptor, FieldKind, SchemaProvider};
pub use model::{AttributeDef, ClassDef, Model, ModelDef, ReferenceDef, ID_FIELD};
