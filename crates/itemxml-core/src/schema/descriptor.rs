//! Class and field descriptors, and the capability trait through which items
//! consult a schema.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{ItemXmlError, ItemXmlResult};

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

/// The three shapes a field can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// A scalar value.
    Attribute,
    /// Exactly one item.
    Reference,
    /// A set of items.
    Collection,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Attribute => "attribute",
            FieldKind::Reference => "reference",
            FieldKind::Collection => "collection",
        }
    }
}

/// A named field on a class.
///
/// `type_class` names the class a reference or collection holds; it is `None`
/// for attributes. `attribute_type` is the declared scalar type, kept for
/// reporting only: scalar values are never checked against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub type_class: Option<String>,
    pub attribute_type: Option<String>,
}

impl FieldDescriptor {
    pub fn attribute(name: impl Into<String>, attribute_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Attribute,
            type_class: None,
            attribute_type,
        }
    }

    pub fn reference(name: impl Into<String>, type_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Reference,
            type_class: Some(type_class.into()),
            attribute_type: None,
        }
    }

    pub fn collection(name: impl Into<String>, type_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Collection,
            type_class: Some(type_class.into()),
            attribute_type: None,
        }
    }

    /// True when the field holds items rather than scalars.
    pub fn is_typed(&self) -> bool {
        self.type_class.is_some()
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.type_class, &self.attribute_type) {
            (Some(class), _) => write!(f, "{} is a {} of {}", self.name, self.kind.as_str(), class),
            (None, Some(ty)) => write!(f, "{} is an attribute of type {}", self.name, ty),
            (None, None) => write!(f, "{} is an attribute", self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Class descriptors
// ---------------------------------------------------------------------------

/// A resolved class or interface: its complete field set (own and inherited)
/// and every class it is a subtype of, itself included.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    name: String,
    is_interface: bool,
    ancestors: BTreeSet<String>,
    fields: IndexMap<String, FieldDescriptor>,
}

impl ClassDescriptor {
    pub fn new(
        name: impl Into<String>,
        is_interface: bool,
        ancestors: BTreeSet<String>,
        fields: IndexMap<String, FieldDescriptor>,
    ) -> Self {
        let name = name.into();
        let mut ancestors = ancestors;
        ancestors.insert(name.clone());
        Self {
            name,
            is_interface,
            ancestors,
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    /// Reflexive, transitive subtype test against a class name.
    pub fn isa(&self, other: &str) -> bool {
        self.ancestors.contains(other)
    }

    pub fn ancestors(&self) -> impl Iterator<Item = &String> {
        self.ancestors.iter()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn get_field(&self, name: &str) -> ItemXmlResult<&FieldDescriptor> {
        self.field(name).ok_or_else(|| ItemXmlError::UnknownField {
            field: name.to_string(),
            classes: self.name.clone(),
        })
    }

    /// Fields in declaration order, inherited ones first.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }
}

impl PartialEq for ClassDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassDescriptor {}

impl Hash for ClassDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Provider capability
// ---------------------------------------------------------------------------

/// Resolves class names against an object-relational schema.
///
/// Implementations fail with [`ItemXmlError::UnknownClass`] for names the
/// schema does not define.
pub trait SchemaProvider {
    fn get_class(&self, name: &str) -> ItemXmlResult<Arc<ClassDescriptor>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee() -> ClassDescriptor {
        let mut fields = IndexMap::new();
        fields.insert(
            "name".to_string(),
            FieldDescriptor::attribute("name", Some("java.lang.String".into())),
        );
        fields.insert(
            "department".to_string(),
            FieldDescriptor::reference("department", "Department"),
        );
        let ancestors = ["Employable", "HasAddress"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        ClassDescriptor::new("Employee", false, ancestors, fields)
    }

    #[test]
    fn test_isa_is_reflexive() {
        let cd = employee();
        assert!(cd.isa("Employee"));
        assert!(cd.isa("Employable"));
        assert!(!cd.isa("Department"));
    }

    #[test]
    fn test_get_field() {
        let cd = employee();
        let fd = cd.get_field("department").unwrap();
        assert_eq!(fd.kind, FieldKind::Reference);
        assert_eq!(fd.type_class.as_deref(), Some("Department"));
        assert!(fd.is_typed());

        let err = cd.get_field("salary").unwrap_err();
        assert!(matches!(err, ItemXmlError::UnknownField { ref field, .. } if field == "salary"));
    }

    #[test]
    fn test_field_display() {
        let fd = FieldDescriptor::collection("employees", "Employee");
        assert_eq!(fd.to_string(), "employees is a collection of Employee");
        let fd = FieldDescriptor::attribute("age", Some("int".into()));
        assert_eq!(fd.to_string(), "age is an attribute of type int");
    }
}
