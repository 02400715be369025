//! JSON-backed object-relational model.
//!
//! A model definition lists classes and interfaces with their parents and
//! their own attributes, references and collections. Loading resolves every
//! class once, up front: inherited fields are merged in and the full ancestor
//! set is computed, so lookups and `isa` tests afterwards are plain map reads.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{ItemXmlError, ItemXmlResult};
use crate::schema::descriptor::{ClassDescriptor, FieldDescriptor, SchemaProvider};

/// Name of the attribute every class carries implicitly.
pub const ID_FIELD: &str = "id";

// ---------------------------------------------------------------------------
// Definition format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    #[serde(default)]
    pub classes: Vec<ClassDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    #[serde(default)]
    pub references: Vec<ReferenceDef>,
    #[serde(default)]
    pub collections: Vec<ReferenceDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub attribute_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDef {
    pub name: String,
    pub referenced_type: String,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A fully resolved model, usable as a [`SchemaProvider`].
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    classes: IndexMap<String, Arc<ClassDescriptor>>,
}

impl Model {
    pub fn from_def(def: ModelDef) -> ItemXmlResult<Self> {
        let mut defs: IndexMap<String, ClassDef> = IndexMap::new();
        for class in def.classes {
            if defs.contains_key(&class.name) {
                return Err(ItemXmlError::Schema(format!(
                    "class {} is defined more than once",
                    class.name
                )));
            }
            defs.insert(class.name.clone(), class);
        }
        check_references(&defs)?;

        let mut resolved: HashMap<String, Arc<ClassDescriptor>> = HashMap::new();
        let mut visiting: Vec<String> = Vec::new();
        let mut classes = IndexMap::new();
        for name in defs.keys() {
            let cd = resolve_class(name, &defs, &mut resolved, &mut visiting)?;
            classes.insert(name.clone(), cd);
        }

        info!(model = %def.name, classes = classes.len(), "Loaded model");
        Ok(Self {
            name: def.name,
            classes,
        })
    }

    pub fn from_json(json: &str) -> ItemXmlResult<Self> {
        let def: ModelDef = serde_json::from_str(json)?;
        Self::from_def(def)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ItemXmlResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class names in definition order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl SchemaProvider for Model {
    fn get_class(&self, name: &str) -> ItemXmlResult<Arc<ClassDescriptor>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| ItemXmlError::UnknownClass(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Every parent and every typed field must name a defined class.
fn check_references(defs: &IndexMap<String, ClassDef>) -> ItemXmlResult<()> {
    for def in defs.values() {
        for parent in &def.extends {
            if !defs.contains_key(parent) {
                return Err(ItemXmlError::Schema(format!(
                    "class {} extends unknown class {}",
                    def.name, parent
                )));
            }
        }
        for field in def.references.iter().chain(def.collections.iter()) {
            if !defs.contains_key(&field.referenced_type) {
                return Err(ItemXmlError::Schema(format!(
                    "field {}.{} refers to unknown class {}",
                    def.name, field.name, field.referenced_type
                )));
            }
        }
    }
    Ok(())
}

fn resolve_class(
    name: &str,
    defs: &IndexMap<String, ClassDef>,
    resolved: &mut HashMap<String, Arc<ClassDescriptor>>,
    visiting: &mut Vec<String>,
) -> ItemXmlResult<Arc<ClassDescriptor>> {
    if let Some(cd) = resolved.get(name) {
        return Ok(Arc::clone(cd));
    }
    if visiting.iter().any(|v| v == name) {
        return Err(ItemXmlError::Schema(format!(
            "inheritance cycle: {} -> {}",
            visiting.join(" -> "),
            name
        )));
    }
    let def = defs
        .get(name)
        .ok_or_else(|| ItemXmlError::UnknownClass(name.to_string()))?;

    let mut ancestors = BTreeSet::new();
    let mut fields: IndexMap<String, FieldDescriptor> = IndexMap::new();
    fields.insert(
        ID_FIELD.to_string(),
        FieldDescriptor::attribute(ID_FIELD, Some("java.lang.Integer".to_string())),
    );

    visiting.push(name.to_string());
    for parent in &def.extends {
        let parent_cd = resolve_class(parent, defs, resolved, visiting)?;
        ancestors.extend(parent_cd.ancestors().cloned());
        for field in parent_cd.fields() {
            fields.insert(field.name.clone(), field.clone());
        }
    }
    visiting.pop();

    // Own definitions shadow inherited ones.
    for attr in &def.attributes {
        fields.insert(
            attr.name.clone(),
            FieldDescriptor::attribute(&attr.name, attr.attribute_type.clone()),
        );
    }
    for reference in &def.references {
        fields.insert(
            reference.name.clone(),
            FieldDescriptor::reference(&reference.name, &reference.referenced_type),
        );
    }
    for collection in &def.collections {
        fields.insert(
            collection.name.clone(),
            FieldDescriptor::collection(&collection.name, &collection.referenced_type),
        );
    }

    let cd = Arc::new(ClassDescriptor::new(
        name,
        def.is_interface,
        ancestors,
        fields,
    ));
    resolved.insert(name.to_string(), Arc::clone(&cd));
    Ok(cd)
}
