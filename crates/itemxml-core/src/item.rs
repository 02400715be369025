//! Items: typed property bags validated against a schema.
//!
//! An item is created *unvalidated*. [`Item::validate`] resolves its declared
//! class names against the [`SchemaProvider`] and checks every property it
//! carries; on success the item is *valid*. A failed check never mutates the
//! item, so there is no invalid resting state. The resolved class set and the
//! merged field map are computed once and kept for the item's lifetime.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use crate::errors::{ItemXmlError, ItemXmlResult};
use crate::models::{ItemId, ItemRef, ItemSet, Value};
use crate::schema::{ClassDescriptor, FieldDescriptor, FieldKind, SchemaProvider, ID_FIELD};

// ---------------------------------------------------------------------------
// Resolved type
// ---------------------------------------------------------------------------

/// The classes an item's names resolve to, and the union of their fields.
#[derive(Debug)]
struct ResolvedType {
    classes: Arc<[Arc<ClassDescriptor>]>,
    fields: IndexMap<String, FieldDescriptor>,
}

impl ResolvedType {
    fn resolve(model: &dyn SchemaProvider, classnames: &BTreeSet<String>) -> ItemXmlResult<Self> {
        let mut classes = Vec::with_capacity(classnames.len());
        let mut fields: IndexMap<String, FieldDescriptor> = IndexMap::new();
        for name in classnames {
            let cd = model.get_class(name)?;
            for field in cd.fields() {
                // First definition of a name is kept; conflicts are the schema's concern.
                fields
                    .entry(field.name.clone())
                    .or_insert_with(|| field.clone());
            }
            classes.push(cd);
        }
        Ok(Self {
            classes: classes.into(),
            fields,
        })
    }
}

fn mismatch(value: &impl fmt::Display, field: &FieldDescriptor) -> ItemXmlError {
    ItemXmlError::PropertyMismatch {
        value: value.to_string(),
        field: field.to_string(),
    }
}

impl ItemRef {
    /// True iff this item may be stored in `field`.
    pub fn is_assignable_to(&self, field: &FieldDescriptor) -> bool {
        field
            .type_class
            .as_deref()
            .is_some_and(|type_class| self.isa(type_class))
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A record to be loaded into the warehouse and merged with others.
pub struct Item {
    model: Arc<dyn SchemaProvider>,
    id: ItemId,
    classnames: BTreeSet<String>,
    properties: IndexMap<String, Value>,
    resolved: OnceCell<ResolvedType>,
    valid: bool,
}

impl Item {
    pub fn new<I, S>(model: Arc<dyn SchemaProvider>, id: ItemId, classnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_properties(model, id, classnames, Vec::<(String, Value)>::new())
    }

    /// Build an item from initial properties. Any `id` entry is replaced by
    /// the item's own id.
    pub fn with_properties<I, S, P, K>(
        model: Arc<dyn SchemaProvider>,
        id: ItemId,
        classnames: I,
        properties: P,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        P: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut props: IndexMap<String, Value> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        props.insert(ID_FIELD.to_string(), Value::Int(id as i64));
        Self {
            model,
            id,
            classnames: classnames.into_iter().map(Into::into).collect(),
            properties: props,
            resolved: OnceCell::new(),
            valid: false,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn classnames(&self) -> &BTreeSet<String> {
        &self.classnames
    }

    /// Stored properties in insertion order, `id` included.
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    // -- validation ----------------------------------------------------------

    /// Check the item's type and every property it carries.
    pub fn validate(&mut self) -> ItemXmlResult<()> {
        let outcome = self.validate_type().and_then(|_| self.validate_properties());
        match outcome {
            Ok(()) => {
                self.valid = true;
                Ok(())
            }
            Err(err) => {
                warn!(item = self.id, error = %err, "Item failed validation");
                Err(err)
            }
        }
    }

    /// Resolve the declared class names; fails with `NoType` when there are
    /// none and with `UnknownClass` for names the schema lacks.
    pub fn validate_type(&self) -> ItemXmlResult<()> {
        self.resolved().map(|_| ())
    }

    pub fn validate_properties(&self) -> ItemXmlResult<()> {
        for (name, value) in &self.properties {
            self.validate_property(name, value)?;
        }
        Ok(())
    }

    fn resolved(&self) -> ItemXmlResult<&ResolvedType> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }
        if self.classnames.is_empty() {
            return Err(ItemXmlError::NoType);
        }
        let resolved = ResolvedType::resolve(self.model.as_ref(), &self.classnames)?;
        Ok(self.resolved.get_or_init(|| resolved))
    }

    pub fn get_field_descriptor(&self, name: &str) -> ItemXmlResult<&FieldDescriptor> {
        let resolved = self.resolved()?;
        resolved
            .fields
            .get(name)
            .ok_or_else(|| ItemXmlError::UnknownField {
                field: name.to_string(),
                classes: self.joined_classnames(", "),
            })
    }

    /// Check that `value` may be stored under `name`, returning the field.
    pub fn validate_property(&self, name: &str, value: &Value) -> ItemXmlResult<&FieldDescriptor> {
        let fd = self.get_field_descriptor(name)?;
        match fd.kind {
            _ if !fd.is_typed() => {
                if value.is_item_valued() {
                    return Err(mismatch(value, fd));
                }
            }
            FieldKind::Collection => match value {
                Value::Items(members) => check_members(members, fd)?,
                other => return Err(mismatch(other, fd)),
            },
            _ => match value {
                Value::Null => {}
                Value::Item(target) if target.is_assignable_to(fd) => {}
                other => return Err(mismatch(other, fd)),
            },
        }
        Ok(fd)
    }

    pub fn is_assignable_to(&self, field: &FieldDescriptor) -> ItemXmlResult<bool> {
        Ok(self.to_ref()?.is_assignable_to(field))
    }

    // -- accessors -----------------------------------------------------------

    /// Store a validated value. Collections are held as sets; other values
    /// are stored as given. A rejected value leaves the item untouched.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ItemXmlResult<()> {
        let value = value.into();
        if name == ID_FIELD {
            let fd = self.get_field_descriptor(name)?;
            return Err(mismatch(&value, fd));
        }
        self.validate_property(name, &value)?;
        self.properties.insert(name.to_string(), value);
        Ok(())
    }

    /// Read a property. Unset collections read as an empty set, other unset
    /// fields as `Null`; names outside the schema are an error.
    pub fn get(&self, name: &str) -> ItemXmlResult<Cow<'_, Value>> {
        let kind = self.get_field_descriptor(name)?.kind;
        Ok(match self.properties.get(name) {
            Some(value) => Cow::Borrowed(value),
            None if kind == FieldKind::Collection => Cow::Owned(Value::Items(ItemSet::new())),
            None => Cow::Owned(Value::Null),
        })
    }

    /// Add members to a collection. All members are checked before anything
    /// changes; members already present collapse.
    pub fn add_to<I>(&mut self, collection: &str, members: I) -> ItemXmlResult<()>
    where
        I: IntoIterator<Item = ItemRef>,
    {
        let members: ItemSet = members.into_iter().collect();
        {
            let fd = self.get_field_descriptor(collection)?;
            if fd.kind != FieldKind::Collection {
                return Err(mismatch(&Value::Items(members), fd));
            }
            check_members(&members, fd)?;
        }
        match self.properties.get_mut(collection) {
            Some(Value::Items(existing)) => existing.extend(members),
            _ => {
                self.properties
                    .insert(collection.to_string(), Value::Items(members));
            }
        }
        Ok(())
    }

    /// A handle other items can hold in references and collections.
    pub fn to_ref(&self) -> ItemXmlResult<ItemRef> {
        let resolved = self.resolved()?;
        Ok(ItemRef::new(self.id, Arc::clone(&resolved.classes)))
    }

    pub fn classes(&self) -> ItemXmlResult<&[Arc<ClassDescriptor>]> {
        Ok(&self.resolved()?.classes[..])
    }

    /// True if the item was declared as `class_name` or any of its classes
    /// is a subtype of it.
    pub fn isa(&self, class_name: &str) -> bool {
        self.classnames.contains(class_name)
            || self
                .resolved()
                .map(|r| r.classes.iter().any(|cd| cd.isa(class_name)))
                .unwrap_or(false)
    }

    /// The concrete class name, when the item resolves to exactly one class
    /// and that class is not an interface.
    pub fn classname(&self) -> ItemXmlResult<Option<&str>> {
        Ok(self.single_concrete()?.map(|cd| cd.name()))
    }

    /// Interface names the item declares; empty when it has a concrete class.
    pub fn implements(&self) -> ItemXmlResult<Vec<&str>> {
        if self.single_concrete()?.is_some() {
            return Ok(Vec::new());
        }
        Ok(self.classnames.iter().map(String::as_str).collect())
    }

    fn single_concrete(&self) -> ItemXmlResult<Option<&Arc<ClassDescriptor>>> {
        let classes = &self.resolved()?.classes;
        Ok(match &classes[..] {
            [only] if !only.is_interface() => Some(only),
            _ => None,
        })
    }

    fn joined_classnames(&self, sep: &str) -> String {
        self.classnames
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(sep)
    }
}

fn check_members(members: &ItemSet, fd: &FieldDescriptor) -> ItemXmlResult<()> {
    match members.iter().find(|m| !m.is_assignable_to(fd)) {
        Some(offender) => Err(mismatch(offender, fd)),
        None => Ok(()),
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props: Vec<String> = self
            .properties
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        write!(
            f,
            "<Item classes=[{}], properties={{{}}}>",
            self.joined_classnames(", "),
            props.join(", ")
        )
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("id", &self.id)
            .field("classnames", &self.classnames)
            .field("properties", &self.properties)
            .field("valid", &self.valid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::schema::model::tests::test_model;

    fn item(id: ItemId, classes: &[&str], props: Vec<(&str, Value)>) -> Item {
        Item::with_properties(test_model(), id, classes.iter().copied(), props)
    }

    fn valid(id: ItemId, classes: &[&str]) -> Item {
        let mut it = item(id, classes, vec![]);
        it.validate().unwrap();
        it
    }

    #[test]
    fn test_validate_good_item() {
        let mut good = item(
            1,
            &["Employee", "Broke"],
            vec![("name", "John".into()), ("debt", 100.into())],
        );
        assert!(!good.is_valid());
        good.validate().unwrap();
        assert!(good.is_valid());
        assert_eq!(good.properties().get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_validate_unknown_field() {
        let mut bad = item(1, &["Employee"], vec![("debt", 100.into())]);
        let err = bad.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);
        assert!(err.to_string().contains("debt"));
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_validate_unknown_class() {
        let mut terrible = item(1, &["Foo"], vec![("name", "John".into())]);
        let err = terrible.validate().unwrap_err();
        assert!(matches!(err, ItemXmlError::UnknownClass(ref name) if name == "Foo"));
    }

    #[test]
    fn test_validate_no_type() {
        let mut woeful = item(1, &[], vec![("name", "John".into())]);
        assert_eq!(woeful.validate().unwrap_err().kind(), ErrorKind::NoType);
        assert_eq!(woeful.validate_type().unwrap_err().kind(), ErrorKind::NoType);
    }

    #[test]
    fn test_set_and_get_attribute() {
        let mut brian = valid(1, &["Employee", "Broke"]);
        brian.set("debt", 200).unwrap();
        assert_eq!(brian.get("debt").unwrap().as_int(), Some(200));
    }

    #[test]
    fn test_set_unknown_field_leaves_item_unchanged() {
        let mut brian = item(1, &["Employee"], vec![("name", "Brian".into())]);
        brian.validate().unwrap();
        let before = brian.to_string();
        let err = brian.set("perversity", f64::INFINITY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);
        assert_eq!(brian.to_string(), before);
    }

    #[test]
    fn test_get_unset_fields() {
        let dep = valid(1, &["Department"]);
        assert!(dep.get("name").unwrap().is_null());
        assert!(dep.get("manager").unwrap().is_null());
        let employees = dep.get("employees").unwrap();
        assert_eq!(employees.as_items().map(|s| s.len()), Some(0));
        assert_eq!(dep.get("perversity").unwrap_err().kind(), ErrorKind::UnknownField);
    }

    #[test]
    fn test_reference_must_be_assignable() {
        let big = valid(0, &["Department"]);
        let corp = valid(1, &["Company"]);
        let mut tom = valid(2, &["Employee"]);

        tom.set("department", big.to_ref().unwrap()).unwrap();
        assert_eq!(tom.get("department").unwrap().as_item().map(ItemRef::id), Some(0));

        let err = tom.set("department", corp.to_ref().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyMismatch);
        assert_eq!(tom.get("department").unwrap().as_item().map(ItemRef::id), Some(0));

        let err = tom.set("department", "Big").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyMismatch);

        tom.set("department", Value::Null).unwrap();
        assert!(tom.get("department").unwrap().is_null());
    }

    #[test]
    fn test_attribute_rejects_items() {
        let big = valid(0, &["Department"]);
        let mut tom = valid(1, &["Employee"]);
        let err = tom.set("name", big.to_ref().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyMismatch);
        assert!(tom.get("name").unwrap().is_null());
    }

    #[test]
    fn test_collection_normalizes_to_set() {
        let tom = valid(1, &["Employee"]).to_ref().unwrap();
        let dick = valid(2, &["Employee"]).to_ref().unwrap();
        let mut dep = valid(0, &["Department"]);

        dep.set("employees", vec![dick.clone(), tom.clone(), dick.clone()])
            .unwrap();
        let stored = dep.get("employees").unwrap().into_owned();
        assert_eq!(stored, Value::from(vec![tom, dick]));
        assert_eq!(stored.as_items().map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_collection_rejects_scalars_and_wrong_members() {
        let corp = valid(9, &["Company"]).to_ref().unwrap();
        let mut dep = valid(0, &["Department"]);

        let err = dep.set("employees", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyMismatch);
        let err = dep.set("employees", Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyMismatch);

        let err = dep.set("employees", vec![corp]).unwrap_err();
        assert!(err.to_string().contains("Item(9, [Company])"));
    }

    #[test]
    fn test_subtypes_are_assignable() {
        let boss = valid(3, &["Manager"]);
        let mut dep = valid(1, &["Department"]);
        let field = dep.get_field_descriptor("employees").unwrap().clone();
        assert!(boss.is_assignable_to(&field).unwrap());
        dep.add_to("employees", [boss.to_ref().unwrap()]).unwrap();

        // A Broke employee fits an interface-typed collection.
        let debtor = valid(4, &["Employee", "Broke"]).to_ref().unwrap();
        let mut bank = valid(5, &["Bank"]);
        bank.add_to("debtors", [debtor]).unwrap();
    }

    #[test]
    fn test_add_to_unions_members() {
        let mut dep = valid(1, &["Department"]);
        let boss = valid(3, &["Manager"]).to_ref().unwrap();
        let worker_1 = valid(4, &["Employee"]).to_ref().unwrap();
        let worker_2 = valid(5, &["Employee"]).to_ref().unwrap();

        dep.add_to("employees", [boss.clone()]).unwrap();
        dep.add_to("employees", [worker_1, worker_2, boss.clone()])
            .unwrap();

        let employees = dep.get("employees").unwrap();
        let set = employees.as_items().unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&boss));
        let ids: Vec<ItemId> = set.iter().map(ItemRef::id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn test_add_to_is_atomic() {
        let m1 = valid(1, &["Employee"]).to_ref().unwrap();
        let m2 = valid(2, &["Company"]).to_ref().unwrap();
        let m3 = valid(3, &["Employee"]).to_ref().unwrap();
        let mut dep = valid(0, &["Department"]);

        let err = dep
            .add_to("employees", [m1.clone(), m2.clone(), m3.clone()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyMismatch);
        assert!(!dep.properties().contains_key("employees"));

        dep.add_to("employees", [m1.clone()]).unwrap();
        dep.add_to("employees", [m3, m2]).unwrap_err();
        assert_eq!(dep.get("employees").unwrap().into_owned(), Value::from(vec![m1]));
    }

    #[test]
    fn test_add_to_requires_collection_field() {
        let big = valid(0, &["Department"]).to_ref().unwrap();
        let mut tom = valid(1, &["Employee"]);
        let err = tom.add_to("department", [big]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyMismatch);
        assert!(tom.get("department").unwrap().is_null());
    }

    #[test]
    fn test_id_is_immutable() {
        let mut tom = valid(7, &["Employee"]);
        let err = tom.set("id", 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyMismatch);
        assert_eq!(tom.get("id").unwrap().as_int(), Some(7));

        let overridden = item(7, &["Employee"], vec![("id", 99.into())]);
        assert_eq!(overridden.id(), 7);
        assert_eq!(overridden.properties().get("id"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_classname_and_implements() {
        let tom = valid(1, &["Employee"]);
        assert_eq!(tom.classname().unwrap(), Some("Employee"));
        assert!(tom.implements().unwrap().is_empty());

        let broke_employee = valid(2, &["Employee", "Broke"]);
        assert_eq!(broke_employee.classname().unwrap(), None);
        assert_eq!(broke_employee.implements().unwrap(), vec!["Broke", "Employee"]);

        let broke = valid(3, &["Broke"]);
        assert_eq!(broke.classname().unwrap(), None);
        assert_eq!(broke.implements().unwrap(), vec!["Broke"]);
    }

    #[test]
    fn test_property_order_is_insertion_order() {
        let mut tom = item(1, &["Employee"], vec![("name", "Tom".into())]);
        tom.validate().unwrap();
        tom.set("age", 25).unwrap();
        tom.set("fullTime", true).unwrap();
        tom.set("name", "Thomas").unwrap();
        let keys: Vec<&str> = tom.properties().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "id", "age", "fullTime"]);
    }

    #[test]
    fn test_isa() {
        let boss = valid(1, &["Manager"]);
        assert!(boss.isa("Manager"));
        assert!(boss.isa("Employee"));
        assert!(boss.isa("Employable"));
        assert!(!boss.isa("Department"));
    }

    #[test]
    fn test_display() {
        let tom = item(1, &["Employee"], vec![("name", "Tom".into())]);
        assert_eq!(
            tom.to_string(),
            "<Item classes=[Employee], properties={name: Tom, id: 1}>"
        );
    }
}
