//! Shared value types for item property bags.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexSet;

use crate::schema::ClassDescriptor;

/// Document-local item identifier.
pub type ItemId = u64;

// ---------------------------------------------------------------------------
// ItemRef
// ---------------------------------------------------------------------------

/// A handle on an item, as held by the reference and collection properties
/// of other items.
///
/// Carries the item's id and its resolved classes, which is all a referring
/// item needs to check assignability. Two handles are the same reference iff
/// their ids are equal.
#[derive(Clone, Debug)]
pub struct ItemRef {
    id: ItemId,
    classes: Arc<[Arc<ClassDescriptor>]>,
}

impl ItemRef {
    pub(crate) fn new(id: ItemId, classes: Arc<[Arc<ClassDescriptor>]>) -> Self {
        Self { id, classes }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn classes(&self) -> &[Arc<ClassDescriptor>] {
        &self.classes
    }

    /// True iff any of the referenced item's classes is a subtype of `class_name`.
    pub fn isa(&self, class_name: &str) -> bool {
        self.classes.iter().any(|cd| cd.isa(class_name))
    }
}

impl PartialEq for ItemRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ItemRef {}

impl Hash for ItemRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.classes.iter().map(|cd| cd.name()).collect();
        write!(f, "Item({}, [{}])", self.id, names.join(", "))
    }
}

/// Members of a collection property, in insertion order.
pub type ItemSet = IndexSet<ItemRef>;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A property value.
///
/// `Null` marks an absent value; it is distinct from an empty `Items` set.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Item(ItemRef),
    Items(ItemSet),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for the variants that hold items.
    pub fn is_item_valued(&self) -> bool {
        matches!(self, Value::Item(_) | Value::Items(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&ItemRef> {
        match self {
            Value::Item(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_items(&self) -> Option<&ItemSet> {
        match self {
            Value::Items(set) => Some(set),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Item(r) => write!(f, "{r}"),
            Value::Items(set) => {
                let members: Vec<String> = set.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", members.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ItemRef> for Value {
    fn from(r: ItemRef) -> Self {
        Value::Item(r)
    }
}

impl From<&ItemRef> for Value {
    fn from(r: &ItemRef) -> Self {
        Value::Item(r.clone())
    }
}

/// Duplicates collapse; first occurrence fixes the position.
impl From<Vec<ItemRef>> for Value {
    fn from(members: Vec<ItemRef>) -> Self {
        Value::Items(members.into_iter().collect())
    }
}

impl From<ItemSet> for Value {
    fn from(set: ItemSet) -> Self {
        Value::Items(set)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
