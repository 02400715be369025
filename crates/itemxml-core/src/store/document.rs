//! In-memory item document.
//!
//! A `Document` owns the id counter and the table of retained items. Ids start
//! at 0, increase by one per allocation and are never reused, including ids
//! handed to items that failed validation or were created without being kept.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{ItemXmlError, ItemXmlResult};
use crate::item::Item;
use crate::models::{ItemId, Value};
use crate::schema::SchemaProvider;

pub struct Document {
    model: Arc<dyn SchemaProvider>,
    items: BTreeMap<ItemId, Item>,
    id_counter: ItemId,
}

impl Document {
    pub fn new(model: Arc<dyn SchemaProvider>) -> Self {
        Self {
            model,
            items: BTreeMap::new(),
            id_counter: 0,
        }
    }

    pub fn model(&self) -> &Arc<dyn SchemaProvider> {
        &self.model
    }

    fn next_id(&mut self) -> ItemId {
        let id = self.id_counter;
        self.id_counter += 1;
        id
    }

    // -- creation ------------------------------------------------------------

    /// Allocate an id and build a validated item without retaining it.
    pub fn create<I, S>(&mut self, classnames: I) -> ItemXmlResult<Item>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_with(classnames, Vec::<(String, Value)>::new())
    }

    pub fn create_with<I, S, P, K>(&mut self, classnames: I, properties: P) -> ItemXmlResult<Item>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        P: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let id = self.next_id();
        let mut item = Item::with_properties(Arc::clone(&self.model), id, classnames, properties);
        item.validate()?;
        debug!(item = id, classes = ?item.classnames(), "Created item");
        Ok(item)
    }

    /// Like [`Document::create`], but the item is kept in the document.
    pub fn add<I, S>(&mut self, classnames: I) -> ItemXmlResult<&mut Item>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_with(classnames, Vec::<(String, Value)>::new())
    }

    pub fn add_with<I, S, P, K>(&mut self, classnames: I, properties: P) -> ItemXmlResult<&mut Item>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        P: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let item = self.create_with(classnames, properties)?;
        Ok(self.items.entry(item.id()).or_insert(item))
    }

    // -- lookup --------------------------------------------------------------

    pub fn get(&self, id: ItemId) -> ItemXmlResult<&Item> {
        self.items.get(&id).ok_or(ItemXmlError::NotFound(id))
    }

    pub fn get_mut(&mut self, id: ItemId) -> ItemXmlResult<&mut Item> {
        self.items.get_mut(&id).ok_or(ItemXmlError::NotFound(id))
    }

    /// Retained items that are a `classname` and carry every given
    /// `(name, value)` pair, in id order. Evaluated lazily.
    pub fn search<'a>(
        &'a self,
        classname: &'a str,
        properties: &'a [(&'a str, Value)],
    ) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.values().filter(move |item| {
            item.isa(classname)
                && properties
                    .iter()
                    .all(|(name, value)| item.properties().get(*name) == Some(value))
        })
    }

    /// Retained items in id order.
    pub fn iter(&self) -> btree_map::Values<'_, ItemId, Item> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The id the next allocation will receive.
    pub fn next_free_id(&self) -> ItemId {
        self.id_counter
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = &'a Item;
    type IntoIter = btree_map::Values<'a, ItemId, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
