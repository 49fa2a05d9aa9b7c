//! Keeps all components of a single type.
//!
//! A collection is persisted as a single JSON document `{ "<typeID>": [ ... ] }` named
//! `collection-<typeID>.json`. Reading it back only yields plain JSON values, as queries never
//! need the typed components.
use crate::components::{Component, ComponentType};
use fnv::FnvHashMap;
use serde_json::{Map, Value};
use std::path::Path;

/// Contains the components of one type in the order of their creation.
#[derive(Debug, Clone)]
pub struct Collection {
    component_type: ComponentType,
    components: Vec<Component>,
    index: FnvHashMap<String, usize>,
}

impl Collection {
    /// Creates an empty collection for the given type.
    pub fn new(component_type: ComponentType) -> Self {
        Collection {
            component_type,
            components: Vec::new(),
            index: FnvHashMap::default(),
        }
    }

    /// Returns the type of the components in this collection.
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Adds the given component.
    ///
    /// Fails if the component has another type or if its id is already taken.
    pub fn add(&mut self, component: Component) -> anyhow::Result<()> {
        if component.id().component_type() != self.component_type {
            anyhow::bail!(
                "Cannot add {} to the collection of {}",
                component.id(),
                self.component_type
            );
        }
        if self.index.contains_key(component.id().component_id()) {
            anyhow::bail!("Duplicate component {}", component.id());
        }

        let _ = self.index.insert(
            component.id().component_id().to_owned(),
            self.components.len(),
        );
        self.components.push(component);

        Ok(())
    }

    /// Looks up the component with the given (type local) id.
    pub fn get(&self, component_id: &str) -> Option<&Component> {
        self.index
            .get(component_id)
            .map(|index| &self.components[*index])
    }

    /// Provides mutable access to the component with the given id.
    pub fn get_mut(&mut self, component_id: &str) -> Option<&mut Component> {
        match self.index.get(component_id) {
            Some(index) => self.components.get_mut(*index),
            None => None,
        }
    }

    /// Iterates over all components in the order of their creation.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    /// Returns the number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Determines if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Renders the whole collection as JSON document.
    pub fn to_json(&self) -> Value {
        let mut document = Map::new();
        let _ = document.insert(
            self.component_type.type_id().to_owned(),
            Value::Array(self.components.iter().map(Component::to_json).collect()),
        );

        Value::Object(document)
    }

    /// Returns the file name used to persist the collection of the given type.
    pub fn file_name(component_type: ComponentType) -> String {
        format!("collection-{}.json", component_type.type_id())
    }

    /// Writes this collection into the given folder.
    pub fn save(&self, folder: &Path) -> anyhow::Result<()> {
        crate::files::write_json(
            &folder.join(Collection::file_name(self.component_type)),
            &self.to_json(),
        )
    }

    /// Reads the plain JSON objects of the given type from the given folder.
    pub fn load(folder: &Path, component_type: ComponentType) -> anyhow::Result<Vec<Value>> {
        let mut document: Value =
            crate::files::read_json(&folder.join(Collection::file_name(component_type)))?;

        match document
            .get_mut(component_type.type_id())
            .map(Value::take)
        {
            Some(Value::Array(components)) => Ok(components),
            _ => Err(anyhow::anyhow!(
                "The collection of {} doesn't contain a list of components",
                component_type
            )),
        }
    }
}
