//! Provides the central registry of all components created during an extraction.
//!
//! The registry owns one [Collection] per [ComponentType] and is the only place which is able to
//! turn a unique id back into a component. It is created once per extraction run, populated by
//! the [processors](crate::processors) and finally persisted via [Collections::save]. Queries
//! never use a registry, they read the persisted collections via [Collections::load].
//!
//! # Example
//! ```
//! # use xsave::components::registry::Collections;
//! # use xsave::components::{ComponentData, ComponentType};
//! let mut collections = Collections::new();
//! let cluster = collections
//!     .create_component(None, "cluster_01_connection", "[0x1]", ComponentData::Cluster {
//!         macro_name: "cluster_01_macro".to_owned(),
//!         code: "AAA-001".to_owned(),
//!     })
//!     .unwrap();
//! let sector = collections
//!     .create_component(Some(&cluster), "sector_01_connection", "[0x2]", ComponentData::Sector {
//!         macro_name: "cluster_01_sector001_macro".to_owned(),
//!         code: "AAA-002".to_owned(),
//!         owner: "argon".to_owned(),
//!     })
//!     .unwrap();
//!
//! let resolved = collections.resolve("sector:[0x2]").unwrap();
//! assert_eq!(resolved.parent(), Some(&cluster));
//! assert_eq!(collections.get(&cluster).unwrap().children(ComponentType::Sector), &[sector]);
//!
//! // Unknown ids are simply not found...
//! assert!(collections.resolve("sector:[0x3]").is_none());
//! assert!(collections.resolve("nonsense").is_none());
//! ```
use crate::components::collection::Collection;
use crate::components::{Component, ComponentData, ComponentId, ComponentType, LogEntry};
use anyhow::Context;
use serde_json::Value;
use std::path::Path;

/// Owns the collections of all component types.
#[derive(Debug, Clone)]
pub struct Collections {
    collections: Vec<Collection>,
    person_counter: usize,
}

impl Default for Collections {
    fn default() -> Self {
        Collections::new()
    }
}

impl Collections {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Collections {
            collections: ComponentType::ALL
                .iter()
                .map(|component_type| Collection::new(*component_type))
                .collect(),
            person_counter: 0,
        }
    }

    /// Creates a new component and registers it as child of its parent.
    ///
    /// The parent has to exist already, which is always the case, as the document lists the
    /// children of a component within the component itself. Fails if the given id is empty or
    /// already taken.
    pub fn create_component(
        &mut self,
        parent: Option<&ComponentId>,
        connection_id: &str,
        component_id: &str,
        data: ComponentData,
    ) -> anyhow::Result<ComponentId> {
        if let Some(parent) = parent {
            if self.get(parent).is_none() {
                anyhow::bail!(
                    "Cannot create {}:{} as its parent {} is unknown",
                    data.component_type(),
                    component_id,
                    parent
                );
            }
        }

        let component = Component::new(component_id, connection_id, parent.cloned(), data)?;
        let id = component.id().clone();
        self.collection_mut(id.component_type()).add(component)?;

        if let Some(parent) = parent.and_then(|parent| self.get_mut(parent)) {
            parent.add_child(id.clone());
        }

        Ok(id)
    }

    /// Generates the next id for a person.
    ///
    /// Persons don't carry an id in a savegame, therefore we generate one which is stable as long
    /// as the document doesn't change.
    pub fn next_person_id(&mut self) -> String {
        self.person_counter += 1;
        format!("person-{}", self.person_counter)
    }

    /// Provides access to the collection of the given type.
    pub fn collection(&self, component_type: ComponentType) -> &Collection {
        // Every type has a collection, in the order of ComponentType::ALL...
        &self.collections[Collections::index_of(component_type)]
    }

    fn collection_mut(&mut self, component_type: ComponentType) -> &mut Collection {
        &mut self.collections[Collections::index_of(component_type)]
    }

    fn index_of(component_type: ComponentType) -> usize {
        ComponentType::ALL
            .iter()
            .position(|candidate| *candidate == component_type)
            .unwrap_or_default()
    }

    /// Resolves the given unique id (`typeID:componentID`).
    ///
    /// Returns **None** if the id is malformed or if no such component exists. The latter is a
    /// common case, as references might point to components which are not extracted at all.
    pub fn resolve(&self, unique_id: &str) -> Option<&Component> {
        let (type_id, component_id) = unique_id.split_once(':')?;
        self.collections
            .iter()
            .find(|collection| collection.component_type().type_id() == type_id)
            .and_then(|collection| collection.get(component_id))
    }

    /// Returns the component with the given id.
    pub fn get(&self, id: &ComponentId) -> Option<&Component> {
        self.collection(id.component_type())
            .get(id.component_id())
    }

    /// Provides mutable access to the component with the given id.
    pub fn get_mut(&mut self, id: &ComponentId) -> Option<&mut Component> {
        self.collection_mut(id.component_type())
            .get_mut(id.component_id())
    }

    /// Finds a component by its raw id (as used by the game) without knowing its type.
    pub fn find_by_component_id(&self, component_id: &str) -> Option<&Component> {
        self.collections
            .iter()
            .find_map(|collection| collection.get(component_id))
    }

    /// Finds the component of the given type which is attached to the given parent via the
    /// given connection.
    ///
    /// Connection ids are only unique among siblings, therefore the lookup is limited to the
    /// children of the given parent. Without a parent, only top-level components are considered.
    pub fn find_by_connection(
        &self,
        parent: Option<&ComponentId>,
        component_type: ComponentType,
        connection_id: &str,
    ) -> Option<&Component> {
        match parent {
            Some(parent) => self
                .get(parent)?
                .children(component_type)
                .iter()
                .filter_map(|child| self.get(child))
                .find(|component| component.connection_id() == connection_id),
            None => self
                .collection(component_type)
                .iter()
                .filter(|component| component.parent().is_none())
                .find(|component| component.connection_id() == connection_id),
        }
    }

    /// Resolves the connections of the given region into the sibling regions they lead to.
    ///
    /// Connections which cannot be resolved are skipped.
    pub fn region_connections(&self, region: &ComponentId) -> Vec<&Component> {
        let region = match self.get(region) {
            Some(region) => region,
            None => return Vec::new(),
        };

        match region.data() {
            ComponentData::Region { connections, .. } => connections
                .iter()
                .filter_map(|connection| {
                    self.find_by_connection(region.parent(), ComponentType::Region, connection)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns all log entries in the order of the event log.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.collection(ComponentType::LogEntry)
            .iter()
            .filter_map(|component| match component.data() {
                ComponentData::LogEntry(entry) => Some(entry.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the total number of components.
    pub fn len(&self) -> usize {
        self.collections.iter().map(Collection::len).sum()
    }

    /// Determines if no component has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes all collections into the given folder.
    ///
    /// Note that a document is written for each type, even if it is empty, so that queries can
    /// tell an empty collection apart from a save which hasn't been extracted.
    pub fn save(&self, folder: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(folder)
            .with_context(|| format!("Cannot create {}", folder.display()))?;
        for collection in &self.collections {
            collection.save(folder)?;
            log::debug!(
                "Wrote {} components of type {}",
                collection.len(),
                collection.component_type()
            );
        }

        Ok(())
    }

    /// Reads the persisted collection of the given type as plain JSON values.
    pub fn load(folder: &Path, component_type: ComponentType) -> anyhow::Result<Vec<Value>> {
        Collection::load(folder, component_type)
    }
}
