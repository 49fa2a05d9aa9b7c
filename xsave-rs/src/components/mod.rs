//! Contains the typed components which make up the object graph of a savegame.
//!
//! Every component is identified by its [ComponentId], which combines the [ComponentType] and
//! the id assigned by the game. Rendered as string, this is the **unique id**
//! (`typeID:componentID`) which is the only handle used to reference other components. A
//! component never owns or points to another component directly: its parent as well as its
//! children are stored as ids and resolved via the [Collections](registry::Collections).
//!
//! # Example
//! ```
//! # use xsave::components::{ComponentId, ComponentType};
//! let id: ComponentId = "ship:[0x1a2b]".parse().unwrap();
//! assert_eq!(id.component_type(), ComponentType::Ship);
//! assert_eq!(id.component_id(), "[0x1a2b]");
//! assert_eq!(id.to_string(), "ship:[0x1a2b]");
//!
//! assert!("spaceship:[0x1a2b]".parse::<ComponentId>().is_err());
//! ```
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub mod collection;
pub mod registry;

/// Enumerates all known component types.
///
/// The order of declaration is also the order in which collections are scanned and written.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentType {
    /// A cluster of the galaxy.
    Cluster,
    /// A sector within a cluster.
    Sector,
    /// A zone within a sector.
    Zone,
    /// A region (e.g. an asteroid field) within a cluster.
    Region,
    /// A planet or moon within a cluster.
    CelestialBody,
    /// A station within a zone.
    Station,
    /// A ship within a zone (or docked at a station).
    Ship,
    /// A person on board of a ship or station.
    Person,
    /// The profile of the player.
    Player,
    /// An entry of the event log.
    LogEntry,
}

impl ComponentType {
    /// Lists all types in their canonical order.
    pub const ALL: [ComponentType; 10] = [
        ComponentType::Cluster,
        ComponentType::Sector,
        ComponentType::Zone,
        ComponentType::Region,
        ComponentType::CelestialBody,
        ComponentType::Station,
        ComponentType::Ship,
        ComponentType::Person,
        ComponentType::Player,
        ComponentType::LogEntry,
    ];

    /// Returns the type id which is used in unique ids and file names.
    pub fn type_id(self) -> &'static str {
        match self {
            ComponentType::Cluster => "cluster",
            ComponentType::Sector => "sector",
            ComponentType::Zone => "zone",
            ComponentType::Region => "region",
            ComponentType::CelestialBody => "celestial-body",
            ComponentType::Station => "station",
            ComponentType::Ship => "ship",
            ComponentType::Person => "person",
            ComponentType::Player => "player",
            ComponentType::LogEntry => "event-log",
        }
    }

    /// Resolves a type id back into its type.
    pub fn from_type_id(type_id: &str) -> Option<ComponentType> {
        ComponentType::ALL
            .iter()
            .copied()
            .find(|component_type| component_type.type_id() == type_id)
    }

    /// Returns the name of the query command which lists all components of this type.
    pub fn command(self) -> &'static str {
        match self {
            ComponentType::Cluster => "clusters",
            ComponentType::Sector => "sectors",
            ComponentType::Zone => "zones",
            ComponentType::Region => "regions",
            ComponentType::CelestialBody => "celestial-bodies",
            ComponentType::Station => "stations",
            ComponentType::Ship => "ships",
            ComponentType::Person => "people",
            ComponentType::Player => "players",
            ComponentType::LogEntry => "event-log",
        }
    }

    /// Resolves a query command into the type it lists.
    pub fn from_command(command: &str) -> Option<ComponentType> {
        ComponentType::ALL
            .iter()
            .copied()
            .find(|component_type| component_type.command() == command)
    }

    /// Returns the JSON key used by a parent to list its children of this type.
    pub fn children_key(self) -> &'static str {
        match self {
            ComponentType::CelestialBody => "celestialBodies",
            ComponentType::LogEntry => "logEntries",
            other => other.command(),
        }
    }
}

impl Display for ComponentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_id())
    }
}

/// Identifies a component by its type and the id assigned by the game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId {
    component_type: ComponentType,
    component_id: String,
}

impl ComponentId {
    /// Creates a new id.
    pub fn new(component_type: ComponentType, component_id: impl Into<String>) -> Self {
        ComponentId {
            component_type,
            component_id: component_id.into(),
        }
    }

    /// Returns the type of the referenced component.
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Returns the id of the component within its type.
    pub fn component_id(&self) -> &str {
        &self.component_id
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.component_type.type_id(), self.component_id)
    }
}

impl FromStr for ComponentId {
    type Err = anyhow::Error;

    fn from_str(unique_id: &str) -> Result<Self, Self::Err> {
        let (type_id, component_id) = unique_id
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("'{}' is not a valid unique id", unique_id))?;
        let component_type = ComponentType::from_type_id(type_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown component type '{}'", type_id))?;
        if component_id.is_empty() {
            anyhow::bail!("'{}' doesn't contain a component id", unique_id);
        }

        Ok(ComponentId::new(component_type, component_id))
    }
}

impl Serialize for ComponentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Describes the role of a person on board.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    /// Commands a ship or manages a station.
    Captain,
    /// Member of the service crew.
    Service,
    /// Member of the marines.
    Marine,
}

impl PersonRole {
    /// Parses the role as used in a savegame. Unknown roles are treated as service crew.
    pub fn parse(role: &str) -> PersonRole {
        match role {
            "captain" | "pilot" | "manager" | "commander" => PersonRole::Captain,
            "marine" => PersonRole::Marine,
            _ => PersonRole::Service,
        }
    }
}

/// Represents an entry of the event log.
///
/// Next to being stored as component, these entries are also written into the category files
/// of the [event log](crate::eventlog) and read back from there. Therefore, the serialized form
/// carries its own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Contains the component id of the entry.
    #[serde(rename = "componentID")]
    pub id: String,
    /// Contains the game time (in seconds) at which the entry was recorded.
    pub time: f64,
    /// Contains the category as recorded by the game (which is not the same as our categories).
    pub category: String,
    /// Contains the title.
    pub title: String,
    /// Contains the text.
    pub text: String,
    /// Contains the faction which caused the entry.
    pub faction: String,
    /// Contains the amount of money involved.
    pub money: i64,
    /// Contains the unique id of the affected component, if it is known.
    pub target: Option<String>,
}

/// Contains the parts of a ship macro like `ship_arg_m_frigate_01_a_macro`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipMacro {
    /// Contains the faction which builds this kind of ship.
    pub build_faction: String,
    /// Contains the size class (xs, s, m, l, xl).
    pub size: String,
    /// Contains the hull (e.g. fighter, frigate, trans, miner).
    pub hull: String,
    /// Contains the type of transporters and miners (e.g. container, solid, liquid).
    pub hull_type: Option<String>,
}

impl ShipMacro {
    /// Decomposes the given macro name.
    ///
    /// Returns **None** if the name doesn't follow the grammar `ship_<faction>_<size>_<hull>...`.
    ///
    /// # Example
    /// ```
    /// # use xsave::components::ShipMacro;
    /// let frigate = ShipMacro::parse("ship_arg_m_frigate_01_a_macro").unwrap();
    /// assert_eq!(frigate.build_faction, "arg");
    /// assert_eq!(frigate.size, "m");
    /// assert_eq!(frigate.hull, "frigate");
    /// assert_eq!(frigate.hull_type, None);
    ///
    /// let miner = ShipMacro::parse("ship_tel_l_miner_solid_01_a_macro").unwrap();
    /// assert_eq!(miner.hull_type.as_deref(), Some("solid"));
    ///
    /// assert_eq!(ShipMacro::parse("station_arg_01"), None);
    /// ```
    pub fn parse(macro_name: &str) -> Option<ShipMacro> {
        let parts: Vec<&str> = macro_name.split('_').collect();
        if parts.len() < 4 || parts[0] != "ship" {
            return None;
        }

        let hull = parts[3];
        let hull_type = match hull {
            "trans" | "miner" => parts.get(4).map(|hull_type| (*hull_type).to_owned()),
            _ => None,
        };

        Some(ShipMacro {
            build_faction: parts[1].to_owned(),
            size: parts[2].to_owned(),
            hull: hull.to_owned(),
            hull_type,
        })
    }
}

/// Contains the parts of a character macro like `character_argon_female_officer_01_macro`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonMacro {
    /// Contains the race.
    pub race: String,
    /// Contains the gender if the macro specifies one.
    pub gender: Option<String>,
}

impl PersonMacro {
    /// Decomposes the given macro name.
    ///
    /// # Example
    /// ```
    /// # use xsave::components::PersonMacro;
    /// let person = PersonMacro::parse("character_teladi_female_01_macro").unwrap();
    /// assert_eq!(person.race, "teladi");
    /// assert_eq!(person.gender.as_deref(), Some("female"));
    ///
    /// let robot = PersonMacro::parse("character_boron_bridge_01_macro").unwrap();
    /// assert_eq!(robot.gender, None);
    /// ```
    pub fn parse(macro_name: &str) -> Option<PersonMacro> {
        let mut parts = macro_name.split('_');
        if parts.next() != Some("character") {
            return None;
        }
        let race = parts.next().filter(|race| !race.is_empty())?;
        let gender = parts
            .next()
            .filter(|gender| *gender == "male" || *gender == "female");

        Some(PersonMacro {
            race: race.to_owned(),
            gender: gender.map(str::to_owned),
        })
    }
}

/// Contains the type specific attributes of a component.
///
/// The variant determines the [ComponentType] of the component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ComponentData {
    /// Attributes of a cluster.
    Cluster {
        /// Contains the macro of the cluster.
        #[serde(rename = "macro")]
        macro_name: String,
        /// Contains the short code (e.g. `ABC-123`).
        code: String,
    },
    /// Attributes of a sector.
    Sector {
        /// Contains the macro of the sector.
        #[serde(rename = "macro")]
        macro_name: String,
        /// Contains the short code.
        code: String,
        /// Contains the owning faction.
        owner: String,
    },
    /// Attributes of a zone.
    Zone {
        /// Contains the macro of the zone.
        #[serde(rename = "macro")]
        macro_name: String,
        /// Contains the short code.
        code: String,
    },
    /// Attributes of a region.
    Region {
        /// Contains the macro of the region.
        #[serde(rename = "macro")]
        macro_name: String,
        /// Contains the local connection ids of the connected regions.
        connections: Vec<String>,
    },
    /// Attributes of a planet or moon.
    CelestialBody {
        /// Contains the macro of the body.
        #[serde(rename = "macro")]
        macro_name: String,
        /// Contains the short code.
        code: String,
    },
    /// Attributes of a station.
    Station {
        /// Contains the macro of the station.
        #[serde(rename = "macro")]
        macro_name: String,
        /// Contains the short code.
        code: String,
        /// Contains the name given by the owner.
        name: String,
        /// Contains the owning faction.
        owner: String,
        /// Contains the construction state.
        state: String,
    },
    /// Attributes of a ship.
    Ship {
        /// Contains the macro of the ship.
        #[serde(rename = "macro")]
        macro_name: String,
        /// Contains the short code.
        code: String,
        /// Contains the name given by the owner.
        name: String,
        /// Contains the owning faction.
        owner: String,
        /// Contains the faction which builds this kind of ship.
        build_faction: String,
        /// Contains the size class.
        size: String,
        /// Contains the hull.
        hull: String,
        /// Contains the hull type of transporters and miners.
        hull_type: Option<String>,
        /// References the person flying the ship.
        pilot: Option<ComponentId>,
    },
    /// Attributes of a person.
    Person {
        /// Contains the name, which is empty for anonymous crew members.
        name: String,
        /// Contains the macro of the character.
        #[serde(rename = "macro")]
        macro_name: String,
        /// Contains the race.
        race: String,
        /// Contains the gender if known.
        gender: Option<String>,
        /// Contains the role on board.
        role: PersonRole,
        /// Determines if the person doesn't have a name.
        anonymous: bool,
    },
    /// Attributes of the player profile.
    Player {
        /// Contains the name of the player.
        name: String,
        /// Contains the money of the player.
        money: i64,
        /// Contains the ware ids of all known blueprints.
        blueprints: Vec<String>,
        /// Maps ware ids to the amount in the inventory.
        wares: BTreeMap<String, i64>,
    },
    /// Attributes of a log entry.
    LogEntry(LogEntry),
}

impl ComponentData {
    /// Returns the type of component described by these attributes.
    pub fn component_type(&self) -> ComponentType {
        match self {
            ComponentData::Cluster { .. } => ComponentType::Cluster,
            ComponentData::Sector { .. } => ComponentType::Sector,
            ComponentData::Zone { .. } => ComponentType::Zone,
            ComponentData::Region { .. } => ComponentType::Region,
            ComponentData::CelestialBody { .. } => ComponentType::CelestialBody,
            ComponentData::Station { .. } => ComponentType::Station,
            ComponentData::Ship { .. } => ComponentType::Ship,
            ComponentData::Person { .. } => ComponentType::Person,
            ComponentData::Player { .. } => ComponentType::Player,
            ComponentData::LogEntry(_) => ComponentType::LogEntry,
        }
    }

    /// Creates the attributes of a ship, deriving all we can from its macro.
    pub fn ship(macro_name: &str, code: &str, name: &str, owner: &str) -> ComponentData {
        let parsed = ShipMacro::parse(macro_name);
        ComponentData::Ship {
            macro_name: macro_name.to_owned(),
            code: code.to_owned(),
            name: name.to_owned(),
            owner: owner.to_owned(),
            build_faction: parsed
                .as_ref()
                .map(|parsed| parsed.build_faction.clone())
                .unwrap_or_default(),
            size: parsed
                .as_ref()
                .map(|parsed| parsed.size.clone())
                .unwrap_or_default(),
            hull: parsed
                .as_ref()
                .map(|parsed| parsed.hull.clone())
                .unwrap_or_default(),
            hull_type: parsed.and_then(|parsed| parsed.hull_type),
            pilot: None,
        }
    }

    /// Creates the attributes of a person, deriving race and gender from its macro.
    pub fn person(name: &str, macro_name: &str, role: PersonRole) -> ComponentData {
        let parsed = PersonMacro::parse(macro_name);
        ComponentData::Person {
            name: name.to_owned(),
            macro_name: macro_name.to_owned(),
            race: parsed
                .as_ref()
                .map(|parsed| parsed.race.clone())
                .unwrap_or_default(),
            gender: parsed.and_then(|parsed| parsed.gender),
            role,
            anonymous: name.is_empty(),
        }
    }
}

/// Represents a node of the object graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    id: ComponentId,
    connection_id: String,
    parent: Option<ComponentId>,
    children: BTreeMap<ComponentType, Vec<ComponentId>>,
    data: ComponentData,
}

impl Component {
    /// Creates a new component.
    ///
    /// Note that components are created via
    /// [Collections::create_component](registry::Collections::create_component) which also
    /// verifies the parent and maintains its child list.
    pub(crate) fn new(
        component_id: &str,
        connection_id: &str,
        parent: Option<ComponentId>,
        data: ComponentData,
    ) -> anyhow::Result<Component> {
        if component_id.is_empty() {
            anyhow::bail!(
                "Cannot create a {} without a component id",
                data.component_type()
            );
        }

        Ok(Component {
            id: ComponentId::new(data.component_type(), component_id),
            connection_id: connection_id.to_owned(),
            parent,
            children: BTreeMap::new(),
            data,
        })
    }

    /// Returns the id of this component.
    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    /// Returns the unique id (`typeID:componentID`).
    pub fn unique_id(&self) -> String {
        self.id.to_string()
    }

    /// Returns the id of the connection which attaches this component to its parent.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Returns the id of the parent component.
    pub fn parent(&self) -> Option<&ComponentId> {
        self.parent.as_ref()
    }

    /// Returns the ids of all children of the given type.
    pub fn children(&self, component_type: ComponentType) -> &[ComponentId] {
        self.children
            .get(&component_type)
            .map(|children| children.as_slice())
            .unwrap_or_default()
    }

    pub(crate) fn add_child(&mut self, child: ComponentId) {
        self.children
            .entry(child.component_type())
            .or_default()
            .push(child);
    }

    /// Returns the type specific attributes.
    pub fn data(&self) -> &ComponentData {
        &self.data
    }

    /// Provides mutable access to the type specific attributes.
    ///
    /// This is used to fill in details which are only known once the children have been read
    /// (e.g. the pilot of a ship).
    pub fn data_mut(&mut self) -> &mut ComponentData {
        &mut self.data
    }

    /// Renders this component as flat JSON object.
    pub fn to_json(&self) -> Value {
        let mut result = match serde_json::to_value(&self.data) {
            Ok(Value::Object(attributes)) => attributes,
            _ => Map::new(),
        };

        let _ = result.insert(
            "componentID".to_owned(),
            Value::String(self.id.component_id.clone()),
        );
        let _ = result.insert(
            "typeID".to_owned(),
            Value::String(self.id.component_type.type_id().to_owned()),
        );
        let _ = result.insert("uniqueID".to_owned(), Value::String(self.unique_id()));
        let _ = result.insert(
            "connectionID".to_owned(),
            Value::String(self.connection_id.clone()),
        );
        let _ = result.insert(
            "parentComponent".to_owned(),
            self.parent
                .as_ref()
                .map(|parent| Value::String(parent.to_string()))
                .unwrap_or(Value::Null),
        );
        for (child_type, children) in &self.children {
            let _ = result.insert(
                child_type.children_key().to_owned(),
                Value::Array(
                    children
                        .iter()
                        .map(|child| Value::String(child.to_string()))
                        .collect(),
                ),
            );
        }

        Value::Object(result)
    }
}
