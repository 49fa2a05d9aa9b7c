//! Maps tag paths to the action to perform for the subtree below.
//!
//! The table is built once per document type before processing starts and is then only ever
//! read. A lookup is performed for every opened element, therefore exact paths are kept in a
//! hash map. Additionally, a registration may use `[*]` as suffix of a segment, which matches
//! any suffix at that position. This is required for lists of siblings which are only told apart
//! by their connection id (e.g. the clusters of the galaxy). Exact matches always win, patterns
//! are checked in the order of their registration.
//!
//! # Example
//! ```
//! # use xsave::xml::actions::{Action, ActionTable, ProcessorId};
//! # use xsave::xml::path::{Segment, TagPath};
//! let mut table = ActionTable::new();
//! table.register("a.b[*]", Action::WriteFragment(ProcessorId::Cluster));
//!
//! let mut path = TagPath::default();
//! path.enter(0, Segment::new("a", None));
//! assert_eq!(table.lookup(&path), None);
//!
//! path.enter(1, Segment::new("b", Some("cluster_01_connection".to_owned())));
//! assert_eq!(table.lookup(&path), Some(Action::WriteFragment(ProcessorId::Cluster)));
//! ```
use crate::xml::path::TagPath;
use fnv::FnvHashMap;
use std::fmt::{Display, Formatter};

/// Marks a segment suffix in a registration which matches any suffix.
pub const ANY_SUFFIX: &str = "*";

/// Enumerates the processors which consume buffered fragment files.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProcessorId {
    /// Reads the relations of all factions into a flat JSON document.
    Factions,
    /// Walks a cluster connection of the galaxy and creates the component graph below it.
    Cluster,
    /// Reads the blueprints known by the player.
    Blueprints,
    /// Reads the wares owned by the player.
    Inventory,
    /// Reads all entries of the event log.
    EventLog,
}

impl Display for ProcessorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessorId::Factions => f.write_str("factions"),
            ProcessorId::Cluster => f.write_str("cluster"),
            ProcessorId::Blueprints => f.write_str("blueprints"),
            ProcessorId::Inventory => f.write_str("inventory"),
            ProcessorId::EventLog => f.write_str("event-log"),
        }
    }
}

/// Enumerates the handlers which receive an expanded in-memory tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HandlerId {
    /// Receives the `info` block at the head of a savegame.
    SaveInfo,
}

impl Display for HandlerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerId::SaveInfo => f.write_str("save-info"),
        }
    }
}

/// Describes what happens with the subtree of a matching element.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Skips the subtree without buffering it.
    Ignore,
    /// Copies the subtree into a fragment file which is later handed to the given processor.
    WriteFragment(ProcessorId),
    /// Materializes the subtree and invokes the given handler synchronously.
    ExpandTree(HandlerId),
}

#[derive(Debug, Clone)]
struct Pattern {
    segments: Vec<(String, Option<String>)>,
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('.')
            .map(|segment| match segment.find('[') {
                Some(index) => (
                    segment[..index].to_owned(),
                    Some(segment[index + 1..].trim_end_matches(']').to_owned()),
                ),
                None => (segment.to_owned(), None),
            })
            .collect();

        Pattern { segments }
    }

    fn matches(&self, path: &TagPath) -> bool {
        self.segments.len() == path.len()
            && self
                .segments
                .iter()
                .zip(path.segments())
                .all(|((name, suffix), segment)| {
                    name == segment.name()
                        && match suffix.as_deref() {
                            Some(ANY_SUFFIX) => true,
                            expected => expected == segment.suffix(),
                        }
                })
    }
}

/// Maps tag paths to actions.
#[derive(Debug, Default, Clone)]
pub struct ActionTable {
    exact: FnvHashMap<String, Action>,
    patterns: Vec<(Pattern, Action)>,
}

impl ActionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        ActionTable::default()
    }

    /// Creates the table used to process X4 savegames.
    pub fn savegame() -> Self {
        let mut table = ActionTable::new();

        let _ = table.register("savegame.info", Action::ExpandTree(HandlerId::SaveInfo));
        let _ = table.register(
            "savegame.universe.factions",
            Action::WriteFragment(ProcessorId::Factions),
        );
        let _ = table.register(
            "savegame.universe.component[galaxy].connections.connection[*]",
            Action::WriteFragment(ProcessorId::Cluster),
        );
        let _ = table.register(
            "savegame.universe.blueprints",
            Action::WriteFragment(ProcessorId::Blueprints),
        );
        let _ = table.register(
            "savegame.universe.inventory",
            Action::WriteFragment(ProcessorId::Inventory),
        );
        let _ = table.register("savegame.log", Action::WriteFragment(ProcessorId::EventLog));

        for bulky_section in [
            "savegame.messages",
            "savegame.stats",
            "savegame.economylog",
            "savegame.aidirector",
            "savegame.signature",
            "savegame.universe.jobs",
            "savegame.universe.god",
            "savegame.universe.controltextures",
            "savegame.universe.physics",
        ] {
            let _ = table.register(bulky_section, Action::Ignore);
        }

        table
    }

    /// Registers the action for the given path.
    ///
    /// If any segment uses `[*]` as suffix, the path is treated as pattern. Registering the same
    /// exact path twice replaces the previous action.
    pub fn register(&mut self, path: impl AsRef<str>, action: Action) -> &mut Self {
        let path = path.as_ref();
        if path.contains("[*]") {
            self.patterns.push((Pattern::parse(path), action));
        } else {
            let _ = self.exact.insert(path.to_owned(), action);
        }

        self
    }

    /// Determines the action for the given path.
    ///
    /// Returns **None** if nothing is registered, which simply means that streaming continues
    /// into the children of the current element.
    pub fn lookup(&self, path: &TagPath) -> Option<Action> {
        if let Some(action) = self.exact.get(path.as_str()) {
            return Some(*action);
        }

        self.patterns
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map(|(_, action)| *action)
    }

    /// Returns the number of registered paths and patterns.
    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    /// Determines if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
