//! Sorts the entries of the event log into categories.
//!
//! The game itself only provides a very coarse category for each entry. Therefore, we classify
//! entries by looking at their title and text. A [Categorizer] consists of an ordered list of
//! [CategoryDefinition]s. The first definition which matches an entry claims it, therefore the
//! order of the definitions determines their priority: an entry which mentions a reward for a
//! completed trade is a reward, not a trade.
//!
//! The last definition is always the catch-all category [MISC], so that every entry ends up in
//! exactly one category.
//!
//! # Example
//! ```
//! # use xsave::components::LogEntry;
//! # use xsave::eventlog::Categorizer;
//! let entry = |id: &str, time: f64, category: &str, title: &str| LogEntry {
//!     id: id.to_owned(),
//!     time,
//!     category: category.to_owned(),
//!     title: title.to_owned(),
//!     text: String::new(),
//!     faction: String::new(),
//!     money: 0,
//!     target: None,
//! };
//!
//! let categories = Categorizer::standard().categorize(&[
//!     entry("log-0", 10.0, "upkeep", "Trade completed"),
//!     entry("log-1", 20.0, "upkeep", "Reward for: Trade completed"),
//!     entry("log-2", 30.0, "missions", "Ocean of Fantasy"),
//!     entry("log-3", 40.0, "news", "Something happened"),
//! ]);
//!
//! let ids_of = |id: &str| -> Vec<String> {
//!     let category = categories.iter().find(|category| category.id == id).unwrap();
//!     category.entries.iter().map(|entry| entry.id.clone()).collect()
//! };
//! assert_eq!(ids_of("trade"), vec!["log-0"]);
//! assert_eq!(ids_of("promotion"), vec!["log-1"]);
//! assert_eq!(ids_of("missions"), vec!["log-2"]);
//! assert_eq!(ids_of("misc"), vec!["log-3"]);
//! ```
use crate::components::LogEntry;
use serde::{Deserialize, Serialize};

pub mod cache;

/// Contains the id of the catch-all category.
pub const MISC: &str = "misc";

/// Determines how a category recognizes its entries.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Matches if title or text contain one of the given (lower case) terms.
    Terms(Vec<String>),
    /// Matches if the category recorded by the game equals the given name.
    CategoryName(String),
    /// Matches nothing by itself. Used for the catch-all category.
    Nothing,
}

/// Defines a category along with the rule which assigns entries to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDefinition {
    id: String,
    label: String,
    detection: Detection,
}

impl CategoryDefinition {
    /// Creates a category which matches entries mentioning any of the given terms.
    ///
    /// Terms are matched case-insensitive.
    pub fn terms(id: &str, label: &str, terms: &[&str]) -> Self {
        CategoryDefinition {
            id: id.to_owned(),
            label: label.to_owned(),
            detection: Detection::Terms(terms.iter().map(|term| term.to_lowercase()).collect()),
        }
    }

    /// Creates a category which matches entries of the given game category.
    pub fn category_name(id: &str, label: &str, category: &str) -> Self {
        CategoryDefinition {
            id: id.to_owned(),
            label: label.to_owned(),
            detection: Detection::CategoryName(category.to_owned()),
        }
    }

    /// Creates the catch-all category.
    pub fn misc() -> Self {
        CategoryDefinition {
            id: MISC.to_owned(),
            label: "Miscellaneous".to_owned(),
            detection: Detection::Nothing,
        }
    }

    /// Returns the id of the category.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the label to show.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the detection rule.
    pub fn detection(&self) -> &Detection {
        &self.detection
    }

    /// Determines if the given entry belongs to this category.
    ///
    /// **haystack** has to contain the lower case title and text of the entry.
    fn matches(&self, entry: &LogEntry, haystack: &str) -> bool {
        match &self.detection {
            Detection::Terms(terms) => terms.iter().any(|term| haystack.contains(term.as_str())),
            Detection::CategoryName(category) => entry.category == *category,
            Detection::Nothing => false,
        }
    }
}

/// Represents a category along with its entries (newest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogCategory {
    /// Contains the id of the category.
    pub id: String,
    /// Contains the label to show.
    pub label: String,
    /// Contains the time of the oldest entry or **None** if the category is empty.
    pub start_time: Option<f64>,
    /// Contains all entries, newest first.
    pub entries: Vec<LogEntry>,
}

/// Classifies log entries based on an ordered list of categories.
#[derive(Debug, Clone)]
pub struct Categorizer {
    definitions: Vec<CategoryDefinition>,
}

impl Categorizer {
    /// Creates a categorizer for the given definitions.
    ///
    /// The catch-all category is appended unless it is already present, in which case it is
    /// moved to the end.
    pub fn new(definitions: Vec<CategoryDefinition>) -> Self {
        let mut definitions: Vec<CategoryDefinition> = definitions
            .into_iter()
            .filter(|definition| definition.id != MISC)
            .collect();
        definitions.push(CategoryDefinition::misc());

        Categorizer { definitions }
    }

    /// Creates the categorizer used for X4 savegames.
    pub fn standard() -> Self {
        Categorizer::new(vec![
            CategoryDefinition::terms(
                "emergency",
                "Emergencies",
                &["under attack", "emergency", "forced to flee", "is being boarded"],
            ),
            CategoryDefinition::terms(
                "promotion",
                "Promotions & Rewards",
                &["promotion", "promoted", "reward"],
            ),
            CategoryDefinition::category_name("missions", "Missions", "missions"),
            CategoryDefinition::terms(
                "reputation",
                "Reputation",
                &["reputation", "relations", "license"],
            ),
            CategoryDefinition::terms(
                "destroyed",
                "Destroyed",
                &["destroyed", "was killed", "lost"],
            ),
            CategoryDefinition::terms(
                "war",
                "War",
                &["declared war", "war declared", "ceasefire", "hostile"],
            ),
            CategoryDefinition::terms(
                "piracy",
                "Piracy",
                &["pirate", "piracy", "boarding", "smuggl"],
            ),
            CategoryDefinition::terms(
                "ship-construction",
                "Ship construction",
                &["ship construction", "ship built", "ship completed", "shipyard", "wharf"],
            ),
            CategoryDefinition::terms(
                "station-building",
                "Station building",
                &["station construction", "construction plan", "module built", "build storage"],
            ),
            CategoryDefinition::terms(
                "station-finance",
                "Station finance",
                &["station account", "budget", "insufficient funds", "transferred"],
            ),
            CategoryDefinition::terms(
                "crew",
                "Crew",
                &["crew", "captain", "pilot", "skill"],
            ),
            CategoryDefinition::terms(
                "trade",
                "Trade",
                &["trade completed", "sold", "bought", "trade offer"],
            ),
        ])
    }

    /// Returns all definitions in the order of their priority.
    pub fn definitions(&self) -> &[CategoryDefinition] {
        &self.definitions
    }

    /// Determines the category of the given entry.
    pub fn classify(&self, entry: &LogEntry) -> &CategoryDefinition {
        let haystack = format!("{} {}", entry.title, entry.text).to_lowercase();
        let fallback = self.definitions.len() - 1;

        self.definitions
            .iter()
            .find(|definition| definition.matches(entry, &haystack))
            .unwrap_or(&self.definitions[fallback])
    }

    /// Sorts the given entries into categories.
    ///
    /// All categories are returned in the order of their definition, even if they are empty.
    pub fn categorize(&self, entries: &[LogEntry]) -> Vec<LogCategory> {
        let mut categories: Vec<LogCategory> = self
            .definitions
            .iter()
            .map(|definition| LogCategory {
                id: definition.id.clone(),
                label: definition.label.clone(),
                start_time: None,
                entries: Vec::new(),
            })
            .collect();

        for entry in entries {
            let id = self.classify(entry).id();
            if let Some(category) = categories.iter_mut().find(|category| category.id == id) {
                category.entries.push(entry.clone());
            }
        }

        for category in &mut categories {
            category
                .entries
                .sort_by(|left, right| right.time.total_cmp(&left.time));
            category.start_time = category.entries.last().map(|entry| entry.time);
        }

        categories
    }
}

#[cfg(test)]
mod tests {
    use crate::components::LogEntry;
    use crate::eventlog::{Categorizer, CategoryDefinition, MISC};
    use std::collections::HashSet;

    fn entry(index: usize, category: &str, title: &str, text: &str) -> LogEntry {
        LogEntry {
            id: format!("log-{}", index),
            time: index as f64 * 10.0,
            category: category.to_owned(),
            title: title.to_owned(),
            text: text.to_owned(),
            faction: String::new(),
            money: 0,
            target: None,
        }
    }

    #[test]
    fn every_entry_lands_in_exactly_one_category() {
        let titles = [
            ("upkeep", "Station under attack", ""),
            ("upkeep", "Trade completed", "Sold 200 Energy Cells"),
            ("missions", "Ocean of Fantasy", "Deliver 12 units to the Hatikvah"),
            ("general", "Promotion", "Captain promoted"),
            ("general", "Welcome", "Nothing to see here"),
            ("upkeep", "Ship destroyed", "Lost contact"),
            ("news", "Argon Federation declared war", ""),
        ];
        let entries: Vec<LogEntry> = titles
            .iter()
            .enumerate()
            .map(|(index, (category, title, text))| entry(index, category, title, text))
            .collect();

        let categories = Categorizer::standard().categorize(&entries);

        let mut seen = HashSet::new();
        for category in &categories {
            for entry in &category.entries {
                assert!(seen.insert(entry.id.clone()), "{} is duplicated", entry.id);
            }
        }
        assert_eq!(seen.len(), entries.len());
        assert_eq!(categories.last().unwrap().id, MISC);
    }

    #[test]
    fn the_first_matching_category_wins() {
        let categorizer = Categorizer::standard();
        let both = entry(0, "upkeep", "Reward received", "Trade completed with Teladi");
        assert_eq!(categorizer.classify(&both).id(), "promotion");

        let mission = entry(1, "missions", "Ocean of Fantasy", "Find the lost relic");
        assert_eq!(categorizer.classify(&mission).id(), "missions");

        let nothing = entry(2, "general", "Hello", "World");
        assert_eq!(categorizer.classify(&nothing).id(), MISC);

        let uppercase = entry(3, "general", "TRADE COMPLETED", "");
        assert_eq!(categorizer.classify(&uppercase).id(), "trade");
    }

    #[test]
    fn entries_are_sorted_newest_first() {
        let categories = Categorizer::new(vec![CategoryDefinition::terms(
            "trade",
            "Trade",
            &["Trade"],
        )])
        .categorize(&[
            entry(1, "", "trade 1", ""),
            entry(3, "", "trade 3", ""),
            entry(2, "", "trade 2", ""),
        ]);

        let trade = &categories[0];
        let ids: Vec<&str> = trade.entries.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["log-3", "log-2", "log-1"]);
        assert_eq!(trade.start_time, Some(10.0));

        let misc = &categories[1];
        assert!(misc.entries.is_empty());
        assert_eq!(misc.start_time, None);
    }

    #[test]
    fn misc_is_always_last() {
        let categorizer = Categorizer::new(vec![
            CategoryDefinition::misc(),
            CategoryDefinition::category_name("missions", "Missions", "missions"),
        ]);
        let ids: Vec<&str> = categorizer
            .definitions()
            .iter()
            .map(|definition| definition.id())
            .collect();
        assert_eq!(ids, vec!["missions", MISC]);
    }
}
