//! Answers queries against the extracted data of a save.
//!
//! A query names a save and a **command**, which is either the command of a
//! [ComponentType](crate::components::ComponentType) (e.g. `ships`), `log.<categoryID>` for the
//! entries of an event log category or `log-categories` for an overview of all categories. The
//! result can be narrowed down by a filter expression, which is evaluated by an external
//! [FilterEvaluator], and is finally paginated.
//!
//! Results are cached in the [QueryCache](cache::QueryCache):
//! * an unfiltered query is always cached under its [auto cache key](auto_cache_key), so that
//!   paging through a large collection only loads and filters it once,
//! * a filtered query is only cached if the caller provides an explicit cache key.
//!
//! # Example
//! ```
//! # use xsave::query::{Pagination, QueryRequest};
//! let request = QueryRequest::new("quicksave", "ships")
//!     .with_pagination(Some("25"), Some("50"))
//!     .unwrap();
//! assert_eq!(request.limit, 25);
//! assert_eq!(request.offset, 50);
//!
//! assert!(QueryRequest::new("quicksave", "ships").with_pagination(Some("0"), None).is_err());
//! assert!(QueryRequest::new("quicksave", "ships").with_cache_key("../etc").is_err());
//!
//! let pagination = Pagination::new(60, 25, 25);
//! assert!(pagination.has_more);
//! assert!(!Pagination::new(60, 25, 50).has_more);
//! ```
use crate::components::registry::Collections;
use crate::components::ComponentType;
use crate::eventlog::cache::LogCache;
use crate::saves::SaveStorage;
use cache::QueryCache;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};

pub mod cache;
pub mod functions;

/// Contains the number of results returned if no limit is given.
pub const DEFAULT_LIMIT: usize = 100;

/// Contains the maximal number of results per page.
pub const MAX_LIMIT: usize = 1000;

/// Contains the command which lists all categories of the event log.
pub const LOG_CATEGORIES_COMMAND: &str = "log-categories";

/// Contains the prefix of commands which list the entries of an event log category.
pub const LOG_CATEGORY_PREFIX: &str = "log.";

/// Represents an error which is reported back to the caller of a query.
#[derive(Debug)]
pub enum QueryError {
    /// The given limit or offset is invalid.
    InvalidPagination(String),
    /// The given cache key contains illegal characters.
    InvalidCacheKey(String),
    /// The given save id contains illegal characters.
    InvalidSaveId(String),
    /// The requested command is unknown.
    UnknownCommand(String),
    /// The requested save has not been extracted (yet).
    SaveNotExtracted(String),
    /// The filter expression was rejected by the evaluator.
    FilterFailed(anyhow::Error),
    /// An unexpected error occurred while loading data.
    Internal(anyhow::Error),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::InvalidPagination(message) => {
                write!(f, "Invalid pagination: {}", message)
            }
            QueryError::InvalidCacheKey(key) => write!(
                f,
                "Invalid cache key '{}': only letters, digits, '-' and '_' are permitted",
                key
            ),
            QueryError::InvalidSaveId(save_id) => write!(f, "Invalid save id '{}'", save_id),
            QueryError::UnknownCommand(command) => write!(f, "Unknown command: {}", command),
            QueryError::SaveNotExtracted(save_id) => {
                write!(f, "The save {} has not been extracted yet", save_id)
            }
            QueryError::FilterFailed(error) => write!(f, "Failed to apply the filter: {:#}", error),
            QueryError::Internal(error) => write!(f, "{:#}", error),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<anyhow::Error> for QueryError {
    fn from(error: anyhow::Error) -> Self {
        QueryError::Internal(error)
    }
}

/// Evaluates filter expressions against plain JSON data.
///
/// The filter language itself isn't part of this crate. An implementation should register the
/// [string functions](functions::register_string_functions) with the underlying engine.
pub trait FilterEvaluator {
    /// Returns all elements of **data** which match the given expression.
    fn filter(&self, expression: &str, data: Vec<Value>) -> anyhow::Result<Vec<Value>>;
}

/// Describes which part of a result has been returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Contains the total number of results (after filtering).
    pub total: usize,
    /// Contains the maximal number of results per page.
    pub limit: usize,
    /// Contains the number of skipped results.
    pub offset: usize,
    /// Determines if there are results beyond this page.
    pub has_more: bool,
}

impl Pagination {
    /// Creates the pagination info for the given parameters.
    pub fn new(total: usize, limit: usize, offset: usize) -> Self {
        Pagination {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total,
        }
    }

    /// Extracts the current page out of the given results.
    pub fn page(&self, mut results: Vec<Value>) -> Vec<Value> {
        if self.offset >= results.len() {
            return Vec::new();
        }

        results.truncate(self.offset.saturating_add(self.limit));
        results.split_off(self.offset)
    }
}

/// Describes a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Contains the id of the save to query.
    pub save_id: String,
    /// Contains the command which determines the data to query.
    pub command: String,
    /// Contains the optional filter expression.
    pub filter: Option<String>,
    /// Contains an optional cache key supplied by the caller.
    pub cache_key: Option<String>,
    /// Contains the maximal number of results to return.
    pub limit: usize,
    /// Contains the number of results to skip.
    pub offset: usize,
}

impl QueryRequest {
    /// Creates an unfiltered query for the first page of results.
    pub fn new(save_id: impl Into<String>, command: impl Into<String>) -> Self {
        QueryRequest {
            save_id: save_id.into(),
            command: command.into(),
            filter: None,
            cache_key: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Applies the given filter expression. A blank expression is ignored.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = if filter.trim().is_empty() {
            None
        } else {
            Some(filter)
        };

        self
    }

    /// Specifies the key under which the result is cached.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Result<Self, QueryError> {
        let key = key.into();
        if !is_valid_cache_key(&key) {
            return Err(QueryError::InvalidCacheKey(key));
        }

        self.cache_key = Some(key);
        Ok(self)
    }

    /// Parses and applies the pagination parameters as given by a caller.
    pub fn with_pagination(
        mut self,
        limit: Option<&str>,
        offset: Option<&str>,
    ) -> Result<Self, QueryError> {
        if let Some(limit) = limit {
            self.limit = match limit.trim().parse::<usize>() {
                Ok(limit) if limit > 0 && limit <= MAX_LIMIT => limit,
                _ => {
                    return Err(QueryError::InvalidPagination(format!(
                        "The limit has to be a number between 1 and {} but was '{}'",
                        MAX_LIMIT, limit
                    )))
                }
            };
        }
        if let Some(offset) = offset {
            self.offset = offset.trim().parse::<usize>().map_err(|_| {
                QueryError::InvalidPagination(format!(
                    "The offset has to be a positive number but was '{}'",
                    offset
                ))
            })?;
        }

        Ok(self)
    }

    /// Determines the key under which the result of this query is cached.
    ///
    /// An explicit key always wins. Otherwise, only unfiltered queries are cached.
    pub fn effective_cache_key(&self) -> Option<String> {
        match (&self.cache_key, &self.filter) {
            (Some(key), _) => Some(key.clone()),
            (None, None) => Some(auto_cache_key(&self.command, &self.save_id)),
            (None, Some(_)) => None,
        }
    }
}

/// Determines if the given string can be used as cache key.
pub fn is_valid_cache_key(key: &str) -> bool {
    lazy_static::lazy_static! {
        static ref CACHE_KEY: regex::Regex = regex::Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap();
    }

    CACHE_KEY.is_match(key)
}

/// Computes the cache key of an unfiltered query.
///
/// # Example
/// ```
/// assert_eq!(xsave::query::auto_cache_key("ships", "quicksave"), "_ships_unfiltered_quicksave");
/// assert_eq!(xsave::query::auto_cache_key("log.trade", "quicksave"), "_log-trade_unfiltered_quicksave");
/// ```
pub fn auto_cache_key(command: &str, save_id: &str) -> String {
    let sanitize = |value: &str| -> String {
        value
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                    ch
                } else {
                    '-'
                }
            })
            .collect()
    };

    format!("_{}_unfiltered_{}", sanitize(command), sanitize(save_id))
}

/// Contains the result of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Contains the requested page of results.
    pub data: Vec<Value>,
    /// Describes the page.
    pub pagination: Pagination,
    /// Determines if the results were served from the cache.
    pub cached: bool,
}

/// Executes queries against the storage.
pub struct QueryService {
    storage: SaveStorage,
    cache: QueryCache,
    evaluator: Option<Box<dyn FilterEvaluator + Send + Sync>>,
}

impl QueryService {
    /// Creates a service which doesn't support filters.
    pub fn new(storage: SaveStorage) -> Self {
        QueryService {
            cache: QueryCache::new(storage.clone()),
            storage,
            evaluator: None,
        }
    }

    /// Installs the evaluator for filter expressions.
    pub fn with_evaluator(mut self, evaluator: Box<dyn FilterEvaluator + Send + Sync>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Provides access to the underlying cache.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Executes the given query.
    pub fn query(&self, request: &QueryRequest) -> Result<QueryResult, QueryError> {
        if !is_valid_cache_key(&request.save_id) {
            return Err(QueryError::InvalidSaveId(request.save_id.clone()));
        }
        if !self.storage.is_extracted(&request.save_id) {
            return Err(QueryError::SaveNotExtracted(request.save_id.clone()));
        }

        let cache_key = request.effective_cache_key();
        let cached = cache_key.as_ref().and_then(|key| {
            match self.cache.retrieve(&request.save_id, key) {
                Some(Value::Array(results)) => Some(results),
                _ => None,
            }
        });

        let (results, from_cache) = match cached {
            Some(results) => (results, true),
            None => {
                let results = self.execute(request)?;
                if let Some(key) = &cache_key {
                    if let Err(error) = self.cache.store(
                        &request.save_id,
                        key,
                        &Value::Array(results.clone()),
                    ) {
                        log::warn!("Failed to cache the query result: {:#}", error);
                    }
                }
                (results, false)
            }
        };

        let pagination = Pagination::new(results.len(), request.limit, request.offset);
        Ok(QueryResult {
            data: pagination.page(results),
            pagination,
            cached: from_cache,
        })
    }

    /// Loads and filters the data of the given query.
    fn execute(&self, request: &QueryRequest) -> Result<Vec<Value>, QueryError> {
        let data = self.load(&request.save_id, &request.command)?;

        match (&request.filter, &self.evaluator) {
            (None, _) => Ok(data),
            (Some(filter), Some(evaluator)) => evaluator
                .filter(filter, data)
                .map_err(QueryError::FilterFailed),
            (Some(_), None) => Err(QueryError::FilterFailed(anyhow::anyhow!(
                "No filter evaluator is available"
            ))),
        }
    }

    /// Loads the unfiltered data of the given command.
    ///
    /// Both the save id and a category id become part of a file path, therefore they are limited
    /// to the characters permitted in cache keys.
    pub fn load(&self, save_id: &str, command: &str) -> Result<Vec<Value>, QueryError> {
        if !is_valid_cache_key(save_id) {
            return Err(QueryError::InvalidSaveId(save_id.to_owned()));
        }

        if let Some(component_type) = ComponentType::from_command(command) {
            return Ok(Collections::load(
                &self.storage.json_dir(save_id),
                component_type,
            )?);
        }

        let log_cache = LogCache::new(self.storage.event_log_dir(save_id));
        if command == LOG_CATEGORIES_COMMAND {
            let analysis = crate::ledger::Analysis::open(self.storage.analysis_file(save_id));
            return Ok(log_cache
                .load(&analysis)?
                .into_iter()
                .map(|category| {
                    json!({
                        "id": category.id,
                        "label": category.label,
                        "startTime": category.start_time,
                        "entries": category.entries.len(),
                    })
                })
                .collect());
        }

        if let Some(category_id) = command.strip_prefix(LOG_CATEGORY_PREFIX) {
            if !is_valid_cache_key(category_id) {
                return Err(QueryError::UnknownCommand(command.to_owned()));
            }

            return match log_cache.load_category(category_id) {
                Some(category) => Ok(category
                    .entries
                    .iter()
                    .filter_map(|entry| serde_json::to_value(entry).ok())
                    .collect()),
                None => Err(QueryError::UnknownCommand(command.to_owned())),
            };
        }

        Err(QueryError::UnknownCommand(command.to_owned()))
    }

    /// Fills the auto cache of the given commands for a freshly extracted save.
    ///
    /// Returns the number of cache entries written. Failing commands are only logged.
    pub fn warm_up(&self, save_id: &str, commands: &[String]) -> usize {
        let mut warmed = 0;
        for command in commands {
            let key = auto_cache_key(command, save_id);
            match self.load(save_id, command) {
                Ok(results) => match self.cache.store(save_id, &key, &Value::Array(results)) {
                    Ok(_) => warmed += 1,
                    Err(error) => log::warn!("Failed to warm up {}: {:#}", key, error),
                },
                Err(error) => log::warn!("Cannot warm up {} for {}: {}", command, save_id, error),
            }
        }

        warmed
    }
}

#[cfg(test)]
mod tests {
    use crate::query::{
        FilterEvaluator, Pagination, QueryError, QueryRequest, QueryService,
    };
    use crate::saves::SaveStorage;
    use serde_json::{json, Value};

    struct NameFilter;

    impl FilterEvaluator for NameFilter {
        fn filter(&self, expression: &str, data: Vec<Value>) -> anyhow::Result<Vec<Value>> {
            if expression == "broken" {
                anyhow::bail!("Syntax error");
            }
            Ok(data
                .into_iter()
                .filter(|value| {
                    crate::query::functions::call(
                        "contains_i",
                        &[value["name"].clone(), json!(expression)],
                    )
                    .map(|result| result == json!(true))
                    .unwrap_or(false)
                })
                .collect())
        }
    }

    fn setup() -> (tempfile::TempDir, QueryService) {
        let folder = tempfile::tempdir().unwrap();
        let storage = SaveStorage::new(folder.path());
        std::fs::create_dir_all(storage.json_dir("quicksave")).unwrap();
        std::fs::write(storage.analysis_file("quicksave"), "{}").unwrap();
        let ships: Vec<Value> = (0..5)
            .map(|index| json!({"componentID": format!("[0x{}]", index), "name": format!("Ship {}", index)}))
            .collect();
        crate::files::write_json(
            &storage.json_dir("quicksave").join("collection-ship.json"),
            &json!({ "ship": ships }),
        )
        .unwrap();

        let service = QueryService::new(storage).with_evaluator(Box::new(NameFilter));
        (folder, service)
    }

    #[test]
    fn pagination_is_applied_after_loading() {
        let (_folder, service) = setup();
        let request = QueryRequest::new("quicksave", "ships")
            .with_pagination(Some("2"), Some("3"))
            .unwrap();

        let result = service.query(&request).unwrap();
        assert_eq!(result.data.len(), 2);
        assert_eq!(result.data[0]["name"], "Ship 3");
        assert_eq!(result.pagination, Pagination::new(5, 2, 3));
        assert!(!result.pagination.has_more);
        assert!(!result.cached);

        // The second page is served by the auto cache...
        let request = QueryRequest::new("quicksave", "ships")
            .with_pagination(Some("2"), Some("0"))
            .unwrap();
        let result = service.query(&request).unwrap();
        assert!(result.cached);
        assert!(result.pagination.has_more);

        let beyond = QueryRequest::new("quicksave", "ships")
            .with_pagination(None, Some("10"))
            .unwrap();
        assert!(service.query(&beyond).unwrap().data.is_empty());
    }

    #[test]
    fn filtered_queries_are_only_cached_with_an_explicit_key() {
        let (_folder, service) = setup();
        let filtered = QueryRequest::new("quicksave", "ships").with_filter("ship 1");

        let result = service.query(&filtered).unwrap();
        assert_eq!(result.pagination.total, 1);
        assert!(!service.query(&filtered).unwrap().cached);

        let keyed = filtered.with_cache_key("my-search").unwrap();
        assert!(!service.query(&keyed).unwrap().cached);
        assert!(service.query(&keyed).unwrap().cached);
    }

    #[test]
    fn errors_are_reported_to_the_caller() {
        let (_folder, service) = setup();

        assert!(matches!(
            service.query(&QueryRequest::new("autosave", "ships")),
            Err(QueryError::SaveNotExtracted(_))
        ));
        assert!(matches!(
            service.query(&QueryRequest::new("quicksave", "asteroids")),
            Err(QueryError::UnknownCommand(_))
        ));
        assert!(matches!(
            service.query(&QueryRequest::new("quicksave", "ships").with_filter("broken")),
            Err(QueryError::FilterFailed(_))
        ));
        assert!(matches!(
            service.query(&QueryRequest::new("quicksave", "stations")),
            Err(QueryError::Internal(_))
        ));
        assert!(matches!(
            QueryRequest::new("quicksave", "ships").with_pagination(None, Some("-1")),
            Err(QueryError::InvalidPagination(_))
        ));
    }

    #[test]
    fn ids_cannot_escape_the_storage_folder() {
        let (folder, service) = setup();
        std::fs::create_dir_all(folder.path().join("quicksave/JSON/event-log")).unwrap();
        crate::files::write_json(
            &folder.path().join("quicksave/JSON/secret.json"),
            &json!({"id": "secret", "entries": []}),
        )
        .unwrap();

        for save_id in ["..", "../outside", "quicksave/..", ""] {
            assert!(matches!(
                service.query(&QueryRequest::new(save_id, "ships")),
                Err(QueryError::InvalidSaveId(_))
            ));
            assert!(matches!(
                service.load(save_id, "ships"),
                Err(QueryError::InvalidSaveId(_))
            ));
        }
        assert!(matches!(
            service.query(&QueryRequest::new("quicksave", "log.../secret")),
            Err(QueryError::UnknownCommand(_))
        ));
        assert_eq!(service.warm_up("../outside", &["ships".to_owned()]), 0);

        assert!(!folder.path().join("outside").exists());
        assert!(!folder.path().parent().unwrap().join("outside").exists());
    }

    #[test]
    fn warm_up_fills_the_auto_cache() {
        let (_folder, service) = setup();
        let warmed = service.warm_up(
            "quicksave",
            &["ships".to_owned(), "stations".to_owned()],
        );
        assert_eq!(warmed, 1);
        assert!(service
            .cache()
            .is_valid("quicksave", "_ships_unfiltered_quicksave"));
    }
}
