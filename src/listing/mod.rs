use std::collections::HashMap;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::gateway::{GatewayError, Order, RecordStore};
use crate::model::{RecordId, SchoolRecord};

/// Records keyed by id, remembering the order the service returned them in.
#[derive(Clone, Debug, Default)]
pub struct RecordArena {
    order: Vec<RecordId>,
    by_id: HashMap<RecordId, SchoolRecord>,
}

impl RecordArena {
    pub fn from_records(records: Vec<SchoolRecord>) -> Self {
        let mut arena = Self::default();
        for record in records {
            arena.push_back(record);
        }
        arena
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&SchoolRecord> {
        self.by_id.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchoolRecord> + '_ {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    // A duplicate id from the service replaces the earlier row in place.
    fn push_back(&mut self, record: SchoolRecord) {
        if self.by_id.insert(record.id.clone(), record.clone()).is_none() {
            self.order.push(record.id);
        }
    }

    fn push_front(&mut self, record: SchoolRecord) {
        if self.by_id.insert(record.id.clone(), record.clone()).is_none() {
            self.order.insert(0, record.id);
        }
    }

    fn replace(&mut self, record: SchoolRecord) -> bool {
        match self.by_id.get_mut(&record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, id: &RecordId) -> Option<SchoolRecord> {
        let removed = self.by_id.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }
}

/// True when `record` passes both the free-text query and the city selector.
///
/// The query is a case-insensitive substring match against name, city and
/// state; an empty query matches everything. The city selector is an exact
/// match.
pub fn matches_filter(record: &SchoolRecord, query: &str, city: Option<&str>) -> bool {
    if let Some(city) = city {
        if record.city != city {
            return false;
        }
    }
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    [&record.name, &record.city, &record.state]
        .iter()
        .any(|haystack| haystack.to_lowercase().contains(&needle))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
    Failed(String),
}

/// What the listing should show right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListingState {
    Loading,
    Failed(String),
    /// The table holds no records at all.
    Empty,
    /// Records exist but none pass the current filters.
    NoMatches,
    Showing { shown: usize, total: usize },
}

impl ListingState {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ListingState::Empty => Some("Be the first to add a school to our directory!"),
            ListingState::NoMatches => Some("Try adjusting your search criteria."),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ListingView {
    canonical: RecordArena,
    query: String,
    city: Option<String>,
    filtered: Vec<RecordId>,
    load: LoadState,
}

impl Default for ListingView {
    fn default() -> Self {
        Self {
            canonical: RecordArena::default(),
            query: String::new(),
            city: None,
            filtered: Vec::new(),
            load: LoadState::Loading,
        }
    }
}

impl ListingView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an already fetched list, e.g. one handed over by another view.
    pub fn with_records(records: Vec<SchoolRecord>) -> Self {
        let mut view = Self::new();
        view.replace_all(records);
        view
    }

    /// Fetches the whole table, newest first, and makes it the canonical list.
    pub async fn load(&mut self, store: &dyn RecordStore) -> Result<(), GatewayError> {
        self.load = LoadState::Loading;
        match store.list_all(Some(Order::newest_first())).await {
            Ok(records) => {
                debug!(count = records.len(), "loaded canonical list");
                self.replace_all(records);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to load schools");
                self.load = LoadState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn replace_all(&mut self, records: Vec<SchoolRecord>) {
        self.canonical = RecordArena::from_records(records);
        self.load = LoadState::Loaded;
        self.refilter();
    }

    fn refilter(&mut self) {
        let query = self.query.as_str();
        let city = self.city.as_deref();
        self.filtered = self
            .canonical
            .iter()
            .filter(|r| matches_filter(r, query, city))
            .map(|r| r.id.clone())
            .collect();
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.refilter();
    }

    /// `None` or an empty string selects all cities.
    pub fn set_city(&mut self, city: Option<String>) {
        self.city = city.filter(|c| !c.is_empty());
        self.refilter();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn has_filters(&self) -> bool {
        !self.query.is_empty() || self.city.is_some()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn total(&self) -> usize {
        self.canonical.len()
    }

    pub fn get(&self, id: &RecordId) -> Option<&SchoolRecord> {
        self.canonical.get(id)
    }

    pub fn canonical(&self) -> impl Iterator<Item = &SchoolRecord> + '_ {
        self.canonical.iter()
    }

    pub fn filtered(&self) -> Vec<&SchoolRecord> {
        self.filtered
            .iter()
            .filter_map(|id| self.canonical.get(id))
            .collect()
    }

    /// Distinct cities of the canonical list, sorted ascending.
    pub fn cities(&self) -> Vec<String> {
        self.canonical
            .iter()
            .map(|r| r.city.clone())
            .unique()
            .sorted()
            .collect()
    }

    pub fn state(&self) -> ListingState {
        match &self.load {
            LoadState::Loading => ListingState::Loading,
            LoadState::Failed(message) => ListingState::Failed(message.clone()),
            LoadState::Loaded if self.canonical.is_empty() => ListingState::Empty,
            LoadState::Loaded if self.filtered.is_empty() => ListingState::NoMatches,
            LoadState::Loaded => ListingState::Showing {
                shown: self.filtered.len(),
                total: self.canonical.len(),
            },
        }
    }

    /// A freshly created record is the newest, so it goes first.
    pub fn apply_created(&mut self, record: SchoolRecord) {
        self.canonical.push_front(record);
        self.refilter();
    }

    pub fn apply_updated(&mut self, record: SchoolRecord) {
        if !self.canonical.replace(record.clone()) {
            debug!(id = %record.id, "updated record was not in the canonical list");
            self.canonical.push_front(record);
        }
        self.refilter();
    }

    pub fn apply_deleted(&mut self, id: &RecordId) {
        if self.canonical.remove(id).is_none() {
            debug!(%id, "deleted record was not in the canonical list");
        }
        self.refilter();
    }
}
