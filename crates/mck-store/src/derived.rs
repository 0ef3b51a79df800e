use std::collections::HashMap;
use std::sync::RwLock;

use mck_types::{DerivedObjectFilter, DerivedObjectRecord, Outpoint};

use crate::error::{StoreError, StoreResult};

/// Index of derived objects keyed by location.
pub trait DerivedObjectStore: Send + Sync {
    /// Insert or overwrite the record at `record.location`.
    ///
    /// Returns the record previously stored at that location, if any.
    fn upsert(&self, record: DerivedObjectRecord) -> StoreResult<Option<DerivedObjectRecord>>;

    /// Look up the record at a location.
    fn get(&self, location: &Outpoint) -> StoreResult<Option<DerivedObjectRecord>>;

    /// All records matching `filter`, ordered by `(observed_at_seq, location)`.
    fn list(&self, filter: &DerivedObjectFilter) -> StoreResult<Vec<DerivedObjectRecord>>;

    /// Number of distinct locations held.
    fn len(&self) -> StoreResult<usize>;
}

/// `HashMap`-backed derived object index.
#[derive(Debug, Default)]
pub struct InMemoryDerivedObjectStore {
    records: RwLock<HashMap<Outpoint, DerivedObjectRecord>>,
}

impl InMemoryDerivedObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DerivedObjectStore for InMemoryDerivedObjectStore {
    fn upsert(&self, record: DerivedObjectRecord) -> StoreResult<Option<DerivedObjectRecord>> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.insert(record.location, record))
    }

    fn get(&self, location: &Outpoint) -> StoreResult<Option<DerivedObjectRecord>> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.get(location).cloned())
    }

    fn list(&self, filter: &DerivedObjectFilter) -> StoreResult<Vec<DerivedObjectRecord>> {
        if let DerivedObjectFilter::Location(location) = filter {
            return Ok(self.get(location)?.into_iter().collect());
        }

        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut matched: Vec<_> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by_key(|r| (r.observed_at_seq, r.location));
        Ok(matched)
    }

    fn len(&self) -> StoreResult<usize> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.len())
    }
}
