use std::sync::{Arc, PoisonError, RwLock};

use examdoc_core::{DocumentStore, StoreError};
use tracing::debug;

use crate::{build, IndexRecord};

/// Memoized record set. Rebuilt on first use, on `force_reload`, or after
/// [`IndexCache::invalidate`]; never expires on its own.
#[derive(Debug, Default)]
pub struct IndexCache {
    records: RwLock<Option<Arc<Vec<IndexRecord>>>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<P, S>(
        &self,
        problems: &P,
        solutions: &S,
        force_reload: bool,
    ) -> Result<Arc<Vec<IndexRecord>>, StoreError>
    where
        P: DocumentStore + ?Sized,
        S: DocumentStore + ?Sized,
    {
        if !force_reload {
            let cached = self.records.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(records) = cached.as_ref() {
                return Ok(Arc::clone(records));
            }
        }
        let records = Arc::new(build(problems, solutions)?);
        let mut slot = self.records.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::clone(&records));
        debug!(records = records.len(), force_reload, "index cache refreshed");
        Ok(records)
    }

    pub fn invalidate(&self) {
        let mut slot = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            debug!("index cache invalidated");
        }
    }

    pub fn is_cached(&self) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examdoc_core::MemoryStore;

    const DOC: &str = "---\nproblem_id: \"a\"\nexam_year: \"2020\"\n---\nbody\n";

    #[test]
    fn stale_until_invalidated() {
        let problems = MemoryStore::with_documents([("a", DOC)]);
        let solutions = MemoryStore::new();
        let cache = IndexCache::new();
        assert!(!cache.is_cached());
        assert_eq!(cache.get(&problems, &solutions, false).unwrap().len(), 1);

        problems.put("b", &DOC.replace("\"a\"", "\"b\"")).unwrap();
        assert_eq!(cache.get(&problems, &solutions, false).unwrap().len(), 1);

        cache.invalidate();
        assert!(!cache.is_cached());
        assert_eq!(cache.get(&problems, &solutions, false).unwrap().len(), 2);
    }

    #[test]
    fn force_reload_bypasses_cache() {
        let problems = MemoryStore::with_documents([("a", DOC)]);
        let solutions = MemoryStore::new();
        let cache = IndexCache::new();
        let first = cache.get(&problems, &solutions, false).unwrap();
        let again = cache.get(&problems, &solutions, false).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        let fresh = cache.get(&problems, &solutions, true).unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
    }
}
