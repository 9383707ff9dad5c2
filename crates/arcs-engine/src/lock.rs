use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arcs_core::{ArcsError, ErrorInfo};

/// Advisory locks keyed by cohort.
///
/// Entries are never removed; the map grows with the number of distinct
/// cohorts seen by one engine.
#[derive(Debug, Default)]
pub struct CohortLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CohortLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `cohort`, creating it on first use.
    pub fn handle(&self, cohort: &str) -> Result<Arc<Mutex<()>>, ArcsError> {
        let mut locks = self.locks.lock().map_err(|_| poisoned(cohort))?;
        Ok(locks
            .entry(cohort.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Number of cohorts that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    /// Whether no cohort has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn poisoned(cohort: &str) -> ArcsError {
    ArcsError::StoreUnavailable(
        ErrorInfo::new("cohort-lock-poisoned", "a previous holder of the cohort lock panicked")
            .with_context("cohort", cohort),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_cohort_shares_a_lock() {
        let locks = CohortLocks::new();
        let a = locks.handle("class-a").unwrap();
        let b = locks.handle("class-a").unwrap();
        let c = locks.handle("class-b").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(locks.len(), 2);
    }
}
