//! Profile store contract and the in-memory implementation used by tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::errors::{ArcsError, ErrorInfo};
use crate::types::{ArcsScores, MotivationLevel, MotivationProfile, StudentId};

/// Narrow capability interface over the persisted motivation profiles.
///
/// Implementations must make [`ProfileStore::save_labels`] atomic: either every
/// label is persisted or the store is left unchanged.
pub trait ProfileStore: Send + Sync {
    /// Reads every profile in a single consistent snapshot.
    fn load_profiles(&self) -> Result<Vec<MotivationProfile>, ArcsError>;

    /// Bulk label update.
    fn save_labels(&self, labels: &BTreeMap<StudentId, MotivationLevel>) -> Result<(), ArcsError>;

    /// Upserts the ARCS scores for one student without reclustering.
    fn record_arcs_response(&self, student: &StudentId, scores: ArcsScores)
        -> Result<(), ArcsError>;
}

/// Failure the in-memory store should simulate on upcoming calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// Report a concurrent write.
    Stale,
    /// Report the backing store as unreachable.
    Unavailable,
}

#[derive(Debug, Default)]
struct InMemoryState {
    profiles: BTreeMap<StudentId, MotivationProfile>,
    pending_faults: Vec<InjectedFault>,
    load_count: usize,
    save_count: usize,
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryProfileStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the provided profiles.
    pub fn with_profiles(profiles: impl IntoIterator<Item = MotivationProfile>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            for profile in profiles {
                state.profiles.insert(profile.student_id.clone(), profile);
            }
        }
        store
    }

    /// Queues faults returned, in order, by the next store calls.
    pub fn inject_faults(&self, faults: impl IntoIterator<Item = InjectedFault>) {
        if let Ok(mut state) = self.state.lock() {
            state.pending_faults.extend(faults);
        }
    }

    /// Number of `load_profiles` calls served so far.
    pub fn load_count(&self) -> usize {
        self.state.lock().map(|state| state.load_count).unwrap_or(0)
    }

    /// Number of successful `save_labels` calls.
    pub fn save_count(&self) -> usize {
        self.state.lock().map(|state| state.save_count).unwrap_or(0)
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, ArcsError> {
        self.state.lock().map_err(|_| {
            ArcsError::StoreUnavailable(ErrorInfo::new(
                "store-poisoned",
                "in-memory store mutex was poisoned",
            ))
        })
    }
}

fn take_fault(state: &mut InMemoryState, operation: &str) -> Result<(), ArcsError> {
    if state.pending_faults.is_empty() {
        return Ok(());
    }
    let fault = state.pending_faults.remove(0);
    Err(match fault {
        InjectedFault::Stale => ArcsError::StaleData(
            ErrorInfo::new("concurrent-write", "profile snapshot changed underneath the call")
                .with_context("operation", operation),
        ),
        InjectedFault::Unavailable => ArcsError::StoreUnavailable(
            ErrorInfo::new("store-offline", "profile store is unreachable")
                .with_context("operation", operation),
        ),
    })
}

impl ProfileStore for InMemoryProfileStore {
    fn load_profiles(&self) -> Result<Vec<MotivationProfile>, ArcsError> {
        let mut state = self.guard()?;
        take_fault(&mut state, "load_profiles")?;
        state.load_count += 1;
        Ok(state.profiles.values().cloned().collect())
    }

    fn save_labels(&self, labels: &BTreeMap<StudentId, MotivationLevel>) -> Result<(), ArcsError> {
        let mut state = self.guard()?;
        take_fault(&mut state, "save_labels")?;
        for (student, label) in labels {
            let Some(profile) = state.profiles.get(student) else {
                return Err(ArcsError::InvalidInput(
                    ErrorInfo::new("unknown-student", "label refers to an unknown student")
                        .with_context("student_id", student.as_str()),
                ));
            };
            if label.is_analyzed() && profile.complete_vector().is_none() {
                return Err(ArcsError::InvalidInput(
                    ErrorInfo::new(
                        "label-without-scores",
                        "analyzed labels require a complete ARCS vector",
                    )
                    .with_context("student_id", student.as_str()),
                ));
            }
        }
        for (student, label) in labels {
            if let Some(profile) = state.profiles.get_mut(student) {
                profile.label = *label;
            }
        }
        state.save_count += 1;
        Ok(())
    }

    fn record_arcs_response(
        &self,
        student: &StudentId,
        scores: ArcsScores,
    ) -> Result<(), ArcsError> {
        let mut state = self.guard()?;
        take_fault(&mut state, "record_arcs_response")?;
        let profile = state
            .profiles
            .entry(student.clone())
            .or_insert_with(|| MotivationProfile::new(student.clone()));
        profile.scores = Some(scores);
        if !scores.is_complete() {
            profile.label = MotivationLevel::Unanalyzed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(id: &str, label: MotivationLevel) -> MotivationProfile {
        MotivationProfile {
            student_id: StudentId::new(id),
            scores: Some(ArcsScores::new(3.0, 3.0, 3.0, 3.0)),
            label,
        }
    }

    #[test]
    fn save_is_all_or_nothing() {
        let store = InMemoryProfileStore::with_profiles([labelled("a", MotivationLevel::Low)]);
        let mut labels = BTreeMap::new();
        labels.insert(StudentId::new("a"), MotivationLevel::High);
        labels.insert(StudentId::new("ghost"), MotivationLevel::High);
        assert!(store.save_labels(&labels).is_err());
        let profiles = store.load_profiles().unwrap();
        assert_eq!(profiles[0].label, MotivationLevel::Low);
    }

    #[test]
    fn incomplete_response_resets_label() {
        let store = InMemoryProfileStore::with_profiles([labelled("a", MotivationLevel::High)]);
        let partial = ArcsScores {
            attention: Some(4.0),
            ..ArcsScores::default()
        };
        store
            .record_arcs_response(&StudentId::new("a"), partial)
            .unwrap();
        let profiles = store.load_profiles().unwrap();
        assert_eq!(profiles[0].label, MotivationLevel::Unanalyzed);
        assert!(profiles[0].is_consistent());
    }

    #[test]
    fn injected_faults_are_consumed_in_order() {
        let store = InMemoryProfileStore::new();
        store.inject_faults([InjectedFault::Stale, InjectedFault::Unavailable]);
        assert!(matches!(store.load_profiles(), Err(ArcsError::StaleData(_))));
        assert!(matches!(
            store.load_profiles(),
            Err(ArcsError::StoreUnavailable(_))
        ));
        assert!(store.load_profiles().is_ok());
    }
}
