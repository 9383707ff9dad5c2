//! Bounded retry of transient store failures.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{ArcsError, ErrorInfo};
use crate::store::ProfileStore;
use crate::types::{ArcsScores, MotivationLevel, MotivationProfile, StudentId};

/// Exponential backoff applied to [`ArcsError::StaleData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry.
    #[serde(default = "default_base_delay", with = "millis")]
    pub base_delay: Duration,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(100)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
        }
    }
}

impl RetryPolicy {
    /// Policy retrying immediately, for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (zero based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << retry.min(16))
    }

    /// Runs `op`, retrying stale-data failures. Exhausted retries surface as
    /// [`ArcsError::StoreUnavailable`].
    pub fn run<T>(
        &self,
        operation: &str,
        mut op: impl FnMut() -> Result<T, ArcsError>,
    ) -> Result<T, ArcsError> {
        let mut retry = 0;
        loop {
            match op() {
                Err(err) if err.is_transient() => {
                    if retry >= self.max_retries {
                        return Err(ArcsError::StoreUnavailable(
                            ErrorInfo::new(
                                "retries-exhausted",
                                format!("{operation} kept reporting concurrent writes"),
                            )
                            .with_context("attempts", (retry + 1).to_string())
                            .with_context("last_error", err.info().code.clone()),
                        ));
                    }
                    let delay = self.delay_for(retry);
                    warn!(
                        operation,
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "stale profile data, retrying"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    retry += 1;
                }
                other => return other,
            }
        }
    }
}

/// [`ProfileStore`] decorator applying a [`RetryPolicy`] to every call.
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ProfileStore> RetryingStore<S> {
    /// Wraps `inner` with `policy`.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: ProfileStore> ProfileStore for RetryingStore<S> {
    fn load_profiles(&self) -> Result<Vec<MotivationProfile>, ArcsError> {
        self.policy
            .run("load_profiles", || self.inner.load_profiles())
    }

    fn save_labels(&self, labels: &BTreeMap<StudentId, MotivationLevel>) -> Result<(), ArcsError> {
        self.policy
            .run("save_labels", || self.inner.save_labels(labels))
    }

    fn record_arcs_response(
        &self,
        student: &StudentId,
        scores: ArcsScores,
    ) -> Result<(), ArcsError> {
        self.policy.run("record_arcs_response", || {
            self.inner.record_arcs_response(student, scores)
        })
    }
}

impl<T: ProfileStore + ?Sized> ProfileStore for &T {
    fn load_profiles(&self) -> Result<Vec<MotivationProfile>, ArcsError> {
        (**self).load_profiles()
    }

    fn save_labels(&self, labels: &BTreeMap<StudentId, MotivationLevel>) -> Result<(), ArcsError> {
        (**self).save_labels(labels)
    }

    fn record_arcs_response(
        &self,
        student: &StudentId,
        scores: ArcsScores,
    ) -> Result<(), ArcsError> {
        (**self).record_arcs_response(student, scores)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
