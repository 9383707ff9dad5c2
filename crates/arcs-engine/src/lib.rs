#![deny(missing_docs)]
#![doc = "The three operations exposed to the platform: motivation clustering, class analysis and group formation."]

/// YAML-loadable engine configuration.
pub mod config;
/// Per-cohort advisory locks.
pub mod lock;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use arcs_class::{analyze, recommend, ClassAnalysis, Recommendation};
use arcs_cluster::{update_all_motivation_levels, ClusterOutcome};
use arcs_core::{
    seed_from_students, ArcsError, CancelToken, Clock, GroupingMode, MonotonicClock,
    MotivationLevel, MotivationProfile, PriorityMode, ProfileStore, RetryingStore, RunBudget,
    StudentId,
};
use arcs_group::{form_partition, Coverage, GroupPlan, GroupingParams, Member, RunControls};
use arcs_quality::{score_partition, QualityReport};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use config::EngineConfig;
pub use lock::CohortLocks;

/// Lock key used when no cohort filter is given.
pub const WHOLE_STORE: &str = "*";

/// Restricts an operation to a subset of students.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CohortFilter {
    /// Optional cohort name; used as the lock key when present.
    #[serde(default)]
    pub name: Option<String>,
    /// Students in the cohort.
    pub students: BTreeSet<StudentId>,
}

impl CohortFilter {
    /// Anonymous cohort of the given students.
    pub fn new(students: impl IntoIterator<Item = StudentId>) -> Self {
        Self {
            name: None,
            students: students.into_iter().collect(),
        }
    }

    /// Named cohort of the given students.
    pub fn named(name: impl Into<String>, students: impl IntoIterator<Item = StudentId>) -> Self {
        Self {
            name: Some(name.into()),
            students: students.into_iter().collect(),
        }
    }

    /// Lock key: the name, or a hash of the member ids.
    pub fn key(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("ids:{:016x}", seed_from_students(&self.students)),
        }
    }

    fn retain(&self, profiles: Vec<MotivationProfile>) -> Vec<MotivationProfile> {
        profiles
            .into_iter()
            .filter(|profile| self.students.contains(&profile.student_id))
            .collect()
    }
}

/// Arguments of [`Engine::form_groups`].
#[derive(Clone, Default)]
pub struct GroupingRequest {
    /// Mixed or label-pure groups.
    pub mode: GroupingMode,
    /// Fitness weighting; the class recommendation is used when absent.
    pub priority: Option<PriorityMode>,
    /// Wall-clock budget; the configured default when absent.
    pub budget: Option<Duration>,
    /// Master seed; a hash of the member ids when absent.
    pub seed: Option<u64>,
    /// Cohort to group; the whole store when absent.
    pub cohort: Option<CohortFilter>,
    /// Cooperative cancellation.
    pub cancel: Option<CancelToken>,
    /// Time source for the budget; a monotonic clock when absent.
    pub clock: Option<Arc<dyn Clock>>,
}

/// Result of [`Engine::form_groups`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingOutcome {
    /// Student ids per group. Empty groups are kept.
    pub groups: Vec<Vec<StudentId>>,
    /// Quality report of the partition.
    pub quality: QualityReport,
    /// Priority mode that weighted the search.
    pub priority_mode_used: PriorityMode,
    /// Recommendation consulted when no priority was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    /// Grouping mode used.
    pub mode: GroupingMode,
    /// Target plan.
    pub plan: GroupPlan,
    /// Completed generations.
    pub iterations_done: usize,
    /// The search stopped on the cancel token.
    pub cancelled: bool,
    /// The search stopped on the time budget.
    pub budget_exceeded: bool,
    /// Best fitness per generation.
    pub history: Vec<f64>,
    /// Notes about the run.
    pub diagnostics: Vec<String>,
    /// Master seed used.
    pub seed: u64,
}

/// Entry point wiring the store, clusterer, analyzer, optimizer and reporter.
pub struct Engine<S> {
    store: RetryingStore<S>,
    config: EngineConfig,
    locks: CohortLocks,
}

impl<S: ProfileStore> Engine<S> {
    /// Builds an engine over `store`, validating `config`.
    pub fn new(store: S, config: EngineConfig) -> Result<Self, ArcsError> {
        config.validate()?;
        Ok(Self {
            store: RetryingStore::new(store, config.retry.clone()),
            config,
            locks: CohortLocks::new(),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying store, without the retry wrapper.
    pub fn store(&self) -> &S {
        self.store.inner()
    }

    /// Re-clusters every complete profile and persists the labels.
    ///
    /// Returns `None` without writing when fewer than three complete
    /// vectors exist or they cannot be separated.
    pub fn cluster_motivation(&self) -> Result<Option<ClusterOutcome>, ArcsError> {
        let handle = self.locks.handle(WHOLE_STORE)?;
        let _guard = handle.lock().map_err(|_| lock::poisoned(WHOLE_STORE))?;
        update_all_motivation_levels(&self.store, &self.config.cluster)
    }

    /// Cohort statistics plus a priority-mode recommendation.
    ///
    /// Insufficient coverage is reported through `refusal`, not as an error.
    pub fn analyze_class(&self, filter: Option<&CohortFilter>) -> Result<ClassAnalysis, ArcsError> {
        let profiles = self.load(filter)?;
        Ok(arcs_class::analyze_class(
            &profiles,
            self.config.coverage_threshold_percent,
        ))
    }

    /// Forms study groups for a cohort. Nothing is written to the store.
    pub fn form_groups(&self, request: &GroupingRequest) -> Result<GroupingOutcome, ArcsError> {
        let key = request
            .cohort
            .as_ref()
            .map_or_else(|| WHOLE_STORE.to_string(), CohortFilter::key);
        let handle = self.locks.handle(&key)?;
        let _guard = handle.lock().map_err(|_| lock::poisoned(&key))?;

        let profiles = self.load(request.cohort.as_ref())?;
        if profiles.is_empty() {
            return Err(ArcsError::empty_cohort("no students in the requested cohort"));
        }
        let threshold = self.config.coverage_threshold_percent;
        let metrics = analyze(&profiles);

        let (priority, recommendation) = match request.priority {
            Some(priority) => (priority, None),
            None => {
                let recommendation = recommend(&metrics, threshold)?;
                (recommendation.mode, Some(recommendation))
            }
        };

        let members: Vec<Member> = profiles
            .iter()
            .filter(|profile| profile.label.is_analyzed())
            .map(|profile| Member {
                student_id: profile.student_id.clone(),
                level: profile.label,
            })
            .collect();
        let seed = request
            .seed
            .unwrap_or_else(|| seed_from_students(members.iter().map(|m| &m.student_id)));
        let clock = request
            .clock
            .clone()
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let budget = RunBudget::start(
            clock,
            request.budget.unwrap_or(self.config.optimizer.default_budget),
        );

        let params = GroupingParams {
            mode: request.mode,
            priority,
            seed,
            coverage: Coverage {
                analyzed: metrics.analyzed,
                total: metrics.total,
                threshold_percent: threshold,
            },
            controls: RunControls {
                cancel: request.cancel.as_ref(),
                budget: Some(&budget),
            },
        };
        let partition = form_partition(&members, &params, &self.config.optimizer)?;
        let quality = score_partition(&members, &partition, &self.config.optimizer)?;

        info!(
            cohort = %key,
            students = members.len(),
            groups = partition.groups.len(),
            priority = %priority,
            balance = quality.balance,
            heterogeneity = quality.heterogeneity,
            uniformity = quality.uniformity,
            "grouping complete"
        );
        Ok(GroupingOutcome {
            groups: partition.groups,
            quality,
            priority_mode_used: priority,
            recommendation,
            mode: partition.mode,
            plan: partition.plan,
            iterations_done: partition.iterations_done,
            cancelled: partition.cancelled,
            budget_exceeded: partition.budget_exceeded,
            history: partition.history,
            diagnostics: partition.diagnostics,
            seed,
        })
    }

    /// Current label per student, for callers that display the clustering.
    pub fn labels(
        &self,
        filter: Option<&CohortFilter>,
    ) -> Result<BTreeMap<StudentId, MotivationLevel>, ArcsError> {
        Ok(self
            .load(filter)?
            .into_iter()
            .map(|profile| (profile.student_id, profile.label))
            .collect())
    }

    fn load(&self, filter: Option<&CohortFilter>) -> Result<Vec<MotivationProfile>, ArcsError> {
        let profiles = self.store.load_profiles()?;
        Ok(match filter {
            Some(filter) => filter.retain(profiles),
            None => profiles,
        })
    }
}
