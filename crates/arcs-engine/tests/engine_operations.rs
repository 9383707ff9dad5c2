use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arcs_core::{
    ArcsError, ArcsScores, CancelToken, GroupingMode, InMemoryProfileStore, InjectedFault,
    MotivationLevel, MotivationProfile, PriorityMode, ProfileStore, RetryPolicy, SteppingClock,
    StudentId,
};
use arcs_engine::{CohortFilter, Engine, EngineConfig, GroupingRequest};
use arcs_store::SqliteProfileStore;
use tempfile::tempdir;

fn labelled(high: usize, medium: usize, low: usize) -> Vec<MotivationProfile> {
    let mut profiles = Vec::new();
    for (count, level, value) in [
        (high, MotivationLevel::High, 4.6),
        (medium, MotivationLevel::Medium, 3.1),
        (low, MotivationLevel::Low, 1.4),
    ] {
        for _ in 0..count {
            profiles.push(MotivationProfile {
                student_id: StudentId::new(format!("s{:03}", profiles.len())),
                scores: Some(ArcsScores::new(value, value, value, value)),
                label: level,
            });
        }
    }
    profiles
}

fn engine_over(profiles: Vec<MotivationProfile>) -> Engine<InMemoryProfileStore> {
    Engine::new(
        InMemoryProfileStore::with_profiles(profiles),
        EngineConfig::default(),
    )
    .unwrap()
}

fn all_students(groups: &[Vec<StudentId>]) -> BTreeSet<StudentId> {
    groups.iter().flatten().cloned().collect()
}

#[test]
fn cluster_then_group_end_to_end() {
    let store = InMemoryProfileStore::new();
    for (idx, base) in [1.2, 1.3, 1.1, 1.25, 3.0, 3.1, 2.9, 3.05, 4.7, 4.8, 4.6, 4.75]
        .into_iter()
        .enumerate()
    {
        store
            .record_arcs_response(
                &StudentId::new(format!("s{idx:02}")),
                ArcsScores::new(base, base + 0.05, base - 0.05, base),
            )
            .unwrap();
    }
    let engine = Engine::new(store, EngineConfig::default()).unwrap();

    let outcome = engine.cluster_motivation().unwrap().expect("three bands separate");
    assert_eq!(outcome.clusters_found, 3);
    assert_eq!(outcome.total, 12);
    let labels = engine.labels(None).unwrap();
    assert_eq!(labels[&StudentId::new("s00")], MotivationLevel::Low);
    assert_eq!(labels[&StudentId::new("s05")], MotivationLevel::Medium);
    assert_eq!(labels[&StudentId::new("s09")], MotivationLevel::High);

    let grouped = engine
        .form_groups(&GroupingRequest {
            priority: Some(PriorityMode::Balanced),
            ..GroupingRequest::default()
        })
        .unwrap();
    assert_eq!(grouped.groups.len(), 3);
    assert_eq!(all_students(&grouped.groups).len(), 12);
    assert_eq!(grouped.quality.heterogeneity, 1.0);
    assert!(grouped.recommendation.is_none());
}

#[test]
fn clustering_too_few_vectors_writes_nothing() {
    let engine = engine_over(Vec::new());
    engine
        .store()
        .record_arcs_response(&StudentId::new("a"), ArcsScores::new(3.0, 3.0, 3.0, 3.0))
        .unwrap();
    assert!(engine.cluster_motivation().unwrap().is_none());
    assert_eq!(engine.store().save_count(), 0);
}

#[test]
fn auto_priority_follows_recommendation() {
    let engine = engine_over(labelled(4, 4, 2));
    let outcome = engine.form_groups(&GroupingRequest::default()).unwrap();
    assert_eq!(outcome.priority_mode_used, PriorityMode::SizeFirst);
    let recommendation = outcome.recommendation.expect("auto priority records the recommendation");
    assert_eq!(recommendation.mode, PriorityMode::SizeFirst);
    assert_eq!(outcome.plan.target_sizes, vec![5, 5]);
    assert!(outcome.groups.iter().all(|group| group.len() == 5));
    assert_eq!(outcome.quality.priority_mode, PriorityMode::SizeFirst);
}

#[test]
fn analysis_refuses_low_coverage_without_failing() {
    let mut profiles = labelled(5, 5, 5);
    for idx in 0..5 {
        profiles.push(MotivationProfile::new(StudentId::new(format!("u{idx}"))));
    }
    let engine = engine_over(profiles);

    let analysis = engine.analyze_class(None).unwrap();
    assert_eq!(analysis.metrics.total, 20);
    assert_eq!(analysis.metrics.analyzed, 15);
    assert!(analysis.recommendation.is_none());
    assert!(analysis.refusal.is_some());

    let err = engine.form_groups(&GroupingRequest::default()).unwrap_err();
    assert!(matches!(err, ArcsError::InsufficientCoverage(_)), "{err}");
    let err = engine
        .form_groups(&GroupingRequest {
            priority: Some(PriorityMode::Balanced),
            ..GroupingRequest::default()
        })
        .unwrap_err();
    assert!(matches!(err, ArcsError::InsufficientCoverage(_)), "{err}");
}

#[test]
fn empty_cohort_is_rejected() {
    let engine = engine_over(labelled(3, 3, 3));
    let request = GroupingRequest {
        cohort: Some(CohortFilter::new([StudentId::new("nobody")])),
        ..GroupingRequest::default()
    };
    let err = engine.form_groups(&request).unwrap_err();
    assert!(matches!(err, ArcsError::EmptyCohort(_)), "{err}");
}

#[test]
fn cohort_filter_limits_the_grouped_students() {
    let profiles = labelled(6, 6, 6);
    let chosen: Vec<StudentId> = profiles
        .iter()
        .step_by(2)
        .map(|profile| profile.student_id.clone())
        .collect();
    let engine = engine_over(profiles);
    let request = GroupingRequest {
        priority: Some(PriorityMode::HeterogeneityFirst),
        cohort: Some(CohortFilter::named("class-7b", chosen.clone())),
        ..GroupingRequest::default()
    };
    let outcome = engine.form_groups(&request).unwrap();
    assert_eq!(all_students(&outcome.groups), chosen.into_iter().collect());

    let analysis = engine.analyze_class(request.cohort.as_ref()).unwrap();
    assert_eq!(analysis.metrics.total, 9);
}

#[test]
fn stale_snapshot_is_retried() {
    let store = InMemoryProfileStore::with_profiles(labelled(4, 4, 4));
    store.inject_faults([InjectedFault::Stale, InjectedFault::Stale]);
    let config = EngineConfig {
        retry: RetryPolicy::immediate(3),
        ..EngineConfig::default()
    };
    let engine = Engine::new(store, config).unwrap();
    let outcome = engine.form_groups(&GroupingRequest::default()).unwrap();
    assert_eq!(all_students(&outcome.groups).len(), 12);
    assert_eq!(engine.store().load_count(), 1);
}

#[test]
fn persistent_staleness_surfaces_as_unavailable() {
    let store = InMemoryProfileStore::with_profiles(labelled(4, 4, 4));
    store.inject_faults([InjectedFault::Stale; 4]);
    let config = EngineConfig {
        retry: RetryPolicy::immediate(3),
        ..EngineConfig::default()
    };
    let engine = Engine::new(store, config).unwrap();
    let err = engine.form_groups(&GroupingRequest::default()).unwrap_err();
    assert!(matches!(err, ArcsError::StoreUnavailable(_)), "{err}");
    assert_eq!(err.info().code, "retries-exhausted");
}

#[test]
fn unavailable_store_is_not_retried() {
    let store = InMemoryProfileStore::with_profiles(labelled(4, 4, 4));
    store.inject_faults([InjectedFault::Unavailable]);
    let config = EngineConfig {
        retry: RetryPolicy::immediate(3),
        ..EngineConfig::default()
    };
    let engine = Engine::new(store, config).unwrap();
    let err = engine.analyze_class(None).unwrap_err();
    assert!(matches!(err, ArcsError::StoreUnavailable(_)), "{err}");
    assert!(engine.analyze_class(None).is_ok());
}

#[test]
fn budget_and_cancellation_reach_the_optimizer() {
    let engine = engine_over(labelled(20, 20, 20));
    let budgeted = engine
        .form_groups(&GroupingRequest {
            priority: Some(PriorityMode::Balanced),
            budget: Some(Duration::from_millis(50)),
            clock: Some(Arc::new(SteppingClock::new(Duration::from_millis(20)))),
            ..GroupingRequest::default()
        })
        .unwrap();
    assert!(budgeted.budget_exceeded);
    assert!(budgeted.iterations_done < 50);
    assert_eq!(all_students(&budgeted.groups).len(), 60);

    let cancel = CancelToken::new();
    cancel.cancel();
    let cancelled = engine
        .form_groups(&GroupingRequest {
            priority: Some(PriorityMode::Balanced),
            cancel: Some(cancel),
            ..GroupingRequest::default()
        })
        .unwrap();
    assert!(cancelled.cancelled);
    assert_eq!(cancelled.iterations_done, 0);
    assert_eq!(all_students(&cancelled.groups).len(), 60);
}

#[test]
fn homogeneous_request_keeps_labels_apart() {
    let profiles = labelled(4, 4, 4);
    let engine = engine_over(profiles.clone());
    let outcome = engine
        .form_groups(&GroupingRequest {
            mode: GroupingMode::Homogeneous,
            priority: Some(PriorityMode::Balanced),
            ..GroupingRequest::default()
        })
        .unwrap();
    assert_eq!(outcome.mode, GroupingMode::Homogeneous);
    assert_eq!(outcome.iterations_done, 0);
    for group in &outcome.groups {
        let levels: BTreeSet<MotivationLevel> = group
            .iter()
            .filter_map(|id| profiles.iter().find(|p| &p.student_id == id))
            .map(|p| p.label)
            .collect();
        assert!(levels.len() <= 1);
    }
}

#[test]
fn concurrent_requests_agree() {
    let engine = Arc::new(engine_over(labelled(8, 7, 6)));
    let request = GroupingRequest {
        priority: Some(PriorityMode::UniformityFirst),
        seed: Some(99),
        ..GroupingRequest::default()
    };
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let request = request.clone();
            thread::spawn(move || engine.form_groups(&request))
        })
        .collect();
    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();
    for outcome in &outcomes[1..] {
        assert_eq!(outcome.groups, outcomes[0].groups);
        assert_eq!(outcome.seed, 99);
    }
}

#[test]
fn sqlite_backed_engine_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("arcs.sqlite");
    {
        let store = SqliteProfileStore::open(&path).unwrap();
        for (idx, base) in [1.0, 1.2, 1.1, 3.0, 3.2, 3.1, 4.8, 4.9, 4.7].into_iter().enumerate() {
            store
                .record_arcs_response(
                    &StudentId::new(format!("s{idx}")),
                    ArcsScores::new(base, base, base, base),
                )
                .unwrap();
        }
        let engine = Engine::new(store, EngineConfig::default()).unwrap();
        engine.cluster_motivation().unwrap().expect("clustered");
    }

    let engine = Engine::new(SqliteProfileStore::open(&path).unwrap(), EngineConfig::default())
        .unwrap();
    let analysis = engine.analyze_class(None).unwrap();
    assert_eq!(analysis.metrics.analyzed, 9);
    assert_eq!(analysis.metrics.level_count(MotivationLevel::High), 3);

    let outcome = engine
        .form_groups(&GroupingRequest {
            priority: Some(PriorityMode::HeterogeneityFirst),
            ..GroupingRequest::default()
        })
        .unwrap();
    assert_eq!(all_students(&outcome.groups).len(), 9);
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["priority_mode_used"], "heterogeneity_first");
    assert!(json.get("recommendation").is_none());
}

#[test]
fn invalid_config_is_refused_at_construction() {
    let config = EngineConfig {
        coverage_threshold_percent: 101,
        ..EngineConfig::default()
    };
    let err = Engine::new(InMemoryProfileStore::new(), config).err().unwrap();
    assert!(matches!(err, ArcsError::Config(_)));
}
