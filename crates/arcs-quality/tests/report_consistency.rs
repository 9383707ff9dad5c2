use arcs_core::{GroupingMode, MotivationLevel, PriorityMode, StudentId};
use arcs_group::{
    form_partition, plan_groups, Coverage, GroupingParams, Member, OptimizerConfig, RunControls,
};
use arcs_quality::{score, score_partition};

fn members(levels: &[MotivationLevel]) -> Vec<Member> {
    levels
        .iter()
        .enumerate()
        .map(|(idx, level)| Member {
            student_id: StudentId::new(format!("q{idx}")),
            level: *level,
        })
        .collect()
}

fn twelve() -> Vec<Member> {
    use MotivationLevel::*;
    members(&[High, High, High, High, Medium, Medium, Medium, Medium, Low, Low, Low, Low])
}

#[test]
fn rescoring_matches_the_optimizer() {
    let members = twelve();
    let config = OptimizerConfig::default();
    for priority in PriorityMode::ALL {
        let params = GroupingParams {
            mode: GroupingMode::Heterogeneous,
            priority,
            seed: 31,
            coverage: Coverage {
                analyzed: 12,
                total: 12,
                threshold_percent: 80,
            },
            controls: RunControls::default(),
        };
        let partition = form_partition(&members, &params, &config).unwrap();
        let report = score_partition(&members, &partition, &config).unwrap();
        assert_eq!(report.size_score, partition.fitness.size);
        assert_eq!(report.uniformity, partition.fitness.uniformity);
        assert_eq!(report.heterogeneity, partition.fitness.heterogeneity);
        assert_eq!(report.weighted_fitness, partition.fitness.total);
        assert_eq!(report.priority_mode, priority);
    }
}

#[test]
fn mixed_groups_read_as_diverse_and_balanced() {
    let members = twelve();
    let plan = plan_groups(12, &OptimizerConfig::default().sizing);
    // each group: two of one label, one of each other
    let assignment = [0, 1, 2, 0, 0, 1, 2, 1, 1, 2, 0, 2];
    let report = score(
        &members,
        &assignment,
        &plan,
        PriorityMode::Balanced,
        &OptimizerConfig::default(),
    )
    .unwrap();
    assert_eq!(report.empty_groups, 0);
    assert_eq!(report.balance, 1.0);
    assert_eq!(report.heterogeneity, 1.0);
    assert_eq!(report.interpretation.balance, "Sangat Seimbang");
    assert_eq!(report.interpretation.heterogeneity, "Sangat Beragam");
    assert_eq!(report.interpretation.uniformity, "Sangat Seragam");
    for group in &report.groups {
        assert_eq!(group.size, 4);
        assert!(group.diversity > 0.9 && group.diversity <= 1.0);
        assert_eq!(group.distribution.values().sum::<usize>(), 4);
    }
}

#[test]
fn empty_groups_scale_balance() {
    let members = twelve();
    let plan = plan_groups(12, &OptimizerConfig::default().sizing);
    let assignment = [0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1];
    let config = OptimizerConfig::default();
    let report = score(&members, &assignment, &plan, PriorityMode::Balanced, &config).unwrap();
    assert_eq!(report.empty_groups, 1);
    assert!((report.balance - report.size_score * 0.8).abs() < 1e-12);
    assert_eq!(report.groups[2].size, 0);
    assert_eq!(report.groups[2].diversity, 0.0);
}

#[test]
fn pure_groups_read_as_uniform_free() {
    let members = twelve();
    let plan = plan_groups(12, &OptimizerConfig::default().sizing);
    let assignment = [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2];
    let report = score(
        &members,
        &assignment,
        &plan,
        PriorityMode::Balanced,
        &OptimizerConfig::default(),
    )
    .unwrap();
    assert_eq!(report.heterogeneity, 0.0);
    assert_eq!(report.interpretation.heterogeneity, "Kurang Beragam");
    assert!(report.legacy_uniformity < report.uniformity);
    assert!(report.groups.iter().all(|g| g.diversity == 0.0));
}

#[test]
fn malformed_assignments_are_rejected() {
    let members = twelve();
    let plan = plan_groups(12, &OptimizerConfig::default().sizing);
    let config = OptimizerConfig::default();
    let err = score(&members, &[0; 5], &plan, PriorityMode::Balanced, &config).unwrap_err();
    assert_eq!(err.info().code, "assignment-length");
    let err = score(&members, &[7; 12], &plan, PriorityMode::Balanced, &config).unwrap_err();
    assert_eq!(err.info().code, "group-out-of-range");
}

#[test]
fn report_serializes_with_interpretation() {
    let members = twelve();
    let plan = plan_groups(12, &OptimizerConfig::default().sizing);
    let assignment = [0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2];
    let report = score(
        &members,
        &assignment,
        &plan,
        PriorityMode::SizeFirst,
        &OptimizerConfig::default(),
    )
    .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["priority_mode"], "size_first");
    assert!(json["interpretation"]["balance"].is_string());
    assert_eq!(json["groups"].as_array().unwrap().len(), 3);
}
