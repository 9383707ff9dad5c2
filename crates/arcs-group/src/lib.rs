#![deny(missing_docs)]
#![doc = "Study-group formation: target sizing, fitness, evolutionary search, repair and homogeneous grouping."]

/// Optimizer parameters, sizing rules, penalties and weight tables.
pub mod config;
/// Per-run seed derivation.
pub mod determinism;
/// Size, uniformity and heterogeneity subscores.
pub mod fitness;
/// (mu + lambda) evolutionary kernel.
pub mod evolve;
/// Label-pure grouping without search.
pub mod homogeneous;
/// Post-run constraint repair.
pub mod repair;
/// Heuristic initial individuals.
pub mod seeds;
/// Group count and target size selection.
pub mod sizing;

use arcs_core::{
    ArcsError, ErrorInfo, GroupingMode, MotivationLevel, PriorityMode, RunBudget, StudentId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use config::{FitnessWeights, OptimizerConfig, PenaltyConfig, SizingConfig};
pub use evolve::RunControls;
pub use fitness::{FitnessBreakdown, FitnessContext, GroupTally};
pub use sizing::{plan_groups, GroupPlan};

/// Smallest cohort for which groups are formed; below it everyone shares
/// one group.
pub const MIN_GROUPING_MEMBERS: usize = 3;

/// An analyzed student taking part in grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Student key.
    pub student_id: StudentId,
    /// Clustered motivation label.
    pub level: MotivationLevel,
}

/// Coverage of the wider cohort the members were drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// Students with an analyzed label.
    pub analyzed: usize,
    /// Students in the cohort.
    pub total: usize,
    /// Minimum analyzed percentage.
    pub threshold_percent: u32,
}

/// Per-call grouping inputs.
#[derive(Clone, Copy)]
pub struct GroupingParams<'a> {
    /// Mixed or label-pure groups.
    pub mode: GroupingMode,
    /// Fitness weighting.
    pub priority: PriorityMode,
    /// Master seed of the run.
    pub seed: u64,
    /// Coverage gate inputs.
    pub coverage: Coverage,
    /// Cancellation and budget. Without a budget the configured default
    /// applies.
    pub controls: RunControls<'a>,
}

/// A formed partition with its diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// Student ids per group, in member input order. May contain empty groups.
    pub groups: Vec<Vec<StudentId>>,
    /// Group index per member, aligned with the input.
    pub assignment: Vec<usize>,
    /// Plan the groups were sized against.
    pub plan: GroupPlan,
    /// Fitness of the final assignment.
    pub fitness: FitnessBreakdown,
    /// Grouping mode used.
    pub mode: GroupingMode,
    /// Priority mode whose weights scored the run.
    pub priority: PriorityMode,
    /// Completed generations; 0 when no search ran.
    pub iterations_done: usize,
    /// The run stopped on the cancel token.
    pub cancelled: bool,
    /// The run stopped on the budget.
    pub budget_exceeded: bool,
    /// The search failed and the best heuristic seed was used.
    pub fell_back: bool,
    /// Moves made by the repair step.
    pub repair_moves: usize,
    /// Best fitness per generation.
    pub history: Vec<f64>,
    /// Human readable notes about the run.
    pub diagnostics: Vec<String>,
    /// Master seed used.
    pub seed: u64,
}

/// Fitness inputs for a plan under a priority mode.
pub fn fitness_context(
    plan: &GroupPlan,
    priority: PriorityMode,
    config: &OptimizerConfig,
) -> FitnessContext {
    FitnessContext {
        groups: plan.groups,
        target_sizes: plan.target_sizes.clone(),
        weights: FitnessWeights::for_mode(priority),
        penalties: config.penalties.clone(),
        max_size: config.sizing.max_size,
    }
}

/// Partitions `members` into study groups.
///
/// Fails with `EmptyCohort` when there is nobody to group and with
/// `InsufficientCoverage` when the coverage gate does not pass. Search
/// failures never surface: the best heuristic seed is used instead.
pub fn form_partition(
    members: &[Member],
    params: &GroupingParams<'_>,
    config: &OptimizerConfig,
) -> Result<Partition, ArcsError> {
    config.validate()?;
    let coverage = params.coverage;
    if coverage.total == 0 {
        return Err(ArcsError::empty_cohort("the cohort has no students"));
    }
    ArcsError::ensure_coverage(coverage.analyzed, coverage.total, coverage.threshold_percent)?;
    if members.is_empty() {
        return Err(ArcsError::empty_cohort("no analyzed students to group"));
    }
    let slots = member_slots(members)?;

    if members.len() < MIN_GROUPING_MEMBERS {
        let plan = GroupPlan::single(members.len());
        let ctx = fitness_context(&plan, params.priority, config);
        let assignment = vec![0; members.len()];
        let fitness = fitness::evaluate(&assignment, &slots, &ctx);
        debug!(members = members.len(), "cohort too small, single group");
        return Ok(Partition {
            groups: collect_groups(members, &assignment, 1),
            assignment,
            plan,
            fitness,
            mode: params.mode,
            priority: params.priority,
            iterations_done: 0,
            cancelled: false,
            budget_exceeded: false,
            fell_back: false,
            repair_moves: 0,
            history: Vec::new(),
            diagnostics: vec![format!(
                "only {} analyzed students, fewer than {MIN_GROUPING_MEMBERS}; all placed in one group",
                members.len()
            )],
            seed: params.seed,
        });
    }

    let plan = plan_groups(members.len(), &config.sizing);
    let ctx = fitness_context(&plan, params.priority, config);
    let mut diagnostics = Vec::new();
    if plan.priority == 4 {
        diagnostics.push(format!(
            "no mixed-size plan fits {} students; using {} groups of near-equal size",
            members.len(),
            plan.groups
        ));
    }

    let partition = match params.mode {
        GroupingMode::Homogeneous => {
            let assignment =
                homogeneous::homogeneous_assignment(&slots, plan.groups, &config.sizing);
            let fitness = fitness::evaluate(&assignment, &slots, &ctx);
            Partition {
                groups: collect_groups(members, &assignment, plan.groups),
                assignment,
                plan,
                fitness,
                mode: params.mode,
                priority: params.priority,
                iterations_done: 0,
                cancelled: false,
                budget_exceeded: false,
                fell_back: false,
                repair_moves: 0,
                history: Vec::new(),
                diagnostics,
                seed: params.seed,
            }
        }
        GroupingMode::Heterogeneous => {
            let fallback_budget;
            let budget = match params.controls.budget {
                Some(budget) => budget,
                None => {
                    fallback_budget = RunBudget::wall(config.default_budget);
                    &fallback_budget
                }
            };
            let controls = RunControls {
                cancel: params.controls.cancel,
                budget: Some(budget),
            };
            let seeds: Vec<Vec<usize>> =
                seeds::heuristic_seeds(&slots, &plan.target_sizes, config.max_seeds, params.seed)
                    .into_iter()
                    .map(|(_, genes)| genes)
                    .collect();

            let (mut genes, iterations_done, cancelled, budget_exceeded, history, fell_back) =
                match evolve::evolve(&slots, &ctx, &seeds, config, params.seed, controls) {
                    Ok(summary) => (
                        summary.best.genes,
                        summary.generations_done,
                        summary.cancelled,
                        summary.budget_exceeded,
                        summary.history,
                        false,
                    ),
                    Err(err) => {
                        warn!(error = %err, "evolution failed, using best heuristic seed");
                        diagnostics.push(format!(
                            "search failed ({}); best heuristic seed used",
                            err.info().code
                        ));
                        (best_seed(&seeds, &slots, &ctx), 0, false, false, Vec::new(), true)
                    }
                };
            if cancelled {
                diagnostics.push(format!("cancelled after {iterations_done} generations"));
            }
            if budget_exceeded {
                diagnostics.push(format!(
                    "time budget of {:?} exhausted after {iterations_done} generations",
                    budget.limit()
                ));
            }
            let repair_moves = repair::repair(&mut genes, &slots, &ctx);
            let fitness = fitness::evaluate(&genes, &slots, &ctx);
            Partition {
                groups: collect_groups(members, &genes, plan.groups),
                assignment: genes,
                plan,
                fitness,
                mode: params.mode,
                priority: params.priority,
                iterations_done,
                cancelled,
                budget_exceeded,
                fell_back,
                repair_moves,
                history,
                diagnostics,
                seed: params.seed,
            }
        }
    };

    info!(
        members = members.len(),
        groups = partition.plan.groups,
        priority = %partition.priority,
        fitness = partition.fitness.total,
        iterations = partition.iterations_done,
        "groups formed"
    );
    Ok(partition)
}

fn member_slots(members: &[Member]) -> Result<Vec<usize>, ArcsError> {
    members
        .iter()
        .map(|member| {
            member.level.slot().ok_or_else(|| {
                ArcsError::InvalidInput(
                    ErrorInfo::new("unanalyzed-member", "grouping needs analyzed students only")
                        .with_context("student_id", member.student_id.as_str()),
                )
            })
        })
        .collect()
}

fn best_seed(seeds: &[Vec<usize>], slots: &[usize], ctx: &FitnessContext) -> Vec<usize> {
    let mut best: Option<(f64, &Vec<usize>)> = None;
    for genes in seeds {
        let total = fitness::evaluate(genes, slots, ctx).total;
        let total = if total.is_finite() { total } else { f64::NEG_INFINITY };
        if best.map_or(true, |(current, _)| total > current) {
            best = Some((total, genes));
        }
    }
    match best {
        Some((_, genes)) => genes.clone(),
        None => seeds::round_robin(slots.len(), ctx.groups.max(1)),
    }
}

fn collect_groups(members: &[Member], assignment: &[usize], groups: usize) -> Vec<Vec<StudentId>> {
    let mut out = vec![Vec::new(); groups];
    for (member, &group) in members.iter().zip(assignment.iter()) {
        if let Some(slot) = out.get_mut(group) {
            slot.push(member.student_id.clone());
        }
    }
    out
}
