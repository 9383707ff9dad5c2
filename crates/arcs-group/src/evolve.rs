use std::cmp::Ordering;

use arcs_core::{ArcsError, CancelToken, ErrorInfo, RngHandle, RunBudget};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OptimizerConfig;
use crate::determinism;
use crate::fitness::{self, FitnessBreakdown, FitnessContext};

/// Candidate assignment with its cached fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Group index per member.
    pub genes: Vec<usize>,
    /// Fitness of `genes`.
    pub fitness: FitnessBreakdown,
}

/// Cooperative stop conditions checked at the top of every generation.
#[derive(Default, Clone, Copy)]
pub struct RunControls<'a> {
    /// Cancellation flag.
    pub cancel: Option<&'a CancelToken>,
    /// Wall-clock budget.
    pub budget: Option<&'a RunBudget>,
}

/// Result of an evolutionary run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionSummary {
    /// Best individual of the final population.
    pub best: Individual,
    /// Generations that ran to completion.
    pub generations_done: usize,
    /// Whether the run stopped on the cancel token.
    pub cancelled: bool,
    /// Whether the run stopped on the budget.
    pub budget_exceeded: bool,
    /// Best total fitness after initialization and after every generation.
    pub history: Vec<f64>,
}

/// Runs the (mu + lambda) search from the given seeds plus random
/// individuals. Survivors are chosen by a stable sort over parents followed
/// by offspring, so the incumbent best is never displaced by an equal child.
pub fn evolve(
    slots: &[usize],
    ctx: &FitnessContext,
    seeds: &[Vec<usize>],
    config: &OptimizerConfig,
    master_seed: u64,
    controls: RunControls<'_>,
) -> Result<EvolutionSummary, ArcsError> {
    if ctx.groups == 0 {
        return Err(ArcsError::Config(ErrorInfo::new(
            "no-groups",
            "evolution needs at least one group",
        )));
    }
    let members = slots.len();

    let mut init_rng = RngHandle::from_seed(determinism::population_seed(master_seed));
    let mut population = Vec::with_capacity(seeds.len() + config.random_individuals);
    for genes in seeds {
        population.push(scored(genes.clone(), slots, ctx)?);
    }
    for _ in 0..config.random_individuals {
        let genes = (0..members).map(|_| init_rng.index(ctx.groups)).collect();
        population.push(scored(genes, slots, ctx)?);
    }
    sort_descending(&mut population);
    population.truncate(config.population);
    let Some(first) = population.first() else {
        return Err(ArcsError::Config(ErrorInfo::new(
            "empty-population",
            "initial population is empty",
        )));
    };

    let mut history = vec![first.fitness.total];
    let mut generations_done = 0;
    let mut cancelled = false;
    let mut budget_exceeded = false;

    for generation in 0..config.generations {
        if controls.cancel.is_some_and(CancelToken::is_cancelled) {
            cancelled = true;
            break;
        }
        if controls.budget.is_some_and(RunBudget::expired) {
            budget_exceeded = true;
            break;
        }

        let mut rng = RngHandle::from_seed(determinism::generation_seed(master_seed, generation));
        let mut offspring = Vec::with_capacity(config.offspring);
        for _ in 0..config.offspring {
            let mother = tournament(&population, config.tournament_size, &mut rng);
            let father = tournament(&population, config.tournament_size, &mut rng);
            let mut genes = if rng.unit() < config.crossover_rate {
                uniform_crossover(
                    &population[mother].genes,
                    &population[father].genes,
                    config.gene_swap_probability,
                    &mut rng,
                )
            } else {
                population[mother].genes.clone()
            };
            mutate(&mut genes, ctx.groups, config.mutation_rate, &mut rng);
            offspring.push(scored(genes, slots, ctx)?);
        }

        population.extend(offspring);
        sort_descending(&mut population);
        population.truncate(config.population);
        history.push(population[0].fitness.total);
        generations_done += 1;
    }

    debug!(
        generations_done,
        cancelled,
        budget_exceeded,
        best = population[0].fitness.total,
        "evolution finished"
    );
    Ok(EvolutionSummary {
        best: population.swap_remove(0),
        generations_done,
        cancelled,
        budget_exceeded,
        history,
    })
}

fn scored(genes: Vec<usize>, slots: &[usize], ctx: &FitnessContext) -> Result<Individual, ArcsError> {
    let fitness = fitness::evaluate(&genes, slots, ctx);
    if !fitness.is_finite() {
        return Err(ArcsError::NumericalDegeneracy(
            ErrorInfo::new("non-finite-fitness", "fitness evaluated to a non-finite value")
                .with_context("total", fitness.total.to_string()),
        ));
    }
    Ok(Individual { genes, fitness })
}

fn sort_descending(population: &mut [Individual]) {
    population.sort_by(|a, b| {
        b.fitness
            .total
            .partial_cmp(&a.fitness.total)
            .unwrap_or(Ordering::Equal)
    });
}

/// Index of the fittest of `size` uniformly drawn entrants; the first drawn
/// wins ties.
fn tournament(population: &[Individual], size: usize, rng: &mut RngHandle) -> usize {
    let mut winner = rng.index(population.len());
    for _ in 1..size {
        let entrant = rng.index(population.len());
        if population[entrant].fitness.total > population[winner].fitness.total {
            winner = entrant;
        }
    }
    winner
}

fn uniform_crossover(
    first: &[usize],
    second: &[usize],
    swap_probability: f64,
    rng: &mut RngHandle,
) -> Vec<usize> {
    first
        .iter()
        .zip(second.iter())
        .map(|(&a, &b)| if rng.unit() < swap_probability { b } else { a })
        .collect()
}

fn mutate(genes: &mut [usize], groups: usize, rate: f64, rng: &mut RngHandle) {
    for gene in genes.iter_mut() {
        if rng.unit() < rate {
            *gene = rng.index(groups);
        }
    }
}
