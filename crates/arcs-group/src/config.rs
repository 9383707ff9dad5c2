use std::time::Duration;

use arcs_core::{ArcsError, ErrorInfo, PriorityMode};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing a grouping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Parents kept per generation (mu).
    #[serde(default = "default_population")]
    pub population: usize,
    /// Offspring produced per generation (lambda).
    #[serde(default = "default_offspring")]
    pub offspring: usize,
    /// Number of generations.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Individuals drawn per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Probability that a child is produced by crossover instead of cloning.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Per-gene probability of taking the second parent's gene.
    #[serde(default = "default_gene_swap_probability")]
    pub gene_swap_probability: f64,
    /// Per-gene probability of replacing a gene with a random group.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Random individuals in the initial population.
    #[serde(default = "default_random_individuals")]
    pub random_individuals: usize,
    /// Upper bound on heuristic seeds in the initial population.
    #[serde(default = "default_max_seeds")]
    pub max_seeds: usize,
    /// Group count and size rules.
    #[serde(default)]
    pub sizing: SizingConfig,
    /// Tunable penalty constants.
    #[serde(default)]
    pub penalties: PenaltyConfig,
    /// Wall-clock budget used when the caller supplies none.
    #[serde(default = "default_budget", with = "seconds")]
    pub default_budget: Duration,
}

fn default_population() -> usize {
    50
}

fn default_offspring() -> usize {
    100
}

fn default_generations() -> usize {
    50
}

fn default_tournament_size() -> usize {
    3
}

fn default_crossover_rate() -> f64 {
    0.7
}

fn default_gene_swap_probability() -> f64 {
    0.5
}

fn default_mutation_rate() -> f64 {
    0.1
}

fn default_random_individuals() -> usize {
    40
}

fn default_max_seeds() -> usize {
    10
}

fn default_budget() -> Duration {
    Duration::from_secs(30)
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population: default_population(),
            offspring: default_offspring(),
            generations: default_generations(),
            tournament_size: default_tournament_size(),
            crossover_rate: default_crossover_rate(),
            gene_swap_probability: default_gene_swap_probability(),
            mutation_rate: default_mutation_rate(),
            random_individuals: default_random_individuals(),
            max_seeds: default_max_seeds(),
            sizing: SizingConfig::default(),
            penalties: PenaltyConfig::default(),
            default_budget: default_budget(),
        }
    }
}

impl OptimizerConfig {
    /// Rejects values the optimizer cannot run with.
    pub fn validate(&self) -> Result<(), ArcsError> {
        let probabilities = [
            ("crossover_rate", self.crossover_rate),
            ("gene_swap_probability", self.gene_swap_probability),
            ("mutation_rate", self.mutation_rate),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(config_error(name, value.to_string(), "must lie in [0, 1]"));
            }
        }
        if self.population == 0 {
            return Err(config_error("population", "0", "must be positive"));
        }
        if self.tournament_size == 0 {
            return Err(config_error("tournament_size", "0", "must be positive"));
        }
        if self.random_individuals + self.max_seeds == 0 {
            return Err(config_error(
                "random_individuals",
                "0",
                "initial population would be empty",
            ));
        }
        self.sizing.validate()
    }
}

/// Group count and size rules for the target plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Preferred group size.
    #[serde(default = "default_ideal_size")]
    pub ideal_size: usize,
    /// Smallest size used by mixed-size plans.
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    /// Largest size before the oversize penalty applies.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Fewest groups considered by mixed-size plans.
    #[serde(default = "default_min_groups")]
    pub min_groups: usize,
    /// Most groups considered by mixed-size plans.
    #[serde(default = "default_max_groups")]
    pub max_groups: usize,
}

fn default_ideal_size() -> usize {
    4
}

fn default_min_size() -> usize {
    3
}

fn default_max_size() -> usize {
    5
}

fn default_min_groups() -> usize {
    2
}

fn default_max_groups() -> usize {
    12
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            ideal_size: default_ideal_size(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            min_groups: default_min_groups(),
            max_groups: default_max_groups(),
        }
    }
}

impl SizingConfig {
    fn validate(&self) -> Result<(), ArcsError> {
        if self.min_size == 0 || self.min_size > self.ideal_size || self.ideal_size > self.max_size {
            return Err(config_error(
                "sizing",
                format!("{}/{}/{}", self.min_size, self.ideal_size, self.max_size),
                "expected 0 < min_size <= ideal_size <= max_size",
            ));
        }
        if self.min_groups == 0 || self.min_groups > self.max_groups {
            return Err(config_error(
                "sizing.groups",
                format!("{}..{}", self.min_groups, self.max_groups),
                "expected 0 < min_groups <= max_groups",
            ));
        }
        Ok(())
    }
}

/// Penalty constants without a derivation; kept tunable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyConfig {
    /// Size-score penalty per member above `max_size`.
    #[serde(default = "default_oversize_penalty")]
    pub oversize_penalty: f64,
    /// Balance multiplier in quality reports when any group is empty.
    #[serde(default = "default_empty_group_balance_factor")]
    pub empty_group_balance_factor: f64,
}

fn default_oversize_penalty() -> f64 {
    0.1
}

fn default_empty_group_balance_factor() -> f64 {
    0.8
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            oversize_penalty: default_oversize_penalty(),
            empty_group_balance_factor: default_empty_group_balance_factor(),
        }
    }
}

/// Weights of the three fitness subscores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessWeights {
    /// Size balance weight.
    pub size: f64,
    /// Inter-group uniformity weight.
    pub uniformity: f64,
    /// Intra-group heterogeneity weight.
    pub heterogeneity: f64,
}

impl FitnessWeights {
    /// Weight table per priority mode.
    pub fn for_mode(mode: PriorityMode) -> Self {
        let (size, uniformity, heterogeneity) = match mode {
            PriorityMode::Balanced => (0.40, 0.40, 0.20),
            PriorityMode::SizeFirst => (0.60, 0.25, 0.15),
            PriorityMode::UniformityFirst => (0.25, 0.60, 0.15),
            PriorityMode::HeterogeneityFirst => (0.25, 0.25, 0.50),
        };
        Self {
            size,
            uniformity,
            heterogeneity,
        }
    }
}

fn config_error(field: &str, value: impl Into<String>, message: &str) -> ArcsError {
    ArcsError::Config(
        ErrorInfo::new("optimizer-config", message)
            .with_context("field", field)
            .with_context("value", value),
    )
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("budget must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        for mode in PriorityMode::ALL {
            let w = FitnessWeights::for_mode(mode);
            assert!((w.size + w.uniformity + w.heterogeneity - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(OptimizerConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_rate_is_rejected() {
        let config = OptimizerConfig {
            mutation_rate: 1.5,
            ..OptimizerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.info().context.get("field").map(String::as_str), Some("mutation_rate"));
    }
}
