use std::collections::BTreeMap;

use arcs_core::{level_distribution, MotivationLevel, MotivationProfile};
use serde::{Deserialize, Serialize};

/// Ideal group size the size challenge is measured against.
pub const IDEAL_GROUP_SIZE: usize = 4;

/// Coverage band derived from the analyzed percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisQuality {
    /// At least 90% analyzed.
    Excellent,
    /// At least 80% analyzed.
    Good,
    /// At least 70% analyzed.
    Fair,
    /// Below 70%.
    Poor,
}

impl AnalysisQuality {
    /// Band for a coverage percentage in `[0, 100]`.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            AnalysisQuality::Excellent
        } else if percentage >= 80.0 {
            AnalysisQuality::Good
        } else if percentage >= 70.0 {
            AnalysisQuality::Fair
        } else {
            AnalysisQuality::Poor
        }
    }
}

/// Cohort statistics feeding the recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Number of profiles considered.
    pub total: usize,
    /// Profiles carrying an analyzed label.
    pub analyzed: usize,
    /// `analyzed / total` in percent (0 for an empty cohort).
    pub analyzed_percentage: f64,
    /// Count per label, including `Unanalyzed`.
    pub distribution: BTreeMap<MotivationLevel, usize>,
    /// Shannon entropy over High/Medium/Low normalized by `ln 3`.
    pub diversity_index: f64,
    /// `(N mod 4) / 4` over the analyzed students.
    pub size_challenge: f64,
    /// Smallest over largest level count.
    pub uniformity_potential: f64,
    /// How many of the `ceil(N/4)` groups could receive the rarest level.
    pub heterogeneity_potential: f64,
    /// Coverage band.
    pub analysis_quality: AnalysisQuality,
}

impl ClassMetrics {
    /// Count for an analyzed level.
    pub fn level_count(&self, level: MotivationLevel) -> usize {
        self.distribution.get(&level).copied().unwrap_or(0)
    }
}

/// Computes [`ClassMetrics`] for a cohort.
pub fn analyze(profiles: &[MotivationProfile]) -> ClassMetrics {
    let distribution = level_distribution(profiles.iter().map(|profile| &profile.label));
    let total = profiles.len();
    let counts: Vec<usize> = MotivationLevel::ANALYZED
        .iter()
        .map(|level| distribution.get(level).copied().unwrap_or(0))
        .collect();
    let analyzed: usize = counts.iter().sum();
    let analyzed_percentage = if total == 0 {
        0.0
    } else {
        analyzed as f64 * 100.0 / total as f64
    };

    let min_count = counts.iter().copied().min().unwrap_or(0);
    let max_count = counts.iter().copied().max().unwrap_or(0);
    let uniformity_potential = if max_count == 0 {
        0.0
    } else {
        min_count as f64 / max_count as f64
    };
    let group_slots = analyzed.div_ceil(IDEAL_GROUP_SIZE);
    let heterogeneity_potential = if group_slots == 0 {
        0.0
    } else {
        group_slots.min(min_count) as f64 / group_slots as f64
    };

    ClassMetrics {
        total,
        analyzed,
        analyzed_percentage,
        distribution,
        diversity_index: normalized_shannon(&counts, 3),
        size_challenge: (analyzed % IDEAL_GROUP_SIZE) as f64 / IDEAL_GROUP_SIZE as f64,
        uniformity_potential,
        heterogeneity_potential,
        analysis_quality: AnalysisQuality::from_percentage(analyzed_percentage),
    }
}

/// Shannon entropy of `counts` normalized by `ln(categories)`; 0 when the
/// normalizer vanishes or there is nothing to count.
pub fn normalized_shannon(counts: &[usize], categories: usize) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 || categories < 2 {
        return 0.0;
    }
    let entropy: f64 = counts
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.ln()
        })
        .sum();
    (entropy / (categories as f64).ln()).clamp(0.0, 1.0)
}
