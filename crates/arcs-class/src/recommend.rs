use arcs_core::{ArcsError, PriorityMode};
use serde::{Deserialize, Serialize};

use crate::metrics::{ClassMetrics, IDEAL_GROUP_SIZE};

/// One triggered selection rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Mode proposed by the rule.
    pub mode: PriorityMode,
    /// Rule score.
    pub score: f64,
    /// Why the rule fired.
    pub reason: String,
}

/// Recommended priority mode for a cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Winning mode.
    pub mode: PriorityMode,
    /// Winning score clamped to `[0, 1]`.
    pub confidence: f64,
    /// Human readable reason.
    pub reason: String,
    /// Every rule that fired, in evaluation order.
    pub candidates: Vec<Candidate>,
}

/// Recommends a priority mode, refusing when coverage is below
/// `threshold_percent`.
pub fn recommend(
    metrics: &ClassMetrics,
    threshold_percent: u32,
) -> Result<Recommendation, ArcsError> {
    ArcsError::ensure_coverage(metrics.analyzed, metrics.total, threshold_percent)?;

    let d = metrics.diversity_index;
    let remainder = metrics.analyzed % IDEAL_GROUP_SIZE;
    let mut candidates = Vec::new();

    if metrics.size_challenge > 0.5 || remainder >= 2 {
        candidates.push(Candidate {
            mode: PriorityMode::SizeFirst,
            score: 0.8 + 0.2 * metrics.size_challenge,
            reason: format!(
                "{} students leave a remainder of {remainder} against groups of {IDEAL_GROUP_SIZE}",
                metrics.analyzed
            ),
        });
    }
    if d > 0.8 && metrics.uniformity_potential > 0.6 {
        candidates.push(Candidate {
            mode: PriorityMode::UniformityFirst,
            score: 0.7 + 0.3 * d,
            reason: format!(
                "diverse class (index {d:.2}) with comparable level counts ({:.2})",
                metrics.uniformity_potential
            ),
        });
    }
    if metrics.heterogeneity_potential > 0.7 && d > 0.6 {
        candidates.push(Candidate {
            mode: PriorityMode::HeterogeneityFirst,
            score: 0.6 + 0.4 * metrics.heterogeneity_potential,
            reason: format!(
                "every level can reach most groups (potential {:.2})",
                metrics.heterogeneity_potential
            ),
        });
    }
    if d > 0.3 && d < 0.8 {
        let bonus = if d > 0.4 && d < 0.7 { 0.3 } else { 0.1 };
        candidates.push(Candidate {
            mode: PriorityMode::Balanced,
            score: 0.5 + bonus,
            reason: format!("moderate diversity (index {d:.2})"),
        });
    }
    candidates.push(Candidate {
        mode: PriorityMode::Balanced,
        score: 0.3,
        reason: "no specific pattern detected".to_string(),
    });

    let mut best = 0;
    for (idx, candidate) in candidates.iter().enumerate() {
        if candidate.score > candidates[best].score {
            best = idx;
        }
    }
    let winner = candidates[best].clone();
    Ok(Recommendation {
        mode: winner.mode,
        confidence: winner.score.clamp(0.0, 1.0),
        reason: winner.reason,
        candidates,
    })
}
