#![deny(missing_docs)]
#![doc = "Cohort statistics and priority-mode recommendation ahead of group formation."]

/// Diversity, size and balance statistics over a cohort.
pub mod metrics;
/// Rule-based priority-mode recommendation.
pub mod recommend;

use arcs_core::MotivationProfile;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use metrics::{analyze, normalized_shannon, AnalysisQuality, ClassMetrics};
pub use recommend::{recommend, Candidate, Recommendation};

/// Metrics plus the recommendation, or the reason it was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAnalysis {
    /// Cohort statistics.
    pub metrics: ClassMetrics,
    /// Recommended mode, absent when the coverage gate failed.
    pub recommendation: Option<Recommendation>,
    /// Diagnostic explaining a refused recommendation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

/// Analyzes a cohort and attaches a recommendation when coverage allows.
pub fn analyze_class(profiles: &[MotivationProfile], threshold_percent: u32) -> ClassAnalysis {
    let metrics = analyze(profiles);
    match recommend(&metrics, threshold_percent) {
        Ok(recommendation) => {
            debug!(
                mode = %recommendation.mode,
                confidence = recommendation.confidence,
                "priority mode recommended"
            );
            ClassAnalysis {
                metrics,
                recommendation: Some(recommendation),
                refusal: None,
            }
        }
        Err(err) => ClassAnalysis {
            metrics,
            recommendation: None,
            refusal: Some(err.to_string()),
        },
    }
}
