use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ArcsError, ErrorInfo};

/// Opaque, stable student key. Ordering is only used for deterministic maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    /// Wraps a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The four ARCS motivation dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Attention.
    Attention,
    /// Relevance.
    Relevance,
    /// Confidence.
    Confidence,
    /// Satisfaction.
    Satisfaction,
}

impl Dimension {
    /// All dimensions in canonical column order.
    pub const ALL: [Dimension; 4] = [
        Dimension::Attention,
        Dimension::Relevance,
        Dimension::Confidence,
        Dimension::Satisfaction,
    ];
}

/// One answered questionnaire item on a 5-point Likert scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikertAnswer {
    /// Dimension the item measures.
    pub dimension: Dimension,
    /// Answer value in `1..=5`.
    pub value: u8,
}

/// Per-dimension ARCS scores. A missing dimension is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArcsScores {
    /// Attention mean.
    pub attention: Option<f64>,
    /// Relevance mean.
    pub relevance: Option<f64>,
    /// Confidence mean.
    pub confidence: Option<f64>,
    /// Satisfaction mean.
    pub satisfaction: Option<f64>,
}

impl ArcsScores {
    /// Builds a fully populated score vector.
    pub fn new(attention: f64, relevance: f64, confidence: f64, satisfaction: f64) -> Self {
        Self {
            attention: Some(attention),
            relevance: Some(relevance),
            confidence: Some(confidence),
            satisfaction: Some(satisfaction),
        }
    }

    /// Aggregates raw Likert answers into per-dimension means.
    ///
    /// Dimensions without answers stay absent, which leaves the vector
    /// incomplete.
    pub fn from_likert(answers: &[LikertAnswer]) -> Result<Self, ArcsError> {
        let mut sums: BTreeMap<Dimension, (f64, usize)> = BTreeMap::new();
        for answer in answers {
            if !(1..=5).contains(&answer.value) {
                return Err(ArcsError::InvalidInput(
                    ErrorInfo::new("likert-out-of-range", "Likert answers must lie in 1..=5")
                        .with_context("value", answer.value.to_string())
                        .with_context("dimension", format!("{:?}", answer.dimension)),
                ));
            }
            let entry = sums.entry(answer.dimension).or_insert((0.0, 0));
            entry.0 += f64::from(answer.value);
            entry.1 += 1;
        }
        let mean = |dimension: Dimension| {
            sums.get(&dimension)
                .map(|(sum, count)| sum / *count as f64)
        };
        Ok(Self {
            attention: mean(Dimension::Attention),
            relevance: mean(Dimension::Relevance),
            confidence: mean(Dimension::Confidence),
            satisfaction: mean(Dimension::Satisfaction),
        })
    }

    /// Returns the score for a single dimension.
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Attention => self.attention,
            Dimension::Relevance => self.relevance,
            Dimension::Confidence => self.confidence,
            Dimension::Satisfaction => self.satisfaction,
        }
    }

    /// Returns the vector in column order when all four components are
    /// present, finite and strictly positive.
    pub fn complete(&self) -> Option<[f64; 4]> {
        let mut out = [0.0; 4];
        for (slot, dimension) in Dimension::ALL.iter().enumerate() {
            match self.get(*dimension) {
                Some(value) if value.is_finite() && value > 0.0 => out[slot] = value,
                _ => return None,
            }
        }
        Some(out)
    }

    /// Whether [`ArcsScores::complete`] would succeed.
    pub fn is_complete(&self) -> bool {
        self.complete().is_some()
    }
}

/// Discrete motivation label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MotivationLevel {
    /// Highest centroid cluster.
    High,
    /// Middle centroid cluster.
    Medium,
    /// Lowest centroid cluster.
    Low,
    /// No complete ARCS vector has been clustered yet.
    #[default]
    Unanalyzed,
}

impl MotivationLevel {
    /// The three levels assigned by the clusterer, in canonical order.
    pub const ANALYZED: [MotivationLevel; 3] = [
        MotivationLevel::High,
        MotivationLevel::Medium,
        MotivationLevel::Low,
    ];

    /// Whether the label was produced by clustering.
    pub fn is_analyzed(&self) -> bool {
        !matches!(self, MotivationLevel::Unanalyzed)
    }

    /// Stable lowercase name used by stores and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            MotivationLevel::High => "high",
            MotivationLevel::Medium => "medium",
            MotivationLevel::Low => "low",
            MotivationLevel::Unanalyzed => "unanalyzed",
        }
    }

    /// Parses the name produced by [`MotivationLevel::as_str`].
    pub fn parse(raw: &str) -> Result<Self, ArcsError> {
        match raw {
            "high" => Ok(MotivationLevel::High),
            "medium" => Ok(MotivationLevel::Medium),
            "low" => Ok(MotivationLevel::Low),
            "unanalyzed" => Ok(MotivationLevel::Unanalyzed),
            other => Err(ArcsError::Serde(
                ErrorInfo::new("unknown-level", "unrecognised motivation level")
                    .with_context("value", other),
            )),
        }
    }

    /// Index into `[High, Medium, Low]`, `None` for unanalyzed.
    pub fn slot(&self) -> Option<usize> {
        match self {
            MotivationLevel::High => Some(0),
            MotivationLevel::Medium => Some(1),
            MotivationLevel::Low => Some(2),
            MotivationLevel::Unanalyzed => None,
        }
    }
}

impl fmt::Display for MotivationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-student motivation record.
///
/// Invariant: an analyzed label implies complete scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotivationProfile {
    /// Student key.
    pub student_id: StudentId,
    /// Aggregated ARCS scores, if any response was recorded.
    #[serde(default)]
    pub scores: Option<ArcsScores>,
    /// Current label.
    #[serde(default)]
    pub label: MotivationLevel,
}

impl MotivationProfile {
    /// Creates an unanalyzed profile without scores.
    pub fn new(student_id: StudentId) -> Self {
        Self {
            student_id,
            scores: None,
            label: MotivationLevel::Unanalyzed,
        }
    }

    /// Complete ARCS vector, if available.
    pub fn complete_vector(&self) -> Option<[f64; 4]> {
        self.scores.as_ref().and_then(ArcsScores::complete)
    }

    /// Checks the label/score invariant.
    pub fn is_consistent(&self) -> bool {
        !self.label.is_analyzed() || self.complete_vector().is_some()
    }
}

/// Counts per label, always carrying all four keys.
pub fn level_distribution<'a, I>(labels: I) -> BTreeMap<MotivationLevel, usize>
where
    I: IntoIterator<Item = &'a MotivationLevel>,
{
    let mut distribution: BTreeMap<MotivationLevel, usize> = [
        MotivationLevel::High,
        MotivationLevel::Medium,
        MotivationLevel::Low,
        MotivationLevel::Unanalyzed,
    ]
    .into_iter()
    .map(|level| (level, 0))
    .collect();
    for label in labels {
        *distribution.entry(*label).or_insert(0) += 1;
    }
    distribution
}
