use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ArcsError, ErrorInfo};

/// Selects the fitness weights used by the group optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    /// Size balance and uniformity weighted equally.
    #[default]
    Balanced,
    /// Favour group-size balance.
    SizeFirst,
    /// Favour similar label mixes across groups.
    UniformityFirst,
    /// Favour diverse labels within each group.
    HeterogeneityFirst,
}

impl PriorityMode {
    /// Every mode, in declaration order.
    pub const ALL: [PriorityMode; 4] = [
        PriorityMode::Balanced,
        PriorityMode::SizeFirst,
        PriorityMode::UniformityFirst,
        PriorityMode::HeterogeneityFirst,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityMode::Balanced => "balanced",
            PriorityMode::SizeFirst => "size_first",
            PriorityMode::UniformityFirst => "uniformity_first",
            PriorityMode::HeterogeneityFirst => "heterogeneity_first",
        }
    }
}

impl fmt::Display for PriorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriorityMode {
    type Err = ArcsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        PriorityMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == raw)
            .ok_or_else(|| {
                ArcsError::InvalidInput(
                    ErrorInfo::new("unknown-priority-mode", "unrecognised priority mode")
                        .with_context("value", raw),
                )
            })
    }
}

/// Whether groups should mix labels or keep them pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// Label-pure groups, formed without the evolutionary search.
    Homogeneous,
    /// Mixed groups optimised by the evolutionary search.
    #[default]
    Heterogeneous,
}

impl std::str::FromStr for GroupingMode {
    type Err = ArcsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "homogeneous" => Ok(GroupingMode::Homogeneous),
            "heterogeneous" => Ok(GroupingMode::Heterogeneous),
            other => Err(ArcsError::InvalidInput(
                ErrorInfo::new("unknown-grouping-mode", "unrecognised grouping mode")
                    .with_context("value", other),
            )),
        }
    }
}
