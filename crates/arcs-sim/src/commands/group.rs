use std::time::Duration;

use arcs_core::{GroupingMode, PriorityMode, StudentId};
use arcs_engine::{CohortFilter, GroupingRequest};
use clap::Args;

#[derive(Args, Debug)]
pub struct CohortArgs {
    /// Restrict to these student ids (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub students: Vec<String>,
    /// Name of the cohort, used as its lock key.
    #[arg(long)]
    pub cohort: Option<String>,
}

impl CohortArgs {
    pub fn filter(&self) -> Option<CohortFilter> {
        if self.students.is_empty() {
            return None;
        }
        let students = self.students.iter().map(|raw| StudentId::new(raw.as_str()));
        Some(match &self.cohort {
            Some(name) => CohortFilter::named(name.clone(), students),
            None => CohortFilter::new(students),
        })
    }
}

#[derive(Args, Debug)]
pub struct GroupArgs {
    /// `heterogeneous` or `homogeneous`.
    #[arg(long, default_value = "heterogeneous")]
    pub mode: GroupingMode,
    /// Priority mode; the class recommendation is used when omitted.
    #[arg(long)]
    pub priority: Option<PriorityMode>,
    /// Time budget in seconds.
    #[arg(long)]
    pub budget_secs: Option<f64>,
    /// Master seed; derived from the student ids when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
    #[command(flatten)]
    pub cohort: CohortArgs,
}

impl GroupArgs {
    pub fn request(&self) -> Result<GroupingRequest, String> {
        let budget = match self.budget_secs {
            Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => return Err(format!("--budget-secs must be positive, got {secs}")),
            None => None,
        };
        Ok(GroupingRequest {
            mode: self.mode,
            priority: self.priority,
            budget,
            seed: self.seed,
            cohort: self.cohort.filter(),
            ..GroupingRequest::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(budget_secs: Option<f64>, students: &[&str]) -> GroupArgs {
        GroupArgs {
            mode: GroupingMode::Heterogeneous,
            priority: Some(PriorityMode::SizeFirst),
            budget_secs,
            seed: Some(5),
            cohort: CohortArgs {
                students: students.iter().map(|s| s.to_string()).collect(),
                cohort: None,
            },
        }
    }

    #[test]
    fn request_carries_the_flags() {
        let request = args(Some(1.5), &["a", "b"]).request().unwrap();
        assert_eq!(request.budget, Some(Duration::from_millis(1500)));
        assert_eq!(request.priority, Some(PriorityMode::SizeFirst));
        assert_eq!(request.cohort.map(|c| c.students.len()), Some(2));
    }

    #[test]
    fn non_positive_budget_is_rejected() {
        assert!(args(Some(0.0), &[]).request().is_err());
        assert!(args(None, &[]).request().unwrap().cohort.is_none());
    }
}
