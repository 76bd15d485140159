use std::fmt;
use std::time::Duration;

use crate::failure::FailureReport;

/// Outcome of one collection cycle.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// What the cycle walked over, e.g. "profiles".
    pub label: &'static str,
    /// Entities the scheduler selected.
    pub total: usize,
    /// Entities fetched and stored without error.
    pub succeeded: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Change events appended during the run.
    pub events_recorded: usize,
    /// Items stored on behalf of the entities (posts per profile).
    pub items_saved: usize,
    pub failures: FailureReport,
    pub elapsed: Duration,
}

impl RunSummary {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Distinct entities that failed. A profile whose posts failed to save
    /// more than once still counts once.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.total.saturating_sub(self.succeeded)
    }

    #[must_use]
    pub fn avg_per_entity(&self) -> Duration {
        match u32::try_from(self.total) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.elapsed / n,
            Err(_) => self.elapsed / u32::MAX,
        }
    }

    /// Percentage of selected entities that succeeded; 100 for an empty run.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} considered: {}", self.label, self.total)?;
        writeln!(f, "succeeded: {}", self.succeeded)?;
        writeln!(f, "failed: {}", self.failed())?;
        writeln!(f, "success rate: {:.1}%", self.success_rate())?;
        writeln!(
            f,
            "created: {}, updated: {}, unchanged: {}",
            self.created, self.updated, self.unchanged
        )?;
        writeln!(f, "events recorded: {}", self.events_recorded)?;
        if self.items_saved > 0 {
            writeln!(f, "items saved: {}", self.items_saved)?;
        }
        writeln!(f, "elapsed: {:.2}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "average per entity: {:.2}s", self.avg_per_entity().as_secs_f64())?;
        if self.has_failures() {
            writeln!(f)?;
            write!(f, "{}", self.failures)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;

    #[test]
    fn average_divides_elapsed_by_total() {
        let summary = RunSummary {
            total: 4,
            elapsed: Duration::from_secs(10),
            ..RunSummary::new("profiles")
        };
        assert_eq!(summary.avg_per_entity(), Duration::from_millis(2500));
    }

    #[test]
    fn empty_run_has_zero_average_and_full_success() {
        let summary = RunSummary::new("posts");
        assert_eq!(summary.avg_per_entity(), Duration::ZERO);
        assert!((summary.success_rate() - 100.0).abs() < f64::EPSILON);
        assert!(!summary.has_failures());
    }

    #[test]
    fn display_includes_failure_detail() {
        let mut summary = RunSummary {
            total: 2,
            succeeded: 1,
            ..RunSummary::new("profiles")
        };
        summary.failures.record(
            FailureKind::BatchError,
            "42",
            "dave",
            "batch request failed",
            Some("upstream error 503: unavailable".to_string()),
        );
        let rendered = summary.to_string();
        assert!(rendered.contains("profiles considered: 2"));
        assert!(rendered.contains("success rate: 50.0%"));
        assert!(rendered.contains("[batch_error]"));
        assert!(rendered.contains("42 (@dave)"));
    }
}
