//! Execution status model and severity ordering.
//!
//! [`ExecutionStatus`] is totally ordered by severity so that aggregation is a
//! plain maximum: `Failed > Ignored > Bypassed > Passed > NotRun`.

use std::fmt;

/// Outcome of a step, scenario, or whole run.
///
/// Variants are declared in ascending severity, so the derived [`Ord`] is the
/// severity order used by every aggregation in the crate.
///
/// # Examples
///
/// ```
/// use stepflow::ExecutionStatus;
///
/// assert!(ExecutionStatus::Failed > ExecutionStatus::Ignored);
/// assert!(ExecutionStatus::Bypassed > ExecutionStatus::Passed);
/// assert_eq!(ExecutionStatus::default(), ExecutionStatus::NotRun);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecutionStatus {
    /// The step or scenario was never invoked.
    #[default]
    NotRun,
    /// Execution completed without errors.
    Passed,
    /// Execution completed but part of the behaviour was deliberately bypassed.
    Bypassed,
    /// Execution was stopped by an ignore signal.
    Ignored,
    /// Execution failed.
    Failed,
}

impl ExecutionStatus {
    /// Retrieve the lowercase label for the status.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow::ExecutionStatus;
    ///
    /// assert_eq!(ExecutionStatus::NotRun.label(), "notrun");
    /// assert_eq!(ExecutionStatus::Failed.label(), "failed");
    /// ```
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotRun => "notrun",
            Self::Passed => "passed",
            Self::Bypassed => "bypassed",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }

    /// Move `self` to `other` when `other` is more severe.
    ///
    /// The status never moves to a less severe value, so repeated calls keep
    /// the worst outcome seen so far.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow::ExecutionStatus;
    ///
    /// let mut status = ExecutionStatus::Passed;
    /// status.escalate(ExecutionStatus::Failed);
    /// status.escalate(ExecutionStatus::Bypassed);
    /// assert_eq!(status, ExecutionStatus::Failed);
    /// ```
    pub fn escalate(&mut self, other: Self) {
        if other > *self {
            *self = other;
        }
    }

    /// Whether the default execution policy stops the scenario after a step
    /// ends with this status.
    #[must_use]
    pub const fn stops_scenario(self) -> bool {
        matches!(self, Self::Ignored | Self::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotRun => "NotRun",
            Self::Passed => "Passed",
            Self::Bypassed => "Bypassed",
            Self::Ignored => "Ignored",
            Self::Failed => "Failed",
        };
        f.write_str(text)
    }
}

/// Return the most severe status in `statuses`, or `None` when empty.
///
/// # Examples
///
/// ```
/// use stepflow::{max_severity, ExecutionStatus};
///
/// let worst = max_severity([ExecutionStatus::Passed, ExecutionStatus::Ignored]);
/// assert_eq!(worst, Some(ExecutionStatus::Ignored));
/// assert_eq!(max_severity(std::iter::empty()), None);
/// ```
#[must_use]
pub fn max_severity(statuses: impl IntoIterator<Item = ExecutionStatus>) -> Option<ExecutionStatus> {
    statuses.into_iter().max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ASCENDING: [ExecutionStatus; 5] = [
        ExecutionStatus::NotRun,
        ExecutionStatus::Passed,
        ExecutionStatus::Bypassed,
        ExecutionStatus::Ignored,
        ExecutionStatus::Failed,
    ];

    #[test]
    fn severity_is_a_strict_total_order() {
        for (i, lower) in ASCENDING.iter().enumerate() {
            for higher in ASCENDING.iter().skip(i + 1) {
                assert!(higher > lower, "{higher} should outrank {lower}");
            }
        }
    }

    #[rstest]
    #[case(ExecutionStatus::Passed, ExecutionStatus::NotRun, ExecutionStatus::Passed)]
    #[case(ExecutionStatus::Ignored, ExecutionStatus::Failed, ExecutionStatus::Failed)]
    #[case(ExecutionStatus::Failed, ExecutionStatus::Bypassed, ExecutionStatus::Failed)]
    fn escalate_never_downgrades(
        #[case] start: ExecutionStatus,
        #[case] other: ExecutionStatus,
        #[case] expected: ExecutionStatus,
    ) {
        let mut status = start;
        status.escalate(other);
        assert_eq!(status, expected);
    }

    #[test]
    fn aggregation_ignores_input_order() {
        let forward = max_severity(ASCENDING);
        let backward = max_severity(ASCENDING.into_iter().rev());
        let shuffled = max_severity([
            ExecutionStatus::Bypassed,
            ExecutionStatus::Failed,
            ExecutionStatus::NotRun,
            ExecutionStatus::Passed,
            ExecutionStatus::Ignored,
        ]);
        assert_eq!(forward, Some(ExecutionStatus::Failed));
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn aggregation_is_associative() {
        let left = max_severity([
            max_severity([ExecutionStatus::Passed, ExecutionStatus::Bypassed]).unwrap_or_default(),
            ExecutionStatus::NotRun,
        ]);
        let right = max_severity([
            ExecutionStatus::Passed,
            max_severity([ExecutionStatus::Bypassed, ExecutionStatus::NotRun]).unwrap_or_default(),
        ]);
        assert_eq!(left, right);
    }

    #[test]
    fn only_failed_and_ignored_stop_the_scenario() {
        let stopping: Vec<_> = ASCENDING.into_iter().filter(|s| s.stops_scenario()).collect();
        assert_eq!(stopping, [ExecutionStatus::Ignored, ExecutionStatus::Failed]);
    }
}
