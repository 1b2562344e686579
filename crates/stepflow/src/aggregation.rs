//! Status and status-details roll-up.
//!
//! Scenario status is the most severe step status. The overall run status is
//! a binary collapse: `Failed` when any scenario failed, `Passed` otherwise,
//! so ignored or bypassed scenarios never fail a build.

use crate::result::StepResult;
use crate::status::{ExecutionStatus, max_severity};

/// Most severe step status, or `explicit` when there are no steps.
#[must_use]
pub fn scenario_status(steps: &[StepResult], explicit: ExecutionStatus) -> ExecutionStatus {
    max_severity(steps.iter().map(StepResult::status)).unwrap_or(explicit)
}

/// Overall status of a run.
///
/// # Examples
///
/// ```
/// use stepflow::ExecutionStatus;
/// use stepflow::aggregation::run_status;
///
/// let quiet = [ExecutionStatus::Ignored, ExecutionStatus::Bypassed, ExecutionStatus::Passed];
/// assert_eq!(run_status(quiet), ExecutionStatus::Passed);
/// assert_eq!(run_status([ExecutionStatus::Ignored, ExecutionStatus::Failed]), ExecutionStatus::Failed);
/// ```
#[must_use]
pub fn run_status(scenarios: impl IntoIterator<Item = ExecutionStatus>) -> ExecutionStatus {
    match max_severity(scenarios).unwrap_or_default() {
        ExecutionStatus::Failed => ExecutionStatus::Failed,
        _ => ExecutionStatus::Passed,
    }
}

/// Join the details of every step, prefixed with `Step {number}: `.
///
/// Composite sub-steps are visited after their parent and carry the dotted
/// group number (`Step 2.1: ...`). Returns `None` when no step has details.
#[must_use]
pub fn merge_status_details(steps: &[StepResult]) -> Option<String> {
    let mut lines = Vec::new();
    collect_details(steps, &mut lines);
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn collect_details(steps: &[StepResult], lines: &mut Vec<String>) {
    for step in steps {
        if let Some(details) = step.status_details().filter(|d| !d.trim().is_empty()) {
            lines.push(format!("Step {}: {details}", step.info().qualified_number()));
        }
        collect_details(step.sub_steps(), lines);
    }
}

/// Trim a message and indent its continuation lines with a tab.
///
/// # Examples
///
/// ```
/// use stepflow::aggregation::format_details;
///
/// assert_eq!(format_details("  expected 1\n  got 2  \n"), "expected 1\n\tgot 2");
/// ```
#[must_use]
pub fn format_details(message: &str) -> String {
    message
        .trim()
        .lines()
        .map(str::trim)
        .enumerate()
        .map(|(i, line)| if i == 0 { line.to_owned() } else { format!("\t{line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{StepInfo, StepName};
    use rstest::rstest;

    fn step(prefix: &str, number: usize, details: Option<&str>) -> StepResult {
        let mut result = StepResult::new(StepInfo::new(number, 3, prefix, StepName::default()));
        result.set_status(ExecutionStatus::Failed, details.map(ToOwned::to_owned));
        result
    }

    #[rstest]
    #[case::empty_run_passes(&[], ExecutionStatus::Passed)]
    #[case(&[ExecutionStatus::Passed], ExecutionStatus::Passed)]
    #[case(&[ExecutionStatus::NotRun, ExecutionStatus::Passed], ExecutionStatus::Passed)]
    #[case(&[ExecutionStatus::Ignored, ExecutionStatus::Bypassed, ExecutionStatus::Passed], ExecutionStatus::Passed)]
    #[case(&[ExecutionStatus::Passed, ExecutionStatus::Failed], ExecutionStatus::Failed)]
    #[case(
        &[ExecutionStatus::Ignored, ExecutionStatus::Ignored, ExecutionStatus::Failed, ExecutionStatus::Ignored],
        ExecutionStatus::Failed
    )]
    fn run_status_collapses_to_pass_or_fail(
        #[case] scenarios: &[ExecutionStatus],
        #[case] expected: ExecutionStatus,
    ) {
        assert_eq!(run_status(scenarios.iter().copied()), expected);
    }

    #[test]
    fn details_include_nested_group_numbers() {
        let mut composite = step("", 2, None);
        composite.set_sub_steps(vec![step("2.", 1, Some("inner failure"))]);
        let steps = vec![step("", 1, Some("outer\n  detail")), composite, step("", 3, None)];

        assert_eq!(
            merge_status_details(&steps).as_deref(),
            Some("Step 1: outer\n  detail\nStep 2.1: inner failure")
        );
    }

    #[test]
    fn details_are_absent_without_messages() {
        let steps = vec![step("", 1, None), step("", 2, Some("   "))];
        assert_eq!(merge_status_details(&steps), None);
    }

    #[test]
    fn format_details_handles_single_line() {
        assert_eq!(format_details("\n boom \n"), "boom");
    }
}
