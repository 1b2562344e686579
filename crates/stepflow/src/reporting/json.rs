//! JSON writer for test-run results.
//!
//! The schema mirrors the result tree: run, features, scenarios, steps, and
//! nested sub-steps. Status labels are lowercase so downstream tools can rely
//! on consistent casing; durations are whole milliseconds and start times use
//! RFC 3339.

use std::io::Write;
use std::time::Duration;

use serde::Serialize;

use super::{FeatureResult, TestRunResult};
use crate::result::{ExecutionTime, ScenarioResult, StepResult};

#[derive(Serialize)]
struct JsonRun<'a> {
    name: &'a str,
    status: &'static str,
    features: Vec<JsonFeature<'a>>,
}

#[derive(Serialize)]
struct JsonFeature<'a> {
    name: &'a str,
    status: &'static str,
    scenarios: Vec<JsonScenario<'a>>,
}

#[derive(Serialize)]
struct JsonScenario<'a> {
    name: &'a str,
    labels: &'a [String],
    categories: &'a [String],
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    steps: Vec<JsonStep<'a>>,
}

#[derive(Serialize)]
struct JsonStep<'a> {
    number: String,
    step_type: &'a str,
    name: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    comments: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    steps: Vec<JsonStep<'a>>,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn start(time: Option<ExecutionTime>) -> Option<String> {
    time.map(|t| t.start().to_rfc3339())
}

impl<'a> From<&'a TestRunResult> for JsonRun<'a> {
    fn from(run: &'a TestRunResult) -> Self {
        Self {
            name: run.name(),
            status: run.status().label(),
            features: run.features().iter().map(JsonFeature::from).collect(),
        }
    }
}

impl<'a> From<&'a FeatureResult> for JsonFeature<'a> {
    fn from(feature: &'a FeatureResult) -> Self {
        Self {
            name: feature.name(),
            status: feature.status().label(),
            scenarios: feature
                .scenarios()
                .iter()
                .map(|s| JsonScenario::from(&**s))
                .collect(),
        }
    }
}

impl<'a> From<&'a ScenarioResult> for JsonScenario<'a> {
    fn from(scenario: &'a ScenarioResult) -> Self {
        let info = scenario.info();
        Self {
            name: info.name(),
            labels: info.labels(),
            categories: info.categories(),
            status: scenario.status().label(),
            details: scenario.status_details(),
            start: start(scenario.execution_time()),
            duration_ms: scenario.execution_time().map(|t| millis(t.duration())),
            steps: scenario.steps().iter().map(JsonStep::from).collect(),
        }
    }
}

impl<'a> From<&'a StepResult> for JsonStep<'a> {
    fn from(step: &'a StepResult) -> Self {
        let info = step.info();
        Self {
            number: info.qualified_number(),
            step_type: info.name().step_type(),
            name: info.name().rendered(),
            status: step.status().label(),
            details: step.status_details(),
            comments: step.comments(),
            duration_ms: step.execution_time().map(|t| millis(t.duration())),
            steps: step.sub_steps().iter().map(Self::from).collect(),
        }
    }
}

/// Serialize `run` into `writer`.
///
/// # Examples
///
/// ```
/// use stepflow::reporting::{TestRun, json};
///
/// let run = TestRun::new("nightly");
/// let mut buffer = Vec::new();
/// json::write(&mut buffer, &run.snapshot())?;
/// let output = String::from_utf8(buffer)?;
/// assert!(output.contains("\"status\":\"passed\""));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
///
/// Returns an error when serialization or writing fails.
pub fn write<W: Write>(writer: &mut W, run: &TestRunResult) -> serde_json::Result<()> {
    serde_json::to_writer(writer, &JsonRun::from(run))
}

/// Produce the JSON text for `run`.
///
/// # Errors
///
/// Returns an error when serialization fails.
pub fn to_string(run: &TestRunResult) -> serde_json::Result<String> {
    serde_json::to_string(&JsonRun::from(run))
}

/// Produce indented JSON text for `run`.
///
/// # Errors
///
/// Returns an error when serialization fails.
pub fn to_string_pretty(run: &TestRunResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonRun::from(run))
}
