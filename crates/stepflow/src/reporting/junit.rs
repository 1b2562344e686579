//! `JUnit` XML writer for test-run results.
//!
//! Each feature becomes a `<testsuite>` and each scenario a `<testcase>`.
//! Failed scenarios carry a `<failure>` child and ignored or not-run
//! scenarios a `<skipped>` child, both with the scenario's status details.
//! Bypassed scenarios count as passed.

use std::fmt::{self, Write};
use std::time::Duration;

use super::{FeatureResult, TestRunResult};
use crate::result::ScenarioResult;
use crate::status::ExecutionStatus;

struct Counts {
    tests: usize,
    failures: usize,
    skipped: usize,
}

impl Counts {
    fn of<'a>(scenarios: impl Iterator<Item = &'a ScenarioResult>) -> Self {
        let mut counts = Self {
            tests: 0,
            failures: 0,
            skipped: 0,
        };
        for scenario in scenarios {
            counts.tests += 1;
            match scenario.status() {
                ExecutionStatus::Failed => counts.failures += 1,
                ExecutionStatus::Ignored | ExecutionStatus::NotRun => counts.skipped += 1,
                ExecutionStatus::Passed | ExecutionStatus::Bypassed => {}
            }
        }
        counts
    }
}

/// Render `run` as a `JUnit` XML document.
///
/// # Examples
///
/// ```
/// use stepflow::reporting::{TestRun, junit};
///
/// let mut output = String::new();
/// junit::write(&mut output, &TestRun::new("nightly").snapshot())?;
/// assert!(output.contains("<testsuites name=\"nightly\""));
/// # Ok::<(), std::fmt::Error>(())
/// ```
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn write<W: Write>(writer: &mut W, run: &TestRunResult) -> fmt::Result {
    let counts = Counts::of(run.scenarios().map(|s| &**s));
    writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
    writer.write_str("<testsuites name=\"")?;
    write_escaped(writer, run.name())?;
    writeln!(
        writer,
        "\" tests=\"{}\" failures=\"{}\" skipped=\"{}\">",
        counts.tests, counts.failures, counts.skipped
    )?;
    for feature in run.features() {
        write_feature(writer, feature)?;
    }
    writer.write_str("</testsuites>\n")
}

fn write_feature<W: Write>(writer: &mut W, feature: &FeatureResult) -> fmt::Result {
    let counts = Counts::of(feature.scenarios().iter().map(|s| &**s));
    writer.write_str("  <testsuite name=\"")?;
    write_escaped(writer, feature.name())?;
    writeln!(
        writer,
        "\" tests=\"{}\" failures=\"{}\" skipped=\"{}\">",
        counts.tests, counts.failures, counts.skipped
    )?;
    for scenario in feature.scenarios() {
        write_scenario(writer, feature.name(), scenario)?;
    }
    writer.write_str("  </testsuite>\n")
}

fn write_scenario<W: Write>(writer: &mut W, feature: &str, scenario: &ScenarioResult) -> fmt::Result {
    writer.write_str("    <testcase name=\"")?;
    write_escaped(writer, scenario.info().name())?;
    writer.write_str("\" classname=\"")?;
    write_escaped(writer, feature)?;
    writer.write_char('"')?;
    if let Some(time) = scenario.execution_time() {
        write!(writer, " time=\"{}\"", seconds(time.duration()))?;
    }
    let child = match scenario.status() {
        ExecutionStatus::Failed => Some("failure"),
        ExecutionStatus::Ignored | ExecutionStatus::NotRun => Some("skipped"),
        ExecutionStatus::Passed | ExecutionStatus::Bypassed => None,
    };
    let Some(child) = child else {
        return writer.write_str(" />\n");
    };
    writer.write_str(">\n")?;
    write!(writer, "      <{child}")?;
    if let Some(details) = scenario.status_details() {
        writer.write_str(" message=\"")?;
        write_escaped(writer, details)?;
        writer.write_char('"')?;
    }
    writer.write_str(" />\n")?;
    writer.write_str("    </testcase>\n")
}

fn seconds(duration: Duration) -> String {
    format!("{}.{:03}", duration.as_secs(), duration.subsec_millis())
}

/// Produce the XML text for `run`.
///
/// # Errors
///
/// Returns an error if formatting fails.
pub fn to_string(run: &TestRunResult) -> Result<String, fmt::Error> {
    let mut output = String::new();
    write(&mut output, run)?;
    Ok(output)
}

fn write_escaped<W: Write>(writer: &mut W, value: &str) -> fmt::Result {
    const INVALID_REPLACEMENT: &str = "&#xFFFD;";
    for character in value.chars() {
        if !is_valid_xml_character(character) {
            writer.write_str(INVALID_REPLACEMENT)?;
            continue;
        }
        match character {
            '&' => writer.write_str("&amp;")?,
            '<' => writer.write_str("&lt;")?,
            '>' => writer.write_str("&gt;")?,
            '"' => writer.write_str("&quot;")?,
            '\'' => writer.write_str("&apos;")?,
            '\n' => writer.write_str("&#10;")?,
            other => writer.write_char(other)?,
        }
    }
    Ok(())
}

fn is_valid_xml_character(character: char) -> bool {
    matches!(
        u32::from(character),
        0x09 | 0x0A | 0x0D
            | 0x20..=0xD7FF
            | 0xE000..=0xFFFD
            | 0x1_0000..=0x10_FFFF
    )
}
