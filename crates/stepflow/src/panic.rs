//! Rendering of panic payloads captured from step bodies.

use std::any::Any;

/// Extract a human-readable message from a panic payload.
///
/// String payloads are returned as-is and an [`eyre::Report`] raised with
/// [`std::panic::panic_any`] renders its message. Other payloads only reveal
/// that they were not text.
///
/// # Examples
///
/// ```
/// use stepflow::panic_message;
///
/// let payload = std::panic::catch_unwind(|| panic!("boom {}", 42)).unwrap_err();
/// assert_eq!(panic_message(&*payload), "boom 42");
/// ```
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    if let Some(report) = payload.downcast_ref::<eyre::Report>() {
        return report.to_string();
    }
    String::from("panic payload is not a string")
}
