//! Harness adapter contracts for `stepflow`.
//!
//! A harness owns the environment a scenario future is driven in. This crate
//! defines the framework-agnostic [`HarnessAdapter`] contract, the
//! [`ScenarioRunRequest`] handed to adapters, and [`StdHarness`], which blocks
//! the calling thread without any async runtime. [`Verdict`] translates a
//! scenario outcome into the pass, skip, or fail answer a host test expects.

mod adapter;
mod runner;
mod std_harness;
mod verdict;

pub use adapter::HarnessAdapter;
pub use runner::{ScenarioMetadata, ScenarioOutcome, ScenarioRunRequest};
pub use std_harness::StdHarness;
pub use verdict::Verdict;
