//! Behavioural tests for Tokio harness execution semantics.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};
use stepflow::reporting::TestRun;
use stepflow::{
    Engine, EngineConfiguration, ExecutionContext, ExecutionStatus, ScenarioError,
    StepDescriptor, scope,
};
use stepflow_harness::{HarnessAdapter, ScenarioMetadata, ScenarioRunRequest};
use stepflow_harness_tokio::{HarnessConfig, LogLevel, TokioHarness, init_logging};

#[fixture]
fn harness() -> TokioHarness {
    let Ok(harness) = TokioHarness::new(&HarnessConfig::default()) else {
        panic!("current-thread runtime should build");
    };
    harness
}

#[fixture]
fn parallel_harness() -> TokioHarness {
    let config = HarnessConfig::default().with_worker_threads(NonZeroUsize::MIN.saturating_add(3));
    let Ok(harness) = TokioHarness::new(&config) else {
        panic!("multi-thread runtime should build");
    };
    harness
}

#[rstest]
fn tokio_harness_supports_non_static_borrows(harness: TokioHarness) {
    let mut counter = 0_u8;
    let request = ScenarioRunRequest::new(ScenarioMetadata::default(), async {
        counter += 1;
        counter
    });

    assert_eq!(harness.run(request), 1);
    assert_eq!(counter, 1);
}

#[rstest]
fn tokio_harness_supports_spawn_local(harness: TokioHarness) {
    let request = ScenarioRunRequest::new(ScenarioMetadata::default(), async {
        let task = tokio::task::spawn_local(async { "local" });
        task.await.unwrap_or("lost")
    });

    assert_eq!(harness.run(request), "local");
}

#[rstest]
fn scenarios_may_use_timers_and_spawned_tasks(harness: TokioHarness) {
    let scenario = Engine::new(EngineConfiguration::default())
        .feature("Harness")
        .scenario("timers")
        .with_context(ExecutionContext::new(7_u32))
        .add_steps([
            StepDescriptor::new("Given a slow dependency", |_ctx| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(())
            }),
            StepDescriptor::new("When work is handed to a task", |_ctx| async {
                let seen = scope::spawn(async {
                    scope::execution_context().and_then(|ctx| ctx.downcast::<u32>().map(|v| *v))
                })
                .await?;
                eyre::ensure!(seen == Some(7), "task saw {seen:?}");
                Ok(())
            }),
        ]);

    let outcome = harness.run(ScenarioRunRequest::from_scenario(scenario));
    assert!(outcome.is_ok(), "unexpected outcome: {outcome:?}");
}

#[rstest]
fn concurrent_runs_keep_submission_order(parallel_harness: TokioHarness) {
    init_logging(&HarnessConfig::default().with_log_level(LogLevel::Warn));
    let run = Arc::new(TestRun::new("parallel"));
    let engine = Engine::new(EngineConfiguration::default()).with_consumer(run.clone());

    let requests = (0..8_u64).map(|index| {
        let pause = Duration::from_millis(8_u64.saturating_sub(index));
        let scenario = engine
            .feature("Parallel")
            .scenario(format!("scenario {index}"))
            .add_step(StepDescriptor::new("Given some work", move |_ctx| async move {
                tokio::time::sleep(pause).await;
                if index == 5 {
                    eyre::bail!("scenario {index} broke");
                }
                Ok(())
            }));
        ScenarioRunRequest::from_scenario(scenario)
    });

    let Ok(outcomes) = parallel_harness.run_concurrently(requests) else {
        panic!("no task should be cancelled");
    };
    let names: Vec<String> = outcomes
        .iter()
        .map(|outcome| match outcome {
            Ok(result) => result.info().name().to_string(),
            Err(error) => error
                .result()
                .map(|result| result.info().name().to_string())
                .unwrap_or_default(),
        })
        .collect();
    let expected: Vec<String> = (0..8).map(|index| format!("scenario {index}")).collect();
    assert_eq!(names, expected);
    assert!(matches!(
        outcomes.get(5),
        Some(Err(ScenarioError::StepFailed { .. }))
    ));

    let snapshot = run.snapshot();
    assert_eq!(snapshot.scenario_count(), 8);
    assert_eq!(snapshot.count(ExecutionStatus::Failed), 1);
    let progress = engine.progress_manager().progress();
    assert_eq!((progress.finished, progress.failed, progress.pending), (8, 1, 0));
}

#[rstest]
#[should_panic(expected = "escaped the scenario")]
fn panics_escaping_a_task_reach_the_caller(harness: TokioHarness) {
    let requests = [ScenarioRunRequest::new(ScenarioMetadata::default(), async {
        panic!("escaped the scenario")
    })];
    let _: Result<Vec<()>, _> = harness.run_concurrently(requests);
}
