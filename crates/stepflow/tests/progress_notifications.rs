//! Behavioural tests for progress notifications, step naming, and comments.

mod common;

use std::sync::Arc;

use common::{Journal, RecordingNotifier, failing, passing, result_of};
use stepflow::{
    CompositeStep, Engine, EngineConfiguration, ExecutionContext, ParallelProgressNotifier,
    ProgressManager, StepDescriptor, StepParameter, StepTypeConfiguration, scope,
};

#[tokio::test]
async fn notifications_follow_execution_order() {
    let notifier = RecordingNotifier::default();
    let config = EngineConfiguration::default().with_notifier(Arc::new(notifier.clone()));
    let group = CompositeStep::new(vec![StepDescriptor::sync("Then it is listed", |ctx| {
        ctx.comment("listing refreshed");
        Ok(())
    })]);

    let outcome = Engine::new(config)
        .feature("Progress")
        .scenario("ordering")
        .add_steps([
            StepDescriptor::new("Given a catalogue", |_ctx| async {
                scope::comment("  seeded 3 products  ");
                scope::comment("   ");
                Ok(())
            }),
            StepDescriptor::composite("When a product is added", group),
        ])
        .run()
        .await;

    let result = result_of(&outcome);
    assert_eq!(
        notifier.journal.entries(),
        [
            "scenario start: ordering",
            "step start: 1 GIVEN a catalogue",
            "comment: 1 seeded 3 products",
            "step finished: 1 Passed",
            "step start: 2 WHEN a product is added",
            "step start: 2.1 THEN it is listed",
            "comment: 2.1 listing refreshed",
            "step finished: 2.1 Passed",
            "step finished: 2 Passed",
            "scenario finished: Passed",
        ]
    );
    let Some(first) = result.steps().first() else {
        panic!("step result missing");
    };
    assert_eq!(first.comments(), ["seeded 3 products"]);
}

#[tokio::test]
async fn repeated_step_types_are_collapsed() {
    let outcome = Engine::new(EngineConfiguration::default())
        .feature("Progress")
        .scenario("step types")
        .add_steps([
            passing("Given a"),
            passing("given b"),
            passing("When c"),
            passing("When d"),
            passing("d").with_step_type("when"),
            passing("no keyword"),
        ])
        .run()
        .await;

    let names: Vec<_> = result_of(&outcome)
        .steps()
        .iter()
        .map(|s| s.info().name().to_string())
        .collect();
    assert_eq!(
        names,
        ["GIVEN a", "AND b", "WHEN c", "AND d", "AND d", "no keyword"]
    );
}

#[tokio::test]
async fn custom_step_types_disable_collapsing() {
    let types = StepTypeConfiguration::new(["ARRANGE", "ACT"], None);
    let outcome = Engine::new(EngineConfiguration::default().with_step_types(types))
        .feature("Progress")
        .scenario("custom types")
        .add_steps([passing("Arrange a"), passing("Arrange b"), passing("Given c")])
        .run()
        .await;

    let names: Vec<_> = result_of(&outcome)
        .steps()
        .iter()
        .map(|s| s.info().name().to_string())
        .collect();
    assert_eq!(names, ["ARRANGE a", "ARRANGE b", "Given c"]);
}

struct Basket {
    items: u32,
}

#[tokio::test]
async fn parameters_are_evaluated_when_their_step_starts() {
    let notifier = RecordingNotifier::default();
    let config = EngineConfiguration::default().with_notifier(Arc::new(notifier.clone()));
    let count = |ctx: Option<&ExecutionContext>| {
        ctx.and_then(|c| c.downcast_ref::<Basket>())
            .map_or(0, |basket| basket.items)
    };

    let outcome = Engine::new(config)
        .feature("Progress")
        .scenario("lazy parameters")
        .with_context(ExecutionContext::new(Basket { items: 2 }))
        .add_steps([
            StepDescriptor::sync("Given a basket with {0} items", |ctx| {
                eyre::ensure!(ctx.argument::<u32>(0).as_deref() == Some(&2), "wrong count");
                Ok(())
            })
            .with_parameter(StepParameter::dynamic("count", count)),
            failing("When checking out", "payment refused"),
            passing("Then {0} items are shipped").with_parameter(StepParameter::dynamic("count", count)),
        ])
        .run()
        .await;

    let result = result_of(&outcome);
    assert!(
        notifier
            .journal
            .entries()
            .contains(&"step start: 1 GIVEN a basket with 2 items".to_owned())
    );
    let names: Vec<_> = result
        .steps()
        .iter()
        .map(|s| s.info().name().to_string())
        .collect();
    assert_eq!(
        names,
        [
            "GIVEN a basket with 2 items",
            "WHEN checking out",
            "THEN <?> items are shipped",
        ]
    );
    let Some(parameter) = result
        .steps()
        .last()
        .and_then(|s| s.info().name().parameters().first())
    else {
        panic!("parameter missing");
    };
    assert!(!parameter.is_evaluated());
}

#[tokio::test]
async fn parallel_notifier_prefixes_lines_with_progress() {
    let lines = Journal::default();
    let sink = lines.clone();
    let manager = Arc::new(ProgressManager::new());
    let notifier = ParallelProgressNotifier::with_writer(
        Arc::clone(&manager),
        Arc::new(move |line: &str| sink.push(line)),
    );
    let engine = Engine::new(EngineConfiguration::default().with_notifier(Arc::new(notifier)))
        .with_progress_manager(manager);

    let outcome = engine
        .feature("Progress")
        .scenario("checkout")
        .with_labels(["T-7"])
        .add_steps([passing("Given a basket"), failing("When paying", "card declined")])
        .run()
        .await;

    assert!(outcome.is_err());
    let entries = lines.entries();
    let Some(first) = entries.first() else {
        panic!("no progress written");
    };
    assert_eq!(first, "Fi=000,Fa=000,Pe=001 #  1> SCENARIO: [T-7] checkout");
    assert!(
        entries
            .iter()
            .any(|l| l == "Fi=000,Fa=000,Pe=001 #  1> STEP 2/2: WHEN paying...")
    );
    let tail: Vec<_> = entries.iter().rev().take(2).rev().cloned().collect();
    let Some(result_line) = tail.first() else {
        panic!("scenario result missing");
    };
    assert!(
        result_line.starts_with("Fi=001,Fa=001,Pe=000 #  1>   SCENARIO RESULT: Failed after "),
        "{result_line}"
    );
    assert_eq!(
        tail.get(1).map(String::as_str),
        Some("Fi=001,Fa=001,Pe=000 #  1>     Step 2: card declined")
    );
}
