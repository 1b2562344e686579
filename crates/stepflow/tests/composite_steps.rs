//! Behavioural tests for composite steps.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use common::{Journal, failing, passing, result_of, statuses};
use rstest::rstest;
use stepflow::ExecutionStatus::{Failed, NotRun, Passed};
use stepflow::{
    CompositeStep, Engine, EngineConfiguration, ExecutionContext, ScenarioError, StepDescriptor,
    StepParameter, StepResult, scope,
};

fn engine() -> Engine {
    Engine::new(EngineConfiguration::default())
}

fn sub_steps(result: &StepResult) -> Vec<String> {
    result
        .sub_steps()
        .iter()
        .map(|s| format!("{} {}", s.info().qualified_number(), s.info().name()))
        .collect()
}

#[tokio::test]
async fn sub_steps_are_numbered_within_their_group() {
    let group = CompositeStep::new(vec![
        passing("Given a customer"),
        failing("When the order is placed", "card declined"),
        passing("Then a receipt is sent"),
    ]);
    let outcome = engine()
        .feature("Composites")
        .scenario("numbering")
        .add_steps([
            passing("Given a basket"),
            StepDescriptor::composite("When checking out", group),
            passing("Then the basket is empty"),
        ])
        .run()
        .await;

    let result = result_of(&outcome);
    let Err(ScenarioError::StepFailed { step, .. }) = outcome else {
        panic!("the sub-step failure should surface");
    };
    assert_eq!(step, "2.2 WHEN the order is placed");
    assert_eq!(statuses(result.steps()), [Passed, Failed, NotRun]);
    let Some(composite) = result.steps().get(1) else {
        panic!("composite result missing");
    };
    assert_eq!(
        sub_steps(composite),
        [
            "2.1 GIVEN a customer",
            "2.2 WHEN the order is placed",
            "2.3 THEN a receipt is sent"
        ]
    );
    assert_eq!(statuses(composite.sub_steps()), [Passed, Failed, NotRun]);
    assert_eq!(composite.status_details(), None);
    assert_eq!(result.status_details(), Some("Step 2.2: card declined"));
}

#[tokio::test]
async fn composite_policy_is_not_inherited() {
    let group = CompositeStep::new(vec![
        failing("Then the name is shown", "name missing"),
        passing("Then the price is shown"),
    ]);
    let outcome = engine()
        .feature("Composites")
        .scenario("independent policy")
        .continue_on_failure()
        .add_steps([
            StepDescriptor::composite("Then the product page", group),
            passing("Then the footer is shown"),
        ])
        .run()
        .await;

    let result = result_of(&outcome);
    assert!(matches!(outcome, Err(ScenarioError::StepFailed { .. })));
    assert_eq!(statuses(result.steps()), [Failed, Passed]);
    let Some(composite) = result.steps().first() else {
        panic!("composite result missing");
    };
    assert_eq!(statuses(composite.sub_steps()), [Failed, NotRun]);
}

#[tokio::test]
async fn continuing_composite_reports_every_failure() {
    let group = CompositeStep::new(vec![
        failing("Then the name is shown", "name missing"),
        failing("Then the price is shown", "price missing"),
        passing("Then the stock is shown"),
    ])
    .continue_on_failure();
    let outcome = engine()
        .feature("Composites")
        .scenario("soft assertions")
        .add_steps([
            StepDescriptor::composite("Then the product page", group),
            passing("Then the footer is shown"),
        ])
        .run()
        .await;

    let result = result_of(&outcome);
    let Err(ScenarioError::MultipleFailures { failures, .. }) = outcome else {
        panic!("expected both sub-step failures");
    };
    assert_eq!(failures.len(), 2);
    assert_eq!(statuses(result.steps()), [Failed, NotRun]);
    let Some(composite) = result.steps().first() else {
        panic!("composite result missing");
    };
    assert_eq!(statuses(composite.sub_steps()), [Failed, Failed, Passed]);
    assert_eq!(
        result.status_details(),
        Some("Step 1.1: name missing\nStep 1.2: price missing")
    );
}

#[tokio::test]
async fn nested_composites_extend_the_prefix() {
    let inner = CompositeStep::new(vec![passing("Given a token")]);
    let outer = CompositeStep::new(vec![
        passing("Given a session"),
        StepDescriptor::composite("When signing in", inner),
    ]);
    let outcome = engine()
        .feature("Composites")
        .scenario("nesting")
        .add_step(StepDescriptor::composite("Given a user", outer))
        .run()
        .await;

    let Ok(result) = outcome else {
        panic!("nested composites should pass");
    };
    let Some(innermost) = result
        .steps()
        .first()
        .and_then(|s| s.sub_steps().get(1))
        .and_then(|s| s.sub_steps().first())
    else {
        panic!("innermost step missing");
    };
    assert_eq!(innermost.info().qualified_number(), "1.2.1");
    assert_eq!(innermost.status(), Passed);
}

struct Counter(AtomicU32);

#[tokio::test]
async fn composite_context_replaces_the_scenario_context() {
    let group = CompositeStep::new(vec![StepDescriptor::sync("Then the counter is fresh", |ctx| {
        let counter = ctx
            .context::<Counter>()
            .ok_or_else(|| eyre::eyre!("composite context missing"))?;
        eyre::ensure!(counter.0.load(Ordering::SeqCst) == 0, "counter was shared");
        Ok(())
    })])
    .with_context(|| Ok(ExecutionContext::new(Counter(AtomicU32::new(0)))));

    let scenario_counter = Arc::new(Counter(AtomicU32::new(0)));
    let outcome = engine()
        .feature("Composites")
        .scenario("context")
        .with_context(ExecutionContext::from_arc(scenario_counter.clone()))
        .add_steps([
            StepDescriptor::sync("Given the counter is bumped", |ctx| {
                let counter = ctx
                    .context::<Counter>()
                    .ok_or_else(|| eyre::eyre!("scenario context missing"))?;
                counter.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            StepDescriptor::composite("Then the group runs", group),
        ])
        .run()
        .await;

    assert!(outcome.is_ok(), "unexpected outcome: {outcome:?}");
    assert_eq!(scenario_counter.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_context_factory_skips_the_sub_steps() {
    let group = CompositeStep::new(vec![passing("Then the counter is fresh")])
        .with_context(|| Err(eyre::eyre!("cannot build context")));
    let outcome = engine()
        .feature("Composites")
        .scenario("broken context")
        .add_step(StepDescriptor::composite("Then the group runs", group))
        .run()
        .await;

    let result = result_of(&outcome);
    let Err(ScenarioError::StepFailed { step, .. }) = outcome else {
        panic!("the composite itself should fail");
    };
    assert_eq!(step, "1 THEN the group runs");
    let Some(composite) = result.steps().first() else {
        panic!("composite result missing");
    };
    assert_eq!(composite.status(), Failed);
    assert_eq!(statuses(composite.sub_steps()), [NotRun]);
    assert_eq!(result.status_details(), Some("Step 1: cannot build context"));
}

fn scope_label() -> Option<String> {
    scope::execution_context()
        .and_then(|ctx| ctx.downcast::<String>())
        .map(|label| label.as_str().to_owned())
}

fn record_labels(name: &str, journal: &Journal) -> StepDescriptor {
    let journal = journal.clone();
    StepDescriptor::new(name, move |ctx| {
        let step_label = ctx.context::<String>().cloned();
        async move {
            let spawned = scope::spawn(async { scope_label() }).await?;
            journal.push(format!("{step_label:?} {:?} {spawned:?}", scope_label()));
            Ok(())
        }
    })
}

#[tokio::test]
async fn composite_context_is_the_scope_context_of_its_sub_steps() {
    let journal = Journal::default();
    let group = CompositeStep::new(vec![record_labels("Then the child sees its own", &journal)])
        .with_context(|| Ok(ExecutionContext::new("child".to_owned())));
    let outcome = engine()
        .feature("Composites")
        .scenario("scoped context")
        .with_context(ExecutionContext::new("parent".to_owned()))
        .add_steps([
            StepDescriptor::composite("When the group runs", group),
            record_labels("Then the parent is restored", &journal),
        ])
        .run()
        .await;

    assert!(outcome.is_ok(), "unexpected outcome: {outcome:?}");
    assert_eq!(
        journal.entries(),
        [
            r#"Some("child") Some("child") Some("child")"#,
            r#"Some("parent") Some("parent") Some("parent")"#,
        ]
    );
}

#[tokio::test]
async fn context_set_by_a_step_reaches_the_next_step() {
    let outcome = engine()
        .feature("Composites")
        .scenario("replaced context")
        .with_context(ExecutionContext::new(1_u32))
        .add_steps([
            StepDescriptor::sync("Given the context is replaced", |_| {
                eyre::ensure!(
                    scope::set_execution_context(ExecutionContext::new(2_u32)),
                    "no scenario slot"
                );
                Ok(())
            }),
            StepDescriptor::sync("Then the replacement is seen", |ctx| {
                let from_scope = scope::execution_context().and_then(|c| c.downcast::<u32>());
                eyre::ensure!(ctx.context::<u32>() == Some(&2), "step context is stale");
                eyre::ensure!(from_scope.as_deref() == Some(&2), "scope is stale");
                eyre::ensure!(
                    ctx.argument::<u32>(0).as_deref() == Some(&2),
                    "parameter saw a stale context"
                );
                Ok(())
            })
            .with_parameter(StepParameter::dynamic("seen", |ctx| {
                ctx.and_then(|c| c.downcast_ref::<u32>())
                    .copied()
                    .unwrap_or_default()
            })),
        ])
        .run()
        .await;

    assert!(outcome.is_ok(), "unexpected outcome: {outcome:?}");
}

#[rstest]
#[case::shared_context_keeps_the_change(false, Some(2))]
#[case::own_context_discards_the_change(true, Some(1))]
#[tokio::test]
async fn context_set_inside_a_composite(
    #[case] own_context: bool,
    #[case] expected: Option<u32>,
) {
    let mut group = CompositeStep::new(vec![StepDescriptor::sync(
        "Given the context is replaced",
        |_| {
            scope::set_execution_context(ExecutionContext::new(2_u32));
            Ok(())
        },
    )]);
    if own_context {
        group = group.with_context(|| Ok(ExecutionContext::new(0_u32)));
    }
    let journal = Journal::default();
    let seen = journal.clone();
    let outcome = engine()
        .feature("Composites")
        .scenario("context after a composite")
        .with_context(ExecutionContext::new(1_u32))
        .add_steps([
            StepDescriptor::composite("When the group runs", group),
            StepDescriptor::sync("Then the context is checked", move |ctx| {
                seen.push(format!("{:?}", ctx.context::<u32>().copied()));
                Ok(())
            }),
        ])
        .run()
        .await;

    assert!(outcome.is_ok(), "unexpected outcome: {outcome:?}");
    assert_eq!(journal.entries(), [format!("{expected:?}")]);
}
