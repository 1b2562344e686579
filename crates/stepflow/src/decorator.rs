//! Decorators wrapped around scenario and step invocation.
//!
//! A [`DecoratorChain`] holds an ordered list of decorators. For extensions
//! `E0..En-1` and a terminal action `T` each invocation runs
//! `E0(E1(...En-1(T)))`: every decorator receives the metadata of what is
//! being executed and a [`Continuation`] running the rest of the chain. It may
//! run code before or after the continuation, wrap its error, or skip it.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::result::{ScenarioInfo, StepInfo};

/// The remainder of a decorator chain, ending in the decorated action.
pub type Continuation<'a> = Box<dyn FnOnce() -> BoxFuture<'a, eyre::Result<()>> + Send + 'a>;

/// Wraps the execution of something described by `M`.
///
/// # Examples
///
/// ```
/// use futures::future::BoxFuture;
/// use stepflow::{Continuation, Decorator, StepInfo};
///
/// struct Retry;
///
/// impl Decorator<StepInfo> for Retry {
///     fn execute<'a>(
///         &'a self,
///         _step: &'a StepInfo,
///         next: Continuation<'a>,
///     ) -> BoxFuture<'a, eyre::Result<()>> {
///         Box::pin(async move {
///             log::debug!("entering step");
///             next().await
///         })
///     }
/// }
/// ```
pub trait Decorator<M: ?Sized>: Send + Sync {
    /// Run around `next`.
    fn execute<'a>(&'a self, meta: &'a M, next: Continuation<'a>)
    -> BoxFuture<'a, eyre::Result<()>>;
}

/// Decorator applied to every step, including composite sub-steps.
pub type StepDecorator = dyn Decorator<StepInfo>;

/// Decorator applied once around each scenario's steps.
pub type ScenarioDecorator = dyn Decorator<ScenarioInfo>;

/// Immutable ordered list of decorators.
pub struct DecoratorChain<M: ?Sized + 'static> {
    decorators: Arc<[Arc<dyn Decorator<M>>]>,
}

impl<M: ?Sized + Sync + 'static> DecoratorChain<M> {
    /// Capture `decorators`; the first one is outermost.
    #[must_use]
    pub fn new(decorators: Vec<Arc<dyn Decorator<M>>>) -> Self {
        Self {
            decorators: decorators.into(),
        }
    }

    /// Number of decorators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    /// Whether the chain has no decorators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }

    /// Run `terminal` wrapped by every decorator.
    ///
    /// The nested continuations are rebuilt for each call.
    pub fn execute<'a>(
        &'a self,
        meta: &'a M,
        terminal: Continuation<'a>,
    ) -> BoxFuture<'a, eyre::Result<()>> {
        wrap(&self.decorators, meta, terminal)()
    }
}

fn wrap<'a, M: ?Sized + Sync>(
    decorators: &'a [Arc<dyn Decorator<M>>],
    meta: &'a M,
    terminal: Continuation<'a>,
) -> Continuation<'a> {
    let Some((outer, rest)) = decorators.split_first() else {
        return terminal;
    };
    let next = wrap(rest, meta, terminal);
    Box::new(move || outer.execute(meta, next))
}

impl<M: ?Sized + 'static> Clone for DecoratorChain<M> {
    fn clone(&self) -> Self {
        Self {
            decorators: Arc::clone(&self.decorators),
        }
    }
}

impl<M: ?Sized + Sync + 'static> Default for DecoratorChain<M> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<M: ?Sized + 'static> fmt::Debug for DecoratorChain<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorChain")
            .field("len", &self.decorators.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn push(journal: &Journal, entry: String) {
        journal
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(entry);
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    struct Recording {
        name: &'static str,
        journal: Journal,
    }

    impl Decorator<str> for Recording {
        fn execute<'a>(
            &'a self,
            meta: &'a str,
            next: Continuation<'a>,
        ) -> BoxFuture<'a, eyre::Result<()>> {
            Box::pin(async move {
                push(&self.journal, format!("{} before {meta}", self.name));
                let outcome = next().await;
                push(&self.journal, format!("{} after", self.name));
                outcome
            })
        }
    }

    struct ShortCircuit;

    impl Decorator<str> for ShortCircuit {
        fn execute<'a>(
            &'a self,
            _meta: &'a str,
            _next: Continuation<'a>,
        ) -> BoxFuture<'a, eyre::Result<()>> {
            Box::pin(async { Err(eyre::eyre!("skipped by decorator")) })
        }
    }

    fn terminal<'a>(journal: &'a Journal) -> Continuation<'a> {
        Box::new(move || -> BoxFuture<'a, eyre::Result<()>> {
            Box::pin(async move {
                push(journal, "action".to_owned());
                Ok(())
            })
        })
    }

    fn recording(name: &'static str, journal: &Journal) -> Arc<dyn Decorator<str>> {
        Arc::new(Recording {
            name,
            journal: Arc::clone(journal),
        })
    }

    #[test]
    fn first_decorator_is_outermost() {
        let journal = Journal::default();
        let chain = DecoratorChain::new(vec![recording("e0", &journal), recording("e1", &journal)]);

        let outcome = futures::executor::block_on(chain.execute("step", terminal(&journal)));

        assert!(outcome.is_ok());
        assert_eq!(
            entries(&journal),
            ["e0 before step", "e1 before step", "action", "e1 after", "e0 after"]
        );
    }

    #[test]
    fn empty_chain_runs_the_action() {
        let journal = Journal::default();
        let chain = DecoratorChain::<str>::default();
        assert!(chain.is_empty());

        let outcome = futures::executor::block_on(chain.execute("step", terminal(&journal)));

        assert!(outcome.is_ok());
        assert_eq!(entries(&journal), ["action"]);
    }

    #[test]
    fn decorator_may_skip_the_continuation() {
        let journal = Journal::default();
        let chain = DecoratorChain::new(vec![
            recording("e0", &journal),
            Arc::new(ShortCircuit) as Arc<dyn Decorator<str>>,
            recording("e2", &journal),
        ]);

        let outcome = futures::executor::block_on(chain.execute("step", terminal(&journal)));

        assert!(outcome.is_err());
        assert_eq!(entries(&journal), ["e0 before step", "e0 after"]);
    }

    #[test]
    fn chain_is_rebuilt_for_each_invocation() {
        let journal = Journal::default();
        let chain = DecoratorChain::new(vec![recording("e0", &journal)]);

        for _ in 0..2 {
            let outcome = futures::executor::block_on(chain.execute("step", terminal(&journal)));
            assert!(outcome.is_ok());
        }

        assert_eq!(entries(&journal).len(), 6);
        assert_eq!(chain.len(), 1);
    }
}
