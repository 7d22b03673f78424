//! Ordered fallback steps where the first usable answer wins

use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

type Step<'a, T> = Pin<Box<dyn Future<Output = Result<Option<T>>> + Send + 'a>>;

/// Runs steps in order until one yields a value
///
/// A step answers `Ok(Some(_))` when it found something, `Ok(None)` when it
/// ran cleanly but found nothing, and `Err(_)` when it failed. Failures are
/// logged and absorbed; only cancellation stops the cascade early. Steps are
/// lazy futures, so a step after the winning one never runs.
pub(crate) struct Cascade<'a, T> {
    name: &'static str,
    steps: Vec<(&'static str, Step<'a, T>)>,
}

impl<'a, T> Cascade<'a, T> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    pub(crate) fn step<F>(mut self, label: &'static str, step: F) -> Self
    where
        F: Future<Output = Result<Option<T>>> + Send + 'a,
    {
        self.steps.push((label, Box::pin(step)));
        self
    }

    /// First value produced, with the label of the step that produced it
    pub(crate) async fn run(self) -> Option<(&'static str, T)> {
        let Self { name, steps } = self;
        for (label, step) in steps {
            match step.await {
                Ok(Some(value)) => {
                    debug!(cascade = name, step = label, "step succeeded");
                    return Some((label, value));
                }
                Ok(None) => debug!(cascade = name, step = label, "step found nothing"),
                Err(Error::Cancelled) => {
                    debug!(cascade = name, step = label, "cancelled, skipping remaining steps");
                    return None;
                }
                Err(err) => debug!(cascade = name, step = label, error = %err, "step failed"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn found<T>(value: T) -> Result<Option<T>> {
        Ok(Some(value))
    }

    async fn nothing<T>() -> Result<Option<T>> {
        Ok(None)
    }

    async fn failed<T>(err: Error) -> Result<Option<T>> {
        Err(err)
    }

    #[test]
    fn first_success_wins_and_later_steps_never_run() {
        let later_runs = AtomicUsize::new(0);
        let result = tokio_test::block_on(
            Cascade::new("test")
                .step("empty", nothing())
                .step("hit", found(7))
                .step("later", async {
                    later_runs.fetch_add(1, Ordering::SeqCst);
                    found(9).await
                })
                .run(),
        );

        assert_eq!(result, Some(("hit", 7)));
        assert_eq!(later_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failures_are_absorbed() {
        let result = tokio_test::block_on(
            Cascade::new("test")
                .step("broken", failed(Error::HttpStatus(500)))
                .step("timeout", failed(Error::Timeout("x".into())))
                .step("fallback", found("ok"))
                .run(),
        );
        assert_eq!(result, Some(("fallback", "ok")));
    }

    #[test]
    fn cancellation_stops_the_cascade() {
        let later_runs = AtomicUsize::new(0);
        let result: Option<(&str, u8)> = tokio_test::block_on(
            Cascade::new("test")
                .step("cancelled", failed(Error::Cancelled))
                .step("later", async {
                    later_runs.fetch_add(1, Ordering::SeqCst);
                    found(1).await
                })
                .run(),
        );

        assert!(result.is_none());
        assert_eq!(later_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exhausted_cascade_yields_none() {
        let result: Option<(&str, u8)> = tokio_test::block_on(
            Cascade::new("test")
                .step("a", nothing())
                .step("b", failed(Error::NotWordPress))
                .run(),
        );
        assert!(result.is_none());
    }
}
