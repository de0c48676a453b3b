//! Run one operation against every physical database at once.
//!
//! Each operation is spawned as its own tokio task, so targets are worked on
//! in parallel and always run to completion: a failure or panic at one index
//! never cancels the others. Failures are gathered in the order they complete.

use crate::{Error, Result};
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Successes gathered by [`fan_out_collect`] when at least one index failed.
#[derive(Debug)]
pub struct PartialFailure<T> {
    pub error: Error,
    /// `(index, value)` for every operation that did succeed.
    pub succeeded: Vec<(usize, T)>,
}

/// Run `op(i)` for every `i` in `0..n` and wait for all of them.
///
/// Returns `Ok(())` when every operation succeeded. A single failure is
/// returned as is; several are wrapped in [`Error::Aggregate`], ordered by
/// completion so the last element is the last failure observed. A panicking
/// operation counts as an [`Error::Join`] failure.
pub async fn fan_out<F, Fut>(n: usize, op: F) -> Result<()>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fan_out_collect(n, op).await.map(|_| ()).map_err(|partial| partial.error)
}

/// Like [`fan_out`], but keeps each operation's value.
///
/// On success the values are index-aligned with `0..n`. On failure the caller
/// gets back whatever did succeed so it can release those resources.
pub async fn fan_out_collect<T, F, Fut>(n: usize, op: F) -> std::result::Result<Vec<T>, PartialFailure<T>>
where
    T: Send + 'static,
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for i in 0..n {
        let fut = op(i);
        tasks.spawn(async move { (i, fut.await) });
    }

    let mut slots: Vec<Option<T>> = (0..n).map(|_| None).collect();
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((i, Ok(value))) => slots[i] = Some(value),
            Ok((_, Err(e))) => failures.push(e),
            Err(e) => {
                warn!("Fan-out task did not finish: {}", e);
                failures.push(Error::Join(e));
            }
        }
    }

    debug!("Fan-out over {} databases finished with {} failures", n, failures.len());
    match aggregate(failures) {
        Ok(()) => Ok(slots.into_iter().flatten().collect()),
        Err(error) => Err(PartialFailure {
            error,
            succeeded: slots
                .into_iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.map(|value| (i, value)))
                .collect(),
        }),
    }
}

fn aggregate(mut failures: Vec<Error>) -> Result<()> {
    if failures.len() > 1 {
        return Err(Error::Aggregate(failures));
    }
    match failures.pop() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
