//! Bounded job scheduler
//!
//! Keeps up to `limit` jobs in flight and starts the next one as soon as any running job
//! settles. A failed job never stops its siblings; every job's result is returned in
//! submission order.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

/// Settled result of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Settled<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled(_))
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settled::Fulfilled(value) => Ok(value),
            Settled::Rejected(err) => Err(err),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settled::Fulfilled(value),
            Err(err) => Settled::Rejected(err),
        }
    }
}

/// Run `jobs` with at most `limit` in flight. A limit of 0 is treated as 1.
///
/// Jobs are started lazily: a job's future is not polled until a slot frees up.
pub async fn run_bounded<I, F, T, E>(jobs: I, limit: usize) -> Vec<Settled<T, E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let limit = limit.max(1);
    let mut pending = jobs.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();
    let mut results: Vec<Option<Settled<T, E>>> = Vec::new();

    loop {
        while in_flight.len() < limit {
            let Some((index, job)) = pending.next() else {
                break;
            };
            results.push(None);
            in_flight.push(async move { (index, job.await) });
        }

        match in_flight.next().await {
            Some((index, result)) => results[index] = Some(result.into()),
            None => break,
        }
    }

    results.into_iter().flatten().collect()
}
