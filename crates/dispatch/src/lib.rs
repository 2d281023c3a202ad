//! Bounded per-request worker pool layered on top of a process-wide
//! transcription semaphore, so a burst of concurrent requests can't
//! multiply their per-request concurrency into unbounded engine calls.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Owns the single global transcription semaphore for the process. One
/// instance is constructed at startup and shared via `Arc`.
pub struct Dispatcher {
    global: Arc<Semaphore>,
}

/// One dispatched task's outcome. `Panicked` keeps the original task alive
/// so the caller can still build a per-task error result out of it, instead
/// of silently losing the slot.
#[derive(Debug)]
pub enum Outcome<T, Out, E> {
    Done(Result<Out, E>),
    Panicked(T),
}

impl Dispatcher {
    pub fn new(global_transcribe_limit: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_transcribe_limit.max(1))),
        }
    }

    /// Submits every task from `tasks` to a pool bounded by `concurrency`,
    /// additionally gating each task's work behind the global semaphore.
    /// Results come back in `tasks`' original order regardless of
    /// completion order, one `Outcome` per input task; a task's error is
    /// captured into its slot rather than propagated to the caller, and a
    /// panicked task's slot holds the original task rather than being
    /// dropped.
    pub async fn dispatch<T, Out, E, F, Fut>(&self, tasks: Vec<T>, concurrency: usize, work: F) -> Vec<Outcome<T, Out, E>>
    where
        T: Clone + Send + 'static,
        Out: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Out, E>> + Send,
    {
        let n = tasks.len();
        let originals = tasks.clone();
        let local = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut set: JoinSet<(usize, Result<Out, E>)> = JoinSet::new();
        let mut index_by_id = HashMap::with_capacity(n);

        for (index, task) in tasks.into_iter().enumerate() {
            let local = local.clone();
            let global = self.global.clone();
            let work = work.clone();
            let handle = set.spawn(async move {
                let _local_permit = local.acquire_owned().await.expect("local semaphore never closes");
                let _global_permit = global.acquire_owned().await.expect("global semaphore never closes");
                (index, work(task).await)
            });
            index_by_id.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<Outcome<T, Out, E>>> = (0..n).map(|_| None).collect();
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_id, (index, result))) => slots[index] = Some(Outcome::Done(result)),
                Err(err) => {
                    log::error!("dispatched task panicked: {err}");
                    if let Some(&index) = index_by_id.get(&err.id()) {
                        slots[index] = Some(Outcome::Panicked(originals[index].clone()));
                    }
                }
            }
        }

        slots.into_iter().map(|slot| slot.expect("every task produces a slot")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn unwrap_done<T, Out, E>(outcome: Outcome<T, Out, E>) -> Result<Out, E> {
        match outcome {
            Outcome::Done(r) => r,
            Outcome::Panicked(_) => panic!("task panicked unexpectedly"),
        }
    }

    #[tokio::test]
    async fn preserves_task_order_in_results() {
        let dispatcher = Dispatcher::new(4);
        let tasks: Vec<u32> = (0..10).collect();
        let results = dispatcher
            .dispatch(tasks, 3, |n| async move {
                tokio::time::sleep(Duration::from_millis(10 - n as u64 % 10)).await;
                Ok::<u32, ()>(n * 2)
            })
            .await;
        let results: Vec<_> = results.into_iter().map(unwrap_done).collect();
        let expected: Vec<_> = (0..10).map(|n| Ok(n * 2)).collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn errors_are_captured_per_task() {
        let dispatcher = Dispatcher::new(4);
        let tasks = vec![1, 2, 3];
        let results = dispatcher
            .dispatch(tasks, 2, |n| async move {
                if n == 2 {
                    Err::<u32, &'static str>("boom")
                } else {
                    Ok(n)
                }
            })
            .await;
        let results: Vec<_> = results.into_iter().map(unwrap_done).collect();
        assert_eq!(results, vec![Ok(1), Err("boom"), Ok(3)]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let dispatcher = Dispatcher::new(100);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<u32> = (0..20).collect();

        let in_flight_c = in_flight.clone();
        let max_seen_c = max_seen.clone();
        dispatcher
            .dispatch(tasks, 3, move |_n| {
                let in_flight = in_flight_c.clone();
                let max_seen = max_seen_c.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), ()>(())
                }
            })
            .await;

        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn panicked_task_keeps_its_slot() {
        let dispatcher = Dispatcher::new(4);
        let tasks = vec![1, 2, 3];
        let results = dispatcher
            .dispatch(tasks, 2, |n| async move {
                if n == 2 {
                    panic!("boom");
                }
                Ok::<u32, ()>(n)
            })
            .await;
        assert_eq!(results.len(), 3);
        match &results[1] {
            Outcome::Panicked(task) => assert_eq!(*task, 2),
            Outcome::Done(_) => panic!("expected the panicked slot to keep the original task"),
        }
    }
}
