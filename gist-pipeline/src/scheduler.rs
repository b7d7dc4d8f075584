use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    /// Floor between the start of two consecutive operations.
    pub min_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            min_delay: Duration::from_millis(1000),
        }
    }
}

/// FIFO request scheduler bounding concurrency and spacing dispatches.
///
/// Callers queue on a fair mutex that guards the last dispatch instant, so
/// operations start in the order they were submitted. The in-flight slot is
/// held by the awaited `execute` future and released on completion, error or
/// drop.
///
/// Cloning is cheap and shares the queue.
#[derive(Clone, Debug)]
pub struct RequestScheduler {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: SchedulerConfig,
    last_dispatch: Mutex<Option<Instant>>,
    slots: Semaphore,
    in_flight: AtomicUsize,
    queued: AtomicUsize,
}

/// Decrements a counter when dropped, including on cancellation.
struct Tally<'a>(&'a AtomicUsize);

impl<'a> Tally<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Tally<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl RequestScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            inner: Arc::new(Inner {
                config: SchedulerConfig {
                    max_concurrent,
                    ..config
                },
                last_dispatch: Mutex::new(None),
                slots: Semaphore::new(max_concurrent),
                in_flight: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    /// Queue `op` and run it once a slot is free and the spacing floor has passed.
    pub async fn execute<T, F, Fut>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let inner = &*self.inner;
        let waiting = Tally::enter(&inner.queued);

        let permit = {
            let mut last = inner.last_dispatch.lock().await;
            // `slots` is never closed, so this only fails if the scheduler is gone.
            let permit = inner.slots.acquire().await.ok();
            if let Some(prev) = *last {
                let elapsed = prev.elapsed();
                if elapsed < inner.config.min_delay {
                    sleep(inner.config.min_delay - elapsed).await;
                }
            }
            *last = Some(Instant::now());
            permit
        };

        drop(waiting);
        let running = Tally::enter(&inner.in_flight);
        tracing::debug!(
            in_flight = inner.in_flight.load(Ordering::SeqCst),
            queued = inner.queued.load(Ordering::SeqCst),
            "scheduler.dispatch"
        );

        let out = op().await;
        drop(running);
        drop(permit);
        out
    }

    /// Operations currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Operations waiting for dispatch.
    pub fn queued(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn scheduler(max_concurrent: usize, min_delay_ms: u64) -> RequestScheduler {
        RequestScheduler::new(SchedulerConfig {
            max_concurrent,
            min_delay: Duration::from_millis(min_delay_ms),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_max_concurrent() {
        let sched = scheduler(2, 10);
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..6 {
            let sched = sched.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                sched
                    .execute(|| async {
                        peak.fetch_max(sched.in_flight(), Ordering::SeqCst);
                        sleep(Duration::from_millis(500)).await;
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(sched.in_flight(), 0);
        assert_eq!(sched.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatches_are_spaced_and_fifo() {
        let sched = scheduler(4, 1000);
        let starts = Arc::new(StdMutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..4 {
            let sched = sched.clone();
            let starts = starts.clone();
            handles.push(tokio::spawn(async move {
                sched
                    .execute(|| async move {
                        starts.lock().unwrap().push((i, Instant::now()));
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let starts = starts.lock().unwrap();
        let order: Vec<_> = starts.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        for pair in starts.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slot_released_after_error_and_cancel() {
        let sched = scheduler(1, 0);
        let failed: Result<(), &str> = sched.execute(|| async { Err("boom") }).await;
        assert!(failed.is_err());
        assert_eq!(sched.in_flight(), 0);

        let stuck = sched.execute(|| sleep(Duration::from_secs(3600)));
        let timed_out = tokio::time::timeout(Duration::from_millis(50), stuck).await;
        assert!(timed_out.is_err());
        assert_eq!(sched.in_flight(), 0);

        let value = sched.execute(|| async { 7 }).await;
        assert_eq!(value, 7);
    }
}
