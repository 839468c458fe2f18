//! Bounded task pool: a concurrency cap plus a cap on how many tasks may be
//! started within a rolling time window.
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Caps for one [`TaskPool`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolSettings {
    pub concurrency: usize,
    pub frequency_limit: usize,
    pub window_ms: u64,
}

impl PoolSettings {
    /// 10 checkin writes per 5 s.
    pub fn checkin_writes() -> Self {
        Self { concurrency: 10, frequency_limit: 10, window_ms: 5000 }
    }

    /// One venue walk started every 2 s; up to 10 walks run at once.
    pub fn venues() -> Self {
        Self { concurrency: 10, frequency_limit: 1, window_ms: 2000 }
    }

    pub fn inventory() -> Self {
        Self { concurrency: 10, frequency_limit: 10, window_ms: 5000 }
    }

    pub fn stores() -> Self {
        Self { concurrency: 10, frequency_limit: 10, window_ms: 1200 }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Sliding window over task start times.
#[derive(Debug)]
pub struct StartWindow {
    limit: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl StartWindow {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            starts: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a start is allowed and record it.
    pub async fn acquire(&self) {
        let mut starts = self.starts.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = starts.front() {
                if now.duration_since(oldest) >= self.window {
                    starts.pop_front();
                } else {
                    break;
                }
            }
            let oldest = starts.front().copied();
            match oldest {
                Some(oldest) if starts.len() >= self.limit => {
                    sleep_until(oldest + self.window).await;
                }
                _ => {
                    starts.push_back(now);
                    return;
                }
            }
        }
    }
}

/// Runs one async task per item under the configured caps. The start window
/// is shared by every [`TaskPool::run`] call on the same pool.
#[derive(Debug, Clone)]
pub struct TaskPool {
    settings: PoolSettings,
    window: Arc<StartWindow>,
}

impl TaskPool {
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            settings,
            window: Arc::new(StartWindow::new(settings.frequency_limit, settings.window())),
        }
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// Map every item through `task`. The first failing task fails the whole
    /// run; tasks still in flight are dropped. Output order follows
    /// completion, not input.
    pub async fn run<I, T, R, F, Fut>(&self, items: I, task: F) -> Result<Vec<R>>
    where
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let window = self.window.as_ref();
        let task = &task;
        debug!(
            concurrency = self.settings.concurrency,
            frequency_limit = self.settings.frequency_limit,
            window_ms = self.settings.window_ms,
            "starting task pool"
        );
        stream::iter(items)
            .map(move |item| async move {
                window.acquire().await;
                task(item).await
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn frequency_cap_spreads_starts_over_windows() {
        let pool = TaskPool::new(PoolSettings { concurrency: 10, frequency_limit: 2, window_ms: 1000 });
        let begin = Instant::now();
        let starts = pool
            .run(0..5, |_| async move { Ok(Instant::now().duration_since(begin)) })
            .await
            .unwrap();

        let mut secs: Vec<u64> = starts.iter().map(|d| d.as_secs()).collect();
        secs.sort_unstable();
        assert_eq!(secs, vec![0, 0, 1, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn window_carries_over_between_runs() {
        let pool = TaskPool::new(PoolSettings { concurrency: 10, frequency_limit: 3, window_ms: 1000 });
        let begin = Instant::now();
        pool.run(0..3, |_| async move { Ok(()) }).await.unwrap();
        let second = pool
            .run(0..1, |_| async move { Ok(Instant::now().duration_since(begin)) })
            .await
            .unwrap();
        assert_eq!(second[0].as_secs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_cap_limits_in_flight_tasks() {
        let pool = TaskPool::new(PoolSettings { concurrency: 3, frequency_limit: 100, window_ms: 10 });
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let done = pool
            .run(0..12, |i| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                }
            })
            .await
            .unwrap();

        assert_eq!(done.len(), 12);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn one_failure_fails_the_pool() {
        let pool = TaskPool::new(PoolSettings { concurrency: 4, frequency_limit: 100, window_ms: 10 });
        let res = pool
            .run(0..8, |i| async move {
                if i == 5 {
                    return Err(anyhow!("write {} rejected", i));
                }
                Ok(i)
            })
            .await;
        assert!(res.unwrap_err().to_string().contains("write 5"));
    }

    #[tokio::test]
    async fn empty_input_resolves_immediately() {
        let pool = TaskPool::new(PoolSettings::checkin_writes());
        let out: Vec<u32> = pool.run(Vec::<u32>::new(), |i| async move { Ok(i) }).await.unwrap();
        assert!(out.is_empty());
    }
}
