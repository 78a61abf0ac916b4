//! Pending-work queue and visited set shared by all crawl workers.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct FrontierState {
    pending: VecDeque<String>,
    visited: HashSet<String>,
    in_flight: usize,
}

/// FIFO frontier with at-most-once enqueue.
///
/// The visited set and the queue live behind one lock, so the
/// check-and-insert in [`Frontier::enqueue_if_new`] is a single critical
/// section. Completion is tracked with an in-flight counter: the frontier
/// is drained only when the queue is empty *and* no accepted item is still
/// being processed.
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    changed: Notify,
}

/// A URL accepted for processing. Dropping it marks the work complete.
#[derive(Debug)]
pub struct WorkItem<'a> {
    url: String,
    frontier: &'a Frontier,
}

impl WorkItem<'_> {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for WorkItem<'_> {
    fn drop(&mut self) {
        self.frontier.complete();
    }
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues `url` unless it has been queued before. Returns whether it was queued.
    pub fn enqueue_if_new(&self, url: &str) -> bool {
        {
            let mut state = self.lock();
            if state.visited.contains(url) {
                return false;
            }
            state.visited.insert(url.to_string());
            state.pending.push_back(url.to_string());
        }
        self.changed.notify_waiters();
        true
    }

    /// Waits for the next URL. Returns `None` once the frontier is drained.
    pub async fn dequeue(&self) -> Option<WorkItem<'_>> {
        loop {
            let notified = {
                let mut state = self.lock();
                if let Some(url) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(WorkItem {
                        url,
                        frontier: self,
                    });
                }
                if state.in_flight == 0 {
                    return None;
                }
                // registered before the lock is released, so no wakeup is lost
                self.changed.notified()
            };
            notified.await;
        }
    }

    fn complete(&self) {
        let drained = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight == 0 && state.pending.is_empty()
        };
        if drained {
            self.changed.notify_waiters();
        }
    }

    /// Queue empty and nothing in flight.
    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        state.pending.is_empty() && state.in_flight == 0
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Number of distinct URLs ever queued.
    pub fn visited_len(&self) -> usize {
        self.lock().visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_enqueue_if_new_only_once() {
        let frontier = Frontier::new();
        assert!(frontier.enqueue_if_new("http://a.com/"));
        assert!(!frontier.enqueue_if_new("http://a.com/"));
        assert!(frontier.enqueue_if_new("http://a.com/b"));
        assert_eq!(frontier.pending_len(), 2);
        assert_eq!(frontier.visited_len(), 2);
    }

    #[tokio::test]
    async fn test_dequeue_is_fifo() {
        let frontier = Frontier::new();
        frontier.enqueue_if_new("1");
        frontier.enqueue_if_new("2");
        frontier.enqueue_if_new("3");

        let mut order = Vec::new();
        while let Some(item) = frontier.dequeue().await {
            order.push(item.url().to_string());
        }
        assert_eq!(order, vec!["1", "2", "3"]);
        assert!(frontier.is_drained());
    }

    #[tokio::test]
    async fn test_empty_frontier_is_drained() {
        let frontier = Frontier::new();
        assert!(frontier.is_drained());
        assert!(frontier.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_visited_url_is_never_requeued_after_processing() {
        let frontier = Frontier::new();
        frontier.enqueue_if_new("http://a.com/");
        let item = frontier.dequeue().await.unwrap();
        assert!(!frontier.enqueue_if_new(item.url()));
        drop(item);
        assert!(frontier.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_in_flight_item_blocks_drain() {
        let frontier = Arc::new(Frontier::new());
        frontier.enqueue_if_new("seed");

        let item = frontier.dequeue().await.unwrap();
        assert_eq!(frontier.in_flight(), 1);
        assert!(!frontier.is_drained());

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move {
                frontier.dequeue().await.map(|item| item.url().to_string())
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "waiter must block while work is in flight");

        // the in-flight item discovers more work before completing
        frontier.enqueue_if_new("child");
        drop(item);

        assert_eq!(waiter.await.unwrap().as_deref(), Some("child"));
    }

    #[tokio::test]
    async fn test_waiters_released_when_drained() {
        let frontier = Arc::new(Frontier::new());
        frontier.enqueue_if_new("only");
        let item = frontier.dequeue().await.unwrap();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let frontier = frontier.clone();
                tokio::spawn(async move { frontier.dequeue().await.is_none() })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(item);

        for waiter in waiters {
            assert!(waiter.await.unwrap());
        }
        assert!(frontier.is_drained());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_workers_process_each_url_once() {
        let frontier = Arc::new(Frontier::new());
        let processed = Arc::new(AtomicUsize::new(0));
        frontier.enqueue_if_new("n0");

        // every node n<i> links to n<2i+1> and n<2i+2> plus back to n0
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let frontier = frontier.clone();
                let processed = processed.clone();
                tokio::spawn(async move {
                    while let Some(item) = frontier.dequeue().await {
                        processed.fetch_add(1, Ordering::SeqCst);
                        let i: usize = item.url()[1..].parse().unwrap();
                        tokio::task::yield_now().await;
                        for child in [2 * i + 1, 2 * i + 2] {
                            if child < 500 {
                                frontier.enqueue_if_new(&format!("n{child}"));
                            }
                        }
                        frontier.enqueue_if_new("n0");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(processed.load(Ordering::SeqCst), 500);
        assert_eq!(frontier.visited_len(), 500);
        assert!(frontier.is_drained());
    }
}
