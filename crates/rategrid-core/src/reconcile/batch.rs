//! Bounded batch dispatch.

use futures::future::join_all;
use std::collections::VecDeque;
use std::future::Future;

/// Queue that runs its tasks in fixed-size batches.
///
/// Tasks inside one batch run concurrently; the next batch starts only when
/// every task of the previous one has finished. Results come back in push
/// order whatever the completion order.
#[derive(Debug)]
pub struct BatchQueue<T> {
    batch_size: usize,
    pending: VecDeque<T>,
}

impl<T> BatchQueue<T> {
    /// A batch size of 0 is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pending: VecDeque::new(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn push(&mut self, task: T) {
        self.pending.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of batches the queued tasks will be split into.
    pub fn batch_count(&self) -> usize {
        self.pending.len().div_ceil(self.batch_size)
    }

    /// Take the next batch off the front of the queue.
    pub fn drain_batch(&mut self) -> Vec<T> {
        let n = self.batch_size.min(self.pending.len());
        self.pending.drain(..n).collect()
    }

    /// Run every queued task through `worker`, one batch at a time.
    pub async fn run<F, Fut, R>(mut self, mut worker: F) -> Vec<R>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = R>,
    {
        let mut results = Vec::with_capacity(self.pending.len());
        while !self.pending.is_empty() {
            let batch = self.drain_batch();
            let futures: Vec<Fut> = batch.into_iter().map(&mut worker).collect();
            results.extend(join_all(futures).await);
        }
        results
    }
}

impl<T> Extend<T> for BatchQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.pending.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Probe {
        in_flight: usize,
        max_in_flight: usize,
        events: Vec<String>,
    }

    #[test]
    fn zero_batch_size_is_one() {
        let queue: BatchQueue<u8> = BatchQueue::new(0);
        assert_eq!(queue.batch_size(), 1);
    }

    #[test]
    fn batch_count_rounds_up() {
        let mut queue = BatchQueue::new(10);
        queue.extend(0..25);
        assert_eq!(queue.batch_count(), 3);
        assert_eq!(queue.drain_batch().len(), 10);
        assert_eq!(queue.len(), 15);
    }

    #[tokio::test]
    async fn empty_queue_runs_nothing() {
        let queue: BatchQueue<u32> = BatchQueue::new(4);
        let calls = Rc::new(RefCell::new(0));
        let results = queue
            .run(|_| {
                let calls = calls.clone();
                async move {
                    *calls.borrow_mut() += 1;
                }
            })
            .await;
        assert!(results.is_empty());
        assert_eq!(*calls.borrow(), 0);
    }

    #[tokio::test]
    async fn batches_never_overlap() {
        let probe = Rc::new(RefCell::new(Probe::default()));
        let mut queue = BatchQueue::new(10);
        queue.extend(0..25u32);

        let results = queue
            .run(|n| {
                let probe = probe.clone();
                async move {
                    {
                        let mut p = probe.borrow_mut();
                        p.in_flight += 1;
                        p.max_in_flight = p.max_in_flight.max(p.in_flight);
                        p.events.push(format!("start {n}"));
                    }
                    // later tasks finish first
                    for _ in 0..(30 - n) {
                        tokio::task::yield_now().await;
                    }
                    let mut p = probe.borrow_mut();
                    p.in_flight -= 1;
                    p.events.push(format!("end {n}"));
                    n * 2
                }
            })
            .await;

        assert_eq!(results, (0..25u32).map(|n| n * 2).collect::<Vec<_>>());

        let p = probe.borrow();
        assert_eq!(p.max_in_flight, 10);
        assert_eq!(p.in_flight, 0);

        // every task of batch one ends before any task of batch two starts
        let position = |label: &str| p.events.iter().position(|e| e == label).unwrap();
        let last_end_first_batch = (0..10).map(|n| position(&format!("end {n}"))).max().unwrap();
        let first_start_second_batch = position("start 10");
        assert!(last_end_first_batch < first_start_second_batch);
    }
}
