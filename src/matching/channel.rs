// src/matching/channel.rs

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// Fixed-capacity blocking queue between the combination generator and the
/// evaluation workers.
///
/// `push` blocks while the queue is full, `pop` blocks while it is empty and
/// open. After [`shutdown`](WorkChannel::shutdown) the remaining items are
/// still handed out, then every `pop` returns `None` immediately.
pub struct WorkChannel<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> WorkChannel<T> {
    /// A capacity of zero is treated as one.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    // The queue holds plain data; a panicking holder cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue, waiting for space. Hands the item back if the channel is (or
    /// becomes, while waiting) shut down.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut st = self.lock();
        while st.queue.len() >= self.capacity && !st.closed {
            st = self
                .not_full
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if st.closed {
            return Err(item);
        }
        st.queue.push_back(item);
        drop(st);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue, waiting for an item. `None` means end of stream: shut down and
    /// fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut st = self.lock();
        loop {
            if let Some(item) = st.queue.pop_front() {
                drop(st);
                self.not_full.notify_one();
                return Some(item);
            }
            if st.closed {
                return None;
            }
            st = self
                .not_empty
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stop accepting items and wake every blocked caller. Idempotent.
    pub fn shutdown(&self) {
        let mut st = self.lock();
        if st.closed {
            return;
        }
        st.closed = true;
        drop(st);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Accept items again after a shutdown. Idempotent.
    pub fn reopen(&self) {
        self.lock().closed = false;
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shuts the channel down when dropped, including while unwinding.
    pub fn shutdown_guard(&self) -> ShutdownGuard<'_, T> {
        ShutdownGuard(self)
    }
}

#[must_use = "the channel shuts down as soon as the guard is dropped"]
pub struct ShutdownGuard<'a, T>(&'a WorkChannel<T>);

impl<T> Drop for ShutdownGuard<'_, T> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let ch = WorkChannel::bounded(4);
        for i in 0..4 {
            ch.push(i).unwrap();
        }
        assert_eq!(ch.len(), 4);
        assert_eq!((0..4).map(|_| ch.pop().unwrap()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn shutdown_drains_residual_items_first() {
        let ch = WorkChannel::bounded(8);
        ch.push(1).unwrap();
        ch.push(2).unwrap();
        ch.shutdown();
        assert_eq!(ch.pop(), Some(1));
        assert_eq!(ch.pop(), Some(2));
        assert_eq!(ch.pop(), None);
        assert_eq!(ch.pop(), None);
    }

    #[test]
    fn push_after_shutdown_hands_item_back() {
        let ch = WorkChannel::bounded(2);
        ch.shutdown();
        ch.shutdown();
        assert_eq!(ch.push(5), Err(5));
        ch.reopen();
        ch.reopen();
        assert!(!ch.is_shutdown());
        assert_eq!(ch.push(5), Ok(()));
    }

    #[test]
    fn shutdown_wakes_blocked_consumers() {
        let ch = WorkChannel::<u32>::bounded(2);
        thread::scope(|s| {
            let handles: Vec<_> = (0..3).map(|_| s.spawn(|| ch.pop())).collect();
            thread::sleep(Duration::from_millis(50));
            ch.shutdown();
            for h in handles {
                assert_eq!(h.join().unwrap(), None);
            }
        });
    }

    #[test]
    fn guard_shuts_down_when_producer_panics() {
        let ch = WorkChannel::<u32>::bounded(4);
        thread::scope(|s| {
            let consumer = s.spawn(|| {
                let mut got = Vec::new();
                while let Some(v) = ch.pop() {
                    got.push(v);
                }
                got
            });
            let produced = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let _close = ch.shutdown_guard();
                ch.push(1).unwrap();
                panic!("producer failed");
            }));
            assert!(produced.is_err());
            assert_eq!(consumer.join().unwrap(), vec![1]);
        });
        assert!(ch.is_shutdown());
    }

    #[test]
    fn push_blocks_at_capacity_until_pop() {
        let ch = WorkChannel::bounded(1);
        let pushed = AtomicBool::new(false);
        ch.push(1).unwrap();
        thread::scope(|s| {
            s.spawn(|| {
                ch.push(2).unwrap();
                pushed.store(true, Ordering::SeqCst);
            });
            thread::sleep(Duration::from_millis(100));
            assert!(!pushed.load(Ordering::SeqCst));
            assert_eq!(ch.pop(), Some(1));
        });
        assert!(pushed.load(Ordering::SeqCst));
        assert_eq!(ch.pop(), Some(2));
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let ch = WorkChannel::bounded(0);
        assert_eq!(ch.capacity(), 1);
        ch.push('a').unwrap();
        assert_eq!(ch.pop(), Some('a'));
    }

    #[test]
    fn concurrent_traffic_loses_and_duplicates_nothing() {
        const PRODUCERS: u32 = 3;
        const PER: u32 = 2_000;
        let ch = WorkChannel::bounded(16);
        let (tx, rx) = mpsc::channel();

        thread::scope(|s| {
            for _ in 0..4 {
                let tx = tx.clone();
                let ch = &ch;
                s.spawn(move || {
                    while let Some(v) = ch.pop() {
                        tx.send(v).unwrap();
                    }
                });
            }
            drop(tx);
            let producers: Vec<_> = (0..PRODUCERS)
                .map(|p| {
                    let ch = &ch;
                    s.spawn(move || {
                        for i in 0..PER {
                            ch.push(p * PER + i).unwrap();
                        }
                    })
                })
                .collect();
            for p in producers {
                p.join().unwrap();
            }
            ch.shutdown();
        });

        let got: Vec<u32> = rx.iter().collect();
        assert_eq!(got.len(), (PRODUCERS * PER) as usize);
        let uniq: HashSet<u32> = got.into_iter().collect();
        assert_eq!(uniq.len(), (PRODUCERS * PER) as usize);
    }
}
