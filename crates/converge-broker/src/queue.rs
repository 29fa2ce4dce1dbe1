use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Why a push did not take place. The rejected item travels back to the
/// caller so nothing is silently dropped at the queue boundary.
#[derive(Debug)]
pub enum PushError<T> {
    Full(T),
    Closed(T),
}

/// A bounded FIFO for crossing thread boundaries, built on a mutex and two
/// condvars. Capacity is finite by contract: a push on a full queue blocks
/// up to the caller's timeout, a pop on an empty queue blocks up to the
/// caller's deadline. Closing wakes all waiters and makes every subsequent
/// operation fail fast.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");

        BoundedQueue {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                capacity,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Blocks up to `timeout` for a free slot.
    pub fn push(&self, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();

        loop {
            if inner.closed {
                return Err(PushError::Closed(item));
            }
            if inner.items.len() < inner.capacity {
                inner.items.push_back(item);
                drop(inner);
                self.not_empty.notify_one();
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PushError::Full(item));
            }

            let (guard, _) = self
                .not_full
                .wait_timeout(inner, deadline - now)
                .unwrap();
            inner = guard;
        }
    }

    /// Blocks until an item arrives, the deadline passes, or the queue is
    /// closed and empty.
    pub fn pop_deadline(&self, deadline: Instant) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();

        loop {
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Some(item);
            }
            if inner.closed {
                return None;
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let (guard, _) = self
                .not_empty
                .wait_timeout(inner, deadline - now)
                .unwrap();
            inner = guard;
        }
    }

    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.pop_deadline(Instant::now() + timeout)
    }

    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        let item = inner.items.pop_front();
        if item.is_some() {
            drop(inner);
            self.not_full.notify_one();
        }
        item
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes the queue and wakes every waiter. Pending items stay readable
    /// through [drain](Self::drain) or further pops.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Removes and returns everything currently queued.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.inner.lock().unwrap();
        let items = inner.items.drain(..).collect();
        drop(inner);
        self.not_full.notify_all();
        items
    }
}
