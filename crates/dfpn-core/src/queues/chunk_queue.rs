//! Global chunk queue: a mutex-protected max-heap of `Chunk`s, amortizing
//! lock acquisition across `CHUNK_SIZE` tasks at a time. A `Mutex` +
//! `Condvar` pairing lets idle workers block-with-timeout instead of
//! busy-polling.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use arrayvec::ArrayVec;

use crate::constants::{CHUNK_SIZE, GLOBAL_CHUNK_QUEUE_CAPACITY};
use crate::task::Task;

/// A fixed-capacity batch of tasks promoted from a [`crate::queues::local_heap::LocalHeap`].
#[derive(Debug, Clone)]
pub struct Chunk {
    pub tasks: ArrayVec<Task, CHUNK_SIZE>,
    pub top_priority: i64,
}

impl Chunk {
    pub fn new(tasks: ArrayVec<Task, CHUNK_SIZE>) -> Chunk {
        let top_priority = tasks.iter().map(|t| t.priority).max().unwrap_or(i64::MIN);
        Chunk { tasks, top_priority }
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.top_priority == other.top_priority
    }
}
impl Eq for Chunk {}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.top_priority.cmp(&other.top_priority)
    }
}

struct Inner {
    heap: BinaryHeap<Chunk>,
}

/// Shared across all workers; lives for the whole solve.
pub struct GlobalChunkQueue {
    inner: Mutex<Inner>,
    condvar: Condvar,
    /// Cached current max, for lock-free peek.
    top_priority: AtomicI64,
    capacity: usize,
}

impl GlobalChunkQueue {
    pub fn new() -> GlobalChunkQueue {
        Self::with_capacity(GLOBAL_CHUNK_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> GlobalChunkQueue {
        GlobalChunkQueue {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::with_capacity(capacity),
            }),
            condvar: Condvar::new(),
            top_priority: AtomicI64::new(i64::MIN),
            capacity,
        }
    }

    /// Returns `false` when the queue is at capacity (never fatal).
    pub fn push(&self, chunk: Chunk) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.heap.len() >= self.capacity {
            return false;
        }
        inner.heap.push(chunk);
        self.refresh_top(&inner);
        drop(inner);
        self.condvar.notify_all();
        true
    }

    pub fn pop(&self) -> Option<Chunk> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let chunk = inner.heap.pop();
        self.refresh_top(&inner);
        chunk
    }

    fn refresh_top(&self, inner: &Inner) {
        let top = inner.heap.peek().map(|c| c.top_priority).unwrap_or(i64::MIN);
        self.top_priority.store(top, Ordering::Relaxed);
    }

    /// Lock-free peek at the current maximum `top_priority`.
    #[inline]
    pub fn peek_top_priority(&self) -> i64 {
        self.top_priority.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.peek_top_priority() == i64::MIN
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).heap.len()
    }

    /// Fraction of capacity in use, in `[0.0, 1.0]` — used by the spawn
    /// controller's backpressure check.
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    /// Blocks an idle worker for up to `timeout` waiting for a push,
    /// `found_win`, or `shutdown` (all three broadcast this condvar).
    pub fn wait_timeout(&self, timeout: Duration) {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let _ = self.condvar.wait_timeout(guard, timeout);
    }

    /// Wakes every waiter; used on `found_win` and `shutdown`.
    pub fn notify_all(&self) {
        self.condvar.notify_all();
    }
}

impl Default for GlobalChunkQueue {
    fn default() -> Self {
        GlobalChunkQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::square::Square;

    fn chunk_with_priority(p: i64) -> Chunk {
        let mut tasks = ArrayVec::new();
        tasks.push(Task::root(0, 0, Square::A1, p as i32, 10));
        Chunk::new(tasks)
    }

    #[test]
    fn test_pop_returns_highest_top_priority_first() {
        let q = GlobalChunkQueue::new();
        q.push(chunk_with_priority(1));
        q.push(chunk_with_priority(9));
        q.push(chunk_with_priority(4));
        assert_eq!(q.pop().unwrap().top_priority, 9);
        assert_eq!(q.pop().unwrap().top_priority, 4);
        assert_eq!(q.pop().unwrap().top_priority, 1);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_peek_top_priority_tracks_heap_max() {
        let q = GlobalChunkQueue::new();
        assert_eq!(q.peek_top_priority(), i64::MIN);
        q.push(chunk_with_priority(5));
        assert_eq!(q.peek_top_priority(), 5);
        q.push(chunk_with_priority(10));
        assert_eq!(q.peek_top_priority(), 10);
        q.pop();
        assert_eq!(q.peek_top_priority(), 5);
    }

    #[test]
    fn test_push_fails_at_capacity() {
        let q = GlobalChunkQueue::with_capacity(2);
        assert!(q.push(chunk_with_priority(1)));
        assert!(q.push(chunk_with_priority(2)));
        assert!(!q.push(chunk_with_priority(3)));
    }

    #[test]
    fn test_fill_ratio() {
        let q = GlobalChunkQueue::with_capacity(4);
        q.push(chunk_with_priority(1));
        assert_eq!(q.fill_ratio(), 0.25);
    }
}
