//! Shared task array: a bounded MPMC ring used in the two regimes where
//! ordering doesn't matter — initial root-task distribution before workers
//! ramp up, and endgame drainage when most workers are idle. Contention is
//! naturally low in both regimes, so a CAS-with-retry ring is adequate.
//!
//! A naive "CAS tail from T to T+1, then write the slot and release-fence"
//! scheme isn't sound once a *pop* can race a not-yet-finished push at the
//! same slot: each slot carries its own sequence number (the classic Vyukov
//! bounded MPMC queue construction) so a reader only observes a slot after
//! its writer has published it.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::constants::SHARED_TASK_ARRAY_CAPACITY;
use crate::task::Task;

struct Slot {
    sequence: AtomicU32,
    data: UnsafeCell<MaybeUninit<Task>>,
}

/// Bounded multi-producer multi-consumer ring of [`Task`]. Capacity must be
/// a power of two.
pub struct SharedTaskArray {
    buffer: Box<[Slot]>,
    mask: u32,
    head: AtomicU32,
    tail: AtomicU32,
}

unsafe impl Sync for SharedTaskArray {}
unsafe impl Send for SharedTaskArray {}

impl SharedTaskArray {
    pub fn new() -> SharedTaskArray {
        Self::with_capacity(SHARED_TASK_ARRAY_CAPACITY)
    }

    /// # Panics
    /// Panics if `capacity` is not a power of two.
    pub fn with_capacity(capacity: usize) -> SharedTaskArray {
        assert!(capacity.is_power_of_two(), "capacity must be a power of two");
        let buffer = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicU32::new(i as u32),
                data: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        SharedTaskArray {
            buffer,
            mask: (capacity - 1) as u32,
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
        }
    }

    /// Returns `false` if the ring is full (capacity exhaustion is never
    /// fatal — the caller leaves the task where it is).
    pub fn push(&self, task: Task) -> bool {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[(pos & self.mask) as usize];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as i32 - pos as i32;

            if diff == 0 {
                match self.tail.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*slot.data.get()).write(task) };
                        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
                        return true;
                    }
                    Err(cur) => pos = cur,
                }
            } else if diff < 0 {
                return false;
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    pub fn pop(&self) -> Option<Task> {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[(pos & self.mask) as usize];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as i32 - (pos.wrapping_add(1)) as i32;

            if diff == 0 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let task = unsafe { (*slot.data.get()).assume_init_read() };
                        slot.sequence
                            .store(pos.wrapping_add(self.mask + 1), Ordering::Release);
                        return Some(task);
                    }
                    Err(cur) => pos = cur,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        head == tail
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Approximate occupancy (the `tail - head` snapshot can be stale under
    /// concurrent access, which is fine — only used for the spawn
    /// controller's backpressure heuristic).
    pub fn fill_ratio(&self) -> f64 {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let len = tail.wrapping_sub(head) as usize;
        len as f64 / self.capacity() as f64
    }
}

impl Default for SharedTaskArray {
    fn default() -> Self {
        SharedTaskArray::new()
    }
}
