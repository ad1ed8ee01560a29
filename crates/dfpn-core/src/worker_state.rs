//! Worker-state bitmap: one busy bit per worker, packed into words so
//! `count_busy`/`has_idle` never bounce a single contended cache line the
//! way a shared counter would with hundreds of workers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::{MAX_WORKERS, WORKER_STATE_WORDS};

pub struct WorkerState {
    words: [AtomicU64; WORKER_STATE_WORDS],
    n_workers: usize,
}

impl WorkerState {
    /// # Panics
    /// Panics if `n_workers` exceeds [`MAX_WORKERS`].
    pub fn new(n_workers: usize) -> WorkerState {
        assert!(n_workers <= MAX_WORKERS, "too many workers");
        WorkerState {
            words: std::array::from_fn(|_| AtomicU64::new(0)),
            n_workers,
        }
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    #[inline]
    pub fn set_busy(&self, worker: usize) {
        debug_assert!(worker < self.n_workers);
        let (word, bit) = Self::locate(worker);
        self.words[word].fetch_or(1u64 << bit, Ordering::AcqRel);
    }

    #[inline]
    pub fn set_idle(&self, worker: usize) {
        debug_assert!(worker < self.n_workers);
        let (word, bit) = Self::locate(worker);
        self.words[word].fetch_and(!(1u64 << bit), Ordering::AcqRel);
    }

    #[inline]
    pub fn is_busy(&self, worker: usize) -> bool {
        debug_assert!(worker < self.n_workers);
        let (word, bit) = Self::locate(worker);
        (self.words[word].load(Ordering::Acquire) >> bit) & 1 != 0
    }

    /// Number of workers currently marked busy.
    pub fn count_busy(&self) -> u32 {
        let mut count = 0u32;
        for (i, word) in self.words.iter().enumerate() {
            let mut bits = word.load(Ordering::Acquire);
            if (i + 1) * 64 > self.n_workers {
                bits &= Self::live_mask(i, self.n_workers);
            }
            count += bits.count_ones();
        }
        count
    }

    /// `true` iff at least one live worker is idle. A fast scan — for each
    /// word, check whether any bit within that word's live worker range is
    /// zero.
    pub fn has_idle(&self) -> bool {
        for (i, word) in self.words.iter().enumerate() {
            let live = Self::live_mask(i, self.n_workers);
            if live == 0 {
                break;
            }
            let bits = word.load(Ordering::Acquire);
            if bits & live != live {
                return true;
            }
        }
        false
    }

    /// Fraction of live workers currently idle, in `[0.0, 1.0]`. Feeds the
    /// spawn controller's idle-rate thresholds.
    pub fn idle_rate(&self) -> f64 {
        if self.n_workers == 0 {
            return 0.0;
        }
        let idle = self.n_workers as u32 - self.count_busy();
        idle as f64 / self.n_workers as f64
    }

    #[inline]
    fn locate(worker: usize) -> (usize, usize) {
        (worker / 64, worker % 64)
    }

    /// Mask of the bits in word `word_idx` that correspond to live workers.
    fn live_mask(word_idx: usize, n_workers: usize) -> u64 {
        let word_start = word_idx * 64;
        if word_start >= n_workers {
            return 0;
        }
        let live_bits = (n_workers - word_start).min(64);
        if live_bits == 64 {
            u64::MAX
        } else {
            (1u64 << live_bits) - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_busy_and_idle() {
        let ws = WorkerState::new(10);
        assert!(!ws.is_busy(3));
        ws.set_busy(3);
        assert!(ws.is_busy(3));
        ws.set_idle(3);
        assert!(!ws.is_busy(3));
    }

    #[test]
    fn test_count_busy() {
        let ws = WorkerState::new(100);
        ws.set_busy(0);
        ws.set_busy(63);
        ws.set_busy(64);
        ws.set_busy(99);
        assert_eq!(ws.count_busy(), 4);
    }

    #[test]
    fn test_has_idle_false_when_all_busy() {
        let ws = WorkerState::new(5);
        for i in 0..5 {
            ws.set_busy(i);
        }
        assert!(!ws.has_idle());
        ws.set_idle(2);
        assert!(ws.has_idle());
    }

    #[test]
    fn test_has_idle_ignores_non_live_bits_beyond_n_workers() {
        let ws = WorkerState::new(5);
        for i in 0..5 {
            ws.set_busy(i);
        }
        // Bits 5..64 in the same word are not live workers and must not
        // count as "idle" just because they're unset.
        assert!(!ws.has_idle());
    }

    #[test]
    fn test_idle_rate() {
        let ws = WorkerState::new(4);
        ws.set_busy(0);
        ws.set_busy(1);
        assert_eq!(ws.idle_rate(), 0.5);
    }

    #[test]
    fn test_spans_multiple_words() {
        let ws = WorkerState::new(200);
        ws.set_busy(150);
        assert!(ws.is_busy(150));
        assert_eq!(ws.count_busy(), 1);
    }
}
