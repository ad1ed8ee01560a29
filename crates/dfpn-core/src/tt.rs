//! Transposition table : power-of-two sized, one slot per key
//! (direct index, no chaining), guarded by 1024 cache-line-padded stripe
//! locks whose index is derived independently of the table index so that
//! lock contention doesn't correlate with slot contention.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use lock_api::RawMutex;

use crate::constants::TT_STRIPES;
use crate::types::{Depth, GameResult, ProofNumber, Score};
use crate::util::align::Align64;
use crate::util::spinlock::RawSpinLock;

/// One transposition-table slot. Protected by its stripe lock, never
/// accessed without it, so plain (non-atomic) fields are correct here.
#[derive(Clone, Copy)]
struct TtSlot {
    occupied: bool,
    key: u64,
    depth: Depth,
    pn: ProofNumber,
    dn: ProofNumber,
    result: GameResult,
    eval: Score,
}

impl Default for TtSlot {
    fn default() -> Self {
        TtSlot {
            occupied: false,
            key: 0,
            depth: 0,
            pn: 0,
            dn: 0,
            result: GameResult::Unknown,
            eval: 0,
        }
    }
}

/// Result of a successful [`TranspositionTable::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtData {
    pub pn: ProofNumber,
    pub dn: ProofNumber,
    pub result: GameResult,
    pub eval: Score,
}

/// The shared, stripe-locked transposition table. Lives for the
/// whole solve; memory is allocated once at construction.
pub struct TranspositionTable {
    slots: Box<[UnsafeCell<TtSlot>]>,
    locks: Box<[Align64<RawSpinLock>]>,
    index_mask: u64,
    hits: AtomicU64,
    stores: AtomicU64,
    collisions: AtomicU64,
}

unsafe impl Sync for TranspositionTable {}

impl TranspositionTable {
    /// `size_mb` is a startup parameter; the table is sized to the largest
    /// power of two that fits ("Sizing is a startup parameter").
    ///
    /// # Panics
    /// Panics if `size_mb == 0` (resource-init failure is fatal).
    pub fn new(size_mb: usize) -> TranspositionTable {
        assert!(size_mb > 0, "tt_size_mb must be > 0");

        let slot_size = std::mem::size_of::<TtSlot>().max(1);
        let raw_slots = (size_mb * 1024 * 1024) / slot_size;
        let capacity = raw_slots.next_power_of_two().max(TT_STRIPES);

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(TtSlot::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let locks = (0..TT_STRIPES)
            .map(|_| Align64(RawSpinLock::INIT))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        TranspositionTable {
            slots,
            locks,
            index_mask: (capacity - 1) as u64,
            hits: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            collisions: AtomicU64::new(0),
        }
    }

    #[inline]
    fn table_index(&self, key: u64) -> usize {
        (key & self.index_mask) as usize
    }

    /// Stripe index derived from high bits of the hash so it is independent
    /// of the low bits used for `table_index`.
    #[inline]
    fn stripe_index(&self, key: u64) -> usize {
        ((key >> 20) as usize) & (TT_STRIPES - 1)
    }

    /// Returns a hit iff `entry.key == key && entry.depth >= depth`.
    pub fn probe(&self, key: u64, depth: Depth) -> Option<TtData> {
        let idx = self.table_index(key);
        let stripe = self.stripe_index(key);
        let lock = &self.locks[stripe].0;

        lock.lock();
        let slot = unsafe { &*self.slots[idx].get() };
        let result = if slot.occupied && slot.key == key {
            if slot.depth >= depth {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(TtData {
                    pn: slot.pn,
                    dn: slot.dn,
                    result: slot.result,
                    eval: slot.eval,
                })
            } else {
                None
            }
        } else {
            if slot.occupied {
                self.collisions.fetch_add(1, Ordering::Relaxed);
            }
            None
        };
        unsafe { lock.unlock() };
        result
    }

    /// Writes iff `entry.depth <= depth` (deeper analyses win; ties
    /// overwrite for freshness).
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        key: u64,
        depth: Depth,
        pn: ProofNumber,
        dn: ProofNumber,
        result: GameResult,
        eval: Score,
    ) {
        let idx = self.table_index(key);
        let stripe = self.stripe_index(key);
        let lock = &self.locks[stripe].0;

        lock.lock();
        let slot = unsafe { &mut *self.slots[idx].get() };
        if !slot.occupied || slot.depth <= depth {
            *slot = TtSlot {
                occupied: true,
                key,
                depth,
                pn,
                dn,
                result,
                eval,
            };
            self.stores.fetch_add(1, Ordering::Relaxed);
        }
        unsafe { lock.unlock() };
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn stores(&self) -> u64 {
        self.stores.load(Ordering::Relaxed)
    }

    pub fn collisions(&self) -> u64 {
        self.collisions.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
