//! Zobrist hashing for canonical transposition-table keys.
//!
//! The table is seeded once, deterministically, so that a single run always
//! hashes the same position to the same key. Only within-run consistency is
//! required, not cross-run stability.

use std::sync::OnceLock;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use crate::square::Square;

/// Deterministic seed: any fixed value works, only run-to-run consistency matters.
const ZOBRIST_SEED: u64 = 0x5A6F_6272_6973_7400;

/// One random 64-bit value per square per side (`player`/`opponent`).
static ZOBRIST_TABLE: OnceLock<[[u64; 2]; 64]> = OnceLock::new();

fn table() -> &'static [[u64; 2]; 64] {
    ZOBRIST_TABLE.get_or_init(|| {
        let mut rng = SmallRng::seed_from_u64(ZOBRIST_SEED);
        std::array::from_fn(|_| [rng.next_u64(), rng.next_u64()])
    })
}

/// Hashes a `(player, opponent)` bitboard pair. Callers should pass the
/// canonical form (see [`crate::board::Board::canonical`]) so that
/// symmetric positions collide in the transposition table.
#[inline]
pub fn hash(player: u64, opponent: u64) -> u64 {
    let t = table();
    let mut h = 0u64;
    let mut bb = player;
    while bb != 0 {
        let sq = Square::from_u32_unchecked(bb.trailing_zeros());
        h ^= t[sq.index()][0];
        bb = crate::bit::clear_lsb_u64(bb);
    }
    let mut bb = opponent;
    while bb != 0 {
        let sq = Square::from_u32_unchecked(bb.trailing_zeros());
        h ^= t[sq.index()][1];
        bb = crate::bit::clear_lsb_u64(bb);
    }
    h
}

/// Hashes the canonical form of `(player, opponent)` directly.
#[inline]
pub fn canonical_hash(player: u64, opponent: u64) -> u64 {
    let (p, o) = crate::board::Board::from_bitboards(player, opponent).canonical();
    hash(p, o)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic_within_run() {
        assert_eq!(hash(1, 2), hash(1, 2));
    }

    #[test]
    fn test_hash_sensitive_to_side() {
        assert_ne!(hash(1, 2), hash(2, 1));
    }

    #[test]
    fn test_canonical_hash_symmetry_invariant() {
        let board = crate::board::Board::default();
        let rotated = board.rotate_90_clockwise();
        assert_eq!(
            canonical_hash(board.player, board.opponent),
            canonical_hash(rotated.player, rotated.opponent)
        );
    }

    #[test]
    fn test_hash_empty_board() {
        assert_eq!(hash(0, 0), 0);
    }
}
