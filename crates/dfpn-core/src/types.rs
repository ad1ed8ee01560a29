/// Proof number / disproof number representation used by the df-pn+ engine.
///
/// Both numbers live in `[0, PN_INF]`; arithmetic saturates rather than
/// wrapping (see [`crate::constants::PN_INF`]).
pub type ProofNumber = u32;

/// Remaining empty squares at a node. Bounded by [`crate::constants::MAX_EMPTIES`].
pub type Depth = u32;

/// A static evaluation score, scaled the same way as the disc differential.
pub type Score = i32;

/// Generation counter: 0 at the root task, incremented at each spawn.
pub type Generation = u32;

/// A node's (or root move's) proof state, with respect to the side to move
/// at that node. `Unknown` means unproven — either never visited, or
/// search exited on a bound cutoff rather than a terminal proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GameResult {
    Unknown = 0,
    Win = 1,
    Lose = 2,
    Draw = 3,
}

impl GameResult {
    #[inline]
    pub fn is_definitive(self) -> bool {
        !matches!(self, GameResult::Unknown)
    }

    #[inline]
    pub fn from_u8_unchecked(v: u8) -> GameResult {
        unsafe { std::mem::transmute(v) }
    }
}
