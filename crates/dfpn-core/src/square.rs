use std::fmt;
use std::str::FromStr;

/// A square on the 8x8 board, A1 to H8, plus a sentinel `None` for "no move".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
#[rustfmt::skip]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
    None,
}

impl Square {
    #[inline]
    pub const fn bitboard(self) -> u64 {
        debug_assert!((self as usize) < 64, "square out of bounds");
        1 << self as usize
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_usize_unchecked(index: usize) -> Square {
        debug_assert!(index < 65, "index out of bounds for Square: {index}");
        unsafe { std::mem::transmute(index) }
    }

    #[inline]
    pub fn from_u32_unchecked(index: u32) -> Square {
        Square::from_usize_unchecked(index as usize)
    }

    pub fn iter() -> impl Iterator<Item = Square> {
        (0..64).map(Square::from_usize_unchecked)
    }

    fn validate_str(sq_str: &str) -> bool {
        if sq_str.len() != 2 {
            return false;
        }
        let file = sq_str.chars().next().unwrap();
        let rank = sq_str.chars().nth(1).unwrap();
        ('a'..='h').contains(&file) && ('1'..='8').contains(&rank)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseSquareError;

impl FromStr for Square {
    type Err = ParseSquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if !Self::validate_str(&s) {
            return Err(ParseSquareError);
        }
        let file = s.chars().next().unwrap() as u8 - b'a';
        let rank = s.chars().nth(1).unwrap() as u8 - b'1';
        Ok(Square::from_usize_unchecked(rank as usize * 8 + file as usize))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Square::None {
            return write!(f, "None");
        }
        let file = ((*self as usize) % 8) as u8 + b'a';
        let rank = ((*self as usize) / 8) as u8 + b'1';
        write!(f, "{}{}", file as char, rank as char)
    }
}
