//! 64-byte aligned wrapper, used to pad the TT's stripe locks so an array of
//! them doesn't false-share cache lines.

use std::ops::{Deref, DerefMut};

#[repr(C, align(64))]
pub struct Align64<T>(pub T);

impl<T> Deref for Align64<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Align64<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: Default> Default for Align64<T> {
    fn default() -> Self {
        Self(T::default())
    }
}
