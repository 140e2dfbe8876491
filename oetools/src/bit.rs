//! Bitmask tools for sync codes and digital lines

use bit_iter::BitIter;
use num_traits::{FromPrimitive, PrimInt, Unsigned};
use std::ops::{BitAndAssign, BitOrAssign, BitXorAssign};

/// Returns all lines (1-indexed) set in the mask
pub fn mask_to_chans(m: u8) -> Vec<u8> {
    // Lines are 1-indexed, bits are 0-indexed
    BitIter::from(m).map(|b| 1 + b as u8).collect()
}

/// Single-bit read and write for unsigned integers
pub trait BitOps:
    PrimInt + BitAndAssign + BitOrAssign + BitXorAssign + FromPrimitive + Unsigned
{
    fn change(&mut self, b: usize, x: bool);
    fn check(self, b: usize) -> bool;
}

macro_rules! impl_bitops {
    ($($t:ty),*) => {$(
        impl BitOps for $t {
            #[inline]
            fn change(&mut self, b: usize, x: bool) {
                *self = (*self & !(1 << b)) | ((x as $t) << b);
            }

            #[inline]
            fn check(self, b: usize) -> bool {
                self >> b & 1 == 1
            }
        }
    )*};
}

impl_bitops!(u8, u16, u32, u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_sets_and_clears() {
        let mut x = 0b0101u32;
        x.change(1, true);
        assert_eq!(x, 0b0111);
        x.change(0, false);
        assert_eq!(x, 0b0110);
        x.change(2, true);
        assert_eq!(x, 0b0110);
        assert!(x.check(2));
        assert!(!x.check(3));
    }

    #[test]
    fn masks_and_lines() {
        assert_eq!(mask_to_chans(0b1000_0101), vec![1, 3, 8]);
        assert!(mask_to_chans(0).is_empty());
    }
}
