//! Ternary digits and the per-word packing arithmetic.
//!
//! A machine word of `W` bits holds `floor(log3(2^W))` base-3 digits:
//! 20 for `u32`, 40 for `u64`. Digit reads and writes are div/mod
//! arithmetic against a precomputed power-of-three table, so a digit
//! update touches exactly one word and leaves every other digit of that
//! word untouched.

use crate::error::GraphError;

/// A value constrained to {0, 1, 2}.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Trit(u8);

impl Trit {
    pub const ZERO: Trit = Trit(0);
    pub const ONE: Trit = Trit(1);
    pub const TWO: Trit = Trit(2);

    /// Fails with [`GraphError::InvalidDigit`] for values above 2.
    pub fn new(value: u8) -> Result<Self, GraphError> {
        if value > 2 {
            return Err(GraphError::invalid_digit(value));
        }
        Ok(Trit(value))
    }

    /// Constructor for values already known to be in range.
    #[inline]
    pub(crate) const fn from_raw(value: u8) -> Self {
        debug_assert!(value <= 2);
        Trit(value)
    }

    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl From<Trit> for u8 {
    #[inline]
    fn from(t: Trit) -> u8 {
        t.0
    }
}

impl TryFrom<u8> for Trit {
    type Error = GraphError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Trit::new(value)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Backing word for a packed ternary array.
///
/// Implemented for `u32` (20 digits per word) and `u64` (40 digits per
/// word). Sealed: the digit arithmetic relies on the power table matching
/// the word width exactly.
pub trait PackedWord: Copy + Eq + sealed::Sealed + 'static {
    /// Number of base-3 digits that fit in one word.
    const DIGITS: usize;
    const ZERO: Self;

    fn get_digit(self, digit: usize) -> u8;
    #[must_use]
    fn set_digit(self, digit: usize, value: u8) -> Self;
}

macro_rules! impl_packed_word {
    ($ty:ty, $digits:expr, $pow:ident) => {
        const $pow: [$ty; $digits] = {
            let mut table = [1 as $ty; $digits];
            let mut i = 1;
            while i < $digits {
                table[i] = table[i - 1] * 3;
                i += 1;
            }
            table
        };

        impl sealed::Sealed for $ty {}

        impl PackedWord for $ty {
            const DIGITS: usize = $digits;
            const ZERO: Self = 0;

            #[inline]
            fn get_digit(self, digit: usize) -> u8 {
                debug_assert!(digit < Self::DIGITS);
                let mut value = self;
                // lop off the digits above the one we want; unnecessary
                // for the most significant digit
                if digit < Self::DIGITS - 1 {
                    value %= $pow[digit + 1];
                }
                (value / $pow[digit]) as u8
            }

            #[inline]
            fn set_digit(self, digit: usize, value: u8) -> Self {
                debug_assert!(digit < Self::DIGITS);
                debug_assert!(value <= 2);
                let upper = if digit < Self::DIGITS - 1 {
                    (self / $pow[digit + 1]) * $pow[digit + 1]
                } else {
                    0
                };
                let lower = if digit > 0 { self % $pow[digit] } else { 0 };
                upper + (value as $ty) * $pow[digit] + lower
            }
        }
    };
}

impl_packed_word!(u32, 20, POW3_U32);
impl_packed_word!(u64, 40, POW3_U64);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn trit_rejects_out_of_range_values() {
        assert_eq!(Trit::new(0), Ok(Trit::ZERO));
        assert_eq!(Trit::new(2), Ok(Trit::TWO));
        assert_eq!(Trit::new(3), Err(GraphError::InvalidDigit { value: 3 }));
        assert_eq!(
            Trit::try_from(255),
            Err(GraphError::InvalidDigit { value: 255 })
        );
    }

    fn roundtrip_all_digits<W: PackedWord + std::fmt::Debug>(seed: W) {
        for digit in 0..W::DIGITS {
            for value in 0u8..3 {
                let written = seed.set_digit(digit, value);
                assert_eq!(written.get_digit(digit), value);
                // every other digit of the word is untouched
                for other in (0..W::DIGITS).filter(|&d| d != digit) {
                    assert_eq!(written.get_digit(other), seed.get_digit(other));
                }
            }
        }
    }

    #[test]
    fn packing_stress_u32() {
        roundtrip_all_digits(0u32);
        roundtrip_all_digits(u32::MAX / 2); // arbitrary non-trivial payload
        // the all-twos word is the largest encodable value
        let mut word = 0u32;
        for digit in 0..<u32 as PackedWord>::DIGITS {
            word = word.set_digit(digit, 2);
        }
        roundtrip_all_digits(word);
    }

    #[test]
    fn packing_stress_u64() {
        roundtrip_all_digits(0u64);
        let mut word = 0u64;
        for digit in 0..<u64 as PackedWord>::DIGITS {
            word = word.set_digit(digit, 2);
        }
        roundtrip_all_digits(word);
    }

    #[test]
    fn twenty_digits_fill_a_u32_without_overflow() {
        // 3^20 - 1 must fit; one more digit would not
        let mut word = 0u32;
        for digit in 0..20 {
            word = word.set_digit(digit, 2);
        }
        assert_eq!(word, 3u32.pow(20) - 1);
    }

    proptest! {
        #[test]
        fn digit_writes_commute_with_a_dense_model(
            writes in proptest::collection::vec((0usize..40, 0u8..3), 0..64)
        ) {
            let mut word = 0u64;
            let mut model = [0u8; 40];
            for (digit, value) in writes {
                word = word.set_digit(digit, value);
                model[digit] = value;
            }
            for digit in 0..40 {
                prop_assert_eq!(word.get_digit(digit), model[digit]);
            }
        }
    }
}
