//! Static decode tables for the RPak LZ bitstream.
//!
//! Tables are indexed by `(context << 8) | next_byte`. Context 0 follows a
//! match, context 1 follows a literal run.

/// Symbol for each `(context, lookahead byte)` pair.
///
/// Negative values are literal runs of `-sym` bytes, non-negative values are
/// match lengths (17 means "extended length follows").
#[rustfmt::skip]
pub(crate) const SYMBOLS: [i8; 512] = [
    4, -2, -4, 8, 4, -17, 17, -7, 4, -3, -4, 7, 4, 5, -1, -12,
    4, -2, -4, 16, 4, -17, 17, -10, 4, -3, -4, -5, 4, 6, -1, 11,
    4, -2, -4, 8, 4, -17, 17, -8, 4, -3, -4, 12, 4, 5, -1, -9,
    4, -2, -4, 16, 4, -17, 17, -11, 4, -3, -4, -6, 4, 6, -1, -13,
    4, -2, -4, 8, 4, -17, 17, -7, 4, -3, -4, 7, 4, 5, -1, -12,
    4, -2, -4, 16, 4, -17, 17, -10, 4, -3, -4, -5, 4, 6, -1, 14,
    4, -2, -4, 8, 4, -17, 17, -8, 4, -3, -4, 12, 4, 5, -1, 9,
    4, -2, -4, 16, 4, -17, 17, -11, 4, -3, -4, -6, 4, 6, -1, -15,
    4, -2, -4, 8, 4, -17, 17, -7, 4, -3, -4, 7, 4, 5, -1, -12,
    4, -2, -4, 16, 4, -17, 17, -10, 4, -3, -4, -5, 4, 6, -1, 13,
    4, -2, -4, 8, 4, -17, 17, -8, 4, -3, -4, 12, 4, 5, -1, -9,
    4, -2, -4, 16, 4, -17, 17, -11, 4, -3, -4, -6, 4, 6, -1, -14,
    4, -2, -4, 8, 4, -17, 17, -7, 4, -3, -4, 7, 4, 5, -1, -12,
    4, -2, -4, 16, 4, -17, 17, -10, 4, -3, -4, -5, 4, 6, -1, 15,
    4, -2, -4, 8, 4, -17, 17, -8, 4, -3, -4, 12, 4, 5, -1, 10,
    4, -2, -4, 16, 4, -17, 17, -11, 4, -3, -4, -6, 4, 6, -1, -16,
    4, 5, 4, 6, 4, 5, 4, 7, 4, 5, 4, 6, 4, 5, 4, 17,
    4, 5, 4, 6, 4, 5, 4, 8, 4, 5, 4, 6, 4, 5, 4, 12,
    4, 5, 4, 6, 4, 5, 4, 7, 4, 5, 4, 6, 4, 5, 4, 9,
    4, 5, 4, 6, 4, 5, 4, 8, 4, 5, 4, 6, 4, 5, 4, 14,
    4, 5, 4, 6, 4, 5, 4, 7, 4, 5, 4, 6, 4, 5, 4, 17,
    4, 5, 4, 6, 4, 5, 4, 8, 4, 5, 4, 6, 4, 5, 4, 11,
    4, 5, 4, 6, 4, 5, 4, 7, 4, 5, 4, 6, 4, 5, 4, 10,
    4, 5, 4, 6, 4, 5, 4, 8, 4, 5, 4, 6, 4, 5, 4, 16,
    4, 5, 4, 6, 4, 5, 4, 7, 4, 5, 4, 6, 4, 5, 4, 17,
    4, 5, 4, 6, 4, 5, 4, 8, 4, 5, 4, 6, 4, 5, 4, 12,
    4, 5, 4, 6, 4, 5, 4, 7, 4, 5, 4, 6, 4, 5, 4, 9,
    4, 5, 4, 6, 4, 5, 4, 8, 4, 5, 4, 6, 4, 5, 4, 15,
    4, 5, 4, 6, 4, 5, 4, 7, 4, 5, 4, 6, 4, 5, 4, 17,
    4, 5, 4, 6, 4, 5, 4, 8, 4, 5, 4, 6, 4, 5, 4, 13,
    4, 5, 4, 6, 4, 5, 4, 7, 4, 5, 4, 6, 4, 5, 4, 10,
    4, 5, 4, 6, 4, 5, 4, 8, 4, 5, 4, 6, 4, 5, 4, -1,
];

/// Number of bits consumed by the symbol at the same index in [`SYMBOLS`].
#[rustfmt::skip]
pub(crate) const SYMBOL_BITS: [u8; 512] = [
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 6,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 7,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 6,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 6,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 7,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 6,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    2, 4, 3, 5, 2, 4, 4, 6, 2, 4, 3, 6, 2, 5, 4, 8,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 6,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 7,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 7,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 8,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 6,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 8,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 7,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 8,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 6,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 7,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 7,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 8,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 6,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 8,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 7,
    1, 2, 1, 3, 1, 2, 1, 5, 1, 2, 1, 3, 1, 2, 1, 8,
];

/// Low nibble added to a decoded distance, indexed by the 6-bit slot.
pub(crate) const DISTANCE_LOW: [u8; 64] = [
    0, 8, 0, 4, 0, 8, 0, 6, 0, 8, 0, 1, 0, 8, 0, 11, 0, 8, 0, 12, 0, 8, 0, 9, 0, 8, 0, 3, 0, 8,
    0, 14, 0, 8, 0, 4, 0, 8, 0, 7, 0, 8, 0, 2, 0, 8, 0, 13, 0, 8, 0, 12, 0, 8, 0, 10, 0, 8, 0, 5,
    0, 8, 0, 15,
];

/// Prefix code length of the distance slot.
pub(crate) const DISTANCE_PREFIX_BITS: [u8; 64] = [
    1, 2, 1, 5, 1, 2, 1, 6, 1, 2, 1, 6, 1, 2, 1, 6, 1, 2, 1, 5, 1, 2, 1, 6, 1, 2, 1, 6, 1, 2, 1,
    6, 1, 2, 1, 5, 1, 2, 1, 6, 1, 2, 1, 6, 1, 2, 1, 6, 1, 2, 1, 5, 1, 2, 1, 6, 1, 2, 1, 6, 1, 2,
    1, 6,
];

/// Base value of a long extended length, indexed by its 4-bit selector.
pub(crate) const LONG_LENGTH_BASE: [u32; 16] = [
    74, 106, 138, 170, 202, 234, 266, 298, 330, 362, 394, 426, 938, 1450, 9642, 140714,
];

/// Extra bits read after a long extended length selector.
pub(crate) const LONG_LENGTH_BITS: [u8; 16] = [5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 9, 9, 13, 17, 21];

/// Base value of a short extended length, indexed by the 3-bit selector (0 = long form).
pub(crate) const SHORT_LENGTH_BASE: [u32; 8] = [0, 0, 2, 4, 6, 8, 10, 42];

/// Extra bits read after a short extended length selector.
pub(crate) const SHORT_LENGTH_BITS: [u8; 8] = [0, 1, 1, 1, 1, 1, 5, 5];

/// Literal run length that announces an extended run, per context.
pub(crate) const LONG_LITERAL_MARKER: [u32; 2] = [17, 1];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_ranges() {
        for (idx, &sym) in SYMBOLS.iter().enumerate() {
            assert!(
                (-17..=-1).contains(&sym) || (4..=17).contains(&sym),
                "unexpected symbol {sym} at {idx}"
            );
            assert!(SYMBOL_BITS[idx] > 0 && SYMBOL_BITS[idx] <= 8);
        }
    }

    #[test]
    fn test_symbol_codes_are_prefix_consistent() {
        // Every byte sharing the low `bits` bits of an entry must decode to the same symbol.
        for ctx in 0..2usize {
            for byte in 0..256usize {
                let idx = (ctx << 8) | byte;
                let bits = SYMBOL_BITS[idx];
                let mask = (1usize << bits) - 1;
                for other in 0..256usize {
                    if other & mask == byte & mask {
                        let other_idx = (ctx << 8) | other;
                        assert_eq!(SYMBOLS[other_idx], SYMBOLS[idx]);
                        assert_eq!(SYMBOL_BITS[other_idx], bits);
                    }
                }
            }
        }
    }

    #[test]
    fn test_length_tables_are_contiguous() {
        for i in 0..15 {
            let end = LONG_LENGTH_BASE[i] + (1 << LONG_LENGTH_BITS[i]);
            assert_eq!(end, LONG_LENGTH_BASE[i + 1]);
        }
        assert_eq!(SHORT_LENGTH_BASE[7] + (1 << SHORT_LENGTH_BITS[7]), LONG_LENGTH_BASE[0]);
    }
}
