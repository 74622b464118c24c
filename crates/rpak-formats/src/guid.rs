//! Asset GUIDs from asset names
//!
//! Assets are referenced by a 64-bit hash of their path. The hash folds case
//! and treats `\` like `/`, so `"texture/ui/menu"` and `"TEXTURE\UI\MENU"`
//! name the same asset.

const LOW_ONES: u32 = 0x0101_0101;
const HIGH_BITS: u32 = 0x8080_8080;
const BACKSLASHES: u32 = 0x5C5C_5C5C;

const WORD_MULTIPLIER: u64 = 0xFB8_C4D9_6501;
const STATE_MULTIPLIER: u64 = 0x633_D5F1;
const LENGTH_MULTIPLIER: u64 = 0xAE_5028_12AA_7333;

/// Fold case and slashes in four characters at once
fn normalize(word: u32) -> u32 {
    let x = word ^ BACKSLASHES;
    let backslashes = (!x >> 7) & (x.wrapping_sub(LOW_ONES) >> 7) & LOW_ONES;
    word.wrapping_sub(backslashes.wrapping_mul(45)) & 0xDFDF_DFDF
}

/// High bit set in every byte lane of `word` that is zero
fn zero_lanes(word: u32) -> u32 {
    !word & word.wrapping_sub(LOW_ONES) & HIGH_BITS
}

/// Hash an asset name into its GUID
///
/// ```rust
/// use rpak_formats::pak_guid;
///
/// assert_eq!(pak_guid("texture/ui/menu.rpak"), pak_guid("TEXTURE\\UI\\MENU.RPAK"));
/// ```
pub fn pak_guid(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let word_at = |index: usize| -> u32 {
        let mut word = [0u8; 4];
        for (lane, slot) in word.iter_mut().enumerate() {
            *slot = bytes.get(index * 4 + lane).copied().unwrap_or(0);
        }
        u32::from_le_bytes(word)
    };

    let mut index = 0;
    let mut word = word_at(0);
    let mut folded = normalize(word);
    let mut terminator = zero_lanes(word);
    let mut state = 0u64;
    let mut length = 0u32;

    while terminator == 0 {
        let mixed = (WORD_MULTIPLIER.wrapping_mul(u64::from(folded)) >> 24)
            .wrapping_add(STATE_MULTIPLIER.wrapping_mul(state));
        state = (mixed >> 61) ^ mixed;
        length = length.wrapping_add(4);

        index += 1;
        word = word_at(index);
        folded = normalize(word);
        terminator = zero_lanes(word);
    }

    let tail_mask = (terminator & terminator.wrapping_neg()).wrapping_sub(1);
    let tail_bits: i32 = if tail_mask == 0 {
        -1
    } else {
        31 - tail_mask.leading_zeros() as i32
    };
    let tail_bytes = length.wrapping_add((tail_bits / 8) as u32);

    STATE_MULTIPLIER
        .wrapping_mul(state)
        .wrapping_add(WORD_MULTIPLIER.wrapping_mul(u64::from(folded & tail_mask)) >> 24)
        .wrapping_sub(LENGTH_MULTIPLIER.wrapping_mul(u64::from(tail_bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_guids() {
        assert_eq!(pak_guid(""), 0);
        assert_eq!(pak_guid("a"), 0xFF51_AFD7_F153_76C8);
        assert_eq!(pak_guid("abcd"), 0x4A70_6CF3_235F_D74E);
        assert_eq!(pak_guid("abcdefgh"), 0x7681_4ABC_68E5_F9DF);
        assert_eq!(pak_guid("common.rpak"), 0x0164_57FC_783B_D2E8);
        assert_eq!(pak_guid("texture/ui/menu.rpak"), 0x40BE_37ED_FD90_BD6C);
        assert_eq!(
            pak_guid("material/models/weapons/r97"),
            0x8BD6_86DF_BA32_0DAF
        );
    }

    #[test]
    fn test_case_and_slash_insensitive() {
        assert_eq!(pak_guid("A"), pak_guid("a"));
        assert_eq!(
            pak_guid("TEXTURE\\UI\\MENU.RPAK"),
            pak_guid("texture/ui/menu.rpak")
        );
        assert_ne!(pak_guid("texture/ui/menu"), pak_guid("texture/ui/menu2"));
    }
}
