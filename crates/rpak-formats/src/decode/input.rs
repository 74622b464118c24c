//! Input views for the decoder
//!
//! The decoder addresses compressed bytes by absolute file position. A view
//! maps those positions either onto a linear slice holding the file from
//! offset zero, or onto a power-of-two ring that a streaming reader refills.

use super::error::{DecodeError, DecodeResult};

/// Compressed input visible to a decode call
#[derive(Debug, Clone, Copy)]
pub struct InputRing<'a> {
    data: &'a [u8],
    mask: u64,
    end: u64,
}

impl<'a> InputRing<'a> {
    /// View over a slice that starts at file offset zero
    pub fn linear(data: &'a [u8]) -> Self {
        Self {
            data,
            mask: u64::MAX,
            end: data.len() as u64,
        }
    }

    /// View over a ring buffer holding the most recent `data.len()` bytes
    ///
    /// `streamed` is the absolute number of bytes written into the ring so far.
    /// Byte `p` lives at `data[p & (len - 1)]` and is valid for
    /// `streamed - len <= p < streamed`.
    pub fn ring(data: &'a [u8], streamed: u64) -> DecodeResult<Self> {
        if !data.len().is_power_of_two() {
            return Err(DecodeError::NotPowerOfTwo {
                what: "input ring",
                size: data.len() as u64,
            });
        }

        Ok(Self {
            data,
            mask: data.len() as u64 - 1,
            end: streamed,
        })
    }

    /// Absolute end of the readable input
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Byte at `pos`, zero past the end of the streamed input
    pub(crate) fn byte(&self, pos: u64) -> u8 {
        if pos >= self.end {
            return 0;
        }
        self.data.get((pos & self.mask) as usize).copied().unwrap_or(0)
    }

    /// Little-endian qword at `pos`, zero-filled past the end
    pub(crate) fn read_u64(&self, pos: u64) -> u64 {
        if self.mask == u64::MAX && pos.saturating_add(8) <= self.end {
            let start = pos as usize;
            if let Some(bytes) = self.data.get(start..start + 8) {
                let mut word = [0u8; 8];
                word.copy_from_slice(bytes);
                return u64::from_le_bytes(word);
            }
        }
        self.read_le(pos, 8)
    }

    /// Little-endian integer of `len` bytes (at most 8) at `pos`
    pub(crate) fn read_le(&self, pos: u64, len: u64) -> u64 {
        (0..len.min(8)).fold(0u64, |acc, i| {
            acc | (u64::from(self.byte(pos + i)) << (8 * i))
        })
    }

    /// Fail with `TruncatedInput` unless every byte before `end` is available
    pub(crate) fn require(&self, end: u64) -> DecodeResult<()> {
        if end > self.end {
            return Err(DecodeError::TruncatedInput {
                needed: end,
                available: self.end,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_reads_zero_fill() {
        let data = [1u8, 2, 3, 4, 5];
        let input = InputRing::linear(&data);

        assert_eq!(input.byte(4), 5);
        assert_eq!(input.byte(5), 0);
        assert_eq!(input.read_u64(0), 0x0504_0302_01);
        assert_eq!(input.read_le(1, 2), 0x0302);
        assert!(input.require(5).is_ok());
        assert_eq!(
            input.require(6),
            Err(DecodeError::TruncatedInput {
                needed: 6,
                available: 5
            })
        );
    }

    #[test]
    fn test_ring_wraps_positions() {
        let mut ring = [0u8; 8];
        // Absolute positions 8..12 wrap onto ring slots 0..4
        ring[..4].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        ring[4..].copy_from_slice(&[4, 5, 6, 7]);
        let input = InputRing::ring(&ring, 12).expect("power of two ring");

        assert_eq!(input.byte(8), 0xAA);
        assert_eq!(input.byte(11), 0xDD);
        assert_eq!(input.byte(7), 7);
        assert_eq!(input.byte(12), 0);
        assert_eq!(input.read_le(6, 4), 0xBBAA_0706);
    }

    #[test]
    fn test_ring_rejects_odd_sizes() {
        let ring = [0u8; 12];
        assert!(matches!(
            InputRing::ring(&ring, 0),
            Err(DecodeError::NotPowerOfTwo { size: 12, .. })
        ));
    }
}
