//! Bit cursor and symbol decoding
//!
//! A [`Cursor`] is the complete resumable position of the decoder inside the
//! bitstream. It is `Copy`: a decode step runs on a scratch copy and is only
//! committed when the whole symbol decoded, so any error leaves the previous
//! position intact.

use super::error::{DecodeError, DecodeResult};
use super::input::InputRing;
use super::tables::{
    DISTANCE_LOW, DISTANCE_PREFIX_BITS, LONG_LENGTH_BASE, LONG_LENGTH_BITS, LONG_LITERAL_MARKER,
    SHORT_LENGTH_BASE, SHORT_LENGTH_BITS, SYMBOL_BITS, SYMBOLS,
};

/// Fixed parameters of one compressed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    /// Decompressed size including the container header
    pub total: u64,
    /// Output position at which the payload starts
    pub header_size: u64,
    /// Input block mask (`u64::MAX` for a single input block)
    pub in_mask: u64,
    /// Output block mask
    pub out_mask: u64,
    /// Width of the per-block length prefix
    pub len_bytes: u64,
}

/// Copy operation produced by one decoded symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    /// Copy `len` raw bytes starting at input position `source`
    Literal { source: u64, len: u64 },
    /// Copy `len` bytes from `distance` bytes back in the output
    Match { distance: u64, len: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub in_pos: u64,
    pub bits: u64,
    pub bit_offset: u32,
    pub context: usize,
    pub out_pos: u64,
    /// Next input position at which the stream realigns to an input block
    pub in_boundary: u64,
    /// End of the current input block
    pub in_block_end: u64,
    /// Compressed bytes the stream needs in total so far
    pub in_needed: u64,
    /// End of the current output block
    pub out_block_end: u64,
}

impl Cursor {
    fn consume(&mut self, count: u32) {
        self.bits >>= count;
        self.bit_offset += count;
    }

    fn take(&mut self, count: u32) -> u64 {
        let value = self.bits & ((1u64 << count) - 1);
        self.consume(count);
        value
    }

    /// Top the accumulator back up with whole bytes already consumed
    fn refill(&mut self, input: &InputRing<'_>) -> DecodeResult<()> {
        let whole_bytes = u64::from(self.bit_offset >> 3);
        input.require(self.in_pos + whole_bytes)?;

        if self.bit_offset != 0 {
            let fresh = input.read_u64(self.in_pos) << (64 - self.bit_offset);
            let merged = fresh | self.bits;
            self.in_pos += whole_bytes;
            self.bit_offset &= 7;
            self.bits = merged & (u64::MAX >> self.bit_offset);
        }
        Ok(())
    }

    fn extended_length(&mut self, input: &InputRing<'_>, inject: bool) -> DecodeResult<u64> {
        let selector = (self.bits & 7) as usize;
        if selector != 0 {
            self.consume(3);
            let extra = self.take(u32::from(SHORT_LENGTH_BITS[selector]));
            return Ok(u64::from(SHORT_LENGTH_BASE[selector]) + extra);
        }

        let long = ((self.bits >> 3) & 0xF) as usize;
        let base = u64::from(LONG_LENGTH_BASE[long]);
        let extra_bits = u32::from(LONG_LENGTH_BITS[long]);

        // Long matches may run out of accumulator; splice one more byte in.
        if inject && self.bit_offset + 4 + extra_bits >= 61 {
            input.require(self.in_pos + 1)?;
            self.bits |= u64::from(input.byte(self.in_pos)) << (64 - self.bit_offset);
            self.in_pos += 1;
            self.bit_offset -= 8;
        }

        self.consume(7);
        Ok(base + self.take(extra_bits))
    }

    fn distance(&mut self) -> u64 {
        let low = self.bits & 0xF;
        let (skip, exponent) = if low == 15 {
            (6, 15 + ((self.bits >> 4) & 3) as u32)
        } else {
            (4, low as u32)
        };

        let slot = ((self.bits >> skip) & 0x3F) as usize;
        let prefix = u32::from(DISTANCE_PREFIX_BITS[slot]);
        let extra = (self.bits >> (skip + prefix)) & ((1u64 << exponent) - 1);
        self.consume(skip + prefix + exponent);

        16 * ((1u64 << exponent) + extra) + u64::from(DISTANCE_LOW[slot]) - 16
    }

    fn near_block_end(&self, frame: &Frame) -> bool {
        (!self.in_pos & frame.in_mask) < 0xF
            || (frame.out_mask & !self.out_pos) < 0xF
            || frame.total - self.out_pos < 0x10
    }

    /// Decode one symbol and advance past it
    pub fn step(
        &mut self,
        frame: &Frame,
        input: &InputRing<'_>,
        window: u64,
    ) -> DecodeResult<Op> {
        self.refill(input)?;

        let index = (self.bits & 0xFF) as usize | (self.context << 8);
        let symbol = SYMBOLS[index];
        self.consume(u32::from(SYMBOL_BITS[index]));

        let copy = if symbol < 0 {
            let previous = self.context;
            self.context = 1;

            let mut len = u64::from(symbol.unsigned_abs());
            if len == u64::from(LONG_LITERAL_MARKER[previous]) {
                if self.near_block_end(frame) {
                    len = 1;
                }
                len += self.extended_length(input, false)?;
            }

            input.require(self.in_pos + len)?;
            let source = self.in_pos;
            self.in_pos += len;
            Op::Literal { source, len }
        } else {
            self.context = 0;
            let distance = self.distance();

            let mut len = symbol as u64;
            if symbol == 17 {
                len += self.extended_length(input, true)?;
                if distance < 8 {
                    len -= 13;
                }
            }

            let history = (self.out_pos - frame.header_size).min(window);
            if distance == 0 || distance > history {
                return Err(DecodeError::InvalidDistance {
                    distance,
                    available: history,
                });
            }
            Op::Match { distance, len }
        };

        if self.bit_offset > 64 {
            return Err(DecodeError::CorruptStream("bit accumulator overrun"));
        }

        let len = match copy {
            Op::Literal { len, .. } | Op::Match { len, .. } => len,
        };
        let end = self.out_pos + len;
        if end > self.out_block_end {
            return Err(DecodeError::SizeMismatch {
                expected: self.out_block_end - frame.header_size,
                actual: end - frame.header_size,
            });
        }
        self.out_pos = end;

        self.finish(frame, input)?;
        Ok(copy)
    }

    fn finish(&mut self, frame: &Frame, input: &InputRing<'_>) -> DecodeResult<()> {
        if self.in_pos < self.in_boundary.min(self.in_block_end) {
            return Ok(());
        }

        if self.out_pos == self.out_block_end {
            if self.out_pos == frame.total {
                return Ok(());
            }
            self.begin_block(frame, input)?;
        }

        self.cross_input_block(frame)
    }

    fn cross_input_block(&mut self, frame: &Frame) -> DecodeResult<()> {
        if self.in_pos >= self.in_boundary {
            let next = self.in_pos.wrapping_add(7) & !frame.in_mask;
            if next < self.in_pos {
                return Err(DecodeError::CorruptStream("input block overrun"));
            }
            self.in_pos = next;
            self.in_boundary = self
                .in_boundary
                .wrapping_add(frame.in_mask)
                .wrapping_add(1);
        }
        Ok(())
    }

    fn begin_block(&mut self, frame: &Frame, input: &InputRing<'_>) -> DecodeResult<()> {
        let gap = frame.in_mask & self.in_pos.wrapping_neg();
        self.consume(1);

        // The length prefix never straddles an input block.
        if frame.len_bytes > gap {
            self.in_pos += gap;
            if self.in_pos > self.in_boundary {
                self.in_boundary = self
                    .in_boundary
                    .wrapping_add(frame.in_mask)
                    .wrapping_add(1);
            }
        }

        input.require(self.in_pos + frame.len_bytes)?;
        let block_len = input.read_le(self.in_pos, frame.len_bytes);
        self.in_pos += frame.len_bytes;
        self.in_needed = self.in_needed.saturating_add(block_len);
        self.in_block_end = self.in_block_end.saturating_add(block_len);

        let mut out_end = self
            .out_pos
            .saturating_add(frame.out_mask)
            .saturating_add(1);
        if out_end >= frame.total {
            out_end = frame.total;
            self.in_block_end = self.in_block_end.saturating_add(frame.len_bytes);
        }
        self.out_block_end = out_end;

        if self.bit_offset > 64 {
            return Err(DecodeError::CorruptStream("bit accumulator overrun"));
        }
        Ok(())
    }
}

/// Parse the stream frame at `header_size` and position a cursor after it
pub(crate) fn open_frame(
    input: &InputRing<'_>,
    header_size: u64,
    compressed_size: u64,
) -> DecodeResult<(Frame, Cursor)> {
    input.require(header_size + 8)?;
    let head = input.read_u64(header_size);

    let size_bits = (head & 0x3F) as u32;
    if size_bits > 57 {
        return Err(DecodeError::InvalidFrame("decompressed size field too wide"));
    }
    let rest = head >> 6;
    let total = (1u64 << size_bits) | (rest & ((1u64 << size_bits) - 1));

    let mut pos = header_size + 8;
    let spill = u64::from((size_bits + 6) >> 3);
    input.require(pos + spill)?;
    let low = input.read_u64(pos) << (64 - (size_bits + 6));
    pos += spill;

    let lead = (size_bits + 6) & 7;
    let word = (u64::MAX >> lead) & ((rest >> size_bits) | low);

    let in_bits = ((word as u8).wrapping_sub(1) & 0x3F) + 1;
    let in_mask = u64::MAX >> (64 - u32::from(in_bits));
    let out_bits = (((word >> 6) as u8).wrapping_sub(1) & 0x3F) + 1;
    let out_mask = u64::MAX >> (64 - u32::from(out_bits));

    let bit_offset = lead + 13;
    let full = (word >> 13) | (input.read_u64(pos) << (64 - bit_offset));
    pos += u64::from(bit_offset >> 3);
    input.require(pos)?;
    let bits = (u64::MAX >> (bit_offset & 7)) & full;

    let (len_bytes, needed) = if in_mask == u64::MAX {
        (0, compressed_size)
    } else {
        let len_bytes = u64::from(in_bits >> 3) + 1;
        input.require(pos + len_bytes)?;
        let needed = input.read_le(pos, len_bytes);
        pos += len_bytes;
        (len_bytes, needed)
    };

    if total < header_size {
        return Err(DecodeError::InvalidFrame(
            "decompressed size smaller than header",
        ));
    }

    let mut in_block_end = needed;
    let mut out_block_end = total;
    if total - 1 > out_mask {
        in_block_end = needed
            .checked_sub(len_bytes)
            .ok_or(DecodeError::InvalidFrame("first block length too small"))?;
        out_block_end = out_mask + 1;
        if out_block_end <= header_size {
            return Err(DecodeError::InvalidFrame(
                "output block smaller than header",
            ));
        }
    }

    let frame = Frame {
        total,
        header_size,
        in_mask,
        out_mask,
        len_bytes,
    };
    let cursor = Cursor {
        in_pos: pos,
        bits,
        bit_offset: bit_offset & 7,
        context: 0,
        out_pos: header_size,
        in_boundary: in_mask.wrapping_sub(6),
        in_block_end,
        in_needed: needed,
        out_block_end,
    };
    Ok((frame, cursor))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Frame head for a single-block stream with the given total size
    fn single_block_head(total: u64) -> Vec<u8> {
        let size_bits = 63 - total.leading_zeros();
        let mut head = u64::from(size_bits) | ((total & ((1 << size_bits) - 1)) << 6);
        // Block exponents of 64 (encoded as 0) follow the size field.
        head &= (1u64 << (size_bits + 6)) - 1;
        head.to_le_bytes().to_vec()
    }

    #[test]
    fn test_open_frame_single_block() {
        let mut data = vec![0u8; 16];
        data.extend(single_block_head(16 + 100));
        data.extend([0u8; 16]);

        let input = InputRing::linear(&data);
        let (frame, cursor) = open_frame(&input, 16, data.len() as u64).expect("frame");
        assert_eq!(frame.total, 116);
        assert_eq!(frame.in_mask, u64::MAX);
        assert_eq!(frame.out_mask, u64::MAX);
        assert_eq!(frame.len_bytes, 0);
        assert_eq!(cursor.out_pos, 16);
        assert_eq!(cursor.out_block_end, 116);
        assert_eq!(cursor.in_block_end, data.len() as u64);
    }

    #[test]
    fn test_open_frame_rejects_wide_size() {
        let mut data = vec![0u8; 8];
        data.extend((58u64).to_le_bytes());
        data.extend([0u8; 16]);

        let input = InputRing::linear(&data);
        assert!(matches!(
            open_frame(&input, 8, data.len() as u64),
            Err(DecodeError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_open_frame_rejects_total_below_header() {
        let mut data = vec![0u8; 64];
        data.extend(single_block_head(32));
        data.extend([0u8; 16]);

        let input = InputRing::linear(&data);
        assert!(matches!(
            open_frame(&input, 64, data.len() as u64),
            Err(DecodeError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_open_frame_truncated() {
        let data = vec![0u8; 70];
        let input = InputRing::linear(&data);
        assert_eq!(
            open_frame(&input, 64, 70),
            Err(DecodeError::TruncatedInput {
                needed: 72,
                available: 70
            })
        );
    }
}
