//! Streaming decoder for RPak LZ-compressed payloads
//!
//! The payload of a compressed container is a table-driven LZ77 bitstream read
//! least-significant bit first. Each step resolves one symbol through the
//! static tables in [`tables`] into either a literal run (raw bytes copied from
//! the input) or a back-reference (bytes copied from earlier output).
//!
//! # Stream Structure
//!
//! ```text
//! Compressed container:
//! ├── Container header (header_size bytes, not part of the bitstream)
//! ├── Frame head
//! │   ├── Size bit count (6 bits)
//! │   ├── Decompressed size, header included (size bit count bits)
//! │   ├── Input block exponent (6 bits, 0 = 64)
//! │   └── Output block exponent (6 bits, 0 = 64)
//! ├── First input block length (only for multi-block input)
//! └── Symbols
//!     ├── Literal run: symbol, optional extended length, raw bytes
//!     ├── Match: symbol, distance slot + extra bits, optional extended length
//!     └── Output block boundary: 1 bit + little-endian block length
//! ```
//!
//! # Resumability
//!
//! [`DecodeContext::decompress_chunk`] can be called with output slices of any
//! size. The context keeps the bit cursor, the unfinished copy and a
//! power-of-two history window, so splitting the output never changes the
//! bytes produced. A symbol is decoded on a scratch cursor and committed only
//! when complete; `TruncatedInput` therefore leaves the context as it was and
//! the call can be repeated once more input has arrived.
//!
//! # Usage Examples
//!
//! ```rust
//! use rpak_formats::decode::DecodeContext;
//!
//! # fn example(file: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let (mut context, expected) = DecodeContext::new(file, 0x80)?;
//! let mut payload = vec![0u8; expected as usize];
//!
//! let mut written = 0;
//! for chunk in payload.chunks_mut(64 * 1024) {
//!     written += context.decompress_chunk(file, chunk)?;
//! }
//! assert_eq!(written as u64, expected);
//! # Ok(())
//! # }
//! ```

mod cursor;
mod error;
mod input;
pub(crate) mod tables;

pub use error::{DecodeError, DecodeResult};
pub use input::InputRing;

use crate::header::PakHeader;
use cursor::{Cursor, Frame, Op};

/// Default upper bound on the history window (8 MiB)
pub const DEFAULT_MAX_WINDOW: u64 = 1 << 23;

/// Persistent decode state for one compressed stream
///
/// One context belongs to exactly one container and is driven by one thread
/// at a time; it holds no references into the caller's buffers.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    frame: Frame,
    cursor: Cursor,
    pending: Option<Op>,
    window: Vec<u8>,
    window_mask: u64,
    /// Absolute output position written into the window
    produced: u64,
    /// Absolute output position handed to the caller
    drained: u64,
}

impl DecodeContext {
    /// Open a stream from a linear view of the whole compressed file
    ///
    /// Returns the context and the number of payload bytes it will produce
    /// (the decompressed size minus `header_size`).
    pub fn new(input: &[u8], header_size: u64) -> DecodeResult<(Self, u64)> {
        Self::with_window(
            &InputRing::linear(input),
            header_size,
            input.len() as u64,
            DEFAULT_MAX_WINDOW,
        )
    }

    /// Open a stream with an explicit compressed size and window bound
    ///
    /// `max_window` must be a power of two. Back-references further than the
    /// window are rejected with [`DecodeError::InvalidDistance`].
    pub fn with_window(
        input: &InputRing<'_>,
        header_size: u64,
        compressed_size: u64,
        max_window: u64,
    ) -> DecodeResult<(Self, u64)> {
        if !max_window.is_power_of_two() {
            return Err(DecodeError::NotPowerOfTwo {
                what: "history window",
                size: max_window,
            });
        }

        let (frame, cursor) = cursor::open_frame(input, header_size, compressed_size)?;
        let payload = frame.total - frame.header_size;
        let capacity = payload.max(1).next_power_of_two().min(max_window);

        let context = Self {
            frame,
            cursor,
            pending: None,
            window: vec![0u8; capacity as usize],
            window_mask: capacity - 1,
            produced: header_size,
            drained: header_size,
        };
        Ok((context, payload))
    }

    /// Decode up to `output.len()` payload bytes from a linear input slice
    pub fn decompress_chunk(&mut self, input: &[u8], output: &mut [u8]) -> DecodeResult<usize> {
        self.decompress_chunk_ring(&InputRing::linear(input), output)
    }

    /// Decode up to `output.len()` payload bytes from an input view
    ///
    /// Returns the number of bytes written. Fewer than `output.len()` bytes are
    /// written only when the stream is finished. On error, bytes already
    /// placed in `output` by this call are valid and included in
    /// [`total_out`](Self::total_out).
    pub fn decompress_chunk_ring(
        &mut self,
        input: &InputRing<'_>,
        output: &mut [u8],
    ) -> DecodeResult<usize> {
        let mut written = 0;

        loop {
            written += self.drain(&mut output[written..]);
            if written == output.len() {
                return Ok(written);
            }

            if let Some(op) = self.pending {
                self.materialize(input, op)?;
                continue;
            }

            if self.cursor.out_pos == self.frame.total {
                return Ok(written);
            }

            let mut cursor = self.cursor;
            let op = cursor.step(&self.frame, input, self.window.len() as u64)?;
            self.cursor = cursor;
            self.pending = Some(op);
        }
    }

    fn drain(&mut self, output: &mut [u8]) -> usize {
        let ready = (self.produced - self.drained).min(output.len() as u64) as usize;
        for slot in output.iter_mut().take(ready) {
            *slot = self.window[(self.drained & self.window_mask) as usize];
            self.drained += 1;
        }
        ready
    }

    /// Run the pending copy into free window space
    fn materialize(&mut self, input: &InputRing<'_>, op: Op) -> DecodeResult<()> {
        let capacity = self.window.len() as u64;
        let free = capacity - (self.produced - self.drained);

        self.pending = match op {
            Op::Literal { source, len } => {
                let count = len.min(free);
                input.require(source + count)?;
                for offset in 0..count {
                    self.push(input.byte(source + offset));
                }
                (count < len).then_some(Op::Literal {
                    source: source + count,
                    len: len - count,
                })
            }
            Op::Match { distance, len } => {
                let count = len.min(free);
                // Byte by byte: the source may overlap what is being written.
                for _ in 0..count {
                    let byte = self.window[((self.produced - distance) & self.window_mask) as usize];
                    self.push(byte);
                }
                (count < len).then_some(Op::Match {
                    distance,
                    len: len - count,
                })
            }
        };
        Ok(())
    }

    fn push(&mut self, byte: u8) {
        self.window[(self.produced & self.window_mask) as usize] = byte;
        self.produced += 1;
    }

    /// Payload bytes this stream produces in total
    pub fn expected_total_size(&self) -> u64 {
        self.frame.total - self.frame.header_size
    }

    /// Decompressed size declared by the frame, header included
    pub fn decompressed_size(&self) -> u64 {
        self.frame.total
    }

    /// Size of the uncompressed container header preceding the stream
    pub fn header_size(&self) -> u64 {
        self.frame.header_size
    }

    /// Payload bytes handed out so far
    pub fn total_out(&self) -> u64 {
        self.drained - self.frame.header_size
    }

    /// Whether every payload byte has been handed out
    pub fn is_finished(&self) -> bool {
        self.cursor.out_pos == self.frame.total
            && self.pending.is_none()
            && self.drained == self.produced
    }

    /// Lowest absolute input position a later call may still read
    ///
    /// Streaming callers may overwrite ring bytes before this position.
    pub fn retain_from(&self) -> u64 {
        match self.pending {
            Some(Op::Literal { source, .. }) => source.min(self.cursor.in_pos),
            _ => self.cursor.in_pos,
        }
    }

    /// Current absolute input position of the bit cursor
    pub fn input_position(&self) -> u64 {
        self.cursor.in_pos
    }

    /// Compressed bytes the stream has announced it needs so far
    pub fn input_needed(&self) -> u64 {
        self.cursor.in_needed
    }

    /// Capacity of the history window
    pub fn window_size(&self) -> usize {
        self.window.len()
    }
}

/// Open the payload stream of a compressed container
///
/// The stream's declared size must agree with the header; a disagreement is
/// reported as [`DecodeError::SizeMismatch`].
pub fn init(compressed: &[u8], header: &PakHeader) -> DecodeResult<(DecodeContext, u64)> {
    let (context, expected) = DecodeContext::with_window(
        &InputRing::linear(compressed),
        header.header_size(),
        header.compressed_size,
        DEFAULT_MAX_WINDOW,
    )?;
    check_declared_size(&context, header)?;
    Ok((context, expected))
}

/// Verify that a stream decodes to the size its container header announces
pub fn check_declared_size(context: &DecodeContext, header: &PakHeader) -> DecodeResult<()> {
    if context.decompressed_size() != header.decompressed_size {
        return Err(DecodeError::SizeMismatch {
            expected: header.payload_size(),
            actual: context.expected_total_size(),
        });
    }
    Ok(())
}
