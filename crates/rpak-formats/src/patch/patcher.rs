//! Incremental edit stream application
//!
//! Patch sources are themselves compressed containers, so the source bytes
//! arrive chunk by chunk from the decoder. [`EditStreamPatcher`] consumes them
//! as they come and never needs the whole source in memory.

use super::error::{PatchError, PatchResult};
use super::stream::{EditOp, EditStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Emit bytes `start..end` of the literal pool
    Literal { start: usize, end: usize },
    Copy(u64),
    Skip(u64),
}

/// Applies an edit stream to source data supplied in chunks
#[derive(Debug, Clone)]
pub struct EditStreamPatcher {
    steps: Vec<Step>,
    literals: Vec<u8>,
    /// Current step and the source bytes it still needs
    index: usize,
    remaining: u64,
    output: Vec<u8>,
    source_consumed: u64,
    source_fed: u64,
    source_needed: u64,
}

impl EditStreamPatcher {
    /// Prepare to apply `stream`
    pub fn new(stream: &EditStream) -> Self {
        let mut steps = Vec::with_capacity(stream.ops.len() * 2);
        let mut literals = Vec::new();

        let mut literal = |steps: &mut Vec<Step>, bytes: &[u8]| {
            let start = literals.len();
            literals.extend_from_slice(bytes);
            steps.push(Step::Literal {
                start,
                end: literals.len(),
            });
        };

        for op in &stream.ops {
            match op {
                EditOp::Copy(n) => steps.push(Step::Copy(u64::from(*n))),
                EditOp::Skip(n) => steps.push(Step::Skip(u64::from(*n))),
                EditOp::Insert(bytes) => literal(&mut steps, bytes),
                EditOp::Replace(bytes) => {
                    literal(&mut steps, bytes);
                    steps.push(Step::Skip(bytes.len() as u64));
                }
                EditOp::ReplaceOneCopyTwo(byte) => {
                    literal(&mut steps, &[*byte]);
                    steps.push(Step::Skip(1));
                    steps.push(Step::Copy(2));
                }
                EditOp::ReplaceOneCopySix(byte) => {
                    literal(&mut steps, &[*byte]);
                    steps.push(Step::Skip(1));
                    steps.push(Step::Copy(6));
                }
                EditOp::ReplaceTwoCopyFour(bytes) => {
                    literal(&mut steps, bytes);
                    steps.push(Step::Skip(2));
                    steps.push(Step::Copy(4));
                }
            }
        }

        let mut patcher = Self {
            steps,
            literals,
            index: 0,
            remaining: 0,
            output: Vec::with_capacity(stream.output_len().min(1 << 24) as usize),
            source_consumed: 0,
            source_fed: 0,
            source_needed: stream.source_len(),
        };
        patcher.load_step();
        patcher
    }

    /// Position on the current step, emitting literal steps as they come
    fn load_step(&mut self) {
        while let Some(step) = self.steps.get(self.index) {
            match *step {
                Step::Literal { start, end } => {
                    self.output.extend_from_slice(&self.literals[start..end]);
                    self.index += 1;
                }
                Step::Copy(0) | Step::Skip(0) => self.index += 1,
                Step::Copy(n) | Step::Skip(n) => {
                    self.remaining = n;
                    return;
                }
            }
        }
        self.remaining = 0;
    }

    /// Consume the next chunk of source data
    ///
    /// Source bytes beyond what the stream refers to are ignored.
    pub fn feed(&mut self, mut chunk: &[u8]) {
        self.source_fed += chunk.len() as u64;

        while !chunk.is_empty() {
            let Some(step) = self.steps.get(self.index).copied() else {
                return;
            };

            let count = self.remaining.min(chunk.len() as u64) as usize;
            if let Step::Copy(_) = step {
                self.output.extend_from_slice(&chunk[..count]);
            }
            chunk = &chunk[count..];
            self.remaining -= count as u64;
            self.source_consumed += count as u64;

            if self.remaining == 0 {
                self.index += 1;
                self.load_step();
            }
        }
    }

    /// Whether every command has been applied
    pub fn is_complete(&self) -> bool {
        self.index >= self.steps.len()
    }

    /// Output produced so far
    pub fn output_len(&self) -> usize {
        self.output.len()
    }

    /// Source bytes consumed by commands so far
    pub fn source_consumed(&self) -> u64 {
        self.source_consumed
    }

    /// Source bytes the stream refers to in total
    pub fn source_needed(&self) -> u64 {
        self.source_needed
    }

    /// Finish application and check the output length
    pub fn finish(self, expected_len: u64) -> PatchResult<Vec<u8>> {
        if !self.is_complete() {
            return Err(PatchError::SourceExhausted {
                needed: self.source_needed,
                available: self.source_fed,
            });
        }

        let actual = self.output.len() as u64;
        if actual != expected_len {
            return Err(PatchError::OutputSizeMismatch {
                expected: expected_len,
                actual,
            });
        }

        Ok(self.output)
    }
}

/// Apply an encoded edit stream to a source held in memory
pub fn apply_edit_stream(stream: &[u8], source: &[u8], expected_len: u64) -> PatchResult<Vec<u8>> {
    let stream = EditStream::parse(stream)?;
    let mut patcher = EditStreamPatcher::new(&stream);
    patcher.feed(source);
    patcher.finish(expected_len)
}
