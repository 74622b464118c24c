//! Edit stream commands and their parser

use super::error::{PatchError, PatchResult};

/// Copy source bytes to the output
pub const OP_COPY: u8 = 0;
/// Skip source bytes
pub const OP_SKIP: u8 = 1;
/// Insert literal bytes
pub const OP_INSERT: u8 = 2;
/// Overwrite source bytes with literal bytes
pub const OP_REPLACE: u8 = 3;
/// Replace one byte, copy two
pub const OP_REPLACE_1_COPY_2: u8 = 4;
/// Replace one byte, copy six
pub const OP_REPLACE_1_COPY_6: u8 = 5;
/// Replace two bytes, copy four
pub const OP_REPLACE_2_COPY_4: u8 = 6;

/// One edit stream command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Copy this many source bytes
    Copy(u32),
    /// Skip this many source bytes
    Skip(u32),
    /// Insert literal bytes without consuming source
    Insert(Vec<u8>),
    /// Write literal bytes in place of the same number of source bytes
    Replace(Vec<u8>),
    /// Replace one source byte, then copy the next two
    ReplaceOneCopyTwo(u8),
    /// Replace one source byte, then copy the next six
    ReplaceOneCopySix(u8),
    /// Replace two source bytes, then copy the next four
    ReplaceTwoCopyFour([u8; 2]),
}

impl EditOp {
    /// Source bytes this command consumes
    pub fn source_len(&self) -> u64 {
        match self {
            Self::Copy(n) | Self::Skip(n) => u64::from(*n),
            Self::Insert(_) => 0,
            Self::Replace(bytes) => bytes.len() as u64,
            Self::ReplaceOneCopyTwo(_) => 3,
            Self::ReplaceOneCopySix(_) => 7,
            Self::ReplaceTwoCopyFour(_) => 6,
        }
    }

    /// Output bytes this command produces
    pub fn output_len(&self) -> u64 {
        match self {
            Self::Skip(_) => 0,
            Self::Insert(bytes) => bytes.len() as u64,
            _ => self.source_len(),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Self::Copy(n) => {
                out.push(OP_COPY);
                out.extend_from_slice(&n.to_le_bytes());
            }
            Self::Skip(n) => {
                out.push(OP_SKIP);
                out.extend_from_slice(&n.to_le_bytes());
            }
            Self::Insert(bytes) | Self::Replace(bytes) => {
                out.push(if matches!(self, Self::Insert(_)) {
                    OP_INSERT
                } else {
                    OP_REPLACE
                });
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Self::ReplaceOneCopyTwo(byte) => out.extend_from_slice(&[OP_REPLACE_1_COPY_2, *byte]),
            Self::ReplaceOneCopySix(byte) => out.extend_from_slice(&[OP_REPLACE_1_COPY_6, *byte]),
            Self::ReplaceTwoCopyFour(bytes) => {
                out.push(OP_REPLACE_2_COPY_4);
                out.extend_from_slice(bytes);
            }
        }
    }
}

/// Parsed edit stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditStream {
    /// Commands in order
    pub ops: Vec<EditOp>,
}

impl EditStream {
    /// Parse and validate every command in `data`
    pub fn parse(data: &[u8]) -> PatchResult<Self> {
        let mut ops = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let offset = pos;
            let opcode = data[pos];
            pos += 1;

            let mut take = |len: usize| take_operand(data, &mut pos, offset, len);

            let op = match opcode {
                OP_COPY | OP_SKIP | OP_INSERT | OP_REPLACE => {
                    let mut count = [0u8; 4];
                    count.copy_from_slice(take(4)?);
                    let count = u32::from_le_bytes(count);
                    match opcode {
                        OP_COPY => EditOp::Copy(count),
                        OP_SKIP => EditOp::Skip(count),
                        OP_INSERT => EditOp::Insert(take(count as usize)?.to_vec()),
                        _ => EditOp::Replace(take(count as usize)?.to_vec()),
                    }
                }
                OP_REPLACE_1_COPY_2 => EditOp::ReplaceOneCopyTwo(take(1)?[0]),
                OP_REPLACE_1_COPY_6 => EditOp::ReplaceOneCopySix(take(1)?[0]),
                OP_REPLACE_2_COPY_4 => {
                    let bytes = take(2)?;
                    EditOp::ReplaceTwoCopyFour([bytes[0], bytes[1]])
                }
                _ => return Err(PatchError::InvalidOpcode { offset, opcode }),
            };
            ops.push(op);
        }

        Ok(Self { ops })
    }

    /// Serialize the commands
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for op in &self.ops {
            op.write_to(&mut out);
        }
        out
    }

    /// Source bytes the whole stream consumes
    pub fn source_len(&self) -> u64 {
        self.ops.iter().map(EditOp::source_len).sum()
    }

    /// Output bytes the whole stream produces
    pub fn output_len(&self) -> u64 {
        self.ops.iter().map(EditOp::output_len).sum()
    }
}

fn take_operand<'a>(
    data: &'a [u8],
    pos: &mut usize,
    offset: usize,
    len: usize,
) -> PatchResult<&'a [u8]> {
    let bytes = data
        .get(*pos..pos.saturating_add(len))
        .ok_or(PatchError::TruncatedCommand {
            offset,
            needed: len,
            available: data.len() - *pos,
        })?;
    *pos += len;
    Ok(bytes)
}

impl crate::PakFormat for EditStream {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(Self::build(self))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::PakFormat;

    #[test]
    fn test_parse_all_commands() {
        let data = [
            0, 5, 0, 0, 0, // copy 5
            1, 2, 0, 0, 0, // skip 2
            2, 2, 0, 0, 0, b'h', b'i', // insert "hi"
            3, 1, 0, 0, 0, b'x', // replace "x"
            4, 0xAA, // replace 1, copy 2
            5, 0xBB, // replace 1, copy 6
            6, 0xCC, 0xDD, // replace 2, copy 4
        ];
        let stream = EditStream::parse(&data).expect("Stream should parse");

        assert_eq!(
            stream.ops,
            vec![
                EditOp::Copy(5),
                EditOp::Skip(2),
                EditOp::Insert(b"hi".to_vec()),
                EditOp::Replace(b"x".to_vec()),
                EditOp::ReplaceOneCopyTwo(0xAA),
                EditOp::ReplaceOneCopySix(0xBB),
                EditOp::ReplaceTwoCopyFour([0xCC, 0xDD]),
            ]
        );
        assert_eq!(stream.source_len(), 24);
        assert_eq!(stream.output_len(), 24);
        EditStream::verify_round_trip(&data).expect("Round trip should hold");
    }

    #[test]
    fn test_rejects_unknown_opcode() {
        assert_eq!(
            EditStream::parse(&[0, 1, 0, 0, 0, 9]),
            Err(PatchError::InvalidOpcode {
                offset: 5,
                opcode: 9
            })
        );
    }

    #[test]
    fn test_rejects_truncated_operands() {
        assert_eq!(
            EditStream::parse(&[2, 4, 0, 0, 0, 1, 2]),
            Err(PatchError::TruncatedCommand {
                offset: 0,
                needed: 4,
                available: 2
            })
        );
        assert!(
            EditStream::parse(&[6, 1])
                .expect_err("Operand should be missing")
                .is_stream_error()
        );
    }
}
