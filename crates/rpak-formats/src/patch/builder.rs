//! Edit stream construction

use super::stream::{EditOp, EditStream};

/// Builds an edit stream command by command
///
/// ```rust
/// use rpak_formats::patch::{EditStreamBuilder, apply_edit_stream};
///
/// let stream = EditStreamBuilder::new().skip(4).insert(b"new").copy(2).build();
/// let output = apply_edit_stream(&stream, b"old-data", 5).expect("stream applies");
/// assert_eq!(output, b"newda");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EditStreamBuilder {
    ops: Vec<EditOp>,
}

impl EditStreamBuilder {
    /// Start an empty stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `count` source bytes
    pub fn copy(mut self, count: u32) -> Self {
        self.ops.push(EditOp::Copy(count));
        self
    }

    /// Skip `count` source bytes
    pub fn skip(mut self, count: u32) -> Self {
        self.ops.push(EditOp::Skip(count));
        self
    }

    /// Insert literal bytes
    pub fn insert(mut self, bytes: &[u8]) -> Self {
        self.ops.push(EditOp::Insert(bytes.to_vec()));
        self
    }

    /// Overwrite as many source bytes as `bytes` holds
    pub fn replace(mut self, bytes: &[u8]) -> Self {
        self.ops.push(EditOp::Replace(bytes.to_vec()));
        self
    }

    /// Replace one source byte and copy the next two
    pub fn replace_one_copy_two(mut self, byte: u8) -> Self {
        self.ops.push(EditOp::ReplaceOneCopyTwo(byte));
        self
    }

    /// Replace one source byte and copy the next six
    pub fn replace_one_copy_six(mut self, byte: u8) -> Self {
        self.ops.push(EditOp::ReplaceOneCopySix(byte));
        self
    }

    /// Replace two source bytes and copy the next four
    pub fn replace_two_copy_four(mut self, bytes: [u8; 2]) -> Self {
        self.ops.push(EditOp::ReplaceTwoCopyFour(bytes));
        self
    }

    /// Finish as a parsed stream
    pub fn stream(self) -> EditStream {
        EditStream { ops: self.ops }
    }

    /// Finish as encoded bytes
    pub fn build(self) -> Vec<u8> {
        self.stream().build()
    }
}
