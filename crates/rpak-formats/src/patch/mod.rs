//! Patch edit streams
//!
//! A patch container does not store the pages it changes in full. Its edit
//! stream rewrites the concatenated bodies of its source containers (the base
//! container and earlier patches) into the patched pages.
//!
//! # Command Format
//!
//! ```text
//! Edit stream:
//! └── Commands, one opcode byte each
//!     ├── 0 copy      u32 n            copy n source bytes
//!     ├── 1 skip      u32 n            skip n source bytes
//!     ├── 2 insert    u32 n, n bytes   emit n literal bytes
//!     ├── 3 replace   u32 n, n bytes   emit n literal bytes, skip n source bytes
//!     ├── 4           1 byte           replace 1 source byte, copy 2
//!     ├── 5           1 byte           replace 1 source byte, copy 6
//!     └── 6           2 bytes          replace 2 source bytes, copy 4
//! ```
//!
//! # Usage Examples
//!
//! ```rust
//! use rpak_formats::patch::{EditStream, EditStreamBuilder, EditStreamPatcher};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let encoded = EditStreamBuilder::new().copy(3).replace(b"!").build();
//! let stream = EditStream::parse(&encoded)?;
//!
//! let mut patcher = EditStreamPatcher::new(&stream);
//! patcher.feed(b"ab");
//! patcher.feed(b"cd");
//! assert_eq!(patcher.finish(4)?, b"abc!");
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;
mod patcher;
mod stream;

pub use builder::EditStreamBuilder;
pub use error::{PatchError, PatchResult};
pub use patcher::{EditStreamPatcher, apply_edit_stream};
pub use stream::{
    EditOp, EditStream, OP_COPY, OP_INSERT, OP_REPLACE, OP_REPLACE_1_COPY_2, OP_REPLACE_1_COPY_6,
    OP_REPLACE_2_COPY_4, OP_SKIP,
};
