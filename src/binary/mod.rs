//! Block store file format.
//!
//! A store holds fixed-shape records (a composite key and a composite value
//! of primitive fields) sorted by key and packed into 4KB blocks. Each block
//! stores only the bytes of every field that vary within the block.
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! |   BLOCK COUNT    |  4 bytes, big-endian i32
//! +------------------+
//! |  BLOCK METADATA  |  count x (4 + 2*K + 2*V): records, min/max key, min/max value
//! +------------------+
//! |     PADDING      |  up to the next 4096-byte boundary
//! +------------------+
//! |     BLOCK 0      |  4096 bytes
//! +------------------+
//! |       ...        |
//! +------------------+
//! ```
//!
//! `K` and `V` are the uncompressed key and value widths.

mod block;
mod format;
mod reader;
pub mod writer;


pub use block::{decode_block, BlockCursor, BlockLayout};
pub use format::*;
pub use reader::{BlockRange, BlockStoreReader, Entry, VerifyReport};
pub use writer::BlockStoreWriter;
