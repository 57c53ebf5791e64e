//! Huffman compression with the tree stored at the start of the stream.
//!
//! * `huffman` reads and writes the tree description, and compresses or expands data
//! * `tools` holds the bit level I/O and the tree structure itself

pub mod tools;
pub mod huffman;

pub use tools::bitio::{Bit,BitReader,BitWriter};
pub use tools::huff_tree::{HuffTree,CodeTable,Symbol};

type DYNERR = Box<dyn std::error::Error>;

/// Coding Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("tree has {0} end-of-message leaves, expected exactly one")]
    EndMarkerCount(usize),
    #[error("byte {0:#04x} has no code in the tree")]
    SymbolNotInTree(u8)
}
