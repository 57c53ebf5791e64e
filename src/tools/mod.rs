//! Machinery shared by the coders

pub mod bitio;
pub mod huff_tree;
