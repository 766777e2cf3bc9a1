//! # docqa-context
//!
//! Turns extracted document text into the sentence chunks that the docqa
//! retrieval pipeline embeds and indexes.
//!
//! See [`sentence`] for the boundary rules and [`Segmenter`] for the entry point.
pub mod sentence;

pub use sentence::{
    Chunk, DEFAULT_ABBREVIATIONS, PAGE_MARKER_PATTERN, Segmenter, SegmenterConfig,
    collapse_whitespace,
};
