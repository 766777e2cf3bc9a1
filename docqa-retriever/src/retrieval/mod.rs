//! Segment, embed, index and search.
//!
//! ```text
//! corpus ─ Segmenter ─ Embedder ─ FlatIndex ─ IndexStore
//!                                     │
//! query ── LanguageRouter ── LanguageSpace ── RetrievalPipeline::get_relevant_context
//! ```

pub mod pipeline;
pub mod router;
pub mod vector_index;

pub use pipeline::{BuildOutcome, DEFAULT_TOP_K, RetrievalPipeline, ScoredChunk};
pub use router::{LanguageRouter, LanguageSpace, Route, Script, detect_script};
pub use vector_index::{FlatIndex, Neighbor};
