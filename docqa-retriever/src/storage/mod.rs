//! Persistence for built indices.
//!
//! A space's index lives in two sibling files: a binary vector table and a JSON
//! chunk list. [`index_store::IndexStore`] writes and reads them as one unit.

pub mod index_store;

pub use index_store::{ArtifactInfo, IndexArtifact, IndexStore};
