//! Top-level module for the token n-gram model.
//!
//! This module provides:
//! - The byte-key layout of n-gram counts (`codec`)
//! - Token to id mapping persisted beside the counts (`registry`)
//! - Model configuration (`ModelOptions`)
//! - Training and querying (`Model`)
//! - Lazy breadth-first sequence searches (`Search`)

/// Sortable byte keys for n-gram counts and registry entries.
///
/// Keys group n-grams by order and direction, then order them by token
/// id sequence, so every context lookup is a single prefix scan.
pub mod codec;

/// Token registry: stable, compact ids for token strings.
pub mod registry;

/// Model configuration: n-gram order and search limits.
pub mod options;

/// The n-gram model: training, counts, probabilities and sampling.
pub mod ngram_model;

/// Breadth-first enumeration of complete sequences.
pub mod search;

/// Count-weighted random choice.
///
/// Not exposed
mod choice;

pub use codec::{Direction, TokenId};
pub use ngram_model::{Model, ngrams};
pub use options::ModelOptions;
pub use registry::TokenRegistry;
pub use search::{Search, SearchResults, SearchStatus, TruncationReason};
