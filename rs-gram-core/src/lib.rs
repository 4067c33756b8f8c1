//! Token n-gram statistics for text generation.
//!
//! This crate learns token-transition counts from training text and
//! answers the queries needed to synthesize new sequences around a seed:
//! - Multi-order n-gram counting with forward and reverse indexes
//! - Maximum-likelihood probabilities
//! - Count-weighted sampling with an injectable random source
//! - Breadth-first search of every complete sequence reachable from a seed
//!
//! Counts live in any ordered key-value store implementing [`store::KvStore`];
//! an in-memory and a durable log-structured store are provided.
//!
//! ```
//! use rs_gram_core::analysis::WhitespaceAnalyzer;
//! use rs_gram_core::model::{Model, ModelOptions};
//! use rs_gram_core::store::MemoryStore;
//!
//! let mut model = Model::open(WhitespaceAnalyzer::new(), MemoryStore::new(), ModelOptions::default())?;
//! model.train("<S> one two three </S>")?;
//! assert_eq!(1, model.ngram_count(&["one", "two", "three"])?);
//! # Ok::<(), rs_gram_core::error::Error>(())
//! ```

/// Analyzer contract and a whitespace analyzer.
pub mod analysis;

/// Error types shared by stores and the model.
pub mod error;

/// Corpus file helpers.
pub mod io;

/// The n-gram model, its key codec, token registry and searches.
pub mod model;

/// Ordered key-value store contract and adapters.
pub mod store;

pub use error::{Error, Result, StoreError};
