use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default maximum n-gram order (trigrams, bigrams and unigrams).
pub const DEFAULT_ORDER: usize = 3;

/// Default ceiling on the branches held by one search level.
pub const DEFAULT_MAX_FRONTIER: usize = 10_000;

/// Default ceiling on tokens appended to a search seed.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Configuration of a [`Model`](super::Model).
///
/// # Responsibilities
/// - Track the maximum n-gram order (`order`); every order from it down to 1
///   is trained and queryable
/// - Bound breadth-first searches (`max_frontier`, `max_depth`)
///
/// # Invariants
/// - `order` is in `1..=255` (the key codec stores it in one byte)
/// - `max_frontier` and `max_depth` are at least 1
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelOptions {
	/// Maximum n-gram order.
	order: usize,

	/// Most in-progress branches a single search level may hold.
	max_frontier: usize,

	/// Most tokens a search may append beyond its seed.
	max_depth: usize,
}

impl Default for ModelOptions {
	fn default() -> Self {
		Self { order: DEFAULT_ORDER, max_frontier: DEFAULT_MAX_FRONTIER, max_depth: DEFAULT_MAX_DEPTH }
	}
}

impl ModelOptions {
	/// Options with maximum order `order` and default search limits.
	///
	/// # Errors
	/// Returns an error if `order` is outside `1..=255`.
	pub fn with_order(order: usize) -> Result<Self> {
		let mut options = Self::default();
		options.set_order(order)?;
		Ok(options)
	}

	/// Returns the maximum n-gram order.
	pub fn order(&self) -> usize {
		self.order
	}

	/// Every maintained order, highest first: `(n, n-1, ..., 1)`.
	pub fn orders(&self) -> Vec<usize> {
		(1..=self.order).rev().collect()
	}

	pub fn max_frontier(&self) -> usize {
		self.max_frontier
	}

	pub fn max_depth(&self) -> usize {
		self.max_depth
	}

	/// Sets the maximum n-gram order.
	///
	/// # Errors
	/// Returns an error if `order` is outside `1..=255`.
	pub fn set_order(&mut self, order: usize) -> Result<()> {
		if !(1..=u8::MAX as usize).contains(&order) {
			return Err(Error::InvalidOption(format!("order must be between 1 and 255, got {}", order)));
		}
		self.order = order;
		Ok(())
	}

	/// Sets the per-level branch ceiling of searches.
	///
	/// # Errors
	/// Returns an error if `max_frontier` is 0.
	pub fn set_max_frontier(&mut self, max_frontier: usize) -> Result<()> {
		if max_frontier == 0 {
			return Err(Error::InvalidOption("max_frontier must be at least 1".to_owned()));
		}
		self.max_frontier = max_frontier;
		Ok(())
	}

	/// Sets the depth ceiling of searches.
	///
	/// # Errors
	/// Returns an error if `max_depth` is 0.
	pub fn set_max_depth(&mut self, max_depth: usize) -> Result<()> {
		if max_depth == 0 {
			return Err(Error::InvalidOption("max_depth must be at least 1".to_owned()));
		}
		self.max_depth = max_depth;
		Ok(())
	}
}
