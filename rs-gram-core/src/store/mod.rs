//! Ordered key-value storage consumed by the model.
//!
//! The model only needs four things from a store: point reads, single
//! writes, atomic multi-key writes and ordered prefix scans. Anything that
//! provides them can back a model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Durable, log-structured store.
pub mod logfile;

/// Ephemeral `BTreeMap` store.
pub mod memory;

pub use self::logfile::LogStore;
pub use self::memory::MemoryStore;

/// Lazy iterator over `(key, value)` pairs returned by a prefix scan.
pub type ScanIter<'a> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

/// Narrow contract for an ordered byte-key store.
///
/// # Invariants
/// - `scan(prefix)` yields every key starting with `prefix`, and only those,
///   sorted ascending by byte value.
/// - `write_batch` applies all of its puts or none of them.
pub trait KvStore {
	/// Returns the value stored under `key`, if any.
	fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

	/// Stores a single value.
	fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

	/// Applies every put of `batch` atomically.
	fn write_batch(&mut self, batch: WriteBatch) -> Result<(), StoreError>;

	/// Ordered scan of all entries whose key starts with `prefix`.
	fn scan<'a>(&'a self, prefix: &[u8]) -> Result<ScanIter<'a>, StoreError>;
}

impl<T: KvStore + ?Sized> KvStore for Box<T> {
	fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
		(**self).get(key)
	}

	fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
		(**self).put(key, value)
	}

	fn write_batch(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
		(**self).write_batch(batch)
	}

	fn scan<'a>(&'a self, prefix: &[u8]) -> Result<ScanIter<'a>, StoreError> {
		(**self).scan(prefix)
	}
}

/// Staged list of puts applied as one atomic unit.
///
/// Puts are kept in insertion order; a later put to the same key wins.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
	puts: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
	/// Creates an empty batch.
	pub fn new() -> Self {
		Self::default()
	}

	/// Stages a put.
	pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
		self.puts.push((key.into(), value.into()));
	}

	/// Number of staged puts.
	pub fn len(&self) -> usize {
		self.puts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.puts.is_empty()
	}

	/// Iterates over the staged puts in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
		self.puts.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
	}
}

impl IntoIterator for WriteBatch {
	type Item = (Vec<u8>, Vec<u8>);
	type IntoIter = std::vec::IntoIter<(Vec<u8>, Vec<u8>)>;

	fn into_iter(self) -> Self::IntoIter {
		self.puts.into_iter()
	}
}

/// Selects which store adapter backs a model.
///
/// # Variants
/// - `Memory`: nothing survives the process.
/// - `Log { path, sync }`: append-only file at `path`; when `sync` is set,
///   every batch is flushed to disk before the write returns.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub enum StoreConfig {
	#[default]
	Memory,
	Log { path: PathBuf, sync: bool },
}

impl StoreConfig {
	/// Opens the configured store.
	///
	/// # Errors
	/// Returns a `StoreError` if the durable log cannot be opened or replayed.
	pub fn open(&self) -> Result<Box<dyn KvStore>, StoreError> {
		match self {
			StoreConfig::Memory => Ok(Box::new(MemoryStore::new())),
			StoreConfig::Log { path, sync } => Ok(Box::new(LogStore::open(path, *sync)?)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn later_put_in_batch_wins() {
		let mut store = MemoryStore::new();
		let mut batch = WriteBatch::new();
		batch.put(b"k".to_vec(), b"1".to_vec());
		batch.put(b"k".to_vec(), b"2".to_vec());
		assert_eq!(2, batch.len());

		store.write_batch(batch).unwrap();
		assert_eq!(Some(b"2".to_vec()), store.get(b"k").unwrap());
	}

	#[test]
	fn memory_config_opens_boxed_store() {
		let mut store = StoreConfig::Memory.open().unwrap();
		store.put(b"a", b"1").unwrap();
		let keys: Vec<Vec<u8>> = store.scan(b"").unwrap().map(|(k, _)| k).collect();
		assert_eq!(vec![b"a".to_vec()], keys);
	}
}
