use std::collections::BTreeMap;

use super::{KvStore, ScanIter, WriteBatch};
use crate::error::StoreError;

/// In-memory ordered store.
///
/// A plain `BTreeMap` gives byte-ordered keys for free, which is all the
/// prefix scan contract asks for. Writes never fail.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Ordered prefix range over any byte-keyed `BTreeMap`.
///
/// Shared with the durable store, whose index is the same map.
pub(crate) fn prefix_range<'a>(map: &'a BTreeMap<Vec<u8>, Vec<u8>>, prefix: &[u8]) -> ScanIter<'a> {
	let prefix = prefix.to_vec();
	Box::new(
		map.range(prefix.clone()..)
			.take_while(move |(key, _)| key.starts_with(&prefix))
			.map(|(key, value)| (key.clone(), value.clone())),
	)
}

impl KvStore for MemoryStore {
	fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
		Ok(self.entries.get(key).cloned())
	}

	fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
		self.entries.insert(key.to_vec(), value.to_vec());
		Ok(())
	}

	fn write_batch(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
		self.entries.extend(batch);
		Ok(())
	}

	fn scan<'a>(&'a self, prefix: &[u8]) -> Result<ScanIter<'a>, StoreError> {
		Ok(prefix_range(&self.entries, prefix))
	}
}
