use std::collections::HashMap;

use crate::error::{Error, Result, StoreError};
use crate::model::codec::{self, TOKEN_TAG, TokenId};
use crate::store::{KvStore, WriteBatch};

/// Bidirectional mapping between token strings and compact ids.
///
/// Ids are handed out in first-seen order. Newly allocated ids sit in a
/// pending log until they are staged into the same batch as the counts
/// that reference them.
///
/// # Invariants
/// - `ids` and `tokens` are exact inverses of each other
/// - every id below `next_id` is assigned, none above it is
/// - `pending` holds exactly the ids allocated since the last flush
#[derive(Clone, Debug, Default)]
pub struct TokenRegistry {
	/// Token string to id.
	ids: HashMap<String, TokenId>,
	/// Id to token string, indexed by id.
	tokens: Vec<String>,
	/// Ids allocated since the last flush, in allocation order.
	pending: Vec<TokenId>,
}

impl TokenRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Rebuilds the registry from every persisted entry of `store`.
	///
	/// # Errors
	/// - `Error::Storage` if the scan fails.
	/// - `Error::InvalidValue` if the persisted ids are not a dense,
	///   duplicate-free range starting at zero.
	pub fn load<S: KvStore + ?Sized>(store: &S) -> Result<Self> {
		let mut entries: Vec<(TokenId, String)> = Vec::new();
		for (key, value) in store.scan(&[TOKEN_TAG])? {
			let token = String::from_utf8(key[1..].to_vec())
				.map_err(|e| Error::InvalidKey(format!("registry token is not UTF-8: {}", e)))?;
			entries.push((codec::decode_id(&value)?, token));
		}
		entries.sort_unstable_by_key(|(id, _)| *id);

		let mut registry = Self::new();
		for (expected, (id, token)) in entries.into_iter().enumerate() {
			if id as usize != expected {
				return Err(Error::InvalidValue(format!(
					"registry ids are not dense: found {} where {} was expected",
					id, expected
				)));
			}
			registry.ids.insert(token.clone(), id);
			registry.tokens.push(token);
		}
		Ok(registry)
	}

	/// Returns the id of `token`, allocating the next unused one if needed.
	///
	/// # Errors
	/// Returns `Error::VocabularyFull` once every `TokenId` is taken.
	pub fn get_id(&mut self, token: &str) -> Result<TokenId> {
		if let Some(id) = self.ids.get(token) {
			return Ok(*id);
		}

		let id = TokenId::try_from(self.tokens.len()).map_err(|_| Error::VocabularyFull)?;
		self.ids.insert(token.to_owned(), id);
		self.tokens.push(token.to_owned());
		self.pending.push(id);
		Ok(id)
	}

	/// Looks up an existing id without allocating.
	pub fn lookup(&self, token: &str) -> Option<TokenId> {
		self.ids.get(token).copied()
	}

	/// Returns the token registered under `id`.
	pub fn token(&self, id: TokenId) -> Option<&str> {
		self.tokens.get(id as usize).map(String::as_str)
	}

	/// Number of registered tokens.
	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	/// Number of ids allocated since the last flush.
	pub fn pending_len(&self) -> usize {
		self.pending.len()
	}

	/// Copies the pending entries into `batch` without clearing them.
	///
	/// Follow with [`mark_flushed`](Self::mark_flushed) once the batch is
	/// written, or [`rollback`](Self::rollback) if it failed.
	pub fn stage(&self, batch: &mut WriteBatch) {
		for id in &self.pending {
			let token = &self.tokens[*id as usize];
			batch.put(token_key(token), codec::encode_id(*id).to_vec());
		}
	}

	/// Forgets the pending log after a successful write.
	pub fn mark_flushed(&mut self) {
		self.pending.clear();
	}

	/// Unregisters every pending id, as if they had never been allocated.
	pub fn rollback(&mut self) {
		// Pending ids are always the newest ones, at the end of `tokens`.
		let keep = self.tokens.len() - self.pending.len();
		for token in self.tokens.drain(keep..) {
			self.ids.remove(&token);
		}
		self.pending.clear();
	}

	/// Persists the pending log in its own batch, then clears it.
	pub fn flush<S: KvStore + ?Sized>(&mut self, store: &mut S) -> std::result::Result<(), StoreError> {
		if self.pending.is_empty() {
			return Ok(());
		}
		let mut batch = WriteBatch::new();
		self.stage(&mut batch);
		store.write_batch(batch)?;
		self.mark_flushed();
		Ok(())
	}
}

/// Registry key of `token`: the tag byte followed by the raw UTF-8 bytes.
fn token_key(token: &str) -> Vec<u8> {
	let mut key = Vec::with_capacity(1 + token.len());
	key.push(TOKEN_TAG);
	key.extend_from_slice(token.as_bytes());
	key
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MemoryStore;

	#[test]
	fn get_new_tokens() {
		let mut tokens = TokenRegistry::new();

		// Four new tokens get the first four ids.
		for (expected, token) in "this is a test".split_whitespace().enumerate() {
			assert_eq!(expected as TokenId, tokens.get_id(token).unwrap());
		}

		// Repeating them must not register them again.
		for (expected, token) in "this is a test".split_whitespace().enumerate() {
			assert_eq!(expected as TokenId, tokens.get_id(token).unwrap());
		}
		assert_eq!(4, tokens.len());
		assert_eq!(4, tokens.pending_len());
	}

	#[test]
	fn flush_then_load_restores_mapping() {
		let mut store = MemoryStore::new();
		let mut tokens = TokenRegistry::new();
		for token in ["<S>", "one", "two", "</S>", "one"] {
			tokens.get_id(token).unwrap();
		}
		tokens.flush(&mut store).unwrap();
		assert_eq!(0, tokens.pending_len());

		let mut loaded = TokenRegistry::load(&store).unwrap();
		assert_eq!(4, loaded.len());
		for token in ["<S>", "one", "two", "</S>"] {
			assert_eq!(tokens.lookup(token), loaded.lookup(token));
		}
		assert_eq!(Some("two"), loaded.token(2));

		// New allocations continue after the persisted range.
		assert_eq!(4, loaded.get_id("three").unwrap());
		assert_eq!(1, loaded.pending_len());
	}

	#[test]
	fn rollback_forgets_unflushed_ids() {
		let mut store = MemoryStore::new();
		let mut tokens = TokenRegistry::new();
		tokens.get_id("kept").unwrap();
		tokens.flush(&mut store).unwrap();

		tokens.get_id("dropped").unwrap();
		tokens.rollback();
		assert_eq!(None, tokens.lookup("dropped"));
		assert_eq!(None, tokens.token(1));
		assert_eq!(1, tokens.get_id("other").unwrap());
	}

	#[test]
	fn lookup_does_not_allocate() {
		let tokens = TokenRegistry::new();
		assert_eq!(None, tokens.lookup("missing"));
		assert!(tokens.is_empty());
	}

	#[test]
	fn load_rejects_gaps() {
		let mut store = MemoryStore::new();
		store.put(&token_key("a"), &codec::encode_id(0)).unwrap();
		store.put(&token_key("b"), &codec::encode_id(2)).unwrap();
		assert!(matches!(TokenRegistry::load(&store), Err(Error::InvalidValue(_))));
	}

	#[test]
	fn vocabulary_beyond_one_byte() {
		let mut tokens = TokenRegistry::new();
		for i in 0..1000 {
			assert_eq!(i as TokenId, tokens.get_id(&format!("t{}", i)).unwrap());
		}
		assert_eq!(Some(999), tokens.lookup("t999"));
	}
}
