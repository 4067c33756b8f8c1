use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info};
use rand::Rng;

use super::choice::weighted_choice;
use super::codec::{self, Direction, ID_WIDTH, META_TAG, TokenId};
use super::options::ModelOptions;
use super::registry::TokenRegistry;
use super::search::Search;
use crate::analysis::Analyzer;
use crate::error::{Error, Result};
use crate::io::read_corpus;
use crate::store::{KvStore, ScanIter, WriteBatch};

/// Metadata key holding the maximum order a store was trained with.
const ORDER_KEY: &[u8] = &[META_TAG, b'o', b'r', b'd', b'e', b'r'];

/// Every contiguous window of exactly `order` items, left to right.
///
/// A slice shorter than `order` has no windows.
///
/// # Panics
/// Panics if `order` is 0.
pub fn ngrams<T>(items: &[T], order: usize) -> std::slice::Windows<'_, T> {
	items.windows(order)
}

/// Token n-gram model persisted in an ordered key-value store.
///
/// Every order from `options.order()` down to 1 is counted separately, in
/// a forward index and (for orders of 2 and up) a reverse index, so counts,
/// probabilities, sampling and searches each reduce to one point read or
/// one prefix scan.
///
/// # Responsibilities
/// - Train: tokenize, map tokens to ids, merge n-gram counts atomically
/// - Count and estimate maximum-likelihood probabilities
/// - Sample a next word or a whole context, weighted by counts
/// - Enumerate complete sequences with breadth-first searches
///
/// # Invariants
/// - Every id referenced by a stored count has a persisted registry entry
/// - Queries never allocate ids
pub struct Model<S: KvStore, A: Analyzer> {
	analyzer: A,
	store: S,
	tokens: TokenRegistry,
	options: ModelOptions,
	orders: Vec<usize>,
}

impl<S: KvStore, A: Analyzer> Model<S, A> {
	/// Opens a model over `store`.
	///
	/// On a fresh store the maximum order is recorded; on a trained one the
	/// token registry is reloaded and the recorded order must match.
	///
	/// # Errors
	/// - `Error::OrderMismatch` if the store was trained with another order.
	/// - `Error::Storage` or a decode error if the store cannot be read.
	pub fn open(analyzer: A, mut store: S, options: ModelOptions) -> Result<Self> {
		match store.get(ORDER_KEY)? {
			Some(value) => {
				let stored = codec::decode_count(&value)? as usize;
				if stored != options.order() {
					return Err(Error::OrderMismatch { stored, requested: options.order() });
				}
			}
			None => store.put(ORDER_KEY, &codec::encode_count(options.order() as u64))?,
		}

		let tokens = TokenRegistry::load(&store)?;
		info!("opened model of order {} with {} known tokens", options.order(), tokens.len());

		let orders = options.orders();
		Ok(Self { analyzer, store, tokens, options, orders })
	}

	/// Maintained orders, highest first.
	pub fn orders(&self) -> &[usize] {
		&self.orders
	}

	pub fn options(&self) -> &ModelOptions {
		&self.options
	}

	/// The token registry.
	pub fn tokens(&self) -> &TokenRegistry {
		&self.tokens
	}

	/// Number of distinct tokens ever trained.
	pub fn vocabulary_size(&self) -> usize {
		self.tokens.len()
	}

	pub fn store(&self) -> &S {
		&self.store
	}

	pub fn store_mut(&mut self) -> &mut S {
		&mut self.store
	}

	/// Gives the store back, e.g. to reopen it with another model.
	pub fn into_store(self) -> S {
		self.store
	}

	/// Trains one text as a single atomic transaction.
	///
	/// Either every count update of `text`, together with the ids it
	/// introduced, reaches the store, or none does and the new ids are
	/// forgotten.
	pub fn train(&mut self, text: &str) -> Result<()> {
		let tokens = self.analyzer.tokens(text);
		let result = self.train_tokens(&tokens);
		if result.is_err() {
			self.tokens.rollback();
		}
		result
	}

	/// Trains each text in turn, each as its own transaction.
	///
	/// Stops at the first failure; texts trained before it stay trained.
	pub fn train_many<I, T>(&mut self, texts: I) -> Result<()>
	where
		I: IntoIterator<Item = T>,
		T: AsRef<str>,
	{
		for text in texts {
			self.train(text.as_ref())?;
		}
		Ok(())
	}

	/// Trains every non-blank line of a corpus file as its own text.
	///
	/// Returns the number of lines trained.
	pub fn train_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
		let lines = read_corpus(&path)?;
		self.train_many(&lines)?;
		info!("trained {} lines from {}", lines.len(), path.as_ref().display());
		Ok(lines.len())
	}

	fn train_tokens(&mut self, tokens: &[String]) -> Result<()> {
		let mut ids = Vec::with_capacity(tokens.len());
		for token in tokens {
			ids.push(self.tokens.get_id(token)?);
		}

		// Merge repeated windows first so each key is read and written once.
		let mut increments: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
		for &order in &self.orders {
			for window in ngrams(&ids, order) {
				*increments.entry(codec::encode(order, Direction::Forward, window)).or_insert(0) += 1;
				if order >= 2 {
					*increments.entry(codec::encode(order, Direction::Reverse, window)).or_insert(0) += 1;
				}
			}
		}

		let mut batch = WriteBatch::new();
		self.tokens.stage(&mut batch);
		for (key, increment) in increments {
			let current = match self.store.get(&key)? {
				Some(value) => codec::decode_count(&value)?,
				None => 0,
			};
			batch.put(key, codec::encode_count(current + increment).to_vec());
		}

		let puts = batch.len();
		self.store.write_batch(batch)?;
		self.tokens.mark_flushed();

		debug!("trained {} tokens with {} puts", tokens.len(), puts);
		Ok(())
	}

	/// Stored count of an n-gram; its order is its length.
	///
	/// Unknown tokens and untrained orders count 0.
	///
	/// # Errors
	/// Returns `Error::EmptyNgram` for an empty sequence.
	pub fn ngram_count<T: AsRef<str>>(&self, ngram: &[T]) -> Result<u64> {
		if ngram.is_empty() {
			return Err(Error::EmptyNgram);
		}
		if ngram.len() > u8::MAX as usize {
			return Ok(0);
		}
		match self.lookup_ids(ngram) {
			Some(ids) => self.count_ids(&ids),
			None => Ok(0),
		}
	}

	/// Maximum-likelihood estimate `count(context + [token]) / count(context)`.
	///
	/// An empty context divides by the total number of trained tokens.
	/// Returns `None` when the context was never observed, so the ratio
	/// has no data behind it.
	pub fn prob<T: AsRef<str>>(&self, token: &str, context: &[T]) -> Result<Option<f64>> {
		let context_count = if context.is_empty() {
			self.total_unigrams()?
		} else {
			self.ngram_count(context)?
		};
		if context_count == 0 {
			return Ok(None);
		}

		let mut ngram: Vec<&str> = context.iter().map(|t| t.as_ref()).collect();
		ngram.push(token);
		let count = self.ngram_count(&ngram)?;
		Ok(Some(count as f64 / context_count as f64))
	}

	/// Natural logarithm of [`prob`](Self::prob), with the same `None` case.
	///
	/// A seen context with an unseen continuation gives negative infinity.
	pub fn logprob<T: AsRef<str>>(&self, token: &str, context: &[T]) -> Result<Option<f64>> {
		Ok(self.prob(token, context)?.map(f64::ln))
	}

	/// Samples the token following `context`, weighted by n-gram counts.
	///
	/// The n-gram order used is `context.len() + 1`. Candidates are taken in
	/// key order and exactly one draw is made from `rng`. Returns `None` if
	/// the context was never trained.
	///
	/// # Errors
	/// Returns `Error::ContextLength` if no maintained order fits the context.
	pub fn choose_random_word<T, R>(&self, context: &[T], rng: &mut R) -> Result<Option<String>>
	where
		T: AsRef<str>,
		R: Rng + ?Sized,
	{
		let order = context.len() + 1;
		if !self.orders.contains(&order) {
			return Err(Error::ContextLength { expected: self.options.order() - 1, got: context.len() });
		}
		let Some(ids) = self.lookup_ids(context) else {
			return Ok(None);
		};

		let prefix = codec::encode_prefix(order, Direction::Forward, &ids);
		let candidates = continuations(&self.store, &prefix)?;
		weighted_choice(&candidates, rng)
			.map(|id| self.token_string(*id))
			.transpose()
	}

	/// Samples a top-order n-gram ending with `token`, weighted by counts.
	///
	/// Looked up through the reverse index; the result is in natural order.
	/// Returns `None` if `token` never ended a top-order n-gram.
	pub fn choose_random_context<R: Rng + ?Sized>(&self, token: &str, rng: &mut R) -> Result<Option<Vec<String>>> {
		let Some(id) = self.tokens.lookup(token) else {
			return Ok(None);
		};
		let order = self.options.order();
		// Unigrams have no reverse index; the token is its own context.
		let direction = if order >= 2 { Direction::Reverse } else { Direction::Forward };

		let mut candidates: Vec<(Vec<TokenId>, u64)> = Vec::new();
		for (key, value) in self.store.scan(&codec::encode_prefix(order, direction, &[id]))? {
			candidates.push((codec::decode(&key)?.ids, codec::decode_count(&value)?));
		}

		weighted_choice(&candidates, rng)
			.map(|ids| ids.iter().map(|id| self.token_string(*id)).collect::<Result<Vec<_>>>())
			.transpose()
	}

	/// Breadth-first search for every sequence extending `seed` up to `end_token`.
	///
	/// # Errors
	/// Returns `Error::SeedTooShort` if `seed` holds fewer than `order - 1` tokens.
	pub fn search_bfs<T: AsRef<str>>(&self, seed: &[T], end_token: &str) -> Result<Search<'_>> {
		Search::new(&self.store, &self.tokens, &self.options, Direction::Forward, seed, end_token)
	}

	/// Breadth-first search for every sequence extending `seed` backwards to
	/// `start_token`. Results are in natural order.
	///
	/// # Errors
	/// Returns `Error::SeedTooShort` if `seed` holds fewer than `order - 1` tokens.
	pub fn search_bfs_reverse<T: AsRef<str>>(&self, seed: &[T], start_token: &str) -> Result<Search<'_>> {
		Search::new(&self.store, &self.tokens, &self.options, Direction::Reverse, seed, start_token)
	}

	/// Ordered `(key, value)` pairs of every store entry whose key starts
	/// with `prefix`; with `skip_prefix`, the prefix is cut from each key.
	pub fn prefix_items<'a>(&'a self, prefix: &[u8], skip_prefix: bool) -> Result<ScanIter<'a>> {
		let strip = if skip_prefix { prefix.len() } else { 0 };
		let items = self.store.scan(prefix)?;
		Ok(Box::new(items.map(move |(mut key, value)| {
			key.drain(..strip);
			(key, value)
		})))
	}

	/// Keys of [`prefix_items`](Self::prefix_items).
	pub fn prefix_keys<'a>(&'a self, prefix: &[u8], skip_prefix: bool) -> Result<Box<dyn Iterator<Item = Vec<u8>> + 'a>> {
		Ok(Box::new(self.prefix_items(prefix, skip_prefix)?.map(|(key, _)| key)))
	}

	/// Ids of `tokens`, or `None` if any of them was never trained.
	fn lookup_ids<T: AsRef<str>>(&self, tokens: &[T]) -> Option<Vec<TokenId>> {
		tokens.iter().map(|token| self.tokens.lookup(token.as_ref())).collect()
	}

	fn count_ids(&self, ids: &[TokenId]) -> Result<u64> {
		match self.store.get(&codec::encode(ids.len(), Direction::Forward, ids))? {
			Some(value) => codec::decode_count(&value),
			None => Ok(0),
		}
	}

	/// Total number of trained tokens, i.e. the sum of all unigram counts.
	fn total_unigrams(&self) -> Result<u64> {
		let mut total = 0;
		for (_, value) in self.store.scan(&codec::encode_prefix(1, Direction::Forward, &[]))? {
			total += codec::decode_count(&value)?;
		}
		Ok(total)
	}

	fn token_string(&self, id: TokenId) -> Result<String> {
		self.tokens
			.token(id)
			.map(str::to_owned)
			.ok_or_else(|| Error::InvalidValue(format!("count references unregistered token id {}", id)))
	}
}

/// Tokens completing the n-grams under `prefix`, with their counts, in key order.
///
/// `prefix` must leave exactly one id of every matching key uncovered.
pub(crate) fn continuations<S: KvStore + ?Sized>(store: &S, prefix: &[u8]) -> Result<Vec<(TokenId, u64)>> {
	let mut found = Vec::new();
	for (key, value) in store.scan(prefix)? {
		let rest = &key[prefix.len()..];
		if rest.len() != ID_WIDTH {
			return Err(Error::InvalidKey(format!("expected one trailing id, got {} bytes", rest.len())));
		}
		let ids = codec::decode_ids(rest)?;
		found.push((ids[0], codec::decode_count(&value)?));
	}
	Ok(found)
}
