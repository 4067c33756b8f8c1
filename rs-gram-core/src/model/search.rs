use std::collections::VecDeque;

use log::warn;

use super::codec::{self, Direction, TokenId};
use super::ngram_model::continuations;
use super::options::ModelOptions;
use super::registry::TokenRegistry;
use crate::error::{Error, Result};
use crate::store::KvStore;

/// Why a search stopped before exploring every branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TruncationReason {
	/// A level would have held more than `max_frontier` branches.
	Frontier,
	/// Branches were still open after appending `max_depth` tokens.
	Depth,
}

/// Progress of a [`Search`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStatus {
	/// More results may follow.
	Running,
	/// Every reachable sequence has been found.
	Exhausted,
	/// Exploration hit a limit; results found so far are still yielded.
	Truncated(TruncationReason),
}

/// Everything a search produced, gathered by [`Search::collect_all`].
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResults {
	pub sequences: Vec<Vec<String>>,
	pub truncated: Option<TruncationReason>,
}

/// Lazy breadth-first enumeration of complete token sequences.
///
/// Starting from a seed, every branch is extended by each distinct token
/// observed after (or, in reverse, before) its outer `order - 1` tokens, one
/// level at a time. A branch completes when the token just added is the
/// terminal token, and is yielded in natural order. Dead ends vanish.
///
/// Levels are explored completely before the next one starts, so a
/// shorter completion is always yielded before a longer one. Dropping the
/// iterator at any point stops the search; nothing needs cleaning up.
///
/// # Invariants
/// - `frontier` holds branches of `depth` appended tokens, `next_level`
///   branches of `depth + 1`
/// - `next_level` never holds more than `max_frontier` branches
pub struct Search<'a> {
	store: &'a dyn KvStore,
	tokens: &'a TokenRegistry,
	direction: Direction,
	order: usize,
	max_frontier: usize,
	max_depth: usize,

	/// Seed as given, in natural order.
	seed: Vec<String>,
	/// Ids of the seed end being extended, in natural order.
	base: Vec<TokenId>,
	terminal: TokenId,

	/// Ids appended to the seed, nearest first.
	frontier: VecDeque<Vec<TokenId>>,
	next_level: Vec<Vec<TokenId>>,
	found: VecDeque<Vec<TokenId>>,
	depth: usize,
	status: SearchStatus,
}

impl<'a> Search<'a> {
	pub(crate) fn new<T: AsRef<str>>(
		store: &'a dyn KvStore,
		tokens: &'a TokenRegistry,
		options: &ModelOptions,
		direction: Direction,
		seed: &[T],
		terminal: &str,
	) -> Result<Self> {
		let order = options.order();
		let context_len = order - 1;
		if seed.len() < context_len {
			return Err(Error::SeedTooShort { needed: context_len, got: seed.len() });
		}
		let seed: Vec<String> = seed.iter().map(|t| t.as_ref().to_owned()).collect();

		let mut search = Self {
			store,
			tokens,
			direction,
			order,
			max_frontier: options.max_frontier(),
			max_depth: options.max_depth(),
			seed,
			base: Vec::new(),
			terminal: 0,
			frontier: VecDeque::new(),
			next_level: Vec::new(),
			found: VecDeque::new(),
			depth: 0,
			status: SearchStatus::Running,
		};

		let outer = match direction {
			Direction::Forward => search.seed.last(),
			Direction::Reverse => search.seed.first(),
		};
		if outer.map(String::as_str) == Some(terminal) {
			// Already complete.
			search.found.push_back(Vec::new());
			search.status = SearchStatus::Exhausted;
			return Ok(search);
		}

		let edge = match direction {
			Direction::Forward => &search.seed[search.seed.len() - context_len..],
			Direction::Reverse => &search.seed[..context_len],
		};
		let base: Option<Vec<TokenId>> = edge.iter().map(|t| tokens.lookup(t)).collect();
		match (base, tokens.lookup(terminal)) {
			(Some(base), Some(terminal)) => {
				search.base = base;
				search.terminal = terminal;
				search.frontier.push_back(Vec::new());
			}
			// An unknown token can't be part of any trained n-gram.
			_ => search.status = SearchStatus::Exhausted,
		}
		Ok(search)
	}

	/// Current progress.
	pub fn status(&self) -> SearchStatus {
		self.status
	}

	/// True once a limit cut the search short.
	pub fn is_truncated(&self) -> bool {
		matches!(self.status, SearchStatus::Truncated(_))
	}

	/// Drains the search.
	///
	/// # Errors
	/// Returns the first store or decode error met while searching.
	pub fn collect_all(mut self) -> Result<SearchResults> {
		let mut sequences = Vec::new();
		for sequence in self.by_ref() {
			sequences.push(sequence?);
		}
		let truncated = match self.status {
			SearchStatus::Truncated(reason) => Some(reason),
			_ => None,
		};
		Ok(SearchResults { sequences, truncated })
	}

	/// Expands one branch of the current level, or moves to the next level.
	fn step(&mut self) -> Result<()> {
		let Some(branch) = self.frontier.pop_front() else {
			if self.next_level.is_empty() {
				self.status = SearchStatus::Exhausted;
			} else if self.depth + 1 >= self.max_depth {
				self.truncate(TruncationReason::Depth);
			} else {
				self.depth += 1;
				self.frontier = std::mem::take(&mut self.next_level).into();
			}
			return Ok(());
		};

		let prefix = codec::encode_prefix(self.order, self.direction, &self.context(&branch));
		for (id, _) in continuations(self.store, &prefix)? {
			let mut extended = Vec::with_capacity(branch.len() + 1);
			extended.extend_from_slice(&branch);
			extended.push(id);

			if id == self.terminal {
				self.found.push_back(extended);
			} else if self.next_level.len() >= self.max_frontier {
				self.truncate(TruncationReason::Frontier);
				return Ok(());
			} else {
				self.next_level.push(extended);
			}
		}
		Ok(())
	}

	/// The `order - 1` tokens at the growing end of `branch`, in natural order.
	fn context(&self, branch: &[TokenId]) -> Vec<TokenId> {
		let len = self.order - 1;
		let mut context = Vec::with_capacity(len);
		let from_branch = branch.len().min(len);
		let from_base = len - from_branch;
		let nearest = &branch[branch.len() - from_branch..];

		match self.direction {
			Direction::Forward => {
				context.extend_from_slice(&self.base[self.base.len() - from_base..]);
				context.extend_from_slice(nearest);
			}
			Direction::Reverse => {
				context.extend(nearest.iter().rev());
				context.extend_from_slice(&self.base[..from_base]);
			}
		}
		context
	}

	fn truncate(&mut self, reason: TruncationReason) {
		warn!(
			"{:?} search truncated by {:?} limit at depth {} ({} results pending)",
			self.direction,
			reason,
			self.depth,
			self.found.len()
		);
		self.frontier.clear();
		self.next_level.clear();
		self.status = SearchStatus::Truncated(reason);
	}

	/// Seed plus appended ids as tokens, in natural order.
	fn materialize(&self, branch: &[TokenId]) -> Result<Vec<String>> {
		let mut appended = Vec::with_capacity(branch.len());
		for id in branch {
			let token = self
				.tokens
				.token(*id)
				.ok_or_else(|| Error::InvalidValue(format!("count references unregistered token id {}", id)))?;
			appended.push(token.to_owned());
		}

		Ok(match self.direction {
			Direction::Forward => self.seed.iter().cloned().chain(appended).collect(),
			Direction::Reverse => appended.into_iter().rev().chain(self.seed.iter().cloned()).collect(),
		})
	}
}

impl Iterator for Search<'_> {
	type Item = Result<Vec<String>>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(branch) = self.found.pop_front() {
				return Some(self.materialize(&branch));
			}
			if self.status != SearchStatus::Running {
				return None;
			}
			if let Err(e) = self.step() {
				self.status = SearchStatus::Exhausted;
				return Some(Err(e));
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::analysis::WhitespaceAnalyzer;
	use crate::model::Model;
	use crate::store::MemoryStore;

	fn words(text: &str) -> Vec<String> {
		text.split_whitespace().map(str::to_owned).collect()
	}

	fn trained(options: ModelOptions, texts: &[&str]) -> Model<MemoryStore, WhitespaceAnalyzer> {
		let mut model = Model::open(WhitespaceAnalyzer::new(), MemoryStore::new(), options).unwrap();
		model.train_many(texts).unwrap();
		model
	}

	const SENTENCES: [&str; 3] = [
		"<S> this is a test sentence </S>",
		"<S> this is a test sentence that continues </S>",
		"<S> this is another test sentence </S>",
	];

	#[test]
	fn search_bfs() {
		let model = trained(ModelOptions::default(), &SENTENCES);
		let results = model.search_bfs(&words("<S> this is"), "</S>").unwrap().collect_all().unwrap();

		// The three trained sentences and one mix of the second and third.
		let mut sequences = results.sequences;
		sequences.sort();
		let mut expected = vec![
			words("<S> this is a test sentence </S>"),
			words("<S> this is a test sentence that continues </S>"),
			words("<S> this is another test sentence </S>"),
			words("<S> this is another test sentence that continues </S>"),
		];
		expected.sort();
		assert_eq!(expected, sequences);
		assert_eq!(None, results.truncated);
	}

	#[test]
	fn search_bfs_yields_shorter_first() {
		let model = trained(ModelOptions::default(), &SENTENCES);
		let lengths: Vec<usize> = model
			.search_bfs(&words("<S> this is"), "</S>")
			.unwrap()
			.map(|r| r.unwrap().len())
			.collect();
		assert_eq!(vec![7, 7, 9, 9], lengths);
	}

	#[test]
	fn search_bfs_reverse() {
		let model = trained(ModelOptions::default(), &SENTENCES);
		let mut search = model.search_bfs_reverse(&words("test sentence </S>"), "<S>").unwrap();

		let mut sequences: Vec<Vec<String>> = search.by_ref().map(|r| r.unwrap()).collect();
		sequences.sort();
		assert_eq!(
			vec![words("<S> this is a test sentence </S>"), words("<S> this is another test sentence </S>")],
			sequences
		);
		assert_eq!(SearchStatus::Exhausted, search.status());
	}

	#[test]
	fn dead_ends_and_unknown_tokens_yield_nothing() {
		let model = trained(ModelOptions::default(), &SENTENCES);

		assert!(model.search_bfs(&words("<S> this is"), "never-seen").unwrap().next().is_none());
		assert!(model.search_bfs(&words("nothing here"), "</S>").unwrap().next().is_none());
		// Known tokens that were never adjacent.
		assert!(model.search_bfs(&words("</S> <S>"), "</S>").unwrap().next().is_none());
	}

	#[test]
	fn seed_must_cover_context() {
		let model = trained(ModelOptions::default(), &SENTENCES);
		let result = model.search_bfs(&words("is"), "</S>");
		assert!(matches!(result, Err(Error::SeedTooShort { needed: 2, got: 1 })));
	}

	#[test]
	fn seed_already_at_terminal() {
		let model = trained(ModelOptions::default(), &SENTENCES);
		let found: Vec<Vec<String>> = model
			.search_bfs(&words("sentence </S>"), "</S>")
			.unwrap()
			.map(|r| r.unwrap())
			.collect();
		assert_eq!(vec![words("sentence </S>")], found);
	}

	#[test]
	fn depth_limit_truncates_cycles() {
		let mut options = ModelOptions::default();
		options.set_max_depth(10).unwrap();
		// "a b a b ..." loops forever without a limit.
		let model = trained(options, &["<S> a b a b a b </S>"]);

		let mut search = model.search_bfs(&words("<S> a"), "</S>").unwrap();
		let found: Vec<Vec<String>> = search.by_ref().map(|r| r.unwrap()).collect();
		assert_eq!(SearchStatus::Truncated(TruncationReason::Depth), search.status());
		assert!(search.is_truncated());

		assert!(found.contains(&words("<S> a b a b </S>")));
		assert!(found.iter().all(|s| s.len() <= 2 + 10));
	}

	#[test]
	fn frontier_limit_truncates_wide_searches() {
		let mut options = ModelOptions::with_order(2).unwrap();
		options.set_max_frontier(2).unwrap();
		let model = trained(options, &["<S> x </S>", "<S> a", "<S> b", "<S> c"]);

		let results = model.search_bfs(&words("<S>"), "</S>").unwrap().collect_all().unwrap();
		assert_eq!(Some(TruncationReason::Frontier), results.truncated);
	}

	#[test]
	fn bigram_search_uses_single_token_context() {
		let model = trained(ModelOptions::with_order(2).unwrap(), &["<S> a b </S>", "<S> c b </S>"]);

		let mut forward: Vec<Vec<String>> = model
			.search_bfs(&words("<S>"), "</S>")
			.unwrap()
			.map(|r| r.unwrap())
			.collect();
		forward.sort();
		assert_eq!(vec![words("<S> a b </S>"), words("<S> c b </S>")], forward);

		let backward: Vec<Vec<String>> = model
			.search_bfs_reverse(&words("a b </S>"), "<S>")
			.unwrap()
			.map(|r| r.unwrap())
			.collect();
		assert_eq!(vec![words("<S> a b </S>")], backward);
	}
}
