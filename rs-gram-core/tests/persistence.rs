use std::fs;

use rand::SeedableRng;
use rand::rngs::StdRng;

use rs_gram_core::analysis::WhitespaceAnalyzer;
use rs_gram_core::model::{Model, ModelOptions};
use rs_gram_core::store::{KvStore, LogStore, MemoryStore, ScanIter, StoreConfig, WriteBatch};
use rs_gram_core::{Error, StoreError};

/// Memory store whose batch writes can be made to fail.
#[derive(Default)]
struct FlakyStore {
	inner: MemoryStore,
	fail_batches: bool,
}

impl KvStore for FlakyStore {
	fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
		self.inner.get(key)
	}

	fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
		self.inner.put(key, value)
	}

	fn write_batch(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
		if self.fail_batches {
			return Err(StoreError::Io(std::io::Error::other("disk full")));
		}
		self.inner.write_batch(batch)
	}

	fn scan<'a>(&'a self, prefix: &[u8]) -> Result<ScanIter<'a>, StoreError> {
		self.inner.scan(prefix)
	}
}

#[test]
fn durable_store_survives_reopen() {
	let dir = tempfile::tempdir().unwrap();
	let config = StoreConfig::Log { path: dir.path().join("model.log"), sync: true };

	{
		let store = config.open().unwrap();
		let mut model = Model::open(WhitespaceAnalyzer::new(), store, ModelOptions::default()).unwrap();
		model.train("<S> one two three </S>").unwrap();
		model.train("<S> one two four </S>").unwrap();
	}

	let store = config.open().unwrap();
	let mut model = Model::open(WhitespaceAnalyzer::new(), store, ModelOptions::default()).unwrap();
	assert_eq!(2, model.ngram_count(&["<S>", "one", "two"]).unwrap());
	assert_eq!(Some(0.5), model.prob("three", &["one", "two"]).unwrap());

	// New tokens continue after the reloaded ids.
	let before = model.vocabulary_size();
	model.train("<S> one two five </S>").unwrap();
	assert_eq!(before + 1, model.vocabulary_size());
	assert_eq!(1, model.ngram_count(&["two", "five", "</S>"]).unwrap());
}

#[test]
fn failed_batch_leaves_no_trace() {
	let mut model = Model::open(WhitespaceAnalyzer::new(), FlakyStore::default(), ModelOptions::default()).unwrap();
	model.train("one two three").unwrap();

	model.store_mut().fail_batches = true;
	let result = model.train("one two brand-new");
	assert!(matches!(result, Err(Error::Storage(StoreError::Io(_)))));

	// Neither the count nor the id of the failed text is visible.
	assert_eq!(3, model.vocabulary_size());
	assert_eq!(None, model.tokens().lookup("brand-new"));
	assert_eq!(1, model.ngram_count(&["one", "two"]).unwrap());

	// A retry after recovery counts the text exactly once.
	model.store_mut().fail_batches = false;
	model.train("one two brand-new").unwrap();
	assert_eq!(2, model.ngram_count(&["one", "two"]).unwrap());
	assert_eq!(1, model.ngram_count(&["one", "two", "brand-new"]).unwrap());

	let reopened = Model::open(WhitespaceAnalyzer::new(), model.into_store(), ModelOptions::default()).unwrap();
	assert_eq!(Some(3), reopened.tokens().lookup("brand-new"));
}

#[test]
fn train_file_trains_each_line() {
	let dir = tempfile::tempdir().unwrap();
	let corpus = dir.path().join("corpus.txt");
	fs::write(&corpus, "<S> the cat sat </S>\n\n<S> the cat ran </S>\n").unwrap();

	let mut model = Model::open(WhitespaceAnalyzer::new(), MemoryStore::new(), ModelOptions::default()).unwrap();
	assert_eq!(2, model.train_file(&corpus).unwrap());
	assert_eq!(2, model.ngram_count(&["<S>", "the", "cat"]).unwrap());
	// Lines are separate texts: no n-gram spans the line break.
	assert_eq!(0, model.ngram_count(&["</S>", "<S>"]).unwrap());

	assert!(matches!(model.train_file(dir.path().join("missing.txt")), Err(Error::Io(_))));
}

#[test]
fn generate_around_a_seed_word() {
	let mut model = Model::open(WhitespaceAnalyzer::new(), MemoryStore::new(), ModelOptions::default()).unwrap();
	model
		.train_many([
			"<S> the cat sat on the mat </S>",
			"<S> the dog sat on the rug </S>",
			"<S> a cat ran </S>",
		])
		.unwrap();

	let mut rng = StdRng::seed_from_u64(3);
	let context = model.choose_random_context("sat", &mut rng).unwrap().unwrap();
	assert_eq!(3, context.len());
	assert_eq!("sat", context[2]);

	let forward = model.search_bfs(&context, "</S>").unwrap().collect_all().unwrap();
	assert!(!forward.sequences.is_empty());
	for sequence in &forward.sequences {
		assert_eq!(Some(&"</S>".to_owned()), sequence.last());
		assert!(sequence.starts_with(&context));
	}

	let backward = model.search_bfs_reverse(&context[..2], "<S>").unwrap().collect_all().unwrap();
	assert!(backward.sequences.iter().all(|s| s[0] == "<S>" && s.ends_with(&context[..2])));
}

#[test]
fn log_store_compaction_keeps_model() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("model.log");

	let store = LogStore::open(&path, false).unwrap();
	let mut model = Model::open(WhitespaceAnalyzer::new(), store, ModelOptions::with_order(2).unwrap()).unwrap();
	for _ in 0..5 {
		model.train("<S> hello world </S>").unwrap();
	}
	model.store_mut().compact().unwrap();
	drop(model);

	let store = LogStore::open(&path, false).unwrap();
	let model = Model::open(WhitespaceAnalyzer::new(), store, ModelOptions::with_order(2).unwrap()).unwrap();
	assert_eq!(5, model.ngram_count(&["hello", "world"]).unwrap());
	assert_eq!(&[2, 1], model.orders());
}
