use std::env;
use std::path::PathBuf;

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use rs_gram_core::analysis::{LowercaseNormalizer, WhitespaceAnalyzer};
use rs_gram_core::io::list_files;
use rs_gram_core::model::{Model, ModelOptions};
use rs_gram_core::store::StoreConfig;

/// Sentences trained when no corpus is given.
const DEFAULT_CORPUS: [&str; 4] = [
	"<S> the cat sat on the mat </S>",
	"<S> the dog sat on the rug </S>",
	"<S> the cat chased the dog </S>",
	"<S> a dog slept on the mat </S>",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();

	// Usage: rs-gram-exemple [corpus file or folder of .txt files] [store log file]
	let mut args = env::args().skip(1);
	let corpus = args.next().map(PathBuf::from);
	let store = match args.next() {
		Some(path) => StoreConfig::Log { path: PathBuf::from(path), sync: false },
		None => StoreConfig::Memory,
	};

	// Lowercase every token before counting
	let mut analyzer = WhitespaceAnalyzer::new();
	analyzer.add_token_normalizer(LowercaseNormalizer);

	// Trigrams, bigrams and unigrams, with a tighter search ceiling than the default
	let mut options = ModelOptions::with_order(3)?;
	options.set_max_frontier(1_000)?;
	options.set_max_depth(32)?;

	let mut model = Model::open(analyzer, store.open()?, options)?;

	// Train from a file, from every .txt of a folder, or from the built-in sentences.
	// Each line is one text and should carry its own <S> and </S> markers.
	match corpus {
		Some(path) if path.is_dir() => {
			for file in list_files(&path, "txt")? {
				model.train_file(path.join(file))?;
			}
		}
		Some(path) => {
			model.train_file(&path)?;
		}
		None => model.train_many(DEFAULT_CORPUS)?,
	}
	info!("vocabulary: {} tokens", model.vocabulary_size());

	// A fixed seed gives the same output on every run
	let mut rng = StdRng::seed_from_u64(2024);

	for word in ["sat", "dog", "mat"] {
		let Some(context) = model.choose_random_context(word, &mut rng)? else {
			println!("No data for '{}'", word);
			continue;
		};
		println!("Context for '{}': {}", word, context.join(" "));

		let next = model.choose_random_word(&context[1..], &mut rng)?;
		println!("  next word: {}", next.as_deref().unwrap_or("<none>"));

		let prob = model.prob(&context[2], &context[..2])?;
		println!("  P({} | {} {}) = {:?}", context[2], context[0], context[1], prob);

		// Sentences ending from the context, then beginnings leading into it
		let forward = model.search_bfs(&context, "</S>")?.collect_all()?;
		let backward = model.search_bfs_reverse(&context, "<S>")?.collect_all()?;
		for (i, sentence) in forward.sequences.iter().take(5).enumerate() {
			println!("  ending {}: {}", i + 1, sentence.join(" "));
		}
		for (i, sentence) in backward.sequences.iter().take(5).enumerate() {
			println!("  beginning {}: {}", i + 1, sentence.join(" "));
		}
		if forward.truncated.is_some() || backward.truncated.is_some() {
			println!("  (search truncated)");
		}
	}

	Ok(())
}
