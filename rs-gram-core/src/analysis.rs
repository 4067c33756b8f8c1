/// Turns raw text into the tokens a model counts.
///
/// The model counts exactly the strings an analyzer returns; any
/// normalization belongs here.
pub trait Analyzer {
	fn tokens(&self, text: &str) -> Vec<String>;
}

/// Rewrites a single token before it is counted.
pub trait TokenNormalizer {
	fn normalize(&self, token: &str) -> String;
}

/// Lowercases tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct LowercaseNormalizer;

impl TokenNormalizer for LowercaseNormalizer {
	fn normalize(&self, token: &str) -> String {
		token.to_lowercase()
	}
}

/// Splits on Unicode whitespace, then runs every registered normalizer
/// on each token, in registration order.
#[derive(Default)]
pub struct WhitespaceAnalyzer {
	normalizers: Vec<Box<dyn TokenNormalizer + Send + Sync>>,
}

impl WhitespaceAnalyzer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a normalizer to the chain.
	pub fn add_token_normalizer<N>(&mut self, normalizer: N)
	where
		N: TokenNormalizer + Send + Sync + 'static,
	{
		self.normalizers.push(Box::new(normalizer));
	}
}

impl Analyzer for WhitespaceAnalyzer {
	fn tokens(&self, text: &str) -> Vec<String> {
		text.split_whitespace()
			.map(|token| {
				self.normalizers
					.iter()
					.fold(token.to_owned(), |token, normalizer| normalizer.normalize(&token))
			})
			.collect()
	}
}

impl<A: Analyzer + ?Sized> Analyzer for &A {
	fn tokens(&self, text: &str) -> Vec<String> {
		(**self).tokens(text)
	}
}
