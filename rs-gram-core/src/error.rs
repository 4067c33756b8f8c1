use thiserror::Error;

/// Failures raised by a key-value store adapter.
///
/// These are never retried by the model: whether a write can be replayed
/// safely depends on the durability model of the store itself.
#[derive(Error, Debug)]
pub enum StoreError {
	#[error("store I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("store encoding error: {0}")]
	Encoding(#[from] postcard::Error),

	#[error("corrupt store log at byte {offset}: {reason}")]
	Corrupt { offset: u64, reason: String },
}

/// Error types for model operations.
#[derive(Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Storage(#[from] StoreError),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid option: {0}")]
	InvalidOption(String),

	#[error("invalid key: {0}")]
	InvalidKey(String),

	#[error("invalid stored value: {0}")]
	InvalidValue(String),

	#[error("token vocabulary is full")]
	VocabularyFull,

	#[error("store was built with order {stored}, model requested order {requested}")]
	OrderMismatch { stored: usize, requested: usize },

	#[error("an n-gram needs at least one token")]
	EmptyNgram,

	#[error("context must hold {expected} tokens, got {got}")]
	ContextLength { expected: usize, got: usize },

	#[error("search seed needs at least {needed} tokens, got {got}")]
	SeedTooShort { needed: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
