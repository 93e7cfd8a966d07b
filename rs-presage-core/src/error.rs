//! Error types shared by every module of the crate.

/// Errors raised by the prediction engine and its ingestion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PresageError {
	/// Invalid configuration (unknown combination policy, unknown backend, ...).
	#[error("configuration error: {0}")]
	Configuration(String),

	/// A suggestion probability fell outside `[0.0, 1.0]`.
	#[error("probability {value} is outside [0.0, 1.0]")]
	ProbabilityRange {
		/// The rejected value.
		value: f64,
	},

	/// Failure reported by an n-gram store backend.
	#[error("store error: {0}")]
	Store(String),

	/// Character classification was given something other than one character.
	#[error("tokenization error: {0}")]
	Tokenization(String),

	/// A persisted store was written with another normalization policy.
	#[error("store normalization mismatch: stored {stored}, requested {requested}")]
	NormalizationMismatch {
		/// Policy recorded in the store file.
		stored: String,
		/// Policy the caller asked for.
		requested: String,
	},

	/// I/O error.
	#[error(transparent)]
	Io(#[from] std::io::Error),

	/// Store snapshot (de)serialization error.
	#[error(transparent)]
	Serialization(#[from] postcard::Error),

	/// Configuration file parse error.
	#[error(transparent)]
	ConfigParse(#[from] toml::de::Error),
}

impl PresageError {
	/// Shorthand for a [`PresageError::Store`] error.
	pub fn store<S: Into<String>>(message: S) -> Self {
		Self::Store(message.into())
	}

	/// Shorthand for a [`PresageError::Configuration`] error.
	pub fn config<S: Into<String>>(message: S) -> Self {
		Self::Configuration(message.into())
	}
}

/// Result type for rs-presage operations.
pub type PresageResult<T> = Result<T, PresageError>;
