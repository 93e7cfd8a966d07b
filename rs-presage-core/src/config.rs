use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PresageError, PresageResult};
use crate::model::combiner::CombinationPolicy;
use crate::model::predictor::PredictorConfig;
use crate::store::Normalization;
use crate::text::character::CharClasses;
use crate::text::context_tracker::{DEFAULT_HISTORY_SIZE, DEFAULT_SLIDING_WINDOW_SIZE};

/// Top-level engine configuration, read from TOML.
///
/// Every section and field is optional; missing ones take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresageConfig {
	pub store: StoreConfig,
	pub tokenizer: CharClasses,
	pub context: ContextConfig,
	pub activator: ActivatorConfig,
	pub predictors: Vec<PredictorConfig>,
}

/// N-gram store selection and normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
	/// `"memory"` or `"file"`.
	pub backend: String,
	/// Snapshot path of the file backend.
	pub path: PathBuf,
	pub lowercase: bool,
	pub strip_diacritics: bool,
}

/// Per-session context tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
	pub sliding_window_size: usize,
	pub history_size: usize,
	pub lowercase: bool,
}

/// Predictor activation and combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivatorConfig {
	pub combination_policy: String,
	pub size_multiplier: usize,
	/// Extra wait, past the largest predictor time budget, before combining.
	pub join_grace_ms: u64,
}

impl Default for PresageConfig {
	fn default() -> Self {
		Self {
			store: StoreConfig::default(),
			tokenizer: CharClasses::default(),
			context: ContextConfig::default(),
			activator: ActivatorConfig::default(),
			predictors: vec![PredictorConfig::default()],
		}
	}
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self {
			backend: "memory".to_owned(),
			path: PathBuf::from("./data/ngrams.bin"),
			lowercase: true,
			strip_diacritics: false,
		}
	}
}

impl Default for ContextConfig {
	fn default() -> Self {
		Self {
			sliding_window_size: DEFAULT_SLIDING_WINDOW_SIZE,
			history_size: DEFAULT_HISTORY_SIZE,
			lowercase: true,
		}
	}
}

impl Default for ActivatorConfig {
	fn default() -> Self {
		Self {
			combination_policy: "meritocracy".to_owned(),
			size_multiplier: 1,
			join_grace_ms: 50,
		}
	}
}

impl StoreConfig {
	pub fn normalization(&self) -> Normalization {
		Normalization::new(self.lowercase, self.strip_diacritics)
	}
}

impl ActivatorConfig {
	/// # Errors
	/// Returns [`PresageError::Configuration`] for an unknown policy name.
	pub fn policy(&self) -> PresageResult<CombinationPolicy> {
		CombinationPolicy::from_name(&self.combination_policy)
	}
}

impl PresageConfig {
	/// Parses a TOML document and validates it.
	pub fn from_toml_str(contents: &str) -> PresageResult<Self> {
		let config: Self = toml::from_str(contents)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates the TOML file at `path`.
	///
	/// # Errors
	/// I/O, parse and [`PresageError::Configuration`] errors.
	pub fn load<P: AsRef<Path>>(path: P) -> PresageResult<Self> {
		let contents = std::fs::read_to_string(&path)?;
		let config = Self::from_toml_str(&contents)?;
		log::info!("loaded config from {}", path.as_ref().display());
		Ok(config)
	}

	/// Like [`load`](Self::load), but falls back to the defaults when the file
	/// is missing or invalid.
	pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
		let path = path.as_ref();
		if !path.exists() {
			log::debug!("no config file at {}, using defaults", path.display());
			return Self::default();
		}
		match Self::load(path) {
			Ok(config) => config,
			Err(e) => {
				log::warn!("failed to load config at {}: {e}, using defaults", path.display());
				Self::default()
			}
		}
	}

	/// Checks values serde cannot check.
	pub fn validate(&self) -> PresageResult<()> {
		self.activator.policy()?;
		if self.activator.size_multiplier == 0 {
			return Err(PresageError::config("activator.size_multiplier must be >= 1"));
		}
		if !matches!(self.store.backend.as_str(), "memory" | "file") {
			return Err(PresageError::config(format!("unknown store backend {:?}", self.store.backend)));
		}
		if self.context.sliding_window_size == 0 {
			return Err(PresageError::config("context.sliding_window_size must be >= 1"));
		}
		if self.predictors.is_empty() {
			return Err(PresageError::config("at least one predictor must be configured"));
		}
		for predictor in &self.predictors {
			predictor.validate()?;
		}
		Ok(())
	}

	/// Highest n-gram order any predictor queries.
	pub fn max_order(&self) -> usize {
		self.predictors.iter().map(|p| p.order).max().unwrap_or(1)
	}
}
