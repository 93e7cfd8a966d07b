//! N-gram stores: one table of `(token tuple -> count)` per n-gram order.
//!
//! Serving code only ever sees [`NgramReader`], which has no mutating
//! methods. The offline ingestion pipeline drives an [`NgramWriter`].
//!
//! Queries are typed values ([`NgramKey`], [`CompletionQuery`]) handed to the
//! backend as-is; backends never build query text out of raw tokens.

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::StoreConfig;
use crate::error::{PresageError, PresageResult};

/// Single-file embedded backend.
pub mod file;

/// Ingestion entrypoint (bulk load of aggregated n-grams).
pub mod ingest;

/// In-memory backend.
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Token normalization applied to every write and every query predicate.
///
/// Two stores with different normalization are not interchangeable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalization {
	/// Case folding.
	pub lowercase: bool,
	/// Diacritic folding: NFKD decomposition, combining marks dropped.
	pub strip_diacritics: bool,
}

impl Normalization {
	pub fn new(lowercase: bool, strip_diacritics: bool) -> Self {
		Self { lowercase, strip_diacritics }
	}

	pub fn is_identity(&self) -> bool {
		!self.lowercase && !self.strip_diacritics
	}

	/// Normalizes one token.
	pub fn apply(&self, token: &str) -> String {
		let folded = if self.lowercase { token.to_lowercase() } else { token.to_owned() };
		if self.strip_diacritics {
			folded.nfkd().filter(|c| !is_combining_mark(*c)).collect()
		} else {
			folded
		}
	}
}

impl fmt::Display for Normalization {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "lowercase={}, strip_diacritics={}", self.lowercase, self.strip_diacritics)
	}
}

/// Fixed-length ordered tuple of tokens; its length is the table order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NgramKey(Vec<String>);

impl NgramKey {
	pub fn new<I, S>(tokens: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self(tokens.into_iter().map(Into::into).collect())
	}

	pub fn order(&self) -> usize {
		self.0.len()
	}

	pub fn tokens(&self) -> &[String] {
		&self.0
	}

	/// The leading `order - 1` tokens.
	pub fn context(&self) -> &[String] {
		&self.0[..self.0.len().saturating_sub(1)]
	}

	/// The final token.
	pub fn word(&self) -> Option<&str> {
		self.0.last().map(String::as_str)
	}

	pub fn normalized(&self, normalization: Normalization) -> Self {
		if normalization.is_identity() {
			return self.clone();
		}
		Self(self.0.iter().map(|t| normalization.apply(t)).collect())
	}

	pub fn into_tokens(self) -> Vec<String> {
		self.0
	}
}

/// "Complete" query: equality on the leading `order - 1` tokens, prefix match
/// on the final one, ordered by count descending then word ascending.
///
/// ```
/// use rs_presage_core::store::CompletionQuery;
///
/// let query = CompletionQuery::new(["der"]).prefix("links").limit(5);
/// assert_eq!(query.order(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionQuery {
	context: Vec<String>,
	prefix: String,
	limit: Option<usize>,
}

impl CompletionQuery {
	pub fn new<I, S>(context: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { context: context.into_iter().map(Into::into).collect(), prefix: String::new(), limit: None }
	}

	pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
		self.prefix = prefix.into();
		self
	}

	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}

	/// Order of the table this query targets.
	pub fn order(&self) -> usize {
		self.context.len() + 1
	}

	pub fn context(&self) -> &[String] {
		&self.context
	}

	pub fn prefix_str(&self) -> &str {
		&self.prefix
	}

	pub fn limit_value(&self) -> Option<usize> {
		self.limit
	}

	pub fn normalized(&self, normalization: Normalization) -> Self {
		if normalization.is_identity() {
			return self.clone();
		}
		Self {
			context: self.context.iter().map(|t| normalization.apply(t)).collect(),
			prefix: normalization.apply(&self.prefix),
			limit: self.limit,
		}
	}
}

/// How a bulk-load batch treats the rows already in the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
	/// Counts are added to the existing rows.
	#[default]
	Append,
	/// The table content is replaced by the batch on commit.
	Replace,
}

/// Read-only access used at serving time.
pub trait NgramReader: Send + Sync {
	fn normalization(&self) -> Normalization;

	/// Orders for which a table exists, ascending.
	fn orders(&self) -> Vec<usize>;

	fn has_table(&self, order: usize) -> bool {
		self.orders().contains(&order)
	}

	fn has_index(&self, order: usize) -> bool;

	/// Number of committed rows of the table.
	fn row_count(&self, order: usize) -> PresageResult<usize>;

	/// Exact lookup, 0 if absent.
	fn count(&self, key: &NgramKey) -> PresageResult<u64>;

	/// Runs a completion query; see [`CompletionQuery`].
	fn complete(&self, query: &CompletionQuery) -> PresageResult<Vec<(String, u64)>>;
}

/// Mutating access used by the single-writer ingestion pipeline.
///
/// Schema operations are idempotent. Between [`begin_batch`](Self::begin_batch)
/// and [`commit_batch`](Self::commit_batch) upserts for the batch order are
/// staged and invisible to readers; [`rollback_batch`](Self::rollback_batch)
/// discards them.
pub trait NgramWriter: NgramReader {
	fn ensure_table(&mut self, order: usize) -> PresageResult<()>;
	fn drop_table(&mut self, order: usize) -> PresageResult<()>;
	fn ensure_index(&mut self, order: usize) -> PresageResult<()>;
	fn drop_index(&mut self, order: usize) -> PresageResult<()>;

	/// Adds `count` to the key's count, inserting the key if absent.
	fn upsert(&mut self, key: &NgramKey, count: u64) -> PresageResult<()>;

	fn begin_batch(&mut self, order: usize, mode: WriteMode) -> PresageResult<()>;
	fn commit_batch(&mut self) -> PresageResult<()>;
	fn rollback_batch(&mut self) -> PresageResult<()>;
}

/// Backend selected by configuration.
#[derive(Debug)]
pub enum StoreBackend {
	Memory(MemoryStore),
	File(FileStore),
}

/// Opens the backend named in the configuration.
///
/// # Errors
/// - [`PresageError::Configuration`] for an unknown backend selector.
/// - I/O, deserialization or normalization-mismatch errors from the file backend.
pub fn open_store(config: &StoreConfig) -> PresageResult<StoreBackend> {
	let normalization = config.normalization();
	match config.backend.as_str() {
		"memory" => Ok(StoreBackend::Memory(MemoryStore::new(normalization))),
		"file" => Ok(StoreBackend::File(FileStore::open(&config.path, normalization)?)),
		other => Err(PresageError::config(format!("unknown store backend {other:?}"))),
	}
}

macro_rules! delegate {
	($self:ident, $store:ident => $call:expr) => {
		match $self {
			StoreBackend::Memory($store) => $call,
			StoreBackend::File($store) => $call,
		}
	};
}

impl NgramReader for StoreBackend {
	fn normalization(&self) -> Normalization {
		delegate!(self, s => s.normalization())
	}

	fn orders(&self) -> Vec<usize> {
		delegate!(self, s => s.orders())
	}

	fn has_index(&self, order: usize) -> bool {
		delegate!(self, s => s.has_index(order))
	}

	fn row_count(&self, order: usize) -> PresageResult<usize> {
		delegate!(self, s => s.row_count(order))
	}

	fn count(&self, key: &NgramKey) -> PresageResult<u64> {
		delegate!(self, s => s.count(key))
	}

	fn complete(&self, query: &CompletionQuery) -> PresageResult<Vec<(String, u64)>> {
		delegate!(self, s => s.complete(query))
	}
}

impl NgramWriter for StoreBackend {
	fn ensure_table(&mut self, order: usize) -> PresageResult<()> {
		delegate!(self, s => s.ensure_table(order))
	}

	fn drop_table(&mut self, order: usize) -> PresageResult<()> {
		delegate!(self, s => s.drop_table(order))
	}

	fn ensure_index(&mut self, order: usize) -> PresageResult<()> {
		delegate!(self, s => s.ensure_index(order))
	}

	fn drop_index(&mut self, order: usize) -> PresageResult<()> {
		delegate!(self, s => s.drop_index(order))
	}

	fn upsert(&mut self, key: &NgramKey, count: u64) -> PresageResult<()> {
		delegate!(self, s => s.upsert(key, count))
	}

	fn begin_batch(&mut self, order: usize, mode: WriteMode) -> PresageResult<()> {
		delegate!(self, s => s.begin_batch(order, mode))
	}

	fn commit_batch(&mut self) -> PresageResult<()> {
		delegate!(self, s => s.commit_batch())
	}

	fn rollback_batch(&mut self) -> PresageResult<()> {
		delegate!(self, s => s.rollback_batch())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalization() {
		let both = Normalization::new(true, true);
		assert_eq!(both.apply("Grüße"), "gruße");
		assert_eq!(both.apply("Élan"), "elan");
		assert_eq!(Normalization::new(false, true).apply("ﬁancé"), "fiance");
		assert_eq!(Normalization::default().apply("Élan"), "Élan");
	}

	#[test]
	fn test_key_parts() {
		let key = NgramKey::new(["der", "Links", "denker"]);
		assert_eq!(key.order(), 3);
		assert_eq!(key.context(), ["der".to_owned(), "Links".to_owned()]);
		assert_eq!(key.word(), Some("denker"));
		assert_eq!(key.normalized(Normalization::new(true, false)).word(), Some("denker"));
		assert_eq!(key.normalized(Normalization::new(true, false)).context()[1], "links");
	}

	#[test]
	fn test_query_normalized() {
		let query = CompletionQuery::new(["Dér"]).prefix("LÏ").limit(3);
		let normalized = query.normalized(Normalization::new(true, true));
		assert_eq!(normalized.context(), ["der".to_owned()]);
		assert_eq!(normalized.prefix_str(), "li");
		assert_eq!(normalized.limit_value(), Some(3));
	}

	#[test]
	fn test_unknown_backend() {
		let config = StoreConfig { backend: "postgres".to_owned(), ..StoreConfig::default() };
		assert!(matches!(open_store(&config), Err(PresageError::Configuration(_))));
	}

	#[test]
	fn test_file_backend_persists() {
		let dir = tempfile::tempdir().unwrap();
		let config = StoreConfig {
			backend: "file".to_owned(),
			path: dir.path().join("ngrams.bin"),
			..StoreConfig::default()
		};

		let mut store = open_store(&config).unwrap();
		assert!(matches!(store, StoreBackend::File(_)));
		store.ensure_table(1).unwrap();
		store.upsert(&NgramKey::new(["hallo"]), 2).unwrap();

		let reopened = open_store(&config).unwrap();
		assert_eq!(reopened.count(&NgramKey::new(["hallo"])).unwrap(), 2);
	}
}
