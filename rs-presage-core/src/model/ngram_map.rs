use indexmap::{IndexMap, IndexSet};

/// Interned token identifier.
pub type TokenId = u32;

/// Memory efficient n-gram counter used while aggregating a corpus.
///
/// Tokens are interned: each distinct string is stored once and n-grams are
/// kept as tuples of small integer ids. Memory is proportional to the
/// vocabulary plus the number of distinct n-grams, not to the number of token
/// occurrences.
///
/// Designed for a three step process:
/// 1. add all n-grams,
/// 2. optionally [`cutoff`](Self::cutoff) rare ones,
/// 3. read them back with [`items`](Self::items).
///
/// # Invariants
/// - Ids are assigned sequentially from 0, in first-seen order.
/// - One entry per distinct id tuple; adding an existing tuple increments it.
/// - Every stored count is >= 1.
#[derive(Debug, Clone, Default)]
pub struct NgramMap {
	strings: IndexSet<String>,
	ngrams: IndexMap<Vec<TokenId>, u64>,
}

impl NgramMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Interns `token` and returns its id.
	///
	/// Returns the existing id if the token is already known.
	pub fn add_token(&mut self, token: &str) -> TokenId {
		if let Some(index) = self.strings.get_index_of(token) {
			return index as TokenId;
		}
		let (index, _) = self.strings.insert_full(token.to_owned());
		index as TokenId
	}

	/// Records one occurrence of an n-gram given by token ids.
	pub fn add(&mut self, ngram: &[TokenId]) {
		self.add_count(ngram, 1);
	}

	/// Interns the tokens and records one occurrence of the n-gram.
	pub fn add_tokens(&mut self, tokens: &[&str]) {
		let ids: Vec<TokenId> = tokens.iter().map(|t| self.add_token(t)).collect();
		self.add(&ids);
	}

	fn add_count(&mut self, ngram: &[TokenId], count: u64) {
		match self.ngrams.get_mut(ngram) {
			Some(existing) => *existing += count,
			None => {
				self.ngrams.insert(ngram.to_vec(), count);
			}
		}
	}

	/// Count of an n-gram given by its tokens, 0 if unknown.
	pub fn count(&self, tokens: &[&str]) -> u64 {
		self.ids_of(tokens)
			.and_then(|ids| self.ngrams.get(&ids).copied())
			.unwrap_or(0)
	}

	/// Removes an n-gram, returning its count.
	pub fn remove(&mut self, tokens: &[&str]) -> Option<u64> {
		let ids = self.ids_of(tokens)?;
		self.ngrams.shift_remove(&ids)
	}

	/// Removes every n-gram whose count is `threshold` or lower.
	pub fn cutoff(&mut self, threshold: u64) {
		let before = self.ngrams.len();
		self.ngrams.retain(|_, count| *count > threshold);
		log::debug!("cutoff({threshold}) removed {} n-grams", before - self.ngrams.len());
	}

	/// Number of distinct n-grams.
	pub fn len(&self) -> usize {
		self.ngrams.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ngrams.is_empty()
	}

	/// Number of distinct interned tokens.
	pub fn vocabulary_size(&self) -> usize {
		self.strings.len()
	}

	/// Lazily yields `(tokens, count)` pairs in first-insertion order.
	///
	/// Ids are resolved back to strings only here, at read time.
	pub fn items(&self) -> impl Iterator<Item = (Vec<&str>, u64)> + '_ {
		self.ngrams.iter().map(move |(ids, count)| {
			let tokens = ids.iter().map(|id| self.strings[*id as usize].as_str()).collect();
			(tokens, *count)
		})
	}

	/// Merges another map into this one.
	///
	/// Tokens of `other` are re-interned; counts of matching n-grams are summed.
	/// Used to combine partial maps built in parallel.
	pub fn merge(&mut self, other: &Self) {
		for (tokens, count) in other.items() {
			let ids: Vec<TokenId> = tokens.iter().map(|t| self.add_token(t)).collect();
			self.add_count(&ids, count);
		}
	}

	fn ids_of(&self, tokens: &[&str]) -> Option<Vec<TokenId>> {
		tokens
			.iter()
			.map(|t| self.strings.get_index_of(*t).map(|i| i as TokenId))
			.collect()
	}
}
