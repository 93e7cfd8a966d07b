use std::cmp::Ordering;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::error::{PresageError, PresageResult};

pub const MIN_PROBABILITY: f64 = 0.0;
pub const MAX_PROBABILITY: f64 = 1.0;

fn check_probability(probability: f64) -> PresageResult<f64> {
	if !(MIN_PROBABILITY..=MAX_PROBABILITY).contains(&probability) {
		return Err(PresageError::ProbabilityRange { value: probability });
	}
	Ok(probability)
}

/// A candidate word and its probability.
///
/// # Invariants
/// - `probability` always lies in `[0.0, 1.0]` (NaN is rejected too).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
	word: String,
	probability: f64,
}

impl Suggestion {
	/// Creates a suggestion.
	///
	/// # Errors
	/// Returns [`PresageError::ProbabilityRange`] if `probability` is outside `[0.0, 1.0]`.
	pub fn new<S: Into<String>>(word: S, probability: f64) -> PresageResult<Self> {
		Ok(Self { word: word.into(), probability: check_probability(probability)? })
	}

	/// Creates a suggestion, forcing `probability` into `[0.0, 1.0]` (NaN becomes 0.0).
	pub(crate) fn clamped<S: Into<String>>(word: S, probability: f64) -> Self {
		let probability = if probability.is_nan() { MIN_PROBABILITY } else { probability.clamp(MIN_PROBABILITY, MAX_PROBABILITY) };
		Self { word: word.into(), probability }
	}

	pub fn word(&self) -> &str {
		&self.word
	}

	pub fn probability(&self) -> f64 {
		self.probability
	}

	/// Sets the probability (0.0..=1.0).
	///
	/// # Errors
	/// Returns an error, leaving the suggestion untouched, if the value is out of range.
	pub fn set_probability(&mut self, probability: f64) -> PresageResult<()> {
		self.probability = check_probability(probability)?;
		Ok(())
	}

	/// Ranking order: higher probability first, then word ascending.
	pub fn rank_cmp(&self, other: &Self) -> Ordering {
		other
			.probability
			.total_cmp(&self.probability)
			.then_with(|| self.word.cmp(&other.word))
	}
}

/// Ordered list of suggestions produced by a predictor or a combiner.
///
/// # Invariants
/// - Words are unique.
/// - Always sorted by probability descending, ties broken by word ascending;
///   holds after every insertion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
	suggestions: Vec<Suggestion>,
}

impl Prediction {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a suggestion at its ranked position.
	///
	/// If the word is already present, both probabilities are summed into the
	/// existing entry (capped at [`MAX_PROBABILITY`]) and the entry is moved to
	/// its new rank.
	pub fn add_suggestion(&mut self, suggestion: Suggestion) {
		let suggestion = match self.position_of(&suggestion.word) {
			Some(index) => {
				let mut existing = self.suggestions.remove(index);
				existing.probability = (existing.probability + suggestion.probability).min(MAX_PROBABILITY);
				existing
			}
			None => suggestion,
		};
		let index = self
			.suggestions
			.partition_point(|s| s.rank_cmp(&suggestion) == Ordering::Less);
		self.suggestions.insert(index, suggestion);
	}

	/// Looks up the suggestion for a word.
	pub fn suggestion_for_token(&self, word: &str) -> Option<&Suggestion> {
		self.position_of(word).map(|index| &self.suggestions[index])
	}

	pub fn contains(&self, word: &str) -> bool {
		self.position_of(word).is_some()
	}

	/// Keeps only the `len` best suggestions.
	pub fn truncate(&mut self, len: usize) {
		self.suggestions.truncate(len);
	}

	/// Words in ranked order.
	pub fn words(&self) -> impl Iterator<Item = &str> {
		self.suggestions.iter().map(Suggestion::word)
	}

	pub fn into_words(self) -> Vec<String> {
		self.suggestions.into_iter().map(|s| s.word).collect()
	}

	fn position_of(&self, word: &str) -> Option<usize> {
		self.suggestions.iter().position(|s| s.word == word)
	}
}

impl Deref for Prediction {
	type Target = [Suggestion];

	fn deref(&self) -> &Self::Target {
		&self.suggestions
	}
}

impl IntoIterator for Prediction {
	type Item = Suggestion;
	type IntoIter = std::vec::IntoIter<Suggestion>;

	fn into_iter(self) -> Self::IntoIter {
		self.suggestions.into_iter()
	}
}

impl<'a> IntoIterator for &'a Prediction {
	type Item = &'a Suggestion;
	type IntoIter = std::slice::Iter<'a, Suggestion>;

	fn into_iter(self) -> Self::IntoIter {
		self.suggestions.iter()
	}
}
