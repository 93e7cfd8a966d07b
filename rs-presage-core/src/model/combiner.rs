use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::suggestion::{Prediction, Suggestion, MAX_PROBABILITY};
use crate::error::{PresageError, PresageResult};

/// Merges the predictions of several predictors into one ranked list.
pub trait Combiner: Send + Sync {
	/// Collapses duplicate words of a single suggestion list.
	fn filter(&self, suggestions: &[Suggestion]) -> Prediction;

	/// Combines several predictions; the result does not depend on their order.
	fn combine(&self, predictions: &[Prediction]) -> Prediction;
}

/// Sums the probability every source assigns to a word.
///
/// # Notes
/// - When a summed score exceeds 1.0, every score is divided by the highest
///   one: the ranking is preserved and all values stay in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeritocracyCombiner;

impl MeritocracyCombiner {
	fn accumulate<'a, I>(suggestions: I) -> Prediction
	where
		I: IntoIterator<Item = &'a Suggestion>,
	{
		let mut scores: HashMap<&str, f64> = HashMap::new();
		for suggestion in suggestions {
			*scores.entry(suggestion.word()).or_insert(0.0) += suggestion.probability();
		}

		let max = scores.values().copied().fold(0.0, f64::max);
		let scale = if max > MAX_PROBABILITY { max } else { 1.0 };

		let mut prediction = Prediction::new();
		for (word, score) in scores {
			prediction.add_suggestion(Suggestion::clamped(word, score / scale));
		}
		prediction
	}
}

impl Combiner for MeritocracyCombiner {
	fn filter(&self, suggestions: &[Suggestion]) -> Prediction {
		Self::accumulate(suggestions)
	}

	/// Filters every prediction on its own, then sums the filtered lists.
	fn combine(&self, predictions: &[Prediction]) -> Prediction {
		let filtered: Vec<Prediction> = predictions.iter().map(|p| self.filter(p)).collect();
		Self::accumulate(filtered.iter().flat_map(|p| p.iter()))
	}
}

/// Combination policies selectable by name in the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinationPolicy {
	#[default]
	Meritocracy,
}

impl CombinationPolicy {
	/// # Errors
	/// Returns [`PresageError::Configuration`] for an unknown policy name.
	pub fn from_name(name: &str) -> PresageResult<Self> {
		match name.trim().to_lowercase().as_str() {
			"meritocracy" => Ok(Self::Meritocracy),
			_ => Err(PresageError::config(format!("unknown combination policy {name:?}"))),
		}
	}

	pub fn combiner(self) -> Box<dyn Combiner> {
		match self {
			Self::Meritocracy => Box::new(MeritocracyCombiner),
		}
	}
}

impl FromStr for CombinationPolicy {
	type Err = PresageError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_name(s)
	}
}
