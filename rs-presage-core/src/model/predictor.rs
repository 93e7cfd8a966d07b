use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::suggestion::{Prediction, Suggestion, MAX_PROBABILITY, MIN_PROBABILITY};
use crate::error::{PresageError, PresageResult};
use crate::store::{CompletionQuery, NgramReader};

/// What a predictor sees of the typed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionContext {
	/// Preceding complete tokens, oldest first.
	tokens: Vec<String>,
	/// Partially typed current token (may be empty).
	prefix: String,
}

impl PredictionContext {
	pub fn new(tokens: Vec<String>, prefix: String) -> Self {
		Self { tokens, prefix }
	}

	pub fn tokens(&self) -> &[String] {
		&self.tokens
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// The last `n` tokens (fewer if the context is shorter).
	pub fn last_tokens(&self, n: usize) -> &[String] {
		&self.tokens[self.tokens.len().saturating_sub(n)..]
	}
}

/// The capability every predictor offers to the activator.
pub trait Predictor: Send + Sync {
	fn name(&self) -> &str;

	/// Number of candidates requested at size multiplier 1.
	fn base_budget(&self) -> usize;

	/// Wall-clock time a single call may take.
	fn time_budget(&self) -> Duration;

	/// Produces at most `max_candidates` suggestions for `context`.
	///
	/// Must return whatever it has accumulated once `time_budget` is spent.
	fn predict(&self, context: &PredictionContext, max_candidates: usize, time_budget: Duration)
		-> PresageResult<Prediction>;
}

/// What to do with a derived probability outside `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
	/// Drop the candidate.
	#[default]
	Reject,
	/// Clamp the value into range.
	Clamp,
}

/// Per-predictor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
	pub name: String,
	/// Highest n-gram order queried.
	pub order: usize,
	pub max_candidates: usize,
	pub time_budget_ms: u64,
	/// Weight applied to probabilities resolved at order `i + 1`; missing
	/// entries default to 1.0.
	pub backoff_weights: Vec<f64>,
	pub out_of_range: OutOfRangePolicy,
}

impl Default for PredictorConfig {
	fn default() -> Self {
		Self {
			name: "smooth_trigram".to_owned(),
			order: 3,
			max_candidates: 6,
			time_budget_ms: 100,
			backoff_weights: Vec::new(),
			out_of_range: OutOfRangePolicy::Reject,
		}
	}
}

impl PredictorConfig {
	/// # Errors
	/// Returns [`PresageError::Configuration`] for a zero order or candidate
	/// budget, or a backoff weight outside `[0.0, 1.0]`.
	pub fn validate(&self) -> PresageResult<()> {
		if self.order == 0 {
			return Err(PresageError::config(format!("predictor {}: order must be >= 1", self.name)));
		}
		if self.max_candidates == 0 {
			return Err(PresageError::config(format!("predictor {}: max_candidates must be >= 1", self.name)));
		}
		if self.backoff_weights.len() > self.order {
			return Err(PresageError::config(format!(
				"predictor {}: {} backoff weights for order {}",
				self.name,
				self.backoff_weights.len(),
				self.order
			)));
		}
		if let Some(weight) = self.backoff_weights.iter().find(|w| !(MIN_PROBABILITY..=MAX_PROBABILITY).contains(*w)) {
			return Err(PresageError::config(format!(
				"predictor {}: backoff weight {weight} outside [0.0, 1.0]",
				self.name
			)));
		}
		Ok(())
	}

	pub fn time_budget(&self) -> Duration {
		Duration::from_millis(self.time_budget_ms)
	}

	/// Weight of probabilities resolved at `order`.
	pub fn weight(&self, order: usize) -> f64 {
		self.backoff_weights.get(order - 1).copied().unwrap_or(1.0)
	}
}

/// N-gram predictor with order backoff.
///
/// Queries the highest order the context allows, then backs off one order at
/// a time (dropping the oldest context token) until enough distinct words are
/// found, the orders run out, or the time budget is spent. Evidence from a
/// higher order is never overwritten by a lower one.
///
/// Each candidate's probability is its count divided by the sum of counts of
/// the candidate set returned at the order it was resolved from, times that
/// order's backoff weight.
pub struct SmoothedNgramPredictor {
	config: PredictorConfig,
	store: Arc<dyn NgramReader>,
}

impl SmoothedNgramPredictor {
	pub fn new(config: PredictorConfig, store: Arc<dyn NgramReader>) -> PresageResult<Self> {
		config.validate()?;
		Ok(Self { config, store })
	}

	pub fn config(&self) -> &PredictorConfig {
		&self.config
	}

	fn admit(&self, probability: f64) -> Option<f64> {
		if (MIN_PROBABILITY..=MAX_PROBABILITY).contains(&probability) {
			return Some(probability);
		}
		match self.config.out_of_range {
			OutOfRangePolicy::Clamp if !probability.is_nan() => Some(probability.clamp(MIN_PROBABILITY, MAX_PROBABILITY)),
			_ => None,
		}
	}
}

impl Predictor for SmoothedNgramPredictor {
	fn name(&self) -> &str {
		&self.config.name
	}

	fn base_budget(&self) -> usize {
		self.config.max_candidates
	}

	fn time_budget(&self) -> Duration {
		self.config.time_budget()
	}

	fn predict(&self, context: &PredictionContext, max_candidates: usize, time_budget: Duration) -> PresageResult<Prediction> {
		let deadline = Instant::now() + time_budget;
		let mut prediction = Prediction::new();

		let top_order = self.config.order.min(context.tokens().len() + 1);
		for order in (1..=top_order).rev() {
			if prediction.len() >= max_candidates {
				break;
			}
			if Instant::now() >= deadline {
				log::debug!(
					"{}: time budget spent before order {order}, returning {} candidates",
					self.config.name,
					prediction.len()
				);
				break;
			}
			if !self.store.has_table(order) {
				continue;
			}

			let query = CompletionQuery::new(context.last_tokens(order - 1).iter().cloned())
				.prefix(context.prefix())
				.limit(max_candidates);
			let candidates = self.store.complete(&query)?;
			let total: u64 = candidates.iter().map(|(_, count)| count).sum();
			if total == 0 {
				continue;
			}

			let weight = self.config.weight(order);
			for (word, count) in candidates {
				if prediction.contains(&word) {
					continue;
				}
				let probability = weight * count as f64 / total as f64;
				match self.admit(probability) {
					Some(probability) => prediction.add_suggestion(Suggestion::new(word, probability)?),
					None => log::warn!("{}: dropped {word:?} with probability {probability}", self.config.name),
				}
			}
			log::trace!("{}: order {order} gave {} candidates so far", self.config.name, prediction.len());
		}

		prediction.truncate(max_candidates);
		Ok(prediction)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::{MemoryStore, NgramKey, NgramWriter};

	fn store() -> Arc<dyn NgramReader> {
		let mut store = MemoryStore::default();
		for order in 1..=3 {
			store.ensure_table(order).unwrap();
		}
		for (key, count) in [
			(vec!["der"], 60),
			(vec!["linksdenker"], 25),
			(vec!["linksabbieger"], 40),
			(vec!["lampe"], 15),
			(vec!["der", "linksdenker"], 22),
			(vec!["der", "linksabbieger"], 32),
			(vec!["die", "lampe"], 5),
			(vec!["ist", "der", "linksdenker"], 3),
		] {
			store.upsert(&NgramKey::new(key), count).unwrap();
		}
		Arc::new(store)
	}

	fn predictor(config: PredictorConfig) -> SmoothedNgramPredictor {
		SmoothedNgramPredictor::new(config, store()).unwrap()
	}

	fn context(tokens: &[&str], prefix: &str) -> PredictionContext {
		PredictionContext::new(tokens.iter().map(|t| t.to_string()).collect(), prefix.to_owned())
	}

	#[test]
	fn test_highest_order_wins() {
		let predictor = predictor(PredictorConfig::default());
		let prediction = predictor
			.predict(&context(&["ist", "der"], "l"), 6, Duration::from_secs(5))
			.unwrap();

		// Trigram: linksdenker 3/3; bigram adds linksabbieger 32/54; unigram adds lampe 15/80.
		assert_eq!(prediction.words().collect::<Vec<_>>(), ["linksdenker", "linksabbieger", "lampe"]);
		assert_eq!(prediction.suggestion_for_token("linksdenker").unwrap().probability(), 1.0);
		let abbieger = prediction.suggestion_for_token("linksabbieger").unwrap().probability();
		assert!((abbieger - 32.0 / 54.0).abs() < 1e-12);
		let lampe = prediction.suggestion_for_token("lampe").unwrap().probability();
		assert!((lampe - 15.0 / 80.0).abs() < 1e-12);
	}

	#[test]
	fn test_stops_backing_off_when_budget_filled() {
		let predictor = predictor(PredictorConfig::default());
		let prediction = predictor
			.predict(&context(&["der"], "links"), 2, Duration::from_secs(5))
			.unwrap();
		assert_eq!(prediction.words().collect::<Vec<_>>(), ["linksabbieger", "linksdenker"]);
		assert!((prediction[0].probability() - 32.0 / 54.0).abs() < 1e-12);
	}

	#[test]
	fn test_short_context_starts_lower() {
		let predictor = predictor(PredictorConfig::default());
		let prediction = predictor.predict(&context(&[], "li"), 6, Duration::from_secs(5)).unwrap();
		assert_eq!(prediction.words().collect::<Vec<_>>(), ["linksabbieger", "linksdenker"]);
	}

	#[test]
	fn test_zero_time_budget_returns_empty() {
		let predictor = predictor(PredictorConfig::default());
		let prediction = predictor.predict(&context(&["der"], ""), 6, Duration::ZERO).unwrap();
		assert!(prediction.is_empty());
	}

	#[test]
	fn test_backoff_weights() {
		let config = PredictorConfig { backoff_weights: vec![0.5, 1.0, 1.0], ..PredictorConfig::default() };
		let predictor = predictor(config);
		let prediction = predictor.predict(&context(&["die"], "l"), 6, Duration::from_secs(5)).unwrap();
		assert_eq!(prediction[0].word(), "lampe");
		assert_eq!(prediction[0].probability(), 1.0);
		let abbieger = prediction.suggestion_for_token("linksabbieger").unwrap().probability();
		assert!((abbieger - 0.5 * 40.0 / 80.0).abs() < 1e-12);
	}

	#[test]
	fn test_missing_orders_are_skipped() {
		let mut store = MemoryStore::default();
		store.ensure_table(1).unwrap();
		store.upsert(&NgramKey::new(["hallo"]), 2).unwrap();
		let predictor = SmoothedNgramPredictor::new(PredictorConfig::default(), Arc::new(store)).unwrap();
		let prediction = predictor
			.predict(&context(&["a", "b"], "ha"), 3, Duration::from_secs(5))
			.unwrap();
		assert_eq!(prediction.words().collect::<Vec<_>>(), ["hallo"]);
	}

	#[test]
	fn test_invalid_config() {
		for config in [
			PredictorConfig { order: 0, ..PredictorConfig::default() },
			PredictorConfig { max_candidates: 0, ..PredictorConfig::default() },
			PredictorConfig { backoff_weights: vec![1.5], ..PredictorConfig::default() },
			PredictorConfig { backoff_weights: vec![1.0; 4], ..PredictorConfig::default() },
		] {
			assert!(matches!(
				SmoothedNgramPredictor::new(config, store()),
				Err(PresageError::Configuration(_))
			));
		}
	}
}
