use std::sync::Arc;
use std::time::Duration;

use crate::config::PresageConfig;
use crate::error::PresageResult;
use crate::model::activator::{PredictorActivator, PredictorRegistry};
use crate::model::suggestion::Prediction;
use crate::store::{open_store, NgramReader};
use crate::text::context_tracker::ContextTracker;

/// Prediction session: a context tracker in front of a shared activator.
///
/// # Responsibilities
/// - Track the text typed in one session
/// - Build the predictor context for the highest configured order
/// - Run the activator and return ranked words
///
/// # Notes
/// - The activator and the store behind it are shared between sessions
///   created with [`new_session`](Self::new_session); the tracker is not.
pub struct Presage {
	tracker: ContextTracker,
	activator: Arc<PredictorActivator>,
	size_multiplier: usize,
	max_order: usize,
}

impl Presage {
	/// Creates a session serving predictions from `store`.
	///
	/// # Errors
	/// Returns [`PresageError::Configuration`](crate::error::PresageError::Configuration)
	/// for invalid configuration values.
	pub fn new(config: &PresageConfig, store: Arc<dyn NgramReader>) -> PresageResult<Self> {
		config.validate()?;
		let registry = PredictorRegistry::from_config(&config.predictors, store)?;
		let combiner = config.activator.policy()?.combiner();
		let activator = PredictorActivator::new(registry, combiner, Duration::from_millis(config.activator.join_grace_ms));
		log::info!("presage ready with predictors {:?}", activator.registry().names());

		Ok(Self {
			tracker: ContextTracker::new(
				config.tokenizer.clone(),
				config.context.sliding_window_size,
				config.context.history_size,
				config.context.lowercase,
			),
			activator: Arc::new(activator),
			size_multiplier: config.activator.size_multiplier,
			max_order: config.max_order(),
		})
	}

	/// Opens the configured store and creates a session over it.
	pub fn from_config(config: &PresageConfig) -> PresageResult<Self> {
		let store = open_store(&config.store)?;
		Self::new(config, Arc::new(store))
	}

	/// A fresh session sharing this one's predictors and store.
	pub fn new_session(&self) -> Self {
		let mut tracker = self.tracker.clone();
		tracker.reset();
		Self {
			tracker,
			activator: Arc::clone(&self.activator),
			size_multiplier: self.size_multiplier,
			max_order: self.max_order,
		}
	}

	pub fn tracker(&self) -> &ContextTracker {
		&self.tracker
	}

	/// Size multiplier used by [`predict`](Self::predict).
	pub fn size_multiplier(&self) -> usize {
		self.size_multiplier
	}

	pub fn predictor_names(&self) -> Vec<String> {
		self.activator.registry().names()
	}

	/// Appends typed text to the session.
	pub fn update(&mut self, increment: &str) {
		self.tracker.update(increment);
	}

	/// Whether a new token was started since the last prediction.
	pub fn context_change(&self) -> bool {
		self.tracker.context_change()
	}

	/// Predicts the next words after `text`, the full text typed so far.
	pub fn predict(&mut self, text: &str) -> Vec<String> {
		self.predict_scored(text, self.size_multiplier).into_words()
	}

	/// Like [`predict`](Self::predict), with probabilities and an explicit size multiplier.
	pub fn predict_scored(&mut self, text: &str, size_multiplier: usize) -> Prediction {
		self.tracker.set_past_stream(text);
		self.predict_current(size_multiplier)
	}

	/// Predicts from the text accumulated with [`update`](Self::update).
	pub fn predict_current(&mut self, size_multiplier: usize) -> Prediction {
		let context = self.tracker.context(self.max_order);
		log::debug!("predicting after {:?} with prefix {:?}", context.tokens(), context.prefix());
		let prediction = self.activator.predict(size_multiplier.max(1), &context);
		self.tracker.commit();
		prediction
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::{MemoryStore, NgramKey, NgramWriter, Normalization};

	fn presage() -> Presage {
		let mut store = MemoryStore::new(Normalization::new(true, false));
		store.ensure_table(1).unwrap();
		store.ensure_table(2).unwrap();
		for (key, count) in [
			(vec!["Der"], 60),
			(vec!["Linksdenker"], 25),
			(vec!["Linksabbieger"], 40),
			(vec!["der", "linksdenker"], 22),
			(vec!["der", "linksabbieger"], 32),
		] {
			store.upsert(&NgramKey::new(key), count).unwrap();
		}
		Presage::new(&PresageConfig::default(), Arc::new(store)).unwrap()
	}

	#[test]
	fn test_predict() {
		let mut presage = presage();
		assert_eq!(presage.predict("Ich bin der Li"), ["linksabbieger", "linksdenker"]);
		assert_eq!(presage.predict("Ich bin DER links"), ["linksabbieger", "linksdenker"]);
	}

	#[test]
	fn test_predict_scored() {
		let mut presage = presage();
		let prediction = presage.predict_scored("der ", 1);
		// Bigrams first, then the unigram backoff adds "der" (60 of 125).
		assert_eq!(prediction.words().collect::<Vec<_>>(), ["linksabbieger", "der", "linksdenker"]);
		assert!((prediction[0].probability() - 32.0 / 54.0).abs() < 1e-12);
		assert!((prediction[1].probability() - 60.0 / 125.0).abs() < 1e-12);
	}

	#[test]
	fn test_predict_with_huge_multiplier() {
		let mut presage = presage();
		let prediction = presage.predict_scored("der li", usize::MAX / 2);
		assert_eq!(prediction.words().collect::<Vec<_>>(), ["linksabbieger", "linksdenker"]);
	}

	#[test]
	fn test_context_change_between_predictions() {
		let mut presage = presage();
		presage.predict("hello world ");
		presage.update("foo");
		assert!(presage.context_change());

		presage.predict("hello wor");
		presage.update("ld");
		assert!(!presage.context_change());
	}

	#[test]
	fn test_sessions_are_independent() {
		let mut first = presage();
		first.predict("der li");
		let second = first.new_session();
		assert_eq!(first.tracker().past_stream(), "der li");
		assert_eq!(second.tracker().past_stream(), "");
		assert_eq!(second.predictor_names(), ["smooth_trigram"]);
	}
}
