use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::combiner::Combiner;
use super::predictor::{PredictionContext, Predictor, PredictorConfig, SmoothedNgramPredictor};
use super::suggestion::Prediction;
use crate::error::PresageResult;
use crate::store::NgramReader;

/// Ordered set of active predictors.
#[derive(Default, Clone)]
pub struct PredictorRegistry {
	predictors: Vec<Arc<dyn Predictor>>,
}

impl PredictorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds one [`SmoothedNgramPredictor`] per configuration entry, all sharing `store`.
	///
	/// # Errors
	/// Returns the first invalid predictor configuration.
	pub fn from_config(configs: &[PredictorConfig], store: Arc<dyn NgramReader>) -> PresageResult<Self> {
		let mut registry = Self::new();
		for config in configs {
			registry.add(Arc::new(SmoothedNgramPredictor::new(config.clone(), Arc::clone(&store))?));
		}
		Ok(registry)
	}

	pub fn add(&mut self, predictor: Arc<dyn Predictor>) {
		self.predictors.push(predictor);
	}

	pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Predictor>> {
		self.predictors.iter()
	}

	pub fn names(&self) -> Vec<String> {
		self.predictors.iter().map(|p| p.name().to_owned()).collect()
	}

	pub fn len(&self) -> usize {
		self.predictors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.predictors.is_empty()
	}
}

/// Runs every registered predictor and combines their outputs.
///
/// # Behavior
/// - Each predictor runs on its own thread with `base_budget * size_multiplier`
///   candidates and its own time budget.
/// - Results are collected over an MPSC channel until all predictors answered
///   or the largest time budget plus the grace period has elapsed.
/// - A predictor that fails, panics or misses the deadline contributes nothing.
pub struct PredictorActivator {
	registry: PredictorRegistry,
	combiner: Box<dyn Combiner>,
	join_grace: Duration,
}

impl PredictorActivator {
	pub fn new(registry: PredictorRegistry, combiner: Box<dyn Combiner>, join_grace: Duration) -> Self {
		Self { registry, combiner, join_grace }
	}

	pub fn registry(&self) -> &PredictorRegistry {
		&self.registry
	}

	/// Produces the combined prediction for `context`.
	///
	/// # Parameters
	/// - `size_multiplier`: Scales every predictor's candidate budget.
	/// - `context`: Tokens and prefix the predictors work on.
	///
	/// # Returns
	/// The combined, ranked prediction; empty if no predictor contributed.
	pub fn predict(&self, size_multiplier: usize, context: &PredictionContext) -> Prediction {
		let (tx, rx) = mpsc::channel();
		let mut pending = 0usize;
		let mut wait = Duration::ZERO;

		for predictor in self.registry.iter() {
			let predictor = Arc::clone(predictor);
			let context = context.clone();
			let tx = tx.clone();
			let max_candidates = predictor.base_budget().saturating_mul(size_multiplier);
			let budget = predictor.time_budget();
			let name = predictor.name().to_owned();

			let spawned = thread::Builder::new().name(format!("predictor-{name}")).spawn(move || {
				let result = predictor.predict(&context, max_candidates, budget);
				// The activator may have stopped listening after its deadline.
				let _ = tx.send((predictor.name().to_owned(), result));
			});
			match spawned {
				Ok(_) => {
					pending += 1;
					wait = wait.max(budget);
				}
				Err(e) => log::warn!("could not start predictor {name}: {e}"),
			}
		}
		drop(tx);

		let deadline = Instant::now() + wait + self.join_grace;
		let mut predictions = Vec::with_capacity(pending);
		while pending > 0 {
			match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
				Ok((name, Ok(prediction))) => {
					log::trace!("predictor {name} returned {} suggestions", prediction.len());
					predictions.push(prediction);
				}
				Ok((name, Err(e))) => log::warn!("predictor {name} failed, ignoring it: {e}"),
				Err(RecvTimeoutError::Timeout) => {
					log::warn!("{pending} predictor(s) missed the deadline, ignoring them");
					break;
				}
				Err(RecvTimeoutError::Disconnected) => {
					log::warn!("{pending} predictor(s) stopped without answering");
					break;
				}
			}
			pending -= 1;
		}

		self.combiner.combine(&predictions)
	}
}
