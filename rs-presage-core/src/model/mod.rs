//! Prediction model of the engine.
//!
//! This module contains:
//! - Build-time n-gram aggregation (`NgramMap`, `corpus`)
//! - Ranked suggestion lists (`Suggestion`, `Prediction`)
//! - The predictor abstraction and its smoothed n-gram implementation
//! - Combination of several predictions (`Combiner`)
//! - Parallel predictor activation (`PredictorActivator`)

/// Predictor registry and time-bounded parallel activation.
pub mod activator;

/// Merging of several predictors' outputs.
pub mod combiner;

/// Parallel corpus aggregation into an `NgramMap`.
///
/// Splits the corpus into chunks, counts each chunk on a worker thread
/// and merges the partial maps.
pub mod corpus;

/// Interned n-gram counter used at build time.
pub mod ngram_map;

/// `Predictor` trait, prediction context and the smoothed n-gram predictor.
pub mod predictor;

/// Suggestions and the ranked `Prediction` container.
pub mod suggestion;
