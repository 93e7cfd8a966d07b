//! N-gram-based next-word prediction library.
//!
//! This crate provides:
//! - Unicode-aware forward and reverse tokenization
//! - Per-session context tracking with context-change detection
//! - Parallel n-gram aggregation of text corpora
//! - N-gram stores (in-memory and single-file) with an ingestion pipeline
//! - Smoothed n-gram predictors combined into one ranked word list
//!
//! The [`Presage`] facade ties these together for serving.

/// Engine configuration (TOML).
pub mod config;

/// Crate error type.
pub mod error;

/// I/O utilities (file loading, directory listing, atomic writes).
pub mod io;

/// Aggregation, predictors, combination and activation.
pub mod model;

/// Prediction session facade.
pub mod presage;

/// N-gram stores and ingestion.
pub mod store;

/// Character classes, tokenizer and context tracker.
pub mod text;

pub use config::PresageConfig;
pub use error::{PresageError, PresageResult};
pub use model::suggestion::{Prediction, Suggestion};
pub use presage::Presage;
