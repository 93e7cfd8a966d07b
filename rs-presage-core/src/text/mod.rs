//! Text handling: character classes, tokenization and per-session context.

/// Blankspace / separator / word character classification.
pub mod character;

/// Session text tracking and context-change detection.
pub mod context_tracker;

/// Forward and reverse streaming tokenizer.
pub mod tokenizer;
