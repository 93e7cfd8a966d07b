use std::path::Path;
use std::sync::mpsc;
use std::thread;

use super::ngram_map::{NgramMap, TokenId};
use crate::error::{PresageError, PresageResult};
use crate::io::read_file;
use crate::text::character::CharClasses;
use crate::text::tokenizer::{preprocess, Direction, Tokenizer};

/// Number of chunks per CPU when splitting a corpus across worker threads.
const CHUNKS_PER_CPU: usize = 8;

/// Options of a corpus aggregation run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
	/// Case-fold tokens while assembling them.
	pub lowercase: bool,
	/// Drop n-grams seen `cutoff` times or fewer (0 keeps everything).
	pub cutoff: u64,
	pub classes: CharClasses,
}

impl Default for BuildOptions {
	fn default() -> Self {
		Self { lowercase: false, cutoff: 0, classes: CharClasses::default() }
	}
}

/// Adds every n-gram of one corpus line to `map`.
///
/// The line is preprocessed and tokenized forward; a window of `order` tokens
/// slides over the token stream one token at a time. Lines with fewer than
/// `order` tokens contribute nothing.
pub fn add_line(map: &mut NgramMap, line: &str, order: usize, options: &BuildOptions) {
	let line = preprocess(line);
	let tokens: Vec<String> = Tokenizer::with_classes(&line, &options.classes, Direction::Forward)
		.lowercase(options.lowercase)
		.collect();
	if tokens.len() < order {
		return;
	}

	let ids: Vec<TokenId> = tokens.iter().map(|t| map.add_token(t)).collect();
	for window in ids.windows(order) {
		map.add(window);
	}
}

/// Aggregates the n-grams of `order` over a set of lines.
///
/// # Behavior
/// - Splits the lines into chunks (CPU cores * [`CHUNKS_PER_CPU`]).
/// - Builds one partial map per chunk on a worker thread.
/// - Collects the partial maps over an MPSC channel and merges them in chunk
///   order, so the result lists n-grams in the order a single pass would.
/// - Applies the cutoff once, on the merged map.
///
/// # Errors
/// Returns [`PresageError::Configuration`] if `order` is 0.
pub fn build_from_lines(lines: &[String], order: usize, options: &BuildOptions) -> PresageResult<NgramMap> {
	if order == 0 {
		return Err(PresageError::config("n-gram order must be >= 1"));
	}

	let chunks = num_cpus::get() * CHUNKS_PER_CPU;
	let chunk_size = lines.len().div_ceil(chunks).max(1);

	let mut partial_maps: Vec<Option<NgramMap>> = Vec::new();
	thread::scope(|scope| {
		let (tx, rx) = mpsc::channel();
		for (index, chunk) in lines.chunks(chunk_size).enumerate() {
			let tx = tx.clone();
			scope.spawn(move || {
				let mut partial_map = NgramMap::new();
				for line in chunk {
					add_line(&mut partial_map, line, order, options);
				}
				// The receiver outlives every worker of the scope.
				let _ = tx.send((index, partial_map));
			});
			partial_maps.push(None);
		}
		drop(tx);

		for (index, partial_map) in rx.iter() {
			partial_maps[index] = Some(partial_map);
		}
	});

	let mut final_map = NgramMap::new();
	for partial_map in partial_maps.iter().flatten() {
		final_map.merge(partial_map);
	}

	if options.cutoff > 0 {
		final_map.cutoff(options.cutoff);
	}

	log::info!(
		"aggregated {} lines into {} {order}-grams ({} tokens in vocabulary)",
		lines.len(),
		final_map.len(),
		final_map.vocabulary_size()
	);
	Ok(final_map)
}

/// Reads a corpus file and aggregates its n-grams; see [`build_from_lines`].
pub fn build_from_file<P: AsRef<Path>>(path: P, order: usize, options: &BuildOptions) -> PresageResult<NgramMap> {
	let lines = read_file(&path)?;
	log::debug!("read {} lines from {}", lines.len(), path.as_ref().display());
	build_from_lines(&lines, order, options)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lines(text: &[&str]) -> Vec<String> {
		text.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn test_add_line_rolling_window() {
		let mut map = NgramMap::new();
		add_line(&mut map, "the quick brown fox", 3, &BuildOptions::default());
		let ngrams: Vec<_> = map.items().collect();
		assert_eq!(
			ngrams,
			vec![(vec!["the", "quick", "brown"], 1), (vec!["quick", "brown", "fox"], 1)]
		);
	}

	#[test]
	fn test_short_lines_contribute_nothing() {
		let mut map = NgramMap::new();
		add_line(&mut map, "too short", 3, &BuildOptions::default());
		add_line(&mut map, "", 1, &BuildOptions::default());
		assert!(map.is_empty());
		assert_eq!(map.vocabulary_size(), 0);
	}

	#[test]
	fn test_build_from_lines() {
		let corpus = lines(&[
			"Der Linksdenker denkt.",
			"der Linksabbieger biegt ab",
			"Der Linksdenker schreibt",
		]);
		let options = BuildOptions { lowercase: true, ..BuildOptions::default() };
		let map = build_from_lines(&corpus, 2, &options).unwrap();
		assert_eq!(map.count(&["der", "linksdenker"]), 2);
		assert_eq!(map.count(&["der", "linksabbieger"]), 1);
		assert_eq!(map.count(&["biegt", "ab"]), 1);
		// No n-gram spans two lines.
		assert_eq!(map.count(&["denkt", "der"]), 0);

		let options = BuildOptions { lowercase: true, cutoff: 1, ..BuildOptions::default() };
		let map = build_from_lines(&corpus, 2, &options).unwrap();
		assert_eq!(map.len(), 1);
	}

	#[test]
	fn test_parallel_build_matches_sequential() {
		let corpus: Vec<String> = (0..500)
			.map(|i| format!("token{} shared word {}", i % 7, if i % 2 == 0 { "even" } else { "odd" }))
			.collect();
		let options = BuildOptions::default();

		let parallel = build_from_lines(&corpus, 2, &options).unwrap();
		let mut sequential = NgramMap::new();
		for line in &corpus {
			add_line(&mut sequential, line, 2, &options);
		}

		assert_eq!(parallel.len(), sequential.len());
		for (tokens, count) in sequential.items() {
			assert_eq!(parallel.count(&tokens), count, "{tokens:?}");
		}
	}

	#[test]
	fn test_parallel_build_keeps_corpus_order() {
		let corpus: Vec<String> = (0..300).map(|i| format!("line{i} token{} shared", i % 5)).collect();
		let options = BuildOptions::default();

		let parallel = build_from_lines(&corpus, 2, &options).unwrap();
		let mut sequential = NgramMap::new();
		for line in &corpus {
			add_line(&mut sequential, line, 2, &options);
		}

		assert_eq!(parallel.items().collect::<Vec<_>>(), sequential.items().collect::<Vec<_>>());
	}

	#[test]
	fn test_zero_order_rejected() {
		assert!(matches!(
			build_from_lines(&[], 0, &BuildOptions::default()),
			Err(PresageError::Configuration(_))
		));
	}
}
