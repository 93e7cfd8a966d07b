use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{NgramKey, NgramWriter, WriteMode};
use crate::error::{PresageError, PresageResult};
use crate::model::corpus::{build_from_file, BuildOptions};
use crate::model::ngram_map::NgramMap;
use crate::text::character::CharClasses;

/// Options of an ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
	/// Append to, or replace, the rows already in the table.
	pub mode: WriteMode,
	/// Build the table's index once the rows are committed.
	pub build_index: bool,
	/// Case-fold tokens while aggregating a corpus.
	pub lowercase: bool,
	/// Drop n-grams seen `cutoff` times or fewer.
	pub cutoff: u64,
	pub classes: CharClasses,
}

/// Outcome of a successful ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
	pub order: usize,
	/// Rows written by this run.
	pub rows: usize,
	/// Whether the table is indexed after the run.
	pub indexed: bool,
}

/// Bulk-loads an aggregated n-gram map into the table of `order`.
///
/// # Behavior
/// - Creates the table if needed.
/// - Writes every n-gram inside one batch: on any error the batch is rolled
///   back and the table is left exactly as it was.
/// - Builds the index after the commit when asked to.
///
/// # Errors
/// - [`PresageError::Store`] if an n-gram of the map does not have `order` tokens.
/// - Any backend error.
pub fn ingest<W: NgramWriter + ?Sized>(
	store: &mut W,
	map: &NgramMap,
	order: usize,
	options: &IngestOptions,
) -> PresageResult<IngestReport> {
	log::info!("ingesting {} {order}-grams ({:?})", map.len(), options.mode);
	store.ensure_table(order)?;
	store.begin_batch(order, options.mode)?;

	let mut rows = 0;
	let written = map.items().try_for_each(|(tokens, count)| {
		if tokens.len() != order {
			return Err(PresageError::store(format!(
				"{}-token n-gram {tokens:?} in an order {order} load",
				tokens.len()
			)));
		}
		store.upsert(&NgramKey::new(tokens), count)?;
		rows += 1;
		Ok(())
	});
	if let Err(e) = written {
		store.rollback_batch()?;
		return Err(e);
	}
	store.commit_batch()?;

	if options.build_index {
		store.ensure_index(order)?;
	}

	let report = IngestReport { order, rows, indexed: store.has_index(order) };
	log::info!("ingested {} rows into table {order} (indexed: {})", report.rows, report.indexed);
	Ok(report)
}

/// Aggregates the corpus at `path` and loads its n-grams of `order`.
pub fn ingest_corpus<W, P>(store: &mut W, path: P, order: usize, options: &IngestOptions) -> PresageResult<IngestReport>
where
	W: NgramWriter + ?Sized,
	P: AsRef<Path>,
{
	let build = BuildOptions { lowercase: options.lowercase, cutoff: options.cutoff, classes: options.classes.clone() };
	let map = build_from_file(path, order, &build)?;
	ingest(store, &map, order, options)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::{CompletionQuery, MemoryStore, NgramReader};

	fn der_map() -> NgramMap {
		let mut map = NgramMap::new();
		for _ in 0..22 {
			map.add_tokens(&["der", "linksdenker"]);
		}
		for _ in 0..32 {
			map.add_tokens(&["der", "linksabbieger"]);
		}
		map
	}

	#[test]
	fn test_ingest() {
		let mut store = MemoryStore::default();
		let options = IngestOptions { build_index: true, ..IngestOptions::default() };
		let report = ingest(&mut store, &der_map(), 2, &options).unwrap();
		assert_eq!(report, IngestReport { order: 2, rows: 2, indexed: true });

		assert_eq!(
			store.complete(&CompletionQuery::new(["der"]).prefix("links")).unwrap(),
			vec![("linksabbieger".to_owned(), 32), ("linksdenker".to_owned(), 22)]
		);
	}

	#[test]
	fn test_append_and_replace() {
		let mut store = MemoryStore::default();
		ingest(&mut store, &der_map(), 2, &IngestOptions::default()).unwrap();
		ingest(&mut store, &der_map(), 2, &IngestOptions::default()).unwrap();
		assert_eq!(store.count(&NgramKey::new(["der", "linksdenker"])).unwrap(), 44);

		let mut map = NgramMap::new();
		map.add_tokens(&["die", "lampe"]);
		let options = IngestOptions { mode: WriteMode::Replace, ..IngestOptions::default() };
		ingest(&mut store, &map, 2, &options).unwrap();
		assert_eq!(store.count(&NgramKey::new(["der", "linksdenker"])).unwrap(), 0);
		assert_eq!(store.row_count(2).unwrap(), 1);
	}

	#[test]
	fn test_arity_mismatch_rolls_back() {
		let mut store = MemoryStore::default();
		ingest(&mut store, &der_map(), 2, &IngestOptions::default()).unwrap();

		let mut map = der_map();
		map.add_tokens(&["ein", "drei", "gramm"]);
		assert!(matches!(
			ingest(&mut store, &map, 2, &IngestOptions::default()),
			Err(PresageError::Store(_))
		));
		assert!(!store.in_batch());
		assert_eq!(store.count(&NgramKey::new(["der", "linksdenker"])).unwrap(), 22);
	}

	#[test]
	fn test_ingest_corpus() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("corpus.txt");
		std::fs::write(&path, "Der Linksdenker denkt.\nDer Linksabbieger biegt ab.\nDer Linksdenker schreibt.\n")
			.unwrap();

		let mut store = MemoryStore::default();
		let options = IngestOptions { lowercase: true, ..IngestOptions::default() };
		for order in 1..=2 {
			ingest_corpus(&mut store, &path, order, &options).unwrap();
		}
		assert_eq!(store.orders(), vec![1, 2]);
		assert_eq!(store.count(&NgramKey::new(["der"])).unwrap(), 3);
		assert_eq!(
			store.complete(&CompletionQuery::new(["der"]).prefix("links")).unwrap(),
			vec![("linksdenker".to_owned(), 2), ("linksabbieger".to_owned(), 1)]
		);
	}
}
