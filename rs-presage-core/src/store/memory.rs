use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::{CompletionQuery, NgramKey, NgramReader, NgramWriter, Normalization, WriteMode};
use crate::error::{PresageError, PresageResult};

/// One table of the store: the rows of a single n-gram order.
///
/// # Invariants
/// - One row per distinct key (`rows` is keyed by the full token tuple).
/// - When present, `index` holds exactly the keys of `rows`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NgramTable {
	rows: HashMap<Vec<String>, u64>,
	/// Ordered index over the word columns; `complete` range-scans it.
	index: Option<BTreeSet<Vec<String>>>,
}

impl NgramTable {
	fn add(&mut self, key: Vec<String>, count: u64) {
		if let Some(index) = &mut self.index {
			if !self.rows.contains_key(&key) {
				index.insert(key.clone());
			}
		}
		*self.rows.entry(key).or_insert(0) += count;
	}

	fn build_index(&mut self) {
		if self.index.is_none() {
			self.index = Some(self.rows.keys().cloned().collect());
		}
	}

	fn complete(&self, context: &[String], prefix: &str) -> Vec<(String, u64)> {
		let matches = |key: &Vec<String>| {
			key[..context.len()] == *context && key[context.len()].starts_with(prefix)
		};

		match &self.index {
			Some(index) => {
				let mut start = context.to_vec();
				start.push(prefix.to_owned());
				index
					.range(start..)
					.take_while(|&key| matches(key))
					.map(|key| (key[context.len()].clone(), self.rows.get(key).copied().unwrap_or(0)))
					.collect()
			}
			None => self
				.rows
				.iter()
				.filter(|&(key, _)| matches(key))
				.map(|(key, count)| (key[context.len()].clone(), *count))
				.collect(),
		}
	}
}

/// Staged writes of an open bulk-load batch.
#[derive(Debug, Clone)]
struct Batch {
	order: usize,
	mode: WriteMode,
	rows: HashMap<Vec<String>, u64>,
}

/// In-memory n-gram store.
///
/// Tables are keyed by order. Keys and query predicates are normalized with
/// the store's [`Normalization`] before they touch a table.
///
/// # Notes
/// - Serializable, which is what [`FileStore`](super::FileStore) persists.
/// - An open batch is never serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
	normalization: Normalization,
	tables: BTreeMap<usize, NgramTable>,
	#[serde(skip)]
	batch: Option<Batch>,
}

impl MemoryStore {
	pub fn new(normalization: Normalization) -> Self {
		Self { normalization, tables: BTreeMap::new(), batch: None }
	}

	/// Whether a bulk-load batch is currently open.
	pub fn in_batch(&self) -> bool {
		self.batch.is_some()
	}

	fn table(&self, order: usize) -> PresageResult<&NgramTable> {
		self.tables
			.get(&order)
			.ok_or_else(|| PresageError::store(format!("no table for order {order}")))
	}

	fn table_mut(&mut self, order: usize) -> PresageResult<&mut NgramTable> {
		self.tables
			.get_mut(&order)
			.ok_or_else(|| PresageError::store(format!("no table for order {order}")))
	}
}

impl NgramReader for MemoryStore {
	fn normalization(&self) -> Normalization {
		self.normalization
	}

	fn orders(&self) -> Vec<usize> {
		self.tables.keys().copied().collect()
	}

	fn has_table(&self, order: usize) -> bool {
		self.tables.contains_key(&order)
	}

	fn has_index(&self, order: usize) -> bool {
		self.tables.get(&order).is_some_and(|t| t.index.is_some())
	}

	fn row_count(&self, order: usize) -> PresageResult<usize> {
		Ok(self.table(order)?.rows.len())
	}

	fn count(&self, key: &NgramKey) -> PresageResult<u64> {
		let table = self.table(key.order())?;
		let key = key.normalized(self.normalization);
		Ok(table.rows.get(key.tokens()).copied().unwrap_or(0))
	}

	fn complete(&self, query: &CompletionQuery) -> PresageResult<Vec<(String, u64)>> {
		let table = self.table(query.order())?;
		let query = query.normalized(self.normalization);

		let mut results = table.complete(query.context(), query.prefix_str());
		results.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
		if let Some(limit) = query.limit_value() {
			results.truncate(limit);
		}
		Ok(results)
	}
}

impl NgramWriter for MemoryStore {
	fn ensure_table(&mut self, order: usize) -> PresageResult<()> {
		if order == 0 {
			return Err(PresageError::store("n-gram order must be >= 1"));
		}
		self.tables.entry(order).or_default();
		Ok(())
	}

	fn drop_table(&mut self, order: usize) -> PresageResult<()> {
		if self.batch.as_ref().is_some_and(|b| b.order == order) {
			return Err(PresageError::store(format!("cannot drop table {order} during its batch")));
		}
		self.tables.remove(&order);
		Ok(())
	}

	fn ensure_index(&mut self, order: usize) -> PresageResult<()> {
		self.table_mut(order)?.build_index();
		Ok(())
	}

	fn drop_index(&mut self, order: usize) -> PresageResult<()> {
		if let Some(table) = self.tables.get_mut(&order) {
			table.index = None;
		}
		Ok(())
	}

	fn upsert(&mut self, key: &NgramKey, count: u64) -> PresageResult<()> {
		let order = key.order();
		self.table(order)?;
		let key = key.normalized(self.normalization).into_tokens();

		if let Some(batch) = &mut self.batch {
			if batch.order != order {
				return Err(PresageError::store(format!(
					"batch open for order {}, cannot write order {order}",
					batch.order
				)));
			}
			*batch.rows.entry(key).or_insert(0) += count;
			return Ok(());
		}
		self.table_mut(order)?.add(key, count);
		Ok(())
	}

	fn begin_batch(&mut self, order: usize, mode: WriteMode) -> PresageResult<()> {
		if let Some(batch) = &self.batch {
			return Err(PresageError::store(format!("batch already open for order {}", batch.order)));
		}
		self.table(order)?;
		self.batch = Some(Batch { order, mode, rows: HashMap::new() });
		Ok(())
	}

	fn commit_batch(&mut self) -> PresageResult<()> {
		let batch = self.batch.take().ok_or_else(|| PresageError::store("no open batch"))?;
		let table = self.table_mut(batch.order)?;
		match batch.mode {
			WriteMode::Append => {
				for (key, count) in batch.rows {
					table.add(key, count);
				}
			}
			WriteMode::Replace => {
				table.rows = batch.rows;
				table.index = None;
			}
		}
		log::debug!("committed batch for order {} ({:?})", batch.order, batch.mode);
		Ok(())
	}

	fn rollback_batch(&mut self) -> PresageResult<()> {
		match self.batch.take() {
			Some(batch) => {
				log::warn!("rolled back batch for order {} ({} staged rows)", batch.order, batch.rows.len());
				Ok(())
			}
			None => Err(PresageError::store("no open batch")),
		}
	}
}
