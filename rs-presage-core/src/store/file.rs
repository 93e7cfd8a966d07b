use std::path::{Path, PathBuf};

use super::{CompletionQuery, MemoryStore, NgramKey, NgramReader, NgramWriter, Normalization, WriteMode};
use crate::error::{PresageError, PresageResult};
use crate::io::write_atomic;

/// Single-file embedded n-gram store.
///
/// The whole store is a [`MemoryStore`] snapshot serialized with `postcard`.
/// Every committed change (schema operation, upsert outside a batch, batch
/// commit) rewrites the file through a temporary file and an atomic rename, so
/// a crash never leaves a half-written snapshot or a partially loaded order.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: MemoryStore,
}

impl FileStore {
	/// Opens the store at `path`, or starts an empty one if the file is missing.
	///
	/// # Errors
	/// - [`PresageError::NormalizationMismatch`] if the file was written with a
	///   different normalization policy.
	/// - I/O and deserialization errors.
	pub fn open<P: AsRef<Path>>(path: P, normalization: Normalization) -> PresageResult<Self> {
		let path = path.as_ref().to_path_buf();
		let inner = if path.exists() {
			let bytes = std::fs::read(&path)?;
			let inner: MemoryStore = postcard::from_bytes(&bytes)?;
			if inner.normalization() != normalization {
				return Err(PresageError::NormalizationMismatch {
					stored: inner.normalization().to_string(),
					requested: normalization.to_string(),
				});
			}
			log::info!("opened n-gram store {} (orders {:?})", path.display(), inner.orders());
			inner
		} else {
			log::info!("creating n-gram store {}", path.display());
			MemoryStore::new(normalization)
		};
		Ok(Self { path, inner })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Applies `change` to a copy of the store, persists the copy and only then
	/// makes it visible. On any error the store is left as it was.
	fn write_through<F>(&mut self, change: F) -> PresageResult<()>
	where
		F: FnOnce(&mut MemoryStore) -> PresageResult<()>,
	{
		let mut next = self.inner.clone();
		change(&mut next)?;
		let bytes = postcard::to_stdvec(&next)?;
		write_atomic(&self.path, &bytes)?;
		log::debug!("persisted {} bytes to {}", bytes.len(), self.path.display());
		self.inner = next;
		Ok(())
	}
}

impl NgramReader for FileStore {
	fn normalization(&self) -> Normalization {
		self.inner.normalization()
	}

	fn orders(&self) -> Vec<usize> {
		self.inner.orders()
	}

	fn has_table(&self, order: usize) -> bool {
		self.inner.has_table(order)
	}

	fn has_index(&self, order: usize) -> bool {
		self.inner.has_index(order)
	}

	fn row_count(&self, order: usize) -> PresageResult<usize> {
		self.inner.row_count(order)
	}

	fn count(&self, key: &NgramKey) -> PresageResult<u64> {
		self.inner.count(key)
	}

	fn complete(&self, query: &CompletionQuery) -> PresageResult<Vec<(String, u64)>> {
		self.inner.complete(query)
	}
}

impl NgramWriter for FileStore {
	fn ensure_table(&mut self, order: usize) -> PresageResult<()> {
		self.write_through(|store| store.ensure_table(order))
	}

	fn drop_table(&mut self, order: usize) -> PresageResult<()> {
		self.write_through(|store| store.drop_table(order))
	}

	fn ensure_index(&mut self, order: usize) -> PresageResult<()> {
		self.write_through(|store| store.ensure_index(order))
	}

	fn drop_index(&mut self, order: usize) -> PresageResult<()> {
		self.write_through(|store| store.drop_index(order))
	}

	fn upsert(&mut self, key: &NgramKey, count: u64) -> PresageResult<()> {
		if self.inner.in_batch() {
			return self.inner.upsert(key, count);
		}
		self.write_through(|store| store.upsert(key, count))
	}

	fn begin_batch(&mut self, order: usize, mode: WriteMode) -> PresageResult<()> {
		self.inner.begin_batch(order, mode)
	}

	/// Commits the open batch. If the snapshot cannot be written the batch is
	/// discarded and the committed rows stay as they were, in memory and on disk.
	fn commit_batch(&mut self) -> PresageResult<()> {
		let committed = self.write_through(MemoryStore::commit_batch);
		if committed.is_err() && self.inner.in_batch() {
			self.inner.rollback_batch()?;
		}
		committed
	}

	fn rollback_batch(&mut self) -> PresageResult<()> {
		self.inner.rollback_batch()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_reopen_keeps_committed_rows() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ngrams.bin");

		{
			let mut store = FileStore::open(&path, Normalization::default()).unwrap();
			store.ensure_table(2).unwrap();
			store.begin_batch(2, WriteMode::Append).unwrap();
			store.upsert(&NgramKey::new(["der", "linksdenker"]), 22).unwrap();
			store.upsert(&NgramKey::new(["der", "linksabbieger"]), 32).unwrap();
			store.commit_batch().unwrap();
			store.ensure_index(2).unwrap();

			store.begin_batch(2, WriteMode::Append).unwrap();
			store.upsert(&NgramKey::new(["der", "lost"]), 1).unwrap();
		}

		let store = FileStore::open(&path, Normalization::default()).unwrap();
		assert_eq!(store.orders(), vec![2]);
		assert!(store.has_index(2));
		assert_eq!(store.count(&NgramKey::new(["der", "lost"])).unwrap(), 0);
		assert_eq!(
			store.complete(&CompletionQuery::new(["der"]).prefix("links")).unwrap(),
			vec![("linksabbieger".to_owned(), 32), ("linksdenker".to_owned(), 22)]
		);
	}

	#[test]
	fn test_failed_write_changes_nothing() {
		let dir = tempfile::tempdir().unwrap();
		let sub = dir.path().join("sub");
		let path = sub.join("ngrams.bin");

		let mut store = FileStore::open(&path, Normalization::default()).unwrap();
		store.ensure_table(2).unwrap();
		store.upsert(&NgramKey::new(["der", "linksdenker"]), 22).unwrap();
		store.begin_batch(2, WriteMode::Append).unwrap();
		store.upsert(&NgramKey::new(["der", "linksabbieger"]), 32).unwrap();

		// A plain file where the store's directory should be makes every write fail.
		std::fs::remove_dir_all(&sub).unwrap();
		std::fs::write(&sub, b"").unwrap();

		assert!(matches!(store.commit_batch(), Err(PresageError::Io(_))));
		assert_eq!(store.count(&NgramKey::new(["der", "linksabbieger"])).unwrap(), 0);
		assert!(store.upsert(&NgramKey::new(["der", "lampe"]), 3).is_err());
		assert_eq!(store.count(&NgramKey::new(["der", "lampe"])).unwrap(), 0);
		assert!(store.ensure_table(3).is_err());
		assert!(!store.has_table(3));
		assert_eq!(store.count(&NgramKey::new(["der", "linksdenker"])).unwrap(), 22);

		// The failed batch is gone, a new one can start once the disk is back.
		std::fs::remove_file(&sub).unwrap();
		store.begin_batch(2, WriteMode::Append).unwrap();
		store.upsert(&NgramKey::new(["der", "linksabbieger"]), 32).unwrap();
		store.commit_batch().unwrap();

		let reopened = FileStore::open(&path, Normalization::default()).unwrap();
		assert_eq!(reopened.row_count(2).unwrap(), 2);
		assert_eq!(reopened.count(&NgramKey::new(["der", "lampe"])).unwrap(), 0);
	}

	#[test]
	fn test_normalization_mismatch() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ngrams.bin");
		let mut store = FileStore::open(&path, Normalization::new(true, false)).unwrap();
		store.ensure_table(1).unwrap();

		assert!(matches!(
			FileStore::open(&path, Normalization::new(true, true)),
			Err(PresageError::NormalizationMismatch { .. })
		));
	}
}
