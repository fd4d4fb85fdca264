//! Storage contracts shared by the key-value and file-backed drivers.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::_prelude::*;

/// Boxed future returned by asynchronous driver operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Ready future reporting that `driver` does not implement `operation`.
pub fn missing<'a, T>(driver: &'static str, operation: &'static str) -> StoreFuture<'a, T>
where
	T: 'a + Send,
{
	Box::pin(std::future::ready(Err(Error::CapabilityMissing { driver, operation })))
}

/// Error type produced by storage engines beneath the drivers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures (e.g., serde_json) surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// JSON snapshot file rewritten atomically (temp file + rename) after each mutation.
#[derive(Clone, Debug)]
pub struct SnapshotFile {
	path: PathBuf,
}
impl SnapshotFile {
	/// Binds a snapshot to `path`, creating missing parent directories.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		Ok(Self { path })
	}

	/// Location of the snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Loads every entry; a missing or empty file yields an empty list.
	pub fn load<T>(&self) -> Result<Vec<T>, StoreError>
	where
		T: for<'de> Deserialize<'de>,
	{
		if !self.path.exists() {
			return Ok(Vec::new());
		}

		let metadata = self.path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", self.path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(Vec::new());
		}

		let bytes = fs::read(&self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", self.path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", self.path.display()),
		})
	}

	/// Replaces the snapshot with `entries`.
	pub fn persist<T>(&self, entries: &[T]) -> Result<(), StoreError>
	where
		T: Serialize,
	{
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}
}
