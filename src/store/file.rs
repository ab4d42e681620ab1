//! Directory-backed [`TokenStore`]: one JSON file per (token class, issuer).

// std
use std::{
	ffi::OsString,
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
	process,
	sync::atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	store::{CachedToken, StoreError, StoreFuture, StoreKey, TokenStore},
};

/// Persists each snapshot to its own file inside a directory.
///
/// Writes go through a temporary sibling file that is synced and then renamed over the
/// target, so readers observe either the previous snapshot or the new one.
#[derive(Clone, Debug)]
pub struct FileStore {
	dir: PathBuf,
}
impl FileStore {
	/// Uses `dir` as the cache directory; it is created on first write.
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	/// Cache directory.
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Full path of the file backing `key`.
	pub fn path_for(&self, key: &StoreKey) -> PathBuf {
		self.dir.join(key.file_name())
	}

	fn write_now(&self, key: &StoreKey, token: &CachedToken) -> Result<(), StoreError> {
		if !self.dir.as_os_str().is_empty() {
			fs::create_dir_all(&self.dir).map_err(|e| StoreError::Backend {
				message: format!("Failed to create cache directory {}: {e}", self.dir.display()),
			})?;
		}

		let path = self.path_for(key);
		let serialized = serde_json::to_vec(token).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize {} snapshot: {e}", key.class),
		})?;

		replace_file(&path, &serialized)
	}

	fn read_now(&self, key: &StoreKey) -> Result<Option<CachedToken>, StoreError> {
		let path = self.path_for(key);
		let bytes = match fs::read(&path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", path.display()),
				}),
		};

		serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}
}
impl TokenStore for FileStore {
	fn save<'a>(&'a self, key: &'a StoreKey, token: CachedToken) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.write_now(key, &token) })
	}

	fn load<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<CachedToken>> {
		Box::pin(async move { self.read_now(key) })
	}
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Replaces `path` with `bytes` through a synced temporary sibling and an atomic rename.
///
/// Every call writes its own temporary file, so concurrent writers of the same path never
/// share one; the last rename wins.
pub(crate) fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
	let tmp_path = temp_sibling(path);
	let written = File::create(&tmp_path)
		.and_then(|mut file| {
			file.write_all(bytes)?;
			file.sync_all()
		})
		.map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		});

	if let Err(e) = written {
		let _ = fs::remove_file(&tmp_path);

		return Err(e);
	}

	fs::rename(&tmp_path, path).map_err(|e| {
		let _ = fs::remove_file(&tmp_path);

		StoreError::Backend { message: format!("Failed to replace {}: {e}", path.display()) }
	})
}

fn temp_sibling(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(OsString::from).unwrap_or_default();

	name.push(format!(".{}.{}.tmp", process::id(), TEMP_SEQ.fetch_add(1, Ordering::Relaxed)));

	path.with_file_name(name)
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process, thread};
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		auth::{TokenClass, TokenSecret},
		provider::ProviderInfo,
	};

	fn temp_dir() -> PathBuf {
		env::temp_dir().join(format!(
			"oauth2_conformance_file_store_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		))
	}

	fn snapshot() -> CachedToken {
		let Value::Object(info) = json!({
			"issuer": "https://op.example.com",
			"token_endpoint": "https://op.example.com/token",
		}) else {
			unreachable!()
		};

		CachedToken { token: TokenSecret::new("abc"), provider_info: ProviderInfo::new(info) }
	}

	#[tokio::test]
	async fn save_and_reload_round_trip() {
		let dir = temp_dir();
		let store = FileStore::new(&dir);
		let key = StoreKey::new(TokenClass::Pat, "https://op.example.com");

		store.save(&key, snapshot()).await.expect("Snapshot should be saved.");

		let on_disk: Value = serde_json::from_slice(
			&fs::read(store.path_for(&key)).expect("Snapshot file should exist."),
		)
		.expect("Snapshot file should be JSON.");

		assert_eq!(on_disk["token"], json!("abc"));
		assert_eq!(on_disk["provider_info"]["token_endpoint"], json!("https://op.example.com/token"));

		let reopened = FileStore::new(&dir);
		let loaded = reopened
			.load(&key)
			.await
			.expect("Snapshot should load.")
			.expect("Snapshot should be present after reopening.");

		assert_eq!(loaded, snapshot());
		assert!(
			reopened
				.load(&StoreKey::new(TokenClass::Aat, "https://op.example.com"))
				.await
				.expect("Missing snapshot should not be an error.")
				.is_none()
		);

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary cache directory {}: {e}", dir.display())
		});
	}

	#[test]
	fn temporary_siblings_are_unique_per_write() {
		let path = Path::new("/var/cache/conformance/pat.json");
		let first = temp_sibling(path);
		let second = temp_sibling(path);

		assert_ne!(first, second);
		assert_eq!(first.parent(), path.parent());
		assert!(first.to_string_lossy().starts_with("/var/cache/conformance/pat.json."));
	}

	#[test]
	fn concurrent_writers_of_one_key_all_succeed() {
		let dir = temp_dir();
		let store = FileStore::new(&dir);
		let key = StoreKey::new(TokenClass::Aat, "https://op.example.com");

		thread::scope(|scope| {
			for _ in 0..4 {
				scope.spawn(|| {
					for _ in 0..25 {
						store
							.write_now(&key, &snapshot())
							.expect("Concurrent save should succeed.");
					}
				});
			}
		});

		assert_eq!(store.read_now(&key).expect("Snapshot should load."), Some(snapshot()));
		assert_eq!(
			fs::read_dir(&dir).expect("Cache directory should be listable.").count(),
			1,
			"Temporary files should not be left behind."
		);

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary cache directory {}: {e}", dir.display())
		});
	}
}
