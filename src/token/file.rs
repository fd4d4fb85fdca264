//! File-backed token backend for single-node deployments.

// std
use std::path::{Path, PathBuf};
// self
use crate::{
	_prelude::*,
	auth::{TokenId, UserId},
	manager::Driver,
	store::{SnapshotFile, StoreError, StoreFuture},
	token::{TokenDriver, TokenRef, memory},
};

type TokenMap = HashMap<TokenId, TokenRef>;

/// Persists tokens to a JSON snapshot after each mutation.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
	snapshot: SnapshotFile,
	inner: Arc<RwLock<TokenMap>>,
}
impl FileTokenStore {
	/// Opens (or creates) a store at `path`, eagerly loading existing tokens.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let snapshot = SnapshotFile::open(path)?;
		let tokens = snapshot
			.load::<TokenRef>()?
			.into_iter()
			.map(|token| (token.id.clone(), token))
			.collect();

		Ok(Self { snapshot, inner: Arc::new(RwLock::new(tokens)) })
	}

	/// Snapshot location.
	pub fn path(&self) -> &Path {
		self.snapshot.path()
	}

	fn persist_locked(&self, contents: &TokenMap) -> Result<(), StoreError> {
		let mut entries = contents.values().cloned().collect::<Vec<_>>();

		entries.sort_by(|a, b| a.id.cmp(&b.id));

		self.snapshot.persist(&entries)
	}

	/// Applies `mutate` under the write lock and persists only if it succeeded.
	fn mutate<T>(&self, mutate: impl FnOnce(&mut TokenMap) -> Result<T>) -> Result<T> {
		let mut guard = self.inner.write();
		let before = (*guard).clone();
		let value = mutate(&mut guard)?;

		if let Err(e) = self.persist_locked(&guard) {
			*guard = before;

			return Err(e.into());
		}

		Ok(value)
	}
}
impl Driver for FileTokenStore {
	fn driver_name(&self) -> &'static str {
		"file"
	}

	fn capabilities(&self) -> &'static [&'static str] {
		memory::CAPABILITIES
	}
}
impl TokenDriver for FileTokenStore {
	fn create_token(&self, token: TokenRef) -> StoreFuture<'_, TokenRef> {
		Box::pin(async move {
			self.mutate(|map| {
				if map.contains_key(&token.id) {
					return Err(Error::conflict("token", &token.id));
				}

				map.insert(token.id.clone(), token.clone());

				Ok(token)
			})
		})
	}

	fn get_token<'a>(&'a self, id: &'a TokenId) -> StoreFuture<'a, TokenRef> {
		Box::pin(async move {
			self.inner.read().get(id).cloned().ok_or_else(|| Error::not_found("token", id))
		})
	}

	fn delete_token<'a>(&'a self, id: &'a TokenId) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.mutate(|map| map.remove(id).map(|_| ()).ok_or_else(|| Error::not_found("token", id)))
		})
	}

	fn list_tokens<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Vec<TokenId>> {
		Box::pin(async move { Ok(memory::MemoryTokenStore::list_now(&self.inner, user_id)) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			self.mutate(|map| {
				let before = map.len();

				map.retain(|_, token| !token.is_expired_at(now));

				Ok(before - map.len())
			})
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{identity::UserRef, token::TokenData};

	fn token(id: &str, expires: OffsetDateTime) -> TokenRef {
		let user = UserRef::new(UserId::new("u-1").expect("User fixture should be valid."), "foo");

		TokenData::new(user)
			.expires_at(expires)
			.into_ref(TokenId::new(id).expect("Token fixture should be valid."), expires)
	}

	#[tokio::test]
	async fn tokens_survive_reopen() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let path = dir.path().join("tokens.json");
		let expires = macros::datetime!(2099-01-01 00:00 UTC);

		{
			let store = FileTokenStore::open(&path).expect("Failed to open file store.");

			store.create_token(token("t-1", expires)).await.expect("Insert should succeed.");
			store.create_token(token("t-2", expires)).await.expect("Insert should succeed.");
			store
				.delete_token(&TokenId::new("t-2").expect("Token id should be valid."))
				.await
				.expect("Delete should succeed.");
		}

		let reopened = FileTokenStore::open(&path).expect("Failed to reopen file store.");
		let t1 = TokenId::new("t-1").expect("Token id should be valid.");
		let t2 = TokenId::new("t-2").expect("Token id should be valid.");

		assert_eq!(reopened.get_token(&t1).await.expect("Token should persist.").expires, expires);
		assert!(reopened.get_token(&t2).await.expect_err("Deleted token must stay gone.").is_not_found());
	}

	#[tokio::test]
	async fn failed_mutations_do_not_touch_the_snapshot() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let path = dir.path().join("tokens.json");
		let store = FileTokenStore::open(&path).expect("Failed to open file store.");
		let missing = TokenId::new("nope").expect("Token id should be valid.");

		assert!(store.delete_token(&missing).await.expect_err("Missing token.").is_not_found());
		assert!(!path.exists());

		let now = macros::datetime!(2025-01-01 00:00 UTC);

		store.create_token(token("old", now - Duration::days(1))).await.expect("Insert should succeed.");

		assert_eq!(store.purge_expired(now).await.expect("Purge should succeed."), 1);
		assert!(
			FileTokenStore::open(&path)
				.expect("Failed to reopen file store.")
				.list_tokens(&UserId::new("u-1").expect("User id should be valid."))
				.await
				.expect("Listing should succeed.")
				.is_empty()
		);
	}
}
