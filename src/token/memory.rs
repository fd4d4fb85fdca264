//! Thread-safe in-memory token backend for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TokenId, UserId},
	manager::Driver,
	store::StoreFuture,
	token::{TokenDriver, TokenRef},
};

type TokenMap = Arc<RwLock<HashMap<TokenId, TokenRef>>>;

pub(crate) const CAPABILITIES: &[&str] =
	&["create_token", "get_token", "delete_token", "list_tokens", "purge_expired"];

/// Token backend that keeps records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore(TokenMap);
impl MemoryTokenStore {
	/// Number of stored tokens, expired ones included.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	pub(crate) fn create_now(map: &RwLock<HashMap<TokenId, TokenRef>>, token: TokenRef) -> Result<TokenRef> {
		let mut guard = map.write();

		if guard.contains_key(&token.id) {
			return Err(Error::conflict("token", &token.id));
		}

		guard.insert(token.id.clone(), token.clone());

		Ok(token)
	}

	pub(crate) fn get_now(map: &RwLock<HashMap<TokenId, TokenRef>>, id: &TokenId) -> Result<TokenRef> {
		map.read().get(id).cloned().ok_or_else(|| Error::not_found("token", id))
	}

	pub(crate) fn delete_now(map: &RwLock<HashMap<TokenId, TokenRef>>, id: &TokenId) -> Result<()> {
		map.write().remove(id).map(|_| ()).ok_or_else(|| Error::not_found("token", id))
	}

	pub(crate) fn list_now(map: &RwLock<HashMap<TokenId, TokenRef>>, user_id: &UserId) -> Vec<TokenId> {
		let mut ids = map
			.read()
			.values()
			.filter(|token| &token.user.id == user_id)
			.map(|token| token.id.clone())
			.collect::<Vec<_>>();

		ids.sort();

		ids
	}

	pub(crate) fn purge_now(map: &RwLock<HashMap<TokenId, TokenRef>>, now: OffsetDateTime) -> usize {
		let mut guard = map.write();
		let before = guard.len();

		guard.retain(|_, token| !token.is_expired_at(now));

		before - guard.len()
	}
}
impl Driver for MemoryTokenStore {
	fn driver_name(&self) -> &'static str {
		"memory"
	}

	fn capabilities(&self) -> &'static [&'static str] {
		CAPABILITIES
	}
}
impl TokenDriver for MemoryTokenStore {
	fn create_token(&self, token: TokenRef) -> StoreFuture<'_, TokenRef> {
		let map = self.0.clone();

		Box::pin(async move { Self::create_now(&map, token) })
	}

	fn get_token<'a>(&'a self, id: &'a TokenId) -> StoreFuture<'a, TokenRef> {
		let map = self.0.clone();

		Box::pin(async move { Self::get_now(&map, id) })
	}

	fn delete_token<'a>(&'a self, id: &'a TokenId) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::delete_now(&map, id) })
	}

	fn list_tokens<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Vec<TokenId>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::list_now(&map, user_id)) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::purge_now(&map, now)) })
	}
}
