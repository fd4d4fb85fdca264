//! Token lifecycle engine and the token driver contract.
//!
//! A token moves from absent to active when it is created and leaves the active state either
//! by explicit deletion (revocation) or by passing its expiry instant. Storage never enforces
//! expiry on reads; [`TokenApi::validate_token`] does, so backends may defer physical cleanup to
//! [`TokenApi::purge_expired`].

pub mod file;
pub mod memory;
pub mod record;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;
pub use record::*;

// self
use crate::{
	_prelude::*,
	auth::{TokenId, UserId},
	config::Config,
	context::RequestContext,
	error::ConfigError,
	manager::{Driver, DriverRegistry, Manager},
	obs::{Operation, observe},
	store::{self, StoreFuture},
};

/// Storage contract implemented by token backends.
pub trait TokenDriver: Driver {
	/// Stores a new token. Built-in backends refuse to overwrite an existing id.
	fn create_token(&self, token: TokenRef) -> StoreFuture<'_, TokenRef>;

	/// Fetches a token by id, or [`Error::NotFound`]. Expiry is not checked.
	fn get_token<'a>(&'a self, id: &'a TokenId) -> StoreFuture<'a, TokenRef>;

	/// Removes a token by id, or [`Error::NotFound`] if absent.
	fn delete_token<'a>(&'a self, id: &'a TokenId) -> StoreFuture<'a, ()>;

	/// Lists the ids of tokens issued to `user_id`.
	fn list_tokens<'a>(&'a self, _user_id: &'a UserId) -> StoreFuture<'a, Vec<TokenId>> {
		store::missing(self.driver_name(), "list_tokens")
	}

	/// Physically removes tokens expired at `now`, returning how many were dropped.
	fn purge_expired(&self, _now: OffsetDateTime) -> StoreFuture<'_, usize> {
		store::missing(self.driver_name(), "purge_expired")
	}
}

/// Built-in token backends: `memory` and `file`.
pub fn registry() -> DriverRegistry<dyn TokenDriver> {
	DriverRegistry::new("token").register("memory", build_memory).register("file", build_file)
}

fn build_memory(_: &Config) -> Result<Arc<dyn TokenDriver>> {
	let driver: Arc<dyn TokenDriver> = Arc::new(MemoryTokenStore::default());

	Ok(driver)
}

fn build_file(config: &Config) -> Result<Arc<dyn TokenDriver>> {
	let path = config.find_file(&config.token.file_path);
	let driver: Arc<dyn TokenDriver> = Arc::new(FileTokenStore::open(path)?);

	Ok(driver)
}

/// Token lifecycle engine: owns expiry computation and fronts the token manager.
#[derive(Debug)]
pub struct TokenApi {
	/// Manager wrapping the configured token driver.
	pub manager: Manager<dyn TokenDriver>,
	expiration: Duration,
}
impl TokenApi {
	/// Wraps a manager with the provided default lifetime.
	pub fn new(manager: Manager<dyn TokenDriver>, expiration: Duration) -> Self {
		Self { manager, expiration }
	}

	/// Builds the engine from `[token]` configuration and the built-in registry.
	pub fn from_config(config: &Config) -> Result<Self> {
		let expiration = config.token.expiration()?;
		let manager = Manager::new(config, &registry(), &config.token.driver)?;

		Ok(Self::new(manager, expiration))
	}

	/// Default lifetime applied to tokens created without an explicit expiry.
	pub fn expiration(&self) -> Duration {
		self.expiration
	}

	/// Expiry instant for a token issued at `now` without an explicit expiry.
	pub fn default_expires_at(&self, now: OffsetDateTime) -> Result<OffsetDateTime> {
		now.checked_add(self.expiration).ok_or_else(|| {
			ConfigError::ExpirationOutOfRange { seconds: self.expiration.whole_seconds() }.into()
		})
	}

	/// Issues a token stamped with the current UTC instant.
	pub async fn create_token(
		&self,
		ctx: &RequestContext,
		id: TokenId,
		data: TokenData,
	) -> Result<TokenRef> {
		self.create_token_at(ctx, id, data, OffsetDateTime::now_utc()).await
	}

	/// Issues a token as if created at `now`.
	pub async fn create_token_at(
		&self,
		ctx: &RequestContext,
		id: TokenId,
		data: TokenData,
		now: OffsetDateTime,
	) -> Result<TokenRef> {
		observe(Operation::IssueToken, "create_token", async move {
			let token = data.into_ref(id, self.default_expires_at(now)?);

			self.manager.forward_async(ctx, "create_token", |driver| driver.create_token(token)).await
		})
		.await
	}

	/// Fetches a token without checking expiry.
	pub async fn get_token(&self, ctx: &RequestContext, id: &TokenId) -> Result<TokenRef> {
		self.manager.forward_async(ctx, "get_token", |driver| driver.get_token(id)).await
	}

	/// Fetches a token and rejects it when expired; expired tokens surface as
	/// [`Error::NotFound`].
	pub async fn validate_token(&self, ctx: &RequestContext, id: &TokenId) -> Result<TokenRef> {
		self.validate_token_at(ctx, id, OffsetDateTime::now_utc()).await
	}

	/// [`TokenApi::validate_token`] against an explicit instant.
	pub async fn validate_token_at(
		&self,
		ctx: &RequestContext,
		id: &TokenId,
		now: OffsetDateTime,
	) -> Result<TokenRef> {
		let token = self.get_token(ctx, id).await?;

		if token.is_expired_at(now) {
			return Err(Error::not_found("token", id));
		}

		Ok(token)
	}

	/// Revokes a token.
	pub async fn delete_token(&self, ctx: &RequestContext, id: &TokenId) -> Result<()> {
		self.manager.forward_async(ctx, "delete_token", |driver| driver.delete_token(id)).await
	}

	/// Lists token ids issued to `user_id`.
	pub async fn list_tokens(&self, ctx: &RequestContext, user_id: &UserId) -> Result<Vec<TokenId>> {
		self.manager.forward_async(ctx, "list_tokens", |driver| driver.list_tokens(user_id)).await
	}

	/// Drops tokens that are expired now.
	pub async fn purge_expired(&self, ctx: &RequestContext) -> Result<usize> {
		let now = OffsetDateTime::now_utc();

		observe(
			Operation::PurgeTokens,
			"purge_expired",
			self.manager.forward_async(ctx, "purge_expired", |driver| driver.purge_expired(now)),
		)
		.await
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::identity::UserRef;

	fn engine() -> TokenApi {
		TokenApi::from_config(&Config::default()).expect("Default token engine should build.")
	}

	fn data() -> TokenData {
		TokenData::new(UserRef::new(UserId::new("user-1").expect("User fixture."), "foo"))
	}

	#[tokio::test]
	async fn default_expiry_is_issue_instant_plus_lifetime() {
		let engine = engine();
		let ctx = RequestContext::default();
		let issued = macros::datetime!(2025-03-01 12:00 UTC);
		let id = TokenId::generate();
		let token = engine
			.create_token_at(&ctx, id.clone(), data(), issued)
			.await
			.expect("Token creation should succeed.");

		assert_eq!(token.expires, macros::datetime!(2025-03-02 12:00 UTC));

		let fetched = engine.get_token(&ctx, &id).await.expect("Token should be stored.");

		assert_eq!(fetched.expires, token.expires);
	}

	#[tokio::test]
	async fn expired_tokens_fail_validation_but_remain_readable() {
		let engine = engine();
		let ctx = RequestContext::default();
		let id = TokenId::generate();

		engine
			.create_token(&ctx, id.clone(), data().expires_at(OffsetDateTime::now_utc() - Duration::minutes(1)))
			.await
			.expect("Token creation should succeed.");

		assert!(engine.get_token(&ctx, &id).await.is_ok());
		assert!(matches!(
			engine.validate_token(&ctx, &id).await,
			Err(Error::NotFound { kind: "token", .. })
		));
	}

	#[test]
	fn overflowing_lifetimes_are_configuration_errors() {
		let manager = Manager::with_driver("token", build_memory(&Config::default()).expect("Driver."));
		let engine = TokenApi::new(manager, Duration::MAX);

		assert!(matches!(
			engine.default_expires_at(OffsetDateTime::now_utc()),
			Err(Error::Config(ConfigError::ExpirationOutOfRange { .. }))
		));
	}
}
