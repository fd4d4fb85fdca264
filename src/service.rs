//! Service facade wiring identity, token, policy and catalog managers together.
//!
//! Transports call into [`Services`] with a [`RequestContext`] built from the incoming request.
//! Every facade operation is observed through [`crate::obs`]: a `keystone_core.operation` span
//! plus attempt/success/failure counters.

// self
use crate::{
	_prelude::*,
	auth::{TenantId, TokenId},
	catalog::{Catalog, CatalogDriver},
	config::Config,
	context::RequestContext,
	identity::IdentityDriver,
	manager::Manager,
	obs::{Operation, observe},
	policy::PolicyDriver,
	token::{TokenApi, TokenData, TokenRef},
};

const INVALID_TOKEN: &str = "Invalid or expired token";
const INVALID_CREDENTIALS: &str = "Invalid user / password";

/// Password credentials presented to [`Services::authenticate`].
#[derive(Clone, Deserialize)]
pub struct AuthRequest {
	/// Login name.
	pub username: String,
	/// Plaintext password.
	pub password: String,
	/// Tenant to scope the token to, by id.
	#[serde(default)]
	pub tenant_id: Option<TenantId>,
	/// Tenant to scope the token to, by name; ignored when `tenant_id` is set.
	#[serde(default)]
	pub tenant_name: Option<String>,
}
impl AuthRequest {
	/// Creates an unscoped request.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: password.into(), tenant_id: None, tenant_name: None }
	}

	/// Scopes the request to a tenant id.
	pub fn with_tenant_id(mut self, tenant_id: TenantId) -> Self {
		self.tenant_id = Some(tenant_id);

		self
	}

	/// Scopes the request to a tenant name.
	pub fn with_tenant_name(mut self, tenant_name: impl Into<String>) -> Self {
		self.tenant_name = Some(tenant_name.into());

		self
	}
}
impl Debug for AuthRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthRequest")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.field("tenant_id", &self.tenant_id)
			.field("tenant_name", &self.tenant_name)
			.finish()
	}
}

/// Token issued by [`Services::authenticate`], with the catalog for scoped tokens.
#[derive(Clone, Debug, Serialize)]
pub struct AuthResponse {
	/// Issued token.
	pub token: TokenRef,
	/// Endpoint catalog; present for tenant-scoped tokens when the catalog backend has templates.
	pub catalog: Option<Catalog>,
}

/// Managers for every backend group plus the configuration they were built from.
#[derive(Debug)]
pub struct Services {
	/// Configuration the managers were built from.
	pub config: Config,
	/// Users, tenants and grants.
	pub identity: Manager<dyn IdentityDriver>,
	/// Token lifecycle engine.
	pub token: TokenApi,
	/// Authorization.
	pub policy: Manager<dyn PolicyDriver>,
	/// Endpoint catalog and service records.
	pub catalog: Manager<dyn CatalogDriver>,
}
impl Services {
	/// Builds every manager from the built-in registries. Unknown driver names are fatal.
	pub fn from_config(config: Config) -> Result<Self> {
		let identity = Manager::<dyn IdentityDriver>::from_config(&config)?;
		let token = TokenApi::from_config(&config)?;
		let policy = Manager::<dyn PolicyDriver>::from_config(&config)?;
		let catalog = Manager::<dyn CatalogDriver>::from_config(&config)?;

		Ok(Self { config, identity, token, policy, catalog })
	}

	/// Verifies password credentials and issues a token.
	///
	/// Unknown users or tenants fail exactly like a wrong password.
	pub async fn authenticate(&self, ctx: &RequestContext, request: AuthRequest) -> Result<AuthResponse> {
		observe(Operation::Authenticate, "authenticate", async move {
			let user = self
				.identity
				.get_user_by_name(ctx, &request.username)
				.await
				.map_err(hide_not_found(INVALID_CREDENTIALS))?;
			let tenant_id = match (request.tenant_id, request.tenant_name) {
				(Some(tenant_id), _) => Some(tenant_id),
				(None, Some(name)) => Some(
					self.identity
						.get_tenant_by_name(ctx, &name)
						.await
						.map_err(hide_not_found(INVALID_CREDENTIALS))?
						.id,
				),
				(None, None) => None,
			};
			let outcome = self
				.identity
				.authenticate(ctx, &user.id, tenant_id.as_ref(), &request.password)
				.await?;
			let mut data = TokenData::new(outcome.user).with_metadata(outcome.metadata);

			if let Some(tenant) = outcome.tenant {
				data = data.with_tenant(tenant);
			}

			let token = self.token.create_token(ctx, TokenId::generate(), data).await?;
			let catalog = match &token.tenant {
				Some(tenant) => self.optional_catalog(ctx, &token, &tenant.id)?,
				None => None,
			};

			#[cfg(feature = "tracing")]
			tracing::debug!(user = %token.user.id, scoped = token.tenant.is_some(), "token issued");

			Ok(AuthResponse { token, catalog })
		})
		.await
	}

	/// Returns the token if it exists and has not expired.
	pub async fn validate_token(&self, ctx: &RequestContext, token_id: &TokenId) -> Result<TokenRef> {
		observe(Operation::ValidateToken, "validate_token", self.token.validate_token(ctx, token_id))
			.await
	}

	/// Revokes a token.
	pub async fn revoke_token(&self, ctx: &RequestContext, token_id: &TokenId) -> Result<()> {
		observe(Operation::RevokeToken, "revoke_token", self.token.delete_token(ctx, token_id)).await
	}

	/// Builds policy credentials from a token: its metadata plus `user_id`, `tenant_id` and,
	/// for administrative contexts, `is_admin`.
	pub fn credentials_for(&self, ctx: &RequestContext, token: &TokenRef) -> Attributes {
		let mut credentials = token.metadata.clone();

		credentials.insert("user_id".into(), token.user.id.to_string().into());

		if let Some(tenant) = &token.tenant {
			credentials.insert("tenant_id".into(), tenant.id.to_string().into());
		}
		if ctx.is_admin {
			credentials.insert("is_admin".into(), true.into());
		}

		credentials
	}

	/// Authorizes `action` on `target` for the caller identified by the context token.
	///
	/// A context without a token is allowed only when administrative; an invalid or expired
	/// token is [`Error::Unauthorized`].
	pub async fn enforce(&self, ctx: &RequestContext, action: &str, target: &Attributes) -> Result<()> {
		observe(Operation::Enforce, "enforce", async move {
			let credentials = self.caller_credentials(ctx).await?;

			self.policy.enforce(ctx, &credentials, action, target)
		})
		.await
	}

	/// Requires an administrative caller: either the admin token or a token passing
	/// `admin_required`.
	pub async fn assert_admin(&self, ctx: &RequestContext) -> Result<()> {
		if ctx.is_admin {
			return Ok(());
		}

		self.enforce(ctx, "admin_required", &ctx.params).await
	}

	/// Expands the endpoint catalog for a valid token.
	pub async fn catalog_for_token(&self, ctx: &RequestContext, token_id: &TokenId) -> Result<Catalog> {
		observe(Operation::Catalog, "catalog_for_token", async move {
			let token = self.token.validate_token(ctx, token_id).await?;

			self.catalog.get_catalog(
				ctx,
				&token.user.id,
				token.tenant.as_ref().map(|tenant| &tenant.id),
				&token.metadata,
			)
		})
		.await
	}

	async fn caller_credentials(&self, ctx: &RequestContext) -> Result<Attributes> {
		let Some(raw) = ctx.token_id.as_deref() else {
			if ctx.is_admin {
				return Ok(Attributes::from_iter([("is_admin".to_owned(), JsonValue::Bool(true))]));
			}

			return Err(Error::unauthorized("No token in request"));
		};

		if ctx.is_admin && raw == self.config.admin_token {
			return Ok(Attributes::from_iter([("is_admin".to_owned(), JsonValue::Bool(true))]));
		}

		let token_id = TokenId::new(raw).map_err(|_| Error::unauthorized(INVALID_TOKEN))?;
		let token = self
			.token
			.validate_token(ctx, &token_id)
			.await
			.map_err(hide_not_found(INVALID_TOKEN))?;

		Ok(self.credentials_for(ctx, &token))
	}

	fn optional_catalog(
		&self,
		ctx: &RequestContext,
		token: &TokenRef,
		tenant_id: &TenantId,
	) -> Result<Option<Catalog>> {
		match self.catalog.get_catalog(ctx, &token.user.id, Some(tenant_id), &token.metadata) {
			Ok(catalog) => Ok(Some(catalog)),
			Err(Error::CapabilityMissing { .. }) => Ok(None),
			Err(e) => Err(e),
		}
	}
}

fn hide_not_found(reason: &'static str) -> impl Fn(Error) -> Error {
	move |e| if e.is_not_found() { Error::unauthorized(reason) } else { e }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{TEST_PASSWORD, build_test_services};

	#[tokio::test]
	async fn scoped_authentication_issues_a_token_with_catalog() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let services = build_test_services(dir.path()).await;
		let ctx = RequestContext::default();
		let response = services
			.authenticate(&ctx, AuthRequest::new("foo", TEST_PASSWORD).with_tenant_name("bar"))
			.await
			.expect("Fixture credentials should authenticate.");

		assert_eq!(response.token.roles(), ["member"]);

		let catalog = response.catalog.expect("Scoped tokens carry a catalog.");

		assert_eq!(
			catalog["RegionOne"]["compute"]["publicURL"],
			"http://localhost:8774/v1.1/tenant-bar"
		);
	}

	#[tokio::test]
	async fn unknown_users_and_tenants_look_like_bad_passwords() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let services = build_test_services(dir.path()).await;
		let ctx = RequestContext::default();

		for request in [
			AuthRequest::new("nobody", TEST_PASSWORD),
			AuthRequest::new("foo", "wrong"),
			AuthRequest::new("foo", TEST_PASSWORD).with_tenant_name("nowhere"),
		] {
			let err = services.authenticate(&ctx, request).await.expect_err("Must be rejected.");

			assert!(matches!(err, Error::Unauthorized { .. }), "{err}");
		}
	}

	#[tokio::test]
	async fn anonymous_and_admin_contexts() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let services = build_test_services(dir.path()).await;
		let anonymous = RequestContext::default();

		assert!(matches!(
			services.enforce(&anonymous, "identity:get_user", &Attributes::new()).await,
			Err(Error::Unauthorized { .. })
		));

		let admin = RequestContext::from_headers([("X-Auth-Token", "ADMIN")], &services.config.admin_token);

		services.assert_admin(&admin).await.expect("Admin token passes.");
		services
			.enforce(&admin, "identity:create_user", &Attributes::new())
			.await
			.expect("Admin token satisfies admin_required.");
	}
}
