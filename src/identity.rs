//! Users, tenants, role grants, and password authentication.

pub mod memory;

pub use memory::MemoryIdentity;

// self
use crate::{
	_prelude::*,
	auth::{TenantId, UserId},
	config::Config,
	context::RequestContext,
	manager::{Driver, DriverRegistry, Manager},
	store::StoreFuture,
};

/// Public view of a user record. Password hashes never leave the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
	/// Stable identifier.
	pub id: UserId,
	/// Unique login name.
	pub name: String,
	/// Disabled users cannot authenticate.
	#[serde(default = "enabled")]
	pub enabled: bool,
	/// Backend-opaque attributes (email, ...).
	#[serde(default)]
	pub extra: Attributes,
}
impl UserRef {
	/// Creates an enabled user without extra attributes.
	pub fn new(id: UserId, name: impl Into<String>) -> Self {
		Self { id, name: name.into(), enabled: true, extra: Attributes::new() }
	}
}

/// Tenant (project) record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRef {
	/// Stable identifier.
	pub id: TenantId,
	/// Unique tenant name.
	pub name: String,
	/// Disabled tenants cannot be used to scope a token.
	#[serde(default = "enabled")]
	pub enabled: bool,
	/// Free-form description.
	#[serde(default)]
	pub description: Option<String>,
}
impl TenantRef {
	/// Creates an enabled tenant without a description.
	pub fn new(id: TenantId, name: impl Into<String>) -> Self {
		Self { id, name: name.into(), enabled: true, description: None }
	}

	/// Attaches a description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());

		self
	}
}

/// Payload for [`IdentityDriver::create_user`].
#[derive(Clone, Deserialize)]
pub struct NewUser {
	/// User record to store.
	#[serde(flatten)]
	pub user: UserRef,
	/// Plaintext (or already hashed) password; hashed by the backend before storage.
	#[serde(default)]
	pub password: Option<String>,
}
impl NewUser {
	/// Creates an enabled user payload without a password.
	pub fn new(id: UserId, name: impl Into<String>) -> Self {
		Self { user: UserRef::new(id, name), password: None }
	}

	/// Sets the password.
	pub fn with_password(mut self, password: impl Into<String>) -> Self {
		self.password = Some(password.into());

		self
	}

	/// Marks the user as disabled.
	pub fn disabled(mut self) -> Self {
		self.user.enabled = false;

		self
	}
}
impl Debug for NewUser {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("NewUser")
			.field("user", &self.user)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Successful authentication result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Authenticated {
	/// Authenticated user.
	pub user: UserRef,
	/// Tenant the caller scoped to, if requested.
	pub tenant: Option<TenantRef>,
	/// Per (user, tenant) metadata; empty when unscoped.
	pub metadata: Attributes,
}
impl Authenticated {
	/// Role names granted in `metadata.roles`.
	pub fn roles(&self) -> Vec<String> {
		roles_of(&self.metadata)
	}
}

/// Storage contract implemented by identity backends.
pub trait IdentityDriver: Driver {
	/// Verifies a password and optional tenant membership.
	///
	/// Every failure is [`Error::Unauthorized`] with the same reason.
	fn authenticate<'a>(
		&'a self,
		user_id: &'a UserId,
		tenant_id: Option<&'a TenantId>,
		password: &'a str,
	) -> StoreFuture<'a, Authenticated>;

	/// Fetches a user by id.
	fn get_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, UserRef>;

	/// Fetches a user by name.
	fn get_user_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, UserRef>;

	/// Fetches a tenant by id.
	fn get_tenant<'a>(&'a self, tenant_id: &'a TenantId) -> StoreFuture<'a, TenantRef>;

	/// Fetches a tenant by name.
	fn get_tenant_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, TenantRef>;

	/// Fetches the metadata stored for a (user, tenant) pair.
	fn get_metadata<'a>(
		&'a self,
		user_id: &'a UserId,
		tenant_id: &'a TenantId,
	) -> StoreFuture<'a, Attributes>;

	/// Stores a new user, hashing its password.
	fn create_user(&self, user: NewUser) -> StoreFuture<'_, UserRef>;

	/// Stores a new tenant.
	fn create_tenant(&self, tenant: TenantRef) -> StoreFuture<'_, TenantRef>;

	/// Grants tenant membership.
	fn add_user_to_tenant<'a>(
		&'a self,
		tenant_id: &'a TenantId,
		user_id: &'a UserId,
	) -> StoreFuture<'a, ()>;

	/// Grants a role on a tenant; granting an existing role is a no-op.
	fn add_role_to_user_and_tenant<'a>(
		&'a self,
		user_id: &'a UserId,
		tenant_id: &'a TenantId,
		role: &'a str,
	) -> StoreFuture<'a, ()>;

	/// Lists the roles granted on a tenant.
	fn get_roles_for_user_and_tenant<'a>(
		&'a self,
		user_id: &'a UserId,
		tenant_id: &'a TenantId,
	) -> StoreFuture<'a, Vec<String>>;
}

/// Built-in identity backends: `memory`.
pub fn registry() -> DriverRegistry<dyn IdentityDriver> {
	DriverRegistry::new("identity").register("memory", build_memory)
}

fn build_memory(config: &Config) -> Result<Arc<dyn IdentityDriver>> {
	let driver: Arc<dyn IdentityDriver> = Arc::new(MemoryIdentity::new(config.crypt_strength));

	Ok(driver)
}

impl Manager<dyn IdentityDriver> {
	/// Builds the identity manager named by `[identity] driver`.
	pub fn from_config(config: &Config) -> Result<Self> {
		Self::new(config, &registry(), &config.identity.driver)
	}

	/// See [`IdentityDriver::authenticate`].
	pub async fn authenticate(
		&self,
		ctx: &RequestContext,
		user_id: &UserId,
		tenant_id: Option<&TenantId>,
		password: &str,
	) -> Result<Authenticated> {
		self.forward_async(ctx, "authenticate", |driver| {
			driver.authenticate(user_id, tenant_id, password)
		})
		.await
	}

	/// See [`IdentityDriver::get_user`].
	pub async fn get_user(&self, ctx: &RequestContext, user_id: &UserId) -> Result<UserRef> {
		self.forward_async(ctx, "get_user", |driver| driver.get_user(user_id)).await
	}

	/// See [`IdentityDriver::get_user_by_name`].
	pub async fn get_user_by_name(&self, ctx: &RequestContext, name: &str) -> Result<UserRef> {
		self.forward_async(ctx, "get_user_by_name", |driver| driver.get_user_by_name(name)).await
	}

	/// See [`IdentityDriver::get_tenant`].
	pub async fn get_tenant(&self, ctx: &RequestContext, tenant_id: &TenantId) -> Result<TenantRef> {
		self.forward_async(ctx, "get_tenant", |driver| driver.get_tenant(tenant_id)).await
	}

	/// See [`IdentityDriver::get_tenant_by_name`].
	pub async fn get_tenant_by_name(&self, ctx: &RequestContext, name: &str) -> Result<TenantRef> {
		self.forward_async(ctx, "get_tenant_by_name", |driver| driver.get_tenant_by_name(name))
			.await
	}

	/// See [`IdentityDriver::get_metadata`].
	pub async fn get_metadata(
		&self,
		ctx: &RequestContext,
		user_id: &UserId,
		tenant_id: &TenantId,
	) -> Result<Attributes> {
		self.forward_async(ctx, "get_metadata", |driver| driver.get_metadata(user_id, tenant_id))
			.await
	}

	/// See [`IdentityDriver::create_user`].
	pub async fn create_user(&self, ctx: &RequestContext, user: NewUser) -> Result<UserRef> {
		self.forward_async(ctx, "create_user", |driver| driver.create_user(user)).await
	}

	/// See [`IdentityDriver::create_tenant`].
	pub async fn create_tenant(&self, ctx: &RequestContext, tenant: TenantRef) -> Result<TenantRef> {
		self.forward_async(ctx, "create_tenant", |driver| driver.create_tenant(tenant)).await
	}

	/// See [`IdentityDriver::add_user_to_tenant`].
	pub async fn add_user_to_tenant(
		&self,
		ctx: &RequestContext,
		tenant_id: &TenantId,
		user_id: &UserId,
	) -> Result<()> {
		self.forward_async(ctx, "add_user_to_tenant", |driver| {
			driver.add_user_to_tenant(tenant_id, user_id)
		})
		.await
	}

	/// See [`IdentityDriver::add_role_to_user_and_tenant`].
	pub async fn add_role_to_user_and_tenant(
		&self,
		ctx: &RequestContext,
		user_id: &UserId,
		tenant_id: &TenantId,
		role: &str,
	) -> Result<()> {
		self.forward_async(ctx, "add_role_to_user_and_tenant", |driver| {
			driver.add_role_to_user_and_tenant(user_id, tenant_id, role)
		})
		.await
	}

	/// See [`IdentityDriver::get_roles_for_user_and_tenant`].
	pub async fn get_roles_for_user_and_tenant(
		&self,
		ctx: &RequestContext,
		user_id: &UserId,
		tenant_id: &TenantId,
	) -> Result<Vec<String>> {
		self.forward_async(ctx, "get_roles_for_user_and_tenant", |driver| {
			driver.get_roles_for_user_and_tenant(user_id, tenant_id)
		})
		.await
	}
}

/// Extracts `roles` from a metadata mapping, skipping non-string entries.
pub fn roles_of(metadata: &Attributes) -> Vec<String> {
	match metadata.get("roles") {
		Some(JsonValue::Array(values)) =>
			values.iter().filter_map(|value| value.as_str().map(str::to_owned)).collect(),
		_ => Vec::new(),
	}
}

fn enabled() -> bool {
	true
}
