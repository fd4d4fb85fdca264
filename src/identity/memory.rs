//! In-memory identity backend.

// std
use std::collections::BTreeSet;
// self
use crate::{
	_prelude::*,
	auth::{self, TenantId, UserId},
	identity::{Authenticated, IdentityDriver, NewUser, TenantRef, UserRef, roles_of},
	manager::Driver,
	store::StoreFuture,
};

const INVALID_CREDENTIALS: &str = "Invalid user / password";

#[derive(Clone, Debug)]
struct StoredUser {
	user: UserRef,
	password: Option<String>,
}

#[derive(Debug, Default)]
struct IdentityState {
	users: HashMap<UserId, StoredUser>,
	tenants: HashMap<TenantId, TenantRef>,
	memberships: HashMap<UserId, BTreeSet<TenantId>>,
	metadata: HashMap<(UserId, TenantId), Attributes>,
}
impl IdentityState {
	fn user(&self, user_id: &UserId) -> Result<&StoredUser> {
		self.users.get(user_id).ok_or_else(|| Error::not_found("user", user_id))
	}

	fn tenant(&self, tenant_id: &TenantId) -> Result<&TenantRef> {
		self.tenants.get(tenant_id).ok_or_else(|| Error::not_found("tenant", tenant_id))
	}

	fn is_member(&self, user_id: &UserId, tenant_id: &TenantId) -> bool {
		self.memberships.get(user_id).is_some_and(|tenants| tenants.contains(tenant_id))
	}
}

/// Identity backend that keeps users, tenants and grants in-process.
#[derive(Clone, Debug)]
pub struct MemoryIdentity {
	crypt_strength: u32,
	state: Arc<RwLock<IdentityState>>,
}
impl MemoryIdentity {
	/// Creates an empty backend hashing passwords with `crypt_strength` rounds.
	pub fn new(crypt_strength: u32) -> Self {
		Self { crypt_strength, state: Default::default() }
	}

	fn authenticate_now(
		&self,
		user_id: &UserId,
		tenant_id: Option<&TenantId>,
		password: &str,
	) -> Result<Authenticated> {
		let StoredUser { user, password: hashed } = self
			.state
			.read()
			.users
			.get(user_id)
			.cloned()
			.ok_or_else(|| Error::unauthorized(INVALID_CREDENTIALS))?;

		// Verified outside the state lock.
		if !user.enabled || !auth::check_password(Some(password), hashed.as_deref().unwrap_or_default())
		{
			return Err(Error::unauthorized(INVALID_CREDENTIALS));
		}

		let Some(tenant_id) = tenant_id else {
			return Ok(Authenticated { user, tenant: None, metadata: Attributes::new() });
		};
		let state = self.state.read();
		let tenant = state
			.tenants
			.get(tenant_id)
			.filter(|tenant| tenant.enabled && state.is_member(user_id, tenant_id))
			.ok_or_else(|| Error::unauthorized(INVALID_CREDENTIALS))?;
		let metadata =
			state.metadata.get(&(user_id.clone(), tenant_id.clone())).cloned().unwrap_or_default();

		Ok(Authenticated { user, tenant: Some(tenant.clone()), metadata })
	}

	fn create_user_now(&self, new: NewUser) -> Result<UserRef> {
		let password = new
			.password
			.map(|password| auth::hash_password(self.crypt_strength, &password))
			.transpose()?;
		let user = new.user;
		let mut state = self.state.write();

		if state.users.contains_key(&user.id) {
			return Err(Error::conflict("user", &user.id));
		}
		if state.users.values().any(|stored| stored.user.name == user.name) {
			return Err(Error::conflict("user", &user.name));
		}

		state.users.insert(user.id.clone(), StoredUser { user: user.clone(), password });

		Ok(user)
	}

	fn create_tenant_now(&self, tenant: TenantRef) -> Result<TenantRef> {
		let mut state = self.state.write();

		if state.tenants.contains_key(&tenant.id) {
			return Err(Error::conflict("tenant", &tenant.id));
		}
		if state.tenants.values().any(|existing| existing.name == tenant.name) {
			return Err(Error::conflict("tenant", &tenant.name));
		}

		state.tenants.insert(tenant.id.clone(), tenant.clone());

		Ok(tenant)
	}

	fn add_user_to_tenant_now(&self, tenant_id: &TenantId, user_id: &UserId) -> Result<()> {
		let mut state = self.state.write();

		state.tenant(tenant_id)?;
		state.user(user_id)?;
		state.memberships.entry(user_id.clone()).or_default().insert(tenant_id.clone());

		Ok(())
	}

	fn add_role_now(&self, user_id: &UserId, tenant_id: &TenantId, role: &str) -> Result<()> {
		let mut state = self.state.write();

		state.tenant(tenant_id)?;
		state.user(user_id)?;

		let metadata = state.metadata.entry((user_id.clone(), tenant_id.clone())).or_default();
		let mut roles = roles_of(metadata);

		if !roles.iter().any(|existing| existing == role) {
			roles.push(role.to_owned());
		}

		metadata.insert("roles".into(), roles.into());

		Ok(())
	}
}
impl Driver for MemoryIdentity {
	fn driver_name(&self) -> &'static str {
		"memory"
	}

	fn capabilities(&self) -> &'static [&'static str] {
		&[
			"authenticate",
			"get_user",
			"get_user_by_name",
			"get_tenant",
			"get_tenant_by_name",
			"get_metadata",
			"create_user",
			"create_tenant",
			"add_user_to_tenant",
			"add_role_to_user_and_tenant",
			"get_roles_for_user_and_tenant",
		]
	}
}
impl IdentityDriver for MemoryIdentity {
	fn authenticate<'a>(
		&'a self,
		user_id: &'a UserId,
		tenant_id: Option<&'a TenantId>,
		password: &'a str,
	) -> StoreFuture<'a, Authenticated> {
		Box::pin(async move { self.authenticate_now(user_id, tenant_id, password) })
	}

	fn get_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, UserRef> {
		Box::pin(async move { self.state.read().user(user_id).map(|stored| stored.user.clone()) })
	}

	fn get_user_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, UserRef> {
		Box::pin(async move {
			self.state
				.read()
				.users
				.values()
				.find(|stored| stored.user.name == name)
				.map(|stored| stored.user.clone())
				.ok_or_else(|| Error::not_found("user", name))
		})
	}

	fn get_tenant<'a>(&'a self, tenant_id: &'a TenantId) -> StoreFuture<'a, TenantRef> {
		Box::pin(async move { self.state.read().tenant(tenant_id).cloned() })
	}

	fn get_tenant_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, TenantRef> {
		Box::pin(async move {
			self.state
				.read()
				.tenants
				.values()
				.find(|tenant| tenant.name == name)
				.cloned()
				.ok_or_else(|| Error::not_found("tenant", name))
		})
	}

	fn get_metadata<'a>(
		&'a self,
		user_id: &'a UserId,
		tenant_id: &'a TenantId,
	) -> StoreFuture<'a, Attributes> {
		Box::pin(async move {
			self.state
				.read()
				.metadata
				.get(&(user_id.clone(), tenant_id.clone()))
				.cloned()
				.ok_or_else(|| Error::not_found("metadata", format!("{user_id}/{tenant_id}")))
		})
	}

	fn create_user(&self, user: NewUser) -> StoreFuture<'_, UserRef> {
		Box::pin(async move { self.create_user_now(user) })
	}

	fn create_tenant(&self, tenant: TenantRef) -> StoreFuture<'_, TenantRef> {
		Box::pin(async move { self.create_tenant_now(tenant) })
	}

	fn add_user_to_tenant<'a>(
		&'a self,
		tenant_id: &'a TenantId,
		user_id: &'a UserId,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.add_user_to_tenant_now(tenant_id, user_id) })
	}

	fn add_role_to_user_and_tenant<'a>(
		&'a self,
		user_id: &'a UserId,
		tenant_id: &'a TenantId,
		role: &'a str,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.add_role_now(user_id, tenant_id, role) })
	}

	fn get_roles_for_user_and_tenant<'a>(
		&'a self,
		user_id: &'a UserId,
		tenant_id: &'a TenantId,
	) -> StoreFuture<'a, Vec<String>> {
		Box::pin(async move {
			let state = self.state.read();

			state.tenant(tenant_id)?;
			state.user(user_id)?;

			Ok(state
				.metadata
				.get(&(user_id.clone(), tenant_id.clone()))
				.map(roles_of)
				.unwrap_or_default())
		})
	}
}
