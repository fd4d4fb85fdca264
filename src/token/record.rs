//! Token references, creation payloads, and logical expiry.

// self
use crate::{
	_prelude::*,
	auth::TokenId,
	identity::{self, TenantRef, UserRef},
};

/// Logical validity of a stored token at some instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is present and has not reached its expiry instant.
	Active,
	/// Token reached its expiry instant; storage may still hold it.
	Expired,
}

/// Stored token reference.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRef {
	/// Opaque bearer identifier; callers must avoid logging it.
	pub id: TokenId,
	/// Expiry instant (UTC), computed once at creation.
	pub expires: OffsetDateTime,
	/// User the token was issued to.
	pub user: UserRef,
	/// Tenant the token is scoped to, if any.
	pub tenant: Option<TenantRef>,
	/// Extension metadata (roles, trust data).
	pub metadata: Attributes,
}
impl TokenRef {
	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant >= self.expires { TokenStatus::Expired } else { TokenStatus::Active }
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		matches!(self.status(), TokenStatus::Expired)
	}

	/// Role names carried in `metadata.roles`.
	pub fn roles(&self) -> Vec<String> {
		identity::roles_of(&self.metadata)
	}
}
impl Debug for TokenRef {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRef")
			.field("id", &"<redacted>")
			.field("expires", &self.expires)
			.field("user", &self.user.id)
			.field("tenant", &self.tenant.as_ref().map(|tenant| &tenant.id))
			.field("metadata", &self.metadata)
			.finish()
	}
}

/// Payload accepted by the token engine when issuing a token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
	/// Explicit expiry; the engine applies its configured lifetime when omitted.
	pub expires: Option<OffsetDateTime>,
	/// User the token is issued to.
	pub user: UserRef,
	/// Optional tenant scope.
	pub tenant: Option<TenantRef>,
	/// Extension metadata.
	pub metadata: Attributes,
}
impl TokenData {
	/// Creates an unscoped payload for `user`.
	pub fn new(user: UserRef) -> Self {
		Self { expires: None, user, tenant: None, metadata: Attributes::new() }
	}

	/// Scopes the token to a tenant.
	pub fn with_tenant(mut self, tenant: TenantRef) -> Self {
		self.tenant = Some(tenant);

		self
	}

	/// Replaces the metadata mapping.
	pub fn with_metadata(mut self, metadata: Attributes) -> Self {
		self.metadata = metadata;

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires = Some(instant);

		self
	}

	/// Finalizes the payload into a stored reference.
	pub fn into_ref(self, id: TokenId, default_expires: OffsetDateTime) -> TokenRef {
		TokenRef {
			id,
			expires: self.expires.unwrap_or(default_expires),
			user: self.user,
			tenant: self.tenant,
			metadata: self.metadata,
		}
	}
}
