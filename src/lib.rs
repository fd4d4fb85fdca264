//! Identity core for multi-tenant control planes: swappable identity, token, policy, and catalog
//! drivers behind stable managers, UTC token lifecycles, and live-reloading rule enforcement.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod manager;
pub mod obs;
pub mod policy;
pub mod service;
pub mod store;
pub mod template;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{TenantId, UserId},
		config::Config,
		context::RequestContext,
		identity::{NewUser, TenantRef},
		service::Services,
	};

	/// Password used by every fixture user.
	pub const TEST_PASSWORD: &str = "right";

	/// Policy document used across integration tests.
	pub const TEST_POLICY: &str = r#"{
		"admin_required": [["role:admin"], ["is_admin:1"]],
		"default": "rule:admin_required",
		"identity:get_user": "role:member or rule:admin_required",
		"compute:create_instance": "role:member and tenant_id:%(tenant_id)s"
	}"#;

	/// Catalog template fixture mirroring a single-region deployment.
	pub const TEST_TEMPLATES: &str = "\
catalog.RegionOne.identity.publicURL = http://localhost:$(public_port)s/v2.0
catalog.RegionOne.identity.adminURL = http://localhost:$(admin_port)s/v2.0
catalog.RegionOne.identity.name = 'Identity Service'
catalog.RegionOne.compute.publicURL = http://localhost:$(compute_port)s/v1.1/$(tenant_id)s
catalog.RegionOne.compute.name = 'Compute Service'
";

	/// Builds a configuration whose policy and template files live in `dir`.
	pub fn test_config(dir: &std::path::Path) -> Config {
		let policy = dir.join("policy.json");
		let templates = dir.join("default_catalog.templates");

		std::fs::write(&policy, TEST_POLICY).expect("Failed to write policy fixture.");
		std::fs::write(&templates, TEST_TEMPLATES).expect("Failed to write template fixture.");

		let mut config = Config::default();

		config.public_port = Some("5000".into());
		config.admin_port = Some("35357".into());
		config.compute_port = Some("8774".into());
		config.crypt_strength = 1_000;
		config.policy.policy_file = policy.display().to_string();
		config.catalog.template_file = templates.display().to_string();

		config
	}

	/// Builds [`Services`] from [`test_config`] and seeds one tenant with a member and an
	/// admin user.
	pub async fn build_test_services(dir: &std::path::Path) -> Services {
		let services = Services::from_config(test_config(dir))
			.expect("Failed to build services from the test configuration.");
		let ctx = RequestContext::default();
		let tenant = TenantId::new("tenant-bar").expect("Tenant fixture should be valid.");

		services
			.identity
			.create_tenant(&ctx, TenantRef::new(tenant.clone(), "bar"))
			.await
			.expect("Failed to seed tenant fixture.");

		for (id, name, role) in [("user-foo", "foo", "member"), ("user-boss", "boss", "admin")] {
			let user = UserId::new(id).expect("User fixture should be valid.");

			services
				.identity
				.create_user(&ctx, NewUser::new(user.clone(), name).with_password(TEST_PASSWORD))
				.await
				.expect("Failed to seed user fixture.");
			services
				.identity
				.add_user_to_tenant(&ctx, &tenant, &user)
				.await
				.expect("Failed to add fixture user to tenant.");
			services
				.identity
				.add_role_to_user_and_tenant(&ctx, &user, &tenant, role)
				.await
				.expect("Failed to grant fixture role.");
		}

		services
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};

	/// Opaque JSON attribute mapping (credentials, targets, metadata).
	pub type Attributes = JsonMap<String, JsonValue>;
}

pub use _prelude::Attributes;
#[cfg(test)] use color_eyre as _;
