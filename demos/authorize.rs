//! Walks through the identity core end to end: seed a tenant and two users, authenticate,
//! enforce a few policy rules, expand the catalog, then revoke the token.

// std
use std::fs;
// crates.io
use color_eyre::Result;
// self
use keystone_core::{
	auth::{TenantId, UserId},
	config::Config,
	context::RequestContext,
	identity::{NewUser, TenantRef},
	service::{AuthRequest, Services},
};

const POLICY: &str = r#"{
	"admin_required": [["role:admin"], ["is_admin:1"]],
	"default": "rule:admin_required",
	"compute:create_instance": "role:member and tenant_id:%(tenant_id)s"
}"#;
const TEMPLATES: &str = "\
catalog.RegionOne.identity.publicURL = http://localhost:$(public_port)s/v2.0
catalog.RegionOne.compute.publicURL = http://localhost:$(compute_port)s/v1.1/$(tenant_id)s
catalog.RegionOne.compute.name = 'Compute Service'
";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let dir = tempfile::tempdir()?;

	fs::write(dir.path().join("policy.json"), POLICY)?;
	fs::write(dir.path().join("catalog.templates"), TEMPLATES)?;
	fs::write(
		dir.path().join("keystone.toml"),
		"compute_port = \"8774\"\ncrypt_strength = 1000\n\n[catalog]\ntemplate_file = \"catalog.templates\"\n",
	)?;

	let config = Config::load(dir.path().join("keystone.toml"))?;
	let services = Services::from_config(config)?;
	let admin = RequestContext::admin();
	let tenant = TenantId::new("tenant-demo")?;
	let user = UserId::new("user-demo")?;

	services.identity.create_tenant(&admin, TenantRef::new(tenant.clone(), "demo")).await?;
	services
		.identity
		.create_user(&admin, NewUser::new(user.clone(), "alice").with_password("wonderland"))
		.await?;
	services.identity.add_user_to_tenant(&admin, &tenant, &user).await?;
	services.identity.add_role_to_user_and_tenant(&admin, &user, &tenant, "member").await?;

	let response = services
		.authenticate(
			&RequestContext::default(),
			AuthRequest::new("alice", "wonderland").with_tenant_name("demo"),
		)
		.await?;

	println!("Issued token for {} expiring at {}.", response.token.user.name, response.token.expires);

	if let Some(catalog) = &response.catalog {
		println!("Catalog: {}", serde_json::to_string_pretty(catalog)?);
	}

	let ctx = RequestContext::with_token(response.token.id.to_string());
	let own_tenant = serde_json::json!({ "tenant_id": tenant.to_string() });
	let other_tenant = serde_json::json!({ "tenant_id": "tenant-other" });

	for (label, target) in [("own tenant", own_tenant), ("other tenant", other_tenant)] {
		let target = target.as_object().cloned().unwrap_or_default();
		let verdict = services.enforce(&ctx, "compute:create_instance", &target).await;

		println!("compute:create_instance on {label}: {verdict:?}");
	}

	println!("assert_admin as member: {:?}", services.assert_admin(&ctx).await);

	services.revoke_token(&RequestContext::default(), &response.token.id).await?;

	println!(
		"After revocation: {:?}",
		services.validate_token(&RequestContext::default(), &response.token.id).await
	);

	Ok(())
}
