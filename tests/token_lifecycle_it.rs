#![cfg(feature = "test")]

// crates.io
use time::macros;
// self
use keystone_core::{
	_preludet::*,
	auth::{TenantId, TokenId, UserId},
	config::Config,
	context::RequestContext,
	identity::{TenantRef, UserRef},
	token::{TokenApi, TokenData},
};

fn data() -> TokenData {
	let user = UserRef::new(UserId::new("user-foo").expect("User fixture should be valid."), "foo");
	let tenant =
		TenantRef::new(TenantId::new("tenant-bar").expect("Tenant fixture should be valid."), "bar");
	let metadata = serde_json::json!({ "roles": ["member"] });

	TokenData::new(user)
		.with_tenant(tenant)
		.with_metadata(metadata.as_object().cloned().expect("Metadata fixture is an object."))
}

fn file_engine(dir: &std::path::Path) -> TokenApi {
	let mut config = Config::default();

	config.token.driver = "file".into();
	config.token.file_path = dir.join("tokens.json").display().to_string();
	config.token.expiration = 3_600;

	TokenApi::from_config(&config).expect("File token engine should build.")
}

#[tokio::test]
async fn create_read_delete_cycle() {
	let engine = TokenApi::from_config(&Config::default()).expect("Memory token engine should build.");
	let ctx = RequestContext::default();
	let id = TokenId::generate();
	let before = OffsetDateTime::now_utc();
	let created = engine.create_token(&ctx, id.clone(), data()).await.expect("Create should succeed.");
	let after = OffsetDateTime::now_utc();

	assert!(created.expires >= before + Duration::days(1));
	assert!(created.expires <= after + Duration::days(1));
	assert_eq!(created.expires.offset(), time::UtcOffset::UTC);

	let fetched = engine.validate_token(&ctx, &id).await.expect("Fresh token should validate.");

	assert_eq!(fetched, created);
	assert_eq!(fetched.roles(), ["member"]);

	engine.delete_token(&ctx, &id).await.expect("Delete should succeed.");

	assert!(engine.get_token(&ctx, &id).await.expect_err("Deleted token.").is_not_found());
	assert!(engine.delete_token(&ctx, &id).await.expect_err("Second delete.").is_not_found());
}

#[tokio::test]
async fn duplicate_ids_conflict() {
	let engine = TokenApi::from_config(&Config::default()).expect("Memory token engine should build.");
	let ctx = RequestContext::default();
	let id = TokenId::new("fixed").expect("Token id should be valid.");

	engine.create_token(&ctx, id.clone(), data()).await.expect("First create should succeed.");

	assert!(matches!(
		engine.create_token(&ctx, id, data()).await,
		Err(Error::Conflict { kind: "token", .. })
	));
}

#[tokio::test]
async fn file_backend_persists_and_purges() {
	let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
	let ctx = RequestContext::default();
	let issued = macros::datetime!(2020-01-01 00:00 UTC);
	let live = TokenId::generate();
	let stale = TokenId::generate();

	{
		let engine = file_engine(dir.path());

		assert_eq!(engine.expiration(), Duration::hours(1));

		engine
			.create_token(&ctx, live.clone(), data().expires_at(macros::datetime!(2099-01-01 00:00 UTC)))
			.await
			.expect("Create should succeed.");

		let created = engine
			.create_token_at(&ctx, stale.clone(), data(), issued)
			.await
			.expect("Create should succeed.");

		assert_eq!(created.expires, macros::datetime!(2020-01-01 01:00 UTC));
	}

	let engine = file_engine(dir.path());
	let user = UserId::new("user-foo").expect("User id should be valid.");
	let mut listed = engine.list_tokens(&ctx, &user).await.expect("Listing should succeed.");
	let mut expected = vec![live.clone(), stale.clone()];

	listed.sort();
	expected.sort();

	assert_eq!(listed, expected);
	assert!(engine.validate_token(&ctx, &stale).await.expect_err("Stale token.").is_not_found());
	assert_eq!(engine.purge_expired(&ctx).await.expect("Purge should succeed."), 1);
	assert_eq!(engine.list_tokens(&ctx, &user).await.expect("Listing should succeed."), vec![live]);
}
