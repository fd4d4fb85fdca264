//! Endpoint catalog generated from `catalog.<REGION>.<SERVICE>.<KEY> = <VALUE>` templates.
//!
//! Values may reference `$(name)s` placeholders. Expansion uses the flattened configuration
//! plus `user_id` and, for scoped requests, `tenant_id`.

// std
use std::fs;
// self
use crate::{
	_prelude::*,
	auth::{ServiceId, TenantId, UserId},
	catalog::{Catalog, CatalogDriver, MemoryCatalog, ServiceRef},
	config::Config,
	error::ConfigError,
	manager::Driver,
	template::{self, TemplateError},
};

/// Parses template lines, skipping anything that is not a well-formed catalog entry.
///
/// Underscores in service names become hyphens (`object_store` → `object-store`). Keys with
/// more than four segments keep the remainder joined by dots.
pub fn parse_templates(text: &str) -> Catalog {
	let mut catalog = Catalog::new();

	for line in text.lines() {
		let Some((key, value)) = line.trim().split_once(" = ") else {
			continue;
		};
		let Some(path) = key.strip_prefix("catalog.") else {
			continue;
		};
		let parts = path.split('.').collect::<Vec<_>>();

		if parts.len() < 3 || parts.iter().any(|part| part.is_empty()) {
			continue;
		}

		catalog
			.entry(parts[0].to_owned())
			.or_default()
			.entry(parts[1].replace('_', "-"))
			.or_default()
			.insert(parts[2..].join("."), value.to_owned());
	}

	catalog
}

/// Catalog backend that expands endpoint templates and delegates service records to an
/// in-memory store.
#[derive(Clone, Debug)]
pub struct TemplatedCatalog {
	templates: Catalog,
	context: BTreeMap<String, String>,
	services: MemoryCatalog,
}
impl TemplatedCatalog {
	/// Loads templates from `[catalog] template_file`.
	pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
		let path = config.find_file(&config.catalog.template_file);
		let text =
			fs::read_to_string(&path).map_err(|source| ConfigError::TemplateIo { path, source })?;

		Ok(Self::with_templates(config, parse_templates(&text)))
	}

	/// Uses already parsed templates instead of reading the template file.
	pub fn with_templates(config: &Config, templates: Catalog) -> Self {
		Self { templates, context: config.substitution_context(), services: MemoryCatalog::default() }
	}

	/// Parsed templates.
	pub fn templates(&self) -> &Catalog {
		&self.templates
	}

	fn expand(&self, value: &str, user_id: &UserId, tenant_id: Option<&TenantId>) -> Result<String, ConfigError> {
		template::expand(value, |key| match key {
			"user_id" => Some(user_id.to_string()),
			"tenant_id" => tenant_id.map(ToString::to_string),
			_ => self.context.get(key).cloned(),
		})
		.map_err(|e| match e {
			TemplateError::Undefined { key } =>
				ConfigError::UndefinedSubstitution { key, template: value.to_owned() },
			TemplateError::Unterminated => ConfigError::MalformedTemplate { template: value.to_owned() },
		})
	}
}
impl Driver for TemplatedCatalog {
	fn driver_name(&self) -> &'static str {
		"templated"
	}

	fn capabilities(&self) -> &'static [&'static str] {
		&["get_catalog", "get_service", "list_services", "create_service", "delete_service"]
	}
}
impl CatalogDriver for TemplatedCatalog {
	fn get_catalog(
		&self,
		user_id: &UserId,
		tenant_id: Option<&TenantId>,
		_metadata: &Attributes,
	) -> Result<Catalog> {
		let mut catalog = Catalog::new();

		for (region, services) in &self.templates {
			let region_ref = catalog.entry(region.clone()).or_default();

			for (service, entries) in services {
				let service_ref = region_ref.entry(service.clone()).or_default();

				for (key, value) in entries {
					service_ref.insert(key.clone(), self.expand(value, user_id, tenant_id)?);
				}
			}
		}

		Ok(catalog)
	}

	fn get_service(&self, service_id: &ServiceId) -> Result<ServiceRef> {
		self.services.get_service(service_id)
	}

	fn list_services(&self) -> Result<Vec<ServiceRef>> {
		self.services.list_services()
	}

	fn create_service(&self, service: ServiceRef) -> Result<ServiceRef> {
		self.services.create_service(service)
	}

	fn delete_service(&self, service_id: &ServiceId) -> Result<()> {
		self.services.delete_service(service_id)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const TEMPLATES: &str = "\
# comment line
catalog.RegionOne.identity.publicURL = http://localhost:$(public_port)s/v2.0
catalog.RegionOne.identity.name = 'Identity Service'
catalog.RegionOne.object_store.publicURL = http://localhost:8080/v1/AUTH_$(tenant_id)s
catalog.RegionOne.compute.extra.nested = yes
catalog.RegionOne.short = dropped
catalog.RegionTwo.identity.publicURL=missing spaces
region.RegionOne.identity.publicURL = not a catalog key
";

	fn user() -> UserId {
		UserId::new("foo").expect("User fixture should be valid.")
	}

	fn tenant() -> TenantId {
		TenantId::new("bar").expect("Tenant fixture should be valid.")
	}

	#[test]
	fn parsing_skips_foreign_lines_and_hyphenates_services() {
		let catalog = parse_templates(TEMPLATES);

		assert_eq!(catalog.len(), 1);

		let region = &catalog["RegionOne"];

		assert_eq!(region.keys().map(String::as_str).collect::<Vec<_>>(), [
			"compute",
			"identity",
			"object-store"
		]);
		assert_eq!(region["compute"]["extra.nested"], "yes");
		assert_eq!(region["identity"]["name"], "'Identity Service'");
	}

	#[test]
	fn expansion_uses_configuration_and_request_ids() {
		let driver = TemplatedCatalog::with_templates(&Config::default(), parse_templates(TEMPLATES));
		let catalog = driver
			.get_catalog(&user(), Some(&tenant()), &Attributes::new())
			.expect("Templates should expand.");

		assert_eq!(catalog["RegionOne"]["identity"]["publicURL"], "http://localhost:5000/v2.0");
		assert_eq!(catalog["RegionOne"]["object-store"]["publicURL"], "http://localhost:8080/v1/AUTH_bar");

		let again = driver
			.get_catalog(&user(), Some(&tenant()), &Attributes::new())
			.expect("Templates should expand again.");

		assert_eq!(again, catalog);
	}

	#[test]
	fn compute_port_has_a_default() {
		let driver = TemplatedCatalog::with_templates(
			&Config::default(),
			parse_templates(
				"catalog.RegionOne.compute.publicURL = http://localhost:$(compute_port)s/v1.1/$(tenant_id)s\n",
			),
		);
		let catalog = driver
			.get_catalog(&user(), Some(&tenant()), &Attributes::new())
			.expect("Stock compute template should expand.");

		assert_eq!(catalog["RegionOne"]["compute"]["publicURL"], "http://localhost:3000/v1.1/bar");
	}

	#[test]
	fn undefined_keys_are_fatal() {
		let driver = TemplatedCatalog::with_templates(&Config::default(), parse_templates(TEMPLATES));
		let err = driver
			.get_catalog(&user(), None, &Attributes::new())
			.expect_err("Unscoped expansion lacks tenant_id.");

		assert!(
			matches!(err, Error::Config(ConfigError::UndefinedSubstitution { ref key, .. }) if key == "tenant_id"),
			"{err}"
		);

		let broken = TemplatedCatalog::with_templates(
			&Config::default(),
			parse_templates("catalog.R.s.url = http://$(public_port\n"),
		);

		assert!(matches!(
			broken.get_catalog(&user(), Some(&tenant()), &Attributes::new()),
			Err(Error::Config(ConfigError::MalformedTemplate { .. }))
		));
	}

	#[test]
	fn missing_template_file_is_reported() {
		let mut config = Config::default();

		config.catalog.template_file = "/nonexistent/default_catalog.templates".into();

		assert!(matches!(TemplatedCatalog::from_config(&config), Err(ConfigError::TemplateIo { .. })));
	}
}
