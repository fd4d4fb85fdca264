//! Service catalog: endpoint templates per region and service records.

pub mod memory;
pub mod templated;

pub use memory::MemoryCatalog;
pub use templated::{TemplatedCatalog, parse_templates};

// self
use crate::{
	_prelude::*,
	auth::{ServiceId, TenantId, UserId},
	config::Config,
	context::RequestContext,
	manager::{Driver, DriverRegistry, Manager},
};

/// Region → service → key → value. Keys are backend-opaque; by convention `name`, `publicURL`,
/// `adminURL` and `internalURL`.
pub type Catalog = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// Registered service record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
	/// Stable identifier.
	pub id: ServiceId,
	/// Service type, e.g. `compute` or `identity`.
	#[serde(rename = "type")]
	pub service_type: String,
	/// Display name.
	pub name: String,
	/// Free-form description.
	#[serde(default)]
	pub description: Option<String>,
}
impl ServiceRef {
	/// Creates a record without a description.
	pub fn new(id: ServiceId, service_type: impl Into<String>, name: impl Into<String>) -> Self {
		Self { id, service_type: service_type.into(), name: name.into(), description: None }
	}
}

/// Catalog contract implemented by catalog backends.
pub trait CatalogDriver: Driver {
	/// Builds the endpoint catalog for a user, optionally scoped to a tenant.
	fn get_catalog(
		&self,
		_user_id: &UserId,
		_tenant_id: Option<&TenantId>,
		_metadata: &Attributes,
	) -> Result<Catalog> {
		Err(Error::CapabilityMissing { driver: self.driver_name(), operation: "get_catalog" })
	}

	/// Fetches a service record.
	fn get_service(&self, service_id: &ServiceId) -> Result<ServiceRef>;

	/// Lists service records ordered by id.
	fn list_services(&self) -> Result<Vec<ServiceRef>>;

	/// Stores a new service record.
	fn create_service(&self, service: ServiceRef) -> Result<ServiceRef>;

	/// Removes a service record.
	fn delete_service(&self, service_id: &ServiceId) -> Result<()>;
}

/// Built-in catalog backends: `templated` and `memory`.
pub fn registry() -> DriverRegistry<dyn CatalogDriver> {
	DriverRegistry::new("catalog")
		.register("templated", build_templated)
		.register("memory", build_memory)
}

fn build_templated(config: &Config) -> Result<Arc<dyn CatalogDriver>> {
	let driver: Arc<dyn CatalogDriver> = Arc::new(TemplatedCatalog::from_config(config)?);

	Ok(driver)
}

fn build_memory(_: &Config) -> Result<Arc<dyn CatalogDriver>> {
	let driver: Arc<dyn CatalogDriver> = Arc::new(MemoryCatalog::default());

	Ok(driver)
}

impl Manager<dyn CatalogDriver> {
	/// Builds the catalog manager named by `[catalog] driver`.
	pub fn from_config(config: &Config) -> Result<Self> {
		Self::new(config, &registry(), &config.catalog.driver)
	}

	/// See [`CatalogDriver::get_catalog`].
	pub fn get_catalog(
		&self,
		ctx: &RequestContext,
		user_id: &UserId,
		tenant_id: Option<&TenantId>,
		metadata: &Attributes,
	) -> Result<Catalog> {
		self.forward(ctx, "get_catalog", |driver| driver.get_catalog(user_id, tenant_id, metadata))
	}

	/// See [`CatalogDriver::get_service`].
	pub fn get_service(&self, ctx: &RequestContext, service_id: &ServiceId) -> Result<ServiceRef> {
		self.forward(ctx, "get_service", |driver| driver.get_service(service_id))
	}

	/// See [`CatalogDriver::list_services`].
	pub fn list_services(&self, ctx: &RequestContext) -> Result<Vec<ServiceRef>> {
		self.forward(ctx, "list_services", |driver| driver.list_services())
	}

	/// See [`CatalogDriver::create_service`].
	pub fn create_service(&self, ctx: &RequestContext, service: ServiceRef) -> Result<ServiceRef> {
		self.forward(ctx, "create_service", |driver| driver.create_service(service))
	}

	/// See [`CatalogDriver::delete_service`].
	pub fn delete_service(&self, ctx: &RequestContext, service_id: &ServiceId) -> Result<()> {
		self.forward(ctx, "delete_service", |driver| driver.delete_service(service_id))
	}
}
