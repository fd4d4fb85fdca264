//! In-memory service records.

// self
use crate::{
	_prelude::*,
	auth::ServiceId,
	catalog::{CatalogDriver, ServiceRef},
	manager::Driver,
};

pub(crate) const SERVICE_CAPABILITIES: &[&str] =
	&["get_service", "list_services", "create_service", "delete_service"];

/// Key-value catalog backend. It stores service records only and has no endpoint templates,
/// so `get_catalog` is not among its capabilities.
#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog(Arc<RwLock<BTreeMap<ServiceId, ServiceRef>>>);
impl Driver for MemoryCatalog {
	fn driver_name(&self) -> &'static str {
		"memory"
	}

	fn capabilities(&self) -> &'static [&'static str] {
		SERVICE_CAPABILITIES
	}
}
impl CatalogDriver for MemoryCatalog {
	fn get_service(&self, service_id: &ServiceId) -> Result<ServiceRef> {
		self.0.read().get(service_id).cloned().ok_or_else(|| Error::not_found("service", service_id))
	}

	fn list_services(&self) -> Result<Vec<ServiceRef>> {
		Ok(self.0.read().values().cloned().collect())
	}

	fn create_service(&self, service: ServiceRef) -> Result<ServiceRef> {
		let mut guard = self.0.write();

		if guard.contains_key(&service.id) {
			return Err(Error::conflict("service", &service.id));
		}

		guard.insert(service.id.clone(), service.clone());

		Ok(service)
	}

	fn delete_service(&self, service_id: &ServiceId) -> Result<()> {
		self.0
			.write()
			.remove(service_id)
			.map(|_| ())
			.ok_or_else(|| Error::not_found("service", service_id))
	}
}
