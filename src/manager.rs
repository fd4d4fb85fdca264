//! Driver registry and the manager layer that fronts every backend.
//!
//! Each service (identity, token, policy, catalog) defines a driver trait extending [`Driver`]
//! and a [`DriverRegistry`] mapping configuration names to factories. A [`Manager`] resolves the
//! configured name once, owns the resulting driver for the life of the process, and forwards
//! typed calls to it. Forwarded calls take a [`RequestContext`] first and drop it before the
//! driver is invoked, so drivers stay transport-agnostic.
//!
//! Operation binding is lazy: the first call to an operation checks it against the driver's
//! declared capabilities and memoizes the answer. Later calls reuse the cached binding.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, config::Config, context::RequestContext, store::StoreFuture};

/// Factory that constructs a driver from the shared configuration.
pub type DriverFactory<D> = fn(&Config) -> Result<Arc<D>>;

/// Common surface of every backend driver.
pub trait Driver
where
	Self: Send + Sync,
{
	/// Registry name of the driver (e.g. `memory`, `rules`, `templated`).
	fn driver_name(&self) -> &'static str;

	/// Operation names this driver implements.
	fn capabilities(&self) -> &'static [&'static str];
}

/// Configuration-name → factory table for one backend group.
pub struct DriverRegistry<D>
where
	D: ?Sized,
{
	group: &'static str,
	factories: BTreeMap<&'static str, DriverFactory<D>>,
}
impl<D> DriverRegistry<D>
where
	D: ?Sized,
{
	/// Creates an empty registry for the named backend group.
	pub fn new(group: &'static str) -> Self {
		Self { group, factories: BTreeMap::new() }
	}

	/// Registers (or replaces) a factory under `name`.
	pub fn register(mut self, name: &'static str, factory: DriverFactory<D>) -> Self {
		self.factories.insert(name, factory);

		self
	}

	/// Backend group served by this registry.
	pub fn group(&self) -> &'static str {
		self.group
	}

	/// Registered driver names in sorted order.
	pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.factories.keys().copied()
	}

	/// Constructs the driver registered under `name`.
	pub fn build(&self, config: &Config, name: &str) -> Result<Arc<D>> {
		let factory = self.factories.get(name).ok_or_else(|| {
			Error::from(crate::error::ConfigError::UnknownDriver {
				group: self.group,
				name: name.to_owned(),
				known: self.names().collect::<Vec<_>>().join(", "),
			})
		})?;

		factory(config)
	}
}
impl<D> Debug for DriverRegistry<D>
where
	D: ?Sized,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DriverRegistry")
			.field("group", &self.group)
			.field("drivers", &self.names().collect::<Vec<_>>())
			.finish()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Binding {
	Bound,
	Missing,
}

/// Stable entry point to one dynamically selected driver.
pub struct Manager<D>
where
	D: ?Sized + Driver,
{
	group: &'static str,
	driver: Arc<D>,
	bindings: RwLock<HashMap<&'static str, Binding>>,
	resolutions: AtomicU64,
}
impl<D> Manager<D>
where
	D: ?Sized + Driver,
{
	/// Resolves `name` through `registry` and wraps the resulting driver.
	///
	/// An unknown name is a fatal configuration error.
	pub fn new(config: &Config, registry: &DriverRegistry<D>, name: &str) -> Result<Self> {
		let driver = registry.build(config, name)?;

		#[cfg(feature = "tracing")]
		tracing::debug!(group = registry.group(), driver = driver.driver_name(), "driver loaded");

		Ok(Self::with_driver(registry.group(), driver))
	}

	/// Wraps an already constructed driver.
	pub fn with_driver(group: &'static str, driver: Arc<D>) -> Self {
		Self { group, driver, bindings: Default::default(), resolutions: AtomicU64::new(0) }
	}

	/// Backend group served by this manager.
	pub fn group(&self) -> &'static str {
		self.group
	}

	/// Borrows the active driver without going through operation binding.
	pub fn driver(&self) -> &D {
		&self.driver
	}

	/// Number of operation names resolved against the driver so far.
	pub fn resolutions(&self) -> u64 {
		self.resolutions.load(Ordering::Relaxed)
	}

	/// Binds `operation`, resolving it on first use.
	pub fn bind(&self, operation: &'static str) -> Result<&D> {
		let cached = self.bindings.read().get(operation).copied();
		let binding = match cached {
			Some(binding) => binding,
			None => self.resolve(operation),
		};

		match binding {
			Binding::Bound => Ok(self.driver.as_ref()),
			Binding::Missing =>
				Err(Error::CapabilityMissing { driver: self.driver.driver_name(), operation }),
		}
	}

	/// Forwards a synchronous call, dropping the request context.
	pub fn forward<T>(
		&self,
		_ctx: &RequestContext,
		operation: &'static str,
		call: impl FnOnce(&D) -> Result<T>,
	) -> Result<T> {
		call(self.bind(operation)?)
	}

	/// Forwards an asynchronous call, dropping the request context.
	pub async fn forward_async<'a, T, F>(
		&'a self,
		_ctx: &RequestContext,
		operation: &'static str,
		call: F,
	) -> Result<T>
	where
		F: FnOnce(&'a D) -> StoreFuture<'a, T>,
	{
		let driver = self.bind(operation)?;

		call(driver).await
	}

	fn resolve(&self, operation: &'static str) -> Binding {
		self.resolutions.fetch_add(1, Ordering::Relaxed);

		let binding = if self.driver.capabilities().contains(&operation) {
			Binding::Bound
		} else {
			Binding::Missing
		};

		// Concurrent resolutions of the same name compute the same binding.
		*self.bindings.write().entry(operation).or_insert(binding)
	}
}
impl<D> Debug for Manager<D>
where
	D: ?Sized + Driver,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Manager")
			.field("group", &self.group)
			.field("driver", &self.driver.driver_name())
			.field("resolutions", &self.resolutions())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	trait Echo: Driver {
		fn echo(&self, value: &str) -> Result<String>;
	}

	struct Loud;
	impl Driver for Loud {
		fn driver_name(&self) -> &'static str {
			"loud"
		}

		fn capabilities(&self) -> &'static [&'static str] {
			&["echo"]
		}
	}
	impl Echo for Loud {
		fn echo(&self, value: &str) -> Result<String> {
			Ok(value.to_uppercase())
		}
	}

	fn build_loud(_: &Config) -> Result<Arc<dyn Echo>> {
		let driver: Arc<dyn Echo> = Arc::new(Loud);

		Ok(driver)
	}

	fn registry() -> DriverRegistry<dyn Echo> {
		DriverRegistry::new("echo").register("loud", build_loud)
	}

	#[test]
	fn forwarding_strips_context_and_memoizes_binding() {
		let manager = Manager::new(&Config::default(), &registry(), "loud")
			.expect("Registered driver should load.");
		let ctx = RequestContext::with_token("ignored");

		for _ in 0..3 {
			let value = manager
				.forward(&ctx, "echo", |driver| driver.echo("hi"))
				.expect("Forwarded call should succeed.");

			assert_eq!(value, "HI");
		}

		assert_eq!(manager.resolutions(), 1);
	}

	#[test]
	fn unknown_driver_names_are_fatal() {
		let err = Manager::new(&Config::default(), &registry(), "quiet")
			.expect_err("Unregistered driver must be rejected.");

		assert!(matches!(
			&err,
			Error::Config(crate::error::ConfigError::UnknownDriver { group: "echo", .. })
		));
		assert!(err.to_string().contains("known: loud"), "{err}");
	}

	#[test]
	fn missing_capabilities_are_cached_too() {
		let manager = Manager::with_driver("echo", build_loud(&Config::default()).expect("Driver."));
		let ctx = RequestContext::default();

		for _ in 0..2 {
			let err = manager
				.forward(&ctx, "whisper", |driver| driver.echo("hi"))
				.expect_err("Undeclared operation must be rejected.");

			assert!(matches!(err, Error::CapabilityMissing { driver: "loud", operation: "whisper" }));
		}

		assert_eq!(manager.resolutions(), 1);
	}
}
