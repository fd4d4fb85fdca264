//! Authorization: policy drivers and the manager entry point.

pub mod cache;
pub mod check;
pub mod rules;
pub mod trivial;

pub use cache::{FileStamp, PolicyCache, PolicySnapshot};
pub use check::{Check, RuleSet, RuleSource, RuleSyntaxError};
pub use rules::RulesPolicy;
pub use trivial::TrivialPolicy;

// self
use crate::{
	_prelude::*,
	config::Config,
	context::RequestContext,
	manager::{Driver, DriverRegistry, Manager},
};

/// Authorization contract implemented by policy backends.
pub trait PolicyDriver: Driver {
	/// Checks that `credentials` may perform `action` on `target`, failing with
	/// [`Error::Forbidden`] otherwise.
	fn enforce(&self, credentials: &Attributes, action: &str, target: &Attributes) -> Result<()>;

	/// Drops any cached state so the next call starts fresh.
	fn reset(&self) {}
}

/// Built-in policy backends: `rules` and `trivial`.
pub fn registry() -> DriverRegistry<dyn PolicyDriver> {
	DriverRegistry::new("policy").register("rules", build_rules).register("trivial", build_trivial)
}

fn build_rules(config: &Config) -> Result<Arc<dyn PolicyDriver>> {
	let driver: Arc<dyn PolicyDriver> = Arc::new(RulesPolicy::from_config(config));

	Ok(driver)
}

fn build_trivial(_: &Config) -> Result<Arc<dyn PolicyDriver>> {
	let driver: Arc<dyn PolicyDriver> = Arc::new(TrivialPolicy);

	Ok(driver)
}

impl Manager<dyn PolicyDriver> {
	/// Builds the policy manager named by `[policy] driver`.
	pub fn from_config(config: &Config) -> Result<Self> {
		Self::new(config, &registry(), &config.policy.driver)
	}

	/// See [`PolicyDriver::enforce`].
	pub fn enforce(
		&self,
		ctx: &RequestContext,
		credentials: &Attributes,
		action: &str,
		target: &Attributes,
	) -> Result<()> {
		self.forward(ctx, "enforce", |driver| driver.enforce(credentials, action, target))
	}

	/// See [`PolicyDriver::reset`].
	pub fn reset(&self, ctx: &RequestContext) -> Result<()> {
		self.forward(ctx, "reset", |driver| {
			driver.reset();

			Ok(())
		})
	}
}
