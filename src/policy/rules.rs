//! Rule-file policy backend.

// self
use crate::{
	_prelude::*,
	config::Config,
	manager::Driver,
	policy::{PolicyDriver, cache::PolicyCache, check::Check},
};

/// Enforces actions against the rules of a JSON policy file, reloading on change.
#[derive(Debug)]
pub struct RulesPolicy {
	cache: PolicyCache,
}
impl RulesPolicy {
	/// Wraps an existing cache.
	pub fn new(cache: PolicyCache) -> Self {
		Self { cache }
	}

	/// Builds the backend from the `[policy]` group.
	pub fn from_config(config: &Config) -> Self {
		Self::new(PolicyCache::from_config(config))
	}

	/// Rule cache backing this driver.
	pub fn cache(&self) -> &PolicyCache {
		&self.cache
	}
}
impl Driver for RulesPolicy {
	fn driver_name(&self) -> &'static str {
		"rules"
	}

	fn capabilities(&self) -> &'static [&'static str] {
		&["enforce", "reset"]
	}
}
impl PolicyDriver for RulesPolicy {
	fn enforce(&self, credentials: &Attributes, action: &str, target: &Attributes) -> Result<()> {
		let snapshot = self.cache.rules()?;
		let match_list = [Check::Rule(action.to_owned())];
		let allowed = snapshot.rules.enforce(&match_list, target, credentials);

		#[cfg(feature = "tracing")]
		tracing::debug!(action, allowed, "policy enforced");

		if allowed { Ok(()) } else { Err(Error::Forbidden { action: action.to_owned() }) }
	}

	fn reset(&self) {
		self.cache.reset();
	}
}
