//! Allow-all policy backend for development deployments.

// self
use crate::{_prelude::*, manager::Driver, policy::PolicyDriver};

/// Policy backend that permits every action.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrivialPolicy;
impl Driver for TrivialPolicy {
	fn driver_name(&self) -> &'static str {
		"trivial"
	}

	fn capabilities(&self) -> &'static [&'static str] {
		&["enforce", "reset"]
	}
}
impl PolicyDriver for TrivialPolicy {
	fn enforce(&self, _: &Attributes, _action: &str, _: &Attributes) -> Result<()> {
		#[cfg(feature = "tracing")]
		tracing::debug!(action = _action, "trivial policy allows action");

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn every_action_is_allowed() {
		let empty = Attributes::new();

		for action in ["identity:create_user", "admin_required", ""] {
			TrivialPolicy.enforce(&empty, action, &empty).expect("Trivial policy allows everything.");
		}
	}
}
