//! Service-level error types shared across managers, drivers, and the policy engine.

// std
use std::path::PathBuf;
// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem; never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),

	/// Requested record does not exist (or is no longer valid).
	#[error("Could not find {kind}: {id}.")]
	NotFound {
		/// Record kind (token, user, tenant, service, ...).
		kind: &'static str,
		/// Identifier that was looked up.
		id: String,
	},
	/// Record already exists and the backend refuses to overwrite it.
	#[error("Conflict occurred attempting to store {kind}: {id}.")]
	Conflict {
		/// Record kind.
		kind: &'static str,
		/// Identifier that collided.
		id: String,
	},
	/// Policy enforcement denied the action.
	#[error("You are not authorized to perform the requested action: {action}.")]
	Forbidden {
		/// Action that was checked, e.g. `identity:create_user`.
		action: String,
	},
	/// Caller could not be authenticated.
	#[error("The request you have made requires authentication: {reason}.")]
	Unauthorized {
		/// Human-readable reason.
		reason: String,
	},
	/// Caller supplied malformed input.
	#[error("The request could not be understood: {reason}.")]
	BadRequest {
		/// Human-readable reason.
		reason: String,
	},
	/// Password hashing backend rejected its input.
	#[error("Failed to hash password: {reason}.")]
	PasswordHash {
		/// Backend diagnostic.
		reason: String,
	},
	/// Active driver does not implement the requested operation.
	#[error("Driver `{driver}` does not implement `{operation}`.")]
	CapabilityMissing {
		/// Registry name of the active driver.
		driver: &'static str,
		/// Operation that was forwarded.
		operation: &'static str,
	},
}
impl Error {
	/// Builds a [`Error::NotFound`] for the provided kind and identifier.
	pub fn not_found(kind: &'static str, id: impl Display) -> Self {
		Self::NotFound { kind, id: id.to_string() }
	}

	/// Builds a [`Error::Conflict`] for the provided kind and identifier.
	pub fn conflict(kind: &'static str, id: impl Display) -> Self {
		Self::Conflict { kind, id: id.to_string() }
	}

	/// Builds a [`Error::Unauthorized`] with the provided reason.
	pub fn unauthorized(reason: impl Into<String>) -> Self {
		Self::Unauthorized { reason: reason.into() }
	}

	/// Returns `true` when the error signals a missing record.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}
}

/// Fatal configuration failures. They abort the operation (or startup) and name the
/// offending key or file.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration file could not be read.
	#[error("Failed to read configuration file {}.", path.display())]
	ConfigIo {
		/// File that was read.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration document contains an invalid value.
	#[error("Configuration is invalid at `{}`.", source.path())]
	InvalidConfig {
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<toml::de::Error>,
	},
	/// Configured driver name has no registered factory.
	#[error("No {group} driver named `{name}` is registered (known: {known}).")]
	UnknownDriver {
		/// Backend group (identity, token, policy, catalog).
		group: &'static str,
		/// Name read from configuration.
		name: String,
		/// Comma-separated list of registered names.
		known: String,
	},
	/// Token expiration setting cannot be represented.
	#[error("The token.expiration value {seconds} is out of range.")]
	ExpirationOutOfRange {
		/// Configured seconds.
		seconds: i64,
	},

	/// Policy file could not be located or inspected.
	#[error("Policy file {} is missing.", path.display())]
	MissingPolicyFile {
		/// Resolved (or requested) path.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Policy file exists but has no content.
	#[error("Policy file {} is empty.", path.display())]
	EmptyPolicyFile {
		/// Resolved path.
		path: PathBuf,
	},
	/// Policy file is not a JSON object of rules.
	#[error("Policy file {} is malformed at `{}`.", path.display(), source.path())]
	PolicyParse {
		/// Resolved path.
		path: PathBuf,
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A rule expression failed to compile.
	#[error("Policy rule `{rule}` is malformed: {reason}.")]
	MalformedRule {
		/// Rule name.
		rule: String,
		/// Parser diagnostic.
		reason: String,
	},

	/// Catalog template file could not be read.
	#[error("Failed to read catalog template file {}.", path.display())]
	TemplateIo {
		/// File that was read.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Catalog template references a key missing from the substitution context.
	#[error("Catalog template `{template}` references undefined key `{key}`.")]
	UndefinedSubstitution {
		/// Missing placeholder name.
		key: String,
		/// Template that was being expanded.
		template: String,
	},
	/// Catalog template contains an unterminated placeholder.
	#[error("Catalog template `{template}` is malformed.")]
	MalformedTemplate {
		/// Offending template.
		template: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn forbidden_names_the_action() {
		let err = Error::Forbidden { action: "compute:create_instance".into() };

		assert!(err.to_string().contains("compute:create_instance"));
	}

	#[test]
	fn config_errors_are_transparent() {
		let err: Error =
			ConfigError::UndefinedSubstitution { key: "public_port".into(), template: "x".into() }
				.into();

		assert!(matches!(err, Error::Config(_)));
		assert!(err.to_string().contains("public_port"));
	}

	#[test]
	fn policy_file_errors_keep_the_io_source() {
		let err = ConfigError::MissingPolicyFile {
			path: PathBuf::from("/nowhere/policy.json"),
			source: std::io::Error::from(std::io::ErrorKind::NotFound),
		};

		assert!(err.to_string().contains("/nowhere/policy.json"));
		assert!(StdError::source(&err).is_some());
	}

	#[test]
	fn capability_missing_is_not_a_missing_record() {
		let err = Error::CapabilityMissing { driver: "memory", operation: "get_catalog" };

		assert!(!err.is_not_found());
		assert!(Error::not_found("token", "abc").is_not_found());
	}
}
