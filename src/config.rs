//! Namespaced service configuration loaded from TOML.
//!
//! Top-level options mirror the deployment-wide settings (ports, admin token, hashing
//! strength) and double as the substitution context for catalog templates. Each backend group
//! (`identity`, `token`, `policy`, `catalog`) owns a table naming its driver plus the options
//! that driver reads.

// std
use std::path::{Path, PathBuf};
// self
use crate::{_prelude::*, auth::DEFAULT_CRYPT_STRENGTH, error::ConfigError};

/// Root configuration document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Interface the transport binds to.
	pub bind_host: String,
	/// Public API port.
	#[serde(deserialize_with = "port")]
	pub public_port: Option<String>,
	/// Admin API port.
	#[serde(deserialize_with = "port")]
	pub admin_port: Option<String>,
	/// Compute service port referenced by catalog templates.
	#[serde(deserialize_with = "port")]
	pub compute_port: Option<String>,
	/// Shared secret that marks a request as administrative.
	pub admin_token: String,
	/// Key-stretching rounds for password hashes.
	pub crypt_strength: u32,
	/// Identity backend settings.
	pub identity: DriverSection,
	/// Token backend settings.
	pub token: TokenSection,
	/// Policy backend settings.
	pub policy: PolicySection,
	/// Catalog backend settings.
	pub catalog: CatalogSection,
	/// Any other top-level options; scalar values join the substitution context.
	#[serde(flatten)]
	pub extra: BTreeMap<String, toml::Value>,
	/// Directory of the file this configuration was loaded from.
	#[serde(skip)]
	pub config_dir: Option<PathBuf>,
}
impl Config {
	/// Parses a TOML document.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		let deserializer = toml::Deserializer::new(source);

		serde_path_to_error::deserialize(deserializer)
			.map_err(|source| ConfigError::InvalidConfig { source })
	}

	/// Reads and parses the TOML file at `path`, remembering its directory for relative lookups.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path)
			.map_err(|source| ConfigError::ConfigIo { path: path.to_path_buf(), source })?;
		let mut config = Self::from_toml_str(&source)?;

		config.config_dir = path.parent().map(Path::to_path_buf);

		Ok(config)
	}

	/// Locates a file named by configuration.
	///
	/// Absolute paths are returned as-is. Relative paths are searched next to the
	/// configuration file first and then in the working directory; when neither exists the
	/// working-directory candidate is returned so callers can report it.
	pub fn find_file(&self, name: &str) -> PathBuf {
		find_file_in(self.config_dir.as_deref(), name)
	}

	/// Flattens the configuration into `name → value` pairs.
	///
	/// Top-level scalar options appear under their bare name; group options appear as
	/// `group.option`. Unset options are omitted.
	pub fn substitution_context(&self) -> BTreeMap<String, String> {
		let mut context = BTreeMap::new();
		let mut put = |key: &str, value: Option<String>| {
			if let Some(value) = value {
				context.insert(key.to_owned(), value);
			}
		};

		put("bind_host", Some(self.bind_host.clone()));
		put("public_port", self.public_port.clone());
		put("admin_port", self.admin_port.clone());
		put("compute_port", self.compute_port.clone());
		put("admin_token", Some(self.admin_token.clone()));
		put("crypt_strength", Some(self.crypt_strength.to_string()));
		put("identity.driver", Some(self.identity.driver.clone()));
		put("token.driver", Some(self.token.driver.clone()));
		put("token.expiration", Some(self.token.expiration.to_string()));
		put("token.file_path", Some(self.token.file_path.clone()));
		put("policy.driver", Some(self.policy.driver.clone()));
		put("policy.policy_file", Some(self.policy.policy_file.clone()));
		put("policy.policy_default_rule", Some(self.policy.policy_default_rule.clone()));
		put("catalog.driver", Some(self.catalog.driver.clone()));
		put("catalog.template_file", Some(self.catalog.template_file.clone()));

		for (key, value) in &self.extra {
			put(key, scalar_to_string(value));
		}

		context
	}
}
impl Default for Config {
	fn default() -> Self {
		Self {
			bind_host: "0.0.0.0".into(),
			public_port: Some("5000".into()),
			admin_port: Some("35357".into()),
			compute_port: Some("3000".into()),
			admin_token: "ADMIN".into(),
			crypt_strength: DEFAULT_CRYPT_STRENGTH,
			identity: DriverSection::default(),
			token: TokenSection::default(),
			policy: PolicySection::default(),
			catalog: CatalogSection::default(),
			extra: BTreeMap::new(),
			config_dir: None,
		}
	}
}

/// Group that only selects a driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSection {
	/// Registry name of the backend.
	pub driver: String,
}
impl Default for DriverSection {
	fn default() -> Self {
		Self { driver: "memory".into() }
	}
}

/// `[token]` group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSection {
	/// Registry name of the backend.
	pub driver: String,
	/// Default token lifetime in seconds.
	pub expiration: i64,
	/// Snapshot location for the file backend.
	pub file_path: String,
}
impl TokenSection {
	/// Default lifetime applied when callers omit an expiration.
	pub const DEFAULT_EXPIRATION: i64 = 86_400;

	/// Returns the configured lifetime as a [`Duration`].
	pub fn expiration(&self) -> Result<Duration, ConfigError> {
		if self.expiration <= 0 || self.expiration > Duration::MAX.whole_seconds() {
			return Err(ConfigError::ExpirationOutOfRange { seconds: self.expiration });
		}

		Ok(Duration::seconds(self.expiration))
	}
}
impl Default for TokenSection {
	fn default() -> Self {
		Self {
			driver: "memory".into(),
			expiration: Self::DEFAULT_EXPIRATION,
			file_path: "tokens.json".into(),
		}
	}
}

/// `[policy]` group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
	/// Registry name of the backend.
	pub driver: String,
	/// JSON file holding the rule set.
	pub policy_file: String,
	/// Rule checked when the requested rule is not found.
	pub policy_default_rule: String,
}
impl Default for PolicySection {
	fn default() -> Self {
		Self {
			driver: "rules".into(),
			policy_file: "policy.json".into(),
			policy_default_rule: "default".into(),
		}
	}
}

/// `[catalog]` group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
	/// Registry name of the backend.
	pub driver: String,
	/// Template file read by the templated backend.
	pub template_file: String,
}
impl Default for CatalogSection {
	fn default() -> Self {
		Self { driver: "templated".into(), template_file: "./etc/default_catalog.templates".into() }
	}
}

/// [`Config::find_file`] against an explicit configuration directory.
pub fn find_file_in(config_dir: Option<&Path>, name: &str) -> PathBuf {
	let requested = PathBuf::from(name);

	if requested.is_absolute() {
		return requested;
	}
	if let Some(dir) = config_dir {
		let candidate = dir.join(&requested);

		if candidate.exists() {
			return candidate;
		}
	}

	requested
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Port {
	Number(u64),
	Text(String),
}

// Ports are written either as TOML integers or strings.
fn port<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	Ok(Option::<Port>::deserialize(deserializer)?.map(|port| match port {
		Port::Number(n) => n.to_string(),
		Port::Text(s) => s,
	}))
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
	match value {
		toml::Value::String(s) => Some(s.clone()),
		toml::Value::Integer(i) => Some(i.to_string()),
		toml::Value::Float(f) => Some(f.to_string()),
		toml::Value::Boolean(b) => Some(if *b { "True" } else { "False" }.to_owned()),
		toml::Value::Datetime(d) => Some(d.to_string()),
		toml::Value::Array(_) | toml::Value::Table(_) => None,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let config = Config::default();

		assert_eq!(config.token.expiration, 86_400);
		assert_eq!(config.policy.policy_default_rule, "default");
		assert_eq!(config.policy.policy_file, "policy.json");
		assert_eq!(config.catalog.driver, "templated");
		assert_eq!(config.crypt_strength, 40_000);
		assert_eq!(config.compute_port.as_deref(), Some("3000"));
	}

	#[test]
	fn ports_accept_integers_and_strings() {
		let config = Config::from_toml_str("public_port = 5001\nadmin_port = \"35358\"\n")
			.expect("Integer and string ports should parse.");

		assert_eq!(config.public_port.as_deref(), Some("5001"));
		assert_eq!(config.admin_port.as_deref(), Some("35358"));
		assert_eq!(config.compute_port.as_deref(), Some("3000"));

		let err = Config::from_toml_str("compute_port = [8774]\n")
			.expect_err("A list is not a port.");

		assert!(err.to_string().contains("compute_port"), "{err}");
	}

	#[test]
	fn toml_groups_and_extra_keys_parse() {
		let config = Config::from_toml_str(
			r#"
			public_port = "5001"
			region = "RegionTwo"
			workers = 4

			[token]
			driver = "file"
			expiration = 3600

			[policy]
			policy_default_rule = "admin_required"
			"#,
		)
		.expect("Configuration fixture should parse.");

		assert_eq!(config.public_port.as_deref(), Some("5001"));
		assert_eq!(config.token.driver, "file");
		assert_eq!(config.token.expiration().expect("Expiration should be valid."), Duration::hours(1));
		assert_eq!(config.policy.policy_default_rule, "admin_required");
		assert_eq!(config.policy.driver, "rules");

		let context = config.substitution_context();

		assert_eq!(context.get("region").map(String::as_str), Some("RegionTwo"));
		assert_eq!(context.get("workers").map(String::as_str), Some("4"));
		assert_eq!(context.get("token.expiration").map(String::as_str), Some("3600"));
		assert_eq!(context.get("compute_port").map(String::as_str), Some("3000"));
	}

	#[test]
	fn invalid_values_name_their_path() {
		let err = Config::from_toml_str("[token]\nexpiration = \"soon\"\n")
			.expect_err("A string expiration must be rejected.");

		assert!(err.to_string().contains("token.expiration"), "{err}");
	}

	#[test]
	fn non_positive_expiration_is_rejected() {
		let section = TokenSection { expiration: 0, ..TokenSection::default() };

		assert!(matches!(
			section.expiration(),
			Err(ConfigError::ExpirationOutOfRange { seconds: 0 })
		));
	}
}
