//! Policy file cache with stamp-based reloads.
//!
//! The rule file path is resolved once and remembered. Every lookup stats the file; when the
//! stamp (modification time and length) differs from the published snapshot the file is read,
//! compiled, and the new snapshot replaces the old one in a single pointer swap. Readers never
//! block: they load whatever snapshot is published. Reloads are serialized so a burst of
//! callers noticing the same change compiles the file once.

// std
use std::{
	fs,
	path::{Path, PathBuf},
	sync::atomic::{AtomicU64, Ordering},
	time::SystemTime,
};
// crates.io
use arc_swap::ArcSwapOption;
// self
use crate::{
	_prelude::*,
	config::{self, Config},
	error::ConfigError,
	obs::{self, Operation},
	policy::check::{RuleSet, RuleSource},
};

/// Identity of one version of the policy file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStamp {
	/// Last modification time, when the platform reports one.
	pub modified: Option<SystemTime>,
	/// Length in bytes.
	pub len: u64,
}
impl FileStamp {
	/// Stats `path`.
	pub fn of(path: &Path) -> Result<Self, ConfigError> {
		let metadata = fs::metadata(path)
			.map_err(|source| ConfigError::MissingPolicyFile { path: path.to_path_buf(), source })?;

		Ok(Self { modified: metadata.modified().ok(), len: metadata.len() })
	}
}

/// Compiled rules together with the stamp of the file they came from.
#[derive(Debug)]
pub struct PolicySnapshot {
	/// Stamp observed before the file was read.
	pub stamp: FileStamp,
	/// Compiled rules.
	pub rules: RuleSet,
}

/// Lazily loaded, automatically reloaded policy rules.
#[derive(Debug)]
pub struct PolicyCache {
	policy_file: String,
	default_rule: String,
	config_dir: Option<PathBuf>,
	path: ArcSwapOption<PathBuf>,
	loaded: ArcSwapOption<PolicySnapshot>,
	reload_lock: Mutex<()>,
	reloads: AtomicU64,
}
impl PolicyCache {
	/// Creates an empty cache for `policy_file`, resolved relative to `config_dir`.
	pub fn new(
		policy_file: impl Into<String>,
		default_rule: impl Into<String>,
		config_dir: Option<PathBuf>,
	) -> Self {
		Self {
			policy_file: policy_file.into(),
			default_rule: default_rule.into(),
			config_dir,
			path: ArcSwapOption::empty(),
			loaded: ArcSwapOption::empty(),
			reload_lock: Mutex::new(()),
			reloads: AtomicU64::new(0),
		}
	}

	/// Creates a cache from the `[policy]` group.
	pub fn from_config(config: &Config) -> Self {
		Self::new(
			config.policy.policy_file.clone(),
			config.policy.policy_default_rule.clone(),
			config.config_dir.clone(),
		)
	}

	/// Resolved policy file path; resolution happens on first use.
	pub fn path(&self) -> Arc<PathBuf> {
		if let Some(path) = self.path.load_full() {
			return path;
		}

		let resolved = Arc::new(config::find_file_in(self.config_dir.as_deref(), &self.policy_file));

		self.path.store(Some(resolved.clone()));

		resolved
	}

	/// Returns the current rules, reloading them if the file changed.
	///
	/// A failed reload returns the error and leaves the previous snapshot published; the next
	/// call retries.
	pub fn rules(&self) -> Result<Arc<PolicySnapshot>, ConfigError> {
		let path = self.path();
		let stamp = FileStamp::of(&path)?;

		if let Some(snapshot) = self.current(stamp) {
			return Ok(snapshot);
		}

		let _guard = self.reload_lock.lock();

		if let Some(snapshot) = self.current(stamp) {
			return Ok(snapshot);
		}

		let rules = obs::observe_sync(Operation::ReloadPolicy, "policy_cache", || {
			load_rules(&path, &self.default_rule)
		})?;
		let snapshot = Arc::new(PolicySnapshot { stamp, rules });

		self.loaded.store(Some(snapshot.clone()));
		self.reloads.fetch_add(1, Ordering::Relaxed);

		#[cfg(feature = "tracing")]
		tracing::debug!(
			path = %path.display(),
			rules = snapshot.rules.len(),
			"policy rules reloaded"
		);

		Ok(snapshot)
	}

	/// Published snapshot without touching the file system.
	pub fn published(&self) -> Option<Arc<PolicySnapshot>> {
		self.loaded.load_full()
	}

	/// Number of successful file loads since construction.
	pub fn reloads(&self) -> u64 {
		self.reloads.load(Ordering::Relaxed)
	}

	/// Forgets the resolved path and the published rules.
	pub fn reset(&self) {
		let _guard = self.reload_lock.lock();

		self.path.store(None);
		self.loaded.store(None);
	}

	fn current(&self, stamp: FileStamp) -> Option<Arc<PolicySnapshot>> {
		self.loaded.load_full().filter(|snapshot| snapshot.stamp == stamp)
	}
}

/// Reads and compiles a policy document.
pub fn load_rules(path: &Path, default_rule: &str) -> Result<RuleSet, ConfigError> {
	let text = fs::read_to_string(path)
		.map_err(|source| ConfigError::MissingPolicyFile { path: path.to_path_buf(), source })?;

	if text.trim().is_empty() {
		return Err(ConfigError::EmptyPolicyFile { path: path.to_path_buf() });
	}

	let sources = parse_rules(&text)
		.map_err(|source| ConfigError::PolicyParse { path: path.to_path_buf(), source })?;

	RuleSet::compile(&sources, default_rule)
}

/// Parses a policy document into uncompiled rule sources.
pub fn parse_rules(
	text: &str,
) -> Result<BTreeMap<String, RuleSource>, serde_path_to_error::Error<serde_json::Error>> {
	let mut deserializer = serde_json::Deserializer::from_str(text);

	serde_path_to_error::deserialize(&mut deserializer)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn cache_in(dir: &Path, body: &str) -> PolicyCache {
		fs::write(dir.join("policy.json"), body).expect("Failed to write policy fixture.");

		PolicyCache::new("policy.json", "default", Some(dir.to_path_buf()))
	}

	#[test]
	fn unchanged_files_are_loaded_once() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let cache = cache_in(dir.path(), r#"{"default": "@"}"#);

		for _ in 0..3 {
			let snapshot = cache.rules().expect("Policy should load.");

			assert!(snapshot.rules.get("default").is_some());
		}

		assert_eq!(cache.reloads(), 1);
		assert_eq!(*cache.path(), dir.path().join("policy.json"));
	}

	#[test]
	fn rewritten_files_are_picked_up() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let cache = cache_in(dir.path(), r#"{"default": "@"}"#);

		cache.rules().expect("Policy should load.");
		fs::write(dir.path().join("policy.json"), r#"{"default": "!", "extra": "role:admin"}"#)
			.expect("Failed to rewrite policy.");

		let snapshot = cache.rules().expect("Rewritten policy should load.");

		assert_eq!(snapshot.rules.len(), 2);
		assert_eq!(cache.reloads(), 2);
	}

	#[test]
	fn failed_reloads_keep_the_previous_rules() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let cache = cache_in(dir.path(), r#"{"default": "@"}"#);

		cache.rules().expect("Policy should load.");
		fs::write(dir.path().join("policy.json"), r#"{"default": ["not", "a", "rule"]}"#)
			.expect("Failed to rewrite policy.");

		let err = cache.rules().expect_err("Malformed policy must fail.");

		assert!(matches!(err, ConfigError::PolicyParse { .. }), "{err}");
		assert_eq!(cache.published().expect("Old rules stay published.").rules.len(), 1);
	}

	#[test]
	fn missing_and_empty_files_are_fatal() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let missing = PolicyCache::new("absent.json", "default", Some(dir.path().to_path_buf()));

		assert!(matches!(missing.rules(), Err(ConfigError::MissingPolicyFile { .. })));

		let empty = cache_in(dir.path(), "  \n");

		assert!(matches!(empty.rules(), Err(ConfigError::EmptyPolicyFile { .. })));
	}

	#[test]
	fn reset_forgets_path_and_rules() {
		let dir = tempfile::tempdir().expect("Failed to create temporary directory.");
		let cache = cache_in(dir.path(), r#"{"default": "@"}"#);

		cache.rules().expect("Policy should load.");
		cache.reset();

		assert!(cache.published().is_none());

		cache.rules().expect("Policy should load again.");

		assert_eq!(cache.reloads(), 2);
	}
}
