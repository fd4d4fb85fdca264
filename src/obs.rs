//! Optional observability helpers for service operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit structured spans named `keystone_core.operation`
//!   with the `operation` and `stage` (call site) fields, plus debug events for policy
//!   enforcement and rule reloads.
//! - Enable `metrics` to increment the `keystone_core_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the facade, the token engine, and the policy cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Password authentication + token issuance.
	Authenticate,
	/// Token lookup with logical expiry check.
	ValidateToken,
	/// Explicit token revocation.
	RevokeToken,
	/// Policy enforcement for a token-bearing request.
	Enforce,
	/// Catalog expansion for a token-bearing request.
	Catalog,
	/// Token creation in the lifecycle engine.
	IssueToken,
	/// Physical removal of expired tokens.
	PurgeTokens,
	/// Policy file reload after a change on disk.
	ReloadPolicy,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Authenticate => "authenticate",
			Operation::ValidateToken => "validate_token",
			Operation::RevokeToken => "revoke_token",
			Operation::Enforce => "enforce",
			Operation::Catalog => "catalog",
			Operation::IssueToken => "issue_token",
			Operation::PurgeTokens => "purge_tokens",
			Operation::ReloadPolicy => "reload_policy",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an [`OperationSpan`] and records its attempt and outcome.
pub async fn observe<T, Fut>(operation: Operation, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = OperationSpan::new(operation, stage);

	record_operation_outcome(operation, OperationOutcome::Attempt);

	let result = span.instrument(fut).await;

	record_result(operation, &result);

	result
}

/// Synchronous counterpart of [`observe`].
pub fn observe_sync<T, E>(
	operation: Operation,
	stage: &'static str,
	f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
	let _guard = OperationSpan::new(operation, stage).entered();

	record_operation_outcome(operation, OperationOutcome::Attempt);

	let result = f();

	record_result(operation, &result);

	result
}

fn record_result<T, E>(operation: Operation, result: &Result<T, E>) {
	match result {
		Ok(_) => record_operation_outcome(operation, OperationOutcome::Success),
		Err(_) => record_operation_outcome(operation, OperationOutcome::Failure),
	}
}
