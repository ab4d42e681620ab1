//! Validation-rule capability interface consumed by phases.
//!
//! Checks are pluggable predicates evaluated before a request is sent (pre-checks) or after
//! the response has been handled (post-checks). Every check declares its [`Severity`]: a
//! failing pre-check always withholds the request, while a failing post-check halts the run
//! only when the check is [`Severity::Fatal`] and is otherwise recorded as a defect.

pub mod builtin;

pub use builtin::*;

// self
use crate::{
	_prelude::*,
	conversation::Conversation,
	error::ValidationFailure,
	phase::{PhaseOutput, PreparedRequest},
};

/// How a failed check affects the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	/// Recorded as a defect; the run continues.
	Warning,
	/// Terminates the run.
	Fatal,
}

/// Result of evaluating one check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
	/// The check holds.
	Passed,
	/// The check does not hold; carries a diagnostic message.
	Failed(String),
}
impl CheckOutcome {
	/// Convenience constructor for failures.
	pub fn failed(message: impl Into<String>) -> Self {
		Self::Failed(message.into())
	}
}

/// Everything a check may inspect.
#[derive(Clone, Copy)]
pub struct CheckContext<'a> {
	/// Registry name of the running phase.
	pub phase: &'a str,
	/// Conversation state (post-mutation for post-checks).
	pub conversation: &'a Conversation,
	/// Request about to be sent, or the one that was sent.
	pub request: Option<&'a PreparedRequest>,
	/// Raw phase result; absent during pre-checks.
	pub output: Option<&'a PhaseOutput>,
}

/// Pluggable validation predicate.
pub trait Check
where
	Self: Send + Sync,
{
	/// Stable name used in traces and defect reports.
	fn name(&self) -> &'static str;

	/// Severity applied when the check fails as a post-check.
	fn severity(&self) -> Severity {
		Severity::Warning
	}

	/// Evaluates the check.
	fn check(&self, cx: &CheckContext<'_>) -> CheckOutcome;
}

/// Runs pre-checks in order; the first failure aborts with a fatal [`ValidationFailure`].
pub fn run_pre_checks(checks: &[Box<dyn Check>], cx: &CheckContext<'_>) -> Result<()> {
	for check in checks {
		if let CheckOutcome::Failed(message) = check.check(cx) {
			return Err(ValidationFailure::fatal(check.name(), message).into());
		}
	}

	Ok(())
}

/// Runs post-checks in order.
///
/// Warning-level failures are collected and returned; the first fatal failure is returned as
/// an error carrying the warnings gathered before it in the trace-friendly order.
pub fn run_post_checks(
	checks: &[Box<dyn Check>],
	cx: &CheckContext<'_>,
) -> Result<Vec<ValidationFailure>, (Vec<ValidationFailure>, ValidationFailure)> {
	let mut defects = Vec::new();

	for check in checks {
		let CheckOutcome::Failed(message) = check.check(cx) else {
			continue;
		};
		let failure = ValidationFailure {
			check: check.name().to_owned(),
			message,
			severity: check.severity(),
		};

		match failure.severity {
			Severity::Warning => defects.push(failure),
			Severity::Fatal => return Err((defects, failure)),
		}
	}

	Ok(defects)
}
