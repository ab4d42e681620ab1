//! Optional observability hooks for phase execution.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to run every phase inside a span named `oauth2_conformance.phase` with the
//!   `phase` (registry name) and `stage` (state machine position) fields, and to mirror every
//!   trace entry as a `tracing` event.
//! - Enable `metrics` to increment the `oauth2_conformance_phase_total` counter for every
//!   attempt/success/failure/defect, labeled by `phase` + `outcome`.
//!
//! The conversation trace is kept regardless of these features.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseOutcome {
	/// Entry to a phase.
	Attempt,
	/// The phase reached `Done`.
	Success,
	/// The phase failed fatally.
	Failure,
	/// A non-fatal post-check failure was recorded.
	Defect,
}
impl PhaseOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			PhaseOutcome::Attempt => "attempt",
			PhaseOutcome::Success => "success",
			PhaseOutcome::Failure => "failure",
			PhaseOutcome::Defect => "defect",
		}
	}
}
impl Display for PhaseOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
