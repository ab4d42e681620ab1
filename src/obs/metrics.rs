// self
use crate::obs::PhaseOutcome;

/// Records a phase outcome via the global metrics recorder (when enabled).
pub fn record_phase_outcome(phase: &'static str, outcome: PhaseOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_conformance_phase_total",
			"phase" => phase,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (phase, outcome);
	}
}
