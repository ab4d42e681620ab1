// self
use crate::{_prelude::*, conversation::TraceEvent, phase::PhaseStage};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedPhase<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedPhase<F> = F;

/// Span wrapping one phase invocation.
#[derive(Clone, Debug)]
pub struct PhaseSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl PhaseSpan {
	/// Creates a span tagged with the phase name; the stage starts at `created`.
	pub fn new(phase: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_conformance.phase",
				phase,
				stage = PhaseStage::Created.as_str()
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = phase;

			Self {}
		}
	}

	/// Updates the `stage` field as the phase advances.
	pub fn record_stage(&self, stage: PhaseStage) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("stage", stage.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedPhase<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Mirrors a trace entry as a `tracing` event (when enabled).
pub fn emit_trace_event(event: &TraceEvent) {
	#[cfg(feature = "tracing")]
	{
		use crate::conversation::TraceKind;

		let phase = event.phase.as_deref().unwrap_or("-");
		let kind = event.kind.as_str();

		match event.kind {
			TraceKind::Error => tracing::warn!(phase, kind, "{}", event.message),
			TraceKind::Request | TraceKind::Response =>
				tracing::debug!(phase, kind, "{}", event.message),
			TraceKind::Info | TraceKind::Note => tracing::info!(phase, kind, "{}", event.message),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = event;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn phase_span_noop_without_tracing() {
		let span = PhaseSpan::new("note");

		span.record_stage(PhaseStage::Done);
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = PhaseSpan::new("intermission");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
