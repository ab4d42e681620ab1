//! Append-only protocol trace for one conversation.

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	error::ValidationFailure,
	obs,
	store::{StoreError, file::replace_file},
};

/// Kind of trace entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
	/// Progress information.
	Info,
	/// Outbound request summary.
	Request,
	/// Inbound response summary.
	Response,
	/// Error attributed to a phase.
	Error,
	/// Operator-facing note.
	Note,
}
impl TraceKind {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			TraceKind::Info => "info",
			TraceKind::Request => "request",
			TraceKind::Response => "response",
			TraceKind::Error => "error",
			TraceKind::Note => "note",
		}
	}
}

/// Single timestamped trace entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
	/// Wall-clock instant the entry was appended.
	#[serde(with = "time::serde::rfc3339")]
	pub at: OffsetDateTime,
	/// Phase that was running, if any.
	pub phase: Option<String>,
	/// Entry kind.
	pub kind: TraceKind,
	/// Human-readable detail.
	pub message: String,
}

/// Post-check failure that did not halt the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
	/// Phase whose result failed the check.
	pub phase: String,
	/// The failure itself.
	pub failure: ValidationFailure,
}

/// Ordered log of everything that happened in a conversation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Trace {
	events: Vec<TraceEvent>,
	defects: Vec<Defect>,
	#[serde(skip)]
	current_phase: Option<String>,
}
impl Trace {
	/// Attributes subsequent entries to `phase`.
	pub fn begin_phase(&mut self, phase: &str) {
		self.current_phase = Some(phase.to_owned());
		self.push(TraceKind::Info, format!("Phase `{phase}` started."));
	}

	/// Stops attributing entries to the current phase.
	pub fn end_phase(&mut self) {
		self.current_phase = None;
	}

	/// Appends an informational entry.
	pub fn info(&mut self, message: impl Into<String>) {
		self.push(TraceKind::Info, message);
	}

	/// Appends a request summary.
	pub fn request(&mut self, message: impl Into<String>) {
		self.push(TraceKind::Request, message);
	}

	/// Appends a response summary.
	pub fn response(&mut self, message: impl Into<String>) {
		self.push(TraceKind::Response, message);
	}

	/// Appends an error entry.
	pub fn error(&mut self, message: impl Into<String>) {
		self.push(TraceKind::Error, message);
	}

	/// Appends an operator note.
	pub fn note(&mut self, message: impl Into<String>) {
		self.push(TraceKind::Note, message);
	}

	/// Records a non-fatal validation failure against `phase`.
	pub fn defect(&mut self, phase: &str, failure: ValidationFailure) {
		self.push(TraceKind::Error, format!("Defect: {failure}"));
		self.defects.push(Defect { phase: phase.to_owned(), failure });
	}

	/// All entries in order.
	pub fn events(&self) -> &[TraceEvent] {
		&self.events
	}

	/// All recorded defects in order.
	pub fn defects(&self) -> &[Defect] {
		&self.defects
	}

	/// Serializes the trace as pretty JSON.
	pub fn to_json_vec(&self) -> Result<Vec<u8>, StoreError> {
		serde_json::to_vec_pretty(self).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize trace: {e}"),
		})
	}

	/// Writes the trace to `path` through a temporary file and an atomic rename.
	pub fn write_to(&self, path: &Path) -> Result<(), StoreError> {
		let serialized = self.to_json_vec()?;

		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create trace directory {}: {e}", parent.display()),
			})?;
		}

		replace_file(path, &serialized)
	}

	fn push(&mut self, kind: TraceKind, message: impl Into<String>) {
		let event = TraceEvent {
			at: OffsetDateTime::now_utc(),
			phase: self.current_phase.clone(),
			kind,
			message: message.into(),
		};

		obs::emit_trace_event(&event);
		self.events.push(event);
	}
}
