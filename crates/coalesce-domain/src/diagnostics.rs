//! Non-fatal notices raised while matching responses.
//!
//! The engine only produces diagnostics; how they are surfaced is up to the
//! [`DiagnosticSink`] supplied at construction.

use parking_lot::Mutex;
use tracing::warn;

use crate::fingerprint::Fingerprint;

/// A non-fatal notice about one item, such as an accepted value substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Fingerprint of the item the notice is about.
    pub fingerprint: Fingerprint,
    /// Human readable description.
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    pub fn new(fingerprint: Fingerprint, message: impl Into<String>) -> Self {
        Self {
            fingerprint,
            message: message.into(),
        }
    }
}

/// Receives diagnostics emitted by the engine.
pub trait DiagnosticSink: Send + Sync {
    /// Handles a single diagnostic.
    fn emit(&self, diagnostic: Diagnostic);
}

/// Default sink: logs every diagnostic at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn emit(&self, diagnostic: Diagnostic) {
        warn!(fingerprint = %diagnostic.fingerprint, "{}", diagnostic.message);
    }
}

/// Drops every diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardDiagnosticSink;

impl DiagnosticSink for DiscardDiagnosticSink {
    fn emit(&self, _diagnostic: Diagnostic) {}
}

/// Keeps every diagnostic in memory. Useful for tests and for callers that
/// surface notices in bulk.
#[derive(Debug, Default)]
pub struct RecordingDiagnosticSink {
    recorded: Mutex<Vec<Diagnostic>>,
}

impl RecordingDiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded diagnostics in emission order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.recorded.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.recorded.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.lock().is_empty()
    }
}

impl DiagnosticSink for RecordingDiagnosticSink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.recorded.lock().push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_emission_order() {
        let sink = RecordingDiagnosticSink::new();
        assert!(sink.is_empty());

        sink.emit(Diagnostic::new("a".into(), "first"));
        sink.emit(Diagnostic::new("b".into(), "second"));

        let recorded = sink.diagnostics();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].message, "first");
        assert_eq!(recorded[1].fingerprint.as_str(), "b");
    }

    #[test]
    fn test_discard_sink_accepts_diagnostics() {
        DiscardDiagnosticSink.emit(Diagnostic::new("a".into(), "ignored"));
    }
}
