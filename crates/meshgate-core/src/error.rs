// ── Core error types ──
//
// Errors raised by the registry, the correlator and request validation.
// A missing response is not an error here: it comes back as
// `Outcome::TimedOut` and every caller has to handle it explicitly.

use thiserror::Error;

use crate::command::CorrelationKey;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Registry errors ──────────────────────────────────────────────
    #[error("Sink {sink_id} references unknown gateway {gateway_id}")]
    OrphanSink { sink_id: String, gateway_id: String },

    // ── Correlation errors ───────────────────────────────────────────
    #[error("A request for {key} is already in flight")]
    DuplicateRequest { key: CorrelationKey },

    // ── Request errors ───────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
