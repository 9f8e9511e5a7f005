//! Error-kind taxonomy shared by every component (§7).
//!
//! Each component defines its own `thiserror` enum for its own variants,
//! but every such enum exposes a [`kind`](CoreError::kind)-shaped
//! classification so callers (retry loops, receipt writers) can dispatch
//! on the taxonomy without matching concrete variants.

use thiserror::Error;

/// The five error kinds of §7, independent of which component raised
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; nothing was mutated. Returned to the submitter.
    InputValidation,
    /// A lookup missed.
    NotFound,
    /// Infra hiccup; safe to retry the whole operation.
    TransientInfra,
    /// A domain plugin reported a non-retryable assembly failure.
    DomainPermanent,
    /// An invariant was violated; fatal to the enclosing context.
    InternalInvariant,
}

/// A generic, component-agnostic error carrying one of the five kinds.
/// Components with richer domain errors should still be convertible into
/// this (`From` impls per crate) so shared retry/receipt code can stay
/// generic.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn input_validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputValidation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn transient_infra(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientInfra, message)
    }

    pub fn domain_permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DomainPermanent, message)
    }

    pub fn internal_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalInvariant, message)
    }

    /// Transient-infra errors are safe to re-drive from the enclosing
    /// retry loop (§7 Propagation).
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::TransientInfra)
    }
}
