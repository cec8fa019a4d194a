//! Error types for Ricochet.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`TriggerError`] - Top-level error type for trigger invocations
//! - [`ConfigError`] - Errors raised while configuring a trigger
//! - [`GuardError`] - Rejections from the cyclic trigger guard
//! - [`StreamError`] - Errors from the structural event chain

use crate::{event::EventKind, guard::TriggerId, uri::ResourceUri};
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all trigger operations.
#[derive(Error, Debug)]
pub enum TriggerError {
    /// The trigger could not be configured.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The guard rejected the invocation because it would re-enter itself.
    #[error(transparent)]
    CycleDetected(#[from] CycleDetected),

    /// The guard stack is in an inconsistent state.
    #[error(transparent)]
    StructuralViolation(#[from] StructuralViolation),

    /// The trigger logic itself failed.
    #[error("trigger '{trigger}' failed")]
    Execution {
        /// Name of the failing trigger.
        trigger: String,
        /// The underlying failure.
        #[source]
        source: BoxError,
    },

    /// The structural event chain failed.
    #[error("structural stream error: {0}")]
    Stream(#[from] StreamError),
}

impl TriggerError {
    /// Wrap an arbitrary failure raised by trigger logic.
    pub fn execution(trigger: impl Into<String>, source: impl Into<BoxError>) -> Self {
        TriggerError::Execution {
            trigger: trigger.into(),
            source: source.into(),
        }
    }

    /// Returns `true` if the error means the caller broke the nesting contract.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TriggerError::StructuralViolation(_))
    }

    /// Returns `true` if the error is a guard cycle rejection.
    pub fn is_cycle(&self) -> bool {
        matches!(self, TriggerError::CycleDetected(_))
    }
}

impl From<GuardError> for TriggerError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Cycle(cycle) => TriggerError::CycleDetected(cycle),
            GuardError::Violation(violation) => TriggerError::StructuralViolation(violation),
        }
    }
}

/// Errors that can occur while configuring a trigger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required parameter was not supplied.
    #[error("missing required parameter '{0}'")]
    Missing(String),

    /// A parameter was supplied with an unusable value.
    #[error("invalid value for parameter '{name}': {reason}")]
    Invalid {
        /// Parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// An event name could not be recognised.
    #[error("unknown trigger event '{0}'")]
    UnknownEvent(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// The guard found the same invocation already open on this thread.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cyclic trigger invocation of {trigger} for {event} on {src}")]
pub struct CycleDetected {
    /// Identity of the trigger that would have re-entered.
    pub trigger: TriggerId,
    /// Event being fired.
    pub event: EventKind,
    /// Source resource of the invocation.
    pub src: ResourceUri,
}

/// The guard stack does not describe a valid nesting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("trigger nesting violated: {0}")]
pub struct StructuralViolation(pub String);

/// Rejections from [`TriggerGuard::register`](crate::TriggerGuard::register).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Recoverable: skip this invocation.
    #[error(transparent)]
    Cycle(#[from] CycleDetected),

    /// Fatal: the caller is in an inconsistent nesting state.
    #[error(transparent)]
    Violation(#[from] StructuralViolation),
}

/// Errors raised while pushing events through the structural chain.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Events arrived out of well-formedness order.
    #[error("malformed event stream: {0}")]
    Malformed(String),

    /// The terminal consumer rejected an event.
    #[error("event sink failed")]
    Sink(#[source] BoxError),
}

impl From<BoxError> for StreamError {
    fn from(err: BoxError) -> Self {
        StreamError::Sink(err)
    }
}
