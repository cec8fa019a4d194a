//! # ricochet-core
//!
//! Core types and traits for the Ricochet lifecycle trigger subsystem.
//!
//! This crate has minimal dependencies and is meant to be imported by
//! storage engines and trigger implementations that don't need the full
//! `ricochet-std` machinery.
//!
//! # Building Blocks
//!
//! ## Events ([`EventKind`], [`Phase`])
//!
//! Every mutation of a collection or document is one of ten event kinds and
//! runs twice: a Before pass that may veto it and an After pass that cannot.
//!
//! ## Triggers ([`Trigger`])
//!
//! Operator-supplied logic receiving an [`Invocation`] per pass. A trigger
//! that rewrites document content also exposes a [`StructuralFilter`].
//!
//! ## Guard ([`TriggerGuard`], [`guard`])
//!
//! Trigger side effects re-enter the lifecycle on the same thread. The guard
//! tells cycles from legitimate nesting and unwinds when the outermost
//! operation is over.
//!
//! ## Structural Stream ([`StructuralEvent`], [`EventSink`])
//!
//! SAX-like events flowing from the parser through the filter chain into
//! the storage engine.
//!
//! # Error Types
//!
//! - [`TriggerError`] - Top-level error type
//! - [`ConfigError`] - Configuration errors
//! - [`GuardError`] - Guard rejections
//! - [`StreamError`] - Structural chain errors

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub mod config;
mod error;
mod event;
pub mod guard;
mod structural;
mod trigger;
mod txn;
mod uri;

// Re-exports
pub use config::{ParamValue, Params, TriggerConfig};
pub use error::{
    BoxError, ConfigError, CycleDetected, GuardError, StreamError, StructuralViolation,
    TriggerError,
};
pub use event::{Action, EventKind, EventSet, Phase, Target};
pub use guard::{
    GuardMonitor, InvocationRecord, ThreadGuardReport, TriggerGuard, TriggerId, UnwindScope,
};
pub use structural::{
    Attribute, Attributes, ElementName, EventSink, PassThrough, StructuralEvent,
    StructuralFilter,
};
pub use trigger::{Invocation, Trigger};
pub use txn::Txn;
pub use uri::ResourceUri;
