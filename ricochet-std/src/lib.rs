//! # ricochet-std
//!
//! Standard implementations for the Ricochet lifecycle trigger subsystem.
//!
//! This crate provides:
//! - **Dispatch**: [`LifecycleDispatcher`], [`GuardedTrigger`], [`GlobalTriggers`]
//! - **Structural chain**: [`FilterChain`], [`DeferringFilter`]
//! - **Extraction**: [`ExtractionTrigger`] splitting element text into siblings
//! - **Scripts**: [`ScriptTrigger`] on top of a pluggable [`ScriptEngine`]
//! - **Standard triggers**: [`LoggingTrigger`]
//!
//! [`LifecycleDispatcher`]: dispatch::LifecycleDispatcher
//! [`GuardedTrigger`]: dispatch::GuardedTrigger
//! [`GlobalTriggers`]: dispatch::GlobalTriggers
//! [`FilterChain`]: dispatch::FilterChain
//! [`DeferringFilter`]: filters::DeferringFilter
//! [`ExtractionTrigger`]: filters::ExtractionTrigger
//! [`ScriptTrigger`]: script::ScriptTrigger
//! [`ScriptEngine`]: script::ScriptEngine
//! [`LoggingTrigger`]: triggers::LoggingTrigger

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use ricochet_core;

// Modules
pub mod dispatch;
pub mod filters;
pub mod script;
pub mod testing;
pub mod triggers;

#[cfg(feature = "inventory")]
pub use inventory;
