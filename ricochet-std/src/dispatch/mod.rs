//! Trigger dispatch.
//!
//! - [`LifecycleDispatcher`]: per-collection trigger list and phase policy
//! - [`FilterChain`]: the structural filters of a dispatcher, linked in order
//! - [`GuardedTrigger`]: wraps a trigger with cyclic guard bookkeeping
//! - [`GlobalTriggers`]: database-wide trigger factories

pub mod chain;
pub mod dispatcher;
pub mod global;
pub mod guarded;

pub use chain::FilterChain;
pub use dispatcher::{LifecycleDispatcher, LifecycleDispatcherBuilder};
#[cfg(feature = "inventory")]
pub use global::CollectedTrigger;
pub use global::{GlobalTriggers, TriggerFactory};
pub use guarded::GuardedTrigger;
