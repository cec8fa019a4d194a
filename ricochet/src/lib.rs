//! # ricochet - Lifecycle Triggers for a Hierarchical Document Store
//!
//! `ricochet` fires operator-supplied triggers around every create, update,
//! copy, move and delete of a collection or document. Each operation runs a
//! Before pass that may veto it and an After pass that may not. A per-thread
//! guard lets triggers cause further operations without looping forever.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ricochet::prelude::*;
//!
//! let mut dispatcher = LifecycleDispatcher::builder("/db/orders")
//!     .register(GuardedTrigger::new(LoggingTrigger::default()))
//!     .build();
//!
//! dispatcher.before_create_document(&txn, &uri)?;
//! // store the document through `dispatcher.filter_chain(&mut storage)`
//! dispatcher.after_create_document(&txn, &uri)?;
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use ricochet_core::{
    // Events
    Action,
    // Structural stream
    Attribute,
    Attributes,
    // Error types
    BoxError,
    ConfigError,
    CycleDetected,
    ElementName,
    EventKind,
    EventSet,
    EventSink,
    GuardError,
    // Guard
    GuardMonitor,
    Invocation,
    InvocationRecord,
    // Configuration
    ParamValue,
    Params,
    PassThrough,
    Phase,
    ResourceUri,
    StreamError,
    StructuralEvent,
    StructuralFilter,
    StructuralViolation,
    Target,
    ThreadGuardReport,
    // Trigger
    Trigger,
    TriggerConfig,
    TriggerError,
    TriggerGuard,
    TriggerId,
    Txn,
    UnwindScope,
    guard,
};

// Dispatch
pub use ricochet_std::dispatch::{
    FilterChain, GlobalTriggers, GuardedTrigger, LifecycleDispatcher, LifecycleDispatcherBuilder,
    TriggerFactory,
};

#[cfg(feature = "inventory")]
pub use ricochet_std::dispatch::CollectedTrigger;

/// Structural filters.
pub mod filters {
    pub use ricochet_std::filters::{
        DeferringFilter, EntryOrder, ExtractEntry, ExtractionFilter, ExtractionRule,
        ExtractionTrigger, Forward, Replay,
    };
}

/// Script-backed triggers.
pub mod script {
    pub use ricochet_std::script::{
        CompiledScript, ScriptEngine, ScriptError, ScriptMode, ScriptSource, ScriptTrigger,
        ScriptValue,
    };
}

/// Standard trigger implementations.
pub mod triggers {
    pub use ricochet_std::triggers::LoggingTrigger;
}

/// Testing utilities.
pub mod testing {
    pub use ricochet_std::testing::{
        FailingTrigger, RecordingSink, RecordingTrigger, ScriptCall, ScriptedEngine,
    };
}

/// Prelude module - common imports for Ricochet.
///
/// # Usage
///
/// ```rust,ignore
/// use ricochet::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Errors
        ConfigError,
        // Stream
        EventSink,
        // Events
        EventKind,
        // Dispatch
        GuardedTrigger,
        Invocation,
        LifecycleDispatcher,
        Phase,
        ResourceUri,
        StructuralEvent,
        StructuralFilter,
        // Core traits
        Trigger,
        TriggerConfig,
        TriggerError,
        Txn,
        triggers::LoggingTrigger,
    };
}

#[cfg(feature = "inventory")]
pub use inventory;
