//! # Lifecycle Dispatcher
//!
//! The surface the storage engine calls around every mutation of a
//! collection. Each call fans out to the collection's ordered trigger list:
//! global triggers first, then the collection's own.
//!
//! # Phase Policy
//!
//! | outcome of a trigger | Before phase | After phase |
//! |----------------------|--------------|-------------|
//! | `Ok`                 | next trigger | next trigger |
//! | cycle detected       | logged, next trigger | logged, next trigger |
//! | structural violation | returned | returned |
//! | any other error      | returned, later triggers skipped | logged, next trigger |
//!
//! An error from a Before call means the storage engine must not perform
//! the mutation.

use super::{chain::FilterChain, global::GlobalTriggers};
use ricochet_core::{
    EventKind, EventSink, Invocation, Phase, ResourceUri, Trigger, TriggerError, Txn, guard,
};

/// Runs the triggers of one collection around its lifecycle operations.
pub struct LifecycleDispatcher {
    collection: ResourceUri,
    triggers: Vec<Box<dyn Trigger>>,
}

/// Builder for [`LifecycleDispatcher`].
///
/// # Example
///
/// ```rust,ignore
/// let dispatcher = LifecycleDispatcher::builder("/db/orders")
///     .globals(GlobalTriggers::global())?
///     .register(LoggingTrigger::default())
///     .build();
/// ```
pub struct LifecycleDispatcherBuilder {
    collection: ResourceUri,
    globals: Vec<Box<dyn Trigger>>,
    triggers: Vec<Box<dyn Trigger>>,
}

impl LifecycleDispatcherBuilder {
    /// Start a dispatcher for `collection`.
    pub fn new(collection: impl Into<ResourceUri>) -> Self {
        Self {
            collection: collection.into(),
            globals: Vec::new(),
            triggers: Vec::new(),
        }
    }

    /// Instantiate the global triggers of `registry` for this collection.
    pub fn globals(mut self, registry: &GlobalTriggers) -> Result<Self, TriggerError> {
        self.globals.extend(registry.instantiate(&self.collection)?);
        Ok(self)
    }

    /// Add a global trigger instance directly.
    pub fn global<T: Trigger + 'static>(mut self, trigger: T) -> Self {
        self.globals.push(Box::new(trigger));
        self
    }

    /// Add a collection trigger.
    pub fn register<T: Trigger + 'static>(self, trigger: T) -> Self {
        self.register_boxed(Box::new(trigger))
    }

    /// Add an already boxed collection trigger.
    pub fn register_boxed(mut self, trigger: Box<dyn Trigger>) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> LifecycleDispatcher {
        let mut triggers = self.globals;
        triggers.extend(self.triggers);
        LifecycleDispatcher {
            collection: self.collection,
            triggers,
        }
    }
}

impl LifecycleDispatcher {
    /// Start building a dispatcher for `collection`.
    pub fn builder(collection: impl Into<ResourceUri>) -> LifecycleDispatcherBuilder {
        LifecycleDispatcherBuilder::new(collection)
    }

    /// The collection this dispatcher serves.
    pub fn collection(&self) -> &ResourceUri {
        &self.collection
    }

    /// Trigger names in execution order.
    pub fn trigger_names(&self) -> impl Iterator<Item = &str> {
        self.triggers.iter().map(|t| t.name())
    }

    /// Number of triggers.
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// Whether no trigger is attached.
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Link the structural filters of all triggers, in execution order, in
    /// front of `terminal`.
    pub fn filter_chain<'a>(&'a mut self, terminal: &'a mut dyn EventSink) -> FilterChain<'a> {
        let mut chain = FilterChain::new(terminal);
        for filter in self.triggers.iter_mut().filter_map(|t| t.as_filter()) {
            chain.push(filter);
        }
        chain
    }

    /// Fire one invocation at every trigger, applying the phase policy.
    ///
    /// When the Before pass aborts, guard records pushed by the triggers that
    /// already ran are dropped, since the After pass will not follow.
    pub fn dispatch(&mut self, txn: &Txn, invocation: &Invocation) -> Result<(), TriggerError> {
        let mark = guard::len();
        for trigger in &mut self.triggers {
            let span = tracing::debug_span!(
                "trigger",
                name = %trigger.name(),
                phase = %invocation.phase,
                event = %invocation.event,
                src = %invocation.src,
                txn = txn.id(),
            );
            let _enter = span.enter();
            if let Err(err) = trigger.fire(txn, invocation) {
                apply_policy(invocation.phase, trigger.name(), err)
                    .inspect_err(|_| abort(invocation.phase, mark))?;
            }
        }
        Ok(())
    }

    fn dispatch_metadata(
        &mut self,
        txn: &Txn,
        phase: Phase,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        let mark = guard::len();
        for trigger in &mut self.triggers {
            let span = tracing::debug_span!(
                "trigger",
                name = %trigger.name(),
                %phase,
                event = "UPDATE-DOCUMENT-METADATA",
                src = %uri,
                txn = txn.id(),
            );
            let _enter = span.enter();
            if let Err(err) = trigger.on_metadata_update(txn, phase, uri) {
                apply_policy(phase, trigger.name(), err).inspect_err(|_| abort(phase, mark))?;
            }
        }
        Ok(())
    }

    fn single(
        &mut self,
        txn: &Txn,
        phase: Phase,
        event: EventKind,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.dispatch(txn, &Invocation::new(phase, event, uri.clone()))
    }

    fn relocation(
        &mut self,
        txn: &Txn,
        phase: Phase,
        event: EventKind,
        src: &ResourceUri,
        dst: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.dispatch(
            txn,
            &Invocation::relocation(phase, event, src.clone(), dst.clone()),
        )
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Before a document is stored for the first time.
    pub fn before_create_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::Before, EventKind::CREATE_DOCUMENT, uri)
    }

    /// After a document was stored for the first time.
    pub fn after_create_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::After, EventKind::CREATE_DOCUMENT, uri)
    }

    /// Before a document's content is replaced.
    pub fn before_update_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::Before, EventKind::UPDATE_DOCUMENT, uri)
    }

    /// After a document's content was replaced.
    pub fn after_update_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::After, EventKind::UPDATE_DOCUMENT, uri)
    }

    /// Before a document's metadata (permissions, mime type) changes.
    pub fn before_update_document_metadata(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.dispatch_metadata(txn, Phase::Before, uri)
    }

    /// After a document's metadata changed.
    pub fn after_update_document_metadata(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.dispatch_metadata(txn, Phase::After, uri)
    }

    /// Before `uri` is copied to `new_uri`.
    pub fn before_copy_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
        new_uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.relocation(txn, Phase::Before, EventKind::COPY_DOCUMENT, uri, new_uri)
    }

    /// After `old_uri` was copied to `uri`.
    pub fn after_copy_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
        old_uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.relocation(txn, Phase::After, EventKind::COPY_DOCUMENT, old_uri, uri)
    }

    /// Before `uri` is moved to `new_uri`.
    pub fn before_move_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
        new_uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.relocation(txn, Phase::Before, EventKind::MOVE_DOCUMENT, uri, new_uri)
    }

    /// After `old_uri` was moved to `uri`.
    pub fn after_move_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
        old_uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.relocation(txn, Phase::After, EventKind::MOVE_DOCUMENT, old_uri, uri)
    }

    /// Before a document is removed.
    pub fn before_delete_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::Before, EventKind::DELETE_DOCUMENT, uri)
    }

    /// After a document was removed.
    pub fn after_delete_document(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::After, EventKind::DELETE_DOCUMENT, uri)
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Before a collection is created.
    pub fn before_create_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::Before, EventKind::CREATE_COLLECTION, uri)
    }

    /// After a collection was created.
    pub fn after_create_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::After, EventKind::CREATE_COLLECTION, uri)
    }

    /// Before a collection's own properties change.
    pub fn before_update_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::Before, EventKind::UPDATE_COLLECTION, uri)
    }

    /// After a collection's own properties changed.
    pub fn after_update_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::After, EventKind::UPDATE_COLLECTION, uri)
    }

    /// Before collection `uri` is copied to `new_uri`.
    pub fn before_copy_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
        new_uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.relocation(txn, Phase::Before, EventKind::COPY_COLLECTION, uri, new_uri)
    }

    /// After collection `old_uri` was copied to `uri`.
    pub fn after_copy_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
        old_uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.relocation(txn, Phase::After, EventKind::COPY_COLLECTION, old_uri, uri)
    }

    /// Before collection `uri` is moved to `new_uri`.
    pub fn before_move_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
        new_uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.relocation(txn, Phase::Before, EventKind::MOVE_COLLECTION, uri, new_uri)
    }

    /// After collection `old_uri` was moved to `uri`.
    pub fn after_move_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
        old_uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.relocation(txn, Phase::After, EventKind::MOVE_COLLECTION, old_uri, uri)
    }

    /// Before a collection is removed.
    pub fn before_delete_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::Before, EventKind::DELETE_COLLECTION, uri)
    }

    /// After a collection was removed.
    pub fn after_delete_collection(
        &mut self,
        txn: &Txn,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.single(txn, Phase::After, EventKind::DELETE_COLLECTION, uri)
    }
}

/// Forget an aborted Before pass: its After pass will never run.
fn abort(phase: Phase, mark: usize) {
    if phase == Phase::Before {
        guard::truncate(mark);
    }
}

fn apply_policy(phase: Phase, trigger: &str, err: TriggerError) -> Result<(), TriggerError> {
    if err.is_cycle() {
        tracing::warn!(trigger, %phase, error = %err, "skipping cyclic trigger invocation");
        return Ok(());
    }
    if err.is_fatal() {
        tracing::error!(trigger, %phase, error = %err, "trigger nesting violated");
        return Err(err);
    }
    match phase {
        Phase::Before => Err(err),
        Phase::After => {
            tracing::warn!(trigger, error = %err, "after-phase trigger failed");
            Ok(())
        }
    }
}
