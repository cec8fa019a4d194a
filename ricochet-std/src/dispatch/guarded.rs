//! Guard-aware trigger wrapper.

use ricochet_core::{
    Invocation, Phase, ResourceUri, StructuralFilter, Trigger, TriggerError, TriggerId, Txn,
    UnwindScope, guard,
};

/// Makes any [`Trigger`] guard-aware.
///
/// Every call is registered with the current thread's guard before the inner
/// trigger runs. A cycle is reported as [`TriggerError::CycleDetected`]
/// without calling the inner trigger, which the dispatcher logs and skips.
/// The guard is unwound when the call returns, on every path. A failing
/// Before call also forgets its own record, since its After call never comes.
///
/// # Example
///
/// ```rust,ignore
/// let dispatcher = LifecycleDispatcher::builder("/db/orders")
///     .register(GuardedTrigger::new(ReindexTrigger::default()))
///     .build();
/// ```
pub struct GuardedTrigger<T> {
    inner: T,
    id: TriggerId,
}

impl<T> GuardedTrigger<T> {
    /// Wrap `inner` under a freshly allocated identity.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            id: TriggerId::next(),
        }
    }

    /// The identity the guard knows this trigger by.
    pub fn id(&self) -> TriggerId {
        self.id
    }

    /// The wrapped trigger.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Unwrap.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Trigger> Trigger for GuardedTrigger<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fire(&mut self, txn: &Txn, invocation: &Invocation) -> Result<(), TriggerError> {
        let scope = UnwindScope::new(invocation.phase);
        guard::register(
            self.id,
            invocation.phase,
            invocation.event,
            &invocation.src,
            invocation.dst.as_ref(),
        )?;
        let result = self.inner.fire(txn, invocation);
        if result.is_err() {
            scope.abandon();
        }
        result
    }

    fn on_metadata_update(
        &mut self,
        txn: &Txn,
        phase: Phase,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.inner.on_metadata_update(txn, phase, uri)
    }

    fn as_filter(&mut self) -> Option<&mut dyn StructuralFilter> {
        self.inner.as_filter()
    }
}
