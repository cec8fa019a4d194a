//! # Trigger
//!
//! A trigger is operator-supplied logic attached to a collection. The
//! dispatcher calls it once in the Before pass and once in the After pass of
//! every lifecycle operation it is attached to.
//!
//! # Layer Position
//!
//! This is the unit the dispatcher composes. Content-transforming triggers
//! also take part in the structural chain by returning a filter from
//! [`Trigger::as_filter`].

use crate::{
    error::TriggerError,
    event::{EventKind, Phase},
    structural::StructuralFilter,
    txn::Txn,
    uri::ResourceUri,
};

/// The arguments of one lifecycle call.
///
/// `src` is always where the resource came from and `dst` where it went,
/// whatever order the storage engine passed them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Before or After.
    pub phase: Phase,
    /// The event being fired.
    pub event: EventKind,
    /// Origin resource.
    pub src: ResourceUri,
    /// Destination resource, for copy and move.
    pub dst: Option<ResourceUri>,
}

impl Invocation {
    /// An invocation on a single resource.
    pub fn new(phase: Phase, event: EventKind, src: ResourceUri) -> Self {
        Self {
            phase,
            event,
            src,
            dst: None,
        }
    }

    /// An invocation that moves or copies `src` to `dst`.
    pub fn relocation(phase: Phase, event: EventKind, src: ResourceUri, dst: ResourceUri) -> Self {
        Self {
            phase,
            event,
            src,
            dst: Some(dst),
        }
    }

    /// The collection the event concerns: the source itself for collection
    /// events, its parent for document events.
    pub fn collection(&self) -> ResourceUri {
        if self.event.is_collection() {
            self.src.clone()
        } else {
            self.src.parent()
        }
    }
}

/// Lifecycle logic attached to a collection.
///
/// # Example
///
/// ```rust,ignore
/// struct Audit;
///
/// impl Trigger for Audit {
///     fn name(&self) -> &str {
///         "audit"
///     }
///
///     fn fire(&mut self, _txn: &Txn, inv: &Invocation) -> Result<(), TriggerError> {
///         println!("{} {} {}", inv.phase, inv.event, inv.src);
///         Ok(())
///     }
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a lifecycle trigger",
    label = "missing `Trigger` implementation",
    note = "Triggers must implement `name` and `fire`."
)]
pub trait Trigger: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Handle one lifecycle call.
    ///
    /// In the Before phase an error aborts the operation; in the After phase
    /// it is logged.
    fn fire(&mut self, txn: &Txn, invocation: &Invocation) -> Result<(), TriggerError>;

    /// Handle a metadata-only change to a document. Ignored by default.
    fn on_metadata_update(
        &mut self,
        txn: &Txn,
        phase: Phase,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        let _ = (txn, phase, uri);
        Ok(())
    }

    /// The structural filter this trigger contributes, if it rewrites content.
    fn as_filter(&mut self) -> Option<&mut dyn StructuralFilter> {
        None
    }
}

impl<T: Trigger + ?Sized> Trigger for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fire(&mut self, txn: &Txn, invocation: &Invocation) -> Result<(), TriggerError> {
        (**self).fire(txn, invocation)
    }

    fn on_metadata_update(
        &mut self,
        txn: &Txn,
        phase: Phase,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        (**self).on_metadata_update(txn, phase, uri)
    }

    fn as_filter(&mut self) -> Option<&mut dyn StructuralFilter> {
        (**self).as_filter()
    }
}
