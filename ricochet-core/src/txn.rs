//! Transaction handles.

/// An opaque handle to the storage engine's transaction.
///
/// Triggers receive it on every lifecycle call so that their own side effects
/// can join the ongoing transaction. The core never inspects it beyond
/// logging its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Txn {
    id: u64,
}

impl Txn {
    /// Wrap a transaction id handed out by the storage engine.
    pub const fn new(id: u64) -> Self {
        Self { id }
    }

    /// The transaction id.
    pub const fn id(&self) -> u64 {
        self.id
    }
}
