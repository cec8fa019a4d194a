//! # Cyclic Trigger Guard
//!
//! Triggers may cause further mutations from inside their own logic. Those
//! mutations fire triggers again, synchronously, on the same thread. The guard
//! keeps an explicit per-thread stack of [`InvocationRecord`]s so it can tell a
//! trigger re-entering the very invocation it is still running (a cycle) from
//! ordinary nesting on other resources.
//!
//! # Usage
//!
//! Guard-aware triggers call [`register`] before doing any work and
//! [`unwind_if_finished`] when the work is done, on every exit path:
//!
//! ```rust,ignore
//! match guard::register(self.id, phase, event, src, dst) {
//!     Ok(()) => run_script()?,
//!     Err(GuardError::Cycle(cycle)) => tracing::warn!(%cycle, "skipping"),
//!     Err(GuardError::Violation(v)) => return Err(v.into()),
//! }
//! guard::unwind_if_finished(phase);
//! ```
//!
//! [`TriggerGuard`] is the same state machine as a plain value, for callers
//! that prefer to pass the context explicitly.
//!
//! # Observability
//!
//! [`GuardMonitor`] lists the live stacks of every thread. It is meant for
//! management tooling, not for normal operation.

use crate::{
    error::{CycleDetected, GuardError, StructuralViolation},
    event::{EventKind, Phase},
    uri::ResourceUri,
};
use std::{
    collections::HashMap,
    fmt::{self, Write as _},
    sync::{
        Arc, Mutex, OnceLock, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, ThreadId},
};

const KEYED: u64 = 1 << 63;

/// Identity of a configured trigger instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(u64);

impl TriggerId {
    /// Allocate a new process-unique identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// A stable identity derived from `key`.
    ///
    /// Equal keys give equal ids in every process. Keyed ids have the high
    /// bit set, so they never equal an id from [`TriggerId::next`].
    pub fn from_key(key: &str) -> Self {
        // FNV-1a
        let hash = key.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        });
        Self(hash | KEYED)
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger#{}", self.0)
    }
}

/// One attempt to run a trigger for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRecord {
    /// The trigger being invoked.
    pub trigger: TriggerId,
    /// Before or After.
    pub phase: Phase,
    /// The event being fired.
    pub event: EventKind,
    /// Where the resource came from.
    pub src: ResourceUri,
    /// Where the resource went, for copy and move.
    pub dst: Option<ResourceUri>,
    /// Set when the record was pushed as part of a detected cycle.
    pub possibly_cyclic: bool,
}

impl InvocationRecord {
    /// Create a new record.
    pub fn new(
        trigger: TriggerId,
        phase: Phase,
        event: EventKind,
        src: ResourceUri,
        dst: Option<ResourceUri>,
    ) -> Self {
        Self {
            trigger,
            phase,
            event,
            src,
            dst,
            possibly_cyclic: false,
        }
    }

    fn cyclic(mut self) -> Self {
        self.possibly_cyclic = true;
        self
    }

    /// Same trigger, event and resources; phase and cyclic flag are ignored.
    pub fn same_invocation(&self, other: &InvocationRecord) -> bool {
        self.trigger == other.trigger
            && self.event == other.event
            && self.src == other.src
            && self.dst == other.dst
    }

    fn cycle_error(&self) -> CycleDetected {
        CycleDetected {
            trigger: self.trigger,
            event: self.event,
            src: self.src.clone(),
        }
    }
}

impl fmt::Display for InvocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.trigger, self.phase, self.event, self.src)?;
        if let Some(dst) = &self.dst {
            write!(f, " -> {dst}")?;
        }
        if self.possibly_cyclic {
            f.write_str(" (possibly cyclic)")?;
        }
        Ok(())
    }
}

/// The guard state of one thread: a stack of invocation records.
///
/// The top of the stack is the most recent record.
#[derive(Debug, Clone, Default)]
pub struct TriggerGuard {
    stack: Vec<InvocationRecord>,
}

impl TriggerGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invocation attempt.
    ///
    /// Returns [`GuardError::Cycle`] when the invocation re-enters (or
    /// completes a re-entry of) an invocation that is still open, and
    /// [`GuardError::Violation`] when the stack cannot describe a valid
    /// nesting for `record`.
    pub fn register(&mut self, record: InvocationRecord) -> Result<(), GuardError> {
        let Some(top) = self.stack.last() else {
            if record.phase == Phase::After {
                return Err(StructuralViolation(format!(
                    "after-phase invocation with no open before-phase: {record}"
                ))
                .into());
            }
            self.stack.push(record);
            return Ok(());
        };

        if !top.same_invocation(&record) {
            self.stack.push(record);
            return Ok(());
        }

        match record.phase {
            Phase::Before => {
                let err = record.cycle_error();
                self.stack.push(record.cyclic());
                Err(err.into())
            }
            Phase::After => match self.open_before() {
                Some(false) => {
                    self.stack.push(record);
                    Ok(())
                }
                Some(true) => {
                    let err = record.cycle_error();
                    self.stack.push(record.cyclic());
                    Err(err.into())
                }
                None => Err(StructuralViolation(format!(
                    "no open before-phase invocation matches {record}"
                ))
                .into()),
            },
        }
    }

    /// Walk from the top, pairing each After with a later-found Before, and
    /// report whether the first unpaired Before is possibly cyclic.
    fn open_before(&self) -> Option<bool> {
        let mut skip = 0usize;
        for record in self.stack.iter().rev() {
            match record.phase {
                Phase::After => skip += 1,
                Phase::Before if skip > 0 => skip -= 1,
                Phase::Before => return Some(record.possibly_cyclic),
            }
        }
        None
    }

    /// Clear the stack if the After-phase just completed closed the outermost
    /// invocation. Before-phase calls are ignored.
    pub fn unwind_if_finished(&mut self, phase: Phase) {
        if phase == Phase::After && self.depth() == 0 {
            self.stack.clear();
        }
    }

    /// Net nesting depth: Before records minus After records.
    pub fn depth(&self) -> isize {
        self.stack
            .iter()
            .map(|r| match r.phase {
                Phase::Before => 1,
                Phase::After => -1,
            })
            .sum()
    }

    /// Drop every record pushed after the stack held `len` records.
    pub fn truncate(&mut self, len: usize) {
        self.stack.truncate(len);
    }

    /// Drop all records.
    pub fn reset(&mut self) {
        self.stack.clear();
    }

    /// Whether no record is held.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// The records, most recent first.
    pub fn records(&self) -> impl Iterator<Item = &InvocationRecord> {
        self.stack.iter().rev()
    }

    /// Human-readable listing, most recent first.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (idx, record) in self.records().enumerate() {
            let _ = writeln!(out, "{idx}: {record}");
        }
        out
    }
}

// ============================================================================
// Thread-local guard
// ============================================================================

type SharedGuard = Arc<Mutex<TriggerGuard>>;

fn lock(guard: &Mutex<TriggerGuard>) -> std::sync::MutexGuard<'_, TriggerGuard> {
    guard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns this thread's guard and removes it from the monitor on thread exit.
struct ThreadSlot {
    id: ThreadId,
    guard: SharedGuard,
}

impl ThreadSlot {
    fn new() -> Self {
        let current = thread::current();
        let guard = SharedGuard::default();
        GuardMonitor::registry().attach(current.id(), current.name(), guard.clone());
        Self {
            id: current.id(),
            guard,
        }
    }
}

impl Drop for ThreadSlot {
    fn drop(&mut self) {
        GuardMonitor::registry().detach(self.id);
    }
}

thread_local! {
    static SLOT: ThreadSlot = ThreadSlot::new();
}

fn with_current<R>(f: impl FnOnce(&mut TriggerGuard) -> R) -> R {
    SLOT.with(|slot| f(&mut lock(&slot.guard)))
}

/// Record an invocation attempt on the current thread's guard.
///
/// See [`TriggerGuard::register`].
pub fn register(
    trigger: TriggerId,
    phase: Phase,
    event: EventKind,
    src: &ResourceUri,
    dst: Option<&ResourceUri>,
) -> Result<(), GuardError> {
    let record = InvocationRecord::new(trigger, phase, event, src.clone(), dst.cloned());
    with_current(|guard| guard.register(record))
}

/// Clear the current thread's guard if the outermost invocation has finished.
pub fn unwind_if_finished(phase: Phase) {
    with_current(|guard| guard.unwind_if_finished(phase))
}

/// Drop every record held for the current thread.
pub fn reset() {
    with_current(TriggerGuard::reset)
}

/// Drop the current thread's records pushed after it held `len` records.
///
/// Used to forget an operation whose Before pass was aborted, since its
/// After pass will never run.
pub fn truncate(len: usize) {
    with_current(|guard| guard.truncate(len))
}

/// Whether the current thread holds no records.
pub fn is_empty() -> bool {
    with_current(|guard| guard.is_empty())
}

/// Number of records held for the current thread.
pub fn len() -> usize {
    with_current(|guard| guard.len())
}

/// Human-readable listing of the current thread's records.
pub fn dump() -> String {
    with_current(|guard| guard.dump())
}

/// Unwinds the current thread's guard when dropped.
///
/// Keeps the unwind on every exit path of a guarded invocation, including
/// early returns through `?`. A Before pass that fails must call
/// [`abandon`](Self::abandon) instead of just dropping the scope; a panic
/// abandons it implicitly.
#[must_use = "the guard unwinds when this scope is dropped"]
pub struct UnwindScope {
    phase: Phase,
    mark: usize,
}

impl UnwindScope {
    /// Unwind for `phase` when the scope ends.
    pub fn new(phase: Phase) -> Self {
        Self { phase, mark: len() }
    }

    /// The work covered by a Before-phase scope failed and no After pass will
    /// follow: drop every record pushed since the scope opened. After-phase
    /// scopes just unwind.
    pub fn abandon(self) {
        if self.phase == Phase::Before {
            truncate(self.mark);
        }
    }
}

impl Drop for UnwindScope {
    fn drop(&mut self) {
        if self.phase == Phase::Before && thread::panicking() {
            truncate(self.mark);
        }
        unwind_if_finished(self.phase);
    }
}

// ============================================================================
// Monitor
// ============================================================================

struct MonitorEntry {
    name: Option<String>,
    guard: SharedGuard,
}

/// Read-only view over the guard stacks of all live threads, plus an
/// administrative reset.
#[derive(Default)]
pub struct GuardMonitor {
    threads: Mutex<HashMap<ThreadId, MonitorEntry>>,
}

/// Snapshot of one thread's guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadGuardReport {
    /// The owning thread.
    pub thread: ThreadId,
    /// Thread name, if it has one.
    pub thread_name: Option<String>,
    /// Number of records held.
    pub entries: usize,
    /// Net nesting depth.
    pub depth: isize,
    /// Human-readable listing, most recent first.
    pub dump: String,
}

impl GuardMonitor {
    /// The process-wide monitor.
    pub fn registry() -> &'static GuardMonitor {
        static MONITOR: OnceLock<GuardMonitor> = OnceLock::new();
        MONITOR.get_or_init(GuardMonitor::default)
    }

    fn attach(&self, id: ThreadId, name: Option<&str>, guard: SharedGuard) {
        let entry = MonitorEntry {
            name: name.map(str::to_string),
            guard,
        };
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, entry);
    }

    fn detach(&self, id: ThreadId) {
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Reports for every thread that has used its guard, in no particular order.
    pub fn snapshot(&self) -> Vec<ThreadGuardReport> {
        let threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads
            .iter()
            .map(|(id, entry)| {
                let guard = lock(&entry.guard);
                ThreadGuardReport {
                    thread: *id,
                    thread_name: entry.name.clone(),
                    entries: guard.len(),
                    depth: guard.depth(),
                    dump: guard.dump(),
                }
            })
            .collect()
    }

    /// The report for one thread, if it has used its guard.
    pub fn thread(&self, id: ThreadId) -> Option<ThreadGuardReport> {
        self.snapshot().into_iter().find(|report| report.thread == id)
    }

    /// Total number of records held across all threads.
    pub fn total_entries(&self) -> usize {
        self.snapshot().iter().map(|report| report.entries).sum()
    }

    /// Listing of every non-empty thread stack.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for report in self.snapshot().into_iter().filter(|r| r.entries > 0) {
            let name = report.thread_name.as_deref().unwrap_or("<unnamed>");
            let _ = writeln!(out, "{:?} ({name}): {} entries", report.thread, report.entries);
            out.push_str(&report.dump);
        }
        out
    }

    /// Clear every thread's stack.
    pub fn reset_all(&self) {
        let threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        for entry in threads.values() {
            lock(&entry.guard).reset();
        }
    }
}
