//! Lifecycle event kinds and phases.
//!
//! An [`EventKind`] is the cross product of an [`Action`] and a [`Target`].
//! Every lifecycle call runs once in the [`Phase::Before`] pass and once in
//! the [`Phase::After`] pass around the physical mutation.

use crate::error::ConfigError;
use std::fmt;

/// The mutation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// A new resource is stored.
    Create,
    /// An existing resource is replaced or modified.
    Update,
    /// A resource is copied to a new location.
    Copy,
    /// A resource is moved (renamed) to a new location.
    Move,
    /// A resource is removed.
    Delete,
}

impl Action {
    /// Lower-case name as used in function-dispatch names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Copy => "copy",
            Action::Move => "move",
            Action::Delete => "delete",
        }
    }

    /// Whether the action has a destination resource.
    pub const fn has_destination(self) -> bool {
        matches!(self, Action::Copy | Action::Move)
    }
}

/// The kind of resource being mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    /// An XML or binary document.
    Document,
    /// A collection.
    Collection,
}

impl Target {
    /// Lower-case name as used in function-dispatch names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Target::Document => "document",
            Target::Collection => "collection",
        }
    }
}

/// Before (may abort) or After (best effort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs before the physical mutation.
    Before,
    /// Runs after the physical mutation.
    After,
}

impl Phase {
    /// Lower-case name as used in function-dispatch names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }

    /// The event type name handed to whole-script triggers.
    pub const fn script_type(self) -> &'static str {
        match self {
            Phase::Before => "prepare",
            Phase::After => "finish",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event: one action applied to one kind of resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKind {
    /// What happens.
    pub action: Action,
    /// What it happens to.
    pub target: Target,
}

#[allow(missing_docs)]
impl EventKind {
    pub const CREATE_DOCUMENT: Self = Self::new(Action::Create, Target::Document);
    pub const UPDATE_DOCUMENT: Self = Self::new(Action::Update, Target::Document);
    pub const COPY_DOCUMENT: Self = Self::new(Action::Copy, Target::Document);
    pub const MOVE_DOCUMENT: Self = Self::new(Action::Move, Target::Document);
    pub const DELETE_DOCUMENT: Self = Self::new(Action::Delete, Target::Document);
    pub const CREATE_COLLECTION: Self = Self::new(Action::Create, Target::Collection);
    pub const UPDATE_COLLECTION: Self = Self::new(Action::Update, Target::Collection);
    pub const COPY_COLLECTION: Self = Self::new(Action::Copy, Target::Collection);
    pub const MOVE_COLLECTION: Self = Self::new(Action::Move, Target::Collection);
    pub const DELETE_COLLECTION: Self = Self::new(Action::Delete, Target::Collection);

    /// All ten event kinds, documents first.
    pub const ALL: [Self; 10] = [
        Self::CREATE_DOCUMENT,
        Self::UPDATE_DOCUMENT,
        Self::COPY_DOCUMENT,
        Self::MOVE_DOCUMENT,
        Self::DELETE_DOCUMENT,
        Self::CREATE_COLLECTION,
        Self::UPDATE_COLLECTION,
        Self::COPY_COLLECTION,
        Self::MOVE_COLLECTION,
        Self::DELETE_COLLECTION,
    ];

    /// Create a new event kind.
    pub const fn new(action: Action, target: Target) -> Self {
        Self { action, target }
    }

    /// Whether this event concerns a collection.
    pub const fn is_collection(self) -> bool {
        matches!(self.target, Target::Collection)
    }

    /// The single-bit [`EventSet`] for this kind.
    pub const fn flag(self) -> EventSet {
        let bit = match self.action {
            Action::Create => 0,
            Action::Update => 1,
            Action::Copy => 2,
            Action::Move => 3,
            Action::Delete => 4,
        };
        let shift = match self.target {
            Target::Document => 0,
            Target::Collection => 5,
        };
        EventSet::from_bits_retain(1 << (bit + shift))
    }

    /// The name of the script function that handles this event in `phase`,
    /// e.g. `before-create-document`.
    pub fn function_name(self, phase: Phase) -> String {
        format!(
            "{}-{}-{}",
            phase.as_str(),
            self.action.as_str(),
            self.target.as_str()
        )
    }

    /// Parse a single event name.
    ///
    /// Accepts `create-document`, `CREATE_DOCUMENT` and the legacy names
    /// `store`, `update` and `remove`.
    pub fn parse_all(name: &str) -> Result<&'static [EventKind], ConfigError> {
        let key = name.trim().to_ascii_lowercase().replace('_', "-");
        EVENT_NAMES
            .get(key.as_str())
            .copied()
            .ok_or_else(|| ConfigError::UnknownEvent(name.trim().to_string()))
    }
}

/// Legacy upper-case form, e.g. `CREATE-DOCUMENT`.
impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.action.as_str().to_ascii_uppercase(),
            self.target.as_str().to_ascii_uppercase()
        )
    }
}

static EVENT_NAMES: phf::Map<&'static str, &'static [EventKind]> = phf::phf_map! {
    "create-document" => &[EventKind::CREATE_DOCUMENT],
    "update-document" => &[EventKind::UPDATE_DOCUMENT],
    "copy-document" => &[EventKind::COPY_DOCUMENT],
    "move-document" => &[EventKind::MOVE_DOCUMENT],
    "delete-document" => &[EventKind::DELETE_DOCUMENT],
    "create-collection" => &[EventKind::CREATE_COLLECTION],
    "update-collection" => &[EventKind::UPDATE_COLLECTION],
    "copy-collection" => &[EventKind::COPY_COLLECTION],
    "move-collection" => &[EventKind::MOVE_COLLECTION],
    "delete-collection" => &[EventKind::DELETE_COLLECTION],
    // pre-2.0 configuration names
    "store" => &[EventKind::CREATE_DOCUMENT],
    "update" => &[EventKind::UPDATE_DOCUMENT],
    "remove" => &[EventKind::DELETE_DOCUMENT],
};

bitflags::bitflags! {
    /// A set of event kinds, e.g. the events a trigger subscribes to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventSet: u16 {
        /// `create-document`
        const CREATE_DOCUMENT = 1 << 0;
        /// `update-document`
        const UPDATE_DOCUMENT = 1 << 1;
        /// `copy-document`
        const COPY_DOCUMENT = 1 << 2;
        /// `move-document`
        const MOVE_DOCUMENT = 1 << 3;
        /// `delete-document`
        const DELETE_DOCUMENT = 1 << 4;
        /// `create-collection`
        const CREATE_COLLECTION = 1 << 5;
        /// `update-collection`
        const UPDATE_COLLECTION = 1 << 6;
        /// `copy-collection`
        const COPY_COLLECTION = 1 << 7;
        /// `move-collection`
        const MOVE_COLLECTION = 1 << 8;
        /// `delete-collection`
        const DELETE_COLLECTION = 1 << 9;
    }
}

impl EventSet {
    /// Whether `event` is a member of the set.
    pub fn includes(self, event: EventKind) -> bool {
        self.contains(event.flag())
    }

    /// Parse a list of event names. Each entry may itself be a comma separated
    /// list; blank entries are ignored.
    pub fn parse<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let mut set = EventSet::empty();
        for entry in names {
            for name in entry.split(',').filter(|n| !n.trim().is_empty()) {
                for event in EventKind::parse_all(name)? {
                    set |= event.flag();
                }
            }
        }
        Ok(set)
    }

    /// Iterate the member event kinds in [`EventKind::ALL`] order.
    pub fn events(self) -> impl Iterator<Item = EventKind> {
        EventKind::ALL.into_iter().filter(move |e| self.includes(*e))
    }
}

impl From<EventKind> for EventSet {
    fn from(event: EventKind) -> Self {
        event.flag()
    }
}
