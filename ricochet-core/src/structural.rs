//! # Structural Event Stream
//!
//! Documents travel through content-transforming triggers as a SAX-like
//! stream of [`StructuralEvent`]s. A [`StructuralFilter`] receives each event
//! together with the next node of the chain and decides what to forward:
//! the event unchanged, a rewritten event, several synthesized events or
//! nothing at all. The chain ends at an [`EventSink`] owned by the storage
//! engine.
//!
//! # Layer Position
//!
//! Filters sit between the document parser and the storage engine. Triggers
//! expose one through [`Trigger::as_filter`](crate::Trigger::as_filter).

use crate::error::StreamError;
use std::fmt;

/// A namespace-qualified element name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ElementName {
    /// Namespace URI; empty for no namespace.
    pub namespace: String,
    /// Local part of the name.
    pub local_name: String,
    /// Qualified name as written, including any prefix.
    pub qname: String,
}

impl ElementName {
    /// Create a namespaced name.
    pub fn new(
        namespace: impl Into<String>,
        local_name: impl Into<String>,
        qname: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
            qname: qname.into(),
        }
    }

    /// A name in no namespace whose qualified name is its local name.
    pub fn local(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            namespace: String::new(),
            qname: name.clone(),
            local_name: name,
        }
    }
}

impl fmt::Display for ElementName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.qname)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local_name)
        }
    }
}

/// One attribute of a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name.
    pub name: ElementName,
    /// Attribute type as reported by the parser, usually `CDATA`.
    pub kind: String,
    /// Attribute value.
    pub value: String,
}

impl Attribute {
    /// A no-namespace `CDATA` attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: ElementName::local(name),
            kind: "CDATA".to_string(),
            value: value.into(),
        }
    }
}

/// The attributes of a start tag, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes(Vec<Attribute>);

impl Attributes {
    /// No attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push(Attribute::new(name, value));
        self
    }

    /// Append an attribute.
    pub fn push(&mut self, attribute: Attribute) {
        self.0.push(attribute);
    }

    /// Value of the attribute whose local name is `local_name`.
    pub fn value(&self, local_name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|a| a.name.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Iterate in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Attribute> for Attributes {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One event of the structural stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum StructuralEvent {
    StartDocument,
    EndDocument,
    StartPrefixMapping {
        prefix: String,
        uri: String,
    },
    EndPrefixMapping {
        prefix: String,
    },
    StartElement {
        name: ElementName,
        attributes: Attributes,
    },
    EndElement {
        name: ElementName,
    },
    Characters(String),
    IgnorableWhitespace(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
    SkippedEntity(String),
    StartDtd {
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
    EndDtd,
    StartEntity(String),
    EndEntity(String),
    StartCdata,
    EndCdata,
    Comment(String),
}

impl StructuralEvent {
    /// Start tag with the given attributes.
    pub fn start(name: ElementName, attributes: Attributes) -> Self {
        StructuralEvent::StartElement { name, attributes }
    }

    /// End tag.
    pub fn end(name: ElementName) -> Self {
        StructuralEvent::EndElement { name }
    }

    /// Character data.
    pub fn text(text: impl Into<String>) -> Self {
        StructuralEvent::Characters(text.into())
    }
}

/// Consumer of a structural event stream.
///
/// The storage engine provides the terminal sink; [`StructuralFilter`]s see
/// the rest of the chain through this trait as well.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot consume structural events",
    label = "missing `EventSink` implementation",
    note = "Implement `receive` to accept each `StructuralEvent` in order."
)]
pub trait EventSink {
    /// Accept the next event.
    fn receive(&mut self, event: StructuralEvent) -> Result<(), StreamError>;
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn receive(&mut self, event: StructuralEvent) -> Result<(), StreamError> {
        (**self).receive(event)
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn receive(&mut self, event: StructuralEvent) -> Result<(), StreamError> {
        (**self).receive(event)
    }
}

/// Collects events in memory.
impl EventSink for Vec<StructuralEvent> {
    fn receive(&mut self, event: StructuralEvent) -> Result<(), StreamError> {
        self.push(event);
        Ok(())
    }
}

/// A node of the structural filter chain.
///
/// Implementations forward to `next` whatever they want the rest of the
/// chain to see. Not forwarding drops the event.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a structural filter",
    label = "missing `StructuralFilter` implementation",
    note = "Filters receive each event together with the next node of the chain."
)]
pub trait StructuralFilter: Send {
    /// Handle one event.
    fn receive(
        &mut self,
        event: StructuralEvent,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError>;
}

/// Filter that forwards everything unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl StructuralFilter for PassThrough {
    fn receive(
        &mut self,
        event: StructuralEvent,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError> {
        next.receive(event)
    }
}
