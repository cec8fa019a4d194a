//! # Deferring Filter
//!
//! A pass-through structural filter that can hold events back. While
//! deferring, every event is queued instead of forwarded. Turning deferral
//! off drains the queue in arrival order through a [`Replay`] hook, which may
//! forward, rewrite or drop each buffered event.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut filter = DeferringFilter::new();
//! filter.set_deferring(true, &mut next)?;
//! filter.receive(StructuralEvent::text("held"), &mut next)?;
//! filter.set_deferring(false, &mut next)?; // "held" reaches `next` now
//! ```

use ricochet_core::{
    Attributes, ElementName, EventSink, StreamError, StructuralEvent, StructuralFilter,
};
use std::collections::VecDeque;

/// Per-kind hooks applied to buffered events when they are replayed.
///
/// Every hook forwards unchanged by default.
pub trait Replay: Send {
    /// Replay a buffered start tag.
    fn start_element(
        &mut self,
        name: ElementName,
        attributes: Attributes,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError> {
        next.receive(StructuralEvent::StartElement { name, attributes })
    }

    /// Replay a buffered end tag.
    fn end_element(
        &mut self,
        name: ElementName,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError> {
        next.receive(StructuralEvent::EndElement { name })
    }

    /// Replay buffered character data.
    fn characters(&mut self, text: String, next: &mut dyn EventSink) -> Result<(), StreamError> {
        next.receive(StructuralEvent::Characters(text))
    }

    /// Replay buffered ignorable whitespace.
    fn ignorable_whitespace(
        &mut self,
        text: String,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError> {
        next.receive(StructuralEvent::IgnorableWhitespace(text))
    }

    /// Replay a buffered processing instruction.
    fn processing_instruction(
        &mut self,
        target: String,
        data: String,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError> {
        next.receive(StructuralEvent::ProcessingInstruction { target, data })
    }

    /// Replay a buffered comment.
    fn comment(&mut self, text: String, next: &mut dyn EventSink) -> Result<(), StreamError> {
        next.receive(StructuralEvent::Comment(text))
    }

    /// Replay a buffered CDATA section boundary; `start` tells which one.
    fn cdata(&mut self, start: bool, next: &mut dyn EventSink) -> Result<(), StreamError> {
        next.receive(if start {
            StructuralEvent::StartCdata
        } else {
            StructuralEvent::EndCdata
        })
    }

    /// Replay a buffered entity boundary; `start` tells which one.
    fn entity(
        &mut self,
        name: String,
        start: bool,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError> {
        next.receive(if start {
            StructuralEvent::StartEntity(name)
        } else {
            StructuralEvent::EndEntity(name)
        })
    }

    /// Replay any other buffered event: document, prefix mapping, DTD and
    /// skipped entity events.
    fn other(
        &mut self,
        event: StructuralEvent,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError> {
        next.receive(event)
    }
}

/// Replays buffered events unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forward;

impl Replay for Forward {}

fn replay<R: Replay + ?Sized>(
    hooks: &mut R,
    event: StructuralEvent,
    next: &mut dyn EventSink,
) -> Result<(), StreamError> {
    match event {
        StructuralEvent::StartElement { name, attributes } => {
            hooks.start_element(name, attributes, next)
        }
        StructuralEvent::EndElement { name } => hooks.end_element(name, next),
        StructuralEvent::Characters(text) => hooks.characters(text, next),
        StructuralEvent::IgnorableWhitespace(text) => hooks.ignorable_whitespace(text, next),
        StructuralEvent::ProcessingInstruction { target, data } => {
            hooks.processing_instruction(target, data, next)
        }
        StructuralEvent::Comment(text) => hooks.comment(text, next),
        StructuralEvent::StartCdata => hooks.cdata(true, next),
        StructuralEvent::EndCdata => hooks.cdata(false, next),
        StructuralEvent::StartEntity(name) => hooks.entity(name, true, next),
        StructuralEvent::EndEntity(name) => hooks.entity(name, false, next),
        other => hooks.other(other, next),
    }
}

/// Structural filter with an on/off event buffer.
#[derive(Debug, Default)]
pub struct DeferringFilter<R = Forward> {
    deferring: bool,
    queue: VecDeque<StructuralEvent>,
    replay: R,
}

impl DeferringFilter {
    /// A pass-through filter whose replay forwards unchanged.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: Replay> DeferringFilter<R> {
    /// A pass-through filter replaying through `replay`.
    pub fn with_replay(replay: R) -> Self {
        Self {
            deferring: false,
            queue: VecDeque::new(),
            replay,
        }
    }

    /// Whether events are currently being buffered.
    pub fn is_deferring(&self) -> bool {
        self.deferring
    }

    /// Number of buffered events.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The replay hooks.
    pub fn replay_hooks(&mut self) -> &mut R {
        &mut self.replay
    }

    /// Switch buffering on or off.
    ///
    /// Switching off replays the queue into `next` in arrival order and
    /// leaves it empty. If a replay hook fails, the events not yet replayed
    /// stay queued.
    pub fn set_deferring(&mut self, on: bool, next: &mut dyn EventSink) -> Result<(), StreamError> {
        self.deferring = on;
        if on {
            return Ok(());
        }
        while let Some(event) = self.queue.pop_front() {
            replay(&mut self.replay, event, next)?;
        }
        Ok(())
    }

    /// Drop the buffered events without replaying them.
    pub fn discard(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

impl<R: Replay> StructuralFilter for DeferringFilter<R> {
    fn receive(
        &mut self,
        event: StructuralEvent,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError> {
        if self.deferring {
            self.queue.push_back(event);
            Ok(())
        } else {
            next.receive(event)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(local: &str) -> ElementName {
        ElementName::local(local)
    }

    #[test]
    fn test_pass_through_by_default() {
        let mut out: Vec<StructuralEvent> = Vec::new();
        let mut filter = DeferringFilter::new();
        filter.receive(StructuralEvent::StartDocument, &mut out).unwrap();
        assert_eq!(out, vec![StructuralEvent::StartDocument]);
        assert_eq!(filter.queued(), 0);
    }

    #[test]
    fn test_replay_in_arrival_order_once() {
        let events = vec![
            StructuralEvent::start(name("a"), Attributes::new()),
            StructuralEvent::text("x"),
            StructuralEvent::end(name("a")),
        ];
        let mut out: Vec<StructuralEvent> = Vec::new();
        let mut filter = DeferringFilter::new();

        filter.set_deferring(true, &mut out).unwrap();
        for event in events.clone() {
            filter.receive(event, &mut out).unwrap();
        }
        assert!(out.is_empty());
        assert_eq!(filter.queued(), 3);

        filter.set_deferring(false, &mut out).unwrap();
        assert_eq!(out, events);

        // a second drain replays nothing
        filter.set_deferring(false, &mut out).unwrap();
        assert_eq!(out.len(), 3);
    }

    /// Upper-cases buffered text, drops buffered comments and renames
    /// processing instruction targets.
    struct Rewrite;

    impl Replay for Rewrite {
        fn characters(
            &mut self,
            text: String,
            next: &mut dyn EventSink,
        ) -> Result<(), StreamError> {
            next.receive(StructuralEvent::Characters(text.to_uppercase()))
        }

        fn comment(&mut self, _text: String, _next: &mut dyn EventSink) -> Result<(), StreamError> {
            Ok(())
        }

        fn processing_instruction(
            &mut self,
            _target: String,
            data: String,
            next: &mut dyn EventSink,
        ) -> Result<(), StreamError> {
            next.receive(StructuralEvent::ProcessingInstruction {
                target: "xml-stylesheet".into(),
                data,
            })
        }
    }

    #[test]
    fn test_replay_hooks_rewrite_and_drop() {
        let mut out: Vec<StructuralEvent> = Vec::new();
        let mut filter = DeferringFilter::with_replay(Rewrite);

        filter.set_deferring(true, &mut out).unwrap();
        filter.receive(StructuralEvent::Comment("gone".into()), &mut out).unwrap();
        filter.receive(StructuralEvent::text("loud"), &mut out).unwrap();
        filter
            .receive(
                StructuralEvent::ProcessingInstruction {
                    target: "style".into(),
                    data: "href='a.xsl'".into(),
                },
                &mut out,
            )
            .unwrap();
        filter.receive(StructuralEvent::StartCdata, &mut out).unwrap();
        filter.set_deferring(false, &mut out).unwrap();

        // live events are not rewritten
        filter.receive(StructuralEvent::text("quiet"), &mut out).unwrap();

        assert_eq!(
            out,
            vec![
                StructuralEvent::text("LOUD"),
                StructuralEvent::ProcessingInstruction {
                    target: "xml-stylesheet".into(),
                    data: "href='a.xsl'".into(),
                },
                StructuralEvent::StartCdata,
                StructuralEvent::text("quiet"),
            ]
        );
    }

    #[test]
    fn test_default_hooks_forward_every_kind() {
        let events = vec![
            StructuralEvent::IgnorableWhitespace("  ".into()),
            StructuralEvent::StartEntity("amp".into()),
            StructuralEvent::EndEntity("amp".into()),
            StructuralEvent::StartCdata,
            StructuralEvent::EndCdata,
            StructuralEvent::Comment("kept".into()),
            StructuralEvent::EndDocument,
        ];
        let mut out: Vec<StructuralEvent> = Vec::new();
        let mut filter = DeferringFilter::new();
        filter.set_deferring(true, &mut out).unwrap();
        for event in events.clone() {
            filter.receive(event, &mut out).unwrap();
        }
        filter.set_deferring(false, &mut out).unwrap();
        assert_eq!(out, events);
    }

    #[test]
    fn test_discard() {
        let mut out: Vec<StructuralEvent> = Vec::new();
        let mut filter = DeferringFilter::new();
        filter.set_deferring(true, &mut out).unwrap();
        filter.receive(StructuralEvent::EndDocument, &mut out).unwrap();
        assert_eq!(filter.discard(), 1);
        filter.set_deferring(false, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
