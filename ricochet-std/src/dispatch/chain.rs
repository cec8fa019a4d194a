//! Linked structural filter chain.

use ricochet_core::{EventSink, StreamError, StructuralEvent, StructuralFilter};

/// A chain of structural filters ending at a terminal sink.
///
/// Only the head receives the raw stream; every filter sees the rest of the
/// chain as its `next` sink. An empty chain forwards straight to the
/// terminal.
///
/// # Example
///
/// ```rust,ignore
/// let mut stored = Vec::new();
/// let mut chain = dispatcher.filter_chain(&mut stored);
/// chain.receive(StructuralEvent::StartDocument)?;
/// ```
pub struct FilterChain<'a> {
    filters: Vec<&'a mut dyn StructuralFilter>,
    terminal: &'a mut dyn EventSink,
}

impl<'a> FilterChain<'a> {
    /// An empty chain ending at `terminal`.
    pub fn new(terminal: &'a mut dyn EventSink) -> Self {
        Self {
            filters: Vec::new(),
            terminal,
        }
    }

    /// Link `filter` after the current tail.
    pub fn push(&mut self, filter: &'a mut dyn StructuralFilter) {
        self.filters.push(filter);
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, filter: &'a mut dyn StructuralFilter) -> Self {
        self.push(filter);
        self
    }

    /// Number of linked filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no filter is linked.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Push a whole stream through the chain, stopping at the first error.
    pub fn feed<I>(&mut self, events: I) -> Result<(), StreamError>
    where
        I: IntoIterator<Item = StructuralEvent>,
    {
        events.into_iter().try_for_each(|event| self.receive(event))
    }
}

impl EventSink for FilterChain<'_> {
    fn receive(&mut self, event: StructuralEvent) -> Result<(), StreamError> {
        forward(&mut self.filters, &mut *self.terminal, event)
    }
}

fn forward<'a>(
    filters: &mut [&'a mut dyn StructuralFilter],
    terminal: &mut dyn EventSink,
    event: StructuralEvent,
) -> Result<(), StreamError> {
    match filters.split_first_mut() {
        Some((head, rest)) => {
            StructuralFilter::receive(&mut **head, event, &mut Downstream { rest, terminal })
        }
        None => terminal.receive(event),
    }
}

/// The part of the chain after one filter.
struct Downstream<'r, 'a> {
    rest: &'r mut [&'a mut dyn StructuralFilter],
    terminal: &'r mut dyn EventSink,
}

impl EventSink for Downstream<'_, '_> {
    fn receive(&mut self, event: StructuralEvent) -> Result<(), StreamError> {
        forward(&mut *self.rest, &mut *self.terminal, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_core::PassThrough;

    /// Upper-cases character data.
    struct Shout;

    impl StructuralFilter for Shout {
        fn receive(
            &mut self,
            event: StructuralEvent,
            next: &mut dyn EventSink,
        ) -> Result<(), StreamError> {
            match event {
                StructuralEvent::Characters(text) => {
                    next.receive(StructuralEvent::Characters(text.to_uppercase()))
                }
                other => next.receive(other),
            }
        }
    }

    /// Drops comments.
    struct NoComments;

    impl StructuralFilter for NoComments {
        fn receive(
            &mut self,
            event: StructuralEvent,
            next: &mut dyn EventSink,
        ) -> Result<(), StreamError> {
            match event {
                StructuralEvent::Comment(_) => Ok(()),
                other => next.receive(other),
            }
        }
    }

    #[test]
    fn test_empty_chain_forwards_to_terminal() {
        let mut out: Vec<StructuralEvent> = Vec::new();
        let mut chain = FilterChain::new(&mut out);
        assert!(chain.is_empty());
        chain.receive(StructuralEvent::StartDocument).unwrap();
        drop(chain);
        assert_eq!(out, vec![StructuralEvent::StartDocument]);
    }

    #[test]
    fn test_filters_run_in_link_order() {
        let mut out: Vec<StructuralEvent> = Vec::new();
        let (mut shout, mut quiet, mut pass) = (Shout, NoComments, PassThrough);
        let mut chain = FilterChain::new(&mut out)
            .with(&mut pass)
            .with(&mut quiet)
            .with(&mut shout);
        assert_eq!(chain.len(), 3);

        chain
            .feed([
                StructuralEvent::Comment("hidden".into()),
                StructuralEvent::text("hello"),
            ])
            .unwrap();
        drop(chain);

        assert_eq!(out, vec![StructuralEvent::text("HELLO")]);
    }
}
