//! Event source seam between the core pipeline and file readers.

use crate::error::Result;
use crate::event::Event;

/// A forward-only supplier of events with a known entry count.
///
/// `next_event` yields events in entry order, one pass only; restarting
/// means reopening the source.
pub trait EventSource {
    /// Total number of entries the source will yield.
    fn entries(&self) -> u64;

    /// Next event, or `None` once the source is exhausted.
    fn next_event(&mut self) -> Option<Result<Event>>;
}

/// In-memory source over an owned event list, mainly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    events: Vec<Event>,
    cursor: usize,
}

impl MemorySource {
    /// Source yielding `events` in order.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events, cursor: 0 }
    }
}

impl EventSource for MemorySource {
    fn entries(&self) -> u64 {
        self.events.len() as u64
    }

    fn next_event(&mut self) -> Option<Result<Event>> {
        let ev = self.events.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(Ok(ev))
    }
}
