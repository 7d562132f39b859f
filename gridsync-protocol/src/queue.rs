//! FIFO of sequenced buffers awaiting transmission.
//!
//! Lets the simulator start filling interval N+1 before interval N has been
//! transmitted. No depth cap: the protocol layer keeps the queue shallow by
//! construction, one entry per unsent interval.

use std::collections::VecDeque;

use crate::sequenced::SequencedBuffer;

#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: VecDeque<SequencedBuffer>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        OutboundQueue {
            entries: VecDeque::new(),
        }
    }

    /// Append a buffer behind everything already queued.
    pub fn push(&mut self, buffer: SequencedBuffer) {
        self.entries.push_back(buffer);
    }

    /// The oldest entry, without removing it.
    pub fn peek(&self) -> Option<&SequencedBuffer> {
        self.entries.front()
    }

    /// Remove the oldest entry, transferring ownership to the caller.
    pub fn pop(&mut self) -> Option<SequencedBuffer> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
