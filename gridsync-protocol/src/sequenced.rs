//! A status buffer tagged with the interval it belongs to.

use crate::buffer::{StatusBuffer, ValueKind};
use crate::error::{Error, Result};

/// One interval's worth of values plus the sequence number identifying it.
///
/// The sequence is `None` until explicitly set, once per interval. Setting
/// it twice without an intervening [`reset`](SequencedBuffer::reset) is a
/// protocol violation, not a silent overwrite.
#[derive(Debug, Clone)]
pub struct SequencedBuffer {
    sequence: Option<i32>,
    payload: StatusBuffer,
}

impl SequencedBuffer {
    pub fn new(size: usize, kind: ValueKind) -> Result<Self> {
        Ok(SequencedBuffer {
            sequence: None,
            payload: StatusBuffer::new(size, kind)?,
        })
    }

    /// Tag the buffer with the interval number it carries.
    pub fn set_sequence(&mut self, sequence: i32) -> Result<()> {
        if let Some(existing) = self.sequence {
            return Err(Error::Violation(format!(
                "sequence already set to {}, refusing {}",
                existing, sequence
            )));
        }
        self.sequence = Some(sequence);
        Ok(())
    }

    /// The interval number, failing if none has been assigned yet.
    pub fn sequence(&self) -> Result<i32> {
        self.sequence
            .ok_or_else(|| Error::Violation("sequence is not set".to_string()))
    }

    pub fn has_sequence(&self) -> bool {
        self.sequence.is_some()
    }

    pub fn payload(&self) -> &StatusBuffer {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut StatusBuffer {
        &mut self.payload
    }

    /// Clear both the sequence and every payload slot, once a block has
    /// been fully consumed.
    pub fn reset(&mut self) {
        self.sequence = None;
        self.payload.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Value;

    #[test]
    fn double_set_sequence_fails() {
        let mut b = SequencedBuffer::new(2, ValueKind::Float64).unwrap();
        b.set_sequence(1).unwrap();
        assert!(matches!(b.set_sequence(2), Err(Error::Violation(_))));
        assert_eq!(b.sequence().unwrap(), 1);
    }

    #[test]
    fn sequence_unset_fails() {
        let b = SequencedBuffer::new(2, ValueKind::Float64).unwrap();
        assert!(matches!(b.sequence(), Err(Error::Violation(_))));
    }

    #[test]
    fn reset_clears_sequence_and_payload() {
        let mut b = SequencedBuffer::new(2, ValueKind::Float64).unwrap();
        b.set_sequence(5).unwrap();
        b.payload_mut().set(0, Value::Float64(1.0)).unwrap();
        b.payload_mut().set(1, Value::Float64(2.0)).unwrap();
        b.reset();
        assert!(!b.has_sequence());
        assert!(b.payload().is_empty());
        b.set_sequence(6).unwrap();
    }
}
