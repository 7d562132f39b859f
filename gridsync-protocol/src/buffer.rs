//! Status-tracked value buffer.
//!
//! Every slot carries its own [`SlotStatus`] and the whole buffer holds one
//! value kind, fixed at creation. A slot's status alone governs validity:
//! `Empty` is unreadable, `Ready` has been written but not consumed, and
//! `Delivered` has been consumed and is eligible for a reset.

use log::warn;

use crate::error::{Error, Result};

/// Per-slot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Empty,
    Ready,
    Delivered,
}

/// The value kind a buffer is declared to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Float64,
    Int32,
}

impl ValueKind {
    fn name(self) -> &'static str {
        match self {
            ValueKind::Float64 => "f64",
            ValueKind::Int32 => "i32",
        }
    }
}

/// A single buffered value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Float64(f64),
    Int32(i32),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float64(_) => ValueKind::Float64,
            Value::Int32(_) => ValueKind::Int32,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    status: SlotStatus,
    value: Value,
}

/// Fixed-size array of independently status-tracked slots.
#[derive(Debug, Clone)]
pub struct StatusBuffer {
    kind: ValueKind,
    slots: Vec<Slot>,
}

impl StatusBuffer {
    /// Create an empty buffer of `size` slots holding `kind` values.
    pub fn new(size: usize, kind: ValueKind) -> Result<Self> {
        if size == 0 {
            return Err(Error::Config(format!("buffer size {} is too small", size)));
        }
        let value = match kind {
            ValueKind::Float64 => Value::Float64(0.0),
            ValueKind::Int32 => Value::Int32(0),
        };
        Ok(StatusBuffer {
            kind,
            slots: vec![
                Slot {
                    status: SlotStatus::Empty,
                    value,
                };
                size
            ],
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    fn check_index(&self, index: usize, what: &str) -> Result<()> {
        if index >= self.slots.len() {
            return Err(Error::Violation(format!(
                "{}: index {} out of buffer range {}",
                what,
                index,
                self.slots.len()
            )));
        }
        Ok(())
    }

    /// Read the value at `index`. Fails if the slot is still `Empty` or the
    /// index is out of range. `Ready` and `Delivered` slots both read fine.
    pub fn get(&self, index: usize) -> Result<Value> {
        self.check_index(index, "get")?;
        let slot = &self.slots[index];
        if slot.status == SlotStatus::Empty {
            return Err(Error::Violation(format!("slot {} is not set", index)));
        }
        Ok(slot.value)
    }

    /// Kind-checked read of an `f64` slot.
    pub fn get_f64(&self, index: usize) -> Result<f64> {
        match self.get(index)? {
            Value::Float64(v) => Ok(v),
            other => Err(Error::Violation(format!(
                "slot {} holds {}, requested f64",
                index,
                other.kind().name()
            ))),
        }
    }

    /// Kind-checked read of an `i32` slot.
    pub fn get_i32(&self, index: usize) -> Result<i32> {
        match self.get(index)? {
            Value::Int32(v) => Ok(v),
            other => Err(Error::Violation(format!(
                "slot {} holds {}, requested i32",
                index,
                other.kind().name()
            ))),
        }
    }

    /// Write `value` into `index` and mark it `Ready`.
    ///
    /// Writing over a non-`Empty` slot is allowed but logged, matching the
    /// overwrite-with-warning behavior the protocol tolerates. A kind
    /// mismatch or an out-of-range index fails without mutating anything.
    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        self.check_index(index, "set")?;
        if value.kind() != self.kind {
            return Err(Error::Violation(format!(
                "slot {} holds {}, got {}",
                index,
                self.kind.name(),
                value.kind().name()
            )));
        }
        let slot = &mut self.slots[index];
        if slot.status != SlotStatus::Empty {
            warn!("slot {} was already set to {:?}", index, slot.value);
        }
        slot.value = value;
        slot.status = SlotStatus::Ready;
        Ok(())
    }

    /// Force a single slot back to `Empty`, warning if it already was.
    pub fn clear(&mut self, index: usize) -> Result<()> {
        self.check_index(index, "clear")?;
        if self.slots[index].status == SlotStatus::Empty {
            warn!("slot {} was already empty", index);
        }
        self.slots[index].status = SlotStatus::Empty;
        Ok(())
    }

    /// Transition `Ready` to `Delivered`, warning on an `Empty` or
    /// already-`Delivered` slot. Warnings never abort the session.
    pub fn mark_delivered(&mut self, index: usize) -> Result<()> {
        self.check_index(index, "mark_delivered")?;
        match self.slots[index].status {
            SlotStatus::Empty => warn!("slot {} was not set", index),
            SlotStatus::Delivered => warn!("slot {} was already marked as delivered", index),
            SlotStatus::Ready => {}
        }
        self.slots[index].status = SlotStatus::Delivered;
        Ok(())
    }

    /// Force every slot to `Empty`, regardless of prior state.
    pub fn clear_all(&mut self) {
        for slot in &mut self.slots {
            slot.status = SlotStatus::Empty;
        }
    }

    pub fn status(&self, index: usize) -> Result<SlotStatus> {
        self.check_index(index, "status")?;
        Ok(self.slots[index].status)
    }

    pub fn is_set(&self, index: usize) -> Result<bool> {
        self.check_index(index, "is_set")?;
        Ok(self.slots[index].status != SlotStatus::Empty)
    }

    pub fn is_delivered(&self, index: usize) -> Result<bool> {
        self.check_index(index, "is_delivered")?;
        Ok(self.slots[index].status == SlotStatus::Delivered)
    }

    /// True when no slot is `Empty`.
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.status != SlotStatus::Empty)
    }

    /// True when every slot is `Empty`.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.status == SlotStatus::Empty)
    }

    /// True when every slot has been set and then consumed.
    pub fn is_all_delivered(&self) -> bool {
        self.slots.iter().all(|s| s.status == SlotStatus::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            StatusBuffer::new(0, ValueKind::Float64),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn starts_empty_and_fills_slot_by_slot() {
        for n in 1..=5 {
            let mut b = StatusBuffer::new(n, ValueKind::Float64).unwrap();
            assert!(b.is_empty());
            assert!(!b.is_full());
            for i in 0..n {
                assert!(!b.is_full());
                b.set(i, Value::Float64(i as f64)).unwrap();
            }
            assert!(b.is_full());
            assert!(!b.is_empty());
        }
    }

    #[test]
    fn get_returns_exact_value_bitwise() {
        let mut b = StatusBuffer::new(3, ValueKind::Float64).unwrap();
        let v = -0.1f64;
        b.set(1, Value::Float64(v)).unwrap();
        match b.get(1).unwrap() {
            Value::Float64(got) => assert_eq!(got.to_bits(), v.to_bits()),
            _ => panic!("wrong kind"),
        }
        assert_eq!(b.get_f64(1).unwrap().to_bits(), v.to_bits());
    }

    #[test]
    fn get_empty_slot_fails() {
        let b = StatusBuffer::new(2, ValueKind::Int32).unwrap();
        assert!(matches!(b.get(0), Err(Error::Violation(_))));
    }

    #[test]
    fn get_out_of_range_fails() {
        let b = StatusBuffer::new(2, ValueKind::Int32).unwrap();
        assert!(matches!(b.get(2), Err(Error::Violation(_))));
    }

    #[test]
    fn kind_mismatch_is_a_violation() {
        let mut b = StatusBuffer::new(2, ValueKind::Int32).unwrap();
        assert!(matches!(
            b.set(0, Value::Float64(1.0)),
            Err(Error::Violation(_))
        ));
        // failed set leaves the slot untouched
        assert!(!b.is_set(0).unwrap());
        b.set(0, Value::Int32(7)).unwrap();
        assert!(matches!(b.get_f64(0), Err(Error::Violation(_))));
        assert_eq!(b.get_i32(0).unwrap(), 7);
    }

    #[test]
    fn delivered_slots_still_read() {
        let mut b = StatusBuffer::new(1, ValueKind::Float64).unwrap();
        b.set(0, Value::Float64(2.5)).unwrap();
        b.mark_delivered(0).unwrap();
        assert_eq!(b.get_f64(0).unwrap(), 2.5);
    }

    #[test]
    fn all_delivered_requires_set_then_delivered() {
        let mut b = StatusBuffer::new(2, ValueKind::Float64).unwrap();
        assert!(!b.is_all_delivered());
        b.set(0, Value::Float64(1.0)).unwrap();
        b.set(1, Value::Float64(2.0)).unwrap();
        b.mark_delivered(0).unwrap();
        assert!(!b.is_all_delivered());
        b.mark_delivered(1).unwrap();
        assert!(b.is_all_delivered());
    }

    #[test]
    fn clear_unsets_a_single_slot() {
        let mut b = StatusBuffer::new(2, ValueKind::Float64).unwrap();
        b.set(0, Value::Float64(1.0)).unwrap();
        b.set(1, Value::Float64(2.0)).unwrap();
        b.clear(0).unwrap();
        assert!(!b.is_set(0).unwrap());
        assert!(matches!(b.get(0), Err(Error::Violation(_))));
        // the other slot is untouched
        assert_eq!(b.get_f64(1).unwrap(), 2.0);
        // clearing an already-empty slot warns but succeeds
        b.clear(0).unwrap();
        assert!(matches!(b.clear(2), Err(Error::Violation(_))));
    }

    #[test]
    fn clear_all_resets_everything() {
        let mut b = StatusBuffer::new(3, ValueKind::Float64).unwrap();
        b.set(0, Value::Float64(1.0)).unwrap();
        b.set(1, Value::Float64(2.0)).unwrap();
        b.mark_delivered(0).unwrap();
        b.clear_all();
        assert!(b.is_empty());
        assert!(matches!(b.get(0), Err(Error::Violation(_))));
    }
}
