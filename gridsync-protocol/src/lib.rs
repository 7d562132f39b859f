//! # gridsync protocol
//!
//! Lockstep synchronization between a time-stepped simulator and an external
//! controller over two persistent TCP connections: one carries measurements
//! out, the other carries commands back, one full batch per simulated
//! interval ("hour").
//!
//! ## Wire Format
//!
//! Host byte order, no length prefixes (lengths are implicit from protocol
//! state):
//!
//! ```text
//! measurement message:  [sequence:i32][value_0:f64]...[value_{M-1}:f64]
//! command message:      [sequence:i32][value_0:f64]...[value_{K-1}:f64]
//! acknowledgement:      [0:i32]   (sent back after a complete command block)
//! ```
//!
//! ## Handshake
//!
//! One round per interval, driven by [`ProtocolEngine::advance`]:
//!
//! | State | Connection | Action |
//! |----------|-------------|--------------------------------------------|
//! | MeasWait | measurement | wait for the controller's 4-byte request |
//! | MeasSend | measurement | send one queued measurement batch |
//! | CmdsWait | command | wait for the incoming sequence number |
//! | CmdsRecv | command | fill the command buffer, acknowledge |

mod buffer;
mod engine;
mod error;
mod link;
mod listen;
mod queue;
mod sequenced;
mod timer;

pub use buffer::{SlotStatus, StatusBuffer, Value, ValueKind};
pub use engine::{Advance, ProtocolEngine, ProtocolState, COMMAND_ACK};
pub use error::{Error, Result};
pub use link::{Direction, Link};
pub use listen::{SessionListener, CMDS_PORT, MEAS_PORT};
pub use queue::OutboundQueue;
pub use sequenced::SequencedBuffer;
pub use timer::{DeadlineTimer, INTERVAL_BUDGET};
