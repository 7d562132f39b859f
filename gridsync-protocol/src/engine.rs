//! Four-state lockstep handshake.
//!
//! One round per interval: wait for the controller's request, send the
//! queued measurement batch, wait for the incoming command sequence number,
//! fill the command buffer and acknowledge. The engine is single-threaded
//! and cooperative; [`advance`](ProtocolEngine::advance) returns
//! [`Advance::Pending`] whenever a state cannot progress without further
//! I/O readiness and the caller retries on its next sub-step.

use log::{debug, info};

use crate::buffer::{Value, ValueKind};
use crate::error::{Error, Result};
use crate::link::{Direction, Link};
use crate::queue::OutboundQueue;
use crate::sequenced::SequencedBuffer;
use crate::timer::DeadlineTimer;

/// Acknowledgement value sent after a complete command block.
pub const COMMAND_ACK: i32 = 0;

/// Where the engine is within the current interval's round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Waiting for the controller's 4-byte request on the measurement link.
    MeasWait,
    /// A request arrived; waiting for a full batch in the outbound queue.
    MeasSend,
    /// Batch sent; waiting for the command sequence number.
    CmdsWait,
    /// Sequence accepted; receiving command values, then acknowledging.
    CmdsRecv,
}

/// Outcome of one [`advance`](ProtocolEngine::advance) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Every interval up to and including the target has completed.
    Reached,
    /// A suspension point was hit; call again on the next sub-step.
    Pending,
}

/// The lockstep engine owning both links, the outbound queue and the
/// inbound command buffer for one session.
#[derive(Debug)]
pub struct ProtocolEngine {
    meas: Link,
    cmds: Link,
    outbound: OutboundQueue,
    inbound: SequencedBuffer,
    timer: DeadlineTimer,
    state: ProtocolState,
    current_interval: i32,
    last_control: Option<i32>,
    running: bool,
}

impl ProtocolEngine {
    /// Build an engine over two established links. `command_count` is the
    /// fixed number of values in each incoming command block.
    pub fn new(
        meas: Link,
        cmds: Link,
        command_count: usize,
        timer: DeadlineTimer,
    ) -> Result<Self> {
        Ok(ProtocolEngine {
            meas,
            cmds,
            outbound: OutboundQueue::new(),
            inbound: SequencedBuffer::new(command_count, ValueKind::Float64)?,
            timer,
            state: ProtocolState::MeasWait,
            current_interval: 1,
            last_control: None,
            running: false,
        })
    }

    /// Override the first interval number, for sessions resuming an
    /// established numbering. Only valid before [`start`](Self::start).
    pub fn with_first_interval(mut self, interval: i32) -> Self {
        self.current_interval = interval;
        self
    }

    /// Begin the session. Starting an engine that is already running is a
    /// protocol violation.
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(Error::Violation("engine already running".to_string()));
        }
        self.running = true;
        self.timer.reset();
        info!("session started at interval {}", self.current_interval);
        Ok(())
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn current_interval(&self) -> i32 {
        self.current_interval
    }

    /// The most recent request value received on the measurement link.
    pub fn last_control(&self) -> Option<i32> {
        self.last_control
    }

    /// Hand a filled measurement batch to the engine for transmission.
    pub fn enqueue(&mut self, buffer: SequencedBuffer) {
        self.outbound.push(buffer);
    }

    pub fn queued(&self) -> usize {
        self.outbound.len()
    }

    /// Whether the current command block holds an unread value at `index`.
    pub fn command_available(&self, index: usize) -> bool {
        self.inbound.has_sequence() && self.inbound.payload().is_set(index).unwrap_or(false)
    }

    /// Consume one command value, marking its slot delivered. Once every
    /// slot has been delivered the command buffer resets itself, making room
    /// for the next interval's block.
    pub fn take_command(&mut self, index: usize) -> Result<f64> {
        let value = self.inbound.payload().get_f64(index)?;
        self.inbound.payload_mut().mark_delivered(index)?;
        if self.inbound.payload().is_all_delivered() {
            debug!(
                "command block {} fully drained",
                self.inbound.sequence().unwrap_or(-1)
            );
            self.inbound.reset();
        }
        Ok(value)
    }

    /// Drive the handshake until every interval up to `target` has
    /// completed, suspending whenever a readiness poll or an empty queue
    /// blocks progress. `step` is the simulator's current sub-step within
    /// the interval and bounds how long a poll may wait.
    pub fn advance(&mut self, target: i32, step: u32) -> Result<Advance> {
        if !self.running {
            return Err(Error::Violation("engine not started".to_string()));
        }
        loop {
            if self.current_interval > target {
                return Ok(Advance::Reached);
            }
            match self.state {
                ProtocolState::MeasWait => {
                    if !self.poll(Direction::Read, step, true)? {
                        return Ok(Advance::Pending);
                    }
                    let control = self.meas.recv_i32()?;
                    debug!("interval {}: request {}", self.current_interval, control);
                    self.last_control = Some(control);
                    self.state = ProtocolState::MeasSend;
                }
                ProtocolState::MeasSend => {
                    let batch = match self.outbound.pop() {
                        Some(b) => b,
                        None => return Ok(Advance::Pending),
                    };
                    self.send_batch(batch)?;
                    self.state = ProtocolState::CmdsWait;
                }
                ProtocolState::CmdsWait => {
                    if !self.poll(Direction::Read, step, false)? {
                        return Ok(Advance::Pending);
                    }
                    let sequence = self.cmds.recv_i32()?;
                    if sequence != self.current_interval {
                        return Err(Error::Violation(format!(
                            "received command sequence {}, expected {}",
                            sequence, self.current_interval
                        )));
                    }
                    if self.inbound.has_sequence() {
                        return Err(Error::Violation(format!(
                            "command block {} still pending, cannot accept {}",
                            self.inbound.sequence()?,
                            sequence
                        )));
                    }
                    self.inbound.payload_mut().clear_all();
                    self.inbound.set_sequence(sequence)?;
                    self.state = ProtocolState::CmdsRecv;
                }
                ProtocolState::CmdsRecv => {
                    // a partially received block cannot be abandoned
                    // mid-field, so this path blocks until complete
                    for index in 0..self.inbound.payload().len() {
                        if self.inbound.payload().is_set(index)? {
                            continue;
                        }
                        let value = self.cmds.recv_f64()?;
                        self.inbound.payload_mut().set(index, Value::Float64(value))?;
                    }
                    self.cmds.send_i32(COMMAND_ACK)?;
                    info!("interval {} complete", self.current_interval);
                    self.current_interval += 1;
                    self.timer.reset();
                    self.state = ProtocolState::MeasWait;
                }
            }
        }
    }

    /// Readiness poll bounded by the step deadline; an empty-handed poll
    /// past the full interval budget is fatal.
    fn poll(&mut self, direction: Direction, step: u32, measurement: bool) -> Result<bool> {
        let deadline = self.timer.deadline_millis(step);
        let ready = if measurement {
            self.meas.poll_ready(deadline, direction)?
        } else {
            self.cmds.poll_ready(deadline, direction)?
        };
        if ready {
            return Ok(true);
        }
        if self.timer.budget_elapsed() {
            return Err(Error::Timeout(if measurement {
                "measurement readiness"
            } else {
                "command readiness"
            }));
        }
        Ok(false)
    }

    fn send_batch(&mut self, batch: SequencedBuffer) -> Result<()> {
        let sequence = batch.sequence()?;
        if sequence != self.current_interval {
            return Err(Error::Violation(format!(
                "queued batch has sequence {}, expected {}",
                sequence, self.current_interval
            )));
        }
        self.meas.send_i32(sequence)?;
        for index in 0..batch.payload().len() {
            self.meas.send_f64(batch.payload().get_f64(index)?)?;
        }
        debug!(
            "interval {}: sent {} measurement values",
            sequence,
            batch.payload().len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    struct Peer {
        meas: TcpStream,
        cmds: TcpStream,
    }

    impl Peer {
        fn read_i32(stream: &mut TcpStream) -> i32 {
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            i32::from_ne_bytes(buf)
        }

        fn read_f64(stream: &mut TcpStream) -> f64 {
            let mut buf = [0u8; 8];
            stream.read_exact(&mut buf).unwrap();
            f64::from_ne_bytes(buf)
        }

        fn request(&mut self, control: i32) {
            self.meas.write_all(&control.to_ne_bytes()).unwrap();
        }

        fn read_batch(&mut self, count: usize) -> (i32, Vec<f64>) {
            let sequence = Self::read_i32(&mut self.meas);
            let values = (0..count).map(|_| Self::read_f64(&mut self.meas)).collect();
            (sequence, values)
        }

        fn send_commands(&mut self, sequence: i32, values: &[f64]) {
            self.cmds.write_all(&sequence.to_ne_bytes()).unwrap();
            for v in values {
                self.cmds.write_all(&v.to_ne_bytes()).unwrap();
            }
        }

        fn read_ack(&mut self) -> i32 {
            Self::read_i32(&mut self.cmds)
        }
    }

    fn session(speed: u32, command_count: usize) -> (ProtocolEngine, Peer) {
        let _ = env_logger::builder().is_test(true).try_init();
        let meas_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let cmds_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let meas_addr = meas_listener.local_addr().unwrap();
        let cmds_addr = cmds_listener.local_addr().unwrap();
        let connector = thread::spawn(move || Peer {
            meas: TcpStream::connect(meas_addr).unwrap(),
            cmds: TcpStream::connect(cmds_addr).unwrap(),
        });
        let meas = Link::new(meas_listener.accept().unwrap().0, "measurement link").unwrap();
        let cmds = Link::new(cmds_listener.accept().unwrap().0, "command link").unwrap();
        let peer = connector.join().unwrap();
        // short deadlines keep the polls fast while leaving budget to spare
        let timer = DeadlineTimer::new(speed, 60).unwrap();
        let engine = ProtocolEngine::new(meas, cmds, command_count, timer).unwrap();
        (engine, peer)
    }

    fn batch(sequence: i32, values: &[f64]) -> SequencedBuffer {
        let mut b = SequencedBuffer::new(values.len(), ValueKind::Float64).unwrap();
        b.set_sequence(sequence).unwrap();
        for (i, v) in values.iter().enumerate() {
            b.payload_mut().set(i, Value::Float64(*v)).unwrap();
        }
        b
    }

    #[test]
    fn full_round_advances_the_interval() {
        let (engine, mut peer) = session(3_600, 2);
        let mut engine = engine.with_first_interval(7);
        engine.start().unwrap();
        engine.enqueue(batch(7, &[1.0, 2.0, 3.0]));

        let peer_thread = thread::spawn(move || {
            peer.request(7);
            let (sequence, values) = peer.read_batch(3);
            assert_eq!(sequence, 7);
            assert_eq!(values, vec![1.0, 2.0, 3.0]);
            peer.send_commands(7, &[0.5, -1.0]);
            assert_eq!(peer.read_ack(), COMMAND_ACK);
        });

        loop {
            match engine.advance(7, 1).unwrap() {
                Advance::Reached => break,
                Advance::Pending => thread::sleep(Duration::from_millis(5)),
            }
        }
        peer_thread.join().unwrap();

        assert_eq!(engine.current_interval(), 8);
        assert_eq!(engine.state(), ProtocolState::MeasWait);
        assert!(engine.command_available(0));
        assert_eq!(engine.take_command(0).unwrap(), 0.5);
        assert_eq!(engine.take_command(1).unwrap(), -1.0);
        // fully drained block resets for the next interval
        assert!(!engine.command_available(0));
    }

    #[test]
    fn empty_queue_suspends_in_meas_send() {
        let (mut engine, mut peer) = session(3_600, 2);
        engine.start().unwrap();
        peer.request(1);
        // give the request time to arrive
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.advance(1, 1).unwrap(), Advance::Pending);
        assert_eq!(engine.state(), ProtocolState::MeasSend);
        assert_eq!(engine.advance(1, 1).unwrap(), Advance::Pending);
    }

    #[test]
    fn silent_controller_suspends_then_times_out() {
        // budget is 3600s / 36000 = 100ms
        let (mut engine, _peer) = session(36_000, 2);
        engine.start().unwrap();
        let mut outcome = engine.advance(1, 60);
        while matches!(outcome, Ok(Advance::Pending)) {
            outcome = engine.advance(1, 60);
        }
        assert!(matches!(outcome, Err(Error::Timeout(_))));
        assert_eq!(engine.state(), ProtocolState::MeasWait);
    }

    #[test]
    fn mismatched_batch_sequence_is_a_violation() {
        let (mut engine, mut peer) = session(3_600, 2);
        engine.start().unwrap();
        engine.enqueue(batch(3, &[1.0]));
        peer.request(1);
        thread::sleep(Duration::from_millis(20));
        assert!(matches!(
            engine.advance(1, 1),
            Err(Error::Violation(_))
        ));
    }

    #[test]
    fn mismatched_command_sequence_is_a_violation() {
        let (engine, mut peer) = session(3_600, 2);
        let mut engine = engine.with_first_interval(4);
        engine.start().unwrap();
        engine.enqueue(batch(4, &[9.0]));

        let peer_thread = thread::spawn(move || {
            peer.request(4);
            let _ = peer.read_batch(1);
            peer.send_commands(5, &[0.0, 0.0]);
        });

        let mut outcome = engine.advance(4, 1);
        while matches!(outcome, Ok(Advance::Pending)) {
            thread::sleep(Duration::from_millis(5));
            outcome = engine.advance(4, 1);
        }
        assert!(matches!(outcome, Err(Error::Violation(_))));
        peer_thread.join().unwrap();
    }

    #[test]
    fn reentrant_start_is_a_violation() {
        let (mut engine, _peer) = session(3_600, 2);
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(Error::Violation(_))));
    }

    #[test]
    fn advance_before_start_is_a_violation() {
        let (mut engine, _peer) = session(3_600, 2);
        assert!(matches!(
            engine.advance(1, 1),
            Err(Error::Violation(_))
        ));
    }

    #[test]
    fn target_below_current_interval_is_already_reached() {
        let (engine, _peer) = session(3_600, 2);
        let mut engine = engine.with_first_interval(5);
        engine.start().unwrap();
        assert_eq!(engine.advance(4, 1).unwrap(), Advance::Reached);
    }
}
