//! Simulator-side facade over the lockstep protocol.
//!
//! Maps the household's named quantities onto buffer slots and wraps the
//! engine in a per-quantity API: the simulator records measurements by name
//! and asks for commands by name, with a fallback value when the current
//! interval's commands have not arrived yet.

use log::debug;

use gridsync_protocol::{
    Advance, DeadlineTimer, Link, ProtocolEngine, SequencedBuffer, SessionListener, Value,
    ValueKind, Error, Result,
};

/// Household quantities sent outward once per interval, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Energy,
    Consumption,
    Production,
    Battery,
    Phev,
    PhevReadyHours,
}

impl Measure {
    pub const COUNT: usize = 6;
    pub const ALL: [Measure; Measure::COUNT] = [
        Measure::Energy,
        Measure::Consumption,
        Measure::Production,
        Measure::Battery,
        Measure::Phev,
        Measure::PhevReadyHours,
    ];

    /// Slot index in the measurement buffer, matching wire order.
    pub fn index(self) -> usize {
        match self {
            Measure::Energy => 0,
            Measure::Consumption => 1,
            Measure::Production => 2,
            Measure::Battery => 3,
            Measure::Phev => 4,
            Measure::PhevReadyHours => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Measure::Energy => "energy",
            Measure::Consumption => "consumption",
            Measure::Production => "production",
            Measure::Battery => "battery",
            Measure::Phev => "phev",
            Measure::PhevReadyHours => "phev_ready_hours",
        }
    }

    pub fn from_name(name: &str) -> Result<Measure> {
        Measure::ALL
            .iter()
            .copied()
            .find(|m| m.name() == name)
            .ok_or_else(|| Error::Config(format!("unknown measurement \"{}\"", name)))
    }
}

/// Externally controlled quantities received once per interval, in wire
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Battery,
    Phev,
}

impl Command {
    pub const COUNT: usize = 2;
    pub const ALL: [Command; Command::COUNT] = [Command::Battery, Command::Phev];

    pub fn index(self) -> usize {
        match self {
            Command::Battery => 0,
            Command::Phev => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Battery => "battery",
            Command::Phev => "phev",
        }
    }

    pub fn from_name(name: &str) -> Result<Command> {
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .ok_or_else(|| Error::Config(format!("unknown command \"{}\"", name)))
    }
}

/// One household's session: the engine plus the staging buffer the
/// simulator fills measurement by measurement.
#[derive(Debug)]
pub struct HouseSession {
    engine: ProtocolEngine,
    staging: SequencedBuffer,
    next_sequence: i32,
}

impl HouseSession {
    /// Listen on both ports, wait for the controller and start the session.
    pub fn start(
        meas_port: u16,
        cmds_port: u16,
        speed: u32,
        steps_per_interval: u32,
    ) -> Result<HouseSession> {
        let listener = SessionListener::bind(meas_port, cmds_port)?;
        let (meas, cmds) = listener.accept()?;
        let timer = DeadlineTimer::new(speed, steps_per_interval)?;
        HouseSession::over_links(meas, cmds, timer)
    }

    /// Build a session over already-established links.
    pub fn over_links(meas: Link, cmds: Link, timer: DeadlineTimer) -> Result<HouseSession> {
        let mut engine = ProtocolEngine::new(meas, cmds, Command::COUNT, timer)?;
        engine.start()?;
        let mut staging = SequencedBuffer::new(Measure::COUNT, ValueKind::Float64)?;
        staging.set_sequence(1)?;
        Ok(HouseSession {
            engine,
            staging,
            next_sequence: 1,
        })
    }

    /// Record one measurement for the interval currently being staged.
    /// Recording over an already-set quantity is tolerated with a warning.
    /// Once every quantity is recorded the batch moves to the outbound
    /// queue and staging begins for the next interval.
    pub fn record(&mut self, measure: Measure, value: f64) -> Result<()> {
        self.staging
            .payload_mut()
            .set(measure.index(), Value::Float64(value))?;
        if self.staging.payload().is_full() {
            debug!("interval {} staged, queueing", self.next_sequence);
            self.next_sequence += 1;
            let mut fresh = SequencedBuffer::new(Measure::COUNT, ValueKind::Float64)?;
            fresh.set_sequence(self.next_sequence)?;
            let batch = std::mem::replace(&mut self.staging, fresh);
            self.engine.enqueue(batch);
        }
        Ok(())
    }

    /// Drive the handshake toward `interval`; suspends at the engine's
    /// suspension points.
    pub fn advance_to(&mut self, interval: i32, step: u32) -> Result<Advance> {
        self.engine.advance(interval, step)
    }

    /// Fetch a command value for the target interval, driving the
    /// handshake as far as readiness allows. Returns `fallback` while the
    /// interval's command block has not yet arrived.
    pub fn command(
        &mut self,
        command: Command,
        fallback: f64,
        interval: i32,
        step: u32,
    ) -> Result<f64> {
        self.engine.advance(interval, step)?;
        if self.engine.command_available(command.index()) {
            self.engine.take_command(command.index())
        } else {
            debug!(
                "command \"{}\" not yet available, using fallback {}",
                command.name(),
                fallback
            );
            Ok(fallback)
        }
    }

    pub fn current_interval(&self) -> i32 {
        self.engine.current_interval()
    }
}
