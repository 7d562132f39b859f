mod parse_args;

use std::thread;
use std::time::Duration;

use log::info;

use gridsync_house::{Command, HouseSession, Measure};
use gridsync_protocol::Advance;
use parse_args::parse_args;

/// Canned per-hour household profile. Deterministic so a scripted
/// controller can assert against it.
fn profile(hour: i32, measure: Measure) -> f64 {
    let h = f64::from(hour);
    match measure {
        Measure::Energy => 10.0 + h,
        Measure::Consumption => 3.0 + (h % 4.0) * 0.5,
        Measure::Production => if (6..20).contains(&(hour % 24)) { 2.0 } else { 0.0 },
        Measure::Battery => 0.8,
        Measure::Phev => if hour % 24 >= 18 { 1.5 } else { 0.0 },
        Measure::PhevReadyHours => f64::from((24 - hour % 24) % 24),
    }
}

fn run(args: &parse_args::AppArgs) -> gridsync_protocol::Result<()> {
    eprintln!(
        "Listening on ports {} (measurements) and {} (commands)...",
        args.meas_port, args.cmds_port
    );
    let mut session = HouseSession::start(args.meas_port, args.cmds_port, args.speed, args.steps)?;
    eprintln!("Controller connected, simulating {} hours", args.hours);

    let mut battery = 0.0;
    let mut phev = 0.0;
    for hour in 1..=args.hours {
        for m in Measure::ALL {
            session.record(m, profile(hour, m))?;
        }

        let mut step = 1;
        loop {
            match session.advance_to(hour, step)? {
                Advance::Reached => break,
                Advance::Pending => {
                    thread::sleep(Duration::from_millis(10));
                    if step < args.steps {
                        step += 1;
                    }
                }
            }
        }

        battery = session.command(Command::Battery, battery, hour, args.steps)?;
        phev = session.command(Command::Phev, phev, hour, args.steps)?;
        info!(
            "hour {}: battery command {:.3}, phev command {:.3}",
            hour, battery, phev
        );
    }
    Ok(())
}

fn main() {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(args.verbosity.filter())
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Session failed: {}", e);
        std::process::exit(1);
    }

    eprintln!("Simulation complete");
}
