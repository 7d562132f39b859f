mod parse_args;

use log::{debug, info};

use gridsync_protocol::{Link, Result, COMMAND_ACK};
use parse_args::parse_args;

/// Measurement count per batch, in wire order: energy, consumption,
/// production, battery, phev, phev_ready_hours.
const MEASUREMENT_COUNT: usize = 6;

/// Naive charging policy: charge the battery from surplus production,
/// charge the vehicle in the hours before it must be ready.
fn decide(measurements: &[f64]) -> (f64, f64) {
    let consumption = measurements[1];
    let production = measurements[2];
    let phev_ready_hours = measurements[5];

    let surplus = production - consumption;
    let battery = surplus.clamp(-1.0, 1.0);
    let phev = if phev_ready_hours > 0.0 && phev_ready_hours <= 8.0 {
        1.0
    } else {
        0.0
    };
    (battery, phev)
}

fn run(args: &parse_args::AppArgs) -> Result<()> {
    eprintln!(
        "Connecting to {} on ports {} and {}...",
        args.host, args.meas_port, args.cmds_port
    );
    let mut meas = Link::connect((args.host.as_str(), args.meas_port), "measurement link")?;
    let mut cmds = Link::connect((args.host.as_str(), args.cmds_port), "command link")?;
    eprintln!("Connected");

    for hour in 1..=args.hours {
        meas.send_i32(hour)?;
        let sequence = meas.recv_i32()?;
        let mut measurements = [0.0f64; MEASUREMENT_COUNT];
        for slot in measurements.iter_mut() {
            *slot = meas.recv_f64()?;
        }
        debug!("hour {}: measurements {:?}", sequence, measurements);

        let (battery, phev) = decide(&measurements);
        cmds.send_i32(sequence)?;
        cmds.send_f64(battery)?;
        cmds.send_f64(phev)?;

        let ack = cmds.recv_i32()?;
        debug!("hour {}: acknowledgement {}", sequence, ack);
        if ack == COMMAND_ACK {
            info!(
                "hour {}: sent battery {:.3}, phev {:.3}",
                sequence, battery, phev
            );
        } else {
            info!("hour {}: unexpected acknowledgement {}", sequence, ack);
        }
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

    eprintln!("Run complete");
}
