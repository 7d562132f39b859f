const HELP: &str = "\
gridsync-house - Lockstep household simulator harness

Listens for a controller and replays a canned measurement profile,
one batch per simulated hour.

USAGE:
  gridsync-house [OPTIONS]

OPTIONS:
  -h, --help            Prints help information
  --meas-port <port>    Measurement listen port (default: 2324)
  --cmds-port <port>    Command listen port (default: 2325)
  --speed <factor>      Simulation speed factor (default: 3600)
  --steps <n>           Sub-steps per simulated hour (default: 60)
  --hours <n>           Hours to simulate (default: 24)
  -v, --verbose         Show protocol events
  -vv, --trace          Show all protocol messages
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Verbose = 1,
    Trace = 2,
}

impl Verbosity {
    pub fn filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Quiet => log::LevelFilter::Warn,
            Verbosity::Verbose => log::LevelFilter::Info,
            Verbosity::Trace => log::LevelFilter::Debug,
        }
    }
}

#[derive(Debug)]
pub struct AppArgs {
    pub meas_port: u16,
    pub cmds_port: u16,
    pub speed: u32,
    pub steps: u32,
    pub hours: i32,
    pub verbosity: Verbosity,
}

pub fn parse_args() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let verbosity = if pargs.contains("--trace") || pargs.contains("-vv") {
        Verbosity::Trace
    } else if pargs.contains(["-v", "--verbose"]) {
        Verbosity::Verbose
    } else {
        Verbosity::Quiet
    };

    let args = AppArgs {
        meas_port: pargs
            .opt_value_from_str("--meas-port")?
            .unwrap_or(gridsync_protocol::MEAS_PORT),
        cmds_port: pargs
            .opt_value_from_str("--cmds-port")?
            .unwrap_or(gridsync_protocol::CMDS_PORT),
        speed: pargs.opt_value_from_str("--speed")?.unwrap_or(3600),
        steps: pargs.opt_value_from_str("--steps")?.unwrap_or(60),
        hours: pargs.opt_value_from_str("--hours")?.unwrap_or(24),
        verbosity,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}.", remaining);
    }

    Ok(args)
}
