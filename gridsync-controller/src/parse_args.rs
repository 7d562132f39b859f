const HELP: &str = "\
gridsync-controller - Lockstep controller peer

Connects to a running gridsync-house instance, requests each hour's
measurements and answers with battery and vehicle charge commands.

USAGE:
  gridsync-controller [OPTIONS]

OPTIONS:
  -h, --help            Prints help information
  --host <host>         Simulator host (default: 127.0.0.1)
  --meas-port <port>    Measurement port (default: 2324)
  --cmds-port <port>    Command port (default: 2325)
  --hours <n>           Hours to run (default: 24)
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
    pub host: String,
    pub meas_port: u16,
    pub cmds_port: u16,
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
        host: pargs
            .opt_value_from_str("--host")?
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        meas_port: pargs
            .opt_value_from_str("--meas-port")?
            .unwrap_or(gridsync_protocol::MEAS_PORT),
        cmds_port: pargs
            .opt_value_from_str("--cmds-port")?
            .unwrap_or(gridsync_protocol::CMDS_PORT),
        hours: pargs.opt_value_from_str("--hours")?.unwrap_or(24),
        verbosity,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}.", remaining);
    }

    Ok(args)
}
