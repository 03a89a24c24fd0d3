use std::time::Duration;

use clap::Parser;
use convergence::RunnerConfig;

/// Interval used when daemonizing without an explicit interval.
const DEFAULT_DAEMON_INTERVAL: u64 = 1800;

#[derive(Debug, Parser)]
#[command(
    name = "converge",
    version,
    about = "Converge a host toward its declared resource catalog"
)]
pub struct Cli {
    /// Path to the resource catalog (default: ~/.config/converge/catalog.toml)
    #[arg(short, long, env = "CONVERGE_CATALOG")]
    pub catalog: Option<String>,

    /// Run convergence passes periodically, every SECONDS
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Random delay of up to SECONDS before each pass
    #[arg(short, long, value_name = "SECONDS")]
    pub splay: Option<u64>,

    /// Keep running between passes (implies an interval of 1800s)
    #[arg(short, long)]
    pub daemonize: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Scheduling config derived from the flags.
    pub fn schedule(&self) -> RunnerConfig {
        let interval = self
            .interval
            .or(self.daemonize.then_some(DEFAULT_DAEMON_INTERVAL));
        RunnerConfig {
            interval: interval.map(Duration::from_secs),
            splay: self.splay.map(Duration::from_secs),
        }
    }
}
