mod bus;
mod device;
mod monitor;
use monitor::{MonitorArgs, MonitorError, RunArgs};


use clap::{Parser, Subcommand};
use clap_verbosity_flag::WarnLevel;
use shadow_rs::shadow;
use thiserror::Error;

shadow!(build);

/// Memory-mapped LED panel, seven-segment display and UART for a MIPS-style simulator.
#[derive(Parser, Debug)]
#[command(name = "ledpanel", author, version = build::CLAP_LONG_VERSION, about)]
struct Args {
    #[clap(flatten)]
    verbose: clap_verbosity_flag::Verbosity<WarnLevel>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Drive the devices interactively from stdin
    Monitor(MonitorArgs),
    /// Execute a file of monitor commands
    Run(RunArgs),
}

#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

#[async_std::main]
async fn main() -> Result<(), Error> {
    let cli = Args::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    match cli.command {
        Command::Monitor(args) => monitor::monitor(args).await?,
        Command::Run(args) => monitor::run(args)?,
    }

    Ok(())
}
