use anyhow::Result;
use clap::Parser;
use fleet_shadow::cli::Cli;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = fleet_shadow::run_with(cli) {
        if e.is_persistence() {
            tracing::error!(error = %e, "storage backend failed");
        }
        return Err(e.into());
    }
    Ok(())
}
