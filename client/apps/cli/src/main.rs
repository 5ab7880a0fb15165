//! Attendance CLI Entry Point
//!
//! Signs in, runs one attendance command, then disposes the session.
//! Uses `anyhow` for startup errors; attendance failures are reported
//! through `kernel::error::AppError`.

mod commands;
mod context;
mod output;

use clap::Parser;
use context::{Connection, ConnectArgs};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error type for use in commands
pub use kernel::error::app_error::AppError;

/// Clock in and out against the attendance backend.
///
/// Location comes from `--lat`/`--lng`; without them the device is treated
/// as having no location capability.
#[derive(Parser)]
#[command(name = "clock", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    connect: ConnectArgs,

    /// Enable verbose logging (repeat for more detail: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show today's attendance state.
    Status(commands::status::StatusArgs),
    /// Clock in for today.
    In(commands::clock::ClockArgs),
    /// Clock out for today.
    Out(commands::clock::ClockArgs),
    /// List attendance records in a date range.
    History(commands::history::HistoryArgs),
    /// List work locations, with distances when a position is given.
    Locations(commands::locations::LocationsArgs),
    /// Check a position against the selected work location.
    VerifyLocation(commands::locations::VerifyArgs),
    /// List or remove registered biometric credentials.
    Devices(commands::devices::DevicesArgs),
}

fn init_tracing(verbose: u8, json_logs: bool) {
    let default_filter = match verbose {
        0 => "clock=warn,attendance=warn",
        1 => "clock=info,attendance=info",
        2 => "clock=debug,attendance=debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let connection = Connection::open(&cli.connect).await?;

    let result = match cli.command {
        Commands::Status(args) => commands::status::execute(&connection, &args).await,
        Commands::In(args) => commands::clock::clock_in(&connection, &args).await,
        Commands::Out(args) => commands::clock::clock_out(&connection, &args).await,
        Commands::History(args) => commands::history::execute(&connection, &args).await,
        Commands::Locations(args) => commands::locations::list(&connection, &args).await,
        Commands::VerifyLocation(args) => commands::locations::verify(&connection, &args).await,
        Commands::Devices(args) => commands::devices::execute(&connection, &args).await,
    };

    connection.close();
    result
}
