//! The `clock in` and `clock out` subcommands.

use clap::Args;

use crate::AppError;
use crate::context::{Connection, PositionArgs};
use crate::output::{RecordView, worked_hours};

/// Clock in or out for today.
///
/// The configured VERIFICATION_MODE decides what is checked first:
/// `geofence` needs `--lat`/`--lng` and a work location, `biometric`
/// needs a platform authenticator, `none` always proceeds.
#[derive(Args)]
pub struct ClockArgs {
    #[command(flatten)]
    pub position: PositionArgs,
}

/// Execute the in command.
pub async fn clock_in(connection: &Connection, args: &ClockArgs) -> anyhow::Result<()> {
    let services = connection.services(&args.position).await?;
    let machine = connection.state_machine(&services);

    let record = machine.clock_in().await.map_err(AppError::from)?;
    println!("Clocked in.");
    println!("{}", RecordView::from(&record));
    Ok(())
}

/// Execute the out command.
pub async fn clock_out(connection: &Connection, args: &ClockArgs) -> anyhow::Result<()> {
    let services = connection.services(&args.position).await?;
    let machine = connection.state_machine(&services);

    let record = machine.clock_out().await.map_err(AppError::from)?;
    println!("Clocked out.");
    println!("{}", RecordView::from(&record));
    if let Some(hours) = worked_hours(&record) {
        println!("Worked {:.2} h", hours);
    }
    Ok(())
}
