//! The `clock status` subcommand.

use clap::Args;

use crate::AppError;
use crate::context::{Connection, PositionArgs};
use crate::output::RecordView;

/// Show today's attendance state.
#[derive(Args)]
pub struct StatusArgs {
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the status command.
pub async fn execute(connection: &Connection, args: &StatusArgs) -> anyhow::Result<()> {
    let services = connection.services(&PositionArgs::default()).await?;
    let machine = connection.state_machine(&services);
    let snapshot = machine.refresh().await.map_err(AppError::from)?;
    let view = RecordView::from(&snapshot.record);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("{} ({})", connection.session.user_name(), connection.session.user_id());
        println!("{}", view);
    }
    Ok(())
}
