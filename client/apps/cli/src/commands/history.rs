//! The `clock history` subcommand.

use chrono::{Days, Local, NaiveDate};
use clap::Args;

use crate::AppError;
use crate::context::{Connection, PositionArgs};
use crate::output::{RecordView, worked_hours};

/// List attendance records in an inclusive date range.
#[derive(Args)]
pub struct HistoryArgs {
    /// First day (YYYY-MM-DD); defaults to six days before `--to`.
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the history command.
pub async fn execute(connection: &Connection, args: &HistoryArgs) -> anyhow::Result<()> {
    let end = args.to.unwrap_or_else(|| Local::now().date_naive());
    let start = args
        .from
        .unwrap_or_else(|| end.checked_sub_days(Days::new(6)).unwrap_or(end));

    let services = connection.services(&PositionArgs::default()).await?;
    let machine = connection.state_machine(&services);
    let records = machine
        .history(start, end)
        .await
        .map_err(AppError::from)?;

    if args.json {
        let views: Vec<RecordView> = records.iter().map(RecordView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No attendance records from {} to {}", start, end);
        return Ok(());
    }
    let mut total = 0.0;
    for record in &records {
        println!("{}", RecordView::from(record));
        total += worked_hours(record).unwrap_or(0.0);
    }
    println!("{} day(s), {:.2} h worked", records.len(), total);
    Ok(())
}
