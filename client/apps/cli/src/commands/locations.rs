//! The `clock locations` and `clock verify-location` subcommands.

use anyhow::Context;
use attendance::geo::evaluate;
use clap::Args;

use crate::AppError;
use crate::context::{Connection, PositionArgs};

/// List work locations.
#[derive(Args)]
pub struct LocationsArgs {
    #[command(flatten)]
    pub position: PositionArgs,
}

/// Check a position against the selected work location.
#[derive(Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub position: PositionArgs,

    /// Also ask the backend (advisory only).
    #[arg(long)]
    pub remote: bool,
}

/// Execute the locations command.
pub async fn list(connection: &Connection, args: &LocationsArgs) -> anyhow::Result<()> {
    let services = connection.services(&args.position).await?;
    let catalog = &services.catalog;
    let locations = catalog.refresh().await.map_err(AppError::from)?;
    let selected = catalog.selected_id();
    let point = args.position.point()?;

    if locations.is_empty() {
        println!("No work locations configured");
    }
    for location in &locations {
        let marker = if selected.as_ref() == Some(&location.id) {
            "*"
        } else {
            " "
        };
        print!(
            "{} {:<8} {:<24} r={:.0} m  {}",
            marker, location.id, location.name, location.radius_meters, location.address
        );
        if let Some(point) = point {
            let verdict = evaluate(point, location);
            print!(
                "  [{} m, {}]",
                verdict.rounded_distance(),
                if verdict.within { "inside" } else { "outside" }
            );
        }
        println!();
    }
    Ok(())
}

/// Execute the verify-location command.
pub async fn verify(connection: &Connection, args: &VerifyArgs) -> anyhow::Result<()> {
    let point = args
        .position
        .point()?
        .context("--lat and --lng are required")?;
    let services = connection.services(&args.position).await?;
    let catalog = &services.catalog;

    let verdict = catalog.preview(point).await.map_err(AppError::from)?;
    let location_id = catalog
        .selected_id()
        .context("no work location selected (use --location)")?;
    println!(
        "{} m from {} (radius {:.0} m): {}",
        verdict.rounded_distance(),
        location_id,
        verdict.radius_meters,
        if verdict.within { "inside" } else { "outside" }
    );

    if args.remote {
        let within = catalog
            .verify_remote(point, &location_id)
            .await
            .map_err(AppError::from)?;
        println!("Backend says: {}", if within { "inside" } else { "outside" });
    }
    Ok(())
}
