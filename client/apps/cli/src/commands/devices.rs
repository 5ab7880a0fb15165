//! The `clock devices` subcommand.

use clap::Args;
use kernel::id::CredentialId;

use crate::AppError;
use crate::context::{Connection, PositionArgs};

/// List registered biometric credentials, or remove one.
#[derive(Args)]
pub struct DevicesArgs {
    /// Credential id to remove.
    #[arg(long)]
    pub remove: Option<String>,
}

/// Execute the devices command.
pub async fn execute(connection: &Connection, args: &DevicesArgs) -> anyhow::Result<()> {
    let services = connection.services(&PositionArgs::default()).await?;
    let credentials = &services.credentials;
    let session = &connection.session;

    if let Some(id) = &args.remove {
        credentials
            .remove_device(session, &CredentialId::new(id.as_str()))
            .await
            .map_err(AppError::from)?;
        println!("Removed credential {}", id);
        return Ok(());
    }

    let devices = credentials
        .list_devices(session)
        .await
        .map_err(AppError::from)?;
    if devices.is_empty() {
        println!("No biometric credentials registered");
    }
    for device in devices {
        let registered = device
            .registered_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}  registered {}", device.id, registered);
    }
    if !credentials.is_supported() {
        tracing::info!("This host has no platform authenticator; registration is unavailable");
    }
    Ok(())
}
