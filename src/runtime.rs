use anyhow::{Context, Result};
use tracing::info;

use crate::config::WarmerSettings;
use crate::service::calendar_service::GoogleCalendarService;
use crate::service::vehicle_service::TeslaVehicleService;
use crate::tasks::warmup_loop;

/// Daemon mode. Both credential sets are verified before the loop starts;
/// an unauthorized calendar or vehicle is a startup failure the operator
/// has to fix, not something the loop can retry its way out of.
pub async fn run_daemon(settings: WarmerSettings) -> Result<()> {
    info!("Starting daemon");

    let calendar = GoogleCalendarService::from_stored(&settings)
        .context("GCal credentials are not usable, run with --gauth to authorize")?;

    let vehicle = TeslaVehicleService::connect(&settings.tesla_email, &settings.tesla_password)
        .await
        .context("Tesla authentication failed, check email and password")?;

    warmup_loop::run_warmup_loop(&calendar, &vehicle, &settings).await;
    Ok(())
}
