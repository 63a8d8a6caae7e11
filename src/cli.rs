use anyhow::{Context, Result};
use clap::Parser;
use inquire::Text;
use tracing::info;

use crate::clients::google_calendar;
use crate::config::WarmerSettings;
use crate::service::calendar_service::{CalendarClient, GoogleCalendarService};
use crate::service::vehicle_service::{TeslaVehicleService, VehicleClient};

#[derive(Parser)]
#[command(name = "teslaWarmer", about = "Warm up your Tesla according to Google Calendar events")]
pub struct Cli {
    /// Check Google Calendar credentials, running the authorization flow if needed
    #[arg(long)]
    pub gauth: bool,

    /// Check Tesla credentials and print the vehicle's current range
    #[arg(long)]
    pub tauth: bool,
}

pub async fn run_gauth_check(settings: &WarmerSettings) -> Result<()> {
    info!("Running GCal credential check");

    let service = match GoogleCalendarService::from_stored(settings) {
        Ok(service) => service,
        Err(_) => {
            info!("GCal credentials not correct, please generate new code");
            authorize(settings).await?
        }
    };

    // We should now have good credentials, so try gathering an event.
    let next = service
        .next_event_start(None)
        .await
        .context("Credential check failed")?;
    info!(
        "GCal credentials seem good, next event at: {}",
        next.with_timezone(&settings.timezone)
    );
    Ok(())
}

async fn authorize(settings: &WarmerSettings) -> Result<GoogleCalendarService> {
    println!("Open this URL in a browser and authorize calendar access:");
    println!("{}", google_calendar::consent_url(&settings.google_client_id));

    let code = Text::new("Enter the authorization code:").prompt()?;
    let tokens = google_calendar::exchange_code(
        &settings.google_client_id,
        &settings.google_client_secret,
        code.trim(),
    )
    .await
    .context("Failed to exchange the authorization code")?;

    google_calendar::save_tokens(&google_calendar::get_token_location(), &tokens)?;
    GoogleCalendarService::from_stored(settings).map_err(Into::into)
}

pub async fn run_tauth_check(settings: &WarmerSettings) -> Result<()> {
    info!("Running Tesla credential check");

    let vehicle = TeslaVehicleService::connect(&settings.tesla_email, &settings.tesla_password)
        .await
        .context("Exception with Tesla authentication, check email and password")?;

    info!("Credentials seem okay, waking up vehicle to fetch information");
    vehicle.wake_up().await?;

    info!("Fetching data from car");
    let charge = vehicle.charge_state().await?;
    info!(
        "Tesla credentials seem good, current range is {} miles",
        charge.ideal_battery_range
    );
    Ok(())
}
