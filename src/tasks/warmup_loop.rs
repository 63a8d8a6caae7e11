use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::WarmerSettings;
use crate::models::schedule::ScheduleState;
use crate::service::calendar_service::CalendarClient;
use crate::service::vehicle_service::{VehicleClient, VehicleError};

pub const TICK_SECONDS: u64 = 60;
const REFRESH_AFTER_MINUTES: i64 = 60;
const ABANDON_AFTER_MINUTES: i64 = 30;

pub async fn run_warmup_loop<C, V>(calendar: &C, vehicle: &V, settings: &WarmerSettings)
where
    C: CalendarClient + ?Sized,
    V: VehicleClient + ?Sized,
{
    let mut state = ScheduleState::new(Utc::now());
    loop {
        warmup_tick(&mut state, calendar, vehicle, settings, Utc::now()).await;
        sleep(Duration::from_secs(TICK_SECONDS)).await;
    }
}

/// One scheduler iteration. Checks run in a fixed order (acquire, refresh
/// staleness, abandonment, fire) and any reset ends the iteration early;
/// re-acquisition then happens on the next tick.
pub async fn warmup_tick<C, V>(
    state: &mut ScheduleState,
    calendar: &C,
    vehicle: &V,
    settings: &WarmerSettings,
    now: DateTime<Utc>,
) where
    C: CalendarClient + ?Sized,
    V: VehicleClient + ?Sized,
{
    let lead = chrono::Duration::minutes(settings.lead_minutes);

    if state.target_time.is_none() {
        // On the very first cycle take whatever is next; afterwards skip
        // events already inside their lead window, or the event just handled
        // would be picked up again.
        let min_start = if state.initial_start {
            None
        } else {
            Some(now + lead)
        };
        match calendar.next_event_start(min_start).await {
            Ok(event_start) => {
                let target = event_start - lead;
                state.set_target(target, now);
                info!(
                    "Found event at {}, setting conditioning for {}",
                    fmt_local(event_start, settings),
                    fmt_local(target, settings)
                );
            }
            Err(err) => {
                error!("There was an error trying to find an event: {err}");
                return;
            }
        }
    }

    let Some(target) = state.target_time else {
        return;
    };

    if now - state.last_refresh > chrono::Duration::minutes(REFRESH_AFTER_MINUTES) {
        // The event may have been moved or deleted since we cached it.
        info!("Checking for any event updates");
        state.reset();
        return;
    }

    if target < now - chrono::Duration::minutes(ABANDON_AFTER_MINUTES) {
        // Either conditioning went out long ago or we never managed to send
        // it; give up on this event and find the next one.
        info!("Resetting event");
        state.reset();
        return;
    }

    if target <= now && !state.fired {
        info!(
            "Start time of {} has passed, attempting to start conditioning",
            fmt_local(target, settings)
        );
        match attempt_conditioning(vehicle, settings.temperature).await {
            Ok(()) => state.fired = true,
            Err(err) => {
                error!("There was an error attempting to start conditioning: {err}");
            }
        }
    }
}

/// The warm-up command sequence. Stops at the first failing step so the
/// whole sequence is retried on the next tick.
pub async fn attempt_conditioning<V>(vehicle: &V, temperature: f32) -> Result<(), VehicleError>
where
    V: VehicleClient + ?Sized,
{
    vehicle.wake_up().await?;

    let climate = vehicle.climate_state().await?;
    info!(
        "Vehicle currently at {}C inside, outside temperature is {}C",
        fmt_temp(climate.inside_temp),
        fmt_temp(climate.outside_temp)
    );

    let temp = (temperature * 10.0).round() / 10.0;
    vehicle.set_temperature(temp, temp).await?;
    info!("Temperature set to {:.1}", temp);

    vehicle.start_conditioning().await?;
    info!("Conditioning started");
    Ok(())
}

fn fmt_local(time: DateTime<Utc>, settings: &WarmerSettings) -> String {
    time.with_timezone(&settings.timezone)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

fn fmt_temp(temp: Option<f32>) -> String {
    match temp {
        Some(value) => format!("{:.1}", value),
        None => "?".to_string(),
    }
}
