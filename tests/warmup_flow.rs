use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use teslaWarmer::config::WarmerSettings;
use teslaWarmer::models::schedule::ScheduleState;
use teslaWarmer::service::calendar_service::{CalendarClient, CalendarError};
use teslaWarmer::service::vehicle_service::{ClimateReading, VehicleClient, VehicleError};
use teslaWarmer::tasks::warmup_loop::warmup_tick;

struct ScriptedCalendar {
    // Popped from the end, so script in reverse order.
    results: Mutex<Vec<Result<DateTime<Utc>, CalendarError>>>,
    requests: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl ScriptedCalendar {
    fn with_results(results: Vec<Result<DateTime<Utc>, CalendarError>>) -> Self {
        Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<Option<DateTime<Utc>>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CalendarClient for ScriptedCalendar {
    async fn next_event_start(
        &self,
        min_start: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        self.requests.lock().unwrap().push(min_start);
        self.results
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(CalendarError::NoUpcomingEvents))
    }
}

#[derive(Default)]
struct FakeVehicle {
    calls: Mutex<Vec<&'static str>>,
    failing_step: Mutex<Option<&'static str>>,
}

impl FakeVehicle {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, step: &'static str) -> Result<(), VehicleError> {
        self.calls.lock().unwrap().push(step);
        if *self.failing_step.lock().unwrap() == Some(step) {
            return Err(VehicleError::Transport("fake outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VehicleClient for FakeVehicle {
    async fn wake_up(&self) -> Result<(), VehicleError> {
        self.record("wake_up")
    }

    async fn climate_state(&self) -> Result<ClimateReading, VehicleError> {
        self.record("climate_state")?;
        Ok(ClimateReading {
            inside_temp: Some(7.5),
            outside_temp: Some(3.0),
        })
    }

    async fn set_temperature(
        &self,
        _driver_temp: f32,
        _passenger_temp: f32,
    ) -> Result<(), VehicleError> {
        self.record("set_temps")
    }

    async fn start_conditioning(&self) -> Result<(), VehicleError> {
        self.record("auto_conditioning_start")
    }
}

fn settings() -> WarmerSettings {
    WarmerSettings {
        calendar_id: "primary".to_string(),
        google_client_id: "id".to_string(),
        google_client_secret: "secret".to_string(),
        tesla_email: "me@example.com".to_string(),
        tesla_password: "hunter2".to_string(),
        lead_minutes: 30,
        temperature: 20.0,
        timezone: chrono_tz::Europe::London,
    }
}

const FULL_SEQUENCE: [&str; 4] = [
    "wake_up",
    "climate_state",
    "set_temps",
    "auto_conditioning_start",
];

#[tokio::test]
async fn event_is_scheduled_fired_once_and_abandoned() {
    let event = Utc.with_ymd_and_hms(2026, 1, 7, 14, 0, 0).unwrap();
    let next_event = Utc.with_ymd_and_hms(2026, 1, 7, 16, 0, 0).unwrap();
    let calendar = ScriptedCalendar::with_results(vec![Ok(next_event), Ok(event)]);
    let vehicle = FakeVehicle::default();
    let settings = settings();

    let start = Utc.with_ymd_and_hms(2026, 1, 7, 13, 29, 59).unwrap();
    let mut state = ScheduleState::new(start);

    // One second before the target: event acquired, nothing fired yet.
    warmup_tick(&mut state, &calendar, &vehicle, &settings, start).await;
    assert_eq!(state.target_time, Some(event - Duration::minutes(30)));
    assert!(!state.fired);
    assert!(vehicle.calls().is_empty());

    // Exactly at the target: the whole conditioning sequence goes out.
    let at_target = Utc.with_ymd_and_hms(2026, 1, 7, 13, 30, 0).unwrap();
    warmup_tick(&mut state, &calendar, &vehicle, &settings, at_target).await;
    assert!(state.fired);
    assert_eq!(vehicle.calls(), FULL_SEQUENCE);

    // A minute later nothing more is sent.
    warmup_tick(
        &mut state,
        &calendar,
        &vehicle,
        &settings,
        at_target + Duration::minutes(1),
    )
    .await;
    assert_eq!(vehicle.calls().len(), FULL_SEQUENCE.len());

    // 31 minutes past the target the event is abandoned.
    let past_window = Utc.with_ymd_and_hms(2026, 1, 7, 14, 1, 0).unwrap();
    warmup_tick(&mut state, &calendar, &vehicle, &settings, past_window).await;
    assert!(state.target_time.is_none());
    assert!(!state.fired);
    assert_eq!(vehicle.calls().len(), FULL_SEQUENCE.len());

    // The next tick re-acquires, now skipping events inside the lead window.
    let next_tick = past_window + Duration::minutes(1);
    warmup_tick(&mut state, &calendar, &vehicle, &settings, next_tick).await;
    assert_eq!(state.target_time, Some(next_event - Duration::minutes(30)));

    let requests = calendar.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], None);
    assert_eq!(requests[1], Some(next_tick + Duration::minutes(30)));
}

#[tokio::test]
async fn acquisition_failure_leaves_state_untouched() {
    let calendar = ScriptedCalendar::with_results(vec![
        Err(CalendarError::Unauthenticated),
        Err(CalendarError::Transport("connection reset".to_string())),
    ]);
    let vehicle = FakeVehicle::default();
    let settings = settings();

    let start = Utc.with_ymd_and_hms(2026, 1, 7, 8, 0, 0).unwrap();
    let mut state = ScheduleState::new(start);

    warmup_tick(&mut state, &calendar, &vehicle, &settings, start).await;
    assert!(state.target_time.is_none());
    assert!(state.initial_start);
    assert_eq!(state.last_refresh, start);
    assert!(vehicle.calls().is_empty());

    // The first cycle stays "first" until an acquisition succeeds.
    warmup_tick(
        &mut state,
        &calendar,
        &vehicle,
        &settings,
        start + Duration::minutes(1),
    )
    .await;
    assert_eq!(calendar.requests(), vec![None, None]);
}

#[tokio::test]
async fn stale_target_is_invalidated_after_an_hour() {
    let calendar = ScriptedCalendar::with_results(vec![]);
    let vehicle = FakeVehicle::default();
    let settings = settings();

    let acquired_at = Utc.with_ymd_and_hms(2026, 1, 7, 8, 0, 0).unwrap();
    let mut state = ScheduleState::new(acquired_at);
    state.set_target(acquired_at + Duration::hours(5), acquired_at);

    // 60 minutes exactly is not yet stale.
    warmup_tick(
        &mut state,
        &calendar,
        &vehicle,
        &settings,
        acquired_at + Duration::minutes(60),
    )
    .await;
    assert!(state.target_time.is_some());

    // Past the hour the cached target is dropped, whatever its value.
    warmup_tick(
        &mut state,
        &calendar,
        &vehicle,
        &settings,
        acquired_at + Duration::minutes(61),
    )
    .await;
    assert!(state.target_time.is_none());
    assert!(!state.fired);
    assert!(vehicle.calls().is_empty());
}

#[tokio::test]
async fn refresh_reacquires_a_moved_event() {
    let original = Utc.with_ymd_and_hms(2026, 1, 7, 15, 0, 0).unwrap();
    let moved = Utc.with_ymd_and_hms(2026, 1, 7, 17, 30, 0).unwrap();
    let calendar = ScriptedCalendar::with_results(vec![Ok(moved), Ok(original)]);
    let vehicle = FakeVehicle::default();
    let settings = settings();

    let start = Utc.with_ymd_and_hms(2026, 1, 7, 9, 0, 0).unwrap();
    let mut state = ScheduleState::new(start);

    warmup_tick(&mut state, &calendar, &vehicle, &settings, start).await;
    assert_eq!(state.target_time, Some(original - Duration::minutes(30)));

    // An hour later the cached target is dropped and the next tick picks up
    // the moved event.
    warmup_tick(
        &mut state,
        &calendar,
        &vehicle,
        &settings,
        start + Duration::minutes(61),
    )
    .await;
    assert!(state.target_time.is_none());

    warmup_tick(
        &mut state,
        &calendar,
        &vehicle,
        &settings,
        start + Duration::minutes(62),
    )
    .await;
    assert_eq!(state.target_time, Some(moved - Duration::minutes(30)));
    assert!(vehicle.calls().is_empty());
}
