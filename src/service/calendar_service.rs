use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clients::google_calendar::{self, StoredTokens};
use crate::config::WarmerSettings;

/// Errors from calendar acquisition. The loop treats every variant the same
/// way: log it and retry next tick.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar credentials are missing or not authorized")]
    Unauthenticated,

    #[error("no upcoming events on the calendar")]
    NoUpcomingEvents,

    #[error("calendar response was malformed: {0}")]
    Malformed(String),

    #[error("calendar request failed: {0}")]
    Transport(String),
}

/// The one call the warm-up loop needs from a calendar. `min_start` is absent
/// on the very first acquisition after process start.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn next_event_start(
        &self,
        min_start: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, CalendarError>;
}

pub struct GoogleCalendarService {
    client_id: String,
    client_secret: String,
    calendar_id: String,
    token_path: String,
    tokens: Mutex<StoredTokens>,
}

impl GoogleCalendarService {
    /// Build the service from tokens stored on disk. Missing or unreadable
    /// tokens mean the operator has to run --gauth first.
    pub fn from_stored(settings: &WarmerSettings) -> Result<Self, CalendarError> {
        let token_path = google_calendar::get_token_location();
        let tokens = google_calendar::load_tokens(&token_path)
            .ok_or(CalendarError::Unauthenticated)?;
        Ok(Self {
            client_id: settings.google_client_id.clone(),
            client_secret: settings.google_client_secret.clone(),
            calendar_id: settings.calendar_id.clone(),
            token_path,
            tokens: Mutex::new(tokens),
        })
    }

    async fn valid_access_token(&self) -> Result<String, CalendarError> {
        let mut tokens = self.tokens.lock().await;
        if tokens.expires_at <= Utc::now() + Duration::seconds(60) {
            debug!("Access token expired, refreshing");
            let refreshed = google_calendar::refresh_access_token(
                &self.client_id,
                &self.client_secret,
                &tokens,
            )
            .await?;
            if let Err(err) = google_calendar::save_tokens(&self.token_path, &refreshed) {
                warn!("Failed to persist refreshed Google tokens: {err}");
            }
            *tokens = refreshed;
        }
        Ok(tokens.access_token.clone())
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarService {
    async fn next_event_start(
        &self,
        min_start: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        debug!("Fetching details of next event");
        let access_token = self.valid_access_token().await?;
        // The Calendar API needs a concrete timeMin; "no minimum" means
        // anything from right now onwards.
        let time_min = min_start.unwrap_or_else(Utc::now);
        google_calendar::fetch_next_event_start(&access_token, &self.calendar_id, time_min).await
    }
}
