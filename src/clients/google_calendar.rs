use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::service::calendar_service::CalendarError;

const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EVENTS_URI: &str = "https://www.googleapis.com/calendar/v3/calendars";
const SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
// Out-of-band flow: the operator pastes the code back into the terminal.
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

// Returns the file where Google OAuth tokens live.
// Defaults to a relative "./data/google_tokens.json" file.
pub fn get_token_location() -> String {
    if let Ok(path) = env::var("GOOGLE_TOKEN_LOCATION") {
        return path;
    }
    let base = env::var("DATA_LOCATION").unwrap_or("./data".to_string());
    format!("{}/google_tokens.json", base)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn load_tokens(path: &str) -> Option<StoredTokens> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn save_tokens(path: &str, tokens: &StoredTokens) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create token directory for {}", path))?;
    }
    let content = serde_json::to_string_pretty(tokens)?;
    fs::write(path, content).with_context(|| format!("Failed to write tokens to {}", path))?;
    Ok(())
}

/// URL the operator opens in a browser to authorize calendar access.
pub fn consent_url(client_id: &str) -> String {
    let params = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .finish();
    format!("{}?{}", AUTH_URI, params)
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Debug, Deserialize)]
struct EventItem {
    start: EventStart,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventStart {
    // Absent for all-day events, which only carry a date.
    date_time: Option<DateTime<Utc>>,
}

fn transport(err: reqwest::Error) -> CalendarError {
    CalendarError::Transport(err.to_string())
}

pub async fn exchange_code(
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<StoredTokens, CalendarError> {
    let request = ExchangeRequest {
        code,
        client_id,
        client_secret,
        redirect_uri: REDIRECT_URI,
        grant_type: "authorization_code",
    };
    let response = post_token_request(&request).await?;
    if response.refresh_token.is_empty() {
        return Err(CalendarError::Malformed(
            "token exchange granted no refresh token".to_string(),
        ));
    }
    Ok(StoredTokens {
        expires_at: Utc::now() + Duration::seconds(response.expires_in),
        access_token: response.access_token,
        refresh_token: response.refresh_token,
    })
}

pub async fn refresh_access_token(
    client_id: &str,
    client_secret: &str,
    tokens: &StoredTokens,
) -> Result<StoredTokens, CalendarError> {
    let request = RefreshRequest {
        refresh_token: &tokens.refresh_token,
        client_id,
        client_secret,
        grant_type: "refresh_token",
    };
    let response = post_token_request(&request).await?;
    // Google doesn't usually return a new refresh token on refresh.
    let refresh_token = if response.refresh_token.is_empty() {
        tokens.refresh_token.clone()
    } else {
        response.refresh_token
    };
    Ok(StoredTokens {
        expires_at: Utc::now() + Duration::seconds(response.expires_in),
        access_token: response.access_token,
        refresh_token,
    })
}

async fn post_token_request<R: Serialize>(request: &R) -> Result<TokenResponse, CalendarError> {
    let client = reqwest::Client::new();
    let response = client
        .post(TOKEN_URI)
        .form(request)
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    let text = response.text().await.map_err(transport)?;

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::BAD_REQUEST
    {
        return Err(CalendarError::Unauthenticated);
    }
    if !status.is_success() {
        return Err(CalendarError::Transport(format!(
            "token request returned {}: {}",
            status, text
        )));
    }

    serde_json::from_str(&text).map_err(|e| CalendarError::Malformed(e.to_string()))
}

/// Fetch the start time of the next timed event on the calendar at or after
/// `time_min`. Recurring events are expanded to single instances so the next
/// occurrence is selected, not the series anchor.
pub async fn fetch_next_event_start(
    access_token: &str,
    calendar_id: &str,
    time_min: DateTime<Utc>,
) -> Result<DateTime<Utc>, CalendarError> {
    let time_min = time_min.to_rfc3339_opts(SecondsFormat::Secs, true);
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/{}/events", EVENTS_URI, calendar_id))
        .bearer_auth(access_token)
        .query(&[
            ("maxResults", "1"),
            ("orderBy", "startTime"),
            ("singleEvents", "true"),
            ("timeMin", time_min.as_str()),
        ])
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    let text = response.text().await.map_err(transport)?;

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(CalendarError::Unauthenticated);
    }
    if !status.is_success() {
        return Err(CalendarError::Transport(format!(
            "calendar request returned {}: {}",
            status, text
        )));
    }

    let parsed: EventsResponse =
        serde_json::from_str(&text).map_err(|e| CalendarError::Malformed(e.to_string()))?;

    let Some(event) = parsed.items.into_iter().next() else {
        return Err(CalendarError::NoUpcomingEvents);
    };
    event
        .start
        .date_time
        .ok_or_else(|| CalendarError::Malformed("next event has no timed start".to_string()))
}
