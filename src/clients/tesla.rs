use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::service::vehicle_service::VehicleError;

const OWNER_API_BASE: &str = "https://owner-api.teslamotors.com";
// Long-published owner API application credentials; the account-specific
// secrets are the email and password from the config.
const OWNERAPI_CLIENT_ID: &str =
    "81527cff06843c8634fdc09e8ac0abefb46ac849f38fe1e431c2ef2106796384";
const OWNERAPI_CLIENT_SECRET: &str =
    "c7257eb71a564034f9419ee651c7d0e5f7aa6bfbd18bafb5c5c033b093bb2fa3";

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    response: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
pub struct VehicleRecord {
    pub id: u64,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClimateState {
    #[serde(default)]
    pub inside_temp: Option<f32>,
    #[serde(default)]
    pub outside_temp: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ChargeState {
    pub ideal_battery_range: f32,
}

#[derive(Debug, Deserialize)]
struct CommandResult {
    result: bool,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Serialize)]
struct SetTempsRequest {
    driver_temp: String,
    passenger_temp: String,
}

fn transport(err: reqwest::Error) -> VehicleError {
    VehicleError::Transport(err.to_string())
}

fn classify_status(status: StatusCode, text: &str) -> Option<VehicleError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(VehicleError::Auth),
        StatusCode::REQUEST_TIMEOUT => Some(VehicleError::Asleep),
        status if !status.is_success() => Some(VehicleError::Transport(format!(
            "owner API returned {}: {}",
            status, text
        ))),
        _ => None,
    }
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    access_token: &str,
    path: &str,
) -> Result<T, VehicleError> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}{}", OWNER_API_BASE, path))
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    let text = response.text().await.map_err(transport)?;
    if let Some(err) = classify_status(status, &text) {
        return Err(err);
    }
    serde_json::from_str(&text).map_err(|e| VehicleError::Transport(e.to_string()))
}

async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
    access_token: &str,
    path: &str,
    body: Option<&B>,
) -> Result<T, VehicleError> {
    let client = reqwest::Client::new();
    let mut request = client
        .post(format!("{}{}", OWNER_API_BASE, path))
        .bearer_auth(access_token);
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send().await.map_err(transport)?;

    let status = response.status();
    let text = response.text().await.map_err(transport)?;
    if let Some(err) = classify_status(status, &text) {
        return Err(err);
    }
    serde_json::from_str(&text).map_err(|e| VehicleError::Transport(e.to_string()))
}

pub async fn authenticate(email: &str, password: &str) -> Result<String, VehicleError> {
    let request = AuthRequest {
        grant_type: "password",
        client_id: OWNERAPI_CLIENT_ID,
        client_secret: OWNERAPI_CLIENT_SECRET,
        email,
        password,
    };
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/oauth/token", OWNER_API_BASE))
        .json(&request)
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    let text = response.text().await.map_err(transport)?;
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
        return Err(VehicleError::Auth);
    }
    if !status.is_success() {
        return Err(VehicleError::Transport(format!(
            "owner API returned {}: {}",
            status, text
        )));
    }
    let parsed: AuthResponse =
        serde_json::from_str(&text).map_err(|e| VehicleError::Transport(e.to_string()))?;
    Ok(parsed.access_token)
}

pub async fn list_vehicles(access_token: &str) -> Result<Vec<VehicleRecord>, VehicleError> {
    let parsed: ListResponse<VehicleRecord> = get_json(access_token, "/api/1/vehicles").await?;
    Ok(parsed.response)
}

pub async fn wake_up(access_token: &str, vehicle_id: u64) -> Result<(), VehicleError> {
    let _: DataResponse<serde_json::Value> = post_json::<(), _>(
        access_token,
        &format!("/api/1/vehicles/{}/wake_up", vehicle_id),
        None,
    )
    .await?;
    Ok(())
}

pub async fn climate_state(
    access_token: &str,
    vehicle_id: u64,
) -> Result<ClimateState, VehicleError> {
    let parsed: DataResponse<ClimateState> = get_json(
        access_token,
        &format!("/api/1/vehicles/{}/data_request/climate_state", vehicle_id),
    )
    .await?;
    Ok(parsed.response)
}

pub async fn charge_state(
    access_token: &str,
    vehicle_id: u64,
) -> Result<ChargeState, VehicleError> {
    let parsed: DataResponse<ChargeState> = get_json(
        access_token,
        &format!("/api/1/vehicles/{}/data_request/charge_state", vehicle_id),
    )
    .await?;
    Ok(parsed.response)
}

async fn command<B: Serialize>(
    access_token: &str,
    vehicle_id: u64,
    name: &str,
    body: Option<&B>,
) -> Result<(), VehicleError> {
    let parsed: DataResponse<CommandResult> = post_json(
        access_token,
        &format!("/api/1/vehicles/{}/command/{}", vehicle_id, name),
        body,
    )
    .await?;
    if !parsed.response.result {
        return Err(VehicleError::CommandRejected(parsed.response.reason));
    }
    Ok(())
}

pub async fn set_temps(
    access_token: &str,
    vehicle_id: u64,
    driver_temp: f32,
    passenger_temp: f32,
) -> Result<(), VehicleError> {
    // The API wants zero-padded one-decimal strings, e.g. "21.5".
    let request = SetTempsRequest {
        driver_temp: format!("{:04.1}", driver_temp),
        passenger_temp: format!("{:04.1}", passenger_temp),
    };
    command(access_token, vehicle_id, "set_temps", Some(&request)).await
}

pub async fn auto_conditioning_start(
    access_token: &str,
    vehicle_id: u64,
) -> Result<(), VehicleError> {
    command::<()>(access_token, vehicle_id, "auto_conditioning_start", None).await
}
