use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::clients::tesla::{self, ChargeState};

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("vehicle credentials were rejected")]
    Auth,

    #[error("no vehicles on the account")]
    NoVehicle,

    #[error("vehicle did not respond, it may be asleep")]
    Asleep,

    #[error("vehicle rejected the command: {0}")]
    CommandRejected(String),

    #[error("vehicle request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub inside_temp: Option<f32>,
    pub outside_temp: Option<f32>,
}

/// The commands the warm-up loop needs from a vehicle, in the order it
/// issues them: wake, read climate, set both zones, start conditioning.
#[async_trait]
pub trait VehicleClient: Send + Sync {
    async fn wake_up(&self) -> Result<(), VehicleError>;
    async fn climate_state(&self) -> Result<ClimateReading, VehicleError>;
    async fn set_temperature(
        &self,
        driver_temp: f32,
        passenger_temp: f32,
    ) -> Result<(), VehicleError>;
    async fn start_conditioning(&self) -> Result<(), VehicleError>;
}

pub struct TeslaVehicleService {
    access_token: String,
    vehicle_id: u64,
}

impl TeslaVehicleService {
    /// Authenticate against the owner API and bind to the first vehicle on
    /// the account.
    pub async fn connect(email: &str, password: &str) -> Result<Self, VehicleError> {
        let access_token = tesla::authenticate(email, password).await?;
        let vehicles = tesla::list_vehicles(&access_token).await?;
        let vehicle = vehicles.into_iter().next().ok_or(VehicleError::NoVehicle)?;
        debug!(
            "Bound to vehicle {} ({})",
            vehicle.id,
            vehicle.display_name.as_deref().unwrap_or("unnamed")
        );
        Ok(Self {
            access_token,
            vehicle_id: vehicle.id,
        })
    }

    /// Only the --tauth credential check needs this, so it lives off the
    /// trait the loop consumes.
    pub async fn charge_state(&self) -> Result<ChargeState, VehicleError> {
        tesla::charge_state(&self.access_token, self.vehicle_id).await
    }
}

#[async_trait]
impl VehicleClient for TeslaVehicleService {
    async fn wake_up(&self) -> Result<(), VehicleError> {
        tesla::wake_up(&self.access_token, self.vehicle_id).await
    }

    async fn climate_state(&self) -> Result<ClimateReading, VehicleError> {
        let state = tesla::climate_state(&self.access_token, self.vehicle_id).await?;
        Ok(ClimateReading {
            inside_temp: state.inside_temp,
            outside_temp: state.outside_temp,
        })
    }

    async fn set_temperature(
        &self,
        driver_temp: f32,
        passenger_temp: f32,
    ) -> Result<(), VehicleError> {
        tesla::set_temps(&self.access_token, self.vehicle_id, driver_temp, passenger_temp).await
    }

    async fn start_conditioning(&self) -> Result<(), VehicleError> {
        tesla::auto_conditioning_start(&self.access_token, self.vehicle_id).await
    }
}
