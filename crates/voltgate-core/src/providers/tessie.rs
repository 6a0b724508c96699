use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse, NoopHttpClient};
use crate::provider::{CommandOutcome, CommandRequest, ProviderKind, VehicleProvider, VehicleSummary};
use crate::{
    ChargeState, ChargingState, ClimateState, ConnectivityState, DriveState, GatewayError,
    SecurityState, ShiftState, UtcDateTime, ValidationError, VehicleId, VehicleSnapshot,
};

const TESSIE_BASE: &str = "https://api.tessie.com";

/// Conversion for the imperial units Tessie reports.
const MILES_TO_KM: f64 = 1.609_344;

/// Tessie adapter supporting both real API calls and mock mode.
///
/// Tessie speaks nested, typed JSON close to the vehicle's native telemetry
/// and authenticates with a bearer token.
#[derive(Clone)]
pub struct TessieProvider {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    circuit_breaker: Arc<CircuitBreaker>,
    use_real_api: bool,
}

impl Default for TessieProvider {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            api_key: std::env::var("VOLTGATE_TESSIE_API_KEY")
                .or_else(|_| std::env::var("TESSIE_API_KEY"))
                .ok(),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            use_real_api: false,
        }
    }
}

impl TessieProvider {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        let is_real = !http_client.is_mock();
        Self {
            http_client,
            api_key,
            use_real_api: is_real,
            ..Self::default()
        }
    }

    fn is_real_client(&self) -> bool {
        self.use_real_api
    }

    fn require_key(&self) -> Result<&str, GatewayError> {
        self.api_key.as_deref().ok_or_else(|| {
            GatewayError::authentication(ProviderKind::Tessie, "api key is not configured")
        })
    }

    fn authorized(&self, request: HttpRequest) -> Result<HttpRequest, GatewayError> {
        let key = self.require_key()?;
        Ok(request.with_auth(&HttpAuth::BearerToken(key.to_owned())))
    }

    /// Shared transport path for real and mock calls: circuit gating, one
    /// HTTP round trip, status classification.
    async fn execute_call(&self, request: HttpRequest) -> Result<HttpResponse, GatewayError> {
        if !self.circuit_breaker.allow_request() {
            return Err(GatewayError::provider_unavailable(
                "tessie circuit breaker is open; skipping upstream call",
            ));
        }

        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            GatewayError::provider_unavailable(format!(
                "tessie transport error: {}",
                error.message()
            ))
        })?;

        if response.is_success() {
            self.circuit_breaker.record_success();
            return Ok(response);
        }

        match response.status {
            // Auth and quota rejections are deterministic answers from a
            // healthy upstream, not circuit failures.
            401 | 403 => Err(GatewayError::authentication(
                ProviderKind::Tessie,
                format!("api key rejected (status {})", response.status),
            )),
            404 => Err(GatewayError::invalid_request(
                "tessie does not know the requested vehicle",
            )),
            429 => Err(GatewayError::rate_limited(
                "tessie reports its own rate limit exceeded",
            )),
            status => {
                self.circuit_breaker.record_failure();
                Err(GatewayError::provider_unavailable(format!(
                    "tessie returned status {status}"
                )))
            }
        }
    }
}

// Real API implementation methods
impl TessieProvider {
    async fn authenticate_real(&self) -> Result<(), GatewayError> {
        let request = self.authorized(HttpRequest::get(format!("{TESSIE_BASE}/vehicles")))?;
        self.execute_call(request).await?;
        Ok(())
    }

    async fn fetch_real_vehicles(&self) -> Result<Vec<VehicleSummary>, GatewayError> {
        let request = self.authorized(HttpRequest::get(format!("{TESSIE_BASE}/vehicles")))?;
        let response = self.execute_call(request).await?;

        let parsed: TessieVehiclesResponse = serde_json::from_str(&response.body)
            .map_err(|e| GatewayError::internal(format!("failed to parse tessie vehicle list: {e}")))?;

        parsed
            .results
            .into_iter()
            .map(summarize_vehicle)
            .collect::<Result<Vec<_>, _>>()
    }

    async fn fetch_real_state(&self, id: &VehicleId) -> Result<VehicleSnapshot, GatewayError> {
        let request = self.authorized(HttpRequest::get(format!(
            "{TESSIE_BASE}/vehicles/{}",
            id.as_str()
        )))?;
        let response = self.execute_call(request).await?;

        let parsed: TessieStateResponse = serde_json::from_str(&response.body)
            .map_err(|e| GatewayError::internal(format!("failed to parse tessie state: {e}")))?;

        normalize_state(parsed)
    }

    async fn execute_real_command(&self, req: &CommandRequest) -> Result<CommandOutcome, GatewayError> {
        let body = serde_json::to_string(&req.params)
            .map_err(|e| GatewayError::internal(format!("failed to encode command params: {e}")))?;
        let request = self
            .authorized(HttpRequest::post(format!(
                "{TESSIE_BASE}/vehicles/{}/command/{}",
                req.vehicle_id.as_str(),
                req.command
            )))?
            .with_json_body(body);
        let response = self.execute_call(request).await?;

        let parsed: TessieCommandResponse = serde_json::from_str(&response.body)
            .map_err(|e| GatewayError::internal(format!("failed to parse tessie command result: {e}")))?;
        let raw: serde_json::Value =
            serde_json::from_str(&response.body).unwrap_or(serde_json::Value::Null);

        if parsed.result {
            Ok(CommandOutcome::accepted(raw))
        } else {
            let reason = parsed
                .reason
                .filter(|reason| !reason.is_empty())
                .unwrap_or_else(|| String::from("command rejected by vehicle"));
            Ok(CommandOutcome::rejected(reason, raw))
        }
    }

    async fn execute_real_wake(&self, id: &VehicleId) -> Result<ConnectivityState, GatewayError> {
        let request = self.authorized(HttpRequest::post(format!(
            "{TESSIE_BASE}/vehicles/{}/wake",
            id.as_str()
        )))?;
        let response = self.execute_call(request).await?;

        let parsed: TessieWakeResponse = serde_json::from_str(&response.body)
            .map_err(|e| GatewayError::internal(format!("failed to parse tessie wake result: {e}")))?;

        if parsed.result {
            Ok(parse_connectivity(parsed.state.as_deref().unwrap_or("online")))
        } else {
            Err(GatewayError::command_execution(
                "tessie could not wake the vehicle",
            ))
        }
    }
}

// Mock data methods (for offline and test runs)
impl TessieProvider {
    /// The mock path still routes one call through the transport so tests
    /// can count and fail individual requests.
    async fn execute_authenticated_call(&self, endpoint: &str) -> Result<(), GatewayError> {
        let request = self.authorized(HttpRequest::get(endpoint))?;
        self.execute_call(request).await?;
        Ok(())
    }

    async fn fetch_mock_vehicles(&self) -> Result<Vec<VehicleSummary>, GatewayError> {
        self.execute_authenticated_call(&format!("{TESSIE_BASE}/vehicles"))
            .await?;

        mock_garage()
            .iter()
            .map(|(vin, name)| {
                Ok(VehicleSummary {
                    id: VehicleId::parse(vin).map_err(validation_to_error)?,
                    display_name: (*name).to_owned(),
                    connectivity: ConnectivityState::Online,
                })
            })
            .collect()
    }

    async fn fetch_mock_state(&self, id: &VehicleId) -> Result<VehicleSnapshot, GatewayError> {
        self.execute_authenticated_call(&format!("{TESSIE_BASE}/vehicles/{}", id.as_str()))
            .await?;

        normalize_state(mock_state(id))
    }

    async fn execute_mock_command(&self, req: &CommandRequest) -> Result<CommandOutcome, GatewayError> {
        self.execute_authenticated_call(&format!(
            "{TESSIE_BASE}/vehicles/{}/command/{}",
            req.vehicle_id.as_str(),
            req.command
        ))
        .await?;

        Ok(CommandOutcome::accepted(serde_json::json!({ "result": true })))
    }

    async fn execute_mock_wake(&self, id: &VehicleId) -> Result<ConnectivityState, GatewayError> {
        self.execute_authenticated_call(&format!("{TESSIE_BASE}/vehicles/{}/wake", id.as_str()))
            .await?;

        Ok(ConnectivityState::Online)
    }
}

impl VehicleProvider for TessieProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tessie
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn authenticate<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send + 'a>> {
        Box::pin(async move {
            if self.is_real_client() {
                self.authenticate_real().await
            } else {
                self.execute_authenticated_call(&format!("{TESSIE_BASE}/vehicles"))
                    .await
            }
        })
    }

    fn list_vehicles<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<VehicleSummary>, GatewayError>> + Send + 'a>> {
        Box::pin(async move {
            if self.is_real_client() {
                self.fetch_real_vehicles().await
            } else {
                self.fetch_mock_vehicles().await
            }
        })
    }

    fn vehicle_data<'a>(
        &'a self,
        id: VehicleId,
    ) -> Pin<Box<dyn Future<Output = Result<VehicleSnapshot, GatewayError>> + Send + 'a>> {
        Box::pin(async move {
            if self.is_real_client() {
                self.fetch_real_state(&id).await
            } else {
                self.fetch_mock_state(&id).await
            }
        })
    }

    fn execute_command<'a>(
        &'a self,
        req: CommandRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome, GatewayError>> + Send + 'a>> {
        Box::pin(async move {
            if self.is_real_client() {
                self.execute_real_command(&req).await
            } else {
                self.execute_mock_command(&req).await
            }
        })
    }

    fn wake<'a>(
        &'a self,
        id: VehicleId,
    ) -> Pin<Box<dyn Future<Output = Result<ConnectivityState, GatewayError>> + Send + 'a>> {
        Box::pin(async move {
            if self.is_real_client() {
                self.execute_real_wake(&id).await
            } else {
                self.execute_mock_wake(&id).await
            }
        })
    }
}

// Tessie API response structures
#[derive(Debug, Clone, Deserialize)]
struct TessieVehiclesResponse {
    #[serde(default)]
    results: Vec<TessieVehicleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TessieVehicleEntry {
    vin: String,
    display_name: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TessieStateResponse {
    vin: String,
    display_name: String,
    state: String,
    charge_state: TessieChargeState,
    climate_state: TessieClimateState,
    vehicle_state: TessieVehicleState,
    drive_state: TessieDriveState,
}

#[derive(Debug, Clone, Deserialize)]
struct TessieChargeState {
    battery_level: f64,
    /// Miles; normalized to km.
    battery_range: f64,
    charging_state: String,
    /// Miles of range per hour; normalized to km/h.
    charge_rate: f64,
    #[serde(default)]
    minutes_to_full_charge: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct TessieClimateState {
    is_climate_on: bool,
    #[serde(default)]
    inside_temp: Option<f64>,
    #[serde(default)]
    outside_temp: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct TessieVehicleState {
    locked: bool,
    #[serde(default)]
    sentry_mode: bool,
    /// Miles; normalized to km.
    odometer: f64,
    car_version: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TessieDriveState {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    shift_state: Option<String>,
    /// Mph; normalized to km/h.
    #[serde(default)]
    speed: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct TessieCommandResponse {
    result: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TessieWakeResponse {
    result: bool,
    #[serde(default)]
    state: Option<String>,
}

fn summarize_vehicle(entry: TessieVehicleEntry) -> Result<VehicleSummary, GatewayError> {
    Ok(VehicleSummary {
        id: VehicleId::parse(&entry.vin).map_err(validation_to_error)?,
        display_name: entry.display_name,
        connectivity: parse_connectivity(entry.state.as_deref().unwrap_or("online")),
    })
}

fn normalize_state(payload: TessieStateResponse) -> Result<VehicleSnapshot, GatewayError> {
    let id = VehicleId::parse(&payload.vin).map_err(validation_to_error)?;

    let charge = ChargeState::new(
        payload.charge_state.battery_level,
        parse_charging_state(&payload.charge_state.charging_state),
        payload.charge_state.battery_range * MILES_TO_KM,
        payload.charge_state.charge_rate * MILES_TO_KM,
        payload.charge_state.minutes_to_full_charge,
    )
    .map_err(validation_to_error)?;

    let climate = ClimateState::new(
        payload.climate_state.is_climate_on,
        payload.climate_state.inside_temp,
        payload.climate_state.outside_temp,
    )
    .map_err(validation_to_error)?;

    let security = SecurityState::new(
        payload.vehicle_state.locked,
        payload.vehicle_state.sentry_mode,
        payload.vehicle_state.odometer * MILES_TO_KM,
        payload.vehicle_state.car_version,
    )
    .map_err(validation_to_error)?;

    let drive = DriveState::new(
        payload.drive_state.latitude,
        payload.drive_state.longitude,
        parse_shift_state(payload.drive_state.shift_state.as_deref()),
        payload.drive_state.speed.map(|speed| speed * MILES_TO_KM),
    )
    .map_err(validation_to_error)?;

    Ok(VehicleSnapshot::new(
        id,
        payload.display_name,
        parse_connectivity(&payload.state),
        charge,
        climate,
        security,
        drive,
        UtcDateTime::now(),
    ))
}

/// Unknown states map to offline so downstream code errs on the cautious
/// side (a wake attempt on an online car is a no-op; skipping one on an
/// offline car is not).
fn parse_connectivity(value: &str) -> ConnectivityState {
    match value.to_ascii_lowercase().as_str() {
        "online" | "awake" => ConnectivityState::Online,
        "asleep" | "sleeping" => ConnectivityState::Asleep,
        _ => ConnectivityState::Offline,
    }
}

fn parse_charging_state(value: &str) -> ChargingState {
    match value.to_ascii_lowercase().as_str() {
        "charging" => ChargingState::Charging,
        "complete" => ChargingState::Complete,
        "stopped" => ChargingState::Stopped,
        "nopower" | "no_power" => ChargingState::NoPower,
        _ => ChargingState::Disconnected,
    }
}

/// Null or empty gear means the car is parked.
fn parse_shift_state(value: Option<&str>) -> ShiftState {
    match value.map(str::trim) {
        Some("D") | Some("d") => ShiftState::Drive,
        Some("R") | Some("r") => ShiftState::Reverse,
        Some("N") | Some("n") => ShiftState::Neutral,
        _ => ShiftState::Park,
    }
}

fn mock_garage() -> [(&'static str, &'static str); 2] {
    [
        ("5YJ3E1EA7KF000001", "Aurora"),
        ("5YJ3E1EA0KF000777", "Borealis"),
    ]
}

fn mock_display_name(id: &VehicleId) -> String {
    mock_garage()
        .iter()
        .find(|(vin, _)| *vin == id.as_str())
        .map(|(_, name)| (*name).to_owned())
        .unwrap_or_else(|| String::from("Aurora"))
}

fn mock_state(id: &VehicleId) -> TessieStateResponse {
    let seed = vehicle_seed(id);
    let battery_level = 35.0 + (seed % 60) as f64;
    let charging = matches!(seed % 4, 1);

    TessieStateResponse {
        vin: id.as_str().to_owned(),
        display_name: mock_display_name(id),
        state: String::from("online"),
        charge_state: TessieChargeState {
            battery_level,
            battery_range: battery_level * 1.9,
            charging_state: if charging {
                String::from("Charging")
            } else {
                String::from("Disconnected")
            },
            charge_rate: if charging { 27.0 } else { 0.0 },
            minutes_to_full_charge: charging.then_some(85.0),
        },
        climate_state: TessieClimateState {
            is_climate_on: false,
            inside_temp: Some(19.0 + (seed % 6) as f64),
            outside_temp: Some(7.0 + (seed % 12) as f64),
        },
        vehicle_state: TessieVehicleState {
            locked: true,
            sentry_mode: seed % 2 == 1,
            odometer: 12_000.0 + (seed % 30_000) as f64,
            car_version: String::from("2024.8.7"),
        },
        drive_state: TessieDriveState {
            latitude: 52.52,
            longitude: 13.405,
            shift_state: None,
            speed: None,
        },
    }
}

fn vehicle_seed(id: &VehicleId) -> u64 {
    id.as_str().bytes().fold(11_u64, |acc, byte| {
        acc.wrapping_mul(31).wrapping_add(byte as u64)
    })
}

fn validation_to_error(error: ValidationError) -> GatewayError {
    GatewayError::internal(error.to_string())
}
