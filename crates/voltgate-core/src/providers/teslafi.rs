use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, NoopHttpClient};
use crate::provider::{CommandOutcome, CommandRequest, ProviderKind, VehicleProvider, VehicleSummary};
use crate::{
    ChargeState, ChargingState, ClimateState, ConnectivityState, DriveState, GatewayError,
    SecurityState, ShiftState, UtcDateTime, ValidationError, VehicleId, VehicleSnapshot,
};

const TESLAFI_BASE: &str = "https://api.teslafi.com/feed.php";

const MILES_TO_KM: f64 = 1.609_344;

/// TeslaFi adapter supporting both real API calls and mock mode.
///
/// TeslaFi is feed-oriented: a single endpoint selected by a `command`
/// query parameter, the token also in the query string, and every value
/// in the response encoded as a string (empty string for null). The
/// normalizers here turn that into the same typed snapshot the Tessie
/// adapter produces.
#[derive(Clone)]
pub struct TeslafiProvider {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    circuit_breaker: Arc<CircuitBreaker>,
    use_real_api: bool,
}

impl Default for TeslafiProvider {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            api_key: std::env::var("VOLTGATE_TESLAFI_API_KEY")
                .or_else(|_| std::env::var("TESLAFI_API_KEY"))
                .ok(),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            use_real_api: false,
        }
    }
}

impl TeslafiProvider {
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

    fn feed_url(&self, command: &str, pairs: &[(String, String)]) -> Result<String, GatewayError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            GatewayError::authentication(ProviderKind::Teslafi, "api key is not configured")
        })?;

        let mut url = format!(
            "{TESLAFI_BASE}?token={}&command={}",
            urlencoding::encode(key),
            urlencoding::encode(command)
        );
        for (name, value) in pairs {
            url.push_str(&format!("&{}={}", name, urlencoding::encode(value)));
        }
        Ok(url)
    }

    async fn execute_call(&self, request: HttpRequest) -> Result<HttpResponse, GatewayError> {
        if !self.circuit_breaker.allow_request() {
            return Err(GatewayError::provider_unavailable(
                "teslafi circuit breaker is open; skipping upstream call",
            ));
        }

        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            GatewayError::provider_unavailable(format!(
                "teslafi transport error: {}",
                error.message()
            ))
        })?;

        if response.is_success() {
            self.circuit_breaker.record_success();
            return Ok(response);
        }

        match response.status {
            401 | 403 => Err(GatewayError::authentication(
                ProviderKind::Teslafi,
                format!("token rejected (status {})", response.status),
            )),
            404 => Err(GatewayError::invalid_request(
                "teslafi does not know the requested vehicle",
            )),
            429 => Err(GatewayError::rate_limited(
                "teslafi reports its own rate limit exceeded",
            )),
            status => {
                self.circuit_breaker.record_failure();
                Err(GatewayError::provider_unavailable(format!(
                    "teslafi returned status {status}"
                )))
            }
        }
    }
}

// Real API implementation methods
impl TeslafiProvider {
    async fn authenticate_real(&self) -> Result<(), GatewayError> {
        let url = self.feed_url("vehicles", &[])?;
        self.execute_call(HttpRequest::get(url)).await?;
        Ok(())
    }

    async fn fetch_real_vehicles(&self) -> Result<Vec<VehicleSummary>, GatewayError> {
        let url = self.feed_url("vehicles", &[])?;
        let response = self.execute_call(HttpRequest::get(url)).await?;

        let parsed: TeslafiVehiclesResponse = serde_json::from_str(&response.body)
            .map_err(|e| GatewayError::internal(format!("failed to parse teslafi vehicle list: {e}")))?;

        parsed
            .vehicles
            .into_iter()
            .map(summarize_vehicle)
            .collect::<Result<Vec<_>, _>>()
    }

    async fn fetch_real_state(&self, id: &VehicleId) -> Result<VehicleSnapshot, GatewayError> {
        let url = self.feed_url("lastGood", &vehicle_pair(id))?;
        let response = self.execute_call(HttpRequest::get(url)).await?;

        let parsed: TeslafiStateResponse = serde_json::from_str(&response.body)
            .map_err(|e| GatewayError::internal(format!("failed to parse teslafi feed: {e}")))?;

        normalize_feed(parsed, id)
    }

    async fn execute_real_command(&self, req: &CommandRequest) -> Result<CommandOutcome, GatewayError> {
        let mut pairs = vehicle_pair(&req.vehicle_id);
        pairs.extend(params_to_pairs(&req.params)?);

        let url = self.feed_url(&req.command, &pairs)?;
        let response = self.execute_call(HttpRequest::post(url)).await?;
        parse_command_response(&response.body)
    }

    async fn execute_real_wake(&self, id: &VehicleId) -> Result<ConnectivityState, GatewayError> {
        let url = self.feed_url("wake_up", &vehicle_pair(id))?;
        let response = self.execute_call(HttpRequest::post(url)).await?;

        let outcome = parse_command_response(&response.body)?;
        if outcome.accepted {
            Ok(ConnectivityState::Online)
        } else {
            Err(GatewayError::command_execution(
                outcome
                    .reason
                    .unwrap_or_else(|| String::from("teslafi could not wake the vehicle")),
            ))
        }
    }
}

// Mock data methods (for offline and test runs)
impl TeslafiProvider {
    async fn execute_feed_call(&self, command: &str, pairs: &[(String, String)]) -> Result<(), GatewayError> {
        let url = self.feed_url(command, pairs)?;
        self.execute_call(HttpRequest::get(url)).await?;
        Ok(())
    }

    async fn fetch_mock_vehicles(&self) -> Result<Vec<VehicleSummary>, GatewayError> {
        self.execute_feed_call("vehicles", &[]).await?;

        mock_garage()
            .iter()
            .map(|(id, name)| {
                Ok(VehicleSummary {
                    id: VehicleId::parse(id).map_err(validation_to_error)?,
                    display_name: (*name).to_owned(),
                    connectivity: ConnectivityState::Online,
                })
            })
            .collect()
    }

    async fn fetch_mock_state(&self, id: &VehicleId) -> Result<VehicleSnapshot, GatewayError> {
        self.execute_feed_call("lastGood", &vehicle_pair(id)).await?;

        // Mock payloads are stringly like the live feed so they exercise
        // the same normalizer.
        normalize_feed(mock_feed(id), id)
    }

    async fn execute_mock_command(&self, req: &CommandRequest) -> Result<CommandOutcome, GatewayError> {
        let mut pairs = vehicle_pair(&req.vehicle_id);
        pairs.extend(params_to_pairs(&req.params)?);
        self.execute_feed_call(&req.command, &pairs).await?;

        Ok(CommandOutcome::accepted(serde_json::json!({
            "response": { "result": "1" }
        })))
    }

    async fn execute_mock_wake(&self, id: &VehicleId) -> Result<ConnectivityState, GatewayError> {
        self.execute_feed_call("wake_up", &vehicle_pair(id)).await?;

        Ok(ConnectivityState::Online)
    }
}

impl VehicleProvider for TeslafiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Teslafi
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
                self.execute_feed_call("vehicles", &[]).await
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

// TeslaFi feed structures. Every numeric field arrives as a string and
// null arrives as an empty string.
#[derive(Debug, Clone, Deserialize)]
struct TeslafiVehiclesResponse {
    #[serde(default)]
    vehicles: Vec<TeslafiVehicleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TeslafiVehicleEntry {
    vehicle_id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, rename = "carState")]
    car_state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TeslafiStateResponse {
    #[serde(default)]
    vehicle_id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, rename = "carState")]
    car_state: Option<String>,
    #[serde(default)]
    battery_level: Option<String>,
    #[serde(default)]
    battery_range: Option<String>,
    #[serde(default)]
    charging_state: Option<String>,
    #[serde(default)]
    charge_rate: Option<String>,
    /// Hours; normalized to minutes.
    #[serde(default)]
    time_to_full_charge: Option<String>,
    #[serde(default)]
    is_climate_on: Option<String>,
    #[serde(default)]
    inside_temp: Option<String>,
    #[serde(default)]
    outside_temp: Option<String>,
    #[serde(default)]
    locked: Option<String>,
    #[serde(default)]
    sentry_mode: Option<String>,
    #[serde(default)]
    odometer: Option<String>,
    #[serde(default)]
    car_version: Option<String>,
    #[serde(default)]
    latitude: Option<String>,
    #[serde(default)]
    longitude: Option<String>,
    #[serde(default)]
    shift_state: Option<String>,
    #[serde(default)]
    speed: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TeslafiCommandResponse {
    response: TeslafiCommandBody,
}

#[derive(Debug, Clone, Deserialize)]
struct TeslafiCommandBody {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

fn summarize_vehicle(entry: TeslafiVehicleEntry) -> Result<VehicleSummary, GatewayError> {
    Ok(VehicleSummary {
        id: VehicleId::parse(&entry.vehicle_id).map_err(validation_to_error)?,
        display_name: entry
            .display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| entry.vehicle_id.clone()),
        connectivity: parse_car_state(entry.car_state.as_deref()),
    })
}

fn normalize_feed(payload: TeslafiStateResponse, requested: &VehicleId) -> Result<VehicleSnapshot, GatewayError> {
    let id = match payload.vehicle_id.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => VehicleId::parse(raw).map_err(validation_to_error)?,
        None => requested.clone(),
    };

    let charge = ChargeState::new(
        require_f64("battery_level", payload.battery_level.as_deref())?,
        parse_charging_state(payload.charging_state.as_deref()),
        require_f64("battery_range", payload.battery_range.as_deref())? * MILES_TO_KM,
        parse_opt_f64(payload.charge_rate.as_deref()).unwrap_or(0.0) * MILES_TO_KM,
        parse_opt_f64(payload.time_to_full_charge.as_deref()).map(|hours| hours * 60.0),
    )
    .map_err(validation_to_error)?;

    let climate = ClimateState::new(
        parse_flag(payload.is_climate_on.as_deref()),
        parse_opt_f64(payload.inside_temp.as_deref()),
        parse_opt_f64(payload.outside_temp.as_deref()),
    )
    .map_err(validation_to_error)?;

    let security = SecurityState::new(
        parse_flag(payload.locked.as_deref()),
        parse_flag(payload.sentry_mode.as_deref()),
        require_f64("odometer", payload.odometer.as_deref())? * MILES_TO_KM,
        payload
            .car_version
            .filter(|version| !version.is_empty())
            .unwrap_or_else(|| String::from("unknown")),
    )
    .map_err(validation_to_error)?;

    let drive = DriveState::new(
        require_f64("latitude", payload.latitude.as_deref())?,
        require_f64("longitude", payload.longitude.as_deref())?,
        parse_shift_state(payload.shift_state.as_deref()),
        parse_opt_f64(payload.speed.as_deref()).map(|speed| speed * MILES_TO_KM),
    )
    .map_err(validation_to_error)?;

    Ok(VehicleSnapshot::new(
        id,
        payload
            .display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| String::from("Vehicle")),
        parse_car_state(payload.car_state.as_deref()),
        charge,
        climate,
        security,
        drive,
        UtcDateTime::now(),
    ))
}

fn parse_command_response(body: &str) -> Result<CommandOutcome, GatewayError> {
    let parsed: TeslafiCommandResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::internal(format!("failed to parse teslafi command result: {e}")))?;
    let raw: serde_json::Value = serde_json::from_str(body).unwrap_or(serde_json::Value::Null);

    if matches!(parsed.response.result.as_deref(), Some("1") | Some("true")) {
        Ok(CommandOutcome::accepted(raw))
    } else {
        let reason = parsed
            .response
            .reason
            .filter(|reason| !reason.is_empty())
            .unwrap_or_else(|| String::from("command rejected by vehicle"));
        Ok(CommandOutcome::rejected(reason, raw))
    }
}

fn vehicle_pair(id: &VehicleId) -> Vec<(String, String)> {
    vec![(String::from("vehicle_id"), id.as_str().to_owned())]
}

fn params_to_pairs(params: &serde_json::Value) -> Result<Vec<(String, String)>, GatewayError> {
    match params {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(name, value)| {
                let rendered = match value {
                    serde_json::Value::String(text) => text.clone(),
                    serde_json::Value::Number(number) => number.to_string(),
                    serde_json::Value::Bool(flag) => flag.to_string(),
                    _ => {
                        return Err(GatewayError::invalid_request(format!(
                            "command parameter `{name}` must be a scalar value"
                        )))
                    }
                };
                Ok((name.clone(), rendered))
            })
            .collect(),
        _ => Err(GatewayError::invalid_request(
            "command parameters must be a JSON object",
        )),
    }
}

fn require_f64(field: &str, value: Option<&str>) -> Result<f64, GatewayError> {
    parse_opt_f64(value).ok_or_else(|| {
        GatewayError::internal(format!("teslafi feed is missing a numeric `{field}`"))
    })
}

fn parse_opt_f64(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| raw.parse::<f64>().ok())
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1") | Some("true") | Some("True"))
}

/// TeslaFi reports one coarse `carState` instead of the native
/// online/asleep pair.
fn parse_car_state(value: Option<&str>) -> ConnectivityState {
    match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
        Some("sleeping") => ConnectivityState::Asleep,
        Some("idling") | Some("driving") | Some("charging") | Some("sentry") => {
            ConnectivityState::Online
        }
        _ => ConnectivityState::Offline,
    }
}

fn parse_charging_state(value: Option<&str>) -> ChargingState {
    match value
        .map(|raw| raw.trim().to_ascii_lowercase())
        .as_deref()
        .unwrap_or("")
    {
        "charging" => ChargingState::Charging,
        "complete" => ChargingState::Complete,
        "stopped" => ChargingState::Stopped,
        "nopower" | "no_power" => ChargingState::NoPower,
        _ => ChargingState::Disconnected,
    }
}

fn parse_shift_state(value: Option<&str>) -> ShiftState {
    match value.map(str::trim) {
        Some("D") | Some("d") => ShiftState::Drive,
        Some("R") | Some("r") => ShiftState::Reverse,
        Some("N") | Some("n") => ShiftState::Neutral,
        _ => ShiftState::Park,
    }
}

fn mock_garage() -> [(&'static str, &'static str); 2] {
    [("117001", "Aurora"), ("117002", "Borealis")]
}

fn mock_display_name(id: &VehicleId) -> String {
    mock_garage()
        .iter()
        .find(|(candidate, _)| *candidate == id.as_str())
        .map(|(_, name)| (*name).to_owned())
        .unwrap_or_else(|| String::from("Aurora"))
}

fn mock_feed(id: &VehicleId) -> TeslafiStateResponse {
    let seed = vehicle_seed(id);
    let battery_level = 35 + seed % 60;
    let charging = seed % 4 == 1;

    TeslafiStateResponse {
        vehicle_id: Some(id.as_str().to_owned()),
        display_name: Some(mock_display_name(id)),
        car_state: Some(String::from(if charging { "Charging" } else { "Idling" })),
        battery_level: Some(battery_level.to_string()),
        battery_range: Some(format!("{:.1}", battery_level as f64 * 1.9)),
        charging_state: Some(String::from(if charging { "Charging" } else { "Disconnected" })),
        charge_rate: Some(String::from(if charging { "17.0" } else { "0.0" })),
        time_to_full_charge: Some(String::from(if charging { "1.42" } else { "0.0" })),
        is_climate_on: Some(String::from("0")),
        inside_temp: Some((19 + seed % 6).to_string()),
        outside_temp: Some((7 + seed % 12).to_string()),
        locked: Some(String::from("1")),
        sentry_mode: Some(String::from(if seed % 2 == 1 { "1" } else { "0" })),
        odometer: Some((12_000 + seed % 30_000).to_string()),
        car_version: Some(String::from("2024.8.7")),
        latitude: Some(String::from("52.52")),
        longitude: Some(String::from("13.405")),
        shift_state: Some(String::new()),
        speed: Some(String::new()),
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
