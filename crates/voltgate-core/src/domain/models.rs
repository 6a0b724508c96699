use serde::{Deserialize, Serialize};

use crate::{UtcDateTime, ValidationError, VehicleId};

/// Reachability of the vehicle as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Online,
    Asleep,
    Offline,
}

impl ConnectivityState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Asleep => "asleep",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Charging phase reported by the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingState {
    Charging,
    Complete,
    Stopped,
    Disconnected,
    NoPower,
}

impl ChargingState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Charging => "charging",
            Self::Complete => "complete",
            Self::Stopped => "stopped",
            Self::Disconnected => "disconnected",
            Self::NoPower => "no_power",
        }
    }
}

/// Gear selector position. Providers report null while parked; adapters
/// normalize that to `Park`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftState {
    Park,
    Reverse,
    Neutral,
    Drive,
}

/// Battery and charging sub-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeState {
    /// State of charge in percent.
    pub battery_level: f64,
    pub charging_state: ChargingState,
    /// Estimated range in kilometers.
    pub battery_range: f64,
    /// Range added per hour while charging, in km/h. Zero when idle.
    pub charge_rate: f64,
    pub minutes_to_full: Option<f64>,
}

impl ChargeState {
    pub fn new(
        battery_level: f64,
        charging_state: ChargingState,
        battery_range: f64,
        charge_rate: f64,
        minutes_to_full: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_percent("battery_level", battery_level)?;
        validate_non_negative("battery_range", battery_range)?;
        validate_non_negative("charge_rate", charge_rate)?;
        validate_optional_non_negative("minutes_to_full", minutes_to_full)?;

        Ok(Self {
            battery_level,
            charging_state,
            battery_range,
            charge_rate,
            minutes_to_full,
        })
    }
}

/// HVAC sub-record. Temperatures in Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateState {
    pub is_climate_on: bool,
    pub inside_temp: Option<f64>,
    pub outside_temp: Option<f64>,
}

impl ClimateState {
    pub fn new(
        is_climate_on: bool,
        inside_temp: Option<f64>,
        outside_temp: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_optional_finite("inside_temp", inside_temp)?;
        validate_optional_finite("outside_temp", outside_temp)?;

        Ok(Self {
            is_climate_on,
            inside_temp,
            outside_temp,
        })
    }
}

/// Locks, sentry and vehicle metadata sub-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityState {
    pub locked: bool,
    pub sentry_mode: bool,
    /// Odometer reading in kilometers.
    pub odometer: f64,
    pub firmware_version: String,
}

impl SecurityState {
    pub fn new(
        locked: bool,
        sentry_mode: bool,
        odometer: f64,
        firmware_version: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("odometer", odometer)?;

        Ok(Self {
            locked,
            sentry_mode,
            odometer,
            firmware_version: firmware_version.into(),
        })
    }
}

/// Position and motion sub-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveState {
    pub latitude: f64,
    pub longitude: f64,
    pub shift_state: ShiftState,
    /// Speed in km/h, absent while parked.
    pub speed: Option<f64>,
}

impl DriveState {
    pub fn new(
        latitude: f64,
        longitude: f64,
        shift_state: ShiftState,
        speed: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_range("latitude", latitude, -90.0, 90.0)?;
        validate_range("longitude", longitude, -180.0, 180.0)?;
        validate_optional_non_negative("speed", speed)?;

        Ok(Self {
            latitude,
            longitude,
            shift_state,
            speed,
        })
    }
}

/// Normalized full-vehicle state, provider-independent.
///
/// Adapters build this from their own wire formats; everything downstream
/// (cache, automation conditions, CLI output) reads only this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub display_name: String,
    pub connectivity: ConnectivityState,
    pub charge: ChargeState,
    pub climate: ClimateState,
    pub security: SecurityState,
    pub drive: DriveState,
    pub captured_at: UtcDateTime,
}

impl VehicleSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: VehicleId,
        display_name: impl Into<String>,
        connectivity: ConnectivityState,
        charge: ChargeState,
        climate: ClimateState,
        security: SecurityState,
        drive: DriveState,
        captured_at: UtcDateTime,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            connectivity,
            charge,
            climate,
            security,
            drive,
            captured_at,
        }
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}

fn validate_optional_finite(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
    }
    Ok(())
}

fn validate_percent(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::PercentOutOfRange { field, value });
    }
    Ok(())
}

fn validate_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < min || value > max {
        return Err(ValidationError::ValueOutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_battery_level_above_hundred() {
        let err = ChargeState::new(120.0, ChargingState::Charging, 300.0, 40.0, Some(30.0))
            .expect_err("must fail");
        assert!(matches!(err, ValidationError::PercentOutOfRange { .. }));
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        let err = DriveState::new(95.0, 13.4, ShiftState::Park, None).expect_err("must fail");
        assert!(matches!(err, ValidationError::ValueOutOfRange { .. }));
    }

    #[test]
    fn charging_state_serializes_snake_case() {
        let json = serde_json::to_string(&ChargingState::NoPower).expect("serialize");
        assert_eq!(json, "\"no_power\"");
    }
}
