//! # Domain Models
//!
//! Canonical domain types for the vehicle gateway.
//!
//! ## Overview
//!
//! This module provides strongly-typed domain models with built-in validation.
//! All models are designed to be:
//!
//! - **Type-safe**: Invalid states are unrepresentable
//! - **Validated**: Construction validates all invariants
//! - **Serializable**: Full serde support for JSON
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`VehicleSnapshot`] | Normalized full-vehicle state |
//! | [`ChargeState`] | Battery level, range, charging phase |
//! | [`ClimateState`] | HVAC state and cabin temperatures |
//! | [`SecurityState`] | Locks, sentry mode, odometer, firmware |
//! | [`DriveState`] | Position, gear, speed |
//! | [`AutomationRule`] | Stored rule: one trigger, many actions |
//! | [`Trigger`] / [`Action`] | Internally-tagged rule building blocks |
//! | [`VehicleId`] | Validated provider-assigned identifier |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! ## Validation
//!
//! Domain types enforce invariants at construction time:
//!
//! ```rust,ignore
//! use voltgate_core::{ChargeState, ChargingState, ValidationError};
//!
//! // Valid charge state
//! let charge = ChargeState::new(72.0, ChargingState::Charging, 310.0, 44.0, Some(85.0))?;
//!
//! // Battery level above 100% - returns ValidationError
//! let invalid = ChargeState::new(120.0, ChargingState::Charging, 310.0, 44.0, None);
//! assert!(matches!(invalid, Err(ValidationError::PercentOutOfRange { .. })));
//! ```

mod models;
mod rule;
mod timestamp;
mod vehicle_id;

pub use models::{
    ChargeState, ChargingState, ClimateState, ConnectivityState, DriveState, SecurityState,
    ShiftState, VehicleSnapshot,
};
pub use rule::{
    parse_time_of_day, Action, AutomationRule, ClimateMode, DayOfWeek, LocationEvent,
    NotificationPriority, RuleId, Trigger, TriggerFrequency,
};
pub use timestamp::UtcDateTime;
pub use vehicle_id::VehicleId;
