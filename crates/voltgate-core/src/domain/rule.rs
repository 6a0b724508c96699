//! Automation rule data model.
//!
//! Rules pair one [`Trigger`] with a list of [`Action`]s. Both enums are
//! internally tagged so stored JSON stays readable and hand-editable:
//!
//! ```json
//! {
//!   "trigger": "vehicle_state",
//!   "condition": "battery_level < 20",
//!   "frequency": "once_per_trip"
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{UtcDateTime, ValidationError};

/// Stable rule identifier, persisted with the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(Uuid);

impl RuleId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for RuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for RuleId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidRuleId {
                value: value.to_owned(),
            })
    }
}

/// How often a state trigger may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerFrequency {
    /// At most once per hour, so a rule fires once per drive and arms again
    /// after the vehicle has been settled for a while.
    OncePerTrip,
    EveryPass,
}

impl Default for TriggerFrequency {
    fn default() -> Self {
        Self::OncePerTrip
    }
}

/// Geofence edge for location triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationEvent {
    Arrive,
    Leave,
}

/// Day-of-week gate used by schedule triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub const fn from_weekday(weekday: time::Weekday) -> Self {
        match weekday {
            time::Weekday::Monday => Self::Mon,
            time::Weekday::Tuesday => Self::Tue,
            time::Weekday::Wednesday => Self::Wed,
            time::Weekday::Thursday => Self::Thu,
            time::Weekday::Friday => Self::Fri,
            time::Weekday::Saturday => Self::Sat,
            time::Weekday::Sunday => Self::Sun,
        }
    }
}

/// Condition that starts a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum Trigger {
    /// Evaluated against the cached snapshot each state pass.
    VehicleState {
        condition: String,
        #[serde(default)]
        frequency: TriggerFrequency,
    },
    /// Fires once in the minute matching `at` (`"HH:MM"`, UTC).
    TimeOfDay { at: String },
    /// Like `TimeOfDay`, gated to the listed days.
    Schedule { at: String, days: Vec<DayOfWeek> },
    /// Asserted by an external geofence integration, never polled here.
    Location {
        place: String,
        event: LocationEvent,
        radius_m: f64,
    },
    /// Asserted by an external calendar integration, never polled here.
    Calendar { lead_minutes: u32 },
}

impl Trigger {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VehicleState { .. } => "vehicle_state",
            Self::TimeOfDay { .. } => "time_of_day",
            Self::Schedule { .. } => "schedule",
            Self::Location { .. } => "location",
            Self::Calendar { .. } => "calendar",
        }
    }

    /// Location and calendar triggers fire only through
    /// `assert_external_trigger`; the engine passes skip them.
    pub const fn is_externally_asserted(&self) -> bool {
        matches!(self, Self::Location { .. } | Self::Calendar { .. })
    }
}

/// Climate action direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateMode {
    Start,
    Stop,
}

/// Notification urgency passed through to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

impl Default for NotificationPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl NotificationPriority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// One step executed when a rule fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Raw provider command with passthrough parameters.
    VehicleCommand {
        command: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    ClimateControl {
        mode: ClimateMode,
        target_temp: Option<f64>,
    },
    /// Notifies (but does not block) when battery is below the floor.
    ChargingCheck { minimum_battery: f64 },
    Notification {
        title: String,
        message: String,
        #[serde(default)]
        priority: NotificationPriority,
    },
}

impl Action {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VehicleCommand { .. } => "vehicle_command",
            Self::ClimateControl { .. } => "climate_control",
            Self::ChargingCheck { .. } => "charging_check",
            Self::Notification { .. } => "notification",
        }
    }
}

/// A stored automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub trigger: Trigger,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub created_at: Option<UtcDateTime>,
    /// False for the seeded starter rules, true for user-created ones.
    #[serde(default)]
    pub custom: bool,
}

impl AutomationRule {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        trigger: Trigger,
        actions: Vec<Action>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyRuleName);
        }

        Ok(Self {
            id: RuleId::new(),
            name,
            description: description.into(),
            enabled: true,
            trigger,
            actions,
            created_at: Some(UtcDateTime::now()),
            custom: true,
        })
    }
}

/// Parse `"HH:MM"` into hour/minute. Hours 0..=23, minutes 0..=59.
pub fn parse_time_of_day(value: &str) -> Result<(u8, u8), ValidationError> {
    let invalid = || ValidationError::InvalidTimeOfDay {
        value: value.to_owned(),
    };

    let (hour_part, minute_part) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u8 = hour_part.parse().map_err(|_| invalid())?;
    let minute: u8 = minute_part.parse().map_err(|_| invalid())?;

    if hour > 23 || minute > 59 {
        return Err(invalid());
    }

    Ok((hour, minute))
}
