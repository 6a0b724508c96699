//! Error types shared across the gateway.
//!
//! [`ValidationError`] covers construction of domain values (vehicle ids,
//! timestamps, snapshot fields). [`GatewayError`] is the operation-level
//! error surfaced by the gateway and the automation layer, classified by
//! [`GatewayErrorKind`] so callers can branch on category instead of
//! matching message strings.

use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::provider::ProviderKind;

/// Validation errors raised by domain value constructors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("vehicle id cannot be empty")]
    EmptyVehicleId,
    #[error("vehicle id length {len} exceeds max {max}")]
    VehicleIdTooLong { len: usize, max: usize },
    #[error("vehicle id contains invalid character '{ch}' at index {index}")]
    VehicleIdInvalidChar { ch: char, index: usize },

    #[error("invalid provider '{value}', expected one of tessie, teslafi")]
    InvalidProvider { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be a percentage in 0..=100: {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },
    #[error("field '{field}' must be within {min}..={max}: {value}")]
    ValueOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid time of day '{value}', expected HH:MM")]
    InvalidTimeOfDay { value: String },

    #[error("invalid rule id '{value}'")]
    InvalidRuleId { value: String },
    #[error("rule name cannot be empty")]
    EmptyRuleName,
}

/// Gateway-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Authentication,
    RateLimited,
    ProviderUnavailable,
    NoProviderAvailable,
    CommandExecution,
    InvalidRuleCondition,
    NotConfigured,
    InvalidRequest,
    Internal,
}

/// Structured gateway error used by failover and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    kind: GatewayErrorKind,
    message: String,
    retryable: bool,
}

impl GatewayError {
    pub fn authentication(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Authentication,
            message: format!("{provider}: {}", message.into()),
            retryable: false,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::ProviderUnavailable,
            message: message.into(),
            retryable: true,
        }
    }

    /// Terminal failure after every candidate provider has been tried.
    ///
    /// `attempted` carries one formatted entry per provider so the final
    /// message preserves what failed where.
    pub fn no_provider_available(attempted: &[String]) -> Self {
        let detail = if attempted.is_empty() {
            "no provider is configured".to_string()
        } else {
            attempted.join("; ")
        };
        Self {
            kind: GatewayErrorKind::NoProviderAvailable,
            message: format!("all providers failed: {detail}"),
            retryable: false,
        }
    }

    pub fn command_execution(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::CommandExecution,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_rule_condition(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::InvalidRuleCondition,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_configured(missing: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::NotConfigured,
            message: format!("missing configuration: {}", missing.into()),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> GatewayErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            GatewayErrorKind::Authentication => "gateway.authentication",
            GatewayErrorKind::RateLimited => "gateway.rate_limited",
            GatewayErrorKind::ProviderUnavailable => "gateway.provider_unavailable",
            GatewayErrorKind::NoProviderAvailable => "gateway.no_provider_available",
            GatewayErrorKind::CommandExecution => "gateway.command_execution",
            GatewayErrorKind::InvalidRuleCondition => "gateway.invalid_rule_condition",
            GatewayErrorKind::NotConfigured => "gateway.not_configured",
            GatewayErrorKind::InvalidRequest => "gateway.invalid_request",
            GatewayErrorKind::Internal => "gateway.internal",
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for GatewayError {}

impl From<ValidationError> for GatewayError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_request(error.to_string())
    }
}
