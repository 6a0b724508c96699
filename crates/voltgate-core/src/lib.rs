//! # Voltgate Core
//!
//! Core gateway, provider adapters and domain types for the Voltgate
//! vehicle automation toolkit.
//!
//! ## Overview
//!
//! This crate provides the foundational components for Voltgate:
//!
//! - **Canonical domain models** for vehicle snapshots, charge/climate
//!   state and automation rules
//! - **Provider adapters** for the Tessie and TeslaFi telemetry services
//! - **Vehicle gateway** with sticky provider failover and stale-cache
//!   degradation
//! - **Sliding-window rate limiter** with a shared wake budget
//! - **Circuit breaker** for resilient upstream calls
//! - **JSON file configuration** with atomic persistence
//!
//! ## Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `default` | Standard feature set |
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Vehicle snapshot cache with freshness tracking |
//! | [`circuit_breaker`] | Circuit breaker for resilient calls |
//! | [`config`] | Settings and rule persistence |
//! | [`domain`] | Domain models (VehicleSnapshot, AutomationRule) |
//! | [`error`] | Core error types |
//! | [`gateway`] | Provider failover, budgets and caching in one facade |
//! | [`http_client`] | HTTP client abstraction |
//! | [`notify`] | Notification sink contract |
//! | [`provider`] | Vehicle provider trait and request/outcome types |
//! | [`provider_limits`] | Per-provider request budgets |
//! | [`providers`] | Provider adapters (Tessie, TeslaFi) |
//! | [`rate_limit`] | Sliding-window rate limiter |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use voltgate_core::{GatewayBuilder, GatewaySettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Mock mode serves deterministic offline data
//!     let gateway = GatewayBuilder::new(GatewaySettings::default())
//!         .mock_mode(true)
//!         .build();
//!
//!     for vehicle in gateway.vehicles().await? {
//!         let snapshot = gateway.vehicle_data(&vehicle.id, true).await?;
//!         println!(
//!             "{}: {:.0}% charged",
//!             snapshot.display_name, snapshot.charge.battery_level
//!         );
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ CLI / Automation │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ Vehicle Gateway  │────▶│ Rate Limiter     │
//! │ (failover)       │     │ Snapshot Cache   │
//! └────────┬─────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ Provider Client  │────▶│ HTTP Client      │
//! │ (Tessie/TeslaFi) │     │ (reqwest/none)   │
//! └────────┬─────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ VehicleSnapshot  │
//! │ (normalized)     │
//! └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result` types with structured errors:
//!
//! ```rust
//! use voltgate_core::{GatewayError, GatewayErrorKind};
//!
//! fn handle_error(error: GatewayError) {
//!     match error.kind() {
//!         GatewayErrorKind::RateLimited => {
//!             // Back off until the window frees a slot
//!         }
//!         GatewayErrorKind::ProviderUnavailable => {
//!             // The gateway already retried on the other provider
//!         }
//!         GatewayErrorKind::Authentication => {
//!             // Prompt for new credentials
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys come from the config file or environment variables and are
//!   never logged
//! - All HTTP requests use TLS via reqwest
//! - Input validation on all domain types

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod http_client;
pub mod notify;
pub mod provider;
pub mod provider_limits;
pub mod providers;
pub mod rate_limit;

// Re-export commonly used types at crate root for convenience

// Provider adapters
pub use providers::{TessieProvider, TeslafiProvider};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Caching
pub use cache::{CachedSnapshot, SnapshotCache, DEFAULT_FRESHNESS_WINDOW};

// Configuration
pub use config::{
    ConfigData, ConfigError, ConfigStore, GatewaySettings, InMemoryConfigStore, JsonFileStore,
    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH,
};

// Domain models
pub use domain::{
    parse_time_of_day, Action, AutomationRule, ChargeState, ChargingState, ClimateMode,
    ClimateState, ConnectivityState, DayOfWeek, DriveState, LocationEvent, NotificationPriority,
    RuleId, SecurityState, ShiftState, Trigger, TriggerFrequency, UtcDateTime, VehicleId,
    VehicleSnapshot,
};

// Error types
pub use error::{GatewayError, GatewayErrorKind, ValidationError};

// Gateway facade
pub use gateway::{
    CommandResult, GatewayBuilder, GatewayStatus, ProviderStatus, VehicleGateway,
};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};

// Notifications
pub use notify::{Notification, NotificationSink, RecordingSink, TracingSink};

// Provider contract
pub use provider::{CommandOutcome, CommandRequest, ProviderKind, VehicleProvider, VehicleSummary};

// Request budgets
pub use provider_limits::{ProviderLimits, WAKE_LIMIT, WAKE_WINDOW};

// Rate limiting
pub use rate_limit::{CommandClass, RateLimiter, RateLimiterConfig};
