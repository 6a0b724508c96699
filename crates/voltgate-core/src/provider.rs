//! Vehicle provider trait and request/response types.
//!
//! This module defines the adapter contract (`VehicleProvider`) that both
//! provider implementations follow, along with the request and response
//! types for each operation.
//!
//! # Operations
//!
//! | Operation | Request | Response | Description |
//! |-----------|---------|----------|-------------|
//! | List | none | `Vec<`[`VehicleSummary`]`>` | Account vehicles |
//! | Data | [`VehicleId`] | [`VehicleSnapshot`] | Full normalized state |
//! | Command | [`CommandRequest`] | [`CommandOutcome`] | Named vehicle command |
//! | Wake | [`VehicleId`] | [`ConnectivityState`] | Wake from sleep |
//!
//! # Example
//!
//! ```rust,ignore
//! use voltgate_core::{GatewayError, TessieProvider, VehicleId, VehicleProvider};
//!
//! async fn print_battery(provider: &TessieProvider) -> Result<(), GatewayError> {
//!     let id = VehicleId::parse("5YJ3E1EA7KF000001")?;
//!     let snapshot = provider.vehicle_data(id).await?;
//!     println!("{}: {:.0}%", snapshot.display_name, snapshot.charge.battery_level);
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ConnectivityState, GatewayError, ValidationError, VehicleId, VehicleSnapshot};

/// Canonical provider identifiers used in config, logs and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Tessie,
    Teslafi,
}

impl ProviderKind {
    pub const ALL: [Self; 2] = [Self::Tessie, Self::Teslafi];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tessie => "tessie",
            Self::Teslafi => "teslafi",
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tessie" => Ok(Self::Tessie),
            "teslafi" => Ok(Self::Teslafi),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Minimal per-vehicle record returned by list operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSummary {
    pub id: VehicleId,
    pub display_name: String,
    pub connectivity: ConnectivityState,
}

/// Request payload for named vehicle commands.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub vehicle_id: VehicleId,
    pub command: String,
    pub params: serde_json::Value,
}

impl CommandRequest {
    pub fn new(
        vehicle_id: VehicleId,
        command: impl Into<String>,
        params: serde_json::Value,
    ) -> Result<Self, GatewayError> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(GatewayError::invalid_request(
                "command name must not be empty",
            ));
        }
        Ok(Self {
            vehicle_id,
            command,
            params,
        })
    }
}

/// Provider-level result of a command request.
///
/// A rejected outcome is not a transport failure: the provider answered,
/// the vehicle declined. Transport and auth failures surface as
/// [`GatewayError`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub accepted: bool,
    pub reason: Option<String>,
    /// Raw provider response body, passed through to callers.
    pub raw: serde_json::Value,
}

impl CommandOutcome {
    pub fn accepted(raw: serde_json::Value) -> Self {
        Self {
            accepted: true,
            reason: None,
            raw,
        }
    }

    pub fn rejected(reason: impl Into<String>, raw: serde_json::Value) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
            raw,
        }
    }
}

/// Provider adapter contract.
///
/// Both upstream services expose the same four operations; adapters
/// translate their wire formats into the normalized domain types.
///
/// # Required Methods
///
/// | Method | Description |
/// |--------|-------------|
/// | [`kind`](VehicleProvider::kind) | Which provider this adapter talks to |
/// | [`is_available`](VehicleProvider::is_available) | Credentials present (no network check) |
/// | [`authenticate`](VehicleProvider::authenticate) | Validate credentials against the service |
/// | [`list_vehicles`](VehicleProvider::list_vehicles) | Vehicles on the account |
/// | [`vehicle_data`](VehicleProvider::vehicle_data) | Full normalized snapshot |
/// | [`execute_command`](VehicleProvider::execute_command) | Named command with parameters |
/// | [`wake`](VehicleProvider::wake) | Wake a sleeping vehicle |
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across tasks.
pub trait VehicleProvider: Send + Sync {
    /// Returns which provider this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Whether credentials for this provider are configured.
    ///
    /// This is a local check only; it never issues a network call.
    fn is_available(&self) -> bool;

    /// Validates the stored credentials against the remote service.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] with an authentication kind when the
    /// credentials are missing or rejected, an availability kind when the
    /// service cannot be reached.
    fn authenticate<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send + 'a>>;

    /// Lists the vehicles on the account.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if:
    /// - Credentials are missing or rejected
    /// - The provider is unreachable or rate limiting
    fn list_vehicles<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<VehicleSummary>, GatewayError>> + Send + 'a>>;

    /// Fetches the full normalized state of one vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if:
    /// - The vehicle id is unknown to the provider
    /// - Credentials are missing or rejected
    /// - The provider is unreachable or rate limiting
    fn vehicle_data<'a>(
        &'a self,
        id: VehicleId,
    ) -> Pin<Box<dyn Future<Output = Result<VehicleSnapshot, GatewayError>> + Send + 'a>>;

    /// Executes a named command against one vehicle.
    ///
    /// A declined command is an `Ok` outcome with `accepted == false`;
    /// errors are reserved for transport, auth and rate-limit failures.
    fn execute_command<'a>(
        &'a self,
        req: CommandRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome, GatewayError>> + Send + 'a>>;

    /// Wakes a sleeping vehicle and reports the resulting connectivity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if:
    /// - Credentials are missing or rejected
    /// - The provider is unreachable or rate limiting
    fn wake<'a>(
        &'a self,
        id: VehicleId,
    ) -> Pin<Box<dyn Future<Output = Result<ConnectivityState, GatewayError>> + Send + 'a>>;
}
