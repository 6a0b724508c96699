mod command;
mod monitor;
mod providers;
mod rules;
mod status;
mod vehicles;
mod wake;

use std::sync::Arc;

use serde_json::Value;

use voltgate_core::{
    ConfigStore, GatewayBuilder, GatewayError, GatewaySettings, JsonFileStore, VehicleGateway,
    VehicleId,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Shared handles every subcommand works against.
pub struct AppContext {
    pub settings: GatewaySettings,
    pub config: Arc<dyn ConfigStore>,
    pub gateway: Arc<VehicleGateway>,
}

/// Builds the gateway from config and dispatches to the subcommand.
/// `None` means the command rendered (or logged) its own output.
pub async fn run(cli: &Cli) -> Result<Option<Value>, CliError> {
    let store = match &cli.config {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::from_env(),
    };
    let config: Arc<dyn ConfigStore> = Arc::new(store);
    let settings = config.load().await?.settings;

    let gateway = Arc::new(
        GatewayBuilder::new(settings.clone())
            .mock_mode(cli.mock)
            .build(),
    );
    let ctx = AppContext {
        settings,
        config,
        gateway,
    };
    let vehicle_flag = cli.vehicle.as_deref();

    let value = match &cli.command {
        Command::Status(args) => Some(status::run(&ctx, vehicle_flag, args).await?),
        Command::Vehicles => Some(vehicles::run(&ctx).await?),
        Command::Command(args) => Some(command::run(&ctx, vehicle_flag, args).await?),
        Command::Wake => Some(wake::run(&ctx, vehicle_flag).await?),
        Command::Rules(args) => Some(rules::run(&ctx, vehicle_flag, args).await?),
        Command::Monitor(args) => {
            monitor::run(&ctx, vehicle_flag, args).await?;
            None
        }
        Command::Providers => Some(providers::run(&ctx)?),
    };

    Ok(value)
}

/// The explicit flag wins, then the configured default vehicle, then the
/// first vehicle the provider reports.
pub async fn resolve_vehicle(
    ctx: &AppContext,
    flag: Option<&str>,
) -> Result<VehicleId, CliError> {
    if let Some(raw) = flag {
        return Ok(VehicleId::parse(raw)?);
    }
    if let Some(id) = &ctx.settings.default_vehicle {
        return Ok(id.clone());
    }

    let vehicles = ctx.gateway.vehicles().await?;
    vehicles
        .into_iter()
        .map(|vehicle| vehicle.id)
        .next()
        .ok_or_else(|| {
            GatewayError::invalid_request("no vehicle is configured and the provider reported none")
                .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_context(settings: GatewaySettings) -> AppContext {
        let config: Arc<dyn ConfigStore> =
            Arc::new(voltgate_core::InMemoryConfigStore::with_settings(settings.clone()));
        let gateway = Arc::new(GatewayBuilder::new(settings.clone()).mock_mode(true).build());
        AppContext {
            settings,
            config,
            gateway,
        }
    }

    #[tokio::test]
    async fn vehicle_flag_overrides_the_configured_default() {
        let settings = GatewaySettings {
            default_vehicle: Some(VehicleId::parse("configured-1").expect("valid id")),
            ..GatewaySettings::default()
        };
        let ctx = mock_context(settings);

        let resolved = resolve_vehicle(&ctx, Some("flagged-1"))
            .await
            .expect("resolves");
        assert_eq!(resolved.as_str(), "flagged-1");

        let fallback = resolve_vehicle(&ctx, None).await.expect("resolves");
        assert_eq!(fallback.as_str(), "configured-1");
    }

    #[tokio::test]
    async fn without_config_the_first_provider_vehicle_is_used() {
        let ctx = mock_context(GatewaySettings::default());

        let resolved = resolve_vehicle(&ctx, None).await.expect("resolves");
        assert_eq!(resolved.as_str(), "5YJ3E1EA7KF000001");
    }
}
