use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use voltgate_automation::{AutomationEngine, EngineConfig, RuleStore};
use voltgate_core::TracingSink;

use crate::cli::MonitorArgs;
use crate::error::CliError;

use super::AppContext;

/// Runs the automation engine in the foreground until ctrl-c.
pub async fn run(
    ctx: &AppContext,
    vehicle_flag: Option<&str>,
    args: &MonitorArgs,
) -> Result<(), CliError> {
    let vehicle = super::resolve_vehicle(ctx, vehicle_flag).await?;
    let store = Arc::new(RuleStore::open(Arc::clone(&ctx.config)).await?);

    if !ctx.gateway.has_available_provider() {
        warn!("no provider has an api key; every pass will fail until one is configured");
    }

    let mut config = EngineConfig::from_settings(&ctx.settings);
    if let Some(secs) = args.interval_secs {
        let interval = Duration::from_secs(secs.max(1));
        config.state_pass_interval = interval;
        config.time_pass_interval = interval;
    }

    let engine = Arc::new(AutomationEngine::new(
        Arc::clone(&ctx.gateway),
        store,
        Arc::new(TracingSink),
        vehicle.clone(),
        config,
    ));

    engine.start();
    info!(vehicle = %vehicle, "monitoring; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    engine.stop();

    Ok(())
}
