use serde_json::Value;

use crate::cli::StatusArgs;
use crate::error::CliError;

use super::AppContext;

pub async fn run(
    ctx: &AppContext,
    vehicle_flag: Option<&str>,
    args: &StatusArgs,
) -> Result<Value, CliError> {
    let vehicle = super::resolve_vehicle(ctx, vehicle_flag).await?;
    let snapshot = ctx.gateway.vehicle_data(&vehicle, !args.no_cache).await?;

    Ok(serde_json::to_value(snapshot)?)
}
