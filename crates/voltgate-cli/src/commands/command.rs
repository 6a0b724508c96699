use serde_json::Value;

use crate::cli::CommandArgs;
use crate::error::CliError;

use super::AppContext;

pub async fn run(
    ctx: &AppContext,
    vehicle_flag: Option<&str>,
    args: &CommandArgs,
) -> Result<Value, CliError> {
    let vehicle = super::resolve_vehicle(ctx, vehicle_flag).await?;
    let params = match &args.params {
        Some(raw) => serde_json::from_str(raw)?,
        None => Value::Null,
    };

    let result = ctx
        .gateway
        .execute_command(&vehicle, &args.name, params)
        .await?;

    Ok(serde_json::to_value(result)?)
}
