use serde_json::{json, Value};

use crate::error::CliError;

use super::AppContext;

pub async fn run(ctx: &AppContext, vehicle_flag: Option<&str>) -> Result<Value, CliError> {
    let vehicle = super::resolve_vehicle(ctx, vehicle_flag).await?;
    let state = ctx.gateway.wake(&vehicle).await?;

    Ok(json!({ "vehicle": vehicle, "state": state }))
}
