use serde_json::{json, Value};

use crate::error::CliError;

use super::AppContext;

pub async fn run(ctx: &AppContext) -> Result<Value, CliError> {
    let vehicles = ctx.gateway.vehicles().await?;

    Ok(json!({ "vehicles": vehicles }))
}
