use serde_json::Value;

use crate::error::CliError;

use super::AppContext;

/// Availability and budget matrix. Reads local state only; no provider
/// call is made.
pub fn run(ctx: &AppContext) -> Result<Value, CliError> {
    let status = ctx.gateway.status();

    Ok(serde_json::to_value(status)?)
}
