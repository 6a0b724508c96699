use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use voltgate_automation::{AutomationEngine, EngineConfig, RuleStore};
use voltgate_core::{Action, GatewayError, RuleId, TracingSink, Trigger};

use crate::cli::{RuleIdArgs, RulesArgs, RulesCommand};
use crate::error::CliError;

use super::AppContext;

/// On-disk shape accepted by `rules add`.
#[derive(Debug, Deserialize)]
struct RuleDefinition {
    name: String,
    #[serde(default)]
    description: String,
    trigger: Trigger,
    actions: Vec<Action>,
}

pub async fn run(
    ctx: &AppContext,
    vehicle_flag: Option<&str>,
    args: &RulesArgs,
) -> Result<Value, CliError> {
    let store = Arc::new(RuleStore::open(Arc::clone(&ctx.config)).await?);

    match &args.command {
        RulesCommand::List => {
            let rules = store.list().await;
            Ok(json!({ "rules": rules }))
        }
        RulesCommand::Show(id_args) => {
            let rule = store
                .get(&parse_id(id_args)?)
                .await
                .ok_or_else(|| unknown_rule(&id_args.id))?;
            Ok(serde_json::to_value(rule)?)
        }
        RulesCommand::Add(add_args) => {
            let content = tokio::fs::read_to_string(&add_args.file).await?;
            let definition: RuleDefinition = serde_json::from_str(&content)?;
            let rule = store
                .create(
                    definition.name,
                    definition.description,
                    definition.trigger,
                    definition.actions,
                )
                .await?;
            Ok(serde_json::to_value(rule)?)
        }
        RulesCommand::Enable(id_args) => {
            let rule = store.enable(&parse_id(id_args)?).await?;
            Ok(serde_json::to_value(rule)?)
        }
        RulesCommand::Disable(id_args) => {
            let rule = store.disable(&parse_id(id_args)?).await?;
            Ok(serde_json::to_value(rule)?)
        }
        RulesCommand::Delete(id_args) => {
            let id = parse_id(id_args)?;
            store.delete(&id).await?;
            Ok(json!({ "deleted": id }))
        }
        RulesCommand::Trigger(id_args) => {
            let id = parse_id(id_args)?;
            let vehicle = super::resolve_vehicle(ctx, vehicle_flag).await?;
            let engine = AutomationEngine::new(
                Arc::clone(&ctx.gateway),
                Arc::clone(&store),
                Arc::new(TracingSink),
                vehicle,
                EngineConfig::from_settings(&ctx.settings),
            );
            engine.assert_external_trigger(&id).await?;
            Ok(json!({ "triggered": id }))
        }
    }
}

fn parse_id(args: &RuleIdArgs) -> Result<RuleId, CliError> {
    Ok(args.id.parse()?)
}

fn unknown_rule(id: &str) -> CliError {
    GatewayError::invalid_request(format!("no automation rule with id {id}")).into()
}
