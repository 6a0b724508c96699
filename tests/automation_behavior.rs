//! Behavior-driven tests for the automation engine.
//!
//! These tests wire the gateway, rule store and engine together over
//! scripted providers and drive the passes at explicit instants, so the
//! firing semantics can be asserted without waiting on wall-clock timers.

use std::time::Duration;

use time::OffsetDateTime;

use voltgate_automation::{AutomationEngine, EngineConfig, RuleStore};
use voltgate_core::config::ConfigStore;
use voltgate_core::{
    Action, AutomationRule, GatewayBuilder, GatewaySettings, InMemoryConfigStore,
    NotificationPriority, ProviderKind, RecordingSink, Trigger, TriggerFrequency, UtcDateTime,
};
use voltgate_tests::{scripted_vehicle, Arc, ScriptedProvider};

fn at(stamp: &str) -> OffsetDateTime {
    UtcDateTime::parse(stamp)
        .expect("valid timestamp")
        .into_inner()
}

fn notify(title: &str, message: &str) -> Action {
    Action::Notification {
        title: title.to_owned(),
        message: message.to_owned(),
        priority: NotificationPriority::Normal,
    }
}

fn state_rule(
    name: &str,
    condition: &str,
    frequency: TriggerFrequency,
    actions: Vec<Action>,
) -> AutomationRule {
    AutomationRule::new(
        name,
        "",
        Trigger::VehicleState {
            condition: condition.to_owned(),
            frequency,
        },
        actions,
    )
    .expect("valid rule")
}

/// Builds engine, sink and store over one scripted provider, with the
/// given rules persisted up front so the starter seeds stay out of the
/// way.
async fn rig_over(
    provider: Arc<ScriptedProvider>,
    rules: Vec<AutomationRule>,
) -> (AutomationEngine, Arc<RecordingSink>, Arc<RuleStore>) {
    let config = Arc::new(InMemoryConfigStore::new());
    config.save_rules(rules).await.expect("rules persist");
    let store = Arc::new(RuleStore::open(config).await.expect("store opens"));

    let gateway = Arc::new(
        GatewayBuilder::new(GatewaySettings::default())
            .with_providers(vec![provider])
            .build(),
    );
    let sink = Arc::new(RecordingSink::new());
    let engine = AutomationEngine::new(
        gateway,
        Arc::clone(&store),
        sink.clone(),
        scripted_vehicle(),
        EngineConfig {
            inter_action_delay: Duration::from_millis(1),
            ..EngineConfig::default()
        },
    );
    (engine, sink, store)
}

// =============================================================================
// Automation: Trigger Frequency
// =============================================================================

#[tokio::test]
async fn when_battery_stays_low_system_fires_once_per_trip() {
    // Given: A vehicle stuck at 15% and a once-per-trip low battery rule
    let provider = ScriptedProvider::with_battery(ProviderKind::Tessie, 15.0);
    let rule = state_rule(
        "Low battery alert",
        "battery_level < 20",
        TriggerFrequency::OncePerTrip,
        vec![notify("Low battery", "plug in soon")],
    );
    let (engine, sink, _store) = rig_over(provider, vec![rule]).await;
    let base = at("2024-03-04T08:00:00Z");

    // When: The state pass keeps running across one hour
    engine.run_state_pass(base).await;
    engine.run_state_pass(base + time::Duration::minutes(5)).await;
    engine.run_state_pass(base + time::Duration::minutes(59)).await;

    // Then: The rule fired exactly once within that hour
    assert_eq!(sink.len(), 1);

    // And: Once the cooldown lapses the rule is armed again
    engine.run_state_pass(base + time::Duration::minutes(61)).await;
    assert_eq!(sink.len(), 2);
}

// =============================================================================
// Automation: Enablement
// =============================================================================

#[tokio::test]
async fn when_rule_is_disabled_system_stays_quiet_until_reenabled() {
    // Given: A matching rule that is switched off
    let provider = ScriptedProvider::with_battery(ProviderKind::Tessie, 15.0);
    let mut rule = state_rule(
        "Low battery alert",
        "battery_level < 20",
        TriggerFrequency::EveryPass,
        vec![notify("Low battery", "plug in soon")],
    );
    rule.enabled = false;
    let (engine, sink, store) = rig_over(provider, vec![rule]).await;

    // When: A pass runs while the rule is disabled
    engine.run_state_pass(at("2024-03-04T08:00:00Z")).await;

    // Then: Nothing fires despite the matching condition
    assert!(sink.is_empty());

    // When: The rule is re-enabled and the next pass runs
    let id = store.list().await[0].id;
    store.enable(&id).await.expect("rule re-enabled");
    engine.run_state_pass(at("2024-03-04T08:01:00Z")).await;

    // Then: It fires on that pass
    assert_eq!(sink.len(), 1);
}

// =============================================================================
// Automation: Failure Isolation
// =============================================================================

#[tokio::test]
async fn when_the_snapshot_fetch_fails_system_skips_the_pass_and_recovers() {
    // Given: A provider that is down and an every-pass rule
    let provider = ScriptedProvider::failing(ProviderKind::Tessie);
    let rule = state_rule(
        "Battery watch",
        "battery_level < 60",
        TriggerFrequency::EveryPass,
        vec![notify("Watch", "battery is getting low")],
    );
    let (engine, sink, _store) = rig_over(provider.clone(), vec![rule]).await;

    // When: A pass runs against the dead upstream
    engine.run_state_pass(at("2024-03-04T08:00:00Z")).await;

    // Then: The pass is skipped without firing or failing
    assert!(sink.is_empty());

    // When: The provider recovers
    provider.set_failing(false);
    engine.run_state_pass(at("2024-03-04T08:01:00Z")).await;

    // Then: The rule fires on the next pass
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn when_one_rule_fails_system_still_runs_the_remaining_rules() {
    // Given: A vehicle that declines commands, and two rules due together
    let provider = ScriptedProvider::rejecting_commands(ProviderKind::Tessie);
    let honk = state_rule(
        "Honk on low",
        "battery_level < 60",
        TriggerFrequency::EveryPass,
        vec![Action::VehicleCommand {
            command: String::from("honk_horn"),
            params: serde_json::Value::Null,
        }],
    );
    let healthy = state_rule(
        "Report in",
        "battery_level < 60",
        TriggerFrequency::EveryPass,
        vec![notify("Healthy", "still here")],
    );
    let (engine, sink, _store) = rig_over(provider, vec![honk, healthy]).await;

    // When: The state pass runs
    engine.run_state_pass(at("2024-03-04T08:00:00Z")).await;

    // Then: The failed rule surfaces as a high-priority notification and
    // the second rule still ran
    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].title, "Automation failed");
    assert_eq!(delivered[0].priority, NotificationPriority::High);
    assert!(
        delivered[0].message.contains("Honk on low"),
        "failure should name the rule: {}",
        delivered[0].message
    );
    assert_eq!(delivered[1].title, "Healthy");
}

// =============================================================================
// Automation: Time-of-Day Matching
// =============================================================================

#[tokio::test]
async fn when_the_scheduled_minute_arrives_system_fires_exactly_once() {
    // Given: A rule scheduled for 06:45
    let provider = ScriptedProvider::healthy(ProviderKind::Tessie);
    let rule = AutomationRule::new(
        "Morning ping",
        "",
        Trigger::TimeOfDay {
            at: String::from("06:45"),
        },
        vec![notify("Morning", "time to go")],
    )
    .expect("valid rule");
    let (engine, sink, _store) = rig_over(provider.clone(), vec![rule]).await;

    // When: Passes run just before, inside and just after the minute
    engine.run_time_pass(at("2024-03-04T06:44:59Z")).await;
    assert!(sink.is_empty());

    engine.run_time_pass(at("2024-03-04T06:45:10Z")).await;
    engine.run_time_pass(at("2024-03-04T06:45:50Z")).await;
    engine.run_time_pass(at("2024-03-04T06:46:10Z")).await;

    // Then: The rule fired exactly once for that minute
    assert_eq!(sink.len(), 1);

    // And: A plain notification never needed a vehicle snapshot
    assert!(provider.calls().is_empty());
}
