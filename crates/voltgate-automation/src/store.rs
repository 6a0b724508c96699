//! Rule collection with write-through persistence.
//!
//! [`RuleStore`] keeps the automation rules in memory and writes the full
//! collection back to the configuration store on every mutation, before
//! the mutating call returns. The persisted copy therefore never trails
//! the in-memory one by more than the change in flight.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use voltgate_core::config::ConfigStore;
use voltgate_core::{
    Action, AutomationRule, ClimateMode, DayOfWeek, GatewayError, NotificationPriority, RuleId,
    Trigger, TriggerFrequency,
};

/// Partial update for one rule. `None` fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub trigger: Option<Trigger>,
    pub actions: Option<Vec<Action>>,
}

impl RuleUpdate {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }
}

pub struct RuleStore {
    config: Arc<dyn ConfigStore>,
    rules: RwLock<Vec<AutomationRule>>,
}

impl RuleStore {
    /// Loads the persisted rules, seeding the starter rules when the
    /// collection is empty. Existing rules are never overwritten, so user
    /// edits to the starters survive restarts.
    pub async fn open(config: Arc<dyn ConfigStore>) -> Result<Self, GatewayError> {
        let data = config.load().await?;

        let rules = if data.rules.is_empty() {
            let seeded = built_in_rules();
            info!(count = seeded.len(), "seeding built-in automation rules");
            config.save_rules(seeded.clone()).await?;
            seeded
        } else {
            debug!(count = data.rules.len(), "loaded automation rules");
            data.rules
        };

        Ok(Self {
            config,
            rules: RwLock::new(rules),
        })
    }

    pub async fn list(&self) -> Vec<AutomationRule> {
        self.rules.read().await.clone()
    }

    pub async fn get(&self, id: &RuleId) -> Option<AutomationRule> {
        self.rules
            .read()
            .await
            .iter()
            .find(|rule| rule.id == *id)
            .cloned()
    }

    /// Creates a user rule with a fresh identity and persists the
    /// collection.
    pub async fn create(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        trigger: Trigger,
        actions: Vec<Action>,
    ) -> Result<AutomationRule, GatewayError> {
        let rule = AutomationRule::new(name, description, trigger, actions)?;

        let mut rules = self.rules.write().await;
        let mut next = rules.clone();
        next.push(rule.clone());
        self.config.save_rules(next.clone()).await?;
        *rules = next;

        info!(rule = %rule.name, id = %rule.id, "automation rule created");
        Ok(rule)
    }

    /// Applies a partial update and persists the collection.
    pub async fn update(&self, id: &RuleId, update: RuleUpdate) -> Result<AutomationRule, GatewayError> {
        let mut rules = self.rules.write().await;
        let mut next = rules.clone();
        let rule = next
            .iter_mut()
            .find(|rule| rule.id == *id)
            .ok_or_else(|| unknown_rule(id))?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(GatewayError::invalid_request("rule name must not be empty"));
            }
            rule.name = name;
        }
        if let Some(description) = update.description {
            rule.description = description;
        }
        if let Some(enabled) = update.enabled {
            rule.enabled = enabled;
        }
        if let Some(trigger) = update.trigger {
            rule.trigger = trigger;
        }
        if let Some(actions) = update.actions {
            rule.actions = actions;
        }
        let updated = rule.clone();

        self.config.save_rules(next.clone()).await?;
        *rules = next;

        debug!(rule = %updated.name, id = %updated.id, "automation rule updated");
        Ok(updated)
    }

    pub async fn enable(&self, id: &RuleId) -> Result<AutomationRule, GatewayError> {
        self.update(id, RuleUpdate::enabled(true)).await
    }

    pub async fn disable(&self, id: &RuleId) -> Result<AutomationRule, GatewayError> {
        self.update(id, RuleUpdate::enabled(false)).await
    }

    /// Deletes a rule and persists the collection. The persisted copy is
    /// written before the in-memory one is swapped, so a crash in between
    /// cannot resurrect the rule on reload.
    pub async fn delete(&self, id: &RuleId) -> Result<(), GatewayError> {
        let mut rules = self.rules.write().await;
        let mut next = rules.clone();
        let before = next.len();
        next.retain(|rule| rule.id != *id);
        if next.len() == before {
            return Err(unknown_rule(id));
        }

        self.config.save_rules(next.clone()).await?;
        *rules = next;

        info!(id = %id, "automation rule deleted");
        Ok(())
    }
}

fn unknown_rule(id: &RuleId) -> GatewayError {
    GatewayError::invalid_request(format!("no automation rule with id {id}"))
}

/// Starter rules seeded into an empty store.
fn built_in_rules() -> Vec<AutomationRule> {
    let mut rules = Vec::new();

    if let Ok(mut rule) = AutomationRule::new(
        "Low battery alert",
        "Notify when the battery drops below 20%",
        Trigger::VehicleState {
            condition: String::from("battery_level < 20"),
            frequency: TriggerFrequency::OncePerTrip,
        },
        vec![Action::Notification {
            title: String::from("Low battery"),
            message: String::from("Battery is at {battery_level}%, plug in soon"),
            priority: NotificationPriority::High,
        }],
    ) {
        rule.custom = false;
        rules.push(rule);
    }

    if let Ok(mut rule) = AutomationRule::new(
        "Overnight charging check",
        "Evening reminder when the battery is too low for the morning",
        Trigger::TimeOfDay {
            at: String::from("21:30"),
        },
        vec![Action::ChargingCheck {
            minimum_battery: 50.0,
        }],
    ) {
        rule.custom = false;
        rules.push(rule);
    }

    if let Ok(mut rule) = AutomationRule::new(
        "Morning pre-heat",
        "Warm the cabin before the commute",
        Trigger::Schedule {
            at: String::from("07:15"),
            days: vec![
                DayOfWeek::Mon,
                DayOfWeek::Tue,
                DayOfWeek::Wed,
                DayOfWeek::Thu,
                DayOfWeek::Fri,
            ],
        },
        vec![Action::ClimateControl {
            mode: ClimateMode::Start,
            target_temp: Some(21.0),
        }],
    ) {
        rule.custom = false;
        rule.enabled = false;
        rules.push(rule);
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltgate_core::InMemoryConfigStore;

    fn notification(title: &str) -> Vec<Action> {
        vec![Action::Notification {
            title: title.to_owned(),
            message: String::from("hello"),
            priority: NotificationPriority::Normal,
        }]
    }

    fn state_trigger(condition: &str) -> Trigger {
        Trigger::VehicleState {
            condition: condition.to_owned(),
            frequency: TriggerFrequency::EveryPass,
        }
    }

    #[tokio::test]
    async fn empty_store_is_seeded_with_starter_rules() {
        let config = Arc::new(InMemoryConfigStore::new());
        let store = RuleStore::open(config.clone()).await.expect("store opens");

        let rules = store.list().await;
        assert_eq!(rules.len(), 3);
        assert!(rules.iter().all(|rule| !rule.custom));
        // Seeds are persisted immediately.
        assert_eq!(config.current().rules.len(), 3);
    }

    #[tokio::test]
    async fn populated_store_is_not_reseeded() {
        let config = Arc::new(InMemoryConfigStore::new());
        let custom = AutomationRule::new(
            "Mine",
            "",
            state_trigger("battery_level < 50"),
            notification("Mine"),
        )
        .expect("valid rule");
        config
            .save_rules(vec![custom.clone()])
            .await
            .expect("persist");

        let store = RuleStore::open(config).await.expect("store opens");
        let rules = store.list().await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, custom.id);
    }

    #[tokio::test]
    async fn create_assigns_identity_and_persists() {
        let config = Arc::new(InMemoryConfigStore::new());
        let store = RuleStore::open(config.clone()).await.expect("store opens");

        let rule = store
            .create(
                "Garage arrival",
                "Unlock on arrival",
                state_trigger("battery_level > 0"),
                notification("Arrived"),
            )
            .await
            .expect("rule created");

        assert!(rule.custom);
        assert!(rule.enabled);
        assert!(store.get(&rule.id).await.is_some());
        assert!(config
            .current()
            .rules
            .iter()
            .any(|persisted| persisted.id == rule.id));
    }

    #[tokio::test]
    async fn update_touches_only_the_supplied_fields() {
        let config = Arc::new(InMemoryConfigStore::new());
        let store = RuleStore::open(config).await.expect("store opens");
        let rule = store
            .create("One", "first", state_trigger("battery_level < 10"), notification("One"))
            .await
            .expect("rule created");

        let updated = store
            .update(
                &rule.id,
                RuleUpdate {
                    name: Some(String::from("Renamed")),
                    ..RuleUpdate::default()
                },
            )
            .await
            .expect("rule updated");

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.description, "first");
        assert_eq!(updated.trigger, rule.trigger);
        assert_eq!(updated.enabled, rule.enabled);
    }

    #[tokio::test]
    async fn enable_and_disable_flip_only_the_flag() {
        let config = Arc::new(InMemoryConfigStore::new());
        let store = RuleStore::open(config).await.expect("store opens");
        let rule = store
            .create("Flip", "", state_trigger("battery_level < 10"), notification("Flip"))
            .await
            .expect("rule created");

        let disabled = store.disable(&rule.id).await.expect("disabled");
        assert!(!disabled.enabled);
        let enabled = store.enable(&rule.id).await.expect("enabled");
        assert!(enabled.enabled);
    }

    #[tokio::test]
    async fn delete_removes_from_memory_and_the_persisted_copy() {
        let config = Arc::new(InMemoryConfigStore::new());
        let store = RuleStore::open(config.clone()).await.expect("store opens");
        let rule = store
            .create("Doomed", "", state_trigger("battery_level < 10"), notification("Doomed"))
            .await
            .expect("rule created");

        store.delete(&rule.id).await.expect("deleted");

        assert!(store.get(&rule.id).await.is_none());
        assert!(config
            .current()
            .rules
            .iter()
            .all(|persisted| persisted.id != rule.id));

        let error = store.delete(&rule.id).await.expect_err("second delete fails");
        assert!(error.message().contains("no automation rule"));
    }
}
