//! The monitoring loop that turns rules into actions.
//!
//! Two independent periodic passes share one engine: the vehicle-state
//! pass evaluates condition triggers against the latest snapshot, the
//! time-of-day pass matches wall-clock triggers. Passes never overlap
//! with themselves; a slow pass delays its next tick instead. Both
//! accept the current instant as a parameter so tests can drive them
//! deterministically without a scheduler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use voltgate_core::{
    parse_time_of_day, Action, AutomationRule, ClimateMode, DayOfWeek, GatewayError,
    GatewaySettings, Notification, NotificationPriority, NotificationSink, RuleId, Trigger,
    TriggerFrequency, VehicleGateway, VehicleId, VehicleSnapshot,
};

use crate::condition;
use crate::store::RuleStore;

/// A time-of-day trigger fires at most once within the matching minute.
const MATCHING_MINUTE_GUARD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub state_pass_interval: Duration,
    pub time_pass_interval: Duration,
    /// Pause between consecutive actions of one rule.
    pub inter_action_delay: Duration,
    /// Suppression window for `once_per_trip` triggers.
    pub once_per_trip_cooldown: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_pass_interval: Duration::from_secs(60),
            time_pass_interval: Duration::from_secs(60),
            inter_action_delay: Duration::from_millis(500),
            once_per_trip_cooldown: Duration::from_secs(60 * 60),
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            state_pass_interval: Duration::from_secs(settings.state_pass_interval_secs.max(1)),
            time_pass_interval: Duration::from_secs(settings.time_pass_interval_secs.max(1)),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy)]
enum PassKind {
    VehicleState,
    TimeOfDay,
}

pub struct AutomationEngine {
    gateway: Arc<VehicleGateway>,
    store: Arc<RuleStore>,
    notifier: Arc<dyn NotificationSink>,
    vehicle: VehicleId,
    config: EngineConfig,
    /// Last trigger instant per rule. Transient; reset on restart.
    last_triggered: Mutex<HashMap<RuleId, OffsetDateTime>>,
    running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AutomationEngine {
    pub fn new(
        gateway: Arc<VehicleGateway>,
        store: Arc<RuleStore>,
        notifier: Arc<dyn NotificationSink>,
        vehicle: VehicleId,
        config: EngineConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            notifier,
            vehicle,
            config,
            last_triggered: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the two periodic passes. Idempotent while running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            state_pass = ?self.config.state_pass_interval,
            time_pass = ?self.config.time_pass_interval,
            "automation engine started"
        );

        let mut tasks = self.tasks.lock().expect("engine task lock is not poisoned");
        tasks.push(self.spawn_pass(PassKind::VehicleState));
        tasks.push(self.spawn_pass(PassKind::TimeOfDay));
    }

    /// Stops and aborts the background passes.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        for task in self
            .tasks
            .lock()
            .expect("engine task lock is not poisoned")
            .drain(..)
        {
            task.abort();
        }
        info!("automation engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn spawn_pass(self: &Arc<Self>, kind: PassKind) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let period = match kind {
                PassKind::VehicleState => engine.config.state_pass_interval,
                PassKind::TimeOfDay => engine.config.time_pass_interval,
            };
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !engine.running.load(Ordering::SeqCst) {
                    break;
                }
                let now = OffsetDateTime::now_utc();
                match kind {
                    PassKind::VehicleState => engine.run_state_pass(now).await,
                    PassKind::TimeOfDay => engine.run_time_pass(now).await,
                }
            }
        })
    }

    /// Evaluates all enabled vehicle-state rules against one fresh-enough
    /// snapshot. A malformed condition counts as "no match" and is logged
    /// instead of failing the pass.
    pub async fn run_state_pass(&self, now: OffsetDateTime) {
        let rules = self.store.list().await;
        let state_rules: Vec<&AutomationRule> = rules
            .iter()
            .filter(|rule| {
                rule.enabled && matches!(rule.trigger, Trigger::VehicleState { .. })
            })
            .collect();
        if state_rules.is_empty() {
            return;
        }

        let snapshot = match self.gateway.vehicle_data(&self.vehicle, true).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(error = %error, "vehicle-state pass skipped; no snapshot available");
                return;
            }
        };

        for rule in state_rules {
            let Trigger::VehicleState { condition, frequency } = &rule.trigger else {
                continue;
            };

            let matched = match condition::evaluate(condition, &snapshot) {
                Ok(matched) => matched,
                Err(error) => {
                    warn!(
                        rule = %rule.name,
                        error = %error,
                        "condition not understood; treating as no match"
                    );
                    false
                }
            };
            if !matched {
                continue;
            }
            if self.suppressed_by_frequency(rule.id, *frequency, now) {
                debug!(rule = %rule.name, "trigger suppressed by once-per-trip cooldown");
                continue;
            }

            self.fire_rule(rule, Some(&snapshot), now).await;
        }
    }

    /// Fires enabled time-of-day and schedule rules whose configured
    /// minute matches `now`, at most once per matching minute.
    pub async fn run_time_pass(&self, now: OffsetDateTime) {
        let today = DayOfWeek::from_weekday(now.weekday());

        for rule in self.store.list().await {
            if !rule.enabled {
                continue;
            }
            let at = match &rule.trigger {
                Trigger::TimeOfDay { at } => at,
                Trigger::Schedule { at, days } => {
                    if !days.contains(&today) {
                        continue;
                    }
                    at
                }
                _ => continue,
            };

            let (hour, minute) = match parse_time_of_day(at) {
                Ok(parsed) => parsed,
                Err(error) => {
                    warn!(rule = %rule.name, error = %error, "unparseable trigger time; skipping");
                    continue;
                }
            };
            if (now.hour(), now.minute()) != (hour, minute) {
                continue;
            }
            if self.fired_within(rule.id, now, MATCHING_MINUTE_GUARD) {
                continue;
            }

            self.fire_rule(&rule, None, now).await;
        }
    }

    /// Runs the actions of a location or calendar rule on behalf of an
    /// external integration that observed the trigger fire. The engine
    /// never evaluates those triggers itself.
    pub async fn assert_external_trigger(&self, id: &RuleId) -> Result<(), GatewayError> {
        let rule = self
            .store
            .get(id)
            .await
            .ok_or_else(|| GatewayError::invalid_request(format!("no automation rule with id {id}")))?;

        if !rule.enabled {
            return Err(GatewayError::invalid_request(format!(
                "rule `{}` is disabled",
                rule.name
            )));
        }
        if !rule.trigger.is_externally_asserted() {
            return Err(GatewayError::invalid_request(format!(
                "rule `{}` has a {} trigger, which the engine evaluates itself",
                rule.name,
                rule.trigger.kind()
            )));
        }

        self.fire_rule(&rule, None, OffsetDateTime::now_utc()).await;
        Ok(())
    }

    /// Executes a rule's actions in order. The first failing action stops
    /// this rule and raises a failure notification; other rules in the
    /// same pass are unaffected.
    async fn fire_rule(&self, rule: &AutomationRule, snapshot: Option<&VehicleSnapshot>, now: OffsetDateTime) {
        info!(rule = %rule.name, "automation rule triggered");
        self.mark_triggered(rule.id, now);

        let mut snapshot = snapshot.cloned();
        if snapshot.is_none() && rule.actions.iter().any(action_reads_snapshot) {
            match self.gateway.vehicle_data(&self.vehicle, true).await {
                Ok(fetched) => snapshot = Some(fetched),
                Err(error) => {
                    warn!(rule = %rule.name, error = %error, "no snapshot available for actions");
                }
            }
        }

        for (index, action) in rule.actions.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.inter_action_delay).await;
            }
            if let Err(error) = self.execute_action(action, snapshot.as_ref()).await {
                warn!(
                    rule = %rule.name,
                    action = action.kind(),
                    error = %error,
                    "automation action failed"
                );
                self.notifier
                    .deliver(Notification::new(
                        "Automation failed",
                        format!("rule `{}`: {}", rule.name, error.message()),
                        NotificationPriority::High,
                    ))
                    .await;
                break;
            }
        }
    }

    async fn execute_action(
        &self,
        action: &Action,
        snapshot: Option<&VehicleSnapshot>,
    ) -> Result<(), GatewayError> {
        match action {
            Action::VehicleCommand { command, params } => {
                self.run_command(command, params.clone()).await
            }
            Action::ClimateControl { mode, target_temp } => match mode {
                ClimateMode::Start => {
                    self.run_command("auto_conditioning_start", serde_json::Value::Null)
                        .await?;
                    if let Some(temp) = target_temp {
                        tokio::time::sleep(self.config.inter_action_delay).await;
                        self.run_command(
                            "set_temps",
                            serde_json::json!({ "driver_temp": temp, "passenger_temp": temp }),
                        )
                        .await?;
                    }
                    Ok(())
                }
                ClimateMode::Stop => {
                    self.run_command("auto_conditioning_stop", serde_json::Value::Null)
                        .await
                }
            },
            Action::ChargingCheck { minimum_battery } => {
                let snapshot = snapshot.ok_or_else(|| {
                    GatewayError::internal("no snapshot available for charging check")
                })?;
                let level = snapshot.charge.battery_level;
                if level < *minimum_battery {
                    self.notifier
                        .deliver(Notification::new(
                            "Charging check",
                            format!(
                                "Battery is at {level:.0}%, below the {minimum_battery:.0}% floor"
                            ),
                            NotificationPriority::Normal,
                        ))
                        .await;
                }
                Ok(())
            }
            Action::Notification {
                title,
                message,
                priority,
            } => {
                let rendered = substitute_placeholders(message, snapshot);
                self.notifier
                    .deliver(Notification::new(title, rendered, *priority))
                    .await;
                Ok(())
            }
        }
    }

    /// Dispatches one command through the gateway, treating a vehicle
    /// rejection as a failure.
    async fn run_command(&self, command: &str, params: serde_json::Value) -> Result<(), GatewayError> {
        let result = self
            .gateway
            .execute_command(&self.vehicle, command, params)
            .await?;
        if result.success {
            Ok(())
        } else {
            Err(GatewayError::command_execution(
                result
                    .reason
                    .unwrap_or_else(|| format!("vehicle rejected `{command}`")),
            ))
        }
    }

    fn suppressed_by_frequency(
        &self,
        id: RuleId,
        frequency: TriggerFrequency,
        now: OffsetDateTime,
    ) -> bool {
        match frequency {
            TriggerFrequency::EveryPass => false,
            TriggerFrequency::OncePerTrip => {
                self.fired_within(id, now, self.config.once_per_trip_cooldown)
            }
        }
    }

    fn fired_within(&self, id: RuleId, now: OffsetDateTime, window: Duration) -> bool {
        self.last_triggered
            .lock()
            .expect("trigger state lock is not poisoned")
            .get(&id)
            .is_some_and(|last| (now - *last) < window)
    }

    fn mark_triggered(&self, id: RuleId, now: OffsetDateTime) {
        self.last_triggered
            .lock()
            .expect("trigger state lock is not poisoned")
            .insert(id, now);
    }
}

fn action_reads_snapshot(action: &Action) -> bool {
    match action {
        Action::ChargingCheck { .. } => true,
        Action::Notification { message, .. } => message.contains('{'),
        Action::VehicleCommand { .. } | Action::ClimateControl { .. } => false,
    }
}

/// Replaces `{battery_level}`, `{range_km}` and `{vehicle}` in a message
/// template with live values. Without a snapshot the template passes
/// through unchanged.
fn substitute_placeholders(message: &str, snapshot: Option<&VehicleSnapshot>) -> String {
    let Some(snapshot) = snapshot else {
        return message.to_owned();
    };

    message
        .replace(
            "{battery_level}",
            &format!("{:.0}", snapshot.charge.battery_level),
        )
        .replace(
            "{range_km}",
            &format!("{:.0}", snapshot.charge.battery_range),
        )
        .replace("{vehicle}", &snapshot.display_name)
}
