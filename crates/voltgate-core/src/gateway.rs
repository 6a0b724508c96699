//! The gateway that fronts both vehicle providers.
//!
//! [`VehicleGateway`] owns the active provider, the rate limiter and the
//! snapshot cache, and is the only thing the rest of the system talks to.
//! Read and command paths share one resilience policy:
//!
//! 1. The first operation lazily authenticates providers in preference
//!    order and pins the first one that succeeds. A fully failed
//!    initialization is pinned too: every later operation fails fast
//!    with the same error until a gateway is rebuilt from changed
//!    configuration.
//! 2. Every upstream call first clears the rate limiter for the active
//!    provider, then runs. Any failure, including a local rate-limit
//!    denial, switches to the other provider (when it has credentials)
//!    and retries exactly once. The switch is sticky.
//! 3. Reads that still fail fall back to the last cached snapshot, stale
//!    or not, before surfacing the error.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::SnapshotCache;
use crate::config::GatewaySettings;
use crate::error::GatewayErrorKind;
use crate::http_client::{HttpClient, NoopHttpClient, ReqwestHttpClient};
use crate::provider::{CommandRequest, ProviderKind, VehicleProvider, VehicleSummary};
use crate::providers::{TessieProvider, TeslafiProvider};
use crate::rate_limit::{CommandClass, RateLimiter};
use crate::{ConnectivityState, GatewayError, UtcDateTime, VehicleId, VehicleSnapshot};

type ProviderFuture<T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send>>;

/// Outcome of a command dispatched through the gateway.
///
/// `success == false` means the vehicle itself rejected the command; a
/// transport or provider failure is reported as an error instead.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub command: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub raw: serde_json::Value,
    pub executed_at: UtcDateTime,
}

/// Point-in-time view of one provider for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub provider: ProviderKind,
    pub available: bool,
    pub active: bool,
    pub next_request_secs: u64,
    pub next_wake_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub active_provider: Option<ProviderKind>,
    pub configured: bool,
    pub providers: Vec<ProviderStatus>,
}

/// Outcome of lazy initialization. `Failed` is sticky; only building a
/// new gateway from changed configuration clears it.
enum InitState {
    Pending,
    Ready(usize),
    Failed(GatewayError),
}

pub struct VehicleGateway {
    /// Preference order; index 0 is tried first during initialization.
    providers: Vec<Arc<dyn VehicleProvider>>,
    init: Mutex<InitState>,
    settings: GatewaySettings,
    rate_limiter: Arc<RateLimiter>,
    cache: SnapshotCache,
}

impl VehicleGateway {
    pub fn builder(settings: GatewaySettings) -> GatewayBuilder {
        GatewayBuilder::new(settings)
    }

    /// Provider the gateway is currently pinned to, if initialized.
    pub fn active_provider(&self) -> Option<ProviderKind> {
        match *self
            .init
            .lock()
            .expect("gateway provider lock is not poisoned")
        {
            InitState::Ready(index) => Some(self.providers[index].kind()),
            _ => None,
        }
    }

    /// True if at least one provider has credentials configured.
    pub fn has_available_provider(&self) -> bool {
        self.providers.iter().any(|provider| provider.is_available())
    }

    /// True when the settings snapshot taken at build time names a
    /// provider, carries that provider's api key and sets a default
    /// vehicle.
    pub fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Snapshot of provider availability and budget state. Does not
    /// initialize the gateway or touch the network.
    pub fn status(&self) -> GatewayStatus {
        let active = self.active_provider();
        let providers = self
            .providers
            .iter()
            .map(|provider| {
                let kind = provider.kind();
                ProviderStatus {
                    provider: kind,
                    available: provider.is_available(),
                    active: active == Some(kind),
                    next_request_secs: self
                        .rate_limiter
                        .time_until_next_request(kind, CommandClass::General)
                        .as_secs(),
                    next_wake_secs: self
                        .rate_limiter
                        .time_until_next_request(kind, CommandClass::Wake)
                        .as_secs(),
                }
            })
            .collect();

        GatewayStatus {
            active_provider: active,
            configured: self.is_configured(),
            providers,
        }
    }

    /// Lists vehicles known to the active provider.
    pub async fn vehicles(&self) -> Result<Vec<VehicleSummary>, GatewayError> {
        self.with_failover(CommandClass::General, |provider| {
            Box::pin(async move { provider.list_vehicles().await })
        })
        .await
    }

    /// Returns a snapshot for one vehicle.
    ///
    /// With `use_cache` a fresh cached snapshot short-circuits the call
    /// entirely. When the upstream path fails on both providers, the last
    /// cached snapshot is served as a degraded answer if one exists.
    pub async fn vehicle_data(
        &self,
        id: &VehicleId,
        use_cache: bool,
    ) -> Result<VehicleSnapshot, GatewayError> {
        if use_cache {
            if let Some(cached) = self.cache.get(id).await {
                if cached.fresh {
                    debug!(vehicle = %id, "serving fresh cached snapshot");
                    return Ok(cached.snapshot);
                }
            }
        }

        let fetch_id = id.clone();
        let fetched = self
            .with_failover(CommandClass::General, move |provider| {
                let id = fetch_id.clone();
                Box::pin(async move { provider.vehicle_data(id).await })
            })
            .await;

        match fetched {
            Ok(snapshot) => {
                self.cache.put(snapshot.clone()).await;
                Ok(snapshot)
            }
            Err(error) => {
                if let Some(cached) = self.cache.get(id).await {
                    warn!(
                        vehicle = %id,
                        error = %error,
                        "serving last known snapshot after provider failure"
                    );
                    return Ok(cached.snapshot);
                }
                Err(error)
            }
        }
    }

    /// Executes a vehicle command, waking the vehicle first when the last
    /// known state says it is not online.
    ///
    /// The wake spends a wake-class budget token, the command itself a
    /// general one. A successful command does not update the cache; fetch
    /// a fresh snapshot afterwards to observe its effect.
    pub async fn execute_command(
        &self,
        id: &VehicleId,
        command: &str,
        params: serde_json::Value,
    ) -> Result<CommandResult, GatewayError> {
        let request = CommandRequest::new(id.clone(), command, params)?;

        self.ensure_awake(id).await?;

        let exec = request.clone();
        let outcome = self
            .with_failover(CommandClass::General, move |provider| {
                let request = exec.clone();
                Box::pin(async move { provider.execute_command(request).await })
            })
            .await?;

        if outcome.accepted {
            info!(vehicle = %id, command, "command accepted");
        } else {
            warn!(
                vehicle = %id,
                command,
                reason = outcome.reason.as_deref().unwrap_or("unspecified"),
                "command rejected by vehicle"
            );
        }

        Ok(CommandResult {
            command: request.command,
            success: outcome.accepted,
            reason: outcome.reason,
            raw: outcome.raw,
            executed_at: UtcDateTime::now(),
        })
    }

    /// Explicitly wakes a vehicle. Spends a wake-class budget token.
    pub async fn wake(&self, id: &VehicleId) -> Result<ConnectivityState, GatewayError> {
        let wake_id = id.clone();
        self.with_failover(CommandClass::Wake, move |provider| {
            let id = wake_id.clone();
            Box::pin(async move { provider.wake(id).await })
        })
        .await
    }

    async fn ensure_awake(&self, id: &VehicleId) -> Result<(), GatewayError> {
        let last_known = match self.cache.get(id).await {
            Some(cached) => cached.snapshot.connectivity,
            None => self.vehicle_data(id, true).await?.connectivity,
        };
        if last_known == ConnectivityState::Online {
            return Ok(());
        }

        info!(vehicle = %id, state = %last_known, "waking vehicle before command");
        let state = self.wake(id).await?;
        if state == ConnectivityState::Online {
            Ok(())
        } else {
            Err(GatewayError::command_execution(
                "vehicle did not come online after wake",
            ))
        }
    }

    /// Runs `operation` against the active provider with the shared
    /// resilience policy: rate-limit gate, one sticky failover, one retry.
    async fn with_failover<T, F>(&self, class: CommandClass, operation: F) -> Result<T, GatewayError>
    where
        F: Fn(Arc<dyn VehicleProvider>) -> ProviderFuture<T>,
    {
        let index = self.ensure_initialized().await?;

        let error = match self.run_once(index, class, &operation).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !failover_recovers(&error) {
            return Err(error);
        }
        let Some(retry_index) = self.switch_active(index, &error) else {
            // No second provider to try; a rate-limit denial keeps its
            // back-off hint, anything else is reported as exhaustion.
            if error.kind() == GatewayErrorKind::RateLimited {
                return Err(error);
            }
            let mut attempted = vec![describe_failure(self.providers[index].kind(), &error)];
            if self.providers.len() > 1 {
                let other = (index + 1) % self.providers.len();
                attempted.push(format!(
                    "{}: api key is not configured",
                    self.providers[other].kind()
                ));
            }
            return Err(GatewayError::no_provider_available(&attempted));
        };

        match self.run_once(retry_index, class, &operation).await {
            Ok(value) => Ok(value),
            Err(retry_error) => {
                warn!(error = %retry_error, "failover retry also failed");
                if retry_error.kind() == GatewayErrorKind::RateLimited {
                    return Err(retry_error);
                }
                Err(GatewayError::no_provider_available(&[
                    describe_failure(self.providers[index].kind(), &error),
                    describe_failure(self.providers[retry_index].kind(), &retry_error),
                ]))
            }
        }
    }

    async fn run_once<T, F>(
        &self,
        index: usize,
        class: CommandClass,
        operation: &F,
    ) -> Result<T, GatewayError>
    where
        F: Fn(Arc<dyn VehicleProvider>) -> ProviderFuture<T>,
    {
        let provider = Arc::clone(&self.providers[index]);
        let kind = provider.kind();

        if !self.rate_limiter.can_make_request(kind, class) {
            let wait = self.rate_limiter.time_until_next_request(kind, class);
            return Err(GatewayError::rate_limited(format!(
                "{kind} {} budget is exhausted; next call allowed in {}s",
                class.as_str(),
                wait.as_secs()
            )));
        }
        self.rate_limiter.record_request(kind, class);

        operation(provider).await
    }

    async fn ensure_initialized(&self) -> Result<usize, GatewayError> {
        {
            let state = self
                .init
                .lock()
                .expect("gateway provider lock is not poisoned");
            match &*state {
                InitState::Ready(index) => return Ok(*index),
                InitState::Failed(error) => return Err(error.clone()),
                InitState::Pending => {}
            }
        }

        if !self.has_available_provider() {
            return Err(self.pin_failed(GatewayError::not_configured(
                "no provider api key is set; configure tessie_api_key or teslafi_api_key",
            )));
        }

        let mut attempted = Vec::new();
        for (index, provider) in self.providers.iter().enumerate() {
            let kind = provider.kind();
            if !provider.is_available() {
                attempted.push(format!("{kind}: api key is not configured"));
                continue;
            }

            match provider.authenticate().await {
                Ok(()) => {
                    let mut state = self
                        .init
                        .lock()
                        .expect("gateway provider lock is not poisoned");
                    // A concurrent caller may have initialized meanwhile;
                    // keep whichever provider won.
                    if let InitState::Ready(existing) = *state {
                        return Ok(existing);
                    }
                    *state = InitState::Ready(index);
                    info!(provider = %kind, "vehicle gateway initialized");
                    return Ok(index);
                }
                Err(error) => {
                    warn!(provider = %kind, error = %error, "provider authentication failed");
                    attempted.push(format!("{kind}: {}", error.message()));
                }
            }
        }

        Err(self.pin_failed(GatewayError::no_provider_available(&attempted)))
    }

    /// Records a failed initialization so later operations return the
    /// same error without re-authenticating. A concurrent successful
    /// initialization wins over the pin.
    fn pin_failed(&self, error: GatewayError) -> GatewayError {
        let mut state = self
            .init
            .lock()
            .expect("gateway provider lock is not poisoned");
        if let InitState::Pending = *state {
            *state = InitState::Failed(error.clone());
        }
        error
    }

    /// Flips the active provider away from `failed`, but only when no
    /// concurrent caller flipped it first and the other provider has
    /// credentials. Returns the index to retry on.
    fn switch_active(&self, failed: usize, error: &GatewayError) -> Option<usize> {
        let other = (failed + 1) % self.providers.len();
        if other == failed {
            return None;
        }

        let mut state = self
            .init
            .lock()
            .expect("gateway provider lock is not poisoned");
        match *state {
            InitState::Ready(current) if current == failed => {
                if !self.providers[other].is_available() {
                    return None;
                }
                *state = InitState::Ready(other);
                warn!(
                    from = %self.providers[failed].kind(),
                    to = %self.providers[other].kind(),
                    error = %error,
                    "switching active provider"
                );
                Some(other)
            }
            InitState::Ready(current) => Some(current),
            _ => None,
        }
    }
}

/// Command rejections and malformed requests are deterministic; retrying
/// them on the other provider cannot help.
fn failover_recovers(error: &GatewayError) -> bool {
    !matches!(
        error.kind(),
        GatewayErrorKind::InvalidRequest | GatewayErrorKind::CommandExecution
    )
}

fn describe_failure(kind: ProviderKind, error: &GatewayError) -> String {
    format!("{kind}: {}", error.message())
}

/// Assembles a [`VehicleGateway`] from settings, with overrides for tests
/// and embedders.
pub struct GatewayBuilder {
    settings: GatewaySettings,
    http_client: Option<Arc<dyn HttpClient>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    cache: Option<SnapshotCache>,
    providers: Option<Vec<Arc<dyn VehicleProvider>>>,
    mock_mode: bool,
}

impl GatewayBuilder {
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            settings,
            http_client: None,
            rate_limiter: None,
            cache: None,
            providers: None,
            mock_mode: false,
        }
    }

    /// Mock mode swaps the transport for a no-op client and fills in
    /// placeholder credentials, so every provider serves deterministic
    /// offline data.
    pub fn mock_mode(mut self, enabled: bool) -> Self {
        self.mock_mode = enabled;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the built-in provider pair, in preference order.
    pub fn with_providers(mut self, providers: Vec<Arc<dyn VehicleProvider>>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn build(self) -> VehicleGateway {
        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::default()));
        let cache = self.cache.unwrap_or_else(SnapshotCache::with_default_freshness);

        let providers = match self.providers {
            Some(providers) => providers,
            None => {
                let http_client: Arc<dyn HttpClient> = match (self.http_client, self.mock_mode) {
                    (Some(client), _) => client,
                    (None, true) => Arc::new(NoopHttpClient),
                    (None, false) => Arc::new(ReqwestHttpClient::new()),
                };

                let tessie_key = resolve_key(
                    self.settings.tessie_api_key.clone(),
                    &["VOLTGATE_TESSIE_API_KEY", "TESSIE_API_KEY"],
                    self.mock_mode,
                );
                let teslafi_key = resolve_key(
                    self.settings.teslafi_api_key.clone(),
                    &["VOLTGATE_TESLAFI_API_KEY", "TESLAFI_API_KEY"],
                    self.mock_mode,
                );

                let tessie: Arc<dyn VehicleProvider> = Arc::new(TessieProvider::with_http_client(
                    Arc::clone(&http_client),
                    tessie_key,
                ));
                let teslafi: Arc<dyn VehicleProvider> = Arc::new(
                    TeslafiProvider::with_http_client(http_client, teslafi_key),
                );

                match self.settings.selected_provider {
                    Some(ProviderKind::Teslafi) => vec![teslafi, tessie],
                    _ => vec![tessie, teslafi],
                }
            }
        };

        VehicleGateway {
            providers,
            init: Mutex::new(InitState::Pending),
            settings: self.settings,
            rate_limiter,
            cache,
        }
    }
}

/// Configured key first, then the environment, then a placeholder when
/// running in mock mode.
fn resolve_key(configured: Option<String>, env_names: &[&str], mock: bool) -> Option<String> {
    configured
        .or_else(|| env_names.iter().find_map(|name| std::env::var(name).ok()))
        .or_else(|| mock.then(|| String::from("demo")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CommandOutcome;
    use crate::provider_limits::ProviderLimits;
    use crate::rate_limit::RateLimiterConfig;
    use crate::{
        ChargeState, ChargingState, ClimateState, DriveState, SecurityState, ShiftState,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct StubProvider {
        kind: ProviderKind,
        available: bool,
        fail_auth: bool,
        fail_ops: AtomicBool,
        connectivity: ConnectivityState,
        calls: Mutex<Vec<String>>,
    }

    impl StubProvider {
        fn base(kind: ProviderKind) -> Self {
            Self {
                kind,
                available: true,
                fail_auth: false,
                fail_ops: AtomicBool::new(false),
                connectivity: ConnectivityState::Online,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn healthy(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self::base(kind))
        }

        fn failing_ops(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                fail_ops: AtomicBool::new(true),
                ..Self::base(kind)
            })
        }

        fn failing_auth(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                fail_auth: true,
                ..Self::base(kind)
            })
        }

        fn without_credentials(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                available: false,
                ..Self::base(kind)
            })
        }

        fn sleeping(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                connectivity: ConnectivityState::Asleep,
                ..Self::base(kind)
            })
        }

        fn set_failing(&self, failing: bool) {
            self.fail_ops.store(failing, Ordering::SeqCst);
        }

        fn record(&self, call: impl Into<String>) {
            self.calls
                .lock()
                .expect("call log lock is not poisoned")
                .push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .expect("call log lock is not poisoned")
                .clone()
        }

        fn op_result<T>(&self, value: T) -> Result<T, GatewayError> {
            if self.fail_ops.load(Ordering::SeqCst) {
                Err(GatewayError::provider_unavailable("stub upstream is down"))
            } else {
                Ok(value)
            }
        }
    }

    impl VehicleProvider for StubProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn authenticate<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send + 'a>> {
            self.record("authenticate");
            let result = if self.fail_auth {
                Err(GatewayError::authentication(self.kind, "stub rejects key"))
            } else {
                Ok(())
            };
            Box::pin(async move { result })
        }

        fn list_vehicles<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<VehicleSummary>, GatewayError>> + Send + 'a>>
        {
            self.record("list_vehicles");
            let result = self.op_result(vec![VehicleSummary {
                id: test_vehicle(),
                display_name: String::from("Stub"),
                connectivity: self.connectivity,
            }]);
            Box::pin(async move { result })
        }

        fn vehicle_data<'a>(
            &'a self,
            id: VehicleId,
        ) -> Pin<Box<dyn Future<Output = Result<VehicleSnapshot, GatewayError>> + Send + 'a>>
        {
            self.record(format!("vehicle_data:{id}"));
            let result = self.op_result(stub_snapshot(&id, self.connectivity));
            Box::pin(async move { result })
        }

        fn execute_command<'a>(
            &'a self,
            req: CommandRequest,
        ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome, GatewayError>> + Send + 'a>>
        {
            self.record(format!("command:{}", req.command));
            let result = self.op_result(CommandOutcome::accepted(serde_json::json!({})));
            Box::pin(async move { result })
        }

        fn wake<'a>(
            &'a self,
            id: VehicleId,
        ) -> Pin<Box<dyn Future<Output = Result<ConnectivityState, GatewayError>> + Send + 'a>>
        {
            self.record(format!("wake:{id}"));
            let result = self.op_result(ConnectivityState::Online);
            Box::pin(async move { result })
        }
    }

    fn test_vehicle() -> VehicleId {
        VehicleId::parse("veh-1").expect("valid id")
    }

    fn stub_snapshot(id: &VehicleId, connectivity: ConnectivityState) -> VehicleSnapshot {
        VehicleSnapshot::new(
            id.clone(),
            "Stub",
            connectivity,
            ChargeState::new(55.0, ChargingState::Disconnected, 250.0, 0.0, None)
                .expect("valid charge state"),
            ClimateState::new(false, Some(20.0), Some(10.0)).expect("valid climate state"),
            SecurityState::new(true, false, 10_000.0, "2024.8.7").expect("valid security state"),
            DriveState::new(52.0, 13.0, ShiftState::Park, None).expect("valid drive state"),
            UtcDateTime::now(),
        )
    }

    fn gateway_with(providers: Vec<Arc<dyn VehicleProvider>>) -> VehicleGateway {
        GatewayBuilder::new(GatewaySettings::default())
            .with_providers(providers)
            .build()
    }

    fn tight_wake_config() -> RateLimiterConfig {
        RateLimiterConfig {
            tessie: ProviderLimits {
                provider: ProviderKind::Tessie,
                request_limit: 100,
                request_window: Duration::from_secs(60),
            },
            teslafi: ProviderLimits {
                provider: ProviderKind::Teslafi,
                request_limit: 100,
                request_window: Duration::from_secs(60),
            },
            wake_limit: 1,
            wake_window: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn gateway_without_any_key_fails_fast_as_not_configured() {
        let primary = StubProvider::without_credentials(ProviderKind::Tessie);
        let secondary = StubProvider::without_credentials(ProviderKind::Teslafi);
        let gateway = gateway_with(vec![primary.clone(), secondary]);

        let error = gateway
            .vehicle_data(&test_vehicle(), true)
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), GatewayErrorKind::NotConfigured);
        assert!(primary.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_initialization_is_pinned_and_never_reauthenticates() {
        let primary = StubProvider::failing_auth(ProviderKind::Tessie);
        let secondary = StubProvider::failing_auth(ProviderKind::Teslafi);
        let gateway = gateway_with(vec![primary.clone(), secondary.clone()]);

        let first = gateway
            .vehicle_data(&test_vehicle(), true)
            .await
            .expect_err("must fail");
        assert_eq!(first.kind(), GatewayErrorKind::NoProviderAvailable);

        let second = gateway
            .vehicle_data(&test_vehicle(), true)
            .await
            .expect_err("must fail");
        assert_eq!(second.kind(), GatewayErrorKind::NoProviderAvailable);
        assert_eq!(second.message(), first.message());

        assert_eq!(primary.calls(), vec![String::from("authenticate")]);
        assert_eq!(secondary.calls(), vec![String::from("authenticate")]);
    }

    #[tokio::test]
    async fn initialization_skips_provider_that_rejects_credentials() {
        let primary = StubProvider::failing_auth(ProviderKind::Tessie);
        let secondary = StubProvider::healthy(ProviderKind::Teslafi);
        let gateway = gateway_with(vec![primary.clone(), secondary.clone()]);

        let snapshot = gateway
            .vehicle_data(&test_vehicle(), true)
            .await
            .expect("snapshot via secondary");

        assert_eq!(snapshot.id, test_vehicle());
        assert_eq!(gateway.active_provider(), Some(ProviderKind::Teslafi));
        assert_eq!(primary.calls(), vec![String::from("authenticate")]);
    }

    #[tokio::test]
    async fn fresh_cache_short_circuits_the_provider_and_the_budget() {
        let primary = StubProvider::healthy(ProviderKind::Tessie);
        let secondary = StubProvider::healthy(ProviderKind::Teslafi);
        let gateway = gateway_with(vec![primary.clone(), secondary]);

        gateway
            .vehicle_data(&test_vehicle(), true)
            .await
            .expect("first fetch");
        gateway
            .vehicle_data(&test_vehicle(), true)
            .await
            .expect("cached fetch");

        let data_calls = primary
            .calls()
            .iter()
            .filter(|call| call.starts_with("vehicle_data"))
            .count();
        assert_eq!(data_calls, 1);
        assert_eq!(gateway.rate_limiter().recorded_len(), 1);
    }

    #[tokio::test]
    async fn failover_is_sticky_after_a_provider_failure() {
        let primary = StubProvider::failing_ops(ProviderKind::Tessie);
        let secondary = StubProvider::healthy(ProviderKind::Teslafi);
        let gateway = gateway_with(vec![primary.clone(), secondary.clone()]);

        gateway
            .vehicle_data(&test_vehicle(), false)
            .await
            .expect("snapshot via failover");
        assert_eq!(gateway.active_provider(), Some(ProviderKind::Teslafi));

        gateway
            .vehicle_data(&test_vehicle(), false)
            .await
            .expect("snapshot from new active");

        let primary_data_calls = primary
            .calls()
            .iter()
            .filter(|call| call.starts_with("vehicle_data"))
            .count();
        let secondary_data_calls = secondary
            .calls()
            .iter()
            .filter(|call| call.starts_with("vehicle_data"))
            .count();
        assert_eq!(primary_data_calls, 1);
        assert_eq!(secondary_data_calls, 2);
    }

    #[tokio::test]
    async fn stale_snapshot_is_served_when_both_providers_fail() {
        let primary = StubProvider::healthy(ProviderKind::Tessie);
        let secondary = StubProvider::failing_ops(ProviderKind::Teslafi);
        let gateway = GatewayBuilder::new(GatewaySettings::default())
            .with_providers(vec![primary.clone(), secondary])
            .with_cache(SnapshotCache::new(Duration::from_millis(40)))
            .build();

        gateway
            .vehicle_data(&test_vehicle(), true)
            .await
            .expect("prime the cache");

        tokio::time::sleep(Duration::from_millis(80)).await;
        primary.set_failing(true);

        let snapshot = gateway
            .vehicle_data(&test_vehicle(), true)
            .await
            .expect("stale snapshot");
        assert_eq!(snapshot.id, test_vehicle());
    }

    #[tokio::test]
    async fn error_surfaces_when_both_providers_fail_with_no_cache() {
        let primary = StubProvider::failing_ops(ProviderKind::Tessie);
        let secondary = StubProvider::failing_ops(ProviderKind::Teslafi);
        let gateway = gateway_with(vec![primary, secondary]);

        let error = gateway
            .vehicle_data(&test_vehicle(), true)
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), GatewayErrorKind::NoProviderAvailable);
        assert!(error.message().contains("tessie"));
        assert!(error.message().contains("teslafi"));
    }

    #[tokio::test]
    async fn command_wakes_a_sleeping_vehicle_first() {
        let primary = StubProvider::sleeping(ProviderKind::Tessie);
        let secondary = StubProvider::healthy(ProviderKind::Teslafi);
        let gateway = gateway_with(vec![primary.clone(), secondary]);

        let result = gateway
            .execute_command(&test_vehicle(), "honk_horn", serde_json::Value::Null)
            .await
            .expect("command result");
        assert!(result.success);

        let calls = primary.calls();
        let wake_at = calls.iter().position(|call| call.starts_with("wake"));
        let command_at = calls.iter().position(|call| call.starts_with("command"));
        assert!(wake_at.is_some(), "wake was issued: {calls:?}");
        assert!(wake_at < command_at, "wake precedes command: {calls:?}");
    }

    #[tokio::test]
    async fn exhausted_wake_budget_blocks_commands_on_both_providers() {
        let primary = StubProvider::sleeping(ProviderKind::Tessie);
        let secondary = StubProvider::sleeping(ProviderKind::Teslafi);
        let gateway = GatewayBuilder::new(GatewaySettings::default())
            .with_providers(vec![primary, secondary])
            .with_rate_limiter(Arc::new(RateLimiter::new(tight_wake_config())))
            .build();

        gateway
            .execute_command(&test_vehicle(), "honk_horn", serde_json::Value::Null)
            .await
            .expect("first command wakes and runs");

        // The single wake token is spent and the budget is shared, so the
        // failover retry is denied as well.
        let error = gateway
            .execute_command(&test_vehicle(), "flash_lights", serde_json::Value::Null)
            .await
            .expect_err("second wake must be denied");
        assert_eq!(error.kind(), GatewayErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn blank_command_is_rejected_before_any_provider_call() {
        let primary = StubProvider::healthy(ProviderKind::Tessie);
        let secondary = StubProvider::healthy(ProviderKind::Teslafi);
        let gateway = gateway_with(vec![primary.clone(), secondary]);

        let error = gateway
            .execute_command(&test_vehicle(), "  ", serde_json::Value::Null)
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), GatewayErrorKind::InvalidRequest);
        assert!(primary.calls().is_empty());
    }
}
