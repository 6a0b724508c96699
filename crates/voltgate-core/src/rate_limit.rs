//! Sliding-window rate limiter shared by foreground calls and the
//! automation passes.
//!
//! One limiter instance meters both providers. Every recorded request
//! carries its provider and command class; general budgets are counted per
//! provider, the wake budget across both. Reads never mutate the history,
//! pruning happens on record using the longest configured window.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::{ProviderKind, ProviderLimits, WAKE_LIMIT, WAKE_WINDOW};

/// Rate accounting class for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    General,
    Wake,
}

impl CommandClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Wake => "wake",
        }
    }
}

/// Budgets applied by the limiter.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub tessie: ProviderLimits,
    pub teslafi: ProviderLimits,
    pub wake_limit: u32,
    pub wake_window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            tessie: ProviderLimits::tessie_default(),
            teslafi: ProviderLimits::teslafi_default(),
            wake_limit: WAKE_LIMIT,
            wake_window: WAKE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RequestRecord {
    at: Instant,
    provider: ProviderKind,
    class: CommandClass,
}

#[derive(Debug, Default)]
struct LimiterInner {
    records: VecDeque<RequestRecord>,
}

/// Thread-safe sliding-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    inner: Mutex<LimiterInner>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(LimiterInner::default()),
        }
    }

    fn limits_for(&self, provider: ProviderKind) -> &ProviderLimits {
        match provider {
            ProviderKind::Tessie => &self.config.tessie,
            ProviderKind::Teslafi => &self.config.teslafi,
        }
    }

    fn longest_window(&self) -> Duration {
        self.config
            .tessie
            .request_window
            .max(self.config.teslafi.request_window)
            .max(self.config.wake_window)
    }

    /// Whether a request of `class` may be issued through `provider` now.
    ///
    /// Wake requests must clear both the provider's general budget and the
    /// shared wake budget. This never mutates the history.
    pub fn can_make_request(&self, provider: ProviderKind, class: CommandClass) -> bool {
        let inner = self.inner.lock().expect("rate limiter lock is not poisoned");
        self.wait_for(&inner, provider, class, Instant::now())
            .is_zero()
    }

    /// Appends a request record and prunes entries older than the longest
    /// configured window.
    pub fn record_request(&self, provider: ProviderKind, class: CommandClass) {
        let mut inner = self.inner.lock().expect("rate limiter lock is not poisoned");
        let now = Instant::now();
        inner.records.push_back(RequestRecord {
            at: now,
            provider,
            class,
        });

        let horizon = self.longest_window();
        while let Some(front) = inner.records.front() {
            if now.duration_since(front.at) >= horizon {
                inner.records.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long until a request of `class` through `provider` would be
    /// admitted. Zero when it is admissible right now.
    pub fn time_until_next_request(&self, provider: ProviderKind, class: CommandClass) -> Duration {
        let inner = self.inner.lock().expect("rate limiter lock is not poisoned");
        self.wait_for(&inner, provider, class, Instant::now())
    }

    /// Records currently held, pre-pruning. Bounded by call volume over the
    /// longest window.
    pub fn recorded_len(&self) -> usize {
        let inner = self.inner.lock().expect("rate limiter lock is not poisoned");
        inner.records.len()
    }

    fn wait_for(
        &self,
        inner: &LimiterInner,
        provider: ProviderKind,
        class: CommandClass,
        now: Instant,
    ) -> Duration {
        let limits = self.limits_for(provider);
        let mut wait = Self::window_wait(
            &inner.records,
            now,
            limits.request_window,
            limits.request_limit,
            |record| record.provider == provider,
        );

        if class == CommandClass::Wake {
            let wake_wait = Self::window_wait(
                &inner.records,
                now,
                self.config.wake_window,
                self.config.wake_limit,
                |record| record.class == CommandClass::Wake,
            );
            wait = wait.max(wake_wait);
        }

        wait
    }

    /// Wait until the matching records within `window` drop below `limit`.
    ///
    /// Records are appended in order, so the first in-window match is the
    /// oldest one and determines when a slot frees up.
    fn window_wait(
        records: &VecDeque<RequestRecord>,
        now: Instant,
        window: Duration,
        limit: u32,
        matches: impl Fn(&RequestRecord) -> bool,
    ) -> Duration {
        if limit == 0 {
            return window;
        }

        let in_window: Vec<&RequestRecord> = records
            .iter()
            .filter(|record| matches(record) && now.duration_since(record.at) < window)
            .collect();

        if (in_window.len() as u32) < limit {
            return Duration::ZERO;
        }

        // Admitting one more requires `len - limit + 1` records to age out.
        let excess = in_window.len() - limit as usize;
        let blocking = in_window[excess];
        window.saturating_sub(now.duration_since(blocking.at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config(general_limit: u32, wake_limit: u32) -> RateLimiterConfig {
        RateLimiterConfig {
            tessie: ProviderLimits {
                provider: ProviderKind::Tessie,
                request_limit: general_limit,
                request_window: Duration::from_millis(50),
            },
            teslafi: ProviderLimits {
                provider: ProviderKind::Teslafi,
                request_limit: general_limit,
                request_window: Duration::from_millis(50),
            },
            wake_limit,
            wake_window: Duration::from_millis(50),
        }
    }

    #[test]
    fn blocks_at_limit_and_frees_after_window() {
        let limiter = RateLimiter::new(short_config(2, 5));

        assert!(limiter.can_make_request(ProviderKind::Tessie, CommandClass::General));
        limiter.record_request(ProviderKind::Tessie, CommandClass::General);
        limiter.record_request(ProviderKind::Tessie, CommandClass::General);
        assert!(!limiter.can_make_request(ProviderKind::Tessie, CommandClass::General));

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.can_make_request(ProviderKind::Tessie, CommandClass::General));
    }

    #[test]
    fn general_budgets_are_independent_per_provider() {
        let limiter = RateLimiter::new(short_config(1, 5));

        limiter.record_request(ProviderKind::Tessie, CommandClass::General);
        assert!(!limiter.can_make_request(ProviderKind::Tessie, CommandClass::General));
        assert!(limiter.can_make_request(ProviderKind::Teslafi, CommandClass::General));
    }

    #[test]
    fn wake_budget_is_shared_across_providers() {
        let limiter = RateLimiter::new(short_config(10, 2));

        limiter.record_request(ProviderKind::Tessie, CommandClass::Wake);
        limiter.record_request(ProviderKind::Teslafi, CommandClass::Wake);

        assert!(!limiter.can_make_request(ProviderKind::Tessie, CommandClass::Wake));
        assert!(!limiter.can_make_request(ProviderKind::Teslafi, CommandClass::Wake));
        // General traffic is still admissible on both.
        assert!(limiter.can_make_request(ProviderKind::Tessie, CommandClass::General));
        assert!(limiter.can_make_request(ProviderKind::Teslafi, CommandClass::General));
    }

    #[test]
    fn wake_also_consumes_the_general_budget() {
        let limiter = RateLimiter::new(short_config(2, 5));

        limiter.record_request(ProviderKind::Tessie, CommandClass::Wake);
        limiter.record_request(ProviderKind::Tessie, CommandClass::Wake);

        assert!(!limiter.can_make_request(ProviderKind::Tessie, CommandClass::General));
    }

    #[test]
    fn checking_does_not_mutate_history() {
        let limiter = RateLimiter::new(short_config(1, 1));

        for _ in 0..10 {
            limiter.can_make_request(ProviderKind::Tessie, CommandClass::General);
            limiter.time_until_next_request(ProviderKind::Tessie, CommandClass::Wake);
        }

        assert_eq!(limiter.recorded_len(), 0);
        assert!(limiter.can_make_request(ProviderKind::Tessie, CommandClass::General));
    }

    #[test]
    fn recording_prunes_entries_past_the_longest_window() {
        let limiter = RateLimiter::new(short_config(10, 10));

        limiter.record_request(ProviderKind::Tessie, CommandClass::General);
        limiter.record_request(ProviderKind::Teslafi, CommandClass::General);
        limiter.record_request(ProviderKind::Tessie, CommandClass::Wake);
        assert_eq!(limiter.recorded_len(), 3);

        std::thread::sleep(Duration::from_millis(60));
        limiter.record_request(ProviderKind::Tessie, CommandClass::General);
        assert_eq!(limiter.recorded_len(), 1);
    }

    #[test]
    fn reports_wait_until_oldest_call_ages_out() {
        let limiter = RateLimiter::new(short_config(1, 5));

        assert_eq!(
            limiter.time_until_next_request(ProviderKind::Tessie, CommandClass::General),
            Duration::ZERO
        );

        limiter.record_request(ProviderKind::Tessie, CommandClass::General);
        let wait = limiter.time_until_next_request(ProviderKind::Tessie, CommandClass::General);
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_millis(50));
    }
}
