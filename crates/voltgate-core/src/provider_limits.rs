use std::time::Duration;

use crate::ProviderKind;

/// General request budget for one provider.
///
/// Wake commands are metered separately through the shared wake budget
/// ([`WAKE_LIMIT`] / [`WAKE_WINDOW`]): waking drains the vehicle battery
/// regardless of which provider relays the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLimits {
    pub provider: ProviderKind,
    pub request_limit: u32,
    pub request_window: Duration,
}

impl ProviderLimits {
    pub fn tessie_default() -> Self {
        Self {
            provider: ProviderKind::Tessie,
            request_limit: 200,
            request_window: Duration::from_secs(15 * 60),
        }
    }

    pub fn teslafi_default() -> Self {
        Self {
            provider: ProviderKind::Teslafi,
            request_limit: 1_000,
            request_window: Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn default_for(provider: ProviderKind) -> Self {
        match provider {
            ProviderKind::Tessie => Self::tessie_default(),
            ProviderKind::Teslafi => Self::teslafi_default(),
        }
    }
}

/// Wake budget shared by both providers.
pub const WAKE_LIMIT: u32 = 5;
pub const WAKE_WINDOW: Duration = Duration::from_secs(15 * 60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tessie_limits_match_plan_quota() {
        let limits = ProviderLimits::tessie_default();

        assert_eq!(limits.provider, ProviderKind::Tessie);
        assert_eq!(limits.request_limit, 200);
        assert_eq!(limits.request_window, Duration::from_secs(900));
    }

    #[test]
    fn teslafi_limits_match_daily_quota() {
        let limits = ProviderLimits::teslafi_default();

        assert_eq!(limits.provider, ProviderKind::Teslafi);
        assert_eq!(limits.request_limit, 1_000);
        assert_eq!(limits.request_window, Duration::from_secs(86_400));
    }

    #[test]
    fn every_provider_has_a_default_budget() {
        for kind in ProviderKind::ALL {
            let limits = ProviderLimits::default_for(kind);
            assert_eq!(limits.provider, kind);
            assert!(limits.request_limit > 0);
        }
    }
}
