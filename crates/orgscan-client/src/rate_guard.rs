use orgscan_core::{OrgScanError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Usage ratio at which the guard starts warning.
pub const WARNING_THRESHOLD: f64 = 0.70;

/// Usage ratio at which the guard refuses further requests.
pub const CRITICAL_THRESHOLD: f64 = 0.90;

/// An observation older than this no longer blocks requests; quota may
/// have recovered since.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaZone {
    Green,
    Yellow,
    Red,
}

impl QuotaZone {
    /// Zones partition [0, 1) by the two thresholds.
    pub fn for_ratio(ratio: f64) -> Self {
        if ratio >= CRITICAL_THRESHOLD {
            QuotaZone::Red
        } else if ratio >= WARNING_THRESHOLD {
            QuotaZone::Yellow
        } else {
            QuotaZone::Green
        }
    }
}

/// How a red-zone refusal is surfaced. Production orgs enforce; sandbox
/// callers may opt into warnings only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardPolicy {
    #[default]
    Enforce,
    WarnOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct QuotaState {
    pub used_ratio: f64,
    pub zone: QuotaZone,
    pub observed_at: Instant,
}

/// Admission-control gate over the remote API quota. Wraps every
/// executor call: `before_request` refuses work when the last fresh
/// observation was critical, `after_request` folds in the usage the
/// server reported so the *next* call is refused before it starts.
/// In-flight calls are never cancelled.
pub struct RateGuard {
    state: RwLock<Option<QuotaState>>,
    policy: GuardPolicy,
    freshness_window: Duration,
}

impl RateGuard {
    pub fn new(policy: GuardPolicy) -> Self {
        Self {
            state: RwLock::new(None),
            policy,
            freshness_window: FRESHNESS_WINDOW,
        }
    }

    /// Overrides how long an observation stays fresh. Tests use this to
    /// exercise the recovery path without waiting out the real window.
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    pub fn snapshot(&self) -> Option<QuotaState> {
        *self.state.read()
    }

    pub fn is_red_zone(&self) -> bool {
        self.state
            .read()
            .map(|s| s.zone == QuotaZone::Red)
            .unwrap_or(false)
    }

    /// Admission check. Refuses only on a *fresh* red-zone observation;
    /// with no observation yet, or a stale one, the request proceeds.
    pub fn before_request(&self) -> Result<()> {
        let Some(state) = *self.state.read() else {
            return Ok(());
        };
        if state.zone != QuotaZone::Red || state.observed_at.elapsed() >= self.freshness_window {
            return Ok(());
        }
        match self.policy {
            GuardPolicy::Enforce => Err(OrgScanError::QuotaExceeded {
                used_ratio: state.used_ratio,
            }),
            GuardPolicy::WarnOnly => {
                warn!(
                    used_ratio = state.used_ratio,
                    "quota critically high, proceeding under warn-only policy"
                );
                Ok(())
            }
        }
    }

    /// Record the usage ratio a response reported, then re-run the
    /// admission semantics: a request that pushed usage into the red
    /// zone fails here, before any sibling issues its next call.
    pub fn after_request(&self, used_ratio: f64) -> Result<()> {
        let zone = QuotaZone::for_ratio(used_ratio);
        debug!(used_ratio, ?zone, "quota observation");
        *self.state.write() = Some(QuotaState {
            used_ratio,
            zone,
            observed_at: Instant::now(),
        });
        self.before_request()
    }
}

impl Default for RateGuard {
    fn default() -> Self {
        Self::new(GuardPolicy::Enforce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zones_partition_the_ratio_space() {
        assert_eq!(QuotaZone::for_ratio(0.0), QuotaZone::Green);
        assert_eq!(QuotaZone::for_ratio(0.69), QuotaZone::Green);
        assert_eq!(QuotaZone::for_ratio(0.70), QuotaZone::Yellow);
        assert_eq!(QuotaZone::for_ratio(0.89), QuotaZone::Yellow);
        assert_eq!(QuotaZone::for_ratio(0.90), QuotaZone::Red);
        assert_eq!(QuotaZone::for_ratio(0.99), QuotaZone::Red);
    }

    #[test]
    fn fresh_red_observation_blocks_next_request() {
        let guard = RateGuard::default();
        assert!(guard.before_request().is_ok());

        let err = guard.after_request(0.91).unwrap_err();
        assert!(matches!(err, OrgScanError::QuotaExceeded { .. }));
        assert!(guard.is_red_zone());
        assert!(guard.before_request().is_err());
    }

    #[test]
    fn moderate_usage_never_blocks() {
        let guard = RateGuard::default();
        assert!(guard.after_request(0.5).is_ok());
        assert!(guard.before_request().is_ok());
        assert!(!guard.is_red_zone());
    }

    #[test]
    fn warn_only_policy_downgrades_refusal() {
        let guard = RateGuard::new(GuardPolicy::WarnOnly);
        assert!(guard.after_request(0.95).is_ok());
        assert!(guard.before_request().is_ok());
        // The zone is still reported honestly.
        assert!(guard.is_red_zone());
    }

    #[test]
    fn stale_red_observation_no_longer_blocks() {
        // A zero-length window makes any observation immediately stale:
        // quota may have recovered, so the request is admitted.
        let guard =
            RateGuard::new(GuardPolicy::Enforce).with_freshness_window(Duration::ZERO);
        assert!(guard.after_request(0.95).is_ok());
        assert!(guard.before_request().is_ok());
        // The last known zone is still reported honestly.
        assert!(guard.is_red_zone());
    }

    #[test]
    fn recovery_clears_the_red_zone() {
        let guard = RateGuard::default();
        let _ = guard.after_request(0.95);
        assert!(guard.after_request(0.40).is_ok());
        assert!(guard.before_request().is_ok());
    }
}
