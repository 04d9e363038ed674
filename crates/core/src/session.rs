//! Per-caller session state. Sessions are created lazily on the first tool
//! call from a phone number and live until the call ends or they go idle.

use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cart::{Cart, ItemBuilder};
use crate::errors::OrderError;
use crate::pricing::CartPricing;

const DEFAULT_COUNTRY_CODE: &str = "61";

/// Caller identity, normalized so that "0412 345 678" and "+61412345678"
/// address the same session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn from_phone(raw: &str) -> Result<Self, OrderError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < 6 {
            return Err(OrderError::invalid_value("caller", "a caller phone number is required"));
        }

        let international = raw.trim_start().starts_with('+');
        let normalized = match digits.strip_prefix('0') {
            Some(local) if !international && digits.len() == 10 => {
                format!("+{DEFAULT_COUNTRY_CODE}{local}")
            }
            _ => format!("+{digits}"),
        };
        Ok(Self(normalized))
    }

    /// Key for calls without caller id, scoped to the platform call id.
    pub fn anonymous(call_id: &str) -> Self {
        Self(format!("anonymous:{}", call_id.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with("anonymous:")
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a tool call may read or change for one caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSession {
    pub cart: Cart,
    pub builder: ItemBuilder,
    pub last_quote: Option<CartPricing>,
}

/// Sliding-window call counter.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    calls: Vec<Instant>,
}

impl RateLimiter {
    /// Records a call at `now` unless `limit` calls already fall inside the
    /// window. Rejected calls are not recorded.
    pub fn check(&mut self, now: Instant, limit: usize, window: Duration) -> Result<(), OrderError> {
        self.calls.retain(|at| now.saturating_duration_since(*at) < window);
        if self.calls.len() >= limit {
            let oldest = self.calls.first().copied().unwrap_or(now);
            let wait = window.saturating_sub(now.saturating_duration_since(oldest));
            let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            return Err(OrderError::RateLimited { retry_after_secs: retry_after_secs.max(1) });
        }
        self.calls.push(now);
        Ok(())
    }

    pub fn recent_calls(&self) -> usize {
        self.calls.len()
    }
}

#[derive(Clone, Debug)]
struct Session {
    state: OrderSession,
    limiter: RateLimiter,
    last_seen: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPolicy {
    pub rate_limit_calls: usize,
    pub rate_limit_window: Duration,
    pub idle_ttl: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            rate_limit_calls: 60,
            rate_limit_window: Duration::from_secs(60),
            idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// Sessions partitioned by caller. Different callers never contend on the
/// same entry; calls for one caller are applied one at a time.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionKey, Session>,
    policy: SessionPolicy,
}

impl SessionStore {
    pub fn new(policy: SessionPolicy) -> Self {
        Self { sessions: DashMap::new(), policy }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Counts one call against the caller's rate limit, creating the session
    /// on first contact.
    pub fn admit(&self, key: &SessionKey) -> Result<(), OrderError> {
        self.with_session_at(key, Instant::now(), |_| Ok(()))
    }

    pub fn with_session<T, F>(&self, key: &SessionKey, f: F) -> Result<T, OrderError>
    where
        F: FnOnce(&mut OrderSession) -> Result<T, OrderError>,
    {
        self.with_session_at(key, Instant::now(), f)
    }

    /// Runs `f` against a working copy of the caller's session. The rate
    /// limiter is consulted first and the copy is committed only when `f`
    /// succeeds.
    pub fn with_session_at<T, F>(&self, key: &SessionKey, now: Instant, f: F) -> Result<T, OrderError>
    where
        F: FnOnce(&mut OrderSession) -> Result<T, OrderError>,
    {
        let mut session = self.sessions.entry(key.clone()).or_insert_with(|| {
            info!(event_name = "order.session.created", session = %key, "session created");
            Session { state: OrderSession::default(), limiter: RateLimiter::default(), last_seen: now }
        });
        session.last_seen = now;

        if let Err(error) =
            session.limiter.check(now, self.policy.rate_limit_calls, self.policy.rate_limit_window)
        {
            warn!(event_name = "order.session.rate_limited", session = %key, "tool call rate limited");
            return Err(error);
        }

        let mut working = session.state.clone();
        let value = f(&mut working)?;
        session.state = working;
        Ok(value)
    }

    /// Same commit rules as [`SessionStore::with_session`] without counting
    /// against the rate limit. Used for follow-up steps of a call that was
    /// already admitted.
    pub fn with_session_unmetered<T, F>(&self, key: &SessionKey, f: F) -> Result<T, OrderError>
    where
        F: FnOnce(&mut OrderSession) -> Result<T, OrderError>,
    {
        let mut session = self.sessions.get_mut(key).ok_or_else(|| {
            OrderError::Internal(format!("session `{key}` ended while a call was in flight"))
        })?;
        let mut working = session.state.clone();
        let value = f(&mut working)?;
        session.state = working;
        Ok(value)
    }

    pub fn snapshot(&self, key: &SessionKey) -> Option<OrderSession> {
        self.sessions.get(key).map(|session| session.state.clone())
    }

    pub fn end_session(&self, key: &SessionKey) -> bool {
        let removed = self.sessions.remove(key).is_some();
        if removed {
            info!(event_name = "order.session.ended", session = %key, "session ended");
        }
        removed
    }

    /// Drops sessions idle for longer than the policy TTL.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        let ttl = self.policy.idle_ttl;
        self.sessions.retain(|_, session| now.saturating_duration_since(session.last_seen) <= ttl);
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            info!(event_name = "order.session.purged", purged, "idle sessions purged");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
