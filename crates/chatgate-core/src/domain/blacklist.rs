//! Blacklist / whitelist state and the escalation rules applied to it.
//!
//! The whole access list lives in one persisted document shaped as
//! `{ "blacklist": { <address>: entry }, "whitelist": { <address>: true } }`.
//!
//! An address moves through these states, driven only by daily-window
//! exhaustion:
//!
//! ```text
//! Clean --exhaust--> Restricted --time--> Released
//!                        ^  |                |
//!                        |  +----exhaust-----+
//!                        |        |
//!                        +--------+ (limitCount <= threshold)
//!                                 |
//!                                 v (limitCount > threshold)
//!                             Imprisoned (terminal)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::from_millis;

/// Penalty state for one address. Times are epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    pub created_at: i64,
    /// Only meaningful while `is_in_prison` is false.
    pub can_use_at: i64,
    pub is_in_prison: bool,
    pub limit_count: u32,
}

impl BlacklistEntry {
    pub fn can_use_at(&self) -> DateTime<Utc> {
        from_millis(self.can_use_at)
    }

    pub fn standing(&self, now: DateTime<Utc>) -> Standing {
        if self.is_in_prison {
            Standing::Imprisoned
        } else if now.timestamp_millis() >= self.can_use_at {
            Standing::Released
        } else {
            Standing::Restricted {
                until: self.can_use_at(),
            }
        }
    }
}

/// Escalation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlacklistPolicy {
    /// How long a restricted address stays locked out.
    pub penalty: TimeDelta,
    /// Restrictions beyond this count become permanent.
    pub escalation_threshold: u32,
}

impl Default for BlacklistPolicy {
    fn default() -> Self {
        Self {
            penalty: TimeDelta::hours(24),
            escalation_threshold: 3,
        }
    }
}

/// Where an address currently stands with respect to the access list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Whitelisted,
    Clean,
    Restricted { until: DateTime<Utc> },
    /// Penalty elapsed; history kept for future escalation.
    Released,
    Imprisoned,
}

impl Standing {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Standing::Restricted { .. } | Standing::Imprisoned)
    }
}

/// Outcome of recording a daily exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escalation {
    pub entry: BlacklistEntry,
    /// False when the address was already imprisoned and nothing changed.
    pub changed: bool,
}

/// Persisted access-list document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessList {
    #[serde(default)]
    pub blacklist: BTreeMap<String, BlacklistEntry>,
    /// Administered out of band; any value other than `false`/`null` counts.
    #[serde(default)]
    pub whitelist: BTreeMap<String, serde_json::Value>,
}

impl AccessList {
    pub fn is_whitelisted(&self, address: &str) -> bool {
        self.whitelist
            .get(address)
            .is_some_and(|v| !matches!(v, serde_json::Value::Null | serde_json::Value::Bool(false)))
    }

    pub fn entry(&self, address: &str) -> Option<&BlacklistEntry> {
        self.blacklist.get(address)
    }

    pub fn standing(&self, address: &str, now: DateTime<Utc>) -> Standing {
        if self.is_whitelisted(address) {
            return Standing::Whitelisted;
        }

        self.blacklist
            .get(address)
            .map_or(Standing::Clean, |entry| entry.standing(now))
    }

    /// Applies one daily-window exhaustion to `address`.
    pub fn register_exhaustion(
        &mut self,
        address: &str,
        now: DateTime<Utc>,
        policy: &BlacklistPolicy,
    ) -> Escalation {
        let now_ms = now.timestamp_millis();
        let unlock_at = (now + policy.penalty).timestamp_millis();

        let entry = self
            .blacklist
            .entry(address.to_string())
            .or_insert(BlacklistEntry {
                created_at: now_ms,
                can_use_at: unlock_at,
                is_in_prison: false,
                limit_count: 0,
            });

        if entry.is_in_prison {
            return Escalation {
                entry: *entry,
                changed: false,
            };
        }

        entry.limit_count += 1;
        entry.is_in_prison = entry.limit_count > policy.escalation_threshold;
        if !entry.is_in_prison {
            entry.can_use_at = unlock_at;
        }

        Escalation {
            entry: *entry,
            changed: true,
        }
    }

    /// Adds `address` to the whitelist.
    pub fn whitelist(&mut self, address: &str) {
        self.whitelist
            .insert(address.to_string(), serde_json::Value::Bool(true));
    }

    /// Removes any penalty recorded for `address`.
    pub fn pardon(&mut self, address: &str) -> Option<BlacklistEntry> {
        self.blacklist.remove(address)
    }
}
