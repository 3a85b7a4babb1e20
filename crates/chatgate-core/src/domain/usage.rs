//! Per-day usage statistics.
//!
//! Persisted as `{ "ipInfo": {..}, "data": {..}, "total": n }` in a
//! day-partitioned document, so every count here is a per-day count.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::format_local;
use crate::domain::ClientIdentity;

/// Aggregate keyed by network address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressUsage {
    pub created_at: i64,
    pub count: u64,
    /// Distinct credentials seen from this address.
    pub tokens: Vec<String>,
    pub user_agents: Vec<String>,
    pub times: Vec<i64>,
    pub time_strings: Vec<String>,
}

/// Aggregate keyed by credential token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenUsage {
    pub created_at: i64,
    pub count: u64,
    /// Distinct addresses this credential was used from.
    pub ips: Vec<String>,
    /// Signed-in user ids behind this credential.
    pub user_ids: Vec<String>,
    pub user_agents: Vec<String>,
    pub prompts: Vec<String>,
    pub times: Vec<i64>,
    pub time_strings: Vec<String>,
}

/// One admitted request, as seen by the recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub address: String,
    pub credential: String,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
    pub prompt: Option<String>,
    pub at: DateTime<Utc>,
}

impl Visit {
    pub fn new(identity: &ClientIdentity, prompt: Option<&str>, at: DateTime<Utc>) -> Self {
        Self {
            address: identity.address_key().to_string(),
            credential: identity.credential_key().to_string(),
            user_agent: identity.user_agent.clone(),
            user_id: identity.user_id.clone(),
            prompt: prompt.map(str::to_string),
            at,
        }
    }
}

/// Counts after a visit was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub address_count: u64,
    pub token_count: u64,
    /// True when this was the credential's first request of the day.
    pub first_visit: bool,
    pub total: u64,
}

/// The persisted statistics document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageStatistics {
    pub ip_info: BTreeMap<String, AddressUsage>,
    pub data: BTreeMap<String, TokenUsage>,
    pub total: u64,
}

impl UsageStatistics {
    pub fn record(&mut self, visit: &Visit) -> UsageSnapshot {
        let at_ms = visit.at.timestamp_millis();
        let at_str = format_local(visit.at);

        let by_address = self
            .ip_info
            .entry(visit.address.clone())
            .or_insert_with(|| AddressUsage {
                created_at: at_ms,
                ..AddressUsage::default()
            });
        by_address.count += 1;
        push_distinct(&mut by_address.tokens, &visit.credential);
        if let Some(ua) = &visit.user_agent {
            push_distinct(&mut by_address.user_agents, ua);
        }
        by_address.times.push(at_ms);
        by_address.time_strings.push(at_str.clone());
        let address_count = by_address.count;

        let first_visit = !self.data.contains_key(&visit.credential);
        let by_token = self
            .data
            .entry(visit.credential.clone())
            .or_insert_with(|| TokenUsage {
                created_at: at_ms,
                ..TokenUsage::default()
            });
        by_token.count += 1;
        push_distinct(&mut by_token.ips, &visit.address);
        if let Some(user_id) = &visit.user_id {
            push_distinct(&mut by_token.user_ids, user_id);
        }
        if let Some(ua) = &visit.user_agent {
            push_distinct(&mut by_token.user_agents, ua);
        }
        if let Some(prompt) = &visit.prompt {
            by_token.prompts.push(prompt.clone());
        }
        by_token.times.push(at_ms);
        by_token.time_strings.push(at_str);
        let token_count = by_token.count;

        self.total += 1;

        UsageSnapshot {
            address_count,
            token_count,
            first_visit,
            total: self.total,
        }
    }

    pub fn address_count(&self, address: &str) -> u64 {
        self.ip_info.get(address).map_or(0, |u| u.count)
    }
}

fn push_distinct(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn visit(address: &str, token: &str, prompt: &str) -> Visit {
        let identity = ClientIdentity::new(address)
            .with_token(token)
            .with_user_agent("test-agent");
        Visit::new(
            &identity,
            Some(prompt),
            Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_record_updates_both_aggregates() {
        let mut stats = UsageStatistics::default();

        let first = stats.record(&visit("1.1.1.1", "tok-a", "hello"));
        assert!(first.first_visit);
        assert_eq!(first.address_count, 1);

        let second = stats.record(&visit("2.2.2.2", "tok-a", "again"));
        assert!(!second.first_visit);
        assert_eq!(second.token_count, 2);
        assert_eq!(second.total, 2);

        let token = &stats.data["tok-a"];
        assert_eq!(token.ips, vec!["1.1.1.1", "2.2.2.2"]);
        assert_eq!(token.prompts, vec!["hello", "again"]);
        assert_eq!(token.times.len(), 2);
        assert_eq!(token.time_strings.len(), 2);
        assert_eq!(token.user_agents, vec!["test-agent"]);
    }

    #[test]
    fn test_cross_references_are_distinct() {
        let mut stats = UsageStatistics::default();
        stats.record(&visit("1.1.1.1", "tok-a", "p1"));
        stats.record(&visit("1.1.1.1", "tok-a", "p2"));
        stats.record(&visit("1.1.1.1", "tok-b", "p3"));

        let address = &stats.ip_info["1.1.1.1"];
        assert_eq!(address.count, 3);
        assert_eq!(address.tokens, vec!["tok-a", "tok-b"]);
        assert_eq!(stats.address_count("1.1.1.1"), 3);
        assert_eq!(stats.address_count("9.9.9.9"), 0);
    }

    #[test]
    fn test_signed_in_user_is_recorded_on_credential() {
        let mut stats = UsageStatistics::default();
        let identity = ClientIdentity::new("1.1.1.1")
            .with_token("tok-a")
            .with_user_id("42");
        let at = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();

        stats.record(&Visit::new(&identity, None, at));
        stats.record(&Visit::new(&identity, None, at));
        stats.record(&visit("1.1.1.1", "tok-b", "anonymous"));

        assert_eq!(stats.data["tok-a"].user_ids, vec!["42"]);
        assert!(stats.data["tok-b"].user_ids.is_empty());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["data"]["tok-a"]["userIds"][0], "42");
    }

    #[test]
    fn test_document_shape() {
        let mut stats = UsageStatistics::default();
        stats.record(&visit("1.1.1.1", "tok-a", "p1"));
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["total"], 1);
        assert_eq!(json["ipInfo"]["1.1.1.1"]["count"], 1);
        assert_eq!(json["data"]["tok-a"]["prompts"][0], "p1");
    }
}
