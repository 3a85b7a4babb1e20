//! The admission pipeline: ordered stages that end in `Admit` or `Reject`.
//!
//! Stage order is fixed:
//! 1. whitelist (admit immediately, statistics still recorded)
//! 2. blacklist (reject while restricted or imprisoned)
//! 3. day window (exhaustion escalates the blacklist entry)
//! 4. hour window
//! 5. minute / session window
//! 6. statistics, restart-safety re-check, first-request tip

use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::admission::message::Rejection;
use crate::admission::policy::AdmissionPolicy;
use crate::clock::Clock;
use crate::domain::{ClientIdentity, Standing, UsageSnapshot, Visit, Window};
use crate::ports::{AccessListRepository, RateLimiter, UsageRecorder};

/// Final verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject(Rejection),
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }
}

/// One limiter per window, owned by a single pipeline.
#[derive(Clone)]
pub struct WindowLimiters {
    pub day: Arc<dyn RateLimiter>,
    pub hour: Arc<dyn RateLimiter>,
    pub minute: Arc<dyn RateLimiter>,
}

impl WindowLimiters {
    pub fn get(&self, window: Window) -> &Arc<dyn RateLimiter> {
        match window {
            Window::Day => &self.day,
            Window::Hour => &self.hour,
            Window::Minute => &self.minute,
        }
    }
}

type Stage = ControlFlow<Decision>;

/// Request admission: access list, window limits, usage accounting.
#[derive(Clone)]
pub struct AdmissionPipeline {
    policy: AdmissionPolicy,
    limiters: WindowLimiters,
    access: Arc<dyn AccessListRepository>,
    usage: Option<Arc<dyn UsageRecorder>>,
    clock: Arc<dyn Clock>,
}

impl AdmissionPipeline {
    pub fn new(
        policy: AdmissionPolicy,
        limiters: WindowLimiters,
        access: Arc<dyn AccessListRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            limiters,
            access,
            usage: None,
            clock,
        }
    }

    /// Enables usage statistics and the restart-safety re-check.
    pub fn with_usage(mut self, usage: Arc<dyn UsageRecorder>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Runs every stage for one request.
    pub async fn evaluate(&self, identity: &ClientIdentity, prompt: Option<&str>) -> Decision {
        let now = self.clock.now();

        if identity.is_unresolved() {
            tracing::debug!("Client address unresolved, using wildcard identity");
        }

        if let ControlFlow::Break(decision) = self.check_access_list(identity, prompt, now).await {
            return decision;
        }

        if let ControlFlow::Break(decision) = self.consume_windows(identity, now).await {
            return decision;
        }

        match self.record_usage(identity, prompt, now).await {
            ControlFlow::Break(decision) => decision,
            ControlFlow::Continue(()) => Decision::Admit,
        }
    }

    async fn check_access_list(
        &self,
        identity: &ClientIdentity,
        prompt: Option<&str>,
        now: DateTime<Utc>,
    ) -> Stage {
        let address = identity.address_key();
        let tips = &self.policy.friendly_tips;

        let standing = match self.access.standing(address, now).await {
            Ok(standing) => standing,
            Err(e) => {
                tracing::error!(address = %address, error = %e, "Access list unavailable, failing open");
                return ControlFlow::Continue(());
            }
        };

        match standing {
            Standing::Whitelisted => {
                self.record_visit(identity, prompt, now).await;
                ControlFlow::Break(Decision::Admit)
            }
            Standing::Imprisoned => {
                ControlFlow::Break(Decision::Reject(Rejection::permanent(address, tips)))
            }
            Standing::Restricted { until } => ControlFlow::Break(Decision::Reject(
                Rejection::restricted(address, until, tips),
            )),
            Standing::Released => {
                tracing::info!(address = %address, "Address has been released from the blacklist");
                ControlFlow::Continue(())
            }
            Standing::Clean => ControlFlow::Continue(()),
        }
    }

    async fn consume_windows(&self, identity: &ClientIdentity, now: DateTime<Utc>) -> Stage {
        let address = identity.address_key();

        for window in Window::ORDER {
            let key = self.policy.key_for(window, identity);

            let result = match self.limiters.get(window).consume(&key).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(window = %window, key = %key, error = %e, "Rate limiter error, failing open");
                    continue;
                }
            };

            if result.allowed {
                continue;
            }

            tracing::warn!(window = %window, key = %key, "Rate limit exceeded");

            if window.escalates() {
                match self
                    .access
                    .register_exhaustion(address, now, &self.policy.blacklist)
                    .await
                {
                    Ok(escalation) => tracing::warn!(
                        address = %address,
                        limit_count = escalation.entry.limit_count,
                        in_prison = escalation.entry.is_in_prison,
                        "Address added to blacklist"
                    ),
                    Err(e) => {
                        tracing::error!(address = %address, error = %e, "Failed to persist blacklist entry")
                    }
                }
            }

            return ControlFlow::Break(Decision::Reject(Rejection::rate_exceeded(
                window,
                address,
                &self.policy.friendly_tips,
            )));
        }

        ControlFlow::Continue(())
    }

    async fn record_usage(
        &self,
        identity: &ClientIdentity,
        prompt: Option<&str>,
        now: DateTime<Utc>,
    ) -> Stage {
        let Some(snapshot) = self.record_visit(identity, prompt, now).await else {
            return ControlFlow::Continue(());
        };

        let day_budget = u64::from(self.policy.budgets.day);
        if day_budget > 0 && snapshot.address_count > day_budget {
            tracing::warn!(
                address = %identity.address_key(),
                count = snapshot.address_count,
                budget = day_budget,
                "Persisted daily count exceeds budget"
            );
            return ControlFlow::Break(Decision::Reject(Rejection::rate_exceeded(
                Window::Day,
                identity.address_key(),
                &self.policy.friendly_tips,
            )));
        }

        if snapshot.first_visit && !self.policy.first_request_tip.is_empty() {
            return ControlFlow::Break(Decision::Reject(Rejection::first_request(
                &self.policy.first_request_tip,
            )));
        }

        ControlFlow::Continue(())
    }

    async fn record_visit(
        &self,
        identity: &ClientIdentity,
        prompt: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<UsageSnapshot> {
        let usage = self.usage.as_ref()?;
        let visit = Visit::new(identity, prompt, now);

        match usage.record(&visit).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::error!(address = %visit.address, error = %e, "Failed to record usage");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone};

    use crate::admission::message::{BlacklistKind, RejectReason};
    use crate::clock::ManualClock;
    use crate::domain::{
        AccessList, BlacklistPolicy, Escalation, UsageStatistics, WindowBudgets,
    };
    use crate::error::StoreError;
    use crate::ports::{RateLimitError, RateLimitResult};

    /// Counts forever; no window expiry.
    struct CountingLimiter {
        budget: u32,
        counts: Mutex<HashMap<String, u32>>,
    }

    impl CountingLimiter {
        fn new(budget: u32) -> Arc<Self> {
            Arc::new(Self {
                budget,
                counts: Mutex::new(HashMap::new()),
            })
        }

        fn reset(&self) {
            self.counts.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl RateLimiter for CountingLimiter {
        async fn consume(&self, key: &str) -> Result<RateLimitResult, RateLimitError> {
            if self.budget == 0 {
                return Ok(RateLimitResult::unlimited());
            }
            let mut counts = self.counts.lock().unwrap();
            let used = counts.entry(key.to_string()).or_insert(0);
            let allowed = *used < self.budget;
            if allowed {
                *used += 1;
            }
            Ok(RateLimitResult {
                allowed,
                remaining: self.budget.saturating_sub(*used),
                reset_after: Duration::from_secs(60),
            })
        }
    }

    struct BrokenLimiter;

    #[async_trait]
    impl RateLimiter for BrokenLimiter {
        async fn consume(&self, _key: &str) -> Result<RateLimitResult, RateLimitError> {
            Err(RateLimitError::Backend("down".to_string()))
        }
    }

    #[derive(Default)]
    struct MemoryAccessList {
        list: Mutex<AccessList>,
        fail_writes: bool,
    }

    #[async_trait]
    impl AccessListRepository for MemoryAccessList {
        async fn standing(
            &self,
            address: &str,
            now: DateTime<Utc>,
        ) -> Result<Standing, StoreError> {
            Ok(self.list.lock().unwrap().standing(address, now))
        }

        async fn register_exhaustion(
            &self,
            address: &str,
            now: DateTime<Utc>,
            policy: &BlacklistPolicy,
        ) -> Result<Escalation, StoreError> {
            let escalation = self
                .list
                .lock()
                .unwrap()
                .register_exhaustion(address, now, policy);
            if self.fail_writes {
                return Err(StoreError::Write {
                    path: "limitIp.json".to_string(),
                    message: "disk full".to_string(),
                });
            }
            Ok(escalation)
        }
    }

    #[derive(Default)]
    struct MemoryUsage {
        stats: Mutex<UsageStatistics>,
    }

    #[async_trait]
    impl UsageRecorder for MemoryUsage {
        async fn record(&self, visit: &Visit) -> Result<UsageSnapshot, StoreError> {
            Ok(self.stats.lock().unwrap().record(visit))
        }
    }

    struct Harness {
        pipeline: AdmissionPipeline,
        day: Arc<CountingLimiter>,
        access: Arc<MemoryAccessList>,
        usage: Arc<MemoryUsage>,
        clock: Arc<ManualClock>,
    }

    fn harness(policy: AdmissionPolicy) -> Harness {
        harness_with_access(policy, Arc::new(MemoryAccessList::default()))
    }

    fn harness_with_access(policy: AdmissionPolicy, access: Arc<MemoryAccessList>) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap(),
        ));
        let day = CountingLimiter::new(policy.budgets.day);
        let limiters = WindowLimiters {
            day: day.clone(),
            hour: CountingLimiter::new(policy.budgets.hour),
            minute: CountingLimiter::new(policy.budgets.minute),
        };
        let usage = Arc::new(MemoryUsage::default());
        let pipeline = AdmissionPipeline::new(policy, limiters, access.clone(), clock.clone())
            .with_usage(usage.clone());

        Harness {
            pipeline,
            day,
            access,
            usage,
            clock,
        }
    }

    fn policy(minute: u32, hour: u32, day: u32) -> AdmissionPolicy {
        AdmissionPolicy {
            budgets: WindowBudgets::new(minute, hour, day),
            ..AdmissionPolicy::default()
        }
    }

    fn client(address: &str) -> ClientIdentity {
        ClientIdentity::new(address)
            .with_token(format!("token-{address}"))
            .with_user_agent("test-agent")
    }

    #[tokio::test]
    async fn test_unlimited_budgets_always_admit() {
        let h = harness(policy(0, 0, 0));
        for _ in 0..50 {
            assert!(h.pipeline.evaluate(&client("1.1.1.1"), Some("hi")).await.is_admit());
        }
    }

    #[tokio::test]
    async fn test_minute_burst_rejects_without_blacklisting() {
        let h = harness(policy(3, 100, 1000));
        let id = client("1.1.1.1");

        for _ in 0..3 {
            assert_eq!(h.pipeline.evaluate(&id, None).await, Decision::Admit);
        }

        match h.pipeline.evaluate(&id, None).await {
            Decision::Reject(r) => assert_eq!(r.reason, RejectReason::RateExceeded(Window::Minute)),
            Decision::Admit => panic!("fourth request should be rejected"),
        }
        assert!(h.access.list.lock().unwrap().entry("1.1.1.1").is_none());
    }

    #[tokio::test]
    async fn test_hour_exhaustion_does_not_blacklist() {
        let h = harness(policy(0, 2, 0));
        let id = client("1.1.1.1");
        h.pipeline.evaluate(&id, None).await;
        h.pipeline.evaluate(&id, None).await;

        match h.pipeline.evaluate(&id, None).await {
            Decision::Reject(r) => assert_eq!(r.reason, RejectReason::RateExceeded(Window::Hour)),
            Decision::Admit => panic!("expected hour rejection"),
        }
        assert!(h.access.list.lock().unwrap().blacklist.is_empty());
    }

    #[tokio::test]
    async fn test_day_exhaustion_creates_blacklist_entry() {
        let h = harness(policy(0, 0, 5));
        let id = client("2.2.2.2");

        for _ in 0..5 {
            assert!(h.pipeline.evaluate(&id, None).await.is_admit());
        }

        match h.pipeline.evaluate(&id, None).await {
            Decision::Reject(r) => assert_eq!(r.reason, RejectReason::RateExceeded(Window::Day)),
            Decision::Admit => panic!("sixth request should be rejected"),
        }

        let entry = *h.access.list.lock().unwrap().entry("2.2.2.2").unwrap();
        assert_eq!(entry.limit_count, 1);
        assert!(!entry.is_in_prison);
        assert_eq!(entry.can_use_at(), h.clock.now() + TimeDelta::hours(24));
    }

    #[tokio::test]
    async fn test_restricted_address_is_rejected_until_released() {
        let h = harness(policy(0, 0, 1));
        let id = client("3.3.3.3");
        h.pipeline.evaluate(&id, None).await;
        h.pipeline.evaluate(&id, None).await;

        match h.pipeline.evaluate(&id, None).await {
            Decision::Reject(r) => assert!(matches!(
                r.reason,
                RejectReason::Blacklisted(BlacklistKind::Restricted { .. })
            )),
            Decision::Admit => panic!("restricted address admitted"),
        }

        h.clock.advance(TimeDelta::hours(24));
        h.day.reset();
        h.usage.stats.lock().unwrap().ip_info.clear();

        assert!(h.pipeline.evaluate(&id, None).await.is_admit());
        assert!(h.access.list.lock().unwrap().entry("3.3.3.3").is_some());
    }

    #[tokio::test]
    async fn test_repeated_exhaustion_imprisons() {
        let mut p = policy(0, 0, 1);
        p.blacklist = BlacklistPolicy {
            escalation_threshold: 3,
            ..BlacklistPolicy::default()
        };
        let h = harness(p);
        let id = client("4.4.4.4");

        for _ in 0..4 {
            h.pipeline.evaluate(&id, None).await;
            h.pipeline.evaluate(&id, None).await;
            h.clock.advance(TimeDelta::hours(25));
            h.day.reset();
            h.usage.stats.lock().unwrap().ip_info.clear();
        }

        let entry = *h.access.list.lock().unwrap().entry("4.4.4.4").unwrap();
        assert_eq!(entry.limit_count, 4);
        assert!(entry.is_in_prison);

        match h.pipeline.evaluate(&id, None).await {
            Decision::Reject(r) => {
                assert_eq!(r.reason, RejectReason::Blacklisted(BlacklistKind::Permanent))
            }
            Decision::Admit => panic!("imprisoned address admitted"),
        }
    }

    #[tokio::test]
    async fn test_whitelist_bypasses_everything() {
        let access = Arc::new(MemoryAccessList::default());
        {
            let mut list = access.list.lock().unwrap();
            list.whitelist("5.5.5.5");
            list.register_exhaustion(
                "5.5.5.5",
                Utc.with_ymd_and_hms(2024, 7, 10, 11, 0, 0).unwrap(),
                &BlacklistPolicy::default(),
            );
        }
        let h = harness_with_access(policy(1, 1, 1), access);
        let id = client("5.5.5.5");

        for _ in 0..10 {
            assert!(h.pipeline.evaluate(&id, None).await.is_admit());
        }
        assert_eq!(h.usage.stats.lock().unwrap().address_count("5.5.5.5"), 10);
    }

    #[tokio::test]
    async fn test_persisted_count_guards_after_restart() {
        let h = harness(policy(0, 0, 3));
        let id = client("6.6.6.6");
        for _ in 0..3 {
            assert!(h.pipeline.evaluate(&id, None).await.is_admit());
        }

        // In-memory windows are gone after a restart; statistics are not.
        h.day.reset();

        match h.pipeline.evaluate(&id, None).await {
            Decision::Reject(r) => assert_eq!(r.reason, RejectReason::RateExceeded(Window::Day)),
            Decision::Admit => panic!("persisted count should reject"),
        }
    }

    #[tokio::test]
    async fn test_first_request_tip_is_shown_once() {
        let mut p = policy(0, 0, 0);
        p.first_request_tip = "Welcome!".to_string();
        let h = harness(p);
        let id = client("7.7.7.7");

        match h.pipeline.evaluate(&id, Some("hello")).await {
            Decision::Reject(r) => {
                assert_eq!(r.reason, RejectReason::FirstRequestTip);
                assert_eq!(r.message, "Welcome!");
            }
            Decision::Admit => panic!("expected the first request tip"),
        }
        assert!(h.pipeline.evaluate(&id, Some("hello")).await.is_admit());
    }

    #[tokio::test]
    async fn test_failed_blacklist_write_still_rejects() {
        let access = Arc::new(MemoryAccessList {
            fail_writes: true,
            ..MemoryAccessList::default()
        });
        let h = harness_with_access(policy(0, 0, 1), access);
        let id = client("8.8.8.8");
        h.pipeline.evaluate(&id, None).await;

        assert!(!h.pipeline.evaluate(&id, None).await.is_admit());
        assert!(h.access.list.lock().unwrap().entry("8.8.8.8").is_some());
    }

    #[tokio::test]
    async fn test_limiter_errors_fail_open() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let broken: Arc<dyn RateLimiter> = Arc::new(BrokenLimiter);
        let limiters = WindowLimiters {
            day: broken.clone(),
            hour: broken.clone(),
            minute: broken,
        };
        let pipeline = AdmissionPipeline::new(
            policy(1, 1, 1),
            limiters,
            Arc::new(MemoryAccessList::default()),
            clock,
        );

        assert!(pipeline.evaluate(&client("9.9.9.9"), None).await.is_admit());
        assert!(pipeline.evaluate(&client("9.9.9.9"), None).await.is_admit());
    }
}
