//! Rejection reasons and the bilingual messages shown to users.

use chrono::{DateTime, Utc};

use crate::clock::format_local;
use crate::domain::Window;

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Budget for this window is used up. Recoverable by waiting.
    RateExceeded(Window),
    /// Address is on the blacklist.
    Blacklisted(BlacklistKind),
    /// Informational one-off answer to a credential's first request.
    FirstRequestTip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistKind {
    Restricted { until: DateTime<Utc> },
    Permanent,
}

/// A rejection ready to be sent back in the `Fail` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: String,
}

impl Rejection {
    pub fn rate_exceeded(window: Window, address: &str, tips: &str) -> Self {
        let message = match window {
            Window::Day => format!(
                "\n[System Info]\n当前IP({address})一天内发起的请求太多 | Too many request from this IP({address}) in 1 day {tips}"
            ),
            Window::Hour => format!(
                "\n[System Info]\n当前IP({address})一小时内发起的请求太多 | Too many request from this IP({address}) in 1 hour {tips}"
            ),
            Window::Minute => format!(
                "\n[System Info]\n当前对话一分钟内发起的请求太多 | Too many request from this chat in 1 minute{tips}"
            ),
        };

        Self {
            reason: RejectReason::RateExceeded(window),
            message,
        }
    }

    pub fn restricted(address: &str, until: DateTime<Utc>, tips: &str) -> Self {
        let when = format_local(until);
        Self {
            reason: RejectReason::Blacklisted(BlacklistKind::Restricted { until }),
            message: format!(
                "\n[System Info]\n当前IP({address})已被加入受限名单，可于{when}后再次尝试 | This IP({address}) has been added to the restricted list, please try again after {when}{tips}"
            ),
        }
    }

    pub fn permanent(address: &str, tips: &str) -> Self {
        Self {
            reason: RejectReason::Blacklisted(BlacklistKind::Permanent),
            message: format!(
                "\n[System Info]\n当前IP({address})已被加入黑名单，可联系管理员解除限制 | This IP({address}) has been added to the blacklist, please contact the administrator to remove the restriction{tips}"
            ),
        }
    }

    pub fn first_request(tip: &str) -> Self {
        Self {
            reason: RejectReason::FirstRequestTip,
            message: tip.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_address() {
        let day = Rejection::rate_exceeded(Window::Day, "1.2.3.4", "");
        assert!(day.message.contains("IP(1.2.3.4)"));
        assert!(day.message.contains("in 1 day"));

        let minute = Rejection::rate_exceeded(Window::Minute, "1.2.3.4", " tip");
        assert!(minute.message.ends_with("in 1 minute tip"));
        assert_eq!(minute.reason, RejectReason::RateExceeded(Window::Minute));
    }

    #[test]
    fn test_blacklist_messages() {
        let permanent = Rejection::permanent("1.2.3.4", "");
        assert!(permanent.message.contains("contact the administrator"));

        let until = DateTime::from_timestamp(1_720_000_000, 0).unwrap();
        let restricted = Rejection::restricted("1.2.3.4", until, "");
        assert!(restricted.message.contains(&format_local(until)));
        assert_eq!(
            restricted.reason,
            RejectReason::Blacklisted(BlacklistKind::Restricted { until })
        );
    }
}
