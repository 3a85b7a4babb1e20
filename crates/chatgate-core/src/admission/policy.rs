//! Admission settings.

use crate::domain::{BlacklistPolicy, ClientIdentity, Window, WindowBudgets};

/// Which identity projection the finest window is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionScope {
    /// `address-userAgent`: one budget per device behind an address.
    #[default]
    AddressAndAgent,
    /// Address only.
    Address,
}

/// Everything that tunes one admission pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub budgets: WindowBudgets,
    pub blacklist: BlacklistPolicy,
    /// Appended to every rejection message.
    pub friendly_tips: String,
    /// When non-empty, a credential's first request of the day is answered with this text.
    pub first_request_tip: String,
    pub session_scope: SessionScope,
}

impl AdmissionPolicy {
    /// Generous limits for auxiliary endpoints: high enough not to bother
    /// real users, low enough that scripted abuse still escalates.
    pub fn common() -> Self {
        Self {
            budgets: WindowBudgets::new(200, 2000, 20000),
            session_scope: SessionScope::Address,
            ..Self::default()
        }
    }

    /// Limiter key for `window`.
    pub fn key_for(&self, window: Window, identity: &ClientIdentity) -> String {
        match (window, self.session_scope) {
            (Window::Minute, SessionScope::AddressAndAgent) => identity.session_key(),
            _ => identity.address_key().to_string(),
        }
    }
}
