//! Client identity and the keys limiters derive from it.

/// Placeholder key used when no address could be resolved.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Everything the admission layer knows about who is calling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Network address, first hop of the forwarding chain.
    pub address: String,
    /// Session credential (`ACCESS-TOKEN` / `TEMP-ACCESS-TOKEN` cookie).
    pub token: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
}

impl ClientIdentity {
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        let address = if address.trim().is_empty() {
            UNKNOWN_ADDRESS.to_string()
        } else {
            address
        };

        Self {
            address,
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then(|| token.trim().to_string());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Key for address-scoped limiters and the blacklist.
    pub fn address_key(&self) -> &str {
        &self.address
    }

    /// Key for the session-scoped limiter: address plus user agent.
    pub fn session_key(&self) -> String {
        format!(
            "{}-{}",
            self.address,
            self.user_agent.as_deref().unwrap_or("undefined")
        )
    }

    /// Key for credential-scoped accounting; falls back to the address.
    pub fn credential_key(&self) -> &str {
        self.token.as_deref().unwrap_or(&self.address)
    }

    pub fn is_unresolved(&self) -> bool {
        self.address == UNKNOWN_ADDRESS
    }
}

/// Picks the client address from forwarding headers, falling back to the peer.
///
/// `x-forwarded-for` may carry a chain (`client, proxy1, proxy2`); the first
/// hop is the client.
pub fn resolve_address(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer: Option<&str>,
) -> String {
    let first_hop = forwarded_for
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    first_hop
        .or_else(|| real_ip.map(str::trim).filter(|s| !s.is_empty()))
        .or_else(|| peer.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or(UNKNOWN_ADDRESS)
        .to_string()
}
