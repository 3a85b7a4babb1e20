//! Client identity extraction from headers, cookies and the connection.

use actix_web::{HttpMessage, HttpRequest, http::header};

use chatgate_core::domain::{ClientIdentity, resolve_address};
use chatgate_core::ports::SessionClaims;

/// Cookie holding a signed-in user's session token.
pub const ACCESS_TOKEN_COOKIE: &str = "ACCESS-TOKEN";
/// Cookie holding an anonymous visitor's session token.
pub const TEMP_ACCESS_TOKEN_COOKIE: &str = "TEMP-ACCESS-TOKEN";

/// Session token from the cookies, signed-in token first.
pub fn session_token(req: &HttpRequest) -> Option<String> {
    [ACCESS_TOKEN_COOKIE, TEMP_ACCESS_TOKEN_COOKIE]
        .into_iter()
        .filter_map(|name| req.cookie(name))
        .map(|cookie| cookie.value().trim().to_string())
        .find(|token| !token.is_empty())
}

/// Builds the admission identity for `req`.
///
/// Claims verified by the session middleware, when present, supply the user id.
pub fn client_identity(req: &HttpRequest) -> ClientIdentity {
    let header_str = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());

    let peer = req.peer_addr().map(|addr| addr.ip().to_string());
    let address = resolve_address(
        header_str("x-forwarded-for"),
        header_str("x-real-ip"),
        peer.as_deref(),
    );

    let mut identity = ClientIdentity::new(address);

    if let Some(user_agent) = header_str(header::USER_AGENT.as_str()) {
        identity = identity.with_user_agent(user_agent);
    }
    if let Some(token) = session_token(req) {
        identity = identity.with_token(token);
    }
    if let Some(claims) = req.extensions().get::<SessionClaims>() {
        identity = identity.with_user_id(claims.user_id.clone());
    }

    identity
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    #[test]
    fn test_identity_from_proxy_headers() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.7, 10.0.0.1"))
            .insert_header(("user-agent", "Mozilla/5.0"))
            .cookie(Cookie::new(TEMP_ACCESS_TOKEN_COOKIE, "temp"))
            .to_http_request();

        let identity = client_identity(&req);

        assert_eq!(identity.address, "203.0.113.7");
        assert_eq!(identity.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(identity.token.as_deref(), Some("temp"));
        assert_eq!(identity.session_key(), "203.0.113.7-Mozilla/5.0");
    }

    #[test]
    fn test_signed_in_cookie_wins() {
        let req = TestRequest::default()
            .cookie(Cookie::new(TEMP_ACCESS_TOKEN_COOKIE, "temp"))
            .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, "real"))
            .to_http_request();

        assert_eq!(session_token(&req).as_deref(), Some("real"));
    }

    #[test]
    fn test_peer_address_fallback() {
        let req = TestRequest::default()
            .peer_addr("192.0.2.1:5555".parse().unwrap())
            .to_http_request();

        let identity = client_identity(&req);
        assert_eq!(identity.address, "192.0.2.1");
        assert!(identity.token.is_none());
        assert_eq!(identity.session_key(), "192.0.2.1-undefined");
    }

    #[test]
    fn test_verified_claims_supply_user_id() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(SessionClaims {
            user_id: "7".to_string(),
            name: "bob".to_string(),
            exp: 0,
        });

        assert_eq!(client_identity(&req).user_id.as_deref(), Some("7"));
    }
}
