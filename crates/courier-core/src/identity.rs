// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local claim extraction from the opaque session credential.
//!
//! The gateway is the only authority on whether a credential is valid. The
//! client reads the JWT payload purely to know who it is before (and in
//! addition to) the handshake; signatures are never checked here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use url::Url;

use crate::error::CourierError;
use crate::types::ClientIdentity;

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    device_id: Option<String>,
}

/// Reads `user_id` (or `sub`) and `device_id` from a JWT-shaped token.
///
/// Returns `None` when the token is not three dot-separated segments, the
/// payload is not base64url JSON, or either claim is missing.
pub fn claims_from_token(token: &str) -> Option<ClientIdentity> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;

    Some(ClientIdentity {
        user_id: claims.user_id.or(claims.sub)?,
        device_id: claims.device_id?,
    })
}

/// Adds the credential to the gateway URL as the `token` query parameter.
///
/// Existing query pairs and any fragment are preserved. Fails with
/// [`CourierError::Config`] when `gateway_url` does not parse.
pub fn url_with_token(gateway_url: &str, token: &str) -> Result<String, CourierError> {
    let mut url = Url::parse(gateway_url).map_err(|e| {
        CourierError::Config(format!("invalid gateway URL `{gateway_url}`: {e}"))
    })?;
    if !token.is_empty() {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn extracts_user_and_device() {
        let token = token_with(r#"{"user_id":"user_1","device_id":"phone"}"#);
        let identity = claims_from_token(&token).unwrap();
        assert_eq!(identity.user_id, "user_1");
        assert_eq!(identity.device_id, "phone");
    }

    #[test]
    fn falls_back_to_subject_claim() {
        let token = token_with(r#"{"sub":"user_2","device_id":"web"}"#);
        assert_eq!(claims_from_token(&token).unwrap().user_id, "user_2");
    }

    #[test]
    fn undecodable_tokens_yield_no_identity() {
        assert!(claims_from_token("not-a-jwt").is_none());
        assert!(claims_from_token("a.%%%.c").is_none());
        assert!(claims_from_token(&token_with(r#"{"user_id":"u"}"#)).is_none());
        assert!(claims_from_token("a.b.c.d").is_none());
    }

    #[test]
    fn token_is_appended_as_query_parameter() {
        assert_eq!(
            url_with_token("ws://gw/ws", "abc.def").unwrap(),
            "ws://gw/ws?token=abc.def"
        );
        assert_eq!(
            url_with_token("ws://gw/ws?v=2", "a+b").unwrap(),
            "ws://gw/ws?v=2&token=a%2Bb"
        );
        assert_eq!(url_with_token("ws://gw/ws", "").unwrap(), "ws://gw/ws");
    }

    #[test]
    fn token_goes_in_query_not_fragment() {
        let url = url_with_token("wss://gw.example/ws#main", "abc").unwrap();
        assert_eq!(url, "wss://gw.example/ws?token=abc#main");

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.fragment(), Some("main"));
        assert!(parsed.query_pairs().any(|(k, v)| k == "token" && v == "abc"));
    }

    #[test]
    fn unparseable_gateway_url_is_config_error() {
        let err = url_with_token("not a url", "abc").unwrap_err();
        assert!(matches!(err, CourierError::Config(_)));
    }
}
