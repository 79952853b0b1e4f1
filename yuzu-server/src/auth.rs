//! Connection-time authentication support.
//!
//! The wire protocol carries a connection token as a `token` query
//! parameter on the WebSocket URL (see `yuzu-client`'s `token` module for
//! the matching encoder). `AuthInfo` exposes the parsed query string and
//! headers of the upgrade request so a host's [`crate::connection::AuthHook`]
//! can make an accept/reject decision.

use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use tokio_tungstenite::tungstenite::handshake::server::Request;

/// What an [`crate::connection::AuthHook`] sees about an incoming upgrade.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
}

impl AuthInfo {
    pub fn from_request(request: &Request) -> Self {
        let uri = request.uri();
        let path = uri.path().to_string();
        let query = uri
            .query()
            .map(parse_query)
            .unwrap_or_default();
        let headers = request
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.to_str().unwrap_or("").to_string()))
            .collect();
        AuthInfo { path, query, headers }
    }

    /// Convenience accessor for the connection token, if one was supplied.
    pub fn token(&self) -> Option<&str> {
        self.query.get("token").map(String::as_str)
    }

    /// Convenience accessor for the `Origin` header, if one was sent.
    pub fn origin(&self) -> Option<&str> {
        self.headers.get("origin").map(String::as_str)
    }
}

fn parse_query(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((decode_component(key), decode_component(value)))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_query_parameter() {
        let query = parse_query("token=abc123");
        assert_eq!(query.get("token"), Some(&"abc123".to_string()));
    }

    #[test]
    fn decodes_percent_encoded_values() {
        let query = parse_query("token=hello%20world%26more");
        assert_eq!(query.get("token"), Some(&"hello world&more".to_string()));
    }

    #[test]
    fn missing_query_string_yields_empty_map() {
        let query = parse_query("");
        assert!(query.is_empty());
    }

    #[test]
    fn multiple_parameters_all_parsed() {
        let query = parse_query("token=abc&room=lobby");
        assert_eq!(query.get("token"), Some(&"abc".to_string()));
        assert_eq!(query.get("room"), Some(&"lobby".to_string()));
    }

    #[test]
    fn from_request_captures_headers_for_origin_based_policies() {
        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .uri("/api/yuzu?token=abc")
            .header("origin", "https://example.com")
            .body(())
            .unwrap();
        let info = AuthInfo::from_request(&request);
        assert_eq!(info.origin(), Some("https://example.com"));
        assert_eq!(info.headers.get("origin"), Some(&"https://example.com".to_string()));
    }
}
