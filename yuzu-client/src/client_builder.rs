//! Client builder for configuring transport, token sourcing, reconnection
//! and observability (§6).
//!
//! # Examples
//!
//! ```rust,no_run
//! use yuzu_client::ClientBuilder;
//!
//! # async fn example() -> yuzu_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8080/api/yuzu")
//!     .token("fixed-token")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::client::{OnMessage, Transport, YuzuClient};
use crate::reconnect::DEFAULT_RECONNECT_TIMEOUT;
use crate::token::TokenSource;
use crate::ClientMetrics;
use std::sync::Arc;
use std::time::Duration;
use yuzu_core::{Error, ObservabilityConfig, Result};

/// Builder for configuring and constructing a [`YuzuClient`].
pub struct ClientBuilder {
    address: String,
    token: Option<TokenSource>,
    reconnect_timeout: Duration,
    on_message: Option<OnMessage>,
    observability: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder pointed at `address` (a `ws://` or `wss://`
    /// URL). In default transport mode this is the address the library
    /// dials; in external transport mode it is retained only for
    /// diagnostics (the host owns the actual connection).
    pub fn new(address: impl Into<String>) -> Self {
        ClientBuilder {
            address: address.into(),
            token: None,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
            on_message: None,
            observability: None,
            service_name: None,
        }
    }

    /// Use a fixed token, appended as a `token` query parameter on every
    /// connect attempt.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(TokenSource::fixed(token));
        self
    }

    /// Resolve the token freshly on every connect attempt (§8 scenario
    /// 6: token rotation survives reconnects since the callback is
    /// invoked again on each attempt).
    pub fn get_token<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String>> + Send + 'static,
    {
        self.token = Some(TokenSource::callback(f));
        self
    }

    /// Override the fixed reconnect interval (default 3000ms, §9: a
    /// constant delay rather than exponential backoff).
    pub fn reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    /// Hand transport ownership to the host (§4.6): the library no
    /// longer opens a WebSocket itself. Outgoing wire messages are
    /// handed to `on_message`; the host feeds incoming bytes back in
    /// through [`YuzuClient::handle_server_message`].
    pub fn external_transport<F>(mut self, on_message: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(on_message));
        self
    }

    /// Enable OpenTelemetry observability with custom configuration.
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration.
    pub fn with_default_observability(mut self) -> Self {
        self.observability = Some(ObservabilityConfig::default());
        self
    }

    /// Set the service name reported to observability, if enabled.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the client and open its initial connection (§4.5: "on
    /// construction, connect immediately").
    pub async fn connect(self) -> Result<YuzuClient> {
        let metrics = if let Some(mut config) = self.observability {
            if let Some(name) = &self.service_name {
                config.service_name = name.clone();
            }
            yuzu_core::init_observability(config.clone())
                .map_err(|e| Error::internal(format!("failed to initialize observability: {e}")))?;
            Some(Arc::new(ClientMetrics::new(&config.service_name)))
        } else {
            None
        };

        let transport = match self.on_message {
            Some(on_message) => Transport::External { on_message },
            None => Transport::Default { outbound: None },
        };

        let client = YuzuClient::new(self.address, self.token, self.reconnect_timeout, transport, metrics);
        client.connect().await?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn external_transport_connect_sends_complete_without_a_real_socket() {
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let client = ClientBuilder::new("ws://localhost:0/api/yuzu")
            .external_transport(move |msg| sent_clone.lock().unwrap().push(msg))
            .connect()
            .await
            .unwrap();

        assert!(!client.is_connected());
        assert_eq!(sent.lock().unwrap().as_slice(), [r#"{"type":"complete"}"#.to_string()]);
    }

    #[tokio::test]
    async fn default_reconnect_timeout_is_three_seconds() {
        let builder = ClientBuilder::new("ws://localhost:8080/api/yuzu");
        assert_eq!(builder.reconnect_timeout, Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn reconnect_timeout_can_be_overridden() {
        let builder = ClientBuilder::new("ws://localhost:8080/api/yuzu")
            .reconnect_timeout(Duration::from_millis(500));
        assert_eq!(builder.reconnect_timeout, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn token_sets_a_fixed_source() {
        let builder = ClientBuilder::new("ws://localhost:8080/api/yuzu").token("abc123");
        match builder.token {
            Some(TokenSource::Fixed(value)) => assert_eq!(value, "abc123"),
            _ => panic!("expected a fixed token source"),
        }
    }
}
