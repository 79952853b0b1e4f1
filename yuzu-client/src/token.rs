//! Connection token sourcing (§4.5, §6, §8 scenario 6).
//!
//! A connection address is the transport URL extended with a `token`
//! query parameter, if configured. The source is either a fixed string
//! or a callback invoked fresh on every connect attempt, so rotated
//! tokens are picked up across reconnects. URL-encoding the rest of the
//! address is the caller's responsibility; the library always
//! percent-encodes the token value itself.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use yuzu_core::Result;

type TokenFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// Characters left unescaped beyond alphanumerics, matching the common
/// `encodeURIComponent` set.
const TOKEN_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Where the client gets its connection token from.
#[derive(Clone)]
pub enum TokenSource {
    /// A fixed string supplied at construction time.
    Fixed(String),
    /// A callback invoked on every connect attempt; may resolve
    /// synchronously or asynchronously (§5: "the only place the client
    /// awaits during a connect attempt").
    Callback(Arc<dyn Fn() -> TokenFuture + Send + Sync>),
}

impl TokenSource {
    pub fn fixed(token: impl Into<String>) -> Self {
        TokenSource::Fixed(token.into())
    }

    pub fn callback<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        TokenSource::Callback(Arc::new(move || Box::pin(f()) as TokenFuture))
    }

    /// Resolve the current token value.
    pub async fn resolve(&self) -> Result<String> {
        match self {
            TokenSource::Fixed(value) => Ok(value.clone()),
            TokenSource::Callback(f) => f().await,
        }
    }
}

/// Append `?token=<percent-encoded>` (or `&token=...` if the address
/// already has a query string) to `address`.
pub fn address_with_token(address: &str, token: &str) -> String {
    let encoded = utf8_percent_encode(token, TOKEN_ENCODE_SET);
    let separator = if address.contains('?') { '&' } else { '?' };
    format!("{address}{separator}token={encoded}")
}
