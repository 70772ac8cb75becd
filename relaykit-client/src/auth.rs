//! Relay authentication collaborators
//!
//! Signing is external: the relayer asks a [`JwtSigner`] for a short-lived
//! token whose audience is the relay URL, then a [`RelayUrlBuilder`] embeds it
//! together with the protocol and project parameters.

use async_trait::async_trait;
use relaykit_core::{Error, Result};
use url::Url;

/// Produces a signed auth token for the given audience
#[async_trait]
pub trait JwtSigner: Send + Sync {
    async fn sign_jwt(&self, aud: &str) -> Result<String>;
}

/// Signer that hands out a pre-issued token
#[derive(Debug, Clone)]
pub struct StaticJwtSigner {
    token: String,
}

impl StaticJwtSigner {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl JwtSigner for StaticJwtSigner {
    async fn sign_jwt(&self, _aud: &str) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Inputs for formatting a relay RPC URL
#[derive(Debug, Clone, Copy)]
pub struct RelayUrlParams<'a> {
    pub relay_url: &'a str,
    pub protocol: &'a str,
    pub version: u32,
    pub project_id: &'a str,
    pub auth: &'a str,
}

/// Formats the URL a connection dials
pub trait RelayUrlBuilder: Send + Sync {
    fn format_relay_rpc_url(&self, params: RelayUrlParams<'_>) -> Result<String>;
}

/// `wss://<host>?protocol=..&version=..&projectId=..&auth=..`
///
/// ```rust
/// use relaykit_client::{DefaultRelayUrlBuilder, RelayUrlBuilder, RelayUrlParams};
///
/// let url = DefaultRelayUrlBuilder
///     .format_relay_rpc_url(RelayUrlParams {
///         relay_url: "wss://relay.example.com",
///         protocol: "irn",
///         version: 2,
///         project_id: "p1",
///         auth: "jwt",
///     })
///     .unwrap();
/// assert_eq!(url, "wss://relay.example.com/?protocol=irn&version=2&projectId=p1&auth=jwt");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRelayUrlBuilder;

impl RelayUrlBuilder for DefaultRelayUrlBuilder {
    fn format_relay_rpc_url(&self, params: RelayUrlParams<'_>) -> Result<String> {
        let mut url = Url::parse(params.relay_url)
            .map_err(|e| Error::InvalidRequest(format!("invalid relay url {}: {}", params.relay_url, e)))?;

        url.query_pairs_mut()
            .append_pair("protocol", params.protocol)
            .append_pair("version", &params.version.to_string())
            .append_pair("projectId", params.project_id)
            .append_pair("auth", params.auth);

        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(relay_url: &str) -> RelayUrlParams<'_> {
        RelayUrlParams {
            relay_url,
            protocol: "irn",
            version: 2,
            project_id: "abc123",
            auth: "header.payload.sig",
        }
    }

    #[test]
    fn test_formats_all_parameters() {
        let url = DefaultRelayUrlBuilder
            .format_relay_rpc_url(params("wss://relay.walletconnect.org"))
            .unwrap();

        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("protocol".to_string(), "irn".to_string()),
                ("version".to_string(), "2".to_string()),
                ("projectId".to_string(), "abc123".to_string()),
                ("auth".to_string(), "header.payload.sig".to_string()),
            ]
        );
    }

    #[test]
    fn test_keeps_existing_query() {
        let url = DefaultRelayUrlBuilder
            .format_relay_rpc_url(params("wss://relay.example.com/path?ua=test"))
            .unwrap();
        assert!(url.starts_with("wss://relay.example.com/path?ua=test&protocol=irn"));
    }

    #[test]
    fn test_rejects_invalid_url() {
        let result = DefaultRelayUrlBuilder.format_relay_rpc_url(params("not a url"));
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_static_signer() {
        let signer = StaticJwtSigner::new("token");
        assert_eq!(signer.sign_jwt("wss://relay").await.unwrap(), "token");
    }
}
