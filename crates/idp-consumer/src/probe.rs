//! Outbound health probe of an IDP URL.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

/// Why a probe produced no HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("probe of {url} failed: {reason}")]
pub struct ProbeError {
    pub url: String,
    pub reason: String,
}

pub trait Probe: Send + Sync + 'static {
    /// The status the URL answered with, whatever its range.
    fn probe(&self, url: &str) -> impl Future<Output = Result<u16, ProbeError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub accept: String,
    pub user_agent: String,
    /// Routes every probe through this proxy when set.
    pub https_proxy: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeSetupError {
    #[error("invalid probe header {name}: {value:?}")]
    InvalidHeader { name: &'static str, value: String },
    #[error("invalid HTTPS_PROXY {proxy:?}: {source}")]
    InvalidProxy {
        proxy: String,
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// GETs the URL with fixed `Accept` and `User-Agent` headers. Redirects are
/// not followed, so a 3xx is reported as such.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(settings: &ProbeSettings) -> Result<Self, ProbeSetupError> {
        let header = |name: &'static str, value: &str| {
            HeaderValue::from_str(value).map_err(|_| ProbeSetupError::InvalidHeader {
                name,
                value: value.to_string(),
            })
        };
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header("Accept", &settings.accept)?);
        headers.insert(USER_AGENT, header("User-Agent", &settings.user_agent)?);

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::none());
        if let Some(proxy) = &settings.https_proxy {
            let proxy_config =
                reqwest::Proxy::all(proxy).map_err(|source| ProbeSetupError::InvalidProxy {
                    proxy: proxy.clone(),
                    source,
                })?;
            builder = builder.proxy(proxy_config);
        }

        Ok(Self {
            client: builder.build().map_err(ProbeSetupError::Client)?,
        })
    }
}

impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self.client.get(url).send().await.map_err(|e| ProbeError {
            url: url.to_string(),
            reason: if e.is_timeout() {
                "timed out".to_string()
            } else {
                e.to_string()
            },
        })?;
        let status = response.status().as_u16();
        debug!(url, status, "Probe answered");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn settings(timeout: Duration) -> ProbeSettings {
        ProbeSettings {
            timeout,
            accept: "*/*".to_string(),
            user_agent: "Sonde AgentConnect https://status.agentconnect.gouv.fr/".to_string(),
            https_proxy: None,
        }
    }

    #[tokio::test]
    async fn sends_fixed_headers_and_relays_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/health")
                    .header("accept", "*/*")
                    .header(
                        "user-agent",
                        "Sonde AgentConnect https://status.agentconnect.gouv.fr/",
                    );
                then.status(503);
            })
            .await;

        let probe = HttpProbe::new(&settings(Duration::from_secs(2))).unwrap();
        assert_eq!(probe.probe(&server.url("/health")).await, Ok(503));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn redirects_are_reported_not_followed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/old");
                then.status(301).header("location", "/new");
            })
            .await;
        let new = server
            .mock_async(|when, then| {
                when.method(GET).path("/new");
                then.status(200);
            })
            .await;

        let probe = HttpProbe::new(&settings(Duration::from_secs(2))).unwrap();
        assert_eq!(probe.probe(&server.url("/old")).await, Ok(301));
        new.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn slow_target_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow");
                then.status(200).delay(Duration::from_millis(500));
            })
            .await;

        let probe = HttpProbe::new(&settings(Duration::from_millis(100))).unwrap();
        let err = probe.probe(&server.url("/slow")).await.unwrap_err();
        assert_eq!(err.reason, "timed out");
        assert!(err.url.ends_with("/slow"));
    }

    #[tokio::test]
    async fn unreachable_target_is_an_error() {
        let probe = HttpProbe::new(&settings(Duration::from_secs(2))).unwrap();
        assert!(probe.probe("http://127.0.0.1:1/").await.is_err());
    }

    #[test]
    fn proxy_is_accepted() {
        let probe = HttpProbe::new(&ProbeSettings {
            https_proxy: Some("http://proxy.internal:3128".to_string()),
            ..settings(Duration::from_secs(2))
        });
        assert!(probe.is_ok());
    }

    #[test]
    fn header_values_are_validated() {
        let err = HttpProbe::new(&ProbeSettings {
            user_agent: "bad\nagent".to_string(),
            ..settings(Duration::from_secs(1))
        })
        .unwrap_err();
        assert!(matches!(err, ProbeSetupError::InvalidHeader { name: "User-Agent", .. }));
    }
}
