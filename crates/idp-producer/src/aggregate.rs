//! Internet reachability check over the configured `IDP_URLS`.

use std::time::Duration;

use axum::http::StatusCode;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

/// Status recorded for a URL that could not be reached at all.
pub const UNREACHABLE: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlStatus {
    pub status: u16,
    pub url: String,
}

impl UrlStatus {
    /// 2xx and 3xx count as reachable.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Field names are part of the HTTP contract, spelling included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InternetReport {
    pub successfuls: Vec<UrlStatus>,
    pub unsucessfuls: Vec<UrlStatus>,
}

impl InternetReport {
    /// Keeps the input order within each group.
    pub fn from_statuses(statuses: impl IntoIterator<Item = UrlStatus>) -> Self {
        let (successfuls, unsucessfuls): (Vec<_>, Vec<_>) = statuses.into_iter().partition(UrlStatus::is_success);
        Self {
            successfuls,
            unsucessfuls,
        }
    }

    /// 200 only when failures are strictly fewer than successes; a tie,
    /// including no URLs at all, is 503.
    pub fn status_code(&self) -> StatusCode {
        if self.unsucessfuls.len() < self.successfuls.len() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GETs every URL concurrently, each bounded by `timeout`.
pub async fn check_internet(
    http: &reqwest::Client,
    urls: &[String],
    timeout: Duration,
) -> InternetReport {
    let statuses = join_all(urls.iter().map(|url| probe_url(http, url, timeout))).await;
    InternetReport::from_statuses(statuses)
}

async fn probe_url(http: &reqwest::Client, url: &str, timeout: Duration) -> UrlStatus {
    let status = match http.get(url).timeout(timeout).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            debug!(url, status, "URL answered");
            status
        }
        Err(e) => {
            warn!(url, error = %e, "URL unreachable");
            UNREACHABLE
        }
    };
    UrlStatus {
        status,
        url: url.to_string(),
    }
}
