//! Directory lookups — single attempt, bounded timeout, classified failures.

use async_trait::async_trait;
use chrono::Utc;

use flagwatch_core::error::{FlagwatchError, Result};
use flagwatch_core::traits::EventDirectory;
use flagwatch_core::types::EventInfo;

/// Competition-directory HTTP client.
///
/// One attempt per call: a 404 is permanent (`LookupNotFound`), everything
/// else that goes wrong — connect failure, timeout, upstream 5xx, bad JSON —
/// is `LookupTransient` and left for the next interaction to retry naturally.
pub struct DirectoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl DirectoryClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Fetch upcoming events for the daily digest.
    ///
    /// Lists events starting between now and `lookahead_days` from now,
    /// capped at `limit` entries.
    pub async fn upcoming(&self, limit: usize, lookahead_days: i64) -> Result<Vec<EventInfo>> {
        let now = Utc::now().timestamp();
        let horizon = now + lookahead_days * 24 * 60 * 60;
        let url = format!(
            "{}/events/?limit={}&start={}&finish={}",
            self.base_url, limit, now, horizon
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FlagwatchError::LookupTransient(format!("upcoming list failed: {e}")))?;

        if !response.status().is_success() {
            return Err(FlagwatchError::LookupTransient(format!(
                "upcoming list returned {}",
                response.status()
            )));
        }

        response
            .json::<Vec<EventInfo>>()
            .await
            .map_err(|e| FlagwatchError::LookupTransient(format!("invalid event list: {e}")))
    }

    fn classify_status(status: reqwest::StatusCode) -> FlagwatchError {
        if status == reqwest::StatusCode::NOT_FOUND {
            FlagwatchError::LookupNotFound
        } else {
            FlagwatchError::LookupTransient(format!("directory returned {status}"))
        }
    }
}

#[async_trait]
impl EventDirectory for DirectoryClient {
    async fn fetch(&self, event_id: &str) -> Result<EventInfo> {
        let url = format!("{}/events/{}/", self.base_url, event_id);
        tracing::debug!("Directory lookup: {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FlagwatchError::LookupTransient(format!("lookup failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(status));
        }

        response
            .json::<EventInfo>()
            .await
            .map_err(|e| FlagwatchError::LookupTransient(format!("invalid event payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            DirectoryClient::classify_status(reqwest::StatusCode::NOT_FOUND),
            FlagwatchError::LookupNotFound
        ));
        assert!(matches!(
            DirectoryClient::classify_status(reqwest::StatusCode::BAD_GATEWAY),
            FlagwatchError::LookupTransient(_)
        ));
        assert!(matches!(
            DirectoryClient::classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            FlagwatchError::LookupTransient(_)
        ));
    }

    #[test]
    fn test_base_url_normalized() {
        let client = DirectoryClient::new("https://ctftime.org/api/v1/", 10);
        assert_eq!(client.base_url, "https://ctftime.org/api/v1");
    }
}
