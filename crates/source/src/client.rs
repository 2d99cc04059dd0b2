use std::sync::Arc;
use std::time::{Duration, Instant};

use appin_common::error::AppinError;
use appin_config::GraphConfig;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const PAGE_SIZE: &str = "500";
/// Tokens are refreshed this long before Azure AD says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// One list item as returned by the items endpoint. `fields` is absent when
/// the caller lacks permission on the item or the expand was dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct ListItem {
    #[serde(default)]
    pub id: String,
    pub fields: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ListItemPage {
    #[serde(default)]
    value: Vec<ListItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GraphClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("token request failed with HTTP {status}: {body}")]
    TokenError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl From<GraphClientError> for AppinError {
    fn from(e: GraphClientError) -> Self {
        AppinError::Upstream(e.to_string())
    }
}

/// Microsoft Graph client for SharePoint list items, authenticated with the
/// client-credentials flow. Clones share the token cache.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    config: GraphConfig,
    token: Arc<RwLock<Option<CachedToken>>>,
    retry_base: Duration,
}

impl GraphClient {
    pub fn new(config: GraphConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            token: Arc::new(RwLock::new(None)),
            retry_base: Duration::from_secs(1),
        })
    }

    /// For testing: point both the Graph and login endpoints at a mock server
    /// and shorten the retry backoff.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self.config.login_url = base_url.to_string();
        self.retry_base = Duration::from_millis(5);
        self
    }

    /// Fetch every item of `list_id`, following `@odata.nextLink` until the
    /// last page.
    pub async fn list_items(
        &self,
        list_id: &str,
        select: &str,
        filter: Option<&str>,
    ) -> Result<Vec<ListItem>, GraphClientError> {
        let url = format!(
            "{}/sites/{}/lists/{}/items",
            self.config.base_url, self.config.site_id, list_id
        );

        let mut query = vec![
            ("$expand", format!("fields($select={select})")),
            ("$orderby", "fields/Created desc".to_string()),
            ("$top", PAGE_SIZE.to_string()),
        ];
        if let Some(filter) = filter {
            query.push(("$filter", filter.to_string()));
        }

        let mut page: ListItemPage = self.get_with_retry(&url, &query).await?;
        let mut items = Vec::new();
        let mut pages = 1u32;

        loop {
            tracing::debug!(
                list_id,
                page = pages,
                items = page.value.len(),
                "fetched list page"
            );
            items.extend(page.value);

            let Some(next) = page.next_link else {
                break;
            };
            // nextLink already carries every query option
            page = self.get_with_retry(&next, &[]).await?;
            pages += 1;
        }

        Ok(items)
    }

    async fn access_token(&self) -> Result<String, GraphClientError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // another task may have refreshed while we waited for the lock
        if let Some(token) = slot.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken, GraphClientError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.login_url, self.config.tenant_id
        );
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
        ];

        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "token request rejected");
            return Err(GraphClientError::TokenError { status, body });
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in);
        tracing::debug!(expires_in = token.expires_in, "access token acquired");

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        })
    }

    async fn send(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, GraphClientError> {
        let token = self.access_token().await?;
        Ok(self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await?)
    }

    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GraphClientError> {
        let mut last_error = String::new();
        let mut token_refreshed = false;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    self.retry_base * (1u32 << attempt.min(5)),
                    Duration::from_secs(30),
                );
                tracing::warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }

            let sent = match self.send(url, query).await {
                // A revoked or rotated token gets one fresh attempt, outside
                // the retry budget
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED && !token_refreshed => {
                    tracing::warn!("access token rejected, refreshing");
                    self.invalidate_token().await;
                    token_refreshed = true;
                    self.send(url, query).await
                }
                other => other,
            };

            let response = match sent {
                Ok(resp) => resp,
                Err(GraphClientError::RequestError(e)) if e.is_timeout() || e.is_connect() => {
                    last_error = e.to_string();
                    continue;
                }
                Err(e) => return Err(e),
            };

            let status = response.status();

            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(GraphClientError::RequestError);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(retry_after) = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    let wait = std::cmp::min(retry_after, 60);
                    tracing::warn!(wait, "throttled, waiting Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                last_error = "429 Too Many Requests".to_string();
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, url, "graph request failed");
            return Err(GraphClientError::HttpError { status, body });
        }

        tracing::error!(url, last_error = %last_error, "graph request gave up");
        Err(GraphClientError::MaxRetriesExceeded {
            attempts: self.config.max_retries + 1,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ITEMS_PATH: &str = "/sites/site-1/lists/list-1/items";

    fn test_config() -> GraphConfig {
        GraphConfig {
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            site_id: "site-1".to_string(),
            list_id: "list-1".to_string(),
            ca_final_list_id: "list-2".to_string(),
            base_url: "http://localhost".to_string(),
            login_url: "http://localhost".to_string(),
            max_retries: 2,
            timeout_secs: 5,
        }
    }

    fn client_for(server: &MockServer, config: GraphConfig) -> GraphClient {
        GraphClient::new(config).unwrap().with_base_url(&server.uri())
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "tok-1"
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn items(count: usize, offset: usize) -> Vec<serde_json::Value> {
        (0..count)
            .map(|i| {
                json!({
                    "id": (i + offset).to_string(),
                    "fields": { "Title": format!("Case {}", i + offset) }
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn fetch_single_page() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .and(query_param("$top", "500"))
            .and(query_param("$orderby", "fields/Created desc"))
            .and(query_param("$expand", "fields($select=Title)"))
            .and(query_param("$filter", "fields/Status eq 'x'"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": items(3, 0) })))
            .mount(&server)
            .await;

        let client = client_for(&server, test_config());
        let result = client
            .list_items("list-1", "Title", Some("fields/Status eq 'x'"))
            .await
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].id, "0");
        assert_eq!(result[2].fields.as_ref().unwrap()["Title"], "Case 2");
    }

    #[tokio::test]
    async fn follows_next_link() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        let next = format!("{}{}?$skiptoken=page2", server.uri(), ITEMS_PATH);
        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .and(query_param("$top", "500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": items(2, 0),
                "@odata.nextLink": next
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .and(query_param("$skiptoken", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": items(1, 2) })))
            .mount(&server)
            .await;

        let client = client_for(&server, test_config());
        let result = client.list_items("list-1", "Title", None).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[2].id, "2");
    }

    #[tokio::test]
    async fn token_is_cached_between_requests() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server, test_config());
        client.list_items("list-1", "Title", None).await.unwrap();
        client.clone().list_items("list-1", "Title", None).await.unwrap();
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_once() {
        let server = MockServer::start().await;
        mount_token(&server, 2).await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": items(1, 0) })))
            .mount(&server)
            .await;

        let client = client_for(&server, test_config());
        let result = client.list_items("list-1", "Title", None).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn token_refresh_does_not_use_a_retry() {
        let server = MockServer::start().await;
        mount_token(&server, 2).await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("rotated"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": items(2, 0) })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config();
        config.max_retries = 0;
        let client = client_for(&server, config);
        let result = client.list_items("list-1", "Title", None).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn persistent_401_fails() {
        let server = MockServer::start().await;
        mount_token(&server, 2).await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let client = client_for(&server, test_config());
        let err = client.list_items("list-1", "Title", None).await.unwrap_err();
        match err {
            GraphClientError::HttpError { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("expected HttpError, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn token_rejection_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let client = client_for(&server, test_config());
        let err = client.list_items("list-1", "Title", None).await.unwrap_err();
        assert!(matches!(err, GraphClientError::TokenError { .. }));
    }

    #[tokio::test]
    async fn retries_on_500() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": items(2, 0) })))
            .mount(&server)
            .await;

        let client = client_for(&server, test_config());
        let result = client.list_items("list-1", "Title", None).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn retries_on_429_with_retry_after() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
            .mount(&server)
            .await;

        let client = client_for(&server, test_config());
        assert!(client.list_items("list-1", "Title", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fails_fast_on_403() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, test_config());
        let err = client.list_items("list-1", "Title", None).await.unwrap_err();
        assert!(matches!(err, GraphClientError::HttpError { .. }));
    }

    #[tokio::test]
    async fn max_retries_exceeded() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path(ITEMS_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("always failing"))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = test_config();
        config.max_retries = 1;
        let client = client_for(&server, config);

        let err = client.list_items("list-1", "Title", None).await.unwrap_err();
        match err {
            GraphClientError::MaxRetriesExceeded { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("always failing"), "got: {last_error}");
            }
            other => panic!("expected MaxRetriesExceeded, got: {other:?}"),
        }
    }

    #[test]
    fn client_errors_become_upstream_errors() {
        let err: AppinError = GraphClientError::HttpError {
            status: StatusCode::FORBIDDEN,
            body: "nope".to_string(),
        }
        .into();
        assert!(matches!(err, AppinError::Upstream(ref m) if m.contains("403")));
    }
}
