//! Quay API v1 client
//!
//! Thin reqwest wrapper around the handful of endpoints the janitor needs:
//! repository and tag listing, manifest lookup, tag deletion, and repository
//! notifications.
//!
//! Every request goes through the configured [`RetryPolicy`]. HTTP 502, 503
//! and 504 as well as connection failures are treated as transient. 401 and
//! 403 are authorization failures and never retried. 404 means absence and is
//! translated per endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

use super::api::{DeleteOutcome, RegistryApi, RepositoryPage, ResetOutcome, TagPage};
use super::retry::RetryPolicy;
use crate::config::RegistryConfig;
use crate::domain::{RepoNotification, RepositoryRef, Tag};
use crate::error::RegistryError;

/// Quay answers 400 with this detail prefix when a notification is gone
const NOTIFICATION_NOT_FOUND: &str = "No repository notification found";

#[derive(Debug, Deserialize)]
struct RepositoryListResponse {
    #[serde(default)]
    repositories: Vec<RepositoryEntry>,
    #[serde(default, deserialize_with = "cursor_string")]
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryEntry {
    namespace: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TagListResponse {
    #[serde(default)]
    tags: Vec<TagEntry>,
    #[serde(default)]
    has_additional: bool,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    manifest_digest: String,
    /// Creation time, epoch seconds
    #[serde(default)]
    start_ts: Option<i64>,
}

impl From<TagEntry> for Tag {
    fn from(entry: TagEntry) -> Self {
        Tag {
            name: entry.name,
            manifest_digest: entry.manifest_digest,
            created_at: entry
                .start_ts
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotificationListResponse {
    #[serde(default)]
    notifications: Vec<NotificationEntry>,
}

#[derive(Debug, Deserialize)]
struct NotificationEntry {
    uuid: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    number_of_failures: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: String,
}

/// Quay pages repositories with an opaque token; older servers sent a number.
fn cursor_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Authenticated Quay API client
pub struct QuayClient {
    client: Client,
    base_url: String,
    token: String,
    page_limit: u32,
    retry: RetryPolicy,
}

impl QuayClient {
    /// Create a new client
    pub fn new(config: &RegistryConfig, retry: RetryPolicy, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            page_limit: config.page_limit,
            retry,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn repository_url(&self, repo: &RepositoryRef, rest: &str) -> String {
        format!(
            "{}/repository/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&repo.namespace),
            urlencoding::encode(&repo.name),
            rest
        )
    }

    /// Single attempt. Transient and authorization statuses become errors,
    /// every other response is handed back for the caller to interpret.
    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Response, RegistryError> {
        debug!(method = %method, url = %url, "Quay request");

        let response = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| RegistryError::Transient {
                attempts: 1,
                message: format!("{}: {}", url, e),
            })?;

        let status = response.status();
        if is_transient_status(status) {
            return Err(RegistryError::Transient {
                attempts: 1,
                message: format!("HTTP {} from {}", status.as_u16(), url),
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RegistryError::Unauthorized {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn execute(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Response, RegistryError> {
        self.retry
            .run(operation, || self.send(method.clone(), url, query))
            .await
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

async fn unexpected(url: &str, response: Response) -> RegistryError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RegistryError::UnexpectedResponse {
        status,
        url: url.to_string(),
        body,
    }
}

async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, RegistryError> {
    response.json().await.map_err(|e| RegistryError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl RegistryApi for QuayClient {
    async fn list_repositories_page(
        &self,
        namespace: &str,
        cursor: Option<&str>,
    ) -> Result<RepositoryPage, RegistryError> {
        let url = format!("{}/repository", self.base_url);
        let mut query = vec![("namespace", namespace.to_string())];
        if let Some(cursor) = cursor {
            query.push(("next_page", cursor.to_string()));
        }

        let response = self
            .execute("list repositories", Method::GET, &url, &query)
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(&url, response).await);
        }

        let body: RepositoryListResponse = decode(&url, response).await?;
        Ok(RepositoryPage {
            repositories: body
                .repositories
                .into_iter()
                .map(|r| RepositoryRef::new(r.namespace, r.name))
                .collect(),
            next_page: body.next_page,
        })
    }

    async fn list_tags_page(
        &self,
        repo: &RepositoryRef,
        page: u32,
    ) -> Result<TagPage, RegistryError> {
        let url = self.repository_url(repo, "tag/");
        let query = [
            ("limit", self.page_limit.to_string()),
            ("page", page.to_string()),
            ("onlyActiveTags", "true".to_string()),
        ];

        let response = self.execute("list tags", Method::GET, &url, &query).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(repository = %repo, "Repository no longer exists");
            return Ok(TagPage::default());
        }
        if !response.status().is_success() {
            return Err(unexpected(&url, response).await);
        }

        let body: TagListResponse = decode(&url, response).await?;
        Ok(TagPage {
            tags: body.tags.into_iter().map(Tag::from).collect(),
            has_additional: body.has_additional,
        })
    }

    async fn manifest_exists(
        &self,
        repo: &RepositoryRef,
        digest: &str,
    ) -> Result<bool, RegistryError> {
        let url = self.repository_url(repo, &format!("manifest/{}", digest));

        let response = self.execute("get manifest", Method::GET, &url, &[]).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected(&url, response).await),
        }
    }

    async fn delete_tag(
        &self,
        repo: &RepositoryRef,
        tag: &str,
    ) -> Result<DeleteOutcome, RegistryError> {
        let url = self.repository_url(repo, &format!("tag/{}", urlencoding::encode(tag)));

        let response = self.execute("delete tag", Method::DELETE, &url, &[]).await?;
        match response.status() {
            status if status.is_success() => Ok(DeleteOutcome::Deleted),
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::AlreadyGone),
            _ => Err(unexpected(&url, response).await),
        }
    }

    async fn list_notifications(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<RepoNotification>, RegistryError> {
        let url = self.repository_url(repo, "notification/");

        let response = self
            .execute("list notifications", Method::GET, &url, &[])
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(unexpected(&url, response).await);
        }

        let body: NotificationListResponse = decode(&url, response).await?;
        Ok(body
            .notifications
            .into_iter()
            .map(|n| RepoNotification::new(n.uuid, n.title.unwrap_or_default(), n.number_of_failures))
            .collect())
    }

    async fn reset_notification(
        &self,
        repo: &RepositoryRef,
        uuid: &str,
    ) -> Result<ResetOutcome, RegistryError> {
        let url = self.repository_url(repo, &format!("notification/{}", urlencoding::encode(uuid)));

        let response = self
            .execute("reset notification", Method::POST, &url, &[])
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(ResetOutcome::Reset);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(ResetOutcome::NotFound);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST {
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .unwrap_or_default()
                .detail;
            if detail.starts_with(NOTIFICATION_NOT_FOUND) {
                return Ok(ResetOutcome::NotFound);
            }
        }
        Err(RegistryError::UnexpectedResponse {
            status: status.as_u16(),
            url,
            body,
        })
    }
}
