//! GitHub REST client

use crate::pagination::next_link;
use async_trait::async_trait;
use reposnap_core::{ApiError, Credential, RepositoryApi, RepositoryDescriptor, Settings};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Items per listing page
pub const PAGE_SIZE: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct Organization {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    full_name: String,
    owner: Owner,
}

impl From<Repository> for RepositoryDescriptor {
    fn from(repo: Repository) -> Self {
        Self {
            owner: repo.owner.login,
            name: repo.name,
            full_name: repo.full_name,
        }
    }
}

/// GitHub API client
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GithubClient {
    /// Create client for `base_url` (e.g. `https://api.github.com`)
    ///
    /// # Errors
    /// `ApiError::Transport` if the token is not a valid header value or the
    /// HTTP client cannot be built
    pub fn new(token: &Credential, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose())).map_err(|_| {
            ApiError::Transport {
                operation: "build client".to_string(),
                message: "token contains characters not allowed in a header".to_string(),
            }
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("reposnap/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport {
                operation: "build client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create client from daemon settings
    ///
    /// # Errors
    /// See [`GithubClient::new`]
    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(&settings.token, settings.api_url.clone())
    }

    async fn get(&self, operation: &str, url: &str) -> Result<Response, ApiError> {
        tracing::debug!(%url, "GET");
        let response = self.http.get(url).send().await.map_err(|e| ApiError::Transport {
            operation: operation.to_string(),
            message: e.without_url().to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            message: error_message(&message),
        })
    }

    async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T, ApiError> {
        response.json().await.map_err(|e| ApiError::Decode {
            operation: operation.to_string(),
            message: e.without_url().to_string(),
        })
    }

    /// Follow `Link: rel="next"` until the last page
    async fn get_all<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<Vec<T>, ApiError> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut url = format!("{}{path}{separator}per_page={PAGE_SIZE}", self.base_url);
        let mut items = Vec::new();

        loop {
            let response = self.get(operation, &url).await?;
            let next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_link);
            let page: Vec<T> = Self::decode(operation, response).await?;
            items.extend(page);

            match next {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(items)
    }
}

/// GitHub error bodies are `{"message": "..."}`; fall back to the raw text
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Body {
        message: String,
    }
    serde_json::from_str::<Body>(body).map_or_else(|_| body.trim().to_string(), |b| b.message)
}

#[async_trait]
impl RepositoryApi for GithubClient {
    async fn list_organizations(&self) -> Result<Vec<String>, ApiError> {
        let orgs: Vec<Organization> = self.get_all("list organizations", "/user/orgs").await?;
        Ok(orgs.into_iter().map(|org| org.login).collect())
    }

    async fn list_repositories(&self) -> Result<Vec<RepositoryDescriptor>, ApiError> {
        let repos: Vec<Repository> = self.get_all("list repositories", "/user/repos").await?;
        Ok(repos.into_iter().map(Into::into).collect())
    }

    async fn list_organization_repositories(
        &self,
        organization: &str,
    ) -> Result<Vec<RepositoryDescriptor>, ApiError> {
        let operation = format!("list repositories of {organization}");
        let repos: Vec<Repository> = self
            .get_all(&operation, &format!("/orgs/{organization}/repos?type=all"))
            .await?;
        Ok(repos.into_iter().map(Into::into).collect())
    }

    async fn has_contents(&self, repo: &RepositoryDescriptor) -> Result<bool, ApiError> {
        let operation = format!("get contents of {repo}");
        let url = format!("{}/repos/{}/contents/", self.base_url, repo.full_name);
        match self.get(&operation, &url).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn recent_events(&self, repo: &RepositoryDescriptor) -> Result<Vec<String>, ApiError> {
        let operation = format!("list events of {repo}");
        let url = format!(
            "{}/repos/{}/events?per_page={PAGE_SIZE}",
            self.base_url, repo.full_name
        );
        let response = self.get(&operation, &url).await?;
        let events: Vec<serde_json::Value> = Self::decode(&operation, response).await?;
        Ok(events.iter().map(serde_json::Value::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(error_message(r#"{"message":"Not Found","documentation_url":"x"}"#), "Not Found");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn repository_maps_to_descriptor() {
        let repo: Repository = serde_json::from_str(
            r#"{"name":"widgets","full_name":"acme/widgets","owner":{"login":"acme"},"private":true}"#,
        )
        .unwrap();
        assert_eq!(RepositoryDescriptor::from(repo), RepositoryDescriptor::new("acme", "widgets"));
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = GithubClient::new(&Credential::new("t"), "https://api.github.com/").unwrap();
        assert_eq!(client.base_url, "https://api.github.com");
    }

    #[test]
    fn token_must_be_header_safe() {
        assert!(GithubClient::new(&Credential::new("bad\ntoken"), "https://api.github.com").is_err());
    }
}
