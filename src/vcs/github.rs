//! GitHub API client for one-shot commit and pull-request calls.
//!
//! These are external invocations per user action; they never touch
//! session state and a failure is reported to the requester only.

use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::config::GithubConfig;
use crate::error::ProviderError;

/// A file staged for a commit.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ContentMeta {
    sha: String,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Commit files to a branch via the contents API: look up each file's
    /// current sha (404 means it does not exist yet), then create-or-update.
    /// Files with empty content are skipped.
    pub async fn commit_files(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        branch: &str,
        files: &[CommitFile],
        message: &str,
    ) -> Result<(), ProviderError> {
        for file in files {
            if file.content.is_empty() {
                tracing::debug!(path = %file.path, "Skipping file with empty content");
                continue;
            }

            let url = format!(
                "{}/repos/{}/{}/contents/{}",
                self.api_base, owner, repo, file.path
            );

            // Current sha, if the file already exists on the branch
            let existing = self
                .http
                .get(&url)
                .query(&[("ref", branch)])
                .bearer_auth(token)
                .header("User-Agent", "codehive-server")
                .send()
                .await?;

            let sha = match existing.status() {
                s if s.is_success() => {
                    let meta: ContentMeta = existing.json().await?;
                    Some(meta.sha)
                }
                reqwest::StatusCode::NOT_FOUND => None,
                s => {
                    return Err(ProviderError::Request(format!(
                        "failed to read {}: status {}",
                        file.path, s
                    )));
                }
            };

            let mut body = json!({
                "message": message,
                "content": base64::engine::general_purpose::STANDARD.encode(&file.content),
                "branch": branch,
            });
            if let Some(sha) = sha {
                body["sha"] = json!(sha);
            }

            let response = self
                .http
                .put(&url)
                .bearer_auth(token)
                .header("User-Agent", "codehive-server")
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                return Err(ProviderError::Request(format!(
                    "failed to commit {}: status {}",
                    file.path, status
                )));
            }
        }

        Ok(())
    }

    /// Open a pull request and return the provider's response document.
    pub async fn open_pull_request(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_base, owner, repo);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("User-Agent", "codehive-server")
            .json(&json!({
                "title": title,
                "body": body,
                "head": head,
                "base": base,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ProviderError::Request(format!(
                "failed to create pull request: status {}",
                status
            )));
        }

        Ok(response.json().await?)
    }
}
