/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::config::ScannerConfig;
use crate::rate_limit::{classify_response, Cancelled, RateLimiter};
use crate::ui_events::{emit, UiEvent};
use anilist_purge_protocol::{GraphQlRequest, GraphQlResponse, User, UserLookup, UserLookupVariables};
use anyhow::{anyhow, bail, Context, Result};
use http::HeaderMap;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const JSON: &str = "application/json";

const USER_QUERY: &str = "query ($userName: String!) { User(name:$userName) { id name } }";

/// Client for the AniList GraphQL endpoint. Clones share one rate-limit window.
#[derive(Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    limiter: Arc<RateLimiter>,
    ui_events: broadcast::Sender<UiEvent>,
}

impl GraphQlClient {
    pub fn new(cfg: &ScannerConfig, ui_events: broadcast::Sender<UiEvent>) -> Result<Self> {
        Self::with_limiter(cfg, Arc::new(RateLimiter::new(cfg.rate_limit())), ui_events)
    }

    /// Like [`GraphQlClient::new`], but waits on a window shared with other clients.
    pub fn with_limiter(
        cfg: &ScannerConfig,
        limiter: Arc<RateLimiter>,
        ui_events: broadcast::Sender<UiEvent>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout())
            .user_agent(concat!("anilist-purge/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self::with_parts(http, cfg.endpoint(), limiter, ui_events))
    }

    pub fn with_parts(
        http: reqwest::Client,
        endpoint: String,
        limiter: Arc<RateLimiter>,
        ui_events: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self {
            http,
            endpoint,
            limiter,
            ui_events,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn ui_events(&self) -> &broadcast::Sender<UiEvent> {
        &self.ui_events
    }

    /// Posts one query, waiting out and retrying rate-limited responses.
    /// GraphQL errors are returned in the envelope, not as `Err`.
    pub async fn execute<T, V>(
        &self,
        query: &str,
        variables: &V,
        cancel: &CancellationToken,
    ) -> Result<GraphQlResponse<T>>
    where
        T: DeserializeOwned,
        V: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(&GraphQlRequest { query, variables })
            .context("encode graphql request")?;

        loop {
            let events = &self.ui_events;
            self.limiter
                .await_clearance(cancel, |waiting| emit(events, UiEvent::rate_limited(waiting)))
                .await?;

            let send = self
                .http
                .post(&self.endpoint)
                .header(CONTENT_TYPE, JSON)
                .header(ACCEPT, JSON)
                .body(body.clone())
                .send();
            let resp = tokio::select! {
                r = send => r.with_context(|| format!("post {}", self.endpoint))?,
                _ = cancel.cancelled() => return Err(Cancelled.into()),
            };

            let status = resp.status();
            if self.limiter.observe(classify_response(status, resp.headers())) {
                continue;
            }
            if !is_json(resp.headers()) {
                bail!("unable to contact {}: {}", self.endpoint, status);
            }

            let bytes = tokio::select! {
                b = resp.bytes() => b.with_context(|| format!("read response from {}", self.endpoint))?,
                _ = cancel.cancelled() => return Err(Cancelled.into()),
            };
            debug!("graphql response {status}, {} bytes", bytes.len());
            let decoded = serde_json::from_slice(&bytes)
                .with_context(|| format!("decode graphql response ({status})"))?;
            return Ok(decoded);
        }
    }

    pub async fn lookup_user(&self, user_name: &str, cancel: &CancellationToken) -> Result<User> {
        let user_name = user_name.trim();
        let resp: GraphQlResponse<UserLookup> = self
            .execute(USER_QUERY, &UserLookupVariables { user_name }, cancel)
            .await?;
        if let Some(errors) = resp.joined_errors() {
            warn!("user lookup returned errors:\n{errors}");
            bail!("could not find AniList user '{user_name}':\n{errors}");
        }
        resp.data
            .and_then(|d| d.user)
            .ok_or_else(|| anyhow!("could not find AniList user '{user_name}'"))
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(JSON))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn json_detection_ignores_parameters() {
        let mut h = HeaderMap::new();
        assert!(!is_json(&h));
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json(&h));
        h.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        assert!(!is_json(&h));
    }
}
