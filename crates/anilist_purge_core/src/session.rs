/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::cache::PageCache;
use crate::config::ScannerConfig;
use crate::fetcher::{FetchOutcome, NetworkSource, PageFetcher};
use crate::graphql::GraphQlClient;
use crate::kind::ActivityKind;
use crate::rate_limit::RateLimiter;
use crate::settings::{Settings, SettingsStore};
use crate::ui_events::UiEvent;
use anyhow::{bail, Context, Result};
use std::fs;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One user's scanner state: settings, client and page fetcher over a data dir.
pub struct ScanSession {
    client: GraphQlClient,
    fetcher: PageFetcher<NetworkSource>,
    settings: SettingsStore,
}

impl ScanSession {
    pub fn open(cfg: &ScannerConfig, ui_events: broadcast::Sender<UiEvent>) -> Result<Self> {
        Self::open_shared(cfg, Arc::new(RateLimiter::new(cfg.rate_limit())), ui_events)
    }

    /// Opens a session whose requests share `limiter` with other sessions.
    pub fn open_shared(
        cfg: &ScannerConfig,
        limiter: Arc<RateLimiter>,
        ui_events: broadcast::Sender<UiEvent>,
    ) -> Result<Self> {
        let data_dir = cfg.data_dir()?;
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("create data dir: {}", data_dir.display()))?;
        info!("data dir: {}", data_dir.display());

        let client = GraphQlClient::with_limiter(cfg, limiter, ui_events.clone())?;
        let fetcher = PageFetcher::new(
            NetworkSource::new(client.clone(), cfg.per_page()),
            PageCache::new(&data_dir),
            ui_events,
        );
        let settings = SettingsStore::open(&data_dir)?;
        Ok(Self {
            client,
            fetcher,
            settings,
        })
    }

    pub fn client(&self) -> &GraphQlClient {
        &self.client
    }

    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    pub fn settings_mut(&mut self) -> &mut SettingsStore {
        &mut self.settings
    }

    /// Returns the configured user's id, looking it up once and remembering it.
    pub async fn resolve_user(&mut self, cancel: &CancellationToken) -> Result<i64> {
        let current = self.settings.get();
        let Some(name) = current.user_name.clone().filter(|n| !n.trim().is_empty()) else {
            bail!("No user specified");
        };
        if current.user_id != 0 {
            return Ok(current.user_id);
        }
        let user = self.client.lookup_user(&name, cancel).await?;
        info!("resolved AniList user {} to id {}", user.name, user.id);
        self.settings.update(|s| s.user_id = user.id)?;
        Ok(user.id)
    }

    /// Loads all pages of `kind`. `reload` skips the cache.
    pub async fn load_pages(
        &mut self,
        kind: ActivityKind,
        reload: bool,
        page_limit: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let user_id = self.resolve_user(cancel).await?;
        self.fetcher
            .fetch_all(kind, user_id, !reload, page_limit, cancel)
            .await
    }
}
