/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::cache::PageCache;
use crate::filter::filter_page;
use crate::graphql::GraphQlClient;
use crate::kind::ActivityKind;
use crate::model::{FetchTotals, Page, WireActivity};
use crate::rate_limit::Cancelled;
use crate::ui_events::{emit, UiEvent};
use anilist_purge_protocol::{self as wire, GraphQlResponse, PageData, PageVariables};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Supplies filtered pages, numbered from 1.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        kind: ActivityKind,
        user_id: i64,
        page: usize,
        cancel: &CancellationToken,
    ) -> Result<Option<Page>>;
}

pub struct NetworkSource {
    client: GraphQlClient,
    per_page: u32,
}

impl NetworkSource {
    pub fn new(client: GraphQlClient, per_page: u32) -> Self {
        Self { client, per_page }
    }

    async fn fetch_typed<A: WireActivity>(
        &self,
        kind: ActivityKind,
        user_id: i64,
        page: usize,
        cancel: &CancellationToken,
    ) -> Result<Option<Page>> {
        let spec = kind.spec();
        let query = kind.page_query();
        let vars = PageVariables {
            page: u32::try_from(page).unwrap_or(u32::MAX),
            per_page: self.per_page,
            user_id,
            type_name: spec.type_name,
            has_replies: spec.has_replies,
        };
        let resp: GraphQlResponse<PageData<A>> =
            self.client.execute(&query, &vars, cancel).await?;

        let errors = resp.joined_errors();
        match (resp.data.and_then(|d| d.page), errors) {
            (Some(data), errors) => {
                let mut page = Page::from_wire(data, user_id)?;
                if let Some(e) = &errors {
                    warn!("{kind} page {} returned errors:\n{e}", vars.page);
                }
                page.error = errors;
                Ok(Some(page))
            }
            (None, Some(errors)) => bail!("GraphQL returned errors:\n{errors}"),
            (None, None) => Ok(None),
        }
    }
}

#[async_trait]
impl PageSource for NetworkSource {
    async fn fetch_page(
        &self,
        kind: ActivityKind,
        user_id: i64,
        page: usize,
        cancel: &CancellationToken,
    ) -> Result<Option<Page>> {
        let mut fetched = match kind {
            ActivityKind::List => {
                self.fetch_typed::<wire::ListActivity>(kind, user_id, page, cancel)
                    .await?
            }
            ActivityKind::Text => {
                self.fetch_typed::<wire::TextActivity>(kind, user_id, page, cancel)
                    .await?
            }
            ActivityKind::Message | ActivityKind::SentMessage => {
                self.fetch_typed::<wire::MessageActivity>(kind, user_id, page, cancel)
                    .await?
            }
        };
        if let Some(p) = fetched.as_mut() {
            filter_page(p, kind, user_id);
        }
        Ok(fetched)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FetchOutcome {
    pub kind: ActivityKind,
    pub pages: Vec<Page>,
    pub totals: FetchTotals,
    pub from_cache: bool,
    /// Ended before the last page: page limit hit or the server sent no page.
    pub truncated: bool,
    /// Error of the page that ended the run.
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn summary(&self) -> String {
        format!(
            "Pages: {}, Activities: {}, Replies: {}, Imgur Links: {}{}",
            self.totals.pages,
            self.totals.activities,
            self.totals.replies,
            self.totals.imgur_links,
            if self.from_cache { " [Cache]" } else { "" }
        )
    }

    /// Summary on success, the terminal page error otherwise.
    pub fn result(&self) -> std::result::Result<String, String> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(self.summary()),
        }
    }
}

pub struct PageFetcher<S> {
    source: S,
    cache: PageCache,
    ui_events: broadcast::Sender<UiEvent>,
}

impl<S: PageSource> PageFetcher<S> {
    pub fn new(source: S, cache: PageCache, ui_events: broadcast::Sender<UiEvent>) -> Self {
        Self {
            source,
            cache,
            ui_events,
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Retrieves every page of `kind` for `user_id`, from the cache when
    /// `use_cache` is set and one exists. A network run that finishes without
    /// a page error or truncation replaces the cache.
    pub async fn fetch_all(
        &self,
        kind: ActivityKind,
        user_id: i64,
        use_cache: bool,
        page_limit: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let mut cached = if use_cache {
            let cache = self.cache.clone();
            tokio::task::spawn_blocking(move || cache.load(kind))
                .await??
                .map(Vec::into_iter)
        } else {
            None
        };
        let from_cache = cached.is_some();

        let mut pages = Vec::new();
        let mut totals = FetchTotals::default();
        let mut next_page = 1usize;
        let mut error = None;
        let mut truncated = false;

        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled.into());
            }
            emit(
                &self.ui_events,
                UiEvent::page_loading(kind, totals.pages + 1),
            );

            let page = match cached.as_mut() {
                Some(it) => it.next(),
                None => {
                    let p = self
                        .source
                        .fetch_page(kind, user_id, next_page, cancel)
                        .await?;
                    if p.is_none() {
                        // Earlier pages promised more, so this listing is incomplete.
                        warn!("{kind} page {next_page} came back empty, run will not be cached");
                        truncated = true;
                    }
                    next_page += 1;
                    p
                }
            };
            let Some(page) = page else {
                break;
            };

            totals.pages += 1;
            totals.add_page(&page);
            let has_next = page.has_next_page();
            let page_error = page.error.clone();
            if !page.activities.is_empty() {
                pages.push(page);
            }

            if page_error.is_some() {
                error = page_error;
                break;
            }
            if !has_next {
                break;
            }
            if page_limit.is_some_and(|limit| totals.pages >= limit) {
                truncated = true;
                break;
            }
        }

        if !from_cache && error.is_none() && !truncated {
            let cache = self.cache.clone();
            let to_save = pages.clone();
            tokio::task::spawn_blocking(move || cache.save(kind, &to_save)).await??;
        }

        let outcome = FetchOutcome {
            kind,
            pages,
            totals,
            from_cache,
            truncated,
            error,
        };
        match &outcome.error {
            Some(e) => warn!("{kind} fetch stopped on page error:\n{e}"),
            None => info!("{kind} fetch done: {}", outcome.summary()),
        }
        Ok(outcome)
    }
}
