/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::config::ScannerConfig;
use crate::fetcher::FetchOutcome;
use crate::kind::ActivityKind;
use crate::rate_limit::{is_cancelled, RateLimiter};
use crate::session::ScanSession;
use crate::ui_events::UiEvent;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

static HANDLE_SEQ: AtomicU64 = AtomicU64::new(1);

static REGISTRY: Mutex<Vec<(u64, RunningFetch)>> = Mutex::new(Vec::new());

/// One rate-limit window per endpoint, shared by every fetch in the process.
static LIMITERS: Mutex<Vec<(String, Arc<RateLimiter>)>> = Mutex::new(Vec::new());

/// Finished fetches nobody polled are dropped after this long.
const FINISHED_RETENTION: Duration = Duration::from_secs(10 * 60);

struct RunningFetch {
    cancel: CancellationToken,
    status: Arc<Mutex<String>>,
    result: Arc<Mutex<Option<(Instant, FetchResult)>>>,
    join: Option<thread::JoinHandle<()>>,
}

impl RunningFetch {
    fn finished_before(&self, deadline: Instant) -> bool {
        self.result
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|(at, _)| *at <= deadline)
    }

    /// The worker died without reporting, e.g. on a panic.
    fn worker_lost(&self) -> bool {
        self.result.lock().unwrap().is_none()
            && self.join.as_ref().is_some_and(|j| j.is_finished())
    }
}

fn prune_finished(reg: &mut Vec<(u64, RunningFetch)>, keep_for: Duration) {
    let Some(deadline) = Instant::now().checked_sub(keep_for) else {
        return;
    };
    let before = reg.len();
    reg.retain(|(_, r)| !r.finished_before(deadline));
    if reg.len() != before {
        debug!("dropped {} unpolled fetch results", before - reg.len());
    }
}

fn shared_limiter(cfg: &ScannerConfig) -> Arc<RateLimiter> {
    let endpoint = cfg.endpoint();
    let mut limiters = LIMITERS.lock().unwrap();
    if let Some((_, l)) = limiters.iter().find(|(e, _)| *e == endpoint) {
        return l.clone();
    }
    let limiter = Arc::new(RateLimiter::new(cfg.rate_limit()));
    limiters.push((endpoint, limiter.clone()));
    limiter
}

async fn track_status(mut rx: broadcast::Receiver<UiEvent>, status: Arc<Mutex<String>>) {
    loop {
        match rx.recv().await {
            Ok(ev) => *status.lock().unwrap() = ev.status_text(),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

/// What a front end asks for: which activities, for whom, and how.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FetchRequest {
    #[serde(flatten)]
    pub config: ScannerConfig,
    /// Kind name ("list", "text", "message", "sent_message"). Defaults to the saved one.
    #[serde(default)]
    pub activity_type: Option<String>,
    /// Replaces the saved user name when set.
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub reload: bool,
    #[serde(default)]
    pub page_limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FetchResult {
    pub ok: bool,
    pub cancelled: bool,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub outcome: Option<FetchOutcome>,
}

impl FetchResult {
    fn from_run(res: Result<FetchOutcome>) -> Self {
        match res {
            Ok(outcome) => {
                let (summary, error) = match outcome.result() {
                    Ok(s) => (Some(s), None),
                    Err(e) => (None, Some(e)),
                };
                Self {
                    ok: error.is_none(),
                    cancelled: false,
                    summary,
                    error,
                    outcome: Some(outcome),
                }
            }
            Err(e) => Self {
                ok: false,
                cancelled: is_cancelled(&e),
                summary: None,
                error: Some(format!("{e:#}")),
                outcome: None,
            },
        }
    }
}

/// Runs one fetch on a background thread with its own tokio runtime.
pub fn start(req: FetchRequest) -> Result<u64> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .try_init()
        .ok();

    let handle = HANDLE_SEQ.fetch_add(1, Ordering::Relaxed);
    let cancel = CancellationToken::new();
    let status = Arc::new(Mutex::new("Working...".to_string()));
    let result = Arc::new(Mutex::new(None));

    let join = thread::spawn({
        let cancel = cancel.clone();
        let status = status.clone();
        let result = result.clone();
        move || {
            let res = run_fetch(req, cancel, status);
            if let Err(e) = &res {
                if !is_cancelled(e) {
                    error!("fetch {handle} failed: {e:#}");
                }
            }
            *result.lock().unwrap() = Some((Instant::now(), FetchResult::from_run(res)));
        }
    });

    let mut reg = REGISTRY.lock().unwrap();
    prune_finished(&mut reg, FINISHED_RETENTION);
    reg.push((
        handle,
        RunningFetch {
            cancel,
            status,
            result,
            join: Some(join),
        },
    ));
    Ok(handle)
}

pub fn cancel(handle: u64) -> Result<()> {
    let reg = REGISTRY.lock().unwrap();
    let (_, running) = reg
        .iter()
        .find(|(h, _)| *h == handle)
        .context("invalid handle")?;
    running.cancel.cancel();
    Ok(())
}

/// Latest status line for the fetch.
pub fn status(handle: u64) -> Result<String> {
    let reg = REGISTRY.lock().unwrap();
    let (_, running) = reg
        .iter()
        .find(|(h, _)| *h == handle)
        .context("invalid handle")?;
    let s = running.status.lock().unwrap().clone();
    Ok(s)
}

/// Returns the result once the fetch has finished and forgets the handle.
pub fn poll(handle: u64) -> Result<Option<FetchResult>> {
    let finished = {
        let mut reg = REGISTRY.lock().unwrap();
        let idx = reg
            .iter()
            .position(|(h, _)| *h == handle)
            .context("invalid handle")?;
        let running = &reg[idx].1;
        if running.result.lock().unwrap().is_none() && !running.worker_lost() {
            return Ok(None);
        }
        let (_, running) = reg.swap_remove(idx);
        running
    };

    let mut running = finished;
    if let Some(j) = running.join.take() {
        let _ = j.join();
    }
    let res = running.result.lock().unwrap().take();
    Ok(Some(match res {
        Some((_, r)) => r,
        None => FetchResult::from_run(Err(anyhow::anyhow!("fetch {handle} worker exited without a result"))),
    }))
}

fn run_fetch(req: FetchRequest, cancel: CancellationToken, status: Arc<Mutex<String>>) -> Result<FetchOutcome> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    rt.block_on(async move {
        let (ui_events, rx) = broadcast::channel::<UiEvent>(128);
        tokio::spawn(track_status(rx, status));

        let mut session = ScanSession::open_shared(&req.config, shared_limiter(&req.config), ui_events)?;
        if let Some(name) = req.user_name.clone() {
            session.settings_mut().update(|s| s.set_user_name(Some(name)))?;
        }
        let kind = match req.activity_type.as_deref() {
            Some(raw) => {
                let kind = ActivityKind::from_str(raw)
                    .with_context(|| format!("unknown activity type: {raw}"))?;
                session.settings_mut().update(|s| s.current_type = kind)?;
                kind
            }
            None => session.settings().current_type,
        };
        info!("fetching {kind} activities (reload={})", req.reload);
        session
            .load_pages(kind, req.reload, req.page_limit, &cancel)
            .await
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_flattened_config() {
        let req: FetchRequest = serde_json::from_str(
            r#"{"activity_type": "text", "user_name": "x", "reload": true, "data_dir": "/tmp/d", "per_page": 10}"#,
        )
        .unwrap();
        assert_eq!(req.activity_type.as_deref(), Some("text"));
        assert!(req.reload);
        assert_eq!(req.config.per_page(), 10);
        assert_eq!(req.page_limit, None);
    }

    #[test]
    fn missing_user_is_reported_through_poll() {
        let dir = tempfile::TempDir::new().unwrap();
        let req = FetchRequest {
            config: ScannerConfig {
                data_dir: Some(dir.path().display().to_string()),
                ..ScannerConfig::default()
            },
            ..FetchRequest::default()
        };
        let handle = start(req).unwrap();
        let res = loop {
            if let Some(r) = poll(handle).unwrap() {
                break r;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        };
        assert!(!res.ok);
        assert!(!res.cancelled);
        assert_eq!(res.error.as_deref(), Some("No user specified"));
        assert!(poll(handle).is_err());
    }

    #[test]
    fn fetches_share_a_window_per_endpoint() {
        let a = ScannerConfig {
            endpoint: Some("http://127.0.0.1:9/a".to_string()),
            ..ScannerConfig::default()
        };
        let b = ScannerConfig {
            endpoint: Some("http://127.0.0.1:9/b".to_string()),
            ..ScannerConfig::default()
        };
        assert!(Arc::ptr_eq(&shared_limiter(&a), &shared_limiter(&a.clone())));
        assert!(!Arc::ptr_eq(&shared_limiter(&a), &shared_limiter(&b)));
    }

    fn finished_fetch() -> RunningFetch {
        RunningFetch {
            cancel: CancellationToken::new(),
            status: Arc::new(Mutex::new(String::new())),
            result: Arc::new(Mutex::new(Some((
                Instant::now(),
                FetchResult::from_run(Err(anyhow::anyhow!("done"))),
            )))),
            join: None,
        }
    }

    fn running_fetch() -> RunningFetch {
        RunningFetch {
            result: Arc::new(Mutex::new(None)),
            ..finished_fetch()
        }
    }

    #[test]
    fn stale_results_are_pruned() {
        let mut reg = vec![(1, finished_fetch()), (2, running_fetch())];
        prune_finished(&mut reg, FINISHED_RETENTION);
        assert_eq!(reg.len(), 2);
        thread::sleep(Duration::from_millis(5));
        prune_finished(&mut reg, Duration::ZERO);
        let left: Vec<u64> = reg.iter().map(|(h, _)| *h).collect();
        assert_eq!(left, [2]);
    }

    #[tokio::test]
    async fn status_survives_lagging() {
        let (tx, rx) = broadcast::channel::<UiEvent>(1);
        let status = Arc::new(Mutex::new(String::new()));
        tx.send(UiEvent::rate_limited(true)).unwrap();
        tx.send(UiEvent::rate_limited(false)).unwrap();
        tx.send(UiEvent::page_loading(ActivityKind::Text, 4)).unwrap();
        drop(tx);
        track_status(rx, status.clone()).await;
        assert_eq!(*status.lock().unwrap(), "Loading Page... 4");
    }
}
