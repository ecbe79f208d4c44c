/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anilist_purge_core::config::ScannerConfig;
use anilist_purge_core::kind::ActivityKind;
use anilist_purge_core::rate_limit::is_cancelled;
use anilist_purge_core::session::ScanSession;
use anilist_purge_core::ui_events::{UiEvent, PAGE_LOADING};
use std::env;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;

const USAGE: &str =
    "usage: purge_scan [list|text|message|sent_message] [--reload] [--limit N] [--user NAME]";

struct Args {
    kind: Option<ActivityKind>,
    reload: bool,
    limit: Option<usize>,
    user: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut out = Args {
        kind: None,
        reload: false,
        limit: None,
        user: None,
    };
    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--reload" => out.reload = true,
            "--limit" => {
                let v = it.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
                out.limit = Some(v.parse()?);
            }
            "--user" => out.user = Some(it.next().ok_or_else(|| anyhow::anyhow!(USAGE))?),
            "-h" | "--help" => anyhow::bail!(USAGE),
            other => {
                let kind = ActivityKind::from_str(other)
                    .ok_or_else(|| anyhow::anyhow!("unknown activity type '{other}'\n{USAGE}"))?;
                out.kind = Some(kind);
            }
        }
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let args = parse_args()?;
    let cfg = ScannerConfig::from_env()?;
    let (ui_events, mut rx) = tokio::sync::broadcast::channel::<UiEvent>(128);
    let mut session = ScanSession::open(&cfg, ui_events)?;

    if let Some(user) = args.user {
        session
            .settings_mut()
            .update(|s| s.set_user_name(Some(user)))?;
    }
    if let Some(kind) = args.kind {
        session.settings_mut().update(|s| s.current_type = kind)?;
    }
    let kind = session.settings().current_type;

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.waiting.is_some() || ev.kind == PAGE_LOADING => {
                    eprintln!("{}", ev.status_text());
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling fetch");
                cancel.cancel();
            }
        }
    });

    let outcome = match session
        .load_pages(kind, args.reload, args.limit, &cancel)
        .await
    {
        Ok(o) => o,
        Err(e) if is_cancelled(&e) => {
            eprintln!("cancelled");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for page in &outcome.pages {
        for a in &page.activities {
            let when = a
                .created_time()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!(
                "{}\t{}\t{}\tposts={} replies={} imgur={}\t{}",
                a.id,
                when,
                a.title().unwrap_or_else(|| "-".to_string()),
                a.post_count(),
                a.replies.len() - a.post_count(),
                a.imgur_count(),
                a.site_url.as_deref().unwrap_or("")
            );
        }
    }

    match outcome.result() {
        Ok(summary) => {
            println!("{summary}");
            Ok(())
        }
        Err(e) => anyhow::bail!("{e}"),
    }
}
