/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anilist_purge_core::config::ScannerConfig;
use anilist_purge_core::graphql::GraphQlClient;
use std::env;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let user_name = env::args().nth(1).unwrap_or_default();
    if user_name.trim().is_empty() {
        anyhow::bail!("usage: dev_lookup_user <user_name>");
    }

    let (ui_events, _) = tokio::sync::broadcast::channel(16);
    let client = GraphQlClient::new(&ScannerConfig::from_env()?, ui_events)?;
    let user = client
        .lookup_user(&user_name, &CancellationToken::new())
        .await?;
    println!("id={}", user.id);
    println!("name={}", user.name);
    if client.limiter().is_limited() {
        println!("rate_limited=true");
    }
    Ok(())
}
