/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::rate_limit::RateLimitSettings;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://graphql.anilist.co";

pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(v) = std::env::var("ANILIST_PURGE_DATA_DIR") {
        return Ok(PathBuf::from(v));
    }
    let proj = ProjectDirs::from("co", "anilist-purge", "AniListPurge")
        .context("unable to determine platform data dir")?;
    Ok(proj.data_local_dir().to_path_buf())
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Where settings and page caches live. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Activities requested per page (server maximum is 50).
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub min_request_interval_ms: Option<u64>,
    /// Back-off used for 429s and spent quotas when no Retry-After is given.
    #[serde(default)]
    pub rate_limit_window_secs: Option<u64>,
    #[serde(default)]
    pub rate_limit_margin_secs: Option<u64>,
    /// HTTP client timeout for each request (seconds).
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

impl ScannerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            endpoint: env_opt("ANILIST_PURGE_ENDPOINT"),
            data_dir: env_opt("ANILIST_PURGE_DATA_DIR"),
            per_page: env_parse("ANILIST_PURGE_PER_PAGE")?,
            min_request_interval_ms: env_parse("ANILIST_PURGE_MIN_INTERVAL_MS")?,
            rate_limit_window_secs: env_parse("ANILIST_PURGE_RATE_LIMIT_WINDOW_SECS")?,
            rate_limit_margin_secs: env_parse("ANILIST_PURGE_RATE_LIMIT_MARGIN_SECS")?,
            http_timeout_secs: env_parse("ANILIST_PURGE_HTTP_TIMEOUT_SECS")?,
        })
    }

    pub fn endpoint(&self) -> String {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT)
            .to_string()
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match self.data_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => default_data_dir(),
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(50).clamp(1, 50)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.unwrap_or(30).max(1))
    }

    pub fn rate_limit(&self) -> RateLimitSettings {
        let d = RateLimitSettings::default();
        RateLimitSettings {
            min_interval: self
                .min_request_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(d.min_interval),
            default_window: self
                .rate_limit_window_secs
                .map(Duration::from_secs)
                .unwrap_or(d.default_window),
            safety_margin: self
                .rate_limit_margin_secs
                .map(Duration::from_secs)
                .unwrap_or(d.safety_margin),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_opt(key)
        .map(|v| v.trim().parse::<T>().with_context(|| format!("invalid {key}: {v}")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_anilist_limits() {
        let cfg = ScannerConfig::default();
        assert_eq!(cfg.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(cfg.per_page(), 50);
        let rl = cfg.rate_limit();
        assert_eq!(rl.min_interval, Duration::from_millis(50));
        assert_eq!(rl.default_window, Duration::from_secs(60));
        assert_eq!(rl.safety_margin, Duration::from_secs(2));
    }

    #[test]
    fn parses_partial_json() {
        let cfg: ScannerConfig =
            serde_json::from_str(r#"{"per_page": 500, "rate_limit_window_secs": 1, "data_dir": "/tmp/x"}"#)
                .unwrap();
        assert_eq!(cfg.per_page(), 50);
        assert_eq!(cfg.rate_limit().default_window, Duration::from_secs(1));
        assert_eq!(cfg.data_dir().unwrap(), PathBuf::from("/tmp/x"));
    }
}
