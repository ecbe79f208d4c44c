/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::kind::ActivityKind;
use serde::Serialize;
use tokio::sync::broadcast;

fn now_ms_u64() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub const RATE_LIMIT_WAIT: &str = "rate_limit_wait";
pub const RATE_LIMIT_RESUME: &str = "rate_limit_resume";
pub const PAGE_LOADING: &str = "page_loading";

#[derive(Clone, Debug, Serialize)]
pub struct UiEvent {
    pub kind: String,
    pub ts_ms: u64,
    pub activity_type: Option<String>,
    pub page: Option<usize>,
    /// Set on rate-limit events: true while waiting, false once resumed.
    pub waiting: Option<bool>,
}

impl UiEvent {
    pub fn new(kind: &str, activity_type: Option<ActivityKind>, page: Option<usize>) -> Self {
        Self {
            kind: kind.to_string(),
            ts_ms: now_ms_u64(),
            activity_type: activity_type.map(|k| k.to_string()),
            page,
            waiting: None,
        }
    }

    pub fn rate_limited(waiting: bool) -> Self {
        let kind = if waiting {
            RATE_LIMIT_WAIT
        } else {
            RATE_LIMIT_RESUME
        };
        Self {
            waiting: Some(waiting),
            ..Self::new(kind, None, None)
        }
    }

    pub fn page_loading(kind: ActivityKind, page: usize) -> Self {
        Self::new(PAGE_LOADING, Some(kind), Some(page))
    }

    /// Status line a front end shows for this event.
    pub fn status_text(&self) -> String {
        match (self.kind.as_str(), self.waiting) {
            (_, Some(true)) => "Waiting for rate limit to end...".to_string(),
            (_, Some(false)) => "Working...".to_string(),
            (PAGE_LOADING, _) => format!("Loading Page... {}", self.page.unwrap_or_default()),
            (other, _) => other.to_string(),
        }
    }
}

/// Sends an event without caring whether anyone is subscribed.
pub fn emit(tx: &broadcast::Sender<UiEvent>, ev: UiEvent) {
    let _ = tx.send(ev);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_events_carry_flag() {
        let ev = UiEvent::rate_limited(true);
        assert_eq!(ev.kind, RATE_LIMIT_WAIT);
        assert_eq!(ev.waiting, Some(true));
        assert_eq!(ev.status_text(), "Waiting for rate limit to end...");
        assert_eq!(UiEvent::rate_limited(false).status_text(), "Working...");
    }

    #[test]
    fn page_loading_text() {
        let ev = UiEvent::page_loading(ActivityKind::Text, 3);
        assert_eq!(ev.activity_type.as_deref(), Some("text"));
        assert_eq!(ev.status_text(), "Loading Page... 3");
    }
}
