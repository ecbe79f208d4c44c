/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::kind::ActivityKind;
use anilist_purge_protocol as wire;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

pub use anilist_purge_protocol::{PageInfo, User};

const IMGUR: &str = "imgur";

/// Non-overlapping, case-insensitive occurrences of "imgur".
pub fn imgur_count(text: &str) -> usize {
    text.to_ascii_lowercase().matches(IMGUR).count()
}

fn local_time(epoch_secs: i64) -> Option<DateTime<Local>> {
    Local.timestamp_opt(epoch_secs, 0).single()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub user: Option<User>,
    pub text: String,
    pub created_at: i64,
    #[serde(default)]
    pub is_post: bool,
}

impl Reply {
    pub fn user_id(&self) -> i64 {
        self.user.as_ref().map(|u| u.id).unwrap_or(0)
    }

    pub fn imgur_count(&self) -> usize {
        imgur_count(&self.text)
    }

    pub fn created_time(&self) -> Option<DateTime<Local>> {
        local_time(self.created_at)
    }

    fn from_wire(activity_id: i64, reply: wire::ActivityReply) -> Result<Self> {
        let text = reply
            .text
            .ok_or_else(|| anyhow!("reply on activity {activity_id} has no text"))?;
        Ok(Self {
            user: reply.user,
            text,
            created_at: reply.created_at,
            is_post: false,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityDetail {
    #[serde(rename_all = "camelCase")]
    List {
        user: Option<User>,
        media_title: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Text { user: Option<User>, text: String },
    #[serde(rename_all = "camelCase")]
    Message {
        messenger: Option<User>,
        recipient: Option<User>,
        message: Option<String>,
        is_sent: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub site_url: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub replies: Vec<Reply>,
    pub detail: ActivityDetail,
}

impl Activity {
    /// Author of the activity. For messages this is the messenger.
    pub fn user(&self) -> Option<&User> {
        match &self.detail {
            ActivityDetail::List { user, .. } | ActivityDetail::Text { user, .. } => user.as_ref(),
            ActivityDetail::Message { messenger, .. } => messenger.as_ref(),
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user().map(|u| u.id).unwrap_or(0)
    }

    pub fn title(&self) -> Option<String> {
        match &self.detail {
            ActivityDetail::List { media_title, .. } => media_title.clone(),
            ActivityDetail::Text { .. } => Some("TEXT".to_string()),
            ActivityDetail::Message {
                messenger,
                recipient,
                is_sent,
                ..
            } => {
                let shown = if *is_sent { recipient } else { messenger };
                Some(match shown {
                    Some(u) => format!("@{}", u.name),
                    None => "[Removed]".to_string(),
                })
            }
        }
    }

    /// Body text. List activities have none.
    pub fn text(&self) -> Option<&str> {
        match &self.detail {
            ActivityDetail::List { .. } => None,
            ActivityDetail::Text { text, .. } => Some(text),
            ActivityDetail::Message { message, .. } => message.as_deref(),
        }
    }

    pub fn kind_matches(&self, kind: ActivityKind) -> bool {
        matches!(
            (&self.detail, kind),
            (ActivityDetail::List { .. }, ActivityKind::List)
                | (ActivityDetail::Text { .. }, ActivityKind::Text)
                | (
                    ActivityDetail::Message { .. },
                    ActivityKind::Message | ActivityKind::SentMessage
                )
        )
    }

    pub fn created_time(&self) -> Option<DateTime<Local>> {
        local_time(self.created_at)
    }

    pub fn imgur_count(&self) -> usize {
        self.replies.iter().map(Reply::imgur_count).sum()
    }

    pub fn post_count(&self) -> usize {
        self.replies.iter().filter(|r| r.is_post).count()
    }
}

fn replies_from_wire(activity_id: i64, replies: Option<Vec<wire::ActivityReply>>) -> Result<Vec<Reply>> {
    replies
        .unwrap_or_default()
        .into_iter()
        .map(|r| Reply::from_wire(activity_id, r))
        .collect()
}

/// Wire payload of one activity kind.
pub trait WireActivity: serde::de::DeserializeOwned + Send {
    fn into_activity(self, user_id: i64) -> Result<Activity>;
}

impl WireActivity for wire::ListActivity {
    fn into_activity(self, _user_id: i64) -> Result<Activity> {
        let media_title = self
            .media
            .and_then(|m| m.title)
            .and_then(|t| t.romaji);
        Ok(Activity {
            id: self.id,
            site_url: self.site_url,
            created_at: self.created_at,
            replies: replies_from_wire(self.id, self.replies)?,
            detail: ActivityDetail::List {
                user: self.user,
                media_title,
            },
        })
    }
}

impl WireActivity for wire::TextActivity {
    fn into_activity(self, _user_id: i64) -> Result<Activity> {
        let text = self
            .text
            .ok_or_else(|| anyhow!("text activity {} has no text", self.id))?;
        Ok(Activity {
            id: self.id,
            site_url: self.site_url,
            created_at: self.created_at,
            replies: replies_from_wire(self.id, self.replies)?,
            detail: ActivityDetail::Text {
                user: self.user,
                text,
            },
        })
    }
}

impl WireActivity for wire::MessageActivity {
    fn into_activity(self, user_id: i64) -> Result<Activity> {
        let is_sent = self.messenger.as_ref().is_some_and(|m| m.id == user_id);
        Ok(Activity {
            id: self.id,
            site_url: self.site_url,
            created_at: self.created_at,
            replies: replies_from_wire(self.id, self.replies)?,
            detail: ActivityDetail::Message {
                messenger: self.messenger,
                recipient: self.recipient,
                message: self.message,
                is_sent,
            },
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub activities: Vec<Activity>,
    pub page_info: Option<PageInfo>,
    /// Joined GraphQL error messages. Never persisted.
    #[serde(skip)]
    pub error: Option<String>,
}

impl Page {
    pub fn from_wire<A: WireActivity>(page: wire::ActivitiesPage<A>, user_id: i64) -> Result<Self> {
        let activities = page
            .activities
            .into_iter()
            .map(|a| a.into_activity(user_id))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            activities,
            page_info: page.page_info,
            error: None,
        })
    }

    pub fn has_next_page(&self) -> bool {
        self.page_info.map(|p| p.has_next_page).unwrap_or(false)
    }

    pub fn reply_count(&self) -> usize {
        self.activities.iter().map(|a| a.replies.len()).sum()
    }

    pub fn imgur_count(&self) -> usize {
        self.activities.iter().map(Activity::imgur_count).sum()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FetchTotals {
    pub pages: usize,
    pub activities: usize,
    pub replies: usize,
    pub imgur_links: usize,
}

impl FetchTotals {
    pub fn add_page(&mut self, page: &Page) {
        self.activities += page.activities.len();
        self.replies += page.reply_count();
        self.imgur_links += page.imgur_count();
    }
}
