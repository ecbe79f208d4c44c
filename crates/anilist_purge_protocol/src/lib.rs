/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Clone)]
pub struct GraphQlRequest<'a, V> {
    pub query: &'a str,
    pub variables: V,
}

/// Standard GraphQL envelope. `errors` is independent of the HTTP status.
#[derive(Debug, Deserialize, Clone)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

impl<T> GraphQlResponse<T> {
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Error messages joined one per line, the way they are shown to the user.
    pub fn joined_errors(&self) -> Option<String> {
        let errors = self.errors.as_ref().filter(|e| !e.is_empty())?;
        Some(
            errors
                .iter()
                .map(|e| format!("  - {}", e.message))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub locations: Option<Vec<ErrorLocation>>,
    #[serde(default)]
    pub path: Option<Vec<PathSegment>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum PathSegment {
    Index(i64),
    Field(String),
}

#[derive(Debug, Serialize, Clone)]
pub struct PageVariables<'a> {
    pub page: u32,
    #[serde(rename = "perPage")]
    pub per_page: u32,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "typeName")]
    pub type_name: &'a str,
    #[serde(rename = "hasReplies")]
    pub has_replies: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct UserLookupVariables<'a> {
    #[serde(rename = "userName")]
    pub user_name: &'a str,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserLookup {
    #[serde(rename = "User")]
    pub user: Option<User>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageInfo {
    #[serde(rename = "hasNextPage", default)]
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PageData<A> {
    #[serde(rename = "Page")]
    pub page: Option<ActivitiesPage<A>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ActivitiesPage<A> {
    #[serde(default = "Vec::new")]
    pub activities: Vec<A>,
    #[serde(rename = "pageInfo")]
    pub page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ActivityReply {
    pub user: Option<User>,
    pub text: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaTitle {
    pub romaji: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Media {
    pub title: Option<MediaTitle>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListActivity {
    pub id: i64,
    #[serde(rename = "siteUrl")]
    pub site_url: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
    pub media: Option<Media>,
    pub user: Option<User>,
    pub replies: Option<Vec<ActivityReply>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TextActivity {
    pub id: i64,
    #[serde(rename = "siteUrl")]
    pub site_url: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
    pub text: Option<String>,
    pub user: Option<User>,
    pub replies: Option<Vec<ActivityReply>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessageActivity {
    pub id: i64,
    #[serde(rename = "siteUrl")]
    pub site_url: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
    pub message: Option<String>,
    pub messenger: Option<User>,
    pub recipient: Option<User>,
    pub replies: Option<Vec<ActivityReply>>,
}
