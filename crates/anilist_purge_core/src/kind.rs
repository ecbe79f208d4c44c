/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    List,
    Text,
    Message,
    SentMessage,
}

/// Per-kind query and filtering parameters.
#[derive(Clone, Copy, Debug)]
pub struct KindSpec {
    /// `ActivityType` enum value on the server.
    pub type_name: &'static str,
    /// Argument of `Page.activities` the user id is bound to.
    pub user_arg: &'static str,
    pub has_replies: bool,
    pub fragment: &'static str,
    pub synthesize_post: bool,
    pub cache_file: &'static str,
}

const REPLIES: &str = "replies { user { id name } createdAt text }";

static LIST: KindSpec = KindSpec {
    type_name: "MEDIA_LIST",
    user_arg: "userId",
    has_replies: true,
    fragment: "... on ListActivity { siteUrl id createdAt media { title { romaji } } user { id name } ",
    synthesize_post: false,
    cache_file: "list_activities.json",
};

// Text bodies may themselves need editing, so activities without replies are requested too.
static TEXT: KindSpec = KindSpec {
    type_name: "TEXT",
    user_arg: "userId",
    has_replies: false,
    fragment: "... on TextActivity { siteUrl id createdAt text user { id name } ",
    synthesize_post: true,
    cache_file: "text_activities.json",
};

static MESSAGE: KindSpec = KindSpec {
    type_name: "MESSAGE",
    user_arg: "userId",
    has_replies: true,
    fragment: "... on MessageActivity { siteUrl id createdAt message messenger { id name } recipient { id name } ",
    synthesize_post: false,
    cache_file: "message_activities.json",
};

static SENT_MESSAGE: KindSpec = KindSpec {
    type_name: "MESSAGE",
    user_arg: "messengerId",
    has_replies: true,
    fragment: "... on MessageActivity { siteUrl id createdAt message messenger { id name } recipient { id name } ",
    synthesize_post: false,
    cache_file: "sent_message_activities.json",
};

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::List,
        ActivityKind::Text,
        ActivityKind::Message,
        ActivityKind::SentMessage,
    ];

    pub fn spec(self) -> &'static KindSpec {
        match self {
            ActivityKind::List => &LIST,
            ActivityKind::Text => &TEXT,
            ActivityKind::Message => &MESSAGE,
            ActivityKind::SentMessage => &SENT_MESSAGE,
        }
    }

    pub fn index(self) -> i64 {
        match self {
            ActivityKind::List => 0,
            ActivityKind::Text => 1,
            ActivityKind::Message => 2,
            ActivityKind::SentMessage => 3,
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.index() == index)
    }

    pub fn from_str(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "list" | "media_list" => Some(Self::List),
            "text" => Some(Self::Text),
            "message" | "messages" => Some(Self::Message),
            "sent" | "sent_message" | "sentmessage" | "sent-message" => Some(Self::SentMessage),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::List => "list",
            ActivityKind::Text => "text",
            ActivityKind::Message => "message",
            ActivityKind::SentMessage => "sent_message",
        }
    }

    pub fn page_query(self) -> String {
        let spec = self.spec();
        format!(
            "query ($page:Int!, $perPage:Int!, $userId:Int!, $typeName:ActivityType!, $hasReplies:Boolean!) {{ \
             Page(page:$page, perPage:$perPage) {{ \
             activities({}:$userId, type:$typeName, hasReplies:$hasReplies, sort:ID_DESC) {{ {}{} }} }} \
             pageInfo {{ hasNextPage }} \
             }} }}",
            spec.user_arg, spec.fragment, REPLIES
        )
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
