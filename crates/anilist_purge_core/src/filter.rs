/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::kind::ActivityKind;
use crate::model::{Activity, ActivityDetail, Page, Reply};

/// Reduces a freshly fetched page to the activities where `user_id` wrote
/// something containing an imgur link, keeping only that user's replies.
pub fn filter_page(page: &mut Page, kind: ActivityKind, user_id: i64) {
    let synthesize = kind.spec().synthesize_post;
    for activity in page.activities.iter_mut() {
        if synthesize {
            insert_post_reply(activity);
        }
        activity
            .replies
            .retain(|r| r.user_id() == user_id && r.imgur_count() > 0);
    }
    page.activities.retain(|a| !a.replies.is_empty());
}

fn insert_post_reply(activity: &mut Activity) {
    if activity.replies.first().is_some_and(|r| r.is_post) {
        return;
    }
    let ActivityDetail::Text { user, text } = &activity.detail else {
        return;
    };
    let body = Reply {
        user: user.clone(),
        text: text.clone(),
        created_at: activity.created_at,
        is_post: true,
    };
    activity.replies.insert(0, body);
}
