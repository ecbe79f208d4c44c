/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::kind::ActivityKind;
use crate::model::Page;
use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// Filtered pages, one JSON file per activity kind.
#[derive(Clone, Debug)]
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, kind: ActivityKind) -> PathBuf {
        self.dir.join(kind.spec().cache_file)
    }

    pub fn load(&self, kind: ActivityKind) -> Result<Option<Vec<Page>>> {
        let path = self.path_for(kind);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        let pages: Vec<Page> = serde_json::from_slice(&raw)
            .with_context(|| format!("parse page cache {}", path.display()))?;
        for page in &pages {
            if let Some(a) = page.activities.iter().find(|a| !a.kind_matches(kind)) {
                bail!(
                    "page cache {} holds activity {} that is not a {kind} activity",
                    path.display(),
                    a.id
                );
            }
        }
        info!("loaded {} cached {kind} pages", pages.len());
        Ok(Some(pages))
    }

    pub fn save(&self, kind: ActivityKind, pages: &[Page]) -> Result<()> {
        let path = self.path_for(kind);
        let json = serde_json::to_vec(pages).context("encode page cache")?;
        write_atomic(&path, &json)?;
        info!("saved {} {kind} pages to {}", pages.len(), path.display());
        Ok(())
    }
}

/// Writes through a sibling temp file so readers never see a partial file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activity, ActivityDetail, PageInfo, Reply, User};

    fn sample_pages() -> Vec<Page> {
        let me = User {
            id: 3,
            name: "me".to_string(),
        };
        let activity = |id: i64, replies: usize| Activity {
            id,
            site_url: Some(format!("https://anilist.co/activity/{id}")),
            created_at: 1_600_000_000,
            replies: (0..replies)
                .map(|i| Reply {
                    user: Some(me.clone()),
                    text: format!("imgur.com/{i}"),
                    created_at: 1_600_000_100,
                    is_post: i == 0,
                })
                .collect(),
            detail: ActivityDetail::Text {
                user: Some(me.clone()),
                text: "imgur.com/0".to_string(),
            },
        };
        vec![
            Page {
                activities: vec![activity(10, 2), activity(9, 1)],
                page_info: Some(PageInfo {
                    has_next_page: true,
                }),
                error: None,
            },
            Page {
                activities: vec![activity(4, 3)],
                page_info: Some(PageInfo {
                    has_next_page: false,
                }),
                error: None,
            },
        ]
    }

    #[test]
    fn missing_cache_is_absent() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = PageCache::new(dir.path());
        assert!(cache.load(ActivityKind::List).unwrap().is_none());
    }

    #[test]
    fn round_trips_pages_per_kind() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = PageCache::new(dir.path().join("nested"));
        let pages = sample_pages();
        cache.save(ActivityKind::Text, &pages).unwrap();

        let loaded = cache.load(ActivityKind::Text).unwrap().unwrap();
        assert_eq!(loaded, pages);
        let ids: Vec<_> = loaded
            .iter()
            .flat_map(|p| p.activities.iter().map(|a| (a.id, a.replies.len())))
            .collect();
        assert_eq!(ids, [(10, 2), (9, 1), (4, 3)]);
        assert!(loaded[0].activities[0].replies[0].is_post);

        assert!(cache.load(ActivityKind::List).unwrap().is_none());
        assert!(!cache.path_for(ActivityKind::Text).with_extension("json.tmp").exists());
    }

    #[test]
    fn rejects_cache_of_another_kind() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = PageCache::new(dir.path());
        let json = serde_json::to_vec(&sample_pages()).unwrap();
        fs::write(cache.path_for(ActivityKind::List), json).unwrap();
        assert!(cache.load(ActivityKind::List).is_err());
    }

    #[test]
    fn page_error_is_not_persisted() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = PageCache::new(dir.path());
        let mut pages = sample_pages();
        pages[1].error = Some("  - boom".to_string());
        cache.save(ActivityKind::Text, &pages).unwrap();
        let loaded = cache.load(ActivityKind::Text).unwrap().unwrap();
        assert_eq!(loaded[1].error, None);
    }
}
