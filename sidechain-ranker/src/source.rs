//! The `FeedSource` collaborator seam and in-memory reference
//! implementations used for tests and local wiring. A production
//! deployment would back these with the follow graph, the
//! recommendation service, a trending index and a recency-ordered post
//! store — all explicitly out of scope per spec §1.

use crate::error::Result;
use crate::types::{Source, TimelineItem};
use async_trait::async_trait;
use sidechain_common::UserId;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, user: UserId, limit: usize, offset: usize) -> Result<Vec<TimelineItem>>;
    fn source_kind(&self) -> Source;
}

/// An in-memory source backed by a fixed per-user item list, paginated
/// by `limit`/`offset`. All four reference sources below are this same
/// shape with a different [`Source`] tag.
pub struct InMemorySource {
    kind: Source,
    items_by_user: RwLock<HashMap<UserId, Vec<TimelineItem>>>,
}

impl InMemorySource {
    pub fn new(kind: Source) -> Self {
        Self {
            kind,
            items_by_user: RwLock::new(HashMap::new()),
        }
    }

    pub async fn seed(&self, user: UserId, items: Vec<TimelineItem>) {
        self.items_by_user.write().await.insert(user, items);
    }
}

#[async_trait]
impl FeedSource for InMemorySource {
    async fn fetch(&self, user: UserId, limit: usize, offset: usize) -> Result<Vec<TimelineItem>> {
        let items = self.items_by_user.read().await;
        let Some(all) = items.get(&user) else {
            return Ok(Vec::new());
        };
        Ok(all.iter().skip(offset).take(limit).cloned().collect())
    }

    fn source_kind(&self) -> Source {
        self.kind
    }
}

pub fn following_source() -> InMemorySource {
    InMemorySource::new(Source::Following)
}

pub fn recommended_source() -> InMemorySource {
    InMemorySource::new(Source::Recommended)
}

pub fn trending_source() -> InMemorySource {
    InMemorySource::new(Source::Trending)
}

pub fn recent_source() -> InMemorySource {
    InMemorySource::new(Source::Recent)
}

/// A source that always fails, used in tests to exercise the
/// per-source-failure-is-non-fatal path (spec §4.3 failure semantics).
pub struct FailingSource(pub Source);

#[async_trait]
impl FeedSource for FailingSource {
    async fn fetch(&self, _user: UserId, _limit: usize, _offset: usize) -> Result<Vec<TimelineItem>> {
        Err(crate::error::RankerError::SourceFailed(
            self.0.to_string(),
            "simulated failure".into(),
        ))
    }

    fn source_kind(&self) -> Source {
        self.0
    }
}
