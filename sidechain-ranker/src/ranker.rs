//! The top-level `Timeline` composition: parallel fan-in over four
//! sources, dedup, mute filtering, scoring, sort, and pagination.

use crate::scoring::{score_item, sort_scored};
use crate::source::FeedSource;
use crate::types::{AuthorRecord, Source, TimelineItem, TimelineMeta, TimelineResponse};
use chrono::Utc;
use sidechain_common::{config::RankerConfig, KeyedCache, PostId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[async_trait::async_trait]
pub trait AuthorLookup: Send + Sync {
    async fn lookup(&self, user_id: UserId) -> Option<AuthorRecord>;
}

pub struct Ranker {
    following: Arc<dyn FeedSource>,
    recommended: Arc<dyn FeedSource>,
    trending: Arc<dyn FeedSource>,
    recent: Arc<dyn FeedSource>,
    author_cache: KeyedCache<UserId, AuthorRecord>,
    author_lookup: Option<Arc<dyn AuthorLookup>>,
    config: RankerConfig,
}

impl Ranker {
    pub fn new(
        following: Arc<dyn FeedSource>,
        recommended: Arc<dyn FeedSource>,
        trending: Arc<dyn FeedSource>,
        recent: Arc<dyn FeedSource>,
        config: RankerConfig,
    ) -> Self {
        Self {
            following,
            recommended,
            trending,
            recent,
            author_cache: KeyedCache::new(10_000, Duration::from_secs(300)),
            author_lookup: None,
            config,
        }
    }

    /// Registers the author-lookup collaborator `timeline()` enriches
    /// page items with. Without one, items keep `author: None`.
    pub fn with_author_lookup(mut self, lookup: Arc<dyn AuthorLookup>) -> Self {
        self.author_lookup = Some(lookup);
        self
    }

    /// Enriches `author_id` via the cache, falling back to the configured
    /// lookup collaborator on a miss; a no-op if none was configured.
    async fn enrich_author(&self, author_id: UserId) -> Option<AuthorRecord> {
        if let Some(cached) = self.author_cache.get(&author_id).await {
            return Some(cached);
        }
        let lookup = self.author_lookup.as_ref()?;
        let record = lookup.lookup(author_id).await?;
        self.author_cache.insert(author_id, record.clone()).await;
        Some(record)
    }

    /// Composes the unified timeline for `user`, muting `muted_authors`.
    pub async fn timeline(
        &self,
        user: UserId,
        limit: usize,
        offset: usize,
        muted_authors: &HashSet<UserId>,
    ) -> TimelineResponse {
        let fetch_limit = self.config.fetch_multiplier * limit;

        let (following, recommended, trending, recent) = tokio::join!(
            self.following.fetch(user, fetch_limit, 0),
            self.recommended.fetch(user, fetch_limit, 0),
            self.trending.fetch(user, fetch_limit, 0),
            self.recent.fetch(user, fetch_limit, 0),
        );

        let mut meta = TimelineMeta::default();
        let mut all_items = Vec::new();

        for (result, count_field, source) in [
            (following, &mut meta.following_count, Source::Following),
            (recommended, &mut meta.recommended_count, Source::Recommended),
            (trending, &mut meta.trending_count, Source::Trending),
            (recent, &mut meta.recent_count, Source::Recent),
        ] {
            match result {
                Ok(items) => {
                    *count_field = items.len();
                    all_items.extend(items);
                }
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "feed source failed, skipping");
                    meta.degraded.push(source);
                }
            }
        }

        // Dedupe by post id, preserving first occurrence.
        let mut seen: HashSet<PostId> = HashSet::new();
        all_items.retain(|item| seen.insert(item.post_id));

        // Filter out posts authored by muted users.
        all_items.retain(|item| !muted_authors.contains(&item.author_id));

        let now = Utc::now();
        let mut scored: Vec<_> = all_items.into_iter().map(|item| score_item(item, now)).collect();
        sort_scored(&mut scored, self.config.tie_break_epsilon);

        let total = scored.len();
        let mut page: Vec<TimelineItem> = scored
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|s| s.item)
            .collect();

        meta.has_more = offset + page.len() < total;

        // Enrich items whose author record wasn't preloaded by their
        // originating source (spec §4.3) — only the returned page, never
        // the full fetched candidate set.
        if self.author_lookup.is_some() {
            for item in &mut page {
                if item.author.is_none() {
                    item.author = self.enrich_author(item.author_id).await;
                }
            }
        }

        TimelineResponse { items: page, meta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FailingSource, InMemorySource};
    use crate::types::Engagement;
    use chrono::Duration;

    fn item(source: Source, minutes_ago: i64) -> TimelineItem {
        TimelineItem {
            post_id: PostId::new(),
            source,
            base_score: 1.0,
            author_id: UserId::new(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            engagement: Engagement::default(),
            author: None,
        }
    }

    #[tokio::test]
    async fn merges_four_sources_with_no_duplicates() {
        let user = UserId::new();
        let following = InMemorySource::new(Source::Following);
        let recommended = InMemorySource::new(Source::Recommended);
        let trending = InMemorySource::new(Source::Trending);
        let recent = InMemorySource::new(Source::Recent);

        let p1 = item(Source::Following, 10);
        let p2 = item(Source::Recommended, 10);
        following.seed(user, vec![p1.clone(), p2.clone()]).await;
        recommended.seed(user, vec![p2.clone()]).await;
        trending.seed(user, vec![]).await;
        recent.seed(user, vec![]).await;

        let ranker = Ranker::new(
            Arc::new(following),
            Arc::new(recommended),
            Arc::new(trending),
            Arc::new(recent),
            RankerConfig::default(),
        );

        let response = ranker.timeline(user, 10, 0, &HashSet::new()).await;
        let ids: HashSet<_> = response.items.iter().map(|i| i.post_id).collect();
        assert_eq!(ids.len(), response.items.len());
        assert!(ids.contains(&p1.post_id));
        assert!(ids.contains(&p2.post_id));
    }

    #[tokio::test]
    async fn muted_author_is_excluded() {
        let user = UserId::new();
        let following = InMemorySource::new(Source::Following);
        let mut muted_item = item(Source::Following, 5);
        let muted_author = muted_item.author_id;
        following.seed(user, vec![muted_item.clone()]).await;
        muted_item.author_id = muted_author;

        let mut muted = HashSet::new();
        muted.insert(muted_author);

        let ranker = Ranker::new(
            Arc::new(following),
            Arc::new(InMemorySource::new(Source::Recommended)),
            Arc::new(InMemorySource::new(Source::Trending)),
            Arc::new(InMemorySource::new(Source::Recent)),
            RankerConfig::default(),
        );

        let response = ranker.timeline(user, 10, 0, &muted).await;
        assert!(response.items.is_empty());
    }

    #[tokio::test]
    async fn one_failing_source_is_non_fatal() {
        let user = UserId::new();
        let following = InMemorySource::new(Source::Following);
        following.seed(user, vec![item(Source::Following, 1)]).await;

        let ranker = Ranker::new(
            Arc::new(following),
            Arc::new(FailingSource(Source::Recommended)),
            Arc::new(InMemorySource::new(Source::Trending)),
            Arc::new(InMemorySource::new(Source::Recent)),
            RankerConfig::default(),
        );

        let response = ranker.timeline(user, 10, 0, &HashSet::new()).await;
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.meta.degraded, vec![Source::Recommended]);
    }

    #[tokio::test]
    async fn all_sources_failing_yields_empty_feed() {
        let user = UserId::new();
        let ranker = Ranker::new(
            Arc::new(FailingSource(Source::Following)),
            Arc::new(FailingSource(Source::Recommended)),
            Arc::new(FailingSource(Source::Trending)),
            Arc::new(FailingSource(Source::Recent)),
            RankerConfig::default(),
        );

        let response = ranker.timeline(user, 10, 0, &HashSet::new()).await;
        assert!(response.items.is_empty());
        assert_eq!(response.meta.degraded.len(), 4);
    }

    #[tokio::test]
    async fn output_respects_limit() {
        let user = UserId::new();
        let following = InMemorySource::new(Source::Following);
        let items: Vec<_> = (0..20).map(|i| item(Source::Following, i)).collect();
        following.seed(user, items).await;

        let ranker = Ranker::new(
            Arc::new(following),
            Arc::new(InMemorySource::new(Source::Recommended)),
            Arc::new(InMemorySource::new(Source::Trending)),
            Arc::new(InMemorySource::new(Source::Recent)),
            RankerConfig::default(),
        );

        let response = ranker.timeline(user, 5, 0, &HashSet::new()).await;
        assert_eq!(response.items.len(), 5);
        assert!(response.meta.has_more);
    }

    struct FixedAuthorLookup(AuthorRecord);

    #[async_trait::async_trait]
    impl AuthorLookup for FixedAuthorLookup {
        async fn lookup(&self, _user_id: UserId) -> Option<AuthorRecord> {
            Some(self.0.clone())
        }
    }

    #[tokio::test]
    async fn timeline_enriches_page_items_via_configured_lookup() {
        let user = UserId::new();
        let following = InMemorySource::new(Source::Following);
        let seeded = item(Source::Following, 1);
        let author_id = seeded.author_id;
        following.seed(user, vec![seeded]).await;

        let author = AuthorRecord {
            user_id: author_id,
            display_name: "producer".into(),
        };
        let ranker = Ranker::new(
            Arc::new(following),
            Arc::new(InMemorySource::new(Source::Recommended)),
            Arc::new(InMemorySource::new(Source::Trending)),
            Arc::new(InMemorySource::new(Source::Recent)),
            RankerConfig::default(),
        )
        .with_author_lookup(Arc::new(FixedAuthorLookup(author)));

        let response = ranker.timeline(user, 10, 0, &HashSet::new()).await;
        assert_eq!(response.items.len(), 1);
        let enriched = response.items[0].author.as_ref().expect("author should be enriched");
        assert_eq!(enriched.display_name, "producer");
    }

    #[tokio::test]
    async fn timeline_leaves_author_none_without_configured_lookup() {
        let user = UserId::new();
        let following = InMemorySource::new(Source::Following);
        following.seed(user, vec![item(Source::Following, 1)]).await;

        let ranker = Ranker::new(
            Arc::new(following),
            Arc::new(InMemorySource::new(Source::Recommended)),
            Arc::new(InMemorySource::new(Source::Trending)),
            Arc::new(InMemorySource::new(Source::Recent)),
            RankerConfig::default(),
        );

        let response = ranker.timeline(user, 10, 0, &HashSet::new()).await;
        assert!(response.items[0].author.is_none());
    }
}
