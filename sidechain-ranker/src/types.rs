//! Data model for one ranking call (spec §3 TimelineItem).

use chrono::{DateTime, Utc};
use sidechain_common::{PostId, UserId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Following,
    Recommended,
    Trending,
    Recent,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Following,
        Source::Recommended,
        Source::Trending,
        Source::Recent,
    ];

    /// Source weight applied to `base_score` during scoring.
    pub fn weight(self) -> f64 {
        match self {
            Source::Following => 1.5,
            Source::Recommended => 1.3,
            Source::Trending => 1.0,
            Source::Recent => 0.7,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Source::Following => "following",
            Source::Recommended => "recommended",
            Source::Trending => "trending",
            Source::Recent => "recent",
        };
        write!(f, "{s}")
    }
}

/// Engagement counters used by the engagement-factor multiplier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Engagement {
    pub likes: u64,
    pub plays: u64,
    pub comments: u64,
}

/// An author record used to enrich an item whose author wasn't preloaded
/// by its originating source (spec §4.3).
#[derive(Debug, Clone)]
pub struct AuthorRecord {
    pub user_id: UserId,
    pub display_name: String,
}

/// One entry in a composed feed; ephemeral, exists only for the duration
/// of a single ranking call (spec §3).
#[derive(Debug, Clone)]
pub struct TimelineItem {
    pub post_id: PostId,
    pub source: Source,
    pub base_score: f64,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub engagement: Engagement,
    /// `None` until enriched by a configured `AuthorLookup` collaborator.
    pub author: Option<AuthorRecord>,
}

/// A scored item carrying its final score alongside the original entry,
/// produced by [`crate::scoring::score_item`].
#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub item: TimelineItem,
    pub final_score: f64,
}

/// Per-source counts and failure reporting returned alongside the
/// ranked items (spec §4.3 `meta`, supplemented with `degraded`).
#[derive(Debug, Clone, Default)]
pub struct TimelineMeta {
    pub following_count: usize,
    pub recommended_count: usize,
    pub trending_count: usize,
    pub recent_count: usize,
    pub has_more: bool,
    pub degraded: Vec<Source>,
}

#[derive(Debug, Clone)]
pub struct TimelineResponse {
    pub items: Vec<TimelineItem>,
    pub meta: TimelineMeta,
}
