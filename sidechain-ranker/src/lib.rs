//! Unified Timeline Ranker: a parallel multi-source feed composer that
//! merges followed-user posts, personalized recommendations, trending,
//! and recent content into one ranked sequence. Depends only on
//! `sidechain-common` (spec §2 dependency order).

pub mod error;
pub mod ranker;
pub mod scoring;
pub mod source;
pub mod types;

pub use error::{RankerError, Result};
pub use ranker::{AuthorLookup, Ranker};
pub use source::FeedSource;
pub use types::{
    AuthorRecord, Engagement, ScoredItem, Source, TimelineItem, TimelineMeta, TimelineResponse,
};
