//! Daily recommendation cache
//!
//! Keeps a per-user snapshot of recommended books in a [`KeyValueStore`].
//! Reads are synchronous and always answer from storage; when the snapshot
//! is older than the staleness window a refresh is spawned in the background
//! and its result becomes visible to later reads.
//!
//! [`KeyValueStore`]: crate::store::KeyValueStore

mod recommendations;
mod source;

pub use recommendations::{
    is_stale, CachedRecommendations, RecommendationCache, RefreshError,
};
pub use source::RecommendationSource;
