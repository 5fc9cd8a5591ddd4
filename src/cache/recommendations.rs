//! Recommendation cache backed by a key-value store
//!
//! Each user owns two keys:
//! - `<user_id>_recommendations`: JSON array of books
//! - `<user_id>_last_recommendations_update`: epoch milliseconds of the last
//!   successful refresh
//!
//! Overlapping refreshes for the same user are not sequenced. Whichever
//! completes last is what later reads see.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::RecommendationSource;
use crate::api::{ApiError, Book};
use crate::config::{RECOMMENDATIONS_PER_DAY, STALENESS_WINDOW_MS};
use crate::refresh::{RefreshEvent, RefreshEvents};
use crate::store::{KeyValueStore, StoreError};

/// Errors that can abort a refresh
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The recommendations could not be fetched or did not validate
    #[error("failed to fetch recommendations: {0}")]
    Fetch(#[from] ApiError),

    /// The new snapshot could not be written
    #[error("failed to store recommendations: {0}")]
    Store(#[from] StoreError),
}

/// Result of reading the cache
#[derive(Debug)]
pub struct CachedRecommendations {
    /// Books from the last completed refresh, possibly stale
    pub books: Vec<Book>,
    /// When the stored books were fetched; `None` if never
    pub last_updated: Option<DateTime<Utc>>,
    /// Background refresh started by this read, if the snapshot was stale
    pub refresh: Option<JoinHandle<()>>,
}

/// Per-user recommendation snapshots, refreshed at most once per window
#[derive(Clone)]
pub struct RecommendationCache {
    store: Arc<dyn KeyValueStore>,
    source: Arc<dyn RecommendationSource>,
    /// Held for writing while a refresh stores both keys, and for reading
    /// while a reader loads them
    entry_lock: Arc<RwLock<()>>,
    daily_quota: u32,
    staleness_window: Duration,
    events: Option<RefreshEvents>,
}

impl RecommendationCache {
    pub fn new(store: Arc<dyn KeyValueStore>, source: Arc<dyn RecommendationSource>) -> Self {
        Self {
            store,
            source,
            entry_lock: Arc::new(RwLock::new(())),
            daily_quota: RECOMMENDATIONS_PER_DAY,
            staleness_window: Duration::milliseconds(STALENESS_WINDOW_MS),
            events: None,
        }
    }

    /// Number of recommendations requested per background refresh
    pub fn with_daily_quota(mut self, daily_quota: u32) -> Self {
        self.daily_quota = daily_quota;
        self
    }

    /// Age after which a read triggers a refresh
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    /// Report background refresh progress on `events`
    pub fn with_events(mut self, events: RefreshEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub fn daily_quota(&self) -> u32 {
        self.daily_quota
    }

    /// Returns the stored recommendations for a user
    ///
    /// Never waits on the network. If the snapshot is stale or missing, a
    /// refresh is spawned on the current tokio runtime and the stale books
    /// are returned immediately.
    pub fn read(&self, user_id: &str) -> Vec<Book> {
        self.read_entry(user_id).books
    }

    /// Like [`read`](Self::read), but also returns the snapshot time and a
    /// handle to any refresh the read started
    pub fn read_entry(&self, user_id: &str) -> CachedRecommendations {
        let (last_updated, books) = {
            let _guard = self.entry_lock.read().unwrap_or_else(PoisonError::into_inner);
            (self.stored_timestamp(user_id), self.stored_books(user_id))
        };

        let now = Utc::now().timestamp_millis();
        let refresh = if is_stale(last_updated, now, self.staleness_window) {
            debug!(user_id, ?last_updated, "recommendations are stale");
            self.spawn_refresh(user_id)
        } else {
            None
        };

        CachedRecommendations {
            books,
            last_updated: last_updated.and_then(DateTime::<Utc>::from_timestamp_millis),
            refresh,
        }
    }

    /// When the user's snapshot was last refreshed
    pub fn last_updated(&self, user_id: &str) -> Option<DateTime<Utc>> {
        let _guard = self.entry_lock.read().unwrap_or_else(PoisonError::into_inner);
        self.stored_timestamp(user_id)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// Fetch `count` recommendations and replace the user's snapshot
    ///
    /// Recommendations without a book payload are dropped, preserving order.
    /// On failure the stored snapshot is left untouched.
    pub async fn refresh(&self, user_id: &str, count: u32) -> Result<Vec<Book>, RefreshError> {
        self.emit(RefreshEvent::Started {
            user_id: user_id.to_string(),
        });

        let result = self.fetch_and_store(user_id, count).await;

        match &result {
            Ok(books) => {
                info!(user_id, books = books.len(), "recommendations refreshed");
                self.emit(RefreshEvent::Completed {
                    user_id: user_id.to_string(),
                    books: books.len(),
                });
            }
            Err(e) => {
                self.emit(RefreshEvent::Failed {
                    user_id: user_id.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        result
    }

    async fn fetch_and_store(&self, user_id: &str, count: u32) -> Result<Vec<Book>, RefreshError> {
        let recommendations = self.source.fetch_recommendations(user_id, count).await?;
        let books: Vec<Book> = recommendations
            .into_iter()
            .filter_map(|recommendation| recommendation.book)
            .collect();

        self.store_entry(user_id, &books)?;
        Ok(books)
    }

    fn spawn_refresh(&self, user_id: &str) -> Option<JoinHandle<()>> {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(user_id, "no async runtime; skipping recommendation refresh");
                return None;
            }
        };

        let cache = self.clone();
        let user_id = user_id.to_string();
        let count = self.daily_quota;
        Some(runtime.spawn(async move {
            if let Err(error) = cache.refresh(&user_id, count).await {
                warn!(user_id = %user_id, %error, "background recommendation refresh failed");
            }
        }))
    }

    /// Writes both keys under the entry lock
    fn store_entry(&self, user_id: &str, books: &[Book]) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(books)?;
        let books_key = books_key(user_id);

        let _guard = self.entry_lock.write().unwrap_or_else(PoisonError::into_inner);
        let previous = self.store.get(&books_key);
        self.store.set(&books_key, &encoded)?;

        let now = Utc::now().timestamp_millis();
        if let Err(e) = self.store.set(&updated_key(user_id), &now.to_string()) {
            // Put the old books back so they stay paired with the old timestamp.
            // With nothing stored before, an empty value reads as no books.
            let restored = previous.as_deref().unwrap_or("");
            if let Err(restore) = self.store.set(&books_key, restored) {
                warn!(user_id, error = %restore, "failed to restore previous recommendations");
            }
            return Err(e);
        }
        Ok(())
    }

    fn stored_timestamp(&self, user_id: &str) -> Option<i64> {
        self.store
            .get(&updated_key(user_id))
            .and_then(|raw| parse_leading_int(&raw))
    }

    fn stored_books(&self, user_id: &str) -> Vec<Book> {
        let Some(raw) = self.store.get(&books_key(user_id)) else {
            return Vec::new();
        };
        if raw.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str(&raw) {
            Ok(books) => books,
            Err(e) => {
                warn!(user_id, error = %e, "stored recommendations are unreadable");
                Vec::new()
            }
        }
    }

    fn emit(&self, event: RefreshEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

/// Whether a snapshot taken at `last_updated` (epoch ms) needs refreshing at
/// `now` (epoch ms)
///
/// A missing timestamp is always stale. A snapshot exactly `window` old is
/// still fresh.
pub fn is_stale(last_updated: Option<i64>, now: i64, window: Duration) -> bool {
    match last_updated {
        None => true,
        Some(updated) => now.saturating_sub(updated) > window.num_milliseconds(),
    }
}

/// Reads the integer at the start of `raw`, ignoring whatever follows it
///
/// Leading whitespace and a sign are allowed, so `"1700000000000.5"` reads as
/// `1700000000000`. Returns `None` when there are no leading digits or the
/// value overflows.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    let sign_len = trimmed.len() - unsigned.len();
    if sign_len > 1 {
        return None;
    }
    let digits = unsigned.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    trimmed[..sign_len + digits].parse().ok()
}

fn books_key(user_id: &str) -> String {
    format!("{}_recommendations", user_id)
}

fn updated_key(user_id: &str) -> String {
    format!("{}_last_recommendations_update", user_id)
}
