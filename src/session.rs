//! Application context and the logged-in user's session
//!
//! [`AppContext`] is built once at startup and passed to whatever presents
//! data to the user. It owns the API client, the session, the local store
//! and the recommendation cache; there is no global state.
//!
//! The session token issued at login is kept in the local store under
//! [`SESSION_KEY`], so later runs stay logged in without `--session`.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, Book, PersonalInfo};
use crate::cache::{CachedRecommendations, RecommendationCache, RefreshError};
use crate::config::ClientConfig;
use crate::refresh::RefreshEvents;
use crate::store::{FileStore, KeyValueStore, MemoryStore, StoreError};

/// Store key holding the session token from the last login
pub const SESSION_KEY: &str = "session_token";

/// Errors surfaced by application-level operations
#[derive(Debug, Error)]
pub enum AppError {
    /// The API call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Refreshing recommendations failed
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// The session token could not be saved locally
    #[error("failed to save session: {0}")]
    Store(#[from] StoreError),

    /// The operation needs a logged-in user
    #[error("You need to log in first.")]
    NotLoggedIn,
}

/// The current user's profile, if anyone is logged in
#[derive(Debug, Default)]
pub struct Session {
    user: RwLock<Option<PersonalInfo>>,
}

impl Session {
    pub fn new(user: Option<PersonalInfo>) -> Self {
        Self {
            user: RwLock::new(user),
        }
    }

    /// A copy of the logged-in user's profile
    pub fn current_user(&self) -> Option<PersonalInfo> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Id of the logged-in user
    pub fn user_id(&self) -> Option<String> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|user| user.id.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn set_user(&self, user: Option<PersonalInfo>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    pub fn clear(&self) {
        self.set_user(None);
    }

    /// Whether the logged-in user has saved `book_id`
    pub fn is_saved(&self, book_id: &str) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|user| user.saved_books.iter().any(|book| book.id == book_id))
    }
}

/// Everything a front end needs, constructed once and passed down
#[derive(Clone)]
pub struct AppContext {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
    session: Arc<Session>,
    recommendations: RecommendationCache,
}

impl AppContext {
    /// Builds the context and populates the session from the server
    ///
    /// Local storage lives in `config.data_dir`, falling back to the platform
    /// data directory, and to memory if neither is available. Without a
    /// configured token the one saved at the last login is used. A failed or
    /// unauthenticated profile fetch leaves the session empty.
    pub async fn initialize(
        config: &ClientConfig,
        events: Option<RefreshEvents>,
    ) -> Result<Self, AppError> {
        let store = open_store(config);
        let token = config
            .session_token
            .clone()
            .or_else(|| stored_session(store.as_ref()));
        let api = ApiClient::from_config(config)?.with_session(token);
        let mut recommendations = RecommendationCache::new(store.clone(), Arc::new(api.clone()))
            .with_daily_quota(config.daily_quota)
            .with_staleness_window(config.staleness_window);
        if let Some(events) = events {
            recommendations = recommendations.with_events(events);
        }

        let context = Self::new(api, store, Session::default(), recommendations);
        context.reload_user().await;
        Ok(context)
    }

    /// Assembles a context from already-built parts
    pub fn new(
        api: ApiClient,
        store: Arc<dyn KeyValueStore>,
        session: Session,
        recommendations: RecommendationCache,
    ) -> Self {
        Self {
            api,
            store,
            session: Arc::new(session),
            recommendations,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn recommendations(&self) -> &RecommendationCache {
        &self.recommendations
    }

    /// Logs in, remembers the session token and loads the profile
    ///
    /// Returns whether the new session was accepted.
    pub async fn log_in(&self, email: &str, password: &str) -> Result<bool, AppError> {
        let token = self.api.log_in(email, password).await?;
        self.store.set(SESSION_KEY, &token)?;
        self.api.set_session(Some(token));
        Ok(self.reload_user().await)
    }

    /// Creates an account and logs straight into it
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<bool, AppError> {
        self.api.register(name, email, password).await?;
        self.log_in(email, password).await
    }

    /// Forgets the saved session token and the loaded profile
    pub fn log_out(&self) -> Result<(), AppError> {
        self.api.set_session(None);
        self.session.clear();
        self.store.set(SESSION_KEY, "")?;
        Ok(())
    }

    /// Re-fetches the logged-in user's profile into the session
    ///
    /// Returns whether a user is logged in afterwards.
    pub async fn reload_user(&self) -> bool {
        if !self.api.has_session() {
            self.session.clear();
            return false;
        }
        match self.api.personal_info().await {
            Ok(user) => {
                if let Some(user) = &user {
                    info!(user_id = %user.id, "session loaded");
                }
                self.session.set_user(user);
            }
            Err(error) => {
                warn!(%error, "failed to load profile");
                self.session.clear();
            }
        }
        self.session.is_logged_in()
    }

    /// Cached recommendations for the logged-in user
    ///
    /// Empty when nobody is logged in. May start a background refresh.
    pub fn recommended_books(&self) -> Vec<Book> {
        self.recommended_entry()
            .map(|entry| entry.books)
            .unwrap_or_default()
    }

    /// Cached recommendations with snapshot time and refresh handle
    pub fn recommended_entry(&self) -> Option<CachedRecommendations> {
        let user_id = self.session.user_id()?;
        Some(self.recommendations.read_entry(&user_id))
    }

    /// Refreshes the logged-in user's recommendations now
    pub async fn refresh_recommendations(&self) -> Result<Vec<Book>, AppError> {
        let user_id = self.require_user()?;
        let books = self
            .recommendations
            .refresh(&user_id, self.recommendations.daily_quota())
            .await?;
        Ok(books)
    }

    pub async fn save_book(&self, book_id: &str) -> Result<(), AppError> {
        let user_id = self.require_user()?;
        self.api.save_book(&user_id, book_id).await?;
        self.reload_user().await;
        Ok(())
    }

    pub async fn unsave_book(&self, book_id: &str) -> Result<(), AppError> {
        let user_id = self.require_user()?;
        self.api.unsave_book(&user_id, book_id).await?;
        self.reload_user().await;
        Ok(())
    }

    /// Creates or overwrites the logged-in user's review of a book
    pub async fn create_review(&self, book_id: &str, rating: u8, text: &str) -> Result<(), AppError> {
        self.require_user()?;
        self.api.create_review(book_id, rating, text).await?;
        self.reload_user().await;
        Ok(())
    }

    pub async fn remove_review(&self, book_id: &str) -> Result<(), AppError> {
        self.require_user()?;
        self.api.remove_review(book_id).await?;
        self.reload_user().await;
        Ok(())
    }

    fn require_user(&self) -> Result<String, AppError> {
        self.session.user_id().ok_or(AppError::NotLoggedIn)
    }
}

/// Token saved at the last login, if any
fn stored_session(store: &dyn KeyValueStore) -> Option<String> {
    store
        .get(SESSION_KEY)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn open_store(config: &ClientConfig) -> Arc<dyn KeyValueStore> {
    match config.data_dir.clone().map(FileStore::with_dir).or_else(FileStore::new) {
        Some(store) => Arc::new(store),
        None => {
            warn!("no data directory available; recommendations will not persist");
            Arc::new(MemoryStore::new())
        }
    }
}
