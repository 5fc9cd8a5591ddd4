//! Reading List API client
//!
//! Wraps every endpoint the client uses in a typed async function. Response
//! bodies are validated by deserializing into the types in [`super::schema`];
//! anything that does not match is logged and reported as
//! [`ApiError::Schema`].

use std::any::type_name;
use std::sync::{Arc, PoisonError, RwLock};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use super::schema::{
    AccountInfo, AuthReply, BasicUserInfo, Book, BookDetails, LoginBody, PersonalInfo,
    Recommendation, RegisterBody, ReviewBody, SearchQuery, Sentiment, ServerError, UserStreak,
};
use crate::config::{normalize_server_url, ClientConfig};

/// Characters left unescaped in path segments, matching `encodeURIComponent`
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Name of the cookie carrying the session token
const SESSION_COOKIE: &str = "session";

/// Shown when the server fails without a user-facing message
const UNKNOWN_ERROR: &str = "Unknown error occurred. Please try again.";

/// Errors that can occur when talking to the API server
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{detail}")]
    Status { status: u16, detail: String },

    /// Response body did not match the expected shape
    #[error("Unexpected response from server (expected {expected}): {source}")]
    Schema {
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Login succeeded but no session cookie came back
    #[error("The server did not start a session. Please try again.")]
    MissingSession,
}

impl ApiError {
    /// HTTP status code, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            ApiError::Schema { .. } | ApiError::MissingSession => None,
        }
    }
}

/// Client for the Reading List API server
///
/// Clones share one session token, so logging in through any clone
/// authenticates all of them.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session_token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a client for the given server with default HTTP settings
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a client from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self::with_client(client, &config.server_url).with_session(config.session_token.clone()))
    }

    /// Create a client with a custom HTTP client
    pub fn with_client(client: Client, base_url: impl AsRef<str>) -> Self {
        Self {
            client,
            base_url: normalize_server_url(base_url.as_ref()),
            session_token: Arc::default(),
        }
    }

    /// Attach the session token issued by the server at login
    ///
    /// The returned client no longer shares its token with earlier clones.
    pub fn with_session(mut self, token: Option<String>) -> Self {
        self.session_token = Arc::new(RwLock::new(token));
        self
    }

    /// Replace the session token for this client and its clones
    pub fn set_session(&self, token: Option<String>) {
        *self
            .session_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a session token is attached
    pub fn has_session(&self) -> bool {
        self.session().is_some()
    }

    fn session(&self) -> Option<String> {
        self.session_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log in and return the session token the server issued
    ///
    /// `POST /auth/login`. The token comes from the `session` cookie; the
    /// client does not start using it until [`ApiClient::set_session`].
    pub async fn log_in(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let url = format!("{}auth/login", self.base_url);
        let request = self
            .request(Method::POST, &url)
            .json(&LoginBody { email, password });
        let response = self.send(request).await?;
        let token = session_cookie(&response).ok_or(ApiError::MissingSession)?;
        let reply: AuthReply = self.json(response).await?;
        debug!(reply = %reply.message, "logged in");
        Ok(token)
    }

    /// Create an account
    ///
    /// `POST /auth/register`. Does not log in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), ApiError> {
        let url = format!("{}auth/register", self.base_url);
        let request = self
            .request(Method::POST, &url)
            .json(&RegisterBody { name, email, password });
        let response = request.send().await?;
        // An address that is already taken comes back as 404 with a detail
        if !response.status().is_success() {
            return Err(status_error_with(response, &[StatusCode::NOT_FOUND]).await);
        }
        let reply: AuthReply = self.json(response).await?;
        debug!(reply = %reply.message, "registered");
        Ok(())
    }

    /// Search the catalogue
    ///
    /// `GET /search/`. No matches is an empty list rather than an error.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Book>, ApiError> {
        let url = format!("{}search/", self.base_url);
        let response = self.request(Method::GET, &url).query(query).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => self.json(response).await,
            _ => Err(status_error(response).await),
        }
    }

    /// Fetch any user's public profile and reviews
    ///
    /// `GET /user/{user_id}`
    pub async fn account_info(&self, user_id: &str) -> Result<Option<AccountInfo>, ApiError> {
        let url = self.url(&["user", user_id]);
        self.optional_json(self.request(Method::GET, &url)).await
    }

    /// Fetch a user's display name and picture
    ///
    /// `GET /user/{user_id}?basic=true`
    pub async fn basic_account_info(
        &self,
        user_id: &str,
    ) -> Result<Option<BasicUserInfo>, ApiError> {
        let url = self.url(&["user", user_id]);
        let request = self.request(Method::GET, &url).query(&[("basic", "true")]);
        self.optional_json(request).await
    }

    /// Fetch up to `count` recommendations for a user
    ///
    /// `GET /recommendations/{user_id}?n={count}`
    pub async fn fetch_recommendations(
        &self,
        user_id: &str,
        count: u32,
    ) -> Result<Vec<Recommendation>, ApiError> {
        let url = self.url(&["recommendations", user_id]);
        let request = self
            .request(Method::GET, &url)
            .query(&[("n", count.to_string())]);
        let response = self.send(request).await?;
        self.json(response).await
    }

    /// Fetch the logged-in user's profile
    ///
    /// Returns `Ok(None)` when the server does not recognise the session.
    pub async fn personal_info(&self) -> Result<Option<PersonalInfo>, ApiError> {
        let url = format!("{}user/", self.base_url);
        let response = self.request(Method::GET, &url).send().await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => self.json(response).await.map(Some),
            _ => Err(status_error(response).await),
        }
    }

    /// Fetch basic information about a book, like its title
    ///
    /// `GET /books/{book_id}?basic=true`
    pub async fn basic_details(&self, book_id: &str) -> Result<Option<Book>, ApiError> {
        let url = self.url(&["books", book_id]);
        let request = self.request(Method::GET, &url).query(&[("basic", "true")]);
        self.optional_json(request).await
    }

    /// Fetch a book together with its reviews
    ///
    /// `GET /books/{book_id}`
    pub async fn details(&self, book_id: &str) -> Result<Option<BookDetails>, ApiError> {
        let url = self.url(&["books", book_id]);
        self.optional_json(self.request(Method::GET, &url)).await
    }

    /// Add a book to a user's saved list
    pub async fn save_book(&self, user_id: &str, book_id: &str) -> Result<(), ApiError> {
        let url = self.url(&["users", user_id, "saved", book_id]);
        self.send(self.request(Method::POST, &url)).await.map(drop)
    }

    /// Remove a book from a user's saved list
    pub async fn unsave_book(&self, user_id: &str, book_id: &str) -> Result<(), ApiError> {
        let url = self.url(&["users", user_id, "saved", book_id]);
        self.send(self.request(Method::DELETE, &url)).await.map(drop)
    }

    /// Create a review, or overwrite the existing one. Requires a session.
    pub async fn create_review(&self, book_id: &str, rating: u8, text: &str) -> Result<(), ApiError> {
        let url = self.url(&["review", book_id]);
        let request = self
            .request(Method::PUT, &url)
            .json(&ReviewBody { rating, text });
        self.send(request).await.map(drop)
    }

    /// Delete the session user's review of a book. Requires a session.
    pub async fn remove_review(&self, book_id: &str) -> Result<(), ApiError> {
        let url = self.url(&["review", book_id]);
        self.send(self.request(Method::DELETE, &url)).await.map(drop)
    }

    /// Fetch a user's reading streak
    pub async fn streak(&self, user_id: &str) -> Result<Option<UserStreak>, ApiError> {
        let url = self.url(&["user", user_id, "streak"]);
        self.optional_json(self.request(Method::GET, &url)).await
    }

    /// Fetch the aggregate review sentiment for a book
    pub async fn sentiment(&self, book_id: &str) -> Result<Option<Sentiment>, ApiError> {
        let url = self.url(&["sentiment", book_id]);
        self.optional_json(self.request(Method::GET, &url)).await
    }

    /// Build an absolute URL from percent-encoded path segments
    fn url(&self, segments: &[&str]) -> String {
        let path = segments
            .iter()
            .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(%method, url, "api request");
        let builder = self.client.request(method, url);
        match self.session() {
            Some(token) => builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, token)),
            None => builder,
        }
    }

    /// Send a request, turning non-success statuses into errors
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }

    /// Like `json`, but a non-success status yields `Ok(None)`
    async fn optional_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "no result");
            return Ok(None);
        }
        self.json(response).await.map(Some)
    }

    async fn json<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        parse_body(&text)
    }
}

/// Validate a response body against the expected type
pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|source| {
        let expected = type_name::<T>();
        warn!(
            expected,
            received = body,
            error = %source,
            "The server sent an unexpected result"
        );
        ApiError::Schema { expected, source }
    })
}

/// Value of the `session` cookie set by a response
fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Build an error for a non-success response
///
/// 401, 409 and 500 responses carry a `detail` message suitable for end
/// users; anything else gets a generic message.
async fn status_error(response: Response) -> ApiError {
    status_error_with(response, &[]).await
}

/// Like [`status_error`], also trusting the `detail` of `extra` statuses
async fn status_error_with(response: Response, extra: &[StatusCode]) -> ApiError {
    let status = response.status();
    let has_detail = matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::CONFLICT | StatusCode::INTERNAL_SERVER_ERROR
    ) || extra.contains(&status);
    let detail = if has_detail {
        response
            .text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<ServerError>(&body).ok())
            .map(|e| e.detail)
    } else {
        None
    };
    ApiError::Status {
        status: status.as_u16(),
        detail: detail.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
    }
}
