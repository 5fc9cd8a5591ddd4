//! Integration tests for the API client and the recommendation cache
//! against a mock HTTP server

use std::sync::Arc;

use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::TempDir;

use readinglist::api::{ApiClient, ApiError, SearchQuery};
use readinglist::cache::RecommendationCache;
use readinglist::config::ClientConfig;
use readinglist::session::{AppContext, SESSION_KEY};
use readinglist::store::{FileStore, KeyValueStore, MemoryStore};

const RECOMMENDATIONS_BODY: &str = r#"[
    {"book": {"id": "b1", "title": "Dune", "authors": ["Frank Herbert"], "categories": null,
              "description": null, "imageLinks": null, "averageRating": 4.5}, "score": 0.9},
    {"book_id": "gone", "score": 0.5},
    {"book": {"id": "b2", "title": "Emma", "authors": ["Jane Austen"]}, "bookId": "b2", "score": 0.3}
]"#;

const PERSONAL_INFO_BODY: &str = r#"{
    "id": "u1",
    "displayName": "Ada",
    "profilePicturePath": "/pics/1.png",
    "reviews": [],
    "email": "ada@example.com",
    "savedBooks": [{"id": "b2", "title": "Emma", "authors": ["Jane Austen"]}]
}"#;

#[tokio::test]
async fn test_fetch_recommendations_parses_entries() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/recommendations/u1")
        .match_query(Matcher::UrlEncoded("n".into(), "100".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(RECOMMENDATIONS_BODY)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    let recs = client.fetch_recommendations("u1", 100).await.unwrap();

    mock.assert_async().await;
    assert_eq!(recs.len(), 3);
    assert!(recs[1].book.is_none());
    assert_eq!(recs[1].book_id.as_deref(), Some("gone"));
    assert_eq!(recs[2].book.as_ref().unwrap().title, "Emma");
}

#[tokio::test]
async fn test_schema_mismatch_is_reported() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/recommendations/u1")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"book": null}]"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    let err = client.fetch_recommendations("u1", 10).await.unwrap_err();

    assert!(matches!(err, ApiError::Schema { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_server_error_detail_is_surfaced() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/review/b1")
        .with_status(409)
        .with_body(r#"{"detail": "You already reviewed this book."}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    let err = client.create_review("b1", 4, "Nice").await.unwrap_err();

    assert_eq!(err.status(), Some(409));
    assert_eq!(err.to_string(), "You already reviewed this book.");
}

#[tokio::test]
async fn test_unexpected_status_gets_generic_message() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/recommendations/u1")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"detail": "No recommendations available"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    let err = client.fetch_recommendations("u1", 10).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Unknown error occurred. Please try again.");
}

#[tokio::test]
async fn test_create_review_sends_json_and_session_cookie() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/review/b1")
        .match_header("cookie", "session=tok")
        .match_body(Matcher::Json(json!({"rating": 4, "text": "Nice"})))
        .with_status(201)
        .create_async()
        .await;

    let client = ApiClient::new(server.url()).with_session(Some("tok".to_string()));
    client.create_review("b1", 4, "Nice").await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_personal_info_unauthorized_is_none() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/user/")
        .with_status(401)
        .with_body(r#"{"detail": "Not logged in."}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url()).with_session(Some("expired".to_string()));

    assert!(client.personal_info().await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_and_unsave_encode_path_segments() {
    let mut server = Server::new_async().await;
    let save = server
        .mock("POST", "/users/u1/saved/a%20b")
        .with_status(200)
        .with_body(r#"{"message": "Book saved"}"#)
        .create_async()
        .await;
    let unsave = server
        .mock("DELETE", "/users/u1/saved/a%20b")
        .with_status(200)
        .with_body(r#"{"message": "Book removed"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    client.save_book("u1", "a b").await.unwrap();
    client.unsave_book("u1", "a b").await.unwrap();

    save.assert_async().await;
    unsave.assert_async().await;
}

#[tokio::test]
async fn test_basic_details_missing_book_is_none() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/books/missing")
        .match_query(Matcher::UrlEncoded("basic".into(), "true".into()))
        .with_status(404)
        .with_body(r#"{"detail": "No book with ID missing was found."}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());

    assert!(client.basic_details("missing").await.unwrap().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cache_refreshes_through_api_client() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/recommendations/u1")
        .match_query(Matcher::UrlEncoded("n".into(), "100".into()))
        .with_status(200)
        .with_body(RECOMMENDATIONS_BODY)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let cache = RecommendationCache::new(store.clone(), Arc::new(ApiClient::new(server.url())));

    let entry = cache.read_entry("u1");
    assert!(entry.books.is_empty());
    entry.refresh.expect("cold start should refresh").await.unwrap();

    let books = cache.read("u1");
    let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["b1", "b2"]);
    assert!(store.get("u1_last_recommendations_update").is_some());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cache_failure_writes_nothing() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/recommendations/u1")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body(r#"{"detail": "boom"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let cache = RecommendationCache::new(store.clone(), Arc::new(ApiClient::new(server.url())));

    assert!(cache.refresh("u1", 100).await.is_err());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_app_context_loads_session_and_recommendations() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/user/")
        .match_header("cookie", "session=tok")
        .with_status(200)
        .with_body(PERSONAL_INFO_BODY)
        .create_async()
        .await;
    server
        .mock("GET", "/recommendations/u1")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(RECOMMENDATIONS_BODY)
        .create_async()
        .await;

    let data_dir = TempDir::new().unwrap();
    let config = ClientConfig::default()
        .with_server_url(server.url())
        .with_session_token(Some("tok".to_string()))
        .with_data_dir(Some(data_dir.path().to_path_buf()));

    let context = AppContext::initialize(&config, None).await.unwrap();

    assert!(context.session().is_logged_in());
    assert!(context.session().is_saved("b2"));

    let entry = context.recommended_entry().expect("user is logged in");
    assert!(entry.books.is_empty());
    entry.refresh.expect("cold start should refresh").await.unwrap();

    assert_eq!(context.recommended_books().len(), 2);
    assert!(data_dir.path().join("u1_recommendations.value").exists());
}

const LOGIN_BODY: &str = r#"{"message": "Logged in", "user": {"id": "u1", "email": "ada@example.com"}}"#;

#[tokio::test]
async fn test_log_in_returns_session_cookie() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/auth/login")
        .match_body(Matcher::Json(json!({"email": "ada@example.com", "password": "pw"})))
        .with_status(200)
        .with_header("set-cookie", "session=abc123; HttpOnly; Max-Age=2592000; Path=/")
        .with_body(LOGIN_BODY)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    let token = client.log_in("ada@example.com", "pw").await.unwrap();

    mock.assert_async().await;
    assert_eq!(token, "abc123");
    assert!(!client.has_session(), "the token is only used once set");
}

#[tokio::test]
async fn test_log_in_rejects_bad_credentials() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/login")
        .with_status(401)
        .with_body(r#"{"detail": "Invalid credentials."}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    let err = client.log_in("ada@example.com", "wrong").await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "Invalid credentials.");
}

#[tokio::test]
async fn test_log_in_without_cookie_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_body(LOGIN_BODY)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    let err = client.log_in("ada@example.com", "pw").await.unwrap_err();

    assert!(matches!(err, ApiError::MissingSession), "got {:?}", err);
}

#[tokio::test]
async fn test_register_sends_details_and_surfaces_taken_email() {
    let mut server = Server::new_async().await;
    let created = server
        .mock("POST", "/auth/register")
        .match_body(Matcher::Json(
            json!({"name": "Ada", "email": "ada@example.com", "password": "pw"}),
        ))
        .with_status(200)
        .with_body(r#"{"message": "User registered", "user": {"id": "u1"}}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    client.register("Ada", "ada@example.com", "pw").await.unwrap();
    created.assert_async().await;

    server
        .mock("POST", "/auth/register")
        .with_status(404)
        .with_body(r#"{"detail": "Email already registered."}"#)
        .create_async()
        .await;

    let err = client.register("Grace", "grace@example.com", "pw").await.unwrap_err();
    assert_eq!(err.to_string(), "Email already registered.");
}

#[tokio::test]
async fn test_search_sends_filters_and_parses_books() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/search/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("author".into(), "Jane Austen".into()),
            Matcher::UrlEncoded("rating_min".into(), "4.5".into()),
            Matcher::UrlEncoded("limit".into(), "5".into()),
        ]))
        .with_status(200)
        .with_body(r#"[{"id": "b2", "title": "Emma", "authors": ["Jane Austen"], "averageRating": 4.2}]"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());
    let query = SearchQuery {
        author: Some("Jane Austen".to_string()),
        rating_min: Some(4.5),
        limit: Some(5),
        ..SearchQuery::default()
    };
    let books = client.search(&query).await.unwrap();

    mock.assert_async().await;
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Emma");
}

#[tokio::test]
async fn test_search_without_matches_is_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/search/")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"detail": "No matching books found."}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());

    assert!(client.search(&SearchQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_account_info_and_basic_account_info() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/user/u2")
        .with_status(200)
        .with_body(
            r#"{"id": "u2", "displayName": "Grace", "profilePicturePath": "/pics/2.png",
                "reviews": [{"id": "r1", "userId": "u2", "bookId": "b1", "rating": 4, "text": "Good"}]}"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/user/u3")
        .match_query(Matcher::UrlEncoded("basic".into(), "true".into()))
        .with_status(200)
        .with_body(r#"{"id": "u3", "displayName": "Grace", "profilePicturePath": "/pics/3.png"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/user/nobody")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let client = ApiClient::new(server.url());

    let account = client.account_info("u2").await.unwrap().expect("account exists");
    assert_eq!(account.reviews.len(), 1);
    let basic = client.basic_account_info("u3").await.unwrap().expect("account exists");
    assert_eq!(basic.display_name, "Grace");
    assert!(client.account_info("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_log_in_is_remembered_across_runs() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_header("set-cookie", "session=abc123; HttpOnly")
        .with_body(LOGIN_BODY)
        .create_async()
        .await;
    let profile = server
        .mock("GET", "/user/")
        .match_header("cookie", "session=abc123")
        .with_status(200)
        .with_body(PERSONAL_INFO_BODY)
        .expect(2)
        .create_async()
        .await;

    let data_dir = TempDir::new().unwrap();
    let config = ClientConfig::default()
        .with_server_url(server.url())
        .with_data_dir(Some(data_dir.path().to_path_buf()));

    let first = AppContext::initialize(&config, None).await.unwrap();
    assert!(!first.session().is_logged_in());
    assert!(first.log_in("ada@example.com", "pw").await.unwrap());
    assert_eq!(first.session().user_id().as_deref(), Some("u1"));

    let store = FileStore::with_dir(data_dir.path().to_path_buf());
    assert_eq!(store.get(SESSION_KEY).as_deref(), Some("abc123"));

    let second = AppContext::initialize(&config, None).await.unwrap();
    assert!(second.session().is_logged_in());
    profile.assert_async().await;

    second.log_out().unwrap();
    let third = AppContext::initialize(&config, None).await.unwrap();
    assert!(!third.session().is_logged_in());
}
