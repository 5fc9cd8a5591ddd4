//! Response and request bodies exchanged with the Reading List API server
//!
//! Field names follow the server's camelCase JSON. Optional fields accept both
//! an explicit `null` and a missing key.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A book as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Unique identifier for the book
    pub id: String,
    /// Title of the book
    pub title: String,
    /// Author names in the order the publisher lists them
    pub authors: Vec<String>,
    /// Subject categories, if known
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Publisher description, if known
    #[serde(default)]
    pub description: Option<String>,
    /// Cover image URLs keyed by size label (e.g. "thumbnail")
    #[serde(default)]
    pub image_links: Option<HashMap<String, String>>,
    /// Average review rating; `None` when nobody has rated the book yet
    #[serde(default)]
    pub average_rating: Option<f64>,
}

impl Book {
    /// Authors joined for display, or "Unknown author"
    pub fn author_line(&self) -> String {
        if self.authors.is_empty() {
            "Unknown author".to_string()
        } else {
            self.authors.join(", ")
        }
    }
}

/// One entry of `GET /recommendations/{user_id}`
///
/// `book` is absent when the server could not materialize the recommended
/// book (for example, it was deleted); only `book_id` is known then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(default)]
    pub book: Option<Book>,
    #[serde(default, alias = "book_id")]
    pub book_id: Option<String>,
    pub score: f64,
}

/// A user's review of a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub rating: f64,
    pub text: String,
}

/// Full book page data, as returned from `GET /books/{book_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    pub book: Book,
    pub average_rating: f64,
    pub review_count: u64,
    pub reviews: Vec<Review>,
}

/// Name and picture of any user, as shown next to their reviews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicUserInfo {
    pub id: String,
    pub display_name: String,
    pub profile_picture_path: String,
}

/// Public profile of any user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: String,
    pub display_name: String,
    pub profile_picture_path: String,
    pub reviews: Vec<Review>,
}

/// Profile of the logged-in user, including private fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub id: String,
    pub display_name: String,
    pub profile_picture_path: String,
    pub reviews: Vec<Review>,
    pub email: String,
    pub saved_books: Vec<Book>,
}

/// Reading streak statistics for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStreak {
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub last_activity_date: Option<String>,
    pub badge: String,
}

/// Aggregate review sentiment for a book
///
/// The server dumps this model with snake_case keys, so both spellings are
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentiment {
    #[serde(alias = "book_id")]
    pub book_id: String,
    pub sentiment: String,
    pub score: f64,
    pub scores: HashMap<String, f64>,
    #[serde(alias = "review_count")]
    pub review_count: u64,
    /// Epoch seconds
    #[serde(alias = "cached_at")]
    pub cached_at: f64,
}

/// Error body carried by 401, 409 and 500 responses
#[derive(Debug, Clone, Deserialize)]
pub struct ServerError {
    pub detail: String,
}

/// Body of `PUT /review/{book_id}`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ReviewBody<'a> {
    pub rating: u8,
    pub text: &'a str,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /auth/register`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RegisterBody<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Confirmation returned by the login and register endpoints
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AuthReply {
    pub message: String,
}

/// Filters for `GET /search/`; unset fields are left out of the query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchQuery {
    /// Exact author name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Publication year
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_max: Option<f64>,
    /// Most results to return; the server defaults to 50
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_accepts_nulls_and_missing_fields() {
        let json = r#"{
            "id": "b1",
            "title": "Dune",
            "authors": ["Frank Herbert"],
            "categories": null,
            "averageRating": null
        }"#;

        let book: Book = serde_json::from_str(json).expect("Book should parse");

        assert_eq!(book.id, "b1");
        assert_eq!(book.authors, vec!["Frank Herbert".to_string()]);
        assert!(book.categories.is_none());
        assert!(book.description.is_none());
        assert!(book.image_links.is_none());
        assert!(book.average_rating.is_none());
    }

    #[test]
    fn test_book_reads_camel_case_fields() {
        let json = r#"{
            "id": "b2",
            "title": "Emma",
            "authors": [],
            "imageLinks": {"thumbnail": "http://img/t.jpg"},
            "averageRating": 4.5
        }"#;

        let book: Book = serde_json::from_str(json).expect("Book should parse");

        let links = book.image_links.as_ref().expect("image links present");
        assert_eq!(links.get("thumbnail").map(String::as_str), Some("http://img/t.jpg"));
        assert_eq!(book.average_rating, Some(4.5));
        assert_eq!(book.author_line(), "Unknown author");
    }

    #[test]
    fn test_book_rejects_missing_title() {
        let json = r#"{"id": "b3", "authors": []}"#;
        assert!(serde_json::from_str::<Book>(json).is_err());
    }

    #[test]
    fn test_recommendation_without_book_keeps_snake_case_id() {
        let json = r#"[
            {"book": {"id": "a", "title": "A", "authors": ["X"]}, "score": 0.9},
            {"book_id": "gone", "score": 0.5}
        ]"#;

        let recs: Vec<Recommendation> = serde_json::from_str(json).expect("should parse");

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].book.as_ref().map(|b| b.id.as_str()), Some("a"));
        assert!(recs[1].book.is_none());
        assert_eq!(recs[1].book_id.as_deref(), Some("gone"));
    }

    #[test]
    fn test_recommendation_requires_score() {
        let json = r#"{"book": null, "bookId": "x"}"#;
        assert!(serde_json::from_str::<Recommendation>(json).is_err());
    }

    #[test]
    fn test_sentiment_accepts_snake_case() {
        let json = r#"{
            "book_id": "b1",
            "sentiment": "positive",
            "score": 0.61,
            "scores": {"pos": 0.4, "neg": 0.0, "neu": 0.6, "compound": 0.61},
            "review_count": 3,
            "cached_at": 1700000000
        }"#;

        let sentiment: Sentiment = serde_json::from_str(json).expect("should parse");

        assert_eq!(sentiment.book_id, "b1");
        assert_eq!(sentiment.review_count, 3);
        assert_eq!(sentiment.scores.len(), 4);
    }

    #[test]
    fn test_personal_info_parses_saved_books() {
        let json = r#"{
            "id": "u1",
            "displayName": "Ada",
            "profilePicturePath": "/pics/1.png",
            "reviews": [{"id": "r1", "userId": "u1", "bookId": "b1", "rating": 5, "text": "Great"}],
            "email": "ada@example.com",
            "savedBooks": [{"id": "b1", "title": "Dune", "authors": ["Frank Herbert"]}]
        }"#;

        let info: PersonalInfo = serde_json::from_str(json).expect("should parse");

        assert_eq!(info.display_name, "Ada");
        assert_eq!(info.reviews[0].rating, 5.0);
        assert_eq!(info.saved_books[0].title, "Dune");
    }

    #[test]
    fn test_account_info_reads_reviews() {
        let json = r#"{
            "id": "u2",
            "displayName": "Grace",
            "profilePicturePath": "/pics/2.png",
            "reviews": [{"id": "r1", "userId": "u2", "bookId": "b1", "rating": 5, "text": "Great"}]
        }"#;

        let info: AccountInfo = serde_json::from_str(json).expect("AccountInfo should parse");

        assert_eq!(info.display_name, "Grace");
        assert_eq!(info.reviews[0].book_id, "b1");
        assert_eq!(info.reviews[0].rating, 5.0);
    }

    #[test]
    fn test_search_query_skips_unset_filters() {
        let query = SearchQuery {
            author: Some("Jane Austen".to_string()),
            limit: Some(10),
            ..SearchQuery::default()
        };

        let json = serde_json::to_value(&query).unwrap();

        assert_eq!(json, serde_json::json!({"author": "Jane Austen", "limit": 10}));
    }
}
