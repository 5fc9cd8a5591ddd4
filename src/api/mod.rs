//! HTTP/JSON client for the Reading List API server
//!
//! The server owns all persistent state (accounts, sessions, books, reviews,
//! recommendations, sentiment and streaks). This module exposes typed
//! request functions and the response schema they validate against.

mod client;
pub mod schema;

pub use client::{ApiClient, ApiError};
pub use schema::{
    AccountInfo, BasicUserInfo, Book, BookDetails, PersonalInfo, Recommendation, Review,
    SearchQuery, Sentiment, UserStreak,
};
