//! Reading List client library
//!
//! Talks to the Reading List API server, keeps the logged-in user's session,
//! and caches daily book recommendations in local storage.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod refresh;
pub mod session;
pub mod store;
