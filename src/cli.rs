//! Command-line interface parsing for the Reading List client
//!
//! Global flags configure the server, session and storage location; each
//! subcommand maps to one user-facing operation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::api::SearchQuery;
use crate::config::{ClientConfig, DEFAULT_SERVER_URL};

/// Recommendations shown per page, as on the home screen
pub const RECOMMENDATIONS_AT_A_TIME: usize = 8;

/// Search results requested when `--limit` is not given
pub const SEARCH_LIMIT: u32 = 50;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// Review ratings are whole stars from 1 to 5
    #[error("Invalid rating: {0}. Ratings range from 1 to 5")]
    InvalidRating(u8),
}

/// Reading List - book reviews and daily recommendations
#[derive(Parser, Debug)]
#[command(name = "readinglist")]
#[command(about = "Book reviews and daily recommendations from the Reading List service")]
#[command(version)]
pub struct Cli {
    /// Base URL of the API server
    #[arg(long, global = true, env = "READING_LIST_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Session token issued by the server at login
    #[arg(long, global = true, env = "READING_LIST_SESSION", hide_env_values = true)]
    pub session: Option<String>,

    /// Directory for locally stored recommendations
    #[arg(long, global = true, env = "READING_LIST_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and remember the session for later commands
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "READING_LIST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and log into it
    Register {
        /// Display name
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "READING_LIST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the saved session
    Logout,
    /// Search for books
    Search(SearchArgs),
    /// Show your recommended books (refreshed daily)
    Recommendations {
        /// How many books to show
        #[arg(long, default_value_t = RECOMMENDATIONS_AT_A_TIME)]
        limit: usize,

        /// Wait for a background refresh to finish before exiting
        #[arg(long)]
        wait: bool,
    },
    /// Fetch fresh recommendations now
    Refresh,
    /// Show a book with its reviews and review sentiment
    Book {
        /// Book ID
        id: String,
    },
    /// Add a book to your saved list
    Save {
        /// Book ID
        id: String,
    },
    /// Remove a book from your saved list
    Unsave {
        /// Book ID
        id: String,
    },
    /// Write or overwrite your review of a book
    Review {
        /// Book ID
        id: String,

        /// Rating from 1 to 5
        #[arg(long)]
        rating: u8,

        /// Review text
        #[arg(long, default_value = "")]
        text: String,
    },
    /// Delete your review of a book
    Unreview {
        /// Book ID
        id: String,
    },
    /// Show your profile and reading streak
    Profile,
    /// Show another user's public profile and reviews
    User {
        /// User ID
        id: String,
    },
}

/// Filters for the `search` subcommand
#[derive(Args, Debug, Clone, PartialEq)]
pub struct SearchArgs {
    /// Only books by this author
    #[arg(long)]
    pub author: Option<String>,

    /// Only books published this year
    #[arg(long)]
    pub year: Option<i32>,

    /// Lowest average rating
    #[arg(long, value_name = "RATING")]
    pub min_rating: Option<f64>,

    /// Highest average rating
    #[arg(long, value_name = "RATING")]
    pub max_rating: Option<f64>,

    /// Most results to show
    #[arg(long, default_value_t = SEARCH_LIMIT)]
    pub limit: u32,
}

impl From<SearchArgs> for SearchQuery {
    fn from(args: SearchArgs) -> Self {
        SearchQuery {
            author: args.author,
            year: args.year,
            rating_min: args.min_rating,
            rating_max: args.max_rating,
            limit: Some(args.limit),
        }
    }
}

/// Checks a review rating is within 1..=5
pub fn parse_rating(rating: u8) -> Result<u8, CliError> {
    if (1..=5).contains(&rating) {
        Ok(rating)
    } else {
        Err(CliError::InvalidRating(rating))
    }
}

impl Cli {
    /// Builds the client configuration from parsed arguments
    pub fn config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_server_url(&self.server)
            .with_session_token(self.session.clone())
            .with_data_dir(self.data_dir.clone())
    }
}
