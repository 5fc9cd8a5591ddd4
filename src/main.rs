//! Reading List - book reviews and daily recommendations from the terminal
//!
//! Shows cached recommendations instantly and refreshes them in the
//! background once a day.

use std::collections::HashMap;
use std::error::Error;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use readinglist::api::{AccountInfo, Book, BookDetails, SearchQuery, Sentiment, UserStreak};
use readinglist::cli::{parse_rating, Cli, Command};
use readinglist::refresh::{try_recv, RefreshEvent, RefreshEvents};
use readinglist::session::{AppContext, AppError};

/// Sets up logging to stderr, filtered by `RUST_LOG` (default `warn`)
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();

    // Report the message rather than the variant name
    run(cli).await.map_err(|e| e.to_string().into())
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = cli.config();
    let (events, mut receiver) = RefreshEvents::channel(16);
    let context = AppContext::initialize(&config, Some(events)).await?;

    match cli.command {
        Command::Login { email, password } => {
            if context.log_in(&email, &password).await? {
                greet(&context);
            } else {
                println!("Logged in, but the profile could not be loaded.");
            }
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            context.register(&name, &email, &password).await?;
            println!("Account created.");
            greet(&context);
        }
        Command::Logout => {
            context.log_out()?;
            println!("Logged out.");
        }
        Command::Search(args) => show_search(&context, &SearchQuery::from(args)).await?,
        Command::Recommendations { limit, wait } => {
            show_recommendations(&context, &mut receiver, limit, wait).await?
        }
        Command::Refresh => {
            let books = context.refresh_recommendations().await?;
            println!("Fetched {} recommendations.", books.len());
        }
        Command::Book { id } => show_book(&context, &id).await?,
        Command::Save { id } => {
            context.save_book(&id).await?;
            println!("Saved {}.", id);
        }
        Command::Unsave { id } => {
            context.unsave_book(&id).await?;
            println!("Removed {} from your saved books.", id);
        }
        Command::Review { id, rating, text } => {
            let rating = parse_rating(rating)?;
            context.create_review(&id, rating, &text).await?;
            println!("Review saved.");
        }
        Command::Unreview { id } => {
            context.remove_review(&id).await?;
            println!("Review deleted.");
        }
        Command::Profile => show_profile(&context).await?,
        Command::User { id } => show_user(&context, &id).await?,
    }

    Ok(())
}

fn greet(context: &AppContext) {
    if let Some(user) = context.session().current_user() {
        println!("Welcome, {}.", user.display_name);
    }
}

async fn show_search(context: &AppContext, query: &SearchQuery) -> Result<(), Box<dyn Error>> {
    let books = context.api().search(query).await?;
    if books.is_empty() {
        println!("No matching books found.");
        return Ok(());
    }
    print_books(context, &books, books.len());
    Ok(())
}

async fn show_recommendations(
    context: &AppContext,
    receiver: &mut mpsc::Receiver<RefreshEvent>,
    limit: usize,
    wait: bool,
) -> Result<(), Box<dyn Error>> {
    let user = context.session().current_user().ok_or(AppError::NotLoggedIn)?;
    let entry = context
        .recommended_entry()
        .ok_or(AppError::NotLoggedIn)?;

    if entry.books.is_empty() {
        if user.reviews.is_empty() {
            println!("You need to create some reviews before we can find recommendations for you.");
        } else {
            println!("No recommendations yet. Check back soon.");
        }
    } else {
        println!("Your Recommended Books");
        print_books(context, &entry.books, limit);
        println!();
        println!("Recommendations refresh daily. Check back again tomorrow for more.");
    }

    // The process is about to exit, so let a triggered refresh land in storage.
    let Some(refresh) = entry.refresh else {
        return Ok(());
    };
    refresh.await?;

    if wait {
        while let Some(event) = try_recv(receiver) {
            match event {
                RefreshEvent::Completed { books, .. } => {
                    println!();
                    println!("Fetched {} new recommendations.", books);
                    print_books(context, &context.recommendations().read(&user.id), limit);
                }
                RefreshEvent::Failed { reason, .. } => {
                    eprintln!("Could not refresh recommendations: {}", reason);
                }
                RefreshEvent::Started { .. } => {}
            }
        }
    }
    Ok(())
}

async fn show_book(context: &AppContext, book_id: &str) -> Result<(), Box<dyn Error>> {
    let api = context.api();
    let (details, sentiment) = futures::join!(api.details(book_id), api.sentiment(book_id));

    let Some(details) = details? else {
        println!("No book with ID {} was found.", book_id);
        return Ok(());
    };
    let reviewers = reviewer_names(context, &details).await;
    print_details(&details, &reviewers, context.session().is_saved(book_id));

    match sentiment {
        Ok(Some(sentiment)) => print_sentiment(&sentiment),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "failed to load sentiment"),
    }
    Ok(())
}

async fn show_profile(context: &AppContext) -> Result<(), Box<dyn Error>> {
    let user_id = context.session().user_id().ok_or(AppError::NotLoggedIn)?;
    let (_, streak) = futures::join!(context.reload_user(), context.api().streak(&user_id));
    let user = context.session().current_user().ok_or(AppError::NotLoggedIn)?;

    println!("{} <{}>", user.display_name, user.email);
    println!("Reviews: {}", user.reviews.len());
    println!("Saved books: {}", user.saved_books.len());
    for book in &user.saved_books {
        println!("  - {} by {}", book.title, book.author_line());
    }

    match streak {
        Ok(Some(streak)) => print_streak(&streak),
        Ok(None) => println!("Start rating or saving books to build your streak."),
        Err(e) => tracing::warn!(error = %e, "failed to load streak"),
    }
    Ok(())
}

async fn show_user(context: &AppContext, user_id: &str) -> Result<(), Box<dyn Error>> {
    let Some(account) = context.api().account_info(user_id).await? else {
        println!("No user with ID {} was found.", user_id);
        return Ok(());
    };
    print_account(context, &account).await;
    Ok(())
}

/// Display names of everyone who reviewed the book, fetched concurrently
async fn reviewer_names(context: &AppContext, details: &BookDetails) -> HashMap<String, String> {
    let api = context.api();
    let lookups = details.reviews.iter().map(|review| async move {
        match api.basic_account_info(&review.user_id).await {
            Ok(Some(user)) => Some((review.user_id.clone(), user.display_name)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(user_id = %review.user_id, error = %e, "failed to load reviewer");
                None
            }
        }
    });
    futures::future::join_all(lookups)
        .await
        .into_iter()
        .flatten()
        .collect()
}

async fn print_account(context: &AppContext, account: &AccountInfo) {
    println!("{}", account.display_name);
    println!("Reviews: {}", account.reviews.len());

    let api = context.api();
    let titles = futures::future::join_all(
        account
            .reviews
            .iter()
            .map(|review| api.basic_details(&review.book_id)),
    )
    .await;
    for (review, book) in account.reviews.iter().zip(titles) {
        let title = match book {
            Ok(Some(book)) => book.title,
            _ => review.book_id.clone(),
        };
        println!("  {:.0}/5  {}  {}", review.rating, title, review.text);
    }
}

fn print_books(context: &AppContext, books: &[Book], limit: usize) {
    for (i, book) in books.iter().take(limit).enumerate() {
        let saved = if context.session().is_saved(&book.id) { " [saved]" } else { "" };
        println!(
            "{:>3}. {} by {} ({}){}",
            i + 1,
            book.title,
            book.author_line(),
            format_rating(book.average_rating),
            saved
        );
        println!("     id: {}", book.id);
    }
    if books.len() > limit {
        println!("     ... and {} more (use --limit to see more)", books.len() - limit);
    }
}

fn print_details(details: &BookDetails, reviewers: &HashMap<String, String>, saved: bool) {
    let book = &details.book;
    println!("{}{}", book.title, if saved { " [saved]" } else { "" });
    println!("by {}", book.author_line());
    if let Some(categories) = book.categories.as_ref().filter(|c| !c.is_empty()) {
        println!("Categories: {}", categories.join(", "));
    }
    println!(
        "Rating: {:.1} from {} review(s)",
        details.average_rating, details.review_count
    );
    if let Some(description) = &book.description {
        println!();
        println!("{}", description);
    }
    if !details.reviews.is_empty() {
        println!();
        println!("Reviews:");
        for review in &details.reviews {
            let name = reviewers
                .get(&review.user_id)
                .map(String::as_str)
                .unwrap_or("Unknown reader");
            println!("  {:.0}/5  {}: {}", review.rating, name, review.text);
        }
    }
}

fn print_sentiment(sentiment: &Sentiment) {
    println!();
    println!(
        "Review sentiment: {} ({:+.2}, {} review(s))",
        sentiment.sentiment, sentiment.score, sentiment.review_count
    );
}

fn print_streak(streak: &UserStreak) {
    println!("Current streak: {} days", streak.current_streak);
    println!("Longest streak: {} days", streak.longest_streak);
    println!("Badge: {}", streak.badge);
    println!(
        "Last activity: {}",
        streak.last_activity_date.as_deref().unwrap_or("-")
    );
}

fn format_rating(rating: Option<f64>) -> String {
    match rating {
        Some(rating) => format!("{:.1}/5", rating),
        None => "no ratings yet".to_string(),
    }
}
