pub mod browse;
pub mod cached;
pub mod config;
pub mod feed;

use newsfeed_core::{Article, FeedState, FetchOutcome};

const DESCRIPTION_PREVIEW_CHARS: usize = 240;

/// Print one article the way the listing shows it
pub fn print_article(index: usize, article: &Article) {
    let title = if article.title.is_empty() { "(no title)" } else { article.title.as_str() };
    println!("{:>3}. {}", index + 1, title);
    if let Some(author) = &article.author {
        println!("     by {}", author);
    }
    let preview = article.description_preview(DESCRIPTION_PREVIEW_CHARS);
    if !preview.is_empty() {
        println!("     {}", preview);
    }
    if !article.url.is_empty() {
        println!("     {}", article.url);
    }
    println!();
}

/// Print the notice matching an operation's outcome
pub fn print_outcome(outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Loaded { count } => println!("Loaded {} articles.", count),
        FetchOutcome::NoResults => println!("No results found. Try a different keyword."),
        FetchOutcome::Offline { cached } => {
            println!("Offline mode: you are offline. Showing {} cached articles.", cached)
        }
        FetchOutcome::Unavailable => println!("Error: unable to load articles."),
        FetchOutcome::Skipped => println!("Still loading, try again in a moment."),
    }
}

/// Print articles from `from` onwards plus a status line
pub fn print_state(state: &FeedState, from: usize) {
    for (index, article) in state.articles.iter().enumerate().skip(from) {
        print_article(index, article);
    }

    let source = if state.fallback_active { " (cached)" } else { "" };
    let filter = if state.search_term.is_empty() {
        String::new()
    } else {
        format!(", search \"{}\"", state.search_term)
    };
    println!(
        "-- {} articles{}, page {}{} --",
        state.articles.len(),
        source,
        state.page,
        filter
    );
}
