use anyhow::Result;

use newsfeed_core::{AppConfig, FeedFetcher, FetchOutcome};

use super::{print_outcome, print_state};

pub async fn run(config: &AppConfig, query: Option<&str>, pages: u32) -> Result<()> {
    let fetcher = FeedFetcher::open(config).await?;

    let mut outcome = match query {
        Some(term) => fetcher.search(term).await,
        None => fetcher.initial_load().await,
    };
    print_outcome(&outcome);

    for _ in 1..pages.max(1) {
        // Stop paging once the source runs dry or the network is gone
        if !matches!(outcome, FetchOutcome::Loaded { count } if count > 0) {
            break;
        }
        outcome = fetcher.load_more().await;
        print_outcome(&outcome);
    }

    println!();
    print_state(&fetcher.state().await, 0);

    Ok(())
}
