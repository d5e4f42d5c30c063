use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use newsfeed_core::{AppConfig, FeedFetcher};

use super::{print_outcome, print_state};

const HELP: &str = "\
Commands:
  n            load the next page
  r            refresh from page 1
  /<term>      search (terms shorter than 3 characters clear the filter)
  l            list all loaded articles
  h            show this help
  q            quit";

enum Input {
    More,
    Refresh,
    Search(String),
    List,
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if let Some(term) = line.strip_prefix('/') {
        return Input::Search(term.to_string());
    }
    match line {
        "n" | "next" | "more" => Input::More,
        "r" | "refresh" => Input::Refresh,
        "l" | "list" => Input::List,
        "h" | "help" | "?" => Input::Help,
        "q" | "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

pub async fn run(config: &AppConfig, query: Option<&str>) -> Result<()> {
    let fetcher = FeedFetcher::open(config).await?;

    let outcome = match query {
        Some(term) => fetcher.search(term).await,
        None => fetcher.initial_load().await,
    };
    print_outcome(&outcome);
    print_state(&fetcher.state().await, 0);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let before = fetcher.state().await.articles.len();

        let (outcome, from) = match parse_input(&line) {
            Input::More => (fetcher.load_more().await, before),
            Input::Refresh => (fetcher.refresh().await, 0),
            Input::Search(term) => (fetcher.search(&term).await, 0),
            Input::List => {
                print_state(&fetcher.state().await, 0);
                continue;
            }
            Input::Help => {
                println!("{}", HELP);
                continue;
            }
            Input::Quit => break,
            Input::Unknown(other) => {
                if !other.is_empty() {
                    println!("Unknown command: {} (h for help)", other);
                }
                continue;
            }
        };

        print_outcome(&outcome);
        let state = fetcher.state().await;
        // A cache fallback replaces the list, so show it from the top
        let from = if state.fallback_active || state.articles.len() < from { 0 } else { from };
        print_state(&state, from);
    }

    Ok(())
}
