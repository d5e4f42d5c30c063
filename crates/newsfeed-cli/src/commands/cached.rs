use anyhow::Result;

use newsfeed_core::feed::load_cached;
use newsfeed_core::storage::open_cache_store;
use newsfeed_core::AppConfig;

use super::print_article;

pub async fn run(config: &AppConfig) -> Result<()> {
    let cache = open_cache_store(config).await?;

    match load_cached(cache.as_ref(), &config.cache.key).await? {
        Some(articles) if !articles.is_empty() => {
            println!("Cached articles ({}):\n", articles.len());
            for (index, article) in articles.iter().enumerate() {
                print_article(index, article);
            }
        }
        Some(_) => println!("The cached result is empty."),
        None => {
            println!("Nothing cached yet.");
            println!("\nTo fetch articles, run:");
            println!("  newsfeed feed");
        }
    }

    Ok(())
}
