use anyhow::Result;
use std::sync::Arc;

use plitso::config::Config;
use plitso::redis::RedisManager;
use plitso::repository::RedisCacheStore;
use plitso::repository_traits::DayRecipeStore;

/// Drops the cached recipe of the day so the next read picks a new one
#[tokio::main]
async fn main() -> Result<()> {
    // Minimal stderr tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(Config::load());
    let redis = Arc::new(RedisManager::new_with_config(&config).await?);
    let store = RedisCacheStore::new(redis, &config.redis.namespace);

    let current = store.get_day_recipes().await?;
    match current.first() {
        Some(recipe) => {
            store.clear_day_recipes().await?;
            tracing::info!("Cleared recipe of the day: {} ({})", recipe.title, recipe.id);
        }
        None => tracing::info!("No recipe of the day cached in {}", config.redis.namespace),
    }

    Ok(())
}
