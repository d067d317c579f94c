pub mod assistant;
pub mod bookmarks;
pub mod config;
pub mod error;
pub mod feed;
pub mod generative;
pub mod mealdb;
pub mod memory;
pub mod models;
pub mod prompts;
pub mod recipes;
pub mod redis;
pub mod repository;
pub mod repository_traits;
pub mod retry;
pub mod transport;

use std::sync::Arc;

use crate::assistant::AiAssistant;
use crate::bookmarks::BookmarkService;
use crate::config::{Config, StorageBackend};
use crate::error::Result;
use crate::generative::{GenerativeModel, OpenAiCompatModel};
use crate::memory::MemoryStore;
use crate::recipes::RecipeRepository;
use crate::redis::RedisManager;
use crate::repository::RedisCacheStore;
use crate::repository_traits::CacheStore;
use crate::retry::RetryPolicy;
use crate::transport::{MealDbTransport, RecipeApi};

/// The collaborators shared by every orchestrator
#[derive(Clone)]
pub struct Plitso {
    store: Arc<dyn CacheStore>,
    api: Arc<dyn RecipeApi>,
    model: Arc<dyn GenerativeModel>,
}

impl Plitso {
    pub async fn new(cfg: &Config) -> Result<Self> {
        let store: Arc<dyn CacheStore> = match cfg.app.storage {
            StorageBackend::Memory => {
                tracing::info!("Using in-process cache store");
                Arc::new(MemoryStore::new())
            }
            StorageBackend::Redis => {
                let redis = Arc::new(RedisManager::new_with_config(cfg).await?);
                Arc::new(RedisCacheStore::new(redis, &cfg.redis.namespace))
            }
        };

        let api = Arc::new(MealDbTransport::new(
            cfg.mealdb.base_url.clone(),
            cfg.get_mealdb_timeout(),
            RetryPolicy::from(&cfg.retry),
        )?);

        let model = Arc::new(OpenAiCompatModel::new(&cfg.generative));

        Ok(Self::from_parts(store, api, model))
    }

    pub fn from_parts(
        store: Arc<dyn CacheStore>,
        api: Arc<dyn RecipeApi>,
        model: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self { store, api, model }
    }

    pub fn store(&self) -> Arc<dyn CacheStore> {
        Arc::clone(&self.store)
    }

    pub fn recipes(&self) -> RecipeRepository {
        RecipeRepository::new(Arc::clone(&self.api), Arc::clone(&self.store))
    }

    /// A fresh assistant session
    pub fn assistant(&self) -> AiAssistant {
        AiAssistant::new(Arc::clone(&self.store), Arc::clone(&self.model))
    }

    pub fn bookmarks(&self) -> BookmarkService {
        BookmarkService::new(Arc::clone(&self.store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generative::MockGenerativeModel;
    use crate::mealdb::{CategoryDto, MealDetailDto, MealSummaryDto};
    use crate::transport::MockRecipeApi;

    #[tokio::test]
    async fn test_orchestrators_share_the_store() {
        let mut api = MockRecipeApi::new();
        api.expect_get_categories().returning(|| {
            Ok(vec![CategoryDto {
                id_category: "1".to_string(),
                str_category: "Pasta".to_string(),
                ..Default::default()
            }])
        });
        api.expect_get_category_recipes().returning(|_| {
            Ok(vec![MealSummaryDto {
                id_meal: "52835".to_string(),
                str_meal: "Fettucine alfredo".to_string(),
                ..Default::default()
            }])
        });
        api.expect_get_recipe_detail().returning(|id| {
            Ok(vec![MealDetailDto {
                id_meal: id.to_string(),
                str_meal: Some("Fettucine alfredo".to_string()),
                str_area: Some("Italian".to_string()),
                ..Default::default()
            }])
        });

        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_content()
            .withf(|prompt| prompt.contains("Fettucine alfredo"))
            .times(1)
            .returning(|_| Ok("Fettucine alfredo, of course".to_string()));

        let app = Plitso::from_parts(Arc::new(MemoryStore::new()), Arc::new(api), Arc::new(model));
        assert!(app.recipes().refresh_database().await.is_complete());

        let mut assistant = app.assistant();
        assistant.refresh_context(vec![]).await.unwrap();
        assert_eq!(assistant.context().countries, vec!["Italian"]);

        assistant.on_meal_type_change("Dinner");
        assistant.on_cuisine_change("Italian");
        assistant.on_mood_change("Comfort");
        assistant.generate_suggestions(|| {}).await;
        assert_eq!(
            assistant.generative_state().generative_answer,
            "Fettucine alfredo, of course"
        );

        assert!(app.bookmarks().toggle("52835").await.unwrap());
        assert!(app.store().is_bookmarked("52835").await.unwrap());
    }
}
