use futures::stream::BoxStream;
use std::sync::Arc;

use crate::error::Result;
use crate::models::RecipeDetailState;
use crate::repository_traits::CacheStore;

/// Bookmarked recipe ids
pub struct BookmarkService {
    store: Arc<dyn CacheStore>,
}

impl BookmarkService {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn bookmarks(&self) -> BoxStream<'static, Result<Vec<String>>> {
        self.store.watch_bookmarks()
    }

    pub async fn save(&self, recipe_id: &str) -> Result<()> {
        self.store.save_bookmark(recipe_id).await?;
        tracing::debug!("Bookmarked recipe {}", recipe_id);
        Ok(())
    }

    pub async fn remove(&self, recipe_id: &str) -> Result<()> {
        self.store.delete_bookmark(recipe_id).await?;
        tracing::debug!("Removed bookmark {}", recipe_id);
        Ok(())
    }

    pub async fn is_bookmarked(&self, recipe_id: &str) -> Result<bool> {
        self.store.is_bookmarked(recipe_id).await
    }

    /// Flip the bookmark and return the new state
    pub async fn toggle(&self, recipe_id: &str) -> Result<bool> {
        if self.is_bookmarked(recipe_id).await? {
            self.remove(recipe_id).await?;
            Ok(false)
        } else {
            self.save(recipe_id).await?;
            Ok(true)
        }
    }

    /// Detail screen state for a cached recipe. Failures end up in `message`.
    pub async fn recipe_detail_state(&self, recipe_id: &str) -> RecipeDetailState {
        let detail = match self.store.get_recipe_detail(recipe_id).await {
            Ok(Some(detail)) => detail,
            Ok(None) => {
                return RecipeDetailState {
                    message: format!("Recipe {recipe_id} could not be found"),
                    ..Default::default()
                };
            }
            Err(e) => {
                tracing::warn!("Failed to load recipe {}: {}", recipe_id, e);
                return RecipeDetailState {
                    message: e.user_message(),
                    ..Default::default()
                };
            }
        };

        let is_bookmarked = self.is_bookmarked(recipe_id).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to read bookmark for {}: {}", recipe_id, e);
            false
        });

        RecipeDetailState {
            is_loading: false,
            message: String::new(),
            recipe_detail: Some(detail),
            is_bookmarked,
        }
    }
}
