use chrono::Utc;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;

use crate::error::{PlitsoError, Result};
use crate::mealdb::{to_category, to_day_recipe, to_recipe, to_recipe_detail};
use crate::models::{Category, DayRecipe, Recipe, RecipeDetail, SyncReport};
use crate::repository_traits::CacheStore;
use crate::transport::RecipeApi;

/// Keeps the local cache in step with the remote meal database
pub struct RecipeRepository {
    api: Arc<dyn RecipeApi>,
    store: Arc<dyn CacheStore>,
}

impl RecipeRepository {
    pub fn new(api: Arc<dyn RecipeApi>, store: Arc<dyn CacheStore>) -> Self {
        Self { api, store }
    }

    /// Sequential sweep: categories, then each category's recipes, then each
    /// recipe's detail. The first failure stops the sweep; whatever was stored
    /// before it stays.
    pub async fn refresh_database(&self) -> SyncReport {
        let mut report = SyncReport::default();

        let categories = match self.sync_categories().await {
            Ok(categories) => categories,
            Err(e) => {
                tracing::error!("Sync aborted, category list failed: {}", e);
                report.failures.push(format!("categories: {e}"));
                return report;
            }
        };
        report.categories = categories.len();
        tracing::info!("Syncing {} categories", categories.len());

        for category in &categories {
            if let Err(e) = self.sync_category(category, &mut report).await {
                tracing::warn!("Sync stopped at category {}: {}", category.name, e);
                report.failures.push(format!("{}: {}", category.name, e));
                break;
            }
        }

        tracing::info!(
            "Sync finished: {} categories, {} recipes, {} details, {} failures",
            report.categories,
            report.recipes,
            report.details,
            report.failures.len()
        );
        report
    }

    async fn sync_categories(&self) -> Result<Vec<Category>> {
        let dtos = self.api.get_categories().await?;
        let categories = dtos.iter().map(to_category).collect::<Result<Vec<_>>>()?;
        self.store.insert_categories(&categories).await?;
        Ok(categories)
    }

    async fn sync_category(&self, category: &Category, report: &mut SyncReport) -> Result<()> {
        // The list endpoint filters by name, recipes are stored under the id
        let dtos = self.api.get_category_recipes(&category.name).await?;
        let recipes = dtos
            .iter()
            .map(|dto| to_recipe(dto, &category.id))
            .collect::<Result<Vec<_>>>()?;
        self.store.insert_recipes(&recipes).await?;
        report.recipes += recipes.len();
        tracing::debug!("Stored {} recipes for {}", recipes.len(), category.name);

        for recipe in &recipes {
            let dtos = self.api.get_recipe_detail(&recipe.id).await?;
            let details = dtos
                .iter()
                .map(to_recipe_detail)
                .collect::<Result<Vec<_>>>()?;
            self.store.insert_recipe_details(&details).await?;
            report.details += details.len();
        }
        Ok(())
    }

    /// Recipe of the day. Picked once from the remote API when nothing is
    /// cached, then served from the store until cleared. Keeps emitting as
    /// the stored value changes.
    pub fn day_recipe(&self) -> BoxStream<'static, Result<DayRecipe>> {
        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.store);

        self.store
            .watch_day_recipes()
            .then(move |snapshot| {
                let api = Arc::clone(&api);
                let store = Arc::clone(&store);
                async move {
                    match snapshot {
                        Err(e) => Some(Err(e)),
                        Ok(rows) => match rows.into_iter().next() {
                            Some(recipe) => Some(Ok(recipe)),
                            // The insert wakes the feed and the stored row is emitted from there
                            None => pick_day_recipe(api.as_ref(), store.as_ref())
                                .await
                                .err()
                                .map(|e| {
                                    tracing::warn!("Failed to pick recipe of the day: {}", e);
                                    Err(e)
                                }),
                        },
                    }
                }
            })
            .filter_map(futures::future::ready)
            .boxed()
    }

    pub async fn clear_day_recipe(&self) -> Result<()> {
        self.store.clear_day_recipes().await
    }

    pub async fn get_recipes(&self, category_id: &str) -> Result<Vec<Recipe>> {
        if self.store.get_category(category_id).await?.is_none() {
            return Err(PlitsoError::NotFound(format!("Category {category_id}")));
        }
        self.store.get_recipes_by_category(category_id).await
    }

    pub fn categories(&self) -> BoxStream<'static, Result<Vec<Category>>> {
        self.store.watch_categories()
    }

    pub async fn recipe_detail(&self, id: &str) -> Result<RecipeDetail> {
        self.store
            .get_recipe_detail(id)
            .await?
            .ok_or_else(|| PlitsoError::NotFound(format!("Recipe {id}")))
    }

    /// Straight from the API, not cached
    pub async fn random_recipe(&self) -> Result<RecipeDetail> {
        let dto = self
            .api
            .get_random_recipe()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PlitsoError::NotFound("Random recipe".to_string()))?;
        to_recipe_detail(&dto)
    }
}

async fn pick_day_recipe(api: &dyn RecipeApi, store: &dyn CacheStore) -> Result<DayRecipe> {
    let dto = api
        .get_random_recipe()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PlitsoError::NotFound("Random recipe".to_string()))?;
    let recipe = to_day_recipe(&dto, Utc::now())?;
    store.insert_day_recipe(&recipe).await?;
    tracing::info!("Picked recipe of the day: {} ({})", recipe.title, recipe.id);
    Ok(recipe)
}
