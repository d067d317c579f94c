use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[cfg(test)]
use mockall::automock;

use crate::error::{PlitsoError, Result};
use crate::mealdb::{CategoriesResponse, CategoryDto, MealDetailDto, MealSummaryDto, MealsResponse};
use crate::retry::RetryPolicy;

const MAX_RETRY_DURATION: Duration = Duration::from_secs(120);

/// Remote meal database consumed by the sync orchestrator
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecipeApi: Send + Sync {
    async fn get_categories(&self) -> Result<Vec<CategoryDto>>;
    /// Recipes of a category, looked up by category *name*
    async fn get_category_recipes(&self, category: &str) -> Result<Vec<MealSummaryDto>>;
    async fn get_recipe_detail(&self, id: &str) -> Result<Vec<MealDetailDto>>;
    /// Single-element list by convention
    async fn get_random_recipe(&self) -> Result<Vec<MealDetailDto>>;
}

pub struct MealDbTransport {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl MealDbTransport {
    pub fn new(base_url: String, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{base_url}/")
        };
        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path);
        let start_time = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let outcome = match self.client.get(&url).query(query).send().await {
                Ok(response) if response.status().is_success() => {
                    // A body that does not parse will not parse on retry either
                    return response.json::<T>().await.map_err(|e| {
                        PlitsoError::Mapping(format!("Failed to parse {path} response: {e}"))
                    });
                }
                Ok(response) if response.status().is_client_error() => {
                    return Err(PlitsoError::Internal(format!(
                        "MealDB {} returned {}",
                        path,
                        response.status()
                    )));
                }
                Ok(response) => Err(PlitsoError::Internal(format!(
                    "MealDB {} returned {}",
                    path,
                    response.status()
                ))),
                Err(e) => Err(PlitsoError::Http(e)),
            };

            if !self.retry.should_retry(attempts) || start_time.elapsed() > MAX_RETRY_DURATION {
                tracing::warn!("MealDB request {} failed after {} attempts", path, attempts);
                return outcome;
            }

            let delay = self.retry.delay_for(attempts);
            tracing::debug!(
                "MealDB request {} failed (attempt {}), retrying in {:?}",
                path,
                attempts,
                delay
            );
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl RecipeApi for MealDbTransport {
    async fn get_categories(&self) -> Result<Vec<CategoryDto>> {
        let resp: CategoriesResponse = self.get_json("categories.php", &[]).await?;
        Ok(resp.categories.unwrap_or_default())
    }

    async fn get_category_recipes(&self, category: &str) -> Result<Vec<MealSummaryDto>> {
        let resp: MealsResponse<MealSummaryDto> =
            self.get_json("filter.php", &[("c", category)]).await?;
        Ok(resp.meals.unwrap_or_default())
    }

    async fn get_recipe_detail(&self, id: &str) -> Result<Vec<MealDetailDto>> {
        let resp: MealsResponse<MealDetailDto> = self.get_json("lookup.php", &[("i", id)]).await?;
        Ok(resp.meals.unwrap_or_default())
    }

    async fn get_random_recipe(&self) -> Result<Vec<MealDetailDto>> {
        let resp: MealsResponse<MealDetailDto> = self.get_json("random.php", &[]).await?;
        Ok(resp.meals.unwrap_or_default())
    }
}
