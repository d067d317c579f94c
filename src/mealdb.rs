//! TheMealDB wire records and their mapping into cached models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PlitsoError, Result};
use crate::models::{Category, DayRecipe, Ingredient, Recipe, RecipeDetail};

const MAX_INGREDIENTS: usize = 20;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CategoriesResponse {
    #[serde(default)]
    pub categories: Option<Vec<CategoryDto>>,
}

/// `filter.php`, `lookup.php` and `random.php` all wrap results in `meals`,
/// which is `null` when nothing matched.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MealsResponse<T> {
    pub meals: Option<Vec<T>>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct CategoryDto {
    #[serde(rename = "idCategory")]
    pub id_category: String,
    #[serde(rename = "strCategory")]
    pub str_category: String,
    #[serde(rename = "strCategoryThumb", default)]
    pub str_category_thumb: Option<String>,
    #[serde(rename = "strCategoryDescription", default)]
    pub str_category_description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct MealSummaryDto {
    #[serde(rename = "idMeal")]
    pub id_meal: String,
    #[serde(rename = "strMeal")]
    pub str_meal: String,
    #[serde(rename = "strMealThumb", default)]
    pub str_meal_thumb: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct MealDetailDto {
    #[serde(rename = "idMeal")]
    pub id_meal: String,
    #[serde(rename = "strMeal", default)]
    pub str_meal: Option<String>,
    #[serde(rename = "strCategory", default)]
    pub str_category: Option<String>,
    #[serde(rename = "strArea", default)]
    pub str_area: Option<String>,
    #[serde(rename = "strInstructions", default)]
    pub str_instructions: Option<String>,
    #[serde(rename = "strMealThumb", default)]
    pub str_meal_thumb: Option<String>,
    #[serde(rename = "strTags", default)]
    pub str_tags: Option<String>,
    #[serde(rename = "strYoutube", default)]
    pub str_youtube: Option<String>,
    #[serde(rename = "strSource", default)]
    pub str_source: Option<String>,
    /// strIngredient1..20, strMeasure1..20 and whatever else the API adds
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl MealDetailDto {
    fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }

    /// Ingredient/measure pairs in slot order, skipping empty slots
    pub fn ingredients(&self) -> Vec<Ingredient> {
        (1..=MAX_INGREDIENTS)
            .filter_map(|n| {
                let name = non_blank(self.extra_str(&format!("strIngredient{n}")))?;
                let measure =
                    non_blank(self.extra_str(&format!("strMeasure{n}"))).unwrap_or_default();
                Some(Ingredient { name, measure })
            })
            .collect()
    }

    pub fn tags(&self) -> Vec<String> {
        self.str_tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn require_identity(&self) -> Result<(String, String)> {
        let id = non_blank(Some(&self.id_meal))
            .ok_or_else(|| PlitsoError::Mapping("meal without idMeal".to_string()))?;
        let title = non_blank(self.str_meal.as_deref())
            .ok_or_else(|| PlitsoError::Mapping(format!("meal {id} without strMeal")))?;
        Ok((id, title))
    }
}

pub fn to_category(dto: &CategoryDto) -> Result<Category> {
    let id = non_blank(Some(&dto.id_category))
        .ok_or_else(|| PlitsoError::Mapping("category without idCategory".to_string()))?;
    let name = non_blank(Some(&dto.str_category))
        .ok_or_else(|| PlitsoError::Mapping(format!("category {id} without strCategory")))?;
    Ok(Category {
        id,
        name,
        thumbnail: dto.str_category_thumb.clone().unwrap_or_default(),
        description: dto.str_category_description.clone().unwrap_or_default(),
    })
}

pub fn to_recipe(dto: &MealSummaryDto, category_id: &str) -> Result<Recipe> {
    let id = non_blank(Some(&dto.id_meal))
        .ok_or_else(|| PlitsoError::Mapping("meal summary without idMeal".to_string()))?;
    Ok(Recipe {
        id,
        category_id: category_id.to_string(),
        title: dto.str_meal.trim().to_string(),
        image: dto.str_meal_thumb.clone().unwrap_or_default(),
    })
}

pub fn to_recipe_detail(dto: &MealDetailDto) -> Result<RecipeDetail> {
    let (id, title) = dto.require_identity()?;
    Ok(RecipeDetail {
        id,
        title,
        category: dto.str_category.clone().unwrap_or_default(),
        area: dto.str_area.clone().unwrap_or_default(),
        instructions: dto.str_instructions.clone().unwrap_or_default(),
        image: dto.str_meal_thumb.clone().unwrap_or_default(),
        tags: dto.tags(),
        youtube_url: non_blank(dto.str_youtube.as_deref()),
        source: non_blank(dto.str_source.as_deref()),
        ingredients: dto.ingredients(),
    })
}

pub fn to_day_recipe(dto: &MealDetailDto, created_on: DateTime<Utc>) -> Result<DayRecipe> {
    let (id, title) = dto.require_identity()?;
    Ok(DayRecipe {
        id,
        title,
        category: dto.str_category.clone().unwrap_or_default(),
        area: dto.str_area.clone().unwrap_or_default(),
        instructions: dto.str_instructions.clone().unwrap_or_default(),
        image: dto.str_meal_thumb.clone().unwrap_or_default(),
        created_on,
    })
}
