use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PlitsoError, Result};

/// Recipe category cached from the meal database
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
    pub description: String,
}

/// Recipe summary, as listed under a category
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Recipe {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ingredient {
    pub name: String,
    pub measure: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecipeDetail {
    pub id: String,
    pub title: String,
    pub category: String,
    /// Cuisine, e.g. "Italian"
    pub area: String,
    pub instructions: String,
    pub image: String,
    pub tags: Vec<String>,
    pub youtube_url: Option<String>,
    pub source: Option<String>,
    pub ingredients: Vec<Ingredient>,
}

/// The cached "recipe of the day". At most one lives in the store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DayRecipe {
    pub id: String,
    pub title: String,
    pub category: String,
    pub area: String,
    pub instructions: String,
    pub image: String,
    pub created_on: DateTime<Utc>,
}

/// One AI conversation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatHistory {
    pub id: Uuid,
    pub title: String,
    pub started_on: DateTime<Utc>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            started_on: Utc::now(),
        }
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of a conversation. Ids are assigned by the store and grow with
/// insertion order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AiAnswer {
    pub id: i64,
    pub chat_id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A meal the user logged earlier; used as prompt context for suggestions
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PastMeal {
    pub meal_type: String,
    pub description: String,
    pub eaten_on: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Dessert,
}

impl MealType {
    pub const ALL: [MealType; 5] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
        MealType::Dessert,
    ];

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<MealType> {
        Self::ALL
            .into_iter()
            .find(|meal_type| meal_type.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
            MealType::Dessert => "Dessert",
        }
    }
}

pub const MOODS: [&str; 5] = ["Savory", "Sweet", "Spicy", "Healthy", "Comfort"];

pub const DIETARY_OPTIONS: [&str; 4] = ["Vegetarian", "Vegan", "Gluten-free", "Dairy-free"];

/// Filter values picked on the suggestion screen. Never persisted.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct GenerativeParameters {
    pub meal_type: String,
    pub cuisine: String,
    pub mood: String,
    pub dietary: String,
    pub is_quick: bool,
}

impl GenerativeParameters {
    /// Meal type, cuisine and mood are required before asking for suggestions
    pub fn validate(&self) -> Result<()> {
        if self.meal_type.is_empty() || self.cuisine.is_empty() || self.mood.is_empty() {
            return Err(PlitsoError::Validation(
                "Please select a meal type, cuisine and mood".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct GenerativeState {
    pub is_loading: bool,
    pub error_message: String,
    pub generative_answer: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub enum ChatUiState {
    Success {
        title: String,
        messages: Vec<AiAnswer>,
        is_processing: bool,
        error: Option<String>,
    },
    Error(String),
}

impl Default for ChatUiState {
    fn default() -> Self {
        ChatUiState::Success {
            title: String::new(),
            messages: Vec::new(),
            is_processing: false,
            error: None,
        }
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct RecipeDetailState {
    pub is_loading: bool,
    pub message: String,
    pub recipe_detail: Option<RecipeDetail>,
    pub is_bookmarked: bool,
}

/// Outcome of one `refresh_database` sweep
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub categories: usize,
    pub recipes: usize,
    pub details: usize,
    pub failures: Vec<String>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
