use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AiAnswer, Category, ChatHistory, DayRecipe, Recipe, RecipeDetail, Role};

#[async_trait]
pub trait CategoryStore: Send + Sync + 'static {
    /// Insert or replace by id
    async fn insert_categories(&self, categories: &[Category]) -> Result<()>;
    async fn get_categories(&self) -> Result<Vec<Category>>;
    async fn get_category(&self, id: &str) -> Result<Option<Category>>;
    fn watch_categories(&self) -> BoxStream<'static, Result<Vec<Category>>>;
}

#[async_trait]
pub trait RecipeStore: Send + Sync + 'static {
    async fn insert_recipes(&self, recipes: &[Recipe]) -> Result<()>;
    async fn get_recipes_by_category(&self, category_id: &str) -> Result<Vec<Recipe>>;
    async fn insert_recipe_details(&self, details: &[RecipeDetail]) -> Result<()>;
    async fn get_recipe_detail(&self, id: &str) -> Result<Option<RecipeDetail>>;
    async fn get_recipe_details(&self) -> Result<Vec<RecipeDetail>>;
}

#[async_trait]
pub trait DayRecipeStore: Send + Sync + 'static {
    async fn get_day_recipes(&self) -> Result<Vec<DayRecipe>>;
    /// Replaces whatever is stored; there is never more than one
    async fn insert_day_recipe(&self, recipe: &DayRecipe) -> Result<()>;
    async fn clear_day_recipes(&self) -> Result<()>;
    fn watch_day_recipes(&self) -> BoxStream<'static, Result<Vec<DayRecipe>>>;
}

#[async_trait]
pub trait ChatStore: Send + Sync + 'static {
    async fn insert_chat(&self, chat: &ChatHistory) -> Result<()>;
    async fn update_chat(&self, chat: &ChatHistory) -> Result<()>;
    async fn get_chat(&self, id: Uuid) -> Result<Option<ChatHistory>>;
    /// Removes the chat and all of its answers
    async fn delete_chat(&self, id: Uuid) -> Result<()>;
    /// Newest first
    fn watch_chats(&self) -> BoxStream<'static, Result<Vec<ChatHistory>>>;

    /// Appends an answer and returns its assigned id
    async fn insert_answer(&self, chat_id: Uuid, role: Role, content: &str) -> Result<i64>;
    /// In insertion order
    async fn get_answers(&self, chat_id: Uuid) -> Result<Vec<AiAnswer>>;
    fn watch_answers(&self, chat_id: Uuid) -> BoxStream<'static, Result<Vec<AiAnswer>>>;
}

#[async_trait]
pub trait BookmarkStore: Send + Sync + 'static {
    async fn save_bookmark(&self, recipe_id: &str) -> Result<()>;
    async fn delete_bookmark(&self, recipe_id: &str) -> Result<()>;
    async fn is_bookmarked(&self, recipe_id: &str) -> Result<bool>;
    fn watch_bookmarks(&self) -> BoxStream<'static, Result<Vec<String>>>;
}

/// Everything the orchestrators need from local storage
pub trait CacheStore: CategoryStore + RecipeStore + DayRecipeStore + ChatStore + BookmarkStore {}

impl<T> CacheStore for T where T: CategoryStore + RecipeStore + DayRecipeStore + ChatStore + BookmarkStore
{}
