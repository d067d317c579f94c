use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::feed::{ChangeFeed, Table};
use crate::models::{AiAnswer, Category, ChatHistory, DayRecipe, Recipe, RecipeDetail, Role};
use crate::redis::RedisManager;
use crate::repository_traits::{BookmarkStore, CategoryStore, ChatStore, DayRecipeStore, RecipeStore};

/// Key layout for one namespace
#[derive(Debug, Clone)]
pub struct Keys {
    namespace: String,
}

impl Keys {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
        }
    }

    /// Hash: category id -> Category JSON
    pub fn categories(&self) -> String {
        format!("{}:categories", self.namespace)
    }

    /// Hash per category: recipe id -> Recipe JSON
    pub fn recipes(&self, category_id: &str) -> String {
        format!("{}:recipes:{}", self.namespace, category_id)
    }

    /// Hash: recipe id -> RecipeDetail JSON
    pub fn recipe_details(&self) -> String {
        format!("{}:recipe_details", self.namespace)
    }

    pub fn day_recipe(&self) -> String {
        format!("{}:day_recipe", self.namespace)
    }

    /// Hash: chat id -> ChatHistory JSON
    pub fn chats(&self) -> String {
        format!("{}:chats", self.namespace)
    }

    /// List of AiAnswer JSON in insertion order
    pub fn answers(&self, chat_id: Uuid) -> String {
        format!("{}:answers:{}", self.namespace, chat_id)
    }

    pub fn answer_seq(&self) -> String {
        format!("{}:answer_seq", self.namespace)
    }

    /// Set of recipe ids
    pub fn bookmarks(&self) -> String {
        format!("{}:bookmarks", self.namespace)
    }
}

/// Redis implementation of the cache store.
///
/// Change notification is in-process only: streams see writes made through
/// this instance (or its clones), not writes by other processes.
#[derive(Clone)]
pub struct RedisCacheStore {
    redis: Arc<RedisManager>,
    keys: Keys,
    feed: Arc<ChangeFeed>,
}

impl RedisCacheStore {
    pub fn new(redis: Arc<RedisManager>, namespace: &str) -> Self {
        Self {
            redis,
            keys: Keys::new(namespace),
            feed: Arc::new(ChangeFeed::new()),
        }
    }

    async fn read_categories(redis: &RedisManager, keys: &Keys) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = redis.hvals_json(&keys.categories()).await?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn read_chats(redis: &RedisManager, keys: &Keys) -> Result<Vec<ChatHistory>> {
        let mut chats: Vec<ChatHistory> = redis.hvals_json(&keys.chats()).await?;
        chats.sort_by(|a, b| b.started_on.cmp(&a.started_on));
        Ok(chats)
    }
}

#[async_trait]
impl CategoryStore for RedisCacheStore {
    async fn insert_categories(&self, categories: &[Category]) -> Result<()> {
        let entries: Vec<(String, &Category)> =
            categories.iter().map(|c| (c.id.clone(), c)).collect();
        self.redis
            .hset_json_many(&self.keys.categories(), &entries)
            .await?;
        self.feed.notify(Table::Categories);
        Ok(())
    }

    async fn get_categories(&self) -> Result<Vec<Category>> {
        Self::read_categories(&self.redis, &self.keys).await
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>> {
        self.redis.hget_json(&self.keys.categories(), id).await
    }

    fn watch_categories(&self) -> BoxStream<'static, Result<Vec<Category>>> {
        let redis = Arc::clone(&self.redis);
        let keys = self.keys.clone();
        self.feed.snapshots(Table::Categories, move || {
            let redis = Arc::clone(&redis);
            let keys = keys.clone();
            async move { Self::read_categories(&redis, &keys).await }
        })
    }
}

#[async_trait]
impl RecipeStore for RedisCacheStore {
    async fn insert_recipes(&self, recipes: &[Recipe]) -> Result<()> {
        // Recipes are bucketed by category; sync inserts one category at a time
        let mut by_category: std::collections::BTreeMap<&str, Vec<(String, &Recipe)>> =
            Default::default();
        for recipe in recipes {
            by_category
                .entry(recipe.category_id.as_str())
                .or_default()
                .push((recipe.id.clone(), recipe));
        }
        for (category_id, entries) in by_category {
            self.redis
                .hset_json_many(&self.keys.recipes(category_id), &entries)
                .await?;
        }
        self.feed.notify(Table::Recipes);
        Ok(())
    }

    async fn get_recipes_by_category(&self, category_id: &str) -> Result<Vec<Recipe>> {
        let mut recipes: Vec<Recipe> = self
            .redis
            .hvals_json(&self.keys.recipes(category_id))
            .await?;
        recipes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(recipes)
    }

    async fn insert_recipe_details(&self, details: &[RecipeDetail]) -> Result<()> {
        let entries: Vec<(String, &RecipeDetail)> =
            details.iter().map(|d| (d.id.clone(), d)).collect();
        self.redis
            .hset_json_many(&self.keys.recipe_details(), &entries)
            .await?;
        self.feed.notify(Table::RecipeDetails);
        Ok(())
    }

    async fn get_recipe_detail(&self, id: &str) -> Result<Option<RecipeDetail>> {
        self.redis.hget_json(&self.keys.recipe_details(), id).await
    }

    async fn get_recipe_details(&self) -> Result<Vec<RecipeDetail>> {
        self.redis.hvals_json(&self.keys.recipe_details()).await
    }
}

#[async_trait]
impl DayRecipeStore for RedisCacheStore {
    async fn get_day_recipes(&self) -> Result<Vec<DayRecipe>> {
        let recipe: Option<DayRecipe> = self.redis.get_json(&self.keys.day_recipe()).await?;
        Ok(recipe.into_iter().collect())
    }

    async fn insert_day_recipe(&self, recipe: &DayRecipe) -> Result<()> {
        self.redis.set_json(&self.keys.day_recipe(), recipe).await?;
        self.feed.notify(Table::DayRecipe);
        Ok(())
    }

    async fn clear_day_recipes(&self) -> Result<()> {
        self.redis.del(&[self.keys.day_recipe()]).await?;
        self.feed.notify(Table::DayRecipe);
        Ok(())
    }

    fn watch_day_recipes(&self) -> BoxStream<'static, Result<Vec<DayRecipe>>> {
        let redis = Arc::clone(&self.redis);
        let key = self.keys.day_recipe();
        self.feed.snapshots(Table::DayRecipe, move || {
            let redis = Arc::clone(&redis);
            let key = key.clone();
            async move {
                let recipe: Option<DayRecipe> = redis.get_json(&key).await?;
                Ok(recipe.into_iter().collect())
            }
        })
    }
}

#[async_trait]
impl ChatStore for RedisCacheStore {
    async fn insert_chat(&self, chat: &ChatHistory) -> Result<()> {
        self.redis
            .hset_json_many(&self.keys.chats(), &[(chat.id.to_string(), chat)])
            .await?;
        self.feed.notify(Table::Chats);
        Ok(())
    }

    async fn update_chat(&self, chat: &ChatHistory) -> Result<()> {
        let field = chat.id.to_string();
        if !self.redis.hexists(&self.keys.chats(), &field).await? {
            tracing::debug!("update_chat: chat {} not stored, ignoring", chat.id);
            return Ok(());
        }
        self.redis
            .hset_json_many(&self.keys.chats(), &[(field, chat)])
            .await?;
        self.feed.notify(Table::Chats);
        Ok(())
    }

    async fn get_chat(&self, id: Uuid) -> Result<Option<ChatHistory>> {
        self.redis
            .hget_json(&self.keys.chats(), &id.to_string())
            .await
    }

    async fn delete_chat(&self, id: Uuid) -> Result<()> {
        self.redis
            .hdel_and_del_atomic(&self.keys.chats(), &id.to_string(), &self.keys.answers(id))
            .await?;
        self.feed.notify(Table::Chats);
        self.feed.notify(Table::Answers);
        Ok(())
    }

    fn watch_chats(&self) -> BoxStream<'static, Result<Vec<ChatHistory>>> {
        let redis = Arc::clone(&self.redis);
        let keys = self.keys.clone();
        self.feed.snapshots(Table::Chats, move || {
            let redis = Arc::clone(&redis);
            let keys = keys.clone();
            async move { Self::read_chats(&redis, &keys).await }
        })
    }

    async fn insert_answer(&self, chat_id: Uuid, role: Role, content: &str) -> Result<i64> {
        let id = self.redis.incr(&self.keys.answer_seq()).await?;
        let answer = AiAnswer {
            id,
            chat_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.redis
            .rpush_json(&self.keys.answers(chat_id), &answer)
            .await?;
        self.feed.notify(Table::Answers);
        Ok(id)
    }

    async fn get_answers(&self, chat_id: Uuid) -> Result<Vec<AiAnswer>> {
        self.redis.lrange_json(&self.keys.answers(chat_id)).await
    }

    fn watch_answers(&self, chat_id: Uuid) -> BoxStream<'static, Result<Vec<AiAnswer>>> {
        let redis = Arc::clone(&self.redis);
        let key = self.keys.answers(chat_id);
        self.feed.snapshots(Table::Answers, move || {
            let redis = Arc::clone(&redis);
            let key = key.clone();
            async move { redis.lrange_json(&key).await }
        })
    }
}

#[async_trait]
impl BookmarkStore for RedisCacheStore {
    async fn save_bookmark(&self, recipe_id: &str) -> Result<()> {
        self.redis.sadd(&self.keys.bookmarks(), recipe_id).await?;
        self.feed.notify(Table::Bookmarks);
        Ok(())
    }

    async fn delete_bookmark(&self, recipe_id: &str) -> Result<()> {
        self.redis.srem(&self.keys.bookmarks(), recipe_id).await?;
        self.feed.notify(Table::Bookmarks);
        Ok(())
    }

    async fn is_bookmarked(&self, recipe_id: &str) -> Result<bool> {
        self.redis.sismember(&self.keys.bookmarks(), recipe_id).await
    }

    fn watch_bookmarks(&self) -> BoxStream<'static, Result<Vec<String>>> {
        let redis = Arc::clone(&self.redis);
        let key = self.keys.bookmarks();
        self.feed.snapshots(Table::Bookmarks, move || {
            let redis = Arc::clone(&redis);
            let key = key.clone();
            async move { redis.smembers(&key).await }
        })
    }
}
