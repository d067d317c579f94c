use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::feed::{ChangeFeed, Table};
use crate::models::{AiAnswer, Category, ChatHistory, DayRecipe, Recipe, RecipeDetail, Role};
use crate::repository_traits::{BookmarkStore, CategoryStore, ChatStore, DayRecipeStore, RecipeStore};

#[derive(Debug, Default)]
struct Tables {
    categories: BTreeMap<String, Category>,
    recipes: BTreeMap<String, Recipe>,
    recipe_details: BTreeMap<String, RecipeDetail>,
    day_recipe: Option<DayRecipe>,
    chats: BTreeMap<Uuid, ChatHistory>,
    answers: Vec<AiAnswer>,
    next_answer_id: i64,
    bookmarks: BTreeSet<String>,
}

/// In-process cache store. Used when no Redis is configured and in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    feed: Arc<ChangeFeed>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored rows, across all tables
    pub async fn row_count(&self) -> usize {
        let t = self.tables.read().await;
        t.categories.len()
            + t.recipes.len()
            + t.recipe_details.len()
            + usize::from(t.day_recipe.is_some())
            + t.chats.len()
            + t.answers.len()
            + t.bookmarks.len()
    }
}

fn sorted_categories(t: &Tables) -> Vec<Category> {
    let mut categories: Vec<Category> = t.categories.values().cloned().collect();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    categories
}

fn chats_newest_first(t: &Tables) -> Vec<ChatHistory> {
    let mut chats: Vec<ChatHistory> = t.chats.values().cloned().collect();
    chats.sort_by(|a, b| b.started_on.cmp(&a.started_on));
    chats
}

fn answers_of(t: &Tables, chat_id: Uuid) -> Vec<AiAnswer> {
    t.answers
        .iter()
        .filter(|a| a.chat_id == chat_id)
        .cloned()
        .collect()
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn insert_categories(&self, categories: &[Category]) -> Result<()> {
        {
            let mut t = self.tables.write().await;
            for category in categories {
                t.categories.insert(category.id.clone(), category.clone());
            }
        }
        self.feed.notify(Table::Categories);
        Ok(())
    }

    async fn get_categories(&self) -> Result<Vec<Category>> {
        Ok(sorted_categories(&*self.tables.read().await))
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>> {
        Ok(self.tables.read().await.categories.get(id).cloned())
    }

    fn watch_categories(&self) -> BoxStream<'static, Result<Vec<Category>>> {
        let tables = Arc::clone(&self.tables);
        self.feed.snapshots(Table::Categories, move || {
            let tables = Arc::clone(&tables);
            async move { Ok(sorted_categories(&*tables.read().await)) }
        })
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn insert_recipes(&self, recipes: &[Recipe]) -> Result<()> {
        {
            let mut t = self.tables.write().await;
            for recipe in recipes {
                t.recipes.insert(recipe.id.clone(), recipe.clone());
            }
        }
        self.feed.notify(Table::Recipes);
        Ok(())
    }

    async fn get_recipes_by_category(&self, category_id: &str) -> Result<Vec<Recipe>> {
        let t = self.tables.read().await;
        Ok(t.recipes
            .values()
            .filter(|r| r.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn insert_recipe_details(&self, details: &[RecipeDetail]) -> Result<()> {
        {
            let mut t = self.tables.write().await;
            for detail in details {
                t.recipe_details.insert(detail.id.clone(), detail.clone());
            }
        }
        self.feed.notify(Table::RecipeDetails);
        Ok(())
    }

    async fn get_recipe_detail(&self, id: &str) -> Result<Option<RecipeDetail>> {
        Ok(self.tables.read().await.recipe_details.get(id).cloned())
    }

    async fn get_recipe_details(&self) -> Result<Vec<RecipeDetail>> {
        Ok(self
            .tables
            .read()
            .await
            .recipe_details
            .values()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DayRecipeStore for MemoryStore {
    async fn get_day_recipes(&self) -> Result<Vec<DayRecipe>> {
        Ok(self.tables.read().await.day_recipe.iter().cloned().collect())
    }

    async fn insert_day_recipe(&self, recipe: &DayRecipe) -> Result<()> {
        self.tables.write().await.day_recipe = Some(recipe.clone());
        self.feed.notify(Table::DayRecipe);
        Ok(())
    }

    async fn clear_day_recipes(&self) -> Result<()> {
        self.tables.write().await.day_recipe = None;
        self.feed.notify(Table::DayRecipe);
        Ok(())
    }

    fn watch_day_recipes(&self) -> BoxStream<'static, Result<Vec<DayRecipe>>> {
        let tables = Arc::clone(&self.tables);
        self.feed.snapshots(Table::DayRecipe, move || {
            let tables = Arc::clone(&tables);
            async move { Ok(tables.read().await.day_recipe.iter().cloned().collect()) }
        })
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_chat(&self, chat: &ChatHistory) -> Result<()> {
        self.tables.write().await.chats.insert(chat.id, chat.clone());
        self.feed.notify(Table::Chats);
        Ok(())
    }

    async fn update_chat(&self, chat: &ChatHistory) -> Result<()> {
        let updated = {
            let mut t = self.tables.write().await;
            match t.chats.get_mut(&chat.id) {
                Some(existing) => {
                    *existing = chat.clone();
                    true
                }
                None => false,
            }
        };
        if updated {
            self.feed.notify(Table::Chats);
        }
        Ok(())
    }

    async fn get_chat(&self, id: Uuid) -> Result<Option<ChatHistory>> {
        Ok(self.tables.read().await.chats.get(&id).cloned())
    }

    async fn delete_chat(&self, id: Uuid) -> Result<()> {
        {
            let mut t = self.tables.write().await;
            t.chats.remove(&id);
            t.answers.retain(|a| a.chat_id != id);
        }
        self.feed.notify(Table::Chats);
        self.feed.notify(Table::Answers);
        Ok(())
    }

    fn watch_chats(&self) -> BoxStream<'static, Result<Vec<ChatHistory>>> {
        let tables = Arc::clone(&self.tables);
        self.feed.snapshots(Table::Chats, move || {
            let tables = Arc::clone(&tables);
            async move { Ok(chats_newest_first(&*tables.read().await)) }
        })
    }

    async fn insert_answer(&self, chat_id: Uuid, role: Role, content: &str) -> Result<i64> {
        let id = {
            let mut t = self.tables.write().await;
            t.next_answer_id += 1;
            let id = t.next_answer_id;
            t.answers.push(AiAnswer {
                id,
                chat_id,
                role,
                content: content.to_string(),
                created_at: Utc::now(),
            });
            id
        };
        self.feed.notify(Table::Answers);
        Ok(id)
    }

    async fn get_answers(&self, chat_id: Uuid) -> Result<Vec<AiAnswer>> {
        Ok(answers_of(&*self.tables.read().await, chat_id))
    }

    fn watch_answers(&self, chat_id: Uuid) -> BoxStream<'static, Result<Vec<AiAnswer>>> {
        let tables = Arc::clone(&self.tables);
        self.feed.snapshots(Table::Answers, move || {
            let tables = Arc::clone(&tables);
            async move { Ok(answers_of(&*tables.read().await, chat_id)) }
        })
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn save_bookmark(&self, recipe_id: &str) -> Result<()> {
        self.tables
            .write()
            .await
            .bookmarks
            .insert(recipe_id.to_string());
        self.feed.notify(Table::Bookmarks);
        Ok(())
    }

    async fn delete_bookmark(&self, recipe_id: &str) -> Result<()> {
        self.tables.write().await.bookmarks.remove(recipe_id);
        self.feed.notify(Table::Bookmarks);
        Ok(())
    }

    async fn is_bookmarked(&self, recipe_id: &str) -> Result<bool> {
        Ok(self.tables.read().await.bookmarks.contains(recipe_id))
    }

    fn watch_bookmarks(&self) -> BoxStream<'static, Result<Vec<String>>> {
        let tables = Arc::clone(&self.tables);
        self.feed.snapshots(Table::Bookmarks, move || {
            let tables = Arc::clone(&tables);
            async move { Ok(tables.read().await.bookmarks.iter().cloned().collect()) }
        })
    }
}
