//! In-process change notification for the cache stores.
//!
//! Every table has a version counter in a `watch` channel. Writers bump it,
//! readers turn it into a stream that re-reads a fresh snapshot each time the
//! version moves. Bursts of writes coalesce into one snapshot.

use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use tokio::sync::watch;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Categories,
    Recipes,
    RecipeDetails,
    DayRecipe,
    Chats,
    Answers,
    Bookmarks,
}

#[derive(Debug)]
pub struct ChangeFeed {
    categories: watch::Sender<u64>,
    recipes: watch::Sender<u64>,
    recipe_details: watch::Sender<u64>,
    day_recipe: watch::Sender<u64>,
    chats: watch::Sender<u64>,
    answers: watch::Sender<u64>,
    bookmarks: watch::Sender<u64>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            categories: watch::Sender::new(0),
            recipes: watch::Sender::new(0),
            recipe_details: watch::Sender::new(0),
            day_recipe: watch::Sender::new(0),
            chats: watch::Sender::new(0),
            answers: watch::Sender::new(0),
            bookmarks: watch::Sender::new(0),
        }
    }

    fn sender(&self, table: Table) -> &watch::Sender<u64> {
        match table {
            Table::Categories => &self.categories,
            Table::Recipes => &self.recipes,
            Table::RecipeDetails => &self.recipe_details,
            Table::DayRecipe => &self.day_recipe,
            Table::Chats => &self.chats,
            Table::Answers => &self.answers,
            Table::Bookmarks => &self.bookmarks,
        }
    }

    pub fn notify(&self, table: Table) {
        self.sender(table).send_modify(|version| *version = version.wrapping_add(1));
    }

    pub fn subscribe(&self, table: Table) -> watch::Receiver<u64> {
        self.sender(table).subscribe()
    }

    /// Current snapshot first, then a fresh one after every change to `table`
    pub fn snapshots<T, F, Fut>(&self, table: Table, read: F) -> BoxStream<'static, Result<T>>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        snapshot_stream(self.subscribe(table), read)
    }
}

pub fn snapshot_stream<T, F, Fut>(
    rx: watch::Receiver<u64>,
    read: F,
) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    stream::unfold((rx, read, true), |(mut rx, read, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        rx.mark_unchanged();
        let snapshot = read().await;
        Some((snapshot, (rx, read, false)))
    })
    .boxed()
}
