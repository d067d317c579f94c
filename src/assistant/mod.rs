/// AI chat and meal suggestion orchestration
pub mod chat;
pub mod suggestions;
pub mod view;

#[cfg(test)]
mod test_assistant;

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::Result;
use crate::generative::GenerativeModel;
use crate::models::{ChatHistory, GenerativeParameters, GenerativeState, PastMeal, RecipeDetail};
use crate::repository_traits::CacheStore;

/// The conversation the assistant is currently attached to
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveChat {
    pub chat: ChatHistory,
    /// False until the first exchange writes the chat to the store
    pub persisted: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatStatus {
    pub is_processing: bool,
    pub error: Option<String>,
}

/// What happened to the chat title during an exchange
#[derive(Debug, Clone, PartialEq)]
pub enum TitleOutcome {
    /// The chat already had one
    Kept,
    Generated(String),
    /// Title generation or its update failed; the exchange carried on
    Failed(String),
}

/// The step of an exchange that failed. Steps before it have been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStep {
    PersistChat,
    LoadHistory,
    AppendQuestion,
    ModelReply,
    AppendReply,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    NoActiveChat,
    Completed {
        question_id: i64,
        answer_id: i64,
        title: TitleOutcome,
    },
    Failed {
        step: ExchangeStep,
        /// Set when the user message made it into the store
        question_id: Option<i64>,
        message: String,
    },
}

/// Background data for suggestion prompts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiContext {
    pub recipes: Vec<RecipeDetail>,
    pub past_meals: Vec<PastMeal>,
    /// Distinct cuisines of the cached recipes, sorted
    pub countries: Vec<String>,
}

impl AiContext {
    pub async fn load(store: &dyn CacheStore, past_meals: Vec<PastMeal>) -> Result<Self> {
        let recipes = store.get_recipe_details().await?;
        let countries = recipes
            .iter()
            .map(|r| r.area.trim())
            .filter(|area| !area.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Ok(Self {
            recipes,
            past_meals,
            countries,
        })
    }
}

/// One user's assistant session.
///
/// Owns the active conversation and the transient UI state. Everything it
/// persists goes through the cache store.
pub struct AiAssistant {
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) model: Arc<dyn GenerativeModel>,
    pub(crate) current: watch::Sender<Option<ActiveChat>>,
    pub(crate) status: watch::Sender<ChatStatus>,
    pub(crate) new_message_id: Option<i64>,
    pub(crate) parameters: GenerativeParameters,
    pub(crate) generative: watch::Sender<GenerativeState>,
    pub(crate) context: AiContext,
}

impl AiAssistant {
    pub fn new(store: Arc<dyn CacheStore>, model: Arc<dyn GenerativeModel>) -> Self {
        Self::with_context(store, model, AiContext::default())
    }

    pub fn with_context(
        store: Arc<dyn CacheStore>,
        model: Arc<dyn GenerativeModel>,
        context: AiContext,
    ) -> Self {
        Self {
            store,
            model,
            current: watch::Sender::new(None),
            status: watch::Sender::new(ChatStatus::default()),
            new_message_id: None,
            parameters: GenerativeParameters::default(),
            generative: watch::Sender::new(GenerativeState::default()),
            context,
        }
    }

    pub fn context(&self) -> &AiContext {
        &self.context
    }

    /// Reload cached recipes for the suggestion prompt
    pub async fn refresh_context(&mut self, past_meals: Vec<PastMeal>) -> Result<()> {
        self.context = AiContext::load(self.store.as_ref(), past_meals).await?;
        tracing::debug!(
            "Assistant context: {} recipes, {} cuisines",
            self.context.recipes.len(),
            self.context.countries.len()
        );
        Ok(())
    }

    pub fn current_chat(&self) -> Option<ChatHistory> {
        self.current.borrow().as_ref().map(|active| active.chat.clone())
    }

    pub fn current_chat_id(&self) -> Option<Uuid> {
        self.current.borrow().as_ref().map(|active| active.chat.id)
    }

    pub fn watch_current_chat(&self) -> watch::Receiver<Option<ActiveChat>> {
        self.current.subscribe()
    }

    pub fn status(&self) -> ChatStatus {
        self.status.borrow().clone()
    }

    pub(crate) fn set_error(&self, message: String) {
        self.status.send_replace(ChatStatus {
            is_processing: false,
            error: Some(message),
        });
    }
}
