use super::*;
use crate::error::PlitsoError;
use crate::generative::{ChatTurn, MockGenerativeModel};
use crate::memory::MemoryStore;
use crate::models::{
    AiAnswer, Category, ChatUiState, DayRecipe, MealType, Recipe, RecipeDetail, Role,
};
use crate::repository_traits::{
    BookmarkStore, CategoryStore, ChatStore, DayRecipeStore, RecipeStore,
};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Model fake with queued answers that records what it was asked
#[derive(Default)]
struct ScriptedModel {
    titles: Mutex<VecDeque<Result<String>>>,
    replies: Mutex<VecDeque<Result<String>>>,
    histories: Mutex<Vec<Vec<ChatTurn>>>,
    title_calls: AtomicUsize,
}

impl ScriptedModel {
    fn with_titles(titles: Vec<Result<String>>) -> Self {
        Self {
            titles: Mutex::new(titles.into()),
            ..Default::default()
        }
    }

    fn push_reply(&self, reply: Result<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn histories(&self) -> Vec<Vec<ChatTurn>> {
        self.histories.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate_content(&self, _prompt: &str) -> Result<String> {
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        self.titles
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Cooking Chat".to_string()))
    }

    async fn continue_chat(&self, history: &[ChatTurn], message: &str) -> Result<String> {
        self.histories.lock().unwrap().push(history.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("Reply to {message}")))
    }
}

/// Memory store whose chat writes or answer reads can be switched to fail
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_chat_insert: AtomicBool,
    fail_answer_reads: AtomicBool,
}

fn disk_error() -> PlitsoError {
    PlitsoError::Internal("disk I/O error".to_string())
}

#[async_trait]
impl CategoryStore for FlakyStore {
    async fn insert_categories(&self, categories: &[Category]) -> Result<()> {
        self.inner.insert_categories(categories).await
    }
    async fn get_categories(&self) -> Result<Vec<Category>> {
        self.inner.get_categories().await
    }
    async fn get_category(&self, id: &str) -> Result<Option<Category>> {
        self.inner.get_category(id).await
    }
    fn watch_categories(&self) -> BoxStream<'static, Result<Vec<Category>>> {
        self.inner.watch_categories()
    }
}

#[async_trait]
impl RecipeStore for FlakyStore {
    async fn insert_recipes(&self, recipes: &[Recipe]) -> Result<()> {
        self.inner.insert_recipes(recipes).await
    }
    async fn get_recipes_by_category(&self, category_id: &str) -> Result<Vec<Recipe>> {
        self.inner.get_recipes_by_category(category_id).await
    }
    async fn insert_recipe_details(&self, details: &[RecipeDetail]) -> Result<()> {
        self.inner.insert_recipe_details(details).await
    }
    async fn get_recipe_detail(&self, id: &str) -> Result<Option<RecipeDetail>> {
        self.inner.get_recipe_detail(id).await
    }
    async fn get_recipe_details(&self) -> Result<Vec<RecipeDetail>> {
        self.inner.get_recipe_details().await
    }
}

#[async_trait]
impl DayRecipeStore for FlakyStore {
    async fn get_day_recipes(&self) -> Result<Vec<DayRecipe>> {
        self.inner.get_day_recipes().await
    }
    async fn insert_day_recipe(&self, recipe: &DayRecipe) -> Result<()> {
        self.inner.insert_day_recipe(recipe).await
    }
    async fn clear_day_recipes(&self) -> Result<()> {
        self.inner.clear_day_recipes().await
    }
    fn watch_day_recipes(&self) -> BoxStream<'static, Result<Vec<DayRecipe>>> {
        self.inner.watch_day_recipes()
    }
}

#[async_trait]
impl ChatStore for FlakyStore {
    async fn insert_chat(&self, chat: &ChatHistory) -> Result<()> {
        if self.fail_chat_insert.load(Ordering::SeqCst) {
            return Err(disk_error());
        }
        self.inner.insert_chat(chat).await
    }
    async fn update_chat(&self, chat: &ChatHistory) -> Result<()> {
        self.inner.update_chat(chat).await
    }
    async fn get_chat(&self, id: Uuid) -> Result<Option<ChatHistory>> {
        self.inner.get_chat(id).await
    }
    async fn delete_chat(&self, id: Uuid) -> Result<()> {
        self.inner.delete_chat(id).await
    }
    fn watch_chats(&self) -> BoxStream<'static, Result<Vec<ChatHistory>>> {
        self.inner.watch_chats()
    }
    async fn insert_answer(&self, chat_id: Uuid, role: Role, content: &str) -> Result<i64> {
        self.inner.insert_answer(chat_id, role, content).await
    }
    async fn get_answers(&self, chat_id: Uuid) -> Result<Vec<AiAnswer>> {
        if self.fail_answer_reads.load(Ordering::SeqCst) {
            return Err(disk_error());
        }
        self.inner.get_answers(chat_id).await
    }
    fn watch_answers(&self, chat_id: Uuid) -> BoxStream<'static, Result<Vec<AiAnswer>>> {
        if self.fail_answer_reads.load(Ordering::SeqCst) {
            return self
                .inner
                .watch_answers(chat_id)
                .map(|_| Err::<Vec<AiAnswer>, _>(disk_error()))
                .boxed();
        }
        self.inner.watch_answers(chat_id)
    }
}

#[async_trait]
impl BookmarkStore for FlakyStore {
    async fn save_bookmark(&self, recipe_id: &str) -> Result<()> {
        self.inner.save_bookmark(recipe_id).await
    }
    async fn delete_bookmark(&self, recipe_id: &str) -> Result<()> {
        self.inner.delete_bookmark(recipe_id).await
    }
    async fn is_bookmarked(&self, recipe_id: &str) -> Result<bool> {
        self.inner.is_bookmarked(recipe_id).await
    }
    fn watch_bookmarks(&self) -> BoxStream<'static, Result<Vec<String>>> {
        self.inner.watch_bookmarks()
    }
}

fn assistant_with(store: &MemoryStore, model: Arc<dyn GenerativeModel>) -> AiAssistant {
    AiAssistant::new(Arc::new(store.clone()), model)
}

fn roles_and_contents(answers: &[AiAnswer]) -> Vec<(Role, String)> {
    answers.iter().map(|a| (a.role, a.content.clone())).collect()
}

async fn wait_for(
    view: &mut BoxStream<'static, ChatUiState>,
    predicate: impl Fn(&ChatUiState) -> bool,
) -> ChatUiState {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let state = view.next().await.expect("view ended");
            if predicate(&state) {
                return state;
            }
        }
    })
    .await
    .expect("view never reached the expected state")
}

#[tokio::test]
async fn test_exchanges_are_stored_in_call_order() {
    let store = MemoryStore::new();
    let model = Arc::new(ScriptedModel::default());
    let mut assistant = assistant_with(&store, model.clone());

    let chat = assistant.start_new_chat();
    for question in ["What's for dinner?", "Something with rice", "No mushrooms"] {
        let outcome = assistant.ask_question(question).await;
        assert!(matches!(outcome, AskOutcome::Completed { .. }));
    }

    let stored = store.get_answers(chat.id).await.unwrap();
    assert_eq!(
        roles_and_contents(&stored),
        vec![
            (Role::User, "What's for dinner?".to_string()),
            (Role::Model, "Reply to What's for dinner?".to_string()),
            (Role::User, "Something with rice".to_string()),
            (Role::Model, "Reply to Something with rice".to_string()),
            (Role::User, "No mushrooms".to_string()),
            (Role::Model, "Reply to No mushrooms".to_string()),
        ]
    );

    // The model sees the answers stored before the new question, never the question itself
    let lengths: Vec<usize> = model.histories().iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![0, 2, 4]);
    assert_eq!(model.histories()[2][1].role, Role::Model);
}

#[tokio::test]
async fn test_unused_chat_never_reaches_storage() {
    let store = MemoryStore::new();
    let mut assistant = assistant_with(&store, Arc::new(ScriptedModel::default()));

    let chat = assistant.start_new_chat();
    assert_eq!(store.row_count().await, 0);

    assistant.delete_chat(chat.id).await;
    assert_eq!(store.row_count().await, 0);
    assert!(assistant.current_chat().is_none());
}

#[tokio::test]
async fn test_title_generated_for_first_question_only() {
    let store = MemoryStore::new();
    let model = Arc::new(ScriptedModel::with_titles(vec![Ok(
        "\"Weeknight Dinner Ideas.\"".to_string(),
    )]));
    let mut assistant = assistant_with(&store, model.clone());

    let chat = assistant.start_new_chat();
    let first = assistant.ask_question("What's for dinner?").await;
    let second = assistant.ask_question("And dessert?").await;

    match first {
        AskOutcome::Completed { title, .. } => {
            assert_eq!(title, TitleOutcome::Generated("Weeknight Dinner Ideas".to_string()))
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(matches!(
        second,
        AskOutcome::Completed {
            title: TitleOutcome::Kept,
            ..
        }
    ));
    assert_eq!(model.title_calls.load(Ordering::SeqCst), 1);

    let stored = store.get_chat(chat.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Weeknight Dinner Ideas");
    assert_eq!(assistant.current_chat().unwrap().title, "Weeknight Dinner Ideas");
}

#[tokio::test]
async fn test_title_failure_keeps_the_exchange() {
    let store = MemoryStore::new();
    let model = Arc::new(ScriptedModel::with_titles(vec![Err(
        PlitsoError::Generative("quota exceeded".to_string()),
    )]));
    let mut assistant = assistant_with(&store, model);

    let chat = assistant.start_new_chat();
    let outcome = assistant.ask_question("What's for dinner?").await;

    assert!(matches!(
        outcome,
        AskOutcome::Completed {
            title: TitleOutcome::Failed(_),
            ..
        }
    ));
    let stored = store.get_answers(chat.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].role, Role::User);
    assert_eq!(stored[1].role, Role::Model);
    assert!(store.get_chat(chat.id).await.unwrap().unwrap().title.is_empty());
    assert_eq!(assistant.status(), ChatStatus::default());
}

#[tokio::test]
async fn test_ask_without_active_chat_does_nothing() {
    let store = MemoryStore::new();
    let mut model = MockGenerativeModel::new();
    model.expect_generate_content().never();
    model.expect_continue_chat().never();
    let mut assistant = assistant_with(&store, Arc::new(model));

    assert_eq!(assistant.ask_question("Hello?").await, AskOutcome::NoActiveChat);
    assert_eq!(store.row_count().await, 0);
    assert!(!assistant.status().is_processing);
}

#[tokio::test]
async fn test_model_failure_keeps_the_question() {
    let store = MemoryStore::new();
    let model = Arc::new(ScriptedModel::default());
    model.push_reply(Err(PlitsoError::Generative("service unavailable".to_string())));
    let mut assistant = assistant_with(&store, model);

    let chat = assistant.start_new_chat();
    let outcome = assistant.ask_question("What's for dinner?").await;

    let question_id = match outcome {
        AskOutcome::Failed {
            step: ExchangeStep::ModelReply,
            question_id: Some(id),
            ..
        } => id,
        other => panic!("unexpected outcome {other:?}"),
    };
    let stored = store.get_answers(chat.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, question_id);

    let status = assistant.status();
    assert!(!status.is_processing);
    assert!(status.error.unwrap().contains("service unavailable"));
    assert!(assistant.new_message_id().is_none());

    // A later success clears the error
    assistant.ask_question("Try again").await;
    assert_eq!(assistant.status(), ChatStatus::default());
}

#[tokio::test]
async fn test_failed_chat_insert_writes_nothing() {
    let store = Arc::new(FlakyStore::default());
    store.fail_chat_insert.store(true, Ordering::SeqCst);
    let mut assistant = AiAssistant::new(store.clone(), Arc::new(ScriptedModel::default()));

    assistant.start_new_chat();
    let outcome = assistant.ask_question("What's for dinner?").await;

    assert!(matches!(
        outcome,
        AskOutcome::Failed {
            step: ExchangeStep::PersistChat,
            question_id: None,
            ..
        }
    ));
    assert_eq!(store.inner.row_count().await, 0);
    assert!(!assistant.watch_current_chat().borrow().as_ref().unwrap().persisted);
}

#[tokio::test]
async fn test_set_current_chat_with_unknown_id_keeps_state() {
    let store = MemoryStore::new();
    let mut assistant = assistant_with(&store, Arc::new(ScriptedModel::default()));

    let chat = assistant.start_new_chat();
    assert!(!assistant.set_current_chat(Uuid::new_v4()).await);
    assert_eq!(assistant.current_chat_id(), Some(chat.id));
}

#[tokio::test]
async fn test_resumed_chat_sends_stored_history() {
    let store = MemoryStore::new();
    let model = Arc::new(ScriptedModel::default());
    let mut assistant = assistant_with(&store, model.clone());

    let chat = assistant.start_new_chat();
    assistant.ask_question("What's for dinner?").await;
    assistant.reset_chat();
    assert!(assistant.current_chat().is_none());

    assert!(assistant.set_current_chat(chat.id).await);
    assistant.ask_question("Something lighter").await;

    let last = model.histories().pop().unwrap();
    assert_eq!(
        last,
        vec![
            ChatTurn {
                role: Role::User,
                text: "What's for dinner?".to_string()
            },
            ChatTurn {
                role: Role::Model,
                text: "Reply to What's for dinner?".to_string()
            },
        ]
    );
    assert_eq!(store.get_answers(chat.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_deleting_active_chat_resets_session() {
    let store = MemoryStore::new();
    let mut assistant = assistant_with(&store, Arc::new(ScriptedModel::default()));

    let kept = assistant.start_new_chat();
    assistant.ask_question("Soup ideas?").await;
    let active = assistant.start_new_chat();
    assistant.ask_question("Pasta ideas?").await;

    assistant.delete_chat(kept.id).await;
    assert_eq!(assistant.current_chat_id(), Some(active.id));

    assistant.delete_chat(active.id).await;
    assert!(assistant.current_chat().is_none());
    assert!(assistant.new_message_id().is_none());
    assert!(store.get_answers(active.id).await.unwrap().is_empty());
    assert_eq!(store.row_count().await, 0);
}

#[tokio::test]
async fn test_new_message_id_points_at_model_answer() {
    let store = MemoryStore::new();
    let mut assistant = assistant_with(&store, Arc::new(ScriptedModel::default()));

    let chat = assistant.start_new_chat();
    let outcome = assistant.ask_question("Breakfast?").await;

    let AskOutcome::Completed { answer_id, .. } = outcome else {
        panic!("exchange failed: {outcome:?}");
    };
    assert_eq!(assistant.new_message_id(), Some(answer_id));
    let stored = store.get_answers(chat.id).await.unwrap();
    assert_eq!(stored.last().unwrap().id, answer_id);

    assistant.reset_message_id();
    assert!(assistant.new_message_id().is_none());
}

#[tokio::test]
async fn test_chat_histories_lists_persisted_chats() {
    let store = MemoryStore::new();
    let mut assistant = assistant_with(&store, Arc::new(ScriptedModel::default()));
    let mut histories = assistant.chat_histories();
    assert!(histories.next().await.unwrap().unwrap().is_empty());

    assistant.start_new_chat();
    assistant.ask_question("Lunch?").await;

    let listed = histories.next().await.unwrap().unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_suggestions_need_required_parameters() {
    let store = MemoryStore::new();
    let mut model = MockGenerativeModel::new();
    model.expect_generate_content().never();
    let mut assistant = assistant_with(&store, Arc::new(model));

    assistant.on_cuisine_change("Italian");
    assistant.on_mood_change("Comfort");

    let called = AtomicBool::new(false);
    assistant
        .generate_suggestions(|| called.store(true, Ordering::SeqCst))
        .await;

    let state = assistant.generative_state();
    assert!(!state.is_loading);
    assert_eq!(state.error_message, "Please select a meal type, cuisine and mood");
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_suggestions_make_one_call_and_store_the_answer() {
    let store = MemoryStore::new();
    let mut model = MockGenerativeModel::new();
    model
        .expect_generate_content()
        .withf(|prompt| prompt.contains("- Cuisine: Italian") && prompt.contains("Vegetarian"))
        .times(1)
        .returning(|_| Ok("Try a mushroom risotto".to_string()));
    let mut assistant = assistant_with(&store, Arc::new(model));
    let mut updates = assistant.watch_generative_state();

    assistant.on_meal_type_change(MealType::Dinner.name());
    assistant.on_cuisine_change("Italian");
    assistant.on_mood_change("Comfort");
    assistant.on_dietary_change("Vegetarian");
    assistant.on_quick_change(true);

    let called = AtomicBool::new(false);
    assistant
        .generate_suggestions(|| called.store(true, Ordering::SeqCst))
        .await;

    assert!(called.load(Ordering::SeqCst));
    assert!(updates.has_changed().unwrap());
    let state = updates.borrow_and_update().clone();
    assert!(!state.is_loading);
    assert!(state.error_message.is_empty());
    assert_eq!(state.generative_answer, "Try a mushroom risotto");
    assert!(assistant.parameters().is_quick);
}

#[tokio::test]
async fn test_suggestion_failure_sets_error() {
    let store = MemoryStore::new();
    let mut model = MockGenerativeModel::new();
    model
        .expect_generate_content()
        .times(1)
        .returning(|_| Err(PlitsoError::Generative("API key not valid".to_string())));
    let mut assistant = assistant_with(&store, Arc::new(model));

    assistant.on_meal_type_change("Lunch");
    assistant.on_cuisine_change("Thai");
    assistant.on_mood_change("Spicy");

    let called = AtomicBool::new(false);
    assistant
        .generate_suggestions(|| called.store(true, Ordering::SeqCst))
        .await;

    let state = assistant.generative_state();
    assert!(!called.load(Ordering::SeqCst));
    assert!(!state.is_loading);
    assert!(state.error_message.contains("API key not valid"));
    assert!(state.generative_answer.is_empty());
}

#[tokio::test]
async fn test_context_lists_distinct_cuisines() {
    let store = MemoryStore::new();
    let detail = |id: &str, area: &str| RecipeDetail {
        id: id.to_string(),
        title: format!("Meal {id}"),
        category: "Beef".to_string(),
        area: area.to_string(),
        instructions: String::new(),
        image: String::new(),
        tags: vec![],
        youtube_url: None,
        source: None,
        ingredients: vec![],
    };
    store
        .insert_recipe_details(&[
            detail("1", "Italian"),
            detail("2", "Mexican"),
            detail("3", "Italian"),
            detail("4", ""),
        ])
        .await
        .unwrap();

    let mut assistant = assistant_with(&store, Arc::new(ScriptedModel::default()));
    assistant.refresh_context(vec![]).await.unwrap();

    assert_eq!(assistant.context().recipes.len(), 4);
    assert_eq!(assistant.context().countries, vec!["Italian", "Mexican"]);
}

#[tokio::test]
async fn test_view_follows_the_conversation() {
    let store = MemoryStore::new();
    let mut assistant = assistant_with(&store, Arc::new(ScriptedModel::default()));
    let mut view = assistant.conversation_view();

    assert_eq!(view.next().await.unwrap(), ChatUiState::default());

    assistant.start_new_chat();
    assistant.ask_question("What's for dinner?").await;

    let state = wait_for(&mut view, |state| {
        matches!(state, ChatUiState::Success { messages, title, is_processing: false, .. }
            if messages.len() == 2 && !title.is_empty())
    })
    .await;
    let ChatUiState::Success { messages, error, .. } = state else {
        unreachable!()
    };
    assert_eq!(messages[0].content, "What's for dinner?");
    assert!(error.is_none());

    assistant.reset_chat();
    wait_for(&mut view, |state| *state == ChatUiState::default()).await;
}

#[tokio::test]
async fn test_view_reports_store_failures() {
    let store = Arc::new(FlakyStore::default());
    store.fail_answer_reads.store(true, Ordering::SeqCst);
    let mut assistant = AiAssistant::new(store, Arc::new(ScriptedModel::default()));
    let mut view = assistant.conversation_view();
    view.next().await.unwrap();

    assistant.start_new_chat();
    let state = wait_for(&mut view, |state| matches!(state, ChatUiState::Error(_))).await;
    assert_eq!(state, ChatUiState::Error("Internal error: disk I/O error".to_string()));
}

#[tokio::test]
async fn test_view_ends_with_the_assistant() {
    let store = MemoryStore::new();
    let assistant = assistant_with(&store, Arc::new(ScriptedModel::default()));
    let mut view = assistant.conversation_view();
    view.next().await.unwrap();

    drop(assistant);
    assert!(view.next().await.is_none());
}

