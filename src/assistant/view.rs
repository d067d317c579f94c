use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::{ActiveChat, AiAssistant, ChatStatus};
use crate::error::Result;
use crate::models::{AiAnswer, ChatUiState};
use crate::repository_traits::CacheStore;

type AnswerStream = BoxStream<'static, Result<Vec<AiAnswer>>>;

impl AiAssistant {
    /// Display state of the active conversation.
    ///
    /// Emits the current state first, then again whenever the active chat,
    /// its stored answers or the processing status change. Ends when the
    /// assistant is dropped.
    pub fn conversation_view(&self) -> BoxStream<'static, ChatUiState> {
        let view = ConversationView {
            store: Arc::clone(&self.store),
            chat_rx: self.current.subscribe(),
            status_rx: self.status.subscribe(),
            answers: None,
            answers_of: None,
            messages: Vec::new(),
            failure: None,
            started: false,
        };
        stream::unfold(view, |mut view| async move {
            let state = view.next_state().await?;
            Some((state, view))
        })
        .boxed()
    }
}

struct ConversationView {
    store: Arc<dyn CacheStore>,
    chat_rx: watch::Receiver<Option<ActiveChat>>,
    status_rx: watch::Receiver<ChatStatus>,
    answers: Option<AnswerStream>,
    answers_of: Option<Uuid>,
    messages: Vec<AiAnswer>,
    failure: Option<String>,
    started: bool,
}

impl ConversationView {
    async fn next_state(&mut self) -> Option<ChatUiState> {
        if !self.started {
            self.started = true;
            self.follow_active_chat().await;
            return Some(self.render());
        }

        loop {
            tokio::select! {
                changed = self.chat_rx.changed() => {
                    changed.ok()?;
                    self.follow_active_chat().await;
                    return Some(self.render());
                }
                changed = self.status_rx.changed() => {
                    changed.ok()?;
                    return Some(self.render());
                }
                snapshot = next_snapshot(&mut self.answers) => {
                    // Answers of other chats wake the feed too
                    if self.failure.is_none()
                        && snapshot.as_ref().is_ok_and(|answers| *answers == self.messages)
                    {
                        continue;
                    }
                    self.apply(snapshot);
                    return Some(self.render());
                }
            }
        }
    }

    /// Re-subscribe to the answers when the active chat changed
    async fn follow_active_chat(&mut self) {
        let chat_id = self
            .chat_rx
            .borrow_and_update()
            .as_ref()
            .map(|active| active.chat.id);
        if chat_id == self.answers_of {
            return;
        }

        self.answers_of = chat_id;
        self.messages.clear();
        self.failure = None;
        self.answers = chat_id.map(|id| self.store.watch_answers(id));
        if self.answers.is_some() {
            let first = next_snapshot(&mut self.answers).await;
            self.apply(first);
        }
    }

    fn apply(&mut self, snapshot: Result<Vec<AiAnswer>>) {
        match snapshot {
            Ok(answers) => {
                self.messages = answers;
                self.failure = None;
            }
            Err(e) => {
                tracing::warn!("Failed to read chat messages: {}", e);
                self.failure = Some(e.user_message());
            }
        }
    }

    fn render(&self) -> ChatUiState {
        if let Some(message) = &self.failure {
            return ChatUiState::Error(message.clone());
        }
        let title = self
            .chat_rx
            .borrow()
            .as_ref()
            .map(|active| active.chat.title.clone())
            .unwrap_or_default();
        let status = self.status_rx.borrow().clone();
        ChatUiState::Success {
            title,
            messages: self.messages.clone(),
            is_processing: status.is_processing,
            error: status.error,
        }
    }
}

/// Next snapshot of the answer stream; pending while there is none
async fn next_snapshot(answers: &mut Option<AnswerStream>) -> Result<Vec<AiAnswer>> {
    if let Some(stream) = answers.as_mut() {
        if let Some(snapshot) = stream.next().await {
            return snapshot;
        }
        *answers = None;
    }
    std::future::pending().await
}
