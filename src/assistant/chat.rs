use futures::stream::BoxStream;
use uuid::Uuid;

use super::{ActiveChat, AiAssistant, AskOutcome, ChatStatus, ExchangeStep, TitleOutcome};
use crate::error::{PlitsoError, Result};
use crate::generative::{ChatSession, ChatTurn};
use crate::models::{ChatHistory, Role};
use crate::prompts::{clean_title, title_prompt};

impl AiAssistant {
    /// Attach to a fresh, unsaved conversation. Nothing is written until the
    /// first question.
    pub fn start_new_chat(&mut self) -> ChatHistory {
        let chat = ChatHistory::new();
        tracing::debug!("Started chat {}", chat.id);
        self.current.send_replace(Some(ActiveChat {
            chat: chat.clone(),
            persisted: false,
        }));
        self.status.send_replace(ChatStatus::default());
        chat
    }

    /// Attach to a stored conversation. Unknown ids leave the session as it is.
    pub async fn set_current_chat(&mut self, id: Uuid) -> bool {
        match self.store.get_chat(id).await {
            Ok(Some(chat)) => {
                self.current.send_replace(Some(ActiveChat {
                    chat,
                    persisted: true,
                }));
                self.status.send_replace(ChatStatus::default());
                true
            }
            Ok(None) => {
                tracing::warn!("set_current_chat: no chat with id {}", id);
                false
            }
            Err(e) => {
                tracing::warn!("set_current_chat: failed to load chat {}: {}", id, e);
                self.set_error(e.user_message());
                false
            }
        }
    }

    pub fn reset_chat(&mut self) {
        self.current.send_replace(None);
        self.status.send_replace(ChatStatus::default());
        self.new_message_id = None;
    }

    /// Id of the latest model answer, until acknowledged
    pub fn new_message_id(&self) -> Option<i64> {
        self.new_message_id
    }

    pub fn reset_message_id(&mut self) {
        self.new_message_id = None;
    }

    /// Stored conversations, newest first
    pub fn chat_histories(&self) -> BoxStream<'static, Result<Vec<ChatHistory>>> {
        self.store.watch_chats()
    }

    /// One user/model exchange on the active conversation.
    ///
    /// Every completed step stays persisted when a later one fails.
    pub async fn ask_question(&mut self, question: &str) -> AskOutcome {
        let Some(active) = self.current.borrow().clone() else {
            tracing::debug!("ask_question without an active chat, ignoring");
            return AskOutcome::NoActiveChat;
        };
        let chat_id = active.chat.id;

        self.status.send_modify(|status| status.is_processing = true);

        let history = if active.persisted {
            match self.store.get_answers(chat_id).await {
                Ok(answers) => answers.iter().map(ChatTurn::from).collect(),
                Err(e) => return self.fail(ExchangeStep::LoadHistory, None, e),
            }
        } else {
            if let Err(e) = self.store.insert_chat(&active.chat).await {
                return self.fail(ExchangeStep::PersistChat, None, e);
            }
            self.current.send_modify(|current| {
                if let Some(current) = current.as_mut().filter(|c| c.chat.id == chat_id) {
                    current.persisted = true;
                }
            });
            tracing::info!("Persisted chat {}", chat_id);
            Vec::new()
        };

        let question_id = match self.store.insert_answer(chat_id, Role::User, question).await {
            Ok(id) => id,
            Err(e) => return self.fail(ExchangeStep::AppendQuestion, None, e),
        };

        let title = if active.chat.title.is_empty() {
            self.generate_title(&active.chat, question).await
        } else {
            TitleOutcome::Kept
        };

        let mut session = ChatSession::start(self.model.clone(), history);
        let reply = match session.send_message(question).await {
            Ok(reply) => reply,
            Err(e) => return self.fail(ExchangeStep::ModelReply, Some(question_id), e),
        };

        let answer_id = match self.store.insert_answer(chat_id, Role::Model, &reply).await {
            Ok(id) => id,
            Err(e) => return self.fail(ExchangeStep::AppendReply, Some(question_id), e),
        };

        self.new_message_id = Some(answer_id);
        self.status.send_replace(ChatStatus::default());

        AskOutcome::Completed {
            question_id,
            answer_id,
            title,
        }
    }

    async fn generate_title(&mut self, chat: &ChatHistory, question: &str) -> TitleOutcome {
        let title = match self.model.generate_content(&title_prompt(question)).await {
            Ok(raw) => clean_title(&raw),
            Err(e) => {
                tracing::warn!("Title generation failed for chat {}: {}", chat.id, e);
                return TitleOutcome::Failed(e.user_message());
            }
        };
        if title.is_empty() {
            tracing::warn!("Model returned a blank title for chat {}", chat.id);
            return TitleOutcome::Failed("Blank title".to_string());
        }

        let updated = ChatHistory {
            title: title.clone(),
            ..chat.clone()
        };
        if let Err(e) = self.store.update_chat(&updated).await {
            tracing::warn!("Failed to store title for chat {}: {}", chat.id, e);
            return TitleOutcome::Failed(e.user_message());
        }
        self.current.send_modify(|current| {
            if let Some(current) = current.as_mut().filter(|c| c.chat.id == chat.id) {
                current.chat.title = title.clone();
            }
        });
        TitleOutcome::Generated(title)
    }

    fn fail(&self, step: ExchangeStep, question_id: Option<i64>, err: PlitsoError) -> AskOutcome {
        tracing::error!("ask_question failed at {:?}: {}", step, err);
        let message = err.user_message();
        self.set_error(message.clone());
        AskOutcome::Failed {
            step,
            question_id,
            message,
        }
    }

    /// Delete a conversation with its answers. Leaves the session if it was
    /// the active one.
    pub async fn delete_chat(&mut self, id: Uuid) {
        if let Err(e) = self.store.delete_chat(id).await {
            tracing::error!("Failed to delete chat {}: {}", id, e);
            self.set_error(e.user_message());
            return;
        }
        tracing::info!("Deleted chat {}", id);
        if self.current_chat_id() == Some(id) {
            self.reset_chat();
        }
    }
}
