use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::config::GenerativeConfig;
use crate::error::{PlitsoError, Result};
use crate::models::{AiAnswer, Role};

/// One prior turn handed to the model as conversation context
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl From<&AiAnswer> for ChatTurn {
    fn from(answer: &AiAnswer) -> Self {
        Self {
            role: answer.role,
            text: answer.content.clone(),
        }
    }
}

/// Hosted text generation
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Single-shot generation from a prompt
    async fn generate_content(&self, prompt: &str) -> Result<String>;

    /// Continue a conversation: `history` in order, then `message` as the new user turn
    async fn continue_chat(&self, history: &[ChatTurn], message: &str) -> Result<String>;
}

/// A conversation with the model that remembers what has been said
pub struct ChatSession {
    model: Arc<dyn GenerativeModel>,
    history: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn start(model: Arc<dyn GenerativeModel>, history: Vec<ChatTurn>) -> Self {
        Self { model, history }
    }

    pub async fn send_message(&mut self, text: &str) -> Result<String> {
        let reply = self.model.continue_chat(&self.history, text).await?;
        self.history.push(ChatTurn {
            role: Role::User,
            text: text.to_string(),
        });
        self.history.push(ChatTurn {
            role: Role::Model,
            text: reply.clone(),
        });
        Ok(reply)
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }
}

/// Chat-completions client for any OpenAI-compatible endpoint; Gemini by default
pub struct OpenAiCompatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiCompatModel {
    pub fn new(cfg: &GenerativeConfig) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(cfg.base_url.clone())
            .with_api_key(cfg.api_key.clone());
        Self {
            client: Client::with_config(config),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        }
    }

    fn to_message(turn: &ChatTurn) -> Result<ChatCompletionRequestMessage> {
        let message = match turn.role {
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.text.as_str())
                .build()?
                .into(),
            Role::Model => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.text.as_str())
                .build()?
                .into(),
        };
        Ok(message)
    }

    async fn complete(&self, messages: Vec<ChatCompletionRequestMessage>) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .temperature(self.temperature)
            .messages(messages)
            .build()?;

        let response = self.client.chat().create(request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(PlitsoError::Generative(
                "Model returned an empty response".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl GenerativeModel for OpenAiCompatModel {
    async fn generate_content(&self, prompt: &str) -> Result<String> {
        tracing::debug!("generate_content with {} ({} chars)", self.model, prompt.len());
        let message = Self::to_message(&ChatTurn {
            role: Role::User,
            text: prompt.to_string(),
        })?;
        self.complete(vec![message]).await
    }

    async fn continue_chat(&self, history: &[ChatTurn], message: &str) -> Result<String> {
        tracing::debug!(
            "continue_chat with {} ({} prior turns)",
            self.model,
            history.len()
        );
        let mut messages = history
            .iter()
            .map(Self::to_message)
            .collect::<Result<Vec<_>>>()?;
        messages.push(Self::to_message(&ChatTurn {
            role: Role::User,
            text: message.to_string(),
        })?);
        self.complete(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_keeps_history_on_success() {
        let mut mock = MockGenerativeModel::new();
        mock.expect_continue_chat()
            .times(2)
            .returning(|history, message| Ok(format!("{}:{}", history.len(), message)));

        let mut session = ChatSession::start(Arc::new(mock), Vec::new());
        assert_eq!(session.send_message("hi").await.unwrap(), "0:hi");
        assert_eq!(session.send_message("again").await.unwrap(), "2:again");

        let roles: Vec<Role> = session.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User, Role::Model]);
    }

    #[tokio::test]
    async fn test_session_history_unchanged_on_failure() {
        let mut mock = MockGenerativeModel::new();
        mock.expect_continue_chat()
            .returning(|_, _| Err(PlitsoError::Generative("quota exceeded".to_string())));

        let prior = vec![ChatTurn {
            role: Role::User,
            text: "earlier".to_string(),
        }];
        let mut session = ChatSession::start(Arc::new(mock), prior.clone());
        assert!(session.send_message("hello").await.is_err());
        assert_eq!(session.history(), prior.as_slice());
    }

    #[test]
    fn test_model_role_maps_to_assistant_message() {
        let turn = ChatTurn {
            role: Role::Model,
            text: "Try a risotto".to_string(),
        };
        let message = OpenAiCompatModel::to_message(&turn).unwrap();
        assert!(matches!(message, ChatCompletionRequestMessage::Assistant(_)));
    }
}
