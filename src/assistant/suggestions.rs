use tokio::sync::watch;

use super::AiAssistant;
use crate::models::{GenerativeParameters, GenerativeState};
use crate::prompts::suggestion_prompt;

impl AiAssistant {
    pub fn parameters(&self) -> &GenerativeParameters {
        &self.parameters
    }

    pub fn on_meal_type_change(&mut self, meal_type: impl Into<String>) {
        self.parameters.meal_type = meal_type.into();
    }

    pub fn on_cuisine_change(&mut self, cuisine: impl Into<String>) {
        self.parameters.cuisine = cuisine.into();
    }

    pub fn on_mood_change(&mut self, mood: impl Into<String>) {
        self.parameters.mood = mood.into();
    }

    pub fn on_dietary_change(&mut self, dietary: impl Into<String>) {
        self.parameters.dietary = dietary.into();
    }

    pub fn on_quick_change(&mut self, is_quick: bool) {
        self.parameters.is_quick = is_quick;
    }

    pub fn generative_state(&self) -> GenerativeState {
        self.generative.borrow().clone()
    }

    pub fn watch_generative_state(&self) -> watch::Receiver<GenerativeState> {
        self.generative.subscribe()
    }

    /// Ask the model for a meal that fits the current parameters.
    ///
    /// Missing required parameters set an error without calling the model.
    /// `on_success` runs once the answer is in the state.
    pub async fn generate_suggestions(&mut self, on_success: impl FnOnce() + Send) {
        if let Err(e) = self.parameters.validate() {
            tracing::debug!("generate_suggestions rejected: {}", e);
            self.generative.send_modify(|state| {
                state.is_loading = false;
                state.error_message = e.user_message();
            });
            return;
        }

        self.generative.send_modify(|state| {
            state.is_loading = true;
            state.error_message.clear();
        });

        let prompt = suggestion_prompt(
            &self.context.recipes,
            &self.context.past_meals,
            &self.parameters,
        );

        match self.model.generate_content(&prompt).await {
            Ok(answer) => {
                tracing::info!(
                    "Generated suggestion for {} / {} ({} chars)",
                    self.parameters.meal_type,
                    self.parameters.cuisine,
                    answer.len()
                );
                self.generative.send_replace(GenerativeState {
                    is_loading: false,
                    error_message: String::new(),
                    generative_answer: answer,
                });
                on_success();
            }
            Err(e) => {
                tracing::warn!("Suggestion request failed: {}", e);
                self.generative.send_modify(|state| {
                    state.is_loading = false;
                    state.error_message = e.user_message();
                });
            }
        }
    }
}
