use async_trait::async_trait;

use super::client::MessageSender;
use super::error::AnthropicError;
use super::types::{Message, MessagesRequest};
use crate::provider::{ExtractedPair, ExtractionProvider, parse_pair_response};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// [`ExtractionProvider`] backed by the Messages API.
pub struct AnthropicExtractor<S> {
    sender: S,
    model: String,
}

impl<S: MessageSender> AnthropicExtractor<S> {
    pub fn new(sender: S, model: impl Into<String>) -> Self {
        Self {
            sender,
            model: model.into(),
        }
    }
}

#[async_trait]
impl<S: MessageSender> ExtractionProvider for AnthropicExtractor<S> {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn extract(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ExtractedPair, AnthropicError> {
        let req = MessagesRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(system_prompt.to_string()),
            temperature: Some(temperature),
            messages: vec![Message::user(user_prompt)],
        };

        let response = self.sender.send_message(&req).await?;
        let text = response.text();
        tracing::debug!(
            model = %self.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "extraction response received"
        );

        parse_pair_response(&text).map_err(AnthropicError::InvalidResponse)
    }
}
