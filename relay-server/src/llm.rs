use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionStreamResponse,
    },
    Client,
};
use futures_util::StreamExt;
use relay_shared::{ChatMessage, MessageRole};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::error::RelayError;

/// Client for the upstream completion provider. The model is fixed at
/// construction; callers supply messages only.
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl LlmService {
    pub fn new(config: &RelayConfig) -> Self {
        info!(model = %config.model, base_url = %config.base_url, "initializing upstream client");
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.base_url.trim_end_matches('/'));
        let client = Client::with_config(openai_config);
        Self {
            client,
            model: config.model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends the conversation and waits for the complete reply.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, RelayError> {
        let request = self.build_request(messages, false)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(upstream_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RelayError::Upstream("response contained no message content".to_string()))
    }

    /// Starts a streaming completion and returns the receiving end of the
    /// fragment sequence. The first upstream unit is awaited here so that
    /// an initiation failure surfaces as an error response rather than an
    /// already-committed stream.
    ///
    /// The channel is bounded: the next upstream unit is pulled only after
    /// the previous fragment has been handed off, so a long reply is never
    /// accumulated in memory. Fragments arrive in upstream order and the
    /// channel closes exactly once, when the upstream finishes or fails.
    pub async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<mpsc::Receiver<Result<String, RelayError>>, RelayError> {
        let request = self.build_request(messages, true)?;
        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(upstream_error)?;

        let (tx, rx) = mpsc::channel(1);

        match stream.next().await {
            Some(Err(e)) => return Err(upstream_error(e)),
            // Upstream accepted the request and ended with no units; the
            // dropped sender closes the outbound sequence immediately.
            None => {}
            Some(Ok(first)) => {
                tokio::spawn(async move {
                    let mut pending = Some(first);
                    while let Some(unit) = pending.take() {
                        if let Some(text) = delta_text(&unit) {
                            if tx.send(Ok(text)).await.is_err() {
                                // Client went away; stop pulling from upstream.
                                break;
                            }
                        }
                        match stream.next().await {
                            Some(Ok(next)) => pending = Some(next),
                            Some(Err(e)) => {
                                error!("upstream stream failed mid-response: {e}");
                                let _ = tx.send(Err(upstream_error(e))).await;
                                break;
                            }
                            None => break,
                        }
                    }
                });
            }
        }

        Ok(rx)
    }

    fn build_request(
        &self,
        messages: Vec<ChatMessage>,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, RelayError> {
        let messages = messages
            .into_iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RelayError::Internal(e.to_string()))?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .stream(stream)
            .build()
            .map_err(|e| RelayError::Internal(e.to_string()))
    }
}

/// The newly generated text in one streaming unit, if it carries any.
/// Role-only and empty deltas yield nothing and are skipped upstream of the
/// outbound sequence.
fn delta_text(unit: &CreateChatCompletionStreamResponse) -> Option<String> {
    let content = unit.choices.first()?.delta.content.as_deref()?;
    (!content.is_empty()).then(|| content.to_string())
}

fn to_request_message(message: ChatMessage) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let converted = match message.role {
        MessageRole::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(message.content)
                .build()?,
        ),
        MessageRole::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message.content)
                .build()?,
        ),
        MessageRole::Assistant => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content)
                .build()?,
        ),
    };
    Ok(converted)
}

fn upstream_error(err: OpenAIError) -> RelayError {
    match err {
        OpenAIError::ApiError(api) => RelayError::Upstream(format!(
            "{} (code: {:?}, type: {:?})",
            api.message, api.code, api.r#type
        )),
        other => RelayError::Upstream(other.to_string()),
    }
}
