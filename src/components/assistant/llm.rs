use crate::error::{BotResult, Error};
use async_trait::async_trait;
use rig::completion::{Chat, Message};
use rig::providers::gemini::Client as GeminiClient;
use tracing::{debug, info};

/// Hosted text model used to read user requests
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion with `preamble` as system instructions.
    ///
    /// Rate limiting must come back as [`Error::QuotaExceeded`].
    async fn complete(&self, preamble: &str, prompt: &str) -> BotResult<String>;
}

/// Google Gemini through rig
pub struct GeminiModel {
    client: GeminiClient,
    model: String,
}

impl GeminiModel {
    /// Create a client for the given API key and model name
    pub fn new(api_key: &str, model: &str) -> Self {
        info!("Using Gemini model: {}", model);
        Self {
            client: GeminiClient::new(api_key),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn complete(&self, preamble: &str, prompt: &str) -> BotResult<String> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(preamble)
            .temperature(0.2)
            .build();

        let response = agent
            .chat(prompt.to_string(), Vec::<Message>::new())
            .await
            .map_err(|e| classify_model_error(&e.to_string()))?;

        debug!("Received {} bytes from Gemini", response.len());
        Ok(response)
    }
}

/// Sort a provider error message into quota or general failure
pub fn classify_model_error(message: &str) -> Error {
    let lower = message.to_lowercase();
    let rate_limited = ["429", "resource_exhausted", "quota", "rate limit"]
        .iter()
        .any(|marker| lower.contains(marker));

    if rate_limited {
        Error::QuotaExceeded(message.to_string())
    } else {
        Error::ModelUnavailable(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_model_error() {
        assert!(matches!(
            classify_model_error("CompletionError: ProviderError: 429 Too Many Requests"),
            Error::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_model_error("{\"error\":{\"status\":\"RESOURCE_EXHAUSTED\"}}"),
            Error::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_model_error("You exceeded your current quota"),
            Error::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_model_error("HttpError: connection refused"),
            Error::ModelUnavailable(_)
        ));
    }
}
