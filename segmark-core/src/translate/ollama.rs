use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Translator;

const DEFAULT_OLLAMA_HOST: &str = "http://ollama:11434";
const DEFAULT_MODEL: &str = "gpt-oss";
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    /// Timeout of a single chat request
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_owned()),
            model: DEFAULT_MODEL.to_owned(),
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelTags {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullStatus {
    status: Option<String>,
}

pub(crate) fn translation_prompt(text: &str, target_language: &str) -> String {
    format!(
        "You are a professional translator. Translate the following text to {target_language}.\n\n\
         Output ONLY the {target_language} translation, never the source text.\n\n\
         Guidelines:\n\
         1. Translate all the text, do not omit any part of it.\n\
         2. Preserve the tone and style of the original text.\n\
         3. Do not change, remove or add markdown symbols (*, _, #, [ ], ( ), -, backticks) or html tags. Only translate the visible text.\n\
         4. Do not translate person names, URLs, email addresses or code snippets.\n\
         5. Tags such as [DOCREF0], [LINK0], [BI0], [B0] and [IT0] must be kept exactly as they are and in the same positions. Translate the text between them.\n\
         6. If a word is split with a hyphen (e.g. \"sec- onds\"), join it and translate it as one word.\n\
         7. Do not add comments, notes or explanations.\n\n\
         Text to translate:\n\n```\n{text}\n```\n"
    )
}

/// Model names the ollama tags endpoint may list for `model`.
fn model_variants(model: &str) -> [String; 3] {
    [
        model.to_owned(),
        format!("{model}:latest"),
        model.split(':').next().unwrap_or(model).to_owned(),
    ]
}

fn clean_response(content: &str) -> String {
    content.replace("```", "").trim().to_owned()
}

/// Translator backed by an ollama server chat endpoint.
pub struct OllamaTranslator {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

impl OllamaTranslator {
    pub fn new(config: &OllamaConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("can't build ollama http client")?;
        Ok(Self {
            client,
            api_url: format!("{}/api", config.host.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn tags(&self) -> anyhow::Result<ModelTags> {
        let tags = self
            .client
            .get(format!("{}/tags", self.api_url))
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tags)
    }

    pub async fn is_available(&self) -> bool {
        match self.tags().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("ollama availability check failed: {e:#}");
                false
            }
        }
    }

    async fn has_model(&self) -> anyhow::Result<bool> {
        let tags = self.tags().await?;
        let variants = model_variants(&self.model);
        Ok(tags.models.iter().any(|m| variants.contains(&m.name)))
    }

    async fn pull_model(&self) -> anyhow::Result<()> {
        let body = self
            .client
            .post(format!("{}/pull", self.api_url))
            .json(&serde_json::json!({ "name": self.model }))
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("can't start download of model {}", self.model))?
            .text()
            .await?;
        for status in body
            .lines()
            .filter_map(|line| serde_json::from_str::<PullStatus>(line).ok())
            .filter_map(|s| s.status)
        {
            tracing::debug!("model download: {status}");
        }
        tracing::info!("model {} downloaded", self.model);
        Ok(())
    }

    pub async fn ensure_model_available(&self) -> anyhow::Result<()> {
        if self.has_model().await? {
            tracing::info!("model {} is available", self.model);
            return Ok(());
        }
        tracing::info!("model {} not found, downloading", self.model);
        self.pull_model().await
    }

    /// Checks the server answers and the configured model is present, pulling it if needed.
    pub async fn ensure_service_ready(&self) -> anyhow::Result<()> {
        if !self.is_available().await {
            anyhow::bail!("ollama service at {} is not available", self.api_url);
        }
        self.ensure_model_available().await
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> anyhow::Result<String> {
        let prompt = translation_prompt(text, target_language);
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
            stream: false,
        };
        let response: ChatResponse = self
            .client
            .post(format!("{}/chat", self.api_url))
            .json(&request)
            .send()
            .await
            .context("chat request failed")?
            .error_for_status()?
            .json()
            .await
            .context("invalid chat response")?;
        Ok(clean_response(&response.message.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_variants() {
        assert_eq!(
            model_variants("llama3:8b"),
            ["llama3:8b".to_owned(), "llama3:8b:latest".to_owned(), "llama3".to_owned()]
        );
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(clean_response("```\nBonjour [B0]monde[B0]\n```\n"), "Bonjour [B0]monde[B0]");
    }

    #[test]
    fn test_prompt_mentions_language_and_text() {
        let prompt = translation_prompt("[IT0]hello[IT0]", "Spanish");
        assert!(prompt.contains("to Spanish"));
        assert!(prompt.contains("```\n[IT0]hello[IT0]\n```"));
    }

    #[test]
    fn test_chat_request_body() -> anyhow::Result<()> {
        let request = ChatRequest {
            model: "gpt-oss",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            stream: false,
        };
        assert_eq!(
            serde_json::to_value(&request)?,
            serde_json::json!({
                "model": "gpt-oss",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
        Ok(())
    }

    #[test]
    fn test_api_url() -> anyhow::Result<()> {
        let translator = OllamaTranslator::new(&OllamaConfig {
            host: "http://localhost:11434/".to_owned(),
            ..OllamaConfig::default()
        })?;
        assert_eq!(translator.api_url, "http://localhost:11434/api");
        Ok(())
    }
}
