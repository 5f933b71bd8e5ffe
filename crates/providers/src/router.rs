//! Provider selection from the `[generation]` config table.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tutorstitch_config::GenerationConfig;
use tutorstitch_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the configured provider, or `None` when generation is disabled
/// or the provider cannot be resolved.
pub fn build_from_config(config: &GenerationConfig) -> Option<Arc<dyn Provider>> {
    if !config.enabled {
        return None;
    }

    let base_url = match (&config.api_url, default_base_url(&config.provider)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            warn!(
                provider = %config.provider,
                "No api_url configured for provider, generation disabled"
            );
            return None;
        }
    };

    let api_key = match (config.api_key.clone(), config.provider.as_str()) {
        (Some(key), _) => key,
        // Ollama doesn't need a real key
        (None, "ollama") => "ollama".to_string(),
        (None, _) => {
            warn!(provider = %config.provider, "No API key configured");
            String::new()
        }
    };

    info!(provider = %config.provider, url = %base_url, model = %config.model, "Generation provider ready");

    Some(Arc::new(OpenAiCompatProvider::with_timeout(
        config.provider.clone(),
        base_url,
        api_key,
        Duration::from_secs(config.timeout_secs),
    )))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        _ => None,
    }
}
