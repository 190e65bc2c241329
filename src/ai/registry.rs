use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;

use super::anthropic::AnthropicProvider;
use super::openai::OpenAiProvider;
use super::provider::AiProvider;
use crate::config::AiConfig;
use crate::error::{AppError, Result};

type ProviderFactory = Box<dyn Fn(&AiConfig, Client) -> Arc<dyn AiProvider> + Send + Sync>;

/// Maps provider identifiers to constructors.
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("openai", |config, client| {
            Arc::new(OpenAiProvider::new(config, client))
        });
        registry.register("anthropic", |config, client| {
            Arc::new(AnthropicProvider::new(config, client))
        });
        registry.register("claude", |config, client| {
            Arc::new(AnthropicProvider::new(config, client))
        });
        registry
    }

    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(&AiConfig, Client) -> Arc<dyn AiProvider> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_lowercase(), Box::new(factory));
    }

    pub fn resolve(&self, config: &AiConfig, client: Client) -> Result<Arc<dyn AiProvider>> {
        let id = config.provider.trim().to_lowercase();
        let factory = self.factories.get(&id).ok_or_else(|| {
            AppError::Config(format!(
                "unsupported AI provider '{}' (available: {})",
                config.provider,
                self.providers().join(", ")
            ))
        })?;
        Ok(factory(config, client))
    }

    /// Registered identifiers, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> AiConfig {
        AiConfig {
            provider: provider.to_string(),
            api_key: "sk-test".to_string(),
            ..AiConfig::default()
        }
    }

    #[test]
    fn test_resolve_builtin() {
        let registry = ProviderRegistry::with_builtin();
        let provider = registry.resolve(&config("OpenAI"), Client::new()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-3.5-turbo");

        let provider = registry.resolve(&config("claude"), Client::new()).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry = ProviderRegistry::with_builtin();
        let err = registry.resolve(&config("gemini"), Client::new()).err().unwrap();
        match err {
            AppError::Config(msg) => {
                assert!(msg.contains("gemini"));
                assert!(msg.contains("anthropic, claude, openai"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_register_overrides() {
        let mut registry = ProviderRegistry::empty();
        assert!(registry.providers().is_empty());
        registry.register("local", |config, client| {
            Arc::new(OpenAiProvider::new(config, client))
        });
        assert_eq!(registry.providers(), vec!["local"]);
        assert!(registry.resolve(&config("local"), Client::new()).is_ok());
    }
}
