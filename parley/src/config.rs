use std::env;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("${0} not set")]
    Missing(&'static str),

    #[error("${name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: String,
}

/// Everything the retriever needs; only present when search is fully configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub search: SearchConfig,
    pub index_name: String,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub inference: InferenceConfig,
    pub chat_model: String,
    pub embedding: Option<EmbeddingConfig>,
    pub search: Option<SearchConfig>,
    pub index_name: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let dimensions = optional("AZURE_AI_EMBED_DIMENSIONS")
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or(ConfigError::Invalid {
                        name: "AZURE_AI_EMBED_DIMENSIONS",
                        expected: "a positive integer",
                        value,
                    })
            })
            .transpose()?;

        let search = optional("AZURE_AI_SEARCH_ENDPOINT")
            .map(|endpoint| {
                Ok::<_, ConfigError>(SearchConfig {
                    endpoint,
                    api_key: required("AZURE_AI_SEARCH_API_KEY")?,
                })
            })
            .transpose()?;

        Ok(Self {
            inference: InferenceConfig {
                endpoint: required("AZURE_AI_INFERENCE_ENDPOINT")?,
                api_key: required("AZURE_AI_INFERENCE_API_KEY")?,
            },
            chat_model: required("AZURE_AI_CHAT_DEPLOYMENT_NAME")?,
            embedding: optional("AZURE_AI_EMBED_DEPLOYMENT_NAME")
                .map(|model| EmbeddingConfig { model, dimensions }),
            index_name: optional("AZURE_AI_SEARCH_INDEX_NAME"),
            search,
        })
    }

    /// Returns the retrieval settings when search endpoint, index and embedding model are all set.
    #[must_use]
    pub fn retrieval(&self) -> Option<RetrievalConfig> {
        Some(RetrievalConfig {
            search: self.search.clone()?,
            index_name: self.index_name.clone()?,
            embedding: self.embedding.clone()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_macro::map;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        map! {
            "AZURE_AI_INFERENCE_ENDPOINT" => "https://project.services.ai.azure.com/models",
            "AZURE_AI_INFERENCE_API_KEY" => "inference-key",
            "AZURE_AI_CHAT_DEPLOYMENT_NAME" => "gpt-4o-mini"
        }
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| vars.get(key).map(ToString::to_string))
    }

    #[test]
    fn loads_minimal_config_without_retrieval() {
        let config = load(&base()).unwrap();

        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.retrieval(), None);
    }

    #[test]
    fn names_missing_variable() {
        let mut vars = base();
        vars.remove("AZURE_AI_CHAT_DEPLOYMENT_NAME");

        assert_eq!(
            load(&vars).unwrap_err().to_string(),
            "$AZURE_AI_CHAT_DEPLOYMENT_NAME not set"
        );
    }

    #[test]
    fn empty_values_count_as_unset() {
        let mut vars = base();
        vars.insert("AZURE_AI_INFERENCE_API_KEY", "");

        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("AZURE_AI_INFERENCE_API_KEY")
        );
    }

    #[test]
    fn enables_retrieval_when_fully_configured() {
        let mut vars = base();
        vars.extend(map! {
            "AZURE_AI_SEARCH_ENDPOINT" => "https://search.search.windows.net",
            "AZURE_AI_SEARCH_API_KEY" => "search-key",
            "AZURE_AI_SEARCH_INDEX_NAME" => "products",
            "AZURE_AI_EMBED_DEPLOYMENT_NAME" => "text-embedding-3-small",
            "AZURE_AI_EMBED_DIMENSIONS" => "100"
        });

        let retrieval = load(&vars).unwrap().retrieval().unwrap();

        assert_eq!(retrieval.index_name, "products");
        assert_eq!(retrieval.embedding.dimensions, Some(100));
        assert_eq!(retrieval.search.api_key, "search-key");
    }

    #[test]
    fn disables_retrieval_without_embedding_model() {
        let mut vars = base();
        vars.extend(map! {
            "AZURE_AI_SEARCH_ENDPOINT" => "https://search.search.windows.net",
            "AZURE_AI_SEARCH_API_KEY" => "search-key",
            "AZURE_AI_SEARCH_INDEX_NAME" => "products"
        });

        assert_eq!(load(&vars).unwrap().retrieval(), None);
    }

    #[test]
    fn search_endpoint_requires_key() {
        let mut vars = base();
        vars.insert("AZURE_AI_SEARCH_ENDPOINT", "https://search.search.windows.net");

        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("AZURE_AI_SEARCH_API_KEY")
        );
    }

    #[test]
    fn rejects_invalid_dimensions() {
        let mut vars = base();
        vars.insert("AZURE_AI_EMBED_DIMENSIONS", "many");

        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { name: "AZURE_AI_EMBED_DIMENSIONS", .. }
        ));
    }
}
