//! Client configuration types.

/// Configuration of a [`crate::Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Maximum number of cached responses; zero means unbounded.
    pub max_cache: usize,
    /// Whether the environment supports response caching.
    pub cache_supported: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_cache: 0,
            cache_supported: true,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    max_cache: Option<usize>,
    cache_supported: Option<bool>,
}

impl ClientConfigBuilder {
    /// Set the cache capacity; zero means unbounded.
    #[must_use]
    pub const fn max_cache(mut self, max_cache: usize) -> Self {
        self.max_cache = Some(max_cache);
        self
    }

    /// Set whether response caching is supported.
    #[must_use]
    pub const fn cache_supported(mut self, supported: bool) -> Self {
        self.cache_supported = Some(supported);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            max_cache: self.max_cache.unwrap_or(defaults.max_cache),
            cache_supported: self.cache_supported.unwrap_or(defaults.cache_supported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.max_cache, 0);
        assert!(config.cache_supported);
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::builder()
            .max_cache(10)
            .cache_supported(false)
            .build();

        assert_eq!(config.max_cache, 10);
        assert!(!config.cache_supported);
    }
}
