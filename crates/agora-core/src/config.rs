//! Explicit configuration for the explore engine.
//!
//! Everything the engine needs from the process environment is read once at
//! startup into these structs and passed in at construction time.

use std::env;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Highest page number accepted (bounds `take`).
pub const DEFAULT_MAX_PAGE: u32 = 100;

/// Time zone anchoring week/month windows.
pub const DEFAULT_TIME_ZONE: &str = "Europe/Berlin";

/// Language used for label lookups when the request names none.
pub const DEFAULT_LANGUAGE: &str = "de";

/// Maximum number of whitespace-separated search tokens.
pub const DEFAULT_MAX_SEARCH_TOKENS: usize = 10;

pub const DEFAULT_IMAGE_PROXY_URL: &str = "http://localhost:8081";

pub const DEFAULT_IMAGE_STORAGE_URL: &str = "http://localhost:9000/images";

// =============================================================================
// FEATURE FLAGS
// =============================================================================

/// Runtime switches for optional explore features.
///
/// All features are enabled by default and can be disabled through the
/// environment for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploreFeatureFlags {
    /// Expose the fundings collection.
    pub fundings: bool,
    /// Add locale-aware exact facet matches to free-text search.
    pub label_lookup: bool,
    /// Compute per-facet counts.
    pub filter_vectors: bool,
}

impl Default for ExploreFeatureFlags {
    fn default() -> Self {
        Self {
            fundings: true,
            label_lookup: true,
            filter_vectors: true,
        }
    }
}

impl ExploreFeatureFlags {
    /// Constructs flags from environment variables.
    ///
    /// - `EXPLORE_FUNDINGS` (default: true)
    /// - `EXPLORE_LABEL_LOOKUP` (default: true)
    /// - `EXPLORE_FILTER_VECTORS` (default: true)
    ///
    /// "true", "1", "yes", "on" (case-insensitive) are truthy; "false", "0",
    /// "no", "off" are falsy; anything else keeps the default.
    pub fn from_env() -> Self {
        Self {
            fundings: parse_bool_env("EXPLORE_FUNDINGS", true),
            label_lookup: parse_bool_env("EXPLORE_LABEL_LOOKUP", true),
            filter_vectors: parse_bool_env("EXPLORE_FILTER_VECTORS", true),
        }
    }
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|val| match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(val) => match val.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %val, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

// =============================================================================
// IMAGE PROXY
// =============================================================================

/// Image proxy endpoint and optional URL signing secrets (hex-encoded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProxyConfig {
    /// Base URL of the resizing proxy.
    pub proxy_url: String,
    /// Base URL that storage paths are resolved against.
    pub storage_url: String,
    pub key: Option<String>,
    pub salt: Option<String>,
}

impl Default for ImageProxyConfig {
    fn default() -> Self {
        Self {
            proxy_url: DEFAULT_IMAGE_PROXY_URL.to_string(),
            storage_url: DEFAULT_IMAGE_STORAGE_URL.to_string(),
            key: None,
            salt: None,
        }
    }
}

impl ImageProxyConfig {
    /// Reads `IMAGE_PROXY_URL`, `IMAGE_STORAGE_URL`, `IMAGE_PROXY_KEY`,
    /// `IMAGE_PROXY_SALT`.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            proxy_url: non_empty("IMAGE_PROXY_URL")
                .unwrap_or_else(|| DEFAULT_IMAGE_PROXY_URL.to_string()),
            storage_url: non_empty("IMAGE_STORAGE_URL")
                .unwrap_or_else(|| DEFAULT_IMAGE_STORAGE_URL.to_string()),
            key: non_empty("IMAGE_PROXY_KEY"),
            salt: non_empty("IMAGE_PROXY_SALT"),
        }
    }

    /// Whether URLs are signed. Both key and salt must be present.
    pub fn is_signed(&self) -> bool {
        self.key.is_some() && self.salt.is_some()
    }
}

// =============================================================================
// EXPLORE CONFIG
// =============================================================================

/// Configuration of the explore engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ExploreConfig {
    pub page_size: u32,
    pub max_page: u32,
    pub time_zone: Tz,
    pub default_language: String,
    pub max_search_tokens: usize,
    pub images: ImageProxyConfig,
    pub flags: ExploreFeatureFlags,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_page: DEFAULT_MAX_PAGE,
            time_zone: chrono_tz::Europe::Berlin,
            default_language: DEFAULT_LANGUAGE.to_string(),
            max_search_tokens: DEFAULT_MAX_SEARCH_TOKENS,
            images: ImageProxyConfig::default(),
            flags: ExploreFeatureFlags::default(),
        }
    }
}

impl ExploreConfig {
    /// Build configuration from the environment.
    ///
    /// Malformed numbers fall back to defaults with a warning; an unknown
    /// time zone is a configuration error.
    pub fn from_env() -> Result<Self> {
        let time_zone = match env::var("EXPLORE_TIME_ZONE") {
            Ok(name) if !name.trim().is_empty() => parse_time_zone(name.trim())?,
            _ => parse_time_zone(DEFAULT_TIME_ZONE)?,
        };

        let config = Self {
            page_size: parse_env("EXPLORE_PAGE_SIZE", DEFAULT_PAGE_SIZE).max(1),
            max_page: parse_env("EXPLORE_MAX_PAGE", DEFAULT_MAX_PAGE).max(1),
            time_zone,
            default_language: env::var("EXPLORE_DEFAULT_LANGUAGE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            max_search_tokens: parse_env("EXPLORE_MAX_SEARCH_TOKENS", DEFAULT_MAX_SEARCH_TOKENS)
                .max(1),
            images: ImageProxyConfig::from_env(),
            flags: ExploreFeatureFlags::from_env(),
        };

        tracing::debug!(
            page_size = config.page_size,
            max_page = config.max_page,
            time_zone = config.time_zone.name(),
            default_language = %config.default_language,
            signed_images = config.images.is_signed(),
            "Explore configuration loaded"
        );

        Ok(config)
    }
}

pub fn parse_time_zone(name: &str) -> Result<Tz> {
    Tz::from_str(name).map_err(|_| Error::Config(format!("Unknown time zone: {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global, so these tests must not run
    // in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "EXPLORE_PAGE_SIZE",
        "EXPLORE_MAX_PAGE",
        "EXPLORE_TIME_ZONE",
        "EXPLORE_DEFAULT_LANGUAGE",
        "EXPLORE_MAX_SEARCH_TOKENS",
        "EXPLORE_FUNDINGS",
        "EXPLORE_LABEL_LOOKUP",
        "EXPLORE_FILTER_VECTORS",
        "IMAGE_PROXY_URL",
        "IMAGE_STORAGE_URL",
        "IMAGE_PROXY_KEY",
        "IMAGE_PROXY_SALT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults_without_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = ExploreConfig::from_env().unwrap();
        assert_eq!(config, ExploreConfig::default());
        assert!(!config.images.is_signed());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("EXPLORE_PAGE_SIZE", "24");
        env::set_var("EXPLORE_TIME_ZONE", "America/New_York");
        env::set_var("EXPLORE_DEFAULT_LANGUAGE", "en");
        env::set_var("EXPLORE_FUNDINGS", "off");
        env::set_var("IMAGE_PROXY_KEY", "abcd");
        env::set_var("IMAGE_PROXY_SALT", "ef01");

        let config = ExploreConfig::from_env().unwrap();
        assert_eq!(config.page_size, 24);
        assert_eq!(config.time_zone, chrono_tz::America::New_York);
        assert_eq!(config.default_language, "en");
        assert!(!config.flags.fundings);
        assert!(config.flags.label_lookup);
        assert!(config.images.is_signed());

        clear_env();
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("EXPLORE_PAGE_SIZE", "lots");
        env::set_var("EXPLORE_MAX_PAGE", "0");

        let config = ExploreConfig::from_env().unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_page, 1);

        clear_env();
    }

    #[test]
    fn test_unknown_time_zone_is_config_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("EXPLORE_TIME_ZONE", "Mars/Olympus_Mons");

        let err = ExploreConfig::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        clear_env();
    }

    #[test]
    fn test_invalid_bool_keeps_default() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("EXPLORE_FILTER_VECTORS", "maybe");

        assert!(ExploreFeatureFlags::from_env().filter_vectors);

        clear_env();
    }
}
