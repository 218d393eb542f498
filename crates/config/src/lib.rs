use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "parley.toml",
    "config/parley.toml",
    "crates/config/parley.toml",
    "../parley.toml",
    "../config/parley.toml",
    "../crates/config/parley.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub chat: ChatConfig,
    pub services: ServicesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            chat: ChatConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://parley.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Tunables for the chat engine itself.
///
/// ```
/// use parley_config::ChatConfig;
///
/// let chat = ChatConfig::default();
/// assert_eq!(chat.typing_ttl_ms, 5_000);
/// assert!(chat.default_page_limit <= chat.max_page_limit);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// How long a typing indicator stays alive without a refresh.
    #[serde(default = "ChatConfig::default_typing_ttl")]
    pub typing_ttl_ms: u64,
    /// Page size used when a history fetch does not specify a limit.
    #[serde(default = "ChatConfig::default_page_limit")]
    pub default_page_limit: u32,
    /// Hard cap applied to client-supplied history limits.
    #[serde(default = "ChatConfig::default_max_page_limit")]
    pub max_page_limit: u32,
}

impl ChatConfig {
    const fn default_typing_ttl() -> u64 {
        5_000
    }

    const fn default_page_limit() -> u32 {
        50
    }

    const fn default_max_page_limit() -> u32 {
        100
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_ttl_ms: Self::default_typing_ttl(),
            default_page_limit: Self::default_page_limit(),
            max_page_limit: Self::default_max_page_limit(),
        }
    }
}

/// Endpoints for the external collaborators Parley consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub order_service_url: String,
    pub profile_service_url: String,
    pub auth_service_url: String,
    #[serde(default = "ServicesConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl ServicesConfig {
    const fn default_request_timeout() -> u64 {
        10
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            order_service_url: "http://127.0.0.1:7100".to_string(),
            profile_service_url: "http://127.0.0.1:7101".to_string(),
            auth_service_url: "http://127.0.0.1:7102".to_string(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use parley_config::load;
///
/// std::env::remove_var("PARLEY_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())
        .unwrap()
        .set_default("http.port", i64::from(defaults.http.port))
        .unwrap()
        .set_default("database.url", defaults.database.url.clone())
        .unwrap()
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )
        .unwrap()
        .set_default(
            "chat.typing_ttl_ms",
            i64::try_from(defaults.chat.typing_ttl_ms).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "chat.default_page_limit",
            i64::from(defaults.chat.default_page_limit),
        )
        .unwrap()
        .set_default(
            "chat.max_page_limit",
            i64::from(defaults.chat.max_page_limit),
        )
        .unwrap()
        .set_default(
            "services.order_service_url",
            defaults.services.order_service_url.clone(),
        )
        .unwrap()
        .set_default(
            "services.profile_service_url",
            defaults.services.profile_service_url.clone(),
        )
        .unwrap()
        .set_default(
            "services.auth_service_url",
            defaults.services.auth_service_url.clone(),
        )
        .unwrap()
        .set_default(
            "services.request_timeout_seconds",
            i64::try_from(defaults.services.request_timeout_seconds).unwrap_or(i64::MAX),
        )
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("PARLEY").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("PARLEY_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via PARLEY_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.chat.default_page_limit == 0 {
        anyhow::bail!("chat.default_page_limit must be at least 1");
    }

    if config.chat.max_page_limit < config.chat.default_page_limit {
        config.chat.max_page_limit = config.chat.default_page_limit;
    }

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
