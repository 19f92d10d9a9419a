use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything is optional in the file; missing sections take their defaults.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub rounds: RoundsConfig,
    #[serde(default = "Config::default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            memory: MemoryConfig::default(),
            generation: GenerationConfig::default(),
            providers: ProvidersConfig::default(),
            rounds: RoundsConfig::default(),
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    /// Capacity of each WebSocket connection's outbound queue.
    #[serde(default = "ServerConfig::default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            outbound_queue: Self::default_outbound_queue(),
        }
    }
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    const fn default_port() -> u16 {
        8080
    }

    const fn default_outbound_queue() -> usize {
        256
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
        }
    }
}

impl DatabaseConfig {
    fn default_url() -> String {
        "sqlite://parley.db?mode=rwc".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "MemoryConfig::default_window_length")]
    pub window_length: usize,
    /// Window expiry in seconds; 0 keeps windows forever.
    #[serde(default)]
    pub ttl_seconds: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window_length: Self::default_window_length(),
            ttl_seconds: 0,
        }
    }
}

impl MemoryConfig {
    const fn default_window_length() -> usize {
        10
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "GenerationConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Vendor used when an agent's model type is unknown or unset.
    #[serde(default = "GenerationConfig::default_fallback_vendor")]
    pub fallback_vendor: String,
    #[serde(default = "GenerationConfig::default_temperature")]
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            fallback_vendor: Self::default_fallback_vendor(),
            temperature: Self::default_temperature(),
        }
    }
}

impl GenerationConfig {
    const fn default_timeout_secs() -> u64 {
        60
    }

    fn default_fallback_vendor() -> String {
        "ollama".to_string()
    }

    const fn default_temperature() -> f32 {
        0.7
    }
}

/// Only configured vendors are registered.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashscope: Option<OpenAiCompatConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modelscope: Option<OpenAiCompatConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zhipu: Option<OpenAiCompatConfig>,
}

impl ProvidersConfig {
    /// Vendors with a section in the file. Ollama is registered regardless.
    #[must_use]
    pub fn configured(&self) -> Vec<&'static str> {
        [
            ("ollama", self.ollama.is_some()),
            ("dashscope", self.dashscope.is_some()),
            ("modelscope", self.modelscope.is_some()),
            ("zhipu", self.zhipu.is_some()),
        ]
        .into_iter()
        .filter_map(|(vendor, present)| present.then_some(vendor))
        .collect()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct OllamaConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenAiCompatConfig {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoundsConfig {
    /// Entries in each decision prompt digest.
    #[serde(default = "RoundsConfig::default_digest_limit")]
    pub digest_limit: u64,
    #[serde(default = "RoundsConfig::default_public_room")]
    pub public_room: String,
    /// Most rounds one batch request may run.
    #[serde(default = "RoundsConfig::default_max_batch_rounds")]
    pub max_batch_rounds: u32,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            digest_limit: Self::default_digest_limit(),
            public_room: Self::default_public_room(),
            max_batch_rounds: Self::default_max_batch_rounds(),
        }
    }
}

impl RoundsConfig {
    const fn default_digest_limit() -> u64 {
        5
    }

    fn default_public_room() -> String {
        "PUBLIC".to_string()
    }

    const fn default_max_batch_rounds() -> u32 {
        100
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "server": {
    "host": "0.0.0.0",
    "port": 8080,
    "outbound_queue": 256
  },
  "database": {
    "url": "sqlite://parley.db?mode=rwc"
  },
  "memory": {
    "window_length": 10,
    "ttl_seconds": 0
  },
  "generation": {
    "timeout_secs": 60,
    "fallback_vendor": "ollama",
    "temperature": 0.7
  },
  "providers": {
    "ollama": {
      "base_url": "http://localhost:11434",
      "default_model": "qwen3:8b"
    },
    "dashscope": {
      "api_key": "your-dashscope-api-key-here",
      "default_model": "qwen-turbo"
    }
  },
  "rounds": {
    "digest_limit": 5,
    "public_room": "PUBLIC",
    "max_batch_rounds": 100
  },
  "log_level": "info"
}"#;

impl Config {
    fn default_log_level() -> String {
        "info".to_string()
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("parley"))
    }

    /// Load `~/parley/config.json`.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'parley init' to create config.",
                config_path.display()
            );
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Write the template to `~/parley/config.json`. An existing file is only
    /// replaced when `overwrite` is set.
    pub fn create_config(overwrite: bool) -> anyhow::Result<()> {
        let config_path = Self::ensure_config_dir()?.join("config.json");

        if config_path.exists() && !overwrite {
            anyhow::bail!(
                "Config file already exists at: {}. Edit it or rerun with --force.",
                config_path.display()
            );
        }

        std::fs::write(&config_path, CONFIG_TEMPLATE)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Add API keys for the vendors your agents use");
        println!("   2. Point database.url at your sqlite/postgres/mysql database");
        println!("   3. Run 'parley serve' to start the gateway");
        println!();
        Ok(())
    }
}
