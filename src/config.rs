use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Codehive collaboration server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "codehive-server", version, about = "Codehive collaboration server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "CODEHIVE_PORT", default_value = "4000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "CODEHIVE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./codehive.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "CODEHIVE_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys)
    #[arg(long, env = "CODEHIVE_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Hours until a newly created room expires
    #[arg(long, env = "CODEHIVE_ROOM_TTL_HOURS", default_value = "24")]
    pub room_ttl_hours: u64,

    /// Quiet window in milliseconds before an edit burst is broadcast
    #[arg(long, env = "CODEHIVE_DEBOUNCE_MS", default_value = "1000")]
    pub debounce_ms: u64,

    /// Minimum seconds between durable room snapshot writes
    #[arg(long, env = "CODEHIVE_SAVE_INTERVAL_SECS", default_value = "60")]
    pub save_interval_secs: u64,

    /// Interval in seconds between expired-room cleanup runs
    #[arg(long, env = "CODEHIVE_SWEEP_INTERVAL_SECS", default_value = "3600")]
    pub sweep_interval_secs: u64,

    /// AI provider configuration (loaded from [ai] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub ai: Option<AiConfig>,

    /// VCS hosting configuration (loaded from [github] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub github: Option<GithubConfig>,
}

/// Configuration for the external AI completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of the generative API
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    /// API key; empty disables the provider
    #[serde(default)]
    pub api_key: String,

    /// Model identifier
    #[serde(default = "default_ai_model")]
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            api_key: String::new(),
            model: default_ai_model(),
        }
    }
}

fn default_ai_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_ai_model() -> String {
    "gemini-1.5-flash-002".to_string()
}

/// Configuration for the GitHub API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API base URL (override for testing against a stub)
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
        }
    }
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            bind_address: "0.0.0.0".to_string(),
            config: "./codehive.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            room_ttl_hours: 24,
            debounce_ms: 1000,
            save_interval_secs: 60,
            sweep_interval_secs: 3600,
            ai: None,
            github: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (CODEHIVE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("CODEHIVE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Codehive Collaboration Server Configuration
# Place this file at ./codehive.toml or specify with --config <path>
# All settings can be overridden via environment variables (CODEHIVE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 4000)
# port = 4000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# Hours until a newly created room expires (default: 24)
# room_ttl_hours = 24

# Quiet window in milliseconds before an edit burst is broadcast (default: 1000)
# debounce_ms = 1000

# Minimum seconds between durable room snapshot writes (default: 60)
# save_interval_secs = 60

# Interval in seconds between expired-room cleanup runs (default: 3600)
# sweep_interval_secs = 3600

# ---- AI Provider ----
# [ai]
# endpoint = "https://generativelanguage.googleapis.com"
# api_key = ""          # empty disables AI requests
# model = "gemini-1.5-flash-002"

# ---- GitHub Integration ----
# [github]
# api_base = "https://api.github.com"
"#
    .to_string()
}
