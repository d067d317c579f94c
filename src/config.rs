use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for plitso
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub mealdb: MealDbConfig,
    pub generative: GenerativeConfig,
    pub redis: RedisConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub storage: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealDbConfig {
    /// Base URL of the v1 JSON API, with trailing slash
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    pub api_key: String,
    /// OpenAI-compatible API base
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: u8,
    /// Key prefix, lets several installs share one Redis
    pub namespace: String,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeout_seconds: u64,
    pub create_timeout_seconds: u64,
    pub recycle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

const PLACEHOLDER_API_KEY: &str = "PLACEHOLDER_GEMINI_API_KEY";

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("PLITSO_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::from_yaml(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str::<Config>(contents)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(storage) = env::var("PLITSO_STORAGE") {
            match storage.to_lowercase().as_str() {
                "memory" => self.app.storage = StorageBackend::Memory,
                "redis" => self.app.storage = StorageBackend::Redis,
                other => tracing::warn!("Unknown PLITSO_STORAGE '{}', keeping {:?}", other, self.app.storage),
            }
        }

        if let Ok(url) = env::var("MEALDB_BASE_URL") {
            self.mealdb.base_url = url;
        }
        if let Ok(timeout) = env::var("MEALDB_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.mealdb.timeout_seconds = secs;
            }
        }

        if let Ok(api_key) = env::var("GEMINI_API_KEY") {
            self.generative.api_key = api_key;
        }
        if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
            self.generative.base_url = base_url;
        }
        if let Ok(model) = env::var("GEMINI_MODEL") {
            self.generative.model = model;
        }

        if let Ok(host) = env::var("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Ok(port) = env::var("REDIS_PORT") {
            if let Ok(port_num) = port.parse() {
                self.redis.port = port_num;
            }
        }
        if let Ok(db) = env::var("REDIS_DB") {
            if let Ok(db_num) = db.parse() {
                self.redis.database = db_num;
            }
        }
        if let Ok(namespace) = env::var("PLITSO_NAMESPACE") {
            self.redis.namespace = namespace;
        }
        if let Ok(pool_size) = env::var("PLITSO_REDIS_POOL_SIZE") {
            if let Ok(size) = pool_size.parse() {
                self.redis.pool.max_size = size;
            }
        }

        if let Ok(attempts) = env::var("PLITSO_RETRY_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.retry.max_attempts = n;
            }
        }
    }

    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.mealdb.base_url.is_empty() {
            return Err("mealdb.base_url cannot be empty".into());
        }
        if self.mealdb.timeout_seconds == 0 {
            return Err("mealdb.timeout_seconds cannot be 0".into());
        }

        if self.app.storage == StorageBackend::Redis && self.redis.port == 0 {
            return Err("Redis port cannot be 0".into());
        }

        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts cannot be 0".into());
        }
        if self.retry.jitter_factor < 0.0 || self.retry.jitter_factor > 1.0 {
            return Err("Retry jitter factor must be between 0.0 and 1.0".into());
        }

        if !(0.0..=2.0).contains(&self.generative.temperature) {
            return Err("generative.temperature must be between 0.0 and 2.0".into());
        }
        if self.generative.api_key == PLACEHOLDER_API_KEY || self.generative.api_key.is_empty() {
            return Err("GEMINI_API_KEY environment variable must be set".into());
        }

        Ok(())
    }

    /// Get Redis URL with password from environment
    pub fn get_redis_url(&self) -> String {
        let password = env::var("REDIS_PASSWORD").unwrap_or_default();

        if password.is_empty() {
            format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.database
            )
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis.host, self.redis.port, self.redis.database
            )
        }
    }

    pub fn get_pool_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.timeout_seconds)
    }

    pub fn get_pool_create_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.create_timeout_seconds)
    }

    pub fn get_pool_recycle_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.recycle_timeout_seconds)
    }

    pub fn get_mealdb_timeout(&self) -> Duration {
        Duration::from_secs(self.mealdb.timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig {
                name: "plitso".to_string(),
                storage: StorageBackend::Memory,
            },
            mealdb: MealDbConfig {
                base_url: "https://www.themealdb.com/api/json/v1/1/".to_string(),
                timeout_seconds: 15,
            },
            generative: GenerativeConfig {
                api_key: env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
                    tracing::warn!("GEMINI_API_KEY not set, using placeholder");
                    PLACEHOLDER_API_KEY.to_string()
                }),
                base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
                model: "gemini-1.5-flash".to_string(),
                temperature: 0.7,
            },
            redis: RedisConfig {
                host: "localhost".to_string(),
                port: 6379,
                database: 0,
                namespace: "plitso".to_string(),
                pool: PoolConfig {
                    max_size: 8,
                    timeout_seconds: 5,
                    create_timeout_seconds: 5,
                    recycle_timeout_seconds: 5,
                },
            },
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 200,
                max_delay_ms: 5000,
                jitter_factor: 0.2,
            },
        }
    }
}
