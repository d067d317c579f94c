use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlitsoError>;

#[derive(Error, Debug)]
pub enum PlitsoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generative model error: {0}")]
    Generative(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Failed to create Redis pool: {0}")]
    PoolCreation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to map remote record: {0}")]
    Mapping(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<async_openai::error::OpenAIError> for PlitsoError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        PlitsoError::Generative(err.to_string())
    }
}

impl PlitsoError {
    /// Message suitable for a UI banner. Keeps the detail for service failures
    /// but drops the variant prefix for the ones a user can act on.
    pub fn user_message(&self) -> String {
        match self {
            PlitsoError::Validation(msg) => msg.clone(),
            PlitsoError::NotFound(what) => format!("{what} could not be found"),
            PlitsoError::Http(_) => "Unable to reach the recipe service".to_string(),
            PlitsoError::Generative(msg) if msg.is_empty() => "Something went wrong!".to_string(),
            other => other.to_string(),
        }
    }
}
