use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Blog API configuration
    pub api_base_url: String,

    // User directory configuration
    pub user_service_url: String,
    pub user_service_token: Option<String>,

    // HTTP client settings
    pub request_timeout: u64,

    // Content settings
    pub max_comment_length: usize,
    pub default_comments_per_page: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            user_service_url: env::var("USER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            user_service_token: env::var("USER_SERVICE_TOKEN").ok(),

            request_timeout: env::var("REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            default_comments_per_page: env::var("DEFAULT_COMMENTS_PER_PAGE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
        })
    }

    /// 指向同一服务的配置，集成测试常用
    pub fn for_base_url(base_url: &str) -> Self {
        Config {
            api_base_url: base_url.to_string(),
            user_service_url: base_url.to_string(),
            user_service_token: None,
            request_timeout: 30,
            max_comment_length: 10000,
            default_comments_per_page: 50,
        }
    }
}
