use anyhow::{Result, anyhow};
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub public_base_url: String,
    pub certificate_prefix: String,
    pub issue_max_attempts: u32,
    pub api_auth_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env early so process env reads pick it up.
        let _ = dotenvy::dotenv();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow!("DATABASE_URL is required"))?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}", bind_addr))
            .trim_end_matches('/')
            .to_string();

        let certificate_prefix =
            env::var("CERTIFICATE_PREFIX").unwrap_or_else(|_| "MED".to_string());
        validate_prefix(&certificate_prefix)?;

        let issue_max_attempts = env_u64("ISSUE_MAX_ATTEMPTS", 5).clamp(1, 20) as u32;
        let api_auth_token = env::var("API_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        Ok(Self {
            database_url,
            bind_addr,
            public_base_url,
            certificate_prefix,
            issue_max_attempts,
            api_auth_token,
        })
    }
}

/// 证书编号前缀约束：大写字母/数字，2-10 位。
/// 前缀进入对外可见的编号格式，部署后不应再变。
fn validate_prefix(prefix: &str) -> Result<()> {
    let ok = (2..=10).contains(&prefix.len())
        && prefix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !ok {
        return Err(anyhow!(
            "CERTIFICATE_PREFIX must be 2-10 uppercase letters or digits, got {:?}",
            prefix
        ));
    }
    Ok(())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
