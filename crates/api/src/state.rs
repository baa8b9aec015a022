use medevents_common::{AppConfig, NumberGenerator};
use sea_orm::DatabaseConnection;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub generator: NumberGenerator,
    pub public_base_url: String,
    pub certificate_prefix: String,
    pub issue_max_attempts: u32,
    pub auth_token: Option<String>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: &AppConfig) -> Self {
        Self {
            db,
            generator: NumberGenerator::new(config.certificate_prefix.clone()),
            public_base_url: config.public_base_url.clone(),
            certificate_prefix: config.certificate_prefix.clone(),
            issue_max_attempts: config.issue_max_attempts,
            auth_token: config.api_auth_token.clone(),
        }
    }
}
