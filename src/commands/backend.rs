use crate::config::Settings;
use crate::error::AppError;
use crate::services::backend_client::BackendClient;

pub async fn check_health(settings: &Settings) -> Result<serde_json::Value, AppError> {
    BackendClient::new(&settings.backend)?.health().await
}
