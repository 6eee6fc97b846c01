use crate::config::Settings;
use crate::error::AppError;
use crate::models::classify_types::ModelStatus;
use crate::services::backend_client::build_http_client;
use crate::services::classifier::model_manager::ModelManager;

pub fn get_model_status(settings: &Settings) -> ModelStatus {
    ModelManager::new(settings.model.clone()).status()
}

pub async fn download_model(settings: &Settings) -> Result<ModelStatus, AppError> {
    let model_manager = ModelManager::new(settings.model.clone());
    let http = build_http_client(None)?;
    model_manager.download_model(&http).await?;
    Ok(model_manager.status())
}
