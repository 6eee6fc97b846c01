use crate::config::ModelSettings;
use crate::error::AppError;
use crate::models::classify_types::{ModelStatus, Prediction};
use crate::services::classifier::inference;
use crate::services::classifier::ImageClassifier;
use futures::StreamExt;
use ndarray::Array4;
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

pub type OnnxSession = Session;

/// Locates, downloads and loads the ONNX model and its label config.
#[derive(Clone)]
pub struct ModelManager {
    settings: ModelSettings,
}

impl ModelManager {
    pub fn new(settings: ModelSettings) -> Self {
        Self { settings }
    }

    pub fn model_path(&self) -> PathBuf {
        self.settings.dir.join(&self.settings.model_file)
    }

    pub fn config_path(&self) -> PathBuf {
        self.settings.dir.join(&self.settings.config_file)
    }

    pub fn is_downloaded(&self) -> bool {
        self.model_path().exists() && self.config_path().exists()
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            downloaded: self.is_downloaded(),
            model_path: self.model_path(),
            config_path: self.config_path(),
        }
    }

    /// Fetch whichever of the model and label config is missing.
    pub async fn download_model(&self, http: &reqwest::Client) -> Result<(), AppError> {
        if self.is_downloaded() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.settings.dir).await.map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create model directory {}: {}", self.settings.dir.display(), e),
            ))
        })?;

        let config_path = self.config_path();
        if !config_path.exists() {
            download_file(http, &self.settings.config_url, &config_path).await?;
        }

        let model_path = self.model_path();
        if !model_path.exists() {
            download_file(http, &self.settings.model_url, &model_path).await?;
        }

        Ok(())
    }

    /// Read labels and build the ONNX Runtime session. Call once per process.
    pub async fn load_model(&self) -> Result<OnnxClassifier, AppError> {
        let config_path = self.config_path();
        let config_content = tokio::fs::read_to_string(&config_path).await.map_err(|e| {
            AppError::Config(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let labels = parse_labels(&config_content)?;
        debug!(count = labels.len(), "Loaded labels");

        let model_path = self.model_path();
        let use_gpu = self.settings.use_gpu;
        let intra_threads = self.settings.intra_threads;

        let session = tokio::task::spawn_blocking(move || build_session(&model_path, use_gpu, intra_threads))
            .await
            .map_err(|e| AppError::Other(format!("Failed to spawn model loading task: {}", e)))??;

        info!(
            model = %self.model_path().display(),
            gpu = use_gpu,
            "Model loaded"
        );

        Ok(OnnxClassifier::new(session, labels))
    }
}

/// Labels ordered by the numeric keys of the config's `id2label` map.
pub fn parse_labels(config_content: &str) -> Result<Vec<String>, AppError> {
    let config: serde_json::Value = serde_json::from_str(config_content)
        .map_err(|e| AppError::Config(format!("Failed to parse config JSON: {}", e)))?;

    let id2label = config["id2label"]
        .as_object()
        .ok_or_else(|| AppError::Config("Config missing id2label field".to_string()))?;

    let mut labels: Vec<(usize, String)> = id2label
        .iter()
        .map(|(k, v)| {
            let idx = k
                .parse::<usize>()
                .map_err(|_| AppError::Config(format!("Invalid id2label key: {}", k)))?;
            let label = v.as_str().unwrap_or("unknown").to_string();
            Ok((idx, label))
        })
        .collect::<Result<_, AppError>>()?;
    labels.sort_by_key(|(idx, _)| *idx);

    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

fn build_session(model_path: &Path, use_gpu: bool, intra_threads: usize) -> Result<Session, AppError> {
    let _ = ort::init().with_name("wallpaper-lense").commit();

    let mut builder = Session::builder()
        .map_err(|e| AppError::Inference(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
        .map_err(|e| AppError::Inference(format!("Failed to set optimization level: {}", e)))?
        .with_intra_threads(intra_threads)
        .map_err(|e| AppError::Inference(format!("Failed to set intra threads: {}", e)))?;

    if use_gpu {
        builder = builder
            .with_execution_providers([
                ort::ep::DirectML::default().build(),
                ort::ep::CoreML::default().build(),
                ort::ep::CUDA::default().build(),
                ort::ep::CPU::default().build(),
            ])
            .map_err(|e| AppError::Inference(format!("Failed to register GPU execution providers: {}", e)))?;
    } else {
        builder = builder
            .with_execution_providers([ort::ep::CPU::default().build()])
            .map_err(|e| AppError::Inference(format!("Failed to register CPU execution provider: {}", e)))?;
    }

    builder.commit_from_file(model_path).map_err(|e| {
        AppError::Inference(format!(
            "Failed to load ONNX model {}: {}",
            model_path.display(),
            e
        ))
    })
}

/// Loaded ONNX session plus its labels. Runs need `&mut Session`, hence the mutex.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    labels: Vec<String>,
    top_k: usize,
}

impl OnnxClassifier {
    pub fn new(session: Session, labels: Vec<String>) -> Self {
        Self {
            session: Mutex::new(session),
            labels,
            top_k: 5,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

impl ImageClassifier for OnnxClassifier {
    fn classify(&self, input: Array4<f32>) -> Result<Vec<Prediction>, AppError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| AppError::Inference("Model session lock poisoned".to_string()))?;
        inference::run_inference_with_model(&mut session, input, &self.labels, self.top_k)
    }
}

async fn download_file(http: &reqwest::Client, url: &str, dest: &Path) -> Result<(), AppError> {
    info!(url, dest = %dest.display(), "Downloading");
    let response = http.get(url).send().await?;

    if !response.status().is_success() {
        return Err(format!("Failed to download {}: HTTP {}", url, response.status()).into());
    }

    // Only a complete file ever appears at `dest`, even if this future is dropped mid-stream.
    let part = partial_path(dest);
    let result = match write_stream(response, &part).await {
        Ok(()) => tokio::fs::rename(&part, dest).await.map_err(AppError::from),
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&part).await;
    }
    result
}

/// `model.onnx` -> `model.onnx.part`
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

async fn write_stream(response: reqwest::Response, dest: &Path) -> Result<(), AppError> {
    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut last_logged = 0;

    let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
        AppError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create file {}: {}", dest.display(), e),
        ))
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        downloaded += chunk.len() as u64;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk).await?;

        if total_size > 0 {
            let progress = (downloaded * 100) / total_size;
            if progress >= last_logged + 10 {
                info!(progress, "Download progress");
                last_logged = progress;
            }
        }
    }
    tokio::io::AsyncWriteExt::flush(&mut file).await?;
    file.sync_all().await?;

    info!(bytes = downloaded, dest = %dest.display(), "Download complete");
    Ok(())
}
