use crate::config::{ClassifySettings, PreprocessSettings, Settings};
use crate::error::AppError;
use crate::models::classify_types::{ClassificationResult, UNKNOWN_CATEGORY};
use crate::services::backend_client::{build_http_client, BackendClient};
use crate::services::classifier::inference::{preprocess_image, short_label};
use crate::services::classifier::model_manager::{ModelManager, OnnxClassifier};
use crate::services::classifier::ImageClassifier;
use crate::services::image_fetcher;
use reqwest::Client;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `URL: ...` / `Category: ...` lines per image.
    #[default]
    Text,
    /// One JSON array of results once every image is done.
    Json,
}

/// Everything needed to label one image. Built once, reused for every link.
pub struct Categorizer<'a, C: ImageClassifier + ?Sized> {
    pub http: &'a Client,
    pub classifier: &'a C,
    pub preprocess: PreprocessSettings,
    pub classify: ClassifySettings,
}

impl<'a, C: ImageClassifier + ?Sized> Categorizer<'a, C> {
    /// Fetch, decode, preprocess and classify one image, returning its top label.
    pub async fn categorize_image(&self, url: &str) -> Result<String, AppError> {
        let img = image_fetcher::fetch_image(self.http, url).await?;
        let tensor = preprocess_image(&img, &self.preprocess)?;
        let predictions = self.classifier.classify(tensor)?;

        for p in &predictions {
            debug!(url, class = %p.class_name, confidence = p.confidence, "Prediction");
        }

        let top = predictions
            .first()
            .ok_or_else(|| AppError::Inference("Model returned no predictions".to_string()))?;

        let label = if self.classify.full_labels {
            top.class_name.clone()
        } else {
            short_label(&top.class_name).to_string()
        };
        Ok(label)
    }

    /// Label every link in order. A failing link gets the `Unknown` category
    /// and never stops the run.
    pub async fn categorize_all<W: Write>(
        &self,
        urls: &[String],
        format: OutputFormat,
        out: &mut W,
    ) -> Result<Vec<ClassificationResult>, AppError> {
        let start = Instant::now();
        let mut categorized = Vec::with_capacity(urls.len());

        for url in urls {
            let category = match self.categorize_image(url).await {
                Ok(category) => category,
                Err(e) => {
                    warn!(url = %url, kind = e.kind(), error = %e, "Failed to categorize image");
                    if format == OutputFormat::Text {
                        writeln!(out, "Error categorizing {}: {}", url, e)?;
                    }
                    UNKNOWN_CATEGORY.to_string()
                }
            };

            if format == OutputFormat::Text {
                writeln!(out, "URL: {}\nCategory: {}\n", url, category)?;
            }

            categorized.push(ClassificationResult {
                url: url.clone(),
                category,
            });
        }

        if format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut *out, &categorized)?;
            writeln!(out)?;
        }

        let unknown = categorized
            .iter()
            .filter(|r| r.category == UNKNOWN_CATEGORY)
            .count();
        info!(
            total = categorized.len(),
            unknown,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Categorization finished"
        );

        Ok(categorized)
    }
}

/// Load the model once, list the backend's links and label each of them on stdout.
pub async fn run(settings: &Settings, format: OutputFormat) -> Result<Vec<ClassificationResult>, AppError> {
    let classifier = prepare_classifier(settings).await?;
    categorize_listing(settings, &classifier, format, &mut std::io::stdout()).await
}

/// Make sure the model is on disk (downloading it when allowed) and load it.
pub async fn prepare_classifier(settings: &Settings) -> Result<OnnxClassifier, AppError> {
    let model_manager = ModelManager::new(settings.model.clone());

    if !model_manager.is_downloaded() {
        if !settings.model.auto_download {
            return Err(AppError::Config(format!(
                "Model not found at {}. Run `model download` first.",
                model_manager.model_path().display()
            )));
        }
        // Downloads ignore the backend timeout
        model_manager.download_model(&build_http_client(None)?).await?;
    }

    Ok(model_manager
        .load_model()
        .await?
        .with_top_k(settings.classify.top_k))
}

/// Fetch the backend listing and label every link with `classifier`.
pub async fn categorize_listing<C, W>(
    settings: &Settings,
    classifier: &C,
    format: OutputFormat,
    out: &mut W,
) -> Result<Vec<ClassificationResult>, AppError>
where
    C: ImageClassifier + ?Sized,
    W: Write,
{
    let backend = BackendClient::new(&settings.backend)?;
    let urls = backend.fetch_direct_links().await?;

    let categorizer = Categorizer {
        http: backend.http(),
        classifier,
        preprocess: settings.preprocess,
        classify: settings.classify,
    };
    categorizer.categorize_all(&urls, format, out).await
}
