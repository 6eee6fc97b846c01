use crate::config::BackendSettings;
use crate::error::AppError;
use crate::models::remote_file::FileListing;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info};

const API_KEY_HEADER: &str = "x-api-key";

/// Client for the file backend that lists uploaded wallpapers.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    files_url: Url,
    api_key: Option<String>,
}

impl BackendClient {
    pub fn new(settings: &BackendSettings) -> Result<Self, AppError> {
        let files_url = Url::parse(&settings.url)
            .map_err(|e| AppError::Config(format!("Invalid backend url {}: {}", settings.url, e)))?;
        Ok(Self {
            http: build_http_client(settings.timeout_secs)?,
            files_url,
            api_key: settings.api_key.clone(),
        })
    }

    /// The HTTP client, shared with the image fetcher.
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub async fn fetch_listing(&self) -> Result<FileListing, AppError> {
        let mut request = self.http.get(self.files_url.clone());
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?.error_for_status()?;
        let listing: FileListing = response.json().await?;
        debug!(
            success = listing.success,
            count = ?listing.count,
            files = listing.files.len(),
            "Fetched backend listing"
        );
        for file in &listing.files {
            debug!(
                file_id = file.file_id.as_deref().unwrap_or("-"),
                name = file.file_name.as_deref().unwrap_or("-"),
                kind = file.kind.as_deref().unwrap_or("-"),
                size = ?file.file_size,
                "Listed file"
            );
        }
        Ok(listing)
    }

    /// Direct links of every listed file, in listing order.
    ///
    /// Returns an empty list when the backend answers with `success: false`.
    pub async fn fetch_direct_links(&self) -> Result<Vec<String>, AppError> {
        let links = self.fetch_listing().await?.into_direct_links();
        info!(count = links.len(), url = %self.files_url, "Fetched wallpaper links");
        Ok(links)
    }

    /// URL of the health endpoint that sits next to the listing endpoint.
    ///
    /// `/api/files` and `/api/files/` both map to `/api/health`.
    pub fn health_url(&self) -> Result<Url, AppError> {
        let mut url = self.files_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("Cannot derive health url from {}", self.files_url)))?
            .pop_if_empty()
            .pop()
            .push("health");
        url.set_query(None);
        Ok(url)
    }

    pub async fn health(&self) -> Result<serde_json::Value, AppError> {
        let url = self.health_url()?;
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

pub fn build_http_client(timeout_secs: Option<u64>) -> Result<Client, AppError> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}
