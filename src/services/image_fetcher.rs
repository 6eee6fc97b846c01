use crate::error::AppError;
use image::{DynamicImage, ImageReader};
use reqwest::Client;
use std::io::Cursor;

/// Download the raw bytes behind an image link.
pub async fn fetch_image_bytes(http: &Client, url: &str) -> Result<Vec<u8>, AppError> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Decode bytes of any supported format, sniffing the format from the content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(img)
}

pub async fn fetch_image(http: &Client, url: &str) -> Result<DynamicImage, AppError> {
    let bytes = fetch_image_bytes(http, url).await?;
    decode_image(&bytes)
}
