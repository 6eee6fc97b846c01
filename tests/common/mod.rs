//! Mock file backend and stub classifier for integration tests

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::stream::{self, StreamExt};
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::Array4;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use wallpaper_lense::config::ModelSettings;
use wallpaper_lense::models::classify_types::Prediction;
use wallpaper_lense::services::classifier::ImageClassifier;
use wallpaper_lense::AppError;

pub const API_KEY: &str = "test-key";

#[derive(Clone)]
struct MockState {
    listing: Arc<Mutex<Value>>,
    listing_status: Arc<Mutex<StatusCode>>,
    listing_hits: Arc<AtomicUsize>,
}

/// In-process stand-in for the file backend and the image host behind it.
pub struct MockBackend {
    addr: SocketAddr,
    state: MockState,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = MockState {
            listing: Arc::new(Mutex::new(json!({ "success": true, "count": 0, "files": [] }))),
            listing_status: Arc::new(Mutex::new(StatusCode::OK)),
            listing_hits: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/api/files", get(mock_files))
            .route("/api/health", get(mock_health))
            .route("/images/{name}", get(mock_image))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            _handle: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn files_url(&self) -> String {
        format!("{}/api/files", self.base_url())
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/images/{}", self.base_url(), name)
    }

    /// Serve `success: true` with one entry per link.
    pub fn set_links(&self, links: &[String]) {
        let files: Vec<Value> = links
            .iter()
            .enumerate()
            .map(|(i, link)| {
                json!({
                    "fileId": format!("file-{}", i),
                    "fileName": format!("wallpaper-{}.png", i),
                    "filePath": format!("photos/file_{}.png", i),
                    "directLink": link,
                    "type": "photo",
                    "fileSize": 1024,
                    "createdAt": "2025-01-04 10:00:00"
                })
            })
            .collect();
        self.set_listing(json!({ "success": true, "count": files.len(), "files": files }));
    }

    pub fn set_listing(&self, body: Value) {
        *self.state.listing.lock().unwrap() = body;
    }

    pub fn set_listing_status(&self, status: StatusCode) {
        *self.state.listing_status.lock().unwrap() = status;
    }

    pub fn listing_hits(&self) -> usize {
        self.state.listing_hits.load(Ordering::SeqCst)
    }
}

async fn mock_files(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.listing_hits.fetch_add(1, Ordering::SeqCst);

    match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        None => {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "API key required" })))
                .into_response()
        }
        Some(key) if key != API_KEY => {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid API key" })))
                .into_response()
        }
        Some(_) => {}
    }

    let status = *state.listing_status.lock().unwrap();
    if !status.is_success() {
        return (status, Json(json!({ "error": "Failed to fetch files" }))).into_response();
    }

    let body = state.listing.lock().unwrap().clone();
    Json(body).into_response()
}

async fn mock_health() -> Json<Value> {
    Json(json!({ "status": "OK", "server": "mock", "hasApiKey": true }))
}

/// `red.png`, `blue.png` and `green.png` are real images, `broken.png` is not
/// an image, anything else is a 404.
async fn mock_image(Path(name): Path<String>) -> Response {
    let color = match name.as_str() {
        "red.png" => Rgb([220, 20, 20]),
        "blue.png" => Rgb([20, 20, 220]),
        "green.png" => Rgb([20, 220, 20]),
        "broken.png" => {
            return ([(header::CONTENT_TYPE, "image/png")], "definitely not a png").into_response()
        }
        _ => return (StatusCode::NOT_FOUND, "Not Found").into_response(),
    };
    ([(header::CONTENT_TYPE, "image/png")], png_bytes(color)).into_response()
}

pub fn png_bytes(color: Rgb<u8>) -> Vec<u8> {
    let img = RgbImage::from_pixel(64, 48, color);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

pub const MODEL_BYTES: &[u8] = b"not really onnx, but bytes are bytes";
pub const LABEL_CONFIG: &str = r#"{"id2label": {"0": "background", "1": "alp", "2": "seashore, coast"}}"#;

/// Serves model files: `/config.json` and `/model.onnx` succeed, `/stall.onnx`
/// announces a large body, sends a few bytes and never finishes, anything
/// else is a 404.
pub struct MockModelHost {
    addr: SocketAddr,
    hits: Arc<Mutex<Vec<String>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockModelHost {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route("/{name}", get(mock_model_file))
            .with_state(hits.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            hits,
            _handle: handle,
        }
    }

    pub fn url(&self, name: &str) -> String {
        format!("http://{}/{}", self.addr, name)
    }

    /// Requested file names, in order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn settings(&self, dir: &std::path::Path, model: &str) -> ModelSettings {
        ModelSettings {
            dir: dir.to_path_buf(),
            model_url: self.url(model),
            config_url: self.url("config.json"),
            auto_download: false,
            ..Default::default()
        }
    }
}

async fn mock_model_file(
    State(hits): State<Arc<Mutex<Vec<String>>>>,
    Path(name): Path<String>,
) -> Response {
    hits.lock().unwrap().push(name.clone());

    match name.as_str() {
        "config.json" => LABEL_CONFIG.into_response(),
        "model.onnx" => MODEL_BYTES.into_response(),
        "stall.onnx" => {
            let body = stream::once(async { Ok::<_, std::io::Error>(b"first chunk..".to_vec()) })
                .chain(stream::pending());
            Response::builder()
                .header(header::CONTENT_LENGTH, "1000000")
                .body(Body::from_stream(body))
                .unwrap()
        }
        _ => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

/// Classifies by dominant channel, so results depend only on pixel content.
pub struct ColorClassifier {
    pub calls: AtomicUsize,
}

impl ColorClassifier {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl ImageClassifier for ColorClassifier {
    fn classify(&self, input: Array4<f32>) -> Result<Vec<Prediction>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(input.shape(), &[1, 3, 224, 224]);

        let means: Vec<f32> = (0..3)
            .map(|c| {
                let plane = input.index_axis(ndarray::Axis(1), c);
                plane.sum() / plane.len() as f32
            })
            .collect();
        let (channel, _) = means
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &m)| if m > best.1 { (i, m) } else { best });

        let labels = [
            "volcano",
            "alp",
            "seashore, coast, seacoast, sea-coast",
        ];
        Ok(vec![Prediction {
            class_name: labels[channel].to_string(),
            confidence: 0.9,
        }])
    }
}

/// Always answers with the same label.
pub struct FixedClassifier(pub &'static str);

impl ImageClassifier for FixedClassifier {
    fn classify(&self, _input: Array4<f32>) -> Result<Vec<Prediction>, AppError> {
        Ok(vec![Prediction {
            class_name: self.0.to_string(),
            confidence: 1.0,
        }])
    }
}

/// Fails every inference.
pub struct FailingClassifier;

impl ImageClassifier for FailingClassifier {
    fn classify(&self, _input: Array4<f32>) -> Result<Vec<Prediction>, AppError> {
        Err(AppError::Inference("session exploded".to_string()))
    }
}
