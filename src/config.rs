// File-based configuration with CLI/env overrides applied on top.

use crate::error::AppError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "wallpaper-lense.toml";

const DEFAULT_BACKEND_URL: &str = "http://localhost:10000/api/files";
const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/Xenova/mobilenet_v2_1.0_224/resolve/main/onnx/model.onnx";
const DEFAULT_CONFIG_URL: &str =
    "https://huggingface.co/Xenova/mobilenet_v2_1.0_224/resolve/main/config.json";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub backend: BackendSettings,
    pub model: ModelSettings,
    pub preprocess: PreprocessSettings,
    pub classify: ClassifySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSettings {
    pub url: String,
    pub api_key: Option<String>,
    /// Request timeout in seconds. Unset means the HTTP client default.
    pub timeout_secs: Option<u64>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            api_key: None,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSettings {
    pub dir: PathBuf,
    pub model_file: String,
    pub config_file: String,
    pub model_url: String,
    pub config_url: String,
    pub use_gpu: bool,
    pub intra_threads: usize,
    pub auto_download: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            model_file: "mobilenet_v2_1.0_224.onnx".to_string(),
            config_file: "mobilenet_v2_1.0_224-config.json".to_string(),
            model_url: DEFAULT_MODEL_URL.to_string(),
            config_url: DEFAULT_CONFIG_URL.to_string(),
            use_gpu: false,
            intra_threads: 4,
            auto_download: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    /// Resize straight to the target square, ignoring aspect ratio.
    Stretch,
    /// Resize the shortest edge, then crop the centre square.
    CenterCrop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// `x / 127.5 - 1`, the MobileNet convention.
    Symmetric,
    /// ImageNet mean/std per channel.
    Imagenet,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessSettings {
    pub size: u32,
    pub resize: ResizeMode,
    pub normalization: Normalization,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            size: 224,
            resize: ResizeMode::Stretch,
            normalization: Normalization::Symmetric,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifySettings {
    pub top_k: usize,
    /// Keep every synonym of the label instead of only the first one.
    pub full_labels: bool,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            full_labels: false,
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub model_dir: Option<PathBuf>,
    pub use_gpu: bool,
}

impl Settings {
    /// Load settings: defaults, then the TOML file, then overrides.
    ///
    /// An explicit `path` must exist. Without one, `wallpaper-lense.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, AppError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };
        settings.apply(overrides);
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let settings: Settings = toml::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded config from file");
        Ok(settings)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.backend_url {
            self.backend.url = url;
        }
        if let Some(key) = overrides.api_key {
            self.backend.api_key = Some(key);
        }
        if let Some(dir) = overrides.model_dir {
            self.model.dir = dir;
        }
        if overrides.use_gpu {
            self.model.use_gpu = true;
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        reqwest::Url::parse(&self.backend.url).map_err(|e| {
            AppError::Config(format!("Invalid backend url {}: {}", self.backend.url, e))
        })?;
        if self.preprocess.size == 0 {
            return Err(AppError::Config("preprocess.size must be greater than 0".into()));
        }
        if self.classify.top_k == 0 {
            return Err(AppError::Config("classify.top_k must be greater than 0".into()));
        }
        if self.model.intra_threads == 0 {
            return Err(AppError::Config("model.intra_threads must be greater than 0".into()));
        }
        Ok(())
    }
}
