use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::archive::{
    DirectorySinkConfig, DEFAULT_JPEG_QUALITY, DEFAULT_REFERENCE_SIZE, DEFAULT_SAVE_DIR,
};
use crate::capture::policy::{
    DEFAULT_ALLOW_LIST, DEFAULT_FRAME_RATE, DEFAULT_MAX_IMAGES, DEFAULT_PERIOD_HOURS,
};
use crate::capture::{CapturePolicy, ClassAllowList};
use crate::detect::{EngineSettings, OutOfFramePolicy, SuppressionScope};
use crate::error::SentinelError;
use crate::ingest::SourceConfig;

const DEFAULT_LABELS_PATH: &str = "labels.txt";
const DEFAULT_BACKEND: &str = "tract";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.7;
const DEFAULT_IOU: f32 = 0.5;
const DEFAULT_STATE_DB: &str = "sentinel.db";
const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;

pub const CONFIG_ENV: &str = "SENTINEL_CONFIG";

#[derive(Debug, Deserialize, Default)]
struct SentinelConfigFile {
    model: Option<ModelConfigFile>,
    capture: Option<CaptureConfigFile>,
    quota: Option<QuotaConfigFile>,
    storage: Option<StorageConfigFile>,
    source: Option<SourceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    backends: Option<Vec<String>>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    suppression: Option<SuppressionScope>,
    discard_out_of_frame: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    frame_rate: Option<u32>,
    allow_list: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct QuotaConfigFile {
    max_images_per_period: Option<u32>,
    period_hours: Option<u32>,
    debug_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct StorageConfigFile {
    save_dir: Option<PathBuf>,
    state_db: Option<String>,
    reference_size: Option<u32>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    realtime: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub model: ModelSettings,
    pub capture: CaptureSettings,
    pub quota: QuotaSettings,
    pub storage: StorageSettings,
    pub source: SourceConfig,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub path: Option<PathBuf>,
    pub labels_path: PathBuf,
    /// Runtime backends in order of preference.
    pub backends: Vec<String>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub suppression: SuppressionScope,
    pub discard_out_of_frame: bool,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub frame_rate: u32,
    pub allow_list: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QuotaSettings {
    pub max_images_per_period: u32,
    pub period_hours: u32,
    /// Fixed save interval that replaces the quota-derived one.
    pub debug_interval_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub save_dir: PathBuf,
    pub state_db: String,
    pub reference_size: u32,
    pub jpeg_quality: u8,
}

impl SentinelConfig {
    /// Load from the file named by `SENTINEL_CONFIG` (if any), then apply
    /// `SENTINEL_*` overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => SentinelConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Self {
        let model = file.model.unwrap_or_default();
        let capture = file.capture.unwrap_or_default();
        let quota = file.quota.unwrap_or_default();
        let storage = file.storage.unwrap_or_default();
        let source = file.source.unwrap_or_default();

        Self {
            model: ModelSettings {
                path: model.path,
                labels_path: model
                    .labels_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_PATH)),
                backends: model
                    .backends
                    .unwrap_or_else(|| vec![DEFAULT_BACKEND.to_string()]),
                input_width: model.input_width.unwrap_or(DEFAULT_INPUT_SIZE),
                input_height: model.input_height.unwrap_or(DEFAULT_INPUT_SIZE),
                confidence_threshold: model.confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE),
                iou_threshold: model.iou_threshold.unwrap_or(DEFAULT_IOU),
                suppression: model.suppression.unwrap_or_default(),
                discard_out_of_frame: model.discard_out_of_frame.unwrap_or(false),
            },
            capture: CaptureSettings {
                frame_rate: capture.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
                allow_list: capture.allow_list.unwrap_or_else(|| {
                    DEFAULT_ALLOW_LIST.iter().map(|s| s.to_string()).collect()
                }),
            },
            quota: QuotaSettings {
                max_images_per_period: quota.max_images_per_period.unwrap_or(DEFAULT_MAX_IMAGES),
                period_hours: quota.period_hours.unwrap_or(DEFAULT_PERIOD_HOURS),
                debug_interval_secs: quota.debug_interval_secs,
            },
            storage: StorageSettings {
                save_dir: storage
                    .save_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_DIR)),
                state_db: storage
                    .state_db
                    .unwrap_or_else(|| DEFAULT_STATE_DB.to_string()),
                reference_size: storage.reference_size.unwrap_or(DEFAULT_REFERENCE_SIZE),
                jpeg_quality: storage.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            },
            source: SourceConfig {
                url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
                realtime: source.realtime.unwrap_or(true),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_string("SENTINEL_MODEL_PATH") {
            self.model.path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_string("SENTINEL_LABELS_PATH") {
            self.model.labels_path = PathBuf::from(path);
        }
        if let Some(backends) = env_string("SENTINEL_BACKENDS") {
            let parsed = split_csv(&backends);
            if !parsed.is_empty() {
                self.model.backends = parsed;
            }
        }
        if let Some(value) = env_parse("SENTINEL_CONFIDENCE")? {
            self.model.confidence_threshold = value;
        }
        if let Some(value) = env_parse("SENTINEL_IOU")? {
            self.model.iou_threshold = value;
        }
        if let Some(scope) = env_string("SENTINEL_SUPPRESSION") {
            self.model.suppression = SuppressionScope::parse(&scope).ok_or_else(|| {
                anyhow!("SENTINEL_SUPPRESSION must be class_agnostic or per_class")
            })?;
        }
        if let Some(value) = env_parse("SENTINEL_FRAME_RATE")? {
            self.capture.frame_rate = value;
        }
        if let Some(list) = env_string("SENTINEL_ALLOW_LIST") {
            let parsed = split_csv(&list);
            if !parsed.is_empty() {
                self.capture.allow_list = parsed;
            }
        }
        if let Some(value) = env_parse("SENTINEL_MAX_IMAGES")? {
            self.quota.max_images_per_period = value;
        }
        if let Some(value) = env_parse("SENTINEL_PERIOD_HOURS")? {
            self.quota.period_hours = value;
        }
        if let Some(value) = env_parse("SENTINEL_DEBUG_INTERVAL_SECS")? {
            self.quota.debug_interval_secs = Some(value);
        }
        if let Some(dir) = env_string("SENTINEL_SAVE_DIR") {
            self.storage.save_dir = PathBuf::from(dir);
        }
        if let Some(db) = env_string("SENTINEL_STATE_DB") {
            self.storage.state_db = db;
        }
        if let Some(url) = env_string("SENTINEL_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(value) = env_parse("SENTINEL_SOURCE_FPS")? {
            self.source.target_fps = value;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for (name, value) in [
            ("confidence threshold", self.model.confidence_threshold),
            ("iou threshold", self.model.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SentinelError::configuration(format!(
                    "{} must be within 0..=1, got {}",
                    name, value
                )));
            }
        }
        if self.model.backends.is_empty() {
            return Err(SentinelError::configuration("at least one backend is required"));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(SentinelError::configuration("model input size must be non-zero"));
        }
        if self.source.target_fps == 0 {
            return Err(SentinelError::configuration("source fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(SentinelError::configuration("source frame size must be non-zero"));
        }
        if self.storage.state_db.trim().is_empty() {
            return Err(SentinelError::configuration("state db path must not be empty"));
        }
        if self.storage.reference_size == 0 {
            return Err(SentinelError::configuration("reference size must be non-zero"));
        }
        if !(1..=100).contains(&self.storage.jpeg_quality) {
            return Err(SentinelError::configuration("jpeg quality must be within 1..=100"));
        }
        self.model.backends = self
            .model
            .backends
            .iter()
            .map(|b| b.trim().to_ascii_lowercase())
            .collect();
        // Rate, quota and allow-list checks live in CapturePolicy.
        self.capture_policy()?;
        Ok(())
    }

    pub fn capture_policy(&self) -> Result<CapturePolicy> {
        CapturePolicy::new(
            self.capture.frame_rate,
            self.quota.max_images_per_period,
            self.quota.period_hours,
            self.quota.debug_interval_secs,
            ClassAllowList::new(self.capture.allow_list.iter().cloned())?,
        )
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            confidence_threshold: self.model.confidence_threshold,
            iou_threshold: self.model.iou_threshold,
            scope: self.model.suppression,
            out_of_frame: if self.model.discard_out_of_frame {
                OutOfFramePolicy::Discard
            } else {
                OutOfFramePolicy::Keep
            },
        }
    }

    pub fn sink_config(&self) -> DirectorySinkConfig {
        DirectorySinkConfig {
            root: self.storage.save_dir.clone(),
            reference_size: self.storage.reference_size,
            jpeg_quality: self.storage.jpeg_quality,
        }
    }
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value: {}", key, raw)),
        None => Ok(None),
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
