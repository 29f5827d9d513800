use crate::error::ConfigError;
use crate::types::{
    AudioEncoding, LanguageRestriction, ProcessingMode, RestrictionKind, SessionConfig,
    DEFAULT_CHANNEL_COUNT, DEFAULT_LANGUAGE, DEFAULT_MODEL, DEFAULT_SAMPLE_RATE_HZ,
};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://stt.api.cloud.yandex.net:443";
pub const API_KEY_ENV: &str = "API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub recognition: RecognitionConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Falls back to the `API_KEY` environment variable when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Upper bound for a whole recognition run. No deadline when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: None,
        }
    }
}

impl ServiceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionSetting {
    #[default]
    Whitelist,
    Blacklist,
    /// Let the service detect the language on its own.
    None,
}

impl RestrictionSetting {
    pub fn kind(&self) -> Option<RestrictionKind> {
        match self {
            RestrictionSetting::Whitelist => Some(RestrictionKind::Whitelist),
            RestrictionSetting::Blacklist => Some(RestrictionKind::Blacklist),
            RestrictionSetting::None => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecognitionConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,

    #[serde(default = "default_channel_count")]
    pub channel_count: u16,

    #[serde(default)]
    pub encoding: AudioEncoding,

    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    #[serde(default)]
    pub restriction: RestrictionSetting,

    #[serde(default = "default_true")]
    pub text_normalization: bool,

    #[serde(default = "default_true")]
    pub profanity_filter: bool,

    #[serde(default)]
    pub literature_text: bool,

    #[serde(default)]
    pub processing: ProcessingMode,

    #[serde(default)]
    pub partial_results: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            sample_rate_hz: default_sample_rate(),
            channel_count: default_channel_count(),
            encoding: AudioEncoding::default(),
            languages: default_languages(),
            restriction: RestrictionSetting::default(),
            text_normalization: true,
            profanity_filter: true,
            literature_text: false,
            processing: ProcessingMode::default(),
            partial_results: false,
        }
    }
}

impl RecognitionConfig {
    pub fn to_session_config(&self) -> Result<SessionConfig, ConfigError> {
        let restriction = self.restriction.kind().map(|kind| LanguageRestriction {
            kind,
            languages: self.languages.clone(),
        });
        let config = SessionConfig::new(self.sample_rate_hz, self.channel_count)
            .with_model(self.model.clone())
            .with_encoding(self.encoding)
            .with_language_restriction(restriction)
            .with_normalization(self.text_normalization)
            .with_profanity_filter(self.profanity_filter)
            .with_literature_text(self.literature_text)
            .with_processing_mode(self.processing);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_file_chunk_size")]
    pub file_chunk_size: usize,

    /// Frames per captured chunk.
    #[serde(default = "default_mic_chunk_size")]
    pub mic_chunk_size: usize,

    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Where a microphone run persists its capture. Empty disables it.
    #[serde(default = "default_recording_path")]
    pub recording_path: String,

    #[serde(default = "default_file")]
    pub default_file: PathBuf,

    #[serde(default = "default_record_seconds")]
    pub default_record_seconds: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            file_chunk_size: default_file_chunk_size(),
            mic_chunk_size: default_mic_chunk_size(),
            device_name: default_device_name(),
            recording_path: default_recording_path(),
            default_file: default_file(),
            default_record_seconds: default_record_seconds(),
        }
    }
}

impl AudioConfig {
    pub fn recording_path(&self) -> Option<PathBuf> {
        if self.recording_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.recording_path))
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_sink")]
    pub sink: String,

    /// Sink-specific settings, handed to the sink untouched.
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sink: default_sink(),
            extra: toml::Table::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE_HZ
}

fn default_channel_count() -> u16 {
    DEFAULT_CHANNEL_COUNT
}

fn default_languages() -> Vec<String> {
    vec![DEFAULT_LANGUAGE.to_string()]
}

fn default_true() -> bool {
    true
}

fn default_file_chunk_size() -> usize {
    4000
}

fn default_mic_chunk_size() -> usize {
    4096
}

fn default_device_name() -> String {
    "default".to_string()
}

fn default_recording_path() -> String {
    "audio.wav".to_string()
}

fn default_file() -> PathBuf {
    PathBuf::from("example_audiofile.wav")
}

fn default_record_seconds() -> u32 {
    5
}

fn default_sink() -> String {
    "console".to_string()
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"))
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in env_var_pattern().captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if let Some(first_missing) = errors.into_iter().next() {
        return Err(ConfigError::EnvVarNotFound(first_missing));
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), sink = %config.output.sink, "configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        config.recognition.to_session_config()?;
        Ok(config)
    }
}

/// Load `KEY=value` pairs into the process environment so that `${VAR}`
/// interpolation and the `API_KEY` fallback can see them.
///
/// Variables already set in the environment win. Without an explicit path a
/// `.env` file is looked up from the working directory upwards, and a missing
/// file is not an error.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .map_err(|e| ConfigError::EnvFile(format!("{}: {e}", path.display())))?;
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(ConfigError::EnvFile(e.to_string())),
        },
    }
}
