use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 8000;
pub const DEFAULT_CHANNEL_COUNT: u16 = 1;
pub const DEFAULT_LANGUAGE: &str = "ru-RU";
pub const DEFAULT_MODEL: &str = "general";

/// A bounded fragment of raw audio bytes, sent as one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    #[default]
    Linear16Pcm,
}

impl AudioEncoding {
    pub fn sample_width_bytes(&self) -> u16 {
        match self {
            AudioEncoding::Linear16Pcm => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    #[default]
    Whitelist,
    Blacklist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRestriction {
    pub kind: RestrictionKind,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    #[default]
    RealTime,
    FullData,
}

/// Recognition parameters sent once, as the first message of a session.
///
/// Built through the `with_*` methods and checked with [`validate`](Self::validate);
/// there are no setters, so a config handed to a session cannot change under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    model: String,
    sample_rate_hz: u32,
    channel_count: u16,
    encoding: AudioEncoding,
    language_restriction: Option<LanguageRestriction>,
    normalization_enabled: bool,
    profanity_filter: bool,
    literature_text: bool,
    processing_mode: ProcessingMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            channel_count: DEFAULT_CHANNEL_COUNT,
            encoding: AudioEncoding::Linear16Pcm,
            language_restriction: Some(LanguageRestriction {
                kind: RestrictionKind::Whitelist,
                languages: vec![DEFAULT_LANGUAGE.to_string()],
            }),
            normalization_enabled: true,
            profanity_filter: true,
            literature_text: false,
            processing_mode: ProcessingMode::RealTime,
        }
    }
}

impl SessionConfig {
    pub fn new(sample_rate_hz: u32, channel_count: u16) -> Self {
        Self {
            sample_rate_hz,
            channel_count,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_encoding(mut self, encoding: AudioEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_language_restriction(mut self, restriction: Option<LanguageRestriction>) -> Self {
        self.language_restriction = restriction;
        self
    }

    pub fn with_normalization(mut self, enabled: bool) -> Self {
        self.normalization_enabled = enabled;
        self
    }

    pub fn with_profanity_filter(mut self, enabled: bool) -> Self {
        self.profanity_filter = enabled;
        self
    }

    pub fn with_literature_text(mut self, enabled: bool) -> Self {
        self.literature_text = enabled;
        self
    }

    pub fn with_processing_mode(mut self, mode: ProcessingMode) -> Self {
        self.processing_mode = mode;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::Invalid("sample_rate_hz must be > 0".to_string()));
        }
        if self.channel_count == 0 {
            return Err(ConfigError::Invalid("channel_count must be > 0".to_string()));
        }
        if let Some(ref restriction) = self.language_restriction {
            if restriction.languages.is_empty() {
                return Err(ConfigError::Invalid(
                    "language restriction is active but no languages are listed".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn encoding(&self) -> AudioEncoding {
        self.encoding
    }

    pub fn language_restriction(&self) -> Option<&LanguageRestriction> {
        self.language_restriction.as_ref()
    }

    pub fn normalization_enabled(&self) -> bool {
        self.normalization_enabled
    }

    pub fn profanity_filter(&self) -> bool {
        self.profanity_filter
    }

    pub fn literature_text(&self) -> bool {
        self.literature_text
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        self.processing_mode
    }
}

/// Events read back from the recognition service, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// Interim hypothesis for the utterance in progress.
    PartialResult { alternatives: Vec<String> },
    /// Raw (not normalized) text for a finished utterance.
    FinalResult { alternatives: Vec<String> },
    /// Normalized, best-effort final text for a segment of audio.
    FinalRefinement {
        final_index: i64,
        alternatives: Vec<String>,
    },
    EndOfUtterance { time_ms: i64 },
    /// A warning reported in-band by the service. Not fatal.
    SessionError { message: String },
    /// The service announced it is closing the session.
    SessionEnd { message: String },
    /// Anything the session does not interpret (heartbeats, analytics).
    Other,
}

impl RecognitionEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            RecognitionEvent::PartialResult { .. } => "partial_result",
            RecognitionEvent::FinalResult { .. } => "final_result",
            RecognitionEvent::FinalRefinement { .. } => "final_refinement",
            RecognitionEvent::EndOfUtterance { .. } => "eou_update",
            RecognitionEvent::SessionError { .. } => "session_error",
            RecognitionEvent::SessionEnd { .. } => "session_end",
            RecognitionEvent::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Configuring,
    Streaming,
    Draining,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Configuring) => true,
            (Configuring, Streaming) => true,
            (Streaming, Draining) => true,
            (Draining, Closed) => true,
            // Any live state may fail; terminal states never move again.
            (Idle | Configuring | Streaming | Draining, Failed) => true,
            _ => false,
        }
    }
}

/// Service credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn from_env(var: &str) -> Result<Self, ConfigError> {
        match std::env::var(var) {
            Ok(val) if !val.is_empty() => Ok(Self(val)),
            _ => Err(ConfigError::EnvVarNotFound(var.to_string())),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value of the `authorization` call metadata.
    pub fn authorization_header(&self) -> String {
        format!("Api-Key {}", self.0)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
