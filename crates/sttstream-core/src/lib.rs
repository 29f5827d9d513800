pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, AudioConfig, OutputConfig, RecognitionConfig, ServiceConfig};
pub use error::{AudioError, ConfigError, ConnectionError, ErrorCode, SessionError, SinkError};
pub use types::{
    ApiKey, AudioChunk, AudioEncoding, LanguageRestriction, ProcessingMode, RecognitionEvent,
    RestrictionKind, SessionConfig, SessionState,
};
