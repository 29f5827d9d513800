use crate::sink_trait::ResultSink;
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use sttstream_core::SinkError;

/// Appends each final refinement to a text file, one alternative per line.
pub struct FileSink {
    output_path: Option<PathBuf>,
    prefix: String,
    send_count: usize,
}

impl FileSink {
    pub fn new() -> Self {
        Self {
            output_path: None,
            prefix: String::new(),
            send_count: 0,
        }
    }

    pub fn send_count(&self) -> usize {
        self.send_count
    }
}

impl Default for FileSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn initialize(&mut self, config: toml::Value) -> Result<(), SinkError> {
        let path = config
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SinkError::InitializationFailed("missing 'path' in config".to_string()))?;
        self.output_path = Some(PathBuf::from(path));
        tracing::info!(path = %path, "FileSink initialized");
        self.prefix = config
            .get("prefix")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(())
    }

    async fn accept(&mut self, texts: &[String]) -> Result<(), SinkError> {
        let path = self
            .output_path
            .as_ref()
            .ok_or_else(|| SinkError::SendFailed("not initialized".to_string()))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SinkError::SendFailed(e.to_string()))?;

        for text in texts {
            writeln!(file, "{}{}", self.prefix, text)
                .map_err(|e| SinkError::SendFailed(e.to_string()))?;
        }

        self.send_count += 1;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.output_path.is_some()
    }

    async fn shutdown(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
