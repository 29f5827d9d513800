use crate::sink_trait::ResultSink;
use async_trait::async_trait;
use sttstream_core::SinkError;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkMessage {
    Final(Vec<String>),
    Partial(Vec<String>),
}

/// Forwards results to an in-process receiver.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, message: SinkMessage) -> Result<(), SinkError> {
        self.sender
            .send(message)
            .map_err(|_| SinkError::SendFailed("receiver dropped".to_string()))
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    async fn initialize(&mut self, _config: toml::Value) -> Result<(), SinkError> {
        Ok(())
    }

    async fn accept(&mut self, texts: &[String]) -> Result<(), SinkError> {
        self.send(SinkMessage::Final(texts.to_vec()))
    }

    async fn accept_partial(&mut self, texts: &[String]) -> Result<(), SinkError> {
        self.send(SinkMessage::Partial(texts.to_vec()))
    }

    fn is_healthy(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn shutdown(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
