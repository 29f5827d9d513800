use async_trait::async_trait;
use std::pin::Pin;
use sttstream_core::{AudioChunk, RecognitionEvent, SessionConfig, SessionError};
use tokio_stream::Stream;

/// One message on the outbound half of a recognition call.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Config(SessionConfig),
    Chunk(AudioChunk),
}

pub type OutboundStream = Pin<Box<dyn Stream<Item = OutboundMessage> + Send>>;
pub type InboundStream = Pin<Box<dyn Stream<Item = Result<RecognitionEvent, SessionError>> + Send>>;

/// A bidirectional recognition call.
///
/// The transport consumes `outbound` at its own pace and yields events until
/// the service ends the call. Dropping the returned stream aborts the call.
#[async_trait]
pub trait RecognizerTransport: Send {
    fn name(&self) -> &str;
    async fn recognize_streaming(
        &mut self,
        outbound: OutboundStream,
    ) -> Result<InboundStream, SessionError>;
}
