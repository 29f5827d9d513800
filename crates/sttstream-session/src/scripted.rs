use crate::transport::{InboundStream, OutboundMessage, OutboundStream, RecognizerTransport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use sttstream_core::{RecognitionEvent, SessionError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// One step of a scripted service reply.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Yield an event to the client.
    Event(RecognitionEvent),
    /// End the call with an error. The outbound half is abandoned.
    Fail(SessionError),
    /// Read outbound messages until this many audio chunks have arrived in total.
    AwaitChunks(usize),
    /// Read outbound messages until the client closes its half.
    AwaitOutboundClose,
    /// Stop responding until the client drops the call.
    Stall,
}

/// An in-process stand-in for the recognition service.
///
/// Every call replays the same script and records what the client sent,
/// in arrival order.
pub struct ScriptedTransport {
    script: Vec<ScriptStep>,
    open_error: Option<SessionError>,
    received: Arc<Mutex<Vec<OutboundMessage>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            open_error: None,
            received: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reject every call before any message is read.
    pub fn rejecting(error: SessionError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    /// Handle to the messages received so far.
    pub fn received(&self) -> Arc<Mutex<Vec<OutboundMessage>>> {
        Arc::clone(&self.received)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecognizerTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize_streaming(
        &mut self,
        outbound: OutboundStream,
    ) -> Result<InboundStream, SessionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(ref err) = self.open_error {
            return Err(err.clone());
        }

        let (tx, rx) = mpsc::channel(16);
        let script = self.script.clone();
        let received = Arc::clone(&self.received);
        tokio::spawn(play(script, outbound, received, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

type EventSender = mpsc::Sender<Result<RecognitionEvent, SessionError>>;

async fn play(
    script: Vec<ScriptStep>,
    mut outbound: OutboundStream,
    received: Arc<Mutex<Vec<OutboundMessage>>>,
    tx: EventSender,
) {
    let mut chunks_seen = 0usize;
    let mut outbound_open = true;

    for step in script {
        match step {
            ScriptStep::Event(event) => {
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
            ScriptStep::Fail(err) => {
                drop(outbound);
                let _ = tx.send(Err(err)).await;
                return;
            }
            ScriptStep::AwaitChunks(target) => {
                while outbound_open && chunks_seen < target {
                    match read_one(&mut outbound, &received, &tx).await {
                        Some(is_chunk) => chunks_seen += usize::from(is_chunk),
                        None => outbound_open = false,
                    }
                }
            }
            ScriptStep::AwaitOutboundClose => {
                while outbound_open {
                    if read_one(&mut outbound, &received, &tx).await.is_none() {
                        outbound_open = false;
                    }
                }
            }
            ScriptStep::Stall => {
                tx.closed().await;
                return;
            }
        }
    }
    tracing::trace!(chunks_seen, "script finished");
}

/// Returns whether the message read was an audio chunk, or `None` once the
/// outbound half is closed or the client has gone away.
async fn read_one(
    outbound: &mut OutboundStream,
    received: &Mutex<Vec<OutboundMessage>>,
    tx: &EventSender,
) -> Option<bool> {
    tokio::select! {
        message = outbound.next() => {
            let message = message?;
            let is_chunk = matches!(message, OutboundMessage::Chunk(_));
            if let Ok(mut log) = received.lock() {
                log.push(message);
            }
            Some(is_chunk)
        }
        _ = tx.closed() => None,
    }
}
