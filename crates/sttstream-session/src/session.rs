use crate::grpc::GrpcTransport;
use crate::transport::{OutboundMessage, OutboundStream, RecognizerTransport};
use std::time::Duration;
use sttstream_audio::AudioSource;
use sttstream_core::{
    ApiKey, AudioError, ConnectionError, ErrorCode, RecognitionEvent, ServiceConfig,
    SessionConfig, SessionError, SessionState,
};
use sttstream_sink::ResultSink;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

const DEFAULT_OUTBOUND_BUFFER: usize = 16;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Upper bound for the whole run, call setup included.
    pub deadline: Option<Duration>,
    /// Hand interim hypotheses to [`ResultSink::accept_partial`].
    pub forward_partials: bool,
    /// Outbound messages buffered ahead of the transport.
    pub outbound_buffer: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            deadline: None,
            forward_partials: false,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub chunks_sent: usize,
    pub bytes_sent: u64,
    pub refinements: usize,
    pub partials: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct PumpStats {
    chunks: usize,
    bytes: u64,
    exhausted: bool,
}

type PumpResult = Result<PumpStats, AudioError>;

/// One recognition call: configuration first, then audio, with results
/// delivered to a sink while audio is still being sent.
///
/// A session is single-use. It starts `Idle` and ends `Closed` or `Failed`;
/// [`run`](Self::run) on a finished session is rejected.
pub struct StreamingSession<T: RecognizerTransport> {
    transport: T,
    options: SessionOptions,
    state: SessionState,
    state_listener: Option<mpsc::UnboundedSender<SessionState>>,
    cancel: CancellationToken,
}

impl StreamingSession<GrpcTransport> {
    /// Connects to the configured service. No call is made until [`run`](Self::run).
    pub async fn open(
        service: &ServiceConfig,
        api_key: &ApiKey,
        options: SessionOptions,
    ) -> Result<Self, ConnectionError> {
        let transport = GrpcTransport::connect(service, api_key).await?;
        Ok(Self::with_transport(transport, options))
    }
}

impl<T: RecognizerTransport> StreamingSession<T> {
    pub fn with_transport(transport: T, options: SessionOptions) -> Self {
        Self {
            transport,
            options,
            state: SessionState::Idle,
            state_listener: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Every state change is sent here, in order.
    pub fn set_state_listener(&mut self, listener: mpsc::UnboundedSender<SessionState>) {
        self.state_listener = Some(listener);
    }

    /// Cancelling the token stops a running session with `CANCELLED`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = ?self.state, to = ?next, "ignoring illegal session transition");
            return;
        }
        tracing::debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
        if let Some(ref listener) = self.state_listener {
            let _ = listener.send(next);
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        self.transition(SessionState::Failed);
        tracing::error!(code = %err.code, message = %err.message, "recognition session failed");
        err
    }

    /// Streams `source` to the service and feeds final refinements to `sink`.
    ///
    /// `source` is closed exactly once before this returns, whatever the
    /// outcome. Sink errors are logged and do not end the session.
    pub async fn run<S>(
        &mut self,
        config: &SessionConfig,
        source: S,
        sink: &mut dyn ResultSink,
    ) -> Result<SessionReport, SessionError>
    where
        S: AudioSource + 'static,
    {
        if self.state != SessionState::Idle {
            close_source(source);
            return Err(SessionError::new(
                ErrorCode::FailedPrecondition,
                format!("session already used (state {:?})", self.state),
            ));
        }

        if let Err(e) = config.validate() {
            close_source(source);
            return Err(self.fail(SessionError::new(ErrorCode::InvalidArgument, e.to_string())));
        }

        let deadline = self.options.deadline;
        let deadline_timer = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline_timer);
        let cancel = self.cancel.clone();

        self.transition(SessionState::Configuring);
        let (tx, rx) = mpsc::channel(self.options.outbound_buffer.max(1));
        // The receiver is still held here, so this cannot fail.
        let _ = tx.send(OutboundMessage::Config(config.clone())).await;
        tracing::info!(
            transport = self.transport.name(),
            source = source.name(),
            sample_rate = config.sample_rate_hz(),
            model = config.model(),
            "starting recognition session"
        );

        let pump_cancel = cancel.child_token();
        let mut pump = spawn_pump(source, tx, pump_cancel.clone());
        let mut pump_result: Option<PumpResult> = None;

        let outbound: OutboundStream = Box::pin(ReceiverStream::new(rx));
        let opened = tokio::select! {
            result = self.transport.recognize_streaming(outbound) => result,
            _ = cancel.cancelled() => Err(SessionError::cancelled()),
            _ = &mut deadline_timer => Err(deadline_exceeded(deadline)),
        };
        let mut inbound = match opened {
            Ok(inbound) => inbound,
            Err(err) => {
                pump_cancel.cancel();
                join_pump(&mut pump, &mut pump_result).await;
                return Err(self.fail(err));
            }
        };
        self.transition(SessionState::Streaming);

        let forward_partials = self.options.forward_partials;
        let mut report = SessionReport::default();

        let outcome: Result<(), SessionError> = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Err(SessionError::cancelled()),
                _ = &mut deadline_timer => break Err(deadline_exceeded(deadline)),
                joined = &mut pump, if pump_result.is_none() => {
                    match flatten_join(joined) {
                        Ok(stats) => {
                            tracing::debug!(
                                chunks = stats.chunks,
                                bytes = stats.bytes,
                                exhausted = stats.exhausted,
                                "audio sent, waiting for remaining results"
                            );
                            pump_result = Some(Ok(stats));
                            self.transition(SessionState::Draining);
                        }
                        Err(e) => {
                            let err = SessionError::new(
                                ErrorCode::Aborted,
                                format!("audio source failed: {e}"),
                            );
                            pump_result = Some(Err(e));
                            break Err(err);
                        }
                    }
                }
                item = inbound.next() => match item {
                    Some(Ok(event)) => deliver(event, sink, forward_partials, &mut report).await,
                    Some(Err(err)) => break Err(err),
                    None => break Ok(()),
                },
            }
        };

        if let Err(err) = outcome {
            pump_cancel.cancel();
            drop(inbound);
            join_pump(&mut pump, &mut pump_result).await;
            return Err(self.fail(err));
        }

        if pump_result.is_none() {
            pump_cancel.cancel();
            join_pump(&mut pump, &mut pump_result).await;
        }
        match pump_result {
            Some(Ok(stats)) => {
                if !stats.exhausted {
                    tracing::info!("service ended the call before all audio was sent");
                }
                report.chunks_sent = stats.chunks;
                report.bytes_sent = stats.bytes;
            }
            Some(Err(e)) => tracing::warn!("audio source failed after the call ended: {e}"),
            None => {}
        }

        if self.state == SessionState::Streaming {
            self.transition(SessionState::Draining);
        }
        self.transition(SessionState::Closed);
        tracing::info!(
            chunks = report.chunks_sent,
            bytes = report.bytes_sent,
            refinements = report.refinements,
            "recognition session closed"
        );
        Ok(report)
    }
}

async fn deliver(
    event: RecognitionEvent,
    sink: &mut dyn ResultSink,
    forward_partials: bool,
    report: &mut SessionReport,
) {
    match event {
        RecognitionEvent::FinalRefinement {
            final_index,
            alternatives,
        } => {
            report.refinements += 1;
            tracing::debug!(final_index, alternatives = alternatives.len(), "final refinement");
            if let Err(e) = sink.accept(&alternatives).await {
                tracing::error!(sink = sink.name(), "sink error: {e}");
            }
        }
        RecognitionEvent::PartialResult { alternatives } if forward_partials => {
            report.partials += 1;
            if let Err(e) = sink.accept_partial(&alternatives).await {
                tracing::error!(sink = sink.name(), "sink error: {e}");
            }
        }
        RecognitionEvent::SessionError { message } => {
            tracing::warn!(%message, "service reported a warning");
        }
        RecognitionEvent::SessionEnd { message } => {
            tracing::info!(%message, "service is closing the session");
        }
        other => tracing::trace!(event = other.tag(), "event not forwarded"),
    }
}

fn deadline_exceeded(deadline: Option<Duration>) -> SessionError {
    let limit = deadline.unwrap_or_default();
    SessionError::new(
        ErrorCode::DeadlineExceeded,
        format!("session did not finish within {}s", limit.as_secs_f64()),
    )
}

fn close_source<S: AudioSource>(mut source: S) {
    if let Err(e) = source.close() {
        tracing::warn!(source = source.name(), "failed to close audio source: {e}");
    }
}

/// Reads the source on a blocking thread and feeds the outbound channel.
///
/// The source is closed on every exit path, before the channel is dropped.
fn spawn_pump<S>(
    mut source: S,
    tx: mpsc::Sender<OutboundMessage>,
    cancel: CancellationToken,
) -> JoinHandle<PumpResult>
where
    S: AudioSource + 'static,
{
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || {
        let result = pump_chunks(&mut source, &tx, &cancel, &handle);
        close_source(source);
        drop(tx);
        result
    })
}

fn pump_chunks<S: AudioSource>(
    source: &mut S,
    tx: &mpsc::Sender<OutboundMessage>,
    cancel: &CancellationToken,
    handle: &Handle,
) -> PumpResult {
    let mut stats = PumpStats::default();
    loop {
        if cancel.is_cancelled() {
            return Ok(stats);
        }
        let chunk = match source.next_chunk()? {
            Some(chunk) => chunk,
            None => {
                stats.exhausted = true;
                return Ok(stats);
            }
        };
        if chunk.is_empty() {
            continue;
        }

        let len = chunk.len() as u64;
        let sent = handle.block_on(async {
            tokio::select! {
                result = tx.send(OutboundMessage::Chunk(chunk)) => result.is_ok(),
                _ = cancel.cancelled() => false,
            }
        });
        if !sent {
            return Ok(stats);
        }
        stats.chunks += 1;
        stats.bytes += len;
    }
}

fn flatten_join(joined: Result<PumpResult, tokio::task::JoinError>) -> PumpResult {
    joined.unwrap_or_else(|e| {
        Err(AudioError::Io(std::io::Error::other(format!(
            "audio task failed: {e}"
        ))))
    })
}

async fn join_pump(pump: &mut JoinHandle<PumpResult>, pump_result: &mut Option<PumpResult>) {
    if pump_result.is_none() {
        *pump_result = Some(flatten_join(pump.await));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptStep, ScriptedTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use sttstream_audio::BufferAudioSource;
    use sttstream_core::AudioChunk;
    use sttstream_sink::{ChannelSink, SinkMessage};

    /// Wraps a source and counts how often it is closed.
    struct CountingSource {
        inner: BufferAudioSource,
        closes: Arc<AtomicUsize>,
    }

    impl CountingSource {
        fn new(data: Vec<u8>, chunk_size: usize) -> (Self, Arc<AtomicUsize>) {
            let closes = Arc::new(AtomicUsize::new(0));
            let source = Self {
                inner: BufferAudioSource::new(data, chunk_size).unwrap(),
                closes: Arc::clone(&closes),
            };
            (source, closes)
        }
    }

    impl AudioSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        fn next_chunk(&mut self) -> Result<Option<AudioChunk>, AudioError> {
            self.inner.next_chunk()
        }

        fn close(&mut self) -> Result<(), AudioError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close()
        }
    }

    fn refinement(index: i64, texts: &[&str]) -> ScriptStep {
        ScriptStep::Event(RecognitionEvent::FinalRefinement {
            final_index: index,
            alternatives: texts.iter().map(|t| t.to_string()).collect(),
        })
    }

    fn drain_states(rx: &mut mpsc::UnboundedReceiver<SessionState>) -> Vec<SessionState> {
        let mut states = Vec::new();
        while let Ok(state) = rx.try_recv() {
            states.push(state);
        }
        states
    }

    #[tokio::test]
    async fn test_run_sends_config_then_chunks() {
        let transport = ScriptedTransport::new(vec![ScriptStep::AwaitOutboundClose]);
        let received = transport.received();
        let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
        let (mut sink, _rx) = ChannelSink::new();
        let source = BufferAudioSource::new(vec![7u8; 10000], 4000).unwrap();

        let report = session
            .run(&SessionConfig::default(), source, &mut sink)
            .await
            .unwrap();

        let log = received.lock().unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0], OutboundMessage::Config(SessionConfig::default()));
        let sizes: Vec<usize> = log[1..]
            .iter()
            .map(|m| match m {
                OutboundMessage::Chunk(c) => c.len(),
                OutboundMessage::Config(_) => panic!("config sent twice"),
            })
            .collect();
        assert_eq!(sizes, vec![4000, 4000, 2000]);
        assert_eq!(report.chunks_sent, 3);
        assert_eq!(report.bytes_sent, 10000);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_state_sequence_for_clean_run() {
        let transport = ScriptedTransport::new(vec![ScriptStep::AwaitOutboundClose]);
        let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
        let (state_tx, mut state_rx) = mpsc::unbounded_channel();
        session.set_state_listener(state_tx);
        let (mut sink, _rx) = ChannelSink::new();
        let source = BufferAudioSource::new(vec![1u8; 100], 40).unwrap();

        session
            .run(&SessionConfig::default(), source, &mut sink)
            .await
            .unwrap();

        assert_eq!(
            drain_states(&mut state_rx),
            vec![
                SessionState::Configuring,
                SessionState::Streaming,
                SessionState::Draining,
                SessionState::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn test_only_refinements_reach_the_sink() {
        let transport = ScriptedTransport::new(vec![
            ScriptStep::Event(RecognitionEvent::PartialResult {
                alternatives: vec!["при".to_string()],
            }),
            ScriptStep::Event(RecognitionEvent::FinalResult {
                alternatives: vec!["привет мир".to_string()],
            }),
            ScriptStep::Event(RecognitionEvent::EndOfUtterance { time_ms: 900 }),
            refinement(0, &["Привет, мир!", "привет мир"]),
            ScriptStep::Event(RecognitionEvent::SessionError {
                message: "warning".to_string(),
            }),
            ScriptStep::AwaitOutboundClose,
            refinement(1, &["Пока."]),
        ]);
        let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
        let (mut sink, mut rx) = ChannelSink::new();
        let source = BufferAudioSource::new(vec![0u8; 8000], 4000).unwrap();

        let report = session
            .run(&SessionConfig::default(), source, &mut sink)
            .await
            .unwrap();
        assert_eq!(report.refinements, 2);
        assert_eq!(report.partials, 0);

        assert_eq!(
            rx.try_recv().unwrap(),
            SinkMessage::Final(vec!["Привет, мир!".to_string(), "привет мир".to_string()])
        );
        assert_eq!(rx.try_recv().unwrap(), SinkMessage::Final(vec!["Пока.".to_string()]));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_partials_forwarded_when_enabled() {
        let transport = ScriptedTransport::new(vec![
            ScriptStep::Event(RecognitionEvent::PartialResult {
                alternatives: vec!["при".to_string()],
            }),
            refinement(0, &["привет"]),
        ]);
        let options = SessionOptions {
            forward_partials: true,
            ..SessionOptions::default()
        };
        let mut session = StreamingSession::with_transport(transport, options);
        let (mut sink, mut rx) = ChannelSink::new();
        let source = BufferAudioSource::new(Vec::new(), 4000).unwrap();

        let report = session
            .run(&SessionConfig::default(), source, &mut sink)
            .await
            .unwrap();
        assert_eq!(report.partials, 1);
        assert_eq!(rx.try_recv().unwrap(), SinkMessage::Partial(vec!["при".to_string()]));
        assert_eq!(rx.try_recv().unwrap(), SinkMessage::Final(vec!["привет".to_string()]));
    }

    #[tokio::test]
    async fn test_empty_source_sends_only_config() {
        let transport = ScriptedTransport::new(vec![ScriptStep::AwaitOutboundClose]);
        let received = transport.received();
        let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
        let (mut sink, mut rx) = ChannelSink::new();
        let (source, closes) = CountingSource::new(Vec::new(), 4000);

        let report = session
            .run(&SessionConfig::default(), source, &mut sink)
            .await
            .unwrap();

        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(report.chunks_sent, 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_service_failure_is_reported_unchanged() {
        let err = SessionError::new(ErrorCode::Unauthenticated, "Unknown api key");
        let transport = ScriptedTransport::new(vec![
            ScriptStep::AwaitChunks(1),
            ScriptStep::Fail(err.clone()),
        ]);
        let received = transport.received();
        let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
        let (state_tx, mut state_rx) = mpsc::unbounded_channel();
        session.set_state_listener(state_tx);
        let (mut sink, _rx) = ChannelSink::new();
        let (source, closes) = CountingSource::new(vec![0u8; 40000], 1000);

        let result = session.run(&SessionConfig::default(), source, &mut sink).await;

        assert_eq!(result, Err(err));
        assert_eq!(session.state(), SessionState::Failed);
        let states = drain_states(&mut state_rx);
        assert_eq!(states.iter().filter(|s| **s == SessionState::Failed).count(), 1);
        assert_eq!(states.last(), Some(&SessionState::Failed));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        // Config plus the single chunk read before the failure.
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_call_closes_source_once() {
        let err = SessionError::new(ErrorCode::PermissionDenied, "no access");
        for _ in 0..3 {
            let transport = ScriptedTransport::rejecting(err.clone());
            let mut session =
                StreamingSession::with_transport(transport, SessionOptions::default());
            let (mut sink, _rx) = ChannelSink::new();
            let (source, closes) = CountingSource::new(vec![0u8; 4000], 100);

            let result = session.run(&SessionConfig::default(), source, &mut sink).await;
            assert_eq!(result, Err(err.clone()));
            assert_eq!(closes.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_call() {
        let transport = ScriptedTransport::new(Vec::new());
        let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
        let (mut sink, _rx) = ChannelSink::new();
        let (source, closes) = CountingSource::new(vec![0u8; 10], 4);

        let result = session
            .run(&SessionConfig::new(0, 1), source, &mut sink)
            .await;

        assert_eq!(result.unwrap_err().code, ErrorCode::InvalidArgument);
        assert_eq!(session.transport().call_count(), 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_finished_session_rejects_second_run() {
        let transport = ScriptedTransport::new(Vec::new());
        let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
        let (mut sink, _rx) = ChannelSink::new();

        session
            .run(
                &SessionConfig::default(),
                BufferAudioSource::new(Vec::new(), 1).unwrap(),
                &mut sink,
            )
            .await
            .unwrap();
        let (source, closes) = CountingSource::new(vec![0u8; 10], 4);
        let result = session.run(&SessionConfig::default(), source, &mut sink).await;

        assert_eq!(result.unwrap_err().code, ErrorCode::FailedPrecondition);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_deadline_expires_stalled_call() {
        let transport = ScriptedTransport::new(vec![ScriptStep::Stall]);
        let options = SessionOptions {
            deadline: Some(Duration::from_millis(100)),
            ..SessionOptions::default()
        };
        let mut session = StreamingSession::with_transport(transport, options);
        let (mut sink, _rx) = ChannelSink::new();
        let (source, closes) = CountingSource::new(vec![0u8; 100], 10);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            session.run(&SessionConfig::default(), source, &mut sink),
        )
        .await
        .expect("run did not honor the deadline");

        assert_eq!(result.unwrap_err().code, ErrorCode::DeadlineExceeded);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_cancellation_stops_stalled_call() {
        let transport = ScriptedTransport::new(vec![ScriptStep::Stall]);
        let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
        let token = session.cancellation_token();
        let (mut sink, _rx) = ChannelSink::new();
        let (source, closes) = CountingSource::new(vec![0u8; 100], 10);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            session.run(&SessionConfig::default(), source, &mut sink),
        )
        .await
        .expect("run ignored cancellation");

        assert_eq!(result, Err(SessionError::cancelled()));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_early_server_end_stops_pump() {
        let transport = ScriptedTransport::new(vec![
            ScriptStep::AwaitChunks(2),
            refinement(0, &["done"]),
        ]);
        let received = transport.received();
        let options = SessionOptions {
            outbound_buffer: 1,
            ..SessionOptions::default()
        };
        let mut session = StreamingSession::with_transport(transport, options);
        let (mut sink, mut rx) = ChannelSink::new();
        let (source, closes) = CountingSource::new(vec![0u8; 1_000_000], 100);

        let report = session
            .run(&SessionConfig::default(), source, &mut sink)
            .await
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), SinkMessage::Final(vec!["done".to_string()]));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(report.chunks_sent < 10_000);
        assert_eq!(received.lock().unwrap().len(), 3);
        assert_eq!(session.state(), SessionState::Closed);
    }
}
