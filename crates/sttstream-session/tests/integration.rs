use std::time::Duration;
use sttstream_audio::{AudioSource, FileAudioSource};
use sttstream_core::{ErrorCode, RecognitionEvent, SessionConfig, SessionError, SessionState};
use sttstream_session::{
    OutboundMessage, ScriptStep, ScriptedTransport, SessionOptions, StreamingSession,
};
use sttstream_sink::{ChannelSink, FileSink, ResultSink, SinkMessage};

fn refinement(index: i64, texts: &[&str]) -> ScriptStep {
    ScriptStep::Event(RecognitionEvent::FinalRefinement {
        final_index: index,
        alternatives: texts.iter().map(|t| t.to_string()).collect(),
    })
}

fn write_audio(dir: &std::path::Path, len: usize) -> std::path::PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join("input.wav");
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

#[tokio::test]
async fn test_file_source_streams_every_byte_in_order() {
    let dir = std::env::temp_dir().join("sttstream_session_file_order");
    let path = write_audio(&dir, 10000);

    let transport = ScriptedTransport::new(vec![
        ScriptStep::AwaitOutboundClose,
        refinement(0, &["привет"]),
    ]);
    let received = transport.received();
    let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
    let (mut sink, mut rx) = ChannelSink::new();
    let source = FileAudioSource::open(&path, 4000).unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        session.run(&SessionConfig::default(), source, &mut sink),
    )
    .await
    .expect("timed out")
    .expect("session failed");

    assert_eq!(report.chunks_sent, 3);
    let log = received.lock().unwrap();
    assert!(matches!(log[0], OutboundMessage::Config(_)));
    let sent: Vec<u8> = log[1..]
        .iter()
        .flat_map(|m| match m {
            OutboundMessage::Chunk(c) => c.data.clone(),
            OutboundMessage::Config(_) => panic!("config after audio"),
        })
        .collect();
    assert_eq!(sent, std::fs::read(&path).unwrap());
    assert_eq!(
        rx.try_recv().unwrap(),
        SinkMessage::Final(vec!["привет".to_string()])
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_refinements_written_to_file_sink() {
    let dir = std::env::temp_dir().join("sttstream_session_file_sink");
    let path = write_audio(&dir, 3000);
    let out = dir.join("transcript.txt");

    let transport = ScriptedTransport::new(vec![
        ScriptStep::AwaitChunks(1),
        refinement(0, &["первая фраза", "первая фраза?"]),
        ScriptStep::AwaitOutboundClose,
        refinement(1, &["вторая фраза"]),
    ]);
    let mut session = StreamingSession::with_transport(transport, SessionOptions::default());
    let mut sink = FileSink::new();
    sink.initialize(toml::Value::Table({
        let mut t = toml::map::Map::new();
        t.insert(
            "path".to_string(),
            toml::Value::String(out.to_string_lossy().into_owned()),
        );
        t
    }))
    .await
    .unwrap();

    session
        .run(
            &SessionConfig::default(),
            FileAudioSource::open(&path, 1000).unwrap(),
            &mut sink,
        )
        .await
        .unwrap();
    sink.shutdown().await.unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(text, "первая фраза\nпервая фраза?\nвторая фраза\n");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_repeated_failing_runs_never_leak_sources() {
    let dir = std::env::temp_dir().join("sttstream_session_failures");
    let path = write_audio(&dir, 50_000);
    let err = SessionError::new(ErrorCode::ResourceExhausted, "quota exceeded");

    for _ in 0..32 {
        let transport = ScriptedTransport::new(vec![
            ScriptStep::AwaitChunks(2),
            ScriptStep::Fail(err.clone()),
        ]);
        let received = transport.received();
        let mut session =
            StreamingSession::with_transport(transport, SessionOptions::default());
        let (state_tx, mut state_rx) = tokio::sync::mpsc::unbounded_channel();
        session.set_state_listener(state_tx);
        let (mut sink, _rx) = ChannelSink::new();
        let source: Box<dyn AudioSource> =
            Box::new(FileAudioSource::open(&path, 500).unwrap());

        let result = session.run(&SessionConfig::default(), source, &mut sink).await;
        assert_eq!(result, Err(err.clone()));
        assert_eq!(received.lock().unwrap().len(), 3);

        let mut failed = 0;
        while let Ok(state) = state_rx.try_recv() {
            if state == SessionState::Failed {
                failed += 1;
            }
        }
        assert_eq!(failed, 1);
    }

    std::fs::remove_dir_all(&dir).unwrap();
}
