use crate::capture::CaptureNode;
use crate::create_ring_buffer;
use crate::recording::{pcm16_from_f32, write_wav};
use crate::source::AudioSource;
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use sttstream_core::{AudioChunk, AudioError};

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const MIN_STALL_TIMEOUT: Duration = Duration::from_secs(2);
/// Seconds of audio the ring buffer holds ahead of the reader.
const RING_SLACK_SECS: usize = 4;

#[derive(Debug, Clone)]
pub struct MicrophoneOptions {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per emitted chunk.
    pub chunk_frames: usize,
    pub duration_secs: u32,
    /// Where the captured audio is saved once capture completes.
    pub recording_path: Option<PathBuf>,
}

/// Number of chunks a duration-bounded capture emits.
pub fn chunk_count(sample_rate: u32, chunk_frames: usize, duration_secs: u32) -> usize {
    if chunk_frames == 0 {
        return 0;
    }
    let frames = sample_rate as u64 * duration_secs as u64;
    frames.div_ceil(chunk_frames as u64) as usize
}

/// Ring buffer size for a capture format, independent of the recording length.
fn ring_capacity(sample_rate: u32, channels: u16) -> usize {
    sample_rate as usize * channels as usize * RING_SLACK_SECS
}

fn validate(options: &MicrophoneOptions) -> Result<usize, AudioError> {
    if options.chunk_frames == 0 {
        return Err(AudioError::InvalidSettings(
            "chunk size must be > 0".to_string(),
        ));
    }
    if options.sample_rate == 0 || options.channels == 0 {
        return Err(AudioError::InvalidSettings(
            "sample rate and channel count must be > 0".to_string(),
        ));
    }

    // The whole recording is kept as PCM16 for the WAV file.
    let recording_bytes = u64::from(options.sample_rate)
        .checked_mul(u64::from(options.duration_secs))
        .and_then(|frames| frames.checked_mul(u64::from(options.channels) * 2))
        .and_then(|bytes| usize::try_from(bytes).ok());
    if recording_bytes.is_none() {
        return Err(AudioError::InvalidSettings(format!(
            "recording of {} s at {} Hz does not fit in memory",
            options.duration_secs, options.sample_rate
        )));
    }

    Ok(chunk_count(
        options.sample_rate,
        options.chunk_frames,
        options.duration_secs,
    ))
}

/// Live capture for a fixed duration, emitted as 16-bit PCM chunks.
///
/// The device is held from construction until the last chunk has been read
/// or [`close`](AudioSource::close) is called, whichever comes first. On
/// normal completion the captured audio is also written to `recording_path`.
pub struct MicrophoneAudioSource {
    capture: Option<CaptureNode>,
    consumer: HeapCons<f32>,
    options: MicrophoneOptions,
    chunks_total: usize,
    chunks_emitted: usize,
    recorded: Vec<u8>,
    stall_timeout: Duration,
    ended: bool,
    closed: bool,
}

impl MicrophoneAudioSource {
    pub fn open(options: MicrophoneOptions) -> Result<Self, AudioError> {
        let chunks_total = validate(&options)?;
        let (producer, consumer) =
            create_ring_buffer(ring_capacity(options.sample_rate, options.channels));

        let capture = CaptureNode::start(
            &options.device_name,
            producer,
            options.sample_rate,
            options.channels,
        )?;

        tracing::info!(
            device = %options.device_name,
            seconds = options.duration_secs,
            chunks = chunks_total,
            "recording started"
        );
        Ok(Self::from_consumer(options, chunks_total, consumer, Some(capture)))
    }

    /// Chunking and persistence over samples already arriving in `consumer`.
    fn from_consumer(
        options: MicrophoneOptions,
        chunks_total: usize,
        consumer: HeapCons<f32>,
        capture: Option<CaptureNode>,
    ) -> Self {
        let chunk_duration =
            Duration::from_secs_f64(options.chunk_frames as f64 / options.sample_rate as f64);
        let stall_timeout = MIN_STALL_TIMEOUT.max(chunk_duration * 4);

        Self {
            capture,
            consumer,
            options,
            chunks_total,
            chunks_emitted: 0,
            recorded: Vec::new(),
            stall_timeout,
            ended: false,
            closed: false,
        }
    }

    pub fn chunks_total(&self) -> usize {
        self.chunks_total
    }

    fn release_device(&mut self) -> bool {
        match self.capture.take() {
            Some(mut capture) => capture.stop(),
            None => false,
        }
    }

    fn finish(&mut self) -> Result<(), AudioError> {
        self.ended = true;
        self.release_device();
        tracing::info!(chunks = self.chunks_emitted, "recording finished");
        if let Some(ref path) = self.options.recording_path {
            write_wav(
                path,
                self.options.sample_rate,
                self.options.channels,
                &self.recorded,
            )?;
        }
        Ok(())
    }

    fn read_samples(&mut self, wanted: usize) -> Result<Vec<f32>, AudioError> {
        let mut samples = vec![0.0f32; wanted];
        let mut filled = 0;
        let mut last_progress = Instant::now();
        while filled < wanted {
            let n = self.consumer.pop_slice(&mut samples[filled..]);
            if n > 0 {
                filled += n;
                last_progress = Instant::now();
                continue;
            }
            let faulted = self.capture.as_ref().is_some_and(|c| c.is_faulted());
            if faulted || last_progress.elapsed() > self.stall_timeout {
                return Err(AudioError::DeviceUnavailable(format!(
                    "capture stalled after {} of {} chunks",
                    self.chunks_emitted, self.chunks_total
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        Ok(samples)
    }
}

impl AudioSource for MicrophoneAudioSource {
    fn name(&self) -> &str {
        "microphone"
    }

    fn next_chunk(&mut self) -> Result<Option<AudioChunk>, AudioError> {
        if self.ended {
            return Err(AudioError::Exhausted);
        }
        if self.closed {
            return Err(AudioError::Closed);
        }
        if self.chunks_emitted >= self.chunks_total {
            self.finish()?;
            return Ok(None);
        }

        let wanted = self.options.chunk_frames * self.options.channels as usize;
        let samples = self.read_samples(wanted)?;
        let pcm = pcm16_from_f32(&samples);
        self.recorded.extend_from_slice(&pcm);
        self.chunks_emitted += 1;
        tracing::trace!(
            chunk = self.chunks_emitted,
            total = self.chunks_total,
            "captured chunk"
        );
        Ok(Some(AudioChunk::new(pcm)))
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if !self.ended {
            self.closed = true;
        }
        if self.release_device() {
            tracing::debug!("capture device closed before completion");
        }
        Ok(())
    }
}

impl Drop for MicrophoneAudioSource {
    fn drop(&mut self) {
        self.release_device();
    }
}
