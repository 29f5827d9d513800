use crate::convert::CaptureConverter;
use crate::device::DeviceManager;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use sttstream_core::AudioError;

// ── CaptureNode ───────────────────────────────────────────────

/// Owns a running input stream on a dedicated thread.
///
/// The device is opened in its native format; samples are converted to
/// `sample_rate`/`channels` before they reach the producer.
///
/// The platform stream handle cannot cross threads, so it is built, played
/// and dropped on the capture thread. [`stop`](Self::stop) (or dropping the
/// node) releases the device.
pub struct CaptureNode {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    faulted: Arc<AtomicBool>,
}

impl CaptureNode {
    pub fn start(
        device_name: &str,
        producer: HeapProd<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let faulted = Arc::new(AtomicBool::new(false));
        let faulted_flag = Arc::clone(&faulted);
        let device_name = device_name.to_string();

        let thread = std::thread::Builder::new()
            .name("sttstream-capture".to_string())
            .spawn(move || {
                let stream =
                    match open_stream(&device_name, producer, sample_rate, channels, faulted_flag) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                let _ = ready_tx.send(Ok(()));

                // Parked until stop() or the node is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!(device = %device_name, "capture stream released");
            })
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop_tx: Some(stop_tx),
                thread: Some(thread),
                faulted,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::DeviceUnavailable(
                    "capture thread exited before the stream started".to_string(),
                ))
            }
        }
    }

    /// Whether the platform reported a stream error since start.
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// Release the device. Returns `true` only for the call that released it.
    pub fn stop(&mut self) -> bool {
        let Some(stop_tx) = self.stop_tx.take() else {
            return false;
        };
        let _ = stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        true
    }
}

impl Drop for CaptureNode {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream(
    device_name: &str,
    producer: HeapProd<f32>,
    sample_rate: u32,
    channels: u16,
    faulted: Arc<AtomicBool>,
) -> Result<Stream, AudioError> {
    let manager = DeviceManager::new();
    let device = manager.get_input_device(device_name)?;
    let native = manager.native_input_config(&device)?;
    let sample_format = native.sample_format();
    let config: StreamConfig = native.config();
    let converter =
        CaptureConverter::new(config.sample_rate.0, config.channels, sample_rate, channels)?;

    let err_callback = move |err: cpal::StreamError| {
        tracing::error!("capture stream error: {}", err);
        faulted.store(true, Ordering::Relaxed);
    };

    let stream = match sample_format {
        SampleFormat::F32 => build::<f32>(&device, &config, producer, converter, err_callback),
        SampleFormat::I16 => build::<i16>(&device, &config, producer, converter, err_callback),
        SampleFormat::U16 => build::<u16>(&device, &config, producer, converter, err_callback),
        other => {
            return Err(AudioError::StreamBuild(format!(
                "unsupported capture sample format {other:?}"
            )))
        }
    }
    .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

    tracing::debug!(
        device = %device_name,
        native_rate = config.sample_rate.0,
        native_channels = config.channels,
        format = ?sample_format,
        sample_rate,
        channels,
        "capture stream started"
    );
    Ok(stream)
}

fn build<T>(
    device: &Device,
    config: &StreamConfig,
    mut producer: HeapProd<f32>,
    mut converter: CaptureConverter,
    err_callback: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples = data.iter().map(|&s| f32::from_sample(s));
            converter.push(samples, |block| {
                // Overflow is dropped; the consumer notices the gap as a stall.
                producer.push_slice(block);
            });
        },
        err_callback,
        None,
    )
}
