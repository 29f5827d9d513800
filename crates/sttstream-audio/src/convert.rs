use rubato::{FftFixedIn, Resampler};
use sttstream_core::AudioError;

const RESAMPLER_CHUNK_FRAMES: usize = 1024;

/// Turns interleaved samples in the device's native layout into interleaved
/// samples at the session rate and channel count.
///
/// Frames are downmixed to mono, resampled when the rates differ and then
/// copied to every output channel.
pub struct CaptureConverter {
    device_channels: usize,
    target_channels: usize,
    resampler: Option<FftFixedIn<f32>>,
    frame_sum: f32,
    frame_fill: usize,
    mono: Vec<f32>,
    out: Vec<f32>,
}

impl CaptureConverter {
    pub fn new(
        device_rate: u32,
        device_channels: u16,
        target_rate: u32,
        target_channels: u16,
    ) -> Result<Self, AudioError> {
        if device_rate == 0 || device_channels == 0 || target_rate == 0 || target_channels == 0 {
            return Err(AudioError::InvalidSettings(format!(
                "cannot convert {device_rate} Hz/{device_channels} ch to {target_rate} Hz/{target_channels} ch"
            )));
        }

        let resampler = if device_rate != target_rate {
            let resampler = FftFixedIn::<f32>::new(
                device_rate as usize,
                target_rate as usize,
                RESAMPLER_CHUNK_FRAMES,
                1,
                1,
            )
            .map_err(|e| AudioError::StreamBuild(format!("resampler: {e}")))?;
            Some(resampler)
        } else {
            None
        };

        Ok(Self {
            device_channels: device_channels as usize,
            target_channels: target_channels as usize,
            resampler,
            frame_sum: 0.0,
            frame_fill: 0,
            mono: Vec::with_capacity(RESAMPLER_CHUNK_FRAMES * 2),
            out: Vec::new(),
        })
    }

    pub fn is_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    /// Feed device samples; `emit` is called at most once with whatever
    /// converted output is ready.
    pub fn push<I>(&mut self, samples: I, mut emit: impl FnMut(&[f32]))
    where
        I: IntoIterator<Item = f32>,
    {
        for sample in samples {
            self.frame_sum += sample;
            self.frame_fill += 1;
            if self.frame_fill < self.device_channels {
                continue;
            }
            self.mono.push(self.frame_sum / self.device_channels as f32);
            self.frame_sum = 0.0;
            self.frame_fill = 0;

            if let Some(ref mut resampler) = self.resampler {
                if self.mono.len() >= resampler.input_frames_next() {
                    match resampler.process(&[&self.mono[..]], None) {
                        Ok(resampled) => {
                            spread(&resampled[0], self.target_channels, &mut self.out)
                        }
                        Err(e) => tracing::warn!("dropping capture block: {e}"),
                    }
                    self.mono.clear();
                }
            }
        }

        if self.resampler.is_none() {
            spread(&self.mono, self.target_channels, &mut self.out);
            self.mono.clear();
        }
        if !self.out.is_empty() {
            emit(&self.out);
            self.out.clear();
        }
    }
}

fn spread(mono: &[f32], channels: usize, out: &mut Vec<f32>) {
    for &sample in mono {
        out.extend(std::iter::repeat(sample).take(channels));
    }
}
