use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;
use sttstream_core::AudioError;

/// Convert normalized float samples to little-endian signed 16-bit PCM.
pub fn pcm16_from_f32(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Persist raw 16-bit PCM as a WAV container matching the capture settings.
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, pcm: &[u8]) -> Result<(), AudioError> {
    if pcm.len() % 2 != 0 {
        return Err(AudioError::Wav(format!(
            "PCM16 payload has odd length {}",
            pcm.len()
        )));
    }
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(|e| AudioError::Wav(e.to_string()))?;
    for pair in pcm.chunks_exact(2) {
        writer
            .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
            .map_err(|e| AudioError::Wav(e.to_string()))?;
    }
    writer.finalize().map_err(|e| AudioError::Wav(e.to_string()))?;
    tracing::info!(
        path = %path.display(),
        bytes = pcm.len(),
        sample_rate,
        channels,
        "recording saved"
    );
    Ok(())
}
