pub mod capture;
pub mod convert;
pub mod device;
pub mod file;
pub mod microphone;
pub mod recording;
pub mod source;

pub use capture::CaptureNode;
pub use convert::CaptureConverter;
pub use device::DeviceManager;
pub use file::FileAudioSource;
pub use microphone::{chunk_count, MicrophoneAudioSource, MicrophoneOptions};
pub use recording::{pcm16_from_f32, write_wav};
pub use source::{AudioSource, BufferAudioSource};

use ringbuf::traits::Split;
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Create a ring buffer split into producer and consumer halves.
pub fn create_ring_buffer(capacity: usize) -> (HeapProd<f32>, HeapCons<f32>) {
    HeapRb::<f32>::new(capacity).split()
}
