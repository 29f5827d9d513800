use sttstream_core::{AudioChunk, AudioError};

/// Where session audio comes from.
///
/// A source hands out non-empty chunks in capture order, then signals
/// end-of-stream exactly once with `Ok(None)`. Calling
/// [`next_chunk`](Self::next_chunk) after that is an error; a source is
/// restarted by building a new one.
///
/// [`close`](Self::close) releases the underlying file or device. It must be
/// safe to call at any point, including after end-of-stream, and more than once.
pub trait AudioSource: Send {
    /// Short label for logs (e.g. `"file"`, `"microphone"`).
    fn name(&self) -> &str;
    /// Blocks until the next chunk is available.
    fn next_chunk(&mut self) -> Result<Option<AudioChunk>, AudioError>;
    fn close(&mut self) -> Result<(), AudioError>;
}

impl<T: AudioSource + ?Sized> AudioSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_chunk(&mut self) -> Result<Option<AudioChunk>, AudioError> {
        (**self).next_chunk()
    }

    fn close(&mut self) -> Result<(), AudioError> {
        (**self).close()
    }
}

/// An in-memory source, chunked the same way a file is.
pub struct BufferAudioSource {
    data: Vec<u8>,
    offset: usize,
    chunk_size: usize,
    ended: bool,
    closed: bool,
}

impl BufferAudioSource {
    pub fn new(data: Vec<u8>, chunk_size: usize) -> Result<Self, AudioError> {
        if chunk_size == 0 {
            return Err(AudioError::InvalidSettings(
                "chunk size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            data,
            offset: 0,
            chunk_size,
            ended: false,
            closed: false,
        })
    }
}

impl AudioSource for BufferAudioSource {
    fn name(&self) -> &str {
        "buffer"
    }

    fn next_chunk(&mut self) -> Result<Option<AudioChunk>, AudioError> {
        if self.ended {
            return Err(AudioError::Exhausted);
        }
        if self.closed {
            return Err(AudioError::Closed);
        }
        if self.offset >= self.data.len() {
            self.ended = true;
            return Ok(None);
        }
        let end = self
            .offset
            .saturating_add(self.chunk_size)
            .min(self.data.len());
        let chunk = AudioChunk::new(self.data[self.offset..end].to_vec());
        self.offset = end;
        Ok(Some(chunk))
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.closed = true;
        Ok(())
    }
}
