use crate::source::AudioSource;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use sttstream_core::{AudioChunk, AudioError};

/// Streams a file's bytes verbatim in chunks of at most `chunk_size`.
///
/// The file is opened on construction so that a missing or unreadable file
/// surfaces before any session traffic.
pub struct FileAudioSource {
    path: PathBuf,
    file: Option<File>,
    chunk_size: usize,
    ended: bool,
    bytes_read: u64,
}

impl FileAudioSource {
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, AudioError> {
        if chunk_size == 0 {
            return Err(AudioError::InvalidSettings(
                "chunk size must be > 0".to_string(),
            ));
        }
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| AudioError::Open {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), chunk_size, "opened audio file");
        Ok(Self {
            path,
            file: Some(file),
            chunk_size,
            ended: false,
            bytes_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/// Fill `buf` as far as the reader allows. Short only at end of file.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl AudioSource for FileAudioSource {
    fn name(&self) -> &str {
        "file"
    }

    fn next_chunk(&mut self) -> Result<Option<AudioChunk>, AudioError> {
        if self.ended {
            return Err(AudioError::Exhausted);
        }
        let file = self.file.as_mut().ok_or(AudioError::Closed)?;

        let mut buf = vec![0u8; self.chunk_size];
        let n = read_up_to(file, &mut buf)?;
        if n == 0 {
            self.ended = true;
            self.file = None;
            tracing::debug!(
                path = %self.path.display(),
                bytes = self.bytes_read,
                "audio file exhausted"
            );
            return Ok(None);
        }
        buf.truncate(n);
        self.bytes_read += n as u64;
        Ok(Some(AudioChunk::new(buf)))
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if self.file.take().is_some() {
            tracing::debug!(path = %self.path.display(), "closed audio file");
        }
        Ok(())
    }
}
