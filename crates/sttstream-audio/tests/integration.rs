use sttstream_audio::{AudioSource, BufferAudioSource, FileAudioSource};
use sttstream_core::AudioError;

fn drain_sizes(source: &mut dyn AudioSource) -> Vec<usize> {
    let mut sizes = Vec::new();
    while let Some(chunk) = source.next_chunk().unwrap() {
        sizes.push(chunk.len());
    }
    sizes
}

#[test]
fn test_file_and_buffer_sources_chunk_identically() {
    let data: Vec<u8> = (0..12345u32).map(|i| (i * 7 % 256) as u8).collect();
    let dir = std::env::temp_dir().join("sttstream_audio_integ");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("sample.raw");
    std::fs::write(&path, &data).unwrap();

    let mut file = FileAudioSource::open(&path, 4000).unwrap();
    let mut buffer = BufferAudioSource::new(data, 4000).unwrap();

    let file_sizes = drain_sizes(&mut file);
    let buffer_sizes = drain_sizes(&mut buffer);
    assert_eq!(file_sizes, vec![4000, 4000, 4000, 345]);
    assert_eq!(file_sizes, buffer_sizes);

    file.close().unwrap();
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_repeated_file_sources_release_handles() {
    let dir = std::env::temp_dir().join("sttstream_audio_reopen");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("reopen.raw");
    std::fs::write(&path, [0u8; 100]).unwrap();

    for _ in 0..64 {
        let mut source: Box<dyn AudioSource> = Box::new(FileAudioSource::open(&path, 30).unwrap());
        source.next_chunk().unwrap();
        source.close().unwrap();
        assert!(matches!(source.next_chunk(), Err(AudioError::Closed)));
    }

    std::fs::remove_dir_all(&dir).unwrap();
}
