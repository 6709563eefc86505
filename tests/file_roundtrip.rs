use std::fs;
use std::path::Path;

use chunked_huffman::{
    run, CodebookMode, CodecConfig, HuffmanCodec, HuffmanError, Operation, Properties,
};
use filetime::FileTime;
use tempfile::TempDir;

fn write_input(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn small_chunks(mode: CodebookMode) -> CodecConfig {
    CodecConfig::default()
        .with_parallelism(Some(4))
        .with_chunk_size(Some(4096))
        .with_mode(mode)
}

fn sample_text() -> Vec<u8> {
    let mut text = Vec::new();
    for i in 0..2000 {
        text.extend_from_slice(format!("line {i}: the rain in spain stays mainly in the plain\n").as_bytes());
    }
    text
}

#[test]
fn encode_then_decode_restores_contents_and_times() {
    let work = TempDir::new().unwrap();
    let packed_dir = work.path().join("packed");
    let restored_dir = work.path().join("restored");
    fs::create_dir_all(&packed_dir).unwrap();
    fs::create_dir_all(&restored_dir).unwrap();

    let original = sample_text();
    let input = write_input(work.path(), "weather report.v2.txt", &original);
    let modified = FileTime::from_unix_time(1_650_000_000, 0);
    filetime::set_file_mtime(&input, modified).unwrap();
    let recorded = Properties::from_path(&input).unwrap();

    let codec = HuffmanCodec::new(small_chunks(CodebookMode::Full)).unwrap();
    let packed = codec.encode_file(&input, &packed_dir).unwrap();
    assert_eq!(packed, packed_dir.join("weather report.hc"));
    assert!(fs::metadata(&packed).unwrap().len() < original.len() as u64);

    let restored = codec.decode_file(&packed, &restored_dir).unwrap();
    assert_eq!(restored, restored_dir.join("weather report.v2.txt"));

    // Stat before reading: reading may bump the access time.
    let meta = fs::metadata(&restored).unwrap();
    assert_eq!(FileTime::from_last_modification_time(&meta), modified);
    assert_eq!(FileTime::from_last_access_time(&meta), recorded.created);
    assert_eq!(fs::read(&restored).unwrap(), original);
}

#[cfg(unix)]
#[test]
fn backslash_in_file_name_roundtrips() {
    let work = TempDir::new().unwrap();
    let out_dir = work.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();

    let original = sample_text();
    let input = write_input(work.path(), "report\\v2.txt", &original);

    let codec = HuffmanCodec::new(small_chunks(CodebookMode::Full)).unwrap();
    let packed = codec.encode_file(&input, work.path()).unwrap();
    let restored = codec.decode_file(&packed, &out_dir).unwrap();
    assert_eq!(restored, out_dir.join("report\\v2.txt"));
    assert_eq!(fs::read(&restored).unwrap(), original);
}

#[test]
fn partial_mode_roundtrips_through_files() {
    let work = TempDir::new().unwrap();
    let data: Vec<u8> = (0..200_000).map(|i| if i % 10 == 0 { b'#' } else { b'.' }).collect();
    let input = write_input(work.path(), "dots.txt", &data);

    let config = small_chunks(CodebookMode::Partial);
    let packed = run(Operation::Encode, &input, work.path(), config.clone()).unwrap();

    let out_dir = work.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    let restored = run(Operation::Decode, &packed, &out_dir, config).unwrap();
    assert_eq!(fs::read(restored).unwrap(), data);
}

#[test]
fn binary_input_with_ff_bytes_roundtrips() {
    let work = TempDir::new().unwrap();
    let mut data = vec![0xFFu8; 30_000];
    data.extend((0..=255u8).cycle().take(30_000));
    let input = write_input(work.path(), "blob.bin", &data);

    let codec = HuffmanCodec::new(small_chunks(CodebookMode::Full)).unwrap();
    let packed = codec.encode_file(&input, work.path()).unwrap();
    let out_dir = work.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    let restored = codec.decode_file(&packed, &out_dir).unwrap();
    assert_eq!(fs::read(restored).unwrap(), data);
}

#[test]
fn missing_input_is_input_error() {
    let work = TempDir::new().unwrap();
    let codec = HuffmanCodec::new(CodecConfig::default()).unwrap();
    let err = codec
        .encode_file(&work.path().join("nope.txt"), work.path())
        .unwrap_err();
    assert!(matches!(err, HuffmanError::Input { .. }));
}

#[test]
fn truncated_container_fails_and_leaves_no_output() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), "short.txt", b"abracadabra abracadabra");
    let codec = HuffmanCodec::new(small_chunks(CodebookMode::Full)).unwrap();
    let packed = codec.encode_file(&input, work.path()).unwrap();

    // Cut right after the codebook sentinel: header and codebook intact,
    // no frames.
    let bytes = fs::read(&packed).unwrap();
    let sentinel = bytes.windows(2).position(|w| w == [0xFF, 0xFF]).unwrap();
    fs::write(&packed, &bytes[..sentinel + 2]).unwrap();

    let out_dir = work.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    let err = codec.decode_file(&packed, &out_dir).unwrap_err();
    assert!(err.is_format(), "{err}");
    assert!(!out_dir.join("short.txt").exists());
}

#[test]
fn encoding_refuses_to_overwrite_its_input() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), "loop.hc", b"some bytes");
    let codec = HuffmanCodec::new(CodecConfig::default()).unwrap();
    let err = codec.encode_file(&input, work.path()).unwrap_err();
    assert!(matches!(err, HuffmanError::InvalidInput(_)));
    assert_eq!(fs::read(&input).unwrap(), b"some bytes");
}
