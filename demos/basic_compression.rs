use std::fs;
use std::path::Path;

use chunked_huffman::{CodebookMode, CodecConfig, HuffmanCodec};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let work = Path::new("huffman-demo");
    let restored_dir = work.join("restored");
    fs::create_dir_all(&restored_dir)?;

    let sample_text = "Hello, world! This is a sample text for Huffman compression. \
                      The quick brown fox jumps over the lazy dog. \
                      Huffman encoding is a greedy algorithm that builds optimal prefix codes.\n"
        .repeat(500);
    let input = work.join("sample.txt");
    fs::write(&input, &sample_text)?;
    println!("Created sample file: {} bytes", sample_text.len());

    for mode in [CodebookMode::Full, CodebookMode::Partial] {
        let codec = HuffmanCodec::new(CodecConfig::default().with_mode(mode))?;

        let packed = codec.encode_file(&input, work)?;
        let compressed_size = fs::metadata(&packed)?.len();
        println!(
            "{mode:?}: compressed to {} bytes ({:.1}% of original)",
            compressed_size,
            compressed_size as f64 / sample_text.len() as f64 * 100.0
        );

        let restored = codec.decode_file(&packed, &restored_dir)?;
        if fs::read_to_string(&restored)? != sample_text {
            return Err("decompressed data does not match".into());
        }
        println!("{mode:?}: decompression successful, data matches exactly");
    }

    fs::remove_dir_all(work)?;
    Ok(())
}
