use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::adaptive::AdaptiveRefinement;
use crate::codebook::Codebook;
use crate::compressed_data::ContainerReader;
use crate::config::{CodebookMode, CodecConfig, Operation};
use crate::error::{HuffmanError, Result};
use crate::frequency::FrequencyTable;
use crate::metadata::{read_preamble, write_preamble, Preamble, Properties};
use crate::pipeline::{BodyStats, ChunkPipeline};

/// Extension given to encoded files.
pub const COMPRESSED_EXTENSION: &str = "hc";

#[derive(Debug, Clone)]
pub struct EncodeSummary {
    pub codebook: Codebook,
    pub body: BodyStats,
}

pub struct HuffmanCodec {
    config: CodecConfig,
    pipeline: ChunkPipeline,
}

impl HuffmanCodec {
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = ChunkPipeline::new(config.parallelism, config.chunk_size)?;
        Ok(HuffmanCodec { config, pipeline })
    }

    /// Build the codebook for `input` according to the configured mode and
    /// rewind it for the encoding pass.
    pub fn build_codebook<R: Read + Seek>(&self, input: &mut R) -> Result<Codebook> {
        let codebook = match self.config.mode {
            CodebookMode::Full => {
                let table = FrequencyTable::scan(&mut *input, self.config.chunk_size)?;
                let codebook = Codebook::from_frequencies(&table)?;
                debug!(
                    total = table.total_count(),
                    distinct = table.distinct(),
                    average_bits = average_code_length(&codebook, &table),
                    "frequencies counted"
                );
                codebook
            }
            CodebookMode::Partial => {
                let outcome = AdaptiveRefinement::new(self.config.sample_size, self.config.chunk_size)
                    .refine(&mut *input)?;
                debug!(
                    samples = outcome.samples,
                    bytes_sampled = outcome.bytes_sampled,
                    total_length = outcome.total_length,
                    converged = outcome.converged,
                    average_bits = average_code_length(&outcome.codebook, &outcome.frequencies),
                    "partial codebook built"
                );
                outcome.codebook
            }
        };
        input.rewind()?;
        Ok(codebook)
    }

    pub fn encode_stream<R: Read + Seek, W: Write>(
        &self,
        mut input: R,
        properties: &Properties,
        output: W,
    ) -> Result<EncodeSummary> {
        let codebook = self.build_codebook(&mut input)?;

        let mut writer = BufWriter::new(output);
        write_preamble(&mut writer, properties, &codebook)?;
        let body = self.pipeline.encode_body(&codebook, input, &mut writer)?;
        writer.flush()?;

        Ok(EncodeSummary { codebook, body })
    }

    pub fn decode_stream<R: Read, W: Write>(&self, input: R, output: W) -> Result<(Properties, BodyStats)> {
        let mut reader = ContainerReader::new(BufReader::new(input));
        let preamble = read_preamble(&mut reader)?;
        let body = self.decode_body(&preamble, &mut reader, output)?;
        Ok((preamble.properties, body))
    }

    pub fn encode_bytes(&self, data: &[u8], properties: &Properties) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_stream(Cursor::new(data), properties, &mut out)?;
        Ok(out)
    }

    pub fn decode_bytes(&self, container: &[u8]) -> Result<(Properties, Vec<u8>)> {
        let mut out = Vec::new();
        let (properties, _) = self.decode_stream(container, &mut out)?;
        Ok((properties, out))
    }

    /// Encode `input_path` into `<output_dir>/<name before first '.'>.hc`.
    pub fn encode_file(&self, input_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        let properties = Properties::from_path(input_path)?;
        let input = File::open(input_path).map_err(|source| HuffmanError::Input {
            path: input_path.to_path_buf(),
            source,
        })?;

        let output_path = output_dir.join(format!(
            "{}.{COMPRESSED_EXTENSION}",
            file_stem(&properties.file_name)
        ));
        refuse_overwrite(input_path, &output_path)?;

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            mode = ?self.config.mode,
            "encoding"
        );
        let output = File::create(&output_path)?;
        let summary = self
            .encode_stream(input, &properties, output)
            .map_err(|e| {
                discard_partial(&output_path);
                e
            })?;

        info!(
            symbols = summary.body.symbols,
            frames = summary.body.frames,
            distinct = summary.codebook.len(),
            "encoded"
        );
        Ok(output_path)
    }

    /// Decode into `<output_dir>/<original name>` and restore its timestamps.
    pub fn decode_file(&self, input_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        let input = File::open(input_path).map_err(|source| HuffmanError::Input {
            path: input_path.to_path_buf(),
            source,
        })?;
        let mut reader = ContainerReader::new(BufReader::new(input));
        let preamble = read_preamble(&mut reader)?;

        let output_path = output_dir.join(&preamble.properties.file_name);
        refuse_overwrite(input_path, &output_path)?;

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            symbols = preamble.codebook.len(),
            "decoding"
        );
        let output = File::create(&output_path)?;
        let body = self
            .decode_body(&preamble, &mut reader, output)
            .map_err(|e| {
                discard_partial(&output_path);
                e
            })?;
        preamble.properties.restore(&output_path)?;

        info!(symbols = body.symbols, frames = body.frames, "decoded");
        Ok(output_path)
    }

    fn decode_body<R: BufRead, W: Write>(
        &self,
        preamble: &Preamble,
        reader: &mut ContainerReader<R>,
        output: W,
    ) -> Result<BodyStats> {
        let mut writer = BufWriter::new(output);
        let body = self
            .pipeline
            .decode_body(&preamble.decoder, reader, &mut writer)?;
        writer.flush()?;

        if body.frames == 0 && !preamble.codebook.is_empty() {
            return Err(HuffmanError::format(
                reader.position(),
                "container has a codebook but no chunk frames",
            ));
        }
        Ok(body)
    }
}

/// Run one operation with a freshly configured codec.
pub fn run(operation: Operation, input_path: &Path, output_dir: &Path, config: CodecConfig) -> Result<PathBuf> {
    let codec = HuffmanCodec::new(config)?;
    match operation {
        Operation::Encode => codec.encode_file(input_path, output_dir),
        Operation::Decode => codec.decode_file(input_path, output_dir),
    }
}

/// Mean bits per symbol over `table`, as far as the codebook covers it.
fn average_code_length(codebook: &Codebook, table: &FrequencyTable) -> f64 {
    match codebook.encoded_bits(table) {
        Some(bits) if table.total_count() > 0 => bits as f64 / table.total_count() as f64,
        _ => 0.0,
    }
}

fn file_stem(file_name: &str) -> &str {
    match file_name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

fn refuse_overwrite(input_path: &Path, output_path: &Path) -> Result<()> {
    let same = match (fs::canonicalize(input_path), fs::canonicalize(output_path)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        return Err(HuffmanError::InvalidInput(format!(
            "output {} would overwrite the input",
            output_path.display()
        )));
    }
    Ok(())
}

// A failed run leaves no partial container or partial decode behind.
fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "could not remove partial output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;

    fn codec(mode: CodebookMode) -> HuffmanCodec {
        HuffmanCodec::new(
            CodecConfig::default()
                .with_parallelism(Some(2))
                .with_chunk_size(Some(1024))
                .with_mode(mode),
        )
        .unwrap()
    }

    fn props() -> Properties {
        Properties::new(
            "story.txt",
            FileTime::from_unix_time(1_500_000_000, 0),
            FileTime::from_unix_time(1_500_000_100, 42),
        )
    }

    #[test]
    fn bytes_roundtrip_in_both_modes() {
        let data: Vec<u8> = b"she sells sea shells by the sea shore\n".repeat(200);
        for mode in [CodebookMode::Full, CodebookMode::Partial] {
            let codec = codec(mode);
            let container = codec.encode_bytes(&data, &props()).unwrap();
            assert!(container.len() < data.len());
            let (properties, decoded) = codec.decode_bytes(&container).unwrap();
            assert_eq!(properties, props());
            assert_eq!(decoded, data);
        }
    }

    #[test]
    fn single_symbol_input_roundtrips() {
        let codec = codec(CodebookMode::Full);
        let data = vec![b'x'; 5000];
        let container = codec.encode_bytes(&data, &props()).unwrap();
        let (_, decoded) = codec.decode_bytes(&container).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_input_roundtrips() {
        let codec = codec(CodebookMode::Full);
        let container = codec.encode_bytes(&[], &props()).unwrap();
        assert!(container.ends_with(&[0xFF, 0xFF]));
        let (_, decoded) = codec.decode_bytes(&container).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn container_starts_with_header_and_codebook() {
        let codec = codec(CodebookMode::Full);
        let container = codec.encode_bytes(b"aaaaabbcd", &props()).unwrap();
        let expected_preamble: &[u8] =
            b"story.txt 1500000000.000000000 1500000100.000000042 a12b002c0102d0112\xFF\xFF";
        assert!(container.starts_with(expected_preamble));
        let body = &container[expected_preamble.len()..];
        assert!(body.ends_with(&[0xFF, 0xFF]));
    }

    #[test]
    fn truncated_after_codebook_is_format_error() {
        let codec = codec(CodebookMode::Full);
        let data = b"abcabcabc";
        let container = codec.encode_bytes(data, &props()).unwrap();

        let codebook = Codebook::from_frequencies(&FrequencyTable::from_bytes(data)).unwrap();
        let mut preamble = Vec::new();
        write_preamble(&mut preamble, &props(), &codebook).unwrap();
        assert!(container.starts_with(&preamble));
        assert!(container.len() > preamble.len());

        let err = codec.decode_bytes(&preamble).unwrap_err();
        assert!(err.is_format(), "{err}");
    }

    #[test]
    fn trailing_garbage_is_format_error() {
        let codec = codec(CodebookMode::Full);
        let mut container = codec.encode_bytes(b"hello", &props()).unwrap();
        container.push(0x42);
        assert!(codec.decode_bytes(&container).unwrap_err().is_format());
    }

    #[test]
    fn average_code_length_weights_by_count() {
        let table = FrequencyTable::from_bytes(b"aaaaabbcd");
        let codebook = Codebook::from_frequencies(&table).unwrap();
        assert_eq!(average_code_length(&codebook, &table), 15.0 / 9.0);
        assert_eq!(average_code_length(&codebook, &FrequencyTable::new()), 0.0);
    }

    #[test]
    fn file_stem_drops_every_extension() {
        assert_eq!(file_stem("archive.tar.gz"), "archive");
        assert_eq!(file_stem("README"), "README");
        assert_eq!(file_stem(".profile"), ".profile");
    }
}
