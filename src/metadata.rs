//! Container preamble: the properties header and the embedded codebook.
//!
//! ```text
//! <file name> <created> <modified> (<symbol><'0'|'1'>+'2')* FF FF
//! ```

use std::borrow::Cow;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{self, Path};

use filetime::FileTime;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::codebook::{Code, Codebook, Decoder};
use crate::compressed_data::{ContainerReader, SENTINEL};
use crate::error::{HuffmanError, Result};

/// Ends each codebook entry. Never a valid code character.
pub const FIELD_SEPARATOR: u8 = b'2';

const MAX_FIELD_LEN: u64 = 4096;

/// Bytes escaped in the stored file name; space delimits header fields.
const NAME_ESCAPES: &AsciiSet = &CONTROLS.add(b'%').add(b' ');
// 256 leaves can't produce a code longer than 255 bits.
const MAX_CODE_LEN: usize = 255;

/// Original file metadata carried in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Properties {
    pub file_name: String,
    pub created: FileTime,
    pub modified: FileTime,
}

impl Properties {
    pub fn new(file_name: impl Into<String>, created: FileTime, modified: FileTime) -> Self {
        Properties {
            file_name: file_name.into(),
            created,
            modified,
        }
    }

    /// Read name and timestamps of an existing file. Creation time falls
    /// back to modification time where the platform doesn't record it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|source| HuffmanError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        if !meta.is_file() {
            return Err(HuffmanError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                HuffmanError::InvalidInput(format!("{} has no UTF-8 file name", path.display()))
            })?;
        if !is_plain_file_name(file_name) {
            return Err(HuffmanError::InvalidInput(format!(
                "{} has a file name that can't be stored in a container",
                path.display()
            )));
        }

        let modified = FileTime::from_last_modification_time(&meta);
        let created = FileTime::from_creation_time(&meta).unwrap_or(modified);

        Ok(Properties::new(file_name, created, modified))
    }

    /// Apply the recorded timestamps to `path`. The creation stamp lands in
    /// the access time; creation time itself can't be set portably.
    pub fn restore(&self, path: &Path) -> io::Result<()> {
        filetime::set_file_times(path, self.created, self.modified)
    }
}

pub fn write_header<W: Write>(writer: &mut W, properties: &Properties) -> io::Result<()> {
    write!(
        writer,
        "{} {} {} ",
        escape_name(&properties.file_name),
        format_time(properties.created),
        format_time(properties.modified)
    )
}

pub fn read_header<R: BufRead>(reader: &mut ContainerReader<R>) -> Result<Properties> {
    let (offset, raw_name) = read_field(reader, "file name")?;
    let file_name = unescape_name(&raw_name)
        .filter(|name| is_plain_file_name(name))
        .ok_or_else(|| HuffmanError::format(offset, format!("invalid file name {raw_name:?}")))?;

    let (offset, field) = read_field(reader, "creation time")?;
    let created = parse_time(&field)
        .ok_or_else(|| HuffmanError::format(offset, format!("invalid creation time {field:?}")))?;

    let (offset, field) = read_field(reader, "modification time")?;
    let modified = parse_time(&field).ok_or_else(|| {
        HuffmanError::format(offset, format!("invalid modification time {field:?}"))
    })?;

    Ok(Properties::new(file_name, created, modified))
}

pub fn write_codebook<W: Write>(writer: &mut W, codebook: &Codebook) -> io::Result<()> {
    let mut entry = Vec::new();
    for (symbol, code) in codebook.iter() {
        entry.clear();
        entry.push(symbol);
        entry.extend(code.iter().map(|bit| if *bit { b'1' } else { b'0' }));
        entry.push(FIELD_SEPARATOR);
        writer.write_all(&entry)?;
    }
    writer.write_all(&SENTINEL)
}

pub fn read_codebook<R: BufRead>(reader: &mut ContainerReader<R>) -> Result<Codebook> {
    let block_start = reader.position();
    let mut entries = Vec::new();

    loop {
        let entry_offset = reader.position();
        let symbol = reader.read_byte()?.ok_or_else(|| {
            HuffmanError::format(entry_offset, "codebook ends before its sentinel")
        })?;

        // 0xFF is a legal symbol; only 0xFF 0xFF closes the block since
        // every code starts with '0' or '1'.
        let mut first = None;
        if symbol == SENTINEL[0] {
            match reader.read_byte()? {
                Some(b) if b == SENTINEL[1] => break,
                other => first = Some(other),
            }
        }

        let code = read_code(reader, symbol, first)?;
        entries.push((symbol, code));
        if entries.len() > 256 {
            return Err(HuffmanError::format(entry_offset, "codebook has more than 256 entries"));
        }
    }

    Codebook::from_entries(entries).map_err(|e| e.at_offset(block_start))
}

fn read_code<R: BufRead>(
    reader: &mut ContainerReader<R>,
    symbol: u8,
    mut pending: Option<Option<u8>>,
) -> Result<Code> {
    let mut code = Code::new();
    loop {
        let byte = match pending.take() {
            Some(byte) => byte,
            None => reader.read_byte()?,
        };
        let offset = reader.position().saturating_sub(1);
        match byte {
            Some(b'0') => code.push(false),
            Some(b'1') => code.push(true),
            Some(FIELD_SEPARATOR) => return Ok(code),
            Some(other) => {
                return Err(HuffmanError::format(
                    offset,
                    format!("byte 0x{other:02x} in the code of symbol 0x{symbol:02x}"),
                ))
            }
            None => {
                return Err(HuffmanError::format(
                    reader.position(),
                    "codebook ends inside an entry",
                ))
            }
        }
        if code.len() > MAX_CODE_LEN {
            return Err(HuffmanError::format(
                offset,
                format!("code of symbol 0x{symbol:02x} is longer than {MAX_CODE_LEN} bits"),
            ));
        }
    }
}

/// Everything in front of the first chunk frame.
#[derive(Debug, Clone)]
pub struct Preamble {
    pub properties: Properties,
    pub codebook: Codebook,
    pub decoder: Decoder,
}

pub fn write_preamble<W: Write>(
    writer: &mut W,
    properties: &Properties,
    codebook: &Codebook,
) -> io::Result<()> {
    write_header(writer, properties)?;
    write_codebook(writer, codebook)
}

pub fn read_preamble<R: BufRead>(reader: &mut ContainerReader<R>) -> Result<Preamble> {
    let properties = read_header(reader)?;
    let block_start = reader.position();
    let codebook = read_codebook(reader)?;
    let decoder = codebook.decoder().map_err(|e| e.at_offset(block_start))?;
    Ok(Preamble {
        properties,
        codebook,
        decoder,
    })
}

fn read_field<R: BufRead>(reader: &mut ContainerReader<R>, what: &str) -> Result<(u64, String)> {
    let offset = reader.position();
    let mut buf = Vec::new();
    if !reader.read_until_limited(b' ', MAX_FIELD_LEN, &mut buf)? {
        return Err(HuffmanError::format(
            offset,
            format!("header field '{what}' is not space-terminated"),
        ));
    }
    buf.pop();
    let field = String::from_utf8(buf)
        .map_err(|_| HuffmanError::format(offset, format!("header field '{what}' is not UTF-8")))?;
    Ok((offset, field))
}

fn escape_name(name: &str) -> String {
    utf8_percent_encode(name, NAME_ESCAPES).to_string()
}

fn unescape_name(raw: &str) -> Option<String> {
    // percent_decode_str passes malformed escapes through verbatim.
    let bytes = raw.as_bytes();
    let well_formed = bytes.iter().enumerate().all(|(i, &b)| {
        b != b'%'
            || matches!(bytes.get(i + 1..i + 3), Some(hex) if hex.iter().all(u8::is_ascii_hexdigit))
    });
    if !well_formed {
        return None;
    }
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('\0')
        && !name.chars().any(path::is_separator)
}

fn format_time(time: FileTime) -> String {
    format!("{}.{:09}", time.unix_seconds(), time.nanoseconds())
}

fn parse_time(field: &str) -> Option<FileTime> {
    let (seconds, nanos) = field.split_once('.')?;
    if nanos.len() != 9 {
        return None;
    }
    let seconds = seconds.parse::<i64>().ok()?;
    let nanos = nanos.parse::<u32>().ok().filter(|&n| n < 1_000_000_000)?;
    Some(FileTime::from_unix_time(seconds, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::parse_code;
    use std::io::Cursor;

    fn reader(bytes: Vec<u8>) -> ContainerReader<Cursor<Vec<u8>>> {
        ContainerReader::new(Cursor::new(bytes))
    }

    fn sample_properties() -> Properties {
        Properties::new(
            "notes 100%.txt",
            FileTime::from_unix_time(1_600_000_000, 123_456_789),
            FileTime::from_unix_time(1_700_000_000, 5),
        )
    }

    #[test]
    fn header_layout_is_space_delimited() {
        let mut out = Vec::new();
        write_header(&mut out, &sample_properties()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "notes%20100%25.txt 1600000000.123456789 1700000000.000000005 "
        );
    }

    #[test]
    fn header_reads_back() {
        let mut out = Vec::new();
        write_header(&mut out, &sample_properties()).unwrap();
        out.extend_from_slice(b"rest");
        let mut r = reader(out);
        assert_eq!(read_header(&mut r).unwrap(), sample_properties());
    }

    #[test]
    fn negative_timestamps_survive() {
        let time = FileTime::from_unix_time(-86_400, 250_000_000);
        assert_eq!(parse_time(&format_time(time)), Some(time));
    }

    #[test]
    fn truncated_header_is_format_error() {
        let mut r = reader(b"name.txt 1600000000.000000000".to_vec());
        let err = read_header(&mut r).unwrap_err();
        assert!(matches!(err, HuffmanError::Format { offset: Some(9), .. }));
    }

    #[test]
    fn header_rejects_path_like_names() {
        for name in ["..", "a%2Fb", "dir/file"] {
            let mut r = reader(format!("{name} 1.000000000 1.000000000 ").into_bytes());
            assert!(read_header(&mut r).unwrap_err().is_format(), "{name}");
        }
    }

    #[test]
    fn header_rejects_malformed_escapes() {
        for name in ["a%+1b", "a%2", "%zz", "%"] {
            let mut r = reader(format!("{name} 1.000000000 1.000000000 ").into_bytes());
            assert!(read_header(&mut r).unwrap_err().is_format(), "{name}");
        }
    }

    #[test]
    fn backslash_names_survive_the_header_on_unix() {
        let properties = Properties::new(
            "report\\v2.txt",
            FileTime::from_unix_time(1, 0),
            FileTime::from_unix_time(2, 0),
        );
        let mut buf = Vec::new();
        write_header(&mut buf, &properties).unwrap();
        let decoded = read_header(&mut reader(buf));
        if cfg!(unix) {
            assert_eq!(decoded.unwrap(), properties);
        } else {
            assert!(decoded.unwrap_err().is_format());
        }
    }

    #[test]
    fn codebook_block_layout() {
        let codebook = Codebook::from_entries(vec![
            (b'a', parse_code("1").unwrap()),
            (0xFF, parse_code("01").unwrap()),
            (b'2', parse_code("00").unwrap()),
        ])
        .unwrap();
        let mut out = Vec::new();
        write_codebook(&mut out, &codebook).unwrap();
        assert_eq!(out, b"2002a12\xFF012\xFF\xFF");

        let mut r = reader(out.clone());
        assert_eq!(read_codebook(&mut r).unwrap(), codebook);
        assert_eq!(r.position(), out.len() as u64);
    }

    #[test]
    fn codebook_without_sentinel_is_format_error() {
        let mut r = reader(b"a12b02".to_vec());
        let err = read_codebook(&mut r).unwrap_err();
        assert!(matches!(err, HuffmanError::Format { offset: Some(6), .. }));
    }

    #[test]
    fn codebook_with_stray_byte_is_format_error() {
        let mut r = reader(b"a1x2\xFF\xFF".to_vec());
        let err = read_codebook(&mut r).unwrap_err();
        assert!(matches!(err, HuffmanError::Format { offset: Some(2), .. }));
    }

    #[test]
    fn preamble_rejects_prefix_conflicts() {
        let mut bytes = Vec::new();
        write_header(&mut bytes, &sample_properties()).unwrap();
        bytes.extend_from_slice(b"a02b012\xFF\xFF");
        let mut r = reader(bytes);
        assert!(read_preamble(&mut r).unwrap_err().is_format());
    }
}
