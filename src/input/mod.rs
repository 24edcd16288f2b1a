use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncReadExt;
use url::Url;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("empty URL")]
    Empty,

    #[error("invalid URL '{url}': {source}")]
    Invalid {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URL '{0}' has no host")]
    MissingHost(String),
}

/// How the raw input bytes are decoded, chosen from the first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(UTF8_BOM) {
            TextEncoding::Utf8Bom
        } else if bytes.starts_with(UTF16_LE_BOM) {
            TextEncoding::Utf16Le
        } else if bytes.starts_with(UTF16_BE_BOM) {
            TextEncoding::Utf16Be
        } else if std::str::from_utf8(bytes).is_err() && bytes.len() % 2 == 0 {
            // BOM-less UTF-16 from some Windows tools
            TextEncoding::Utf16Le
        } else {
            TextEncoding::Utf8
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Utf8Bom => String::from_utf8_lossy(strip(bytes, UTF8_BOM)).into_owned(),
            TextEncoding::Utf16Le => decode_utf16(strip(bytes, UTF16_LE_BOM), u16::from_le_bytes),
            TextEncoding::Utf16Be => decode_utf16(strip(bytes, UTF16_BE_BOM), u16::from_be_bytes),
        }
    }
}

fn strip<'a>(bytes: &'a [u8], bom: &[u8]) -> &'a [u8] {
    bytes.strip_prefix(bom).unwrap_or(bytes)
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decodes `bytes` and returns the trimmed, non-blank lines with NUL and BOM characters removed.
pub fn read_normalized_lines(bytes: &[u8]) -> Vec<String> {
    let encoding = TextEncoding::sniff(bytes);
    log::debug!("Input encoding: {encoding:?}");

    encoding
        .decode(bytes)
        .lines()
        .map(|line| {
            line.chars()
                .filter(|c| *c != '\0' && *c != '\u{feff}')
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Reads candidate URLs from `path`, or from stdin when no path is given.
pub async fn ingest(path: Option<&Path>) -> Result<Vec<String>, InputError> {
    let bytes = match path {
        Some(path) => tokio::fs::read(path).await.map_err(|source| InputError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .map_err(InputError::Stdin)?;
            buf
        }
    };

    let lines = read_normalized_lines(&bytes);
    log::debug!("Read {} candidate URLs", lines.len());
    Ok(lines)
}

/// Cleans a raw input line into an absolute http(s) URL, defaulting to https.
pub fn normalize(raw: &str) -> Result<String, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let mut cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '\0' | '\u{feff}' | '\r' | '\n'))
        .collect();
    if cleaned.is_empty() {
        return Err(NormalizeError::Empty);
    }

    if !cleaned.starts_with("http://") && !cleaned.starts_with("https://") {
        cleaned.insert_str(0, "https://");
    }

    let parsed = Url::parse(&cleaned).map_err(|source| NormalizeError::Invalid {
        url: cleaned.clone(),
        source,
    })?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(NormalizeError::MissingHost(cleaned));
    }

    Ok(cleaned)
}
