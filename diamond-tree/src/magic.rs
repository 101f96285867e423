//! Magic comments: subtrees that are not part of the live document, preserved inside XML
//! comments so that they survive a save/load cycle.
//!
//! ```text
//! <schema_path> DIAMOND MAGIC COMMENT (<description>)
//! <base64(bzip2(<wrapper><node .../></wrapper>))>
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::{self, Read, Write};

pub const MARKER: &str = "DIAMOND MAGIC COMMENT";

lazy_static! {
    static ref HEADER_RE: Regex =
        Regex::new(r"^(\S+) DIAMOND MAGIC COMMENT \((.*)\)$").unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum MagicError {
    #[error("magic comment for {path} is not valid base64: {source}")]
    Base64 {
        path: String,
        source: base64::DecodeError,
    },
    #[error("magic comment for {path} is not valid bzip2 data: {source}")]
    Bzip2 { path: String, source: io::Error },
    #[error("magic comment for {path} does not hold UTF-8 text")]
    Utf8 { path: String },
    #[error("magic comment for {path} does not hold an element: {message}")]
    Xml { path: String, message: String },
    #[error("failed to compress subtree for {path}: {source}")]
    Compress { path: String, source: io::Error },
}

/// A comment whose header marks it as a magic comment.  The payload is only decoded on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicComment {
    pub schema_path: String,
    pub description: String,
    payload: String,
}

impl MagicComment {
    /// Recognises a magic comment from the text between `<!--` and `-->`
    pub fn parse(comment: &str) -> Option<MagicComment> {
        let comment = comment.trim();
        let (header, payload) = match comment.find('\n') {
            Some(i) => (&comment[..i], &comment[i + 1..]),
            None => (comment, ""),
        };
        let caps = HEADER_RE.captures(header.trim())?;
        Some(MagicComment {
            schema_path: caps[1].to_string(),
            description: caps[2].to_string(),
            payload: payload.split_whitespace().collect(),
        })
    }

    /// The XML text the comment preserves
    pub fn decode(&self) -> Result<String, MagicError> {
        let compressed = STANDARD
            .decode(&self.payload)
            .map_err(|source| MagicError::Base64 {
                path: self.schema_path.clone(),
                source,
            })?;
        let mut raw = vec![];
        BzDecoder::new(&compressed[..])
            .read_to_end(&mut raw)
            .map_err(|source| MagicError::Bzip2 {
                path: self.schema_path.clone(),
                source,
            })?;
        String::from_utf8(raw).map_err(|_| MagicError::Utf8 {
            path: self.schema_path.clone(),
        })
    }
}

/// Builds the text of a magic comment preserving `xml`
pub fn encode(schema_path: &str, description: &str, xml: &str) -> Result<String, MagicError> {
    let compress = || -> io::Result<Vec<u8>> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(xml.as_bytes())?;
        encoder.finish()
    };
    let compressed = compress().map_err(|source| MagicError::Compress {
        path: schema_path.to_string(),
        source,
    })?;
    Ok(format!(
        "{} {} ({})\n{}",
        schema_path,
        MARKER,
        description,
        STANDARD.encode(compressed)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn round_trip() {
        let xml = "<options><velocity name=\"u\">1 2 3</velocity></options>";
        let text = encode(
            "/grammar[1]/start[1]/element[1]/optional[1]/element[1]",
            "inactive optional subtree",
            xml,
        )
        .unwrap();
        assert!(!text.contains("--"));
        let comment = MagicComment::parse(&format!(" {} ", text)).unwrap();
        assert_eq!(
            comment.schema_path,
            "/grammar[1]/start[1]/element[1]/optional[1]/element[1]"
        );
        assert_eq!(comment.description, "inactive optional subtree");
        assert_eq!(comment.decode().unwrap(), xml);
    }

    #[test]
    fn ordinary_comments_are_not_magic() {
        assert_eq!(MagicComment::parse(" just a comment "), None);
        assert_eq!(
            MagicComment::parse("mentions DIAMOND MAGIC COMMENT in passing"),
            None
        );
    }

    #[test]
    fn malformed_payload() {
        let comment =
            MagicComment::parse("/a[1] DIAMOND MAGIC COMMENT (inactive optional subtree)\n!!!")
                .unwrap();
        assert_matches!(comment.decode(), Err(MagicError::Base64 { .. }));

        let not_bzip = format!(
            "/a[1] DIAMOND MAGIC COMMENT (x)\n{}",
            STANDARD.encode("plain text")
        );
        let comment = MagicComment::parse(&not_bzip).unwrap();
        assert_matches!(comment.decode(), Err(MagicError::Bzip2 { .. }));
    }
}
