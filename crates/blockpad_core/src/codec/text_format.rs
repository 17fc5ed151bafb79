//! Line-oriented encoder/decoder for `.bpad` files.
//!
//! A record is a delimiter line, zero or more `key: value` lines and a body
//! running to the next delimiter. When a body's first non-empty line is
//! itself shaped like metadata, one empty separator line is written between
//! metadata and body, and the decoder drops exactly that line again.

use super::{DecodeOptions, FormatError, FORMAT_NAME, SUPPORTED_VERSION};
use crate::model::block::{Block, BlockKind, Metadata};
use crate::model::document::{Document, DocumentError};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^# ([A-Z][A-Z0-9_-]*) v(0|[1-9][0-9]*)$").expect("valid header regex"));
static META_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z][a-z0-9_-]*): (.*)$").expect("valid metadata regex"));
static KIND_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("valid kind tag regex"));
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]*$").expect("valid token regex"));

/// How one line starting with `::` is classified.
enum DelimiterLine<'a> {
    Kind(&'a str),
    Broken,
    NotDelimiter,
}

fn classify(line: &str) -> DelimiterLine<'_> {
    let Some(rest) = line.strip_prefix("::") else {
        return DelimiterLine::NotDelimiter;
    };
    if KIND_TAG_RE.is_match(rest) {
        DelimiterLine::Kind(rest)
    } else if TOKEN_RE.is_match(rest) {
        DelimiterLine::Broken
    } else {
        DelimiterLine::NotDelimiter
    }
}

fn is_metadata_line(line: &str) -> bool {
    META_RE.is_match(line)
}

/// Whether the body lines need the empty separator after metadata.
fn needs_separator(body_lines: &[&str]) -> bool {
    body_lines
        .iter()
        .find(|line| !line.is_empty())
        .is_some_and(|line| is_metadata_line(line))
}

struct PendingRecord<'a> {
    tag: &'a str,
    metadata: Metadata,
    body_lines: Vec<&'a str>,
    in_metadata: bool,
}

impl<'a> PendingRecord<'a> {
    fn new(tag: &'a str) -> Self {
        Self {
            tag,
            metadata: Metadata::new(),
            body_lines: Vec::new(),
            in_metadata: true,
        }
    }

    fn push_line(&mut self, line: &'a str) {
        if self.in_metadata {
            if let Some(captures) = META_RE.captures(line) {
                self.metadata.push(&captures[1], &captures[2]);
                return;
            }
            self.in_metadata = false;
        }
        self.body_lines.push(line);
    }

    fn finish(mut self) -> Block {
        if self.body_lines.first() == Some(&"") && needs_separator(&self.body_lines[1..]) {
            self.body_lines.remove(0);
        }
        let blank_line_body = self.body_lines.len() == 1 && self.body_lines[0].is_empty();
        let mut block = Block::new(
            BlockKind::from_tag(self.tag),
            self.metadata,
            self.body_lines.join("\n"),
        );
        block.blank_line_body = blank_line_body;
        block
    }
}

/// Decodes a document in strict mode.
pub fn decode(input: &str) -> Result<Document, FormatError> {
    decode_with(input, DecodeOptions::default())
}

/// Decodes a document with explicit options.
///
/// # Errors
/// - `MalformedDocument` for a bad header, content before the first block, a
///   broken delimiter line or a file without blocks.
/// - `UnsupportedVersion` for a newer version tag unless `lenient` is set.
pub fn decode_with(input: &str, options: DecodeOptions) -> Result<Document, FormatError> {
    if input.is_empty() {
        return Err(FormatError::malformed(1, "missing header line"));
    }
    let (content, final_newline) = match input.strip_suffix('\n') {
        Some(stripped) => (stripped, true),
        None => (input, false),
    };
    let mut lines = content.split('\n');

    let header = lines.next().unwrap_or_default();
    let version = parse_header(header)?;
    if version > SUPPORTED_VERSION && !options.lenient {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            supported: SUPPORTED_VERSION,
        });
    }

    let mut blocks = Vec::new();
    let mut current: Option<PendingRecord<'_>> = None;
    for (offset, line) in lines.enumerate() {
        let line_number = offset + 2;
        match classify(line) {
            DelimiterLine::Kind(tag) => {
                if let Some(record) = current.take() {
                    blocks.push(record.finish());
                }
                current = Some(PendingRecord::new(tag));
            }
            DelimiterLine::Broken => {
                return Err(FormatError::malformed(
                    line_number,
                    format!("unrecognized block delimiter `{line}`"),
                ));
            }
            DelimiterLine::NotDelimiter => match current.as_mut() {
                Some(record) => record.push_line(line),
                None => {
                    return Err(FormatError::malformed(
                        line_number,
                        "expected a `::<kind>` block delimiter",
                    ));
                }
            },
        }
    }
    if let Some(record) = current.take() {
        blocks.push(record.finish());
    }

    let mut document = Document::with_version(blocks, version).map_err(|err| match err {
        DocumentError::Empty => FormatError::malformed(2, "document contains no blocks"),
        other => FormatError::malformed(1, other.to_string()),
    })?;
    document.set_final_newline(final_newline);
    Ok(document)
}

fn parse_header(line: &str) -> Result<u32, FormatError> {
    let captures = HEADER_RE.captures(line).ok_or_else(|| {
        FormatError::malformed(1, format!("expected `# {FORMAT_NAME} v<N>` header"))
    })?;
    if &captures[1] != FORMAT_NAME {
        return Err(FormatError::malformed(
            1,
            format!("unknown format `{}`", &captures[1]),
        ));
    }
    captures[2]
        .parse::<u32>()
        .map_err(|_| FormatError::malformed(1, "format version out of range"))
}

/// Encodes a document deterministically.
///
/// # Errors
/// - `UnsupportedVersion` when the document is tagged newer than supported.
/// - `BodyContainsDelimiter`, `InvalidMetadata`, `InvalidKindTag` when the
///   content cannot be written without changing its meaning on read-back.
pub fn encode(document: &Document) -> Result<String, FormatError> {
    if document.format_version() > SUPPORTED_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: document.format_version(),
            supported: SUPPORTED_VERSION,
        });
    }

    let header = format!("# {FORMAT_NAME} v{}", document.format_version());
    let mut lines: Vec<String> = vec![header];
    for block in document.ordered() {
        encode_block(block, &mut lines)?;
    }

    let mut output = lines.join("\n");
    if document.final_newline() {
        output.push('\n');
    }
    Ok(output)
}

fn encode_block(block: &Block, lines: &mut Vec<String>) -> Result<(), FormatError> {
    let tag = block.kind.tag();
    if !KIND_TAG_RE.is_match(tag) {
        return Err(FormatError::InvalidKindTag {
            block_id: block.id,
            tag: tag.to_string(),
        });
    }
    lines.push(format!("::{tag}"));

    for (key, value) in block.metadata.iter() {
        let line = format!("{key}: {value}");
        if value.contains('\n') || !is_metadata_line(&line) {
            return Err(FormatError::InvalidMetadata {
                block_id: block.id,
                key: key.to_string(),
            });
        }
        lines.push(line);
    }

    let body_lines: Vec<&str> = if block.body.is_empty() {
        if block.blank_line_body {
            vec![""]
        } else {
            Vec::new()
        }
    } else {
        block.body.split('\n').collect()
    };

    for (index, line) in body_lines.iter().enumerate() {
        if !matches!(classify(line), DelimiterLine::NotDelimiter) {
            return Err(FormatError::BodyContainsDelimiter {
                block_id: block.id,
                line: index + 1,
            });
        }
    }

    if needs_separator(&body_lines) {
        lines.push(String::new());
    }
    lines.extend(body_lines.into_iter().map(str::to_string));
    Ok(())
}
