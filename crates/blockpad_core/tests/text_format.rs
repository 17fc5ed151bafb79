use blockpad_core::codec::{decode, decode_with, encode, DecodeOptions, FormatError};
use blockpad_core::model::block::{Block, BlockKind, Metadata, TextKind};
use blockpad_core::model::document::Document;

const SAMPLE: &str = "\
# BLOCKPAD v2
::text
kind: title
Field notes
::toc
::text
kind: h1
Setup
::text
kind: body
Install the tools.

Then run them.
::pyimage
format: png
ax = fig.add_subplot()
::latex
e^{i\\pi} + 1 = 0
::map
map.setView([0, 0], 2);
::three
scene.add(cube);
";

#[test]
fn sample_file_is_byte_stable() {
    let document = decode(SAMPLE).unwrap();
    assert_eq!(document.block_count(), 8);
    assert_eq!(encode(&document).unwrap(), SAMPLE);
}

#[test]
fn built_document_round_trips_structurally() {
    let blocks = vec![
        Block::text(TextKind::Title, "Plan"),
        Block::text(TextKind::H2, "Week 1"),
        Block::text(TextKind::Body, "key: value looking line\n::not a delimiter\n\n"),
        Block::new(BlockKind::Toc, Metadata::new(), ""),
        Block::new(
            BlockKind::PyImage,
            Metadata::from_pairs([("format", "svg"), ("dpi", "120")]),
            "print('x')",
        ),
        Block::new(BlockKind::Latex, Metadata::new(), "\n"),
        Block::new(BlockKind::Map, Metadata::new(), "   indented\n\ttabbed"),
    ];
    let document = Document::from_blocks(blocks).unwrap();
    let decoded = decode(&encode(&document).unwrap()).unwrap();
    assert!(decoded.structurally_eq(&document));
}

#[test]
fn unknown_kind_is_kept_verbatim() {
    let input = "# BLOCKPAD v2\n::chart\nseries: a,b\n  raw payload\n::text\nkind: body\nafter\n";
    let document = decode(input).unwrap();
    let chart = &document.ordered()[0];
    assert_eq!(chart.kind, BlockKind::Opaque("chart".to_string()));
    assert_eq!(chart.metadata.get("series"), Some("a,b"));
    assert_eq!(chart.body, "  raw payload");
    assert_eq!(encode(&document).unwrap(), input);
}

#[test]
fn unknown_metadata_keys_keep_order() {
    let input = "# BLOCKPAD v2\n::text\nkind: body\nzeta: 1\nalpha: 2\nzeta: 3\nbody\n";
    let document = decode(input).unwrap();
    let keys: Vec<_> = document.ordered()[0]
        .metadata
        .iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(keys, ["kind", "zeta", "alpha", "zeta"]);
    assert_eq!(encode(&document).unwrap(), input);
}

#[test]
fn broken_delimiter_reports_its_line() {
    let input = "# BLOCKPAD v2\n::text\nfine\n::Text\nbody\n";
    match decode(input) {
        Err(FormatError::MalformedDocument { line, .. }) => assert_eq!(line, 4),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn newer_version_needs_lenient_mode() {
    let input = "# BLOCKPAD v7\n::text\nkind: body\nfrom the future\n";
    assert!(matches!(
        decode(input),
        Err(FormatError::UnsupportedVersion { found: 7, .. })
    ));

    let mut document = decode_with(input, DecodeOptions { lenient: true }).unwrap();
    assert_eq!(document.format_version(), 7);
    assert!(matches!(
        encode(&document),
        Err(FormatError::UnsupportedVersion { .. })
    ));

    document.set_format_version(blockpad_core::codec::SUPPORTED_VERSION);
    assert!(encode(&document).is_ok());
}
