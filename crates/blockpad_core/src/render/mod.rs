//! Render adapter boundary for non-text blocks.
//!
//! # Responsibility
//! - Describe what surface a block needs without rendering it.
//! - Provide default bodies for newly inserted script blocks.
//!
//! # Invariants
//! - Description is pure: it never touches the document or the filesystem.
//! - Render failures are `RenderError`, never document errors.

use crate::model::block::{Block, BlockId, BlockKind, META_FORMAT};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod templates;

pub use templates::default_body;

/// Surface a render adapter has to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    SceneScript,
    RenderScript(ImageFormat),
    MathMarkup,
    MapScript,
    /// Unknown kind; shown as raw text.
    Passthrough,
}

/// Output format of a render script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageFormat {
    #[default]
    Svg,
    Png,
}

impl ImageFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }
}

/// Borrowed view of one block handed to an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDescription<'a> {
    pub block_id: BlockId,
    pub kind: SurfaceKind,
    pub source: &'a str,
    /// Delimiter tag, kept for passthrough display.
    pub tag: &'a str,
}

/// Render-layer failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    InvalidFormat { block_id: BlockId, value: String },
    Adapter { block_id: BlockId, message: String },
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat { block_id, value } => {
                write!(f, "block {block_id}: unsupported image format `{value}`")
            }
            Self::Adapter { block_id, message } => write!(f, "block {block_id}: {message}"),
        }
    }
}

impl Error for RenderError {}

/// Collaborator that draws non-text surfaces.
pub trait RenderAdapter {
    fn render(&mut self, surface: &SurfaceDescription<'_>) -> Result<(), RenderError>;
}

/// Surface needed by `block`, or `None` for text and outline blocks.
///
/// # Errors
/// - `InvalidFormat` when a render script asks for a format other than
///   svg or png.
pub fn describe(block: &Block) -> Result<Option<SurfaceDescription<'_>>, RenderError> {
    let kind = match &block.kind {
        BlockKind::Text | BlockKind::Toc => return Ok(None),
        BlockKind::Three => SurfaceKind::SceneScript,
        BlockKind::PyImage => {
            let format = match block.metadata.get(META_FORMAT) {
                None => ImageFormat::default(),
                Some(value) => ImageFormat::parse(value).ok_or_else(|| {
                    RenderError::InvalidFormat {
                        block_id: block.id,
                        value: value.to_string(),
                    }
                })?,
            };
            SurfaceKind::RenderScript(format)
        }
        BlockKind::Latex => SurfaceKind::MathMarkup,
        BlockKind::Map => SurfaceKind::MapScript,
        BlockKind::Opaque(_) => SurfaceKind::Passthrough,
    };
    Ok(Some(SurfaceDescription {
        block_id: block.id,
        kind,
        source: &block.body,
        tag: block.kind.tag(),
    }))
}

/// Runs `adapter` over every surface block, collecting failures instead of
/// stopping at the first one.
pub fn render_blocks<'a, I>(blocks: I, adapter: &mut dyn RenderAdapter) -> Vec<RenderError>
where
    I: IntoIterator<Item = &'a Block>,
{
    let mut failures = Vec::new();
    for block in blocks {
        let outcome = describe(block).and_then(|surface| match surface {
            Some(surface) => adapter.render(&surface),
            None => Ok(()),
        });
        if let Err(err) = outcome {
            failures.push(err);
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::{describe, render_blocks, ImageFormat, RenderAdapter, RenderError, SurfaceDescription, SurfaceKind};
    use crate::model::block::{Block, BlockKind, Metadata, TextKind};

    #[test]
    fn text_has_no_surface() {
        assert_eq!(describe(&Block::text(TextKind::H1, "x")).unwrap(), None);
    }

    #[test]
    fn pyimage_format_defaults_to_svg_and_is_validated() {
        let plain = Block::new(BlockKind::PyImage, Metadata::new(), "print(1)");
        assert_eq!(
            describe(&plain).unwrap().unwrap().kind,
            SurfaceKind::RenderScript(ImageFormat::Svg)
        );
        let png = Block::new(
            BlockKind::PyImage,
            Metadata::from_pairs([("format", "PNG")]),
            "",
        );
        assert_eq!(
            describe(&png).unwrap().unwrap().kind,
            SurfaceKind::RenderScript(ImageFormat::Png)
        );
        let bad = Block::new(
            BlockKind::PyImage,
            Metadata::from_pairs([("format", "gif")]),
            "",
        );
        assert!(matches!(
            describe(&bad),
            Err(RenderError::InvalidFormat { .. })
        ));
    }

    struct Counting(usize);

    impl RenderAdapter for Counting {
        fn render(&mut self, surface: &SurfaceDescription<'_>) -> Result<(), RenderError> {
            self.0 += 1;
            if surface.kind == SurfaceKind::Passthrough {
                return Err(RenderError::Adapter {
                    block_id: surface.block_id,
                    message: format!("cannot draw `{}`", surface.tag),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn render_blocks_collects_failures() {
        let blocks = vec![
            Block::text(TextKind::Body, "x"),
            Block::new(BlockKind::Latex, Metadata::new(), "x^2"),
            Block::new(BlockKind::Opaque("chart".into()), Metadata::new(), ""),
        ];
        let mut adapter = Counting(0);
        let failures = render_blocks(&blocks, &mut adapter);
        assert_eq!(adapter.0, 2);
        assert_eq!(failures.len(), 1);
    }
}
