use std::ops::Range;

use entities::{PageNumber, ParsedDocument, PdfFeatures, SegmentBox};
use parse::formats::FormatConverter;
use render::RenderedDocument;

pub mod codec;
pub mod entities;
pub mod layout;
pub mod parse;
pub mod render;
pub mod style;
pub mod text;
pub mod toc;
pub mod translate;
pub mod utils;

pub use parse::document::{DocumentParser, ParseConfig};
pub use render::{to_markup, OutputFormat, RenderConfig};
pub use translate::{translate_markup, OllamaConfig, OllamaTranslator, TranslationConfig, Translator};

/// Options of a full conversion, from PDF features to markup.
#[derive(Debug, Clone, Default)]
pub struct ConversionConfig {
    pub format: OutputFormat,
    /// Prepend a table of contents to the markup
    pub extract_toc: bool,
    /// Base name of the picture files, defaults to the sanitized document name
    pub image_base_name: Option<String>,
    pub page_range: Option<Range<PageNumber>>,
}

#[derive(Debug)]
pub struct Conversion {
    pub document: ParsedDocument,
    pub rendered: RenderedDocument,
}

impl Conversion {
    /// Segment boxes in reading order, as written to the segmentation sidecar.
    pub fn segment_boxes(&self) -> Vec<SegmentBox> {
        self.document.segment_boxes()
    }
}

/// Parses the document and renders it in one go.
pub fn convert_document<F>(
    features: &PdfFeatures,
    segment_boxes: Vec<SegmentBox>,
    converters: &[&dyn FormatConverter],
    config: &ConversionConfig,
    page_callback: Option<F>,
) -> anyhow::Result<Conversion>
where
    F: Fn(PageNumber),
{
    let parser = converters
        .iter()
        .fold(DocumentParser::new(), |parser, c| parser.with_converter(*c));
    let document = parser.parse_document(
        features,
        segment_boxes,
        ParseConfig {
            page_range: config.page_range.clone(),
        },
        page_callback,
    )?;
    let rendered = to_markup(
        &document,
        config.format,
        RenderConfig {
            extract_toc: config.extract_toc,
            image_base_name: config.image_base_name.clone(),
        },
    )?;
    Ok(Conversion { document, rendered })
}
