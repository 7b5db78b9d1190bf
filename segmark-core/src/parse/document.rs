use std::{ops::Range, time::Instant};

use itertools::Itertools;

use super::{
    formats::{apply_format_conversions, FormatConverter},
    links::resolve_links,
    merge::merge_tokens_segments,
};
use crate::entities::{
    DocumentMetadata, PageInfo, PageNumber, ParsedDocument, PdfFeatures, SegmentBox,
};

/// Configuration options for parsing documents with DocumentParser
#[derive(Debug, Clone, Default)]
pub struct ParseConfig {
    /// Optional range of page numbers to keep. When None, keeps all pages.
    /// Page numbers are the provider's (1-based), end excluded: `1..3` keeps pages 1 and 2
    pub page_range: Option<Range<PageNumber>>,
}

/// Rebuilds the logical structure of a document from the PDF features and the
/// layout segments predicted for its pages.
///
/// Table and formula segments go through the registered format converters once
/// the tokens are assigned.
#[derive(Default)]
pub struct DocumentParser<'a> {
    converters: Vec<&'a dyn FormatConverter>,
}

impl<'a> DocumentParser<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converter(mut self, converter: &'a dyn FormatConverter) -> Self {
        self.converters.push(converter);
        self
    }

    /// Parses a document into its ordered segments and internal links
    ///
    /// # Arguments
    /// * `features` - Pages, tokens and link annotations from the PDF feature provider
    /// * `segment_boxes` - Predicted segments, in reading order within each page
    /// * `config` - Parsing configuration options
    /// * `page_callback` - Optional callback function called after each page is processed
    ///
    /// # Returns
    /// The parsed document, or an error if a segment references a page the features
    /// don't contain
    ///
    /// # Examples
    /// ```no_run
    /// use segmark_core::{entities::PdfFeatures, DocumentParser, ParseConfig};
    ///
    /// fn parse() -> anyhow::Result<()> {
    ///     let features = PdfFeatures::from_json(&std::fs::read_to_string("doc.json")?)?;
    ///     let boxes = serde_json::from_str(&std::fs::read_to_string("segments.json")?)?;
    ///     let parsed = DocumentParser::new().parse_document(
    ///         &features,
    ///         boxes,
    ///         ParseConfig::default(),
    ///         Some(|page_number| println!("Parsed page {}", page_number)),
    ///     )?;
    ///     println!("{} segments", parsed.segments.len());
    ///     Ok(())
    /// }
    /// ```
    #[tracing::instrument(skip_all, fields(doc_name = %features.file_name))]
    pub fn parse_document<F>(
        &self,
        features: &PdfFeatures,
        segment_boxes: Vec<SegmentBox>,
        config: ParseConfig,
        page_callback: Option<F>,
    ) -> anyhow::Result<ParsedDocument>
    where
        F: Fn(PageNumber),
    {
        let start_time = Instant::now();
        let in_range = |page_number: PageNumber| {
            config
                .page_range
                .as_ref()
                .map_or(true, |r| r.contains(&page_number))
        };

        if let Some(segment_box) = segment_boxes
            .iter()
            .find(|b| features.page(b.page_number).is_none())
        {
            anyhow::bail!(
                "segment of type '{}' references page {} missing from the pdf features",
                segment_box.segment_type,
                segment_box.page_number
            );
        }

        let mut boxes_by_page = segment_boxes.into_iter().into_group_map_by(|b| b.page_number);

        let mut segments = Vec::new();
        let mut pages = Vec::new();
        let mut orphan_tokens = 0;
        for page in features
            .pages
            .iter()
            .filter(|p| in_range(p.page_number))
            .sorted_by_key(|p| p.page_number)
        {
            let page_boxes = boxes_by_page.remove(&page.page_number).unwrap_or_default();
            let page_segments = merge_tokens_segments(page, page_boxes);
            orphan_tokens += page_segments.orphan_tokens;
            segments.extend(page_segments.segments);
            pages.push(PageInfo {
                page_number: page.page_number,
                page_width: page.page_width,
                page_height: page.page_height,
            });
            if let Some(callback) = page_callback.as_ref() {
                callback(page.page_number)
            }
        }

        apply_format_conversions(&mut segments, &self.converters);

        let pdf_links = features
            .links
            .iter()
            .filter(|l| in_range(l.page_number))
            .cloned()
            .collect::<Vec<_>>();
        let links = resolve_links(&pdf_links, &segments);

        let duration = start_time.elapsed();
        tracing::info!(
            "parsed {} pages into {} segments and {} links in {}ms",
            pages.len(),
            segments.len(),
            links.len(),
            duration.as_millis()
        );

        Ok(ParsedDocument {
            doc_name: features.file_name.clone(),
            pages,
            segments,
            links,
            metadata: DocumentMetadata::new(duration, orphan_tokens),
        })
    }
}
