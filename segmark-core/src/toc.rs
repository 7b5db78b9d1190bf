use serde::Serialize;
use tracing::instrument;

use crate::entities::{PageNumber, SegmentBox, SegmentType};

/// A title stops being part of the document name block when its right edge is
/// left of this fraction of the previous title's width.
const DOCUMENT_NAME_WIDTH_RATIO: f32 = 0.66;

/// Uwazi stores selection rectangles in CSS pixels, segments are in PDF points.
const UWAZI_POINT_TO_PIXEL: f32 = 0.75;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocItem {
    pub indentation: usize,
    pub label: String,
    pub selection_rectangle: SegmentBox,
    pub point_closed: bool,
}

/// Nesting depth of a heading from its numbering: `"1 Intro"` and `"1. Intro"`
/// are 0, `"1.2 Scope"` is 1, `"1.2.3 Something"` and `"1.2.3. Something"` are 2.
pub fn title_indentation(label: &str) -> usize {
    let Some(first_word) = label.split_whitespace().next() else {
        return 0;
    };
    if !first_word.contains('.') {
        return 0;
    }
    first_word
        .split('.')
        .filter(|part| !part.is_empty())
        .count()
        .saturating_sub(1)
}

enum FrontMatterScan<'a> {
    Scanning { previous: Option<&'a SegmentBox> },
    Collecting,
}

/// Indices of the leading title segments that spell the document name.
///
/// Page headers and pictures before the name are ignored. Consecutive titles are
/// treated as a single name block while each one reaches far enough to the right
/// of the previous one.
pub fn document_name_segments(segments: &[SegmentBox]) -> Vec<usize> {
    let mut state = FrontMatterScan::Scanning { previous: None };
    let mut name_segments = Vec::new();

    for (idx, segment) in segments.iter().enumerate() {
        let FrontMatterScan::Scanning { previous } = state else {
            break;
        };
        state = match segment.segment_type {
            SegmentType::PageHeader | SegmentType::Picture => FrontMatterScan::Scanning { previous },
            SegmentType::Title | SegmentType::SectionHeader => {
                let right = segment.left + segment.width;
                match previous {
                    Some(prev) if right < prev.left + prev.width * DOCUMENT_NAME_WIDTH_RATIO => {
                        FrontMatterScan::Collecting
                    }
                    _ => {
                        name_segments.push(idx);
                        FrontMatterScan::Scanning {
                            previous: Some(segment),
                        }
                    }
                }
            }
            _ => FrontMatterScan::Collecting,
        };
    }
    name_segments
}

/// Builds the table of contents from segments in reading order.
#[instrument(skip_all)]
pub fn extract_table_of_contents(segments: &[SegmentBox], skip_document_name: bool) -> Vec<TocItem> {
    let skipped = if skip_document_name {
        document_name_segments(segments)
    } else {
        Vec::new()
    };
    let items: Vec<TocItem> = segments
        .iter()
        .enumerate()
        .filter(|(idx, s)| s.segment_type.is_title() && !skipped.contains(idx))
        .filter(|(_, s)| !s.text.trim().is_empty())
        .map(|(_, s)| TocItem {
            indentation: title_indentation(s.text.trim()),
            label: s.text.trim().to_owned(),
            selection_rectangle: s.clone(),
            point_closed: false,
        })
        .collect();
    tracing::debug!(
        "toc with {} items ({} document name segments skipped)",
        items.len(),
        skipped.len()
    );
    items
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocBoundingBox<T> {
    pub left: T,
    pub top: T,
    pub width: T,
    pub height: T,
    pub page: PageNumber,
}

/// Serialized TOC entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocEntry {
    pub indentation: usize,
    pub label: String,
    pub bounding_box: TocBoundingBox<f32>,
}

impl From<&TocItem> for TocEntry {
    fn from(item: &TocItem) -> Self {
        let s = &item.selection_rectangle;
        Self {
            indentation: item.indentation,
            label: item.label.clone(),
            bounding_box: TocBoundingBox {
                left: s.left,
                top: s.top,
                width: s.width,
                height: s.height,
                page: s.page_number,
            },
        }
    }
}

/// TOC entry in the shape Uwazi expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UwaziTocEntry {
    pub indentation: usize,
    pub label: String,
    #[serde(rename = "selectionRectangles")]
    pub selection_rectangles: Vec<TocBoundingBox<i64>>,
}

fn to_uwazi_unit(value: f32) -> i64 {
    (value / UWAZI_POINT_TO_PIXEL).trunc() as i64
}

pub fn format_toc_for_uwazi(items: &[TocItem]) -> Vec<UwaziTocEntry> {
    items
        .iter()
        .map(|item| {
            let s = &item.selection_rectangle;
            UwaziTocEntry {
                indentation: item.indentation,
                label: item.label.clone(),
                selection_rectangles: vec![TocBoundingBox {
                    left: to_uwazi_unit(s.left),
                    top: to_uwazi_unit(s.top),
                    width: to_uwazi_unit(s.width),
                    height: to_uwazi_unit(s.height),
                    page: s.page_number,
                }],
            }
        })
        .collect()
}
