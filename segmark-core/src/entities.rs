use std::{fmt, time::Duration};

use anyhow::Context;
use plsfix::fix_text;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::style::{ListLevel, TokenStyle};

pub type PageNumber = u32;
pub type SegmentID = String;

const SEGMARK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Axis aligned box in page coordinates (origin top-left, y grows downwards).
///
/// A rectangle is always repaired on construction: a zero width or height is
/// widened by one unit on each side and inverted coordinates are swapped, so
/// `right > left` and `bottom > top` hold for every value of this type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RectangleCoords")]
pub struct Rectangle {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

#[derive(Deserialize)]
struct RectangleCoords {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl From<RectangleCoords> for Rectangle {
    fn from(c: RectangleCoords) -> Self {
        Rectangle::new(c.left, c.top, c.right, c.bottom)
    }
}

impl Rectangle {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        let (mut left, mut top, mut right, mut bottom) = (left, top, right, bottom);
        if right == left {
            left -= 1.0;
            right += 1.0;
        }
        if top == bottom {
            top -= 1.0;
            bottom += 1.0;
        }
        if right < left {
            std::mem::swap(&mut left, &mut right);
        }
        if bottom < top {
            std::mem::swap(&mut top, &mut bottom);
        }
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_width_height(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.left
    }
    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.top
    }
    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.right
    }
    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.bottom
    }
    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }
    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
    #[inline(always)]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
    #[inline(always)]
    pub fn center_x(&self) -> f32 {
        self.left + self.width() / 2f32
    }

    /// Percentage (0..=100) of `self` covered by `other`.
    ///
    /// The reference area is always `self`, so `a.intersection_percentage(b)` and
    /// `b.intersection_percentage(a)` differ unless both boxes have the same area.
    #[inline(always)]
    pub fn intersection_percentage(&self, other: &Self) -> f32 {
        let x1 = f32::max(self.left, other.left);
        let y1 = f32::max(self.top, other.top);
        let x2 = f32::min(self.right, other.right);
        let y2 = f32::min(self.bottom, other.bottom);

        if x2 <= x1 || y2 <= y1 {
            return 0f32;
        }
        100f32 * (x2 - x1) * (y2 - y1) / self.area()
    }

    /// Length of the shared vertical span, 0 when the boxes don't overlap vertically.
    #[inline(always)]
    pub fn vertical_intersection(&self, other: &Self) -> f32 {
        let top = f32::max(self.top, other.top);
        let bottom = f32::min(self.bottom, other.bottom);
        if bottom <= top {
            0f32
        } else {
            bottom - top
        }
    }

    /// Horizontal gap between the boxes. Negative values mean the boxes overlap on x.
    #[inline(always)]
    pub fn horizontal_distance(&self, other: &Self) -> f32 {
        f32::max(self.left, other.left) - f32::min(self.right, other.right)
    }

    pub fn merge_with(&self, other: &Self) -> Self {
        Self::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Bounding box of all the rectangles, `None` for an empty input.
    pub fn merge<'a>(rectangles: impl IntoIterator<Item = &'a Rectangle>) -> Option<Rectangle> {
        rectangles
            .into_iter()
            .fold(None, |acc: Option<Rectangle>, r| match acc {
                None => Some(*r),
                Some(merged) => Some(merged.merge_with(r)),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfFont {
    pub font_id: String,
    pub font_size: f32,
    pub bold: bool,
    pub italics: bool,
    pub color: String,
}

const ITALIC_FAMILY_MARKERS: [&str; 5] = ["Italic", "italic", "Ital", "ital", "Ita"];
const BOLD_FAMILY_MARKERS: [&str; 2] = ["Bold", "bold"];

impl PdfFont {
    pub fn from_family(font_id: &str, font_size: f32, family: &str, color: &str) -> Self {
        Self {
            font_id: font_id.to_owned(),
            font_size,
            bold: BOLD_FAMILY_MARKERS.iter().any(|m| family.contains(m)),
            italics: ITALIC_FAMILY_MARKERS.iter().any(|m| family.contains(m)),
            color: color.to_owned(),
        }
    }
}

/// Font description as sent by the feature provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFont {
    #[serde(default)]
    pub font_id: String,
    pub font_size: f32,
    #[serde(default)]
    pub family: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "#000000".to_owned()
}

/// Text run as sent by the feature provider, before any repair or styling.
#[derive(Debug, Clone, Deserialize)]
pub struct RawToken {
    pub content: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub font: RawFont,
    /// Inline markup of the run (`<b>`, `<i>`, `<a href>` tags wrapping the text)
    #[serde(default)]
    pub markup: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Token {
    pub page_number: PageNumber,
    pub content: String,
    pub rectangle: Rectangle,
    pub font: PdfFont,
    pub markup: Option<String>,
    pub style: TokenStyle,
}

impl Token {
    /// Builds a token from a raw provider run. Returns `None` for whitespace-only runs.
    pub fn from_raw(page_number: PageNumber, raw: RawToken) -> Option<Self> {
        if raw.content.trim().is_empty() {
            return None;
        }
        let rectangle = token_rectangle(&raw);
        let font = PdfFont::from_family(
            &raw.font.font_id,
            raw.font.font_size,
            &raw.font.family,
            &raw.font.color,
        );
        let content = fix_text(&raw.content, None).trim().to_owned();
        let style = TokenStyle::from_font(&font);
        Some(Self {
            page_number,
            content,
            rectangle,
            font,
            markup: raw.markup,
            style,
        })
    }
}

/// Providers report the box of the whole run, including a leading or trailing
/// space. We shave one average character width off those sides.
fn token_rectangle(raw: &RawToken) -> Rectangle {
    let x_min = raw.left;
    let y_min = raw.top;
    let x_max = x_min + raw.width;
    let y_max = y_min + raw.height;

    let char_count = raw.content.chars().count();
    if char_count <= 1 {
        return Rectangle::new(x_min, y_min, x_max, y_max);
    }
    let one_character_length = f32::max(((x_max - x_min) / char_count as f32).trunc(), 2f32);
    let x_min = if raw.content.starts_with(' ') {
        x_min + one_character_length
    } else {
        x_min
    };
    let x_max = if raw.content.ends_with(' ') {
        x_max - one_character_length
    } else {
        x_max
    };
    Rectangle::new(x_min, y_min, x_max, y_max)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPdfPage {
    pub page_number: PageNumber,
    pub page_width: u32,
    pub page_height: u32,
    #[serde(default)]
    pub tokens: Vec<RawToken>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfPage {
    pub page_number: PageNumber,
    pub page_width: u32,
    pub page_height: u32,
    pub tokens: Vec<Token>,
}

/// Internal hyperlink annotation (a link whose target is a page of the same document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfLink {
    pub page_number: PageNumber,
    pub source: Rectangle,
    pub destination_page: PageNumber,
    /// Target point on the destination page, top of the page when absent
    #[serde(default)]
    pub destination: Option<[f32; 2]>,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPdfFeatures {
    #[serde(default)]
    file_name: String,
    pages: Vec<RawPdfPage>,
    #[serde(default)]
    links: Vec<PdfLink>,
}

/// Everything the PDF feature provider knows about a document.
#[derive(Debug, Clone, Serialize)]
pub struct PdfFeatures {
    pub file_name: String,
    pub pages: Vec<PdfPage>,
    pub links: Vec<PdfLink>,
}

impl PdfFeatures {
    pub fn new(file_name: String, pages: Vec<RawPdfPage>, links: Vec<PdfLink>) -> Self {
        let pages = pages
            .into_iter()
            .map(|raw_page| PdfPage {
                page_number: raw_page.page_number,
                page_width: raw_page.page_width,
                page_height: raw_page.page_height,
                tokens: raw_page
                    .tokens
                    .into_iter()
                    .filter_map(|t| Token::from_raw(raw_page.page_number, t))
                    .collect(),
            })
            .collect();
        Self {
            file_name,
            pages,
            links,
        }
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let raw: RawPdfFeatures =
            serde_json::from_str(data).context("can't deserialize pdf features")?;
        if raw.pages.is_empty() {
            anyhow::bail!("pdf features for '{}' contain no pages", raw.file_name);
        }
        Ok(Self::new(raw.file_name, raw.pages, raw.links))
    }

    pub fn page(&self, page_number: PageNumber) -> Option<&PdfPage> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentType {
    Formula,
    Footnote,
    ListItem,
    Table,
    Picture,
    Title,
    Text,
    PageHeader,
    SectionHeader,
    Caption,
    PageFooter,
}

impl SegmentType {
    pub const ALL: [SegmentType; 11] = [
        SegmentType::Formula,
        SegmentType::Footnote,
        SegmentType::ListItem,
        SegmentType::Table,
        SegmentType::Picture,
        SegmentType::Title,
        SegmentType::Text,
        SegmentType::PageHeader,
        SegmentType::SectionHeader,
        SegmentType::Caption,
        SegmentType::PageFooter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Formula => "Formula",
            SegmentType::Footnote => "Footnote",
            SegmentType::ListItem => "List item",
            SegmentType::Table => "Table",
            SegmentType::Picture => "Picture",
            SegmentType::Title => "Title",
            SegmentType::Text => "Text",
            SegmentType::PageHeader => "Page header",
            SegmentType::SectionHeader => "Section header",
            SegmentType::Caption => "Caption",
            SegmentType::PageFooter => "Page footer",
        }
    }

    /// Lenient parse: case and `_`/`-`/space separators are ignored.
    /// Unknown names are read as [`SegmentType::Text`].
    pub fn from_text(text: &str) -> Self {
        let key: String = text
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().replace(' ', "").to_lowercase() == key)
            .unwrap_or(SegmentType::Text)
    }

    #[inline(always)]
    pub fn is_title(&self) -> bool {
        matches!(self, SegmentType::Title | SegmentType::SectionHeader)
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SegmentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SegmentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SegmentTypeVisitor;
        impl de::Visitor<'_> for SegmentTypeVisitor {
            type Value = SegmentType;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a segment type name")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> Result<SegmentType, E> {
                Ok(SegmentType::from_text(v))
            }
        }
        deserializer.deserialize_str(SegmentTypeVisitor)
    }
}

impl Default for SegmentType {
    fn default() -> Self {
        SegmentType::Text
    }
}

/// Serializable segment record, this is also the layout of `segmentation.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub page_number: PageNumber,
    pub page_width: u32,
    pub page_height: u32,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub segment_type: SegmentType,
}

impl SegmentBox {
    pub fn rectangle(&self) -> Rectangle {
        Rectangle::from_width_height(self.left, self.top, self.width, self.height)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    /// Stable anchor id: `page-{page_number}-{ordinal in page}`
    pub id: SegmentID,
    pub segment_box: SegmentBox,
    pub rectangle: Rectangle,
    pub tokens: Vec<Token>,
}

impl Segment {
    pub fn new(index_in_page: usize, segment_box: SegmentBox, tokens: Vec<Token>) -> Self {
        Self {
            id: segment_id(segment_box.page_number, index_in_page),
            rectangle: segment_box.rectangle(),
            segment_box,
            tokens,
        }
    }

    #[inline(always)]
    pub fn kind(&self) -> SegmentType {
        self.segment_box.segment_type
    }

    #[inline(always)]
    pub fn page_number(&self) -> PageNumber {
        self.segment_box.page_number
    }

    pub fn text(&self) -> &str {
        &self.segment_box.text
    }

    pub fn list_level(&self) -> ListLevel {
        self.tokens
            .first()
            .map(|t| t.style.list_level)
            .unwrap_or_default()
    }
}

pub fn segment_id(page_number: PageNumber, index_in_page: usize) -> SegmentID {
    format!("page-{}-{}", page_number, index_in_page)
}

/// Internal reference between two segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub source_segment: SegmentID,
    pub destination_segment: SegmentID,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentMetadata {
    pub parsing_duration_ms: u128,
    pub orphan_tokens: usize,
    pub segmark_version: String,
}

impl DocumentMetadata {
    pub fn new(parsing_duration: Duration, orphan_tokens: usize) -> Self {
        Self {
            parsing_duration_ms: parsing_duration.as_millis(),
            orphan_tokens,
            segmark_version: SEGMARK_VERSION.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub page_number: PageNumber,
    pub page_width: u32,
    pub page_height: u32,
}

#[derive(Debug, Serialize)]
pub struct ParsedDocument {
    pub doc_name: String,
    pub pages: Vec<PageInfo>,
    /// Segments in reading order (page order, then layout order within a page)
    pub segments: Vec<Segment>,
    pub links: Vec<Link>,
    pub metadata: DocumentMetadata,
}

impl ParsedDocument {
    pub fn segment_boxes(&self) -> Vec<SegmentBox> {
        self.segments.iter().map(|s| s.segment_box.clone()).collect()
    }

    pub fn is_link_source(&self, segment_id: &str) -> bool {
        self.links.iter().any(|l| l.source_segment == segment_id)
    }

    pub fn is_link_destination(&self, segment_id: &str) -> bool {
        self.links.iter().any(|l| l.destination_segment == segment_id)
    }

    pub fn links_from<'a>(&'a self, segment_id: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links
            .iter()
            .filter(move |l| l.source_segment == segment_id)
    }
}
