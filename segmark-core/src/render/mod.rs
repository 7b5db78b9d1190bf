use std::{collections::HashMap, fmt, str::FromStr};

use anyhow::Context;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    entities::{Link, PageNumber, ParsedDocument, Rectangle, Segment, SegmentID, SegmentType, Token},
    style::{strip_bullet, ScriptType, TitleType},
    toc::title_indentation,
    utils::sanitize_doc_name,
};

pub mod html;
pub mod markdown;

pub use html::Html;
pub use markdown::Markdown;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Markdown => f.write_str("markdown"),
            OutputFormat::Html => f.write_str("html"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            _ => anyhow::bail!("unknown output format '{s}', expected markdown or html"),
        }
    }
}

/// Markup dialect used by the renderer. Only wrapping differs between
/// dialects, the segment dispatch is shared.
pub trait MarkupSyntax {
    fn bold_italic(&self, content: &str) -> String;
    fn bold(&self, content: &str) -> String;
    fn italic(&self, content: &str) -> String;
    fn web_link(&self, content: &str, url: &str) -> String;
    fn heading(&self, title_type: TitleType, content: &str) -> String;
    fn list_item(&self, depth: usize, content: &str) -> String;
    fn reference_link(&self, text: &str, destination: &str) -> String;
    fn toc_header(&self) -> &'static str;
    fn toc_entry(&self, indentation: usize, label: &str, segment_id: &str) -> String;
    fn toc_footer(&self) -> &'static str;

    fn anchor(&self, segment_id: &str) -> String {
        format!("<span id='{}'></span>\n", segment_id)
    }

    fn script(&self, script_type: ScriptType, content: &str) -> String {
        match script_type {
            ScriptType::Regular => content.to_owned(),
            ScriptType::Superscript => format!("<sup>{}</sup>", content),
            ScriptType::Subscript => format!("<sub>{}</sub>", content),
        }
    }
}

/// Token content with its emphasis, script and web link wrapping.
pub fn styled_token<S: MarkupSyntax>(syntax: &S, token: &Token) -> String {
    let style = &token.style;
    let content = match (style.is_bold(), style.is_italic()) {
        (true, true) => syntax.bold_italic(&token.content),
        (true, false) => syntax.bold(&token.content),
        (false, true) => syntax.italic(&token.content),
        (false, false) => token.content.clone(),
    };
    let content = syntax.script(style.script_type, &content);
    match style.hyperlink.web_url() {
        Some(url) => syntax.web_link(&content, url),
        None => content,
    }
}

/// Replaces each link's text with a reference to its destination, left to right.
/// The search resumes after the inserted link so link text is never matched twice.
pub fn insert_reference_links<'a, S: MarkupSyntax>(
    syntax: &S,
    content: &str,
    links: impl IntoIterator<Item = &'a Link>,
) -> String {
    let mut result = content.to_owned();
    let mut offset = 0;
    for link in links {
        let Some(found) = result[offset..].find(&link.text) else {
            continue;
        };
        let start = offset + found;
        let reference = syntax.reference_link(&link.text, &link.destination_segment);
        result.replace_range(start..start + link.text.len(), &reference);
        offset = start + reference.len();
    }
    result
}

/// Configuration for markup rendering
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    /// Prepend a table of contents built from the title segments
    pub extract_toc: bool,
    /// Base name used for picture files. Defaults to the sanitized document name
    pub image_base_name: Option<String>,
}

/// One rendered segment (or the table of contents when `segment_type` is None).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPart {
    pub segment_id: Option<SegmentID>,
    pub segment_type: Option<SegmentType>,
    pub content: String,
}

/// Picture the external cropper has to extract for the rendered document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PictureReference {
    pub segment_id: SegmentID,
    pub page_number: PageNumber,
    pub file_name: String,
    pub rectangle: Rectangle,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderedDocument {
    pub parts: Vec<RenderedPart>,
    pub pictures: Vec<PictureReference>,
}

impl RenderedDocument {
    pub fn markup(&self) -> String {
        self.parts.iter().map(|p| p.content.as_str()).collect()
    }

    pub fn has_toc(&self) -> bool {
        self.parts.first().is_some_and(|p| p.segment_type.is_none())
    }
}

pub trait Render {
    type Output;
    fn render<R: Renderer>(&self, renderer: &mut R) -> anyhow::Result<Self::Output>;
}

pub trait Renderer {
    type Ok;

    fn render_toc(&mut self, doc: &ParsedDocument) -> anyhow::Result<Self::Ok>;

    fn render_segment(&mut self, segment: &Segment, doc: &ParsedDocument) -> anyhow::Result<Self::Ok>;
}

impl Render for &ParsedDocument {
    type Output = ();

    fn render<R: Renderer>(&self, renderer: &mut R) -> anyhow::Result<()> {
        renderer.render_toc(self).context("can't render table of contents")?;
        for segment in &self.segments {
            renderer
                .render_segment(segment, self)
                .with_context(|| format!("can't render segment {}", segment.id))?;
        }
        Ok(())
    }
}

pub struct MarkupRenderer<S> {
    syntax: S,
    config: RenderConfig,
    parts: Vec<RenderedPart>,
    pictures: Vec<PictureReference>,
    picture_counters: HashMap<PageNumber, usize>,
}

impl<S: MarkupSyntax> MarkupRenderer<S> {
    pub fn new(syntax: S, config: RenderConfig) -> Self {
        Self {
            syntax,
            config,
            parts: Vec::new(),
            pictures: Vec::new(),
            picture_counters: HashMap::new(),
        }
    }

    pub fn finalize(self) -> RenderedDocument {
        RenderedDocument {
            parts: self.parts,
            pictures: self.pictures,
        }
    }

    fn push(&mut self, segment: &Segment, content: String) {
        if content.is_empty() {
            return;
        }
        self.parts.push(RenderedPart {
            segment_id: Some(segment.id.clone()),
            segment_type: Some(segment.kind()),
            content,
        });
    }

    fn joined_tokens(&self, segment: &Segment) -> String {
        segment
            .tokens
            .iter()
            .map(|t| styled_token(&self.syntax, t))
            .join(" ")
    }

    /// Tokens of a list item, the bullet removed before the first token gets its style.
    fn joined_list_tokens(&self, segment: &Segment) -> String {
        let mut tokens = segment.tokens.iter();
        let first = tokens.next().and_then(|first| {
            let content = strip_bullet(&first.content);
            (!content.is_empty()).then(|| {
                styled_token(
                    &self.syntax,
                    &Token {
                        content: content.to_owned(),
                        ..first.clone()
                    },
                )
            })
        });
        first
            .into_iter()
            .chain(tokens.map(|t| styled_token(&self.syntax, t)))
            .join(" ")
    }

    fn render_picture(&mut self, segment: &Segment, doc: &ParsedDocument) -> String {
        let counter = self.picture_counters.entry(segment.page_number()).or_insert(0);
        let picture_id = *counter;
        *counter += 1;

        let base_name = self
            .config
            .image_base_name
            .clone()
            .unwrap_or_else(|| sanitize_doc_name(&doc.doc_name));
        let file_name = format!("{}_{}_{}.png", base_name, segment.page_number(), picture_id);
        let content = format!(
            "{}<img src='{}_pictures/{}' alt=''>\n\n",
            self.syntax.anchor(&segment.id),
            base_name,
            file_name
        );
        self.pictures.push(PictureReference {
            segment_id: segment.id.clone(),
            page_number: segment.page_number(),
            file_name,
            rectangle: segment.rectangle,
        });
        content
    }

    fn render_title(&self, segment: &Segment) -> String {
        let heading = match segment.tokens.first() {
            Some(first) => {
                let title_type = match first.style.title_type {
                    TitleType::NoTitle => TitleType::H4,
                    t => t,
                };
                self.syntax.heading(title_type, &self.joined_tokens(segment))
            }
            None if segment.text().trim().is_empty() => return String::new(),
            None => self.syntax.heading(TitleType::H4, segment.text().trim()),
        };
        format!("{}{}\n\n", self.syntax.anchor(&segment.id), heading)
    }

    fn render_regular(&self, segment: &Segment, doc: &ParsedDocument) -> String {
        if segment.tokens.is_empty() {
            return String::new();
        }
        let list_depth = segment.list_level().depth();
        let mut content = match list_depth {
            Some(_) => self.joined_list_tokens(segment),
            None => self.joined_tokens(segment),
        };
        if doc.is_link_source(&segment.id) {
            content = insert_reference_links(&self.syntax, &content, doc.links_from(&segment.id));
        }
        if let Some(depth) = list_depth {
            content = self.syntax.list_item(depth, &content);
        }
        if doc.is_link_destination(&segment.id) {
            content = format!("{}{}", self.syntax.anchor(&segment.id), content);
        }
        content + "\n\n"
    }
}

impl<S: MarkupSyntax> Renderer for MarkupRenderer<S> {
    type Ok = ();

    fn render_toc(&mut self, doc: &ParsedDocument) -> anyhow::Result<()> {
        if !self.config.extract_toc {
            return Ok(());
        }
        let titles = doc
            .segments
            .iter()
            .filter(|s| s.kind().is_title())
            .map(|s| (s.text(), s.id.as_str()));
        let toc = toc_markup(&self.syntax, titles);
        self.parts.push(RenderedPart {
            segment_id: None,
            segment_type: None,
            content: toc,
        });
        Ok(())
    }

    fn render_segment(&mut self, segment: &Segment, doc: &ParsedDocument) -> anyhow::Result<()> {
        let content = match segment.kind() {
            SegmentType::Picture => self.render_picture(segment, doc),
            SegmentType::Table => format!("{}{}\n\n", self.syntax.anchor(&segment.id), segment.text()),
            SegmentType::Title | SegmentType::SectionHeader => self.render_title(segment),
            SegmentType::Formula => format!("{}\n\n", segment.text()),
            SegmentType::Text
            | SegmentType::ListItem
            | SegmentType::Caption
            | SegmentType::Footnote
            | SegmentType::PageHeader
            | SegmentType::PageFooter => self.render_regular(segment, doc),
        };
        self.push(segment, content);
        Ok(())
    }
}

fn toc_markup<'a, S: MarkupSyntax>(
    syntax: &S,
    titles: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> String {
    let mut toc = syntax.toc_header().to_owned();
    for (label, segment_id) in titles {
        let label = label.trim();
        if label.is_empty() {
            continue;
        }
        toc.push_str(&syntax.toc_entry(title_indentation(label), label, segment_id));
    }
    toc.push_str(syntax.toc_footer());
    toc
}

/// Table of contents for `(label, segment id)` pairs, titles with an empty label are skipped.
pub fn table_of_contents<'a>(
    format: OutputFormat,
    titles: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> String {
    match format {
        OutputFormat::Markdown => toc_markup(&Markdown, titles),
        OutputFormat::Html => toc_markup(&Html, titles),
    }
}

/// Renders the document in the requested format.
#[tracing::instrument(skip_all, fields(format = %format))]
pub fn to_markup(
    doc: &ParsedDocument,
    format: OutputFormat,
    config: RenderConfig,
) -> anyhow::Result<RenderedDocument> {
    let rendered = match format {
        OutputFormat::Markdown => {
            let mut renderer = MarkupRenderer::new(Markdown, config);
            doc.render(&mut renderer)?;
            renderer.finalize()
        }
        OutputFormat::Html => {
            let mut renderer = MarkupRenderer::new(Html, config);
            doc.render(&mut renderer)?;
            renderer.finalize()
        }
    };
    tracing::debug!(
        "rendered {} parts and {} pictures",
        rendered.parts.len(),
        rendered.pictures.len()
    );
    Ok(rendered)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        entities::{DocumentMetadata, PageInfo, PdfFont, SegmentBox},
        style::{HyperlinkStyle, ListLevel, TokenStyle},
    };

    pub(crate) fn create_token(content: &str, style: TokenStyle) -> Token {
        Token {
            page_number: 1,
            content: content.to_owned(),
            rectangle: Rectangle::new(0.0, 0.0, 10.0, 10.0),
            font: style.font.clone(),
            markup: None,
            style,
        }
    }

    pub(crate) fn plain() -> TokenStyle {
        TokenStyle::from_font(&PdfFont::default())
    }

    pub(crate) fn create_segment(
        idx: usize,
        segment_type: SegmentType,
        text: &str,
        tokens: Vec<Token>,
    ) -> Segment {
        Segment::new(
            idx,
            SegmentBox {
                left: 0.0,
                top: 10.0 * idx as f32,
                width: 100.0,
                height: 10.0,
                page_number: 1,
                page_width: 612,
                page_height: 792,
                text: text.to_owned(),
                segment_type,
            },
            tokens,
        )
    }

    pub(crate) fn create_doc(segments: Vec<Segment>, links: Vec<Link>) -> ParsedDocument {
        ParsedDocument {
            doc_name: "My Report.pdf".to_owned(),
            pages: vec![PageInfo {
                page_number: 1,
                page_width: 612,
                page_height: 792,
            }],
            segments,
            links,
            metadata: DocumentMetadata::new(std::time::Duration::ZERO, 0),
        }
    }

    #[test]
    fn test_styled_token_order() {
        let style = TokenStyle {
            bold_markup: true,
            italic_markup: true,
            hyperlink: HyperlinkStyle::WebUrl("http://x.com".to_owned()),
            ..plain()
        };
        let token = create_token("x", style);
        assert_eq!(styled_token(&Markdown, &token), "[**_x_**](http://x.com)");
        assert_eq!(
            styled_token(&Html, &token),
            "<a href=\"http://x.com\"><b><i>x</i></b></a>"
        );

        let sup = create_token("2", plain().with_script_type(ScriptType::Superscript));
        assert_eq!(styled_token(&Markdown, &sup), "<sup>2</sup>");
    }

    #[test]
    fn test_insert_reference_links_never_rematches() {
        let links = vec![
            Link {
                source_segment: "page-1-0".to_owned(),
                destination_segment: "page-2-0".to_owned(),
                text: "[1]".to_owned(),
            },
            Link {
                source_segment: "page-1-0".to_owned(),
                destination_segment: "page-2-1".to_owned(),
                text: "1".to_owned(),
            },
        ];
        let content = insert_reference_links(&Markdown, "see [1] and 1 more", &links);
        assert_eq!(content, "see [\\[1\\]](#page-2-0) and [1](#page-2-1) more");

        let missing = vec![Link {
            source_segment: "page-1-0".to_owned(),
            destination_segment: "page-2-0".to_owned(),
            text: "absent".to_owned(),
        }];
        assert_eq!(insert_reference_links(&Markdown, "text", &missing), "text");
    }

    #[test]
    fn test_render_markdown_document() -> anyhow::Result<()> {
        let title = create_segment(
            0,
            SegmentType::Title,
            "1.1. Results",
            vec![
                create_token("1.1.", plain().with_title_type(TitleType::H2)),
                create_token("Results", plain().with_title_type(TitleType::H2)),
            ],
        );
        let text = create_segment(
            1,
            SegmentType::Text,
            "See note",
            vec![create_token("See", plain()), create_token("note", plain())],
        );
        let picture = create_segment(2, SegmentType::Picture, "", vec![]);
        let table = create_segment(3, SegmentType::Table, "| a |", vec![]);
        let formula = create_segment(4, SegmentType::Formula, "$$x$$", vec![]);
        let empty = create_segment(5, SegmentType::Text, "", vec![]);
        let footnote = create_segment(
            6,
            SegmentType::Footnote,
            "note",
            vec![create_token("note", plain())],
        );
        let links = vec![Link {
            source_segment: "page-1-1".to_owned(),
            destination_segment: "page-1-6".to_owned(),
            text: "note".to_owned(),
        }];
        let doc = create_doc(
            vec![title, text, picture, table, formula, empty, footnote],
            links,
        );

        let rendered = to_markup(
            &doc,
            OutputFormat::Markdown,
            RenderConfig {
                extract_toc: true,
                image_base_name: None,
            },
        )?;
        assert!(rendered.has_toc());
        assert_eq!(rendered.parts.len(), 7);
        assert_eq!(
            rendered.markup(),
            "# Table of Contents\n\n\
             \x20\x20- [1.1. Results](#page-1-0)\n\n\n\n\
             <span id='page-1-0'></span>\n## 1.1. Results\n\n\
             See [note](#page-1-6)\n\n\
             <span id='page-1-2'></span>\n<img src='My_Report_pictures/My_Report_1_0.png' alt=''>\n\n\
             <span id='page-1-3'></span>\n| a |\n\n\
             $$x$$\n\n\
             <span id='page-1-6'></span>\nnote\n\n"
        );
        assert_eq!(rendered.pictures.len(), 1);
        assert_eq!(rendered.pictures[0].file_name, "My_Report_1_0.png");
        Ok(())
    }

    #[test]
    fn test_render_title_without_tokens() -> anyhow::Result<()> {
        let doc = create_doc(
            vec![
                create_segment(0, SegmentType::SectionHeader, "Annex", vec![]),
                create_segment(1, SegmentType::SectionHeader, "  ", vec![]),
            ],
            vec![],
        );
        let rendered = to_markup(&doc, OutputFormat::Markdown, RenderConfig::default())?;
        assert_eq!(rendered.markup(), "<span id='page-1-0'></span>\n#### Annex\n\n");
        assert!(!rendered.has_toc());
        Ok(())
    }

    #[test]
    fn test_render_list_items() -> anyhow::Result<()> {
        let item = |idx, glyph: &str, word: &str, level| {
            create_segment(
                idx,
                SegmentType::ListItem,
                "",
                vec![
                    create_token(glyph, plain().with_list_level(level)),
                    create_token(word, plain().with_list_level(level)),
                ],
            )
        };
        let doc = create_doc(
            vec![
                item(0, "•", "first", ListLevel::Level0),
                item(1, "◦", "nested", ListLevel::Level1),
            ],
            vec![],
        );
        let markdown = to_markup(&doc, OutputFormat::Markdown, RenderConfig::default())?;
        assert_eq!(markdown.markup(), "- first\n\n  - nested\n\n");

        let html = to_markup(&doc, OutputFormat::Html, RenderConfig::default())?;
        assert_eq!(
            html.markup(),
            "<ul><li>first</li></ul>\n\n<ul><ul><li>nested</li></ul></ul>\n\n"
        );
        Ok(())
    }

    #[test]
    fn test_render_list_items_with_styled_bullets() -> anyhow::Result<()> {
        let doc = create_doc(
            vec![
                create_segment(
                    0,
                    SegmentType::ListItem,
                    "",
                    vec![
                        create_token(
                            "•",
                            TokenStyle {
                                bold_markup: true,
                                ..plain().with_list_level(ListLevel::Level0)
                            },
                        ),
                        create_token("first", plain().with_list_level(ListLevel::Level0)),
                    ],
                ),
                create_segment(
                    1,
                    SegmentType::ListItem,
                    "",
                    vec![
                        create_token("-", plain().with_list_level(ListLevel::Level1)),
                        create_token("second", plain().with_list_level(ListLevel::Level1)),
                    ],
                ),
            ],
            vec![],
        );
        let markdown = to_markup(&doc, OutputFormat::Markdown, RenderConfig::default())?;
        assert_eq!(markdown.markup(), "- first\n\n  - second\n\n");
        Ok(())
    }

    #[test]
    fn test_output_format_from_str() -> anyhow::Result<()> {
        assert_eq!("HTML".parse::<OutputFormat>()?, OutputFormat::Html);
        assert_eq!("md".parse::<OutputFormat>()?, OutputFormat::Markdown);
        assert!("pdf".parse::<OutputFormat>().is_err());
        Ok(())
    }
}
