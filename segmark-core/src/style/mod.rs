use serde::Serialize;

use crate::entities::{PdfFont, Rectangle, SegmentType, Token};

mod list;
mod markup;

pub use list::{assign_list_levels, strip_bullet, ListLevel};
pub use markup::HyperlinkStyle;

/// Tokens smaller than this fraction of the page's common height can be scripts
const SCRIPT_HEIGHT_RATIO: f32 = 0.8;

/// Height ratios (token / common) above which a title token gets H1, H2, H3.
/// Anything below is H4.
const TITLE_H1_RATIO: f32 = 2.0;
const TITLE_H2_RATIO: f32 = 1.4;
const TITLE_H3_RATIO: f32 = 1.2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ScriptType {
    #[default]
    Regular,
    Superscript,
    Subscript,
}

impl ScriptType {
    /// Only short numeric runs noticeably smaller than the common text height are
    /// candidates (footnote calls, exponents, indices). Their position relative to
    /// the centre of the text line they sit on decides the kind.
    pub fn from_text_height(
        content: &str,
        rectangle: &Rectangle,
        common_height: f32,
        page_rectangles: &[Rectangle],
    ) -> Self {
        if content.is_empty() || !content.chars().all(|c| c.is_ascii_digit()) {
            return ScriptType::Regular;
        }
        if rectangle.height() >= SCRIPT_HEIGHT_RATIO * common_height {
            return ScriptType::Regular;
        }

        let same_line = page_rectangles
            .iter()
            .filter(|b| !(b.bottom() < rectangle.top() || rectangle.bottom() < b.top()));
        let line = Rectangle::merge(same_line).unwrap_or(*rectangle);
        let middle = line.top() + line.height() / 2f32;

        if (rectangle.top() - middle).abs() > (rectangle.bottom() - middle).abs() {
            ScriptType::Superscript
        } else {
            ScriptType::Subscript
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TitleType {
    #[default]
    NoTitle,
    H1,
    H2,
    H3,
    H4,
}

impl TitleType {
    pub fn from_height_ratio(segment_type: SegmentType, ratio: f32) -> Self {
        if !segment_type.is_title() {
            return TitleType::NoTitle;
        }
        if ratio > TITLE_H1_RATIO {
            TitleType::H1
        } else if ratio > TITLE_H2_RATIO {
            TitleType::H2
        } else if ratio > TITLE_H3_RATIO {
            TitleType::H3
        } else {
            TitleType::H4
        }
    }

    pub fn level(&self) -> Option<usize> {
        match self {
            TitleType::NoTitle => None,
            TitleType::H1 => Some(1),
            TitleType::H2 => Some(2),
            TitleType::H3 => Some(3),
            TitleType::H4 => Some(4),
        }
    }
}

/// Visual attributes of a token. Every classification pass returns a new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenStyle {
    pub font: PdfFont,
    pub hyperlink: HyperlinkStyle,
    pub bold_markup: bool,
    pub italic_markup: bool,
    pub script_type: ScriptType,
    pub title_type: TitleType,
    pub list_level: ListLevel,
}

impl TokenStyle {
    pub fn from_font(font: &PdfFont) -> Self {
        Self {
            font: font.clone(),
            ..Default::default()
        }
    }

    pub fn from_markup(font: &PdfFont, markup: Option<&str>, content: &str) -> Self {
        let Some(markup) = markup else {
            return Self::from_font(font);
        };
        Self {
            font: font.clone(),
            hyperlink: HyperlinkStyle::from_markup(markup, content),
            bold_markup: markup::wraps_content(markup, &markup::BOLD_RE, content),
            italic_markup: markup::wraps_content(markup, &markup::ITALIC_RE, content),
            ..Default::default()
        }
    }

    pub fn with_script_type(self, script_type: ScriptType) -> Self {
        Self {
            script_type,
            ..self
        }
    }

    pub fn with_title_type(self, title_type: TitleType) -> Self {
        Self { title_type, ..self }
    }

    pub fn with_list_level(self, list_level: ListLevel) -> Self {
        Self { list_level, ..self }
    }

    #[inline(always)]
    pub fn is_bold(&self) -> bool {
        self.bold_markup || self.font.bold
    }

    #[inline(always)]
    pub fn is_italic(&self) -> bool {
        self.italic_markup || self.font.italics
    }
}

/// Mode of the token heights, ties go to the height seen first.
pub fn most_common_text_height(tokens: &[Token]) -> Option<f32> {
    let mut counts: Vec<(f32, usize)> = Vec::new();
    for height in tokens.iter().map(|t| t.rectangle.height()) {
        match counts.iter_mut().find(|(h, _)| *h == height) {
            Some((_, count)) => *count += 1,
            None => counts.push((height, 1)),
        }
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(f32, usize)>, (h, c)| match best {
            Some((_, best_count)) if best_count >= c => best,
            _ => Some((h, c)),
        })
        .map(|(h, _)| h)
}

/// Page level statistics shared by all the tokens of a page.
#[derive(Debug)]
pub struct PageStyleContext {
    common_height: Option<f32>,
    rectangles: Vec<Rectangle>,
}

impl PageStyleContext {
    pub fn new(page_tokens: &[Token]) -> Self {
        Self {
            common_height: most_common_text_height(page_tokens),
            rectangles: page_tokens.iter().map(|t| t.rectangle).collect(),
        }
    }

    pub fn common_height(&self) -> Option<f32> {
        self.common_height
    }

    /// Full style for a token that landed in a segment of type `segment_type`.
    /// List levels are assigned later, once the page's segments are known.
    pub fn classify(&self, token: &Token, segment_type: SegmentType) -> TokenStyle {
        let style = TokenStyle::from_markup(&token.font, token.markup.as_deref(), &token.content);
        let Some(common_height) = self.common_height.filter(|h| *h > 0f32) else {
            return style.with_title_type(TitleType::from_height_ratio(segment_type, 0f32));
        };
        let script_type = ScriptType::from_text_height(
            &token.content,
            &token.rectangle,
            common_height,
            &self.rectangles,
        );
        let ratio = token.rectangle.height() / common_height;
        style
            .with_script_type(script_type)
            .with_title_type(TitleType::from_height_ratio(segment_type, ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{RawFont, RawToken};

    pub(crate) fn token(content: &str, left: f32, top: f32, width: f32, height: f32) -> Token {
        Token::from_raw(
            1,
            RawToken {
                content: content.to_owned(),
                left,
                top,
                width,
                height,
                font: RawFont {
                    font_id: "f0".to_owned(),
                    font_size: height,
                    family: "Helvetica".to_owned(),
                    color: "#000000".to_owned(),
                },
                markup: None,
            },
        )
        .expect("non empty token")
    }

    #[test]
    fn test_most_common_height_first_on_ties() {
        let tokens = vec![
            token("a", 0.0, 0.0, 10.0, 12.0),
            token("b", 0.0, 20.0, 10.0, 10.0),
            token("c", 0.0, 40.0, 10.0, 10.0),
            token("d", 0.0, 60.0, 10.0, 12.0),
        ];
        assert_eq!(most_common_text_height(&tokens), Some(12.0));
        assert_eq!(most_common_text_height(&[]), None);
    }

    #[test]
    fn test_script_type() {
        let word = Rectangle::new(0.0, 100.0, 50.0, 110.0);
        let sup = Rectangle::new(50.0, 99.0, 54.0, 104.0);
        let sub = Rectangle::new(50.0, 106.0, 54.0, 111.0);
        let boxes = vec![word, sup];

        assert_eq!(
            ScriptType::from_text_height("1", &sup, 10.0, &boxes),
            ScriptType::Superscript
        );
        assert_eq!(
            ScriptType::from_text_height("2", &sub, 10.0, &[word, sub]),
            ScriptType::Subscript
        );
        // Not numeric
        assert_eq!(
            ScriptType::from_text_height("a", &sup, 10.0, &boxes),
            ScriptType::Regular
        );
        // Too tall
        assert_eq!(
            ScriptType::from_text_height("1", &word, 10.0, &boxes),
            ScriptType::Regular
        );
    }

    #[test]
    fn test_title_type_thresholds() {
        let t = SegmentType::Title;
        assert_eq!(TitleType::from_height_ratio(t, 2.5), TitleType::H1);
        assert_eq!(TitleType::from_height_ratio(t, 2.0), TitleType::H2);
        assert_eq!(TitleType::from_height_ratio(t, 1.5), TitleType::H2);
        assert_eq!(TitleType::from_height_ratio(t, 1.3), TitleType::H3);
        assert_eq!(TitleType::from_height_ratio(t, 1.0), TitleType::H4);
        assert_eq!(
            TitleType::from_height_ratio(SegmentType::SectionHeader, 1.25),
            TitleType::H3
        );
        assert_eq!(
            TitleType::from_height_ratio(SegmentType::Text, 3.0),
            TitleType::NoTitle
        );
    }

    #[test]
    fn test_builder_keeps_other_fields() {
        let font = PdfFont::from_family("f", 10.0, "Arial-BoldItalic", "#000000");
        let style = TokenStyle::from_font(&font)
            .with_title_type(TitleType::H2)
            .with_script_type(ScriptType::Superscript);
        assert_eq!(style.title_type, TitleType::H2);
        assert_eq!(style.script_type, ScriptType::Superscript);
        assert!(style.is_bold());
        assert!(style.is_italic());
    }

    #[test]
    fn test_page_context_classifies_titles() {
        let tokens = vec![
            token("Big", 0.0, 0.0, 30.0, 25.0),
            token("body", 0.0, 30.0, 30.0, 10.0),
            token("text", 40.0, 30.0, 30.0, 10.0),
        ];
        let ctx = PageStyleContext::new(&tokens);
        assert_eq!(ctx.common_height(), Some(10.0));
        assert_eq!(
            ctx.classify(&tokens[0], SegmentType::Title).title_type,
            TitleType::H1
        );
        assert_eq!(
            ctx.classify(&tokens[1], SegmentType::Text).title_type,
            TitleType::NoTitle
        );
    }
}
