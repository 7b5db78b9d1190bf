use lazy_static::lazy_static;
use regex::Regex;
use tracing::instrument;

use crate::entities::{Segment, SegmentType};

lazy_static! {
    static ref ARABIC_RE: Regex = Regex::new(r"[\x{0600}-\x{06FF}\x{0750}-\x{077F}]").unwrap();
}

/// External recognizer turning a table or formula segment into richer text
/// (an HTML/Markdown table, a LaTeX formula).
pub trait FormatConverter: Send + Sync {
    fn name(&self) -> &str;

    fn handles(&self, segment_type: SegmentType) -> bool;

    /// `Ok(None)` means the converter has nothing better than the current text.
    fn convert(&self, segment: &Segment) -> anyhow::Result<Option<String>>;
}

pub fn contains_arabic(text: &str) -> bool {
    ARABIC_RE.is_match(text)
}

/// Cheap structural checks on a LaTeX snippet: non empty, balanced braces
/// (escaped braces excluded), balanced `\left`/`\right`, no trailing backslash.
pub fn is_valid_latex(latex: &str) -> bool {
    let latex = latex.trim();
    if latex.is_empty() {
        return false;
    }
    let mut depth: i32 = 0;
    let mut chars = latex.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if chars.next().is_none() {
                    return false;
                }
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && latex.matches("\\left").count() == latex.matches("\\right").count()
}

/// Wraps a LaTeX formula in display math delimiters, `None` if it looks broken.
pub fn wrap_formula(latex: &str) -> Option<String> {
    let body = latex.trim().trim_start_matches("$$").trim_end_matches("$$").trim();
    is_valid_latex(body).then(|| format!("$${}$$", body))
}

fn convert_segment(converter: &dyn FormatConverter, segment: &Segment) -> Option<String> {
    match segment.kind() {
        SegmentType::Formula if contains_arabic(segment.text()) => {
            tracing::debug!("skipping formula {} with arabic text", segment.id);
            None
        }
        SegmentType::Formula => match converter.convert(segment) {
            Ok(Some(latex)) => {
                let wrapped = wrap_formula(&latex);
                if wrapped.is_none() {
                    tracing::warn!("{} produced invalid latex for {}", converter.name(), segment.id);
                }
                wrapped
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("{} failed on {}: {e:?}", converter.name(), segment.id);
                None
            }
        },
        _ => match converter.convert(segment) {
            Ok(text) => text.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                tracing::warn!("{} failed on {}: {e:?}", converter.name(), segment.id);
                None
            }
        },
    }
}

/// Replaces the text of table and formula segments with the converters' output.
/// A failing converter leaves the segment untouched.
#[instrument(skip_all)]
pub fn apply_format_conversions(segments: &mut [Segment], converters: &[&dyn FormatConverter]) {
    if converters.is_empty() {
        return;
    }
    for segment in segments
        .iter_mut()
        .filter(|s| matches!(s.kind(), SegmentType::Table | SegmentType::Formula))
    {
        let converted = converters
            .iter()
            .filter(|c| c.handles(segment.kind()))
            .find_map(|c| convert_segment(*c, segment));
        if let Some(text) = converted {
            segment.segment_box.text = text;
        }
    }
}
