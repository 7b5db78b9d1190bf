//! Placeholder codec protecting markup from machine translation.
//!
//! Links, document references and emphasis are swapped for numbered tags such
//! as `[B0]text[B0]` before translation and restored afterwards. Only the text
//! between paired tags is sent to the translator.

use std::fmt;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::render::OutputFormat;

pub mod html;
pub mod markdown;

lazy_static! {
    static ref DOCREF_TAG_RE: Regex = Regex::new(r"\[DOCREF(\d+)\]").unwrap();
    static ref LINK_TAG_RE: Regex = Regex::new(r"\[LINK(\d+)\]").unwrap();
    static ref BOLD_ITALIC_TAG_RE: Regex = Regex::new(r"\[BI(\d+)\]").unwrap();
    static ref BOLD_TAG_RE: Regex = Regex::new(r"\[B(\d+)\]").unwrap();
    static ref ITALIC_TAG_RE: Regex = Regex::new(r"\[IT(\d+)\]").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    DocRef,
    Link,
    BoldItalic,
    Bold,
    Italic,
}

impl PlaceholderKind {
    pub fn tag(&self) -> &'static str {
        match self {
            PlaceholderKind::DocRef => "DOCREF",
            PlaceholderKind::Link => "LINK",
            PlaceholderKind::BoldItalic => "BI",
            PlaceholderKind::Bold => "B",
            PlaceholderKind::Italic => "IT",
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Markup removed from the text, split around the translatable content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placeholder {
    pub opening: String,
    pub content: String,
    pub closing: String,
    /// Link target, only set for links
    pub url: Option<String>,
}

impl Placeholder {
    fn wrap(&self, content: &str) -> String {
        format!("{}{}{}", self.opening, content, self.closing)
    }
}

/// Everything removed by [`encode`], indexed by placeholder number.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaceholderMaps {
    pub doc_refs: Vec<String>,
    pub links: Vec<Placeholder>,
    pub bold_italic: Vec<Placeholder>,
    pub bold: Vec<Placeholder>,
    pub italic: Vec<Placeholder>,
}

impl PlaceholderMaps {
    pub fn is_empty(&self) -> bool {
        self.doc_refs.is_empty()
            && self.links.is_empty()
            && self.bold_italic.is_empty()
            && self.bold.is_empty()
            && self.italic.is_empty()
    }

    /// `(label, url)` of each encoded link
    pub fn link_targets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.links
            .iter()
            .map(|l| (l.content.as_str(), l.url.as_deref().unwrap_or_default()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedMarkup {
    pub text: String,
    pub maps: PlaceholderMaps,
}

pub(crate) enum LinkPass {
    /// `[label](url)` with one level of nested brackets, applied until nothing matches
    Markdown(Regex),
    /// `<a href>` elements, nested anchors balanced by depth
    HtmlAnchors,
}

/// Encoding passes of a dialect. The field order is the execution order.
pub(crate) struct EncodePasses {
    pub(crate) doc_refs: Regex,
    pub(crate) links: LinkPass,
    pub(crate) bold_italic: Regex,
    pub(crate) bold: Regex,
    pub(crate) italic: Regex,
}

/// Joins the variants of a pass into one regex so that matches are numbered left
/// to right whatever variant they come from.
pub(crate) fn alternation(patterns: &[&str]) -> Regex {
    let joined = patterns
        .iter()
        .map(|p| format!("(?:{})", p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&joined).unwrap()
}

fn placeholder_from(caps: &Captures) -> Option<Placeholder> {
    let whole = caps.get(0)?;
    let content = (1..caps.len()).find_map(|i| caps.get(i))?;
    let start = whole.start();
    Some(Placeholder {
        opening: whole.as_str()[..content.start() - start].to_owned(),
        content: content.as_str().to_owned(),
        closing: whole.as_str()[content.end() - start..].to_owned(),
        url: caps.name("url").map(|u| u.as_str().to_owned()),
    })
}

/// Applies `re` until it stops matching. Each match becomes a numbered pair of tags
/// around its content.
fn run_wrapping_pass(
    re: &Regex,
    kind: PlaceholderKind,
    text: String,
    entries: &mut Vec<Placeholder>,
) -> String {
    let mut text = text;
    loop {
        let before = entries.len();
        let replaced = re
            .replace_all(&text, |caps: &Captures| match placeholder_from(caps) {
                Some(placeholder) => {
                    let index = entries.len();
                    let tagged = format!(
                        "[{tag}{index}]{}[{tag}{index}]",
                        placeholder.content,
                        tag = kind.tag()
                    );
                    entries.push(placeholder);
                    tagged
                }
                None => caps[0].to_owned(),
            })
            .into_owned();
        text = replaced;
        if entries.len() == before {
            break;
        }
    }
    text
}

fn run_doc_ref_pass(re: &Regex, text: &str, doc_refs: &mut Vec<String>) -> String {
    re.replace_all(text, |caps: &Captures| {
        let index = doc_refs.len();
        doc_refs.push(caps[0].to_owned());
        format!("[{}{}]", PlaceholderKind::DocRef.tag(), index)
    })
    .into_owned()
}

#[tracing::instrument(skip_all)]
fn run_passes(passes: &EncodePasses, text: &str) -> EncodedMarkup {
    let mut maps = PlaceholderMaps::default();
    let text = run_doc_ref_pass(&passes.doc_refs, text, &mut maps.doc_refs);
    let text = match &passes.links {
        LinkPass::Markdown(re) => run_wrapping_pass(re, PlaceholderKind::Link, text, &mut maps.links),
        LinkPass::HtmlAnchors => html::encode_anchors(&text, &mut maps.links),
    };
    let text = run_wrapping_pass(
        &passes.bold_italic,
        PlaceholderKind::BoldItalic,
        text,
        &mut maps.bold_italic,
    );
    let text = run_wrapping_pass(&passes.bold, PlaceholderKind::Bold, text, &mut maps.bold);
    let text = run_wrapping_pass(&passes.italic, PlaceholderKind::Italic, text, &mut maps.italic);
    tracing::trace!(
        "encoded {} doc refs, {} links, {} bold italic, {} bold, {} italic spans",
        maps.doc_refs.len(),
        maps.links.len(),
        maps.bold_italic.len(),
        maps.bold.len(),
        maps.italic.len()
    );
    EncodedMarkup { text, maps }
}

/// Replaces markup with placeholder tags.
pub fn encode(format: OutputFormat, text: &str) -> EncodedMarkup {
    match format {
        OutputFormat::Markdown => run_passes(&markdown::PASSES, text),
        OutputFormat::Html => run_passes(&html::PASSES, &html::preprocess(text)),
    }
}

/// Finds `[TAGn]...[TAGn]` pairs on a single line and renders them with `render`.
/// A pair `render` refuses, or an opening tag without its closing twin, is left as is.
fn replace_paired(
    text: &str,
    opening_re: &Regex,
    kind: PlaceholderKind,
    mut render: impl FnMut(usize, &str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut search_from = 0;
    while let Some(caps) = opening_re.captures_at(text, search_from) {
        let (Some(open), Some(number)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let closing = format!("[{}{}]", kind.tag(), number.as_str());
        let body_start = open.end();
        let line_end = text[body_start..]
            .find('\n')
            .map_or(text.len(), |p| body_start + p);

        let Some(body_len) = text[body_start..line_end].find(&closing) else {
            search_from = open.start() + 1;
            continue;
        };
        let body = &text[body_start..body_start + body_len];
        let end = body_start + body_len + closing.len();
        let rendered = number
            .as_str()
            .parse::<usize>()
            .ok()
            .and_then(|index| render(index, body));
        match rendered {
            Some(rendered) => {
                out.push_str(&text[copied..open.start()]);
                out.push_str(&rendered);
                copied = end;
                search_from = end;
            }
            None => {
                search_from = open.start() + 1;
            }
        }
    }
    out.push_str(&text[copied..]);
    out
}

/// Restores one placeholder kind. Bodies are restored first so nested spans of the
/// same kind (a link inside a link) come back too.
fn restore(text: &str, opening_re: &Regex, kind: PlaceholderKind, entries: &[Placeholder]) -> String {
    replace_paired(text, opening_re, kind, |index, body| {
        let Some(entry) = entries.get(index) else {
            tracing::debug!("no {} placeholder with index {}", kind, index);
            return None;
        };
        Some(entry.wrap(&restore(body, opening_re, kind, entries)))
    })
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Puts the markup recorded in `maps` back around the (translated) text.
///
/// Pairs are restored innermost kinds first (bold italic, bold, italic, links),
/// then document references. Tags with an unknown index are left in place.
pub fn decode(text: &str, maps: &PlaceholderMaps) -> String {
    let text = restore(
        text,
        &BOLD_ITALIC_TAG_RE,
        PlaceholderKind::BoldItalic,
        &maps.bold_italic,
    );
    let text = restore(&text, &BOLD_TAG_RE, PlaceholderKind::Bold, &maps.bold);
    let text = restore(&text, &ITALIC_TAG_RE, PlaceholderKind::Italic, &maps.italic);
    let text = restore(&text, &LINK_TAG_RE, PlaceholderKind::Link, &maps.links);
    let text = DOCREF_TAG_RE.replace_all(&text, |caps: &Captures| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|index| maps.doc_refs.get(index))
            .cloned()
            .unwrap_or_else(|| caps[0].to_owned())
    });
    normalize_whitespace(&text.replace("] (#page", "](#page"))
}
