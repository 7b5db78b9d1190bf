use lazy_static::lazy_static;
use regex::Regex;

use super::{alternation, markdown::DOC_REF_PATTERNS, EncodePasses, LinkPass, Placeholder, PlaceholderKind};

lazy_static! {
    pub(super) static ref PASSES: EncodePasses = {
        let mut doc_refs = vec![r"\[\\?\[?\*?\d+[,.]?\\?\]?\]\(#page-\d+-\d+\)"];
        doc_refs.extend(DOC_REF_PATTERNS);
        EncodePasses {
            doc_refs: alternation(&doc_refs),
            links: LinkPass::HtmlAnchors,
            bold_italic: alternation(&[r"(?i)<b><i>([^<]+)</i></b>", r"(?i)<i><b>([^<]+)</b></i>"]),
            bold: alternation(&[r"(?i)<b>([^<]+)</b>"]),
            italic: alternation(&[
                r"(?i)<i>([^<]*(?:\[LINK\d+\][^\[]*\[LINK\d+\][^<]*)*)</i>",
                r"(?i)<i>([^<]+)</i>",
            ]),
        }
    };
    static ref ANCHOR_OPEN_RE: Regex =
        Regex::new(r#"(?i)<a\s+href=["'](?P<url>[^"']+)["'][^>]*>"#).unwrap();
    static ref ANCHOR_BOUNDARY_RE: Regex = Regex::new(r"(?i)<a\s|</a>").unwrap();
}

/// Adjacent italic runs are merged, the translator then sees one span.
pub(super) fn preprocess(text: &str) -> String {
    text.replace("</i> <i>", " ")
}

/// Byte range of the `</a>` closing the anchor whose content starts at `from`.
fn matching_close(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1;
    for boundary in ANCHOR_BOUNDARY_RE.find_iter(&text[from..]) {
        if boundary.as_str().starts_with("</") {
            depth -= 1;
            if depth == 0 {
                return Some((from + boundary.start(), from + boundary.end()));
            }
        } else {
            depth += 1;
        }
    }
    None
}

/// Replaces `<a href>` elements with `[LINKn]` pairs. Anchors nested inside a link
/// get their own placeholders, numbered by position of their opening tag.
pub(super) fn encode_anchors(text: &str, links: &mut Vec<Placeholder>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut search_from = 0;
    while let Some(caps) = ANCHOR_OPEN_RE.captures_at(text, search_from) {
        let (Some(open), Some(url)) = (caps.get(0), caps.name("url")) else {
            break;
        };
        let Some((close_start, close_end)) = matching_close(text, open.end()) else {
            search_from = open.end();
            continue;
        };

        let index = links.len();
        links.push(Placeholder {
            opening: open.as_str().to_owned(),
            content: text[open.end()..close_start].to_owned(),
            closing: text[close_start..close_end].to_owned(),
            url: Some(url.as_str().to_owned()),
        });
        let inner = encode_anchors(&text[open.end()..close_start], links);
        links[index].content = inner.clone();

        let tag = PlaceholderKind::Link.tag();
        out.push_str(&text[copied..open.start()]);
        out.push_str(&format!("[{tag}{index}]{inner}[{tag}{index}]"));
        copied = close_end;
        search_from = close_end;
    }
    out.push_str(&text[copied..]);
    out
}
