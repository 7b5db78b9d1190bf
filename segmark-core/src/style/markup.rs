use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref ANCHOR_RE: Regex = Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").unwrap();
    static ref HREF_RE: Regex = Regex::new(r#"(?i)href\s*=\s*["']([^"']*)["']"#).unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
    pub(super) static ref BOLD_RE: Regex = Regex::new(r"(?is)<b\b[^>]*>(.*?)</b>").unwrap();
    pub(super) static ref ITALIC_RE: Regex = Regex::new(r"(?is)<i\b[^>]*>(.*?)</i>").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum HyperlinkStyle {
    #[default]
    NoLink,
    WebUrl(String),
    DocumentReference(String),
}

impl HyperlinkStyle {
    /// Reads the first anchor of the token's inline markup.
    ///
    /// A web url only counts when the anchor covers exactly the token, otherwise
    /// a partial link would be spread over the whole token.
    pub fn from_markup(markup: &str, content: &str) -> Self {
        let Some(anchor) = ANCHOR_RE.captures(markup) else {
            return HyperlinkStyle::NoLink;
        };
        let href = HREF_RE
            .captures(&anchor[1])
            .map(|c| c[1].trim().to_owned())
            .unwrap_or_default();
        if href.is_empty() {
            return HyperlinkStyle::NoLink;
        }
        if href.starts_with("http") {
            if inner_text(&anchor[2]).trim() == content {
                HyperlinkStyle::WebUrl(href)
            } else {
                HyperlinkStyle::NoLink
            }
        } else {
            HyperlinkStyle::DocumentReference(href)
        }
    }

    pub fn web_url(&self) -> Option<&str> {
        match self {
            HyperlinkStyle::WebUrl(url) => Some(url),
            _ => None,
        }
    }
}

fn inner_text(fragment: &str) -> String {
    TAG_RE.replace_all(fragment, "").into_owned()
}

/// True when the text wrapped by `tag_re` elements, concatenated, is the token content.
pub(super) fn wraps_content(markup: &str, tag_re: &Regex, content: &str) -> bool {
    let wrapped: String = tag_re
        .captures_iter(markup)
        .map(|c| inner_text(&c[1]))
        .collect();
    let wrapped = wrapped.trim();
    !wrapped.is_empty() && wrapped == content
}
