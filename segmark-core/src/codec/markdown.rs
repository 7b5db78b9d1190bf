use lazy_static::lazy_static;
use regex::Regex;

use super::{alternation, EncodePasses, LinkPass};

pub(crate) const DOC_REF_PATTERNS: [&str; 3] = [
    r"\[(?:\\?\d+[,.]? ?)+\]\(#page-\d+-\d+\)",
    r"\[\d+[,.]?\]\(#page-\d+-\d+\)",
    r"\[\*\d+[,.]?\]\(#page-\d+-\d+\)",
];

const LINK_PATTERN: &str = r"\[((?:[^\[\]]+|\[[^\[\]]*\])*)\]\((?P<url>https?://[^)]+)\)";

lazy_static! {
    pub(super) static ref PASSES: EncodePasses = EncodePasses {
        doc_refs: alternation(&DOC_REF_PATTERNS),
        links: LinkPass::Markdown(Regex::new(LINK_PATTERN).unwrap()),
        bold_italic: alternation(&[r"\*\*_([^*_]+)_\*\*", r"__\*([^*_]+)\*__"]),
        bold: alternation(&[r"\*\*([^*]+)\*\*", r"__([^_]+)__"]),
        italic: alternation(&[r"_([^_]+)_", r"\*([^*]+)\*"]),
    };
}
