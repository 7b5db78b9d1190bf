use crate::style::TitleType;

use super::MarkupSyntax;

#[derive(Debug, Clone, Copy, Default)]
pub struct Html;

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl MarkupSyntax for Html {
    fn bold_italic(&self, content: &str) -> String {
        format!("<b><i>{}</i></b>", content)
    }

    fn bold(&self, content: &str) -> String {
        format!("<b>{}</b>", content)
    }

    fn italic(&self, content: &str) -> String {
        format!("<i>{}</i>", content)
    }

    fn web_link(&self, content: &str, url: &str) -> String {
        format!("<a href=\"{}\">{}</a>", url, content)
    }

    fn heading(&self, title_type: TitleType, content: &str) -> String {
        match title_type.level() {
            Some(level) => format!("<h{level}>{content}</h{level}>"),
            None => content.to_owned(),
        }
    }

    fn list_item(&self, depth: usize, content: &str) -> String {
        let nesting = depth + 1;
        format!(
            "{}<li>{}</li>{}",
            "<ul>".repeat(nesting),
            content,
            "</ul>".repeat(nesting)
        )
    }

    fn reference_link(&self, text: &str, destination: &str) -> String {
        format!("<a href=\"#{}\">{}</a>", destination, escape_html(text))
    }

    fn toc_header(&self) -> &'static str {
        "<h1>Table of Contents</h1>\n<ul>\n"
    }

    fn toc_entry(&self, indentation: usize, label: &str, segment_id: &str) -> String {
        format!(
            "{}<li><a href='#{}'>{}</a></li>\n",
            "  ".repeat(indentation),
            segment_id,
            label
        )
    }

    fn toc_footer(&self) -> &'static str {
        "</ul>\n\n"
    }
}
