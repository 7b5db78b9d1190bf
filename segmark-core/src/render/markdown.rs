use crate::style::TitleType;

use super::MarkupSyntax;

#[derive(Debug, Clone, Copy, Default)]
pub struct Markdown;

fn escape_brackets(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

impl MarkupSyntax for Markdown {
    fn bold_italic(&self, content: &str) -> String {
        format!("**_{}_**", content)
    }

    fn bold(&self, content: &str) -> String {
        format!("**{}**", content)
    }

    fn italic(&self, content: &str) -> String {
        format!("_{}_", content)
    }

    fn web_link(&self, content: &str, url: &str) -> String {
        format!("[{}]({})", content, url)
    }

    fn heading(&self, title_type: TitleType, content: &str) -> String {
        match title_type.level() {
            Some(level) => format!("{} {}", "#".repeat(level), content),
            None => content.to_owned(),
        }
    }

    fn list_item(&self, depth: usize, content: &str) -> String {
        format!("{}- {}", "  ".repeat(depth), content)
    }

    fn reference_link(&self, text: &str, destination: &str) -> String {
        format!("[{}](#{})", escape_brackets(text), destination)
    }

    fn toc_header(&self) -> &'static str {
        "# Table of Contents\n\n"
    }

    fn toc_entry(&self, indentation: usize, label: &str, segment_id: &str) -> String {
        format!("{}- [{}](#{})\n", "  ".repeat(indentation), label, segment_id)
    }

    fn toc_footer(&self) -> &'static str {
        "\n\n\n"
    }
}
