use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    codec::{decode, encode, EncodedMarkup},
    entities::{SegmentID, SegmentType},
    render::{table_of_contents, OutputFormat, RenderedPart},
};

pub mod ollama;

pub use ollama::{OllamaConfig, OllamaTranslator};

lazy_static! {
    static ref HTML_TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Retries per chunk after the first attempt
    pub max_retries: usize,
    pub retry_delay: Duration,
    /// Chunks in flight at the same time
    pub concurrency: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(10),
            concurrency: 1,
        }
    }
}

#[derive(Debug)]
enum ChunkPlan {
    Verbatim(String),
    /// Only `body` goes to the translator, `anchor` is kept as is
    Prefixed { anchor: String, body: String },
    Encoded(EncodedMarkup),
}

#[derive(Debug)]
struct Chunk {
    plan: ChunkPlan,
    title_of: Option<SegmentID>,
}

impl Chunk {
    fn plan(format: OutputFormat, part: &RenderedPart) -> Option<Self> {
        let segment_type = part.segment_type?;
        let content = part.content.trim();
        if content.is_empty() {
            return None;
        }
        // An anchor without a body is kept as is, the anchor is the link target
        let split = || match content.split_once('\n') {
            Some((anchor, body)) if !body.trim().is_empty() => ChunkPlan::Prefixed {
                anchor: anchor.to_owned(),
                body: body.to_owned(),
            },
            _ => ChunkPlan::Verbatim(content.to_owned()),
        };
        let plan = match segment_type {
            SegmentType::Picture | SegmentType::Formula => ChunkPlan::Verbatim(content.to_owned()),
            SegmentType::Table | SegmentType::Title | SegmentType::SectionHeader => split(),
            _ => ChunkPlan::Encoded(encode(format, content)),
        };
        Some(Self {
            plan,
            title_of: segment_type
                .is_title()
                .then(|| part.segment_id.clone())
                .flatten(),
        })
    }

    async fn translate<T: Translator + ?Sized>(
        &self,
        translator: &T,
        target_language: &str,
        config: &TranslationConfig,
    ) -> String {
        match &self.plan {
            ChunkPlan::Verbatim(content) => content.clone(),
            ChunkPlan::Prefixed { anchor, body } => {
                let body = translate_with_retries(translator, body, target_language, config)
                    .await
                    .unwrap_or_else(|| body.clone());
                format!("{anchor}\n{body}")
            }
            ChunkPlan::Encoded(encoded) => {
                let text = translate_with_retries(translator, &encoded.text, target_language, config)
                    .await
                    .unwrap_or_else(|| encoded.text.clone());
                decode(&text, &encoded.maps)
            }
        }
    }
}

async fn translate_with_retries<T: Translator + ?Sized>(
    translator: &T,
    text: &str,
    target_language: &str,
    config: &TranslationConfig,
) -> Option<String> {
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            tracing::debug!("retrying translation ({}/{})", attempt, config.max_retries);
            tokio::time::sleep(config.retry_delay).await;
        }
        match translator.translate(text, target_language).await {
            Ok(translated) => return Some(translated),
            Err(e) => tracing::warn!("translation attempt {} failed: {e:#}", attempt + 1),
        }
    }
    tracing::warn!(
        "translation failed after {} attempts, keeping source text",
        config.max_retries + 1
    );
    None
}

/// Heading text without markdown hashes or html tags.
fn heading_label(content: &str) -> String {
    let heading = content.lines().last().unwrap_or_default();
    HTML_TAG_RE.replace_all(heading, "").replace('#', "").trim().to_owned()
}

/// Translates rendered parts chunk by chunk and joins them back in document order.
///
/// Pictures and formulas are kept, tables and titles keep their anchor line and every
/// other part goes through the placeholder codec. A chunk that keeps failing falls back
/// to its source text. When the parts start with a table of contents, it is rebuilt
/// from the translated titles.
#[tracing::instrument(skip_all, fields(target_language = target_language))]
pub async fn translate_markup<T, F>(
    translator: &T,
    format: OutputFormat,
    parts: &[RenderedPart],
    target_language: &str,
    config: &TranslationConfig,
    mut on_chunk: F,
) -> String
where
    T: Translator + ?Sized,
    F: FnMut(),
{
    let has_toc = parts.first().is_some_and(|p| p.segment_type.is_none());
    let chunks: Vec<Chunk> = parts
        .iter()
        .filter_map(|part| Chunk::plan(format, part))
        .collect();
    tracing::info!("translating {} chunks", chunks.len());

    let mut translated = Vec::with_capacity(chunks.len());
    let mut results = stream::iter(chunks.iter())
        .map(|chunk| chunk.translate(translator, target_language, config))
        .buffered(config.concurrency.max(1));
    while let Some(content) = results.next().await {
        on_chunk();
        translated.push(content);
    }

    let mut output = Vec::with_capacity(translated.len() + 1);
    if has_toc {
        let labels: Vec<(String, &str)> = chunks
            .iter()
            .zip(&translated)
            .filter_map(|(chunk, content)| {
                chunk
                    .title_of
                    .as_deref()
                    .map(|id| (heading_label(content), id))
            })
            .collect();
        let toc = table_of_contents(
            format,
            labels.iter().map(|(label, id)| (label.as_str(), *id)),
        );
        output.push(toc.trim_end().to_owned());
    }
    output.extend(translated);
    output.join("\n\n")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Upper;

    #[async_trait]
    impl Translator for Upper {
        async fn translate(&self, text: &str, _target_language: &str) -> anyhow::Result<String> {
            Ok(text
                .split_inclusive(['[', ']'])
                .map(|piece| {
                    // Placeholder tags stay untouched
                    if piece.ends_with(']') {
                        piece.to_owned()
                    } else {
                        piece.to_uppercase()
                    }
                })
                .collect())
        }
    }

    struct Failing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for Failing {
        async fn translate(&self, _text: &str, _target_language: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("model unavailable")
        }
    }

    fn part(id: &str, segment_type: SegmentType, content: &str) -> RenderedPart {
        RenderedPart {
            segment_id: Some(id.to_owned()),
            segment_type: Some(segment_type),
            content: content.to_owned(),
        }
    }

    fn fast_config() -> TranslationConfig {
        TranslationConfig {
            max_retries: 2,
            retry_delay: Duration::ZERO,
            concurrency: 4,
        }
    }

    #[test]
    fn test_heading_label() {
        assert_eq!(heading_label("<span id='page-1-0'></span>\n## Intro"), "Intro");
        assert_eq!(heading_label("<h2>Intro</h2>"), "Intro");
    }

    #[tokio::test]
    async fn test_translate_keeps_order_and_rebuilds_toc() -> anyhow::Result<()> {
        let parts = vec![
            RenderedPart {
                segment_id: None,
                segment_type: None,
                content: "# Table of Contents\n\n- [intro](#page-1-0)\n\n\n\n".to_owned(),
            },
            part(
                "page-1-0",
                SegmentType::Title,
                "<span id='page-1-0'></span>\n# intro\n\n",
            ),
            part("page-1-1", SegmentType::Text, "some **bold** text\n\n"),
            part("page-1-2", SegmentType::Formula, "$$x^2$$\n\n"),
            part("page-1-3", SegmentType::Text, "   \n\n"),
            part(
                "page-1-4",
                SegmentType::Table,
                "<span id='page-1-4'></span>\n<table><tr><td>a</td></tr></table>\n\n",
            ),
        ];
        let mut calls = 0;
        let translated = translate_markup(
            &Upper,
            OutputFormat::Markdown,
            &parts,
            "French",
            &fast_config(),
            || calls += 1,
        )
        .await;

        assert_eq!(calls, 4);
        assert_eq!(
            translated,
            "# Table of Contents\n\n- [INTRO](#page-1-0)\n\n\
             <span id='page-1-0'></span>\n# INTRO\n\n\
             SOME **BOLD** TEXT\n\n\
             $$x^2$$\n\n\
             <span id='page-1-4'></span>\n<TABLE><TR><TD>A</TD></TR></TABLE>"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_anchor_only_parts_are_kept() {
        let parts = vec![
            part("page-1-0", SegmentType::Table, "<span id='page-1-0'></span>\n\n"),
            part("page-1-1", SegmentType::Title, "<span id='page-1-1'></span>\n  \n"),
            part("page-1-2", SegmentType::Text, "after"),
        ];
        let translated = translate_markup(
            &Upper,
            OutputFormat::Markdown,
            &parts,
            "French",
            &fast_config(),
            || {},
        )
        .await;
        assert_eq!(
            translated,
            "<span id='page-1-0'></span>\n\n<span id='page-1-1'></span>\n\nAFTER"
        );
    }

    #[tokio::test]
    async fn test_failed_chunks_fall_back_to_source() {
        let translator = Failing {
            calls: AtomicUsize::new(0),
        };
        let parts = vec![
            part("page-1-0", SegmentType::Title, "<span id='page-1-0'></span>\n# Intro"),
            part(
                "page-1-1",
                SegmentType::Text,
                "see [docs](https://a.org) and [1](#page-2-3)",
            ),
        ];
        let translated = translate_markup(
            &translator,
            OutputFormat::Markdown,
            &parts,
            "German",
            &fast_config(),
            || {},
        )
        .await;

        assert_eq!(translator.calls.load(Ordering::SeqCst), 6);
        assert_eq!(
            translated,
            "<span id='page-1-0'></span>\n# Intro\n\nsee [docs](https://a.org) and [1](#page-2-3)"
        );
    }
}
